mod idle;
mod route;
mod routing;

use std::sync::Arc;
use std::thread::{self, ThreadId};

use flume::Sender;

use crate::bus::{BusKind, SubscriberBus};
use crate::config::AudioSessionConfig;
use crate::control::ActivationControl;
use crate::holder::{AudioSessionHolder, DeactivationSignal};
use crate::messages::{InternalEvent, SessionMsg};
use crate::platform::{AudioPlatform, PlatformEvent};
use crate::types::{AudioSessionOutputMode, AudioSessionType, HolderId};

use route::RouteSnapshot;

struct HolderRecord {
    id: HolderId,
    session_type: AudioSessionType,
    output_mode: AudioSessionOutputMode,
    once: bool,
    behavior: Box<dyn AudioSessionHolder>,
    active: bool,
    // Token of the deactivation we are waiting on, if any.
    deactivation: Option<u64>,
    // Cancelled by its token while active/deactivating; removed once deactivation completes.
    removal_requested: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evaluation {
    Normal,
    Interruption,
}

/// The session registry. Owned by the session thread; every mutation arrives as a
/// [`SessionMsg`].
pub(crate) struct AudioSessionCore {
    platform: Arc<dyn AudioPlatform>,
    config: AudioSessionConfig,
    core_sender: Sender<SessionMsg>,
    runtime: tokio::runtime::Runtime,
    session_thread: ThreadId,
    handled: u64,

    // Push order; the tail has the highest priority.
    holders: Vec<HolderRecord>,
    current: Option<(AudioSessionType, AudioSessionOutputMode)>,
    interrupted: bool,

    deactivation_token: u64,
    idle_release_token: u64,
    idle_release_pending: bool,

    has_loudspeaker: bool,
    headset_connected: bool,
    route: RouteSnapshot,

    is_active_bus: SubscriberBus,
    is_playback_active_bus: SubscriberBus,
    headset_bus: SubscriberBus,
}

impl AudioSessionCore {
    pub(crate) fn new(
        platform: Arc<dyn AudioPlatform>,
        config: AudioSessionConfig,
        core_sender: Sender<SessionMsg>,
        runtime: tokio::runtime::Runtime,
    ) -> Self {
        let has_loudspeaker = platform.has_loudspeaker();
        let headset_connected = route::headset_plugged_in(&platform.current_route());
        let mut this = Self {
            platform,
            config,
            core_sender,
            runtime,
            session_thread: thread::current().id(),
            handled: 0,
            holders: Vec::new(),
            current: None,
            interrupted: false,
            deactivation_token: 0,
            idle_release_token: 0,
            idle_release_pending: false,
            has_loudspeaker,
            headset_connected,
            route: RouteSnapshot::default(),
            is_active_bus: SubscriberBus::default(),
            is_playback_active_bus: SubscriberBus::default(),
            headset_bus: SubscriberBus::default(),
        };
        this.refresh_route();
        this
    }

    pub(crate) fn handle_message(&mut self, msg: SessionMsg) {
        tracing::trace!(msg = msg.tag(), "audio session dispatch");
        if !matches!(msg, SessionMsg::Sync { .. }) {
            self.handled = self.handled.wrapping_add(1);
        }
        match msg {
            SessionMsg::Push {
                id,
                session_type,
                output_mode,
                once,
                holder,
            } => self.handle_push(id, session_type, output_mode, once, holder),
            SessionMsg::Remove { id } => self.handle_remove(id),
            SessionMsg::DropAll => self.handle_interruption_began("drop_all"),
            SessionMsg::Platform(event) => self.handle_platform_event(event),
            SessionMsg::Control { id, request, ack } => {
                self.handle_control(id, request);
                if let Some(ack) = ack {
                    let _ = ack.send(());
                }
            }
            SessionMsg::Subscribe {
                bus,
                subscriber_id,
                tx,
            } => {
                let current = self.bus_value(bus);
                self.bus_mut(bus).add(subscriber_id, tx, current);
            }
            SessionMsg::Unsubscribe { bus, subscriber_id } => {
                self.bus_mut(bus).remove(subscriber_id);
            }
            SessionMsg::Sync { ack, seen } => {
                // Follow-ups queued by earlier messages (completions, control requests from
                // callbacks) count as part of the work being waited on. Only other barriers
                // ran since the last pass when the counter did not move.
                if self.core_sender.is_empty() || seen == Some(self.handled) {
                    let _ = ack.send(());
                } else {
                    let _ = self.core_sender.send(SessionMsg::Sync {
                        ack,
                        seen: Some(self.handled),
                    });
                }
            }
            SessionMsg::Internal(internal) => self.handle_internal(*internal),
            SessionMsg::Shutdown => {
                tracing::debug!("shutdown must be handled by the session loop");
            }
        }
    }

    fn handle_internal(&mut self, internal: InternalEvent) {
        match internal {
            InternalEvent::DeactivationCompleted { id, token } => {
                self.handle_deactivation_completed(id, token)
            }
            InternalEvent::IdleReleaseTimer { token } => self.handle_idle_release_timer(token),
            InternalEvent::DeliverOutputsAfterActivation { id } => {
                self.handle_deliver_outputs_after_activation(id)
            }
        }
    }

    fn handle_platform_event(&mut self, event: PlatformEvent) {
        match event {
            PlatformEvent::RouteChanged => self.refresh_route(),
            PlatformEvent::InterruptionBegan => self.handle_interruption_began("platform"),
            PlatformEvent::InterruptionEnded => self.handle_interruption_ended(),
        }
    }

    /// Releases the hardware if we still hold it and stops timers. Consumes the core.
    pub(crate) fn shutdown(mut self) {
        tracing::info!(holders = self.holders.len(), "audio session shutting down");
        if self.current.is_some() {
            self.apply_none();
        }
        self.runtime.shutdown_background();
    }

    fn handle_push(
        &mut self,
        id: HolderId,
        session_type: AudioSessionType,
        output_mode: AudioSessionOutputMode,
        once: bool,
        behavior: Box<dyn AudioSessionHolder>,
    ) {
        tracing::debug!(
            holder_id = id.0,
            session_type = session_type.tag(),
            once,
            "audio session push"
        );
        if self.interrupted {
            tracing::info!(holder_id = id.0, "new holder ends interrupted state");
            self.interrupted = false;
        }
        self.holders.push(HolderRecord {
            id,
            session_type,
            output_mode,
            once,
            behavior,
            active: false,
            deactivation: None,
            removal_requested: false,
        });
        self.update_holders(Evaluation::Normal);
    }

    fn handle_remove(&mut self, id: HolderId) {
        let Some(index) = self.index_of(id) else {
            tracing::debug!(holder_id = id.0, "remove for holder that is already gone");
            return;
        };
        let record = &mut self.holders[index];
        if record.active || record.deactivation.is_some() {
            // Deactivation has to finish before the record goes away.
            tracing::debug!(
                holder_id = id.0,
                active = record.active,
                "remove deferred until deactivation completes"
            );
            record.removal_requested = true;
        } else {
            self.remove_holder_at(index, "cancelled");
        }
        self.update_holders(Evaluation::Normal);
    }

    fn handle_interruption_began(&mut self, source: &'static str) {
        tracing::info!(source, holders = self.holders.len(), "audio session interruption began");
        let call_survives = self
            .active_index()
            .is_some_and(|index| self.holders[index].session_type == AudioSessionType::VoiceCall);
        if call_survives {
            // Nothing steps down, so the queue keeps normal LIFO promotion.
            tracing::debug!(source, "active voice call keeps the session");
            return;
        }
        self.interrupted = true;
        self.update_holders(Evaluation::Interruption);
    }

    fn handle_interruption_ended(&mut self) {
        if !self.interrupted {
            return;
        }
        tracing::info!("audio session interruption ended");
        self.interrupted = false;
        self.update_holders(Evaluation::Normal);
    }

    fn update_holders(&mut self, evaluation: Evaluation) {
        if self.holders.is_empty() {
            self.schedule_idle_release();
            return;
        }

        if let Some(record) = self.holders.iter().find(|h| h.deactivation.is_some()) {
            tracing::debug!(
                holder_id = record.id.0,
                ?evaluation,
                "evaluation deferred: deactivation in flight"
            );
            return;
        }

        match self.holders.iter().position(|h| h.active) {
            Some(index) => {
                if self.should_step_down(index, evaluation) {
                    self.begin_deactivation(index);
                }
            }
            None if self.interrupted => self.schedule_idle_release(),
            None => self.activate_holder(self.holders.len() - 1),
        }
    }

    fn should_step_down(&self, index: usize, evaluation: Evaluation) -> bool {
        let record = &self.holders[index];
        if record.removal_requested {
            return true;
        }
        if record.session_type == AudioSessionType::VoiceCall {
            return false;
        }
        match evaluation {
            Evaluation::Interruption => true,
            Evaluation::Normal => index != self.holders.len() - 1,
        }
    }

    fn activate_holder(&mut self, index: usize) {
        self.cancel_idle_release();
        let control = ActivationControl::new(
            self.holders[index].id,
            self.core_sender.clone(),
            self.session_thread,
        );
        let record = &mut self.holders[index];
        record.active = true;
        tracing::info!(
            holder_id = record.id.0,
            session_type = record.session_type.tag(),
            "activating audio session holder"
        );
        record.behavior.activate(control);
        let _ = self.core_sender.send(SessionMsg::Internal(Box::new(
            InternalEvent::DeliverOutputsAfterActivation { id: record.id },
        )));
    }

    fn begin_deactivation(&mut self, index: usize) {
        self.deactivation_token = self.deactivation_token.saturating_add(1);
        let token = self.deactivation_token;
        let record = &mut self.holders[index];
        record.active = false;
        record.deactivation = Some(token);
        tracing::info!(
            holder_id = record.id.0,
            session_type = record.session_type.tag(),
            token,
            "deactivating audio session holder"
        );
        let id = record.id;
        let signal = record.behavior.deactivate();
        self.watch_deactivation(id, token, signal);
    }

    fn watch_deactivation(&self, id: HolderId, token: u64, signal: DeactivationSignal) {
        let tx = self.core_sender.clone();
        let completed = SessionMsg::Internal(Box::new(InternalEvent::DeactivationCompleted {
            id,
            token,
        }));
        let Some(pending) = signal.into_pending() else {
            let _ = tx.send(completed);
            return;
        };
        self.runtime.spawn(async move {
            if pending.recv_async().await.is_err() {
                tracing::debug!(
                    holder_id = id.0,
                    token,
                    "deactivation completer dropped; treating as completed"
                );
            }
            let _ = tx.send(completed);
        });
    }

    fn handle_deactivation_completed(&mut self, id: HolderId, token: u64) {
        let Some(index) = self.index_of(id) else {
            tracing::debug!(holder_id = id.0, token, "stale deactivation completion");
            return;
        };
        let record = &mut self.holders[index];
        if record.deactivation != Some(token) {
            tracing::debug!(holder_id = id.0, token, "stale deactivation completion");
            return;
        }
        record.deactivation = None;
        let (removal_requested, once) = (record.removal_requested, record.once);
        tracing::debug!(holder_id = id.0, token, "audio session holder deactivated");
        if removal_requested {
            self.remove_holder_at(index, "cancelled");
        } else if once {
            self.remove_holder_at(index, "once");
        }
        self.update_holders(Evaluation::Normal);
    }

    fn handle_deliver_outputs_after_activation(&mut self, id: HolderId) {
        let still_active = self
            .holders
            .iter()
            .any(|holder| holder.id == id && holder.active);
        if !still_active {
            return;
        }
        self.refresh_route();
        if let Some(record) = self.holders.iter_mut().find(|h| h.id == id && h.active) {
            record.behavior.available_outputs_changed(
                &self.route.available_outputs,
                self.route.current_output.as_ref(),
            );
        }
    }

    fn remove_holder_at(&mut self, index: usize, reason: &'static str) {
        let record = self.holders.remove(index);
        tracing::debug!(
            holder_id = record.id.0,
            session_type = record.session_type.tag(),
            reason,
            remaining = self.holders.len(),
            "audio session holder removed"
        );
    }

    fn index_of(&self, id: HolderId) -> Option<usize> {
        self.holders.iter().position(|holder| holder.id == id)
    }

    fn active_index(&self) -> Option<usize> {
        self.holders.iter().position(|holder| holder.active)
    }

    fn is_playback_active(&self) -> bool {
        self.current
            .as_ref()
            .map(|(session_type, _)| session_type.is_playback())
            .unwrap_or(false)
    }

    fn bus_value(&self, bus: BusKind) -> bool {
        match bus {
            BusKind::IsActive => self.current.is_some(),
            BusKind::IsPlaybackActive => self.is_playback_active(),
            BusKind::HeadsetConnected => self.headset_connected,
        }
    }

    fn bus_mut(&mut self, bus: BusKind) -> &mut SubscriberBus {
        match bus {
            BusKind::IsActive => &mut self.is_active_bus,
            BusKind::IsPlaybackActive => &mut self.is_playback_active_bus,
            BusKind::HeadsetConnected => &mut self.headset_bus,
        }
    }

    /// Publishes `isActive`/`isPlaybackActive` transitions relative to the previous values.
    fn publish_activity(&mut self, was_active: bool, was_playback: bool) {
        let is_active = self.current.is_some();
        if is_active != was_active {
            self.is_active_bus.publish(is_active);
        }
        let is_playback = self.is_playback_active();
        if is_playback != was_playback {
            self.is_playback_active_bus.publish(is_playback);
        }
    }
}
