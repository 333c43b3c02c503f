mod bus;
mod config;
mod control;
mod core;
mod error;
mod holder;
mod in_memory;
pub mod logging;
mod messages;
mod platform;
mod types;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use anyhow::Context;
use flume::{Receiver, Sender};

use crate::bus::BusKind;
use crate::holder::AutoActivateHolder;
use crate::messages::SessionMsg;

pub use bus::Subscription;
pub use config::{AudioSessionConfig, IDLE_RELEASE_ENV, VOICE_CALL_IO_BUFFER_ENV};
pub use control::ActivationControl;
pub use error::PlatformError;
pub use holder::{AudioSessionHolder, AudioSessionToken, DeactivationCompleter, DeactivationSignal};
pub use in_memory::{InMemoryPlatform, PlatformCall, PlatformOperation};
pub use logging::init_logging;
pub use platform::*;
pub use types::*;

struct ManagerInner {
    core_tx: Sender<SessionMsg>,
    next_holder_id: AtomicU64,
    next_subscriber_id: AtomicU64,
    session_thread: ThreadId,
}

impl Drop for ManagerInner {
    fn drop(&mut self) {
        let _ = self.core_tx.send(SessionMsg::Shutdown);
    }
}

/// Arbitrates the single hardware audio session between competing features.
///
/// Every call enqueues work for the session thread and returns without waiting (except
/// [`AudioSessionManager::sync`]). Clones share the same registry; the session thread shuts
/// down once the last clone is dropped.
#[derive(Clone)]
pub struct AudioSessionManager {
    inner: Arc<ManagerInner>,
}

impl AudioSessionManager {
    pub fn new(
        platform: Arc<dyn AudioPlatform>,
        events: Receiver<PlatformEvent>,
        config: AudioSessionConfig,
    ) -> anyhow::Result<Self> {
        tracing::info!(
            idle_release_delay_ms = config.idle_release_delay_ms,
            "audio session manager starting"
        );
        let (core_tx, core_rx) = flume::unbounded::<SessionMsg>();

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("audio-session-timers")
            .enable_time()
            .build()
            .context("build audio session runtime")?;

        let forward_tx = core_tx.clone();
        runtime.spawn(async move {
            while let Ok(event) = events.recv_async().await {
                if forward_tx.send(SessionMsg::Platform(event)).is_err() {
                    break;
                }
            }
        });

        let core_tx_for_core = core_tx.clone();
        let handle = thread::Builder::new()
            .name("audio-session".to_string())
            .spawn(move || {
                let mut core =
                    crate::core::AudioSessionCore::new(platform, config, core_tx_for_core, runtime);
                while let Ok(msg) = core_rx.recv() {
                    if let SessionMsg::Shutdown = msg {
                        core.shutdown();
                        return;
                    }
                    core.handle_message(msg);
                }
            })
            .context("spawn audio session thread")?;

        Ok(Self {
            inner: Arc::new(ManagerInner {
                core_tx,
                next_holder_id: AtomicU64::new(1),
                next_subscriber_id: AtomicU64::new(1),
                session_thread: handle.thread().id(),
            }),
        })
    }

    /// Queues `holder` for the session. The most recent push wins unless a voice call is
    /// active. Dropping the returned token removes the holder.
    pub fn push(
        &self,
        session_type: AudioSessionType,
        output_mode: AudioSessionOutputMode,
        once: bool,
        holder: impl AudioSessionHolder,
    ) -> AudioSessionToken {
        let id = HolderId(self.inner.next_holder_id.fetch_add(1, Ordering::Relaxed));
        // Contract: never block caller.
        let _ = self.inner.core_tx.send(SessionMsg::Push {
            id,
            session_type,
            output_mode,
            once,
            holder: Box::new(holder),
        });
        AudioSessionToken::new(id, self.inner.core_tx.clone())
    }

    /// Push for holders that just want the session configured and activated as soon as they
    /// own it. `on_activate` runs after hardware activation.
    pub fn push_auto(
        &self,
        session_type: AudioSessionType,
        output_mode: AudioSessionOutputMode,
        once: bool,
        on_activate: impl Fn(ActivationState) + Send + Sync + 'static,
        on_deactivate: impl FnMut() -> DeactivationSignal + Send + 'static,
    ) -> AudioSessionToken {
        self.push(
            session_type,
            output_mode,
            once,
            AutoActivateHolder::new(on_activate, on_deactivate),
        )
    }

    /// Deactivates the active holder (unless it is a voice call) and keeps everyone else
    /// parked until the next push.
    pub fn drop_all(&self) {
        let _ = self.inner.core_tx.send(SessionMsg::DropAll);
    }

    pub fn is_active(&self) -> Subscription {
        self.subscribe(BusKind::IsActive)
    }

    pub fn is_playback_active(&self) -> Subscription {
        self.subscribe(BusKind::IsPlaybackActive)
    }

    pub fn headset_connected(&self) -> Subscription {
        self.subscribe(BusKind::HeadsetConnected)
    }

    /// Blocks until everything enqueued before this call has been processed, along with the
    /// follow-up work it queued (deactivation completions, control requests from callbacks).
    /// Deactivations still waiting on their holder are not waited for. Returns immediately
    /// when called from a holder callback.
    pub fn sync(&self) {
        if thread::current().id() == self.inner.session_thread {
            return;
        }
        let (ack_tx, ack_rx) = flume::bounded(1);
        let msg = SessionMsg::Sync {
            ack: ack_tx,
            seen: None,
        };
        if self.inner.core_tx.send(msg).is_ok() {
            let _ = ack_rx.recv();
        }
    }

    fn subscribe(&self, bus: BusKind) -> Subscription {
        let subscriber_id = self.inner.next_subscriber_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = flume::unbounded();
        let _ = self.inner.core_tx.send(SessionMsg::Subscribe {
            bus,
            subscriber_id,
            tx,
        });
        Subscription::new(subscriber_id, bus, rx, self.inner.core_tx.clone())
    }
}

impl std::fmt::Debug for AudioSessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioSessionManager")
            .field("next_holder_id", &self.inner.next_holder_id.load(Ordering::Relaxed))
            .finish()
    }
}
