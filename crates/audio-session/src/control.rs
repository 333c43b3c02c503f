use std::thread::{self, ThreadId};

use flume::Sender;

use crate::messages::{ControlRequest, SessionMsg};
use crate::types::{ActivationState, AudioSessionOutputMode, HolderId};

/// Capability handed to a holder when it becomes active.
///
/// Requests are only honored while the holder is active; after it steps down they are
/// dropped (except `set_output_mode`, which still records the preference).
#[derive(Debug, Clone)]
pub struct ActivationControl {
    id: HolderId,
    core_sender: Sender<SessionMsg>,
    session_thread: ThreadId,
}

impl ActivationControl {
    pub(crate) fn new(id: HolderId, core_sender: Sender<SessionMsg>, session_thread: ThreadId) -> Self {
        Self {
            id,
            core_sender,
            session_thread,
        }
    }

    pub fn holder_id(&self) -> HolderId {
        self.id
    }

    /// Configure category/mode for this holder's session type without activating.
    pub fn setup(&self, synchronous: bool) {
        self.send(ControlRequest::Setup, synchronous);
    }

    pub fn activate(&self, completion: impl FnOnce(ActivationState) + Send + 'static) {
        self.send(ControlRequest::Activate(Box::new(completion)), false);
    }

    pub fn setup_and_activate(
        &self,
        synchronous: bool,
        completion: impl FnOnce(ActivationState) + Send + 'static,
    ) {
        self.send(
            ControlRequest::SetupAndActivate(Box::new(completion)),
            synchronous,
        );
    }

    pub fn set_output_mode(&self, mode: AudioSessionOutputMode) {
        self.send(ControlRequest::SetOutputMode(mode), false);
    }

    fn send(&self, request: ControlRequest, synchronous: bool) {
        // Waiting from the session thread would deadlock; the request runs after the current pass.
        if synchronous && thread::current().id() != self.session_thread {
            let (ack_tx, ack_rx) = flume::bounded(1);
            let msg = SessionMsg::Control {
                id: self.id,
                request,
                ack: Some(ack_tx),
            };
            if self.core_sender.send(msg).is_ok() {
                let _ = ack_rx.recv();
            }
            return;
        }
        let _ = self.core_sender.send(SessionMsg::Control {
            id: self.id,
            request,
            ack: None,
        });
    }
}
