use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use flume::{Receiver, Sender};

use crate::control::ActivationControl;
use crate::messages::SessionMsg;
use crate::types::{ActivationState, AudioSessionOutput, HolderId};

/// Behavior a feature supplies when it asks for the hardware audio session.
///
/// Every callback runs on the session thread. Callbacks must not block waiting on the
/// session manager; anything sent back (pushes, control requests) is processed after the
/// current evaluation pass.
pub trait AudioSessionHolder: Send + 'static {
    /// The holder now owns the session. Use `control` to configure and activate the hardware;
    /// it may be kept and used later while the holder stays active.
    fn activate(&mut self, control: ActivationControl);

    /// The holder must stop using the session. No other holder is promoted until the
    /// returned signal completes; a signal that never completes stalls the registry.
    fn deactivate(&mut self) -> DeactivationSignal;

    fn headset_changed(&mut self, _connected: bool) {}

    fn available_outputs_changed(
        &mut self,
        _outputs: &[AudioSessionOutput],
        _current: Option<&AudioSessionOutput>,
    ) {
    }
}

/// Completion signal returned from [`AudioSessionHolder::deactivate`].
#[derive(Debug)]
pub struct DeactivationSignal {
    pending: Option<Receiver<()>>,
}

impl DeactivationSignal {
    /// Deactivation already finished.
    pub fn completed() -> Self {
        Self { pending: None }
    }

    /// Deactivation finishes when the returned completer is signalled (or dropped).
    pub fn pending() -> (DeactivationCompleter, Self) {
        let (tx, rx) = flume::bounded(1);
        (
            DeactivationCompleter { tx },
            Self {
                pending: Some(rx),
            },
        )
    }

    pub(crate) fn into_pending(self) -> Option<Receiver<()>> {
        self.pending
    }
}

#[derive(Debug)]
pub struct DeactivationCompleter {
    tx: Sender<()>,
}

impl DeactivationCompleter {
    pub fn complete(self) {
        let _ = self.tx.send(());
    }
}

/// Cancellation handle returned by `push`. Cancelling (or dropping) it removes the holder;
/// an active holder is deactivated first.
#[derive(Debug)]
pub struct AudioSessionToken {
    id: HolderId,
    core_sender: Sender<SessionMsg>,
    cancelled: AtomicBool,
}

impl AudioSessionToken {
    pub(crate) fn new(id: HolderId, core_sender: Sender<SessionMsg>) -> Self {
        Self {
            id,
            core_sender,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn holder_id(&self) -> HolderId {
        self.id
    }

    pub fn cancel(&self) {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return;
        }
        // Contract: never block caller.
        let _ = self.core_sender.send(SessionMsg::Remove { id: self.id });
    }
}

impl Drop for AudioSessionToken {
    fn drop(&mut self) {
        self.cancel();
    }
}

type ActivateFn = Arc<dyn Fn(ActivationState) + Send + Sync>;

/// Holder for features that only want "configure + activate as soon as I own the session".
pub(crate) struct AutoActivateHolder<D> {
    on_activate: ActivateFn,
    on_deactivate: D,
}

impl<D> AutoActivateHolder<D>
where
    D: FnMut() -> DeactivationSignal + Send + 'static,
{
    pub(crate) fn new(
        on_activate: impl Fn(ActivationState) + Send + Sync + 'static,
        on_deactivate: D,
    ) -> Self {
        Self {
            on_activate: Arc::new(on_activate),
            on_deactivate,
        }
    }
}

impl<D> AudioSessionHolder for AutoActivateHolder<D>
where
    D: FnMut() -> DeactivationSignal + Send + 'static,
{
    fn activate(&mut self, control: ActivationControl) {
        let on_activate = self.on_activate.clone();
        control.setup_and_activate(false, move |state| on_activate(state));
    }

    fn deactivate(&mut self) -> DeactivationSignal {
        (self.on_deactivate)()
    }
}
