use flume::Sender;

use crate::bus::BusKind;
use crate::holder::AudioSessionHolder;
use crate::platform::PlatformEvent;
use crate::types::{ActivationState, AudioSessionOutputMode, AudioSessionType, HolderId};

pub(crate) type ActivationCompletion = Box<dyn FnOnce(ActivationState) + Send>;

/// Everything the session thread reacts to. Nothing else touches the holder list.
pub(crate) enum SessionMsg {
    Push {
        id: HolderId,
        session_type: AudioSessionType,
        output_mode: AudioSessionOutputMode,
        once: bool,
        holder: Box<dyn AudioSessionHolder>,
    },
    Remove {
        id: HolderId,
    },
    DropAll,
    Platform(PlatformEvent),
    Control {
        id: HolderId,
        request: ControlRequest,
        ack: Option<Sender<()>>,
    },
    Subscribe {
        bus: BusKind,
        subscriber_id: u64,
        tx: Sender<bool>,
    },
    Unsubscribe {
        bus: BusKind,
        subscriber_id: u64,
    },
    Sync {
        ack: Sender<()>,
        // Value of the handled-message counter when this barrier was last requeued.
        seen: Option<u64>,
    },
    Internal(Box<InternalEvent>),
    Shutdown,
}

impl SessionMsg {
    /// Log-safe tag.
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            SessionMsg::Push { .. } => "Push",
            SessionMsg::Remove { .. } => "Remove",
            SessionMsg::DropAll => "DropAll",
            SessionMsg::Platform(_) => "Platform",
            SessionMsg::Control { .. } => "Control",
            SessionMsg::Subscribe { .. } => "Subscribe",
            SessionMsg::Unsubscribe { .. } => "Unsubscribe",
            SessionMsg::Sync { .. } => "Sync",
            SessionMsg::Internal(_) => "Internal",
            SessionMsg::Shutdown => "Shutdown",
        }
    }
}

impl std::fmt::Debug for SessionMsg {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionMsg::Push {
                id,
                session_type,
                output_mode,
                once,
                ..
            } => f
                .debug_struct("Push")
                .field("id", id)
                .field("session_type", session_type)
                .field("output_mode", output_mode)
                .field("once", once)
                .finish(),
            SessionMsg::Remove { id } => f.debug_struct("Remove").field("id", id).finish(),
            SessionMsg::Platform(event) => f.debug_tuple("Platform").field(event).finish(),
            SessionMsg::Control { id, request, ack } => f
                .debug_struct("Control")
                .field("id", id)
                .field("request", &request.tag())
                .field("synchronous", &ack.is_some())
                .finish(),
            SessionMsg::Internal(event) => f.debug_tuple("Internal").field(event).finish(),
            other => f.write_str(other.tag()),
        }
    }
}

pub(crate) enum ControlRequest {
    Setup,
    Activate(ActivationCompletion),
    SetupAndActivate(ActivationCompletion),
    SetOutputMode(AudioSessionOutputMode),
}

impl ControlRequest {
    pub(crate) fn tag(&self) -> &'static str {
        match self {
            ControlRequest::Setup => "Setup",
            ControlRequest::Activate(_) => "Activate",
            ControlRequest::SetupAndActivate(_) => "SetupAndActivate",
            ControlRequest::SetOutputMode(_) => "SetOutputMode",
        }
    }
}

#[derive(Debug)]
pub(crate) enum InternalEvent {
    // Async results
    DeactivationCompleted { id: HolderId, token: u64 },
    IdleReleaseTimer { token: u64 },

    // Follow-up to an activation: refresh routes and hand the new owner the current outputs.
    DeliverOutputsAfterActivation { id: HolderId },
}
