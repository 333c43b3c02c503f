// Platform boundary: everything the registry needs from the OS audio stack.

use std::time::Duration;

use crate::error::PlatformError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortType {
    BuiltInMic,
    BuiltInSpeaker,
    BuiltInReceiver,
    Headphones,
    HeadsetMic,
    BluetoothA2dp,
    BluetoothLe,
    BluetoothHfp,
    Other(String),
}

impl PortType {
    pub fn is_bluetooth(&self) -> bool {
        matches!(
            self,
            PortType::BluetoothA2dp | PortType::BluetoothLe | PortType::BluetoothHfp
        )
    }

    /// Output port types that count as "a headset is connected".
    pub fn is_headset_output(&self) -> bool {
        matches!(
            self,
            PortType::Headphones | PortType::BluetoothA2dp | PortType::BluetoothHfp
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortDescription {
    pub uid: String,
    pub name: String,
    pub port_type: PortType,
}

impl PortDescription {
    pub fn new(uid: impl Into<String>, name: impl Into<String>, port_type: PortType) -> Self {
        Self {
            uid: uid.into(),
            name: name.into(),
            port_type,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AudioRoute {
    pub inputs: Vec<PortDescription>,
    pub outputs: Vec<PortDescription>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionCategory {
    Playback,
    PlayAndRecord,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionMode {
    Default,
    VoiceChat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CategoryOptions {
    pub allow_bluetooth: bool,
    pub allow_bluetooth_a2dp: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputOverride {
    None,
    Speaker,
}

/// Notifications the platform posts into the session queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformEvent {
    RouteChanged,
    InterruptionBegan,
    InterruptionEnded,
}

/// Primitive hardware operations. Implementations must be callable from the session thread;
/// they are never called concurrently.
pub trait AudioPlatform: Send + Sync + 'static {
    fn set_category(
        &self,
        category: SessionCategory,
        mode: SessionMode,
        options: CategoryOptions,
    ) -> Result<(), PlatformError>;

    fn set_active(&self, active: bool) -> Result<(), PlatformError>;

    fn override_output_port(&self, port: OutputOverride) -> Result<(), PlatformError>;

    /// `None` clears the preference.
    fn set_preferred_input(&self, uid: Option<&str>) -> Result<(), PlatformError>;

    fn set_preferred_io_buffer_duration(&self, duration: Duration) -> Result<(), PlatformError>;

    fn current_route(&self) -> AudioRoute;

    /// `None` when the platform cannot enumerate inputs (e.g. session not configured yet).
    fn available_inputs(&self) -> Option<Vec<PortDescription>>;

    fn has_loudspeaker(&self) -> bool;
}
