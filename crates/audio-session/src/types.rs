use std::fmt::{Display, Formatter};

/// Identifies a holder inside the session registry. Allocated monotonically, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderId(pub u64);

impl Display for HolderId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "holder#{}", self.0)
    }
}

/// What a holder wants the hardware session configured for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AudioSessionType {
    Playback,
    /// Playback that may be rerouted (e.g. voice messages held to the ear).
    PlaybackWithPossiblePortOverride,
    Record {
        speaker_preferred: bool,
    },
    VoiceCall,
}

impl AudioSessionType {
    pub fn is_playback(self) -> bool {
        matches!(
            self,
            AudioSessionType::Playback | AudioSessionType::PlaybackWithPossiblePortOverride
        )
    }

    /// Types that release the hardware right away once nothing holds the session.
    pub fn releases_immediately(self) -> bool {
        matches!(
            self,
            AudioSessionType::VoiceCall | AudioSessionType::Record { .. }
        )
    }

    /// Log-safe tag.
    pub fn tag(self) -> &'static str {
        match self {
            AudioSessionType::Playback => "playback",
            AudioSessionType::PlaybackWithPossiblePortOverride => "playback_port_override",
            AudioSessionType::Record { .. } => "record",
            AudioSessionType::VoiceCall => "voice_call",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioSessionPortKind {
    Generic,
    Bluetooth,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AudioSessionPort {
    /// Platform uid of the input backing this output.
    pub uid: String,
    pub name: String,
    pub kind: AudioSessionPortKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AudioSessionOutput {
    Builtin,
    Speaker,
    Headphones,
    Port(AudioSessionPort),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AudioSessionOutputMode {
    #[default]
    System,
    SpeakerIfNoHeadphones,
    Custom(AudioSessionOutput),
}

/// Handed to a holder once the hardware has been activated on its behalf.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActivationState {
    pub is_headset_connected: bool,
}
