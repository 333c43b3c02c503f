use crate::error::PlatformError;
use crate::messages::ControlRequest;
use crate::platform::{
    CategoryOptions, OutputOverride, PortDescription, PortType, SessionCategory, SessionMode,
};
use crate::types::{
    ActivationState, AudioSessionOutput, AudioSessionOutputMode, AudioSessionType, HolderId,
};

use super::AudioSessionCore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct HardwareConfig {
    pub(super) category: SessionCategory,
    pub(super) mode: SessionMode,
    pub(super) options: CategoryOptions,
}

pub(super) fn hardware_config_for(
    session_type: AudioSessionType,
    headset_connected: bool,
) -> HardwareConfig {
    let category = match session_type {
        AudioSessionType::Playback => SessionCategory::Playback,
        AudioSessionType::PlaybackWithPossiblePortOverride if headset_connected => {
            SessionCategory::Playback
        }
        AudioSessionType::PlaybackWithPossiblePortOverride
        | AudioSessionType::Record { .. }
        | AudioSessionType::VoiceCall => SessionCategory::PlayAndRecord,
    };
    let mode = if session_type == AudioSessionType::VoiceCall {
        SessionMode::VoiceChat
    } else {
        SessionMode::Default
    };
    let options = match session_type {
        AudioSessionType::Playback => CategoryOptions::default(),
        AudioSessionType::PlaybackWithPossiblePortOverride => CategoryOptions {
            allow_bluetooth_a2dp: true,
            ..CategoryOptions::default()
        },
        AudioSessionType::Record { .. } | AudioSessionType::VoiceCall => CategoryOptions {
            allow_bluetooth: true,
            ..CategoryOptions::default()
        },
    };
    HardwareConfig {
        category,
        mode,
        options,
    }
}

impl AudioSessionCore {
    pub(super) fn handle_control(&mut self, id: HolderId, request: ControlRequest) {
        let Some(index) = self.index_of(id) else {
            tracing::debug!(holder_id = id.0, request = request.tag(), "control for unknown holder");
            return;
        };
        let session_type = self.holders[index].session_type;
        let active = self.holders[index].active;
        let tag = request.tag();

        match request {
            ControlRequest::SetOutputMode(mode) => {
                self.holders[index].output_mode = mode.clone();
                if active {
                    self.update_output_mode(mode);
                }
            }
            _ if !active => {
                tracing::debug!(holder_id = id.0, request = tag, "control from inactive holder dropped");
            }
            ControlRequest::Setup => {
                let mode = self.holders[index].output_mode.clone();
                self.setup(session_type, mode, false);
            }
            ControlRequest::Activate(completion) => {
                self.activate_hardware();
                completion(self.activation_state());
            }
            ControlRequest::SetupAndActivate(completion) => {
                let mode = self.holders[index].output_mode.clone();
                self.setup(session_type, mode, true);
                completion(self.activation_state());
            }
        }
    }

    fn activation_state(&self) -> ActivationState {
        ActivationState {
            is_headset_connected: self.headset_connected,
        }
    }

    fn setup(
        &mut self,
        session_type: AudioSessionType,
        output_mode: AudioSessionOutputMode,
        activate_now: bool,
    ) {
        self.cancel_idle_release();
        let was_active = self.current.is_some();
        let was_playback = self.is_playback_active();

        let next = (session_type, output_mode);
        if self.current.as_ref() != Some(&next) {
            self.current = Some(next);
            let config = hardware_config_for(session_type, self.headset_connected);
            tracing::debug!(
                session_type = session_type.tag(),
                category = ?config.category,
                mode = ?config.mode,
                "configuring audio session category"
            );
            if let Err(err) =
                self.platform
                    .set_category(config.category, config.mode, config.options)
            {
                tracing::warn!(session_type = session_type.tag(), %err, "audio session setup failed");
            }
        }

        self.publish_activity(was_active, was_playback);

        if activate_now {
            self.activate_hardware();
        }
    }

    fn activate_hardware(&mut self) {
        let Some((session_type, _)) = self.current else {
            tracing::debug!("activation requested before any setup");
            return;
        };
        if let Err(err) = self.try_activate_hardware(session_type) {
            tracing::warn!(session_type = session_type.tag(), %err, "audio session activation failed");
        }
    }

    fn try_activate_hardware(&mut self, session_type: AudioSessionType) -> Result<(), PlatformError> {
        self.platform.set_active(true)?;
        self.refresh_route();
        self.apply_output_mode()?;
        if session_type == AudioSessionType::VoiceCall {
            self.platform
                .set_preferred_io_buffer_duration(self.config.voice_call_io_buffer())?;
        }
        Ok(())
    }

    /// No-op when `mode` is already in effect.
    fn update_output_mode(&mut self, mode: AudioSessionOutputMode) {
        let Some((_, current_mode)) = self.current.as_mut() else {
            return;
        };
        if *current_mode == mode {
            return;
        }
        *current_mode = mode;
        if let Err(err) = self.apply_output_mode() {
            tracing::warn!(%err, "audio output override failed");
        }
    }

    pub(super) fn apply_output_mode(&self) -> Result<(), PlatformError> {
        let Some((session_type, mode)) = &self.current else {
            return Ok(());
        };
        let session_type = *session_type;
        tracing::debug!(session_type = session_type.tag(), ?mode, "applying audio output mode");

        match mode {
            AudioSessionOutputMode::System
            | AudioSessionOutputMode::Custom(AudioSessionOutput::Builtin) => {
                self.reset_to_builtin(session_type)
            }
            AudioSessionOutputMode::Custom(AudioSessionOutput::Speaker) => {
                if session_type == AudioSessionType::VoiceCall {
                    self.prefer_input(|input| input.port_type == PortType::BuiltInMic);
                }
                self.platform.override_output_port(OutputOverride::Speaker)
            }
            AudioSessionOutputMode::Custom(AudioSessionOutput::Headphones) => Ok(()),
            AudioSessionOutputMode::Custom(AudioSessionOutput::Port(port)) => {
                self.platform.override_output_port(OutputOverride::None)?;
                self.prefer_input(|input| input.uid == port.uid);
                Ok(())
            }
            AudioSessionOutputMode::SpeakerIfNoHeadphones => {
                let port = if self.headset_connected {
                    OutputOverride::None
                } else {
                    OutputOverride::Speaker
                };
                self.platform.override_output_port(port)
            }
        }
    }

    fn reset_to_builtin(&self, session_type: AudioSessionType) -> Result<(), PlatformError> {
        match session_type {
            AudioSessionType::Record {
                speaker_preferred: false,
            } => self.platform.override_output_port(OutputOverride::Speaker),
            AudioSessionType::VoiceCall
            | AudioSessionType::PlaybackWithPossiblePortOverride
            | AudioSessionType::Record {
                speaker_preferred: true,
            } => {
                self.platform.override_output_port(OutputOverride::None)?;
                // Recording keeps the headset mic when one is plugged in.
                let keep_headset_mic =
                    matches!(session_type, AudioSessionType::Record { .. }) && self.headset_connected;
                if !keep_headset_mic {
                    self.prefer_input(|input| input.port_type == PortType::BuiltInMic);
                }
                Ok(())
            }
            AudioSessionType::Playback => self.platform.override_output_port(OutputOverride::None),
        }
    }

    fn prefer_input(&self, wanted: impl Fn(&PortDescription) -> bool) {
        let Some(inputs) = self.platform.available_inputs() else {
            return;
        };
        let Some(input) = inputs.iter().find(|&input| wanted(input)) else {
            return;
        };
        if let Err(err) = self.platform.set_preferred_input(Some(&input.uid)) {
            tracing::debug!(uid = %input.uid, %err, "preferred input rejected");
        }
    }
}
