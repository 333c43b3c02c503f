use crate::platform::{AudioRoute, PortDescription, PortType};
use crate::types::{AudioSessionOutput, AudioSessionOutputMode, AudioSessionPort, AudioSessionPortKind};

use super::AudioSessionCore;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(super) struct RouteSnapshot {
    pub(super) available_outputs: Vec<AudioSessionOutput>,
    pub(super) current_output: Option<AudioSessionOutput>,
}

pub(super) fn headset_plugged_in(route: &AudioRoute) -> bool {
    route
        .outputs
        .iter()
        .any(|output| output.port_type.is_headset_output())
}

fn port_output(input: &PortDescription) -> AudioSessionOutput {
    let kind = if input.port_type.is_bluetooth() {
        AudioSessionPortKind::Bluetooth
    } else {
        AudioSessionPortKind::Generic
    };
    AudioSessionOutput::Port(AudioSessionPort {
        uid: input.uid.clone(),
        name: input.name.clone(),
        kind,
    })
}

/// Outputs are listed as builtin, headphones, speaker, then every other input in
/// enumeration order. Without an input list only the active output is known.
pub(super) fn compute_route_snapshot(
    route: &AudioRoute,
    available_inputs: Option<&[PortDescription]>,
    has_loudspeaker: bool,
) -> RouteSnapshot {
    let mut current = AudioSessionOutput::Builtin;
    let Some(inputs) = available_inputs else {
        return RouteSnapshot {
            available_outputs: Vec::new(),
            current_output: Some(current),
        };
    };

    let mut ports = Vec::new();
    let mut has_headphones = false;
    for input in inputs {
        let is_active = route.inputs.iter().any(|active| active.uid == input.uid);
        match input.port_type {
            PortType::BuiltInMic => {
                if is_active {
                    let to_speaker = route
                        .outputs
                        .iter()
                        .any(|output| output.port_type == PortType::BuiltInSpeaker);
                    current = if to_speaker {
                        AudioSessionOutput::Speaker
                    } else {
                        AudioSessionOutput::Builtin
                    };
                }
            }
            PortType::Headphones | PortType::HeadsetMic => {
                has_headphones = true;
                if is_active {
                    current = AudioSessionOutput::Headphones;
                }
            }
            _ => {
                let output = port_output(input);
                if is_active {
                    current = output.clone();
                }
                ports.push(output);
            }
        }
    }

    let mut available_outputs = vec![AudioSessionOutput::Builtin];
    if has_headphones {
        available_outputs.push(AudioSessionOutput::Headphones);
    }
    if has_loudspeaker {
        available_outputs.push(AudioSessionOutput::Speaker);
    }
    available_outputs.extend(ports);

    RouteSnapshot {
        available_outputs,
        current_output: Some(current),
    }
}

impl AudioSessionCore {
    /// Re-reads the platform route and notifies the active holder of anything that moved.
    pub(super) fn refresh_route(&mut self) {
        let route = self.platform.current_route();

        let headset = headset_plugged_in(&route);
        if headset != self.headset_connected {
            tracing::info!(headset_connected = headset, "audio route headset changed");
            self.headset_connected = headset;
            if matches!(
                self.current,
                Some((_, AudioSessionOutputMode::SpeakerIfNoHeadphones))
            ) {
                if let Err(err) = self.apply_output_mode() {
                    tracing::warn!(%err, "audio session re-route after headset change failed");
                }
            }
            self.headset_bus.publish(headset);
            if let Some(index) = self.active_index() {
                self.holders[index].behavior.headset_changed(headset);
            }
        }

        let inputs = self.platform.available_inputs();
        let snapshot = compute_route_snapshot(&route, inputs.as_deref(), self.has_loudspeaker);
        if snapshot != self.route {
            tracing::debug!(
                outputs = snapshot.available_outputs.len(),
                current = ?snapshot.current_output,
                "audio route outputs changed"
            );
            self.route = snapshot;
            if let Some(index) = self.active_index() {
                self.holders[index].behavior.available_outputs_changed(
                    &self.route.available_outputs,
                    self.route.current_output.as_ref(),
                );
            }
        }
    }
}
