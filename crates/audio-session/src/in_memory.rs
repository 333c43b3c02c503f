use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::error::PlatformError;
use crate::platform::{
    AudioPlatform, AudioRoute, CategoryOptions, OutputOverride, PortDescription, PortType,
    SessionCategory, SessionMode,
};

/// One recorded hardware call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    SetCategory {
        category: SessionCategory,
        mode: SessionMode,
        options: CategoryOptions,
    },
    SetActive(bool),
    OverrideOutputPort(OutputOverride),
    SetPreferredInput(Option<String>),
    SetPreferredIoBufferDuration(Duration),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlatformOperation {
    SetCategory,
    SetActive,
    OverrideOutputPort,
    SetPreferredInput,
    SetPreferredIoBufferDuration,
}

impl PlatformCall {
    pub fn operation(&self) -> PlatformOperation {
        match self {
            PlatformCall::SetCategory { .. } => PlatformOperation::SetCategory,
            PlatformCall::SetActive(_) => PlatformOperation::SetActive,
            PlatformCall::OverrideOutputPort(_) => PlatformOperation::OverrideOutputPort,
            PlatformCall::SetPreferredInput(_) => PlatformOperation::SetPreferredInput,
            PlatformCall::SetPreferredIoBufferDuration(_) => {
                PlatformOperation::SetPreferredIoBufferDuration
            }
        }
    }
}

#[derive(Debug, Default)]
struct PlatformState {
    calls: Vec<PlatformCall>,
    route: AudioRoute,
    available_inputs: Option<Vec<PortDescription>>,
    has_loudspeaker: bool,
    failures: HashMap<PlatformOperation, PlatformError>,
}

/// Audio platform that keeps everything in memory: records every hardware call and serves
/// whatever route the owner configured. Failed calls are recorded too.
#[derive(Debug)]
pub struct InMemoryPlatform {
    state: Mutex<PlatformState>,
}

impl Default for InMemoryPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryPlatform {
    /// A phone-like device: loudspeaker present, built-in mic as the only input.
    pub fn new() -> Self {
        let mic = PortDescription::new(
            "builtin-mic",
            "Built-In Microphone",
            PortType::BuiltInMic,
        );
        Self {
            state: Mutex::new(PlatformState {
                route: AudioRoute {
                    inputs: vec![mic.clone()],
                    outputs: vec![PortDescription::new(
                        "builtin-receiver",
                        "Receiver",
                        PortType::BuiltInReceiver,
                    )],
                },
                available_inputs: Some(vec![mic]),
                has_loudspeaker: true,
                ..PlatformState::default()
            }),
        }
    }

    pub fn set_route(&self, route: AudioRoute) {
        self.state().route = route;
    }

    pub fn set_available_inputs(&self, inputs: Option<Vec<PortDescription>>) {
        self.state().available_inputs = inputs;
    }

    pub fn set_has_loudspeaker(&self, has_loudspeaker: bool) {
        self.state().has_loudspeaker = has_loudspeaker;
    }

    /// Makes every later call of `operation` fail with `error` until cleared.
    pub fn fail(&self, operation: PlatformOperation, error: PlatformError) {
        self.state().failures.insert(operation, error);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.state().calls.clone()
    }

    /// Returns and forgets the calls recorded so far.
    pub fn take_calls(&self) -> Vec<PlatformCall> {
        std::mem::take(&mut self.state().calls)
    }

    fn state(&self) -> MutexGuard<'_, PlatformState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, call: PlatformCall) -> Result<(), PlatformError> {
        let mut state = self.state();
        let failure = state.failures.get(&call.operation()).cloned();
        state.calls.push(call);
        match failure {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl AudioPlatform for InMemoryPlatform {
    fn set_category(
        &self,
        category: SessionCategory,
        mode: SessionMode,
        options: CategoryOptions,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::SetCategory {
            category,
            mode,
            options,
        })
    }

    fn set_active(&self, active: bool) -> Result<(), PlatformError> {
        self.record(PlatformCall::SetActive(active))
    }

    fn override_output_port(&self, port: OutputOverride) -> Result<(), PlatformError> {
        self.record(PlatformCall::OverrideOutputPort(port))
    }

    fn set_preferred_input(&self, uid: Option<&str>) -> Result<(), PlatformError> {
        self.record(PlatformCall::SetPreferredInput(uid.map(str::to_string)))
    }

    fn set_preferred_io_buffer_duration(&self, duration: Duration) -> Result<(), PlatformError> {
        self.record(PlatformCall::SetPreferredIoBufferDuration(duration))
    }

    fn current_route(&self) -> AudioRoute {
        self.state().route.clone()
    }

    fn available_inputs(&self) -> Option<Vec<PortDescription>> {
        self.state().available_inputs.clone()
    }

    fn has_loudspeaker(&self) -> bool {
        self.state().has_loudspeaker
    }
}
