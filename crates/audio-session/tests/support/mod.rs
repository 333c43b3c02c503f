#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use audio_session::{
    ActivationControl, AudioSessionConfig, AudioSessionHolder, AudioSessionManager,
    AudioSessionOutput, AudioSessionOutputMode, AudioSessionToken, AudioSessionType,
    DeactivationCompleter, DeactivationSignal, InMemoryPlatform, PlatformEvent,
};
use flume::Sender;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Activated(u64),
    Deactivated(u64),
    Headset(u64, bool),
    Outputs(u64, Vec<AudioSessionOutput>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stepdown {
    Immediate,
    /// Deactivation completes only when the test calls [`Fixture::complete`].
    Manual,
}

pub type OnActivate = Box<dyn FnMut(&ActivationControl) + Send>;

#[derive(Clone, Default)]
pub struct Recorder {
    log: Arc<Mutex<Vec<Event>>>,
    completers: Arc<Mutex<HashMap<u64, DeactivationCompleter>>>,
}

impl Recorder {
    pub fn events(&self) -> Vec<Event> {
        self.log.lock().unwrap().clone()
    }

    /// Only activation transitions, in order.
    pub fn transitions(&self) -> Vec<Event> {
        self.events()
            .into_iter()
            .filter(|e| matches!(e, Event::Activated(_) | Event::Deactivated(_)))
            .collect()
    }

    /// Holder that is active according to the transition log.
    pub fn active(&self) -> Option<u64> {
        let mut active = None;
        for event in self.transitions() {
            match event {
                Event::Activated(tag) => active = Some(tag),
                Event::Deactivated(tag) if active == Some(tag) => active = None,
                _ => {}
            }
        }
        active
    }

    pub fn count(&self, wanted: &Event) -> usize {
        self.events().iter().filter(|e| *e == wanted).count()
    }

    /// Tags whose manual deactivation has not been completed yet, ascending.
    pub fn pending(&self) -> Vec<u64> {
        let mut tags: Vec<u64> = self.completers.lock().unwrap().keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

pub struct RecordingHolder {
    tag: u64,
    recorder: Recorder,
    stepdown: Stepdown,
    on_activate: Option<OnActivate>,
}

impl RecordingHolder {
    pub fn new(tag: u64, recorder: &Recorder, stepdown: Stepdown) -> Self {
        Self {
            tag,
            recorder: recorder.clone(),
            stepdown,
            on_activate: None,
        }
    }

    /// Replaces the default "setup and activate right away" behavior.
    pub fn on_activate(mut self, f: impl FnMut(&ActivationControl) + Send + 'static) -> Self {
        self.on_activate = Some(Box::new(f));
        self
    }
}

impl AudioSessionHolder for RecordingHolder {
    fn activate(&mut self, control: ActivationControl) {
        self.recorder
            .log
            .lock()
            .unwrap()
            .push(Event::Activated(self.tag));
        match self.on_activate.as_mut() {
            Some(f) => f(&control),
            None => control.setup_and_activate(false, |_| {}),
        }
    }

    fn deactivate(&mut self) -> DeactivationSignal {
        self.recorder
            .log
            .lock()
            .unwrap()
            .push(Event::Deactivated(self.tag));
        match self.stepdown {
            Stepdown::Immediate => DeactivationSignal::completed(),
            Stepdown::Manual => {
                let (completer, signal) = DeactivationSignal::pending();
                self.recorder
                    .completers
                    .lock()
                    .unwrap()
                    .insert(self.tag, completer);
                signal
            }
        }
    }

    fn headset_changed(&mut self, connected: bool) {
        self.recorder
            .log
            .lock()
            .unwrap()
            .push(Event::Headset(self.tag, connected));
    }

    fn available_outputs_changed(
        &mut self,
        outputs: &[AudioSessionOutput],
        _current: Option<&AudioSessionOutput>,
    ) {
        self.recorder
            .log
            .lock()
            .unwrap()
            .push(Event::Outputs(self.tag, outputs.to_vec()));
    }
}

pub struct Fixture {
    pub manager: AudioSessionManager,
    pub platform: Arc<InMemoryPlatform>,
    pub platform_events: Sender<PlatformEvent>,
    pub recorder: Recorder,
}

impl Fixture {
    /// Idle release far enough out that it never fires unless a test waits for it.
    pub fn new() -> Self {
        Self::with_config(AudioSessionConfig {
            idle_release_delay_ms: 60_000,
            ..AudioSessionConfig::default()
        })
    }

    pub fn with_config(config: AudioSessionConfig) -> Self {
        Self::with_platform(InMemoryPlatform::new(), config)
    }

    pub fn with_platform(platform: InMemoryPlatform, config: AudioSessionConfig) -> Self {
        let platform = Arc::new(platform);
        let (platform_events, events_rx) = flume::unbounded();
        let manager = AudioSessionManager::new(platform.clone(), events_rx, config)
            .expect("start audio session manager");
        Self {
            manager,
            platform,
            platform_events,
            recorder: Recorder::default(),
        }
    }

    pub fn push(&self, tag: u64, session_type: AudioSessionType) -> AudioSessionToken {
        self.push_holder(
            session_type,
            false,
            RecordingHolder::new(tag, &self.recorder, Stepdown::Immediate),
        )
    }

    pub fn push_manual(&self, tag: u64, session_type: AudioSessionType) -> AudioSessionToken {
        self.push_holder(
            session_type,
            false,
            RecordingHolder::new(tag, &self.recorder, Stepdown::Manual),
        )
    }

    pub fn push_holder(
        &self,
        session_type: AudioSessionType,
        once: bool,
        holder: RecordingHolder,
    ) -> AudioSessionToken {
        let token = self
            .manager
            .push(session_type, AudioSessionOutputMode::System, once, holder);
        self.manager.sync();
        token
    }

    /// Completes the pending deactivation of `tag`.
    pub fn complete(&self, tag: u64) {
        let completer = self
            .recorder
            .completers
            .lock()
            .unwrap()
            .remove(&tag)
            .unwrap_or_else(|| panic!("no pending deactivation for holder {tag}"));
        completer.complete();
    }

    pub fn send_platform_event(&self, event: PlatformEvent) {
        self.platform_events.send(event).expect("platform events open");
    }

    /// Polls `done` (after flushing the session queue) until it holds or two seconds pass.
    pub fn wait_until(&self, done: impl Fn(&Self) -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(2);
        loop {
            self.manager.sync();
            if done(self) {
                return true;
            }
            if Instant::now() >= deadline {
                return false;
            }
            std::thread::sleep(Duration::from_millis(5));
        }
    }
}
