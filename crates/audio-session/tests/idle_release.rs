use std::time::{Duration, Instant};

use audio_session::{
    AudioSessionConfig, AudioSessionOutputMode, AudioSessionType, DeactivationSignal,
    OutputOverride, PlatformCall, PlatformError, PlatformOperation,
};

#[path = "support/mod.rs"]
mod support;

use support::Fixture;

fn releases(calls: &[PlatformCall]) -> usize {
    calls
        .iter()
        .filter(|call| **call == PlatformCall::SetActive(false))
        .count()
}

#[test]
fn playback_keeps_hardware_for_the_default_grace_period() {
    let fx = Fixture::with_config(AudioSessionConfig::default());
    let is_active = fx.manager.is_active();
    let token = fx.push(1, AudioSessionType::Playback);
    assert_eq!(is_active.drain(), vec![false, true]);

    let released_at = Instant::now();
    drop(token);
    fx.manager.sync();

    std::thread::sleep(Duration::from_millis(300));
    assert!(is_active.drain().is_empty(), "released before the grace period");
    assert_eq!(releases(&fx.platform.calls()), 0);

    assert_eq!(is_active.recv_timeout(Duration::from_secs(3)), Ok(false));
    assert!(released_at.elapsed() >= Duration::from_millis(900));
    assert_eq!(releases(&fx.platform.calls()), 1);
}

#[test]
fn new_activation_cancels_pending_release() {
    let fx = Fixture::with_config(AudioSessionConfig {
        idle_release_delay_ms: 100,
        ..AudioSessionConfig::default()
    });
    drop(fx.push(1, AudioSessionType::Playback));
    fx.manager.sync();
    let _second = fx.push(2, AudioSessionType::Playback);

    std::thread::sleep(Duration::from_millis(300));
    fx.manager.sync();
    assert_eq!(releases(&fx.platform.calls()), 0);
}

#[test]
fn voice_call_releases_immediately() {
    let fx = Fixture::new();
    let is_active = fx.manager.is_active();
    let call = fx.push(1, AudioSessionType::VoiceCall);
    fx.platform.take_calls();

    call.cancel();
    fx.manager.sync();

    assert_eq!(is_active.drain(), vec![false, true, false]);
    assert_eq!(
        fx.platform.take_calls(),
        vec![
            PlatformCall::SetActive(false),
            PlatformCall::OverrideOutputPort(OutputOverride::None),
            PlatformCall::SetPreferredInput(None),
        ]
    );
}

#[test]
fn recording_releases_immediately() {
    let fx = Fixture::new();
    let recording = fx.push(
        1,
        AudioSessionType::Record {
            speaker_preferred: false,
        },
    );
    recording.cancel();
    fx.manager.sync();

    assert_eq!(releases(&fx.platform.calls()), 1);
}

#[test]
fn hardware_failures_do_not_stop_arbitration() {
    let fx = Fixture::new();
    fx.platform.fail(
        PlatformOperation::SetActive,
        PlatformError::hardware("set_active", "device unavailable"),
    );

    let is_active = fx.manager.is_active();
    let call = fx.push(1, AudioSessionType::VoiceCall);
    assert_eq!(fx.recorder.active(), Some(1));

    call.cancel();
    fx.manager.sync();
    // Release still clears the logical session even though the hardware refused.
    assert_eq!(is_active.drain(), vec![false, true, false]);
}

#[test]
fn push_auto_activates_and_reports_state() {
    let fx = Fixture::new();
    let (state_tx, state_rx) = flume::unbounded();
    let _token = fx.manager.push_auto(
        AudioSessionType::Playback,
        AudioSessionOutputMode::System,
        false,
        move |state| {
            let _ = state_tx.send(state);
        },
        DeactivationSignal::completed,
    );

    let state = state_rx
        .recv_timeout(Duration::from_secs(2))
        .expect("activation state");
    assert!(!state.is_headset_connected);
    assert!(fx.platform.calls().contains(&PlatformCall::SetActive(true)));
}

#[test]
fn shutdown_releases_claimed_hardware() {
    let fx = Fixture::new();
    let token = fx.push(1, AudioSessionType::Playback);
    let platform = fx.platform.clone();
    drop(token);
    drop(fx);

    let deadline = Instant::now() + Duration::from_secs(2);
    while releases(&platform.calls()) == 0 {
        assert!(Instant::now() < deadline, "hardware never released on shutdown");
        std::thread::sleep(Duration::from_millis(5));
    }
}
