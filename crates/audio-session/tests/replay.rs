use std::collections::HashSet;
use std::time::Duration;

use audio_session::{AudioSessionToken, AudioSessionType};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

#[path = "support/mod.rs"]
mod support;

use support::{Event, Fixture, RecordingHolder, Stepdown};

const SEEDS: [u64; 6] = [1, 7, 42, 1_337, 9_001, 0xDEAD_BEEF];
const STEPS: usize = 60;

fn random_type(rng: &mut StdRng) -> AudioSessionType {
    match rng.gen_range(0..4) {
        0 => AudioSessionType::Playback,
        1 => AudioSessionType::PlaybackWithPossiblePortOverride,
        2 => AudioSessionType::Record {
            speaker_preferred: rng.gen_bool(0.5),
        },
        _ => AudioSessionType::VoiceCall,
    }
}

/// Drives the manager with a random mix of pushes, cancellations and interruptions and
/// returns the transition log. With `manual_stepdowns`, some holders finish deactivating
/// only when a later step completes them, so interruptions also land mid-deactivation.
fn run(seed: u64, manual_stepdowns: bool) -> Vec<Event> {
    let mut rng = StdRng::seed_from_u64(seed);
    let fx = Fixture::new();
    let mut live: Vec<AudioSessionToken> = Vec::new();
    let mut next_tag = 1u64;

    for _ in 0..STEPS {
        match rng.gen_range(0..10) {
            0..=3 => {
                let session_type = random_type(&mut rng);
                let once = rng.gen_bool(0.2);
                let stepdown = if manual_stepdowns && rng.gen_bool(0.4) {
                    Stepdown::Manual
                } else {
                    Stepdown::Immediate
                };
                let holder = RecordingHolder::new(next_tag, &fx.recorder, stepdown);
                next_tag += 1;
                live.push(fx.push_holder(session_type, once, holder));
            }
            4..=6 if !live.is_empty() => {
                let index = rng.gen_range(0..live.len());
                live.swap_remove(index).cancel();
            }
            7 if !fx.recorder.pending().is_empty() => {
                let pending = fx.recorder.pending();
                fx.complete(pending[rng.gen_range(0..pending.len())]);
            }
            _ => fx.manager.drop_all(),
        }
        fx.manager.sync();
        assert_single_active(&fx.recorder.transitions(), seed);
    }

    if manual_stepdowns {
        for tag in fx.recorder.pending() {
            fx.complete(tag);
        }
        std::thread::sleep(Duration::from_millis(50));
        fx.manager.sync();
        assert_single_active(&fx.recorder.transitions(), seed);
    }
    fx.recorder.transitions()
}

fn assert_single_active(log: &[Event], seed: u64) {
    let mut active = HashSet::new();
    for (step, event) in log.iter().enumerate() {
        match event {
            Event::Activated(tag) => {
                assert!(
                    active.is_empty(),
                    "seed {seed}: holder {tag} activated at {step} while {active:?} active"
                );
                active.insert(*tag);
            }
            Event::Deactivated(tag) => {
                assert!(
                    active.remove(tag),
                    "seed {seed}: holder {tag} deactivated at {step} without being active"
                );
            }
            _ => {}
        }
    }
}

#[test]
fn at_most_one_holder_is_ever_active() {
    for seed in SEEDS {
        run(seed, false);
    }
}

#[test]
fn at_most_one_holder_is_active_with_interruptions_mid_deactivation() {
    for seed in SEEDS {
        run(seed, true);
    }
}

#[test]
fn same_event_order_gives_same_transitions() {
    for seed in SEEDS {
        assert_eq!(
            run(seed, false),
            run(seed, false),
            "seed {seed} diverged between runs"
        );
    }
}
