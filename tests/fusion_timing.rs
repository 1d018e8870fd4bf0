//! Timing behavior of gesture/intent fusion.

use std::collections::BTreeMap;
use std::thread;

use spell_fusion::{FusionState, FusionStateMachine, RecognizerConfig, SharedFusion};

// =============================================================================
// FIXTURES
// =============================================================================

fn machine(window: f64) -> FusionStateMachine {
    let table = BTreeMap::from([
        ("cast_bombardo".to_string(), "triangle-gesture".to_string()),
        ("cast_protego".to_string(), "circle-gesture".to_string()),
    ]);
    FusionStateMachine::new(window, table)
}

// =============================================================================
// MATCH WINDOW
// =============================================================================

#[test]
fn test_three_second_window() {
    let mut inside = machine(3.0);
    inside.on_gesture("triangle-gesture", 0.0);
    assert!(inside.on_intent("cast_bombardo", 2.9).is_some());

    let mut outside = machine(3.0);
    outside.on_gesture("triangle-gesture", 0.0);
    assert!(outside.on_intent("cast_bombardo", 3.1).is_none());
}

#[test]
fn test_window_is_a_parameter() {
    let mut long = machine(7.0);
    long.on_gesture("triangle-gesture", 0.0);
    assert!(long.on_intent("cast_bombardo", 6.5).is_some());

    let mut short = machine(3.0);
    short.on_gesture("triangle-gesture", 0.0);
    assert!(short.on_intent("cast_bombardo", 6.5).is_none());
}

// =============================================================================
// SLOT STATE
// =============================================================================

#[test]
fn test_stale_gesture_is_superseded_by_fresh_one() {
    let mut fusion = machine(3.0);
    fusion.on_gesture("triangle-gesture", 0.0);
    assert!(fusion.on_intent("cast_bombardo", 5.0).is_none());
    assert_eq!(fusion.state(5.0), FusionState::IntentPending);

    let cast = fusion.on_gesture("triangle-gesture", 6.0).unwrap();
    assert_eq!(cast.gesture_time, 6.0);
    assert_eq!(cast.intent_time, 5.0);
}

#[test]
fn test_mismatched_pair_waits_for_next_event() {
    let mut fusion = machine(3.0);
    fusion.on_gesture("circle-gesture", 0.0);
    assert!(fusion.on_intent("cast_bombardo", 1.0).is_none());
    assert_eq!(fusion.state(1.0), FusionState::BothPending);

    // A protego intent pairs with the still-live circle.
    let cast = fusion.on_intent("cast_protego", 2.0).unwrap();
    assert_eq!(cast.spell, "cast_protego");
    assert_eq!(fusion.state(2.0), FusionState::Idle);
}

#[test]
fn test_idle_after_timeout() {
    let mut fusion = machine(3.0);
    fusion.on_intent("cast_bombardo", 0.0);
    assert_eq!(fusion.state(2.0), FusionState::IntentPending);
    assert_eq!(fusion.state(3.5), FusionState::Idle);
}

// =============================================================================
// CONCURRENCY
// =============================================================================

#[test]
fn test_concurrent_delivery_casts_at_most_once() {
    let config = RecognizerConfig::default();
    for _ in 0..50 {
        let shared = SharedFusion::new(FusionStateMachine::new(
            config.match_window_seconds,
            config.intent_to_gesture.clone(),
        ));

        let gestures = shared.clone();
        let intents = shared.clone();
        let g = thread::spawn(move || gestures.on_gesture("cast_stupefy", 1.0).is_some());
        let i = thread::spawn(move || {
            (0..3)
                .filter(|_| intents.on_intent("cast_stupefy", 1.0).is_some())
                .count()
        });

        let from_gesture = usize::from(g.join().unwrap());
        let from_intents = i.join().unwrap();
        assert_eq!(from_gesture + from_intents, 1);
    }
}
