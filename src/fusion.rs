//! Time-windowed fusion of gesture and intent labels.
//!
//! [`FusionStateMachine`] keeps the newest gesture and the newest intent in
//! two slots. After every event it checks whether both slots are inside the
//! window and whether the intent's required gesture equals the stored
//! gesture. A match emits one [`CastDecision`] and clears both slots, so the
//! same pair can never fire twice.
//!
//! Stale slots are not removed proactively; the timestamp check ignores them.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, info};

/// A label received at a point in time.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingEvent {
    pub label: String,
    pub timestamp: f64,
}

/// A recognized speech intent delivered by the external recognizer.
///
/// Confidence has already passed the recognizer's own threshold; fusion only
/// carries it along for logging.
#[derive(Debug, Clone, PartialEq)]
pub struct IntentEvent {
    pub label: String,
    pub confidence: f32,
    pub timestamp: f64,
}

impl IntentEvent {
    #[must_use]
    pub fn new(label: impl Into<String>, confidence: f32, timestamp: f64) -> Self {
        Self {
            label: label.into(),
            confidence,
            timestamp,
        }
    }
}

/// Decision to cast a spell, emitted once per successful match.
#[derive(Debug, Clone, PartialEq)]
pub struct CastDecision {
    /// Spell identifier (the intent label).
    pub spell: String,
    /// Gesture label that completed the match.
    pub gesture: String,
    /// When the gesture was recognized.
    pub gesture_time: f64,
    /// When the intent was recognized.
    pub intent_time: f64,
    /// When the match happened.
    pub cast_time: f64,
}

/// Observable state of the fusion slots at a given time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FusionState {
    /// No live slot.
    Idle,
    /// A live gesture waits for its intent.
    GesturePending,
    /// A live intent waits for its gesture.
    IntentPending,
    /// Both slots are live but do not correspond.
    BothPending,
}

/// Pairs gesture and intent labels inside a validity window.
///
/// # Example
///
/// ```
/// use spell_fusion::FusionStateMachine;
///
/// let mut fusion = FusionStateMachine::with_default_table(3.0);
///
/// assert!(fusion.on_gesture("cast_bombardo", 10.0).is_none());
/// let cast = fusion.on_intent("cast_bombardo", 11.5).unwrap();
/// assert_eq!(cast.spell, "cast_bombardo");
///
/// // Both slots were consumed.
/// assert!(fusion.on_intent("cast_bombardo", 11.6).is_none());
/// ```
#[derive(Debug, Clone)]
pub struct FusionStateMachine {
    /// Validity window in seconds.
    window: f64,

    /// Intent label -> required gesture label.
    table: BTreeMap<String, String>,

    gesture: Option<PendingEvent>,
    intent: Option<PendingEvent>,
}

impl FusionStateMachine {
    /// Create a state machine.
    ///
    /// # Arguments
    ///
    /// * `window` - Seconds an event stays eligible for matching
    /// * `table` - Intent label -> required gesture label
    #[must_use]
    pub fn new(window: f64, table: BTreeMap<String, String>) -> Self {
        Self {
            window,
            table,
            gesture: None,
            intent: None,
        }
    }

    /// State machine using the default five-spell table.
    #[must_use]
    pub fn with_default_table(window: f64) -> Self {
        Self::new(window, crate::config::default_intent_table())
    }

    /// Record a recognized gesture, replacing any unconsumed one.
    pub fn on_gesture(&mut self, label: impl Into<String>, now: f64) -> Option<CastDecision> {
        let label = label.into();
        debug!(gesture = %label, at = now, "gesture received");
        self.gesture = Some(PendingEvent {
            label,
            timestamp: now,
        });
        self.try_match(now)
    }

    /// Record a recognized intent, replacing any unconsumed one.
    pub fn on_intent(&mut self, label: impl Into<String>, now: f64) -> Option<CastDecision> {
        let label = label.into();
        debug!(intent = %label, at = now, "intent received");
        self.intent = Some(PendingEvent {
            label,
            timestamp: now,
        });
        self.try_match(now)
    }

    /// Record an intent event using its own timestamp.
    pub fn on_intent_event(&mut self, event: &IntentEvent) -> Option<CastDecision> {
        debug!(intent = %event.label, confidence = event.confidence, "intent event");
        self.on_intent(event.label.clone(), event.timestamp)
    }

    fn try_match(&mut self, now: f64) -> Option<CastDecision> {
        let (Some(gesture), Some(intent)) = (&self.gesture, &self.intent) else {
            return None;
        };

        if !self.is_live(gesture, now) || !self.is_live(intent, now) {
            debug!(
                gesture_age = now - gesture.timestamp,
                intent_age = now - intent.timestamp,
                window = self.window,
                "fusion window expired"
            );
            return None;
        }

        let Some(required) = self.table.get(&intent.label) else {
            debug!(intent = %intent.label, "intent has no gesture mapping");
            return None;
        };

        if *required != gesture.label {
            debug!(
                gesture = %gesture.label,
                required = %required,
                intent = %intent.label,
                "gesture does not match intent"
            );
            return None;
        }

        let decision = CastDecision {
            spell: intent.label.clone(),
            gesture: gesture.label.clone(),
            gesture_time: gesture.timestamp,
            intent_time: intent.timestamp,
            cast_time: now,
        };
        self.gesture = None;
        self.intent = None;

        info!(spell = %decision.spell, at = now, "spell cast");
        Some(decision)
    }

    fn is_live(&self, event: &PendingEvent, now: f64) -> bool {
        now - event.timestamp <= self.window
    }

    /// State as seen at `now`; slots older than the window count as empty.
    #[must_use]
    pub fn state(&self, now: f64) -> FusionState {
        let gesture = self.gesture.as_ref().is_some_and(|e| self.is_live(e, now));
        let intent = self.intent.as_ref().is_some_and(|e| self.is_live(e, now));
        match (gesture, intent) {
            (false, false) => FusionState::Idle,
            (true, false) => FusionState::GesturePending,
            (false, true) => FusionState::IntentPending,
            (true, true) => FusionState::BothPending,
        }
    }

    /// Drop slots older than the window. Matching behaves the same whether
    /// or not the host calls this.
    pub fn expire(&mut self, now: f64) {
        let window = self.window;
        let stale = |slot: &Option<PendingEvent>| {
            slot.as_ref().is_some_and(|e| now - e.timestamp > window)
        };
        if stale(&self.gesture) {
            debug!("gesture slot expired");
            self.gesture = None;
        }
        if stale(&self.intent) {
            debug!("intent slot expired");
            self.intent = None;
        }
    }

    /// Clear both slots.
    pub fn reset(&mut self) {
        self.gesture = None;
        self.intent = None;
    }

    /// Stored gesture, live or not.
    #[must_use]
    pub fn pending_gesture(&self) -> Option<&PendingEvent> {
        self.gesture.as_ref()
    }

    /// Stored intent, live or not.
    #[must_use]
    pub fn pending_intent(&self) -> Option<&PendingEvent> {
        self.intent.as_ref()
    }

    /// Window in seconds.
    #[must_use]
    pub const fn window(&self) -> f64 {
        self.window
    }

    /// Change the window; applies to the next check.
    pub fn set_window(&mut self, window: f64) {
        self.window = window;
    }

    /// Gesture required by `intent`, if mapped.
    #[must_use]
    pub fn required_gesture(&self, intent: &str) -> Option<&str> {
        self.table.get(intent).map(String::as_str)
    }
}

/// Thread-safe handle for hosts that deliver gesture and intent events from
/// different threads. Overwrite-then-match runs under a single lock.
#[derive(Debug, Clone)]
pub struct SharedFusion {
    inner: Arc<Mutex<FusionStateMachine>>,
}

impl SharedFusion {
    #[must_use]
    pub fn new(machine: FusionStateMachine) -> Self {
        Self {
            inner: Arc::new(Mutex::new(machine)),
        }
    }

    pub fn on_gesture(&self, label: impl Into<String>, now: f64) -> Option<CastDecision> {
        self.inner.lock().on_gesture(label, now)
    }

    pub fn on_intent(&self, label: impl Into<String>, now: f64) -> Option<CastDecision> {
        self.inner.lock().on_intent(label, now)
    }

    pub fn on_intent_event(&self, event: &IntentEvent) -> Option<CastDecision> {
        self.inner.lock().on_intent_event(event)
    }

    #[must_use]
    pub fn state(&self, now: f64) -> FusionState {
        self.inner.lock().state(now)
    }

    pub fn expire(&self, now: f64) {
        self.inner.lock().expire(now);
    }

    pub fn reset(&self) {
        self.inner.lock().reset();
    }
}
