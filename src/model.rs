use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

pub const METER_MIN: f32 = 0.0;
pub const METER_MAX: f32 = 100.0;

pub const DEFAULT_HAPPINESS: f32 = 80.0;
pub const DEFAULT_ENERGY: f32 = 100.0;

/// Upper bound on how long Eating/Playing may be held, whatever hold was recorded.
pub const TRANSIENT_SAFETY_NET_MS: i64 = 5_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityState {
    Idle,
    Happy,
    Sleeping,
    Eating,
    Playing,
}

impl ActivityState {
    /// How long a transient state lasts before reverting to `Idle`.
    pub fn hold_ms(self) -> Option<i64> {
        match self {
            ActivityState::Eating | ActivityState::Playing => Some(3_000),
            ActivityState::Happy => Some(2_000),
            ActivityState::Idle | ActivityState::Sleeping => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ActivityState::Idle => "idle",
            ActivityState::Happy => "happy",
            ActivityState::Sleeping => "sleeping",
            ActivityState::Eating => "eating",
            ActivityState::Playing => "playing",
        }
    }
}

impl fmt::Display for ActivityState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The four user-facing interactions.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Interaction {
    Feed,
    Play,
    Affection,
    Sleep,
}

impl Interaction {
    pub const ALL: [Interaction; 4] = [
        Interaction::Feed,
        Interaction::Play,
        Interaction::Affection,
        Interaction::Sleep,
    ];

    pub fn target_state(self) -> ActivityState {
        match self {
            Interaction::Feed => ActivityState::Eating,
            Interaction::Play => ActivityState::Playing,
            Interaction::Affection => ActivityState::Happy,
            Interaction::Sleep => ActivityState::Sleeping,
        }
    }

    /// (happiness, energy) deltas, applied before clamping.
    pub fn deltas(self) -> (f32, f32) {
        match self {
            Interaction::Feed => (10.0, 20.0),
            Interaction::Play => (15.0, -15.0),
            Interaction::Affection => (5.0, 0.0),
            Interaction::Sleep => (0.0, 0.0),
        }
    }
}

/// Current activity plus the moment it was entered.
///
/// This is the only record of a pending auto-revert: a transient state is
/// over once `now - entered_at >= hold`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub state: ActivityState,
    pub entered_at: DateTime<Utc>,
    #[serde(default)]
    pub hold_ms: Option<i64>,
}

impl Activity {
    pub fn enter(state: ActivityState, now: DateTime<Utc>) -> Self {
        Self {
            state,
            entered_at: now,
            hold_ms: state.hold_ms(),
        }
    }

    pub fn idle(now: DateTime<Utc>) -> Self {
        Self::enter(ActivityState::Idle, now)
    }

    /// Longest hold a state may carry: the safety net for Eating/Playing,
    /// the built-in hold otherwise.
    fn max_hold_ms(state: ActivityState) -> Option<i64> {
        match state {
            ActivityState::Eating | ActivityState::Playing => Some(TRANSIENT_SAFETY_NET_MS),
            ActivityState::Happy => state.hold_ms(),
            ActivityState::Idle | ActivityState::Sleeping => None,
        }
    }

    fn effective_hold_ms(&self) -> Option<i64> {
        let cap = Self::max_hold_ms(self.state)?;
        let hold = self.hold_ms.or_else(|| self.state.hold_ms())?;
        Some(hold.clamp(0, cap))
    }

    /// True once a transient state has run its course. A clock that moved
    /// backwards never expires anything; see [`Activity::reanchored`].
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        match self.effective_hold_ms() {
            Some(hold) => (now - self.entered_at) >= Duration::milliseconds(hold),
            None => false,
        }
    }

    /// Moves `entered_at` back to `now` when the clock has gone backwards,
    /// so the hold counts from the corrected time.
    pub fn reanchored(mut self, now: DateTime<Utc>) -> Self {
        if now < self.entered_at {
            self.entered_at = now;
        }
        self
    }

    /// Replaces a hold outside the state's allowed range with its default.
    pub fn sanitized(mut self) -> Self {
        let valid = match (self.hold_ms, Self::max_hold_ms(self.state)) {
            (None, _) => true,
            (Some(h), Some(cap)) => (0..=cap).contains(&h),
            (Some(_), None) => false,
        };
        if !valid {
            self.hold_ms = self.state.hold_ms();
        }
        self
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PetState {
    pub happiness: f32,
    pub energy: f32,
    pub activity: Activity,
    pub last_fed_at: DateTime<Utc>,
    pub last_interaction_at: DateTime<Utc>,
    #[serde(default)]
    pub consecutive_visit_days: u32,
}

impl PetState {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            happiness: DEFAULT_HAPPINESS,
            energy: DEFAULT_ENERGY,
            activity: Activity::idle(now),
            last_fed_at: now,
            last_interaction_at: now,
            consecutive_visit_days: 0,
        }
    }

    pub fn state(&self) -> ActivityState {
        self.activity.state
    }

    /// Pulls meters back into range after loading data written elsewhere.
    pub fn sanitized(mut self) -> Self {
        self.happiness = clamp_meter(self.happiness);
        self.energy = clamp_meter(self.energy);
        self.activity = self.activity.sanitized();
        self
    }
}

pub fn clamp_meter(v: f32) -> f32 {
    if v.is_nan() {
        return METER_MIN;
    }
    v.clamp(METER_MIN, METER_MAX)
}

pub fn adjust_meter(v: f32, delta: f32) -> f32 {
    clamp_meter(v + delta)
}

/// Whole and fractional hours between two instants, zero when `to` is
/// earlier than `from`.
pub fn elapsed_hours(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let ms = (to - from).num_milliseconds().max(0);
    ms as f64 / 3_600_000.0
}
