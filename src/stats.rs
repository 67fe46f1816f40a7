//! Engagement statistics: interaction counters, visit-day streaks and
//! hourly happiness samples.

use crate::model::{clamp_meter, Interaction, DEFAULT_HAPPINESS};
use chrono::{DateTime, Days, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Happiness at or above this counts towards the happiness streak.
pub const HAPPY_STREAK_THRESHOLD: f32 = 80.0;
/// Weight of the newest sample in the happiness moving average.
pub const HAPPINESS_EMA_ALPHA: f32 = 0.1;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatisticsRecord {
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub total_feeds: u32,
    #[serde(default)]
    pub total_plays: u32,
    #[serde(default)]
    pub total_pets: u32,
    #[serde(default)]
    pub total_sleeps: u32,
    #[serde(default)]
    pub pentest_completions: u32,
    #[serde(default)]
    pub visit_days: BTreeSet<NaiveDate>,
    #[serde(default)]
    pub last_visit_date: Option<NaiveDate>,
    #[serde(default)]
    pub current_happiness_streak: u32,
    #[serde(default)]
    pub longest_happiness_streak: u32,
    #[serde(default = "default_happiness")]
    pub highest_happiness: f32,
    #[serde(default = "default_happiness")]
    pub lowest_happiness: f32,
    #[serde(default = "default_happiness")]
    pub average_happiness: f32,
}

fn default_happiness() -> f32 {
    DEFAULT_HAPPINESS
}

impl StatisticsRecord {
    /// A fresh record whose happiness statistics start at the pet's
    /// current happiness.
    pub fn new(now: DateTime<Utc>, happiness: f32) -> Self {
        let h = clamp_meter(happiness);
        Self {
            created_at: now,
            total_feeds: 0,
            total_plays: 0,
            total_pets: 0,
            total_sleeps: 0,
            pentest_completions: 0,
            visit_days: BTreeSet::new(),
            last_visit_date: None,
            current_happiness_streak: 0,
            longest_happiness_streak: 0,
            highest_happiness: h,
            lowest_happiness: h,
            average_happiness: h,
        }
    }

    pub fn total_interactions(&self) -> u32 {
        self.total_feeds
            .saturating_add(self.total_plays)
            .saturating_add(self.total_pets)
            .saturating_add(self.total_sleeps)
    }

    pub fn counter(&self, kind: Interaction) -> u32 {
        match kind {
            Interaction::Feed => self.total_feeds,
            Interaction::Play => self.total_plays,
            Interaction::Affection => self.total_pets,
            Interaction::Sleep => self.total_sleeps,
        }
    }

    pub fn increment_counter(&mut self, kind: Interaction) {
        let slot = match kind {
            Interaction::Feed => &mut self.total_feeds,
            Interaction::Play => &mut self.total_plays,
            Interaction::Affection => &mut self.total_pets,
            Interaction::Sleep => &mut self.total_sleeps,
        };
        *slot = slot.saturating_add(1);
    }

    pub fn record_pentest_completion(&mut self) {
        self.pentest_completions = self.pentest_completions.saturating_add(1);
    }

    /// Registers a visit on `today`. Returns the new visit streak, or `None`
    /// when the day was already recorded and nothing changed.
    pub fn record_visit(&mut self, today: NaiveDate, previous_streak: u32) -> Option<u32> {
        if !self.visit_days.insert(today) {
            return None;
        }
        let continues = match (self.last_visit_date, yesterday(today)) {
            (Some(last), Some(prev)) => last == prev,
            _ => false,
        };
        let streak = if continues {
            previous_streak.saturating_add(1)
        } else {
            1
        };
        self.last_visit_date = Some(today);
        Some(streak)
    }

    pub fn sample_happiness(&mut self, happiness: f32) {
        let h = clamp_meter(happiness);
        self.highest_happiness = self.highest_happiness.max(h);
        self.lowest_happiness = self.lowest_happiness.min(h);
        self.average_happiness = clamp_meter(
            self.average_happiness * (1.0 - HAPPINESS_EMA_ALPHA) + h * HAPPINESS_EMA_ALPHA,
        );

        if h >= HAPPY_STREAK_THRESHOLD {
            self.current_happiness_streak = self.current_happiness_streak.saturating_add(1);
        } else {
            self.current_happiness_streak = 0;
        }
        self.longest_happiness_streak = self
            .longest_happiness_streak
            .max(self.current_happiness_streak);
    }

    /// Day streak rebuilt from `visit_days` alone: the run of consecutive
    /// calendar days ending at the most recent visit.
    pub fn consecutive_days(&self) -> u32 {
        let mut days = self.visit_days.iter().rev();
        let Some(&latest) = days.next() else {
            return 0;
        };
        let mut streak = 1u32;
        let mut expected = yesterday(latest);
        for &day in days {
            if Some(day) != expected {
                break;
            }
            streak += 1;
            expected = yesterday(day);
        }
        streak
    }

    /// Repairs values a hand-edited or partially written record may carry.
    pub fn sanitized(mut self) -> Self {
        self.highest_happiness = clamp_meter(self.highest_happiness);
        self.lowest_happiness = clamp_meter(self.lowest_happiness);
        self.average_happiness = clamp_meter(self.average_happiness);
        self.longest_happiness_streak = self
            .longest_happiness_streak
            .max(self.current_happiness_streak);
        if let Some(&latest) = self.visit_days.iter().next_back() {
            if self.last_visit_date.map_or(true, |d| d < latest) {
                self.last_visit_date = Some(latest);
            }
        }
        self
    }
}

fn yesterday(day: NaiveDate) -> Option<NaiveDate> {
    day.checked_sub_days(Days::new(1))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn record() -> StatisticsRecord {
        StatisticsRecord::new(Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap(), 80.0)
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_counters_and_total() {
        let mut s = record();
        s.increment_counter(Interaction::Feed);
        s.increment_counter(Interaction::Feed);
        s.increment_counter(Interaction::Play);
        s.increment_counter(Interaction::Affection);
        s.increment_counter(Interaction::Sleep);
        assert_eq!(s.total_feeds, 2);
        assert_eq!(s.counter(Interaction::Affection), 1);
        assert_eq!(s.total_interactions(), 5);
        s.record_pentest_completion();
        assert_eq!(s.total_interactions(), 5);
        assert_eq!(s.pentest_completions, 1);
    }

    #[test]
    fn test_first_visit_starts_streak_at_one() {
        let mut s = record();
        assert_eq!(s.record_visit(day(10), 0), Some(1));
        assert_eq!(s.last_visit_date, Some(day(10)));
    }

    #[test]
    fn test_repeat_visit_same_day_is_noop() {
        let mut s = record();
        let streak = s.record_visit(day(10), 0).unwrap();
        let before = s.clone();
        assert_eq!(s.record_visit(day(10), streak), None);
        assert_eq!(s, before);
    }

    #[test]
    fn test_consecutive_visits_extend_streak() {
        let mut s = record();
        let mut streak = 0;
        for d in 10..15 {
            streak = s.record_visit(day(d), streak).unwrap();
        }
        assert_eq!(streak, 5);
        assert_eq!(s.consecutive_days(), 5);
    }

    #[test]
    fn test_gap_resets_streak_to_one() {
        let mut s = record();
        let streak = s.record_visit(day(10), 0).unwrap();
        let streak = s.record_visit(day(11), streak).unwrap();
        assert_eq!(streak, 2);
        assert_eq!(s.record_visit(day(14), streak), Some(1));
        assert_eq!(s.consecutive_days(), 1);
        assert_eq!(s.visit_days.len(), 3);
    }

    #[test]
    fn test_streak_crosses_month_boundary() {
        let mut s = record();
        let end_of_feb = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        let streak = s.record_visit(end_of_feb, 0).unwrap();
        assert_eq!(s.record_visit(NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(), streak), Some(2));
    }

    #[test]
    fn test_consecutive_days_empty() {
        assert_eq!(record().consecutive_days(), 0);
    }

    #[test]
    fn test_happiness_sampling() {
        let mut s = record();
        s.sample_happiness(90.0);
        assert_eq!(s.highest_happiness, 90.0);
        assert_eq!(s.lowest_happiness, 80.0);
        assert!((s.average_happiness - 81.0).abs() < 1e-4);
        assert_eq!(s.current_happiness_streak, 1);

        s.sample_happiness(85.0);
        assert_eq!(s.current_happiness_streak, 2);
        assert_eq!(s.longest_happiness_streak, 2);

        s.sample_happiness(40.0);
        assert_eq!(s.current_happiness_streak, 0);
        assert_eq!(s.longest_happiness_streak, 2);
        assert_eq!(s.lowest_happiness, 40.0);
    }

    #[test]
    fn test_streak_threshold_is_inclusive() {
        let mut s = record();
        s.sample_happiness(80.0);
        assert_eq!(s.current_happiness_streak, 1);
        s.sample_happiness(79.9);
        assert_eq!(s.current_happiness_streak, 0);
    }

    #[test]
    fn test_partial_record_keeps_known_fields() {
        let s: StatisticsRecord =
            serde_json::from_str(r#"{"total_feeds":4,"visit_days":["2024-03-09"]}"#).unwrap();
        assert_eq!(s.total_feeds, 4);
        assert_eq!(s.visit_days.len(), 1);
        assert_eq!(s.highest_happiness, 80.0);
        assert_eq!(s.lowest_happiness, 80.0);
        assert_eq!(s.average_happiness, 80.0);
    }

    #[test]
    fn test_sanitized_restores_invariants() {
        let mut s = record();
        s.visit_days.insert(day(12));
        s.last_visit_date = Some(day(3));
        s.current_happiness_streak = 7;
        s.longest_happiness_streak = 2;
        s.highest_happiness = 130.0;
        let s = s.sanitized();
        assert_eq!(s.last_visit_date, Some(day(12)));
        assert_eq!(s.longest_happiness_streak, 7);
        assert_eq!(s.highest_happiness, 100.0);
    }
}
