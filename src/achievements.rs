//! Fixed achievement catalog and its unlock ledger.
//!
//! Predicates are plain functions over an immutable [`Snapshot`]; the
//! ledger only ever flips entries from locked to unlocked.

use crate::model::PetState;
use crate::stats::StatisticsRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Read-only view handed to achievement predicates.
#[derive(Clone, Copy, Debug)]
pub struct Snapshot<'a> {
    pub pet: &'a PetState,
    pub stats: &'a StatisticsRecord,
}

#[derive(Debug)]
pub struct AchievementDef {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub predicate: fn(&Snapshot<'_>) -> bool,
}

pub static CATALOG: [AchievementDef; 6] = [
    AchievementDef {
        id: "first_meal",
        name: "First Meal",
        description: "Feed your companion for the first time",
        icon: "🍖",
        predicate: first_meal,
    },
    AchievementDef {
        id: "well_fed",
        name: "Well Fed",
        description: "Feed your companion 10 times",
        icon: "🍽",
        predicate: well_fed,
    },
    AchievementDef {
        id: "playful",
        name: "Playful",
        description: "Play with your companion 5 times",
        icon: "🎾",
        predicate: playful,
    },
    AchievementDef {
        id: "best_friends",
        name: "Best Friends",
        description: "Interact with your companion 20 times",
        icon: "💖",
        predicate: best_friends,
    },
    AchievementDef {
        id: "loyal_companion",
        name: "Loyal Companion",
        description: "Visit 5 days in a row",
        icon: "📅",
        predicate: loyal_companion,
    },
    AchievementDef {
        id: "security_companion",
        name: "Security Companion",
        description: "Complete 3 pentests together",
        icon: "🛡",
        predicate: security_companion,
    },
];

fn first_meal(s: &Snapshot<'_>) -> bool {
    s.stats.total_feeds > 0
}

fn well_fed(s: &Snapshot<'_>) -> bool {
    s.stats.total_feeds >= 10
}

fn playful(s: &Snapshot<'_>) -> bool {
    s.stats.total_plays >= 5
}

fn best_friends(s: &Snapshot<'_>) -> bool {
    s.stats.total_interactions() >= 20
}

fn loyal_companion(s: &Snapshot<'_>) -> bool {
    s.pet.consecutive_visit_days >= 5
}

fn security_companion(s: &Snapshot<'_>) -> bool {
    s.stats.pentest_completions >= 3
}

pub fn find(id: &str) -> Option<&'static AchievementDef> {
    CATALOG.iter().find(|a| a.id == id)
}

/// Persisted unlock status. Display metadata lives only in [`CATALOG`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AchievementStatus {
    pub id: String,
    pub unlocked: bool,
    pub unlocked_at: Option<DateTime<Utc>>,
}

impl AchievementStatus {
    fn locked(id: &str) -> Self {
        Self {
            id: id.to_string(),
            unlocked: false,
            unlocked_at: None,
        }
    }
}

/// Unlock ledger, one entry per catalog item in catalog order.
#[derive(Clone, Debug, PartialEq)]
pub struct AchievementBook {
    statuses: Vec<AchievementStatus>,
}

impl Default for AchievementBook {
    fn default() -> Self {
        Self::new()
    }
}

impl AchievementBook {
    pub fn new() -> Self {
        Self {
            statuses: CATALOG.iter().map(|a| AchievementStatus::locked(a.id)).collect(),
        }
    }

    /// Rebuilds the ledger from saved statuses. Ids no longer in the
    /// catalog are dropped; catalog entries missing from the save start
    /// locked.
    pub fn from_statuses(saved: Vec<AchievementStatus>) -> Self {
        let mut book = Self::new();
        for status in saved {
            match book.statuses.iter_mut().find(|s| s.id == status.id) {
                Some(slot) => {
                    if status.unlocked {
                        slot.unlocked = true;
                        slot.unlocked_at = status.unlocked_at;
                    }
                }
                None => warn!(id = %status.id, "dropping unknown achievement from save"),
            }
        }
        book
    }

    pub fn statuses(&self) -> &[AchievementStatus] {
        &self.statuses
    }

    pub fn is_unlocked(&self, id: &str) -> bool {
        self.statuses.iter().any(|s| s.id == id && s.unlocked)
    }

    pub fn unlocked_count(&self) -> usize {
        self.statuses.iter().filter(|s| s.unlocked).count()
    }

    pub fn progress(&self) -> impl Iterator<Item = (&'static AchievementDef, &AchievementStatus)> {
        CATALOG.iter().zip(self.statuses.iter())
    }

    /// Checks every locked entry and unlocks those whose predicate holds.
    /// Returns the newly unlocked definitions in catalog order.
    pub fn evaluate(
        &mut self,
        snapshot: &Snapshot<'_>,
        now: DateTime<Utc>,
    ) -> Vec<&'static AchievementDef> {
        let mut unlocked = Vec::new();
        for (def, status) in CATALOG.iter().zip(self.statuses.iter_mut()) {
            if status.unlocked || !(def.predicate)(snapshot) {
                continue;
            }
            status.unlocked = true;
            status.unlocked_at = Some(now);
            info!(id = def.id, name = def.name, "achievement unlocked");
            unlocked.push(def);
        }
        unlocked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Interaction;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap()
    }

    fn fresh() -> (PetState, StatisticsRecord) {
        (PetState::new(t0()), StatisticsRecord::new(t0(), 80.0))
    }

    fn ids(defs: &[&'static AchievementDef]) -> Vec<&'static str> {
        defs.iter().map(|d| d.id).collect()
    }

    #[test]
    fn test_catalog_order_and_ids_are_unique() {
        let ids: Vec<_> = CATALOG.iter().map(|a| a.id).collect();
        assert_eq!(
            ids,
            vec![
                "first_meal",
                "well_fed",
                "playful",
                "best_friends",
                "loyal_companion",
                "security_companion"
            ]
        );
        assert!(find("playful").is_some());
        assert!(find("nope").is_none());
    }

    #[test]
    fn test_nothing_unlocks_on_fresh_state() {
        let (pet, stats) = fresh();
        let mut book = AchievementBook::new();
        let snap = Snapshot { pet: &pet, stats: &stats };
        assert!(book.evaluate(&snap, t0()).is_empty());
        assert_eq!(book.unlocked_count(), 0);
    }

    #[test]
    fn test_first_meal_then_well_fed() {
        let (pet, mut stats) = fresh();
        let mut book = AchievementBook::new();

        stats.increment_counter(Interaction::Feed);
        let snap = Snapshot { pet: &pet, stats: &stats };
        assert_eq!(ids(&book.evaluate(&snap, t0())), vec!["first_meal"]);
        assert!(book.is_unlocked("first_meal"));
        assert!(!book.is_unlocked("well_fed"));

        for _ in 1..10 {
            stats.increment_counter(Interaction::Feed);
        }
        let later = t0() + Duration::seconds(10);
        let snap = Snapshot { pet: &pet, stats: &stats };
        assert_eq!(ids(&book.evaluate(&snap, later)), vec!["well_fed"]);

        let status = &book.statuses()[1];
        assert_eq!(status.unlocked_at, Some(later));
        assert_eq!(book.statuses()[0].unlocked_at, Some(t0()));
    }

    #[test]
    fn test_visit_and_engagement_predicates() {
        let (mut pet, mut stats) = fresh();
        let mut book = AchievementBook::new();
        pet.consecutive_visit_days = 5;
        for _ in 0..3 {
            stats.record_pentest_completion();
        }
        let snap = Snapshot { pet: &pet, stats: &stats };
        assert_eq!(
            ids(&book.evaluate(&snap, t0())),
            vec!["loyal_companion", "security_companion"]
        );
    }

    #[test]
    fn test_best_friends_counts_all_interactions() {
        let (pet, mut stats) = fresh();
        let mut book = AchievementBook::new();
        for i in 0..20 {
            stats.increment_counter(if i % 2 == 0 {
                Interaction::Affection
            } else {
                Interaction::Sleep
            });
        }
        let snap = Snapshot { pet: &pet, stats: &stats };
        assert_eq!(ids(&book.evaluate(&snap, t0())), vec!["best_friends"]);
    }

    #[test]
    fn test_unlocks_never_revert() {
        let (pet, mut stats) = fresh();
        let mut book = AchievementBook::new();
        stats.increment_counter(Interaction::Feed);
        book.evaluate(&Snapshot { pet: &pet, stats: &stats }, t0());

        let (pet, stats) = fresh();
        let snap = Snapshot { pet: &pet, stats: &stats };
        assert!(book.evaluate(&snap, t0() + Duration::hours(1)).is_empty());
        assert!(book.is_unlocked("first_meal"));
        assert_eq!(book.statuses()[0].unlocked_at, Some(t0()));
    }

    #[test]
    fn test_from_statuses_merges_with_catalog() {
        let saved = vec![
            AchievementStatus {
                id: "playful".to_string(),
                unlocked: true,
                unlocked_at: Some(t0()),
            },
            AchievementStatus {
                id: "retired".to_string(),
                unlocked: true,
                unlocked_at: Some(t0()),
            },
        ];
        let book = AchievementBook::from_statuses(saved);
        assert_eq!(book.statuses().len(), CATALOG.len());
        assert!(book.is_unlocked("playful"));
        assert!(!book.is_unlocked("retired"));
        assert_eq!(book.unlocked_count(), 1);
        let names: Vec<_> = book.progress().map(|(d, _)| d.name).collect();
        assert_eq!(names[2], "Playful");
    }
}
