//! The companion: pet, statistics and achievements wired to a store and a
//! scheduler. Owned by whoever drives it; there is no shared instance.

use crate::achievements::{AchievementBook, AchievementStatus, Snapshot};
use crate::model::{ActivityState, Interaction, PetState};
use crate::scheduler::{Job, Scheduler};
use crate::sim::{reduce, PetEvent};
use crate::stats::StatisticsRecord;
use crate::storage::{
    load_group, save_group, KeyValueStore, ACHIEVEMENTS_KEY, PET_STATE_KEY, STATISTICS_KEY,
};
use chrono::{DateTime, NaiveDate, Utc};
use tracing::{debug, info, warn};

/// Messages for the UI collaborator.
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    StateChanged {
        state: ActivityState,
        happiness: f32,
        energy: f32,
    },
    AchievementUnlocked {
        id: &'static str,
        name: &'static str,
        description: &'static str,
        icon: &'static str,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub state: ActivityState,
    pub happiness: f32,
    pub energy: f32,
    pub total_interactions: u32,
    pub visit_streak: u32,
    pub pentest_completions: u32,
    pub achievements_unlocked: usize,
    pub achievements_total: usize,
}

pub struct Companion<S: KeyValueStore> {
    pet: PetState,
    stats: StatisticsRecord,
    achievements: AchievementBook,
    scheduler: Scheduler,
    store: S,
    outbox: Vec<Notification>,
}

impl<S: KeyValueStore> Companion<S> {
    /// Loads whatever the store holds, group by group, and fills the gaps
    /// with defaults.
    pub fn restore(store: S, now: DateTime<Utc>) -> Self {
        let pet = match load_group::<_, PetState>(&store, PET_STATE_KEY) {
            Some(p) => p.sanitized(),
            None => {
                info!("starting with a fresh pet");
                PetState::new(now)
            }
        };
        let stats = match load_group::<_, StatisticsRecord>(&store, STATISTICS_KEY) {
            Some(s) => s.sanitized(),
            None => StatisticsRecord::new(now, pet.happiness),
        };
        let achievements = load_group::<_, Vec<AchievementStatus>>(&store, ACHIEVEMENTS_KEY)
            .map(AchievementBook::from_statuses)
            .unwrap_or_default();

        let mut companion = Self {
            pet,
            stats,
            achievements,
            scheduler: Scheduler::new(now),
            store,
            outbox: Vec::new(),
        };
        companion.reconcile_visit_streak();
        info!(
            state = %companion.pet.state(),
            happiness = companion.pet.happiness,
            energy = companion.pet.energy,
            unlocked = companion.achievements.unlocked_count(),
            "companion restored"
        );
        companion
    }

    fn reconcile_visit_streak(&mut self) {
        if self.stats.visit_days.is_empty() {
            return;
        }
        let rebuilt = self.stats.consecutive_days();
        if rebuilt != self.pet.consecutive_visit_days {
            warn!(
                stored = self.pet.consecutive_visit_days,
                rebuilt, "visit streak disagrees with visit history, using history"
            );
            self.pet.consecutive_visit_days = rebuilt;
        }
    }

    pub fn pet(&self) -> &PetState {
        &self.pet
    }

    pub fn stats(&self) -> &StatisticsRecord {
        &self.stats
    }

    pub fn achievements(&self) -> &AchievementBook {
        &self.achievements
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    pub fn feed(&mut self, now: DateTime<Utc>) {
        self.interact(Interaction::Feed, now);
    }

    pub fn play(&mut self, now: DateTime<Utc>) {
        self.interact(Interaction::Play, now);
    }

    pub fn affection(&mut self, now: DateTime<Utc>) {
        self.interact(Interaction::Affection, now);
    }

    pub fn sleep(&mut self, now: DateTime<Utc>) {
        self.interact(Interaction::Sleep, now);
    }

    pub fn interact(&mut self, kind: Interaction, now: DateTime<Utc>) {
        self.apply(&PetEvent::Interact { kind, at: now }, true);
        self.stats.increment_counter(kind);
        debug!(?kind, total = self.stats.counter(kind), "interaction");
        self.save();
    }

    /// External engagement signal: a real-world task was completed.
    pub fn record_pentest_completion(&mut self) {
        self.stats.record_pentest_completion();
        info!(total = self.stats.pentest_completions, "pentest completion recorded");
        self.save();
    }

    /// Registers today's visit. Repeat visits on the same day change nothing.
    pub fn record_visit(&mut self, today: NaiveDate) {
        let Some(streak) = self
            .stats
            .record_visit(today, self.pet.consecutive_visit_days)
        else {
            return;
        };
        self.pet.consecutive_visit_days = streak;
        info!(%today, streak, "visit recorded");
        self.save();
    }

    /// Runs transient expiry plus every cadence that has fallen due.
    pub fn advance(&mut self, now: DateTime<Utc>) {
        self.apply(&PetEvent::Settle { at: now }, false);
        for job in self.scheduler.due(now) {
            match job {
                Job::Tick => self.tick(now),
                Job::SampleHappiness => self.sample_happiness(),
                Job::EvaluateAchievements => {
                    self.evaluate_achievements(now);
                }
                Job::Save => {
                    self.save();
                }
            }
        }
    }

    pub fn tick(&mut self, now: DateTime<Utc>) {
        self.apply(&PetEvent::Tick { at: now }, false);
        debug!(
            state = %self.pet.state(),
            happiness = self.pet.happiness,
            energy = self.pet.energy,
            "tick"
        );
    }

    pub fn sample_happiness(&mut self) {
        self.stats.sample_happiness(self.pet.happiness);
        self.save();
    }

    /// Returns how many achievements unlocked on this pass.
    pub fn evaluate_achievements(&mut self, now: DateTime<Utc>) -> usize {
        let snapshot = Snapshot {
            pet: &self.pet,
            stats: &self.stats,
        };
        let unlocked = self.achievements.evaluate(&snapshot, now);
        if unlocked.is_empty() {
            return 0;
        }
        for def in &unlocked {
            self.outbox.push(Notification::AchievementUnlocked {
                id: def.id,
                name: def.name,
                description: def.description,
                icon: def.icon,
            });
        }
        self.save();
        unlocked.len()
    }

    /// Writes all three groups. Failures are logged and left for the next
    /// save to retry.
    pub fn save(&mut self) -> bool {
        let mut ok = true;
        if let Err(e) = save_group(&mut self.store, PET_STATE_KEY, &self.pet) {
            warn!(error = %e, "failed to save pet state");
            ok = false;
        }
        if let Err(e) = save_group(&mut self.store, STATISTICS_KEY, &self.stats) {
            warn!(error = %e, "failed to save statistics");
            ok = false;
        }
        if let Err(e) = save_group(
            &mut self.store,
            ACHIEVEMENTS_KEY,
            &self.achievements.statuses(),
        ) {
            warn!(error = %e, "failed to save achievements");
            ok = false;
        }
        ok
    }

    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        std::mem::take(&mut self.outbox)
    }

    pub fn summary(&self) -> Summary {
        Summary {
            state: self.pet.state(),
            happiness: self.pet.happiness,
            energy: self.pet.energy,
            total_interactions: self.stats.total_interactions(),
            visit_streak: self.pet.consecutive_visit_days,
            pentest_completions: self.stats.pentest_completions,
            achievements_unlocked: self.achievements.unlocked_count(),
            achievements_total: self.achievements.statuses().len(),
        }
    }

    /// Runs the reducer and queues a state notification when the activity
    /// changed, or always when `announce` is set.
    fn apply(&mut self, event: &PetEvent, announce: bool) {
        let before = self.pet.state();
        self.pet = reduce(self.pet.clone(), event);
        let after = self.pet.state();
        if before != after {
            debug!(from = %before, to = %after, "activity changed");
        }
        if announce || before != after {
            self.outbox.push(Notification::StateChanged {
                state: after,
                happiness: self.pet.happiness,
                energy: self.pet.energy,
            });
        }
    }
}
