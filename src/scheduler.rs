//! Repeating cadences for the cooperative driver loop.
//!
//! Nothing here sleeps or spawns; the caller polls [`Scheduler::due`] with
//! the current time and runs whatever comes back to completion.

use chrono::{DateTime, Duration, Utc};

pub const TICK_EVERY_SECS: i64 = 5;
pub const EVALUATE_EVERY_SECS: i64 = 10;
pub const SAVE_EVERY_SECS: i64 = 60;
pub const SAMPLE_EVERY_SECS: i64 = 3_600;

/// Jobs in the order they run when several fall due together.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Job {
    Tick,
    SampleHappiness,
    EvaluateAchievements,
    Save,
}

#[derive(Clone, Debug)]
struct Cadence {
    job: Job,
    every: Duration,
    next_due: DateTime<Utc>,
}

impl Cadence {
    fn new(job: Job, every_secs: i64, start: DateTime<Utc>) -> Self {
        let every = Duration::seconds(every_secs);
        Self {
            job,
            every,
            next_due: start + every,
        }
    }

    /// Fires at most once per poll. Missed periods collapse into one run,
    /// and a clock that jumped backwards re-anchors instead of stalling.
    fn poll(&mut self, now: DateTime<Utc>) -> bool {
        if now < self.next_due {
            if self.next_due - now > self.every {
                self.next_due = now + self.every;
            }
            return false;
        }
        while self.next_due <= now {
            self.next_due += self.every;
        }
        true
    }
}

#[derive(Clone, Debug)]
pub struct Scheduler {
    cadences: Vec<Cadence>,
}

impl Scheduler {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            cadences: vec![
                Cadence::new(Job::Tick, TICK_EVERY_SECS, start),
                Cadence::new(Job::SampleHappiness, SAMPLE_EVERY_SECS, start),
                Cadence::new(Job::EvaluateAchievements, EVALUATE_EVERY_SECS, start),
                Cadence::new(Job::Save, SAVE_EVERY_SECS, start),
            ],
        }
    }

    pub fn due(&mut self, now: DateTime<Utc>) -> Vec<Job> {
        self.cadences
            .iter_mut()
            .filter_map(|c| c.poll(now).then_some(c.job))
            .collect()
    }

    pub fn next_due(&self, job: Job) -> Option<DateTime<Utc>> {
        self.cadences
            .iter()
            .find(|c| c.job == job)
            .map(|c| c.next_due)
    }
}
