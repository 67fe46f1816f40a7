use crate::config::{load_settings, project_paths, save_settings_atomic, Paths, Settings};
use crate::input::{collect_input_nonblocking, map_event_to_command, Command};
use crate::render::{status_panel, Terminal};
use anyhow::Context;
use chrono::{Local, NaiveDate, Utc};
use pet_companion::{Companion, FileStore, KeyValueStore, Notification};
use std::collections::VecDeque;
use std::fs;
use std::path::Path;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const LOG_LINES: usize = 64;

pub(crate) struct App {
    settings: Settings,
    paths: Paths,
    companion: Companion<FileStore>,
    term: Terminal,
    log: VecDeque<String>,
    visit_day: NaiveDate,
    should_quit: bool,
}

impl App {
    fn init(paths: Paths, settings: Settings) -> anyhow::Result<Self> {
        let store_dir = paths.store_dir(&settings);
        let store = FileStore::open(&store_dir)
            .with_context(|| format!("could not open store at {}", store_dir.display()))?;

        let mut companion = Companion::restore(store, Utc::now());
        let visit_day = Local::now().date_naive();
        companion.record_visit(visit_day);

        let term = Terminal::begin()?;

        Ok(Self {
            settings,
            paths,
            companion,
            term,
            log: VecDeque::with_capacity(LOG_LINES),
            visit_day,
            should_quit: false,
        })
    }

    fn run(&mut self) -> anyhow::Result<()> {
        let fps = self.settings.fps_cap.clamp(5, 120);
        let frame_dt = Duration::from_secs_f32(1.0 / fps as f32);

        while !self.should_quit {
            let frame_start = Instant::now();
            let _resized = self.term.resize_if_needed()?;

            for ev in collect_input_nonblocking(frame_dt)? {
                if let Some(cmd) = map_event_to_command(&ev) {
                    self.handle(cmd);
                }
            }

            // a session left open past midnight is a new visit
            let today = Local::now().date_naive();
            if today != self.visit_day {
                self.visit_day = today;
                self.companion.record_visit(today);
            }

            self.companion.advance(Utc::now());
            for note in self.companion.drain_notifications() {
                self.push_log(describe(&note));
            }

            self.render_frame()?;
            spin_sleep(frame_dt, frame_start);
        }

        self.companion.save();
        self.term.end()?;
        save_settings_atomic(&self.paths.settings_path, &self.settings)?;
        Ok(())
    }

    fn handle(&mut self, cmd: Command) {
        let now = Utc::now();
        match cmd {
            Command::Interact(kind) => self.companion.interact(kind, now),
            Command::TaskCompleted => {
                self.companion.record_pentest_completion();
                self.push_log("Task completed, your companion is proud".to_string());
            }
            Command::Quit => self.should_quit = true,
        }
    }

    fn push_log(&mut self, line: String) {
        if self.log.len() == LOG_LINES {
            self.log.pop_front();
        }
        let stamp = Local::now().format("%H:%M:%S");
        self.log.push_back(format!("{stamp}  {line}"));
    }

    fn render_frame(&mut self) -> anyhow::Result<()> {
        self.term.cur.clear(crossterm::style::Color::Black);
        status_panel(&mut self.term.cur, &self.companion, &self.log, &self.settings);
        self.term.present(true)?;
        Ok(())
    }
}

fn describe(note: &Notification) -> String {
    match note {
        Notification::StateChanged {
            state,
            happiness,
            energy,
        } => format!("Now {state} (happiness {happiness:.0}, energy {energy:.0})"),
        Notification::AchievementUnlocked {
            name, description, ..
        } => format!("Achievement unlocked: {name} - {description}"),
    }
}

fn init_logging(path: &Path, default_filter: &str) -> anyhow::Result<()> {
    let file = fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("could not open log file {}", path.display()))?;
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init()
        .map_err(|e| anyhow::anyhow!("could not install logger: {e}"))?;
    Ok(())
}

pub(crate) fn run() -> anyhow::Result<()> {
    let paths = project_paths()?;
    let settings = load_settings(&paths.settings_path);
    init_logging(&paths.log_path, &settings.log_filter)?;
    info!(data_dir = %paths.data_dir.display(), "starting");

    let mut app = App::init(paths, settings)?;
    let result = app.run();
    if result.is_err() {
        save_after_failure(&mut app.companion);
        // leave the terminal usable even when the loop bailed out
        let _ = app.term.end();
    }
    result
}

/// Last-chance save when the loop bailed out before its own exit save.
fn save_after_failure<S: KeyValueStore>(companion: &mut Companion<S>) {
    if !companion.save() {
        warn!("state could not be saved after the loop failed");
    }
}

/* -----------------------------
   Frame pacing helper
------------------------------ */

fn spin_sleep(target: Duration, start: Instant) {
    let end = start + target;
    loop {
        let t = Instant::now();
        if t >= end {
            break;
        }
        let left = end - t;
        if left > Duration::from_millis(2) {
            std::thread::sleep(Duration::from_millis(1));
        } else {
            std::hint::spin_loop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pet_companion::storage::{load_group, PET_STATE_KEY};
    use pet_companion::{ActivityState, MemoryStore, PetState};

    #[test]
    fn test_describe_notifications() {
        let s = describe(&Notification::StateChanged {
            state: ActivityState::Eating,
            happiness: 90.0,
            energy: 100.0,
        });
        assert_eq!(s, "Now eating (happiness 90, energy 100)");

        let s = describe(&Notification::AchievementUnlocked {
            id: "first_meal",
            name: "First Meal",
            description: "Feed your companion for the first time",
            icon: "🍖",
        });
        assert_eq!(
            s,
            "Achievement unlocked: First Meal - Feed your companion for the first time"
        );
    }

    #[test]
    fn test_failed_loop_still_saves_unsaved_ticks() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 10, 12, 0, 0).unwrap();
        let mut companion = Companion::restore(MemoryStore::new(), t0);
        companion.tick(t0 + chrono::Duration::seconds(5));
        assert_eq!(companion.pet().energy, 98.0);

        save_after_failure(&mut companion);
        let saved: PetState = load_group(companion.store(), PET_STATE_KEY).unwrap();
        assert_eq!(saved.energy, 98.0);
    }
}
