use crate::config::Settings;
use crossterm::{
    cursor, execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{
        self, BeginSynchronizedUpdate, Clear, ClearType, DisableLineWrap, EnableLineWrap,
        EndSynchronizedUpdate, EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use pet_companion::{ActivityState, Companion, KeyValueStore};
use std::collections::VecDeque;
use std::io::{self, Write};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct Cell {
    pub(crate) ch: char,
    pub(crate) fg: Color,
    pub(crate) bg: Color,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: Color::White,
            bg: Color::Black,
        }
    }
}

pub(crate) struct CellBuffer {
    pub(crate) w: u16,
    pub(crate) h: u16,
    pub(crate) cells: Vec<Cell>,
}

impl CellBuffer {
    pub(crate) fn new(w: u16, h: u16) -> Self {
        Self {
            w,
            h,
            cells: vec![Cell::default(); (w as usize) * (h as usize)],
        }
    }
    pub(crate) fn idx(&self, x: u16, y: u16) -> usize {
        (y as usize) * (self.w as usize) + (x as usize)
    }
    pub(crate) fn set(&mut self, x: u16, y: u16, c: Cell) {
        if x < self.w && y < self.h {
            let i = self.idx(x, y);
            self.cells[i] = c;
        }
    }
    pub(crate) fn clear(&mut self, bg: Color) {
        for c in &mut self.cells {
            *c = Cell {
                ch: ' ',
                fg: Color::White,
                bg,
            };
        }
    }
}

pub(crate) struct Terminal {
    pub(crate) out: io::Stdout,
    pub(crate) cols: u16,
    pub(crate) rows: u16,
    pub(crate) prev: CellBuffer,
    pub(crate) cur: CellBuffer,
}

impl Terminal {
    pub(crate) fn begin() -> anyhow::Result<Self> {
        let mut out = io::stdout();
        execute!(
            out,
            EnterAlternateScreen,
            cursor::Hide,
            DisableLineWrap,
            terminal::Clear(ClearType::All)
        )?;
        terminal::enable_raw_mode()?;

        let (cols, rows) = terminal::size()?;
        Ok(Self {
            out,
            cols,
            rows,
            prev: CellBuffer::new(cols, rows),
            cur: CellBuffer::new(cols, rows),
        })
    }

    pub(crate) fn end(&mut self) -> anyhow::Result<()> {
        queue!(
            self.out,
            BeginSynchronizedUpdate,
            ResetColor,
            Clear(ClearType::All),
            cursor::Show,
            EnableLineWrap,
            EndSynchronizedUpdate,
            LeaveAlternateScreen
        )?;
        self.out.flush()?;
        terminal::disable_raw_mode()?;
        Ok(())
    }

    pub(crate) fn resize_if_needed(&mut self) -> anyhow::Result<bool> {
        let (c, r) = terminal::size()?;
        if c == self.cols && r == self.rows {
            return Ok(false);
        }
        self.cols = c;
        self.rows = r;
        self.prev = CellBuffer::new(c, r);
        self.cur = CellBuffer::new(c, r);
        Ok(true)
    }

    pub(crate) fn present(&mut self, diff_only: bool) -> anyhow::Result<()> {
        queue!(self.out, BeginSynchronizedUpdate)?;

        let mut last_fg = None;
        let mut last_bg = None;

        for y in 0..self.rows {
            for x in 0..self.cols {
                let i = self.cur.idx(x, y);
                let c = self.cur.cells[i];
                if diff_only && c == self.prev.cells[i] {
                    continue;
                }

                queue!(self.out, cursor::MoveTo(x, y))?;

                if last_fg != Some(c.fg) {
                    queue!(self.out, SetForegroundColor(c.fg))?;
                    last_fg = Some(c.fg);
                }
                if last_bg != Some(c.bg) {
                    queue!(self.out, SetBackgroundColor(c.bg))?;
                    last_bg = Some(c.bg);
                }

                queue!(self.out, Print(c.ch))?;
            }
        }

        queue!(self.out, ResetColor, EndSynchronizedUpdate)?;
        self.out.flush()?;
        self.prev.cells.copy_from_slice(&self.cur.cells);
        Ok(())
    }
}

/* -----------------------------
   Status panel
------------------------------ */

pub(crate) fn draw_text(buf: &mut CellBuffer, x: u16, y: u16, s: &str, fg: Color, bg: Color) {
    for (i, ch) in s.chars().enumerate() {
        let xx = x.saturating_add(i as u16);
        if xx >= buf.w || y >= buf.h {
            break;
        }
        buf.set(xx, y, Cell { ch, fg, bg });
    }
}

fn bar(value01: f32, width: usize) -> String {
    let v = value01.clamp(0.0, 1.0);
    let fill = (v * width as f32 + 0.5) as usize;
    let mut s = String::new();
    s.push('[');
    for i in 0..width {
        s.push(if i < fill { '█' } else { ' ' });
    }
    s.push(']');
    s
}

fn face(state: ActivityState) -> &'static str {
    match state {
        ActivityState::Idle => "(o_o)",
        ActivityState::Happy => "(^_^)",
        ActivityState::Sleeping => "(-_-) zZ",
        ActivityState::Eating => "(o_o)~nom",
        ActivityState::Playing => "(^o^)~ball",
    }
}

fn state_color(state: ActivityState, settings: &Settings) -> Color {
    if !settings.enable_color {
        return Color::White;
    }
    match state {
        ActivityState::Idle => Color::White,
        ActivityState::Happy => Color::Magenta,
        ActivityState::Sleeping => Color::Blue,
        ActivityState::Eating => Color::Yellow,
        ActivityState::Playing => Color::Green,
    }
}

pub(crate) fn status_panel<S: KeyValueStore>(
    buf: &mut CellBuffer,
    companion: &Companion<S>,
    log: &VecDeque<String>,
    settings: &Settings,
) {
    let bg = Color::Black;
    let fg = Color::White;
    let summary = companion.summary();

    draw_text(buf, 1, 0, "Pet Companion", fg, bg);
    draw_text(
        buf,
        1,
        2,
        &format!("{}  {}", face(summary.state), summary.state),
        state_color(summary.state, settings),
        bg,
    );

    let meters = [("Happy ", summary.happiness), ("Energy", summary.energy)];
    for (i, (name, val)) in meters.iter().enumerate() {
        let s = format!("{name}: {} {:>5.1}", bar(*val / 100.0, 20), val);
        draw_text(buf, 1, 4 + i as u16, &s, fg, bg);
    }

    let stats = companion.stats();
    let lines = [
        format!(
            "Feeds {}  Plays {}  Pets {}  Sleeps {}  (total {})",
            stats.total_feeds,
            stats.total_plays,
            stats.total_pets,
            stats.total_sleeps,
            summary.total_interactions
        ),
        format!(
            "Visit streak {} day(s)  |  Happy streak {} (best {})  |  Pentests {}",
            summary.visit_streak,
            stats.current_happiness_streak,
            stats.longest_happiness_streak,
            summary.pentest_completions
        ),
        format!(
            "Happiness avg {:.1}  low {:.1}  high {:.1}",
            stats.average_happiness, stats.lowest_happiness, stats.highest_happiness
        ),
    ];
    for (i, line) in lines.iter().enumerate() {
        draw_text(buf, 1, 7 + i as u16, line, fg, bg);
    }

    draw_text(
        buf,
        1,
        11,
        &format!(
            "Achievements {}/{}",
            summary.achievements_unlocked, summary.achievements_total
        ),
        fg,
        bg,
    );
    let gold = if settings.enable_color {
        Color::Yellow
    } else {
        fg
    };
    for (i, (def, status)) in companion.achievements().progress().enumerate() {
        let (mark, color) = if status.unlocked {
            ("[x]", gold)
        } else {
            ("[ ]", Color::DarkGrey)
        };
        // icons are often double-width and would shift the rest of the row
        let s = format!("{mark} {} - {}", def.name, def.description);
        draw_text(buf, 3, 12 + i as u16, &s, color, bg);
    }

    let log_top = 19u16;
    let room = buf.h.saturating_sub(log_top + 1) as usize;
    for (i, line) in log.iter().rev().take(room).enumerate() {
        draw_text(buf, 1, log_top + i as u16, line, fg, bg);
    }

    let help = "Keys: f feed | p play | a affection | s sleep | e task done | q quit";
    draw_text(buf, 1, buf.h.saturating_sub(1), help, fg, bg);
}
