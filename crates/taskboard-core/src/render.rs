use std::io::{self, IsTerminal, Write};

use chrono::Local;
use unicode_width::UnicodeWidthStr;

use crate::board::BoardSnapshot;
use crate::config::Config;
use crate::stats::Stats;
use crate::task::{Health, Task};

pub const EMPTY_STATE: &str = "No tasks yet. Create your first task above!";
pub const LOADING_STATE: &str = "Loading tasks...";

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color = cfg.get_bool("color")?.unwrap_or(true);

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, board))]
    pub fn print_board(&self, board: &BoardSnapshot) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        self.write_board(&mut out, board)
    }

    pub fn print_stats(&self, stats: &Stats, source: &str) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        writeln!(out, "Stats ({source})")?;
        self.write_stats(&mut out, stats)
    }

    pub fn print_health(&self, health: &Health) -> anyhow::Result<()> {
        let mut out = io::stdout().lock();
        let status = if health.is_healthy() {
            self.paint(&health.status, "32")
        } else {
            self.paint(&health.status, "31")
        };
        writeln!(out, "status    {status}")?;
        if let Some(database) = &health.database {
            writeln!(out, "database  {database}")?;
        }
        if let Some(timestamp) = &health.timestamp {
            writeln!(out, "checked   {timestamp}")?;
        }
        if let Some(error) = &health.error {
            writeln!(out, "error     {error}")?;
        }
        Ok(())
    }

    /// Stats panel, error banner, then the filtered task list.
    pub fn write_board<W: Write>(&self, mut out: W, board: &BoardSnapshot) -> anyhow::Result<()> {
        if let Some(stats) = &board.stats {
            self.write_stats(&mut out, stats)?;
            writeln!(out)?;
        }

        if let Some(error) = &board.error {
            writeln!(out, "{}", self.paint(&format!("error: {error}"), "31"))?;
            writeln!(out)?;
        }

        let visible = board.visible_tasks();
        writeln!(out, "Tasks ({}) [{}]", board.tasks.len(), board.filter)?;

        if board.loading && board.tasks.is_empty() {
            writeln!(out, "{LOADING_STATE}")?;
        } else if board.tasks.is_empty() {
            writeln!(out, "{EMPTY_STATE}")?;
        } else if visible.is_empty() {
            writeln!(out, "No {} tasks.", board.filter)?;
        } else {
            self.write_task_table(&mut out, &visible)?;
        }

        Ok(())
    }

    pub fn write_stats<W: Write>(&self, mut out: W, stats: &Stats) -> anyhow::Result<()> {
        let headers = vec![
            "Total".to_string(),
            "Completed".to_string(),
            "Pending".to_string(),
            "Rate".to_string(),
        ];
        let rows = vec![vec![
            stats.total_tasks.to_string(),
            self.paint(&stats.completed_tasks.to_string(), "32"),
            self.paint(&stats.pending_tasks.to_string(), "33"),
            format!("{}%", stats.completion_rate),
        ]];
        write_table(&mut out, headers, rows)
    }

    fn write_task_table<W: Write>(&self, out: W, tasks: &[Task]) -> anyhow::Result<()> {
        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Title".to_string(),
            "Description".to_string(),
            "Created".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let done = if task.completed {
                    self.paint("yes", "32")
                } else {
                    "no".to_string()
                };
                let title = if task.completed {
                    self.paint(&task.title, "2")
                } else {
                    task.title.clone()
                };
                vec![
                    self.paint(&task.id.to_string(), "33"),
                    done,
                    title,
                    task.description().unwrap_or_default().to_string(),
                    task.created_at
                        .with_timezone(&Local)
                        .format("%Y-%m-%d")
                        .to_string(),
                ]
            })
            .collect();

        write_table(out, headers, rows)
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn write_table<W: Write>(
    mut writer: W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    for idx in 0..column_count {
        write!(writer, "{:width$} ", headers[idx], width = widths[idx])?;
    }
    writeln!(writer)?;

    for idx in 0..column_count {
        write!(writer, "{:-<width$} ", "", width = widths[idx])?;
    }
    writeln!(writer)?;

    for row in rows {
        for idx in 0..column_count {
            let cell = &row[idx];
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            write!(writer, "{}{} ", cell, " ".repeat(padding))?;
        }
        writeln!(writer)?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}
