use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use chrono::Local;
use unicode_width::UnicodeWidthStr;

use crate::app::Screen;
use crate::config::Config;
use crate::task::{Priority, Task};
use crate::view::{PriorityFilter, Row, RowMode, SortOrder};

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => true,
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self {
            color: color && io::stdout().is_terminal(),
        })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip_all)]
    pub fn render_screen<W: Write>(&self, out: &mut W, screen: &Screen) -> anyhow::Result<()> {
        match screen {
            Screen::Login => self.render_login(out),
            Screen::Dashboard {
                greeting,
                filter,
                sort,
                rows,
            } => self.render_dashboard(out, greeting, *filter, *sort, rows),
        }
    }

    pub fn render_login<W: Write>(&self, out: &mut W) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint("TaskFlow", "1"))?;
        writeln!(out, "Enter your name to continue.")?;
        Ok(())
    }

    pub fn render_dashboard<W: Write>(
        &self,
        out: &mut W,
        greeting: &str,
        filter: PriorityFilter,
        sort: SortOrder,
        rows: &[Row],
    ) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(greeting, "1"))?;
        writeln!(out, "filter: {filter}  sort: {sort}")?;
        writeln!(out)?;
        self.render_rows(out, rows)
    }

    /// Rebuilds the whole task table from `rows`.
    pub fn render_rows<W: Write>(&self, out: &mut W, rows: &[Row]) -> anyhow::Result<()> {
        if rows.is_empty() {
            writeln!(out, "No tasks.")?;
            return Ok(());
        }

        let headers = vec![
            "#".to_string(),
            "ID".to_string(),
            "Pri".to_string(),
            "Task".to_string(),
            "Status".to_string(),
            "Actions".to_string(),
        ];

        let table_rows = rows
            .iter()
            .map(|row| {
                let position = self.paint(&(row.index + 1).to_string(), "33");
                let marker = self.priority_marker(row.priority);
                let (text, status) = match (&row.mode, &row.edit) {
                    (RowMode::Editing, Some(edit)) => {
                        let choices = edit
                            .choices
                            .iter()
                            .map(|choice| {
                                if *choice == edit.priority {
                                    format!("[{}]", choice.label())
                                } else {
                                    choice.label().to_string()
                                }
                            })
                            .collect::<Vec<_>>()
                            .join(" ");
                        (format!("> {}", edit.text), format!("editing: {choices}"))
                    }
                    _ if row.completed => (self.paint(&row.label, "9"), "done".to_string()),
                    _ => (row.label.clone(), "open".to_string()),
                };
                let actions = row
                    .actions
                    .iter()
                    .map(|action| action.label())
                    .collect::<Vec<_>>()
                    .join(" ");
                vec![position, row.id.short(), marker, text, status, actions]
            })
            .collect();

        write_table(out, headers, table_rows)
    }

    #[tracing::instrument(skip(self, out, task))]
    pub fn render_task_info<W: Write>(
        &self,
        out: &mut W,
        index: usize,
        task: &Task,
    ) -> anyhow::Result<()> {
        writeln!(out, "position  {}", index + 1)?;
        writeln!(out, "id        {}", task.id)?;
        writeln!(out, "text      {}", task.text)?;
        writeln!(out, "priority  {}", task.priority)?;
        writeln!(
            out,
            "status    {}",
            if task.completed { "completed" } else { "open" }
        )?;
        writeln!(
            out,
            "entry     {}",
            task.entry.with_timezone(&Local).format("%Y-%m-%d %H:%M")
        )?;
        Ok(())
    }

    pub fn render_message<W: Write>(&self, out: &mut W, message: &str) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(message, "31"))?;
        Ok(())
    }

    fn priority_marker(&self, priority: Priority) -> String {
        let code = match priority {
            Priority::High => "31",
            Priority::Medium => "33",
            Priority::Low => "32",
        };
        self.paint(priority.as_str(), code)
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

    for width in &widths {
        write!(writer, "{:-<width$} ", "", width = *width)?;
    }
    writeln!(writer)?;

    for row in rows {
        for (idx, cell) in row.iter().enumerate() {
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
