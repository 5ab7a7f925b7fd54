//! Interactive read-render loop. Each input line is one UI event.

use std::io::{BufRead, Write};

use tracing::{debug, info};

use crate::app::{App, Confirm, FixedAnswer};
use crate::commands::PromptConfirm;
use crate::render::Renderer;
use crate::task::{Priority, TaskId};
use crate::view::{PriorityFilter, SortOrder};

const HELP: &str = "\
commands:
  add <text>              add a task with the selected priority
  priority <low|medium|high>
  toggle <#|id>           complete / reopen
  edit <#|id>             open the inline editor, then:
    text <new text>       change the draft text
    prio <priority>       change the draft priority
    save | cancel
  delete <#|id>
  filter <all|low|medium|high|completed>
  sort <default|newest|priority>
  list | logout | help | quit";

/// Inline edit form contents.
#[derive(Debug, Clone)]
struct EditDraft {
    id: TaskId,
    text: String,
    priority: Priority,
}

enum Flow {
    Continue,
    Quit,
}

#[tracing::instrument(skip_all)]
pub fn run_shell<R: BufRead, W: Write>(
    app: &mut App,
    renderer: &Renderer,
    confirm_deletes: bool,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<()> {
    info!("interactive shell started");
    let mut draft: Option<EditDraft> = None;
    renderer.render_screen(out, &app.screen())?;

    loop {
        let prompt = if !app.session().is_logged_in() {
            "name> "
        } else if draft.is_some() {
            "edit> "
        } else {
            "taskflow> "
        };
        write!(out, "{prompt}")?;
        out.flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            writeln!(out)?;
            break;
        }
        let line = line.trim_end_matches(['\n', '\r']);

        let flow = handle_line(app, renderer, confirm_deletes, &mut draft, line, input, out)?;

        if draft.as_ref().map(|d| d.id) != app.editing() {
            draft = None;
        }
        if let Flow::Quit = flow {
            break;
        }
    }

    info!("interactive shell finished");
    Ok(())
}

fn handle_line<R: BufRead, W: Write>(
    app: &mut App,
    renderer: &Renderer,
    confirm_deletes: bool,
    draft: &mut Option<EditDraft>,
    line: &str,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<Flow> {
    let trimmed = line.trim();
    if matches!(trimmed, "quit" | "exit") {
        return Ok(Flow::Quit);
    }
    if trimmed == "help" {
        writeln!(out, "{HELP}")?;
        return Ok(Flow::Continue);
    }

    if !app.session().is_logged_in() {
        if trimmed.is_empty() {
            return Ok(Flow::Continue);
        }
        match app.submit_login(line) {
            Ok(()) => renderer.render_screen(out, &app.screen())?,
            Err(err) => renderer.render_message(out, &err.to_string())?,
        }
        return Ok(Flow::Continue);
    }

    let (command, rest) = trimmed
        .split_once(char::is_whitespace)
        .map(|(command, rest)| (command, rest.trim_start()))
        .unwrap_or((trimmed, ""));
    debug!(command, "shell event");

    let outcome: anyhow::Result<bool> = match command {
        "" | "list" => Ok(true),
        "add" => app.submit_task(rest).map(|_| true).map_err(Into::into),
        "priority" => rest.parse::<Priority>().and_then(|priority| {
            app.select_priority(priority);
            writeln!(out, "priority: {priority}")?;
            Ok(false)
        }),
        "filter" => rest.parse::<PriorityFilter>().map(|filter| {
            app.set_filter(filter);
            true
        }),
        "sort" => rest.parse::<SortOrder>().map(|sort| {
            app.set_sort(sort);
            true
        }),
        "toggle" => select(app, rest).and_then(|id| {
            app.toggle(id)?;
            Ok(true)
        }),
        "edit" => select(app, rest).and_then(|id| {
            app.start_edit(id)?;
            if let Some(task) = app.task(id) {
                *draft = Some(EditDraft {
                    id,
                    text: task.text.clone(),
                    priority: task.priority,
                });
            }
            Ok(true)
        }),
        "text" | "prio" | "save" | "cancel" if draft.is_none() => {
            Err(anyhow::anyhow!("No task is being edited."))
        }
        "text" => {
            if let Some(d) = draft.as_mut() {
                d.text = app.input_task(rest);
                writeln!(out, "draft: {} ({})", d.text, d.priority)?;
            }
            Ok(false)
        }
        "prio" => rest.parse::<Priority>().and_then(|priority| {
            if let Some(d) = draft.as_mut() {
                d.priority = priority;
                writeln!(out, "draft: {} ({})", d.text, d.priority)?;
            }
            Ok(false)
        }),
        "save" => match draft.clone() {
            Some(d) => app
                .save_edit(d.id, &d.text, d.priority)
                .map(|_| {
                    *draft = None;
                    true
                })
                .map_err(Into::into),
            None => Ok(false),
        },
        "cancel" => {
            app.cancel_edit();
            *draft = None;
            Ok(true)
        }
        "delete" => select(app, rest).and_then(|id| {
            let deleted = if confirm_deletes {
                let mut confirm = PromptConfirm {
                    input: &mut *input,
                    out: &mut *out,
                };
                delete_with(app, id, &mut confirm)?
            } else {
                delete_with(app, id, &mut FixedAnswer(true))?
            };
            Ok(deleted)
        }),
        "logout" => {
            app.logout();
            *draft = None;
            Ok(true)
        }
        other => Err(anyhow::anyhow!("Unknown command: {other} (try help)")),
    };

    match outcome {
        Ok(true) => renderer.render_screen(out, &app.screen())?,
        Ok(false) => {}
        Err(err) => renderer.render_message(out, &err.to_string())?,
    }
    Ok(Flow::Continue)
}

fn select(app: &App, selector: &str) -> anyhow::Result<TaskId> {
    Ok(app.find_task(selector)?)
}

fn delete_with(app: &mut App, id: TaskId, confirm: &mut dyn Confirm) -> anyhow::Result<bool> {
    Ok(app.delete(id, confirm)?)
}
