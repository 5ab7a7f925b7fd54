use std::io::{BufRead, Write};

use anyhow::anyhow;
use tracing::{debug, info, instrument};

use crate::app::{App, Confirm};
use crate::cli::Command;
use crate::render::Renderer;
use crate::shell;
use crate::task::TaskId;

/// Prompts on `out` and reads one answer line from `input`.
pub struct PromptConfirm<'a, R, W> {
    pub input: &'a mut R,
    pub out: &'a mut W,
}

impl<R: BufRead, W: Write> Confirm for PromptConfirm<'_, R, W> {
    fn confirm(&mut self, message: &str) -> bool {
        if write!(self.out, "{message} [y/N] ").and_then(|()| self.out.flush()).is_err() {
            return false;
        }
        let mut answer = String::new();
        match self.input.read_line(&mut answer) {
            Ok(_) => matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"),
            Err(err) => {
                debug!(error = %err, "confirmation read failed; treating as no");
                false
            }
        }
    }
}

fn resolve(app: &App, selector: &str) -> anyhow::Result<TaskId> {
    Ok(app.find_task(selector)?)
}

#[instrument(skip(app, renderer, command, input, out))]
pub fn dispatch<R: BufRead, W: Write>(
    app: &mut App,
    renderer: &Renderer,
    command: Command,
    confirm_deletes: bool,
    input: &mut R,
    out: &mut W,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    match command {
        Command::Login { name } => {
            app.submit_login(&name.join(" "))?;
            renderer.render_screen(out, &app.screen())
        }
        Command::Logout => {
            app.logout();
            writeln!(out, "Logged out.")?;
            Ok(())
        }
        Command::Whoami => {
            match app.session().name() {
                Some(name) => writeln!(out, "{name}")?,
                None => writeln!(out, "Not logged in.")?,
            }
            Ok(())
        }
        Command::Add { priority, text } => {
            if let Some(priority) = priority {
                app.select_priority(priority);
            }
            let id = app.submit_task(&text.join(" "))?;
            info!(%id, "command add");
            writeln!(out, "Created task {}.", id.short())?;
            Ok(())
        }
        Command::List { filter, sort } => {
            if let Some(filter) = filter {
                app.set_filter(filter);
            }
            if let Some(sort) = sort {
                app.set_sort(sort);
            }
            renderer.render_screen(out, &app.screen())
        }
        Command::Toggle { task } => {
            let id = resolve(app, &task)?;
            app.toggle(id)?;
            let state = match app.task(id) {
                Some(task) if task.completed => "completed",
                _ => "reopened",
            };
            writeln!(out, "Task {} {state}.", id.short())?;
            Ok(())
        }
        Command::Info { task } => {
            let id = resolve(app, &task)?;
            let index = app
                .position(id)
                .ok_or_else(|| anyhow!("task vanished during lookup"))?;
            let task = app
                .task(id)
                .ok_or_else(|| anyhow!("task vanished during lookup"))?;
            renderer.render_task_info(out, index, task)
        }
        Command::Edit {
            task,
            priority,
            text,
        } => {
            let id = resolve(app, &task)?;
            let current = app
                .task(id)
                .cloned()
                .ok_or_else(|| anyhow!("task vanished during lookup"))?;
            let text = if text.is_empty() {
                current.text.clone()
            } else {
                text.join(" ")
            };
            app.start_edit(id)?;
            let result = app.save_edit(id, &text, priority.unwrap_or(current.priority));
            if result.is_err() {
                app.cancel_edit();
            }
            result?;
            writeln!(out, "Updated task {}.", id.short())?;
            Ok(())
        }
        Command::Delete { yes, task } => {
            let id = resolve(app, &task)?;
            let deleted = if yes || !confirm_deletes {
                app.delete(id, &mut crate::app::FixedAnswer(true))?
            } else {
                app.delete(id, &mut PromptConfirm { input, out: &mut *out })?
            };
            if deleted {
                writeln!(out, "Deleted task {}.", id.short())?;
            } else {
                writeln!(out, "Kept task {}.", id.short())?;
            }
            Ok(())
        }
        Command::Shell => shell::run_shell(app, renderer, confirm_deletes, input, out),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;
    use std::sync::Arc;

    use super::*;
    use crate::app::AppDefaults;
    use crate::error::UserError;
    use crate::kvstore::{MemoryKvStore, Storage};
    use crate::task::Priority;
    use crate::view::{PriorityFilter, SortOrder};

    fn run(app: &mut App, command: Command, stdin: &str) -> anyhow::Result<String> {
        let mut input = Cursor::new(stdin.as_bytes().to_vec());
        let mut out = Vec::new();
        dispatch(app, &Renderer::plain(), command, true, &mut input, &mut out)?;
        Ok(String::from_utf8(out).expect("utf8"))
    }

    fn app() -> App {
        App::new(Storage::new(Arc::new(MemoryKvStore::new())), AppDefaults::default())
    }

    fn words(text: &str) -> Vec<String> {
        text.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn login_then_list_shows_greeting() {
        let mut app = app();
        let out = run(&mut app, Command::Login { name: words("Ada") }, "").expect("login");
        assert!(out.starts_with("Welcome, Ada!"));
        assert!(out.contains("No tasks."));
    }

    #[test]
    fn add_before_login_reports_user_error() {
        let mut app = app();
        let err = run(
            &mut app,
            Command::Add {
                priority: None,
                text: words("Buy milk"),
            },
            "",
        )
        .expect_err("must log in first");
        assert_eq!(err.downcast_ref::<UserError>(), Some(&UserError::NotLoggedIn));
    }

    #[test]
    fn list_applies_filter_and_sort() {
        let mut app = app();
        run(&mut app, Command::Login { name: words("Ada") }, "").expect("login");
        run(
            &mut app,
            Command::Add {
                priority: Some(Priority::Low),
                text: words("Buy milk"),
            },
            "",
        )
        .expect("add");
        run(
            &mut app,
            Command::Add {
                priority: Some(Priority::High),
                text: words("Pay rent"),
            },
            "",
        )
        .expect("add");

        let out = run(
            &mut app,
            Command::List {
                filter: Some(PriorityFilter::All),
                sort: Some(SortOrder::Priority),
            },
            "",
        )
        .expect("list");
        let rent = out.find("Pay rent").expect("rent");
        let milk = out.find("Buy milk").expect("milk");
        assert!(rent < milk);
    }

    #[test]
    fn delete_prompts_and_honours_answer() {
        let mut app = app();
        app.submit_login("Ada").expect("login");
        app.submit_task("Buy milk").expect("add");

        let out = run(
            &mut app,
            Command::Delete {
                yes: false,
                task: "1".to_string(),
            },
            "n\n",
        )
        .expect("delete");
        assert!(out.contains("Do you really want to delete this task?"));
        assert!(out.contains("Kept task"));
        assert_eq!(app.tasks().len(), 1);

        run(
            &mut app,
            Command::Delete {
                yes: false,
                task: "1".to_string(),
            },
            "y\n",
        )
        .expect("delete");
        assert!(app.tasks().is_empty());
    }

    #[test]
    fn edit_with_blank_text_is_rejected() {
        let mut app = app();
        app.submit_login("Ada").expect("login");
        app.submit_task("Buy milk").expect("add");

        let err = run(
            &mut app,
            Command::Edit {
                task: "1".to_string(),
                priority: None,
                text: vec!["   ".to_string()],
            },
            "",
        )
        .expect_err("blank edit");
        assert_eq!(err.downcast_ref::<UserError>(), Some(&UserError::EmptyEdit));
        assert_eq!(app.tasks()[0].text, "Buy milk");
        assert_eq!(app.editing(), None);
    }

    #[test]
    fn edit_priority_only_keeps_text() {
        let mut app = app();
        app.submit_login("Ada").expect("login");
        app.submit_task("Buy milk").expect("add");

        run(
            &mut app,
            Command::Edit {
                task: "1".to_string(),
                priority: Some(Priority::High),
                text: vec![],
            },
            "",
        )
        .expect("edit");
        assert_eq!(app.tasks()[0].text, "Buy milk");
        assert_eq!(app.tasks()[0].priority, Priority::High);
    }

    #[test]
    fn unknown_selector_is_reported() {
        let mut app = app();
        app.submit_login("Ada").expect("login");
        let err = run(
            &mut app,
            Command::Toggle {
                task: "9".to_string(),
            },
            "",
        )
        .expect_err("missing");
        assert_eq!(
            err.downcast_ref::<UserError>(),
            Some(&UserError::TaskNotFound("9".to_string()))
        );
    }
}
