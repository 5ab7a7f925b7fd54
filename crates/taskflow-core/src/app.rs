//! Composition root. `App` owns every piece of application state and exposes
//! one method per user event; each call runs to completion before the next.

use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::UserError;
use crate::kvstore::Storage;
use crate::session::Session;
use crate::task::{Priority, Task, TaskId};
use crate::task_store::TaskStore;
use crate::validation::{MAX_TASK_LENGTH, is_valid_task, sanitize_name, sanitize_text};
use crate::view::{PriorityFilter, Row, RowMode, SortOrder, row_for, visible_tasks};

pub const DELETE_PROMPT: &str = "Do you really want to delete this task?";

/// Blocking yes/no question asked before destructive actions.
pub trait Confirm {
    fn confirm(&mut self, message: &str) -> bool;
}

/// Answers every question the same way.
#[derive(Debug, Clone, Copy)]
pub struct FixedAnswer(pub bool);

impl Confirm for FixedAnswer {
    fn confirm(&mut self, _message: &str) -> bool {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AppDefaults {
    pub filter: PriorityFilter,
    pub sort: SortOrder,
    pub priority: Priority,
}

impl Default for AppDefaults {
    fn default() -> Self {
        Self {
            filter: PriorityFilter::All,
            sort: SortOrder::Default,
            priority: Priority::Low,
        }
    }
}

impl AppDefaults {
    pub fn from_config(cfg: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            filter: cfg.default_filter()?,
            sort: cfg.default_sort()?,
            priority: cfg.default_priority()?,
        })
    }
}

/// What the renderer should put on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Screen {
    Login,
    Dashboard {
        greeting: String,
        filter: PriorityFilter,
        sort: SortOrder,
        rows: Vec<Row>,
    },
}

#[derive(Debug)]
pub struct App {
    session: Session,
    tasks: TaskStore,
    defaults: AppDefaults,
    filter: PriorityFilter,
    sort: SortOrder,
    priority: Priority,
    editing: Option<TaskId>,
}

impl App {
    pub fn new(storage: Storage, defaults: AppDefaults) -> Self {
        Self {
            session: Session::new(storage.clone()),
            tasks: TaskStore::new(storage),
            defaults,
            filter: defaults.filter,
            sort: defaults.sort,
            priority: defaults.priority,
            editing: None,
        }
    }

    /// Startup: a persisted name skips the login screen.
    #[tracing::instrument(skip(self))]
    pub fn boot(&mut self) -> bool {
        if self.session.restore() {
            self.enter_dashboard();
            true
        } else {
            false
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn tasks(&self) -> &[Task] {
        self.tasks.tasks()
    }

    pub fn sort(&self) -> SortOrder {
        self.sort
    }

    pub fn editing(&self) -> Option<TaskId> {
        self.editing
    }

    pub fn input_name(&self, raw: &str) -> String {
        sanitize_name(raw)
    }

    pub fn input_task(&self, raw: &str) -> String {
        sanitize_text(raw, MAX_TASK_LENGTH)
    }

    #[tracing::instrument(skip(self, raw))]
    pub fn submit_login(&mut self, raw: &str) -> Result<(), UserError> {
        let name = self.input_name(raw);
        self.session.login(&name)?;
        self.enter_dashboard();
        Ok(())
    }

    fn enter_dashboard(&mut self) {
        self.tasks.init();
        self.editing = None;
    }

    /// Full reset back to the login screen. Tasks stay persisted under
    /// their own key and are reloaded on the next login.
    #[tracing::instrument(skip(self))]
    pub fn logout(&mut self) {
        self.session.logout();
        self.tasks.clear();
        self.editing = None;
        self.filter = self.defaults.filter;
        self.sort = self.defaults.sort;
        self.priority = self.defaults.priority;
    }

    fn require_login(&self) -> Result<(), UserError> {
        if self.session.is_logged_in() {
            Ok(())
        } else {
            Err(UserError::NotLoggedIn)
        }
    }

    pub fn select_priority(&mut self, priority: Priority) {
        self.priority = priority;
    }

    pub fn set_filter(&mut self, filter: PriorityFilter) {
        debug!(%filter, "filter changed");
        self.filter = filter;
        self.editing = None;
    }

    pub fn set_sort(&mut self, sort: SortOrder) {
        debug!(%sort, "sort changed");
        self.sort = sort;
        self.editing = None;
    }

    /// Adds a task with the currently selected priority.
    #[tracing::instrument(skip(self, raw))]
    pub fn submit_task(&mut self, raw: &str) -> Result<TaskId, UserError> {
        self.require_login()?;
        let text = self.input_task(raw);
        if !is_valid_task(&text) {
            return Err(UserError::EmptyTask);
        }
        let id = self.tasks.add(text.trim(), self.priority);
        self.editing = None;
        info!(%id, priority = %self.priority, "task created");
        Ok(id)
    }

    #[tracing::instrument(skip(self))]
    pub fn toggle(&mut self, id: TaskId) -> Result<bool, UserError> {
        self.require_login()?;
        self.editing = None;
        Ok(self.tasks.toggle_by_id(id))
    }

    #[tracing::instrument(skip(self, confirm))]
    pub fn delete(&mut self, id: TaskId, confirm: &mut dyn Confirm) -> Result<bool, UserError> {
        self.require_login()?;
        if self.tasks.position(id).is_none() {
            return Ok(false);
        }
        if !confirm.confirm(DELETE_PROMPT) {
            debug!(%id, "delete declined");
            return Ok(false);
        }
        if self.editing == Some(id) {
            self.editing = None;
        }
        Ok(self.tasks.delete_by_id(id).is_some())
    }

    #[tracing::instrument(skip(self))]
    pub fn start_edit(&mut self, id: TaskId) -> Result<bool, UserError> {
        self.require_login()?;
        if self.tasks.position(id).is_none() {
            return Ok(false);
        }
        self.editing = Some(id);
        Ok(true)
    }

    /// Commits the inline edit form. The text is sanitized and then trimmed
    /// of edge whitespace before it is stored, the same as a new task. Blank
    /// text keeps the row in editing mode and leaves the task untouched.
    #[tracing::instrument(skip(self, raw_text))]
    pub fn save_edit(
        &mut self,
        id: TaskId,
        raw_text: &str,
        priority: Priority,
    ) -> Result<bool, UserError> {
        self.require_login()?;
        if self.editing != Some(id) {
            return Err(UserError::NotEditing(id.short()));
        }

        let text = sanitize_text(raw_text, MAX_TASK_LENGTH);
        if !is_valid_task(&text) {
            warn!(%id, "rejected blank edit");
            return Err(UserError::EmptyEdit);
        }

        let updated = self.tasks.update_by_id(id, text.trim(), priority);
        self.editing = None;
        Ok(updated)
    }

    pub fn cancel_edit(&mut self) {
        self.editing = None;
    }

    pub fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks.position(id).and_then(|index| self.tasks.get(index))
    }

    pub fn position(&self, id: TaskId) -> Option<usize> {
        self.tasks.position(id)
    }

    /// Resolves a user-typed selector: an id prefix of at least four hex
    /// digits, or the 1-based `#` position in the unfiltered list. Shorter
    /// selectors are positions only; longer ones fall back to a position
    /// when no id starts with them.
    pub fn find_task(&self, selector: &str) -> Result<TaskId, UserError> {
        let selector = selector.trim();
        let not_found = || UserError::TaskNotFound(selector.to_string());
        if selector.len() >= 4 {
            let mut matches = self
                .tasks
                .tasks()
                .iter()
                .filter(|task| task.id.matches_prefix(selector));
            if let Some(first) = matches.next() {
                if matches.next().is_some() {
                    return Err(UserError::AmbiguousTask(selector.to_string()));
                }
                return Ok(first.id);
            }
        }

        let position = selector.parse::<usize>().map_err(|_| not_found())?;
        position
            .checked_sub(1)
            .and_then(|index| self.tasks.get(index))
            .map(|task| task.id)
            .ok_or_else(not_found)
    }

    pub fn rows(&self) -> Vec<Row> {
        visible_tasks(self.tasks.tasks(), self.filter, self.sort)
            .iter()
            .map(|view| {
                let mode = if self.editing == Some(view.id) {
                    RowMode::Editing
                } else {
                    RowMode::Normal
                };
                row_for(view, mode)
            })
            .collect()
    }

    pub fn screen(&self) -> Screen {
        match self.session.name() {
            None => Screen::Login,
            Some(name) => Screen::Dashboard {
                greeting: format!("Welcome, {name}!"),
                filter: self.filter,
                sort: self.sort,
                rows: self.rows(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::kvstore::{KeyValueStore, MemoryKvStore, SESSION_KEY, TASKS_KEY};

    fn app() -> (App, Storage) {
        let storage = Storage::new(Arc::new(MemoryKvStore::new()));
        (App::new(storage.clone(), AppDefaults::default()), storage)
    }

    fn logged_in() -> (App, Storage) {
        let (mut app, storage) = app();
        app.submit_login("Ada").expect("login");
        (app, storage)
    }

    fn labels(app: &App) -> Vec<String> {
        app.rows().into_iter().map(|row| row.label).collect()
    }

    #[test]
    fn login_shows_greeting_with_exact_name() {
        let (mut app, storage) = app();
        assert_eq!(app.screen(), Screen::Login);

        app.submit_login("  Ada  Lovelace ").expect("login");
        match app.screen() {
            Screen::Dashboard { greeting, .. } => assert_eq!(greeting, "Welcome, Ada Lovelace!"),
            Screen::Login => panic!("expected dashboard"),
        }
        assert_eq!(storage.get_session().as_deref(), Some("Ada Lovelace"));
    }

    #[test]
    fn name_sanitized_to_single_letter_is_rejected() {
        let (mut app, storage) = app();
        assert_eq!(app.submit_login("A1!"), Err(UserError::InvalidName));
        assert_eq!(app.screen(), Screen::Login);
        assert_eq!(storage.get_session(), None);
    }

    #[test]
    fn boot_restores_session_and_tasks() {
        let (mut app, storage) = logged_in();
        app.submit_task("Buy milk").expect("add");

        let mut rebooted = App::new(storage, AppDefaults::default());
        assert!(rebooted.boot());
        assert_eq!(labels(&rebooted), vec!["Buy milk"]);
    }

    #[test]
    fn mutations_require_login() {
        let (mut app, _) = app();
        assert_eq!(app.submit_task("x"), Err(UserError::NotLoggedIn));
    }

    #[test]
    fn new_task_is_last_in_default_view() {
        let (mut app, _) = logged_in();
        app.submit_task("first").expect("add");
        app.submit_task("  second   task ").expect("add");
        assert_eq!(labels(&app), vec!["first", "second task"]);
    }

    #[test]
    fn blank_task_is_rejected() {
        let (mut app, _) = logged_in();
        assert_eq!(app.submit_task("   \t  "), Err(UserError::EmptyTask));
        assert!(app.tasks().is_empty());
    }

    #[test]
    fn priority_sort_scenario() {
        let (mut app, _) = logged_in();
        app.select_priority(Priority::Low);
        app.submit_task("Buy milk").expect("add");
        app.select_priority(Priority::High);
        app.submit_task("Pay rent").expect("add");

        app.set_filter(PriorityFilter::All);
        app.set_sort(SortOrder::Priority);
        assert_eq!(labels(&app), vec!["Pay rent", "Buy milk"]);
    }

    #[test]
    fn toggled_task_appears_under_completed_only() {
        let (mut app, _) = logged_in();
        let first = app.submit_task("Buy milk").expect("add");
        app.submit_task("Pay rent").expect("add");

        assert_eq!(app.toggle(first), Ok(true));
        app.set_filter(PriorityFilter::Completed);
        assert_eq!(labels(&app), vec!["Buy milk"]);

        app.set_filter(PriorityFilter::All);
        assert_eq!(labels(&app), vec!["Pay rent"]);
    }

    #[test]
    fn blank_edit_is_rejected_and_keeps_text() {
        let (mut app, storage) = logged_in();
        app.submit_task("Buy milk").expect("add");
        let second = app.submit_task("Pay rent").expect("add");

        assert_eq!(app.start_edit(second), Ok(true));
        assert_eq!(app.save_edit(second, "   ", Priority::Low), Err(UserError::EmptyEdit));
        assert_eq!(app.tasks()[1].text, "Pay rent");
        assert_eq!(storage.get_tasks()[1].text, "Pay rent");
        assert_eq!(app.editing(), Some(second));
    }

    #[test]
    fn edit_row_switches_mode_until_save() {
        let (mut app, _) = logged_in();
        let id = app.submit_task("Draft").expect("add");

        app.start_edit(id).expect("start");
        assert_eq!(app.rows()[0].mode, RowMode::Editing);

        assert_eq!(app.save_edit(id, " Final   copy ", Priority::High), Ok(true));
        let row = &app.rows()[0];
        assert_eq!(row.mode, RowMode::Normal);
        assert_eq!(row.label, "Final copy");
        assert_eq!(row.priority, Priority::High);
    }

    #[test]
    fn save_without_start_edit_is_an_error() {
        let (mut app, _) = logged_in();
        let id = app.submit_task("Draft").expect("add");
        assert!(matches!(
            app.save_edit(id, "x", Priority::Low),
            Err(UserError::NotEditing(_))
        ));
    }

    #[test]
    fn cancel_edit_restores_normal_row() {
        let (mut app, _) = logged_in();
        let id = app.submit_task("Draft").expect("add");
        app.start_edit(id).expect("start");
        app.cancel_edit();
        assert_eq!(app.rows()[0].mode, RowMode::Normal);
        assert_eq!(app.rows()[0].label, "Draft");
    }

    #[test]
    fn delete_respects_confirmation() {
        let (mut app, _) = logged_in();
        let id = app.submit_task("Keep?").expect("add");

        assert_eq!(app.delete(id, &mut FixedAnswer(false)), Ok(false));
        assert_eq!(app.tasks().len(), 1);

        assert_eq!(app.delete(id, &mut FixedAnswer(true)), Ok(true));
        assert!(app.tasks().is_empty());
        assert_eq!(app.delete(id, &mut FixedAnswer(true)), Ok(false));
        assert_eq!(app.toggle(id), Ok(false));
    }

    #[test]
    fn logout_resets_state_but_keeps_tasks_persisted() {
        let (mut app, storage) = logged_in();
        app.submit_task("Buy milk").expect("add");
        app.set_sort(SortOrder::Newest);

        app.logout();
        assert_eq!(app.screen(), Screen::Login);
        assert!(app.tasks().is_empty());
        assert_eq!(app.sort(), SortOrder::Default);
        assert_eq!(storage.get_tasks().len(), 1);

        app.submit_login("Grace").expect("login");
        assert_eq!(labels(&app), vec!["Buy milk"]);
    }

    #[test]
    fn find_task_by_position_or_prefix() {
        let (mut app, _) = logged_in();
        let first = app.submit_task("a").expect("add");
        let second = app.submit_task("b").expect("add");

        assert_eq!(app.find_task("1"), Ok(first));
        assert_eq!(app.find_task("2"), Ok(second));
        assert_eq!(
            app.find_task("0"),
            Err(UserError::TaskNotFound("0".to_string()))
        );
        assert_eq!(
            app.find_task("3"),
            Err(UserError::TaskNotFound("3".to_string()))
        );
        assert_eq!(app.find_task(&second.short()), Ok(second));
        assert_eq!(
            app.find_task("ab"),
            Err(UserError::TaskNotFound("ab".to_string()))
        );
    }

    fn booted_with(records: &str) -> App {
        let backend = Arc::new(MemoryKvStore::new());
        backend.set(SESSION_KEY, "Ada").expect("seed session");
        backend.set(TASKS_KEY, records).expect("seed tasks");
        let mut app = App::new(Storage::new(backend), AppDefaults::default());
        assert!(app.boot());
        app
    }

    #[test]
    fn all_digit_short_id_resolves_to_its_task() {
        let app = booted_with(
            r#"[
                {"id":"11111111-1111-4000-8000-111111111111","text":"one","priority":"low"},
                {"id":"00000002-0000-4000-8000-000000000000","text":"two","priority":"low"}
            ]"#,
        );
        let one = app.tasks()[0].id;
        let two = app.tasks()[1].id;
        assert_eq!(two.short(), "00000002");

        assert_eq!(app.find_task("00000002"), Ok(two));
        assert_eq!(app.find_task("1111"), Ok(one));
        assert_eq!(app.find_task("2"), Ok(two));
        assert_eq!(app.find_task("1"), Ok(one));
    }

    #[test]
    fn shared_id_prefix_is_reported_as_ambiguous() {
        let app = booted_with(
            r#"[
                {"id":"abcd1111-1111-4000-8000-111111111111","text":"one","priority":"low"},
                {"id":"abcd2222-2222-4000-8000-222222222222","text":"two","priority":"low"}
            ]"#,
        );

        assert_eq!(
            app.find_task("abcd"),
            Err(UserError::AmbiguousTask("abcd".to_string()))
        );
        assert_eq!(app.find_task("abcd2"), Ok(app.tasks()[1].id));
    }
}
