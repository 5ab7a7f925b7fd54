use thiserror::Error;

use crate::validation::MIN_NAME_LENGTH;

/// Failures shown to the user as a message. None of them change state.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserError {
    #[error(
        "Please enter a valid name. It must contain at least {} letters.",
        MIN_NAME_LENGTH
    )]
    InvalidName,

    #[error("Task text cannot be empty!")]
    EmptyTask,

    #[error("Task text cannot be empty.")]
    EmptyEdit,

    #[error("Please log in first.")]
    NotLoggedIn,

    #[error("No task matches {0:?}.")]
    TaskNotFound(String),

    #[error("Several tasks match {0:?}; type more of the id.")]
    AmbiguousTask(String),

    #[error("Task {0} is not being edited.")]
    NotEditing(String),
}
