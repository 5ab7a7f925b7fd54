use std::sync::LazyLock;

use regex::Regex;

pub const MIN_NAME_LENGTH: usize = 2;
pub const MAX_NAME_LENGTH: usize = 21;
pub const MAX_TASK_LENGTH: usize = 50;

static WHITESPACE_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s\s+").expect("whitespace run pattern compiles"));

// Latin letters including the Latin-1 supplement block, plus whitespace.
static NAME_DISALLOWED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^a-zA-Z\x{C0}-\x{FF}\s]").expect("name character pattern compiles")
});

/// Collapses whitespace runs to a single space and truncates to `max_len`
/// characters. Leading and trailing space is kept; callers trim on submit.
pub fn sanitize_text(text: &str, max_len: usize) -> String {
    truncate_chars(&WHITESPACE_RUNS.replace_all(text, " "), max_len)
}

pub fn sanitize_name(name: &str) -> String {
    let letters = NAME_DISALLOWED.replace_all(name, "");
    truncate_chars(&WHITESPACE_RUNS.replace_all(&letters, " "), MAX_NAME_LENGTH)
}

pub fn is_valid_name(name: &str) -> bool {
    name.trim().chars().count() >= MIN_NAME_LENGTH
}

pub fn is_valid_task(text: &str) -> bool {
    !text.trim().is_empty()
}

pub fn truncate_chars(text: &str, max_len: usize) -> String {
    text.chars().take(max_len).collect()
}
