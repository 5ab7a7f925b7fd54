use std::ffi::OsString;
use std::io::IsTerminal;
use std::path::PathBuf;

use anyhow::anyhow;
use clap::{ArgAction, Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use crate::task::Priority;
use crate::view::{PriorityFilter, SortOrder};

#[derive(Debug, Clone)]
pub struct PreprocessedArgs {
    pub cleaned_args: Vec<OsString>,
    pub rc_overrides: Vec<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct KeyVal {
    pub key: String,
    pub value: String,
}

impl std::str::FromStr for KeyVal {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (k, v) = s
            .split_once('=')
            .ok_or_else(|| anyhow!("expected KEY=VALUE, got: {s}"))?;
        Ok(Self {
            key: k.trim().to_string(),
            value: v.trim().to_string(),
        })
    }
}

#[derive(Parser, Debug, Clone)]
#[command(
    name = "taskflow",
    version,
    about = "TaskFlow: a name-gated, prioritized task list",
    disable_help_subcommand = true
)]
pub struct GlobalCli {
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,

    #[arg(
        long = "rc",
        value_parser = clap::builder::ValueParser::new(|s: &str| s.parse::<KeyVal>()),
        action = ArgAction::Append
    )]
    pub rc_overrides: Vec<KeyVal>,

    #[arg(long = "config")]
    pub config: Option<PathBuf>,

    #[arg(long = "data")]
    pub data: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Log in with a display name (letters and spaces, at least two letters).
    Login {
        #[arg(required = true, num_args = 1..)]
        name: Vec<String>,
    },
    /// Forget the logged-in name.
    Logout,
    /// Print the logged-in name.
    Whoami,
    /// Add a task.
    Add {
        #[arg(short = 'p', long = "priority")]
        priority: Option<Priority>,
        #[arg(required = true, num_args = 1.., allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Show tasks.
    List {
        #[arg(short = 'f', long = "filter")]
        filter: Option<PriorityFilter>,
        #[arg(short = 's', long = "sort")]
        sort: Option<SortOrder>,
    },
    /// Flip a task between open and completed.
    Toggle { task: String },
    /// Show every field of a task.
    Info { task: String },
    /// Replace a task's text and/or priority.
    Edit {
        task: String,
        #[arg(short = 'p', long = "priority")]
        priority: Option<Priority>,
        #[arg(num_args = 0.., allow_hyphen_values = true)]
        text: Vec<String>,
    },
    /// Remove a task.
    Delete {
        #[arg(short = 'y', long = "yes")]
        yes: bool,
        task: String,
    },
    /// Interactive session.
    Shell,
}

pub fn init_tracing(verbose: u8, quiet: u8) -> anyhow::Result<()> {
    let default_level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_level(true)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

/// Pulls positional `rc.KEY=VALUE` / `rc.KEY:VALUE` overrides out of the
/// argument list before clap sees it.
#[tracing::instrument(skip_all)]
pub fn preprocess_args(raw: &[OsString]) -> anyhow::Result<PreprocessedArgs> {
    let mut cleaned = Vec::with_capacity(raw.len());
    let mut overrides: Vec<(String, String)> = Vec::new();

    let mut iter = raw.iter().cloned();
    if let Some(bin) = iter.next() {
        cleaned.push(bin);
    }

    for arg in iter {
        let s = arg.to_string_lossy();
        if let Some(rest) = s.strip_prefix("rc.") {
            let parsed = rest
                .split_once('=')
                .or_else(|| rest.split_once(':'))
                .map(|(k, v)| (format!("rc.{k}"), v.to_string()));

            if let Some((k, v)) = parsed {
                debug!(key = %k, value = %v, "captured positional rc override");
                overrides.push((k, v));
                continue;
            }
        }

        cleaned.push(arg);
    }

    Ok(PreprocessedArgs {
        cleaned_args: cleaned,
        rc_overrides: overrides,
    })
}

#[cfg(test)]
mod tests {
    use std::ffi::OsString;

    use clap::Parser;

    use super::*;

    fn args(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn positional_rc_overrides_are_extracted() {
        let pre = preprocess_args(&args(&[
            "taskflow",
            "rc.color=off",
            "list",
            "rc.default.sort:priority",
        ]))
        .expect("preprocess");
        assert_eq!(pre.cleaned_args, args(&["taskflow", "list"]));
        assert_eq!(
            pre.rc_overrides,
            vec![
                ("rc.color".to_string(), "off".to_string()),
                ("rc.default.sort".to_string(), "priority".to_string()),
            ]
        );
    }

    #[test]
    fn add_parses_priority_and_words() {
        let cli = GlobalCli::try_parse_from(["taskflow", "add", "-p", "high", "Pay", "rent"])
            .expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::Add {
                priority: Some(Priority::High),
                text: vec!["Pay".to_string(), "rent".to_string()],
            })
        );
    }

    #[test]
    fn list_rejects_unknown_filter() {
        assert!(GlobalCli::try_parse_from(["taskflow", "list", "--filter", "urgent"]).is_err());
        let cli = GlobalCli::try_parse_from([
            "taskflow",
            "list",
            "-f",
            "completed",
            "-s",
            "newest",
        ])
        .expect("parse");
        assert_eq!(
            cli.command,
            Some(Command::List {
                filter: Some(PriorityFilter::Completed),
                sort: Some(SortOrder::Newest),
            })
        );
    }

    #[test]
    fn rc_flag_parses_key_value() {
        let cli = GlobalCli::try_parse_from(["taskflow", "--rc", "color=off", "whoami"])
            .expect("parse");
        assert_eq!(cli.rc_overrides.len(), 1);
        assert_eq!(cli.rc_overrides[0].key, "color");
        assert_eq!(cli.rc_overrides[0].value, "off");
        assert!("novalue".parse::<KeyVal>().is_err());
    }
}
