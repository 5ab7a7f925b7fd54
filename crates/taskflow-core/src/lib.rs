pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod kvstore;
pub mod render;
pub mod session;
pub mod shell;
pub mod task;
pub mod task_store;
pub mod validation;
pub mod view;

use std::ffi::OsString;
use std::io;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing::{debug, info};

#[tracing::instrument(skip_all)]
pub fn run(raw_args: Vec<OsString>) -> anyhow::Result<()> {
    let pre = cli::preprocess_args(&raw_args)?;
    let cli = cli::GlobalCli::parse_from(pre.cleaned_args);

    cli::init_tracing(cli.verbose, cli.quiet)?;

    info!(
        verbose = cli.verbose,
        quiet = cli.quiet,
        "starting taskflow CLI"
    );
    debug!(?pre.rc_overrides, "preprocessed rc overrides");

    let mut cfg = config::Config::load(cli.config.as_deref())?;
    cfg.apply_overrides(
        pre.rc_overrides
            .into_iter()
            .chain(cli.rc_overrides.into_iter().map(|kv| (kv.key, kv.value))),
    );

    let data_dir = config::resolve_data_dir(&cfg, cli.data.as_deref())
        .context("failed to resolve data directory")?;

    let backend = kvstore::FileKvStore::open(&data_dir)
        .with_context(|| format!("failed to open storage at {}", data_dir.display()))?;
    let storage = kvstore::Storage::new(Arc::new(backend));

    let defaults = app::AppDefaults::from_config(&cfg)?;
    let mut app = app::App::new(storage, defaults);
    app.boot();

    let renderer = render::Renderer::new(&cfg)?;
    let command = cli.command.unwrap_or(cli::Command::List {
        filter: None,
        sort: None,
    });

    let stdin = io::stdin();
    let stdout = io::stdout();
    commands::dispatch(
        &mut app,
        &renderer,
        command,
        cfg.confirmation(),
        &mut stdin.lock(),
        &mut stdout.lock(),
    )?;

    info!("done");
    Ok(())
}
