pub mod app;
pub mod cli;
pub mod commands;
pub mod config;
pub mod dashboard;
pub mod datetime;
pub mod error;
pub mod filter;
pub mod flashcard;
pub mod hooks;
pub mod mood;
pub mod pomodoro;
pub mod render;
pub mod stats;
pub mod store;
pub mod task;
pub mod tasks;
pub mod timer;
pub mod user;

use std::ffi::OsString;

use anyhow::Context;
use clap::Parser;
use tracing::{
  debug,
  info
};

#[tracing::instrument(skip_all)]
pub fn run(
  raw_args: Vec<OsString>
) -> anyhow::Result<()> {
  let pre =
    cli::preprocess_args(&raw_args)?;
  let cli = cli::GlobalCli::parse_from(
    pre.cleaned_args
  );

  cli::init_tracing(
    cli.verbose,
    cli.quiet
  )?;

  info!(
    verbose = cli.verbose,
    quiet = cli.quiet,
    "starting focusboard"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let mut cfg = config::Config::load(
    cli.config.as_deref()
  )?;
  cfg.apply_overrides(
    pre.rc_overrides.into_iter().chain(
      cli
        .rc_overrides
        .into_iter()
        .map(|kv| (kv.key, kv.value))
    )
  );
  let settings =
    config::Settings::from_config(&cfg);

  let store = if cli.ephemeral {
    info!("using in-memory store");
    store::Store::in_memory()
  } else {
    let data_dir =
      config::resolve_data_dir(
        &cfg,
        cli.data.as_deref()
      )
      .context(
        "failed to resolve data \
         directory"
      )?;
    let backend =
      store::FileBackend::open(
        &data_dir
      )
      .with_context(|| {
        format!(
          "failed to open data \
           directory {}",
          data_dir.display()
        )
      })?;
    store::Store::new(backend)
  };

  let mut app =
    app::App::with_system_clock(
      store, settings
    );
  let mut renderer =
    render::Renderer::new(&cfg);

  commands::dispatch(
    &mut app,
    &mut renderer,
    cli.command
  )?;

  info!("done");
  Ok(())
}
