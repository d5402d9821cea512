pub mod api;
pub mod board;
pub mod cli;
pub mod commands;
pub mod config;
pub mod datetime;
pub mod filter;
pub mod render;
pub mod stats;
pub mod task;

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
    "starting taskboard CLI"
  );
  debug!(?pre.rc_overrides, "preprocessed rc overrides");

  let cfg = resolve_config(
    &cli,
    pre.rc_overrides,
    |key| std::env::var(key).ok()
  )?;

  let api_url = cfg.api_url();
  let api = api::HttpTaskApi::new(
    &api_url,
    cfg.api_timeout()?
  )
  .with_context(|| {
    format!(
      "failed to set up API client for \
       {api_url}"
    )
  })?;

  let renderer =
    render::Renderer::new(&cfg)?;
  let board = board::TaskBoard::with_filter(
    api,
    cfg.default_filter()?
  );
  let command = cli.command.unwrap_or(
    cli::Command::List { filter: None }
  );

  let runtime =
    tokio::runtime::Builder::new_multi_thread()
      .enable_all()
      .build()
      .context(
        "failed to start async runtime"
      )?;

  let result = runtime.block_on(
    commands::dispatch(
      &board, &renderer, command
    )
  );
  board.detach();

  result?;
  info!("done");
  Ok(())
}

/// Layers settings lowest first: boardrc,
/// environment, `rc.` overrides, then
/// `--api-url`.
fn resolve_config<E>(
  cli: &cli::GlobalCli,
  positional: Vec<(String, String)>,
  env: E
) -> anyhow::Result<config::Config>
where
  E: Fn(&str) -> Option<String>
{
  let mut cfg =
    config::Config::load_with_env(
      cli.boardrc.as_deref(),
      env
    )?;
  cfg.apply_overrides(
    positional.into_iter().chain(
      cli.rc_overrides.iter().map(|kv| {
        (kv.key.clone(), kv.value.clone())
      })
    )
  );
  if let Some(url) = &cli.api_url {
    cfg.apply_overrides([(
      "api.url".to_string(),
      url.clone()
    )]);
  }
  Ok(cfg)
}
