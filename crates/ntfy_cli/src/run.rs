use std::{
    fs::File,
    io::{self, BufRead, BufReader},
    path::PathBuf,
    sync::Arc,
};

use clap::Parser;
use ntfy_client::{
    ConfigError, DispatchRules, NotificationDispatcher, NotificationSession, RegistryError,
    Registries, SessionError, SessionOptions, SessionSummary,
};
use ntfy_events::{IngestConfig, NotificationIngestor};
use thiserror::Error;
use tracing::info;

#[derive(Debug, Parser)]
pub struct Args {
    /// Rules file (TOML) with shell triggers, aliases and pool limits.
    #[arg(long)]
    pub rules: PathBuf,

    /// NDJSON notification stream; stdin when omitted.
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Stop at the first aborted dispatch instead of logging it and continuing.
    #[arg(long)]
    pub halt_on_error: bool,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("failed to open input `{path}`: {source}")]
    Input { path: PathBuf, source: io::Error },
    #[error("failed to start async runtime: {0}")]
    Runtime(io::Error),
    #[error(transparent)]
    Session(#[from] SessionError),
}

pub fn run(args: Args) -> Result<SessionSummary, Error> {
    let rules = DispatchRules::from_path(&args.rules)?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(Error::Runtime)?;
    let pool = Arc::new(rules.shell.pool_builder().build(runtime.handle().clone()));

    let mut registries = Registries::new();
    rules.apply(&mut registries)?;
    let dispatcher = NotificationDispatcher::builder()
        .registries(registries)
        .launcher(pool.clone())
        .failure_policy(rules.failure_policy)
        .build()?;

    let options = SessionOptions {
        halt_on_dispatch_error: args.halt_on_error,
    };
    let config = rules.ingest.ingest_config();
    let result = match args.input.as_ref() {
        Some(path) => {
            let file = File::open(path).map_err(|source| Error::Input {
                path: path.clone(),
                source,
            })?;
            run_session(&dispatcher, BufReader::new(file), config, options)
        }
        None => run_session(&dispatcher, io::stdin().lock(), config, options),
    };

    // Let accepted shell invocations finish before the runtime shuts down.
    runtime.block_on(pool.drain());

    let summary = result?;
    info!(
        notifications = summary.notifications,
        dispatched = summary.dispatched,
        skipped = summary.skipped,
        ingest_errors = summary.ingest_errors,
        dispatch_errors = summary.dispatch_errors,
        isolated_failures = summary.isolated_failures,
        "Session finished"
    );
    Ok(summary)
}

fn run_session<R: BufRead>(
    dispatcher: &NotificationDispatcher,
    reader: R,
    config: IngestConfig,
    options: SessionOptions,
) -> Result<SessionSummary, SessionError> {
    NotificationSession::new(dispatcher, NotificationIngestor::new(reader, config))
        .options(options)
        .run()
}
