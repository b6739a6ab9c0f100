pub mod bootstrap;
pub mod cli;
mod commands;
pub mod listener;
pub mod sentiment;
pub mod settings;
#[cfg(test)]
mod test_log;
pub mod utils;

use anyhow::{Context, Result};
use bootstrap::Page;
use clap::Parser;
use cli::CliArgs;
use log::debug;
use settings::{
    base_url_from_env, get_default_settings, load_or_create_settings, AppSettings, Environment,
};

fn init_logging(debug: bool) {
    let default_level = if debug { "debug" } else { "info" };
    // RUST_LOG wins over --debug when set.
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .format_timestamp_millis()
        .format_target(false)
        .target(env_logger::Target::Stderr)
        .try_init();
}

fn resolve_settings(args: &CliArgs) -> Result<AppSettings> {
    let mut settings = match &args.config {
        Some(path) => load_or_create_settings(path)?,
        None => get_default_settings(),
    };

    settings.apply_environment(Environment::from_env(), base_url_from_env());

    if let Some(url) = &args.base_url {
        settings.base_url = url.trim().trim_end_matches('/').to_string();
    }

    debug!("Resolved settings: {:?}", settings);
    Ok(settings)
}

pub fn run() -> Result<()> {
    let args = CliArgs::parse();
    init_logging(args.debug);

    let settings = resolve_settings(&args)?;
    let page = Page::new(settings);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;

    runtime.block_on(commands::run_command(args.command, page))
}
