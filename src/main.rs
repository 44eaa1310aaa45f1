//! keyweave -- input remapping daemon.
//!
//! Entry point, daemon lifecycle, and signal handling.
//!
//! Usage: `keyweave [CONFIG]`. Without an argument the config is looked up in
//! `./config.toml`, then `/etc/keyweave/config.toml`.

#[cfg(not(target_os = "linux"))]
compile_error!("keyweave talks to evdev and uinput and only builds on Linux");

mod binding;
mod config;
mod engine;
mod event_bus;
mod held_keys;
mod output;
mod platform;
mod reactor;
mod undo;

use std::path::PathBuf;

use thiserror::Error;

use config::{Config, ConfigError};
use engine::Engine;
use output::RepeatingOutput;
use platform::PlatformError;

#[derive(Debug, Error)]
enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error("failed to start runtime: {0}")]
    Runtime(#[from] std::io::Error),
}

fn main() {
    if let Err(e) = run() {
        log::error!("{e}");
        std::process::exit(1);
    }
}

fn run() -> Result<(), DaemonError> {
    let loaded = config::locate(std::env::args_os().nth(1).map(PathBuf::from))
        .and_then(|path| config::load(&path).map(|config| (path, config)));

    // RUST_LOG wins over the configured level.
    let level = match &loaded {
        Ok((_, config)) => config.general.log_level.clone(),
        Err(_) => "info".to_owned(),
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    let (path, config) = loaded?;
    log::info!("keyweave v{} using {}", env!("CARGO_PKG_VERSION"), path.display());

    let rt = tokio::runtime::Builder::new_current_thread().enable_all().build()?;
    rt.block_on(daemon(config))
}

async fn daemon(config: Config) -> Result<(), DaemonError> {
    let (tx, mut rx) = event_bus::channel();

    let output = RepeatingOutput::new(
        platform::linux::create_virtual_devices()?,
        config.general.key_repeat_delay(),
        config.general.key_repeat_interval(),
    );
    let host = platform::linux::create_process_host(&config.general.shell, tx.clone());
    let mut engine = Engine::new(config.bindings, config.general.engine_settings(), output, host);

    let mut capture = platform::linux::create_input_capture();
    capture.start(tx)?;

    reactor::run(&mut engine, &mut rx, shutdown_signal()).await;

    capture.stop()?;
    log::info!("keyweave stopped");
    Ok(())
}

/// Completes on Ctrl-C or SIGTERM.
async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("cannot listen for Ctrl-C: {e}");
            std::future::pending::<()>().await;
        }
    };
    match signal(SignalKind::terminate()) {
        Ok(mut term) => {
            tokio::select! {
                _ = ctrl_c => {}
                _ = term.recv() => {}
            }
        }
        Err(e) => {
            log::warn!("cannot listen for SIGTERM: {e}");
            ctrl_c.await;
        }
    }
    log::info!("shutdown signal received");
}
