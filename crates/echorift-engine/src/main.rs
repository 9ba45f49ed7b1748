//! Headless runner for the EchoRift event.
//!
//! Wires the event to an in-memory world populated by wandering actors,
//! a YAML data file and an operator console on stdin. Runs until the
//! console says `quit` or the process receives Ctrl-C.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `ECHORIFT_CONFIG` or `echorift-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Create the starting world
//! 4. Create the event and restore or auto-start it
//! 5. Spawn wanderers
//! 6. Step wanderers, relay chat and serve the console
//! 7. Shut down and persist

mod error;
mod spawner;

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use echorift_core::config::{Rejected, decode_lenient};
use echorift_core::{EchoConfig, EchoEvent, EventParts, OperatorCommand, SystemClock};
use echorift_store::YamlFileStore;
use echorift_world::{ChatLine, InMemoryWorld};
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde_yml::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::spawner::{WandererConfig, Wanderers};

/// Environment variable naming the config file.
const CONFIG_ENV: &str = "ECHORIFT_CONFIG";

/// Config file used when the variable is unset.
const DEFAULT_CONFIG: &str = "echorift-config.yaml";

/// Application entry point.
///
/// # Errors
///
/// Returns an error if any initialization step fails.
#[tokio::main]
#[allow(clippy::too_many_lines)]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Problems are reported once logging is up.
    let config_path = config_path();
    let LoadedConfig {
        event: config,
        wanderers: wanderer_config,
        rejected,
    } = load_config(&config_path);

    // 2. Initialize structured logging. RUST_LOG wins over the config.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.logging.level)),
        )
        .with_target(true)
        .init();

    if !config_path.exists() {
        info!(path = %config_path.display(), "Config file not found, using defaults");
    }
    for setting in &rejected {
        warn!(key = %setting.path, reason = %setting.reason, "Ignoring config value, using default");
    }
    info!(
        path = %config_path.display(),
        auto_start = config.event.auto_start,
        persistent = config.event.persistent,
        max_active = config.points.max_active,
        "echorift-engine starting"
    );

    // 3. Create the starting world.
    let world = Arc::new(echorift_world::create_starting_world()?);

    // 4. Create the event.
    let data_file = data_file_path(&config_path, &config.event.data_file);
    let persistent = config.event.persistent;
    let tick = config.event.tick_duration();
    let event = EchoEvent::new(EventParts {
        config,
        config_path: Some(config_path.clone()),
        host: world.clone(),
        messages: world.clone(),
        store: Some(Arc::new(YamlFileStore::new(&data_file))),
        clock: Arc::new(SystemClock),
        seed: None,
    })?;
    event.boot();
    info!(data_file = %data_file.display(), active = event.is_active(), "Event ready");

    // 5. Spawn wanderers.
    let mut rng = StdRng::from_os_rng();
    let wanderers = Wanderers::spawn(wanderer_config, &world, &mut rng)?;

    // 6. Run until told to stop.
    let step = tick
        .checked_mul(wanderers.step_ticks().max(1))
        .unwrap_or(tick);
    let mut ticker = tokio::time::interval(step);
    let mut console = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut console_open = true;
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                wanderers.step(&event, &world, &mut rng);
                relay_chat(&world);
            }
            line = console.next_line(), if console_open => match line {
                Ok(Some(line)) => {
                    let line = line.trim();
                    if line.eq_ignore_ascii_case("quit") {
                        break;
                    }
                    if line.is_empty() {
                        continue;
                    }
                    let reply = event.execute(OperatorCommand::parse(line));
                    stdout.write_all(format!("{reply}\n").as_bytes()).await?;
                    stdout.flush().await?;
                }
                Ok(None) => {
                    info!("Console closed, running until Ctrl-C");
                    console_open = false;
                }
                Err(e) => {
                    warn!(error = %e, "Console read failed");
                    console_open = false;
                }
            },
            result = &mut ctrl_c => {
                if let Err(e) = result {
                    warn!(error = %e, "Signal handler failed");
                }
                break;
            }
        }
    }

    // 7. Shut down.
    wanderers.leave_all(&event, &world);
    event.shutdown(persistent);
    event.save();
    relay_chat(&world);
    info!("echorift-engine shutdown complete");
    Ok(())
}

/// Config file named by `ECHORIFT_CONFIG`, else `echorift-config.yaml`.
fn config_path() -> PathBuf {
    std::env::var_os(CONFIG_ENV).map_or_else(|| PathBuf::from(DEFAULT_CONFIG), PathBuf::from)
}

/// Everything read from the config file.
#[derive(Debug, Default)]
struct LoadedConfig {
    event: EchoConfig,
    wanderers: WandererConfig,
    rejected: Vec<Rejected>,
}

/// Load the config file. Never fails: a missing file means defaults, an
/// unreadable file or broken YAML means defaults plus one rejection, and a
/// mistyped value only resets its own field.
fn load_config(path: &Path) -> LoadedConfig {
    let raw = match std::fs::read_to_string(path) {
        Ok(contents) if contents.trim().is_empty() => Value::Null,
        Ok(contents) => match serde_yml::from_str::<Value>(&contents) {
            Ok(raw) => raw,
            Err(e) => return LoadedConfig::unusable(e.to_string()),
        },
        Err(e) if e.kind() == ErrorKind::NotFound => Value::Null,
        Err(e) => return LoadedConfig::unusable(e.to_string()),
    };

    let (event, mut rejected) = decode_lenient::<EchoConfig>(&raw);

    // The runner's own settings live in the "wanderers" section.
    let (wanderers, wanderer_rejected) = raw
        .get("wanderers")
        .map_or_else(
            || (WandererConfig::default(), Vec::new()),
            decode_lenient::<WandererConfig>,
        );
    rejected.extend(wanderer_rejected.into_iter().map(|r| Rejected {
        path: format!("wanderers.{}", r.path),
        reason: r.reason,
    }));

    LoadedConfig {
        event,
        wanderers,
        rejected,
    }
}

impl LoadedConfig {
    fn unusable(reason: String) -> Self {
        Self {
            rejected: vec![Rejected {
                path: "(file)".to_owned(),
                reason,
            }],
            ..Self::default()
        }
    }
}

/// Data file location. Relative paths sit next to the config file.
fn data_file_path(config_path: &Path, data_file: &str) -> PathBuf {
    let data_file = Path::new(data_file);
    match config_path.parent() {
        Some(dir) if data_file.is_relative() => dir.join(data_file),
        _ => data_file.to_path_buf(),
    }
}

/// Log everything the event said since the last call.
fn relay_chat(world: &InMemoryWorld) {
    for line in world.take_messages() {
        match line {
            ChatLine::Direct { actor, text } => {
                let name = world.actor(actor).map(|a| a.name).unwrap_or_default();
                info!(actor = %actor, name = %name, "{text}");
            }
            ChatLine::Broadcast { text } => info!(broadcast = true, "{text}"),
        }
    }
}
