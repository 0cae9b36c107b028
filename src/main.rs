use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::broadcast::error::RecvError;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use map_bridge::{
    config::Config,
    errors::{BridgeResult, MapError},
    models::{CameraPosition, LatLng, MapConfig, from_args},
    native::{NativeEvent, SimulatedBackend},
    observability::init_metrics,
    services::BroadcastNotifier,
    session::{MapManager, dispatch},
};

#[derive(Parser)]
#[command(name = "map-bridge")]
#[command(version)]
#[command(about = "Replay plugin calls against simulated map sessions")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "map-bridge.toml")]
    config: String,

    /// Log level (overrides the configuration file)
    #[arg(short = 'v', long)]
    log_level: Option<String>,

    /// JSON script of plugin calls to replay
    #[arg(short, long, value_name = "FILE", required_unless_present = "print_config")]
    script: Option<String>,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,
}

/// One plugin call in a replay script
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ScriptStep {
    map_id: Option<String>,
    method: String,
    #[serde(default)]
    args: Value,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load_from_file(&cli.config)?;
    if cli.print_config {
        print!(
            "{}",
            toml::to_string_pretty(&config).context("Failed to render configuration")?
        );
        return Ok(());
    }
    let script_path = cli.script.unwrap_or_default();

    let level = cli.log_level.as_deref().unwrap_or(&config.logging.level);
    let log_filter = format!("map_bridge={level}");
    let json_logs = config.logging.json;
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(json_logs.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();

    info!("Starting map-bridge v{}", env!("CARGO_PKG_VERSION"));
    let meter_provider = init_metrics();

    let script = tokio::fs::read_to_string(&script_path)
        .await
        .with_context(|| format!("Failed to read script {script_path}"))?;
    let steps: Vec<ScriptStep> =
        serde_json::from_str(&script).with_context(|| format!("Invalid script {script_path}"))?;
    info!("Replaying {} steps from {}", steps.len(), script_path);

    let notifier = BroadcastNotifier::new();
    let mut events = notifier.subscribe();
    let printer = tokio::spawn(async move {
        loop {
            match events.recv().await {
                Ok(event) => println!("{}", event.to_json()),
                Err(RecvError::Lagged(skipped)) => warn!("Event printer lagged by {}", skipped),
                Err(RecvError::Closed) => break,
            }
        }
    });

    let backend = SimulatedBackend::new();
    let manager = MapManager::new(
        Arc::new(backend.clone()),
        Arc::new(notifier.clone()),
        config,
    );

    for step in steps {
        let outcome = run_step(&manager, &backend, &step).await;
        let line = match outcome {
            Ok(result) => json!({ "mapId": step.map_id, "method": step.method, "result": result }),
            Err(e) => json!({ "mapId": step.map_id, "method": step.method, "error": e.to_bridge_error() }),
        };
        println!("{line}");
        // Let the session actors flush events triggered by this step
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let destroyed = manager.destroy_all().await;
    info!("Destroyed {} remaining maps", destroyed);

    drop(manager);
    drop(notifier);
    if tokio::time::timeout(Duration::from_secs(1), printer).await.is_err() {
        warn!("Event printer did not drain in time");
    }

    meter_provider
        .shutdown()
        .context("Failed to shut down the meter provider")?;
    Ok(())
}

async fn run_step(
    manager: &MapManager,
    backend: &SimulatedBackend,
    step: &ScriptStep,
) -> BridgeResult<Value> {
    match step.method.as_str() {
        "createMap" => {
            let config: MapConfig = match step.args.get("config") {
                Some(nested) => from_args(nested)?,
                None => from_args(&step.args)?,
            };
            let handle = manager.create_map(step.map_id.clone(), config).await?;
            Ok(json!({ "id": handle.map_id() }))
        }
        "destroyMap" => {
            manager.destroy_map(required_map_id(step)?).await?;
            Ok(json!({}))
        }
        "simulatePan" => {
            let map_id = required_map_id(step)?;
            let probe = backend
                .probe(map_id)
                .ok_or_else(|| MapError::map_not_ready(map_id))?;
            let target: LatLng = from_args(step.args.get("target").unwrap_or(&Value::Null))?;
            let zoom = step
                .args
                .get("zoom")
                .and_then(Value::as_f64)
                .unwrap_or(probe.camera().zoom);
            probe.pan_to(CameraPosition::new(target, zoom));
            Ok(json!({}))
        }
        "simulateMapClick" => {
            let map_id = required_map_id(step)?;
            let probe = backend
                .probe(map_id)
                .ok_or_else(|| MapError::map_not_ready(map_id))?;
            let point: LatLng = from_args(&step.args)?;
            probe.emit(NativeEvent::MapClick(point));
            Ok(json!({}))
        }
        method => {
            let handle = manager.session(required_map_id(step)?).await?;
            dispatch(&handle, method, &step.args).await
        }
    }
}

fn required_map_id(step: &ScriptStep) -> BridgeResult<&str> {
    step.map_id
        .as_deref()
        .ok_or_else(|| MapError::invalid_arguments(format!("'{}' requires a mapId", step.method)))
}
