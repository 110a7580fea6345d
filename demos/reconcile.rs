//! Reconciliation runner.
//!
//! Runs the engine against a real cluster using the Kafka CLI tools.
//!
//! ## Running
//!
//! One cycle, combined broker/controller node:
//! ```bash
//! NODE_ID=1 NODE_HOST=kafka-1 BOOTSTRAP_CONTROLLER=kafka-0:9097 \
//! ADMIN_COMMAND_CONFIG=/etc/kafka/admin.properties \
//! cargo run --example reconcile
//! ```
//!
//! Migrate controllers from SCRAM over plaintext to SCRAM over TLS, cycling
//! every 30 seconds until interrupted:
//! ```bash
//! CURRENT_AUTH=SASL_PLAINTEXT/SCRAM-SHA-512 TARGET_AUTH=SASL_SSL/SCRAM-SHA-512 \
//! RECONCILE_INTERVAL_SECS=30 cargo run --example reconcile -- loop
//! ```
//!
//! Other commands:
//! - `request-migration`: reset both migration tracks to idle
//! - `decommission`: remove this node from the controller quorum
//! - `metrics`: print the Prometheus metrics after one cycle
//!
//! Desired ACLs come from `ACL_INTENTS_FILE`, a JSON array such as
//! `[{"principal":"sam","topic":"shire","role":"producer"}]`.

use std::sync::Arc;
use std::time::Duration;

use kraftctl::cluster::metrics::{encode_metrics, init_metrics};
use kraftctl::cluster::{
    JsonFileStateStore, ProcessAdminCommand, Reconciler, ReconcilerConfig, desired_rules,
};
use kraftctl::telemetry::{TelemetryConfig, init_telemetry, shutdown_telemetry};
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_telemetry(TelemetryConfig::default())?;
    init_metrics();

    let config = ReconcilerConfig::from_env()?;
    if let Err(errors) = config.validate() {
        for e in &errors {
            error!(error = %e, "Invalid configuration");
        }
        return Err(format!("{} configuration error(s)", errors.len()).into());
    }

    let admin = Arc::new(
        ProcessAdminCommand::new(&config.kafka_bin_dir).with_timeout(config.command_timeout),
    );
    let store = Arc::new(JsonFileStateStore::new(&config.state_file));
    let intents = config.load_intents().await?;

    let mut reconciler = Reconciler::new(config, admin, store);
    if let Some(intents) = intents {
        reconciler = reconciler.with_desired_rules(desired_rules(&intents));
    }

    let command = std::env::args().nth(1).unwrap_or_else(|| "once".to_string());
    match command.as_str() {
        "once" => {
            let report = reconciler.run_cycle().await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        "loop" => run_loop(&reconciler).await,
        "request-migration" => reconciler.request_migration().await?,
        "decommission" => reconciler.decommission().await?,
        "metrics" => {
            if let Err(e) = reconciler.run_cycle().await {
                warn!(error = %e, "Cycle failed");
            }
            print!("{}", encode_metrics()?);
        }
        other => return Err(format!("unknown command '{}'", other).into()),
    }

    shutdown_telemetry();
    Ok(())
}

async fn run_loop(reconciler: &Reconciler) {
    let interval_secs = std::env::var("RECONCILE_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);
    let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match reconciler.run_cycle().await {
                    Ok(report) if report.converged() => info!("Node converged"),
                    Ok(_) => info!("Not yet converged, retrying next tick"),
                    Err(e) if e.is_retriable() => warn!(error = %e, "Cycle failed, retrying next tick"),
                    Err(e) => {
                        error!(error = %e, "Cycle failed with a non-retriable error");
                        return;
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted");
                return;
            }
        }
    }
}
