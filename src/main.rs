//! Bankly server
//!
//! ```text
//! bankly [--env dev|prod] [--port 8080]
//! ```
//!
//! Loads `config/{env}.yaml`, connects storage, starts the queue workers and
//! the recovery sweep, then serves the HTTP gateway until it fails.

use std::sync::Arc;

use bankly::bootstrap::{App, Backends};
use bankly::config::AppConfig;
use bankly::email::LogEmailSender;
use tracing::{error, info};

const JWT_SECRET_ENV: &str = "BANKLY_JWT_SECRET";

fn get_env() -> String {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if (args[i] == "--env" || args[i] == "-e") && i + 1 < args.len() {
            return args[i + 1].clone();
        }
    }
    "dev".to_string()
}

/// Get port override from command line (--port argument)
fn get_port_override() -> Option<u16> {
    let args: Vec<String> = std::env::args().collect();
    for i in 0..args.len() {
        if args[i] == "--port" && i + 1 < args.len() {
            return args[i + 1].parse().ok();
        }
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env = get_env();
    let mut app_config = AppConfig::load(&env)?;
    if let Ok(secret) = std::env::var(JWT_SECRET_ENV) {
        app_config.jwt_secret = secret;
    }

    let _log_guard = bankly::logging::init_logging(&app_config);
    info!(env = %env, build = env!("GIT_HASH"), "Starting bankly");

    if app_config.jwt_secret.is_empty() {
        error!("jwt_secret is empty; set {} or the config value", JWT_SECRET_ENV);
        anyhow::bail!("jwt_secret must not be empty");
    }

    let port = get_port_override().unwrap_or(app_config.gateway.port);
    let backends = Backends::from_config(&app_config).await?;
    let state = App::build(&app_config, backends, Arc::new(LogEmailSender)).spawn_workers();

    if let Err(e) = bankly::gateway::run_server(&app_config.gateway.host, port, state).await {
        error!(error = %e, "Gateway stopped");
        return Err(e);
    }
    Ok(())
}
