use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use clap::Parser;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing_subscriber::EnvFilter;

use wr_domain::config::{Config, CorsConfig};
use wr_gateway::cli::{Cli, Command, ConfigCommand};
use wr_gateway::state::AppState;
use wr_gateway::{api, bootstrap, cli};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Cli::parse();

    match args.command {
        // Default to serve when no subcommand is given.
        None | Some(Command::Serve) => {
            init_tracing();
            let config = cli::load_config(&args.config)?;
            run_server(Arc::new(config)).await
        }
        Some(Command::Config(ConfigCommand::Show)) => {
            let config = cli::load_config(&args.config)?;
            cli::show(&config);
            Ok(())
        }
        Some(Command::Config(ConfigCommand::Validate)) => {
            let config = cli::load_config(&args.config)?;
            if !cli::validate(&config, &args.config) {
                std::process::exit(1);
            }
            Ok(())
        }
        Some(Command::Version) => {
            println!("warroom {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run_server(config: Arc<Config>) -> anyhow::Result<()> {
    let state = bootstrap::build_app_state(Arc::clone(&config), None)?;
    bootstrap::spawn_background(&state);

    let app = api::router()
        .layer(cors_layer(&config.server.cors))
        .with_state(state.clone());

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;
    tracing::info!(%addr, "warroom listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(state))
        .await
        .context("serving")?;
    Ok(())
}

async fn shutdown_signal(state: AppState) {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
    // Final persistence signal per room, then flush pending deltas.
    state.manager.shutdown();
}

/// Origins from config; a trailing `:*` in a pattern matches any port.
fn cors_layer(config: &CorsConfig) -> CorsLayer {
    if config.allowed_origins.iter().any(|o| o == "*") {
        return CorsLayer::permissive();
    }
    let patterns = config.allowed_origins.clone();
    CorsLayer::new().allow_origin(AllowOrigin::predicate(
        move |origin: &HeaderValue, _| {
            let Ok(origin) = origin.to_str() else {
                return false;
            };
            patterns.iter().any(|pattern| match pattern.strip_suffix(":*") {
                Some(prefix) => {
                    origin == prefix
                        || origin
                            .strip_prefix(prefix)
                            .is_some_and(|rest| rest.starts_with(':'))
                }
                None => origin == pattern,
            })
        },
    ))
}
