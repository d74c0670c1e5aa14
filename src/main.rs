use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, Layer};

use gateway::api::handlers::parse_list;
use gateway::models::credential::CredentialStore;
use gateway::upstream::marketstack::DEFAULT_SYMBOLS;
use gateway::upstream::weatherstack::DEFAULT_CITIES;
use gateway::{api, config, jobs, AppState};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // OTLP export is opt-in via OTEL_EXPORTER_OTLP_ENDPOINT; otherwise stdout only.
    use opentelemetry::KeyValue;

    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "metrics-gateway"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    // Optional plain-text log of logins, auth rejections and Databox pushes.
    let file_layer = match std::env::var("GATEWAY_LOG_FILE") {
        Ok(path) if !path.is_empty() => {
            let writer = config::open_log_file(&path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .with_filter(
                        Targets::new()
                            .with_target("gateway::upstream::databox", Level::INFO)
                            .with_target("gateway::api::handlers", Level::INFO)
                            .with_target("gateway::auth", Level::INFO)
                            .with_target("gateway::middleware::scope", Level::INFO),
                    ),
            )
        }
        _ => None,
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "gateway=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .with(telemetry_layer)
        .init();

    let args = cli::Cli::parse();
    let cfg = config::load()?;

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Stocks { symbols, demo }) => {
            let state = AppState::from_config(cfg)?;
            let symbols = parse_list(Some(symbols.as_str()), &DEFAULT_SYMBOLS);
            let metrics = state.stocks.fetch_metrics(&symbols, demo).await;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            Ok(())
        }
        Some(cli::Commands::Weather { cities, demo }) => {
            let state = AppState::from_config(cfg)?;
            let cities = parse_list(Some(cities.as_str()), &DEFAULT_CITIES);
            let metrics = state.weather.fetch_metrics(&cities, demo).await;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            Ok(())
        }
        Some(cli::Commands::Users) => {
            let store = CredentialStore::new(cfg.users);
            println!("{:<24} SCOPE", "USERNAME");
            for user in store.iter() {
                println!("{:<24} {}", user.username, user.scope);
            }
            Ok(())
        }
        None => {
            let port = cfg.port;
            run_server(cfg, port).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    result
}

async fn run_server(cfg: config::Config, port: u16) -> anyhow::Result<()> {
    for (name, value) in [
        ("MARKETSTACK_API_KEY", &cfg.marketstack_api_key),
        ("WEATHERSTACK_API_KEY", &cfg.weatherstack_api_key),
        ("DATABOX_TOKEN", &cfg.databox_token),
    ] {
        if value.is_empty() {
            tracing::warn!("{} is not set — only use_demo_data requests will succeed", name);
        }
    }

    let sweep_secs = cfg.token_sweep_secs;
    let state = Arc::new(AppState::from_config(cfg)?);
    tracing::info!(
        users = state.credentials.len(),
        token_ttl_secs = state.issuer.ttl_secs(),
        max_tokens = state.registry.capacity(),
        "token issuer ready"
    );

    if sweep_secs > 0 {
        jobs::token_sweeper::spawn(
            state.registry.clone(),
            state.metrics.clone(),
            Duration::from_secs(sweep_secs),
        );
        tracing::info!("Background token sweeper started (every {}s)", sweep_secs);
    } else {
        tracing::warn!("token sweeping disabled; expired tokens stay in memory until capacity pressure");
    }

    let app = api::router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Metrics gateway listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}
