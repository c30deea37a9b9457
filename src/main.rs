use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use partage::auth::{validate_secret_strength, CredentialService, TokenService};
use partage::cli;
use partage::config::{self, Config};
use partage::models::user::UserId;
use partage::store::memory::MemoryStore;
use partage::store::postgres::PgStore;
use partage::store::Store;
use partage::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Export spans over OTLP only when a collector endpoint is configured.
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "partage"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "partage=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let cfg = config::load()?;
    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::Serve { port }) => {
            let port = port.unwrap_or(cfg.port);
            run_server(cfg, port).await
        }
        Some(cli::Commands::Token { command }) => handle_token_command(&cfg, command),
        Some(cli::Commands::Password { command }) => handle_password_command(&cfg, command),
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

async fn connect_store(cfg: &Config) -> anyhow::Result<Arc<dyn Store>> {
    match cfg.database_url.as_deref() {
        Some(url) => {
            tracing::info!("Connecting to database...");
            let db = PgStore::connect(url).await.context("database connection failed")?;

            tracing::info!("Running migrations...");
            db.migrate().await?;
            Ok(Arc::new(db))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set, using the in-memory store (data is lost on exit)");
            tracing::info!(projects = cfg.seed_projects, "Seeding in-memory projects");
            Ok(Arc::new(MemoryStore::with_projects(cfg.seed_projects)))
        }
    }
}

async fn run_server(cfg: Config, port: u16) -> anyhow::Result<()> {
    let db = connect_store(&cfg).await?;
    let sweep_every = Duration::from_secs(cfg.rate_limit_sweep_secs);

    tracing::info!(
        rate_limit = cfg.rate_limit,
        window_secs = cfg.rate_limit_window,
        token_ttl_secs = cfg.token_ttl_secs,
        "Initializing access control..."
    );
    let state = Arc::new(AppState::new(cfg, db)?);

    let sweeper = partage::jobs::cleanup::spawn(state.clone(), sweep_every);
    tracing::info!("Background rate-bucket sweep started (every {:?})", sweep_every);

    let app = partage::app(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Partage listening on {}", addr);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    sweeper.abort();
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}

fn handle_token_command(cfg: &Config, cmd: cli::TokenCommands) -> anyhow::Result<()> {
    let tokens = TokenService::new(&cfg.jwt_secret, cfg.token_ttl());
    match cmd {
        cli::TokenCommands::Issue { user_id, ttl_secs } => {
            let ttl = ttl_secs
                .map(chrono::Duration::seconds)
                .unwrap_or_else(|| tokens.default_ttl());
            let token = tokens.issue(UserId(user_id), ttl)?;
            println!(
                "Token issued:\n  User:    {}\n  Expires: in {}s\n  Use:     Authorization: Bearer {}",
                user_id,
                ttl.num_seconds(),
                token
            );
        }
        cli::TokenCommands::Verify { token } => match tokens.verify(&token) {
            Ok(user_id) => println!("Valid token for user {}", user_id),
            Err(e) => anyhow::bail!("token rejected: {}", e),
        },
    }
    Ok(())
}

fn handle_password_command(cfg: &Config, cmd: cli::PasswordCommands) -> anyhow::Result<()> {
    match cmd {
        cli::PasswordCommands::Hash { password } => {
            validate_secret_strength(&password).map_err(|weak| anyhow::anyhow!("{}", weak))?;
            let credentials = CredentialService::new(
                cfg.argon2_memory_kib,
                cfg.argon2_iterations,
                cfg.argon2_parallelism,
            )?;
            println!("{}", credentials.hash_secret(&password)?);
        }
        cli::PasswordCommands::Check { password } => match validate_secret_strength(&password) {
            Ok(()) => println!("Password meets the policy."),
            Err(weak) => anyhow::bail!("{}", weak),
        },
    }
    Ok(())
}
