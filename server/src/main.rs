use tokio::net::TcpListener;

use nova_realtime::config::{generate_config_template, Config};
use nova_realtime::db::{self, SqliteStore};
use nova_realtime::routes;
use nova_realtime::state::AppState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load config with layered precedence: defaults < TOML < env < CLI
    let config = Config::load()?;

    // Handle --generate-config: print template and exit
    if config.generate_config {
        print!("{}", generate_config_template());
        return Ok(());
    }

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("nova_realtime=info"));
    if config.json_logs {
        tracing_subscriber::fmt().json().with_env_filter(env_filter).init();
    } else {
        tracing_subscriber::fmt().pretty().with_env_filter(env_filter).init();
    }

    tracing::info!("Nova real-time server v{} starting", env!("CARGO_PKG_VERSION"));

    let pool = db::init_db(&config.data_dir)?;
    let store = SqliteStore::new(pool);
    let stale = store.reset_online_flags()?;
    if stale > 0 {
        tracing::info!("Cleared {} stale online flags from a previous run", stale);
    }
    let state = AppState::new(store, config.heartbeat());

    let app = routes::build_router(state);

    let addr = format!("{}:{}", config.bind_address, config.port);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
