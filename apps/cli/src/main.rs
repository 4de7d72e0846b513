mod args;
mod config;
mod dirs;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use http_api::{HttpState, RateLimitConfig, RateLimiter, StaticTokenValidator, generate_api_token};
use quitpath_app::{AppPaths, AppState, ensure_app_data_dir};
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli_args = args::parse_args().map_err(|err| {
        eprintln!("{err}");
        args::print_help();
        io::Error::new(io::ErrorKind::InvalidInput, "invalid arguments")
    })?;

    let data_dir = dirs::resolve_data_dir().map_err(io::Error::other)?;
    let mut loaded = config::load_or_create(&data_dir).map_err(io::Error::other)?;
    if loaded.created {
        info!(file = %loaded.file.display(), port = loaded.config.port, "created config");
    }

    let api_token = match loaded.config.api_token.clone() {
        Some(token) => token,
        None => {
            let token = generate_api_token();
            loaded.config.api_token = Some(token.clone());
            config::write_config(&loaded.file, &loaded.config).map_err(io::Error::other)?;
            info!("generated api token and saved it to the config file");
            token
        }
    };

    let port = cli_args.port.unwrap_or(loaded.config.port);

    let paths = AppPaths::new(data_dir.clone());
    ensure_app_data_dir(&paths)
        .map_err(|err| io::Error::other(err.to_string()))?;

    let app_state = AppState::new(paths.db_path);
    app_state
        .setup_db()
        .map_err(|err| io::Error::other(format!("failed to initialize database: {}", err)))?;

    let state = HttpState::new(
        app_state,
        Arc::new(StaticTokenValidator::new(
            api_token,
            loaded.config.api_user.clone(),
        )),
        Arc::new(RateLimiter::new(RateLimitConfig::default())),
    );
    let router = http_api::router(state);

    let (listener, actual_port, used_fallback) = bind_port(port).await?;
    if used_fallback {
        warn!(
            configured = port,
            actual = actual_port,
            "configured port was unavailable, using a fallback for this run"
        );
    }
    info!(port = actual_port, data_dir = %data_dir.display(), "quitpath server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn bind_port(port: u16) -> Result<(tokio::net::TcpListener, u16, bool), io::Error> {
    if port == 0 {
        let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let actual_port = listener.local_addr()?.port();
        return Ok((listener, actual_port, false));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], port));
    match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => Ok((listener, port, false)),
        Err(_) => {
            let listener =
                tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
            let actual_port = listener.local_addr()?.port();
            Ok((listener, actual_port, true))
        }
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
