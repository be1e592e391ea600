use log::{info, warn};
use std::fs::{self, OpenOptions};
use std::path::Path;

use actix_web::{App, HttpServer, web};

use hevo_power::{AppConfig, AppContext, AppError, AppState, GpioBackend};

#[cfg(feature = "hardware-gpio")]
use hevo_power::LibgpiodBackend;
#[cfg(not(feature = "hardware-gpio"))]
use hevo_power::MockGpioBackend;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("HEVO_CONFIG").ok());
    let config = match &config_path {
        Some(path) => AppConfig::load_from_file(path)?,
        None => AppConfig::default(),
    };

    init_logging(&config)?;
    match &config_path {
        Some(path) => info!("Loaded config from {path}"),
        None => info!("No config given, using built-in defaults"),
    }

    let backend: Box<dyn GpioBackend> = {
        #[cfg(feature = "hardware-gpio")]
        {
            Box::new(LibgpiodBackend::new())
        }
        #[cfg(not(feature = "hardware-gpio"))]
        {
            warn!("Built without hardware-gpio, relay and button are simulated");
            Box::new(MockGpioBackend::default())
        }
    };

    // dropped on every exit path below, which releases the hardware
    let mut context = AppContext::start(&config, backend.as_ref())?;
    let app_state = AppState {
        coordinator: context.coordinator(),
    };

    let http_cfg = config.http.clone();
    let scope_path = http_cfg.path.clone();
    let server = HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .service(app_state.api_scope(&scope_path))
    })
    .disable_signals()
    .shutdown_timeout(http_cfg.shutdown_timeout);

    let bind_addrs: String;
    let server = match (&http_cfg.unix_socket, &http_cfg.host) {
        (Some(socket_path), Some(host)) => {
            remove_stale_socket(socket_path)?;
            bind_addrs = format!("{} and {}", socket_path, host);

            server.bind_uds(socket_path)?.bind(host)?
        }
        (Some(socket_path), None) => {
            remove_stale_socket(socket_path)?;
            bind_addrs = socket_path.clone();

            server.bind_uds(socket_path)?
        }
        (None, Some(host)) => {
            bind_addrs = host.clone();

            server.bind(host)?
        }
        (None, None) => {
            return Err(AppError::Config(
                "either 'http.host' or 'http.unix_socket' must be specified".into(),
            )
            .into());
        }
    };

    info!("Starting server on {}...", bind_addrs);

    let server = server.run();
    let handle = server.handle();
    actix_web::rt::spawn(async move {
        shutdown_signal().await;
        info!("Shutdown requested, stopping httpd");
        handle.stop(true).await;
    });

    server.await?;

    context.shutdown();
    if let Some(socket_path) = &http_cfg.unix_socket {
        remove_stale_socket(socket_path)?;
    }
    info!("Shutdown complete");

    Ok(())
}

fn init_logging(config: &AppConfig) -> std::io::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = &config.log_file {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| AppError::Config(format!("open log file {path}: {e}")))?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn remove_stale_socket(socket_path: &str) -> std::io::Result<()> {
    if Path::new(socket_path).exists() {
        fs::remove_file(socket_path)?;
    }
    Ok(())
}

/// Resolves on SIGINT or SIGTERM. Only signals intent; teardown happens in `main`.
async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut terminate) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => {}
                    _ = terminate.recv() => {}
                }
            }
            Err(e) => {
                warn!("SIGTERM handler unavailable: {e}");
                let _ = tokio::signal::ctrl_c().await;
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
