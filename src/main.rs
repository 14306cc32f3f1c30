//! # App Server - Entry Point
//! src/main.rs
//!
//! Punto de entrada del servidor: configuración, logging, plantillas,
//! rutas de la demo y apagado ordenado con SIGINT/SIGTERM.

use app_server::app;
use app_server::config::Config;
use app_server::logging;
use app_server::router::Router;
use app_server::server::{Server, StopHandle};
use app_server::templates::{TemplateEngine, TemplateLoader};
use std::process;
use std::sync::Arc;
use tracing::{error, info};

fn main() {
    let config = Config::new();
    logging::init(config.verbose);

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        process::exit(1);
    }
    config.print_summary();

    let engine = Arc::new(TemplateEngine::new());
    let loader = Arc::new(TemplateLoader::new(Arc::clone(&engine), &config.templates_dir));

    let router = Router::new().with_static_dir(&config.static_dir);
    app::register_routes(&router, &engine);
    info!(routes = router.len(), "Routes registered");

    let running = match Server::new(config, Arc::new(router))
        .with_templates(loader)
        .start()
    {
        Ok(running) => running,
        Err(e) => {
            error!("💥 Error fatal: {}", e);
            process::exit(1);
        }
    };

    if let Err(e) = watch_signals(running.stop_handle()) {
        error!("Could not install signal handlers: {}", e);
        running.shutdown();
        process::exit(1);
    }

    running.wait();
    info!("Server stopped gracefully");
}

/// Detiene el servidor al recibir SIGINT o SIGTERM
#[cfg(unix)]
fn watch_signals(stop: StopHandle) -> std::io::Result<()> {
    use signal_hook::consts::{SIGINT, SIGTERM};
    use signal_hook::iterator::Signals;

    let mut signals = Signals::new([SIGINT, SIGTERM])?;
    std::thread::Builder::new()
        .name("signal-watcher".to_string())
        .spawn(move || {
            if let Some(signal) = signals.forever().next() {
                info!(signal, "Interrupt signal received");
                stop.stop();
            }
        })?;
    Ok(())
}

#[cfg(not(unix))]
fn watch_signals(_stop: StopHandle) -> std::io::Result<()> {
    Ok(())
}
