//! # Static Server - Entry Point
//! src/main.rs
//!
//! Punto de entrada del servidor. La configuración viene de argumentos CLI y
//! variables de entorno; el nivel de log se controla con `RUST_LOG`. Ctrl-C o
//! SIGTERM detienen el servidor según `--shutdown`.

use static_server::config::Config;
use static_server::server::Server;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "static_server=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .init();

    let config = Config::new();
    config.log_summary();

    let server = Server::new(config);

    let stop = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("interrupt received; stopping");
        stop.trigger();
    }) {
        warn!(error = %e, "could not install Ctrl-C handler");
    }

    if let Err(e) = server.run() {
        error!(error = %e, "fatal error");
        std::process::exit(1);
    }
}
