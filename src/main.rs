//! # Static HTTP Server - Entry Point
//! src/main.rs
//!
//! Uso: `static_http_server <port> <webroot>`

use clap::Parser;
use static_http_server::config::{Cli, ServerConfig};
use static_http_server::server::Server;
use tracing::{error, info, warn};

fn main() {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_level(true)
        .init();

    // Argumentos inválidos: clap imprime el uso en stderr y sale con código != 0
    let config = ServerConfig::from(Cli::parse());

    let server = match Server::bind(&config) {
        Ok(server) => server,
        Err(e) => {
            error!(error = %e, "error fatal al iniciar");
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    let handle = server.shutdown_handle();
    if let Err(e) = ctrlc::set_handler(move || {
        if handle.is_triggered() {
            warn!("segunda señal: saliendo sin esperar a las conexiones abiertas");
            std::process::exit(130);
        }
        info!("señal de terminación recibida");
        handle.trigger();
    }) {
        warn!(error = %e, "no se pudo registrar el handler de señales");
    }

    server.run();
}
