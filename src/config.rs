//! # Configuración del Servidor
//! src/config.rs
//!
//! La línea de comandos es fija: `static_http_server <port> <webroot>`.
//! El resto de parámetros (workers, cola, backlog, plazo de apagado) tiene valores por defecto
//! y solo se cambian al embeber el servidor como librería.
//!
//! ```bash
//! ./static_http_server 8080 /srv/www
//! ```

use crate::error::ConfigError;
use clap::Parser;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

/// Workers por defecto
pub const DEFAULT_WORKERS: usize = 4;

/// Capacidad por defecto de la cola de conexiones pendientes
pub const DEFAULT_QUEUE_CAPACITY: usize = 256;

/// Backlog por defecto del `listen()`
pub const DEFAULT_BACKLOG: i32 = 128;

/// Plazo por defecto para que terminen las conexiones abiertas al apagar
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Tamaño del buffer donde se lee el request
pub const REQUEST_BUFFER_SIZE: usize = 8192;

/// Argumentos de línea de comandos
#[derive(Debug, Clone, Parser)]
#[command(name = "static_http_server")]
#[command(about = "Servidor HTTP concurrente de archivos estáticos")]
#[command(version)]
pub struct Cli {
    /// Puerto en el que escucha el servidor (todas las interfaces)
    pub port: u16,

    /// Directorio raíz desde donde se sirven los archivos
    pub webroot: String,
}

/// Configuración inmutable del servidor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Puerto de escucha (0 = efímero)
    pub port: u16,

    /// Web root tal como lo escribió el usuario; se concatena con la URI
    pub web_root: String,

    /// Número fijo de workers
    pub workers: usize,

    /// Capacidad de la cola; el acceptor se bloquea cuando está llena
    pub queue_capacity: usize,

    /// Backlog de conexiones pendientes en el kernel
    pub backlog: i32,

    /// Cuánto se espera al apagar antes de cortar las conexiones que siguen abiertas
    pub shutdown_grace: Duration,
}

impl ServerConfig {
    pub fn new(port: u16, web_root: impl Into<String>) -> Self {
        Self {
            port,
            web_root: web_root.into(),
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            backlog: DEFAULT_BACKLOG,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    pub fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn with_backlog(mut self, backlog: i32) -> Self {
        self.backlog = backlog;
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Dirección de bind: todas las interfaces IPv4
    pub fn address(&self) -> SocketAddr {
        SocketAddr::from((Ipv4Addr::UNSPECIFIED, self.port))
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if self.backlog <= 0 {
            return Err(ConfigError::ZeroBacklog);
        }
        Ok(())
    }
}

impl From<Cli> for ServerConfig {
    fn from(cli: Cli) -> Self {
        ServerConfig::new(cli.port, cli.webroot)
    }
}
