//! # Errores del Servidor
//! src/error.rs
//!
//! Tres niveles, de más grave a menos:
//!
//! - [`ServerError`]: arranque. Sin socket no hay servidor; el proceso termina.
//! - [`PoolError`]: el pool de workers no pudo crearse o ya está cerrado.
//! - [`ConnectionError`]: una sola conexión falló. Se loguea y el worker sigue.

use crate::http::ParseError;
use std::io;
use std::net::SocketAddr;
use std::path::PathBuf;
use thiserror::Error;

/// Errores de configuración detectados antes de abrir el socket
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("worker count must be >= 1")]
    ZeroWorkers,

    #[error("queue capacity must be >= 1")]
    ZeroQueueCapacity,

    #[error("listen backlog must be >= 1")]
    ZeroBacklog,

    #[error("web root {path:?} is not accessible: {source}")]
    WebRoot { path: PathBuf, source: io::Error },

    #[error("web root {0:?} is not a directory")]
    NotADirectory(PathBuf),
}

/// Errores fatales de arranque
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("cannot open socket: {0}")]
    Socket(#[source] io::Error),

    #[error("cannot set SO_REUSEADDR: {0}")]
    ReuseAddress(#[source] io::Error),

    #[error("cannot bind address {addr}: {source}")]
    Bind { addr: SocketAddr, source: io::Error },

    #[error("cannot listen on socket: {0}")]
    Listen(#[source] io::Error),

    #[error("worker pool error: {0}")]
    Pool(#[from] PoolError),
}

/// Errores del pool de workers
#[derive(Debug, Error)]
pub enum PoolError {
    /// El pool ya no acepta trabajos; la conexión rechazada se cerró
    #[error("worker pool is shut down")]
    ShutDown,

    #[error("worker pool needs at least one worker")]
    NoWorkers,

    #[error("cannot spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Errores de una conexión individual. Nunca salen del worker.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("cannot read request: {0}")]
    Read(#[source] io::Error),

    #[error("cannot write response: {0}")]
    Write(#[source] io::Error),

    #[error("malformed request: {0}")]
    Parse(#[from] ParseError),

    #[error("cannot open {path:?}: {source}")]
    FileOpen { path: PathBuf, source: io::Error },

    #[error("cannot read {path:?}: {source}")]
    FileRead { path: PathBuf, source: io::Error },

    /// No hay memoria para el buffer del archivo; solo falla esta conexión
    #[error("cannot allocate {size} bytes for {path:?}")]
    OutOfMemory { path: PathBuf, size: u64 },

    /// El archivo cambió de tamaño entre el stat y la lectura
    #[error("short read on {path:?}: expected {expected} bytes, got {actual}")]
    ShortRead {
        path: PathBuf,
        expected: u64,
        actual: u64,
    },
}
