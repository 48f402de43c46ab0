//! # Servidor TCP
//! src/server/listener.rs
//!
//! El acceptor solo acepta y encola: nunca procesa un request. Si la cola
//! está llena, `submit` lo bloquea hasta que un worker libere espacio.
//!
//! El socket se arma con `socket2` para poder fijar `SO_REUSEADDR` y el
//! backlog del `listen()` antes de empezar a aceptar.
//!
//! Al apagar se drenan las conexiones pendientes durante un plazo
//! (`shutdown_grace`). Las que siguen abiertas al vencer se cortan.

use crate::config::ServerConfig;
use crate::error::ServerError;
use crate::metrics::MetricsCollector;
use crate::resolver::WebRoot;
use crate::server::connections::{OpenConnections, Registered};
use crate::server::handler::ResponseEngine;
use crate::server::pool::WorkerPool;
use crate::server::queue::Job;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Tiempo máximo para la conexión que despierta al acceptor
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Pausa tras un error de `accept` (ej: EMFILE) antes de reintentar
const ACCEPT_BACKOFF: Duration = Duration::from_millis(100);

/// Conexión aceptada junto con su entrada en el registro de abiertas
#[derive(Debug)]
struct Accepted {
    stream: TcpStream,
    entry: Registered,
}

/// Servidor de archivos estáticos: socket + pool de workers
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    local_addr: SocketAddr,
    pool: WorkerPool<Accepted>,
    open: Arc<OpenConnections>,
    shutdown_grace: Duration,
    metrics: MetricsCollector,
    stop: Arc<AtomicBool>,
}

impl Server {
    /// Valida la configuración, abre el socket y arranca los workers.
    ///
    /// Cualquier error aquí es fatal: sin socket no hay servidor.
    pub fn bind(config: &ServerConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let web_root = WebRoot::new(config.web_root.clone())?;

        let listener = open_listener(config.address(), config.backlog)?;
        let local_addr = listener.local_addr().map_err(ServerError::Listen)?;

        let metrics = MetricsCollector::new();
        let engine = Arc::new(ResponseEngine::new(web_root, metrics.clone()));

        let pool = WorkerPool::new(
            config.workers,
            config.queue_capacity,
            metrics.clone(),
            move |job: Job<Accepted>| {
                let Job { id, conn: Accepted { stream, entry } } = job;
                let peer = stream.peer_addr().ok();
                let result = engine.serve(stream);

                // Suelta el duplicado del registro: recién ahí el socket se cierra
                drop(entry);

                if let Err(e) = result {
                    warn!(job = id, peer = ?peer, error = %e, "conexión terminada con error");
                }
            },
        )?;

        info!(
            addr = %local_addr,
            web_root = %config.web_root,
            workers = config.workers,
            queue = config.queue_capacity,
            backlog = config.backlog,
            "servidor listo"
        );

        Ok(Self {
            listener,
            local_addr,
            pool,
            open: OpenConnections::new(),
            shutdown_grace: config.shutdown_grace,
            metrics,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    /// Handle para detener el servidor desde otro thread (ej: Ctrl-C)
    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            stop: Arc::clone(&self.stop),
            wake_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, self.local_addr.port())),
        }
    }

    /// Acepta conexiones hasta que se dispare el [`ShutdownHandle`].
    ///
    /// Luego deja de aceptar y drena el pool. Si al vencer `shutdown_grace`
    /// quedan conexiones abiertas, se cortan para que ningún worker quede
    /// bloqueado en un `read`. Por último loguea las estadísticas.
    pub fn run(mut self) {
        info!(addr = %self.local_addr, "aceptando conexiones");

        while !self.stop.load(Ordering::Acquire) {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    // La conexión de despertar no se atiende
                    if self.stop.load(Ordering::Acquire) {
                        drop(stream);
                        break;
                    }

                    debug!(%peer, "conexión aceptada");
                    let entry = self.open.register(&stream);
                    if let Err(e) = self.pool.submit(Accepted { stream, entry }) {
                        warn!(%peer, error = %e, "no se pudo encolar la conexión");
                    }
                }
                Err(e) => match accept_backoff(&e) {
                    None => continue,
                    Some(pause) => {
                        warn!(error = %e, "error al aceptar conexión");
                        thread::sleep(pause);
                    }
                },
            }
        }

        info!(
            queued = self.pool.queued(),
            open = self.open.len(),
            "apagando: drenando conexiones pendientes"
        );

        if !self.open.wait_empty(self.shutdown_grace) {
            let cut = self.open.shutdown_all();
            warn!(
                connections = cut,
                grace = ?self.shutdown_grace,
                "plazo de apagado vencido: cortando conexiones abiertas"
            );
        }
        self.pool.shutdown();

        info!(stats = %self.metrics.snapshot().to_json(), "servidor detenido");
    }
}

/// Detiene un [`Server`] que está en `run`. Clonable y `Send`.
#[derive(Debug, Clone)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Marca el flag de parada y se conecta al listener para sacar al
    /// acceptor del `accept()` bloqueante.
    pub fn trigger(&self) {
        if self.stop.swap(true, Ordering::AcqRel) {
            return;
        }

        // Si el servidor ya no escucha, la conexión falla y da igual
        if let Ok(stream) = TcpStream::connect_timeout(&self.wake_addr, WAKE_TIMEOUT) {
            let _ = stream.shutdown(std::net::Shutdown::Both);
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }
}

/// Pausa antes de volver a llamar `accept`; `None` reintenta de inmediato
fn accept_backoff(error: &io::Error) -> Option<Duration> {
    match error.kind() {
        io::ErrorKind::Interrupted => None,
        _ => Some(ACCEPT_BACKOFF),
    }
}

/// socket → SO_REUSEADDR → bind → listen
fn open_listener(addr: SocketAddr, backlog: i32) -> Result<TcpListener, ServerError> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(ServerError::Socket)?;

    socket.set_reuse_address(true).map_err(ServerError::ReuseAddress)?;

    socket
        .bind(&addr.into())
        .map_err(|source| ServerError::Bind { addr, source })?;

    socket.listen(backlog).map_err(ServerError::Listen)?;

    Ok(socket.into())
}
