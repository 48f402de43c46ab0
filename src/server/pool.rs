//! # Pool de Workers
//! src/server/pool.rs
//!
//! N threads fijos consumiendo una [`JobQueue`] acotada. El acceptor solo
//! encola; procesar la conexión es trabajo del worker que la desencola.
//!
//! ## Estados de un worker
//!
//! ```text
//! Idle ──pop()──> Processing ──job terminado──> Idle
//!   │
//!   └── cola cerrada y vacía ──> Terminated
//! ```
//!
//! Al apagar, la cola se cierra y los workers la drenan: cada conexión
//! encolada o en proceso se atiende y se cierra antes de que el worker
//! termine.

use crate::error::PoolError;
use crate::metrics::MetricsCollector;
use crate::server::queue::{Job, JobQueue};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, error, warn};

/// Estado observable de un worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Processing,
    Terminated,
}

impl WorkerState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => WorkerState::Idle,
            1 => WorkerState::Processing,
            _ => WorkerState::Terminated,
        }
    }
}

/// Función que procesa un job. Es dueña de la conexión: al retornar
/// (o al hacer panic) la conexión se libera.
type JobHandler<C> = Arc<dyn Fn(Job<C>) + Send + Sync>;

#[derive(Debug)]
struct Worker {
    id: usize,
    state: Arc<AtomicU8>,
    handle: Option<JoinHandle<()>>,
}

/// Pool de tamaño fijo
pub struct WorkerPool<C: Send + 'static> {
    queue: JobQueue<C>,
    workers: Vec<Worker>,
    metrics: MetricsCollector,
}

impl<C: Send + 'static> WorkerPool<C> {
    /// Crea el pool y arranca `size` workers.
    ///
    /// # Ejemplo
    /// ```
    /// use static_http_server::metrics::MetricsCollector;
    /// use static_http_server::server::WorkerPool;
    ///
    /// let mut pool = WorkerPool::new(2, 8, MetricsCollector::new(), |job| {
    ///     let _number: u32 = job.conn;
    /// })
    /// .unwrap();
    ///
    /// pool.submit(42).unwrap();
    /// pool.shutdown();
    /// ```
    pub fn new<F>(
        size: usize,
        queue_capacity: usize,
        metrics: MetricsCollector,
        handler: F,
    ) -> Result<Self, PoolError>
    where
        F: Fn(Job<C>) + Send + Sync + 'static,
    {
        if size == 0 {
            return Err(PoolError::NoWorkers);
        }

        let handler: JobHandler<C> = Arc::new(handler);
        let mut pool = Self {
            queue: JobQueue::new(queue_capacity),
            workers: Vec::with_capacity(size),
            metrics,
        };

        for id in 0..size {
            let state = Arc::new(AtomicU8::new(WorkerState::Idle as u8));
            let queue = pool.queue.clone();
            let metrics = pool.metrics.clone();
            let handler = Arc::clone(&handler);
            let worker_state = Arc::clone(&state);

            // Si falla a mitad de camino, el Drop del pool apaga los ya creados
            let handle = thread::Builder::new()
                .name(format!("worker-{}", id))
                .spawn(move || worker_loop(id, queue, worker_state, metrics, handler))
                .map_err(PoolError::Spawn)?;

            pool.workers.push(Worker { id, state, handle: Some(handle) });
        }

        debug!(workers = size, capacity = pool.queue.capacity(), "pool de workers listo");
        Ok(pool)
    }

    /// Encola una conexión. Bloquea mientras la cola esté llena.
    ///
    /// Si el pool ya está apagado la conexión se cierra y se retorna
    /// [`PoolError::ShutDown`].
    pub fn submit(&self, conn: C) -> Result<u64, PoolError> {
        match self.queue.push(conn) {
            Ok(id) => {
                self.metrics.record_submitted();
                Ok(id)
            }
            Err(conn) => {
                drop(conn);
                self.metrics.record_rejected();
                warn!("pool apagado: conexión rechazada y cerrada");
                Err(PoolError::ShutDown)
            }
        }
    }

    /// Deja de aceptar trabajos, drena la cola y espera a todos los workers.
    ///
    /// Llamarla más de una vez no hace nada.
    pub fn shutdown(&mut self) {
        self.queue.close();
        if !self.queue.is_empty() {
            debug!(queued = self.queue.len(), "drenando la cola antes de terminar");
        }

        for worker in &mut self.workers {
            if let Some(handle) = worker.handle.take() {
                if handle.join().is_err() {
                    warn!(worker = worker.id, "el worker terminó con panic");
                }
            }
        }
    }

    /// Número fijo de workers
    pub fn size(&self) -> usize {
        self.workers.len()
    }

    /// Conexiones esperando worker
    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn is_shut_down(&self) -> bool {
        self.queue.is_closed()
    }

    pub fn worker_states(&self) -> Vec<WorkerState> {
        self.workers
            .iter()
            .map(|worker| WorkerState::from_u8(worker.state.load(Ordering::Acquire)))
            .collect()
    }
}

impl<C: Send + 'static> Drop for WorkerPool<C> {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl<C: Send + 'static> std::fmt::Debug for WorkerPool<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("workers", &self.workers.len())
            .field("capacity", &self.queue.capacity())
            .field("queued", &self.queue.len())
            .finish()
    }
}

/// Loop principal del worker
fn worker_loop<C>(
    id: usize,
    queue: JobQueue<C>,
    state: Arc<AtomicU8>,
    metrics: MetricsCollector,
    handler: JobHandler<C>,
) {
    debug!(worker = id, "worker iniciado");

    while let Some(job) = queue.pop() {
        state.store(WorkerState::Processing as u8, Ordering::Release);
        metrics.worker_busy();

        let job_id = job.id;
        // Un panic en un job no se lleva al worker; la conexión se libera al desenrollar
        if panic::catch_unwind(AssertUnwindSafe(|| handler(job))).is_err() {
            error!(worker = id, job = job_id, "panic procesando el job; conexión cerrada");
        }

        metrics.worker_idle();
        state.store(WorkerState::Idle as u8, Ordering::Release);
    }

    state.store(WorkerState::Terminated as u8, Ordering::Release);
    debug!(worker = id, "worker terminado");
}
