//! # Cola FIFO Acotada
//! src/server/queue.rs
//!
//! Cola thread-safe entre el acceptor (productor) y los workers
//! (consumidores). Un `Mutex` protege el estado y dos `Condvar` señalan
//! "ya no está vacía" y "ya no está llena".
//!
//! - `push` bloquea mientras la cola está llena: backpressure sobre el acceptor
//! - `pop` bloquea mientras está vacía; retorna `None` cuando la cola está
//!   cerrada y ya no quedan trabajos (política de drenado)

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Una conexión aceptada esperando worker
#[derive(Debug)]
pub struct Job<C> {
    /// Número de secuencia asignado al encolar
    pub id: u64,

    /// La conexión; su dueño es quien tenga el `Job`
    pub conn: C,
}

#[derive(Debug)]
struct QueueState<C> {
    jobs: VecDeque<Job<C>>,
    next_id: u64,
    closed: bool,
}

/// Cola FIFO acotada, clonable (los clones comparten la misma cola)
#[derive(Debug)]
pub struct JobQueue<C> {
    state: Arc<Mutex<QueueState<C>>>,
    not_empty: Arc<Condvar>,
    not_full: Arc<Condvar>,
    capacity: usize,
}

impl<C> JobQueue<C> {
    /// Crea una cola con capacidad máxima (mínimo 1)
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            state: Arc::new(Mutex::new(QueueState {
                jobs: VecDeque::with_capacity(capacity),
                next_id: 0,
                closed: false,
            })),
            not_empty: Arc::new(Condvar::new()),
            not_full: Arc::new(Condvar::new()),
            capacity,
        }
    }

    fn lock(&self) -> MutexGuard<'_, QueueState<C>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encola una conexión, bloqueando mientras la cola esté llena.
    ///
    /// Si la cola está cerrada devuelve la conexión en `Err` para que el
    /// llamador decida qué hacer con ella.
    pub fn push(&self, conn: C) -> Result<u64, C> {
        let mut state = self.lock();

        while state.jobs.len() >= self.capacity && !state.closed {
            state = self.not_full.wait(state).unwrap_or_else(PoisonError::into_inner);
        }

        if state.closed {
            return Err(conn);
        }

        let id = state.next_id;
        state.next_id += 1;
        state.jobs.push_back(Job { id, conn });

        // Notificar a un worker esperando
        self.not_empty.notify_one();

        Ok(id)
    }

    /// Desencola el job más antiguo, bloqueando hasta que haya uno.
    ///
    /// Retorna `None` solo cuando la cola está cerrada y vacía.
    pub fn pop(&self) -> Option<Job<C>> {
        let mut state = self.lock();

        loop {
            if let Some(job) = state.jobs.pop_front() {
                self.not_full.notify_one();
                return Some(job);
            }

            if state.closed {
                return None;
            }

            state = self.not_empty.wait(state).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Cierra la cola: no entra nada nuevo, lo encolado se sigue entregando.
    /// Despierta a todos los que estén esperando.
    pub fn close(&self) {
        self.lock().closed = true;
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Retorna el tamaño actual de la cola
    pub fn len(&self) -> usize {
        self.lock().jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl<C> Clone for JobQueue<C> {
    fn clone(&self) -> Self {
        Self {
            state: Arc::clone(&self.state),
            not_empty: Arc::clone(&self.not_empty),
            not_full: Arc::clone(&self.not_full),
            capacity: self.capacity,
        }
    }
}
