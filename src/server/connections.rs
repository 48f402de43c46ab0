//! # Conexiones Abiertas
//! src/server/connections.rs
//!
//! Registro de las conexiones aceptadas que todavía no se cerraron, ya sea
//! que esperen en la cola o que las tenga un worker. Al apagar, las que no
//! terminan dentro del plazo se cortan con `shutdown()`, y así un cliente
//! que nunca manda nada deja de retener a su worker.

use std::collections::HashMap;
use std::net::{Shutdown, TcpStream};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Default)]
struct OpenState {
    next_key: u64,

    /// `None` si no se pudo duplicar el socket: cuenta como abierta pero no se puede cortar
    streams: HashMap<u64, Option<TcpStream>>,
}

/// Conexiones abiertas, compartidas entre el acceptor y los workers
#[derive(Debug, Default)]
pub struct OpenConnections {
    state: Mutex<OpenState>,
    released: Condvar,
}

impl OpenConnections {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn state(&self) -> MutexGuard<'_, OpenState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra una conexión recién aceptada. Sigue abierta hasta el drop
    /// del [`Registered`] retornado.
    pub fn register(self: &Arc<Self>, stream: &TcpStream) -> Registered {
        let handle = match stream.try_clone() {
            Ok(clone) => Some(clone),
            Err(e) => {
                debug!(error = %e, "no se pudo duplicar el socket; no se podrá cortar al apagar");
                None
            }
        };

        let mut state = self.state();
        let key = state.next_key;
        state.next_key += 1;
        state.streams.insert(key, handle);

        Registered { key, open: Arc::clone(self) }
    }

    fn release(&self, key: u64) {
        // El duplicado se cierra fuera del lock
        let removed = self.state().streams.remove(&key);
        drop(removed);
        self.released.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state().streams.len()
    }

    /// Espera a que no quede ninguna conexión abierta, como mucho `timeout`.
    ///
    /// Retorna `true` si se vaciaron a tiempo.
    pub fn wait_empty(&self, timeout: Duration) -> bool {
        let state = self.state();
        let (state, _) = self
            .released
            .wait_timeout_while(state, timeout, |state| !state.streams.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        state.streams.is_empty()
    }

    /// Corta lectura y escritura en todas las conexiones abiertas.
    ///
    /// Un worker bloqueado en `read` recibe EOF y termina el job. Retorna
    /// cuántas conexiones se cortaron.
    pub fn shutdown_all(&self) -> usize {
        self.state()
            .streams
            .values()
            .flatten()
            .filter(|stream| stream.shutdown(Shutdown::Both).is_ok())
            .count()
    }
}

/// Entrada en el registro. Al hacer drop la conexión deja de contar como abierta.
#[derive(Debug)]
pub struct Registered {
    key: u64,
    open: Arc<OpenConnections>,
}

impl Drop for Registered {
    fn drop(&mut self) {
        self.open.release(self.key);
    }
}
