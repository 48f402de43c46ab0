//! # Módulo del Servidor
//! src/server/mod.rs
//!
//! Pipeline de concurrencia:
//!
//! ```text
//! Server (acceptor) ──submit──> JobQueue ──pop──> Worker ──> ResponseEngine
//! ```
//!
//! 1. `listener`: socket, loop de `accept` y shutdown
//! 2. `queue`: cola FIFO acotada entre acceptor y workers
//! 3. `pool`: N workers fijos
//! 4. `handler`: una conexión, una respuesta
//! 5. `connections`: conexiones abiertas, para cortarlas al apagar

mod connections;
pub mod handler;
pub mod listener;
pub mod pool;
pub mod queue;

// Re-exportar para facilitar el uso
pub use handler::{Outcome, ResponseEngine};
pub use listener::{Server, ShutdownHandle};
pub use pool::{WorkerPool, WorkerState};
pub use queue::{Job, JobQueue};
