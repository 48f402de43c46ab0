//! # Módulo HTTP
//!
//! Subconjunto mínimo de HTTP que necesita un servidor de archivos:
//!
//! - Parsing de la request line (método, URI, versión)
//! - Escritura línea por línea de status, headers y body
//! - Tabla de tipos MIME
//!
//! No hay keep-alive, chunked transfer ni rangos: una conexión, un request,
//! una respuesta.
//!
//! ### Respuesta exitosa
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/html\r\n
//! Content-Length: 12\r\n
//! \r\n
//! <12 bytes>
//! ```
//!
//! ### Respuesta 404
//!
//! ```text
//! HTTP/1.1 404 Not Found\r\n
//! Content-Length: 0\r\n
//! \r\n
//! ```

pub mod mime;
pub mod request;
pub mod status;
pub mod writer;

pub use request::{ParseError, ParsedRequest};
pub use status::StatusCode;
