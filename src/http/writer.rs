//! # Serialización de la Respuesta
//! src/http/writer.rs
//!
//! Cada función escribe UNA línea completa con un solo `write_all`, que
//! reintenta internamente las escrituras cortas. O se transmite la línea
//! entera o se reporta el error.
//!
//! ```text
//! HTTP/1.1 200 OK\r\n                  <- write_status_line
//! Content-Type: text/html\r\n          <- write_header
//! Content-Length: 12\r\n\r\n           <- write_content_length
//! <12 bytes>                           <- write_body
//! ```

use super::mime::OCTET_STREAM;
use super::StatusCode;
use std::io::{self, Write};

/// Escribe `<version> <code> <reason>\r\n`
pub fn write_status_line<W: Write>(
    conn: &mut W,
    http_version: &str,
    status: StatusCode,
) -> io::Result<()> {
    let line = format!("{} {}\r\n", http_version, status);
    conn.write_all(line.as_bytes())
}

/// Escribe `<Name>: <value>\r\n`
pub fn write_header<W: Write>(conn: &mut W, name: &str, value: &str) -> io::Result<()> {
    let line = format!("{}: {}\r\n", name, value);
    conn.write_all(line.as_bytes())
}

/// Escribe `Content-Length: <n>\r\n` seguido de la línea vacía que cierra
/// los headers. Siempre es el último header.
pub fn write_content_length<W: Write>(conn: &mut W, byte_count: u64) -> io::Result<()> {
    let line = format!("Content-Length: {}\r\n\r\n", byte_count);
    conn.write_all(line.as_bytes())
}

/// Content-Type genérico para extensiones ausentes o no soportadas
pub fn write_octet_stream<W: Write>(conn: &mut W) -> io::Result<()> {
    write_header(conn, "Content-Type", OCTET_STREAM)
}

/// Escribe el cuerpo y hace flush
pub fn write_body<W: Write>(conn: &mut W, body: &[u8]) -> io::Result<()> {
    conn.write_all(body)?;
    conn.flush()
}
