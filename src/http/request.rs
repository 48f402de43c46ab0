//! # Parsing de la Request Line
//! src/http/request.rs
//!
//! El servidor solo mira la primera línea del request:
//!
//! ```text
//! GET /index.html HTTP/1.1\r\n
//! Host: localhost:8080\r\n        <- ignorado
//! \r\n
//! ```
//!
//! Todo lo que viene después de la request line se descarta.

use thiserror::Error;

/// Request parseado: método, URI y versión, tal como llegaron.
///
/// Los tres campos nunca están vacíos.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedRequest {
    method: String,
    uri: String,
    http_version: String,
}

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// Buffer vacío o solo espacios
    #[error("empty request")]
    EmptyRequest,

    /// La request line no es UTF-8 válido
    #[error("request line is not valid UTF-8")]
    InvalidEncoding,

    /// La request line no tiene exactamente tres tokens
    #[error("invalid request line: expected 3 tokens, found {found}")]
    InvalidRequestLine { found: usize },
}

impl ParsedRequest {
    /// Parsea la request line desde los bytes crudos leídos del socket
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use static_http_server::http::ParsedRequest;
    ///
    /// let request = ParsedRequest::parse(b"GET /index.html HTTP/1.1\r\n\r\n").unwrap();
    /// assert_eq!(request.method(), "GET");
    /// assert_eq!(request.uri(), "/index.html");
    /// assert_eq!(request.http_version(), "HTTP/1.1");
    /// ```
    pub fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        // Solo la primera línea; el resto puede ser binario y no nos importa
        let first_line = match raw.iter().position(|&b| b == b'\n') {
            Some(end) => &raw[..end],
            None => raw,
        };

        let line = std::str::from_utf8(first_line).map_err(|_| ParseError::InvalidEncoding)?;

        // split_whitespace también se come el '\r' final de la versión
        let tokens: Vec<&str> = line.split_whitespace().collect();

        match tokens.as_slice() {
            [] => Err(ParseError::EmptyRequest),
            [method, uri, version] => Ok(Self {
                method: (*method).to_string(),
                uri: (*uri).to_string(),
                http_version: (*version).to_string(),
            }),
            other => Err(ParseError::InvalidRequestLine { found: other.len() }),
        }
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn http_version(&self) -> &str {
        &self.http_version
    }
}
