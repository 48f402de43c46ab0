//! # Motor de Respuestas
//! src/server/handler.rs
//!
//! Atiende UNA conexión de principio a fin:
//!
//! ```text
//! read → parse → resolve → headers → (archivo) → close
//! ```
//!
//! La conexión entra por valor y se cierra (drop) exactamente una vez al
//! final de [`ResponseEngine::serve`], sin importar por qué rama se salió.

use crate::config::REQUEST_BUFFER_SIZE;
use crate::error::ConnectionError;
use crate::http::mime::{self, OCTET_STREAM};
use crate::http::writer::{
    write_body, write_content_length, write_header, write_octet_stream, write_status_line,
};
use crate::http::{ParsedRequest, StatusCode};
use crate::metrics::MetricsCollector;
use crate::resolver::{resolve, Resolution, WebRoot};
use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::debug;

/// Versión usada cuando la request line no se pudo parsear
const FALLBACK_VERSION: &str = "HTTP/1.0";

/// Cómo terminó una conexión sin errores
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// 200 con `bytes` de body
    Served { bytes: u64 },

    /// 404 sin body
    NotFound,

    /// El cliente cerró sin mandar nada
    Closed,
}

/// Construye y envía respuestas. Inmutable: se comparte entre workers.
#[derive(Debug, Clone)]
pub struct ResponseEngine {
    web_root: WebRoot,
    metrics: MetricsCollector,
}

impl ResponseEngine {
    pub fn new(web_root: WebRoot, metrics: MetricsCollector) -> Self {
        Self { web_root, metrics }
    }

    /// Lee el request, responde y cierra la conexión.
    pub fn serve<C: Read + Write>(&self, mut conn: C) -> Result<Outcome, ConnectionError> {
        let start = Instant::now();

        let mut buffer = vec![0u8; REQUEST_BUFFER_SIZE];
        let result = match read_request(&mut conn, &mut buffer) {
            Ok(0) => Ok(Outcome::Closed),
            Ok(n) => self.respond(&mut conn, &buffer[..n]),
            Err(e) => Err(ConnectionError::Read(e)),
        };

        drop(conn);

        self.record(&result, start.elapsed());
        result
    }

    /// Genera la respuesta para los bytes crudos de un request.
    ///
    /// Una request line inválida recibe un `400` best effort y se reporta
    /// como [`ConnectionError::Parse`].
    pub fn respond<W: Write>(&self, conn: &mut W, raw: &[u8]) -> Result<Outcome, ConnectionError> {
        let request = match ParsedRequest::parse(raw) {
            Ok(request) => request,
            Err(e) => {
                // El cliente puede haberse ido; el error que importa es el de parsing
                let _ = send_bad_request(conn);
                return Err(ConnectionError::Parse(e));
            }
        };

        let resolved = resolve(&self.web_root, request.uri());
        debug!(
            method = request.method(),
            uri = request.uri(),
            path = resolved.full_path(),
            found = resolved.is_found(),
            "request"
        );

        let version = request.http_version();
        match resolved.status() {
            Resolution::Found { file } => send_file(conn, version, resolved.extension(), file),
            Resolution::NotFound => send_not_found(conn, version, resolved.extension()),
        }
    }

    fn record(&self, result: &Result<Outcome, ConnectionError>, latency: Duration) {
        match result {
            Ok(Outcome::Served { bytes }) => {
                self.metrics.record_response(StatusCode::Ok.as_u16(), *bytes, latency)
            }
            Ok(Outcome::NotFound) => {
                self.metrics.record_response(StatusCode::NotFound.as_u16(), 0, latency)
            }
            Ok(Outcome::Closed) => {}
            Err(ConnectionError::Parse(_)) => self.metrics.record_parse_error(),
            Err(_) => self.metrics.record_connection_error(),
        }
    }
}

/// Lee hasta ver el fin de la request line, EOF o buffer lleno.
///
/// Sin timeout: un cliente que no manda nada ocupa al worker indefinidamente.
fn read_request<R: Read>(conn: &mut R, buffer: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;

    while filled < buffer.len() {
        match conn.read(&mut buffer[filled..]) {
            Ok(0) => break,
            Ok(n) => {
                let chunk = &buffer[filled..filled + n];
                filled += n;
                if chunk.contains(&b'\n') {
                    break;
                }
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }

    Ok(filled)
}

fn send_bad_request<W: Write>(conn: &mut W) -> io::Result<()> {
    write_status_line(conn, FALLBACK_VERSION, StatusCode::BadRequest)?;
    write_content_length(conn, 0)?;
    conn.flush()
}

/// 404. Si la extensión no es servible se anuncia `application/octet-stream`.
fn send_not_found<W: Write>(
    conn: &mut W,
    version: &str,
    extension: Option<&str>,
) -> Result<Outcome, ConnectionError> {
    write_status_line(conn, version, StatusCode::NotFound).map_err(ConnectionError::Write)?;

    if !extension.is_some_and(mime::is_supported) {
        write_octet_stream(conn).map_err(ConnectionError::Write)?;
    }

    write_content_length(conn, 0).map_err(ConnectionError::Write)?;
    conn.flush().map_err(ConnectionError::Write)?;

    Ok(Outcome::NotFound)
}

/// 200 + archivo completo. Si la lectura falla después de los primeros
/// headers no se envía ni Content-Length ni body.
fn send_file<W: Write>(
    conn: &mut W,
    version: &str,
    extension: Option<&str>,
    file: &Path,
) -> Result<Outcome, ConnectionError> {
    write_status_line(conn, version, StatusCode::Ok).map_err(ConnectionError::Write)?;

    let content_type = extension.and_then(mime::lookup).unwrap_or(OCTET_STREAM);
    write_header(conn, "Content-Type", content_type).map_err(ConnectionError::Write)?;

    let body = read_file(file)?;
    let bytes = body.len() as u64;

    write_content_length(conn, bytes).map_err(ConnectionError::Write)?;
    write_body(conn, &body).map_err(ConnectionError::Write)?;

    Ok(Outcome::Served { bytes })
}

/// Lee el archivo entero. El tamaño leído debe coincidir con el del stat.
fn read_file(path: &Path) -> Result<Vec<u8>, ConnectionError> {
    let file = File::open(path).map_err(|source| ConnectionError::FileOpen {
        path: path.to_path_buf(),
        source,
    })?;

    let expected = file
        .metadata()
        .map_err(|source| ConnectionError::FileRead { path: path.to_path_buf(), source })?
        .len();

    read_sized(file, expected, path)
}

/// Lee exactamente `expected` bytes de `source`.
///
/// Si hay más, se ignoran (el archivo creció después del stat). Si hay
/// menos, es [`ConnectionError::ShortRead`].
fn read_sized<R: Read>(source: R, expected: u64, path: &Path) -> Result<Vec<u8>, ConnectionError> {
    let mut body = Vec::new();
    let size = usize::try_from(expected).unwrap_or(usize::MAX);
    body.try_reserve_exact(size).map_err(|_| ConnectionError::OutOfMemory {
        path: path.to_path_buf(),
        size: expected,
    })?;

    source
        .take(expected)
        .read_to_end(&mut body)
        .map_err(|source| ConnectionError::FileRead { path: path.to_path_buf(), source })?;

    let actual = body.len() as u64;
    if actual != expected {
        return Err(ConnectionError::ShortRead {
            path: path.to_path_buf(),
            expected,
            actual,
        });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;

    /// Conexión en memoria: entrada fija, salida compartida, cuenta cierres
    struct MockConn {
        input: Cursor<Vec<u8>>,
        output: Arc<Mutex<Vec<u8>>>,
        closed: Arc<AtomicUsize>,
    }

    impl MockConn {
        fn new(input: &[u8]) -> (Self, Arc<Mutex<Vec<u8>>>, Arc<AtomicUsize>) {
            let output = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicUsize::new(0));
            let conn = Self {
                input: Cursor::new(input.to_vec()),
                output: Arc::clone(&output),
                closed: Arc::clone(&closed),
            };
            (conn, output, closed)
        }
    }

    impl Read for MockConn {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MockConn {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Drop for MockConn {
        fn drop(&mut self) {
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }

    /// Falla todas las escrituras
    struct BrokenConn;

    impl Write for BrokenConn {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::ConnectionReset, "reset"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn engine() -> (TempDir, ResponseEngine, MetricsCollector) {
        let tmp = tempfile::tempdir().unwrap();
        let www = tmp.path().join("www");
        fs::create_dir_all(&www).unwrap();
        fs::write(www.join("index.html"), b"hello world!").unwrap();
        fs::write(www.join("style.css"), b"body { color: red; }").unwrap();
        fs::write(www.join("app.js"), b"console.log(1);").unwrap();
        fs::write(www.join("photo.jpg"), [0xFFu8, 0xD8, 0xFF, 0xE0, 0x00]).unwrap();
        fs::write(www.join("empty.html"), b"").unwrap();
        fs::write(www.join("archive.zip"), b"PK\x03\x04").unwrap();
        fs::write(tmp.path().join("secret.html"), b"top secret").unwrap();

        let metrics = MetricsCollector::new();
        let root = WebRoot::new(www.to_str().unwrap()).unwrap();
        (tmp, ResponseEngine::new(root, metrics.clone()), metrics)
    }

    fn respond(engine: &ResponseEngine, raw: &[u8]) -> (Result<Outcome, ConnectionError>, Vec<u8>) {
        let mut out = Vec::new();
        let result = engine.respond(&mut out, raw);
        (result, out)
    }

    /// Separa headers y body, y parsea los headers a pares
    fn split_response(raw: &[u8]) -> (String, Vec<(String, String)>, Vec<u8>) {
        let end = raw.windows(4).position(|w| w == b"\r\n\r\n").expect("no header terminator");
        let head = String::from_utf8(raw[..end].to_vec()).unwrap();
        let body = raw[end + 4..].to_vec();

        let mut lines = head.split("\r\n");
        let status = lines.next().unwrap().to_string();
        let headers = lines
            .map(|line| {
                let (name, value) = line.split_once(": ").unwrap();
                (name.to_string(), value.to_string())
            })
            .collect();
        (status, headers, body)
    }

    #[test]
    fn test_index_html_exact_bytes() {
        let (_tmp, engine, _) = engine();
        let (result, out) = respond(&engine, b"GET /index.html HTTP/1.1\r\n\r\n");

        assert_eq!(result.unwrap(), Outcome::Served { bytes: 12 });
        assert_eq!(
            out,
            b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\nContent-Length: 12\r\n\r\nhello world!"
        );
    }

    #[test]
    fn test_missing_file_exact_bytes() {
        let (_tmp, engine, _) = engine();
        let (result, out) = respond(&engine, b"GET /missing.html HTTP/1.1\r\n\r\n");

        assert_eq!(result.unwrap(), Outcome::NotFound);
        assert_eq!(out, b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn test_unsupported_extension_exact_bytes() {
        let (_tmp, engine, _) = engine();
        let (result, out) = respond(&engine, b"GET /archive.zip HTTP/1.1\r\n\r\n");

        assert_eq!(result.unwrap(), Outcome::NotFound);
        assert_eq!(
            out,
            b"HTTP/1.1 404 Not Found\r\nContent-Type: application/octet-stream\r\nContent-Length: 0\r\n\r\n"
                .to_vec()
        );
    }

    #[test]
    fn test_no_extension_gets_octet_stream() {
        let (_tmp, engine, _) = engine();
        let (_, out) = respond(&engine, b"GET / HTTP/1.0\r\n\r\n");
        let (status, headers, body) = split_response(&out);

        assert_eq!(status, "HTTP/1.0 404 Not Found");
        assert!(headers.contains(&("Content-Type".into(), "application/octet-stream".into())));
        assert!(body.is_empty());
    }

    #[test]
    fn test_all_supported_types() {
        let (_tmp, engine, _) = engine();
        let cases = [
            ("/index.html", "text/html", 12),
            ("/style.css", "text/css", 20),
            ("/app.js", "text/javascript", 15),
            ("/photo.jpg", "image/jpeg", 5),
        ];

        for (uri, mime_type, len) in cases {
            let raw = format!("GET {} HTTP/1.1\r\n\r\n", uri);
            let (result, out) = respond(&engine, raw.as_bytes());
            let (status, headers, body) = split_response(&out);

            assert_eq!(result.unwrap(), Outcome::Served { bytes: len as u64 }, "{}", uri);
            assert_eq!(status, "HTTP/1.1 200 OK");
            assert_eq!(headers[0], ("Content-Type".to_string(), mime_type.to_string()));
            assert_eq!(headers[1], ("Content-Length".to_string(), len.to_string()));
            assert_eq!(body.len(), len);
        }
    }

    #[test]
    fn test_binary_body_is_untouched() {
        let (_tmp, engine, _) = engine();
        let (_, out) = respond(&engine, b"GET /photo.jpg HTTP/1.1\r\n\r\n");
        assert!(out.ends_with(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00]));
    }

    #[test]
    fn test_empty_file() {
        let (_tmp, engine, _) = engine();
        let (result, out) = respond(&engine, b"GET /empty.html HTTP/1.1\r\n\r\n");

        assert_eq!(result.unwrap(), Outcome::Served { bytes: 0 });
        assert!(out.ends_with(b"Content-Length: 0\r\n\r\n"));
    }

    #[test]
    fn test_header_round_trip() {
        let (_tmp, engine, _) = engine();
        let (_, out) = respond(&engine, b"GET /style.css HTTP/1.1\r\n\r\n");
        let (_, headers, body) = split_response(&out);

        let content_type = headers.iter().find(|(n, _)| n == "Content-Type").unwrap();
        let content_length = headers.iter().find(|(n, _)| n == "Content-Length").unwrap();

        assert_eq!(Some(content_type.1.as_str()), mime::lookup(".css"));
        assert_eq!(content_length.1.parse::<usize>().unwrap(), body.len());
    }

    #[test]
    fn test_traversal_gets_404() {
        let (_tmp, engine, _) = engine();
        let (result, out) = respond(&engine, b"GET /../secret.html HTTP/1.1\r\n\r\n");

        assert_eq!(result.unwrap(), Outcome::NotFound);
        assert!(!String::from_utf8_lossy(&out).contains("top secret"));
    }

    #[test]
    fn test_malformed_request_gets_400() {
        let (_tmp, engine, _) = engine();
        let (result, out) = respond(&engine, b"GARBAGE\r\n\r\n");

        assert!(matches!(result, Err(ConnectionError::Parse(_))));
        assert_eq!(out, b"HTTP/1.0 400 Bad Request\r\nContent-Length: 0\r\n\r\n");
    }

    #[test]
    fn test_write_failure_is_per_connection_error() {
        let (_tmp, engine, _) = engine();
        let result = engine.respond(&mut BrokenConn, b"GET /index.html HTTP/1.1\r\n\r\n");
        assert!(matches!(result, Err(ConnectionError::Write(_))));
    }

    #[test]
    fn test_parse_error_survives_broken_client() {
        let (_tmp, engine, _) = engine();
        let result = engine.respond(&mut BrokenConn, b"X\r\n");
        assert!(matches!(result, Err(ConnectionError::Parse(_))));
    }

    #[test]
    fn test_serve_closes_connection_once() {
        let (_tmp, engine, metrics) = engine();
        let (conn, output, closed) = MockConn::new(b"GET /index.html HTTP/1.1\r\nHost: x\r\n\r\n");

        let outcome = engine.serve(conn).unwrap();

        assert_eq!(outcome, Outcome::Served { bytes: 12 });
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(output.lock().unwrap().ends_with(b"hello world!"));
        assert_eq!(metrics.snapshot().status_codes.get(&200), Some(&1));
    }

    #[test]
    fn test_serve_closes_on_parse_error() {
        let (_tmp, engine, metrics) = engine();
        let (conn, _output, closed) = MockConn::new(b"NONSENSE");

        assert!(engine.serve(conn).is_err());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert_eq!(metrics.snapshot().parse_errors, 1);
    }

    #[test]
    fn test_serve_empty_connection() {
        let (_tmp, engine, _) = engine();
        let (conn, output, closed) = MockConn::new(b"");

        assert_eq!(engine.serve(conn).unwrap(), Outcome::Closed);
        assert!(output.lock().unwrap().is_empty());
        assert_eq!(closed.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_read_request_stops_at_newline() {
        let mut input = Cursor::new(b"GET / HTTP/1.1\r\nrest".to_vec());
        let mut buffer = [0u8; 64];
        let n = read_request(&mut input, &mut buffer).unwrap();
        assert!(buffer[..n].starts_with(b"GET / HTTP/1.1\r\n"));
    }

    #[test]
    fn test_read_request_fills_buffer_at_most() {
        let mut input = Cursor::new(vec![b'a'; 100]);
        let mut buffer = [0u8; 16];
        assert_eq!(read_request(&mut input, &mut buffer).unwrap(), 16);
    }

    /// Falla siempre al leer
    struct FailingReader;

    impl Read for FailingReader {
        fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::Other, "disk error"))
        }
    }

    fn has_content_length(out: &[u8]) -> bool {
        String::from_utf8_lossy(out).contains("Content-Length")
    }

    #[test]
    fn test_read_sized_exact() {
        let body = read_sized(Cursor::new(b"hello".to_vec()), 5, Path::new("/x.html")).unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_read_sized_ignores_growth_after_stat() {
        let body = read_sized(Cursor::new(b"hello world".to_vec()), 5, Path::new("/x.html")).unwrap();
        assert_eq!(body, b"hello");
    }

    #[test]
    fn test_read_sized_short_read() {
        let result = read_sized(Cursor::new(b"hel".to_vec()), 5, Path::new("/x.html"));
        assert!(matches!(
            result,
            Err(ConnectionError::ShortRead { expected: 5, actual: 3, .. })
        ));
    }

    #[test]
    fn test_read_sized_read_error() {
        let result = read_sized(FailingReader, 5, Path::new("/x.html"));
        assert!(matches!(result, Err(ConnectionError::FileRead { .. })));
    }

    #[test]
    fn test_file_gone_after_resolve_sends_no_length() {
        let (tmp, _, _) = engine();
        let gone = tmp.path().join("www/gone.html");

        let mut out = Vec::new();
        let result = send_file(&mut out, "HTTP/1.1", Some(".html"), &gone);

        assert!(matches!(result, Err(ConnectionError::FileOpen { .. })));
        assert_eq!(out, b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n");
        assert!(!has_content_length(&out));
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn test_unreadable_file_sends_no_length() {
        let (tmp, _, _) = engine();
        // Abrir un directorio funciona, leerlo da EISDIR
        let dir = tmp.path().join("www/sub.html");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("inner.html"), b"x").unwrap();

        let mut out = Vec::new();
        let result = send_file(&mut out, "HTTP/1.1", Some(".html"), &dir);

        assert!(matches!(result, Err(ConnectionError::FileRead { .. })));
        assert!(out.starts_with(b"HTTP/1.1 200 OK\r\nContent-Type: text/html\r\n"));
        assert!(!has_content_length(&out));
    }
}
