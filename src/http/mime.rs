//! # Tabla de Tipos MIME
//! src/http/mime.rs
//!
//! Tabla estática e inmutable: se comparte entre todos los workers sin locks.

/// Content-Type que se usa cuando la extensión no está en la tabla
pub const OCTET_STREAM: &str = "application/octet-stream";

/// Extensiones servibles (con el punto) y su Content-Type.
///
/// La comparación es exacta y sensible a mayúsculas: `.HTML` no es `.html`.
pub const MIME_TYPES: &[(&str, &str)] = &[
    (".html", "text/html"),
    (".jpg", "image/jpeg"),
    (".css", "text/css"),
    (".js", "text/javascript"),
];

/// Busca el Content-Type de una extensión (incluyendo el punto)
///
/// # Ejemplo
/// ```
/// use static_http_server::http::mime;
///
/// assert_eq!(mime::lookup(".css"), Some("text/css"));
/// assert_eq!(mime::lookup(".zip"), None);
/// ```
pub fn lookup(extension: &str) -> Option<&'static str> {
    MIME_TYPES
        .iter()
        .find(|(ext, _)| *ext == extension)
        .map(|(_, mime_type)| *mime_type)
}

/// Verifica si una extensión está en la tabla
pub fn is_supported(extension: &str) -> bool {
    lookup(extension).is_some()
}

/// Extrae la extensión: todo desde el último `.` (incluido).
///
/// Retorna `None` si no hay ningún punto.
pub fn extension_of(path: &str) -> Option<&str> {
    path.rfind('.').map(|dot| &path[dot..])
}
