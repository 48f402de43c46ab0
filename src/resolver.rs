//! # Resolución de Rutas
//! src/resolver.rs
//!
//! Convierte una URI en una ruta del filesystem y decide si se puede servir.
//!
//! ```text
//! web_root + uri  →  "/srv/www" + "/index.html"  →  "/srv/www/index.html"
//! ```
//!
//! La concatenación es literal, pero antes de tocar el archivo la ruta se
//! canonicaliza y se exige que quede dentro del web root. Así `/../etc/passwd`
//! o un symlink que apunte afuera terminan en 404.
//!
//! Solo se consulta metadata: aquí nunca se lee el contenido del archivo.

use crate::error::ConfigError;
use crate::http::mime;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Web root validado al arrancar. Inmutable y compartido por los workers.
#[derive(Debug, Clone)]
pub struct WebRoot {
    /// Tal como vino en la línea de comandos
    raw: String,

    /// Forma canónica, usada como prefijo obligatorio
    canonical: PathBuf,
}

impl WebRoot {
    /// Canonicaliza el web root; falla si no existe o no es un directorio
    pub fn new(raw: impl Into<String>) -> Result<Self, ConfigError> {
        let raw = raw.into();
        let canonical = fs::canonicalize(&raw).map_err(|source| ConfigError::WebRoot {
            path: PathBuf::from(&raw),
            source,
        })?;

        if !canonical.is_dir() {
            return Err(ConfigError::NotADirectory(canonical));
        }

        Ok(Self { raw, canonical })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn canonical(&self) -> &Path {
        &self.canonical
    }
}

/// Veredicto de la resolución
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Archivo servible; `file` es la ruta canónica verificada
    Found { file: PathBuf },
    NotFound,
}

/// Ruta candidata + veredicto
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// `web_root + uri`, siempre presente aunque el veredicto sea 404
    full_path: String,
    status: Resolution,
}

impl ResolvedPath {
    pub fn full_path(&self) -> &str {
        &self.full_path
    }

    pub fn status(&self) -> &Resolution {
        &self.status
    }

    pub fn is_found(&self) -> bool {
        matches!(self.status, Resolution::Found { .. })
    }

    /// Extensión de la ruta candidata (desde el último punto, incluido)
    pub fn extension(&self) -> Option<&str> {
        mime::extension_of(&self.full_path)
    }
}

/// Resuelve una URI contra el web root.
///
/// Es `Found` solo si:
/// 1. hay extensión y está en la tabla MIME
/// 2. la ruta existe y se puede canonicalizar
/// 3. la ruta canónica queda dentro del web root
/// 4. es un archivo regular
pub fn resolve(web_root: &WebRoot, uri: &str) -> ResolvedPath {
    let full_path = format!("{}{}", web_root.as_str(), uri);

    let supported = mime::extension_of(&full_path).is_some_and(mime::is_supported);
    if !supported {
        return ResolvedPath { full_path, status: Resolution::NotFound };
    }

    let status = match fs::canonicalize(&full_path) {
        Ok(file) if !file.starts_with(web_root.canonical()) => {
            debug!(path = %full_path, "ruta fuera del web root");
            Resolution::NotFound
        }
        Ok(file) if file.is_file() => Resolution::Found { file },
        _ => Resolution::NotFound,
    };

    ResolvedPath { full_path, status }
}
