//! # Static HTTP Server
//! src/lib.rs
//!
//! Servidor HTTP concurrente de archivos estáticos. Acepta conexiones TCP,
//! parsea la request line, mapea la URI a un archivo bajo el web root y
//! responde con el archivo completo o con un 404 sin body.
//!
//! ## Arquitectura
//!
//! - `http`: request line, escritura de la respuesta, tabla MIME
//! - `resolver`: URI → ruta del filesystem + veredicto
//! - `server`: acceptor, cola acotada, pool de workers y motor de respuestas
//! - `config`: línea de comandos y configuración inmutable
//! - `metrics`: contadores y latencias
//! - `error`: errores tipados por nivel (arranque, pool, conexión)
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use static_http_server::config::ServerConfig;
//! use static_http_server::server::Server;
//!
//! let config = ServerConfig::new(8080, "/srv/www");
//! let server = Server::bind(&config).expect("Error al iniciar servidor");
//! server.run();
//! ```

pub mod config;
pub mod error;
pub mod http;
pub mod metrics;
pub mod resolver;
pub mod server;
