//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Contadores del servidor: respuestas por status, errores, bytes enviados,
//! conexiones encoladas y latencias (p50, p95, p99). Se loguean en JSON al
//! apagar el servidor.

pub mod collector;

pub use collector::{MetricsCollector, StatsSnapshot};
