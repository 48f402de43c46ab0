//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Contadores compartidos por todos los workers. El lock se toma solo para
//! actualizar números, nunca durante I/O.

use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Máximo de latencias a guardar (para calcular percentiles)
const MAX_LATENCIES: usize = 10_000;

/// Collector de métricas thread-safe
#[derive(Debug, Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

#[derive(Debug, Default)]
struct MetricsData {
    /// Respuestas enviadas (cualquier status)
    total_requests: u64,

    /// Respuestas por código de estado
    status_codes: BTreeMap<u16, u64>,

    /// Request lines que no se pudieron parsear
    parse_errors: u64,

    /// Conexiones que terminaron con error de I/O
    connection_errors: u64,

    /// Bytes de body enviados
    body_bytes_sent: u64,

    /// Conexiones encoladas en el pool
    jobs_submitted: u64,

    /// Conexiones rechazadas por pool cerrado
    jobs_rejected: u64,

    /// Workers procesando un job ahora mismo
    busy_workers: u64,

    /// Latencias registradas (en microsegundos)
    latencies: VecDeque<u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData::default())),
            start_time: Instant::now(),
        }
    }

    fn data(&self) -> MutexGuard<'_, MetricsData> {
        // Un panic en un job no debe dejar las métricas inutilizables
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra una respuesta enviada
    pub fn record_response(&self, status_code: u16, body_bytes: u64, latency: Duration) {
        let mut data = self.data();

        data.total_requests += 1;
        *data.status_codes.entry(status_code).or_insert(0) += 1;
        data.body_bytes_sent += body_bytes;

        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.pop_front();
        }
        data.latencies.push_back(latency.as_micros() as u64);
    }

    pub fn record_parse_error(&self) {
        self.data().parse_errors += 1;
    }

    pub fn record_connection_error(&self) {
        self.data().connection_errors += 1;
    }

    pub fn record_submitted(&self) {
        self.data().jobs_submitted += 1;
    }

    pub fn record_rejected(&self) {
        self.data().jobs_rejected += 1;
    }

    pub fn worker_busy(&self) {
        self.data().busy_workers += 1;
    }

    pub fn worker_idle(&self) {
        let mut data = self.data();
        data.busy_workers = data.busy_workers.saturating_sub(1);
    }

    /// Obtiene un snapshot de las métricas
    pub fn snapshot(&self) -> StatsSnapshot {
        let data = self.data();
        let (p50, p95, p99) = percentiles(&data.latencies);

        StatsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            total_requests: data.total_requests,
            status_codes: data.status_codes.clone(),
            parse_errors: data.parse_errors,
            connection_errors: data.connection_errors,
            body_bytes_sent: data.body_bytes_sent,
            jobs_submitted: data.jobs_submitted,
            jobs_rejected: data.jobs_rejected,
            busy_workers: data.busy_workers,
            latency_p50_us: p50,
            latency_p95_us: p95,
            latency_p99_us: p99,
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

/// Calcula percentiles de latencia
fn percentiles(latencies: &VecDeque<u64>) -> (u64, u64, u64) {
    if latencies.is_empty() {
        return (0, 0, 0);
    }

    let mut sorted: Vec<u64> = latencies.iter().copied().collect();
    sorted.sort_unstable();

    let len = sorted.len();
    (
        sorted[len * 50 / 100],
        sorted[len * 95 / 100],
        sorted[len * 99 / 100],
    )
}

/// Snapshot de métricas (para uso externo)
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub uptime_secs: u64,
    pub total_requests: u64,
    pub status_codes: BTreeMap<u16, u64>,
    pub parse_errors: u64,
    pub connection_errors: u64,
    pub body_bytes_sent: u64,
    pub jobs_submitted: u64,
    pub jobs_rejected: u64,
    pub busy_workers: u64,
    pub latency_p50_us: u64,
    pub latency_p95_us: u64,
    pub latency_p99_us: u64,
}

impl StatsSnapshot {
    /// Serializa el snapshot como JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|e| format!(r#"{{"error": "{}"}}"#, e))
    }
}
