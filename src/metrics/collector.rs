//! # Collector de Métricas
//! src/metrics/collector.rs
//!
//! Recolecta y agrega el resultado de cada conexión en tiempo real.

use crate::server::engine::{CloseReason, Outcome};
use serde::Serialize;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// Latencias guardadas para calcular percentiles
const MAX_LATENCIES: usize = 10_000;

/// Collector de métricas thread-safe
#[derive(Clone)]
pub struct MetricsCollector {
    inner: Arc<Mutex<MetricsData>>,
    start_time: Instant,
}

#[derive(Default)]
struct MetricsData {
    connections: u64,

    /// Respuestas completas por código de estado
    responses: BTreeMap<u16, u64>,

    write_failures: u64,
    peer_closed: u64,
    timed_out: u64,
    transport_errors: u64,

    /// Ventana de latencias (microsegundos)
    latencies: VecDeque<u64>,
}

/// Percentiles de latencia en microsegundos
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LatencySummary {
    pub p50: u64,
    pub p95: u64,
    pub p99: u64,
    pub max: u64,
    pub avg: u64,
    pub samples: usize,
}

/// Snapshot de métricas (para uso externo)
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub uptime_secs: u64,
    pub connections: u64,
    pub responses: BTreeMap<u16, u64>,
    pub write_failures: u64,
    pub closed_without_response: u64,
    pub timed_out: u64,
    pub latency_us: LatencySummary,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MetricsData {
                latencies: VecDeque::with_capacity(MAX_LATENCIES),
                ..MetricsData::default()
            })),
            start_time: Instant::now(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MetricsData> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Registra el resultado de una conexión
    pub fn record(&self, outcome: Outcome, latency: Duration) {
        let mut data = self.lock();
        data.connections += 1;

        match outcome {
            Outcome::Responded(status) => {
                *data.responses.entry(status.as_u16()).or_insert(0) += 1;
            }
            Outcome::WriteFailed(_) => data.write_failures += 1,
            Outcome::NoResponse(CloseReason::PeerClosed) => data.peer_closed += 1,
            Outcome::NoResponse(CloseReason::TimedOut) => data.timed_out += 1,
            Outcome::NoResponse(CloseReason::Transport) => data.transport_errors += 1,
        }

        if data.latencies.len() >= MAX_LATENCIES {
            data.latencies.pop_front();
        }
        data.latencies.push_back(latency.as_micros() as u64);
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        let data = self.lock();
        MetricsSnapshot {
            uptime_secs: self.start_time.elapsed().as_secs(),
            connections: data.connections,
            responses: data.responses.clone(),
            write_failures: data.write_failures,
            closed_without_response: data.peer_closed + data.timed_out + data.transport_errors,
            timed_out: data.timed_out,
            latency_us: summarize(&data.latencies),
        }
    }

    /// Métricas actuales en formato JSON
    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(&self.snapshot()).unwrap_or_else(|e| {
            format!(r#"{{"error": "could not serialize metrics: {}"}}"#, e)
        })
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

fn summarize(latencies: &VecDeque<u64>) -> LatencySummary {
    if latencies.is_empty() {
        return LatencySummary::default();
    }

    let mut sorted: Vec<u64> = latencies.iter().copied().collect();
    sorted.sort_unstable();

    let len = sorted.len();
    let sum: u64 = sorted.iter().sum();
    LatencySummary {
        p50: sorted[len * 50 / 100],
        p95: sorted[len * 95 / 100],
        p99: sorted[len * 99 / 100],
        max: sorted[len - 1],
        avg: sum / len as u64,
        samples: len,
    }
}
