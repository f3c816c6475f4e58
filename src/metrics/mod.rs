//! # Sistema de Métricas
//! src/metrics/mod.rs
//!
//! Recolección y agregación de métricas del servidor:
//! - Conexiones por resultado
//! - Respuestas por código de estado
//! - Latencias (p50, p95, p99)

pub mod collector;

pub use collector::{MetricsCollector, MetricsSnapshot};
