//! # Motor de Protocolo
//! src/server/engine.rs
//!
//! Máquina de estados de una conexión. Cada conexión recibe como mucho una
//! respuesta:
//!
//! ```text
//! AwaitInput ──(0 bytes / timeout / error)──────────────────────> Closed
//!     │
//!     ├──> Malformed ──────────────────────────> 400 ─┐
//!     └──> Parsed ──> MethodCheck ──(≠ GET)────> 405 ─┤
//!                        │                            ├──> RespondSent ──> Closed
//!                        └──> ResourceLookup ─> 200 ──┤
//!                                          └──> 404 ──┘
//! ```
//!
//! El motor no cierra la conexión: de eso se encarga el worker que la posee.

use crate::content::{ContentRoot, ResolveError, Resource};
use crate::http::reader::{read_request_head, ReadError};
use crate::http::request::ParseError;
use crate::http::{Method, RequestLine, Response, StatusCode};
use crate::metrics::MetricsCollector;
use crate::server::Connection;
use std::io::Write;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Límites por conexión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub max_request_bytes: usize,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    /// Demora artificial antes de leer (para pruebas de carga)
    pub simulated_latency: Option<Duration>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_request_bytes: 8192,
            read_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
            simulated_latency: None,
        }
    }
}

/// Por qué se cerró una conexión sin enviar nada
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    PeerClosed,
    TimedOut,
    Transport,
}

/// Resultado de una conexión
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Respuesta escrita completa
    Responded(StatusCode),
    /// La escritura falló a mitad de camino
    WriteFailed(StatusCode),
    /// Se cerró sin enviar bytes
    NoResponse(CloseReason),
}

/// Clasificación de un request ya leído
#[derive(Debug)]
pub enum Classified {
    Malformed(ParseError),
    MethodRejected(RequestLine),
    Found(RequestLine, Resource),
    NotFound(RequestLine, ResolveError),
}

impl Classified {
    pub fn status(&self) -> StatusCode {
        match self {
            Classified::Malformed(_) => StatusCode::BadRequest,
            Classified::MethodRejected(_) => StatusCode::MethodNotAllowed,
            Classified::Found(..) => StatusCode::Ok,
            Classified::NotFound(..) => StatusCode::NotFound,
        }
    }

    pub fn into_response(self) -> Response {
        match self {
            Classified::Found(_, resource) => Response::new(StatusCode::Ok)
                .with_content_type(resource.content_type)
                .with_body(resource.body),
            other => Response::error(other.status()),
        }
    }
}

/// Motor de protocolo sin estado entre conexiones
#[derive(Clone)]
pub struct ProtocolEngine {
    content: ContentRoot,
    settings: EngineSettings,
    metrics: MetricsCollector,
}

impl ProtocolEngine {
    pub fn new(content: ContentRoot, settings: EngineSettings, metrics: MetricsCollector) -> Self {
        Self {
            content,
            settings,
            metrics,
        }
    }

    /// Ejecuta el intercambio completo sobre una conexión y registra métricas
    pub fn serve<C: Connection>(&self, conn: &mut C) -> Outcome {
        let start = Instant::now();
        let outcome = self.exchange(conn);
        let latency = start.elapsed();
        self.metrics.record(outcome, latency);

        info!(?outcome, latency_ms = latency.as_secs_f64() * 1000.0, "client disconnected");
        outcome
    }

    fn exchange<C: Connection>(&self, conn: &mut C) -> Outcome {
        if let Err(e) = conn.set_timeouts(self.settings.read_timeout, self.settings.write_timeout) {
            warn!(error = %e, "could not set connection deadlines");
            return Outcome::NoResponse(CloseReason::Transport);
        }

        if let Some(delay) = self.settings.simulated_latency {
            thread::sleep(delay);
        }

        let raw = match read_request_head(conn, self.settings.max_request_bytes) {
            Ok(raw) => raw,
            Err(ReadError::TooLarge { limit }) => {
                warn!(limit, "request head too large");
                return self.respond(conn, Response::error(StatusCode::BadRequest));
            }
            Err(ReadError::PeerClosed) => {
                debug!("peer closed before sending a request");
                return Outcome::NoResponse(CloseReason::PeerClosed);
            }
            Err(e @ ReadError::TimedOut { .. }) => {
                debug!(error = %e, "closing idle connection");
                return Outcome::NoResponse(CloseReason::TimedOut);
            }
            Err(e @ ReadError::Io(_)) => {
                warn!(error = %e, "read failed");
                return Outcome::NoResponse(CloseReason::Transport);
            }
        };

        let classified = self.classify(&raw);
        match &classified {
            Classified::Malformed(e) => info!(error = %e, "malformed request -> 400"),
            Classified::MethodRejected(line) => {
                info!(method = line.method().as_str(), target = line.target(), "-> 405")
            }
            Classified::Found(line, resource) => info!(
                method = "GET",
                target = line.target(),
                bytes = resource.body.len(),
                "-> 200"
            ),
            Classified::NotFound(line, e) => {
                info!(method = "GET", target = line.target(), reason = %e, "-> 404")
            }
        }

        self.respond(conn, classified.into_response())
    }

    /// Clasifica el head leído sin tocar la conexión
    pub fn classify(&self, raw: &[u8]) -> Classified {
        let line = match RequestLine::parse(raw) {
            Ok(line) => line,
            Err(e) => return Classified::Malformed(e),
        };

        if line.method() != &Method::Get {
            return Classified::MethodRejected(line);
        }

        match self.content.load(line.target()) {
            Ok(resource) => Classified::Found(line, resource),
            Err(e) => Classified::NotFound(line, e),
        }
    }

    fn respond<W: Write>(&self, conn: &mut W, response: Response) -> Outcome {
        let status = response.status();
        match response.write_to(conn) {
            Ok(()) => Outcome::Responded(status),
            Err(e) => {
                warn!(error = %e, status = status.as_u16(), "write failed; abandoning connection");
                Outcome::WriteFailed(status)
            }
        }
    }
}
