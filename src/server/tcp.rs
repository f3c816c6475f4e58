//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! Accept loop del servidor. El thread principal solo acepta conexiones y las
//! entrega al `WorkerPool`; toda la E/S de cada conexión ocurre en un worker.
//! Cuando la cola está llena, `submit` bloquea y el accept loop deja de
//! aceptar hasta que se libere un lugar.
//!
//! ## Detención
//!
//! `ShutdownHandle::trigger` marca la bandera de stop, cierra la entrada del
//! pool (lo que desbloquea un `submit` esperando lugar) y despierta al
//! `accept` con una conexión propia. En modo abrupto además descarta lo
//! encolado y corta la lectura de las conexiones en curso, así un cliente
//! silencioso no retiene a un worker.

use crate::config::Config;
use crate::content::ContentRoot;
use crate::error::{PoolError, ServerError};
use crate::metrics::MetricsCollector;
use crate::pool::{PoolStats, ShutdownMode, WorkerPool};
use crate::server::engine::ProtocolEngine;
use crate::server::Connection;
use std::collections::HashMap;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, info_span, warn};

/// Espera mínima tras un `accept` fallido
const ACCEPT_BACKOFF_MIN: Duration = Duration::from_millis(10);

/// Espera máxima tras `accept` fallidos consecutivos
const ACCEPT_BACKOFF_MAX: Duration = Duration::from_secs(1);

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Estado compartido entre el accept loop, los workers y los `ShutdownHandle`
#[derive(Default)]
struct Control {
    stop: AtomicBool,
    local_addr: Mutex<Option<SocketAddr>>,
    pool: Mutex<Option<Arc<WorkerPool<TcpStream>>>>,
    /// Clones de las conexiones que un worker está atendiendo
    in_flight: Mutex<HashMap<u64, TcpStream>>,
    next_id: AtomicU64,
}

impl Control {
    fn stopping(&self) -> bool {
        self.stop.load(Ordering::SeqCst)
    }

    fn register(&self, conn: &TcpStream) -> Option<u64> {
        match conn.try_clone() {
            Ok(clone) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                lock(&self.in_flight).insert(id, clone);
                Some(id)
            }
            Err(e) => {
                warn!(error = %e, "could not track connection; abrupt stop will not interrupt it");
                None
            }
        }
    }

    fn release(&self, id: Option<u64>) {
        if let Some(id) = id {
            lock(&self.in_flight).remove(&id);
        }
    }

    /// Una lectura bloqueada en estas conexiones retorna 0 bytes
    fn interrupt_reads(&self) -> usize {
        let in_flight = lock(&self.in_flight);
        for stream in in_flight.values() {
            let _ = stream.shutdown(Shutdown::Read);
        }
        in_flight.len()
    }
}

/// Servidor HTTP/1.0 de archivos estáticos
pub struct Server {
    config: Config,
    metrics: MetricsCollector,
    control: Arc<Control>,
}

/// Permite detener el servidor desde otro thread (o desde un handler de señal)
#[derive(Clone)]
pub struct ShutdownHandle {
    control: Arc<Control>,
    mode: ShutdownMode,
}

impl ShutdownHandle {
    /// Detiene el accept loop y corta la entrada del pool según el modo de
    /// shutdown configurado. Las llamadas repetidas no tienen efecto.
    pub fn trigger(&self) {
        if self.control.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        info!(mode = ?self.mode, "stop requested");

        let pool = lock(&self.control.pool).clone();
        if let Some(pool) = pool {
            match self.mode {
                ShutdownMode::Graceful => pool.close_intake(),
                ShutdownMode::Abrupt => {
                    pool.abandon_queued();
                    let interrupted = self.control.interrupt_reads();
                    debug!(interrupted, "in-flight reads interrupted");
                }
            }
        }

        // Si todavía no hay listener, `serve` verá la bandera antes de aceptar
        let addr = *lock(&self.control.local_addr);
        if let Some(addr) = addr {
            let wake = wake_address(addr);
            if let Err(e) = TcpStream::connect_timeout(&wake, Duration::from_secs(1)) {
                warn!(address = %wake, error = %e, "could not wake accept loop");
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.control.stopping()
    }
}

/// Un listener en 0.0.0.0 o :: se despierta conectando a loopback
fn wake_address(mut addr: SocketAddr) -> SocketAddr {
    if addr.ip().is_unspecified() {
        let loopback = match addr.ip() {
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
        };
        addr.set_ip(loopback);
    }
    addr
}

/// Espera exponencial según la cantidad de `accept` fallidos seguidos
fn accept_backoff(consecutive_errors: u32) -> Duration {
    let factor = 1u32 << consecutive_errors.saturating_sub(1).min(10);
    (ACCEPT_BACKOFF_MIN * factor).min(ACCEPT_BACKOFF_MAX)
}

impl Server {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            metrics: MetricsCollector::new(),
            control: Arc::new(Control::default()),
        }
    }

    pub fn metrics(&self) -> &MetricsCollector {
        &self.metrics
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle {
            control: Arc::clone(&self.control),
            mode: self.config.shutdown,
        }
    }

    /// Valida la configuración, hace bind y atiende conexiones hasta que se
    /// dispare el `ShutdownHandle`
    pub fn run(&self) -> Result<PoolStats, ServerError> {
        self.config.validate()?;

        let address = self.config.address();
        let listener = TcpListener::bind(&address)?;
        self.serve(listener)
    }

    /// Atiende conexiones sobre un listener ya creado
    pub fn serve(&self, listener: TcpListener) -> Result<PoolStats, ServerError> {
        self.config.validate()?;

        let local = listener.local_addr()?;
        *lock(&self.control.local_addr) = Some(local);

        if !Path::new(&self.config.root).is_dir() {
            warn!(root = %self.config.root, "content root is not a directory; every lookup will be 404");
        }

        let engine = ProtocolEngine::new(
            ContentRoot::new(&self.config.root, &self.config.index),
            self.config.engine_settings(),
            self.metrics.clone(),
        );

        let control = Arc::clone(&self.control);
        let mode = self.config.shutdown;
        let pool = Arc::new(WorkerPool::new(
            self.config.pool_settings(),
            move |conn: &mut TcpStream| {
                let worker = thread::current().name().unwrap_or("worker").to_string();
                let span = info_span!("connection", peer = %conn.peer(), worker = %worker);
                let _guard = span.enter();

                let id = control.register(conn);
                // Un stop abrupto pudo barrer `in_flight` antes del registro
                if mode == ShutdownMode::Abrupt && control.stopping() {
                    let _ = conn.shutdown(Shutdown::Read);
                }
                engine.serve(conn);
                control.release(id);
            },
        ));
        pool.start()?;
        *lock(&self.control.pool) = Some(Arc::clone(&pool));

        info!(address = %local, mode = ?self.config.mode, "server listening");

        let mut accept_errors = 0u32;
        // `trigger` pudo llegar antes de publicar el listener y no despertar a nadie
        while !self.control.stopping() {
            let accepted = listener.accept();
            if self.control.stopping() {
                // La conexión que despertó al loop no se atiende
                debug!("stop requested; leaving accept loop");
                break;
            }

            match accepted {
                Ok((stream, _)) => {
                    accept_errors = 0;
                    debug!(peer = %stream.peer(), queued = pool.queued(), "connection accepted");
                    match pool.submit(stream) {
                        Ok(()) => {}
                        Err(PoolError::Closed) => break,
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => {
                    accept_errors = accept_errors.saturating_add(1);
                    let backoff = accept_backoff(accept_errors);
                    warn!(error = %e, backoff_ms = backoff.as_millis() as u64, "accept failed");
                    thread::sleep(backoff);
                }
            }
        }

        let stats = pool.shutdown(self.config.shutdown);
        *lock(&self.control.pool) = None;
        let stats = stats?;

        info!(
            submitted = stats.submitted,
            processed = stats.processed,
            panicked = stats.panicked,
            abandoned = stats.abandoned,
            rejected = stats.rejected,
            "server stopped"
        );
        info!(metrics = %self.metrics.to_json(), "final metrics");

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Read, Write};
    use std::net::SocketAddrV4;

    #[test]
    fn test_wake_address_maps_unspecified_to_loopback() {
        let any = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, 8080));
        assert_eq!(wake_address(any), "127.0.0.1:8080".parse().unwrap());

        let any6: SocketAddr = "[::]:9000".parse().unwrap();
        assert_eq!(wake_address(any6), "[::1]:9000".parse().unwrap());

        let fixed: SocketAddr = "10.0.0.2:80".parse().unwrap();
        assert_eq!(wake_address(fixed), fixed);
    }

    #[test]
    fn test_accept_backoff_grows_and_caps() {
        assert_eq!(accept_backoff(1), Duration::from_millis(10));
        assert_eq!(accept_backoff(2), Duration::from_millis(20));
        assert_eq!(accept_backoff(4), Duration::from_millis(80));
        assert_eq!(accept_backoff(8), ACCEPT_BACKOFF_MAX);
        assert_eq!(accept_backoff(u32::MAX), ACCEPT_BACKOFF_MAX);
    }

    #[test]
    fn test_invalid_config_is_rejected_before_bind() {
        let mut config = Config::default();
        config.workers = 0;
        let server = Server::new(config);
        assert!(matches!(server.run(), Err(ServerError::Config(_))));
    }

    #[test]
    fn test_trigger_before_serve_stops_immediately() {
        let server = Server::new(Config::default());
        let handle = server.shutdown_handle();
        handle.trigger();
        assert!(handle.is_triggered());

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();

        // Sin el chequeo previo este serve quedaría bloqueado en accept
        let stats = server.serve(listener).unwrap();
        assert_eq!(stats.submitted, 0);
    }

    #[test]
    fn test_interrupt_reads_wakes_blocked_reader() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let _client = TcpStream::connect(listener.local_addr().unwrap()).unwrap();
        let (mut server_side, _) = listener.accept().unwrap();

        let control = Control::default();
        let id = control.register(&server_side);
        assert!(id.is_some());

        let reader = thread::spawn(move || {
            let mut buf = [0u8; 16];
            server_side.read(&mut buf)
        });
        thread::sleep(Duration::from_millis(100));

        assert_eq!(control.interrupt_reads(), 1);
        assert_eq!(reader.join().unwrap().unwrap(), 0);

        control.release(id);
        assert_eq!(control.interrupt_reads(), 0);
    }

    #[test]
    fn test_serves_and_stops() {
        let mut config = Config::default();
        config.root = std::env::temp_dir()
            .join(format!("static_server_tcp_{}", std::process::id()))
            .to_string_lossy()
            .to_string();
        let server = Arc::new(Server::new(config));
        let handle = server.shutdown_handle();

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let runner = {
            let server = Arc::clone(&server);
            thread::spawn(move || server.serve(listener))
        };

        let mut client = TcpStream::connect(addr).unwrap();
        client.write_all(b"DELETE / HTTP/1.0\r\n\r\n").unwrap();
        let mut reply = String::new();
        client.read_to_string(&mut reply).unwrap();
        assert!(reply.starts_with("HTTP/1.0 405 Method Not Allowed\r\n"));

        handle.trigger();
        let stats = runner.join().unwrap().unwrap();
        assert_eq!(stats.submitted, 1);
        assert_eq!(stats.processed, 1);
        assert_eq!(server.metrics().snapshot().responses.get(&405), Some(&1));
    }
}
