//! # Pool de Workers
//! src/pool/mod.rs
//!
//! Un número fijo de threads que consumen conexiones de una `BoundedQueue` y
//! ejecutan el handler sobre cada una.
//!
//! ## Ciclo de vida
//!
//! ```text
//! Created --start()--> Running --shutdown()--> ShuttingDown --join--> Stopped
//! ```
//!
//! - `submit` bloquea mientras la cola está llena (backpressure hacia el
//!   accept loop) y falla con `PoolError::Closed` una vez iniciado el shutdown.
//! - `shutdown(Graceful)` deja vaciar la cola; `shutdown(Abrupt)` cierra sin
//!   respuesta las conexiones que no llegaron a un worker. En ambos casos las
//!   conexiones en curso terminan y se hace `join` de todos los threads.
//! - Un pánico dentro del handler se captura: la conexión se cierra y el
//!   worker sigue con la siguiente.
//!
//! La conexión pasa a ser propiedad del pool en `submit`, y el pool la cierra
//! exactamente una vez, ya sea tras procesarla, al rechazarla o al abandonarla.

pub mod queue;

use crate::error::PoolError;
use crate::server::Connection;
use queue::BoundedQueue;
use serde::Serialize;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, error, info, warn};

/// Capacidad por defecto de la cola
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Workers por defecto
pub const DEFAULT_WORKERS: usize = 5;

/// Tamaño del pool y de su cola
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub workers: usize,
    pub capacity: usize,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            workers: DEFAULT_WORKERS,
            capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Cómo tratar el trabajo pendiente al apagar el pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum ShutdownMode {
    /// Procesar todo lo encolado antes de terminar
    Graceful,
    /// Abandonar (cerrar sin respuesta) lo que sigue en la cola
    Abrupt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolState {
    Created,
    Running,
    ShuttingDown,
    Stopped,
}

/// Contadores acumulados del pool
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Conexiones aceptadas por `submit`
    pub submitted: u64,
    /// Conexiones entregadas a un worker (incluye las que entraron en pánico)
    pub processed: u64,
    /// Handlers que entraron en pánico
    pub panicked: u64,
    /// Conexiones cerradas sin procesar por un shutdown abrupto
    pub abandoned: u64,
    /// `submit` rechazados por pool cerrado
    pub rejected: u64,
}

#[derive(Default)]
struct Counters {
    submitted: AtomicU64,
    processed: AtomicU64,
    panicked: AtomicU64,
    abandoned: AtomicU64,
    rejected: AtomicU64,
}

impl Counters {
    fn bump(counter: &AtomicU64, by: u64) {
        counter.fetch_add(by, Ordering::Relaxed);
    }

    fn snapshot(&self) -> PoolStats {
        PoolStats {
            submitted: self.submitted.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            panicked: self.panicked.load(Ordering::Relaxed),
            abandoned: self.abandoned.load(Ordering::Relaxed),
            rejected: self.rejected.load(Ordering::Relaxed),
        }
    }
}

type Handler<C> = Arc<dyn Fn(&mut C) + Send + Sync>;

/// Pool fijo de workers sobre una cola acotada
pub struct WorkerPool<C: Connection> {
    settings: PoolSettings,
    queue: Arc<BoundedQueue<C>>,
    handler: Handler<C>,
    state: Mutex<PoolState>,
    workers: Mutex<Vec<JoinHandle<()>>>,
    counters: Arc<Counters>,
}

impl<C: Connection> WorkerPool<C> {
    /// Crea el pool en estado `Created`, sin threads todavía
    ///
    /// # Panics
    ///
    /// Si `settings.capacity` es 0.
    pub fn new<F>(settings: PoolSettings, handler: F) -> Self
    where
        F: Fn(&mut C) + Send + Sync + 'static,
    {
        Self {
            settings,
            queue: Arc::new(BoundedQueue::new(settings.capacity)),
            handler: Arc::new(handler),
            state: Mutex::new(PoolState::Created),
            workers: Mutex::new(Vec::with_capacity(settings.workers)),
            counters: Arc::new(Counters::default()),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_workers(&self) -> MutexGuard<'_, Vec<JoinHandle<()>>> {
        self.workers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Lanza los workers y retorna sin esperar a que procesen nada
    pub fn start(&self) -> Result<(), PoolError> {
        let mut state = self.lock_state();
        match *state {
            PoolState::Created => {}
            PoolState::Running => return Err(PoolError::AlreadyStarted),
            PoolState::ShuttingDown | PoolState::Stopped => return Err(PoolError::Closed),
        }

        let mut workers = self.lock_workers();
        for index in 0..self.settings.workers {
            let name = format!("worker-{}", index);
            let queue = Arc::clone(&self.queue);
            let handler = Arc::clone(&self.handler);
            let counters = Arc::clone(&self.counters);

            let spawned = thread::Builder::new()
                .name(name.clone())
                .spawn(move || worker_loop(name, queue, handler, counters));

            match spawned {
                Ok(handle) => workers.push(handle),
                Err(source) => {
                    error!(index, error = %source, "failed to spawn worker; stopping pool");
                    let abandoned = self.queue.abort();
                    self.close_abandoned(abandoned);
                    for handle in workers.drain(..) {
                        let _ = handle.join();
                    }
                    *state = PoolState::Stopped;
                    return Err(PoolError::Spawn { index, source });
                }
            }
        }

        *state = PoolState::Running;
        info!(
            workers = self.settings.workers,
            queue_capacity = self.settings.capacity,
            "worker pool started"
        );
        Ok(())
    }

    /// Entrega una conexión al pool
    ///
    /// Bloquea mientras la cola está llena. Si el pool ya está apagándose, la
    /// conexión se cierra aquí mismo y se retorna `PoolError::Closed`.
    pub fn submit(&self, conn: C) -> Result<(), PoolError> {
        let closing = matches!(
            *self.lock_state(),
            PoolState::ShuttingDown | PoolState::Stopped
        );
        let pushed = if closing {
            Err(queue::PushError(conn))
        } else {
            self.queue.push(conn)
        };

        match pushed {
            Ok(()) => {
                Counters::bump(&self.counters.submitted, 1);
                Ok(())
            }
            Err(rejected) => {
                rejected.into_inner().close();
                Counters::bump(&self.counters.rejected, 1);
                warn!("connection rejected: worker pool is closed");
                Err(PoolError::Closed)
            }
        }
    }

    /// Deja de aceptar conexiones sin esperar a los workers
    ///
    /// Un `submit` bloqueado por cola llena retorna `PoolError::Closed`. Lo ya
    /// encolado se sigue procesando hasta que llegue `shutdown`.
    pub fn close_intake(&self) {
        self.queue.close();
    }

    /// Deja de aceptar conexiones y cierra sin respuesta las encoladas
    ///
    /// Los workers terminan su conexión actual y salen del loop.
    pub fn abandon_queued(&self) {
        let abandoned = self.queue.abort();
        self.close_abandoned(abandoned);
    }

    /// Apaga el pool y espera a que terminen todos los workers
    ///
    /// Solo la primera llamada tiene efecto; las siguientes retornan
    /// `PoolError::AlreadyShutdown`.
    pub fn shutdown(&self, mode: ShutdownMode) -> Result<PoolStats, PoolError> {
        {
            let mut state = self.lock_state();
            match *state {
                PoolState::ShuttingDown | PoolState::Stopped => {
                    return Err(PoolError::AlreadyShutdown)
                }
                PoolState::Created | PoolState::Running => *state = PoolState::ShuttingDown,
            }
        }

        info!(?mode, queued = self.queue.len(), "shutting down worker pool");
        match mode {
            ShutdownMode::Graceful => self.queue.close(),
            ShutdownMode::Abrupt => {
                let abandoned = self.queue.abort();
                self.close_abandoned(abandoned);
            }
        }

        let handles: Vec<JoinHandle<()>> = self.lock_workers().drain(..).collect();
        if handles.is_empty() {
            // Nunca arrancó: no hay quien vacíe la cola
            let abandoned = self.queue.abort();
            self.close_abandoned(abandoned);
        }
        for handle in handles {
            let name = handle.thread().name().unwrap_or("worker").to_string();
            if handle.join().is_err() {
                error!(worker = %name, "worker thread terminated abnormally");
            }
        }

        *self.lock_state() = PoolState::Stopped;
        let stats = self.stats();
        info!(
            processed = stats.processed,
            abandoned = stats.abandoned,
            panicked = stats.panicked,
            "worker pool stopped"
        );
        Ok(stats)
    }

    fn close_abandoned(&self, abandoned: Vec<C>) {
        if abandoned.is_empty() {
            return;
        }
        let count = abandoned.len() as u64;
        for conn in abandoned {
            conn.close();
        }
        Counters::bump(&self.counters.abandoned, count);
        warn!(count, "closed queued connections without a response");
    }

    pub fn state(&self) -> PoolState {
        *self.lock_state()
    }

    pub fn stats(&self) -> PoolStats {
        self.counters.snapshot()
    }

    /// Conexiones esperando en la cola
    pub fn queued(&self) -> usize {
        self.queue.len()
    }
}

impl<C: Connection> Drop for WorkerPool<C> {
    fn drop(&mut self) {
        if matches!(self.state(), PoolState::Created | PoolState::Running) {
            let _ = self.shutdown(ShutdownMode::Graceful);
        }
    }
}

fn worker_loop<C: Connection>(
    name: String,
    queue: Arc<BoundedQueue<C>>,
    handler: Handler<C>,
    counters: Arc<Counters>,
) {
    debug!(worker = %name, "worker started");

    while let Some(mut conn) = queue.pop() {
        let result = panic::catch_unwind(AssertUnwindSafe(|| handler(&mut conn)));
        if let Err(payload) = result {
            Counters::bump(&counters.panicked, 1);
            error!(
                worker = %name,
                panic = %panic_message(payload.as_ref()),
                "handler panicked; closing connection"
            );
        }
        conn.close();
        Counters::bump(&counters.processed, 1);
    }

    debug!(worker = %name, "worker stopped");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.as_str()
    } else {
        "unknown panic"
    }
}
