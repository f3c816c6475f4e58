//! # Cola Acotada de Conexiones
//! src/pool/queue.rs
//!
//! Cola FIFO thread-safe de capacidad fija con push y pop bloqueantes.
//!
//! Todo el estado (items y estado de cierre) vive bajo un único `Mutex`, de
//! modo que cada avance de la cabeza ocurre dentro de la sección crítica y un
//! item nunca se entrega a dos consumidores. Dos `Condvar` separan las esperas:
//! `not_full` para productores y `not_empty` para consumidores.

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Open,
    /// No acepta más pushes; los pops vacían lo que queda
    Closed,
    /// No acepta pushes y los pops retornan `None` de inmediato
    Aborted,
}

struct Inner<T> {
    items: VecDeque<T>,
    status: Status,
}

/// Push rechazado porque la cola está cerrada. Devuelve el item al llamador.
pub struct PushError<T>(pub T);

impl<T> PushError<T> {
    pub fn into_inner(self) -> T {
        self.0
    }
}

impl<T> fmt::Debug for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PushError(..)")
    }
}

impl<T> fmt::Display for PushError<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("queue is closed")
    }
}

impl<T> std::error::Error for PushError<T> {}

/// Cola FIFO bloqueante de capacidad fija
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
}

impl<T> BoundedQueue<T> {
    /// Crea una cola vacía
    ///
    /// # Panics
    ///
    /// Si `capacity` es 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be >= 1");
        Self {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                status: Status::Open,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
        }
    }

    /// Un worker que entró en pánico con el lock tomado no debe bloquear la
    /// cola: el estado sigue siendo consistente porque ninguna operación deja
    /// invariantes a medias.
    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Encola al final, bloqueando mientras la cola esté llena
    ///
    /// Retorna el item dentro de `PushError` si la cola se cerró antes o
    /// durante la espera.
    pub fn push(&self, item: T) -> Result<(), PushError<T>> {
        let mut inner = self.lock();
        loop {
            if inner.status != Status::Open {
                return Err(PushError(item));
            }
            if inner.items.len() < self.capacity {
                break;
            }
            inner = self.not_full.wait(inner).unwrap_or_else(PoisonError::into_inner);
        }

        inner.items.push_back(item);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Desencola la cabeza, bloqueando mientras la cola esté vacía
    ///
    /// `None` es la señal de parada: la cola fue abortada, o fue cerrada y ya
    /// no quedan items.
    pub fn pop(&self) -> Option<T> {
        let mut inner = self.lock();
        loop {
            if inner.status == Status::Aborted {
                return None;
            }
            if let Some(item) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Some(item);
            }
            if inner.status == Status::Closed {
                return None;
            }
            inner = self.not_empty.wait(inner).unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Cierre ordenado: rechaza nuevos pushes y deja vaciar lo pendiente
    pub fn close(&self) {
        let mut inner = self.lock();
        if inner.status == Status::Open {
            inner.status = Status::Closed;
        }
        drop(inner);
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    /// Cierre inmediato: retorna los items no entregados y despierta a todos
    pub fn abort(&self) -> Vec<T> {
        let mut inner = self.lock();
        inner.status = Status::Aborted;
        let abandoned: Vec<T> = inner.items.drain(..).collect();
        drop(inner);
        self.not_empty.notify_all();
        self.not_full.notify_all();
        abandoned
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closed(&self) -> bool {
        self.lock().status != Status::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::mpsc;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_fifo_order() {
        let queue = BoundedQueue::new(4);
        for i in 0..4 {
            queue.push(i).unwrap();
        }
        assert_eq!(queue.len(), 4);
        let out: Vec<i32> = (0..4).map(|_| queue.pop().unwrap()).collect();
        assert_eq!(out, vec![0, 1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_push_blocks_when_full() {
        let queue = Arc::new(BoundedQueue::new(2));
        queue.push(1).unwrap();
        queue.push(2).unwrap();

        let (tx, rx) = mpsc::channel();
        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                queue.push(3).unwrap();
                tx.send(()).unwrap();
            })
        };

        // El tercer push sigue bloqueado
        assert!(rx.recv_timeout(Duration::from_millis(150)).is_err());
        assert_eq!(queue.len(), 2);

        // Liberar un slot lo desbloquea
        assert_eq!(queue.pop(), Some(1));
        rx.recv_timeout(Duration::from_secs(5)).unwrap();
        producer.join().unwrap();
        assert_eq!(queue.pop(), Some(2));
        assert_eq!(queue.pop(), Some(3));
    }

    #[test]
    fn test_pop_blocks_until_push() {
        let queue = Arc::new(BoundedQueue::new(1));
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.pop())
        };
        thread::sleep(Duration::from_millis(50));
        queue.push("task").unwrap();
        assert_eq!(consumer.join().unwrap(), Some("task"));
    }

    #[test]
    fn test_close_drains_then_stops() {
        let queue = BoundedQueue::new(3);
        queue.push('a').unwrap();
        queue.push('b').unwrap();
        queue.close();

        assert!(queue.is_closed());
        assert!(queue.push('c').is_err());
        assert_eq!(queue.pop(), Some('a'));
        assert_eq!(queue.pop(), Some('b'));
        assert_eq!(queue.pop(), None);
    }

    #[test]
    fn test_close_wakes_blocked_consumers() {
        let queue: Arc<BoundedQueue<u8>> = Arc::new(BoundedQueue::new(1));
        let consumers: Vec<_> = (0..3)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || queue.pop())
            })
            .collect();

        thread::sleep(Duration::from_millis(50));
        queue.close();
        for consumer in consumers {
            assert_eq!(consumer.join().unwrap(), None);
        }
    }

    #[test]
    fn test_close_wakes_blocked_producer_with_its_item() {
        let queue = Arc::new(BoundedQueue::new(1));
        queue.push(10).unwrap();

        let producer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.push(11).map_err(PushError::into_inner))
        };
        thread::sleep(Duration::from_millis(50));
        queue.close();

        assert_eq!(producer.join().unwrap(), Err(11));
    }

    #[test]
    fn test_abort_returns_pending_items() {
        let queue = BoundedQueue::new(5);
        for i in 0..3 {
            queue.push(i).unwrap();
        }
        let abandoned = queue.abort();
        assert_eq!(abandoned, vec![0, 1, 2]);
        assert_eq!(queue.pop(), None);
        assert!(queue.push(9).is_err());
    }

    #[test]
    fn test_each_item_delivered_exactly_once() {
        const PRODUCERS: usize = 4;
        const PER_PRODUCER: usize = 500;

        let queue = Arc::new(BoundedQueue::new(8));

        let consumers: Vec<_> = (0..4)
            .map(|_| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    let mut seen = Vec::new();
                    while let Some(item) = queue.pop() {
                        seen.push(item);
                    }
                    seen
                })
            })
            .collect();

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|p| {
                let queue = Arc::clone(&queue);
                thread::spawn(move || {
                    for i in 0..PER_PRODUCER {
                        queue.push(p * PER_PRODUCER + i).unwrap();
                    }
                })
            })
            .collect();

        for producer in producers {
            producer.join().unwrap();
        }
        queue.close();

        let mut all = Vec::new();
        for consumer in consumers {
            all.extend(consumer.join().unwrap());
        }

        assert_eq!(all.len(), PRODUCERS * PER_PRODUCER);
        let unique: HashSet<_> = all.iter().copied().collect();
        assert_eq!(unique.len(), PRODUCERS * PER_PRODUCER);
    }

    #[test]
    #[should_panic(expected = "queue capacity must be >= 1")]
    fn test_zero_capacity_panics() {
        let _ = BoundedQueue::<u8>::new(0);
    }
}
