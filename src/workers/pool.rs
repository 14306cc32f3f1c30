//! # Pool de Workers Priorizado
//! src/workers/pool.rs
//!
//! Pool de hilos de tamaño dinámico que sirve una única cola de prioridad.
//!
//! ## Política
//!
//! - Arranca con `min_workers` hilos.
//! - Crece al encolar si todos los workers están ocupados y la cola tiene
//!   más tareas que workers, hasta `max_workers`.
//! - Un worker ocioso por encima del mínimo termina tras `idle_timeout`.
//! - `shutdown` deja de aceptar tareas, drena la cola en orden de prioridad
//!   y hace `join` de todos los hilos.

use super::queue::{Task, TaskQueue};
use crate::error::PoolError;
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, error, warn};

/// Tiempo por defecto antes de retirar un worker ocioso sobrante
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(30);

/// Estado protegido por el mutex del pool
struct PoolState {
    queue: TaskQueue,

    /// Workers vivos (ocupados + ociosos)
    workers: usize,

    /// Workers esperando en la condvar
    idle: usize,

    shutting_down: bool,

    next_worker_id: usize,
}

struct Shared {
    state: Mutex<PoolState>,
    available: Condvar,
    handles: Mutex<Vec<JoinHandle<()>>>,
    min_workers: usize,
    max_workers: usize,
    idle_timeout: Duration,
}

impl Shared {
    fn lock_state(&self) -> MutexGuard<'_, PoolState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Estadísticas instantáneas del pool
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    pub workers: usize,
    pub idle: usize,
    pub queued: usize,
}

/// Pool de workers con cola de prioridad
///
/// Clonar el pool es barato: todos los clones comparten la misma cola.
///
/// # Ejemplo
/// ```
/// use app_server::workers::ThreadPool;
/// use std::sync::mpsc;
///
/// let pool = ThreadPool::new(1, 4).unwrap();
/// let (tx, rx) = mpsc::channel();
/// pool.execute(1, move || tx.send(42).unwrap()).unwrap();
/// assert_eq!(rx.recv().unwrap(), 42);
/// pool.shutdown();
/// ```
#[derive(Clone)]
pub struct ThreadPool {
    shared: Arc<Shared>,
}

impl ThreadPool {
    /// Crea un pool con `min_workers` hilos iniciales
    pub fn new(min_workers: usize, max_workers: usize) -> Result<Self, PoolError> {
        Self::with_idle_timeout(min_workers, max_workers, DEFAULT_IDLE_TIMEOUT)
    }

    /// Igual que `new` pero con intervalo de ociosidad configurable
    pub fn with_idle_timeout(
        min_workers: usize,
        max_workers: usize,
        idle_timeout: Duration,
    ) -> Result<Self, PoolError> {
        if max_workers == 0 || min_workers > max_workers {
            return Err(PoolError::InvalidBounds {
                min: min_workers,
                max: max_workers,
            });
        }

        let pool = Self {
            shared: Arc::new(Shared {
                state: Mutex::new(PoolState {
                    queue: TaskQueue::new(),
                    workers: 0,
                    idle: 0,
                    shutting_down: false,
                    next_worker_id: 0,
                }),
                available: Condvar::new(),
                handles: Mutex::new(Vec::new()),
                min_workers,
                max_workers,
                idle_timeout,
            }),
        };

        {
            let mut state = pool.shared.lock_state();
            for _ in 0..min_workers {
                Self::spawn_worker(&pool.shared, &mut state)?;
            }
        }

        Ok(pool)
    }

    /// Encola una tarea con la prioridad dada (menor = más urgente)
    ///
    /// Retorna `PoolError::ShutDown` si el pool ya está apagándose.
    pub fn execute<F>(&self, priority: u8, task: F) -> Result<(), PoolError>
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = self.shared.lock_state();
        if state.shutting_down {
            return Err(PoolError::ShutDown);
        }

        state.queue.push(priority, Box::new(task));

        let saturated = state.idle == 0 && state.queue.len() > state.workers;
        if saturated && state.workers < self.shared.max_workers {
            // Si no se puede crear el hilo la tarea sigue encolada y la
            // atenderá un worker existente.
            if let Err(e) = Self::spawn_worker(&self.shared, &mut state) {
                warn!(error = %e, "could not grow worker pool");
            }
        }

        drop(state);
        self.shared.available.notify_one();
        Ok(())
    }

    /// Apaga el pool: drena la cola y espera a todos los workers
    ///
    /// Es idempotente. Llamarlo desde una tarea del propio pool no hace
    /// `join` del hilo actual.
    pub fn shutdown(&self) {
        {
            let mut state = self.shared.lock_state();
            if !state.shutting_down {
                debug!(queued = state.queue.len(), "thread pool shutting down");
            }
            state.shutting_down = true;
        }
        self.shared.available.notify_all();

        let handles = std::mem::take(
            &mut *self
                .shared
                .handles
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        );

        let current = thread::current().id();
        for handle in handles {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("worker thread terminated abnormally");
            }
        }
    }

    /// Estadísticas actuales
    pub fn stats(&self) -> PoolStats {
        let state = self.shared.lock_state();
        PoolStats {
            workers: state.workers,
            idle: state.idle,
            queued: state.queue.len(),
        }
    }

    pub fn min_workers(&self) -> usize {
        self.shared.min_workers
    }

    pub fn max_workers(&self) -> usize {
        self.shared.max_workers
    }

    /// Crea un worker nuevo; el llamador tiene el lock del estado
    fn spawn_worker(shared: &Arc<Shared>, state: &mut PoolState) -> Result<(), PoolError> {
        let id = state.next_worker_id;
        let worker_shared = Arc::clone(shared);

        let handle = thread::Builder::new()
            .name(format!("worker-{}", id))
            .spawn(move || Self::worker_loop(worker_shared, id))
            .map_err(PoolError::Spawn)?;

        state.next_worker_id += 1;
        state.workers += 1;
        state.idle += 1;

        let mut handles = shared.handles.lock().unwrap_or_else(PoisonError::into_inner);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);

        debug!(worker = id, workers = state.workers, "worker spawned");
        Ok(())
    }

    /// Loop principal del worker
    fn worker_loop(shared: Arc<Shared>, id: usize) {
        loop {
            let task = match Self::next_task(&shared) {
                Some(task) => task,
                None => break,
            };

            if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(task)) {
                error!(worker = id, "task panicked: {}", panic_message(payload.as_ref()));
            }

            shared.lock_state().idle += 1;
        }

        debug!(worker = id, "worker exiting");
    }

    /// Espera la próxima tarea; `None` significa que el worker debe terminar
    ///
    /// Al retornar `None` el worker ya fue descontado de los contadores.
    fn next_task(shared: &Shared) -> Option<Task> {
        let mut state = shared.lock_state();
        loop {
            if let Some(task) = state.queue.pop() {
                state.idle -= 1;
                return Some(task);
            }

            if state.shutting_down {
                state.idle -= 1;
                state.workers -= 1;
                return None;
            }

            let (guard, wait) = shared
                .available
                .wait_timeout(state, shared.idle_timeout)
                .unwrap_or_else(PoisonError::into_inner);
            state = guard;

            let surplus = state.workers > shared.min_workers;
            if wait.timed_out() && state.queue.is_empty() && !state.shutting_down && surplus {
                state.idle -= 1;
                state.workers -= 1;
                return None;
            }
        }
    }
}

/// Extrae el mensaje de un panic capturado
pub fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Unknown error".to_string()
    }
}
