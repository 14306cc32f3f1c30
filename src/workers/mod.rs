//! # Sistema de Workers
//! src/workers/mod.rs
//!
//! Pool de hilos con una cola de prioridad compartida. El servidor encola
//! cada conexión con la prioridad de su método HTTP (GET=1, POST=2,
//! PUT/DELETE=3, resto=4) y el loop de `accept` corre dentro del mismo
//! pool con prioridad 0.

pub mod pool;
pub mod queue;

pub use pool::{panic_message, PoolStats, ThreadPool};
pub use queue::{Task, TaskQueue};
