//! # Cola de Prioridad de Tareas
//! src/workers/queue.rs
//!
//! Heap de tareas ordenado por (prioridad ascendente, secuencia ascendente).
//! La sincronización la pone el pool: esta estructura vive dentro de su
//! `Mutex` junto con los contadores de workers.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

/// Unidad de trabajo que ejecuta un worker
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// Wrapper para ordenar tareas en el heap
struct QueuedTask {
    priority: u8,
    seq: u64,
    task: Task,
}

impl PartialEq for QueuedTask {
    fn eq(&self, other: &Self) -> bool {
        self.priority == other.priority && self.seq == other.seq
    }
}

impl Eq for QueuedTask {}

impl PartialOrd for QueuedTask {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueuedTask {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap es un max-heap: invertimos ambas comparaciones para que
        // salga primero el número de prioridad más bajo y, a igual prioridad,
        // la tarea encolada antes (FIFO).
        other
            .priority
            .cmp(&self.priority)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

/// Cola de prioridad de tareas (sin sincronización propia)
#[derive(Default)]
pub struct TaskQueue {
    heap: BinaryHeap<QueuedTask>,

    /// Secuencia monótona para desempatar en orden FIFO
    next_seq: u64,
}

impl TaskQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Encola una tarea con la prioridad dada (menor = más urgente)
    pub fn push(&mut self, priority: u8, task: Task) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(QueuedTask { priority, seq, task });
    }

    /// Desencola la tarea más urgente
    pub fn pop(&mut self) -> Option<Task> {
        self.heap.pop().map(|queued| queued.task)
    }

    /// Prioridad de la próxima tarea, si hay alguna
    pub fn peek_priority(&self) -> Option<u8> {
        self.heap.peek().map(|queued| queued.priority)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}
