//! # Módulo del Servidor HTTP
//! src/server/mod.rs
//!
//! Este módulo implementa el servidor TCP que:
//! 1. Escucha en un puerto (socket con `SO_REUSEADDR`, backlog 100)
//! 2. Acepta conexiones desde una tarea del pool con prioridad 0
//! 3. Clasifica cada conexión por método y la encola en el pool
//! 4. Lee, despacha y responde la request en un worker
//!
//! `Server::start` no bloquea: retorna un `RunningServer` con el que se
//! espera o se detiene el servidor. `Server::run` hace ambas cosas.

pub mod tcp;

// Re-exportar para facilitar el uso
pub use tcp::{RunningServer, Server, StopHandle, LISTEN_BACKLOG};
