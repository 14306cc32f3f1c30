//! # Errores del Servidor
//! src/error.rs
//!
//! Errores tipados de cada subsistema. Solo `ServerError` se propaga fuera
//! de `Server::start`/`Server::run`; el resto se maneja dentro del worker
//! o del hilo que lo origina.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Errores de validación de la configuración
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// `--threads-min` mayor que `--threads-max`
    #[error("threads-min ({min}) cannot be greater than threads-max ({max})")]
    InvalidThreadBounds { min: usize, max: usize },

    /// El pool necesita al menos un worker
    #[error("threads-max must be >= 1")]
    NoWorkers,

    /// Timeout o intervalo en cero
    #[error("{0} must be > 0")]
    ZeroDuration(&'static str),
}

/// Errores del pool de workers
#[derive(Debug, Error)]
pub enum PoolError {
    /// Límites inválidos al construir el pool
    #[error("invalid pool bounds: min={min}, max={max}")]
    InvalidBounds { min: usize, max: usize },

    /// `execute` después de `shutdown`
    #[error("thread pool is shut down")]
    ShutDown,

    /// El sistema operativo no pudo crear el hilo
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[source] io::Error),
}

/// Errores del cargador de plantillas
#[derive(Debug, Error)]
pub enum TemplateError {
    /// El directorio de plantillas no existe o no es un directorio
    #[error("templates directory does not exist: {}", .0.display())]
    DirectoryNotFound(PathBuf),

    /// Falló la lectura de un archivo o del directorio
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Errores al servir un archivo de `/static/`
#[derive(Debug, Error)]
pub enum StaticFileError {
    /// Path fuera de la raíz (`..`, symlinks que escapan)
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// No existe o no es un archivo regular
    #[error("not found: {0}")]
    NotFound(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// Errores fatales del servidor (arranque)
#[derive(Debug, Error)]
pub enum ServerError {
    /// `host:port` no es una dirección IP válida
    #[error("invalid listen address: {0}")]
    InvalidAddress(String),

    /// Falló socket/bind/listen
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Pool(#[from] PoolError),

    #[error(transparent)]
    Io(#[from] io::Error),
}
