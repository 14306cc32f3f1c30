//! # Configuración del Servidor
//! src/config.rs
//!
//! Configuración del servidor con soporte para argumentos CLI y variables
//! de entorno.
//!
//! ## Ejemplos de uso
//!
//! ### CLI
//! ```bash
//! ./app_server --port 8080 --verbose \
//!   --threads-min 2 \
//!   --threads-max 8 \
//!   --no-hot-reload
//! ```
//!
//! ### Variables de entorno
//! ```bash
//! HTTP_PORT=8080 THREADS_MAX=16 ./app_server
//! ```

use crate::error::ConfigError;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;

/// Configuración del servidor HTTP/1.1
#[derive(Debug, Clone, Parser)]
#[command(name = "app_server")]
#[command(about = "Servidor HTTP/1.1 con pool de workers por prioridad y plantillas")]
#[command(version = "0.1.0")]
pub struct Config {
    /// Puerto en el que escucha el servidor (0 = efímero)
    #[arg(short, long, default_value = "8080", env = "HTTP_PORT")]
    pub port: u16,

    /// IP en la que escucha (todas las interfaces por defecto)
    #[arg(long, default_value = "0.0.0.0", env = "HTTP_HOST")]
    pub host: String,

    /// Logs a nivel debug
    #[arg(short, long, env = "VERBOSE")]
    pub verbose: bool,

    /// Desactiva el hilo que recarga plantillas modificadas
    #[arg(long = "no-hot-reload", env = "NO_HOT_RELOAD")]
    pub no_hot_reload: bool,

    // === Workers ===

    /// Workers que el pool mantiene siempre vivos
    #[arg(long = "threads-min", default_value = "2", env = "THREADS_MIN")]
    pub threads_min: usize,

    /// Máximo de workers bajo carga
    #[arg(long = "threads-max", default_value = "8", env = "THREADS_MAX")]
    pub threads_max: usize,

    /// Tiempo ocioso tras el cual un worker extra termina
    #[arg(long = "idle-timeout-ms", default_value = "30000", env = "IDLE_TIMEOUT_MS")]
    pub idle_timeout_ms: u64,

    // === Directorios ===

    /// Directorio de plantillas `*.html`
    #[arg(long = "templates-dir", default_value = "templates", env = "TEMPLATES_DIR")]
    pub templates_dir: PathBuf,

    /// Directorio servido bajo `/static/`
    #[arg(long = "static-dir", default_value = "static", env = "STATIC_DIR")]
    pub static_dir: PathBuf,

    // === Timeouts ===

    /// Timeout de lectura por conexión en milisegundos
    #[arg(long = "read-timeout-ms", default_value = "5000", env = "READ_TIMEOUT_MS")]
    pub read_timeout_ms: u64,

    /// Intervalo de polling del hot reload en milisegundos
    #[arg(long = "reload-interval-ms", default_value = "2000", env = "RELOAD_INTERVAL_MS")]
    pub reload_interval_ms: u64,
}

impl Config {
    /// Crea una nueva configuración parseando argumentos CLI
    pub fn new() -> Self {
        Config::parse()
    }

    /// Obtiene la dirección completa para bind (host:port)
    ///
    /// # Ejemplo
    /// ```rust
    /// use app_server::config::Config;
    ///
    /// let config = Config::default();
    /// assert_eq!(config.address(), "0.0.0.0:8080");
    /// ```
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn hot_reload(&self) -> bool {
        !self.no_hot_reload
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn reload_interval(&self) -> Duration {
        Duration::from_millis(self.reload_interval_ms)
    }

    pub fn idle_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_timeout_ms)
    }

    /// Valida la configuración
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.threads_min > self.threads_max {
            return Err(ConfigError::InvalidThreadBounds {
                min: self.threads_min,
                max: self.threads_max,
            });
        }
        if self.threads_max == 0 {
            return Err(ConfigError::NoWorkers);
        }
        if self.read_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("read-timeout-ms"));
        }
        if self.reload_interval_ms == 0 {
            return Err(ConfigError::ZeroDuration("reload-interval-ms"));
        }
        if self.idle_timeout_ms == 0 {
            return Err(ConfigError::ZeroDuration("idle-timeout-ms"));
        }
        Ok(())
    }

    /// Registra un resumen de la configuración
    pub fn print_summary(&self) {
        info!("Server configuration");
        info!("  address:         {}", self.address());
        info!(
            "  workers:         {}..={} (idle timeout {} ms)",
            self.threads_min, self.threads_max, self.idle_timeout_ms
        );
        info!("  templates:       {}", self.templates_dir.display());
        info!("  static files:    {}", self.static_dir.display());
        info!("  read timeout:    {} ms", self.read_timeout_ms);
        if self.hot_reload() {
            info!("  hot reload:      every {} ms", self.reload_interval_ms);
        } else {
            info!("  hot reload:      disabled");
        }
    }
}

impl Default for Config {
    /// Configuración por defecto (igual a la del CLI sin argumentos)
    fn default() -> Self {
        Self {
            port: 8080,
            host: "0.0.0.0".to_string(),
            verbose: false,
            no_hot_reload: false,
            threads_min: 2,
            threads_max: 8,
            idle_timeout_ms: 30_000,
            templates_dir: PathBuf::from("templates"),
            static_dir: PathBuf::from("static"),
            read_timeout_ms: 5_000,
            reload_interval_ms: 2_000,
        }
    }
}
