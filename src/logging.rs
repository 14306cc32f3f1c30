//! # Logging
//! src/logging.rs
//!
//! Instala el subscriber de `tracing`. `RUST_LOG` tiene prioridad; si no
//! está definido se usa `app_server=info` (o `debug` con `--verbose`).

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filtro por defecto según `--verbose`
pub fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "app_server=debug"
    } else {
        "app_server=info"
    }
}

/// Inicializa el subscriber global
///
/// Llamarla más de una vez (por ejemplo desde tests) no falla: la segunda
/// instalación se ignora.
pub fn init(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(verbose)));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_thread_names(true))
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_directive() {
        assert_eq!(default_directive(false), "app_server=info");
        assert_eq!(default_directive(true), "app_server=debug");
    }

    #[test]
    fn test_init_is_idempotent() {
        init(false);
        init(true);
    }
}
