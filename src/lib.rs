//! # App Server
//! src/lib.rs
//!
//! Servidor de aplicaciones HTTP/1.1 implementado desde cero: pool de
//! workers con prioridades, router con parámetros, archivos estáticos y un
//! motor de plantillas con herencia, includes y hot reload.
//!
//! ## Arquitectura
//!
//! El servidor está dividido en módulos especializados:
//! - `app`: Rutas de la aplicación de demostración
//! - `config`: Flags de CLI y variables de entorno (`clap`)
//! - `error`: Errores tipados de cada subsistema
//! - `logging`: Subscriber de `tracing`
//! - `http`: Parsing de requests, construcción de responses y cookies
//! - `router`: Enrutamiento exacto, con parámetros y estáticos
//! - `templates`: Motor de plantillas, caché de includes y hot reload
//! - `workers`: Pool de hilos dinámico con cola de prioridades
//! - `server`: Socket de escucha, loop de `accept` y ciclo de vida
//!
//! ## Ejemplo de uso
//!
//! ```no_run
//! use app_server::config::Config;
//! use app_server::http::Response;
//! use app_server::router::Router;
//! use app_server::server::Server;
//! use std::sync::Arc;
//!
//! let router = Router::new();
//! router.route("/", |_req| Ok(Response::html("<h1>Hola</h1>")));
//! router.route_param("/user/<id>", |req| {
//!     Ok(Response::text(req.route_param("id").unwrap_or("?")))
//! });
//!
//! let server = Server::new(Config::default(), Arc::new(router));
//! server.run().expect("Error al iniciar servidor");
//! ```

pub mod app;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod router;
pub mod server;
pub mod templates;
pub mod workers;
