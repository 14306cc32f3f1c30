//! # Sistema de Routing
//! src/router/mod.rs
//!
//! Mapea el path de una request a su handler.
//!
//! ## Arquitectura
//!
//! ```text
//! Request → Router → (exacta | con parámetros | /static/) → Handler → Response
//! ```
//!
//! Orden de resolución:
//! 1. Ruta exacta (`HashMap` path → handler)
//! 2. Rutas con parámetros (`/user/<id>`) en orden de registro; la primera
//!    que calza gana
//! 3. Archivo bajo `/static/`
//! 4. 404
//!
//! La tabla se consulta bajo un `Mutex`, pero el handler se invoca con el
//! lock ya liberado: dos requests lentas no se serializan entre sí.

pub mod static_files;

use crate::http::{Request, Response};
use crate::workers::panic_message;
use static_files::StaticFiles;
use std::collections::HashMap;
use std::error::Error;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, error};

/// Resultado de un handler; un `Err` se convierte en una página 500
pub type HandlerResult = Result<Response, Box<dyn Error + Send + Sync>>;

/// Tipo de handler
///
/// Un handler recibe la request ya parseada (con los parámetros de ruta
/// cargados) y retorna una Response.
pub type Handler = Arc<dyn Fn(&Request) -> HandlerResult + Send + Sync>;

/// Ruta con segmentos `<nombre>`
struct ParamRoute {
    pattern: String,
    segments: Vec<String>,
    handler: Handler,
}

#[derive(Default)]
struct RouteTable {
    exact: HashMap<String, Handler>,
    params: Vec<ParamRoute>,
}

/// Router que mapea paths a handlers
pub struct Router {
    table: Mutex<RouteTable>,
    static_files: Option<StaticFiles>,
}

impl Router {
    /// Crea un router vacío, sin archivos estáticos
    pub fn new() -> Self {
        Self {
            table: Mutex::new(RouteTable::default()),
            static_files: None,
        }
    }

    /// Sirve `/static/...` desde `dir`
    pub fn with_static_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.static_files = Some(StaticFiles::new(dir));
        self
    }

    /// Registra una ruta exacta; re-registrar el mismo path reemplaza el handler
    ///
    /// # Ejemplo
    /// ```
    /// use app_server::router::Router;
    /// use app_server::http::Response;
    ///
    /// let router = Router::new();
    /// router.route("/hello", |_req| Ok(Response::json(r#"{"message": "Hello"}"#)));
    /// assert_eq!(router.len(), 1);
    /// ```
    pub fn route<F>(&self, path: &str, handler: F)
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.lock_table()
            .exact
            .insert(path.to_string(), Arc::new(handler));
        debug!(path, "Route added");
    }

    /// Registra una ruta con parámetros (`/user/<id>`)
    ///
    /// # Ejemplo
    /// ```
    /// use app_server::router::Router;
    /// use app_server::http::{Request, Response};
    ///
    /// let router = Router::new();
    /// router.route_param("/user/<id>", |req| {
    ///     let id = req.route_param("id").unwrap_or_default();
    ///     Ok(Response::html(&format!("User ID: {}", id)))
    /// });
    ///
    /// let mut request = Request::parse(b"GET /user/42 HTTP/1.1\r\n\r\n").unwrap();
    /// let response = router.dispatch(&mut request);
    /// assert_eq!(response.body(), b"User ID: 42");
    /// ```
    pub fn route_param<F>(&self, pattern: &str, handler: F)
    where
        F: Fn(&Request) -> HandlerResult + Send + Sync + 'static,
    {
        self.lock_table().params.push(ParamRoute {
            pattern: pattern.to_string(),
            segments: split_segments(pattern).map(str::to_string).collect(),
            handler: Arc::new(handler),
        });
        debug!(pattern, "Param route added");
    }

    /// Cantidad de rutas registradas (exactas + con parámetros)
    pub fn len(&self) -> usize {
        let table = self.lock_table();
        table.exact.len() + table.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Busca el handler de `path` y los parámetros capturados
    ///
    /// Devuelve un clon del `Arc`, así el lock se suelta antes de invocarlo.
    pub fn resolve(&self, path: &str) -> Option<(Handler, HashMap<String, String>)> {
        let table = self.lock_table();

        if let Some(handler) = table.exact.get(path) {
            return Some((Arc::clone(handler), HashMap::new()));
        }

        table.params.iter().find_map(|route| {
            match_segments(&route.segments, path).map(|params| {
                debug!(pattern = %route.pattern, path, "Matched param route");
                (Arc::clone(&route.handler), params)
            })
        })
    }

    /// Resuelve y ejecuta el handler de la request
    ///
    /// Sin ruta: archivo estático o 404. Un handler que retorna `Err` o
    /// hace panic produce una página 500 con el mensaje.
    pub fn dispatch(&self, request: &mut Request) -> Response {
        match self.resolve(request.path()) {
            Some((handler, params)) => {
                request.set_route_params(params);
                invoke(&handler, request)
            }
            None => self
                .static_files
                .as_ref()
                .and_then(|files| files.serve(request.path()))
                .unwrap_or_else(Response::not_found),
        }
    }

    fn lock_table(&self) -> MutexGuard<'_, RouteTable> {
        self.table.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

/// Ejecuta un handler aislando errores y panics
fn invoke(handler: &Handler, request: &Request) -> Response {
    match panic::catch_unwind(AssertUnwindSafe(|| handler(request))) {
        Ok(Ok(response)) => response,
        Ok(Err(err)) => {
            error!(path = request.path(), error = %err, "Handler failed");
            Response::internal_error(&err.to_string())
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            error!(path = request.path(), panic = %message, "Handler panicked");
            Response::internal_error(&message)
        }
    }
}

/// Segmentos no vacíos de un path
fn split_segments(path: &str) -> impl Iterator<Item = &str> {
    path.split('/').filter(|segment| !segment.is_empty())
}

/// Nombre del parámetro si el segmento es `<nombre>`
fn param_name(segment: &str) -> Option<&str> {
    segment
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .filter(|name| !name.is_empty())
}

/// Compara un patrón ya segmentado contra un path
fn match_segments(pattern: &[String], path: &str) -> Option<HashMap<String, String>> {
    let parts: Vec<&str> = split_segments(path).collect();
    if parts.len() != pattern.len() {
        return None;
    }

    let mut params = HashMap::new();
    for (expected, actual) in pattern.iter().zip(parts) {
        match param_name(expected) {
            Some(name) => {
                params.insert(name.to_string(), actual.to_string());
            }
            None if expected == actual => {}
            None => return None,
        }
    }
    Some(params)
}

/// Compara un patrón (`/user/<id>`) contra un path
///
/// # Ejemplo
/// ```
/// use app_server::router::match_pattern;
///
/// let params = match_pattern("/user/<id>/post/<post>", "/user/7/post/99").unwrap();
/// assert_eq!(params["id"], "7");
/// assert_eq!(params["post"], "99");
/// assert!(match_pattern("/user/<id>", "/user/7/extra").is_none());
/// ```
pub fn match_pattern(pattern: &str, path: &str) -> Option<HashMap<String, String>> {
    let segments: Vec<String> = split_segments(pattern).map(str::to_string).collect();
    match_segments(&segments, path)
}
