//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! API para construir respuestas HTTP/1.1 y convertirlas a bytes.
//!
//! ## Formato de una respuesta
//!
//! ```text
//! HTTP/1.1 200 OK\r\n
//! Content-Type: text/html; charset=utf-8\r\n
//! Content-Length: 2\r\n
//! Set-Cookie: A=1; Path=/\r\n
//! Set-Cookie: B=2; Path=/\r\n
//! Connection: close\r\n
//! \r\n
//! ok
//! ```
//!
//! `Content-Type`, `Content-Length` y `Connection` los pone siempre el
//! builder; el resto de headers van en orden de inserción y se pueden
//! repetir.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use app_server::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_content_type("application/json")
//!     .with_body(r#"{"message": "Hello"}"#);
//!
//! let bytes = response.to_bytes();
//! assert!(bytes.starts_with(b"HTTP/1.1 200 OK\r\n"));
//! ```

use super::cookie::{self, CookieOptions};
use super::StatusCode;

/// Content-Type por defecto de las respuestas
pub const DEFAULT_CONTENT_TYPE: &str = "text/html";

const NOT_FOUND_PAGE: &str = "\n<!DOCTYPE html>\n<html>\n<head><title>404</title></head>\n<body><h1>404 Not Found</h1></body>\n</html>\n";

/// Representa una respuesta HTTP/1.1 completa
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Código de estado HTTP (200, 404, etc.)
    status: StatusCode,

    /// Tipo MIME del body, sin charset
    content_type: String,

    /// Headers adicionales en orden; se permiten repetidos (Set-Cookie)
    headers: Vec<(String, String)>,

    /// Cuerpo de la respuesta (puede ser vacío)
    body: Vec<u8>,
}

impl Response {
    /// Crea una respuesta vacía `text/html` con el código indicado
    ///
    /// # Ejemplo
    /// ```
    /// use app_server::http::{Response, StatusCode};
    ///
    /// let response = Response::new(StatusCode::Ok);
    /// assert!(response.body().is_empty());
    /// ```
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// 200 con body HTML
    pub fn html(body: &str) -> Self {
        Self::new(StatusCode::Ok).with_body(body)
    }

    /// 200 con body JSON
    ///
    /// # Ejemplo
    /// ```
    /// use app_server::http::Response;
    ///
    /// let response = Response::json(r#"{"status":"ok"}"#);
    /// assert_eq!(response.content_type(), "application/json");
    /// ```
    pub fn json(body: &str) -> Self {
        Self::new(StatusCode::Ok)
            .with_content_type("application/json")
            .with_body(body)
    }

    /// 200 con body de texto plano
    pub fn text(body: &str) -> Self {
        Self::new(StatusCode::Ok)
            .with_content_type("text/plain")
            .with_body(body)
    }

    /// 302 hacia `location`
    pub fn redirect(location: &str) -> Self {
        Self::new(StatusCode::Found).with_header("Location", location)
    }

    /// Página 404
    pub fn not_found() -> Self {
        Self::new(StatusCode::NotFound).with_body(NOT_FOUND_PAGE)
    }

    /// Página 500 con el mensaje del error
    pub fn internal_error(message: &str) -> Self {
        let body = format!("<h1>500 Internal Server Error</h1><p>{}</p>", message);
        Self::new(StatusCode::InternalServerError).with_body(&body)
    }

    /// Cambia el Content-Type (el charset se agrega al serializar)
    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    /// Agrega un header; llamadas repetidas con el mismo nombre generan
    /// varias líneas
    ///
    /// # Ejemplo
    /// ```
    /// use app_server::http::Response;
    ///
    /// let response = Response::html("ok")
    ///     .with_header("Set-Cookie", "A=1")
    ///     .with_header("Set-Cookie", "B=2");
    /// assert_eq!(response.headers().len(), 2);
    /// ```
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.add_header(name, value);
        self
    }

    /// Agrega un header a una respuesta existente (versión mutable)
    pub fn add_header(&mut self, name: &str, value: &str) {
        self.headers.push((name.to_string(), value.to_string()));
    }

    /// Agrega un `Set-Cookie`
    pub fn with_cookie(self, name: &str, value: &str, options: &CookieOptions) -> Self {
        let header = cookie::set_cookie(name, value, options);
        self.with_header("Set-Cookie", &header)
    }

    /// Agrega un `Set-Cookie` que borra la cookie
    pub fn with_deleted_cookie(self, name: &str, path: &str) -> Self {
        let header = cookie::delete_cookie(name, path);
        self.with_header("Set-Cookie", &header)
    }

    /// Establece el cuerpo desde un string
    pub fn with_body(mut self, body: &str) -> Self {
        self.body = body.as_bytes().to_vec();
        self
    }

    /// Establece el cuerpo desde bytes (archivos binarios)
    pub fn with_body_bytes(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    /// Serializa la respuesta completa
    pub fn to_bytes(&self) -> Vec<u8> {
        build_response(self.status, &self.content_type, &self.body, &self.headers)
    }

    /// Obtiene el código de estado de la respuesta
    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Headers adicionales en orden de inserción
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Primer valor de un header adicional (case-insensitive)
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Obtiene una referencia al body
    pub fn body(&self) -> &[u8] {
        &self.body
    }
}

/// Agrega `; charset=utf-8` a los tipos de texto y JSON
pub fn content_type_with_charset(content_type: &str) -> String {
    let textual = content_type.starts_with("text/") || content_type.starts_with("application/json");
    if textual && !content_type.to_ascii_lowercase().contains("charset") {
        format!("{}; charset=utf-8", content_type)
    } else {
        content_type.to_string()
    }
}

/// Construye el octet stream de una respuesta
///
/// Orden: status line, `Content-Type`, `Content-Length`, headers extra en
/// orden, `Connection: close`, línea vacía y body.
///
/// # Ejemplo
/// ```
/// use app_server::http::{build_response, StatusCode};
///
/// let bytes = build_response(StatusCode::Ok, "text/html", b"ok", &[]);
/// assert_eq!(
///     bytes,
///     b"HTTP/1.1 200 OK\r\nContent-Type: text/html; charset=utf-8\r\nContent-Length: 2\r\nConnection: close\r\n\r\nok"
/// );
/// ```
pub fn build_response(
    status: StatusCode,
    content_type: &str,
    body: &[u8],
    extra_headers: &[(String, String)],
) -> Vec<u8> {
    let mut head = format!("HTTP/1.1 {}\r\n", status);
    head.push_str(&format!("Content-Type: {}\r\n", content_type_with_charset(content_type)));
    head.push_str(&format!("Content-Length: {}\r\n", body.len()));
    for (name, value) in extra_headers {
        head.push_str(&format!("{}: {}\r\n", name, value));
    }
    head.push_str("Connection: close\r\n\r\n");

    let mut result = head.into_bytes();
    result.extend_from_slice(body);
    result
}
