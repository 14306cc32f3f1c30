//! # Métodos HTTP
//! src/http/method.rs
//!
//! El método también decide la prioridad con la que se encola la conexión
//! en el pool de workers.

use std::fmt;

/// Prioridad reservada para el loop de `accept`
pub const ACCEPT_PRIORITY: u8 = 0;

/// Métodos HTTP reconocidos
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Method {
    GET,
    HEAD,
    POST,
    PUT,
    DELETE,
    PATCH,
    OPTIONS,

    /// Cualquier otro token (puede ser vacío si la request line está rota)
    Extension(String),
}

impl Method {
    /// Parsea un token de método. Nunca falla: lo desconocido es `Extension`.
    pub fn from_token(token: &str) -> Self {
        match token {
            "GET" => Method::GET,
            "HEAD" => Method::HEAD,
            "POST" => Method::POST,
            "PUT" => Method::PUT,
            "DELETE" => Method::DELETE,
            "PATCH" => Method::PATCH,
            "OPTIONS" => Method::OPTIONS,
            other => Method::Extension(other.to_string()),
        }
    }

    /// Convierte el método a string
    pub fn as_str(&self) -> &str {
        match self {
            Method::GET => "GET",
            Method::HEAD => "HEAD",
            Method::POST => "POST",
            Method::PUT => "PUT",
            Method::DELETE => "DELETE",
            Method::PATCH => "PATCH",
            Method::OPTIONS => "OPTIONS",
            Method::Extension(token) => token,
        }
    }

    /// Prioridad en el pool (menor = antes)
    ///
    /// # Ejemplo
    /// ```
    /// use app_server::http::Method;
    /// assert_eq!(Method::GET.priority(), 1);
    /// assert_eq!(Method::from_token("DELETE").priority(), 3);
    /// ```
    pub fn priority(&self) -> u8 {
        match self {
            Method::GET => 1,
            Method::POST => 2,
            Method::PUT | Method::DELETE => 3,
            _ => 4,
        }
    }

    /// Extrae el método de los primeros bytes de una conexión
    ///
    /// Se usa sobre un `peek` del socket, por lo que el buffer puede estar
    /// truncado o vacío.
    pub fn sniff(head: &[u8]) -> Self {
        let end = head
            .iter()
            .position(|b| b.is_ascii_whitespace())
            .unwrap_or(head.len());
        Method::from_token(&String::from_utf8_lossy(&head[..end]))
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
