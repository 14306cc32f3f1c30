//! # Módulo HTTP
//!
//! Implementa el subconjunto de HTTP/1.1 que usa el servidor: una request
//! por conexión, `Connection: close` en cada respuesta, sin keep-alive ni
//! chunked encoding.
//!
//! - Lectura de la request desde el socket (`reader`)
//! - Parsing de request line, headers, query string, form y cookies
//! - Construcción de responses y headers `Set-Cookie`
//! - Métodos y códigos de estado
//!
//! ### Formato de Request
//!
//! ```text
//! POST /submit?x=1 HTTP/1.1\r\n
//! Content-Type: application/x-www-form-urlencoded\r\n
//! Content-Length: 14\r\n
//! Cookie: A=1; B=two%20words\r\n
//! \r\n
//! username=Jo%20
//! ```

pub mod cookie;    // Headers Set-Cookie
pub mod method;    // Métodos y prioridad en el pool
pub mod reader;    // Lectura desde el socket
pub mod request;   // Parsing de HTTP requests
pub mod response;  // Construcción de HTTP responses
pub mod status;    // Códigos de estado HTTP

// Re-exportamos los tipos principales para facilitar su uso
pub use cookie::{CookieOptions, SameSite};
pub use method::{Method, ACCEPT_PRIORITY};
pub use reader::read_request;
pub use request::{ParseError, Request};
pub use response::{build_response, Response};
pub use status::StatusCode;
