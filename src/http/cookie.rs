//! # Cookies
//! src/http/cookie.rs
//!
//! Helpers que generan el valor de un header `Set-Cookie`:
//!
//! ```text
//! name=value[; Path=P][; Expires=E][; HttpOnly][; Secure][; SameSite=S]
//! ```

use std::fmt;

/// Fecha fija que usan los borrados de cookies
pub const EXPIRED_DATE: &str = "Thu, 01 Jan 1970 00:00:00 GMT";

/// Política `SameSite`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SameSite {
    Strict,
    Lax,
    None,
}

impl SameSite {
    pub fn as_str(&self) -> &'static str {
        match self {
            SameSite::Strict => "Strict",
            SameSite::Lax => "Lax",
            SameSite::None => "None",
        }
    }
}

impl fmt::Display for SameSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atributos de una cookie
///
/// Por defecto: `Path=/`, sin expiración, `HttpOnly`, sin `Secure` y
/// `SameSite=Lax`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CookieOptions {
    pub path: Option<String>,
    pub expires: Option<String>,
    pub http_only: bool,
    pub secure: bool,
    pub same_site: Option<SameSite>,
}

impl Default for CookieOptions {
    fn default() -> Self {
        Self {
            path: Some("/".to_string()),
            expires: None,
            http_only: true,
            secure: false,
            same_site: Some(SameSite::Lax),
        }
    }
}

impl CookieOptions {
    pub fn path(mut self, path: &str) -> Self {
        self.path = Some(path.to_string());
        self
    }

    pub fn expires(mut self, expires: &str) -> Self {
        self.expires = Some(expires.to_string());
        self
    }

    pub fn http_only(mut self, http_only: bool) -> Self {
        self.http_only = http_only;
        self
    }

    pub fn secure(mut self, secure: bool) -> Self {
        self.secure = secure;
        self
    }

    pub fn same_site(mut self, same_site: Option<SameSite>) -> Self {
        self.same_site = same_site;
        self
    }
}

/// Valor de `Set-Cookie` para fijar una cookie
///
/// # Ejemplo
/// ```
/// use app_server::http::cookie::{set_cookie, CookieOptions};
///
/// let header = set_cookie("User", "JohnDoe", &CookieOptions::default());
/// assert_eq!(header, "User=JohnDoe; Path=/; HttpOnly; SameSite=Lax");
/// ```
pub fn set_cookie(name: &str, value: &str, options: &CookieOptions) -> String {
    let mut cookie = format!("{}={}", name, value);

    if let Some(path) = &options.path {
        cookie.push_str("; Path=");
        cookie.push_str(path);
    }
    if let Some(expires) = options.expires.as_deref().filter(|e| !e.is_empty()) {
        cookie.push_str("; Expires=");
        cookie.push_str(expires);
    }
    if options.http_only {
        cookie.push_str("; HttpOnly");
    }
    if options.secure {
        cookie.push_str("; Secure");
    }
    if let Some(same_site) = options.same_site {
        cookie.push_str("; SameSite=");
        cookie.push_str(same_site.as_str());
    }

    cookie
}

/// Valor de `Set-Cookie` que borra una cookie en el cliente
pub fn delete_cookie(name: &str, path: &str) -> String {
    format!("{}=deleted; Path={}; Expires={}; HttpOnly", name, path, EXPIRED_DATE)
}
