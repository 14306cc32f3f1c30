//! # Parsing de Requests HTTP/1.1
//! src/http/request.rs
//!
//! Parser best-effort: lo que no se puede extraer queda vacío en vez de
//! producir un error. El único fallo es una conexión que no envió nada.
//!
//! ## Formato de un Request
//!
//! ```text
//! POST /submit?next=%2F HTTP/1.1\r\n
//! Content-Type: application/x-www-form-urlencoded\r\n
//! Content-Length: 13\r\n
//! Cookie: session=abc; theme=dark\r\n
//! \r\n
//! username=Jo+D
//! ```
//!
//! Los nombres de headers se normalizan a minúsculas al entrar y se
//! consultan sin distinguir mayúsculas.

use super::method::Method;
use std::collections::HashMap;
use thiserror::Error;

/// Errores que pueden ocurrir durante el parsing
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// El peer cerró la conexión sin enviar bytes útiles
    #[error("Empty request")]
    EmptyRequest,
}

/// Representa un request HTTP parseado
#[derive(Debug, Clone)]
pub struct Request {
    /// Método HTTP (puede ser `Extension("")` si la request line está rota)
    method: Method,

    /// Path sin query string, sin decodificar (ej: "/user/42")
    path: String,

    /// Query parameters con valores decodificados
    query_params: HashMap<String, String>,

    /// Campos de un POST `application/x-www-form-urlencoded`
    form_params: HashMap<String, String>,

    /// Parámetros extraídos por el router de patrones `/user/<id>`
    route_params: HashMap<String, String>,

    /// Headers con nombre en minúsculas
    headers: HashMap<String, String>,

    /// Cookies del header `Cookie`, con valores decodificados
    cookies: HashMap<String, String>,

    /// Versión HTTP tal como llegó (ej: "HTTP/1.1")
    version: String,

    /// Body verbatim
    body: Vec<u8>,
}

impl Request {
    /// Parsea un request desde los bytes leídos del socket
    ///
    /// # Ejemplo
    ///
    /// ```
    /// use app_server::http::Request;
    ///
    /// let raw = b"GET /search?q=rust+lang&page=2 HTTP/1.1\r\nHost: x\r\n\r\n";
    /// let request = Request::parse(raw).unwrap();
    ///
    /// assert_eq!(request.path(), "/search");
    /// assert_eq!(request.query_param("q"), Some("rust lang"));
    /// assert_eq!(request.header("host"), Some("x"));
    /// ```
    pub fn parse(buffer: &[u8]) -> Result<Self, ParseError> {
        if buffer.iter().all(|b| b.is_ascii_whitespace()) {
            return Err(ParseError::EmptyRequest);
        }

        // Separar cabecera y body en el primer \r\n\r\n
        let (head, body) = match find_subsequence(buffer, b"\r\n\r\n") {
            Some(pos) => (&buffer[..pos], buffer[pos + 4..].to_vec()),
            None => (buffer, Vec::new()),
        };

        let head = String::from_utf8_lossy(head);
        let mut lines = head.split('\n').map(|line| line.trim_end_matches('\r'));

        // 1. Request line
        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();
        let method = Method::from_token(parts.next().unwrap_or_default());
        let target = parts.next().unwrap_or_default();
        let version = parts.next().unwrap_or_default().to_string();

        let (path, query_params) = match target.split_once('?') {
            Some((path, query)) => (path.to_string(), parse_query_string(query)),
            None => (target.to_string(), HashMap::new()),
        };

        // 2. Headers
        let headers = Self::parse_headers(lines);

        let mut request = Request {
            method,
            path,
            query_params,
            form_params: HashMap::new(),
            route_params: HashMap::new(),
            headers,
            cookies: HashMap::new(),
            version,
            body,
        };

        // 3. Formularios
        if request.method == Method::POST && request.is_form_urlencoded() {
            let body = String::from_utf8_lossy(&request.body).into_owned();
            request.form_params = parse_query_string(&body);
        }

        // 4. Cookies
        if let Some(cookie_header) = request.header("cookie") {
            request.cookies = parse_cookies(cookie_header);
        }

        Ok(request)
    }

    /// Parsea los headers hasta la primera línea vacía
    ///
    /// Las líneas sin ':' se ignoran.
    fn parse_headers<'a>(lines: impl Iterator<Item = &'a str>) -> HashMap<String, String> {
        let mut headers = HashMap::new();

        for line in lines {
            if line.is_empty() {
                break;
            }

            if let Some((name, value)) = line.split_once(':') {
                headers.insert(
                    name.trim().to_ascii_lowercase(),
                    value.trim_start().to_string(),
                );
            }
        }

        headers
    }

    fn is_form_urlencoded(&self) -> bool {
        self.header("content-type")
            .map(|ct| ct.contains("application/x-www-form-urlencoded"))
            .unwrap_or(false)
    }

    /// Serializa el request de vuelta a bytes
    ///
    /// Los valores de la query se re-codifican; headers y body se emiten
    /// tal cual (headers en orden alfabético).
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut target = self.path.clone();
        if !self.query_params.is_empty() {
            target.push('?');
            target.push_str(&encode_query_string(&self.query_params));
        }

        let version = if self.version.is_empty() {
            "HTTP/1.1"
        } else {
            &self.version
        };

        let mut out = format!("{} {} {}\r\n", self.method, target, version).into_bytes();

        let mut names: Vec<&String> = self.headers.keys().collect();
        names.sort();
        for name in names {
            out.extend_from_slice(format!("{}: {}\r\n", name, self.headers[name]).as_bytes());
        }

        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&self.body);
        out
    }

    // === Métodos públicos para acceder a los campos ===

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query_params(&self) -> &HashMap<String, String> {
        &self.query_params
    }

    pub fn query_param(&self, name: &str) -> Option<&str> {
        self.query_params.get(name).map(|s| s.as_str())
    }

    pub fn form_params(&self) -> &HashMap<String, String> {
        &self.form_params
    }

    pub fn form_param(&self, name: &str) -> Option<&str> {
        self.form_params.get(name).map(|s| s.as_str())
    }

    pub fn route_params(&self) -> &HashMap<String, String> {
        &self.route_params
    }

    pub fn route_param(&self, name: &str) -> Option<&str> {
        self.route_params.get(name).map(|s| s.as_str())
    }

    /// Lo usa el router al resolver un patrón
    pub fn set_route_params(&mut self, params: HashMap<String, String>) {
        self.route_params = params;
    }

    /// Todos los headers (nombres en minúsculas)
    pub fn headers(&self) -> &HashMap<String, String> {
        &self.headers
    }

    /// Obtiene un header sin distinguir mayúsculas
    ///
    /// # Ejemplo
    /// ```
    /// use app_server::http::Request;
    ///
    /// let request = Request::parse(b"GET / HTTP/1.1\r\nContent-Type: text/plain\r\n\r\n").unwrap();
    /// assert_eq!(request.header("Content-Type"), Some("text/plain"));
    /// assert_eq!(request.header("content-type"), Some("text/plain"));
    /// ```
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(|s| s.as_str())
    }

    pub fn cookies(&self) -> &HashMap<String, String> {
        &self.cookies
    }

    pub fn cookie(&self, name: &str) -> Option<&str> {
        self.cookies.get(name).map(|s| s.as_str())
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Body como String, si es UTF-8 válido
    pub fn body_string(&self) -> Option<String> {
        String::from_utf8(self.body.clone()).ok()
    }
}

/// Parsea una query string (`a=1&b=hola%20mundo`)
///
/// Las claves no se decodifican; los valores sí (`%HH` y `+`). Un par sin
/// `=` queda con valor vacío y a igual clave gana la última.
pub fn parse_query_string(query: &str) -> HashMap<String, String> {
    let mut params = HashMap::new();

    for pair in query.split('&') {
        if pair.is_empty() {
            continue;
        }

        match pair.split_once('=') {
            Some((key, value)) => params.insert(key.to_string(), url_decode(value)),
            None => params.insert(pair.to_string(), String::new()),
        };
    }

    params
}

/// Parsea el valor de un header `Cookie`
pub fn parse_cookies(header: &str) -> HashMap<String, String> {
    let mut cookies = HashMap::new();

    for pair in header.split(';') {
        if let Some((key, value)) = pair.split_once('=') {
            cookies.insert(key.trim_start().to_string(), url_decode(value));
        }
    }

    cookies
}

/// Decodifica `%HH` y `+` → espacio
///
/// Secuencias `%` inválidas se dejan literales; bytes no UTF-8 se
/// reemplazan por U+FFFD.
pub fn url_decode(value: &str) -> String {
    let plus_decoded = value.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(plus_decoded.as_bytes())).into_owned()
}

/// Codifica pares clave/valor como query string, ordenados por clave
fn encode_query_string(params: &HashMap<String, String>) -> String {
    let mut keys: Vec<&String> = params.keys().collect();
    keys.sort();
    keys.iter()
        .map(|key| format!("{}={}", key, urlencoding::encode(&params[*key])))
        .collect::<Vec<_>>()
        .join("&")
}

pub(crate) fn find_subsequence(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() || haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_get() {
        let raw = b"GET / HTTP/1.1\r\nHost: x\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "/");
        assert_eq!(request.version(), "HTTP/1.1");
        assert!(request.query_params().is_empty());
        assert!(request.body().is_empty());
    }

    #[test]
    fn test_parse_with_query_params() {
        let raw = b"GET /test?num=42&text=hello%20world&fast=true&flag HTTP/1.1\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.path(), "/test");
        assert_eq!(request.query_param("num"), Some("42"));
        assert_eq!(request.query_param("text"), Some("hello world"));
        assert_eq!(request.query_param("fast"), Some("true"));
        assert_eq!(request.query_param("flag"), Some(""));
    }

    #[test]
    fn test_query_last_write_wins_and_keys_not_decoded() {
        let params = parse_query_string("a=1&a=2&my%20key=v+w&&");
        assert_eq!(params.get("a").map(String::as_str), Some("2"));
        assert_eq!(params.get("my%20key").map(String::as_str), Some("v w"));
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_url_decode() {
        assert_eq!(url_decode("Jo%20"), "Jo ");
        assert_eq!(url_decode("a+b%2Bc"), "a b+c");
        assert_eq!(url_decode("%E2%9C%93"), "✓");
        assert_eq!(url_decode("100%"), "100%");
        assert_eq!(url_decode("%zz"), "%zz");
    }

    #[test]
    fn test_headers_are_case_insensitive() {
        let raw = b"GET / HTTP/1.1\r\nHost: localhost:8080\r\nX-Custom:   spaced\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.header("Host"), Some("localhost:8080"));
        assert_eq!(request.header("HOST"), Some("localhost:8080"));
        assert_eq!(request.header("x-custom"), Some("spaced"));
        assert!(request.headers().contains_key("host"));
    }

    #[test]
    fn test_parse_form_post() {
        let raw = b"POST /submit HTTP/1.1\r\n\
Content-Type: application/x-www-form-urlencoded\r\n\
Content-Length: 14\r\n\r\n\
username=Jo%20";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.method(), &Method::POST);
        assert_eq!(request.form_param("username"), Some("Jo "));
        assert_eq!(request.body(), b"username=Jo%20");
    }

    #[test]
    fn test_form_ignored_for_other_content_types() {
        let raw = b"POST /api HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"a\":1}";
        let request = Request::parse(raw).unwrap();

        assert!(request.form_params().is_empty());
        assert_eq!(request.body_string().as_deref(), Some("{\"a\":1}"));
    }

    #[test]
    fn test_form_ignored_for_get() {
        let raw = b"GET / HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\n\r\na=1";
        let request = Request::parse(raw).unwrap();
        assert!(request.form_params().is_empty());
    }

    #[test]
    fn test_parse_cookies() {
        let raw = b"GET / HTTP/1.1\r\nCookie: A=1; B=two%20words\r\n\r\n";
        let request = Request::parse(raw).unwrap();

        assert_eq!(request.cookie("A"), Some("1"));
        assert_eq!(request.cookie("B"), Some("two words"));
        assert_eq!(request.cookies().len(), 2);
    }

    #[test]
    fn test_cookie_pair_without_equals_is_skipped() {
        let cookies = parse_cookies("flag; a=b");
        assert_eq!(cookies.len(), 1);
        assert_eq!(cookies.get("a").map(String::as_str), Some("b"));
    }

    #[test]
    fn test_empty_request() {
        assert_eq!(Request::parse(b"").unwrap_err(), ParseError::EmptyRequest);
        assert_eq!(Request::parse(b"\r\n\r\n").unwrap_err(), ParseError::EmptyRequest);
    }

    #[test]
    fn test_malformed_request_line_is_best_effort() {
        let request = Request::parse(b"GET\r\n\r\n").unwrap();
        assert_eq!(request.method(), &Method::GET);
        assert_eq!(request.path(), "");
        assert_eq!(request.version(), "");

        let request = Request::parse(b"garbage-without-terminator").unwrap();
        assert_eq!(request.method().as_str(), "garbage-without-terminator");
        assert_eq!(request.path(), "");
    }

    #[test]
    fn test_bare_lf_line_endings() {
        let request = Request::parse(b"GET /x HTTP/1.1\nHost: a\n\n").unwrap();
        assert_eq!(request.path(), "/x");
        assert_eq!(request.header("host"), Some("a"));
    }

    #[test]
    fn test_roundtrip_serialization() {
        let raw = b"POST /submit?next=%2Fhome&q=a+b HTTP/1.1\r\n\
Host: example\r\n\
Cookie: A=1; B=two%20words\r\n\
Content-Type: application/x-www-form-urlencoded\r\n\
Content-Length: 19\r\n\r\n\
username=Jo&age=30+";
        let original = Request::parse(raw).unwrap();
        let reparsed = Request::parse(&original.to_bytes()).unwrap();

        assert_eq!(reparsed.method(), original.method());
        assert_eq!(reparsed.path(), original.path());
        assert_eq!(reparsed.query_params(), original.query_params());
        assert_eq!(reparsed.form_params(), original.form_params());
        assert_eq!(reparsed.cookies(), original.cookies());
        assert_eq!(reparsed.headers(), original.headers());
        assert_eq!(reparsed.body(), original.body());
        assert_eq!(original.query_param("next"), Some("/home"));
        assert_eq!(original.form_param("age"), Some("30 "));
    }
}
