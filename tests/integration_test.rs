//! Tests de integración para el servidor HTTP
//! tests/integration_test.rs
//!
//! Cada test levanta su propio servidor en un puerto efímero y habla HTTP
//! crudo sobre `TcpStream`. Las rutas de la demo usan las plantillas y
//! estáticos del repositorio.

use app_server::app;
use app_server::config::Config;
use app_server::http::{CookieOptions, Response};
use app_server::router::Router;
use app_server::server::{RunningServer, Server};
use app_server::templates::{TemplateEngine, TemplateLoader};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;
use std::time::{Duration, Instant, SystemTime};
use tempfile::TempDir;

fn manifest_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
}

fn test_config() -> Config {
    Config {
        host: "127.0.0.1".to_string(),
        port: 0,
        no_hot_reload: true,
        threads_min: 2,
        threads_max: 4,
        ..Config::default()
    }
}

/// Servidor con las rutas de la demo, plantillas y estáticos del repo
fn start_demo() -> RunningServer {
    let engine = Arc::new(TemplateEngine::new());
    let loader = Arc::new(TemplateLoader::new(
        Arc::clone(&engine),
        manifest_dir().join("templates"),
    ));
    let router = Router::new().with_static_dir(manifest_dir().join("static"));
    app::register_routes(&router, &engine);

    Server::new(test_config(), Arc::new(router))
        .with_templates(loader)
        .start()
        .expect("server should start")
}

fn start_with(config: Config, router: Router) -> RunningServer {
    Server::new(config, Arc::new(router))
        .start()
        .expect("server should start")
}

/// Helper: envía bytes crudos y retorna la response completa
fn send_raw(addr: SocketAddr, raw: &[u8]) -> Result<String, Box<dyn std::error::Error>> {
    let mut stream = TcpStream::connect(addr)?;
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    stream.write_all(raw)?;
    stream.flush()?;

    let mut response = Vec::new();
    stream.read_to_end(&mut response)?;
    Ok(String::from_utf8_lossy(&response).into_owned())
}

fn get(addr: SocketAddr, path: &str) -> String {
    let request = format!("GET {} HTTP/1.1\r\nHost: localhost\r\n\r\n", path);
    send_raw(addr, request.as_bytes()).expect("Failed to send request")
}

/// Helper: extrae el body de una response HTTP
fn extract_body(response: &str) -> &str {
    match response.find("\r\n\r\n") {
        Some(pos) => &response[pos + 4..],
        None => "",
    }
}

fn status_line(response: &str) -> &str {
    response.lines().next().unwrap_or_default()
}

fn header_lines<'a>(response: &'a str, name: &str) -> Vec<&'a str> {
    let prefix = format!("{}: ", name);
    response
        .split("\r\n\r\n")
        .next()
        .unwrap_or_default()
        .split("\r\n")
        .filter_map(|line| line.strip_prefix(prefix.as_str()))
        .collect()
}

// ==================== Wire format ====================

#[test]
fn test_exact_route_wire_format() {
    let router = Router::new();
    router.route("/", |_req| Ok(Response::html("ok")));
    let server = start_with(test_config(), router);

    let response = send_raw(server.local_addr(), b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").unwrap();

    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert_eq!(header_lines(&response, "Content-Length"), vec!["2"]);
    assert_eq!(
        header_lines(&response, "Content-Type"),
        vec!["text/html; charset=utf-8"]
    );
    assert_eq!(header_lines(&response, "Connection"), vec!["close"]);
    assert_eq!(extract_body(&response), "ok");

    server.shutdown();
}

#[test]
fn test_param_route_echo() {
    let router = Router::new();
    router.route_param("/user/<id>", |req| {
        let id = req.route_param("id").unwrap_or_default();
        Ok(Response::text(&format!("id={}", id)))
    });
    let server = start_with(test_config(), router);

    let response = send_raw(server.local_addr(), b"GET /user/42 HTTP/1.1\r\n\r\n").unwrap();
    assert_eq!(extract_body(&response), "id=42");

    server.shutdown();
}

#[test]
fn test_form_post_percent_decoded() {
    let router = Router::new();
    router.route("/submit", |req| {
        let user = req.form_param("username").unwrap_or_default();
        Ok(Response::text(&format!("[{}]", user)))
    });
    let server = start_with(test_config(), router);

    let response = send_raw(
        server.local_addr(),
        b"POST /submit HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 14\r\n\r\nusername=Jo%20",
    )
    .unwrap();
    assert_eq!(extract_body(&response), "[Jo ]");

    server.shutdown();
}

#[test]
fn test_body_split_across_writes() {
    let router = Router::new();
    router.route("/echo", |req| Ok(Response::text(&req.body_string().unwrap_or_default())));
    let server = start_with(test_config(), router);

    let mut stream = TcpStream::connect(server.local_addr()).unwrap();
    stream
        .write_all(b"POST /echo HTTP/1.1\r\nContent-Length: 11\r\n\r\nhello")
        .unwrap();
    thread::sleep(Duration::from_millis(50));
    stream.write_all(b" world").unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    assert_eq!(extract_body(&response), "hello world");

    server.shutdown();
}

#[test]
fn test_cookie_round_trip() {
    let router = Router::new();
    router.route("/cookies", |req| {
        let body = format!(
            "A={} B={}",
            req.cookie("A").unwrap_or_default(),
            req.cookie("B").unwrap_or_default()
        );
        Ok(Response::text(&body)
            .with_cookie("first", "1", &CookieOptions::default())
            .with_cookie("second", "2", &CookieOptions::default().secure(true)))
    });
    let server = start_with(test_config(), router);

    let response = send_raw(
        server.local_addr(),
        b"GET /cookies HTTP/1.1\r\nCookie: A=1; B=two%20words\r\n\r\n",
    )
    .unwrap();

    assert_eq!(extract_body(&response), "A=1 B=two words");
    assert_eq!(
        header_lines(&response, "Set-Cookie"),
        vec![
            "first=1; Path=/; HttpOnly; SameSite=Lax",
            "second=2; Path=/; HttpOnly; Secure; SameSite=Lax",
        ]
    );

    server.shutdown();
}

#[test]
fn test_handler_panic_is_500_and_server_survives() {
    let router = Router::new();
    router.route("/panic", |_req| panic!("handler exploded"));
    router.route("/ok", |_req| Ok(Response::text("still alive")));
    let server = start_with(test_config(), router);
    let addr = server.local_addr();

    let response = get(addr, "/panic");
    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");
    assert!(extract_body(&response).contains("handler exploded"));

    assert_eq!(extract_body(&get(addr, "/ok")), "still alive");

    server.shutdown();
}

// ==================== Demo application ====================

#[test]
fn test_demo_home_page() {
    let server = start_demo();
    let response = get(server.local_addr(), "/");

    assert!(response.contains("200 OK"), "Expected 200 OK, got: {}", response);
    let body = extract_body(&response);
    assert!(body.contains("<title>Bienvenido</title>"));
    assert!(body.contains("<h1>BIENVENIDO</h1>"));
    assert!(body.contains("&lt;b&gt;¡Hola, mundo!&lt;/b&gt;"));
    assert!(body.contains("<li>Elemento 1</li>"));
    assert!(body.contains("<li>Elemento 3</li>"));
    assert!(body.contains("Nota desde la plantilla parcial."));
    assert!(body.contains("<footer>app_server</footer>"));
    assert!(!body.contains("{%"));

    server.shutdown();
}

#[test]
fn test_demo_pages() {
    let server = start_demo();
    let addr = server.local_addr();

    let body = get(addr, "/extend");
    assert!(body.contains("Página con Herencia"));
    assert!(body.contains("Esta página hereda la plantilla base."));
    assert!(body.contains("Pie de página redefinido"));

    assert!(get(addr, "/user/12345").contains("User ID: 12345"));
    assert!(get(addr, "/form").contains("<form"));

    let response = send_raw(
        addr,
        b"POST /submit HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 17\r\n\r\nusername=TestUser",
    )
    .unwrap();
    assert!(extract_body(&response).contains("Hola, TestUser!"));

    server.shutdown();
}

#[test]
fn test_demo_api_data() {
    let server = start_demo();
    let response = get(server.local_addr(), "/api/data");

    assert!(header_lines(&response, "Content-Type")[0].starts_with("application/json"));
    let value: serde_json::Value = serde_json::from_str(extract_body(&response)).unwrap();
    assert_eq!(
        value,
        serde_json::json!({"status": "ok", "message": "Hello from JSON!"})
    );

    server.shutdown();
}

#[test]
fn test_demo_error_and_not_found() {
    let server = start_demo();
    let addr = server.local_addr();

    let response = get(addr, "/error");
    assert_eq!(status_line(&response), "HTTP/1.1 500 Internal Server Error");
    assert!(response.contains("500 Internal Server Error"));

    let response = get(addr, "/nonexistent");
    assert_eq!(status_line(&response), "HTTP/1.1 404 Not Found");
    assert!(extract_body(&response).contains("404 Not Found"));

    server.shutdown();
}

#[test]
fn test_demo_cookies() {
    let server = start_demo();
    let addr = server.local_addr();

    let response = get(addr, "/set_cookie");
    let cookies = header_lines(&response, "Set-Cookie");
    assert_eq!(cookies.len(), 2);
    assert!(cookies[0].starts_with("User=JohnDoe"));
    assert!(cookies[1].starts_with("SessionID=abc123"));

    let response = send_raw(
        addr,
        b"GET /get_cookie HTTP/1.1\r\nCookie: User=JohnDoe\r\n\r\n",
    )
    .unwrap();
    assert!(extract_body(&response).contains("Cookie 'User' = JohnDoe"));

    let response = get(addr, "/delete_cookie");
    assert_eq!(
        header_lines(&response, "Set-Cookie"),
        vec!["User=deleted; Path=/; Expires=Thu, 01 Jan 1970 00:00:00 GMT; HttpOnly"]
    );

    server.shutdown();
}

// ==================== Static files ====================

#[test]
fn test_static_file_serving() {
    let server = start_demo();
    let response = get(server.local_addr(), "/static/js/test.js");

    assert_eq!(status_line(&response), "HTTP/1.1 200 OK");
    assert_eq!(
        header_lines(&response, "Content-Type"),
        vec!["application/javascript"]
    );
    assert_eq!(extract_body(&response), "Hello, Static!");

    server.shutdown();
}

#[test]
fn test_static_traversal_is_rejected() {
    let server = start_demo();
    let addr = server.local_addr();

    for path in ["/static/../Cargo.toml", "/static/%2e%2e/Cargo.toml"] {
        let response = get(addr, path);
        assert_eq!(status_line(&response), "HTTP/1.1 403 Forbidden", "path {}", path);
        assert!(!response.contains("[package]"));
    }

    let response = get(addr, "/static/js/missing.js");
    assert_eq!(status_line(&response), "HTTP/1.1 404 Not Found");

    server.shutdown();
}

// ==================== Hot reload ====================

fn bump_mtime(path: &Path) {
    let file = File::options().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + Duration::from_secs(10))
        .unwrap();
}

#[test]
fn test_hot_reload_end_to_end() {
    let dir = TempDir::new().unwrap();
    let page = dir.path().join("hot_reload_test.html");
    fs::write(&page, "<h1>Original Content</h1>").unwrap();

    let engine = Arc::new(TemplateEngine::new());
    let loader = Arc::new(TemplateLoader::new(Arc::clone(&engine), dir.path()));
    let router = Router::new();
    app::register_routes(&router, &engine);

    let config = Config {
        no_hot_reload: false,
        reload_interval_ms: 50,
        ..test_config()
    };
    let server = Server::new(config, Arc::new(router))
        .with_templates(loader)
        .start()
        .unwrap();
    let addr = server.local_addr();

    assert_eq!(extract_body(&get(addr, "/hot_reload")), "<h1>Original Content</h1>");

    fs::write(&page, "<h1>Updated Content</h1>").unwrap();
    bump_mtime(&page);

    let deadline = Instant::now() + Duration::from_secs(5);
    let mut body = String::new();
    while Instant::now() < deadline {
        body = extract_body(&get(addr, "/hot_reload")).to_string();
        if body.contains("Updated") {
            break;
        }
        thread::sleep(Duration::from_millis(25));
    }
    assert_eq!(body, "<h1>Updated Content</h1>");

    server.shutdown();
}

// ==================== Concurrency ====================

#[test]
fn test_slow_handlers_run_in_parallel() {
    const CLIENTS: usize = 3;

    let arrived = Arc::new(AtomicUsize::new(0));
    let router = Router::new();
    {
        let arrived = Arc::clone(&arrived);
        router.route("/slow", move |_req| {
            arrived.fetch_add(1, Ordering::SeqCst);
            // Espera a que todos los clientes estén dentro del handler
            let deadline = Instant::now() + Duration::from_secs(3);
            while arrived.load(Ordering::SeqCst) < CLIENTS && Instant::now() < deadline {
                thread::sleep(Duration::from_millis(5));
            }
            let together = arrived.load(Ordering::SeqCst) >= CLIENTS;
            Ok(Response::text(if together { "together" } else { "alone" }))
        });
    }

    let config = Config {
        threads_min: CLIENTS,
        threads_max: CLIENTS,
        ..test_config()
    };
    let server = start_with(config, router);
    let addr = server.local_addr();

    let clients: Vec<_> = (0..CLIENTS)
        .map(|_| thread::spawn(move || get(addr, "/slow")))
        .collect();

    for client in clients {
        let response = client.join().unwrap();
        assert_eq!(extract_body(&response), "together");
    }

    server.shutdown();
}

#[test]
fn test_shutdown_drains_in_flight_request() {
    let (started_tx, started_rx) = mpsc::channel();
    let started_tx = std::sync::Mutex::new(started_tx);

    let router = Router::new();
    router.route("/slow", move |_req| {
        let _ = started_tx.lock().unwrap().send(());
        thread::sleep(Duration::from_millis(300));
        Ok(Response::text("finished"))
    });
    let server = start_with(test_config(), router);
    let addr = server.local_addr();

    let client = thread::spawn(move || get(addr, "/slow"));
    started_rx.recv_timeout(Duration::from_secs(5)).unwrap();

    server.shutdown();

    let response = client.join().unwrap();
    assert_eq!(extract_body(&response), "finished");

    // Ya no hay nadie escuchando
    assert!(TcpStream::connect_timeout(&addr, Duration::from_millis(200)).is_err());
}
