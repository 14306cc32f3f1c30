//! # Servidor TCP Concurrente
//! src/server/tcp.rs
//!
//! El loop de `accept` corre como una tarea más del pool (prioridad 0, la
//! más alta) y reserva un worker para sí: el pool se crea con un hilo
//! extra sobre los límites configurados. Cada conexión aceptada se
//! clasifica mirando (`peek`) el método de la request line y se encola
//! con la prioridad de ese método.

use crate::config::Config;
use crate::error::{PoolError, ServerError};
use crate::http::{read_request, Method, ParseError, Request, Response, StatusCode, ACCEPT_PRIORITY};
use crate::router::Router;
use crate::templates::{HotReloader, TemplateLoader};
use crate::workers::ThreadPool;
use socket2::{Domain, Protocol, Socket, Type};
use std::io::{self, Write};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Backlog de `listen`
pub const LISTEN_BACKLOG: i32 = 100;

/// Bytes que se miran para reconocer el método
const PEEK_BYTES: usize = 4096;

/// Pausa entre `peek` mientras el método llega incompleto
const METHOD_POLL: Duration = Duration::from_millis(5);

/// Timeout de la conexión que despierta a `accept` al detener
const WAKE_TIMEOUT: Duration = Duration::from_secs(1);

/// Servidor HTTP/1.1 con pool de workers por prioridad
pub struct Server {
    config: Config,
    router: Arc<Router>,
    loader: Option<Arc<TemplateLoader>>,
}

impl Server {
    pub fn new(config: Config, router: Arc<Router>) -> Self {
        Self {
            config,
            router,
            loader: None,
        }
    }

    /// Carga las plantillas al arrancar (y las recarga si hay hot reload)
    pub fn with_templates(mut self, loader: Arc<TemplateLoader>) -> Self {
        self.loader = Some(loader);
        self
    }

    /// Arranca el servidor sin bloquear
    ///
    /// Solo fallan aquí los errores de arranque: configuración inválida,
    /// dirección inválida, `bind`/`listen`, o la creación del pool y sus
    /// hilos. La configuración se valida antes de abrir el socket.
    pub fn start(self) -> Result<RunningServer, ServerError> {
        self.config.validate()?;
        let listener = bind_listener(&self.config.address())?;
        let local_addr = listener.local_addr()?;
        info!(address = %local_addr, "Server listening");

        let reloader = match &self.loader {
            Some(loader) => {
                // Sin plantillas el servidor igual sirve rutas y estáticos
                if let Err(e) = loader.load_all() {
                    warn!(error = %e, "Templates not loaded");
                }
                if self.config.hot_reload() {
                    Some(Arc::clone(loader).spawn_hot_reload(self.config.reload_interval())?)
                } else {
                    None
                }
            }
            None => None,
        };

        let pool = ThreadPool::with_idle_timeout(
            self.config.threads_min + 1,
            self.config.threads_max + 1,
            self.config.idle_timeout(),
        )?;

        let running = Arc::new(AtomicBool::new(true));
        let (done_tx, accept_done) = mpsc::channel();

        let acceptor = Acceptor {
            listener,
            running: Arc::clone(&running),
            router: Arc::clone(&self.router),
            pool: pool.clone(),
            read_timeout: self.config.read_timeout(),
        };
        pool.execute(ACCEPT_PRIORITY, move || {
            acceptor.run();
            let _ = done_tx.send(());
        })?;

        Ok(RunningServer {
            local_addr,
            stop: StopHandle {
                running,
                addr: local_addr,
            },
            pool,
            reloader,
            accept_done,
        })
    }

    /// Arranca y bloquea hasta que alguien use el `StopHandle`
    pub fn run(self) -> Result<(), ServerError> {
        self.start()?.wait();
        Ok(())
    }
}

/// Crea el socket de escucha: `SO_REUSEADDR`, `bind`, `listen(100)`
fn bind_listener(address: &str) -> Result<TcpListener, ServerError> {
    let addr: SocketAddr = address
        .parse()
        .map_err(|_| ServerError::InvalidAddress(address.to_string()))?;

    let bind_err = |source: io::Error| ServerError::Bind {
        addr: address.to_string(),
        source,
    };

    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))
        .map_err(bind_err)?;
    socket.set_reuse_address(true).map_err(bind_err)?;
    socket.bind(&addr.into()).map_err(bind_err)?;
    socket.listen(LISTEN_BACKLOG).map_err(bind_err)?;

    Ok(socket.into())
}

/// Estado de la tarea de `accept`
struct Acceptor {
    listener: TcpListener,
    running: Arc<AtomicBool>,
    router: Arc<Router>,
    pool: ThreadPool,
    read_timeout: Duration,
}

impl Acceptor {
    fn run(self) {
        debug!("Accept loop started");
        for stream in self.listener.incoming() {
            if !self.running.load(Ordering::SeqCst) {
                break;
            }
            match stream {
                Ok(stream) => self.enqueue(stream),
                Err(e) => error!(error = %e, "Failed to accept connection"),
            }
        }
        debug!("Accept loop stopped");
    }

    /// Clasifica la conexión y la encola en el pool
    fn enqueue(&self, mut stream: TcpStream) {
        let peer = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown".to_string());

        if let Err(e) = stream.set_read_timeout(Some(self.read_timeout)) {
            warn!(peer = %peer, error = %e, "Could not set read timeout");
        }

        let priority = classify(&stream, self.read_timeout);
        let router = Arc::clone(&self.router);
        let task_peer = peer.clone();

        let Ok(task_stream) = stream.try_clone() else {
            warn!(peer = %peer, "Could not clone connection");
            return;
        };

        let queued = self.pool.execute(priority, move || {
            if let Err(e) = handle_connection(task_stream, &router, &task_peer, priority) {
                debug!(peer = %task_peer, error = %e, "Connection closed with error");
            }
        });

        if let Err(PoolError::ShutDown) = queued {
            let unavailable = Response::new(StatusCode::ServiceUnavailable)
                .with_body("<h1>503 Service Unavailable</h1>");
            let _ = stream.write_all(&unavailable.to_bytes());
        } else if let Err(e) = queued {
            warn!(peer = %peer, error = %e, "Could not enqueue connection");
        }
    }
}

/// Prioridad de la conexión según el método de su request line
///
/// `peek` devuelve lo que haya llegado aunque el método venga partido en
/// varios segmentos, así que se vuelve a mirar hasta ver el espacio que lo
/// termina, el cierre del peer, el buffer lleno o el vencimiento de
/// `timeout`. Con lo que haya hasta entonces se decide; sin bytes la
/// conexión se encola como "otro método" y el worker se encarga de cerrarla.
fn classify(stream: &TcpStream, timeout: Duration) -> u8 {
    let deadline = Instant::now() + timeout;
    let mut head = [0u8; PEEK_BYTES];
    let mut n = 0;

    loop {
        match stream.peek(&mut head) {
            Ok(0) => break,
            Ok(read) => {
                n = read;
                if n == PEEK_BYTES || head[..n].iter().any(|b| b.is_ascii_whitespace()) {
                    break;
                }
            }
            Err(_) => break,
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(METHOD_POLL);
    }

    Method::sniff(&head[..n]).priority()
}

/// Lee, despacha y responde una request; la conexión se cierra al soltar
/// el stream
fn handle_connection(
    mut stream: TcpStream,
    router: &Router,
    peer: &str,
    priority: u8,
) -> io::Result<()> {
    let start = Instant::now();

    let raw = read_request(&mut stream)?;
    let mut request = match Request::parse(&raw) {
        Ok(request) => request,
        Err(ParseError::EmptyRequest) => {
            debug!(peer, "Peer closed without sending a request");
            return Ok(());
        }
    };

    let response = router.dispatch(&mut request);
    stream.write_all(&response.to_bytes())?;
    stream.flush()?;

    info!(
        peer,
        priority,
        method = %request.method(),
        path = request.path(),
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Request served"
    );
    Ok(())
}

/// Handle clonable para detener el servidor desde otro hilo
#[derive(Clone)]
pub struct StopHandle {
    running: Arc<AtomicBool>,
    addr: SocketAddr,
}

impl StopHandle {
    /// Baja el flag y despierta a `accept` con una conexión propia
    ///
    /// Es idempotente.
    pub fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }
        info!("Stopping server");
        if let Err(e) = TcpStream::connect_timeout(&wake_address(self.addr), WAKE_TIMEOUT) {
            warn!(error = %e, "Could not wake accept loop");
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Dirección a la que conectarse para despertar a `accept`
fn wake_address(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

/// Servidor en ejecución
pub struct RunningServer {
    local_addr: SocketAddr,
    stop: StopHandle,
    pool: ThreadPool,
    reloader: Option<HotReloader>,
    accept_done: Receiver<()>,
}

impl RunningServer {
    /// Dirección real de escucha (útil con `--port 0`)
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    /// Bloquea hasta que el loop de `accept` termine y luego apaga el
    /// hot reload y el pool, esperando a los handlers en curso
    pub fn wait(self) {
        // Un Err significa que la tarea de accept terminó sin avisar
        let _ = self.accept_done.recv();

        if let Some(reloader) = self.reloader {
            reloader.stop();
        }
        self.pool.shutdown();
        info!("Server stopped");
    }

    /// Detiene y espera
    pub fn shutdown(self) {
        self.stop.stop();
        self.wait();
    }
}
