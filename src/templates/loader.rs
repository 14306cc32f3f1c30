//! # Carga y Hot Reload de Plantillas
//! src/templates/loader.rs
//!
//! Instala en el motor cada `*.html` de un directorio (con el nombre del
//! archivo como clave) y guarda su fecha de modificación. El hot reload
//! es un hilo que cada `interval` vuelve a listar el directorio y
//! reinstala los archivos nuevos o cuya fecha cambió. Los archivos
//! borrados siguen instalados.

use super::engine::TemplateEngine;
use crate::error::TemplateError;
use std::collections::HashMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime};
use tracing::{debug, info, warn};

/// Intervalo de polling por defecto
pub const DEFAULT_RELOAD_INTERVAL: Duration = Duration::from_secs(2);

/// Sincroniza un directorio de plantillas con un `TemplateEngine`
pub struct TemplateLoader {
    engine: Arc<TemplateEngine>,
    dir: PathBuf,
    /// path → última fecha de modificación vista
    timestamps: Mutex<HashMap<PathBuf, SystemTime>>,
}

impl TemplateLoader {
    pub fn new(engine: Arc<TemplateEngine>, dir: impl Into<PathBuf>) -> Self {
        Self {
            engine,
            dir: dir.into(),
            timestamps: Mutex::new(HashMap::new()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn engine(&self) -> &Arc<TemplateEngine> {
        &self.engine
    }

    /// Carga inicial: instala todas las plantillas del directorio
    ///
    /// Retorna cuántas se instalaron.
    pub fn load_all(&self) -> Result<usize, TemplateError> {
        let loaded = self.sync(true)?;
        info!(dir = %self.dir.display(), count = loaded, "Templates loaded");
        Ok(loaded)
    }

    /// Reinstala solo las plantillas nuevas o modificadas
    pub fn reload_changed(&self) -> Result<usize, TemplateError> {
        self.sync(false)
    }

    fn sync(&self, force: bool) -> Result<usize, TemplateError> {
        if !self.dir.is_dir() {
            return Err(TemplateError::DirectoryNotFound(self.dir.clone()));
        }

        let entries = fs::read_dir(&self.dir).map_err(|source| TemplateError::Io {
            path: self.dir.clone(),
            source,
        })?;

        let mut installed = 0;
        for entry in entries {
            let path = match entry {
                Ok(entry) => entry.path(),
                Err(err) => {
                    warn!(dir = %self.dir.display(), error = %err, "Failed to read directory entry");
                    continue;
                }
            };
            if !is_template_file(&path) {
                continue;
            }

            match self.sync_file(&path, force) {
                Ok(true) => installed += 1,
                Ok(false) => {}
                Err(err) => warn!(error = %err, "Failed to load template"),
            }
        }

        Ok(installed)
    }

    /// Instala `path` si cambió (o siempre, con `force`)
    fn sync_file(&self, path: &Path, force: bool) -> Result<bool, TemplateError> {
        let io_err = |source: io::Error| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        };

        let modified = fs::metadata(path).and_then(|m| m.modified()).map_err(io_err)?;

        let changed = {
            let timestamps = self.timestamps.lock().unwrap_or_else(PoisonError::into_inner);
            timestamps.get(path) != Some(&modified)
        };
        if !force && !changed {
            return Ok(false);
        }

        let source = fs::read_to_string(path).map_err(io_err)?;
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            return Ok(false);
        };

        let was_known = self.engine.has_template(name);
        self.engine.set_template(name, &source);
        self.timestamps
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(path.to_path_buf(), modified);

        if force || !was_known {
            debug!(template = name, "Loaded template");
        } else {
            info!(template = name, "Template reloaded");
        }
        Ok(true)
    }

    /// Lanza el hilo de hot reload
    pub fn spawn_hot_reload(self: Arc<Self>, interval: Duration) -> io::Result<HotReloader> {
        let (stop, stop_rx) = mpsc::channel();

        let handle = thread::Builder::new()
            .name("template-reloader".to_string())
            .spawn(move || {
                info!(dir = %self.dir.display(), interval_ms = interval.as_millis() as u64, "Hot reload enabled");
                while wait_for_tick(&stop_rx, interval) {
                    if let Err(err) = self.reload_changed() {
                        warn!(error = %err, "Hot reload scan failed");
                    }
                }
                debug!("Hot reload stopped");
            })?;

        Ok(HotReloader {
            stop: Some(stop),
            handle: Some(handle),
        })
    }
}

/// Espera `interval` o la señal de parada; `true` si toca escanear
///
/// El canal se despierta en cuanto llega la señal (o se suelta el
/// `Sender`), sin importar lo largo del intervalo.
fn wait_for_tick(stop: &Receiver<()>, interval: Duration) -> bool {
    matches!(stop.recv_timeout(interval), Err(RecvTimeoutError::Timeout))
}

fn is_template_file(path: &Path) -> bool {
    path.is_file() && path.extension().is_some_and(|ext| ext == "html")
}

/// Handle del hilo de hot reload; al soltarlo se detiene y se espera
pub struct HotReloader {
    stop: Option<Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl HotReloader {
    /// Detiene el hilo y espera a que termine
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        if let Some(stop) = self.stop.take() {
            // Si el hilo ya terminó el envío falla y no importa
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Hot reload thread panicked");
            }
        }
    }
}

impl Drop for HotReloader {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::templates::Context;
    use std::fs::File;
    use std::time::Instant;
    use tempfile::TempDir;

    fn write(dir: &Path, name: &str, content: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, content).unwrap();
        path
    }

    /// Fuerza una fecha de modificación distinta sin depender del reloj del FS
    fn bump_mtime(path: &Path, secs: u64) {
        let file = File::options().write(true).open(path).unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(secs)).unwrap();
    }

    fn loader_for(dir: &TempDir) -> TemplateLoader {
        TemplateLoader::new(Arc::new(TemplateEngine::new()), dir.path())
    }

    #[test]
    fn test_load_all_only_html() {
        let dir = TempDir::new().unwrap();
        write(dir.path(), "main.html", "<h1>{{ title }}</h1>");
        write(dir.path(), "notes.txt", "ignored");
        fs::create_dir(dir.path().join("nested.html")).unwrap();

        let loader = loader_for(&dir);
        assert_eq!(loader.load_all().unwrap(), 1);
        assert_eq!(loader.engine().template_names(), vec!["main.html".to_string()]);

        let ctx = Context::new().with("title", "Hola");
        assert_eq!(loader.engine().render("main.html", &ctx), "<h1>Hola</h1>");
    }

    #[test]
    fn test_missing_directory() {
        let loader = TemplateLoader::new(Arc::new(TemplateEngine::new()), "/definitely/not/here");
        assert!(matches!(loader.load_all(), Err(TemplateError::DirectoryNotFound(_))));
    }

    #[test]
    fn test_reload_changed_picks_up_edits_and_new_files() {
        let dir = TempDir::new().unwrap();
        let page = write(dir.path(), "page.html", "v1");

        let loader = loader_for(&dir);
        loader.load_all().unwrap();
        assert_eq!(loader.reload_changed().unwrap(), 0);

        fs::write(&page, "v2").unwrap();
        bump_mtime(&page, 10);
        write(dir.path(), "extra.html", "new");

        assert_eq!(loader.reload_changed().unwrap(), 2);
        assert_eq!(loader.engine().render("page.html", &Context::new()), "v2");
        assert_eq!(loader.engine().render("extra.html", &Context::new()), "new");
    }

    #[test]
    fn test_deleted_files_stay_installed() {
        let dir = TempDir::new().unwrap();
        let page = write(dir.path(), "gone.html", "still here");

        let loader = loader_for(&dir);
        loader.load_all().unwrap();
        fs::remove_file(&page).unwrap();

        assert_eq!(loader.reload_changed().unwrap(), 0);
        assert_eq!(loader.engine().render("gone.html", &Context::new()), "still here");
    }

    #[test]
    fn test_hot_reload_thread() {
        let dir = TempDir::new().unwrap();
        let page = write(dir.path(), "hot_reload_test.html", "<h1>Original Content</h1>");

        let loader = Arc::new(loader_for(&dir));
        loader.load_all().unwrap();
        let engine = Arc::clone(loader.engine());
        let reloader = Arc::clone(&loader)
            .spawn_hot_reload(Duration::from_millis(50))
            .unwrap();

        fs::write(&page, "<h1>Updated Content</h1>").unwrap();
        bump_mtime(&page, 10);

        let deadline = Instant::now() + Duration::from_secs(5);
        let mut rendered = String::new();
        while Instant::now() < deadline {
            rendered = engine.render("hot_reload_test.html", &Context::new());
            if rendered.contains("Updated") {
                break;
            }
            thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(rendered, "<h1>Updated Content</h1>");

        let started = Instant::now();
        reloader.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_wait_for_tick() {
        let (tx, rx) = mpsc::channel();
        assert!(wait_for_tick(&rx, Duration::from_millis(10)));

        tx.send(()).unwrap();
        assert!(!wait_for_tick(&rx, Duration::from_secs(60)));

        drop(tx);
        assert!(!wait_for_tick(&rx, Duration::from_secs(60)));
    }

    #[test]
    fn test_stop_does_not_wait_for_long_interval() {
        let dir = TempDir::new().unwrap();
        let loader = Arc::new(loader_for(&dir));
        let reloader = loader.spawn_hot_reload(Duration::from_secs(60)).unwrap();

        let started = Instant::now();
        reloader.stop();
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn test_drop_stops_thread() {
        let dir = TempDir::new().unwrap();
        let loader = Arc::new(loader_for(&dir));
        let reloader = Arc::clone(&loader)
            .spawn_hot_reload(Duration::from_secs(60))
            .unwrap();

        let started = Instant::now();
        drop(reloader);
        assert!(started.elapsed() < Duration::from_secs(1));
        // El hilo soltó su referencia al loader
        assert_eq!(Arc::strong_count(&loader), 1);
    }
}
