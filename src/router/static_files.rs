//! # Archivos Estáticos
//! src/router/static_files.rs
//!
//! Sirve `GET /static/<ruta>` desde un directorio raíz. El tipo de
//! contenido sale de una tabla chica de extensiones; lo desconocido es
//! `text/plain`.

use crate::error::StaticFileError;
use crate::http::request::url_decode;
use crate::http::{Response, StatusCode};
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, warn};

/// Prefijo de URL que se resuelve contra la raíz estática
pub const STATIC_PREFIX: &str = "/static/";

/// Content-Type según la extensión del archivo
///
/// # Ejemplo
/// ```
/// use app_server::router::static_files::content_type_for;
/// use std::path::Path;
///
/// assert_eq!(content_type_for(Path::new("js/app.js")), "application/javascript");
/// assert_eq!(content_type_for(Path::new("notes.md")), "text/plain");
/// ```
pub fn content_type_for(path: &Path) -> &'static str {
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase());

    match extension.as_deref() {
        Some("html") => "text/html",
        Some("css") => "text/css",
        Some("js") => "application/javascript",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        _ => "text/plain",
    }
}

/// Directorio servido bajo `/static/`
#[derive(Debug, Clone)]
pub struct StaticFiles {
    root: PathBuf,
}

impl StaticFiles {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Intenta servir `request_path`
    ///
    /// `None` si el path no empieza con `/static/` o el archivo no existe,
    /// para que el router responda 404. Un intento de salir de la raíz
    /// devuelve 403.
    pub fn serve(&self, request_path: &str) -> Option<Response> {
        let tail = request_path.strip_prefix(STATIC_PREFIX)?;

        let path = match self.resolve_path(tail) {
            Ok(path) => path,
            Err(StaticFileError::Forbidden(reason)) => {
                warn!(path = request_path, %reason, "Rejected static file request");
                return Some(
                    Response::new(StatusCode::Forbidden).with_body("<h1>403 Forbidden</h1>"),
                );
            }
            Err(err) => {
                debug!(path = request_path, error = %err, "Static file not served");
                return None;
            }
        };

        match fs::read(&path) {
            Ok(bytes) => Some(
                Response::new(StatusCode::Ok)
                    .with_content_type(content_type_for(&path))
                    .with_body_bytes(bytes),
            ),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "Failed to read static file");
                None
            }
        }
    }

    /// Resuelve la cola de la URL a un archivo dentro de la raíz
    pub fn resolve_path(&self, tail: &str) -> Result<PathBuf, StaticFileError> {
        let decoded = url_decode(tail);
        let relative = decoded.trim_start_matches('/');

        for component in Path::new(relative).components() {
            match component {
                Component::Normal(_) | Component::CurDir => {}
                _ => {
                    return Err(StaticFileError::Forbidden(
                        "directory traversal not allowed".to_string(),
                    ))
                }
            }
        }

        let full_path = self.root.join(relative);
        let canonical = full_path
            .canonicalize()
            .map_err(|_| StaticFileError::NotFound(tail.to_string()))?;
        let canonical_root = self.root.canonicalize()?;

        // Un symlink dentro de la raíz puede apuntar afuera
        if !canonical.starts_with(&canonical_root) {
            return Err(StaticFileError::Forbidden(
                "path escapes static root".to_string(),
            ));
        }

        if !canonical.is_file() {
            return Err(StaticFileError::NotFound(tail.to_string()));
        }

        Ok(canonical)
    }
}
