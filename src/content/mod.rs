//! # Resolución de Recursos
//! src/content/mod.rs
//!
//! Mapea el `target` de un request a un archivo dentro del content root.
//!
//! - `/` se sirve desde el recurso índice (`<root>/index.html` por defecto)
//! - cualquier otro target se resuelve como `<root>/<target>`
//!
//! Antes de tocar el disco el target se limpia: se descartan query y
//! fragmento, se decodifican los `%XX` y se normalizan los segmentos `.` y
//! `..`. Un target que intenta salir del root (lexicamente o a través de un
//! symlink) nunca se abre.

use crate::http::mime::content_type_for;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("target {target:?} escapes the content root")]
    OutsideRoot { target: String },

    #[error("target {target:?} is not a valid path")]
    BadTarget { target: String },

    #[error("{} is not a regular file", path.display())]
    NotAFile { path: PathBuf },

    #[error("cannot read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Archivo leído y listo para enviarse
#[derive(Debug, Clone)]
pub struct Resource {
    pub content_type: &'static str,
    pub body: Vec<u8>,
}

/// Directorio base contra el que se resuelven todos los targets
#[derive(Debug, Clone)]
pub struct ContentRoot {
    root: PathBuf,
    index: String,
}

impl ContentRoot {
    pub fn new(root: impl Into<PathBuf>, index: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            index: index.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resuelve un target a un path dentro del root, sin acceder al disco
    ///
    /// # Ejemplo
    /// ```
    /// use static_server::content::ContentRoot;
    /// use std::path::Path;
    ///
    /// let root = ContentRoot::new("www", "index.html");
    /// assert_eq!(root.resolve("/").unwrap(), Path::new("www/index.html"));
    /// assert_eq!(root.resolve("/css/../app.js?v=2").unwrap(), Path::new("www/app.js"));
    /// assert!(root.resolve("/../etc/passwd").is_err());
    /// ```
    pub fn resolve(&self, target: &str) -> Result<PathBuf, ResolveError> {
        let path_part = target.split(&['?', '#'][..]).next().unwrap_or_default();

        if path_part == "/" {
            return Ok(self.root.join(&self.index));
        }

        // Un escape que no forma UTF-8 no puede nombrar un archivo servible
        let decoded = urlencoding::decode(path_part).map_err(|_| ResolveError::BadTarget {
            target: target.to_string(),
        })?;

        let mut segments: Vec<&str> = Vec::new();
        for segment in decoded.split('/') {
            match segment {
                "" | "." => {}
                ".." => {
                    if segments.pop().is_none() {
                        return Err(ResolveError::OutsideRoot {
                            target: target.to_string(),
                        });
                    }
                }
                s if s.contains('\0') || s.contains('\\') => {
                    return Err(ResolveError::BadTarget {
                        target: target.to_string(),
                    });
                }
                s => segments.push(s),
            }
        }

        let mut path = self.root.clone();
        path.extend(segments);
        Ok(path)
    }

    /// Resuelve y lee el recurso completo
    pub fn load(&self, target: &str) -> Result<Resource, ResolveError> {
        let path = self.resolve(target)?;

        let io_err = |path: &Path, source: io::Error| ResolveError::Io {
            path: path.to_path_buf(),
            source,
        };

        // Los symlinks pueden apuntar fuera del root aunque el path sea limpio
        let canonical_root = self.root.canonicalize().map_err(|e| io_err(&self.root, e))?;
        let canonical = path.canonicalize().map_err(|e| io_err(&path, e))?;
        if !canonical.starts_with(&canonical_root) {
            return Err(ResolveError::OutsideRoot {
                target: target.to_string(),
            });
        }

        let metadata = fs::metadata(&canonical).map_err(|e| io_err(&path, e))?;
        if !metadata.is_file() {
            return Err(ResolveError::NotAFile { path });
        }

        let body = fs::read(&canonical).map_err(|e| io_err(&path, e))?;
        Ok(Resource {
            content_type: content_type_for(&path),
            body,
        })
    }
}
