//! # Tipos MIME
//! src/http/mime.rs
//!
//! Tabla fija sufijo → Content-Type. Cualquier extensión desconocida (o la
//! ausencia de extensión) cae en `application/octet-stream`.

use std::path::Path;

/// Content-Type por defecto para extensiones desconocidas
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

const TABLE: &[(&str, &str)] = &[
    (".html", "text/html"),
    (".css", "text/css"),
    (".js", "application/javascript"),
    (".txt", "text/plain"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
];

/// Deriva el Content-Type a partir del sufijo del path resuelto
///
/// # Ejemplo
/// ```
/// use static_server::http::mime::content_type_for;
/// use std::path::Path;
///
/// assert_eq!(content_type_for(Path::new("www/index.html")), "text/html");
/// assert_eq!(content_type_for(Path::new("www/photo.jpeg")), "image/jpeg");
/// assert_eq!(content_type_for(Path::new("www/archive.tar")), "application/octet-stream");
/// ```
pub fn content_type_for(path: &Path) -> &'static str {
    let name = match path.file_name().and_then(|n| n.to_str()) {
        Some(name) => name,
        None => return DEFAULT_CONTENT_TYPE,
    };

    TABLE
        .iter()
        .find(|(suffix, _)| name.ends_with(suffix))
        .map(|(_, mime)| *mime)
        .unwrap_or(DEFAULT_CONTENT_TYPE)
}
