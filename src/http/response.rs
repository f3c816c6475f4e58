//! # Construcción de Respuestas HTTP
//! src/http/response.rs
//!
//! Toda respuesta del servidor tiene la misma forma:
//!
//! ```text
//! HTTP/1.0 200 OK\r\n
//! Content-Type: text/html\r\n
//! Content-Length: 13\r\n
//! Connection: close\r\n
//! \r\n
//! <h1>Hola</h1>
//! ```
//!
//! Los headers salen siempre en este orden. `Content-Length` siempre se
//! deriva del body.
//!
//! ## Ejemplo de uso
//!
//! ```
//! use static_server::http::{Response, StatusCode};
//!
//! let response = Response::new(StatusCode::Ok)
//!     .with_content_type("text/plain")
//!     .with_body(b"hello".to_vec());
//!
//! let head = response.head_bytes();
//! assert!(head.starts_with(b"HTTP/1.0 200 OK\r\n"));
//! ```

use super::StatusCode;
use std::io::{self, Write};

/// Body fijo para 400
pub const BAD_REQUEST_BODY: &str = "<h1>400 Bad Request</h1>";
/// Body fijo para 404
pub const NOT_FOUND_BODY: &str = "<h1>404 Not Found</h1>";
/// Body fijo para 405
pub const METHOD_NOT_ALLOWED_BODY: &str = "<h1>405 Not Allowed</h1>";

/// Representa una respuesta HTTP/1.0 completa
#[derive(Debug, Clone)]
pub struct Response {
    status: StatusCode,
    content_type: String,
    body: Vec<u8>,
}

impl Response {
    /// Crea una respuesta vacía con `application/octet-stream`
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            content_type: super::mime::DEFAULT_CONTENT_TYPE.to_string(),
            body: Vec::new(),
        }
    }

    /// Respuesta de error con el body HTML fijo del código
    ///
    /// # Ejemplo
    /// ```
    /// use static_server::http::{Response, StatusCode};
    ///
    /// let response = Response::error(StatusCode::NotFound);
    /// assert_eq!(response.body(), b"<h1>404 Not Found</h1>");
    /// assert_eq!(response.content_type(), "text/html");
    /// ```
    pub fn error(status: StatusCode) -> Self {
        let body = match status {
            StatusCode::BadRequest => BAD_REQUEST_BODY,
            StatusCode::MethodNotAllowed => METHOD_NOT_ALLOWED_BODY,
            StatusCode::NotFound => NOT_FOUND_BODY,
            StatusCode::Ok => "",
        };
        Self::new(status)
            .with_content_type("text/html")
            .with_body(body.as_bytes().to_vec())
    }

    pub fn with_content_type(mut self, content_type: &str) -> Self {
        self.content_type = content_type.to_string();
        self
    }

    pub fn with_body(mut self, body: Vec<u8>) -> Self {
        self.body = body;
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Siempre igual a `body().len()`
    pub fn content_length(&self) -> usize {
        self.body.len()
    }

    /// Status line + headers + línea vacía
    pub fn head_bytes(&self) -> Vec<u8> {
        format!(
            "HTTP/1.0 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            self.status,
            self.content_type,
            self.content_length()
        )
        .into_bytes()
    }

    /// Escribe head y body completos, en orden
    ///
    /// `write_all` reintenta las escrituras parciales (e `Interrupted`) hasta
    /// terminar o hasta que el stream reporte un error.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        writer.write_all(&self.head_bytes())?;
        writer.write_all(&self.body)?;
        writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn to_bytes(response: &Response) -> Vec<u8> {
        let mut out = Vec::new();
        response.write_to(&mut out).unwrap();
        out
    }

    #[test]
    fn test_new_response() {
        let response = Response::new(StatusCode::Ok);
        assert_eq!(response.status(), StatusCode::Ok);
        assert_eq!(response.content_type(), "application/octet-stream");
        assert!(response.body().is_empty());
        assert_eq!(response.content_length(), 0);
    }

    #[test]
    fn test_error_bodies() {
        let response = Response::error(StatusCode::MethodNotAllowed);
        assert_eq!(response.body(), METHOD_NOT_ALLOWED_BODY.as_bytes());
        assert_eq!(response.content_length(), METHOD_NOT_ALLOWED_BODY.len());

        let response = Response::error(StatusCode::BadRequest);
        assert_eq!(response.body(), BAD_REQUEST_BODY.as_bytes());
    }

    #[test]
    fn test_header_order() {
        let response = Response::new(StatusCode::Ok)
            .with_content_type("text/plain")
            .with_body(b"Test".to_vec());

        let text = String::from_utf8(to_bytes(&response)).unwrap();
        assert_eq!(
            text,
            "HTTP/1.0 200 OK\r\nContent-Type: text/plain\r\nContent-Length: 4\r\nConnection: close\r\n\r\nTest"
        );
    }

    #[test]
    fn test_head_ends_with_blank_line() {
        let response = Response::error(StatusCode::NotFound);
        let text = String::from_utf8(response.head_bytes()).unwrap();
        assert!(text.ends_with("Content-Length: 22\r\nConnection: close\r\n\r\n"));
    }

    #[test]
    fn test_binary_body() {
        let binary = vec![0x89, 0x50, 0x4E, 0x47, 0x00, 0xFF];
        let response = Response::new(StatusCode::Ok)
            .with_content_type("image/png")
            .with_body(binary.clone());

        let bytes = to_bytes(&response);
        assert!(bytes.ends_with(&binary));
        assert_eq!(response.content_length(), 6);
    }

    /// Writer que acepta como mucho 3 bytes por llamada
    struct Trickle(Vec<u8>);

    impl Write for Trickle {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(3);
            self.0.extend_from_slice(&buf[..n]);
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_write_to_survives_partial_writes() {
        let response = Response::error(StatusCode::NotFound);
        let mut out = Trickle(Vec::new());
        response.write_to(&mut out).unwrap();
        assert_eq!(out.0, to_bytes(&response));
    }
}
