//! # Módulo HTTP
//! src/http/mod.rs
//!
//! Subconjunto mínimo de HTTP/1.0 que necesita un servidor de archivos:
//!
//! - Lectura incremental del head del request
//! - Parsing de la request line (método, target, versión)
//! - Construcción de responses con `Connection: close`
//! - Códigos de estado y tabla de tipos MIME
//!
//! No se parsean headers, no hay keep-alive ni chunked encoding: una conexión
//! recibe como mucho una respuesta y se cierra.
//!
//! ### Formato de Request
//!
//! ```text
//! GET /path HTTP/1.0\r\n
//! Header-Name: Header-Value\r\n     <- ignorado
//! \r\n
//! ```

pub mod mime;
pub mod reader;
pub mod request;
pub mod response;
pub mod status;

pub use request::{Method, RequestLine};
pub use response::Response;
pub use status::StatusCode;
