//! # Códigos de Estado HTTP
//! src/http/status.rs
//!
//! Códigos de estado HTTP/1.0 que puede emitir el servidor de archivos:
//!
//! - **2xx**: Éxito (200 OK)
//! - **4xx**: Error del cliente (400, 404, 405)
//!
//! No hay códigos 5xx: cualquier fallo interno termina cerrando la conexión
//! sin respuesta.

/// Representa los códigos de estado HTTP que soporta nuestro servidor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StatusCode {
    /// 200 OK - El recurso existe y se envía completo
    Ok = 200,

    /// 400 Bad Request - Request line malformada o demasiado larga
    BadRequest = 400,

    /// 404 Not Found - Recurso inexistente, ilegible o fuera del content root
    NotFound = 404,

    /// 405 Method Not Allowed - Cualquier método distinto de GET
    MethodNotAllowed = 405,
}

impl StatusCode {
    /// Convierte el código a su valor numérico
    ///
    /// # Ejemplo
    /// ```
    /// use static_server::http::StatusCode;
    /// assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
    /// ```
    pub fn as_u16(&self) -> u16 {
        *self as u16
    }

    /// Retorna el texto de razón (reason phrase) asociado al código
    ///
    /// # Ejemplo
    /// ```
    /// use static_server::http::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::NotFound.reason_phrase(), "Not Found");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::NotFound => "Not Found",
            StatusCode::MethodNotAllowed => "Method Not Allowed",
        }
    }

}

impl std::fmt::Display for StatusCode {
    /// Formato: "200 OK"
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.as_u16(), self.reason_phrase())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_code_values() {
        assert_eq!(StatusCode::Ok.as_u16(), 200);
        assert_eq!(StatusCode::BadRequest.as_u16(), 400);
        assert_eq!(StatusCode::NotFound.as_u16(), 404);
        assert_eq!(StatusCode::MethodNotAllowed.as_u16(), 405);
    }

    #[test]
    fn test_reason_phrases() {
        assert_eq!(StatusCode::BadRequest.reason_phrase(), "Bad Request");
        assert_eq!(StatusCode::MethodNotAllowed.reason_phrase(), "Method Not Allowed");
    }

    #[test]
    fn test_display() {
        assert_eq!(StatusCode::Ok.to_string(), "200 OK");
        assert_eq!(StatusCode::MethodNotAllowed.to_string(), "405 Method Not Allowed");
    }
}
