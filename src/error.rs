//! Error types shared across the service.
//!
//! Domain code raises typed kinds; the HTTP layer is the single place
//! that maps kinds to status codes and a `{code, message}` body.

use diesel_async::pooled_connection::deadpool::PoolError;

/// Service-wide error type.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// A source, feature, or COMID that does not exist.
    #[error("{0}")]
    NotFound(String),

    /// A request parameter that failed validation.
    #[error("{0}")]
    InvalidInput(String),

    /// The connection pool could not produce a session in time.
    #[error("database unavailable: {0}")]
    DatabaseUnavailable(String),

    /// The remote geoprocessing service answered with an error.
    #[error("remote service error ({status}): {message}")]
    RemoteService { status: u16, message: String },

    /// The remote geoprocessing service did not answer in time.
    #[error("remote service timed out")]
    RemoteTimeout,

    /// PostGIS produced no usable geometry.
    #[error("geometry error: {0}")]
    Geometry(String),

    /// The configuration file or environment is unusable.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Anything else; details stay in the logs.
    #[error("{0}")]
    Internal(String),
}

impl Error {
    /// Stable machine-readable code emitted on the wire.
    pub fn code(&self) -> &'static str {
        match self {
            Error::NotFound(_) => "NotFound",
            Error::InvalidInput(_) => "InvalidInput",
            Error::DatabaseUnavailable(_) => "DatabaseUnavailable",
            Error::RemoteService { .. } => "RemoteServiceError",
            Error::RemoteTimeout => "RemoteTimeout",
            Error::Geometry(_) => "GeometryError",
            Error::Configuration(_) => "ConfigurationError",
            Error::Internal(_) => "Internal",
        }
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn invalid(msg: impl Into<String>) -> Self {
        Error::InvalidInput(msg.into())
    }
}

impl From<diesel::result::Error> for Error {
    fn from(err: diesel::result::Error) -> Self {
        match err {
            diesel::result::Error::NotFound => Error::NotFound("not found".to_string()),
            other => Error::Internal(other.to_string()),
        }
    }
}

impl From<PoolError> for Error {
    fn from(err: PoolError) -> Self {
        Error::DatabaseUnavailable(err.to_string())
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::RemoteTimeout
        } else {
            Error::RemoteService {
                status: err.status().map(|s| s.as_u16()).unwrap_or(0),
                message: err.to_string(),
            }
        }
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes_are_stable() {
        assert_eq!(Error::not_found("x").code(), "NotFound");
        assert_eq!(Error::invalid("x").code(), "InvalidInput");
        assert_eq!(Error::RemoteTimeout.code(), "RemoteTimeout");
        assert_eq!(
            Error::RemoteService {
                status: 502,
                message: "bad gateway".into()
            }
            .code(),
            "RemoteServiceError"
        );
    }

    #[test]
    fn test_diesel_not_found_maps_to_not_found() {
        let err: Error = diesel::result::Error::NotFound.into();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
