//! Error types for realm resolution, authentication, and policy evaluation.
//!
//! Every failure raised by this crate is an [`Error`] variant. The variants
//! are deliberately coarse: outer layers translate them into protocol-level
//! responses, so what matters is that "not logged in", "logged in but not
//! allowed", "badly configured", and "could not determine" stay
//! distinguishable. Use [`Error::kind`] for exhaustive matching and
//! [`Error::http_status`] for a ready-made HTTP mapping.

use thiserror::Error;

/// Errors raised by realm resolution, authentication, and policy evaluation.
#[derive(Debug, Error)]
pub enum Error {
    /// A bearer token was present but could not be structurally decoded.
    ///
    /// Recovered locally during realm resolution (treated as "no token");
    /// propagated when decoding is requested explicitly.
    #[error("malformed bearer token: {0}")]
    MalformedToken(String),

    /// No valid grant is attached to the request context.
    #[error("user not authenticated")]
    Unauthenticated,

    /// The caller is authenticated but fails a role, permission, or tenant
    /// check. The message names the unmet requirement.
    #[error("user is not authorized: {0}")]
    Forbidden(String),

    /// Invalid policy parameterization or adapter setup. A build-time
    /// failure: it should abort schema or route construction, never be
    /// handled per request.
    #[error("invalid configuration: {0}")]
    Configuration(String),

    /// Token verification failed (bad signature, wrong issuer, expired).
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// A remote permission decision could not be obtained. Distinct from
    /// [`Forbidden`](Self::Forbidden): "could not determine" is not "denied".
    #[error("permission check could not be completed: {0}")]
    PermissionCheck(String),

    /// Unexpected internal failure.
    #[error("internal error: {0}")]
    Internal(String),
}

/// A convenience `Result` alias using this crate's [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Discriminant-only view of [`Error`] for exhaustive matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// See [`Error::MalformedToken`].
    MalformedToken,
    /// See [`Error::Unauthenticated`].
    Unauthenticated,
    /// See [`Error::Forbidden`].
    Forbidden,
    /// See [`Error::Configuration`].
    Configuration,
    /// See [`Error::Authentication`].
    Authentication,
    /// See [`Error::PermissionCheck`].
    PermissionCheck,
    /// See [`Error::Internal`].
    Internal,
}

impl Error {
    /// Create a [`Forbidden`](Self::Forbidden) error naming the unmet
    /// requirement.
    pub fn forbidden(requirement: impl Into<String>) -> Self {
        Self::Forbidden(requirement.into())
    }

    /// The kind of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::MalformedToken(_) => ErrorKind::MalformedToken,
            Self::Unauthenticated => ErrorKind::Unauthenticated,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Authentication(_) => ErrorKind::Authentication,
            Self::PermissionCheck(_) => ErrorKind::PermissionCheck,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Map this error to an HTTP status code.
    ///
    /// - `400` — [`MalformedToken`](Self::MalformedToken)
    /// - `401` — [`Unauthenticated`](Self::Unauthenticated),
    ///   [`Authentication`](Self::Authentication)
    /// - `403` — [`Forbidden`](Self::Forbidden)
    /// - `502` — [`PermissionCheck`](Self::PermissionCheck)
    /// - `500` — [`Configuration`](Self::Configuration),
    ///   [`Internal`](Self::Internal)
    pub fn http_status(&self) -> http::StatusCode {
        match self {
            Self::MalformedToken(_) => http::StatusCode::BAD_REQUEST,
            Self::Unauthenticated | Self::Authentication(_) => http::StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => http::StatusCode::FORBIDDEN,
            Self::PermissionCheck(_) => http::StatusCode::BAD_GATEWAY,
            Self::Configuration(_) | Self::Internal(_) => {
                http::StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }
}
