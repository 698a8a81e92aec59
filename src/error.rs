/// Error types for the geoip2 library
use thiserror::Error;

/// Result type alias for reader operations
pub type Result<T> = std::result::Result<T, GeoIpError>;

/// Broad classification of a [`GeoIpError`]
///
/// Callers that only need to branch on "is this my fault, the file's fault,
/// or simply no coverage" can match on this instead of every variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The database is malformed, truncated, or could not be read
    Structural,
    /// The database is well-formed but has no record for the address
    NotFound,
    /// The caller asked for something this reader cannot do
    Usage,
}

/// Main error type for database reader operations
#[derive(Debug, Error)]
pub enum GeoIpError {
    /// The address has no record in the database
    #[error("The address {address} is not in the database.")]
    AddressNotFound {
        /// The address as it was queried
        address: String,
    },

    /// A lookup method was used against an incompatible database type
    #[error(
        "A {database_type} database cannot be opened with the {method} method \
         (expected a database type containing \"{required}\")"
    )]
    InvalidOperation {
        /// Database type declared in the file's metadata
        database_type: String,
        /// Name of the lookup method that was called
        method: &'static str,
        /// Substring the database type must contain for this method
        required: &'static str,
    },

    /// The address family does not fit the database
    #[error("{0}")]
    AddressFamily(String),

    /// The reader was closed before the lookup
    #[error("The database reader has been closed")]
    Disposed,

    /// The supplied text is not an IP address
    #[error("'{0}' is not a valid IP address")]
    InvalidAddress(String),

    /// Malformed or unsupported database file
    #[error("Invalid database: {0}")]
    InvalidDatabase(String),

    /// Data section decoding failed
    #[error("Decoding error: {0}")]
    Decoding(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GeoIpError {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            GeoIpError::AddressNotFound { .. } => ErrorKind::NotFound,
            GeoIpError::InvalidOperation { .. }
            | GeoIpError::AddressFamily(_)
            | GeoIpError::Disposed
            | GeoIpError::InvalidAddress(_) => ErrorKind::Usage,
            GeoIpError::InvalidDatabase(_) | GeoIpError::Decoding(_) | GeoIpError::Io(_) => {
                ErrorKind::Structural
            }
        }
    }

    /// True when the error only means "no record for this address"
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}
