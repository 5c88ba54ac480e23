#![deny(missing_docs)]
#![deny(unused_doc_comments)]

//! This crate contains the client side of reservation provisioning on the threefold grid. It
//! holds the workload descriptor model, builders to assemble and validate workloads, encryption
//! of secrets towards the node which will run a workload, the signing protocol used to authorize
//! reservations, capacity and escrow accounting, and a client to talk to an explorer.

use builders::ValidationError;
use capacity::UnsupportedSizeError;
use config::ConfigError;
use encryption::SecretError;
use escrow::EscrowError;
use explorer::ExplorerError;
use identity::IdentityError;
use std::fmt;

/// Builders for every workload type, and for the reservation bundling them.
pub mod builders;
/// Resource sizing of workloads, capacity pools and capacity reservations.
pub mod capacity;
/// Reservation orchestration against an explorer.
pub mod client;
/// Configuration for the `tfuser` tool.
pub mod config;
/// Encryption of secrets towards the node which runs a workload.
pub mod encryption;
/// Payment obligations returned by the explorer.
pub mod escrow;
/// Interface to the explorer, and an HTTP implementation of it.
pub mod explorer;
/// Signing identities.
pub mod identity;
/// The reservation state machine as reported by the explorer.
pub mod lifecycle;
/// Reservations and their payload.
pub mod reservation;
/// Concurrent scanning of reservations by id.
pub mod scan;
/// Primitive types shared by the workload model.
pub mod schema;
/// Signature challenges, reservation signing and quorum accounting.
pub mod signing;
/// The workload descriptor model.
pub mod workloads;

mod auth;

/// Global result type for provisioning operations
pub type ProvisionResult<T> = Result<T, ProvisionError>;

/// An error originating in the provisioning library
#[derive(Debug)]
pub struct ProvisionError {
    kind: ProvisionErrorKind,
    internal: InternalError,
}

impl fmt::Display for ProvisionError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "error during {}: {}", self.kind, self.internal)
    }
}

impl std::error::Error for ProvisionError {
    fn cause(&self) -> Option<&dyn std::error::Error> {
        match self.internal {
            InternalError::Explorer(ref e) => Some(e),
            InternalError::Other(ref e) => Some(e.as_ref()),
        }
    }
}

impl ProvisionError {
    /// Create a new ProvisionError from an IO error with an additional message.
    pub fn new_io(msg: String, e: std::io::Error) -> Self {
        ProvisionError {
            kind: ProvisionErrorKind::LocalIo(msg),
            internal: InternalError::Other(Box::new(e)),
        }
    }

    /// Wrap an [`ExplorerError`], with some context about the object the call was made for.
    pub fn remote(context: String, e: ExplorerError) -> Self {
        ProvisionError {
            kind: ProvisionErrorKind::Remote(context),
            internal: InternalError::Explorer(e),
        }
    }

    /// Create a new ProvisionError from any kind, with the underlying error included
    pub fn new(kind: ProvisionErrorKind, internal: Box<dyn std::error::Error + Send + Sync>) -> Self {
        ProvisionError {
            kind,
            internal: InternalError::Other(internal),
        }
    }

    /// The stage in which this error occurred.
    pub fn kind(&self) -> &ProvisionErrorKind {
        &self.kind
    }

    /// Return a reference to the embedded [`ExplorerError`], if this error is caused by the
    /// explorer, or nothing otherwise.
    pub fn explorer_error(&self) -> Option<&ExplorerError> {
        match self.internal {
            InternalError::Explorer(ref e) => Some(e),
            _ => None,
        }
    }
}

/// Wrapper error for the ProvisionError
#[derive(Debug)]
enum InternalError {
    Explorer(ExplorerError),
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                InternalError::Explorer(ref e) => e as &dyn std::error::Error,
                InternalError::Other(e) => e.as_ref(),
            }
        )
    }
}

/// Information about where in the chain of operation the error occurred.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProvisionErrorKind {
    /// A workload or reservation is missing required input, or holds inconsistent values.
    Validation,
    /// A workload asks for a size tier which has no capacity mapping.
    Sizing,
    /// The public key of a node could not be derived from its id.
    KeyResolution,
    /// Sealing or opening a secret failed.
    Encryption,
    /// Loading a signing identity or producing a signature failed.
    Signing,
    /// Encoding or decoding of a descriptor failed.
    Serialization,
    /// A call to the explorer failed. The context identifies the object of the call.
    Remote(String),
    /// An error while reading or writing to the local storage.
    LocalIo(String),
    /// An error in the configuration.
    Config,
    /// Escrow amounts could not be aggregated.
    Escrow,
}

impl fmt::Display for ProvisionErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                ProvisionErrorKind::Validation => "validation".to_string(),
                ProvisionErrorKind::Sizing => "resource sizing".to_string(),
                ProvisionErrorKind::KeyResolution => "node key resolution".to_string(),
                ProvisionErrorKind::Encryption => "secret encryption".to_string(),
                ProvisionErrorKind::Signing => "signing".to_string(),
                ProvisionErrorKind::Serialization => "serialization".to_string(),
                ProvisionErrorKind::Remote(ctx) => format!("contacting the explorer for {}", ctx),
                ProvisionErrorKind::LocalIo(msg) => format!("accessing local storage for {}", msg),
                ProvisionErrorKind::Config => "configuration".to_string(),
                ProvisionErrorKind::Escrow => "escrow accounting".to_string(),
            }
        )
    }
}

impl From<ExplorerError> for ProvisionError {
    fn from(e: ExplorerError) -> Self {
        ProvisionError::remote("explorer request".to_string(), e)
    }
}

impl From<ValidationError> for ProvisionError {
    fn from(e: ValidationError) -> Self {
        ProvisionError {
            kind: ProvisionErrorKind::Validation,
            internal: InternalError::Other(Box::new(e)),
        }
    }
}

impl From<UnsupportedSizeError> for ProvisionError {
    fn from(e: UnsupportedSizeError) -> Self {
        ProvisionError {
            kind: ProvisionErrorKind::Sizing,
            internal: InternalError::Other(Box::new(e)),
        }
    }
}

impl From<SecretError> for ProvisionError {
    fn from(e: SecretError) -> Self {
        let kind = if e.is_key_resolution() {
            ProvisionErrorKind::KeyResolution
        } else {
            ProvisionErrorKind::Encryption
        };
        ProvisionError {
            kind,
            internal: InternalError::Other(Box::new(e)),
        }
    }
}

impl From<IdentityError> for ProvisionError {
    fn from(e: IdentityError) -> Self {
        ProvisionError {
            kind: ProvisionErrorKind::Signing,
            internal: InternalError::Other(Box::new(e)),
        }
    }
}

impl From<EscrowError> for ProvisionError {
    fn from(e: EscrowError) -> Self {
        ProvisionError {
            kind: ProvisionErrorKind::Escrow,
            internal: InternalError::Other(Box::new(e)),
        }
    }
}

impl From<ConfigError> for ProvisionError {
    fn from(e: ConfigError) -> Self {
        ProvisionError {
            kind: ProvisionErrorKind::Config,
            internal: InternalError::Other(Box::new(e)),
        }
    }
}

impl From<toml::de::Error> for ProvisionError {
    fn from(e: toml::de::Error) -> Self {
        ProvisionError {
            kind: ProvisionErrorKind::Config,
            internal: InternalError::Other(Box::new(e)),
        }
    }
}

impl From<serde_json::Error> for ProvisionError {
    fn from(e: serde_json::Error) -> Self {
        ProvisionError {
            kind: ProvisionErrorKind::Serialization,
            internal: InternalError::Other(Box::new(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{ProvisionError, ProvisionErrorKind};
    use crate::explorer::ExplorerError;
    use std::io;

    #[test]
    fn error_messages() {
        let err = ProvisionError::new_io(
            "staged workload zdb.json".to_string(),
            io::Error::new(io::ErrorKind::NotFound, "no such file"),
        );
        assert_eq!(
            err.to_string(),
            "error during accessing local storage for staged workload zdb.json: no such file"
        );

        let err = ProvisionError::remote(
            "reservation 12".to_string(),
            ExplorerError::Status {
                code: 404,
                body: "not found".to_string(),
            },
        );
        assert_eq!(
            err.kind(),
            &ProvisionErrorKind::Remote("reservation 12".to_string())
        );
        assert!(err.explorer_error().unwrap().is_not_found());
        assert_eq!(
            err.to_string(),
            "error during contacting the explorer for reservation 12: explorer returned status 404: not found"
        );
    }
}
