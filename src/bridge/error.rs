//! Error types for bridge operations.

use super::schema::SchemaError;

/// Error type for bridge operations.
///
/// Validation failures are atomic: a rejected update leaves the state, the
/// listener registrations, and the action counter untouched.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// A candidate state (initial or post-update) failed schema validation.
    #[error("[{namespace}] invalid state: {source}")]
    Validation {
        namespace: String,
        #[source]
        source: SchemaError,
    },

    /// Operation on a bridge that was already destroyed, including a second
    /// `destroy()`.
    #[error("[{namespace}] bridge has been destroyed")]
    Destroyed { namespace: String },

    /// A live bridge with the same namespace is already registered with the
    /// devtools hook.
    #[error("[{namespace}] a live bridge with this namespace is already registered")]
    DuplicateNamespace { namespace: String },
}

impl BridgeError {
    /// Namespace of the bridge the error originated from.
    pub fn namespace(&self) -> &str {
        match self {
            BridgeError::Validation { namespace, .. }
            | BridgeError::Destroyed { namespace }
            | BridgeError::DuplicateNamespace { namespace } => namespace,
        }
    }
}
