//! Schema-validated reactive state containers shared between fragments.

mod error;
mod schema;
mod state;

pub use error::BridgeError;
pub use schema::{Schema, SchemaError, SchemaIssue, TypedSchema};
pub use state::{Bridge, BridgeConfig};
