//! Common error handling utilities for the blog authorization engine
//!
//! Every crate in the workspace keeps its own `thiserror` enum, but all of
//! them classify into the same small taxonomy so callers (the operator CLI,
//! an HTTP layer, a retry loop) can react without knowing which crate
//! produced the failure.
//!
//! # Error Categories
//!
//! - **Validation**: malformed identifiers, relation or role names; rejected
//!   before any store access
//! - **Unauthenticated**: an anonymous caller attempted a gated operation
//! - **AuthorizationDenied**: a well-formed check evaluated to deny
//! - **NotFound**: the addressed object does not exist in the tuple store
//! - **StoreUnavailable**: the tuple store failed; safe to retry
//! - **Timeout**: a store or evaluator call exceeded its budget; safe to retry
//! - **TransactionFailed**: a conditional batch lost a race; safe to retry
//! - **Schema**: the relation model is invalid or missing; fatal at startup
//! - **Internal**: anything else
//!
//! # Example
//!
//! ```rust
//! use error_common::{Classified, ErrorClass};
//!
//! #[derive(Debug, thiserror::Error)]
//! #[error("store offline")]
//! struct Offline;
//!
//! impl Classified for Offline {
//!     fn class(&self) -> ErrorClass {
//!         ErrorClass::StoreUnavailable
//!     }
//! }
//!
//! assert!(Offline.is_retryable());
//! assert_eq!(Offline.code(), "STORE_4001");
//! ```

pub mod codes;
pub mod reporting;
pub mod types;

pub use reporting::*;
pub use types::*;
