//! Content-lifecycle authorization policy for the blog platform
//!
//! Each operation on a post (create, read, edit, delete, publish, transfer,
//! per-post edit grants) and every org-role change is decided here by
//! combining org-role checks with per-post relation checks, then mirrored
//! into the tuple store when allowed.
//!
//! # Example
//!
//! ```rust
//! use auth_rebac::{AuthorizationEngine, EngineConfig, InMemoryTupleRepository, Schema};
//! use blog_policy::{ContentPolicy, Operation, Principal, UserId};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = AuthorizationEngine::new(
//!         Arc::new(InMemoryTupleRepository::new()),
//!         EngineConfig::default(),
//!     )
//!     .with_schema(Schema::blog_schema())?;
//!     let policy = ContentPolicy::new(Arc::new(engine), "blog")?;
//!
//!     // The first registered subject becomes admin
//!     let alice = UserId::new("alice")?;
//!     policy.register_subject(&alice).await?;
//!
//!     let outcome = policy
//!         .apply(
//!             &Principal::Authenticated(alice),
//!             Operation::CreateContent { post_id: "1".to_string() },
//!         )
//!         .await?;
//!     assert_eq!(outcome.effects.len(), 2);
//!
//!     Ok(())
//! }
//! ```

pub mod content;
pub mod error;
pub mod operations;
pub mod orchestrator;
pub mod principal;

pub use content::*;
pub use error::*;
pub use operations::*;
pub use orchestrator::*;
pub use principal::*;
