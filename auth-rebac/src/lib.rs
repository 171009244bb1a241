//! Zanzibar-style relationship-based authorization engine
//!
//! This crate provides:
//! - Validated tuple types (`user:42`, `org:blog#admin`, `post:7`)
//! - A declarative relation schema with load-time validation
//! - An evaluator resolving direct, computed, traversal and union relations
//! - In-memory and PostgreSQL tuple stores with atomic conditional batches
//!
//! # Core Concepts
//!
//! - **Object**: an authorizable resource such as `org:blog` or `post:7`
//! - **Subject**: a user, or a userset such as `org:blog#admin`
//! - **Relation**: a named relationship defined per object type
//! - **Tuple**: a relationship statement: "subject has relation to object"
//!
//! # Example
//!
//! ```rust
//! use auth_rebac::{
//!     AuthorizationEngine, EngineConfig, InMemoryTupleRepository, ObjectRef,
//!     RelationName, RelationTuple, Schema, SubjectRef,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = AuthorizationEngine::new(
//!         Arc::new(InMemoryTupleRepository::new()),
//!         EngineConfig::default(),
//!     )
//!     .with_schema(Schema::blog_schema())?;
//!
//!     engine
//!         .write_tuples(vec![RelationTuple::parse("user:alice", "owner", "post:1")?])
//!         .await?;
//!
//!     let decision = engine
//!         .check(
//!             &SubjectRef::user("alice")?,
//!             &RelationName::new("can_edit")?,
//!             &ObjectRef::post("1")?,
//!         )
//!         .await?;
//!     assert!(decision.is_allowed());
//!
//!     Ok(())
//! }
//! ```

pub mod models;
pub mod engine;
pub mod repository;
pub mod schema;
pub mod check;
pub mod expand;
pub mod error;

pub use models::*;
pub use engine::*;
pub use repository::{InMemoryTupleRepository, PostgresTupleRepository, TupleRepository};
pub use schema::*;
pub use error::*;
