//! # Diary Core
//!
//! Core types, access policy, audit stamping and store traits for Diary.
//!
//! This crate holds everything that decides *whether* and *how* a diary
//! event may be read or written, independently of any storage backend or
//! request pipeline. Storage backends live in `diary-storage`, the request
//! orchestration in `diary-service`.
//!
//! ## Key Traits
//!
//! - [`EventStore`]: Keyed event persistence with optimistic concurrency
//! - [`WriteInterceptor`]: Hook run inside a store commit, before it applies
//! - [`Auditable`]: Schema-tolerant access to a record's provenance fields
//! - [`Clock`]: Time abstraction for testability
//!
//! ## Key Types
//!
//! - [`Actor`]: The authenticated caller (id + role set)
//! - [`Event`]: A dated diary entry
//! - [`AccessController`]: Pure allow/deny policy
//! - [`AuditStamper`]: Who/when stamping interceptor

pub mod access;
pub mod audit;
pub mod error;
pub mod event;
pub mod identity;
pub mod traits;

// Re-export main types
pub use access::*;
pub use audit::*;
pub use error::*;
pub use event::*;
pub use identity::*;
pub use traits::*;
