//! # partsmith-compose
//!
//! Static half of the Partsmith composition engine.
//!
//! Handles:
//! - **Descriptor**: Part, export, and import descriptors with builders.
//! - **Catalog**: Immutable contract-indexed part collection.
//! - **Binder**: Matching every import to its satisfying exports.
//! - **Validator**: Cardinality, type, and non-shared cycle checks.
//! - **Composition**: The validated, immutable bound graph.
//! - **Plan**: Precompiled, persistable resolution plans.
//! - **Graph**: Diagnostic dependency graph and DOT export.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod binder;
pub mod catalog;
pub mod composition;
pub mod descriptor;
pub mod graph;
pub mod part;
pub mod plan;
pub mod validator;
