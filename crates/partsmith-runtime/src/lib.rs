//! Instance lifecycle management for Partsmith compositions.
//!
//! A [`container::Container`] pairs a validated composition with
//! activators and resolves instances on demand:
//!
//! - non-shared parts get a fresh instance on every request,
//! - shared parts get one instance per owning scope,
//! - boundary imports receive [`factory::ExportFactory`] handles that open
//!   a child scope per call.
//!
//! Scopes release the instances they own, newest first, when disposed.

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod activator;
pub mod container;
pub mod factory;
pub mod import;
pub mod scope;
pub mod strategy;
