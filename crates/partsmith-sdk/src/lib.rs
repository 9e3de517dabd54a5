//! # partsmith-sdk
//!
//! Public SDK for using Partsmith as a Rust library.
//!
//! Provides two main entry points:
//! - [`PartBuilder`](builder::PartBuilder): Fluent API for declaring a part and how to build it.
//! - [`CompositionHost`](host::CompositionHost): Validates the parts as a whole and resolves instances.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//!
//! use partsmith_sdk::builder::PartBuilder;
//! use partsmith_sdk::host::CompositionHost;
//!
//! struct Config {
//!     url: String,
//! }
//!
//! struct Client {
//!     config: Arc<Config>,
//! }
//!
//! let host = CompositionHost::builder()
//!     .part(
//!         PartBuilder::of::<Config>()
//!             .shared()
//!             .instance(Config { url: "http://localhost".into() }),
//!     )
//!     .part(
//!         PartBuilder::of::<Client>()
//!             .imports::<Config>("config")
//!             .activate(|imports| Ok(Arc::new(Client { config: imports.instance("config")? }))),
//!     )
//!     .build()?;
//!
//! let client = host.get::<Client>()?;
//! assert_eq!(client.config.url, "http://localhost");
//! # Ok::<(), partsmith_common::error::CompositionError>(())
//! ```

#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used, clippy::panic))]

pub mod builder;
pub mod host;
