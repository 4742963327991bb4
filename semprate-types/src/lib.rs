//! # semprate-types
//!
//! Core types shared by the SEMP rate reporter and its consumers.
//!
//! ## Design Goals
//!
//! - **Zero required dependencies**: the types work without any serialization framework
//! - **Optional serialization**: enable the `serde` feature to emit samples as JSON
//! - **One sum type per concept**: a monitored target carries its own kind, so the
//!   query mode can always be derived from it
//!
//! ## Example
//!
//! ```rust
//! use semprate_types::{MonitoredTarget, QueryMode, Rate};
//!
//! let target = MonitoredTarget::bridge("east-west");
//! assert_eq!(target.mode(), QueryMode::BridgeRate);
//! assert_eq!(target.identifier(), "east-west");
//!
//! let rate = Rate::from(200u64);
//! assert_eq!(rate.to_string(), "200");
//! ```

mod mode;
mod rate;
mod status;
mod target;

pub use mode::*;
pub use rate::*;
pub use status::*;
pub use target::*;
