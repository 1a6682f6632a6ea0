//! Built-in capability restriction.
//!
//! Core principle: **policies never reach the network.** The capability set
//! is the engine's built-in catalog with the network primitives removed, and
//! the [`SafetyGuard`] rejects any expression that calls or rebinds one.

mod capability;
mod catalog;
mod error;
mod guard;

pub use capability::{CapabilitySet, capabilities};
pub use catalog::{BUILTINS, DENYLIST, DEPRECATED, is_denylisted, is_deprecated};
pub use error::Violation;
pub use guard::{SafetyGuard, Scope, deprecated_calls, undefined_calls};
