//! Reactive Primitives
//!
//! This module implements the core reactive system: signals, memos, and effects.
//! These primitives form the foundation of a session's fine-grained reactivity.
//!
//! # Concepts
//!
//! ## Signals
//!
//! A Signal is a container for mutable state. When a signal's value is read
//! within a tracking context (such as a memo or effect), the signal automatically
//! registers that context as a dependent. When the signal's value changes, all
//! dependents are notified.
//!
//! ## Memos
//!
//! A Memo is a derived value that caches its result. It re-evaluates only when
//! one of its dependencies changes. Memos are useful for expensive computations
//! that should not be repeated unnecessarily.
//!
//! ## Effects
//!
//! An Effect is a side-effecting computation that runs whenever its dependencies
//! change. Effects are used to synchronize reactive state with external systems.
//!
//! ## Scopes
//!
//! Every node and cleanup action is owned by a scope. Disposing a scope
//! releases what it owns, newest first. Each effect run gets its own scope.
//!
//! # Implementation Notes
//!
//! All state lives in a per-session [`Runtime`]; handles carry the runtime
//! they belong to, so there is no global or thread-local registry. A stack of
//! tracking frames inside the runtime detects dependencies automatically:
//! when a cell is read, it is recorded in the innermost frame.
//!
//! [`SharedSignal`] is the exception: a thread-safe cell that lives outside
//! any runtime and is bridged into sessions by mirror signals.

mod context;
mod effect;
mod memo;
mod observer;
mod runtime;
mod scope;
mod shared;
mod signal;

pub use effect::Effect;
pub use memo::Memo;
pub use observer::Observer;
pub use runtime::{Runtime, RuntimeId};
pub use scope::ScopeId;
pub use shared::{SharedSignal, WatchId};
pub use signal::Signal;
