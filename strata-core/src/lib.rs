//! Strata Core
//!
//! Server-side core of the Strata server-driven UI runtime. Application state
//! lives on the server in a fine-grained reactive graph; each render produces
//! an immutable tree, and only the minimal patch list between the previous
//! and the new tree crosses the wire, in a compact binary format.
//!
//! # Architecture
//!
//! - `graph`: Arena-backed dependency graph with push-pull dirty propagation
//! - `reactive`: Signals, memos, effects, scopes and the per-session runtime
//! - `tree`: Immutable UI tree and hydration id allocation
//! - `diff`: Keyed tree reconciliation producing patch lists
//! - `codec`: Binary wire format for patches and client events
//! - `session`: Per-client render loop tying the above together
//!
//! # Example
//!
//! ```rust,ignore
//! use strata_core::config::RuntimeConfig;
//! use strata_core::session::{Session, SessionContext};
//! use strata_core::tree::Element;
//!
//! let mut session = Session::new(&RuntimeConfig::default(), |cx| {
//!     let count = cx.signal(0);
//!     let increment = cx.handler({
//!         let count = count.clone();
//!         move |_| count.update(|n| n + 1)
//!     });
//!     Ok(move |_: &SessionContext| {
//!         Ok(Element::new("button")
//!             .on("click", increment)
//!             .child(count.get()?.to_string())
//!             .into())
//!     })
//! })?;
//!
//! // Mounts the initial tree.
//! let frame = session.render()?;
//! ```

pub mod codec;
pub mod config;
pub mod diff;
pub mod error;
pub mod graph;
pub mod reactive;
pub mod session;
pub mod tree;

pub use config::RuntimeConfig;
pub use error::{Error, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
