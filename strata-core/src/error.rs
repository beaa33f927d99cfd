//! Error Types
//!
//! Each component has its own error enum. [`Error`] joins them for callers
//! that do not care which layer failed.

use thiserror::Error;

use crate::graph::NodeId;
use crate::tree::Hid;

/// Errors raised by the reactive graph.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReactiveError {
    /// A memo (transitively) read itself while being computed.
    #[error("cyclic dependency detected while evaluating {node}")]
    CyclicDependency { node: NodeId },

    /// The handle refers to a node that has been disposed.
    #[error("{node} has been disposed")]
    Disposed { node: NodeId },

    /// The handle's value type does not match the stored value.
    #[error("{node} holds a value of a different type")]
    TypeMismatch { node: NodeId },

    /// Effects kept re-triggering each other within one propagation pass.
    #[error("effects did not settle after {iterations} runs")]
    FlushLimitExceeded { iterations: usize },

    /// An async effect ran outside of a tokio runtime.
    #[error("async effect dispatched outside of a tokio runtime")]
    NoAsyncRuntime,

    /// Failure reported by user code running inside the graph.
    #[error("{0}")]
    Callback(String),
}

/// Errors raised while diffing two tree snapshots.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DiffError {
    /// Two siblings share a reconciliation key, or a key was reused for an
    /// element of a different tag.
    #[error("duplicate reconciliation key {key:?} under <{parent}>")]
    DuplicateKey { key: String, parent: String },

    /// The previous snapshot was never committed and carries no hids.
    #[error("previous snapshot element <{tag}> carries no hydration id")]
    Uncommitted { tag: String },

    /// The session handed out every hydration id.
    #[error("hydration ids exhausted")]
    HidsExhausted,
}

/// A malformed frame from the peer.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Violation {
    #[error("unknown opcode {0:#04x}")]
    UnknownOpcode(u8),

    #[error("unknown node kind {0:#04x}")]
    UnknownNodeKind(u8),

    #[error("unknown event type {0:#04x}")]
    UnknownEventType(u8),

    #[error("frame ended unexpectedly")]
    Truncated,

    #[error("varint does not fit in {bits} bits")]
    VarintOverflow { bits: u32 },

    #[error("string payload is not valid UTF-8")]
    InvalidUtf8,

    #[error("{what} of {len} exceeds the maximum of {limit}")]
    LengthExceeded { what: &'static str, len: u64, limit: u64 },

    #[error("{0} trailing byte(s) after the last message")]
    TrailingBytes(usize),

    #[error("protocol version {0} is not supported")]
    UnsupportedVersion(u8),

    #[error("invalid handler id {0:?}")]
    InvalidHandlerId(String),

    #[error("invalid modifier bits {0:#04x}")]
    InvalidModifiers(u8),

    #[error("no mutually supported protocol version")]
    NoCommonVersion,
}

/// Errors raised by the binary codec.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CodecError {
    #[error("protocol violation: {0}")]
    ProtocolViolation(#[from] Violation),

    #[error("allocation limit exceeded: {what} of {len} exceeds {limit}")]
    AllocationLimitExceeded { what: &'static str, len: u64, limit: u64 },
}

/// Errors raised by a render function.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RenderError {
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error("component failed to render: {0}")]
    Component(String),
}

/// Errors raised while applying patches to a [`crate::diff::LiveTree`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApplyError {
    #[error("no live node with {0}")]
    UnknownTarget(Hid),

    #[error("{0} does not refer to an element")]
    NotAnElement(Hid),

    #[error("index {index} is out of bounds for the children of {parent}")]
    IndexOutOfBounds { parent: Hid, index: u32 },
}

/// Errors surfaced by a session.
#[derive(Debug, Error)]
pub enum SessionError {
    /// An earlier render pass failed; the session must be torn down.
    #[error("session has faulted")]
    Faulted,

    /// The session was shut down or its connection closed.
    #[error("session is closed")]
    Closed,

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The session task panicked or was cancelled.
    #[error("session task failed: {0}")]
    Task(String),
}

/// Any error produced by this crate.
#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Reactive(#[from] ReactiveError),

    #[error(transparent)]
    Diff(#[from] DiffError),

    #[error(transparent)]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Apply(#[from] ApplyError),

    #[error(transparent)]
    Session(#[from] SessionError),

    #[error("invalid configuration: {0}")]
    Config(#[from] serde_json::Error),
}

/// Result alias defaulting to the crate-wide [`Error`].
pub type Result<T, E = Error> = std::result::Result<T, E>;
