//! The handle components receive during setup and render.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::trace;

use super::handler::HandlerRegistry;
use super::{Command, SessionId};
use crate::codec::ClientEvent;
use crate::error::{ReactiveError, SessionError};
use crate::reactive::{Effect, Memo, Runtime, SharedSignal, Signal};
use crate::tree::HandlerId;

/// Per-session access to the reactive graph, the handler arena and the
/// session's work queue.
///
/// Cheap to clone; clones refer to the same session.
#[derive(Clone)]
pub struct SessionContext {
    id: SessionId,
    runtime: Runtime,
    handlers: HandlerRegistry,
    commands: mpsc::UnboundedSender<Command>,
}

impl SessionContext {
    pub(crate) fn new(
        id: SessionId,
        runtime: Runtime,
        handlers: HandlerRegistry,
        commands: mpsc::UnboundedSender<Command>,
    ) -> Self {
        Self {
            id,
            runtime,
            handlers,
            commands,
        }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub(crate) fn handlers(&self) -> &HandlerRegistry {
        &self.handlers
    }

    /// Create a signal in this session's graph.
    pub fn signal<T>(&self, value: T) -> Signal<T>
    where
        T: Clone + PartialEq + Send + 'static,
    {
        Signal::new(&self.runtime, value)
    }

    /// Create a memo in this session's graph.
    pub fn memo<T, F>(&self, compute: F) -> Memo<T>
    where
        T: Clone + PartialEq + Send + 'static,
        F: Fn() -> Result<T, ReactiveError> + Send + Sync + 'static,
    {
        Memo::new(&self.runtime, compute)
    }

    /// Create an effect in this session's graph. It runs once immediately.
    pub fn effect<F>(&self, run: F) -> Result<Effect, ReactiveError>
    where
        F: Fn() -> Result<(), ReactiveError> + Send + Sync + 'static,
    {
        Effect::new(&self.runtime, run)
    }

    /// Register an event handler owned by the current scope.
    ///
    /// The id stops resolving once that scope is disposed; events still
    /// carrying it are ignored.
    pub fn handler<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&ClientEvent) -> Result<(), ReactiveError> + Send + Sync + 'static,
    {
        let id = self.handlers.register(handler);
        let handlers = self.handlers.clone();
        self.runtime.on_cleanup(move || {
            handlers.remove(id);
        });
        id
    }

    /// Queue a write to run on the session's execution context.
    pub fn post<F>(&self, write: F) -> Result<(), SessionError>
    where
        F: FnOnce() -> Result<(), ReactiveError> + Send + 'static,
    {
        self.send(Command::Write(Box::new(write)))
    }

    pub(crate) fn send(&self, command: Command) -> Result<(), SessionError> {
        self.commands.send(command).map_err(|_| SessionError::Closed)
    }

    /// Mirror a process-shared cell into this session.
    ///
    /// The returned signal starts with the shared value. Every later change
    /// is queued as a write on this session, so renders read a consistent
    /// snapshot. The subscription ends with the current scope.
    pub fn bind_shared<T>(&self, shared: &SharedSignal<T>) -> Signal<T>
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        let mirror = self.signal(shared.get());

        let watch = {
            let source = shared.clone();
            let target = mirror.clone();
            let commands = self.commands.clone();
            let session = self.id;
            shared.watch(move |version| {
                let source = source.clone();
                let target = target.clone();
                let write = Command::Write(Box::new(move || target.set(source.get())));
                if commands.send(write).is_err() {
                    trace!(%session, version, "session gone; shared update dropped");
                }
            })
        };

        let shared = shared.clone();
        self.runtime.on_cleanup(move || {
            shared.unwatch(watch);
        });
        mirror
    }

    /// Create an effect whose work runs asynchronously.
    ///
    /// `source` runs tracked, like any effect. Its output is handed to
    /// `task`, whose future is spawned on the ambient tokio runtime. The
    /// result is written into `target` through the session queue, unless a
    /// newer run of the same effect started in the meantime, in which case
    /// it is discarded.
    pub fn spawn_effect<I, T, S, F, Fut>(&self, source: S, task: F, target: Signal<T>) -> Result<Effect, ReactiveError>
    where
        I: Send + 'static,
        T: Clone + Send + 'static,
        S: Fn() -> Result<I, ReactiveError> + Send + Sync + 'static,
        F: Fn(I) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = T> + Send + 'static,
    {
        let handle = Handle::try_current().map_err(|_| ReactiveError::NoAsyncRuntime)?;
        let latest = Arc::new(AtomicU64::new(0));
        let commands = self.commands.clone();
        let session = self.id;

        self.effect(move || {
            let input = source()?;
            let generation = latest.fetch_add(1, Ordering::AcqRel) + 1;
            let future = task(input);

            let latest = Arc::clone(&latest);
            let commands = commands.clone();
            let target = target.clone();
            handle.spawn(async move {
                let value = future.await;
                let result = Command::AsyncResult {
                    generation,
                    latest,
                    apply: Box::new(move || target.set(value)),
                };
                if commands.send(result).is_err() {
                    trace!(%session, generation, "session gone; async result dropped");
                }
            });
            Ok(())
        })
    }
}
