//! Spawned sessions and the registry that tracks them.

use std::fmt;

use dashmap::DashMap;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::{Command, Session, SessionContext, SessionId};
use crate::config::RuntimeConfig;
use crate::error::{RenderError, SessionError};
use crate::tree::Node;

/// A session running on its own tokio task.
pub struct SessionHandle {
    id: SessionId,
    context: SessionContext,
    task: JoinHandle<Result<(), SessionError>>,
}

impl SessionHandle {
    /// Spawn `session` on the ambient tokio runtime. Encoded patch frames
    /// are sent to `outbound`.
    pub fn spawn(session: Session, outbound: mpsc::Sender<Vec<u8>>) -> Self {
        let id = session.id();
        let context = session.context().clone();
        let task = tokio::spawn(session.run(outbound));
        Self { id, context, task }
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    /// The session's context, for posting writes from outside.
    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    /// Queue an encoded client event frame.
    pub fn send_frame(&self, frame: Vec<u8>) -> Result<(), SessionError> {
        self.send(Command::Frame(frame))
    }

    pub fn send(&self, command: Command) -> Result<(), SessionError> {
        self.context.send(command)
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Ask the session to stop and wait for its task. Returns how the task
    /// ended.
    pub async fn shutdown(self) -> Result<(), SessionError> {
        if self.context.send(Command::Shutdown).is_err() {
            debug!(session = %self.id, "session already stopped");
        }
        self.join().await
    }

    /// Wait for the session task without asking it to stop.
    pub async fn join(self) -> Result<(), SessionError> {
        match self.task.await {
            Ok(result) => result,
            Err(error) => Err(SessionError::Task(error.to_string())),
        }
    }
}

impl fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionHandle")
            .field("id", &self.id)
            .field("finished", &self.task.is_finished())
            .finish()
    }
}

/// Live sessions keyed by id.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    config: RuntimeConfig,
    sessions: DashMap<SessionId, SessionHandle>,
}

impl SessionRegistry {
    pub fn new(config: RuntimeConfig) -> Self {
        Self {
            config,
            sessions: DashMap::new(),
        }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// Create a session from `setup` and spawn it. Returns its id and the
    /// receiving end of its outbound frame channel. The first frame mounts
    /// the initial tree.
    pub fn open<S, R>(&self, setup: S) -> Result<(SessionId, mpsc::Receiver<Vec<u8>>), SessionError>
    where
        S: FnOnce(&SessionContext) -> Result<R, RenderError>,
        R: Fn(&SessionContext) -> Result<Node, RenderError> + Send + 'static,
    {
        let session = Session::new(&self.config, setup)?;
        let (outbound, frames) = mpsc::channel(self.config.session.outbound_capacity.max(1));
        let handle = SessionHandle::spawn(session, outbound);
        let id = handle.id();
        self.sessions.insert(id, handle);
        info!(session = %id, live = self.sessions.len(), "session opened");
        Ok((id, frames))
    }

    /// Queue an encoded event frame for session `id`.
    pub fn send(&self, id: SessionId, frame: Vec<u8>) -> Result<(), SessionError> {
        let handle = self.sessions.get(&id).ok_or(SessionError::Closed)?;
        handle.send_frame(frame)
    }

    /// Queue a command for session `id`.
    pub fn command(&self, id: SessionId, command: Command) -> Result<(), SessionError> {
        let handle = self.sessions.get(&id).ok_or(SessionError::Closed)?;
        handle.send(command)
    }

    pub fn contains(&self, id: SessionId) -> bool {
        self.sessions.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Shut session `id` down and remove it. Returns how its task ended.
    pub async fn close(&self, id: SessionId) -> Result<(), SessionError> {
        let (_, handle) = self.sessions.remove(&id).ok_or(SessionError::Closed)?;
        let result = handle.shutdown().await;
        if let Err(error) = &result {
            warn!(session = %id, %error, "session ended with an error");
        }
        info!(session = %id, live = self.sessions.len(), "session removed");
        result
    }

    /// Drop every session whose task already ended.
    pub fn reap(&self) -> usize {
        let before = self.sessions.len();
        self.sessions.retain(|_, handle| !handle.is_finished());
        let reaped = before - self.sessions.len();
        if reaped > 0 {
            debug!(reaped, "finished sessions removed");
        }
        reaped
    }

    /// Shut every session down.
    pub async fn close_all(&self) {
        let ids: Vec<SessionId> = self.sessions.iter().map(|entry| *entry.key()).collect();
        for id in ids {
            let _ = self.close(id).await;
        }
    }
}

// ---- Tests ----
