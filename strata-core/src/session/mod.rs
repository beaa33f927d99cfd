//! Render Loop Coordinator
//!
//! A [`Session`] owns one reactive [`Runtime`], one committed tree snapshot
//! and the hid allocator that keeps the two in step with the client. All
//! inbound work arrives as [`Command`]s on one queue and is processed one at
//! a time, so exactly one render pass runs at any moment for a session.
//!
//! # Render Pass
//!
//! ```text
//! Idle -> Rendering -> Diffing -> Encoding -> Idle
//!            |            |
//!            +------------+--> Faulted
//! ```
//!
//! 1. Queued commands are drained: event frames are decoded and routed to
//!    handlers, writes are applied. Each runs inside a batch.
//! 2. If an input of the last render produced a new value (or nothing was
//!    rendered yet) the render function runs again under an [`Observer`].
//! 3. The new tree is diffed against the committed snapshot and the patches
//!    are encoded.
//! 4. Only then is the new snapshot committed and the handler index rebuilt.
//!
//! A failing render, a cycle or a duplicate key moves the session to
//! `Faulted`; the committed snapshot is left untouched. A malformed frame
//! from the client closes the session.

mod context;
mod handle;
mod handler;

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use tokio::sync::mpsc;
use tracing::{debug, error, instrument, trace, warn};

use crate::codec::{ClientEvent, Codec};
use crate::config::RuntimeConfig;
use crate::diff::{diff, structural_patch_count};
use crate::error::{ReactiveError, RenderError, SessionError};
use crate::reactive::{Observer, Runtime, ScopeId};
use crate::tree::{HandlerId, Hid, HidAllocator, Node};

pub use context::SessionContext;
pub use handle::{SessionHandle, SessionRegistry};
pub use handler::HandlerRegistry;

/// Unique identifier of a session, used in log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

static SESSION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

impl SessionId {
    fn next() -> Self {
        Self(SESSION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

/// Where a session is in its render loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Rendering,
    Diffing,
    Encoding,
    /// A render pass failed. Terminal.
    Faulted,
    /// Shut down or disconnected. Terminal.
    Closed,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionState::Faulted | SessionState::Closed)
    }
}

/// A write to run on the session's execution context.
pub type WriteFn = Box<dyn FnOnce() -> Result<(), ReactiveError> + Send>;

/// A session's render function.
pub type RenderFn = Box<dyn Fn(&SessionContext) -> Result<Node, RenderError> + Send>;

/// Work for a session.
pub enum Command {
    /// An encoded client event frame.
    Frame(Vec<u8>),
    /// An already decoded client event.
    Event(ClientEvent),
    Write(WriteFn),
    /// The result of an async effect run. Applied only if `generation` is
    /// still the newest run of that effect.
    AsyncResult {
        generation: u64,
        latest: Arc<AtomicU64>,
        apply: WriteFn,
    },
    /// Render even if no input changed.
    Render,
    Shutdown,
}

impl fmt::Debug for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Command::Frame(bytes) => f.debug_tuple("Frame").field(&bytes.len()).finish(),
            Command::Event(event) => f.debug_tuple("Event").field(event).finish(),
            Command::Write(_) => f.write_str("Write"),
            Command::AsyncResult { generation, .. } => {
                f.debug_struct("AsyncResult").field("generation", generation).finish_non_exhaustive()
            }
            Command::Render => f.write_str("Render"),
            Command::Shutdown => f.write_str("Shutdown"),
        }
    }
}

/// One client's reactive graph, committed tree and render loop.
pub struct Session {
    id: SessionId,
    state: SessionState,
    runtime: Runtime,
    context: SessionContext,
    render: RenderFn,
    observer: Observer,
    codec: Codec,
    hids: HidAllocator,
    committed: Option<Node>,
    /// Scope owning what the committed render created.
    render_scope: Option<ScopeId>,
    /// hid -> event name -> handler, from the committed snapshot.
    handler_index: HashMap<Hid, IndexMap<String, HandlerId>>,
    inbox: mpsc::UnboundedReceiver<Command>,
    force_render: bool,
}

impl Session {
    /// Create a session. `setup` runs once, creates the session's state and
    /// returns the render function.
    pub fn new<S, R>(config: &RuntimeConfig, setup: S) -> Result<Self, SessionError>
    where
        S: FnOnce(&SessionContext) -> Result<R, RenderError>,
        R: Fn(&SessionContext) -> Result<Node, RenderError> + Send + 'static,
    {
        let id = SessionId::next();
        let runtime = Runtime::with_config(config.reactive.clone());
        let (commands, inbox) = mpsc::unbounded_channel();
        let context = SessionContext::new(id, runtime.clone(), HandlerRegistry::new(), commands);

        let render = match setup(&context) {
            Ok(render) => render,
            Err(error) => {
                runtime.dispose();
                return Err(error.into());
            }
        };
        debug!(session = %id, runtime = %runtime.id(), "session created");

        Ok(Self {
            id,
            state: SessionState::Idle,
            observer: Observer::new(&runtime),
            runtime,
            context,
            render: Box::new(render),
            codec: Codec::new(config.codec.clone()),
            hids: HidAllocator::new(),
            committed: None,
            render_scope: None,
            handler_index: HashMap::new(),
            inbox,
            force_render: false,
        })
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn context(&self) -> &SessionContext {
        &self.context
    }

    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    /// The last snapshot that was successfully encoded.
    pub fn committed(&self) -> Option<&Node> {
        self.committed.as_ref()
    }

    /// Process `command`, then everything already queued, then render if
    /// needed. Returns the encoded patch frame, if there is anything to send.
    pub fn handle(&mut self, command: Command) -> Result<Option<Vec<u8>>, SessionError> {
        self.check_open()?;
        self.apply(command)?;
        if self.state == SessionState::Closed {
            return Ok(None);
        }
        self.pump()
    }

    /// Drain the queue and render if needed.
    pub fn pump(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        self.check_open()?;
        while let Ok(command) = self.inbox.try_recv() {
            self.apply(command)?;
            if self.state == SessionState::Closed {
                return Ok(None);
            }
        }
        self.render()
    }

    /// Render if this is the first pass or an input of the last render
    /// changed.
    pub fn render(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        self.check_open()?;
        let stale = match self.observer.is_stale() {
            Ok(stale) => stale,
            Err(error) => return Err(self.fault(error.into())),
        };
        if self.committed.is_some() && !stale && !self.force_render {
            trace!(session = %self.id, "inputs unchanged; render skipped");
            return Ok(None);
        }
        self.force_render = false;
        self.render_pass()
    }

    /// Tear the session down: every cell, effect and handler is disposed.
    /// Idempotent.
    pub fn close(&mut self) {
        if self.state == SessionState::Closed {
            return;
        }
        self.state = SessionState::Closed;
        self.inbox.close();
        self.runtime.dispose();
        self.handler_index.clear();
        debug!(session = %self.id, "session closed");
    }

    /// Run the session until it is shut down, its queue closes or it fails.
    /// Frames go to `outbound`.
    pub async fn run(mut self, outbound: mpsc::Sender<Vec<u8>>) -> Result<(), SessionError> {
        let result = self.run_inner(&outbound).await;
        self.close();
        result
    }

    async fn run_inner(&mut self, outbound: &mpsc::Sender<Vec<u8>>) -> Result<(), SessionError> {
        if let Some(frame) = self.render()? {
            outbound.send(frame).await.map_err(|_| SessionError::Closed)?;
        }
        while let Some(command) = self.inbox.recv().await {
            let frame = self.handle(command)?;
            if self.state == SessionState::Closed {
                break;
            }
            if let Some(frame) = frame {
                outbound.send(frame).await.map_err(|_| SessionError::Closed)?;
            }
        }
        Ok(())
    }

    fn check_open(&self) -> Result<(), SessionError> {
        match self.state {
            SessionState::Faulted => Err(SessionError::Faulted),
            SessionState::Closed => Err(SessionError::Closed),
            _ => Ok(()),
        }
    }

    fn apply(&mut self, command: Command) -> Result<(), SessionError> {
        trace!(session = %self.id, ?command, "command");
        match command {
            Command::Frame(bytes) => {
                let events = match self.codec.decode_events(&bytes) {
                    Ok(events) => events,
                    Err(violation) => {
                        warn!(session = %self.id, error = %violation, "protocol violation; closing session");
                        self.close();
                        return Err(violation.into());
                    }
                };
                for event in events {
                    self.dispatch(&event)?;
                }
            }
            Command::Event(event) => self.dispatch(&event)?,
            Command::Write(write) => self.write(write)?,
            Command::AsyncResult {
                generation,
                latest,
                apply,
            } => {
                let newest = latest.load(Ordering::Acquire);
                if generation == newest {
                    self.write(apply)?;
                } else {
                    debug!(session = %self.id, generation, newest, "stale async result discarded");
                }
            }
            Command::Render => self.force_render = true,
            Command::Shutdown => self.close(),
        }
        Ok(())
    }

    fn write(&mut self, write: WriteFn) -> Result<(), SessionError> {
        match self.runtime.batch(write).and_then(|result| result) {
            Ok(()) => Ok(()),
            Err(error) => Err(self.fault(error.into())),
        }
    }

    fn dispatch(&mut self, event: &ClientEvent) -> Result<(), SessionError> {
        let bound = self
            .handler_index
            .get(&event.hid)
            .and_then(|events| events.get(event.kind.name()))
            .copied();
        let Some(id) = bound else {
            warn!(session = %self.id, hid = %event.hid, event = %event.kind, "no handler bound; event ignored");
            return Ok(());
        };
        let Some(handler) = self.context.handlers().get(id) else {
            warn!(session = %self.id, hid = %event.hid, handler = %id, "stale handler; event ignored");
            return Ok(());
        };

        trace!(session = %self.id, hid = %event.hid, event = %event.kind, "dispatching");
        match self.runtime.batch(|| handler(event)).and_then(|result| result) {
            Ok(()) => Ok(()),
            Err(error) => Err(self.fault(error.into())),
        }
    }

    #[instrument(level = "debug", skip_all, fields(session = %self.id))]
    fn render_pass(&mut self) -> Result<Option<Vec<u8>>, SessionError> {
        self.state = SessionState::Rendering;
        let scope = self.runtime.create_scope();
        let rendered = self
            .runtime
            .run_in_scope(scope, || self.observer.track(|| (self.render)(&self.context)));
        let tree = match rendered.map_err(RenderError::from).and_then(|result| result) {
            Ok(tree) => tree,
            Err(error) => {
                self.runtime.dispose_scope(scope);
                return Err(self.fault(error.into()));
            }
        };

        self.state = SessionState::Diffing;
        let diff = match diff(self.committed.as_ref(), &tree, &mut self.hids) {
            Ok(diff) => diff,
            Err(error) => {
                self.runtime.dispose_scope(scope);
                return Err(self.fault(error.into()));
            }
        };

        self.state = SessionState::Encoding;
        let frame = self.codec.encode_patches(&diff.patches);

        // Commit.
        self.handler_index = index_handlers(&diff.committed);
        self.committed = Some(diff.committed);
        if let Some(previous) = self.render_scope.replace(scope) {
            self.runtime.dispose_scope(previous);
        }
        self.state = SessionState::Idle;

        debug!(
            patches = diff.patches.len(),
            bytes = frame.len(),
            structural = structural_patch_count(&diff.patches),
            "render pass committed"
        );
        Ok((!diff.patches.is_empty()).then_some(frame))
    }

    fn fault(&mut self, error: SessionError) -> SessionError {
        error!(session = %self.id, %error, "session faulted");
        self.state = SessionState::Faulted;
        error
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("runtime", &self.runtime)
            .finish_non_exhaustive()
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.close();
    }
}

fn index_handlers(tree: &Node) -> HashMap<Hid, IndexMap<String, HandlerId>> {
    let mut index = HashMap::new();
    tree.for_each_element(&mut |element| {
        if let (Some(hid), false) = (element.hid(), element.events().is_empty()) {
            index.insert(hid, element.events().clone());
        }
    });
    index
}

// ---- Tests ----

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::EventType;
    use crate::diff::{LiveTree, Patch};
    use crate::reactive::{SharedSignal, Signal};
    use crate::tree::Element;
    use std::sync::atomic::AtomicI32;

    fn decode(session: &Session, frame: &[u8]) -> Vec<Patch> {
        session.codec().decode_patches(frame).unwrap()
    }

    /// `div[Text(count)]` plus a button that increments `count`.
    fn counter() -> (Session, Signal<i32>) {
        let mut slot = None;
        let session = Session::new(&RuntimeConfig::default(), |cx| {
            let count = cx.signal(0);
            slot = Some(count.clone());
            let increment = cx.handler({
                let count = count.clone();
                move |_| count.update(|n| n + 1)
            });
            Ok(move |_: &SessionContext| {
                Ok(Node::fragment([
                    Element::new("div").child(count.get()?.to_string()).into(),
                    Element::new("button").on("click", increment).child("+").into(),
                ]))
            })
        })
        .unwrap();
        (session, slot.unwrap())
    }

    #[test]
    fn first_render_mounts_the_tree() {
        let (mut session, _) = counter();
        let frame = session.render().unwrap().unwrap();
        let patches = decode(&session, &frame);

        assert_eq!(patches.len(), 2);
        assert!(patches
            .iter()
            .all(|patch| matches!(patch, Patch::AppendChild { parent, .. } if parent.is_mount())));
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn signal_change_yields_set_text_on_root() {
        let mut hids = Vec::new();
        let mut session = Session::new(&RuntimeConfig::default(), |cx| {
            let count = cx.signal(0);
            cx.post({
                let count = count.clone();
                move || count.set(1)
            })
            .unwrap();
            Ok(move |_: &SessionContext| Ok(Element::new("div").child(count.get()?.to_string()).into()))
        })
        .unwrap();

        // The queued write waits for the next pump.
        session.render().unwrap();
        session.committed().unwrap().for_each_element(&mut |e| hids.push(e.hid()));
        assert_eq!(session.committed().unwrap().as_element().unwrap().children()[0].as_text(), Some("0"));

        let frame = session.pump().unwrap().unwrap();
        assert_eq!(
            decode(&session, &frame),
            vec![Patch::SetText {
                target: hids[0].unwrap(),
                text: "1".into()
            }]
        );
    }

    #[test]
    fn click_dispatch_rerenders() {
        let (mut session, count) = counter();
        let mut live = LiveTree::new();
        let first = session.render().unwrap().unwrap();
        live.apply_all(&decode(&session, &first)).unwrap();

        let button = live.children()[1].hid().unwrap();
        let frame = session
            .handle(Command::Frame(session.codec().encode_events(&[ClientEvent::click(button)])))
            .unwrap()
            .unwrap();
        live.apply_all(&decode(&session, &frame)).unwrap();

        assert_eq!(count.get_untracked().unwrap(), 1);
        assert_eq!(live.children()[0].as_element().unwrap().text_content(), "1");
        assert_eq!(live, LiveTree::from_node(session.committed().unwrap()));
    }

    #[test]
    fn unrelated_writes_do_not_render() {
        let mut other = None;
        let mut session = Session::new(&RuntimeConfig::default(), |cx| {
            other = Some(cx.signal(0));
            Ok(|_: &SessionContext| Ok(Element::new("p").into()))
        })
        .unwrap();
        session.render().unwrap();

        let other = other.unwrap();
        assert_eq!(session.handle(Command::Write(Box::new(move || other.set(5)))).unwrap(), None);
        assert!(session.handle(Command::Render).unwrap().is_none());
    }

    #[test]
    fn events_for_unknown_hids_are_ignored() {
        let (mut session, count) = counter();
        session.render().unwrap();
        let frame = session
            .handle(Command::Event(ClientEvent::simple(EventType::Focus, Hid::new(999))))
            .unwrap();
        assert!(frame.is_none());
        assert_eq!(count.get_untracked().unwrap(), 0);
        assert_eq!(session.state(), SessionState::Idle);
    }

    #[test]
    fn render_failure_faults_and_keeps_baseline() {
        let fail = Arc::new(AtomicI32::new(0));
        let mut trigger = None;
        let mut session = Session::new(&RuntimeConfig::default(), |cx| {
            let value = cx.signal(1);
            trigger = Some(value.clone());
            let fail = Arc::clone(&fail);
            Ok(move |_: &SessionContext| {
                let value = value.get()?;
                if fail.load(Ordering::SeqCst) == 1 {
                    return Err(RenderError::Component("boom".into()));
                }
                Ok(Element::new("p").child(value.to_string()).into())
            })
        })
        .unwrap();
        session.render().unwrap();
        let baseline = session.committed().cloned();

        fail.store(1, Ordering::SeqCst);
        let trigger = trigger.unwrap();
        let error = session.handle(Command::Write(Box::new(move || trigger.set(2)))).unwrap_err();
        assert!(matches!(error, SessionError::Render(RenderError::Component(_))));
        assert_eq!(session.state(), SessionState::Faulted);
        assert_eq!(session.committed().cloned(), baseline);
        assert!(matches!(session.handle(Command::Render), Err(SessionError::Faulted)));
    }

    #[test]
    fn duplicate_keys_fault_the_session() {
        let mut session = Session::new(&RuntimeConfig::default(), |_| {
            Ok(|_: &SessionContext| {
                Ok(Element::new("ul")
                    .child(Element::new("li").with_key("a"))
                    .child(Element::new("li").with_key("a"))
                    .into())
            })
        })
        .unwrap();
        assert!(matches!(session.render(), Err(SessionError::Diff(_))));
        assert_eq!(session.state(), SessionState::Faulted);
        assert!(session.committed().is_none());
    }

    #[test]
    fn malformed_frames_close_the_session() {
        let (mut session, _) = counter();
        session.render().unwrap();
        let error = session.handle(Command::Frame(vec![0xee])).unwrap_err();
        assert!(matches!(error, SessionError::Codec(_)));
        assert_eq!(session.state(), SessionState::Closed);
        assert!(session.runtime().is_disposed());
    }

    #[test]
    fn handlers_created_during_render_are_released() {
        let mut session = Session::new(&RuntimeConfig::default(), |cx| {
            let count = cx.signal(0);
            Ok(move |cx: &SessionContext| {
                let count = count.clone();
                let n = count.get()?;
                let id = cx.handler(move |_| count.set(n + 1));
                Ok(Element::new("button").on("click", id).child(n.to_string()).into())
            })
        })
        .unwrap();
        session.render().unwrap();
        let button = session.committed().unwrap().hid().unwrap();
        assert_eq!(session.context().handlers().len(), 1);

        session.handle(Command::Event(ClientEvent::click(button))).unwrap();
        session.handle(Command::Event(ClientEvent::click(button))).unwrap();
        assert_eq!(session.context().handlers().len(), 1);
        assert_eq!(session.committed().unwrap().as_element().unwrap().children()[0].as_text(), Some("2"));
    }

    #[test]
    fn repeated_renders_do_not_grow_the_root_scope() {
        let (mut session, count) = counter();
        session.render().unwrap();
        let resources = session.runtime().root_resource_count();
        let scopes = session.runtime().scope_count();

        for n in 1..=1_000 {
            let count = count.clone();
            session.handle(Command::Write(Box::new(move || count.set(n)))).unwrap();
        }
        assert_eq!(count.get_untracked().unwrap(), 1_000);
        assert_eq!(session.runtime().root_resource_count(), resources);
        assert_eq!(session.runtime().scope_count(), scopes);
    }

    #[test]
    fn stale_async_results_are_discarded() {
        let mut target = None;
        let mut session = Session::new(&RuntimeConfig::default(), |cx| {
            let value = cx.signal(String::new());
            target = Some(value.clone());
            Ok(move |_: &SessionContext| Ok(Element::new("p").child(value.get()?).into()))
        })
        .unwrap();
        session.render().unwrap();

        let target = target.unwrap();
        let latest = Arc::new(AtomicU64::new(2));
        let stale = {
            let target = target.clone();
            Command::AsyncResult {
                generation: 1,
                latest: Arc::clone(&latest),
                apply: Box::new(move || target.set("old".into())),
            }
        };
        assert!(session.handle(stale).unwrap().is_none());

        let fresh = Command::AsyncResult {
            generation: 2,
            latest,
            apply: Box::new(move || target.set("new".into())),
        };
        assert!(session.handle(fresh).unwrap().is_some());
        assert_eq!(session.committed().unwrap().as_element().unwrap().children()[0].as_text(), Some("new"));
    }

    #[test]
    fn shared_cells_reach_bound_sessions() {
        let shared = SharedSignal::new(10);
        let mut session = Session::new(&RuntimeConfig::default(), |cx| {
            let mirror = cx.bind_shared(&shared);
            Ok(move |_: &SessionContext| Ok(Element::new("p").child(mirror.get()?.to_string()).into()))
        })
        .unwrap();
        session.render().unwrap();
        assert_eq!(shared.watcher_count(), 1);

        shared.set(11);
        let frame = session.pump().unwrap().unwrap();
        assert!(matches!(&decode(&session, &frame)[..], [Patch::SetText { text, .. }] if text == "11"));

        session.close();
        assert_eq!(shared.watcher_count(), 0);
    }

    #[test]
    fn async_effects_need_a_tokio_runtime() {
        let result = Session::new(&RuntimeConfig::default(), |cx| {
            let target = cx.signal(0usize);
            cx.spawn_effect(|| Ok(()), |_| async { 1usize }, target)?;
            Ok(|_: &SessionContext| Ok(Node::text("")))
        });
        assert!(matches!(
            result,
            Err(SessionError::Render(RenderError::Reactive(ReactiveError::NoAsyncRuntime)))
        ));
    }

    #[tokio::test]
    async fn async_effect_result_triggers_a_render() {
        let mut session = Session::new(&RuntimeConfig::default(), |cx| {
            let input = cx.signal("abc".to_string());
            let length = cx.signal(0usize);
            cx.spawn_effect(
                move || input.get(),
                |text: String| async move { text.len() },
                length.clone(),
            )?;
            Ok(move |_: &SessionContext| Ok(Element::new("p").child(length.get()?.to_string()).into()))
        })
        .unwrap();
        session.render().unwrap();

        let command = session.inbox.recv().await.unwrap();
        let frame = session.handle(command).unwrap().unwrap();
        assert!(matches!(&decode(&session, &frame)[..], [Patch::SetText { text, .. }] if text == "3"));
    }
}
