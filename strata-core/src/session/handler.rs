//! Per-session event handler arena.
//!
//! Handler ids are generation-tagged arena indices. Removing a handler bumps
//! its slot's generation, so an id held by a stale client tree stops
//! resolving instead of reaching whatever handler reuses the slot.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::codec::ClientEvent;
use crate::error::ReactiveError;
use crate::graph::{Arena, Index};
use crate::tree::HandlerId;

pub(crate) type HandlerFn = Arc<dyn Fn(&ClientEvent) -> Result<(), ReactiveError> + Send + Sync>;

#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: Arc<Mutex<Arena<HandlerFn>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&self, handler: F) -> HandlerId
    where
        F: Fn(&ClientEvent) -> Result<(), ReactiveError> + Send + Sync + 'static,
    {
        let index = self.handlers.lock().insert(Arc::new(handler));
        HandlerId::from_raw(index.to_bits())
    }

    pub(crate) fn get(&self, id: HandlerId) -> Option<HandlerFn> {
        self.handlers.lock().get(Index::from_bits(id.raw())).cloned()
    }

    pub fn contains(&self, id: HandlerId) -> bool {
        self.handlers.lock().contains(Index::from_bits(id.raw()))
    }

    /// Returns whether the handler was registered.
    pub fn remove(&self, id: HandlerId) -> bool {
        self.handlers.lock().remove(Index::from_bits(id.raw())).is_some()
    }

    pub fn len(&self) -> usize {
        self.handlers.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry").field("len", &self.len()).finish()
    }
}
