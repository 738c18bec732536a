//! Fixed-capacity pool of shared items
//!
//! Statistics grids are produced for every frame and are too large to be
//! allocated on each of them. A [`SharedItemPool`] allocates a fixed number
//! of items once at [`init`](SharedItemPool::init). Items are handed out as
//! reference-counted [`SharedItem`]s that return to the pool when their last
//! reference is dropped.
//!
//! The pool lock only guards the set of available items. The content of an
//! acquired item is owned by whoever holds it.

use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, error};

use crate::ipa::common::{IpaError, Result};

/// Applied to an item before it is returned to the pool.
pub type ResetFn<T> = fn(&mut T);

/// Reference-counted handle on a pool item.
pub type SharedItem<T> = Arc<PoolItem<T>>;

struct PoolState<T> {
    available: Vec<Box<T>>,
    capacity: usize,
    initialised: bool,
    /// Bumped on every `de_init()` so items from an earlier incarnation are
    /// not returned into a re-initialised pool.
    generation: u64,
    reset: Option<ResetFn<T>>,
}

pub struct SharedItemPool<T> {
    name: String,
    state: Mutex<PoolState<T>>,
}

impl<T> SharedItemPool<T> {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    pub fn is_initialised(&self) -> bool {
        self.state.lock().initialised
    }

    /// Number of items not currently acquired.
    pub fn available_items(&self) -> usize {
        self.state.lock().available.len()
    }

    /// Whether every item is back in the pool.
    pub fn is_full(&self) -> bool {
        let state = self.state.lock();
        state.available.len() == state.capacity
    }

    /// Frees the pool storage.
    ///
    /// Items still acquired are a caller bug. They are reported and freed
    /// when their last reference goes away instead of returning here.
    pub fn de_init(&self) {
        let mut state = self.state.lock();
        if !state.initialised {
            return;
        }

        let outstanding = state.capacity - state.available.len();
        if outstanding > 0 {
            error!(
                pool = %self.name,
                outstanding,
                "Pool destroyed while items are still in use"
            );
        }

        state.available.clear();
        state.available.shrink_to_fit();
        state.capacity = 0;
        state.reset = None;
        state.initialised = false;
        state.generation += 1;
    }

    fn release(&self, item: Box<T>, generation: u64) {
        let mut state = self.state.lock();
        if state.initialised && state.generation == generation {
            state.available.push(item);
        }
    }
}

impl<T: Default + Send + 'static> SharedItemPool<T> {
    pub fn new(name: impl Into<String>) -> Arc<Self> {
        Arc::new(Self {
            name: name.into(),
            state: Mutex::new(PoolState {
                available: Vec::new(),
                capacity: 0,
                initialised: false,
                generation: 0,
                reset: None,
            }),
        })
    }

    /// Allocates `capacity` items. `reset`, when given, is applied to each
    /// item on its way back to the pool.
    pub fn init(&self, capacity: usize, reset: Option<ResetFn<T>>) -> Result<()> {
        let mut state = self.state.lock();
        if state.initialised {
            return Err(IpaError::PoolAlreadyInitialised(self.name.clone()));
        }
        if capacity == 0 {
            return Err(IpaError::InvalidConfiguration(format!(
                "pool {} needs at least one item",
                self.name
            )));
        }

        state.available = (0..capacity).map(|_| Box::new(T::default())).collect();
        state.capacity = capacity;
        state.reset = reset;
        state.initialised = true;

        debug!(pool = %self.name, capacity, "Pool initialised");
        Ok(())
    }

    /// Takes an item out of the pool.
    ///
    /// Fails when the pool is not initialised or has no item left. The pool
    /// never blocks or grows, the caller decides what to do with the frame.
    pub fn acquire_item(self: &Arc<Self>) -> Result<SharedItem<T>> {
        let mut state = self.state.lock();
        if !state.initialised {
            return Err(IpaError::PoolNotInitialised(self.name.clone()));
        }

        let Some(item) = state.available.pop() else {
            error!(pool = %self.name, capacity = state.capacity, "Pool exhausted");
            return Err(IpaError::PoolExhausted {
                pool: self.name.clone(),
            });
        };

        Ok(Arc::new(PoolItem {
            item: ManuallyDrop::new(item),
            generation: state.generation,
            reset: state.reset,
            pool: Arc::downgrade(self),
        }))
    }
}

impl<T> Drop for SharedItemPool<T> {
    fn drop(&mut self) {
        self.de_init();
    }
}

/// An item borrowed from a [`SharedItemPool`].
pub struct PoolItem<T> {
    item: ManuallyDrop<Box<T>>,
    generation: u64,
    reset: Option<ResetFn<T>>,
    pool: Weak<SharedItemPool<T>>,
}

impl<T> Deref for PoolItem<T> {
    type Target = T;

    fn deref(&self) -> &T {
        &self.item
    }
}

impl<T> DerefMut for PoolItem<T> {
    fn deref_mut(&mut self) -> &mut T {
        &mut self.item
    }
}

impl<T> Drop for PoolItem<T> {
    fn drop(&mut self) {
        // SAFETY: `item` is never accessed again once the handle is dropped.
        let mut item = unsafe { ManuallyDrop::take(&mut self.item) };

        if let Some(pool) = self.pool.upgrade() {
            if let Some(reset) = self.reset {
                reset(&mut item);
            }
            pool.release(item, self.generation);
        }
    }
}
