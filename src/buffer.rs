//! Bounded frame buffer shared between the SDK callback thread and consumers.
//!
//! Producers never block: when the buffer is full the oldest item is evicted to make room.
//! Consumers either poll or wait (optionally with a timeout) for the next item.
//!
//! Every item taken by `get` counts as processed, so [`FrameBuffer::join`] returns once
//! everything that was put has been consumed or evicted.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use log::trace;

use crate::error::{Result, ToupcamError};
use crate::frame::Frame;

/// Capacity of the buffer a camera session creates when none is supplied.
pub const DEFAULT_CAPACITY: usize = 10;

struct State<T> {
    items: VecDeque<T>,
    unfinished: usize,
    dropped: u64,
    closed: bool,
}

struct Shared<T> {
    state: Mutex<State<T>>,
    not_empty: Condvar,
    all_done: Condvar,
    capacity: Option<usize>,
}

/// Fixed-capacity FIFO with drop-oldest overflow.
///
/// Cloning yields another handle to the same queue.
pub struct FrameBuffer<T = Frame> {
    shared: Arc<Shared<T>>,
}

impl<T> Clone for FrameBuffer<T> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T> std::fmt::Debug for FrameBuffer<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.lock();
        f.debug_struct("FrameBuffer")
            .field("len", &state.items.len())
            .field("capacity", &self.shared.capacity)
            .field("dropped", &state.dropped)
            .field("closed", &state.closed)
            .finish()
    }
}

impl<T> Default for FrameBuffer<T> {
    fn default() -> Self {
        Self::with_capacity(Some(DEFAULT_CAPACITY))
    }
}

impl<T> FrameBuffer<T> {
    /// Buffer holding at most `capacity` items. Zero is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(ToupcamError::InvalidCapacity);
        }
        Ok(Self::with_capacity(Some(capacity)))
    }

    /// Buffer that never evicts.
    pub fn unbounded() -> Self {
        Self::with_capacity(None)
    }

    fn with_capacity(capacity: Option<usize>) -> Self {
        let items = VecDeque::with_capacity(capacity.unwrap_or(0));
        Self {
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    items,
                    unfinished: 0,
                    dropped: 0,
                    closed: false,
                }),
                not_empty: Condvar::new(),
                all_done: Condvar::new(),
                capacity,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State<T>> {
        self.shared.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append `item`, evicting the oldest item first if the buffer is full.
    ///
    /// Fails only with [`ToupcamError::Closed`].
    pub fn put(&self, item: T) -> Result<()> {
        let mut state = self.lock();
        if state.closed {
            return Err(ToupcamError::Closed);
        }
        if let Some(capacity) = self.shared.capacity {
            while state.items.len() >= capacity {
                if state.items.pop_front().is_none() {
                    break;
                }
                state.dropped += 1;
                Self::mark_done(&self.shared, &mut state, 1);
                trace!("frame buffer full, dropped oldest item ({} dropped so far)", state.dropped);
            }
        }
        state.items.push_back(item);
        state.unfinished += 1;
        drop(state);
        self.shared.not_empty.notify_one();
        Ok(())
    }

    /// Remove and return the oldest item.
    ///
    /// With `block == false` an empty buffer fails immediately with [`ToupcamError::Empty`].
    /// With `block == true` the call waits for an item; if `timeout` is set and elapses
    /// first it fails with [`ToupcamError::Empty`]. A closed and drained buffer fails with
    /// [`ToupcamError::Closed`].
    pub fn get(&self, block: bool, timeout: Option<Duration>) -> Result<T> {
        let mut state = self.lock();
        if block {
            // A timeout too large to represent is the same as none.
            let deadline = timeout.and_then(|t| Instant::now().checked_add(t));
            while state.items.is_empty() && !state.closed {
                state = match deadline {
                    None => self
                        .shared
                        .not_empty
                        .wait(state)
                        .unwrap_or_else(|e| e.into_inner()),
                    Some(deadline) => {
                        let now = Instant::now();
                        if now >= deadline {
                            return Err(ToupcamError::Empty);
                        }
                        self.shared
                            .not_empty
                            .wait_timeout(state, deadline - now)
                            .unwrap_or_else(|e| e.into_inner())
                            .0
                    }
                };
            }
        }
        match state.items.pop_front() {
            Some(item) => {
                Self::mark_done(&self.shared, &mut state, 1);
                Ok(item)
            }
            None if state.closed => Err(ToupcamError::Closed),
            None => Err(ToupcamError::Empty),
        }
    }

    /// Non-blocking `get`.
    pub fn try_get(&self) -> Result<T> {
        self.get(false, None)
    }

    /// Blocking `get` that gives up after `timeout`.
    pub fn get_timeout(&self, timeout: Duration) -> Result<T> {
        self.get(true, Some(timeout))
    }

    fn mark_done(shared: &Shared<T>, state: &mut State<T>, count: usize) {
        state.unfinished = state.unfinished.saturating_sub(count);
        if state.unfinished == 0 {
            shared.all_done.notify_all();
        }
    }

    /// Wait until every item put so far has been taken or evicted.
    pub fn join(&self) {
        let mut state = self.lock();
        while state.unfinished > 0 {
            state = self
                .shared
                .all_done
                .wait(state)
                .unwrap_or_else(|e| e.into_inner());
        }
    }

    /// Like [`Self::join`] but gives up after `timeout`. Returns `true` if drained.
    pub fn join_timeout(&self, timeout: Duration) -> bool {
        let Some(deadline) = Instant::now().checked_add(timeout) else {
            self.join();
            return true;
        };
        let mut state = self.lock();
        while state.unfinished > 0 {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            state = self
                .shared
                .all_done
                .wait_timeout(state, deadline - now)
                .unwrap_or_else(|e| e.into_inner())
                .0;
        }
        true
    }

    /// Refuse further puts and wake every waiting consumer.
    ///
    /// Items already queued can still be taken.
    pub fn close(&self) {
        self.lock().closed = true;
        self.shared.not_empty.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Discard every queued item, counting them as processed.
    pub fn clear(&self) {
        let mut state = self.lock();
        let n = state.items.len();
        state.items.clear();
        Self::mark_done(&self.shared, &mut state, n);
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        match self.shared.capacity {
            Some(capacity) => self.lock().items.len() >= capacity,
            None => false,
        }
    }

    /// `None` for an unbounded buffer.
    pub fn capacity(&self) -> Option<usize> {
        self.shared.capacity
    }

    /// Items evicted by the drop-oldest rule since creation.
    pub fn dropped(&self) -> u64 {
        self.lock().dropped
    }

    /// Items put but not yet taken or evicted.
    pub fn unfinished(&self) -> usize {
        self.lock().unfinished
    }
}
