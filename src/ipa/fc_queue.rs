//! Frame context queue
//!
//! Algorithms keep per-frame state between the moment a request is queued
//! and the moment the ISP consumes the parameters computed from it. The
//! [`FcQueue`] is a fixed-size ring of such records addressed by frame
//! sequence number.
//!
//! A record must be [`FcQueue::initialise`]d when its request is queued
//! before being accessed through [`FcQueue::get`]. A `get` on a frame that
//! was never initialised still returns a usable record, flagged with
//! [`ErrorFlags::PREMATURE_FRAME_CONTEXT`] so the fault can be reported with
//! the request.
//!
//! The capacity must exceed the pipeline depth. A frame that lags more than
//! `N` frames behind the newest request has its slot reused and its state
//! overwritten.

use bitflags::bitflags;
use tracing::warn;

/// Default number of in-flight frame contexts.
pub const MAX_FRAME_CONTEXTS: usize = 16;

bitflags! {
    /// Per-frame error annotations travelling back with the request.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ErrorFlags: u32 {
        /// The record was accessed with `get()` before `initialise()`.
        const PREMATURE_FRAME_CONTEXT = 1 << 0;
    }
}

/// Common header of every frame context.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IpaFrameContext {
    pub frame: u32,
    pub error: ErrorFlags,
}

/// A pipeline specific frame context embedding an [`IpaFrameContext`].
pub trait FrameContextRecord: Default {
    fn base(&self) -> &IpaFrameContext;
    fn base_mut(&mut self) -> &mut IpaFrameContext;
}

impl FrameContextRecord for IpaFrameContext {
    fn base(&self) -> &IpaFrameContext {
        self
    }

    fn base_mut(&mut self) -> &mut IpaFrameContext {
        self
    }
}

#[derive(Debug, Default)]
struct Slot<C> {
    valid: bool,
    context: C,
}

/// Ring of `N` frame contexts indexed by `frame % N`.
#[derive(Debug)]
pub struct FcQueue<C: FrameContextRecord, const N: usize = MAX_FRAME_CONTEXTS> {
    slots: [Slot<C>; N],
}

impl<C: FrameContextRecord, const N: usize> Default for FcQueue<C, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: FrameContextRecord, const N: usize> FcQueue<C, N> {
    const CAPACITY: usize = {
        assert!(N > 0, "frame context queue needs at least one slot");
        N
    };

    pub fn new() -> Self {
        Self {
            slots: std::array::from_fn(|_| Slot::default()),
        }
    }

    pub const fn capacity(&self) -> usize {
        Self::CAPACITY
    }

    /// Whether `delay` frames of latency between queueing a request and
    /// preparing its parameters fit in the ring without reusing a live slot.
    pub const fn supports_latency(&self, delay: u32) -> bool {
        (delay as usize) < Self::CAPACITY
    }

    fn index(frame: u32) -> usize {
        frame as usize % Self::CAPACITY
    }

    /// Resets every slot to the uninitialised state.
    pub fn clear(&mut self) {
        for slot in self.slots.iter_mut() {
            *slot = Slot::default();
        }
    }

    /// Prepares the record of a newly queued `frame`.
    ///
    /// Any record previously held by the slot, for an older frame, is
    /// replaced by a fresh one. Initialising the same frame twice is a
    /// protocol violation: it is logged and the existing record is returned
    /// untouched.
    pub fn initialise(&mut self, frame: u32) -> &mut C {
        let slot = &mut self.slots[Self::index(frame)];

        if slot.valid && slot.context.base().frame == frame {
            warn!(frame, "Frame context already initialised");
            return &mut slot.context;
        }

        Self::reset_slot(slot, frame);
        &mut slot.context
    }

    /// Returns the record of `frame`.
    ///
    /// If `frame` was never initialised the slot is initialised on the spot
    /// and the record is flagged [`ErrorFlags::PREMATURE_FRAME_CONTEXT`].
    pub fn get(&mut self, frame: u32) -> &mut C {
        let slot = &mut self.slots[Self::index(frame)];

        if slot.valid && slot.context.base().frame == frame {
            return &mut slot.context;
        }

        warn!(frame, "Obtained an uninitialised FrameContext");
        Self::reset_slot(slot, frame);
        slot.context.base_mut().error |= ErrorFlags::PREMATURE_FRAME_CONTEXT;
        &mut slot.context
    }

    /// Returns the record of `frame` if it is currently held by the queue.
    pub fn peek(&self, frame: u32) -> Option<&C> {
        let slot = &self.slots[Self::index(frame)];
        (slot.valid && slot.context.base().frame == frame).then_some(&slot.context)
    }

    fn reset_slot(slot: &mut Slot<C>, frame: u32) {
        slot.context = C::default();
        slot.context.base_mut().frame = frame;
        slot.valid = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tracing_test::traced_test;

    #[derive(Debug, Default)]
    struct TestContext {
        base: IpaFrameContext,
        gain: f32,
    }

    impl FrameContextRecord for TestContext {
        fn base(&self) -> &IpaFrameContext {
            &self.base
        }

        fn base_mut(&mut self) -> &mut IpaFrameContext {
            &mut self.base
        }
    }

    #[test]
    fn test_initialise_then_get_has_no_error() {
        let mut queue = FcQueue::<TestContext>::new();
        queue.initialise(5).gain = 2.0;

        let fc = queue.get(5);
        assert_eq!(fc.base.frame, 5);
        assert!(fc.base.error.is_empty());
        assert_eq!(fc.gain, 2.0);
    }

    #[test]
    #[traced_test]
    fn test_get_without_initialise_is_flagged() {
        let mut queue = FcQueue::<TestContext>::new();

        let fc = queue.get(3);
        assert_eq!(fc.base.frame, 3);
        assert!(fc.base.error.contains(ErrorFlags::PREMATURE_FRAME_CONTEXT));
        assert!(logs_contain("Obtained an uninitialised FrameContext"));

        // The slot is now live, a second get does not raise anything new.
        fc.gain = 1.5;
        let fc = queue.get(3);
        assert_eq!(fc.gain, 1.5);
    }

    #[test]
    fn test_frame_zero_is_a_real_frame() {
        let mut queue = FcQueue::<TestContext>::new();

        let fc = queue.get(0);
        assert!(fc.base.error.contains(ErrorFlags::PREMATURE_FRAME_CONTEXT));

        queue.clear();
        queue.initialise(0).gain = 4.0;
        let fc = queue.get(0);
        assert!(fc.base.error.is_empty());
        assert_eq!(fc.gain, 4.0);
    }

    #[test]
    #[traced_test]
    fn test_double_initialise_keeps_state() {
        let mut queue = FcQueue::<TestContext>::new();
        queue.initialise(7).gain = 3.0;

        let fc = queue.initialise(7);
        assert_eq!(fc.gain, 3.0);
        assert_eq!(fc.base.frame, 7);
        assert!(logs_contain("Frame context already initialised"));
    }

    #[test]
    fn test_double_initialise_keeps_premature_flag() {
        let mut queue = FcQueue::<TestContext>::new();
        queue.get(9);

        let fc = queue.initialise(9);
        assert!(fc.base.error.contains(ErrorFlags::PREMATURE_FRAME_CONTEXT));
    }

    #[test]
    fn test_wraparound_overwrites_slot() {
        let mut queue = FcQueue::<TestContext>::new();
        let capacity = queue.capacity() as u32;

        queue.initialise(2).gain = 8.0;
        let fc = queue.initialise(2 + capacity);
        assert_eq!(fc.base.frame, 2 + capacity);
        assert_eq!(fc.gain, 0.0);

        assert!(queue.peek(2).is_none());
        let fc = queue.get(2);
        assert!(fc.base.error.contains(ErrorFlags::PREMATURE_FRAME_CONTEXT));
    }

    #[test]
    fn test_sequence_wrap_does_not_panic() {
        let mut queue = FcQueue::<TestContext, 4>::new();
        queue.initialise(u32::MAX).gain = 1.0;
        queue.initialise(0);

        assert_eq!(queue.peek(u32::MAX).map(|fc| fc.gain), Some(1.0));
        assert!(queue.peek(0).is_some());
    }

    #[test]
    fn test_clear_resets_all_slots() {
        let mut queue = FcQueue::<TestContext>::new();
        for frame in 0..queue.capacity() as u32 {
            queue.initialise(frame);
        }

        queue.clear();
        for frame in 0..queue.capacity() as u32 {
            assert!(queue.peek(frame).is_none());
        }
    }

    #[test]
    fn test_latency_must_fit_capacity() {
        let queue = FcQueue::<IpaFrameContext>::new();
        assert!(queue.supports_latency(4));
        assert!(queue.supports_latency(15));
        assert!(!queue.supports_latency(16));
    }
}
