//! Frame-batched callback scheduling.
//!
//! Work scheduled during a frame is collected into a batch and run once on
//! the next frame the [`FrameHost`] delivers. A callback scheduled several
//! times before the frame runs once; identity is the `Rc` allocation.

use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::rc::{Rc, Weak};

use tempera_carton::IndexMap;

use crate::error::{Error, Result};

/// A schedulable unit of work.
pub type Callback = Rc<dyn Fn() -> Result<()>>;

/// Something that can run a closure "on the next frame".
pub trait FrameHost {
    fn request_frame(&self, frame: Box<dyn FnOnce()>);
}

/// A [`FrameHost`] whose frames only run when asked to.
#[derive(Clone, Default)]
pub struct ManualFrames {
    queue: Rc<RefCell<VecDeque<Box<dyn FnOnce()>>>>,
}

impl ManualFrames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of frames waiting to run.
    pub fn pending(&self) -> usize {
        self.queue.borrow().len()
    }

    /// Run the frames requested so far. Frames requested while running wait
    /// for the next call. Returns how many ran.
    pub fn run_frame(&self) -> usize {
        let frames: Vec<_> = self.queue.borrow_mut().drain(..).collect();
        let count = frames.len();
        for frame in frames {
            frame();
        }
        count
    }

    /// Run frames until none are left, up to `limit` rounds.
    pub fn run_until_idle(&self, limit: usize) -> usize {
        let mut rounds = 0;
        while rounds < limit && self.run_frame() > 0 {
            rounds += 1;
        }
        rounds
    }
}

impl FrameHost for ManualFrames {
    fn request_frame(&self, frame: Box<dyn FnOnce()>) {
        self.queue.borrow_mut().push_back(frame);
    }
}

struct SchedulerState {
    host: Box<dyn FrameHost>,
    /// Keyed by the callback's allocation address, in scheduling order
    batch: RefCell<IndexMap<usize, Callback>>,
    pending: Cell<bool>,
    errors: RefCell<Vec<Error>>,
}

/// Deduplicating frame scheduler. Clones share one batch.
#[derive(Clone)]
pub struct Scheduler {
    state: Rc<SchedulerState>,
}

impl Scheduler {
    pub fn new(host: impl FrameHost + 'static) -> Self {
        Self {
            state: Rc::new(SchedulerState {
                host: Box::new(host),
                batch: RefCell::new(IndexMap::default()),
                pending: Cell::new(false),
                errors: RefCell::new(Vec::new()),
            }),
        }
    }

    /// Add `callback` to the next batch and return it.
    ///
    /// The first schedule in an idle scheduler requests a frame. Scheduling
    /// while a batch runs lands in the following batch.
    pub fn schedule(&self, callback: Callback) -> Callback {
        self.state
            .batch
            .borrow_mut()
            .entry(address(&callback))
            .or_insert_with(|| callback.clone());
        if !self.state.pending.replace(true) {
            tracing::trace!("requesting frame");
            let state: Weak<SchedulerState> = Rc::downgrade(&self.state);
            self.state.host.request_frame(Box::new(move || {
                if let Some(state) = state.upgrade() {
                    Scheduler { state }.flush();
                }
            }));
        }
        callback
    }

    /// Whether a frame has been requested and not yet run.
    pub fn is_pending(&self) -> bool {
        self.state.pending.get()
    }

    /// Run the current batch. Returns how many callbacks ran.
    ///
    /// Failures are logged and kept for [`Scheduler::take_errors`]; the
    /// remaining callbacks still run.
    fn flush(&self) -> usize {
        let batch = std::mem::take(&mut *self.state.batch.borrow_mut());
        self.state.pending.set(false);
        tracing::trace!(callbacks = batch.len(), "running batch");
        for callback in batch.values() {
            if let Err(err) = callback() {
                tracing::error!("scheduled callback failed: {err}");
                self.state.errors.borrow_mut().push(err);
            }
        }
        batch.len()
    }

    /// Errors raised by callbacks since the last call.
    pub fn take_errors(&self) -> Vec<Error> {
        std::mem::take(&mut *self.state.errors.borrow_mut())
    }
}

fn address(callback: &Callback) -> usize {
    Rc::as_ptr(callback) as *const () as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter() -> (Rc<Cell<u32>>, Callback) {
        let count = Rc::new(Cell::new(0));
        let seen = count.clone();
        let callback: Callback = Rc::new(move || {
            seen.set(seen.get() + 1);
            Ok(())
        });
        (count, callback)
    }

    #[test]
    fn test_same_callback_runs_once_per_frame() {
        let frames = ManualFrames::new();
        let scheduler = Scheduler::new(frames.clone());
        let (count, callback) = counter();

        scheduler.schedule(callback.clone());
        scheduler.schedule(callback.clone());
        scheduler.schedule(callback);
        assert_eq!(frames.pending(), 1);
        assert!(scheduler.is_pending());

        frames.run_frame();
        assert_eq!(count.get(), 1);
        assert!(!scheduler.is_pending());
    }

    #[test]
    fn test_insertion_order() {
        let frames = ManualFrames::new();
        let scheduler = Scheduler::new(frames.clone());
        let order = Rc::new(RefCell::new(Vec::new()));
        let callbacks: Vec<Callback> = (0..3)
            .map(|i| {
                let order = order.clone();
                Rc::new(move || {
                    order.borrow_mut().push(i);
                    Ok(())
                }) as Callback
            })
            .collect();
        scheduler.schedule(callbacks[2].clone());
        scheduler.schedule(callbacks[0].clone());
        scheduler.schedule(callbacks[2].clone());
        scheduler.schedule(callbacks[1].clone());
        frames.run_frame();
        assert_eq!(*order.borrow(), vec![2, 0, 1]);
    }

    #[test]
    fn test_reschedule_during_batch_lands_in_next_frame() {
        let frames = ManualFrames::new();
        let scheduler = Scheduler::new(frames.clone());
        let count = Rc::new(Cell::new(0));
        let slot: Rc<RefCell<Option<Callback>>> = Rc::default();

        let callback: Callback = {
            let scheduler = scheduler.clone();
            let count = count.clone();
            let slot = slot.clone();
            Rc::new(move || {
                count.set(count.get() + 1);
                if count.get() == 1 {
                    if let Some(me) = slot.borrow().clone() {
                        scheduler.schedule(me);
                    }
                }
                Ok(())
            })
        };
        *slot.borrow_mut() = Some(callback.clone());

        scheduler.schedule(callback);
        assert_eq!(frames.run_frame(), 1);
        assert_eq!(count.get(), 1);
        assert_eq!(frames.pending(), 1);
        frames.run_frame();
        assert_eq!(count.get(), 2);
        *slot.borrow_mut() = None;
    }

    #[test]
    fn test_failures_do_not_stop_the_batch() {
        let frames = ManualFrames::new();
        let scheduler = Scheduler::new(frames.clone());
        let failing: Callback = Rc::new(|| Err(Error::type_error("nope")));
        let (count, callback) = counter();
        scheduler.schedule(failing);
        scheduler.schedule(callback);
        frames.run_frame();
        assert_eq!(count.get(), 1);
        assert_eq!(scheduler.take_errors().len(), 1);
        assert!(scheduler.take_errors().is_empty());
    }
}
