// SPDX-FileCopyrightText: 2025 Caspar Water Company
//
// SPDX-License-Identifier: Apache-2.0

//! Cooperative delivery of completions.
//!
//! Every result and every fired watcher goes through a [`Scheduler`]: a queue
//! ordered by (due time, enqueue sequence) on a virtual millisecond clock. With
//! a zero delay window the queue is a plain FIFO. Nothing runs until somebody
//! drives the queue, either by awaiting a [`Deferred`] or by calling
//! [`Scheduler::run_until_idle`], so no completion can arrive before control
//! has returned to the caller that issued it.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, Waker};

type Job = Box<dyn FnOnce() + Send + 'static>;

/// Lock a mutex, ignoring poisoning.
///
/// Every critical section in this crate leaves its state consistent before it
/// can call out to user code, so a panic elsewhere never leaves a half update.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

struct State {
    queue: BTreeMap<(u64, u64), Job>,
    now: u64,
    next_seq: u64,
    min_delay: u64,
    max_delay: u64,
    rng: StdRng,
}

impl State {
    fn draw_delay(&mut self) -> u64 {
        if self.max_delay == 0 {
            0
        } else {
            self.rng.gen_range(self.min_delay..=self.max_delay)
        }
    }
}

#[derive(Clone)]
pub struct Scheduler(Arc<Mutex<State>>);

impl Scheduler {
    /// A scheduler with a `[min_delay_ms, max_delay_ms]` latency window.
    ///
    /// Callers validate `min_delay_ms <= max_delay_ms`.
    pub fn new(min_delay_ms: u64, max_delay_ms: u64, seed: u64) -> Self {
        Self(Arc::new(Mutex::new(State {
            queue: BTreeMap::new(),
            now: 0,
            next_seq: 0,
            min_delay: min_delay_ms,
            max_delay: max_delay_ms,
            rng: StdRng::seed_from_u64(seed),
        })))
    }

    /// Queues `job` to run on a later turn.
    pub fn schedule<F>(&self, job: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let mut state = lock(&self.0);
        let due = state.now + state.draw_delay();
        let seq = state.next_seq;
        state.next_seq += 1;
        _ = state.queue.insert((due, seq), Box::new(job));
    }

    /// Queues delivery of `value` and returns the future that receives it.
    pub fn defer<T>(&self, value: T) -> Deferred<T>
    where
        T: Send + 'static,
    {
        let slot = Arc::new(Mutex::new(Slot {
            value: None,
            waker: None,
        }));
        let target = slot.clone();
        self.schedule(move || {
            let waker = {
                let mut slot = lock(&target);
                slot.value = Some(value);
                slot.waker.take()
            };
            if let Some(waker) = waker {
                waker.wake();
            }
        });
        Deferred {
            slot,
            scheduler: self.clone(),
        }
    }

    /// Runs the earliest queued job. Returns false if the queue was empty.
    pub fn step(&self) -> bool {
        let job = {
            let mut state = lock(&self.0);
            match state.queue.pop_first() {
                Some(((due, _), job)) => {
                    state.now = state.now.max(due);
                    job
                }
                None => return false,
            }
        };
        // Run outside the lock: jobs may schedule more work.
        job();
        true
    }

    /// Runs queued jobs until none remain. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut count = 0;
        while self.step() {
            count += 1;
        }
        count
    }

    /// Number of queued jobs
    pub fn pending(&self) -> usize {
        lock(&self.0).queue.len()
    }

    /// The virtual clock, in milliseconds
    pub fn now(&self) -> u64 {
        lock(&self.0).now
    }
}

impl std::fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = lock(&self.0);
        f.debug_struct("Scheduler")
            .field("now", &state.now)
            .field("pending", &state.queue.len())
            .finish()
    }
}

struct Slot<T> {
    value: Option<T>,
    waker: Option<Waker>,
}

/// The eventual result of a store operation.
///
/// Polling drives the shared scheduler one job at a time until this
/// completion has been delivered, which keeps delivery order identical to
/// enqueue order (or to due order when a delay window is configured).
#[must_use = "a deferred completion does nothing unless awaited"]
pub struct Deferred<T> {
    slot: Arc<Mutex<Slot<T>>>,
    scheduler: Scheduler,
}

impl<T> Deferred<T> {
    /// True once the scheduler has delivered the value.
    pub fn is_ready(&self) -> bool {
        lock(&self.slot).value.is_some()
    }

    /// Blocks the current thread until the value is delivered.
    ///
    /// Must not be called from inside a watcher or listener callback.
    pub fn wait(self) -> T {
        futures::executor::block_on(self)
    }
}

impl<T> Future for Deferred<T> {
    type Output = T;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<T> {
        let this = self.get_mut();
        loop {
            {
                let mut slot = lock(&this.slot);
                if let Some(value) = slot.value.take() {
                    return Poll::Ready(value);
                }
                slot.waker = Some(cx.waker().clone());
            }
            if !this.scheduler.step() {
                // Another thread popped our job and is about to deliver it.
                let mut slot = lock(&this.slot);
                return match slot.value.take() {
                    Some(value) => Poll::Ready(value),
                    None => Poll::Pending,
                };
            }
        }
    }
}

impl<T> std::fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Deferred")
            .field("ready", &self.is_ready())
            .finish()
    }
}
