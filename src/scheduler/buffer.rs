//! Bounded FIFO shared between producers and workers.
//!
//! Producers wait in [`JobBuffer::push`] while the buffer is full, workers wait
//! in [`JobBuffer::pop`] while it is empty. After [`JobBuffer::close`] pushes
//! fail fast and pops drain what is left before reporting `None`.
//!
//! A capacity of zero turns the buffer into a rendezvous point: a push only
//! lands when a worker is already waiting to take it.

use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::Notify;

use crate::scheduler::job::Job;

/// A push hit a closed buffer. Carries the rejected job back to the caller.
#[derive(Debug)]
pub struct Closed(pub Job);

#[derive(Debug, Default)]
struct BufferState {
    items: VecDeque<Job>,
    closed: bool,
    /// Workers currently parked in `pop`
    idle_takers: usize,
}

impl BufferState {
    fn has_room(&self, capacity: usize) -> bool {
        if capacity == 0 {
            self.items.len() < self.idle_takers
        } else {
            self.items.len() < capacity
        }
    }
}

enum PopAttempt {
    Ready(Job, bool),
    Exhausted,
    Wait,
}

#[derive(Debug)]
pub struct JobBuffer {
    capacity: usize,
    state: Mutex<BufferState>,
    not_empty: Notify,
    not_full: Notify,
}

impl JobBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(BufferState::default()),
            not_empty: Notify::new(),
            not_full: Notify::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BufferState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a job, waiting while the buffer is full.
    ///
    /// Returns the job inside [`Closed`] if the buffer is closed before the
    /// job could be placed.
    pub async fn push(&self, job: Job) -> Result<(), Closed> {
        loop {
            let notified = self.not_full.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            {
                let mut state = self.lock();
                if state.closed {
                    return Err(Closed(job));
                }
                if state.has_room(self.capacity) {
                    state.items.push_back(job);
                    drop(state);
                    self.not_empty.notify_one();
                    return Ok(());
                }
            }

            notified.await;
        }
    }

    /// Take the oldest job, waiting while the buffer is empty.
    ///
    /// Returns `None` once the buffer is closed and fully drained.
    pub async fn pop(&self) -> Option<Job> {
        loop {
            let notified = self.not_empty.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            let attempt = {
                let mut state = self.lock();
                match state.items.pop_front() {
                    Some(job) => PopAttempt::Ready(job, !state.items.is_empty()),
                    None if state.closed => PopAttempt::Exhausted,
                    None => {
                        state.idle_takers += 1;
                        PopAttempt::Wait
                    }
                }
            };

            match attempt {
                PopAttempt::Ready(job, more) => {
                    self.not_full.notify_one();
                    if more {
                        self.not_empty.notify_one();
                    }
                    return Some(job);
                }
                PopAttempt::Exhausted => return None,
                PopAttempt::Wait => {
                    let _idle = IdleTaker(self);
                    // a rendezvous producer may hand off to us now
                    self.not_full.notify_one();
                    notified.await;
                }
            }
        }
    }

    /// Refuse further pushes and wake every waiter.
    pub fn close(&self) {
        {
            let mut state = self.lock();
            if state.closed {
                return;
            }
            state.closed = true;
        }
        self.not_full.notify_waiters();
        self.not_empty.notify_waiters();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }
}

struct IdleTaker<'a>(&'a JobBuffer);

impl Drop for IdleTaker<'_> {
    fn drop(&mut self) {
        self.0.lock().idle_takers -= 1;
    }
}
