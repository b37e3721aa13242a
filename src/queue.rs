//! Fixed-capacity blocking queue connecting one producer with one
//! consumer.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard};

use log::trace;

use crate::error::{Error, Result};

/// Bounded single-producer/single-consumer queue.
///
/// Reads block while the queue is empty and writes block while it is
/// full. Either side can be shut down: blocked callers on that side wake
/// immediately and fail with [`Error::Interrupted`], as do later calls,
/// until [`abort_shutdown`] re-opens the side. Elements are delivered in
/// FIFO order and are never dropped except by [`clear`] or destruction.
///
/// The queue itself tolerates any number of threads on each side; the
/// single-producer/single-consumer discipline is what the surrounding
/// port machinery maintains.
///
/// [`abort_shutdown`]: BoundedQueue::abort_shutdown
/// [`clear`]: BoundedQueue::clear
pub struct BoundedQueue<T> {
    inner: Mutex<Inner<T>>,
    not_empty: Condvar,
    not_full: Condvar,
}

struct Inner<T> {
    items: VecDeque<T>,
    capacity: usize,
    shut_read: bool,
    shut_write: bool,
}

impl<T> BoundedQueue<T> {
    /// Create a queue holding at most `capacity` elements.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> BoundedQueue<T> {
        assert!(capacity > 0, "queue capacity must be at least 1");
        BoundedQueue {
            inner: Mutex::new(Inner {
                items: VecDeque::with_capacity(capacity),
                capacity,
                shut_read: false,
                shut_write: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }

    /// Append `value`, blocking while the queue is full.
    pub fn write(&self, value: T) -> Result<()> {
        let mut inner = self.lock();
        loop {
            if inner.shut_write {
                return Err(Error::Interrupted);
            }
            if inner.items.len() < inner.capacity {
                break;
            }
            inner = self.wait(&self.not_full, inner);
        }
        inner.items.push_back(value);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Append every element of `values`, blocking as needed.
    ///
    /// Stops at the first shutdown; elements already transferred stay in
    /// the queue.
    pub fn write_fully<I>(&self, values: I) -> Result<()>
    where
        I: IntoIterator<Item = T>,
    {
        for value in values {
            self.write(value)?;
        }
        Ok(())
    }

    /// Remove the oldest element, blocking while the queue is empty.
    pub fn read(&self) -> Result<T> {
        let mut inner = self.lock();
        loop {
            if inner.shut_read {
                return Err(Error::Interrupted);
            }
            if let Some(value) = inner.items.pop_front() {
                drop(inner);
                self.not_full.notify_one();
                return Ok(value);
            }
            inner = self.wait(&self.not_empty, inner);
        }
    }

    /// Read exactly `count` elements, blocking as needed.
    pub fn read_fully(&self, count: usize) -> Result<Vec<T>> {
        let mut out = Vec::with_capacity(count);
        for _ in 0..count {
            out.push(self.read()?);
        }
        Ok(out)
    }

    /// Non-blocking write. The value is handed back if the queue is full
    /// or the write side is shut down.
    pub fn try_write(&self, value: T) -> std::result::Result<(), T> {
        let mut inner = self.lock();
        if inner.shut_write || inner.items.len() >= inner.capacity {
            return Err(value);
        }
        inner.items.push_back(value);
        drop(inner);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Non-blocking read. Pending elements are handed out even while the
    /// read side is shut down, so owners can drain before teardown.
    pub fn try_read(&self) -> Option<T> {
        let mut inner = self.lock();
        let value = inner.items.pop_front();
        if value.is_some() {
            drop(inner);
            self.not_full.notify_one();
        }
        value
    }

    /// Forbid reads and/or writes and wake the corresponding waiters.
    pub fn shutdown(&self, read: bool, write: bool) {
        let mut inner = self.lock();
        if read {
            inner.shut_read = true;
        }
        if write {
            inner.shut_write = true;
        }
        drop(inner);
        trace!("queue shutdown, read:{} write:{}", read, write);
        self.notify_all();
    }

    /// Re-open sides closed by [`shutdown`](BoundedQueue::shutdown).
    pub fn abort_shutdown(&self, read: bool, write: bool) {
        let mut inner = self.lock();
        if read {
            inner.shut_read = false;
        }
        if write {
            inner.shut_write = false;
        }
        drop(inner);
        self.notify_all();
    }

    /// Drop every pending element and wake waiters.
    pub fn clear(&self) {
        let drained: Vec<T> = {
            let mut inner = self.lock();
            inner.items.drain(..).collect()
        };
        drop(drained);
        self.notify_all();
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.lock().capacity
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        // A panicking holder leaves consistent data behind; keep going.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wait<'a>(
        &self,
        cond: &Condvar,
        guard: MutexGuard<'a, Inner<T>>,
    ) -> MutexGuard<'a, Inner<T>> {
        cond.wait(guard).unwrap_or_else(|e| e.into_inner())
    }

    fn notify_all(&self) {
        self.not_empty.notify_all();
        self.not_full.notify_all();
    }
}
