//! Typed channels connecting machines to each other and to callers.
//!
//! Built on [`crossbeam_channel`]. A [`Sender`] / [`Receiver`] pair is
//! created by [`channel()`] with an explicit [`ChannelPolicy`] that decides
//! what a put on a full channel does: fail immediately, or wait.
//!
//! The channel is closed by dropping every [`Sender`]; a receiver then drains
//! what is buffered and afterwards reports [`ChannelError::Closed`]. Machines
//! see a closed channel as [`VmError::Interrupted`].

use crate::cancel::CancelToken;
use crossbeam_channel::{self as cb};
use ringvm_core::{Input, Output, VmError};
use std::fmt;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Policy
// ---------------------------------------------------------------------------

/// What a put does when a bounded channel is full.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OnFull {
    /// Reject the value with [`ChannelError::Full`].
    Fail,
    /// Block until the consumer makes room (backpressure).
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChannelPolicy {
    #[default]
    Unbounded,
    Bounded { capacity: usize, on_full: OnFull },
}

impl ChannelPolicy {
    pub fn fail_fast(capacity: usize) -> Self {
        ChannelPolicy::Bounded {
            capacity,
            on_full: OnFull::Fail,
        }
    }

    pub fn backpressure(capacity: usize) -> Self {
        ChannelPolicy::Bounded {
            capacity,
            on_full: OnFull::Block,
        }
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ChannelError {
    #[error("channel is full (capacity {capacity})")]
    Full { capacity: usize },
    #[error("channel is closed")]
    Closed,
    #[error("cancelled while waiting on channel")]
    Cancelled,
}

impl From<ChannelError> for VmError {
    fn from(err: ChannelError) -> Self {
        match err {
            ChannelError::Full { capacity } => VmError::ChannelOverflow { capacity },
            ChannelError::Closed | ChannelError::Cancelled => VmError::Interrupted,
        }
    }
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// The producing half of a channel.
///
/// Clones share the channel; it closes once every clone is dropped.
pub struct Sender<T> {
    inner: cb::Sender<T>,
    policy: ChannelPolicy,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            policy: self.policy,
        }
    }
}

impl<T> fmt::Debug for Sender<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sender")
            .field("policy", &self.policy)
            .field("len", &self.inner.len())
            .finish()
    }
}

impl<T> Sender<T> {
    pub fn put(&self, value: T) -> Result<(), ChannelError> {
        match self.policy {
            ChannelPolicy::Bounded {
                capacity,
                on_full: OnFull::Fail,
            } => self.inner.try_send(value).map_err(|e| match e {
                cb::TrySendError::Full(_) => ChannelError::Full { capacity },
                cb::TrySendError::Disconnected(_) => ChannelError::Closed,
            }),
            _ => self.inner.send(value).map_err(|_| ChannelError::Closed),
        }
    }

    /// Like [`put`](Self::put), but a put waiting on a full channel gives up
    /// once `cancel` fires.
    pub fn put_or_cancel(&self, value: T, cancel: &CancelToken) -> Result<(), ChannelError> {
        match self.policy {
            ChannelPolicy::Bounded {
                on_full: OnFull::Block,
                ..
            } => cb::select! {
                send(self.inner, value) -> res => res.map_err(|_| ChannelError::Closed),
                recv(cancel.signal()) -> _ => Err(ChannelError::Cancelled),
            },
            _ => self.put(value),
        }
    }

    pub fn policy(&self) -> ChannelPolicy {
        self.policy
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Receiver
// ---------------------------------------------------------------------------

/// The consuming half of a channel.
pub struct Receiver<T> {
    inner: cb::Receiver<T>,
}

impl<T> Clone for Receiver<T> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<T> fmt::Debug for Receiver<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("len", &self.inner.len())
            .finish()
    }
}

impl<T> Receiver<T> {
    /// Block until a value is available or the channel is closed and drained.
    pub fn take(&self) -> Result<T, ChannelError> {
        self.inner.recv().map_err(|_| ChannelError::Closed)
    }

    /// Block until a value arrives, the channel closes, or `cancel` fires.
    pub fn take_or_cancel(&self, cancel: &CancelToken) -> Result<T, ChannelError> {
        cb::select! {
            recv(self.inner) -> msg => msg.map_err(|_| ChannelError::Closed),
            recv(cancel.signal()) -> _ => Err(ChannelError::Cancelled),
        }
    }

    /// `Ok(None)` when nothing is buffered but producers remain.
    pub fn try_take(&self) -> Result<Option<T>, ChannelError> {
        match self.inner.try_recv() {
            Ok(value) => Ok(Some(value)),
            Err(cb::TryRecvError::Empty) => Ok(None),
            Err(cb::TryRecvError::Disconnected) => Err(ChannelError::Closed),
        }
    }

    /// Everything currently buffered, without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.inner.try_iter().collect()
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Machine I/O
// ---------------------------------------------------------------------------

impl Input for Receiver<i64> {
    fn take(&mut self) -> Result<i64, VmError> {
        Ok(Receiver::take(self)?)
    }
}

impl Output for Sender<i64> {
    fn put(&mut self, value: i64) -> Result<(), VmError> {
        Ok(Sender::put(self, value)?)
    }
}

// ---------------------------------------------------------------------------
// Constructors
// ---------------------------------------------------------------------------

pub fn channel<T>(policy: ChannelPolicy) -> (Sender<T>, Receiver<T>) {
    let (tx, rx) = match policy {
        ChannelPolicy::Unbounded => cb::unbounded(),
        ChannelPolicy::Bounded { capacity, .. } => cb::bounded(capacity),
    };
    (Sender { inner: tx, policy }, Receiver { inner: rx })
}

pub fn unbounded<T>() -> (Sender<T>, Receiver<T>) {
    channel(ChannelPolicy::Unbounded)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use std::time::Duration;

    // -- unbounded --------------------------------------------------------

    #[test]
    fn unbounded_is_fifo() {
        let (tx, rx) = unbounded::<i64>();
        for v in [5, -1, 7] {
            tx.put(v).unwrap();
        }
        assert_eq!(rx.take().unwrap(), 5);
        assert_eq!(rx.take().unwrap(), -1);
        assert_eq!(rx.take().unwrap(), 7);
    }

    #[test]
    fn take_after_sender_drop_drains_then_closes() {
        let (tx, rx) = unbounded::<i64>();
        tx.put(1).unwrap();
        drop(tx);
        assert_eq!(rx.take().unwrap(), 1);
        assert_eq!(rx.take(), Err(ChannelError::Closed));
    }

    #[test]
    fn put_after_receiver_drop_is_closed() {
        let (tx, rx) = unbounded::<i64>();
        drop(rx);
        assert_eq!(tx.put(1), Err(ChannelError::Closed));
    }

    #[test]
    fn try_take_distinguishes_empty_from_closed() {
        let (tx, rx) = unbounded::<i64>();
        assert_eq!(rx.try_take(), Ok(None));
        tx.put(3).unwrap();
        assert_eq!(rx.try_take(), Ok(Some(3)));
        drop(tx);
        assert_eq!(rx.try_take(), Err(ChannelError::Closed));
    }

    // -- bounded ----------------------------------------------------------

    #[test]
    fn fail_fast_rejects_when_full() {
        let (tx, rx) = channel::<i64>(ChannelPolicy::fail_fast(2));
        tx.put(1).unwrap();
        tx.put(2).unwrap();
        assert_eq!(tx.put(3), Err(ChannelError::Full { capacity: 2 }));
        assert_eq!(rx.drain(), vec![1, 2]);
    }

    #[test]
    fn backpressure_blocks_until_drained() {
        let (tx, rx) = channel::<i64>(ChannelPolicy::backpressure(1));
        tx.put(1).unwrap();

        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            let first = rx.take().unwrap();
            let second = rx.take().unwrap();
            (first, second)
        });

        // Blocks until the consumer takes the first value.
        tx.put(2).unwrap();
        assert_eq!(handle.join().unwrap(), (1, 2));
    }

    // -- machine I/O ------------------------------------------------------

    #[test]
    fn channel_errors_map_to_vm_errors() {
        let (mut tx, rx) = channel::<i64>(ChannelPolicy::fail_fast(1));
        Output::put(&mut tx, 1).unwrap();
        assert_eq!(
            Output::put(&mut tx, 2),
            Err(VmError::ChannelOverflow { capacity: 1 })
        );

        let mut rx = rx;
        assert_eq!(Input::take(&mut rx), Ok(1));
        drop(tx);
        assert_eq!(Input::take(&mut rx), Err(VmError::Interrupted));
    }

    #[test]
    fn cancel_releases_a_blocked_take() {
        let (_tx, rx) = unbounded::<i64>();
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = thread::spawn(move || rx.take_or_cancel(&waiter));
        thread::sleep(Duration::from_millis(10));
        token.cancel();
        assert_eq!(handle.join().unwrap(), Err(ChannelError::Cancelled));
    }

    #[test]
    fn cancel_releases_a_blocked_put() {
        let (tx, _rx) = channel::<i64>(ChannelPolicy::backpressure(1));
        tx.put(1).unwrap();
        let token = CancelToken::new();
        let waiter = token.clone();
        let handle = thread::spawn(move || tx.put_or_cancel(2, &waiter));
        thread::sleep(Duration::from_millis(10));
        token.cancel();
        assert_eq!(handle.join().unwrap(), Err(ChannelError::Cancelled));
    }

    #[test]
    fn single_producer_single_consumer_order() {
        let (tx, rx) = unbounded::<i64>();
        let producer = thread::spawn(move || {
            for v in 0..1000 {
                tx.put(v).unwrap();
            }
        });
        let received: Vec<i64> = (0..1000).map(|_| rx.take().unwrap()).collect();
        producer.join().unwrap();
        assert_eq!(received, (0..1000).collect::<Vec<_>>());
    }
}
