//! Cooperative cancellation shared by a group of executors.
//!
//! A [`CancelToken`] is both a flag (checked between instructions) and a
//! wake-up signal: cancelling drops the only sender of an internal channel,
//! which makes every `select!` waiting on [`CancelToken::signal`] ready. That
//! is how an executor blocked on a channel take or put notices cancellation.

use crossbeam_channel::{self as cb};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

struct CancelState {
    flag: AtomicBool,
    trigger: Mutex<Option<cb::Sender<()>>>,
    signal: cb::Receiver<()>,
}

#[derive(Clone)]
pub struct CancelToken(Arc<CancelState>);

impl CancelToken {
    pub fn new() -> Self {
        let (trigger, signal) = cb::bounded(0);
        Self(Arc::new(CancelState {
            flag: AtomicBool::new(false),
            trigger: Mutex::new(Some(trigger)),
            signal,
        }))
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.flag.load(Ordering::Acquire)
    }

    /// Request cancellation. Idempotent.
    pub fn cancel(&self) {
        self.0.flag.store(true, Ordering::Release);
        if let Ok(mut trigger) = self.0.trigger.lock() {
            trigger.take();
        }
    }

    /// Becomes ready (disconnected) once the token is cancelled. Never
    /// carries a message.
    pub fn signal(&self) -> &cb::Receiver<()> {
        &self.0.signal
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CancelToken")
            .field(&self.is_cancelled())
            .finish()
    }
}
