//! One OS thread per machine.
//!
//! [`spawn`] moves a [`Machine`] and its two channel ends onto a dedicated,
//! named thread and steps it until it halts. The thread also stops when:
//!
//! - the machine faults (the shared [`CancelToken`] is then tripped so that
//!   sibling executors stop at their next instruction),
//! - its input edge closes (surfaced as [`VmError::Interrupted`]),
//! - the token is cancelled from outside, including while the machine is
//!   blocked on a channel.
//!
//! An output edge whose consumer has already halted accepts values and drops
//! them: nothing can read them any more, and the producer must still be able
//! to finish. Once the token is cancelled the same closed edge is an
//! interruption instead.
//!
//! The returned [`Executor`] must be joined; a panic on the thread is caught
//! at the join and reported as [`ExecutorError::Panicked`].

use crate::cancel::CancelToken;
use crate::channel::{ChannelError, Receiver, Sender};
use ringvm_core::{Input, Machine, Output, StepOutcome, VmError};
use serde::Serialize;
use std::any::Any;
use std::fmt;
use std::io;
use std::thread::{self, JoinHandle};
use thiserror::Error;
use tracing::{debug, trace};

// ---------------------------------------------------------------------------
// Reports and errors
// ---------------------------------------------------------------------------

/// Summary of a machine that ran to halt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MachineReport {
    pub index: usize,
    pub steps: u64,
    /// Number of values the machine emitted.
    pub emitted: usize,
    pub last_output: Option<i64>,
    #[serde(skip_serializing)]
    pub memory: Vec<i64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutorError {
    #[error(transparent)]
    Machine(#[from] VmError),
    #[error("executor panicked: {0}")]
    Panicked(String),
}

impl ExecutorError {
    /// Whether this error is only a consequence of another executor stopping.
    pub fn is_cascade(&self) -> bool {
        matches!(self, ExecutorError::Machine(VmError::Interrupted))
    }
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

pub struct Executor {
    index: usize,
    handle: JoinHandle<Result<MachineReport, VmError>>,
}

impl fmt::Debug for Executor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Executor")
            .field("index", &self.index)
            .field("finished", &self.handle.is_finished())
            .finish()
    }
}

impl Executor {
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread to end.
    pub fn join(self) -> Result<MachineReport, ExecutorError> {
        match self.handle.join() {
            Ok(result) => result.map_err(ExecutorError::from),
            Err(payload) => Err(ExecutorError::Panicked(panic_message(payload))),
        }
    }
}

/// Start `machine` on its own thread, reading from `input` and writing to
/// `output`.
pub fn spawn(
    index: usize,
    machine: Machine,
    input: Receiver<i64>,
    output: Sender<i64>,
    cancel: CancelToken,
) -> io::Result<Executor> {
    let handle = thread::Builder::new()
        .name(format!("ringvm-machine-{}", index))
        .spawn(move || drive(index, machine, input, output, cancel))?;
    Ok(Executor { index, handle })
}

fn drive(
    index: usize,
    mut machine: Machine,
    input: Receiver<i64>,
    output: Sender<i64>,
    cancel: CancelToken,
) -> Result<MachineReport, VmError> {
    debug!(machine = index, "executor started");
    let mut input = Inbound {
        rx: input,
        cancel: cancel.clone(),
    };
    let mut tap = Tap::new(output, cancel.clone());
    loop {
        if cancel.is_cancelled() {
            debug!(machine = index, "executor cancelled");
            return Err(VmError::Interrupted);
        }
        match machine.step(&mut input, &mut tap) {
            Ok(StepOutcome::Continue) => {}
            Ok(StepOutcome::Halted) => break,
            Err(err) => {
                if !matches!(err, VmError::Interrupted) {
                    cancel.cancel();
                }
                debug!(machine = index, error = %err, "executor stopped");
                return Err(err);
            }
        }
    }
    debug!(machine = index, steps = machine.steps(), emitted = tap.emitted, "executor finished");
    Ok(MachineReport {
        index,
        steps: machine.steps(),
        emitted: tap.emitted,
        last_output: tap.last,
        memory: machine.into_memory().into_cells(),
    })
}

struct Inbound {
    rx: Receiver<i64>,
    cancel: CancelToken,
}

impl Input for Inbound {
    fn take(&mut self) -> Result<i64, VmError> {
        Ok(self.rx.take_or_cancel(&self.cancel)?)
    }
}

/// Output wrapper that remembers what passed through it.
struct Tap {
    inner: Sender<i64>,
    cancel: CancelToken,
    emitted: usize,
    last: Option<i64>,
}

impl Tap {
    fn new(inner: Sender<i64>, cancel: CancelToken) -> Self {
        Self {
            inner,
            cancel,
            emitted: 0,
            last: None,
        }
    }
}

impl Output for Tap {
    fn put(&mut self, value: i64) -> Result<(), VmError> {
        match self.inner.put_or_cancel(value, &self.cancel) {
            Ok(()) => {}
            Err(ChannelError::Closed) if !self.cancel.is_cancelled() => {
                trace!(value, "consumer halted, output dropped");
            }
            Err(err) => return Err(err.into()),
        }
        self.emitted += 1;
        self.last = Some(value);
        Ok(())
    }
}

/// Extract a human-readable message from a panic payload.
pub(crate) fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::unbounded;
    use ringvm_core::Program;

    fn machine(src: &str) -> Machine {
        Machine::new(&Program::parse(src).unwrap())
    }

    #[test]
    fn runs_to_halt_and_reports() {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded();
        in_tx.put(20).unwrap();
        let exec = spawn(0, machine("3,0,1,0,0,0,4,0,99"), in_rx, out_tx, CancelToken::new())
            .unwrap();
        let report = exec.join().unwrap();
        assert_eq!(out_rx.drain(), vec![40]);
        assert_eq!(report.emitted, 1);
        assert_eq!(report.last_output, Some(40));
        assert_eq!(report.memory[0], 40);
        assert_eq!(report.steps, 4);
    }

    #[test]
    fn closed_input_interrupts() {
        let (in_tx, in_rx) = unbounded::<i64>();
        let (out_tx, _out_rx) = unbounded();
        let exec = spawn(3, machine("3,0,99"), in_rx, out_tx, CancelToken::new()).unwrap();
        drop(in_tx);
        let err = exec.join().unwrap_err();
        assert_eq!(err, ExecutorError::Machine(VmError::Interrupted));
        assert!(err.is_cascade());
    }

    #[test]
    fn fault_trips_the_shared_token() {
        let (_in_tx, in_rx) = unbounded::<i64>();
        let (out_tx, _out_rx) = unbounded();
        let token = CancelToken::new();
        let exec = spawn(0, machine("42"), in_rx, out_tx, token.clone()).unwrap();
        let err = exec.join().unwrap_err();
        assert_eq!(
            err,
            ExecutorError::Machine(VmError::InvalidOpcode { opcode: 42, ip: 0 })
        );
        assert!(token.is_cancelled());
    }

    #[test]
    fn cancellation_stops_a_busy_loop() {
        let (_in_tx, in_rx) = unbounded::<i64>();
        let (out_tx, _out_rx) = unbounded();
        let token = CancelToken::new();
        let exec = spawn(0, machine("1105,1,0"), in_rx, out_tx, token.clone()).unwrap();
        token.cancel();
        assert_eq!(
            exec.join().unwrap_err(),
            ExecutorError::Machine(VmError::Interrupted)
        );
    }

    #[test]
    fn cancellation_releases_a_blocked_input() {
        let (_in_tx, in_rx) = unbounded::<i64>();
        let (out_tx, _out_rx) = unbounded();
        let token = CancelToken::new();
        let exec = spawn(1, machine("3,0,99"), in_rx, out_tx, token.clone()).unwrap();
        token.cancel();
        assert!(exec.join().unwrap_err().is_cascade());
    }

    #[test]
    fn output_to_a_halted_consumer_is_dropped() {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded::<i64>();
        drop(out_rx);
        in_tx.put(6).unwrap();
        let exec = spawn(0, machine("3,9,4,9,4,9,99"), in_rx, out_tx, CancelToken::new()).unwrap();
        let report = exec.join().unwrap();
        assert_eq!(report.emitted, 2);
        assert_eq!(report.last_output, Some(6));
    }

    #[test]
    fn output_to_a_closed_edge_after_cancel_interrupts() {
        let (out_tx, out_rx) = unbounded::<i64>();
        drop(out_rx);
        let token = CancelToken::new();
        token.cancel();
        let mut tap = Tap::new(out_tx, token);
        assert_eq!(Output::put(&mut tap, 1), Err(VmError::Interrupted));
        assert_eq!(tap.emitted, 0);
    }

    #[test]
    fn panic_payloads() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new(String::from("bang"))), "bang");
        assert_eq!(panic_message(Box::new(7_i32)), "unknown panic payload");
    }
}
