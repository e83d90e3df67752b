//! Remote-controlled single machine.
//!
//! [`RemoteMachine`] starts one executor on construction and talks to it in
//! request/response fashion: push input, block for output. The executor is
//! scoped to the value. [`RemoteMachine::shutdown`] and `Drop` both cancel it,
//! close its input and join the thread, so no executor outlives its handle,
//! whether it is blocked on input, busy computing, or already finished.

use crate::cancel::CancelToken;
use crate::channel::{unbounded, Receiver, Sender};
use crate::executor::{self, Executor, ExecutorError, MachineReport};
use ringvm_core::{Machine, MachineConfig, Program, VmError};
use std::io;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The machine halted (or was shut down) before answering.
    #[error("machine stopped before responding")]
    Stopped,
    #[error("machine failed: {0}")]
    Machine(#[source] VmError),
    #[error("machine executor panicked: {0}")]
    Panicked(String),
    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[from] io::Error),
}

/// How a remote machine ended when it was shut down.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// The program reached its halt instruction.
    Halted(MachineReport),
    /// The machine was still running and was stopped.
    Cancelled,
}

#[derive(Debug)]
pub struct RemoteMachine {
    input: Option<Sender<i64>>,
    output: Receiver<i64>,
    executor: Option<Executor>,
    cancel: CancelToken,
}

impl RemoteMachine {
    pub fn spawn(program: &Program) -> Result<Self, RemoteError> {
        Self::with_config(program, MachineConfig::default())
    }

    pub fn with_config(program: &Program, config: MachineConfig) -> Result<Self, RemoteError> {
        let (in_tx, in_rx) = unbounded();
        let (out_tx, out_rx) = unbounded();
        let cancel = CancelToken::new();
        let machine = Machine::with_config(program, config);
        let executor = executor::spawn(0, machine, in_rx, out_tx, cancel.clone())?;
        debug!("remote machine started");
        Ok(Self {
            input: Some(in_tx),
            output: out_rx,
            executor: Some(executor),
            cancel,
        })
    }

    /// Push one input and block for exactly one output.
    pub fn send(&mut self, value: i64) -> Result<i64, RemoteError> {
        self.push(value)?;
        self.recv()
    }

    /// One [`send`](Self::send) per value, in order.
    pub fn send_all(&mut self, values: &[i64]) -> Result<Vec<i64>, RemoteError> {
        values.iter().map(|&value| self.send(value)).collect()
    }

    /// Push every value in `inputs`, then block for `responses` outputs.
    pub fn exchange(&mut self, inputs: &[i64], responses: usize) -> Result<Vec<i64>, RemoteError> {
        for &value in inputs {
            self.push(value)?;
        }
        (0..responses).map(|_| self.recv()).collect()
    }

    /// Queue one input without waiting for a response.
    pub fn push(&mut self, value: i64) -> Result<(), RemoteError> {
        let delivered = match &self.input {
            Some(tx) => tx.put(value).is_ok(),
            None => false,
        };
        if delivered {
            Ok(())
        } else {
            Err(self.stopped())
        }
    }

    /// Block for the next output.
    pub fn recv(&mut self) -> Result<i64, RemoteError> {
        match self.output.take() {
            Ok(value) => Ok(value),
            Err(_) => Err(self.stopped()),
        }
    }

    /// Whether the executor thread has ended.
    pub fn is_finished(&self) -> bool {
        match &self.executor {
            Some(executor) => executor.is_finished(),
            None => true,
        }
    }

    /// Stop the machine and wait for its thread.
    pub fn shutdown(mut self) -> Result<Termination, RemoteError> {
        match self.close() {
            Some(Ok(report)) => Ok(Termination::Halted(report)),
            Some(Err(err)) if err.is_cascade() => Ok(Termination::Cancelled),
            Some(Err(err)) => Err(into_remote(err)),
            None => Ok(Termination::Cancelled),
        }
    }

    /// The output channel closed or the input was refused: the executor is
    /// gone. Join it and report why.
    fn stopped(&mut self) -> RemoteError {
        match self.close() {
            Some(Err(err)) if !err.is_cascade() => into_remote(err),
            _ => RemoteError::Stopped,
        }
    }

    fn close(&mut self) -> Option<Result<MachineReport, ExecutorError>> {
        // A halted machine never reads its input again, so closing it first is
        // harmless; a running one is told to stop.
        self.input.take();
        let executor = self.executor.take()?;
        if !executor.is_finished() {
            self.cancel.cancel();
        }
        let result = executor.join();
        debug!(ok = result.is_ok(), "remote machine joined");
        Some(result)
    }
}

impl Drop for RemoteMachine {
    fn drop(&mut self) {
        self.close();
    }
}

fn into_remote(err: ExecutorError) -> RemoteError {
    match err {
        ExecutorError::Machine(source) => RemoteError::Machine(source),
        ExecutorError::Panicked(message) => RemoteError::Panicked(message),
    }
}
