//! Pipeline orchestration: N machines, one program, connected by channels.
//!
//! ```text
//!   chain:  seed -> [0] -> [1] -> ... -> [N-1] -> collector
//!   ring:   seed -> [0] -> [1] -> ... -> [N-1] --+
//!                    ^----------------------------+
//! ```
//!
//! Every machine's input channel is seeded with its phase setting before any
//! executor starts, so the first value a machine reads is always its phase.
//! The external seed then goes into channel 0 and the orchestrator joins
//! every executor. The result is the last value machine `N-1` emitted.
//!
//! A machine that halts normally closes its input edge. Whatever its producer
//! emits afterwards is dropped by the producer's executor rather than failing
//! it; in the ring this is what lets machine `N-1` make its final emission
//! after machine 0 has halted.

use crate::cancel::CancelToken;
use crate::channel::{channel, ChannelError, ChannelPolicy, OnFull, Receiver, Sender};
use crate::executor::{self, Executor, ExecutorError, MachineReport};
use ringvm_core::{Machine, MachineConfig, Program, VmError};
use serde::Serialize;
use std::collections::HashSet;
use std::io;
use thiserror::Error;
use tracing::{debug, instrument, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    #[default]
    Chain,
    Ring,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("program: {0}")]
    Program(VmError),
    #[error("invalid phase settings: {0}")]
    InvalidPhases(String),
    #[error("invalid channel policy: {0}")]
    InvalidPolicy(String),
    #[error("seeding machine {index}: {source}")]
    Seed {
        index: usize,
        #[source]
        source: ChannelError,
    },
    #[error("machine {index}: {source}")]
    Machine {
        index: usize,
        #[source]
        source: VmError,
    },
    #[error("machine {index} executor panicked: {message}")]
    ExecutorPanicked { index: usize, message: String },
    #[error("failed to spawn executor thread: {0}")]
    Spawn(#[from] io::Error),
    #[error("last machine produced no output")]
    NoOutput,
}

impl PipelineError {
    fn from_executor(index: usize, err: ExecutorError) -> Self {
        match err {
            ExecutorError::Machine(source) => PipelineError::Machine { index, source },
            ExecutorError::Panicked(message) => PipelineError::ExecutorPanicked { index, message },
        }
    }
}

/// Outcome of a successful run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineRun {
    pub output: i64,
    pub topology: Topology,
    pub reports: Vec<MachineReport>,
}

#[derive(Debug, Clone)]
pub struct Pipeline {
    program: Program,
    topology: Topology,
    policy: ChannelPolicy,
    seed: i64,
    config: MachineConfig,
}

impl Pipeline {
    pub fn new(program: Program) -> Self {
        Self {
            program,
            topology: Topology::Chain,
            policy: ChannelPolicy::Unbounded,
            seed: 0,
            config: MachineConfig::default(),
        }
    }

    pub fn topology(mut self, topology: Topology) -> Self {
        self.topology = topology;
        self
    }

    pub fn channel_policy(mut self, policy: ChannelPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Value injected into channel 0 after all executors start. Defaults to 0.
    pub fn seed(mut self, seed: i64) -> Self {
        self.seed = seed;
        self
    }

    pub fn machine_config(mut self, config: MachineConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one machine per phase setting until every machine has stopped.
    #[instrument(skip(self), fields(topology = ?self.topology))]
    pub fn run(&self, phases: &[i64]) -> Result<PipelineRun, PipelineError> {
        validate_phases(phases)?;
        validate_policy(self.policy)?;
        let n = phases.len();

        let (senders, receivers): (Vec<Sender<i64>>, Vec<Receiver<i64>>) =
            (0..n).map(|_| channel(self.policy)).unzip();

        for (index, (tx, &phase)) in senders.iter().zip(phases).enumerate() {
            tx.put(phase)
                .map_err(|source| PipelineError::Seed { index, source })?;
        }
        debug!(machines = n, "phase settings seeded");

        let head = senders[0].clone();
        // Chain: the orchestrator owns the collector at the end of the line.
        let (outputs, _collector): (Vec<Sender<i64>>, Option<Receiver<i64>>) = match self.topology
        {
            Topology::Ring => {
                let mut outputs = senders;
                outputs.rotate_left(1);
                (outputs, None)
            }
            Topology::Chain => {
                let (collector_tx, collector_rx) = channel(ChannelPolicy::Unbounded);
                let mut outputs = senders;
                outputs.remove(0);
                outputs.push(collector_tx);
                (outputs, Some(collector_rx))
            }
        };

        let cancel = CancelToken::new();
        let mut executors = Vec::with_capacity(n);
        for (index, (input, output)) in receivers.into_iter().zip(outputs).enumerate() {
            let machine = Machine::with_config(&self.program, self.config);
            match executor::spawn(index, machine, input, output, cancel.clone()) {
                Ok(exec) => executors.push(exec),
                Err(err) => {
                    cancel.cancel();
                    drop(head);
                    join_all(executors);
                    return Err(PipelineError::Spawn(err));
                }
            }
        }

        let injected = head.put_or_cancel(self.seed, &cancel);
        // Only machine N-1 (ring) may write channel 0 from here on; dropping
        // this handle lets a failure anywhere cascade around the loop.
        drop(head);
        match injected {
            Ok(()) => {}
            Err(source @ ChannelError::Full { .. }) => {
                cancel.cancel();
                join_all(executors);
                return Err(PipelineError::Seed { index: 0, source });
            }
            // Machine 0 already stopped; its own result says why.
            Err(err) => debug!(error = %err, "seed not delivered"),
        }

        let reports = collect(join_all(executors))?;
        let output = reports
            .last()
            .and_then(|r| r.last_output)
            .ok_or(PipelineError::NoOutput)?;
        debug!(output, "pipeline finished");
        Ok(PipelineRun {
            output,
            topology: self.topology,
            reports,
        })
    }
}

fn validate_phases(phases: &[i64]) -> Result<(), PipelineError> {
    if phases.is_empty() {
        return Err(PipelineError::InvalidPhases(
            "at least one phase setting is required".into(),
        ));
    }
    let mut seen = HashSet::with_capacity(phases.len());
    for &phase in phases {
        if !seen.insert(phase) {
            return Err(PipelineError::InvalidPhases(format!(
                "phase setting {} appears more than once",
                phase
            )));
        }
    }
    Ok(())
}

/// Channel 0 must hold a phase setting and the seed before machine 0 is
/// guaranteed to have read anything, and seeding happens before any executor
/// exists, so a rendezvous channel would never accept its phase.
fn validate_policy(policy: ChannelPolicy) -> Result<(), PipelineError> {
    match policy {
        ChannelPolicy::Bounded {
            capacity,
            on_full: OnFull::Fail,
        } if capacity < 2 => Err(PipelineError::InvalidPolicy(format!(
            "fail-fast channels need a capacity of at least 2, got {}",
            capacity
        ))),
        ChannelPolicy::Bounded { capacity: 0, .. } => Err(PipelineError::InvalidPolicy(
            "bounded channels need a capacity of at least 1".into(),
        )),
        _ => Ok(()),
    }
}

fn join_all(executors: Vec<Executor>) -> Vec<(usize, Result<MachineReport, ExecutorError>)> {
    executors
        .into_iter()
        .map(|exec| (exec.index(), exec.join()))
        .collect()
}

/// Reports in machine order, or the error that caused the run to fail.
///
/// `Interrupted` errors are what the other machines see once one of them has
/// stopped, so they are only reported when nothing else went wrong.
fn collect(
    results: Vec<(usize, Result<MachineReport, ExecutorError>)>,
) -> Result<Vec<MachineReport>, PipelineError> {
    let mut reports = Vec::with_capacity(results.len());
    let mut root: Option<(usize, ExecutorError)> = None;
    let mut cascade: Option<(usize, ExecutorError)> = None;
    for (index, result) in results {
        match result {
            Ok(report) => reports.push(report),
            Err(err) if err.is_cascade() => {
                cascade.get_or_insert((index, err));
            }
            Err(err) => {
                warn!(machine = index, error = %err, "pipeline machine failed");
                root.get_or_insert((index, err));
            }
        }
    }
    match root.or(cascade) {
        Some((index, err)) => Err(PipelineError::from_executor(index, err)),
        None => Ok(reports),
    }
}

/// Single pass through a chain of machines, no feedback edge.
pub fn run_network(program: &str, phases: &[i64]) -> Result<i64, PipelineError> {
    let program = Program::parse(program).map_err(PipelineError::Program)?;
    Ok(Pipeline::new(program).run(phases)?.output)
}

/// Ring of machines where the last output feeds back into the first input.
pub fn run_feedback_network(program: &str, phases: &[i64]) -> Result<i64, PipelineError> {
    let program = Program::parse(program).map_err(PipelineError::Program)?;
    Ok(Pipeline::new(program)
        .topology(Topology::Ring)
        .run(phases)?
        .output)
}
