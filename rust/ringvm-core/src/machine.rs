//! Fetch-decode-execute engine.
//!
//! A [`Machine`] owns its memory, instruction pointer and relative base. Each
//! call to [`Machine::step`] executes exactly one instruction against the
//! supplied I/O capabilities; [`Machine::run`] steps until the machine halts
//! or an error ends it.
//!
//! # Status transitions
//!
//! ```text
//!   Running ──(opcode 3 waiting)──> AwaitingInput ──(value taken)──> Running
//!   Running ──(opcode 99)──> Halted
//!   Running ──(any fault)──> Faulted
//! ```
//!
//! When an input source reports [`VmError::InputExhausted`] the machine stays
//! in `AwaitingInput` with its instruction pointer on the input instruction,
//! so the caller may supply more input and step again. Every other error is
//! terminal.

use crate::decode::{Instruction, Mode, Opcode};
use crate::error::VmError;
use crate::io::{Input, Output};
use crate::memory::Memory;
use crate::program::Program;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use strum::Display;
use tracing::{debug, trace, warn};

/// Resource limits applied to a single machine. `None` means unlimited.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MachineConfig {
    /// Maximum number of instructions executed before the machine faults.
    pub max_steps: Option<u64>,
    /// Maximum number of memory cells the machine may grow to.
    pub max_memory: Option<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum MachineStatus {
    Running,
    AwaitingInput,
    Halted,
    Faulted,
}

impl MachineStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, MachineStatus::Halted | MachineStatus::Faulted)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halted,
}

#[derive(Debug, Clone)]
pub struct Machine {
    memory: Memory,
    ip: usize,
    relative_base: i64,
    status: MachineStatus,
    steps: u64,
    config: MachineConfig,
}

impl Machine {
    pub fn new(program: &Program) -> Self {
        Self::with_config(program, MachineConfig::default())
    }

    pub fn with_config(program: &Program, config: MachineConfig) -> Self {
        Self {
            memory: Memory::with_limit(program.cells().to_vec(), config.max_memory),
            ip: 0,
            relative_base: 0,
            status: MachineStatus::Running,
            steps: 0,
            config,
        }
    }

    pub fn from_source(source: &str) -> Result<Self, VmError> {
        Ok(Self::new(&Program::parse(source)?))
    }

    pub fn ip(&self) -> usize {
        self.ip
    }

    pub fn relative_base(&self) -> i64 {
        self.relative_base
    }

    pub fn status(&self) -> MachineStatus {
        self.status
    }

    /// Instructions executed to completion so far.
    pub fn steps(&self) -> u64 {
        self.steps
    }

    pub fn memory(&self) -> &Memory {
        &self.memory
    }

    pub fn into_memory(self) -> Memory {
        self.memory
    }

    /// Run until halt. Returns a snapshot of the final memory image.
    pub fn run<I, O>(&mut self, mut input: I, mut output: O) -> Result<Vec<i64>, VmError>
    where
        I: Input,
        O: Output,
    {
        while self.step(&mut input, &mut output)? == StepOutcome::Continue {}
        Ok(self.memory.snapshot())
    }

    /// Execute one instruction.
    pub fn step<I, O>(&mut self, input: &mut I, output: &mut O) -> Result<StepOutcome, VmError>
    where
        I: Input + ?Sized,
        O: Output + ?Sized,
    {
        if self.status.is_terminal() {
            return Err(VmError::NotRunning);
        }
        if let Some(max) = self.config.max_steps {
            if self.steps >= max {
                return Err(self.fail(VmError::StepLimitExceeded(max)));
            }
        }

        match self.execute(input, output) {
            Ok(outcome) => {
                self.steps += 1;
                if outcome == StepOutcome::Halted {
                    self.status = MachineStatus::Halted;
                    debug!(steps = self.steps, memory = self.memory.len(), "machine halted");
                }
                Ok(outcome)
            }
            Err(VmError::InputExhausted) => {
                self.status = MachineStatus::AwaitingInput;
                Err(VmError::InputExhausted)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: VmError) -> VmError {
        self.status = MachineStatus::Faulted;
        if err.is_fault() {
            warn!(ip = self.ip, error = %err, "machine faulted");
        } else {
            debug!(ip = self.ip, error = %err, "machine stopped");
        }
        err
    }

    fn execute<I, O>(&mut self, input: &mut I, output: &mut O) -> Result<StepOutcome, VmError>
    where
        I: Input + ?Sized,
        O: Output + ?Sized,
    {
        let ip = self.ip;
        let instr = Instruction::decode(self.memory.read(ip as i64)?, ip)?;
        trace!(ip, base = self.relative_base, op = %instr.opcode, "step");

        match instr.opcode {
            Opcode::Add | Opcode::Mul | Opcode::Lt | Opcode::Eq => {
                let a = self.param(&instr, 0)?;
                let b = self.param(&instr, 1)?;
                let dst = self.target(&instr, 2)?;
                let value = match instr.opcode {
                    Opcode::Add => a.checked_add(b).ok_or(VmError::ArithmeticOverflow { ip })?,
                    Opcode::Mul => a.checked_mul(b).ok_or(VmError::ArithmeticOverflow { ip })?,
                    Opcode::Lt => i64::from(a < b),
                    _ => i64::from(a == b),
                };
                self.store(dst, value)?;
                self.ip += 4;
            }
            Opcode::Input => {
                let dst = self.target(&instr, 0)?;
                self.status = MachineStatus::AwaitingInput;
                let value = input.take()?;
                self.status = MachineStatus::Running;
                self.store(dst, value)?;
                self.ip += 2;
            }
            Opcode::Output => {
                let value = self.param(&instr, 0)?;
                output.put(value)?;
                self.ip += 2;
            }
            Opcode::Jnz | Opcode::Jz => {
                let cond = self.param(&instr, 0)?;
                let dest = self.param(&instr, 1)?;
                let taken = (cond != 0) == (instr.opcode == Opcode::Jnz);
                if taken {
                    self.ip = usize::try_from(dest)
                        .map_err(|_| VmError::NegativeAddress { address: dest, ip })?;
                } else {
                    self.ip += 3;
                }
            }
            Opcode::AdjustBase => {
                let delta = self.param(&instr, 0)?;
                self.relative_base = self
                    .relative_base
                    .checked_add(delta)
                    .ok_or(VmError::ArithmeticOverflow { ip })?;
                self.ip += 2;
            }
            Opcode::Halt => return Ok(StepOutcome::Halted),
        }
        Ok(StepOutcome::Continue)
    }

    /// Raw parameter cell for `slot`.
    fn raw(&self, slot: usize) -> Result<i64, VmError> {
        self.memory.read((self.ip + 1 + slot) as i64)
    }

    fn param(&self, instr: &Instruction, slot: usize) -> Result<i64, VmError> {
        let raw = self.raw(slot)?;
        match instr.modes[slot] {
            Mode::Position => self.memory.read(raw),
            Mode::Immediate => Ok(raw),
            Mode::Relative => self.memory.read(self.relative(raw)?),
        }
        .map_err(|e| e.at(self.ip))
    }

    fn target(&self, instr: &Instruction, slot: usize) -> Result<i64, VmError> {
        let raw = self.raw(slot)?;
        let address = match instr.modes[slot] {
            Mode::Position => raw,
            Mode::Relative => self.relative(raw)?,
            Mode::Immediate => return Err(VmError::InvalidWriteTarget { ip: self.ip }),
        };
        if address < 0 {
            return Err(VmError::NegativeAddress {
                address,
                ip: self.ip,
            });
        }
        Ok(address)
    }

    fn relative(&self, offset: i64) -> Result<i64, VmError> {
        self.relative_base
            .checked_add(offset)
            .ok_or(VmError::ArithmeticOverflow { ip: self.ip })
    }

    fn store(&mut self, address: i64, value: i64) -> Result<(), VmError> {
        let ip = self.ip;
        self.memory.write(address, value).map_err(|e| e.at(ip))
    }
}

/// Outcome of running a program to completion with fixed inputs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Execution {
    pub outputs: Vec<i64>,
    pub memory: Vec<i64>,
    pub steps: u64,
}

/// Run a fresh machine over `inputs`, capturing every output.
pub fn run_with_inputs(program: &Program, inputs: &[i64]) -> Result<Execution, VmError> {
    run_with_config(program, inputs, MachineConfig::default())
}

pub fn run_with_config(
    program: &Program,
    inputs: &[i64],
    config: MachineConfig,
) -> Result<Execution, VmError> {
    let mut machine = Machine::with_config(program, config);
    let mut outputs = Vec::new();
    let input: VecDeque<i64> = inputs.iter().copied().collect();
    let memory = machine.run(input, &mut outputs)?;
    Ok(Execution {
        outputs,
        memory,
        steps: machine.steps(),
    })
}

/// Request/response shape: one input value in, captured outputs out.
pub fn run_single(program: &Program, input: i64) -> Result<Execution, VmError> {
    run_with_inputs(program, &[input])
}
