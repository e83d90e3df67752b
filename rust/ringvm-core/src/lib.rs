//! ringvm core
//!
//! Program parsing, memory, instruction decoding and the single-machine
//! execution engine. Concurrency lives in `ringvm-runtime`.

pub mod decode;
pub mod disasm;
pub mod error;
pub mod io;
pub mod machine;
pub mod memory;
pub mod program;

pub use decode::{Instruction, Mode, Opcode};
pub use error::VmError;
pub use io::{FnInput, FnOutput, Input, NoInput, Output};
pub use machine::{
    run_single, run_with_config, run_with_inputs, Execution, Machine, MachineConfig,
    MachineStatus, StepOutcome,
};
pub use memory::Memory;
pub use program::Program;
