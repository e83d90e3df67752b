//! Error type shared by every stage of program loading and execution.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VmError {
    #[error("malformed program: token {position} ({token:?}) is not an integer")]
    MalformedProgram { position: usize, token: String },
    #[error("malformed program: no cells")]
    EmptyProgram,
    #[error("invalid opcode {opcode} at ip {ip}")]
    InvalidOpcode { opcode: i64, ip: usize },
    #[error("invalid addressing mode {mode} in instruction {cell} at ip {ip}")]
    InvalidMode { mode: i64, cell: i64, ip: usize },
    #[error("immediate-mode parameter used as a write target at ip {ip}")]
    InvalidWriteTarget { ip: usize },
    #[error("negative address {address} at ip {ip}")]
    NegativeAddress { address: i64, ip: usize },
    #[error("arithmetic overflow at ip {ip}")]
    ArithmeticOverflow { ip: usize },
    #[error("memory limit exceeded: address {address} beyond {limit} cells")]
    MemoryLimitExceeded { address: i64, limit: usize },
    #[error("cannot grow memory to address {address} at ip {ip}")]
    AllocationFailed { address: i64, ip: usize },
    #[error("step limit exceeded: {0}")]
    StepLimitExceeded(u64),
    #[error("input exhausted")]
    InputExhausted,
    #[error("channel overflow: capacity {capacity} reached")]
    ChannelOverflow { capacity: usize },
    #[error("interrupted: peer channel closed")]
    Interrupted,
    #[error("machine is not running")]
    NotRunning,
}

impl VmError {
    /// Whether the error originates inside the machine itself rather than on
    /// one of its I/O edges.
    pub fn is_fault(&self) -> bool {
        !matches!(
            self,
            VmError::InputExhausted
                | VmError::ChannelOverflow { .. }
                | VmError::Interrupted
                | VmError::NotRunning
        )
    }

    /// Set the instruction pointer on errors raised below the engine (memory
    /// accesses know nothing about the current instruction).
    pub(crate) fn at(self, at_ip: usize) -> Self {
        match self {
            VmError::NegativeAddress { address, .. } => VmError::NegativeAddress {
                address,
                ip: at_ip,
            },
            VmError::AllocationFailed { address, .. } => VmError::AllocationFailed {
                address,
                ip: at_ip,
            },
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fault_classification() {
        assert!(VmError::InvalidOpcode { opcode: 42, ip: 0 }.is_fault());
        assert!(VmError::InvalidWriteTarget { ip: 3 }.is_fault());
        assert!(VmError::StepLimitExceeded(10).is_fault());
        assert!(VmError::AllocationFailed { address: 1 << 62, ip: 0 }.is_fault());
        assert!(!VmError::Interrupted.is_fault());
        assert!(!VmError::ChannelOverflow { capacity: 1 }.is_fault());
        assert!(!VmError::InputExhausted.is_fault());
    }

    #[test]
    fn display_names_the_location() {
        let err = VmError::InvalidOpcode { opcode: 42, ip: 7 };
        assert_eq!(err.to_string(), "invalid opcode 42 at ip 7");
        let err = VmError::NegativeAddress { address: -3, ip: 0 }.at(12);
        assert_eq!(err.to_string(), "negative address -3 at ip 12");
    }
}
