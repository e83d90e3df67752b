//! Instruction decoding.
//!
//! An instruction cell packs the opcode into its two low decimal digits and
//! one addressing mode per parameter into each following digit:
//!
//! ```text
//!   ABCDE
//!    1002
//!   DE - opcode            (02 = mul)
//!    C - mode of param 1   (0 = position)
//!    B - mode of param 2   (1 = immediate)
//!    A - mode of param 3   (0 = position)
//! ```

use crate::error::VmError;
use strum::{Display, EnumIter, IntoStaticStr};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Opcode {
    Add,
    Mul,
    #[strum(serialize = "in")]
    Input,
    #[strum(serialize = "out")]
    Output,
    Jnz,
    Jz,
    Lt,
    Eq,
    #[strum(serialize = "arb")]
    AdjustBase,
    Halt,
}

impl Opcode {
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            1 => Opcode::Add,
            2 => Opcode::Mul,
            3 => Opcode::Input,
            4 => Opcode::Output,
            5 => Opcode::Jnz,
            6 => Opcode::Jz,
            7 => Opcode::Lt,
            8 => Opcode::Eq,
            9 => Opcode::AdjustBase,
            99 => Opcode::Halt,
            _ => return None,
        })
    }

    pub fn code(self) -> i64 {
        match self {
            Opcode::Add => 1,
            Opcode::Mul => 2,
            Opcode::Input => 3,
            Opcode::Output => 4,
            Opcode::Jnz => 5,
            Opcode::Jz => 6,
            Opcode::Lt => 7,
            Opcode::Eq => 8,
            Opcode::AdjustBase => 9,
            Opcode::Halt => 99,
        }
    }

    /// Number of parameter cells following the instruction cell.
    pub fn arity(self) -> usize {
        match self {
            Opcode::Add | Opcode::Mul | Opcode::Lt | Opcode::Eq => 3,
            Opcode::Jnz | Opcode::Jz => 2,
            Opcode::Input | Opcode::Output | Opcode::AdjustBase => 1,
            Opcode::Halt => 0,
        }
    }

    /// Parameter slot written by the instruction, if any.
    pub fn write_slot(self) -> Option<usize> {
        match self {
            Opcode::Add | Opcode::Mul | Opcode::Lt | Opcode::Eq => Some(2),
            Opcode::Input => Some(0),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum Mode {
    Position,
    Immediate,
    Relative,
}

impl Mode {
    pub fn from_digit(digit: i64) -> Option<Self> {
        match digit {
            0 => Some(Mode::Position),
            1 => Some(Mode::Immediate),
            2 => Some(Mode::Relative),
            _ => None,
        }
    }

    /// Sigil used by the disassembler.
    pub fn sigil(self) -> char {
        match self {
            Mode::Position => '@',
            Mode::Immediate => '#',
            Mode::Relative => '~',
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    pub opcode: Opcode,
    pub modes: [Mode; 3],
}

impl Instruction {
    /// Decode the cell found at `ip`. `ip` is only used for error reporting.
    pub fn decode(cell: i64, ip: usize) -> Result<Self, VmError> {
        if cell < 0 {
            return Err(VmError::InvalidOpcode { opcode: cell, ip });
        }
        let code = cell % 100;
        let mut modes = [Mode::Position; 3];
        let mut divisor = 100;
        for mode in modes.iter_mut() {
            let digit = (cell / divisor) % 10;
            *mode = Mode::from_digit(digit).ok_or(VmError::InvalidMode {
                mode: digit,
                cell,
                ip,
            })?;
            divisor *= 10;
        }
        let opcode = Opcode::from_code(code).ok_or(VmError::InvalidOpcode { opcode: code, ip })?;
        Ok(Self { opcode, modes })
    }

    /// Total width in cells, instruction cell included.
    pub fn width(&self) -> usize {
        1 + self.opcode.arity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn decodes_modes_per_digit() {
        let instr = Instruction::decode(1002, 0).unwrap();
        assert_eq!(instr.opcode, Opcode::Mul);
        assert_eq!(
            instr.modes,
            [Mode::Position, Mode::Immediate, Mode::Position]
        );

        let instr = Instruction::decode(21101, 0).unwrap();
        assert_eq!(instr.opcode, Opcode::Add);
        assert_eq!(
            instr.modes,
            [Mode::Immediate, Mode::Immediate, Mode::Relative]
        );
    }

    #[test]
    fn bare_opcode_defaults_to_position() {
        let instr = Instruction::decode(99, 0).unwrap();
        assert_eq!(instr.opcode, Opcode::Halt);
        assert_eq!(instr.modes, [Mode::Position; 3]);
        assert_eq!(instr.width(), 1);
    }

    #[test]
    fn unknown_opcode_is_rejected() {
        assert_eq!(
            Instruction::decode(42, 3),
            Err(VmError::InvalidOpcode { opcode: 42, ip: 3 })
        );
        assert_eq!(
            Instruction::decode(-1, 0),
            Err(VmError::InvalidOpcode { opcode: -1, ip: 0 })
        );
    }

    #[test]
    fn undefined_mode_digit_is_rejected() {
        assert_eq!(
            Instruction::decode(305, 9),
            Err(VmError::InvalidMode {
                mode: 3,
                cell: 305,
                ip: 9
            })
        );
        // Unused slots are still validated.
        assert!(matches!(
            Instruction::decode(70099, 0),
            Err(VmError::InvalidMode { mode: 7, .. })
        ));
    }

    #[test]
    fn codes_round_trip_for_every_opcode() {
        for op in Opcode::iter() {
            assert_eq!(Opcode::from_code(op.code()), Some(op));
        }
    }

    #[test]
    fn mnemonics() {
        assert_eq!(Opcode::Input.to_string(), "in");
        assert_eq!(Opcode::AdjustBase.to_string(), "arb");
        let name: &'static str = Opcode::Jnz.into();
        assert_eq!(name, "jnz");
    }
}
