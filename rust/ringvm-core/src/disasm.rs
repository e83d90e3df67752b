//! Linear-sweep disassembler.
//!
//! Walks the cells from address 0, rendering each decodable instruction with
//! its operands and every cell that does not decode (or whose operands run
//! past the end) as `.data`. Programs freely mix code and data, so the
//! listing is best-effort: data that happens to decode is shown as code.

use crate::decode::{Instruction, Mode};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineKind {
    Instr {
        instr: Instruction,
        operands: Vec<(Mode, i64)>,
    },
    Data(i64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub address: usize,
    pub kind: LineKind,
}

pub fn disassemble(cells: &[i64]) -> Vec<Line> {
    let mut lines = Vec::new();
    let mut address = 0;
    while address < cells.len() {
        let cell = cells[address];
        match Instruction::decode(cell, address) {
            Ok(instr) if address + instr.width() <= cells.len() => {
                let operands = (0..instr.opcode.arity())
                    .map(|slot| (instr.modes[slot], cells[address + 1 + slot]))
                    .collect();
                lines.push(Line {
                    address,
                    kind: LineKind::Instr { instr, operands },
                });
                address += instr.width();
            }
            _ => {
                lines.push(Line {
                    address,
                    kind: LineKind::Data(cell),
                });
                address += 1;
            }
        }
    }
    lines
}

impl fmt::Display for Line {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}  ", self.address)?;
        match &self.kind {
            LineKind::Instr { instr, operands } => {
                write!(f, "{}", instr.opcode)?;
                for (i, (mode, value)) in operands.iter().enumerate() {
                    let sep = if i == 0 { "  " } else { ", " };
                    write!(f, "{}{}{}", sep, mode.sigil(), value)?;
                }
                Ok(())
            }
            LineKind::Data(value) => write!(f, ".data {}", value),
        }
    }
}
