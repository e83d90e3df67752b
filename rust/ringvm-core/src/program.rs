//! Program text parsing.
//!
//! A program is a single line of comma-separated base-10 integers. The parsed
//! cells are shared behind an `Arc` so any number of machines can be built
//! from one parse; each machine copies the cells into its own memory.

use crate::error::VmError;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[derive(Clone, PartialEq, Eq)]
pub struct Program {
    cells: Arc<[i64]>,
}

impl Program {
    /// Parse program text. Whitespace around tokens (including a trailing
    /// newline) is ignored.
    pub fn parse(source: &str) -> Result<Self, VmError> {
        let source = source.trim();
        if source.is_empty() {
            return Err(VmError::EmptyProgram);
        }
        let cells = source
            .split(',')
            .enumerate()
            .map(|(position, token)| {
                let token = token.trim();
                token.parse::<i64>().map_err(|_| VmError::MalformedProgram {
                    position,
                    token: token.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            cells: cells.into(),
        })
    }

    pub fn from_cells(cells: impl Into<Vec<i64>>) -> Self {
        Self {
            cells: cells.into().into(),
        }
    }

    pub fn cells(&self) -> &[i64] {
        &self.cells
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

impl FromStr for Program {
    type Err = VmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Program::parse(s)
    }
}

impl fmt::Debug for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Program")
            .field("len", &self.cells.len())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        crate::memory::write_cells(f, &self.cells)
    }
}
