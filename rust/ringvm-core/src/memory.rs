//! Auto-growing machine memory.
//!
//! Reads past the current extent yield `0` without allocating. Writes past
//! the extent zero-fill up to and including the target cell. Addresses are
//! signed because they are computed from program data; a negative address is
//! always a fault.

use crate::error::VmError;
use std::fmt;

#[derive(Clone, PartialEq, Eq)]
pub struct Memory {
    cells: Vec<i64>,
    limit: Option<usize>,
}

impl Memory {
    pub fn new(cells: Vec<i64>) -> Self {
        Self { cells, limit: None }
    }

    /// Memory that refuses to grow past `limit` cells.
    pub fn with_limit(cells: Vec<i64>, limit: Option<usize>) -> Self {
        Self { cells, limit }
    }

    pub fn read(&self, address: i64) -> Result<i64, VmError> {
        let index = Self::index(address)?;
        Ok(self.cells.get(index).copied().unwrap_or(0))
    }

    pub fn write(&mut self, address: i64, value: i64) -> Result<(), VmError> {
        let index = Self::index(address)?;
        if index >= self.cells.len() {
            if let Some(limit) = self.limit {
                if index >= limit {
                    return Err(VmError::MemoryLimitExceeded { address, limit });
                }
            }
            self.ensure_len(index + 1)?;
        }
        self.cells[index] = value;
        Ok(())
    }

    /// Extend to at least `len` cells, zero-filled. Never shrinks.
    ///
    /// Fails with [`VmError::AllocationFailed`] instead of aborting when the
    /// allocator cannot provide the space.
    pub fn ensure_len(&mut self, len: usize) -> Result<(), VmError> {
        if len > self.cells.len() {
            self.cells
                .try_reserve_exact(len - self.cells.len())
                .map_err(|_| VmError::AllocationFailed {
                    address: i64::try_from(len - 1).unwrap_or(i64::MAX),
                    ip: 0,
                })?;
            self.cells.resize(len, 0);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn as_slice(&self) -> &[i64] {
        &self.cells
    }

    pub fn snapshot(&self) -> Vec<i64> {
        self.cells.clone()
    }

    pub fn into_cells(self) -> Vec<i64> {
        self.cells
    }

    fn index(address: i64) -> Result<usize, VmError> {
        usize::try_from(address).map_err(|_| VmError::NegativeAddress { address, ip: 0 })
    }
}

impl fmt::Debug for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Memory")
            .field("len", &self.cells.len())
            .field("limit", &self.limit)
            .finish()
    }
}

impl fmt::Display for Memory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_cells(f, &self.cells)
    }
}

pub(crate) fn write_cells(f: &mut fmt::Formatter<'_>, cells: &[i64]) -> fmt::Result {
    for (i, cell) in cells.iter().enumerate() {
        if i > 0 {
            f.write_str(",")?;
        }
        write!(f, "{}", cell)?;
    }
    Ok(())
}
