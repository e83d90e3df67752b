//! Input and output capabilities consumed by the execution engine.
//!
//! Opcode 3 pulls one value from an [`Input`]; opcode 4 pushes one value to
//! an [`Output`]. Both may block (channel-backed implementations live in the
//! runtime crate) and both may fail, which faults nothing but ends the run.

use crate::error::VmError;
use std::collections::VecDeque;

pub trait Input {
    /// Next input value, blocking if the source needs to wait for one.
    fn take(&mut self) -> Result<i64, VmError>;
}

pub trait Output {
    fn put(&mut self, value: i64) -> Result<(), VmError>;
}

impl<T: Input + ?Sized> Input for &mut T {
    fn take(&mut self) -> Result<i64, VmError> {
        (**self).take()
    }
}

impl<T: Output + ?Sized> Output for &mut T {
    fn put(&mut self, value: i64) -> Result<(), VmError> {
        (**self).put(value)
    }
}

impl Input for VecDeque<i64> {
    fn take(&mut self) -> Result<i64, VmError> {
        self.pop_front().ok_or(VmError::InputExhausted)
    }
}

impl Output for Vec<i64> {
    fn put(&mut self, value: i64) -> Result<(), VmError> {
        self.push(value);
        Ok(())
    }
}

/// An input that always fails; for programs that never read.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInput;

impl Input for NoInput {
    fn take(&mut self) -> Result<i64, VmError> {
        Err(VmError::InputExhausted)
    }
}

/// Adapts a zero-argument closure into an [`Input`].
pub struct FnInput<F>(pub F);

impl<F> Input for FnInput<F>
where
    F: FnMut() -> Result<i64, VmError>,
{
    fn take(&mut self) -> Result<i64, VmError> {
        (self.0)()
    }
}

/// Adapts a one-argument closure into an [`Output`].
pub struct FnOutput<F>(pub F);

impl<F> Output for FnOutput<F>
where
    F: FnMut(i64) -> Result<(), VmError>,
{
    fn put(&mut self, value: i64) -> Result<(), VmError> {
        (self.0)(value)
    }
}
