//! ringvm runtime
//!
//! Runs machines from `ringvm-core` concurrently: one OS thread per machine,
//! connected by FIFO channels, with cooperative cancellation so that a fault
//! in one machine stops the whole group.

pub mod cancel;
pub mod channel;
pub mod executor;
pub mod pipeline;
pub mod remote;

pub use cancel::CancelToken;
pub use channel::{channel, unbounded, ChannelError, ChannelPolicy, OnFull, Receiver, Sender};
pub use executor::{Executor, ExecutorError, MachineReport};
pub use pipeline::{run_feedback_network, run_network, Pipeline, PipelineError, PipelineRun, Topology};
pub use remote::{RemoteError, RemoteMachine, Termination};
