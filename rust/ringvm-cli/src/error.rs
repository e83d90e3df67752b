use crate::config::ConfigError;
use ringvm_core::VmError;
use ringvm_runtime::PipelineError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("cannot read '{}': {}", .path.display(), .source)]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot write '{}': {}", .path.display(), .source)]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{} already exists, not overwriting", .0.display())]
    AlreadyExists(PathBuf),
    #[error("program '{}': {}", .path.display(), .source)]
    Program {
        path: PathBuf,
        #[source]
        source: VmError,
    },
    #[error(transparent)]
    Machine(#[from] VmError),
    #[error(transparent)]
    Pipeline(#[from] PipelineError),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
}
