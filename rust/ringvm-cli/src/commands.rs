//! Command implementations. Each returns the text to print on stdout so the
//! binary stays a thin clap front end.

use crate::colors::gray;
use crate::config::{RingvmConfig, FILE_NAME};
use crate::error::CliError;
use crate::phases::best_phase_ordering;
use ringvm_core::disasm::disassemble;
use ringvm_core::{run_with_config, Program};
use ringvm_runtime::{Pipeline, Topology};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

/// Read and parse a program file.
pub fn load_program(path: &Path) -> Result<Program, CliError> {
    let source = std::fs::read_to_string(path).map_err(|source| CliError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    Program::parse(&source).map_err(|source| CliError::Program {
        path: path.to_path_buf(),
        source,
    })
}

pub fn run(
    program: &Program,
    inputs: &[i64],
    config: &RingvmConfig,
    json: bool,
    show_memory: bool,
) -> Result<String, CliError> {
    let execution = run_with_config(program, inputs, config.machine)?;
    info!(steps = execution.steps, outputs = execution.outputs.len(), "program halted");
    if json {
        return Ok(serde_json::to_string_pretty(&execution)?);
    }
    let mut out: String = execution
        .outputs
        .iter()
        .map(|value| format!("{}\n", value))
        .collect();
    if show_memory {
        let cells: Vec<String> = execution.memory.iter().map(i64::to_string).collect();
        out.push_str(&format!("{}\n", gray(&cells.join(","))));
    }
    Ok(out)
}

pub fn disasm(program: &Program) -> String {
    disassemble(program.cells())
        .iter()
        .map(|line| format!("{}\n", line))
        .collect()
}

fn pipeline_for(program: Program, feedback: bool, config: &RingvmConfig) -> Pipeline {
    let topology = if feedback {
        Topology::Ring
    } else {
        Topology::Chain
    };
    Pipeline::new(program)
        .topology(topology)
        .channel_policy(config.pipeline.policy())
        .seed(config.pipeline.seed)
        .machine_config(config.machine)
}

pub fn amplify(
    program: Program,
    phases: &[i64],
    feedback: bool,
    config: &RingvmConfig,
    json: bool,
) -> Result<String, CliError> {
    let run = pipeline_for(program, feedback, config).run(phases)?;
    if json {
        return Ok(serde_json::to_string_pretty(&run)?);
    }
    Ok(format!("{}\n", run.output))
}

#[derive(Debug, Serialize)]
struct SearchSummary<'a> {
    topology: Topology,
    candidates: &'a [i64],
    #[serde(flatten)]
    best: crate::phases::BestOrdering,
}

pub fn search(
    program: Program,
    candidates: &[i64],
    feedback: bool,
    config: &RingvmConfig,
    json: bool,
) -> Result<String, CliError> {
    let pipeline = pipeline_for(program, feedback, config);
    let best = best_phase_ordering(&pipeline, candidates)?;
    if json {
        let summary = SearchSummary {
            topology: if feedback {
                Topology::Ring
            } else {
                Topology::Chain
            },
            candidates,
            best,
        };
        return Ok(serde_json::to_string_pretty(&summary)?);
    }
    let phases: Vec<String> = best.phases.iter().map(i64::to_string).collect();
    Ok(format!(
        "{} {}\n",
        best.output,
        gray(&format!("phases {} ({} orderings)", phases.join(","), best.tried))
    ))
}

/// Write a default `ringvm.toml` into `dir`. Refuses to overwrite.
pub fn init(dir: &Path) -> Result<PathBuf, CliError> {
    let path = dir.join(FILE_NAME);
    if path.exists() {
        return Err(CliError::AlreadyExists(path));
    }
    std::fs::write(&path, RingvmConfig::default_template()).map_err(|source| {
        CliError::Write {
            path: path.clone(),
            source,
        }
    })?;
    Ok(path)
}
