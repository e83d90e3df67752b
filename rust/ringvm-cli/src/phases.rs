//! Phase-setting search: try every ordering of a set of phase settings and
//! keep the one that produces the largest pipeline output.

use ringvm_runtime::{Pipeline, PipelineError};
use serde::Serialize;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BestOrdering {
    pub phases: Vec<i64>,
    pub output: i64,
    /// Number of orderings that were run.
    pub tried: usize,
}

/// Every ordering of `values`, generated with Heap's algorithm.
pub fn permutations(values: &[i64]) -> Vec<Vec<i64>> {
    let mut current = values.to_vec();
    let n = current.len();
    let mut out = vec![current.clone()];
    let mut counters = vec![0usize; n];
    let mut i = 1;
    while i < n {
        if counters[i] < i {
            let j = if i % 2 == 0 { 0 } else { counters[i] };
            current.swap(j, i);
            out.push(current.clone());
            counters[i] += 1;
            i = 1;
        } else {
            counters[i] = 0;
            i += 1;
        }
    }
    out
}

/// Run `pipeline` once per ordering of `candidates`. The first failing run
/// aborts the search.
pub fn best_phase_ordering(
    pipeline: &Pipeline,
    candidates: &[i64],
) -> Result<BestOrdering, PipelineError> {
    let mut best: Option<(Vec<i64>, i64)> = None;
    let orderings = permutations(candidates);
    let tried = orderings.len();
    for phases in orderings {
        let output = pipeline.run(&phases)?.output;
        debug!(?phases, output, "ordering evaluated");
        let improves = match &best {
            Some((_, top)) => output > *top,
            None => true,
        };
        if improves {
            best = Some((phases, output));
        }
    }
    let (phases, output) = best.ok_or(PipelineError::NoOutput)?;
    info!(?phases, output, tried, "best phase ordering");
    Ok(BestOrdering {
        phases,
        output,
        tried,
    })
}
