//! Dependency resolver.
//!
//! Depth-first traversal over the scratch records. A record is marked
//! in-progress on entry and done (or done-multi) once every dependency has been
//! visited, then appended to the order, so every key follows all of its
//! dependencies. Re-entering an in-progress record is a cycle. An edge into a
//! multi-valued record is rejected because such a key has no single value to
//! substitute.
//!
//! The traversal keeps its own stack of `(record, next edge)` frames; the stack
//! doubles as the current path when a cycle is reported.

use tracing::debug;

use super::tracking::{Mark, Tracking};
use crate::core::{FeatureError, Result};

/// Compute the evaluation order of all records, dependencies first.
pub(crate) fn evaluation_order(tracking: &mut Tracking<'_>) -> Result<Vec<usize>> {
    let mut order = Vec::with_capacity(tracking.len());
    let mut stack: Vec<(usize, usize)> = Vec::new();

    for root in 0..tracking.len() {
        if tracking.record(root).mark == Mark::Unvisited {
            tracking.record_mut(root).mark = Mark::InProgress;
            stack.push((root, 0));
            visit(tracking, &mut stack, &mut order)?;
        }
    }

    debug!(
        "Evaluation order: {}",
        order.iter().map(|&i| tracking.record(i).name.as_str()).collect::<Vec<_>>().join(", ")
    );
    Ok(order)
}

fn visit(
    tracking: &mut Tracking<'_>,
    stack: &mut Vec<(usize, usize)>,
    order: &mut Vec<usize>,
) -> Result<()> {
    while let Some((idx, next)) = stack.last_mut() {
        let idx = *idx;
        let edges = tracking.record(idx).edges.clone();
        let edge = edges.start + *next;

        if edge < edges.end {
            *next += 1;
            let dep = tracking.edges[edge];
            let target = tracking.record(dep);
            if target.multi {
                return Err(FeatureError::MultiValuedDependency {
                    key: tracking.record(idx).name.clone(),
                    dependency: target.name.clone(),
                });
            }
            let mark = target.mark;
            match mark {
                Mark::InProgress => return Err(cycle_error(tracking, stack, dep)),
                Mark::Unvisited => {
                    tracking.record_mut(dep).mark = Mark::InProgress;
                    stack.push((dep, 0));
                }
                Mark::Done | Mark::DoneMulti => {}
            }
            continue;
        }

        stack.pop();
        let record = tracking.record_mut(idx);
        record.mark = if record.multi { Mark::DoneMulti } else { Mark::Done };
        order.push(idx);
    }
    Ok(())
}

fn cycle_error(tracking: &Tracking<'_>, path: &[(usize, usize)], back_to: usize) -> FeatureError {
    let start = path.iter().position(|&(i, _)| i == back_to).unwrap_or(0);
    let keys: Vec<String> =
        path[start..].iter().map(|&(i, _)| tracking.record(i).name.clone()).collect();
    let mut chain = keys.clone();
    chain.push(tracking.record(back_to).name.clone());

    FeatureError::DependencyCycle {
        chain: chain.join(" → "),
        keys,
    }
}
