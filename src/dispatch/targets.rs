use std::collections::{HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;

use crate::cluster::Member;
use crate::error::{CronmeshError, Result};
use crate::scheduler::Job;

/// Outcome of target resolution: the member names a dispatch is
/// addressed to, plus the job's tag constraints with cardinality
/// suffixes stripped.
#[derive(Debug, Clone)]
pub struct ResolvedTargets {
    pub nodes: HashSet<String>,
    pub tags: HashMap<String, String>,
}

/// Resolve a job's tag expression against a membership snapshot.
///
/// Only alive members are considered. A job with no tag entries
/// targets every alive member. Each tag entry must match the member's
/// advertised value exactly; when one or more entries carry a `:N`
/// cardinality suffix, the intersection is randomly sampled down to
/// the smallest N.
pub fn select_targets<R: Rng + ?Sized>(
    job: &Job,
    members: &[Member],
    rng: &mut R,
) -> Result<ResolvedTargets> {
    let alive: Vec<&Member> = members.iter().filter(|m| m.is_alive()).collect();

    if job.tags.is_empty() {
        return Ok(ResolvedTargets {
            nodes: alive.iter().map(|m| m.name.clone()).collect(),
            tags: HashMap::new(),
        });
    }

    let mut constraints = Vec::with_capacity(job.tags.len());
    let mut tags = HashMap::with_capacity(job.tags.len());
    for (tag, expr) in &job.tags {
        let (value, cardinality) = split_cardinality(tag, expr)?;
        tags.insert(tag.clone(), value.clone());
        constraints.push((tag.clone(), value, cardinality));
    }

    let mut matched: Vec<&Member> = alive
        .into_iter()
        .filter(|m| {
            constraints
                .iter()
                .all(|(tag, value, _)| m.tags.get(tag) == Some(value))
        })
        .collect();

    // Multiple cardinalities collapse to the most restrictive one
    let cap = constraints.iter().filter_map(|(_, _, c)| *c).min();
    let nodes: HashSet<String> = match cap {
        Some(cap) if cap < matched.len() => matched
            .choose_multiple(rng, cap)
            .map(|m| m.name.clone())
            .collect(),
        _ => matched.drain(..).map(|m| m.name.clone()).collect(),
    };

    Ok(ResolvedTargets { nodes, tags })
}

/// Split a tag expression value into its match value and optional
/// cardinality. The suffix is a literal colon followed by ASCII digits
/// at the end of the value; anything else after a colon is an error.
fn split_cardinality(tag: &str, expr: &str) -> Result<(String, Option<usize>)> {
    match expr.rsplit_once(':') {
        None => Ok((expr.to_string(), None)),
        Some((value, suffix)) => {
            if suffix.is_empty() || !suffix.bytes().all(|b| b.is_ascii_digit()) {
                return Err(CronmeshError::BadTagExpression(
                    tag.to_string(),
                    expr.to_string(),
                ));
            }
            let cardinality: usize = suffix.parse().map_err(|_| {
                CronmeshError::BadTagExpression(tag.to_string(), expr.to_string())
            })?;
            if cardinality == 0 {
                return Err(CronmeshError::BadTagExpression(
                    tag.to_string(),
                    expr.to_string(),
                ));
            }
            Ok((value.to_string(), Some(cardinality)))
        }
    }
}
