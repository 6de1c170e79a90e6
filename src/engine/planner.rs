//! Move-set planning.
//!
//! Diffs the observed order against the desired one, then walks the displaced
//! runs left to right, simulating each block move on a logical copy of the
//! window so later target indices account for earlier moves.

use crate::model::MoveOp;
use std::collections::HashSet;
use std::hash::Hash;
use std::ops::Range;

/// Ordered block moves plus the identities that had to be left out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MovePlan<T> {
    pub moves: Vec<MoveOp<T>>,
    /// Present in only one of the two orders, or repeated. Never moved.
    pub inconsistent: Vec<T>,
}

impl<T> MovePlan<T> {
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }
}

/// Relocate `ids` as one contiguous block so the first lands at `index`.
///
/// Indices past the end append. This is also how [`crate::platform::MemoryPlatform`]
/// applies moves, so a plan replayed here matches what the platform will do.
pub fn apply_move<T: PartialEq + Clone>(order: &mut Vec<T>, ids: &[T], index: usize) {
    order.retain(|id| !ids.contains(id));
    let at = index.min(order.len());
    order.splice(at..at, ids.iter().cloned());
}

/// Plan the block moves that turn `observed` into `desired`.
pub fn plan_moves<T>(observed: &[T], desired: &[T]) -> MovePlan<T>
where
    T: Eq + Hash + Clone,
{
    let Inputs {
        mut current,
        observed,
        desired,
        inconsistent,
    } = sanitize(observed, desired);

    let mut plan = MovePlan {
        moves: Vec::new(),
        inconsistent,
    };
    if observed.is_empty() || desired.is_empty() {
        return plan;
    }

    let anchored = common_subsequence(&observed, &desired);
    for run in displaced_runs(&anchored) {
        let moving = &desired[run.clone()];
        let new_index = target_index(&current, moving, desired.get(run.end));
        apply_move(&mut current, moving, new_index);
        plan.moves.push(MoveOp {
            moving_ids: moving.to_vec(),
            target_index: new_index,
        });
    }
    plan
}

/// Index the block must be sent to so it ends up right before `anchor`, or
/// at the end when the block closes the desired order.
fn target_index<T: PartialEq>(current: &[T], moving: &[T], anchor: Option<&T>) -> usize {
    let anchor_index = anchor
        .and_then(|a| current.iter().position(|id| id == a))
        .unwrap_or(current.len());
    // Platform moves remove the block first and insert at `index` in what is
    // left, so the anchor shifts left once per moving tab ahead of it.
    let ahead = current[..anchor_index]
        .iter()
        .filter(|id| moving.contains(id))
        .count();
    anchor_index - ahead
}

struct Inputs<T> {
    /// Logical copy of the window: every observed identity, deduplicated.
    current: Vec<T>,
    /// Observed identities the desired order also names.
    observed: Vec<T>,
    /// Desired identities that exist in the window, first occurrence only.
    desired: Vec<T>,
    inconsistent: Vec<T>,
}

fn sanitize<T>(observed: &[T], desired: &[T]) -> Inputs<T>
where
    T: Eq + Hash + Clone,
{
    let mut inconsistent = Vec::new();

    let mut seen = HashSet::with_capacity(observed.len());
    let mut current = Vec::with_capacity(observed.len());
    for id in observed {
        if seen.insert(id) {
            current.push(id.clone());
        } else {
            inconsistent.push(id.clone());
        }
    }

    let mut wanted = HashSet::with_capacity(desired.len());
    let mut kept_desired = Vec::with_capacity(desired.len());
    for id in desired {
        if seen.contains(id) && wanted.insert(id) {
            kept_desired.push(id.clone());
        } else {
            inconsistent.push(id.clone());
        }
    }

    let kept_observed: Vec<T> = current
        .iter()
        .filter(|id| {
            let keep = wanted.contains(id);
            if !keep {
                inconsistent.push((*id).clone());
            }
            keep
        })
        .cloned()
        .collect();

    Inputs {
        current,
        observed: kept_observed,
        desired: kept_desired,
        inconsistent,
    }
}

/// Mark the positions of `desired` that belong to a longest common
/// subsequence with `observed`.
///
/// Both inputs hold the same distinct identities, so the LCS is the longest
/// increasing run of observed positions read in desired order.
fn common_subsequence<T: Eq + Hash>(observed: &[T], desired: &[T]) -> Vec<bool> {
    let position: std::collections::HashMap<&T, usize> =
        observed.iter().enumerate().map(|(i, id)| (id, i)).collect();
    let seq: Vec<usize> = desired.iter().map(|id| position[id]).collect();

    // tails[k] = index into seq of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];
    for (i, &value) in seq.iter().enumerate() {
        let k = tails.partition_point(|&t| seq[t] < value);
        if k > 0 {
            prev[i] = Some(tails[k - 1]);
        }
        if k == tails.len() {
            tails.push(i);
        } else {
            tails[k] = i;
        }
    }

    let mut anchored = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        anchored[i] = true;
        cursor = prev[i];
    }
    anchored
}

/// Maximal runs of desired positions outside the common subsequence.
fn displaced_runs(anchored: &[bool]) -> Vec<Range<usize>> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, &fixed) in anchored.iter().enumerate() {
        match (fixed, start) {
            (false, None) => start = Some(i),
            (true, Some(s)) => {
                runs.push(s..i);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(s..anchored.len());
    }
    runs
}
