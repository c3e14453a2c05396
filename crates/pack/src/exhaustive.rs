//! Exhaustive insertion-order search for small jobs.
//!
//! Every permutation of the units is run through the constructive phase in
//! parallel and the best-scoring session wins. Permutations are enumerated in
//! lexicographic order starting from the priority order, so the plain greedy
//! result is candidate zero and ties keep the earliest permutation.

use crate::feasibility::StackingRules;
use crate::item::{Item, ItemCatalog};
use crate::packer::construct;
use crate::packing_utils::Score;
use crate::pallet::PalletSpec;
use crate::session::PalletSession;
use pallet_piler_core::solver::Deadline;
use pallet_piler_core::Result;
use rayon::prelude::*;

/// Runs the constructive phase for every ordering of `order` and returns the
/// best session.
pub(crate) fn search_orders(
    order: &[&Item],
    catalog: &ItemCatalog,
    pallet: &PalletSpec,
    rules: StackingRules,
    limit: Option<usize>,
    deadline: &Deadline,
) -> Result<PalletSession> {
    let permutations = permutations(order.len());
    log::info!(
        "exhaustive search over {} insertion orders of {} units",
        permutations.len(),
        order.len()
    );

    let runs: Vec<PalletSession> = permutations
        .par_iter()
        .map(|perm| -> Result<PalletSession> {
            let sequence: Vec<&Item> = perm.iter().map(|&i| order[i]).collect();
            let mut session = PalletSession::for_catalog(pallet.clone(), rules, catalog);
            construct(&sequence, &mut session, catalog, limit, deadline, None)?;
            Ok(session)
        })
        .collect::<Result<_>>()?;

    let mut best: Option<(Score, PalletSession)> = None;
    for session in runs {
        let score = Score::of(&session);
        match &best {
            Some((top, _)) if !score.better_than(top) => {}
            _ => best = Some((score, session)),
        }
    }

    match best {
        Some((_, session)) => Ok(session),
        None => Ok(PalletSession::for_catalog(pallet.clone(), rules, catalog)),
    }
}

/// All permutations of `0..n` in lexicographic order.
fn permutations(n: usize) -> Vec<Vec<usize>> {
    let mut current: Vec<usize> = (0..n).collect();
    let mut out = vec![current.clone()];
    while next_permutation(&mut current) {
        out.push(current.clone());
    }
    out
}

fn next_permutation(v: &mut [usize]) -> bool {
    if v.len() < 2 {
        return false;
    }
    let Some(i) = (0..v.len() - 1).rev().find(|&i| v[i] < v[i + 1]) else {
        return false;
    };
    let j = (i + 1..v.len()).rev().find(|&j| v[j] > v[i]).unwrap_or(i + 1);
    v.swap(i, j);
    v[i + 1..].reverse();
    true
}
