/*============================================================
  Synavera Project: Syn-Fame
  Module: synfame_core::graph
  Etiquette: Synavera Script Etiquette — Rust Profile v1.1.1
  ------------------------------------------------------------
  Purpose:
    Order a batch of inspected packages so that every package
    follows the batch members it depends on.

  Security / Safety Notes:
    Pure computation; no I/O performed in this module.

  Dependencies:
    std collections only.

  Operational Scope:
    Runs between directory scan and precondition validation,
    and backs the `plan` dry-run command.

  Revision History:
    2025-11-12 COD  Authored dependency sorter.
  ------------------------------------------------------------
  SSE Principles Observed:
    - Deterministic ordering for reproducible uploads
    - Cycles surface as explicit errors, never as hangs
============================================================*/

use std::collections::HashMap;

use crate::error::{Result, SynfameError};
use crate::package_info::PackageDescriptor;

/// Sort packages into upload order.
///
/// Packages are first stably ordered by the length of their raw
/// dependency list. Then the pending packages are swept in that seed
/// order, placing each one whose in-batch dependencies are already
/// placed, including those placed earlier in the same sweep. Sweeps
/// repeat until everything is placed; a sweep that places nothing means
/// the rest form a cycle. Dependencies on apps outside the batch are
/// treated as satisfied.
pub fn sort(descriptors: Vec<PackageDescriptor>) -> Result<Vec<PackageDescriptor>> {
    let mut seeded = descriptors;
    seeded.sort_by_key(|pkg| pkg.dependencies.len());

    let position: HashMap<String, usize> = seeded
        .iter()
        .enumerate()
        .map(|(idx, pkg)| (pkg.app_id.to_ascii_lowercase(), idx))
        .collect();

    let mut in_degree = vec![0usize; seeded.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); seeded.len()];
    for (idx, pkg) in seeded.iter().enumerate() {
        let mut seen = Vec::new();
        for dep in &pkg.dependencies {
            let Some(&target) = position.get(&dep.app_id.to_ascii_lowercase()) else {
                continue;
            };
            if target == idx || seen.contains(&target) {
                continue;
            }
            seen.push(target);
            dependents[target].push(idx);
            in_degree[idx] += 1;
        }
    }

    let mut pending: Vec<usize> = (0..seeded.len()).collect();
    let mut order = Vec::with_capacity(seeded.len());
    while !pending.is_empty() {
        let before = pending.len();
        pending.retain(|&idx| {
            if in_degree[idx] > 0 {
                return true;
            }
            order.push(idx);
            for &next in &dependents[idx] {
                in_degree[next] -= 1;
            }
            false
        });
        if pending.len() == before {
            let apps = pending
                .iter()
                .map(|&idx| format!("{} ({})", seeded[idx].name, seeded[idx].app_id))
                .collect();
            return Err(SynfameError::Cycle { apps });
        }
    }

    let mut slots: Vec<Option<PackageDescriptor>> = seeded.into_iter().map(Some).collect();
    Ok(order
        .into_iter()
        .filter_map(|idx| slots[idx].take())
        .collect())
}

/// Check that `ordered` places every in-batch dependency first.
pub fn is_valid_order(ordered: &[PackageDescriptor]) -> bool {
    let index: HashMap<String, usize> = ordered
        .iter()
        .enumerate()
        .map(|(idx, pkg)| (pkg.app_id.to_ascii_lowercase(), idx))
        .collect();
    ordered.iter().enumerate().all(|(idx, pkg)| {
        pkg.dependencies.iter().all(|dep| {
            index
                .get(&dep.app_id.to_ascii_lowercase())
                .map_or(true, |&at| at <= idx)
        })
    })
}
