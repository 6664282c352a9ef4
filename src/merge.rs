//! Reconcile a freshly generated study with a previously persisted one.

use std::collections::{HashMap, HashSet};

use crate::errors::StudyError;
use crate::study::{reorder, ParameterSet, ParameterStudy, SetNameTemplate};

/// Merge `current` into `previous`.
///
/// Sets whose content hash already exists in `previous` keep the previous set name.
/// Sets with new content are appended under the lowest numbered name from `template`
/// that is not used by any surviving set. Previous sets that were not regenerated are
/// kept unless `prune` is set. Neither input is modified.
///
/// When `previous` holds several sets with the same hash, all of them are kept (subject
/// to `prune`) under their own names and a warning is logged. The duplicates only
/// count once when deciding whether a current set is already present.
///
/// # Errors
///
/// Returns [`StudyError::ParameterMismatch`] when the two studies do not define the same
/// parameters.
pub fn merge_studies(
    current: &ParameterStudy,
    previous: &ParameterStudy,
    template: &SetNameTemplate,
    prune: bool,
) -> Result<ParameterStudy, StudyError> {
    let parameter_names = current.parameter_names().to_vec();
    let mismatch = || StudyError::ParameterMismatch {
        previous: previous.parameter_names().to_vec(),
        current: parameter_names.clone(),
    };

    let mut previous_sets = Vec::with_capacity(previous.set_count());
    for mut set in previous.parameter_sets() {
        let values = std::mem::take(&mut set.values);
        let quantiles = set.quantiles.take();
        let (values, quantiles) = align(previous.parameter_names(), &parameter_names, values, quantiles)
            .ok_or_else(mismatch)?;
        set.values = values;
        set.quantiles = quantiles;
        previous_sets.push(set);
    }

    let mut previous_by_hash: HashMap<&str, usize> = HashMap::new();
    for (index, set) in previous_sets.iter().enumerate() {
        if let Some(first) = previous_by_hash.get(set.set_hash.as_str()) {
            tracing::warn!(
                kept = %previous_sets[*first].set_name,
                ignored = %set.set_name,
                "previous parameter study holds two sets with the same content hash"
            );
            continue;
        }
        previous_by_hash.insert(set.set_hash.as_str(), index);
    }

    let current_hashes: HashSet<&str> = current
        .parameter_set_hashes()
        .iter()
        .map(String::as_str)
        .collect();
    let mut merged: Vec<ParameterSet> = previous_sets
        .iter()
        .filter(|set| !prune || current_hashes.contains(set.set_hash.as_str()))
        .cloned()
        .collect();
    let mut used_names: HashSet<String> = merged.iter().map(|set| set.set_name.clone()).collect();

    let mut reused = 0;
    let mut next_number = 0;
    let mut added_hashes = HashSet::new();
    for mut set in current.parameter_sets() {
        if previous_by_hash.contains_key(set.set_hash.as_str()) {
            reused += 1;
            continue;
        }
        if !added_hashes.insert(set.set_hash.clone()) {
            continue;
        }
        while used_names.contains(&template.render(next_number)) {
            next_number += 1;
        }
        set.set_name = template.render(next_number);
        used_names.insert(set.set_name.clone());
        merged.push(set);
    }

    tracing::info!(
        previous = previous.set_count(),
        reused,
        added = added_hashes.len(),
        total = merged.len(),
        "merged parameter study with previous study"
    );
    Ok(ParameterStudy::from_sets(parameter_names, merged))
}

/// Reorder one previous set's values and quantiles to the current column order.
#[allow(clippy::type_complexity)]
fn align(
    previous_names: &[String],
    current_names: &[String],
    values: Vec<(String, crate::value::ParameterValue)>,
    quantiles: Option<Vec<f64>>,
) -> Option<(Vec<(String, crate::value::ParameterValue)>, Option<Vec<f64>>)> {
    let values = reorder(current_names, values)?;
    let quantiles = match quantiles {
        Some(quantiles) => {
            let mut ordered = Vec::with_capacity(current_names.len());
            for name in current_names {
                let column = previous_names.iter().position(|previous| previous == name)?;
                ordered.push(*quantiles.get(column)?);
            }
            Some(ordered)
        }
        None => None,
    };
    Some((values, quantiles))
}
