//! `parametricSweep` factory: the cartesian product of one or more integer
//! ranges, each instance substituted into the repeat task's placeholders.

use serde_json::Value;

use super::{attach_merge_task_dependency, parse_repeat_task, transform_repeat_task, SubstitutionContext};
use crate::error::{Error, Result};
use crate::model::{JsonObject, ParameterSet};

/// Parses and validates each `parameterSets` entry: `step` may not be
/// zero, and its sign must agree with the direction from `start` to `end`.
pub fn parse_parameter_sets(sets: &[Value]) -> Result<Vec<ParameterSet>> {
    if sets.is_empty() {
        return Err(Error::Validation("no parameter set is defined in parametric sweep task factory".into()));
    }
    sets.iter()
        .map(|s| {
            let obj = s
                .as_object()
                .ok_or_else(|| Error::Validation("each parameter set must be an object".into()))?;
            let int_err = || Error::Validation("'start', 'end' and 'step' of a parameter set must be integers".into());
            let start = obj
                .get("start")
                .ok_or_else(|| Error::Validation("no 'start' is specified for a parameter set".into()))?
                .as_i64()
                .ok_or_else(int_err)?;
            let end = obj
                .get("end")
                .ok_or_else(|| Error::Validation("no 'end' is specified for a parameter set".into()))?
                .as_i64()
                .ok_or_else(int_err)?;
            let step = match obj.get("step") {
                Some(v) => v.as_i64().ok_or_else(int_err)?,
                None => 1,
            };
            if step == 0 {
                return Err(Error::Validation("'step' of a parameter set cannot be 0".into()));
            }
            if start > end && step > 0 {
                return Err(Error::Validation(
                    "'step' must be a negative number when 'start' is greater than 'end'".into(),
                ));
            }
            if start < end && step < 0 {
                return Err(Error::Validation(
                    "'step' must be a positive number when 'end' is greater than 'start'".into(),
                ));
            }
            Ok(ParameterSet { start, end, step })
        })
        .collect()
}

fn inclusive_range(set: &ParameterSet) -> Vec<i64> {
    let mut values = Vec::new();
    let mut current = set.start;
    if set.step > 0 {
        while current <= set.end {
            values.push(current);
            current += set.step;
        }
    } else {
        while current >= set.end {
            values.push(current);
            current += set.step;
        }
    }
    values
}

/// Row-major cartesian product across `sets`, last dimension varying
/// fastest (matching `itertools.product`'s iteration order).
pub fn cartesian_product(sets: &[ParameterSet]) -> Vec<Vec<i64>> {
    let ranges: Vec<Vec<i64>> = sets.iter().map(inclusive_range).collect();
    let mut result: Vec<Vec<i64>> = vec![vec![]];
    for range in &ranges {
        let mut next = Vec::with_capacity(result.len() * range.len().max(1));
        for prefix in &result {
            for &value in range {
                let mut combo = prefix.clone();
                combo.push(value);
                next.push(combo);
            }
        }
        result = next;
    }
    result
}

pub fn expand(factory: &JsonObject) -> Result<Vec<JsonObject>> {
    let sets_value = factory
        .get("parameterSets")
        .and_then(|v| v.as_array())
        .ok_or_else(|| Error::Validation("parameter set in parametric sweep task factory is missing or invalid".into()))?;
    let sets = parse_parameter_sets(sets_value)?;

    let repeat_task_value = factory
        .get("repeatTask")
        .and_then(|v| v.as_object())
        .ok_or_else(|| Error::Validation("no repeat task is defined in parametric sweep task factory".into()))?;
    let repeat_task = parse_repeat_task(repeat_task_value)?;

    let permutations = cartesian_product(&sets);
    let mut tasks = Vec::with_capacity(permutations.len());
    for (index, combo) in permutations.iter().enumerate() {
        let ctx = SubstitutionContext::Sweep(combo);
        tasks.push(transform_repeat_task(&repeat_task, &ctx, index)?);
    }

    if let Some(merge_value) = factory.get("mergeTask").and_then(|v| v.as_object()) {
        let mut merge_task = parse_repeat_task(merge_value)?;
        attach_merge_task_dependency(&mut merge_task, tasks.len());
        tasks.push(merge_task);
    }

    Ok(tasks)
}
