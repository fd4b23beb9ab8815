use super::dimension::DimensionKey;
use super::error::AggregationError;
use super::step::Step;
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// Steps grouped by dimension, each group in ascending completion order.
///
/// Groups borrow the caller's steps; building them never reorders or
/// modifies the input.
pub type StepGroups<'a> = BTreeMap<DimensionKey, Vec<&'a Step>>;

/// Group steps by [`DimensionKey`] and order every group by completion time.
///
/// Steps without a completion time sort after every timed step of their
/// group. Ties keep input order.
pub fn group_and_order(steps: &[Step]) -> StepGroups<'_> {
    let mut groups: StepGroups<'_> = BTreeMap::new();
    for step in steps {
        groups
            .entry(DimensionKey::of(&step.dimension))
            .or_default()
            .push(step);
    }

    for group in groups.values_mut() {
        // `sort_by` is stable, which is what keeps ties in input order.
        group.sort_by(|a, b| compare_completion(a, b));
    }

    groups
}

/// Like [`group_and_order`], but every step must carry a completion time so
/// the last element of each group is its final attempt.
pub fn group_for_last_attempt(steps: &[Step]) -> Result<StepGroups<'_>, AggregationError> {
    if let Some((index, step)) = steps
        .iter()
        .enumerate()
        .find(|(_, step)| step.completion_time.is_none())
    {
        return Err(AggregationError::MissingCompletionTime {
            index,
            dimension: DimensionKey::of(&step.dimension).to_string(),
            step: Box::new(step.clone()),
        });
    }

    Ok(group_and_order(steps))
}

fn compare_completion(a: &Step, b: &Step) -> Ordering {
    match (&a.completion_time, &b.completion_time) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
