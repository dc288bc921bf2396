use std::collections::HashMap;

use uuid::Uuid;

/// Fold row-per-line records into one accumulator per order.
///
/// Accumulators come out in the order their first record was seen. `start`
/// builds an accumulator from the first record of an order; `add` folds every
/// record of that order (including the first) into it.
pub(crate) fn group_by_order<'a, R, V>(
    records: impl IntoIterator<Item = &'a R>,
    order_id: impl Fn(&R) -> Uuid,
    start: impl Fn(&R) -> V,
    mut add: impl FnMut(&mut V, &R),
) -> Vec<V>
where
    R: 'a,
{
    let mut groups: Vec<V> = Vec::new();
    let mut slots: HashMap<Uuid, usize> = HashMap::new();

    for record in records {
        let slot = *slots.entry(order_id(record)).or_insert_with(|| {
            groups.push(start(record));
            groups.len() - 1
        });

        if let Some(group) = groups.get_mut(slot) {
            add(group, record);
        }
    }

    groups
}
