//! Frequency counting over logged error texts.

use std::collections::HashMap;

/// Return the most frequent item, comparing by exact equality.
///
/// Ties are broken by first-seen order. Returns `None` for an empty input.
pub fn most_frequent<'a, I>(items: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    // item -> (first index, count)
    let mut counts: HashMap<&'a str, (usize, usize)> = HashMap::new();
    for (idx, item) in items.into_iter().enumerate() {
        counts.entry(item).or_insert((idx, 0)).1 += 1;
    }
    counts
        .into_iter()
        .max_by(|(_, (first_a, count_a)), (_, (first_b, count_b))| {
            count_a.cmp(count_b).then(first_b.cmp(first_a))
        })
        .map(|(item, _)| item)
}
