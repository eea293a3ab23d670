//! Kind diversification of a ranked list.
//!
//! When candidates span several kinds, no kind may fill more than 60% of
//! the output (`ceil(3n / 5)` of `n` slots). The output keeps ranked order.

use std::collections::HashMap;

use crate::types::{ResultKind, SearchResult};

/// Maximum items of one kind in an output of `n` items.
pub fn kind_cap(n: usize) -> usize {
    (3 * n).div_ceil(5)
}

/// Select up to `limit` results from a ranked list under the per-kind cap.
///
/// 1. Seed with the top result.
/// 2. Backfill one result of each kind not yet present, taken from the
///    upper half of the remaining candidates.
/// 3. Fill by rank, skipping kinds already at the cap.
///
/// If the pool is too lopsided to fill `limit` slots under the cap, the
/// output shrinks to the largest size the cap allows. A single-kind pool is
/// truncated without diversification.
pub fn diversify(ranked: Vec<SearchResult>, limit: usize) -> Vec<SearchResult> {
    let wanted = limit.min(ranked.len());
    if wanted == 0 {
        return Vec::new();
    }

    let mut available: HashMap<ResultKind, usize> = HashMap::new();
    for result in &ranked {
        *available.entry(result.kind).or_default() += 1;
    }
    if available.len() < 2 {
        let mut ranked = ranked;
        ranked.truncate(wanted);
        return ranked;
    }

    let target = (1..=wanted)
        .rev()
        .find(|&n| available.values().map(|&count| count.min(kind_cap(n))).sum::<usize>() >= n)
        .unwrap_or(1);
    let cap = kind_cap(target);

    let mut selected = vec![false; ranked.len()];
    let mut taken: HashMap<ResultKind, usize> = HashMap::new();
    let mut count = 0usize;

    mark(0, ranked[0].kind, &mut selected, &mut taken);
    count += 1;

    let rest = ranked.len() - 1;
    let upper_half_end = 1 + rest.div_ceil(2);
    for (index, result) in ranked.iter().enumerate().take(upper_half_end).skip(1) {
        if count >= target {
            break;
        }
        if !taken.contains_key(&result.kind) {
            mark(index, result.kind, &mut selected, &mut taken);
            count += 1;
        }
    }

    for (index, result) in ranked.iter().enumerate() {
        if count >= target {
            break;
        }
        if !selected[index] && taken.get(&result.kind).copied().unwrap_or(0) < cap {
            mark(index, result.kind, &mut selected, &mut taken);
            count += 1;
        }
    }

    if target < wanted {
        tracing::debug!(wanted, kept = target, "result pool too uniform, output shrunk to respect kind cap");
    }

    ranked
        .into_iter()
        .zip(selected)
        .filter_map(|(result, keep)| keep.then_some(result))
        .collect()
}

fn mark(index: usize, kind: ResultKind, selected: &mut [bool], taken: &mut HashMap<ResultKind, usize>) {
    selected[index] = true;
    *taken.entry(kind).or_default() += 1;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::DateTime;

    fn make(kind: ResultKind, id: usize) -> SearchResult {
        SearchResult {
            id: format!("{kind}-{id}"),
            kind,
            title: String::new(),
            community: String::new(),
            author: String::new(),
            content: String::new(),
            url: String::new(),
            created_at: DateTime::default(),
            score: 0,
            reply_count: 0,
            highlights: vec![],
            relevance: 0.0,
        }
    }

    fn counts(results: &[SearchResult]) -> HashMap<ResultKind, usize> {
        let mut map = HashMap::new();
        for r in results {
            *map.entry(r.kind).or_default() += 1;
        }
        map
    }

    #[test]
    fn cap_is_sixty_percent_rounded_up() {
        assert_eq!(kind_cap(1), 1);
        assert_eq!(kind_cap(5), 3);
        assert_eq!(kind_cap(6), 4);
        assert_eq!(kind_cap(10), 6);
    }

    #[test]
    fn mixed_pool_respects_cap() {
        let mut ranked: Vec<_> = (0..8).map(|i| make(ResultKind::Post, i)).collect();
        ranked.extend((0..4).map(|i| make(ResultKind::Comment, i)));
        let out = diversify(ranked, 10);
        assert_eq!(out.len(), 10);
        let c = counts(&out);
        assert_eq!(c[&ResultKind::Post], 6);
        assert_eq!(c[&ResultKind::Comment], 4);
    }

    #[test]
    fn seed_is_top_result_and_order_is_kept() {
        let mut ranked: Vec<_> = (0..6).map(|i| make(ResultKind::Post, i)).collect();
        ranked.insert(2, make(ResultKind::Community, 0));
        ranked.push(make(ResultKind::Comment, 0));
        let out = diversify(ranked, 6);
        assert_eq!(out[0].id, "post-0");
        assert_eq!(out[2].id, "community-0");
        assert!(out.iter().any(|r| r.kind == ResultKind::Comment));
    }

    #[test]
    fn lopsided_pool_shrinks_output() {
        let mut ranked: Vec<_> = (0..8).map(|i| make(ResultKind::Post, i)).collect();
        ranked.extend((0..2).map(|i| make(ResultKind::Comment, i)));
        let out = diversify(ranked, 10);
        assert_eq!(out.len(), 7);
        for (_, n) in counts(&out) {
            assert!(n <= kind_cap(out.len()));
        }
    }

    #[test]
    fn cap_holds_for_many_shapes() {
        for posts in 0..12 {
            for comments in 0..12 {
                for communities in 0..3 {
                    let mut ranked = Vec::new();
                    ranked.extend((0..posts).map(|i| make(ResultKind::Post, i)));
                    ranked.extend((0..comments).map(|i| make(ResultKind::Comment, i)));
                    ranked.extend((0..communities).map(|i| make(ResultKind::Community, i)));
                    let kinds = [posts, comments, communities].iter().filter(|&&n| n > 0).count();
                    if ranked.len() < 6 || kinds < 2 {
                        continue;
                    }
                    for limit in [6, 10, 25] {
                        let out = diversify(ranked.clone(), limit);
                        assert!(!out.is_empty());
                        assert!(out.len() <= limit);
                        for (_, n) in counts(&out) {
                            assert!(n <= kind_cap(out.len()), "{posts}/{comments}/{communities} limit {limit}");
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn single_kind_pool_is_truncated() {
        let ranked: Vec<_> = (0..10).map(|i| make(ResultKind::Post, i)).collect();
        assert_eq!(diversify(ranked, 4).len(), 4);
    }

    #[test]
    fn empty_or_zero_limit() {
        assert!(diversify(Vec::new(), 5).is_empty());
        assert!(diversify(vec![make(ResultKind::Post, 0)], 0).is_empty());
    }
}
