//! Disambiguation of multiple search hits for one key.

use metaforge_common::Candidate;

/// Move the candidate that best matches `key` to the front.
///
/// Nothing moves when there is at most one candidate or the first one
/// already matches. An exact case-insensitive match wins; otherwise the
/// smallest edit distance does, with ties going to the earlier candidate.
/// Everything else keeps its relative order.
pub fn rank(key: &str, candidates: &mut Vec<Candidate>) {
    if candidates.len() < 2 || candidates[0].num.eq_ignore_ascii_case(key) {
        return;
    }

    let best = match candidates
        .iter()
        .position(|c| c.num.eq_ignore_ascii_case(key))
    {
        Some(i) => i,
        None => {
            let key = key.to_uppercase();
            let mut best = 0;
            let mut best_distance = usize::MAX;
            for (i, c) in candidates.iter().enumerate() {
                let d = levenshtein(&key, &c.num.to_uppercase());
                if d < best_distance {
                    best = i;
                    best_distance = d;
                }
            }
            best
        }
    };

    if best > 0 {
        let c = candidates.remove(best);
        candidates.insert(0, c);
    }
}

/// Edit distance between two strings, counted in chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut cur = vec![0; b.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        cur[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            cur[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(cur[j] + 1);
        }
        std::mem::swap(&mut prev, &mut cur);
    }

    prev[b.len()]
}
