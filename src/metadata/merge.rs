//! Field-level merging of a secondary record into a primary one.

use metaforge_common::Record;

/// Fill the gaps in `primary` from `secondary`.
///
/// Non-empty primary scalars are never overwritten. A title equal to the
/// title code counts as missing and is never used as a fill. Genres, actors
/// and samples are unioned case-insensitively, keeping primary order and
/// appending new items. Returns whether anything changed.
pub fn merge_into(primary: &mut Record, secondary: &Record) -> bool {
    let mut changed = false;

    let primary_title_missing =
        primary.title.trim().is_empty() || primary.title.eq_ignore_ascii_case(&primary.num);
    let secondary_title_usable = !secondary.title.trim().is_empty()
        && !secondary.title.eq_ignore_ascii_case(&secondary.num)
        && !secondary.title.eq_ignore_ascii_case(&primary.num);
    if primary_title_missing && secondary_title_usable && primary.title != secondary.title {
        primary.title = secondary.title.clone();
        changed = true;
    }

    changed |= fill(&mut primary.plot, &secondary.plot);
    changed |= fill(&mut primary.cover, &secondary.cover);
    changed |= fill(&mut primary.director, &secondary.director);
    changed |= fill(&mut primary.studio, &secondary.studio);
    changed |= fill(&mut primary.maker, &secondary.maker);
    changed |= fill(&mut primary.set, &secondary.set);
    changed |= fill(&mut primary.runtime, &secondary.runtime);
    changed |= fill(&mut primary.date, &secondary.date);

    if primary.rating.is_none() && secondary.rating.is_some() {
        primary.rating = secondary.rating;
        changed = true;
    }

    changed |= union(&mut primary.genres, &secondary.genres);
    changed |= union(&mut primary.actors, &secondary.actors);
    changed |= union(&mut primary.samples, &secondary.samples);

    changed
}

fn fill(target: &mut String, source: &str) -> bool {
    if target.trim().is_empty() && !source.trim().is_empty() {
        *target = source.to_string();
        return true;
    }
    false
}

/// Append items of `source` not already in `target`, ignoring case.
pub fn union(target: &mut Vec<String>, source: &[String]) -> bool {
    let before = target.len();
    for item in source {
        let trimmed = item.trim();
        if trimmed.is_empty() {
            continue;
        }
        let lower = trimmed.to_lowercase();
        if !target.iter().any(|t| t.trim().to_lowercase() == lower) {
            target.push(trimmed.to_string());
        }
    }
    target.len() != before
}
