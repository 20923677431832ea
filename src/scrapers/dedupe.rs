//! Within-batch duplicate removal.
//!
//! Two keys are used by the category pipeline: the resolved URL when merging
//! listings from several sources, and the normalized title afterwards so the
//! same story linked under two URLs collapses as well. First occurrence wins
//! and relative order is preserved.

use crate::models::Candidate;
use crate::utils::normalize_title;
use itertools::Itertools;
use tracing::debug;

/// Drop candidates whose normalized title was already seen.
pub fn dedupe_by_title(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let before = candidates.len();
    let unique: Vec<Candidate> = candidates
        .into_iter()
        .unique_by(|c| normalize_title(&c.title))
        .collect();
    debug!(before, after = unique.len(), "Deduplicated by title");
    unique
}

/// Drop candidates whose resolved URL was already seen.
pub fn dedupe_by_url(candidates: Vec<Candidate>) -> Vec<Candidate> {
    let before = candidates.len();
    let unique: Vec<Candidate> = candidates
        .into_iter()
        .unique_by(|c| c.url.as_str().to_string())
        .collect();
    debug!(before, after = unique.len(), "Deduplicated by url");
    unique
}
