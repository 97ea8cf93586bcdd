//! Walking the live part list: where a chain starts and when it ends.

use std::{sync::Arc, time::Duration};

use crate::fragment::{Fragment, Part};

/// Position in `parts` of the latest independent part of `frag` starting at
/// or before `target`.
///
/// Parts are time-ordered, so the scan stops at the first part starting
/// after `target`.
#[must_use]
pub fn find_independent_part(
    parts: &[Arc<Part>],
    frag: &Arc<Fragment>,
    target: Duration,
) -> Option<usize> {
    parts
        .iter()
        .enumerate()
        .take_while(|(_, part)| part.start <= target)
        .filter(|(_, part)| part.independent && part.belongs_to(frag))
        .map(|(position, _)| position)
        .last()
}

/// What follows a successfully loaded part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChainStep {
    /// The next part in the list belongs to the same fragment.
    Continue(usize),
    /// The next part belongs to another fragment: this fragment is complete.
    Complete,
    /// The loaded part is the last one published; the fragment boundary is
    /// not known yet.
    Exhausted,
}

#[must_use]
pub fn next_step(parts: &[Arc<Part>], frag: &Arc<Fragment>, position: usize) -> ChainStep {
    match parts.get(position + 1) {
        None => ChainStep::Exhausted,
        Some(next) if next.belongs_to(frag) => ChainStep::Continue(position + 1),
        Some(_) => ChainStep::Complete,
    }
}
