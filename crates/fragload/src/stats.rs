//! Folding per-part stats into the owning fragment's stats.

use std::time::Duration;

use fragload_net::LoadStats;

use crate::fragment::{Fragment, Part};

/// Merge a completed part's stats into its fragment.
pub fn merge_part_stats(frag: &Fragment, part: &Part) {
    let part_stats = part.stats();
    frag.update_stats(|frag_stats| {
        merge_into(frag_stats, &part_stats, frag.duration, part.duration);
    });
}

/// `total` becomes an extrapolated estimate of the whole fragment's size,
/// recomputed after every part.
#[expect(
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "byte counts and part counts stay far below 2^52"
)]
pub(crate) fn merge_into(
    frag_stats: &mut LoadStats,
    part_stats: &LoadStats,
    frag_duration: Duration,
    part_duration: Duration,
) {
    frag_stats.loaded += part_stats.loaded;

    if part_stats.total > 0 {
        let loaded = frag_stats.loaded as f64;
        // A part has just completed, so at least one is loaded.
        let est_loaded_parts = (loaded / part_stats.total as f64).round().max(1.0);
        let est_total_parts = if part_duration.is_zero() {
            est_loaded_parts
        } else {
            (frag_duration.as_secs_f64() / part_duration.as_secs_f64()).round()
        };
        let est_remaining_parts = (est_total_parts - est_loaded_parts).max(0.0);
        let est_part_bytes = (loaded / est_loaded_parts).round();
        frag_stats.total =
            frag_stats.loaded + part_stats.total + (est_remaining_parts * est_part_bytes) as u64;
    } else {
        frag_stats.total = frag_stats.total.max(frag_stats.loaded);
    }

    let frag_loading = &mut frag_stats.loading;
    let part_loading = &part_stats.loading;
    match frag_loading.start {
        Some(start) => {
            // Shift by the idle time between the previous part and this one.
            let gap = match (part_loading.start, frag_loading.end) {
                (Some(part_start), Some(prev_end)) => part_start.saturating_duration_since(prev_end),
                _ => Duration::ZERO,
            };
            frag_loading.start = Some(start + gap);
            frag_loading.first = frag_loading.first.map(|first| first + gap);
        }
        None => {
            frag_loading.start = part_loading.start;
            frag_loading.first = part_loading.first;
        }
    }
    frag_loading.end = part_loading.end;
}
