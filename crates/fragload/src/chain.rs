//! Sequential part loading up to the fragment boundary.

use std::{collections::BTreeMap, sync::Arc};

use fragload_net::{LoadOutcome, Transport, TransportConfig};
use tracing::{debug, trace};

use crate::{
    context::part_request,
    error::{FragResult, LoadError},
    fragment::{Fragment, Part},
    loaded::LoadedData,
    parts::{ChainStep, next_step},
    stats::merge_part_stats,
};

/// Load `parts[start..]` one at a time while they belong to `frag`.
///
/// Each part is merged into the fragment stats and handed to `on_progress`
/// before the next request starts. Reaching the end of the list without
/// crossing into another fragment aborts the fragment: its remaining parts
/// are not published yet.
pub(crate) async fn load_part_chain(
    transport: &dyn Transport,
    frag: &Arc<Fragment>,
    parts: &[Arc<Part>],
    start: usize,
    config: &TransportConfig,
    on_progress: &mut (dyn FnMut(LoadedData) + Send),
) -> FragResult<BTreeMap<usize, LoadedData>> {
    let mut loaded = BTreeMap::new();
    let mut position = start;

    loop {
        let part = &parts[position];
        if part.gap {
            return Err(LoadError::gap(frag, Some(part)));
        }

        let request = part_request(frag, part);
        trace!(sn = frag.sn, part = part.index, url = %request.url, "fragload: part request");

        let (response, stats, details) = match transport.load(&request, config, None).await {
            LoadOutcome::Success {
                response,
                stats,
                details,
            } => (response, stats, details),
            LoadOutcome::Error { response, details } => {
                return Err(LoadError::request_failed(frag, Some(part), response, details));
            }
            LoadOutcome::Timeout { stats, details } => {
                part.set_stats(stats);
                return Err(LoadError::timed_out(frag, Some(part), Some(details)));
            }
            LoadOutcome::Aborted { stats, details } => {
                part.set_stats(stats);
                return Err(LoadError::aborted(frag, Some(part), "Loader aborted", Some(details)));
            }
        };

        part.set_stats(stats);
        merge_part_stats(frag, part);

        let data = LoadedData {
            frag: Arc::clone(frag),
            part: Some(Arc::clone(part)),
            payload: response.data,
            network_details: details,
        };
        on_progress(data.clone());
        loaded.insert(part.index, data);

        match next_step(parts, frag, position) {
            ChainStep::Continue(next) => position = next,
            ChainStep::Complete => {
                debug!(sn = frag.sn, parts = loaded.len(), "fragload: fragment parts complete");
                return Ok(loaded);
            }
            ChainStep::Exhausted => {
                debug!(sn = frag.sn, part = part.index, "fragload: part list exhausted before fragment end");
                frag.update_stats(|stats| stats.aborted = true);
                return Err(LoadError::aborted(
                    frag,
                    Some(part),
                    "Part list exhausted before fragment boundary",
                    None,
                ));
            }
        }
    }
}
