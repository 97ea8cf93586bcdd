use fragload_net::{LoadTarget, RangeSpec, RequestContext};

use crate::fragment::{Fragment, Part};

fn byte_range(start: Option<u64>, end: Option<u64>) -> Option<RangeSpec> {
    match (start, end) {
        (Some(start), Some(end)) => Some(RangeSpec::from_offsets(start, end)),
        _ => None,
    }
}

/// Request for a whole fragment; `None` while the fragment has no URL.
pub(crate) fn fragment_request(frag: &Fragment) -> Option<RequestContext> {
    let url = frag.url.clone()?;
    Some(
        RequestContext::new(url)
            .with_range(byte_range(
                frag.byte_range_start_offset,
                frag.byte_range_end_offset,
            ))
            .with_target(target(frag, None)),
    )
}

pub(crate) fn part_request(frag: &Fragment, part: &Part) -> RequestContext {
    RequestContext::new(part.url.clone())
        .with_range(byte_range(
            part.byte_range_start_offset,
            part.byte_range_end_offset,
        ))
        .with_target(target(frag, Some(part.index)))
}

fn target(frag: &Fragment, part: Option<usize>) -> LoadTarget {
    LoadTarget {
        sn: frag.sn,
        level: frag.level,
        part,
    }
}
