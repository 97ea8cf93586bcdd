mod common;

use std::{sync::Arc, time::Duration};

use common::*;
use fragload::{ErrorDetails, FragmentLoaded, Part};
use fragload_net::{LoadTarget, RangeSpec};
use fragload_test_utils::{Reply, ScriptedNetwork, init_tracing};
use rstest::*;
use tokio::time::Instant;

fn part_indices(loaded: &FragmentLoaded) -> Vec<usize> {
    match loaded {
        FragmentLoaded::Parts { parts, .. } => parts.keys().copied().collect(),
        FragmentLoaded::Whole { .. } => panic!("expected part results"),
    }
}

#[tokio::test(start_paused = true)]
async fn chain_resolves_at_fragment_boundary() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 3.0);
    let g = fragment(2, 3.0, 3.0);
    let mut parts = parts_of(&f, 3);
    parts.extend(parts_of(&g, 1));
    script_parts(&network, &parts, 100, Duration::from_millis(200));
    let frag_loader = loader(&network, secs(5.0));
    let (on_progress, seen) = collector();

    let loaded = frag_loader
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap()
        .unwrap();

    assert!(Arc::ptr_eq(loaded.frag(), &f));
    assert_eq!(part_indices(&loaded), vec![0, 1, 2]);
    let FragmentLoaded::Parts { parts: results, .. } = &loaded else {
        unreachable!()
    };
    assert_eq!(results[&1].payload, payload("1", 100));

    let order: Vec<usize> = seen
        .lock()
        .iter()
        .map(|data| data.part.as_ref().unwrap().index)
        .collect();
    assert_eq!(order, vec![0, 1, 2]);
    assert_eq!(
        network.requested_urls(),
        vec![part_url(&f, 0), part_url(&f, 1), part_url(&f, 2)]
    );
    let targets: Vec<Option<LoadTarget>> = network.requests().into_iter().map(|r| r.target).collect();
    assert_eq!(
        targets,
        (0..3)
            .map(|part| Some(LoadTarget { sn: 1, level: 0, part: Some(part) }))
            .collect::<Vec<_>>()
    );
    assert_eq!(f.stats().loaded, 300);
    assert!(!f.stats().aborted);
    assert!(!f.has_loader());
    assert!(!frag_loader.is_loading());
}

#[rstest]
#[case::fragment_start(None, vec![0, 1, 2, 3])]
#[case::before_second_independent(Some(1.9), vec![0, 1, 2, 3])]
#[case::inclusive_start(Some(2.0), vec![2, 3])]
#[case::mid_part(Some(2.5), vec![2, 3])]
#[case::past_fragment(Some(9.0), vec![2, 3])]
#[tokio::test(start_paused = true)]
async fn chain_starts_at_latest_independent_part(
    #[case] target: Option<f64>,
    #[case] expected: Vec<usize>,
) {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 4.0);
    let g = fragment(2, 4.0, 4.0);
    let mut parts: Vec<Arc<Part>> = (0..4)
        .map(|i| part(&f, i, i as f64, 1.0, i % 2 == 0))
        .collect();
    parts.extend(parts_of(&g, 1));
    script_parts(&network, &parts, 10, Duration::ZERO);
    let (on_progress, _) = collector();

    let loaded = loader(&network, secs(5.0))
        .load(&f, Some(&details(parts)), target.map(secs), Some(on_progress))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(part_indices(&loaded), expected);
    assert_eq!(network.requests().len(), expected.len());
}

#[tokio::test(start_paused = true)]
async fn target_before_fragment_start_is_clamped() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(5, 10.0, 2.0);
    let g = fragment(6, 12.0, 2.0);
    let mut parts = parts_of(&f, 2);
    parts.extend(parts_of(&g, 1));
    script_parts(&network, &parts, 10, Duration::ZERO);
    let (on_progress, _) = collector();

    let loaded = loader(&network, secs(5.0))
        .load(&f, Some(&details(parts)), Some(secs(5.0)), Some(on_progress))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(part_indices(&loaded), vec![0, 1]);
}

#[tokio::test(start_paused = true)]
async fn exhausted_part_list_aborts_fragment() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 4.0);
    let parts = parts_of(&f, 2);
    script_parts(&network, &parts, 50, Duration::ZERO);
    let frag_loader = loader(&network, secs(5.0));
    let (on_progress, seen) = collector();

    let err = frag_loader
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap_err();

    assert_eq!(err.details, ErrorDetails::InternalAborted);
    assert!(!err.fatal);
    assert_eq!(err.part.as_ref().map(|p| p.index), Some(1));
    assert!(f.stats().aborted);
    assert_eq!(f.stats().loaded, 100);
    assert_eq!(seen.lock().len(), 2);
    assert!(!frag_loader.is_loading());
    assert!(!f.has_loader());
}

#[tokio::test(start_paused = true)]
async fn watchdog_bounds_the_whole_chain() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 4.0);
    let g = fragment(2, 4.0, 4.0);
    let mut parts = parts_of(&f, 4);
    parts.extend(parts_of(&g, 1));
    script_parts(&network, &parts, 10, secs(2.0));
    let frag_loader = loader(&network, secs(5.0));
    let (on_progress, seen) = collector();
    let started = Instant::now();

    let err = frag_loader
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap_err();

    assert_eq!(err.details, ErrorDetails::FragLoadTimeout);
    assert!(err.is_timeout());
    assert!(err.part.is_none());
    assert!(started.elapsed() >= secs(5.0));
    assert!(started.elapsed() < secs(6.0));
    assert_eq!(seen.lock().len(), 2);
    assert_eq!(network.in_flight(), 0);
    assert!(!frag_loader.is_loading());
    assert!(!f.has_loader());
}

#[tokio::test(start_paused = true)]
async fn chain_within_budget_completes() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 2.0);
    let g = fragment(2, 2.0, 2.0);
    let mut parts = parts_of(&f, 2);
    parts.extend(parts_of(&g, 1));
    script_parts(&network, &parts, 10, secs(2.0));
    let (on_progress, _) = collector();

    let loaded = loader(&network, secs(5.0))
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(part_indices(&loaded), vec![0, 1]);
}

#[rstest]
#[case::http_error(Reply::Status(500), ErrorDetails::FragLoadError)]
#[case::timeout(Reply::Timeout, ErrorDetails::FragLoadTimeout)]
#[tokio::test(start_paused = true)]
async fn failed_part_ends_chain(#[case] reply: Reply, #[case] expected: ErrorDetails) {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 3.0);
    let g = fragment(2, 3.0, 3.0);
    let mut parts = parts_of(&f, 3);
    parts.extend(parts_of(&g, 1));
    script_parts(&network, &parts, 10, Duration::ZERO);
    network.reply(&part_url(&f, 1), reply);
    let frag_loader = loader(&network, secs(5.0));
    let (on_progress, seen) = collector();

    let err = frag_loader
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap_err();

    assert_eq!(err.details, expected);
    assert_eq!(err.part.as_ref().map(|p| p.index), Some(1));
    assert_eq!(network.requested_urls(), vec![part_url(&f, 0), part_url(&f, 1)]);
    assert_eq!(seen.lock().len(), 1);
    assert!(!frag_loader.is_loading());
}

#[tokio::test(start_paused = true)]
async fn part_error_carries_response() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 2.0);
    let parts = parts_of(&f, 2);
    network.reply(&part_url(&f, 0), Reply::Status(503));
    let (on_progress, _) = collector();

    let err = loader(&network, secs(5.0))
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap_err();

    let response = err.response.as_ref().unwrap();
    assert_eq!(response.code, 503);
    assert_eq!(err.reason, "HTTP Error 503 scripted status 503");
    assert_eq!(err.network_details.as_ref().unwrap().status, Some(503));
}

#[tokio::test(start_paused = true)]
async fn gap_part_rejects_without_request() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 2.0);
    let g = fragment(2, 2.0, 2.0);
    let parts = vec![
        part(&f, 0, 0.0, 1.0, true),
        Arc::new(Part::new(&f, 1, part_url(&f, 1), secs(1.0), secs(1.0)).with_gap(true)),
        part(&g, 0, 2.0, 1.0, true),
    ];
    script_parts(&network, &parts, 10, Duration::ZERO);
    let (on_progress, _) = collector();

    let err = loader(&network, secs(5.0))
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap_err();

    assert_eq!(err.details, ErrorDetails::FragGap);
    assert_eq!(err.part.as_ref().map(|p| p.index), Some(1));
    assert_eq!(network.requested_urls(), vec![part_url(&f, 0)]);
}

#[tokio::test(start_paused = true)]
async fn byte_range_parts_request_their_range() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 2.0);
    let g = fragment(2, 2.0, 2.0);
    let shared = url("seg1.mp4");
    let parts = vec![
        Arc::new(
            Part::new(&f, 0, shared.clone(), secs(0.0), secs(1.0))
                .with_independent(true)
                .with_byte_range(0, 100),
        ),
        Arc::new(Part::new(&f, 1, shared.clone(), secs(1.0), secs(1.0)).with_byte_range(100, 250)),
        part(&g, 0, 2.0, 1.0, true),
    ];
    network.reply(&shared, Reply::Body(payload("m", 400)));
    let (on_progress, seen) = collector();

    loader(&network, secs(5.0))
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap()
        .unwrap();

    let ranges: Vec<Option<RangeSpec>> = network.requests().into_iter().map(|r| r.range).collect();
    assert_eq!(
        ranges,
        vec![
            Some(RangeSpec::from_offsets(0, 100)),
            Some(RangeSpec::from_offsets(100, 250)),
        ]
    );
    let sizes: Vec<usize> = seen.lock().iter().map(|d| d.payload.len()).collect();
    assert_eq!(sizes, vec![100, 150]);
}

#[tokio::test(start_paused = true)]
async fn part_stats_fold_into_fragment_estimate() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = fragment(1, 0.0, 4.0);
    let g = fragment(2, 4.0, 4.0);
    let mut parts = parts_of(&f, 4);
    parts.extend(parts_of(&g, 1));
    script_parts(&network, &parts, 1000, secs(0.5));
    let totals = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let on_progress: fragload::ProgressCallback = {
        let totals = Arc::clone(&totals);
        Box::new(move |data: fragload::LoadedData| {
            let stats = data.frag.stats();
            totals.lock().push((stats.loaded, stats.total));
        })
    };

    loader(&network, secs(5.0))
        .load(&f, Some(&details(parts.clone())), None, Some(on_progress))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        *totals.lock(),
        vec![(1000, 5000), (2000, 5000), (3000, 5000), (4000, 5000)]
    );
    let stats = f.stats();
    assert_eq!(parts[3].stats().loaded, 1000);
    assert_eq!(stats.loading.end, parts[3].stats().loading.end);
    assert!(stats.loading.start.is_some());
}

#[tokio::test(start_paused = true)]
async fn hint_fragment_without_independent_part_resolves_empty() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = hint_fragment(7, 0.0, 2.0);
    let parts = vec![part(&f, 0, 0.0, 1.0, false), part(&f, 1, 1.0, 1.0, false)];
    let frag_loader = loader(&network, secs(5.0));
    let (on_progress, seen) = collector();

    let loaded = frag_loader
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap();

    assert!(loaded.is_none());
    assert_eq!(network.instances(), 1);
    assert!(network.requests().is_empty());
    assert!(seen.lock().is_empty());
    assert!(!frag_loader.is_loading());
    assert!(!f.has_loader());
}

#[tokio::test(start_paused = true)]
async fn hint_fragment_loads_published_parts() {
    init_tracing();
    let network = ScriptedNetwork::new();
    let f = hint_fragment(7, 0.0, 2.0);
    let g = hint_fragment(8, 2.0, 2.0);
    let mut parts = parts_of(&f, 2);
    parts.extend(parts_of(&g, 1));
    script_parts(&network, &parts, 10, Duration::ZERO);
    let (on_progress, _) = collector();

    let loaded = loader(&network, secs(5.0))
        .load(&f, Some(&details(parts)), None, Some(on_progress))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(part_indices(&loaded), vec![0, 1]);
}
