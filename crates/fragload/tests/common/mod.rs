#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use bytes::Bytes;
use fragload::{
    Fragment, FragmentLoader, FragmentLoaderConfig, LevelDetails, LoadedData, Part,
    ProgressCallback,
};
use fragload_test_utils::{Reply, ScriptedNetwork};
use parking_lot::Mutex;
use url::Url;

pub fn url(path: &str) -> Url {
    Url::parse("http://cdn.test/live/")
        .unwrap()
        .join(path)
        .unwrap()
}

pub fn secs(s: f64) -> Duration {
    Duration::from_secs_f64(s)
}

pub fn fragment(sn: u64, start: f64, duration: f64) -> Arc<Fragment> {
    Arc::new(Fragment::new(sn, secs(start), secs(duration)).with_url(url(&format!("seg{sn}.ts"))))
}

/// Live hint fragment: parts are published, its URL is not.
pub fn hint_fragment(sn: u64, start: f64, duration: f64) -> Arc<Fragment> {
    Arc::new(Fragment::new(sn, secs(start), secs(duration)))
}

pub fn part_url(frag: &Fragment, index: usize) -> Url {
    url(&format!("seg{}.part{index}.ts", frag.sn))
}

pub fn part(frag: &Arc<Fragment>, index: usize, start: f64, duration: f64, independent: bool) -> Arc<Part> {
    Arc::new(
        Part::new(frag, index, part_url(frag, index), secs(start), secs(duration))
            .with_independent(independent),
    )
}

/// Parts of `frag`, one second each, the first one independent.
pub fn parts_of(frag: &Arc<Fragment>, count: usize) -> Vec<Arc<Part>> {
    let start = frag.start.as_secs_f64();
    (0..count)
        .map(|i| part(frag, i, start + i as f64, 1.0, i == 0))
        .collect()
}

pub fn payload(tag: &str, len: usize) -> Bytes {
    Bytes::from(tag.bytes().cycle().take(len).collect::<Vec<u8>>())
}

/// Script every part with a `len`-byte body answered after `delay`.
pub fn script_parts(network: &ScriptedNetwork, parts: &[Arc<Part>], len: usize, delay: Duration) {
    for part in parts {
        network.reply_after(&part.url, delay, Reply::Body(payload(&part.index.to_string(), len)));
    }
}

pub fn details(parts: Vec<Arc<Part>>) -> LevelDetails {
    LevelDetails::with_parts(parts)
}

pub fn loader(network: &ScriptedNetwork, timeout: Duration) -> FragmentLoader {
    let config = FragmentLoaderConfig::new()
        .with_timeout(timeout)
        .with_min_chunk_size(16)
        .with_loader(network.factory());
    FragmentLoader::new(config).unwrap()
}

/// Progress callback recording everything it receives.
pub fn collector() -> (ProgressCallback, Arc<Mutex<Vec<LoadedData>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    (Box::new(move |data: LoadedData| sink.lock().push(data)), seen)
}
