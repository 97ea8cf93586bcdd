use std::{collections::BTreeMap, sync::Arc};

use bytes::Bytes;
use fragload_net::NetworkDetails;

use crate::fragment::{Fragment, Part};

/// Payload handed to the consumer: a whole-fragment chunk (`part` is `None`)
/// or one complete part.
#[derive(Clone, Debug)]
pub struct LoadedData {
    pub frag: Arc<Fragment>,
    pub part: Option<Arc<Part>>,
    pub payload: Bytes,
    pub network_details: NetworkDetails,
}

/// Successful end of a fragment load.
#[derive(Clone, Debug)]
pub enum FragmentLoaded {
    /// Loaded with a single request. The payload went out through the
    /// progress callback only.
    Whole { frag: Arc<Fragment> },
    /// Loaded part by part up to the fragment boundary, keyed by part index.
    Parts {
        frag: Arc<Fragment>,
        parts: BTreeMap<usize, LoadedData>,
    },
}

impl FragmentLoaded {
    #[must_use]
    pub fn frag(&self) -> &Arc<Fragment> {
        match self {
            Self::Whole { frag } | Self::Parts { frag, .. } => frag,
        }
    }
}

/// Consumer of payload chunks, invoked in byte order.
pub type ProgressCallback = Box<dyn FnMut(LoadedData) + Send>;
