#![forbid(unsafe_code)]

//! Transport capability used by the fragment loader: one network request per
//! transport instance, cooperative abort, progressive chunk delivery.

mod client;
mod error;
mod stats;
mod traits;
mod types;

pub use crate::{
    client::HttpTransport,
    error::{NetError, NetResult},
    stats::{LoadStats, LoadingTiming},
    traits::{LoadOutcome, OnProgress, Transport, TransportFactory},
    types::{
        ErrorResponse, Headers, LoadTarget, LoaderResponse, MIN_CHUNK_SIZE, NetOptions, NetworkDetails,
        RangeSpec, RequestContext, ResponseType, TransportConfig,
    },
};
