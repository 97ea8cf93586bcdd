#![forbid(unsafe_code)]

use std::{fmt, sync::Arc};

use fragload_net::{ErrorResponse, NetworkDetails};
use thiserror::Error;

use crate::fragment::{Fragment, Part};

/// Error category reported with every rejection.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorType {
    NetworkError,
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NetworkError => f.write_str("networkError"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorDetails {
    /// The transport reported a network or response failure, or there was
    /// nothing addressable to request.
    FragLoadError,
    /// The transport or the part-chain watchdog timed out.
    FragLoadTimeout,
    /// Explicit abort, or the part list ran out before the fragment ended.
    InternalAborted,
    /// The fragment or part is a playlist gap.
    FragGap,
}

impl fmt::Display for ErrorDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FragLoadError => "fragLoadError",
            Self::FragLoadTimeout => "fragLoadTimeOut",
            Self::InternalAborted => "aborted",
            Self::FragGap => "fragGap",
        })
    }
}

/// Uniform rejection of a fragment or part load.
///
/// Always non-fatal at this layer; the caller decides whether to retry.
#[derive(Clone, Debug, Error)]
#[error("{details}: {reason} (sn {})", .frag.sn)]
pub struct LoadError {
    pub kind: ErrorType,
    pub details: ErrorDetails,
    pub fatal: bool,
    pub frag: Arc<Fragment>,
    pub part: Option<Arc<Part>>,
    pub response: Option<ErrorResponse>,
    pub network_details: Option<NetworkDetails>,
    pub reason: String,
}

impl LoadError {
    pub(crate) fn new(details: ErrorDetails, frag: &Arc<Fragment>, reason: impl Into<String>) -> Self {
        Self {
            kind: ErrorType::NetworkError,
            details,
            fatal: false,
            frag: Arc::clone(frag),
            part: None,
            response: None,
            network_details: None,
            reason: reason.into(),
        }
    }

    pub(crate) fn with_part(mut self, part: Option<&Arc<Part>>) -> Self {
        self.part = part.cloned();
        self
    }

    pub(crate) fn with_network_details(mut self, details: NetworkDetails) -> Self {
        self.network_details = Some(details);
        self
    }

    pub(crate) fn with_response(mut self, response: ErrorResponse) -> Self {
        self.response = Some(response);
        self
    }

    pub(crate) fn gap(frag: &Arc<Fragment>, part: Option<&Arc<Part>>) -> Self {
        Self::new(ErrorDetails::FragGap, frag, "gap tag found").with_part(part)
    }

    pub(crate) fn request_failed(
        frag: &Arc<Fragment>,
        part: Option<&Arc<Part>>,
        response: ErrorResponse,
        details: NetworkDetails,
    ) -> Self {
        let reason = format!("HTTP Error {} {}", response.code, response.text);
        Self::new(ErrorDetails::FragLoadError, frag, reason)
            .with_part(part)
            .with_response(response)
            .with_network_details(details)
    }

    pub(crate) fn timed_out(
        frag: &Arc<Fragment>,
        part: Option<&Arc<Part>>,
        details: Option<NetworkDetails>,
    ) -> Self {
        let mut err = Self::new(ErrorDetails::FragLoadTimeout, frag, "Timeout after load budget")
            .with_part(part);
        err.network_details = details;
        err
    }

    pub(crate) fn aborted(
        frag: &Arc<Fragment>,
        part: Option<&Arc<Part>>,
        reason: impl Into<String>,
        details: Option<NetworkDetails>,
    ) -> Self {
        let mut err = Self::new(ErrorDetails::InternalAborted, frag, reason).with_part(part);
        err.network_details = details;
        err
    }

    #[must_use]
    pub fn is_aborted(&self) -> bool {
        self.details == ErrorDetails::InternalAborted
    }

    #[must_use]
    pub fn is_timeout(&self) -> bool {
        self.details == ErrorDetails::FragLoadTimeout
    }
}

pub type FragResult<T> = Result<T, LoadError>;
