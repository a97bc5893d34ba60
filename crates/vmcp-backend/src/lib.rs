//! The `BackendClient` contract a session dispatches through, plus
//! aggregation strategies that turn many backends' capability lists into
//! one exposed namespace and routing table.

#![forbid(unsafe_code)]

pub mod aggregate;
pub mod client;

#[cfg(any(test, feature = "test-support"))]
pub mod mock;

pub use aggregate::{
    Aggregator, AggregatedCapabilities, BackendCapabilities, PrefixAggregator, RawPrompt,
    RawResource, RawTool,
};
pub use client::{BackendClient, BackendClientFactory, BackendError};
