//! Designlink Core Library
//!
//! Client and orchestration layer for a remote design-extraction service
//! reached over an SSE-based JSON-RPC transport. Nothing here depends on a
//! particular front end; the CLI is one caller among many.
//!
//! # Modules
//!
//! - [`transport`] - SSE session negotiation, dispatch and response correlation
//! - [`retry`] - Exponential backoff around transport calls
//! - [`cache`] - TTL result cache and the caching transport decorator
//! - [`extractor`] - Progressive fallback extraction pipeline
//! - [`fallback`] - Fallback levels, their stages and timeouts
//! - [`progress`] - Stage tracking and performance metrics
//! - [`events`] - Progress sink trait and its implementations
//! - [`protocol`] - JSON-RPC envelopes and typed tool payloads
//! - [`sse`] - Incremental Server-Sent Events decoder
//! - [`figma_url`] - Design link parsing and the complex-node heuristic
//! - [`inference`] - Component names scraped from generated code
//! - [`model`] - Extraction input, options and report types
//! - [`config`] - Client configuration and defaults
//! - [`error`] - Error types

pub mod cache;
pub mod config;
pub mod error;
pub mod events;
pub mod extractor;
pub mod fallback;
pub mod figma_url;
pub mod inference;
pub mod model;
pub mod progress;
pub mod protocol;
pub mod retry;
pub mod sse;
pub mod transport;

// Re-export commonly used types
pub use cache::{Cache, CacheStats, CachedTransport, MemoryCache};
pub use config::{ClientConfig, RetryPolicy};
pub use error::{DomainError, ExtractError, Result, TransportError};
pub use events::{ChannelProgressSink, ConsoleProgressSink, NoOpProgressSink, ProgressSink};
pub use extractor::ProgressiveExtractor;
pub use fallback::FallbackLevel;
pub use figma_url::DesignUrl;
pub use model::{
    Component, ComponentSource, ExtractOptions, ExtractionInput, ExtractionMetadata,
    ExtractionMethod, ExtractionReport, ExtractionResult, TimeoutStrategy,
};
pub use progress::{PerformanceMetrics, ProgressEvent, ProgressTracker, Stage};
pub use transport::{RpcReply, RpcTransport, SseRpcClient};
