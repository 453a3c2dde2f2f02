//! # Propmon Core
//!
//! Domain logic for the proposal monitor: a self-expiring in-memory index of
//! service proposals announced on the broker, the background jobs that keep
//! it clean and enriched, and the admission control guarding its read API.
//!
//! ## Architecture
//!
//! - [`store`]: the concurrent TTL-indexed proposal map shared by everything
//!   else through an `Arc`
//! - [`expiration`]: periodic sweep evicting records past their deadline
//! - [`quality`]: oracle client and the periodic quality merge
//! - [`rate_limit`]: fixed-window per-client request counter
//! - [`ingest`]: subject classification and payload decoding for bus messages
//! - [`metrics`]: the injected reporting sink and its aggregation helpers
//! - [`schedule`]: cancellable loop shared by the background jobs
//!
//! ## Example
//!
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use propmon_core::{
//!     ExpirationService, Ingestor, NoopMetrics, ProposalStore,
//!     ingest::MessageKind,
//! };
//!
//! # async fn run() {
//! let store = Arc::new(ProposalStore::new(Duration::from_secs(190)));
//! let metrics = Arc::new(NoopMetrics);
//!
//! let sweeper = ExpirationService::new(
//!     Arc::clone(&store),
//!     metrics.clone(),
//!     Duration::from_secs(20),
//! );
//! sweeper.start();
//!
//! let ingestor = Ingestor::new(Arc::clone(&store), metrics);
//! let payload = br#"{"proposal": {"provider_id": "0x1", "service_type": "wireguard"}}"#;
//! ingestor.apply(MessageKind::Register, payload).ok();
//!
//! sweeper.stop().await;
//! # }
//! ```

pub mod error;
pub mod expiration;
pub mod ingest;
pub mod metrics;
pub mod proposal;
pub mod quality;
pub mod rate_limit;
pub mod schedule;
pub mod store;

pub use error::{IngestError, OracleError};
pub use expiration::ExpirationService;
pub use ingest::{Applied, Ingestor, MessageKind};
pub use metrics::{MetricsSink, NoopMetrics};
pub use proposal::{
    AccessPolicy, Contact, ContactDefinition, Location, Proposal,
    ProposalFilter, Provider, Quality, Service, service_key,
};
pub use quality::{HttpQualityOracle, QualityOracle, QualityService};
pub use rate_limit::{Admission, FixedWindowLimiter};
pub use schedule::PeriodicTask;
pub use store::{ProposalStore, Upsert};
