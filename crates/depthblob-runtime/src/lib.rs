//! `depthblob-runtime` – consumer-side orchestration of the detector.
//!
//! # Modules
//!
//! - [`pipeline`] – [`FramePipeline`][pipeline::FramePipeline]: feeds frames
//!   to a [`BlobTracker`][depthblob_perception::tracker::BlobTracker],
//!   calibrating automatically on the first frames and placing detections
//!   in world space afterwards.
//! - [`aim`] – [`AimPoint`][aim::AimPoint]: fixed world points that face the
//!   nearest detected blob.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to export detection spans.

pub mod aim;
pub mod pipeline;
pub mod telemetry;

pub use aim::{Aim, AimPoint};
pub use pipeline::{Detection, FramePipeline, PipelineConfig, PipelineEvent, PipelineStats};
pub use telemetry::{init_tracing, TracerProviderGuard};
