//! `depthblob-perception` – background-subtraction blob detection.
//!
//! Turns a stream of depth frames from a static sensor into 2-D regions and
//! camera-space 3-D boxes for anything that moves in front of the calibrated
//! scene.
//!
//! # Modules
//!
//! - [`calibration`] – [`CalibrationAccumulator`][calibration::CalibrationAccumulator]:
//!   collects calibration frames and computes the per-pixel median
//!   [`BackgroundModel`][calibration::BackgroundModel].
//! - [`foreground`] – one-sided "nearer than background" pixel classifier.
//! - [`despeckle`] – 3×3 majority filter applied twice to the mask.
//! - [`blobs`] – [`BlobExtractor`][blobs::BlobExtractor]: 8-connected
//!   flood-fill labelling into [`Blob2D`][depthblob_types::Blob2D]s.
//! - [`projection`] – median-windowed pinhole reconstruction into
//!   [`Blob3D`][depthblob_types::Blob3D]s.
//! - [`tracker`] – [`BlobTracker`][tracker::BlobTracker]: owns the model and
//!   scratch buffers and runs the stages in order.
//! - [`transform`] – camera → display remap and
//!   [`SensorPose`][transform::SensorPose] world placement.

pub mod blobs;
pub mod calibration;
pub mod despeckle;
pub mod foreground;
pub mod projection;
pub mod tracker;
pub mod transform;
