//! `depthblob-hal` – depth sensor abstraction and frame hand-off.
//!
//! # Modules
//!
//! - [`sensor`] – the [`DepthSensor`][sensor::DepthSensor] driver trait.
//! - [`packet`] – raw [`FramePacket`][packet::FramePacket]s and their `Y16`
//!   → millimetre conversion.
//! - [`slot`] – [`LatestFrameSlot`][slot::LatestFrameSlot], the overwrite-on-
//!   arrival hand-off between capture and detection.
//! - [`capture`] – [`spawn_capture`][capture::spawn_capture]: a polling
//!   capture thread feeding a slot.
//! - [`sim`] – [`SimDepthSensor`][sim::SimDepthSensor] for running without
//!   hardware.

pub mod capture;
pub mod packet;
pub mod sensor;
pub mod sim;
pub mod slot;
