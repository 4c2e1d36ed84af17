//! Raw frame packets as delivered by a depth sensor driver.

use depthblob_types::{CameraIntrinsics, DepthError, DepthFrame};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Pixel layout of a [`FramePacket`] payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameFormat {
    Yuyv,
    Mjpg,
    /// 16-bit little-endian depth in millimetres.
    Y16,
    Rgb,
    Bgr,
    Bgra,
    Rgba,
    #[default]
    Unknown,
}

impl std::fmt::Display for FrameFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Yuyv => "yuyv",
            Self::Mjpg => "mjpg",
            Self::Y16 => "y16",
            Self::Rgb => "rgb",
            Self::Bgr => "bgr",
            Self::Bgra => "bgra",
            Self::Rgba => "rgba",
            Self::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

/// One frame as captured, before conversion.
#[derive(Debug, Clone, PartialEq)]
pub struct FramePacket {
    pub width: u32,
    pub height: u32,
    pub timestamp_us: u64,
    pub format: FrameFormat,
    pub data: Vec<u8>,
    pub intrinsics: Option<CameraIntrinsics>,
}

impl FramePacket {
    /// Encode millimetre samples as a `Y16` packet.
    pub fn from_depth_mm(width: u32, height: u32, timestamp_us: u64, depth_mm: &[u16]) -> Self {
        let data = depth_mm.iter().flat_map(|d| d.to_le_bytes()).collect();
        Self {
            width,
            height,
            timestamp_us,
            format: FrameFormat::Y16,
            data,
            intrinsics: None,
        }
    }

    pub fn with_intrinsics(mut self, intrinsics: CameraIntrinsics) -> Self {
        self.intrinsics = Some(intrinsics);
        self
    }

    /// Convert to a [`DepthFrame`].
    ///
    /// # Errors
    ///
    /// - [`DepthError::UnsupportedFormat`] for anything but `Y16`.
    /// - [`DepthError::PacketSize`] when the payload is not exactly
    ///   `width × height × 2` bytes.
    pub fn to_depth_frame(&self) -> Result<DepthFrame, DepthError> {
        if self.format != FrameFormat::Y16 {
            warn!(format = %self.format, "unsupported frame format");
            return Err(DepthError::UnsupportedFormat(self.format.to_string()));
        }

        let pixels = self.width as usize * self.height as usize;
        let expected = pixels * 2;
        if self.data.len() != expected {
            warn!(expected, actual = self.data.len(), "frame data size mismatch");
            return Err(DepthError::PacketSize {
                expected,
                actual: self.data.len(),
            });
        }

        let depth_mm = self
            .data
            .chunks_exact(2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]))
            .collect();

        Ok(DepthFrame {
            width: self.width,
            height: self.height,
            timestamp_us: self.timestamp_us,
            depth_mm,
            intrinsics: self.intrinsics,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn y16_decodes_little_endian_millimetres() {
        let packet = FramePacket {
            width: 2,
            height: 1,
            timestamp_us: 42,
            format: FrameFormat::Y16,
            data: vec![0xE8, 0x03, 0x20, 0x03],
            intrinsics: None,
        };
        let frame = packet.to_depth_frame().unwrap();
        assert_eq!(frame.depth_mm, vec![1000, 800]);
        assert_eq!(frame.timestamp_us, 42);
        assert_eq!((frame.width, frame.height), (2, 1));
    }

    #[test]
    fn intrinsics_are_carried_over() {
        let k = CameraIntrinsics::new(500.0, 500.0, 1.0, 1.0);
        let frame = FramePacket::from_depth_mm(2, 2, 0, &[1, 2, 3, 4])
            .with_intrinsics(k)
            .to_depth_frame()
            .unwrap();
        assert_eq!(frame.intrinsics, Some(k));
        assert_eq!(frame.depth_mm, vec![1, 2, 3, 4]);
    }

    #[test]
    fn non_depth_format_is_rejected() {
        let mut packet = FramePacket::from_depth_mm(1, 1, 0, &[1]);
        packet.format = FrameFormat::Rgb;
        assert_eq!(
            packet.to_depth_frame(),
            Err(DepthError::UnsupportedFormat("rgb".to_string()))
        );
    }

    #[test]
    fn short_payload_is_rejected() {
        let mut packet = FramePacket::from_depth_mm(2, 2, 0, &[1, 2, 3, 4]);
        packet.data.truncate(7);
        assert_eq!(
            packet.to_depth_frame(),
            Err(DepthError::PacketSize {
                expected: 8,
                actual: 7
            })
        );
    }
}
