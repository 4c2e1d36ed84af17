//! Generic `DepthSensor` trait for depth-capture hardware.

use depthblob_types::DepthError;

use crate::packet::FramePacket;

/// A depth camera or other range-imaging device.
///
/// Drivers are polled from a capture thread, see
/// [`spawn_capture`][crate::capture::spawn_capture].
pub trait DepthSensor: Send {
    /// Stable identifier for this sensor, e.g. `"overhead"`.
    fn id(&self) -> &str;

    /// Capture the next frame, or `Ok(None)` when none is ready yet.
    ///
    /// # Errors
    ///
    /// Returns [`DepthError::SensorFault`] if the device cannot deliver
    /// frames (disconnected, stream stopped).
    fn capture(&mut self) -> Result<Option<FramePacket>, DepthError>;
}

impl<S: DepthSensor + ?Sized> DepthSensor for Box<S> {
    fn id(&self) -> &str {
        (**self).id()
    }

    fn capture(&mut self) -> Result<Option<FramePacket>, DepthError> {
        (**self).capture()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct MockSensor {
        id: String,
        remaining: u32,
    }

    impl DepthSensor for MockSensor {
        fn id(&self) -> &str {
            &self.id
        }

        fn capture(&mut self) -> Result<Option<FramePacket>, DepthError> {
            if self.remaining == 0 {
                return Err(DepthError::SensorFault {
                    sensor: self.id.clone(),
                    details: "stream stopped".to_string(),
                });
            }
            self.remaining -= 1;
            Ok(Some(FramePacket::from_depth_mm(2, 2, 0, &[1000; 4])))
        }
    }

    #[test]
    fn mock_sensor_capture() {
        let mut sensor: Box<dyn DepthSensor> = Box::new(MockSensor {
            id: "overhead".to_string(),
            remaining: 1,
        });
        assert_eq!(sensor.id(), "overhead");
        let packet = sensor.capture().unwrap().unwrap();
        assert_eq!(packet.data.len(), 8);
        assert!(matches!(
            sensor.capture(),
            Err(DepthError::SensorFault { .. })
        ));
    }
}
