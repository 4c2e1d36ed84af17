//! Capture thread: polls a [`DepthSensor`] and publishes converted frames
//! into a [`LatestFrameSlot`].

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::{debug, error, info};

use crate::sensor::DepthSensor;
use crate::slot::LatestFrameSlot;

/// Handle to a running capture thread.  Stops and joins the thread on drop.
#[derive(Debug)]
pub struct CaptureHandle {
    running: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl CaptureHandle {
    /// `false` once [`stop`](Self::stop) was called or the sensor faulted.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Signal the thread to exit and wait for it.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                error!("capture thread panicked");
            }
        }
    }
}

impl Drop for CaptureHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn a thread that captures from `sensor` every `period` until stopped.
///
/// Packets that fail conversion are dropped (the conversion already logs
/// why).  A sensor fault ends the thread.
pub fn spawn_capture<S>(mut sensor: S, slot: LatestFrameSlot, period: Duration) -> CaptureHandle
where
    S: DepthSensor + 'static,
{
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);

    let thread = thread::spawn(move || {
        info!(sensor = sensor.id(), ?period, "capture thread started");
        while flag.load(Ordering::SeqCst) {
            match sensor.capture() {
                Ok(Some(packet)) => {
                    if let Ok(frame) = packet.to_depth_frame() {
                        if slot.publish(frame) {
                            debug!(sensor = sensor.id(), "consumer behind, frame dropped");
                        }
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    error!(sensor = sensor.id(), %err, "sensor fault, stopping capture");
                    flag.store(false, Ordering::SeqCst);
                    break;
                }
            }
            thread::sleep(period);
        }
        info!(sensor = sensor.id(), "capture thread stopped");
    });

    CaptureHandle {
        running,
        thread: Some(thread),
    }
}
