//! Event output: coloured text for terminals, JSON lines for pipes.

use colored::Colorize;
use serde_json::{json, Value};

use depthblob_perception::blobs::color_for_id;
use depthblob_runtime::aim::{aim_all, AimPoint};
use depthblob_runtime::pipeline::{Detection, PipelineEvent, PipelineStats};
use depthblob_types::{DepthError, Vec3};

/// Progress lines while calibrating are printed every this many frames.
const CALIBRATION_PROGRESS_EVERY: usize = 10;

pub struct Reporter {
    json: bool,
    aim_points: Vec<AimPoint>,
    last_blob_count: Option<usize>,
}

impl Reporter {
    pub fn new(json: bool, aim_points: Vec<AimPoint>) -> Self {
        Self {
            json,
            aim_points,
            last_blob_count: None,
        }
    }

    pub fn event(&mut self, event: &PipelineEvent) {
        if self.json {
            println!("{}", self.event_json(event));
            return;
        }

        match event {
            PipelineEvent::Calibrating { remaining } => {
                if remaining % CALIBRATION_PROGRESS_EVERY == 0 {
                    println!("  {} {} frame(s) to go", "calibrating".yellow(), remaining);
                }
            }
            PipelineEvent::Calibrated {
                width,
                height,
                valid_pixels,
            } => {
                let total = *width as usize * *height as usize;
                println!(
                    "  {} {}x{} background, {}/{} pixels valid",
                    "calibrated".green().bold(),
                    width,
                    height,
                    valid_pixels,
                    total
                );
            }
            PipelineEvent::Detection(d) => self.print_detection(d),
        }
    }

    pub fn rejected(&self, err: &DepthError) {
        if self.json {
            println!("{}", json!({ "event": "rejected", "error": err.to_string() }));
        } else {
            println!("  {} {}", "frame rejected:".yellow(), err);
        }
    }

    pub fn summary(&self, stats: &PipelineStats, dropped: u64) {
        if self.json {
            println!(
                "{}",
                json!({ "event": "summary", "stats": stats, "dropped_frames": dropped })
            );
            return;
        }
        println!();
        println!(
            "  {} {} frame(s): {} detection(s), {} calibration(s), {} rejected, {} dropped",
            "processed".bold(),
            stats.frames,
            stats.detections,
            stats.calibrations,
            stats.rejected,
            dropped
        );
    }

    fn print_detection(&mut self, d: &Detection) {
        let count = d.result.blobs_2d.len();
        if count == 0 && self.last_blob_count == Some(0) {
            return;
        }
        self.last_blob_count = Some(count);

        if count == 0 {
            println!("  {} no blobs", format_ts(d.timestamp_us).dimmed());
            return;
        }

        println!(
            "  {} {} blob(s)",
            format_ts(d.timestamp_us).dimmed(),
            count.to_string().bold()
        );
        for b in &d.result.blobs_2d {
            let (cx, cy) = b.centroid();
            let [r, g, bl] = color_for_id(b.id);
            let swatch = "■".truecolor(r, g, bl);
            match d.world_blobs.iter().find(|w| w.id == b.id) {
                Some(w) => println!(
                    "    {} #{} {} px @ ({:.0}, {:.0}) → world {} ± {}",
                    swatch,
                    b.id,
                    b.pixel_count,
                    cx,
                    cy,
                    fmt_vec(w.position_cm),
                    fmt_vec(w.half_extents_cm)
                ),
                None => println!(
                    "    {} #{} {} px @ ({:.0}, {:.0}) {}",
                    swatch,
                    b.id,
                    b.pixel_count,
                    cx,
                    cy,
                    "(no depth)".dimmed()
                ),
            }
        }
        for (point, aim) in aim_all(&self.aim_points, &d.world_blobs) {
            if let Some(aim) = aim {
                println!(
                    "    {} {} → yaw {:.1}° ({:.0} cm)",
                    "aim".cyan(),
                    point.id,
                    aim.yaw_deg,
                    aim.distance_cm
                );
            }
        }
    }

    fn event_json(&self, event: &PipelineEvent) -> Value {
        match event {
            PipelineEvent::Calibrating { remaining } => {
                json!({ "event": "calibrating", "remaining": remaining })
            }
            PipelineEvent::Calibrated {
                width,
                height,
                valid_pixels,
            } => json!({
                "event": "calibrated",
                "width": width,
                "height": height,
                "valid_pixels": valid_pixels,
            }),
            PipelineEvent::Detection(d) => self.detection_json(d),
        }
    }

    fn detection_json(&self, d: &Detection) -> Value {
        let blobs: Vec<Value> = d
            .result
            .blobs_2d
            .iter()
            .map(|b| {
                let world = d.world_blobs.iter().find(|w| w.id == b.id);
                json!({
                    "id": b.id,
                    "pixel_count": b.pixel_count,
                    "bbox": [b.min_x, b.min_y, b.max_x, b.max_y],
                    "centroid": b.centroid(),
                    "color": color_for_id(b.id),
                    "world": world,
                })
            })
            .collect();
        let aims: Vec<Value> = aim_all(&self.aim_points, &d.world_blobs)
            .into_iter()
            .map(|(point, aim)| json!({ "id": point.id, "aim": aim }))
            .collect();

        json!({
            "event": "detection",
            "timestamp_us": d.timestamp_us,
            "foreground_pixels": d.result.foreground_count(),
            "blobs": blobs,
            "aims": aims,
        })
    }
}

fn format_ts(us: u64) -> String {
    format!("[{:>8.3}s]", us as f64 / 1e6)
}

fn fmt_vec(v: Vec3) -> String {
    format!("({:.0}, {:.0}, {:.0}) cm", v.x, v.y, v.z)
}
