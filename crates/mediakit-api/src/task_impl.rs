//! Production conversion task: still image to zoom-in video via ffmpeg.
//!
//! Kept deliberately thin; workers only see the `ConversionTask` trait, so
//! the whole pipeline (download, encode, collect bytes) lives behind it.

use async_trait::async_trait;
use mediakit_core::{ConversionTask, TaskError, TaskOutput};
use std::time::Duration;
use uuid::Uuid;

const SOURCE_FETCH_TIMEOUT_SECS: u64 = 60;
const OUTPUT_RESOLUTION: &str = "1920x1080";
const MAX_ZOOM: f64 = 1.5;

pub struct ImageToVideoTask {
    client: reqwest::Client,
    ffmpeg_path: String,
}

impl ImageToVideoTask {
    pub fn new(ffmpeg_path: String) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(SOURCE_FETCH_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client, ffmpeg_path })
    }

    async fn fetch_source(&self, image_url: &str) -> Result<Vec<u8>, TaskError> {
        let response = self
            .client
            .get(image_url)
            .send()
            .await
            .map_err(|e| TaskError::new(format!("Failed to fetch source image: {}", e)))?;

        if !response.status().is_success() {
            return Err(TaskError::new(format!(
                "Source image fetch returned {}",
                response.status()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| TaskError::new(format!("Failed to read source image body: {}", e)))?;

        if bytes.is_empty() {
            return Err(TaskError::new("Source image is empty"));
        }

        Ok(bytes.to_vec())
    }
}

fn zoompan_filter(length: f64, frame_rate: u32, zoom_speed: f64) -> String {
    let total_frames = (length * frame_rate as f64).round().max(1.0);
    // zoom_speed is a 0..=100 percentage of the zoom range covered over the clip
    let zoom_range = (MAX_ZOOM - 1.0) * (zoom_speed / 100.0);
    let per_frame = zoom_range / total_frames;
    format!(
        "scale=7680:4320,zoompan=z='min(zoom+{:.6},{:.2})':d={}:x='iw/2-(iw/zoom/2)':y='ih/2-(ih/zoom/2)':s={}:fps={}",
        per_frame, MAX_ZOOM, total_frames as u64, OUTPUT_RESOLUTION, frame_rate
    )
}

#[async_trait]
impl ConversionTask for ImageToVideoTask {
    async fn run(
        &self,
        job_id: Uuid,
        payload: &serde_json::Value,
    ) -> Result<TaskOutput, TaskError> {
        let image_url = payload
            .get("image_url")
            .and_then(|v| v.as_str())
            .ok_or_else(|| TaskError::new("Payload is missing image_url"))?;
        let length = payload.get("length").and_then(|v| v.as_f64()).unwrap_or(5.0);
        let frame_rate = payload
            .get("frame_rate")
            .and_then(|v| v.as_u64())
            .unwrap_or(30) as u32;
        let zoom_speed = payload
            .get("zoom_speed")
            .and_then(|v| v.as_f64())
            .unwrap_or(3.0);

        tracing::info!(job_id = %job_id, image_url = %image_url, "Starting image-to-video conversion");

        let image_bytes = self.fetch_source(image_url).await?;

        let workdir = tempfile::tempdir()
            .map_err(|e| TaskError::new(format!("Failed to create working directory: {}", e)))?;
        let input_path = workdir.path().join("source.img");
        let output_path = workdir.path().join(format!("{}.mp4", job_id));

        tokio::fs::write(&input_path, &image_bytes)
            .await
            .map_err(|e| TaskError::new(format!("Failed to write source image: {}", e)))?;

        let output = tokio::process::Command::new(&self.ffmpeg_path)
            .arg("-y")
            .arg("-loop")
            .arg("1")
            .arg("-framerate")
            .arg(frame_rate.to_string())
            .arg("-i")
            .arg(&input_path)
            .arg("-vf")
            .arg(zoompan_filter(length, frame_rate, zoom_speed))
            .arg("-t")
            .arg(format!("{}", length))
            .arg("-c:v")
            .arg("libx264")
            .arg("-pix_fmt")
            .arg("yuv420p")
            .arg(&output_path)
            .output()
            .await
            .map_err(|e| TaskError::new(format!("Failed to run ffmpeg: {}", e)))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let tail: String = stderr
                .lines()
                .rev()
                .take(5)
                .collect::<Vec<_>>()
                .into_iter()
                .rev()
                .collect::<Vec<_>>()
                .join("\n");
            return Err(TaskError::new(format!(
                "ffmpeg exited with {}: {}",
                output.status, tail
            )));
        }

        let bytes = tokio::fs::read(&output_path)
            .await
            .map_err(|e| TaskError::new(format!("Failed to read ffmpeg output: {}", e)))?;

        tracing::info!(
            job_id = %job_id,
            output_bytes = bytes.len(),
            "Image-to-video conversion finished"
        );

        Ok(TaskOutput {
            base_name: format!("{}.mp4", job_id),
            bytes,
            message: "Video conversion completed successfully".to_string(),
        })
    }
}
