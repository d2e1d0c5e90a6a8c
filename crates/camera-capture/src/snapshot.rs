//! Snapshot-command backend for V4L2 cameras
//!
//! Each capture runs an external program (ffmpeg by default) that writes a
//! single JPEG to stdout. The placeholder `{device}` in the argument list is
//! replaced with the device path, e.g. `/dev/video0`.

use crate::{CameraBackend, CameraDevice, CameraError, VideoFrame};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use tokio::process::Command;
use tokio::sync::Notify;
use tracing::debug;

const DEVICE_PLACEHOLDER: &str = "{device}";

/// Backend that shells out to a snapshot program per capture
#[derive(Debug, Clone)]
pub struct SnapshotBackend {
    program: String,
    args: Vec<String>,
    device_dir: PathBuf,
}

impl Default for SnapshotBackend {
    fn default() -> Self {
        Self::new(
            "ffmpeg",
            [
                "-loglevel", "error", "-f", "v4l2", "-i", DEVICE_PLACEHOLDER, "-frames:v", "1", "-f",
                "image2pipe", "-vcodec", "mjpeg", "-",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        )
    }
}

impl SnapshotBackend {
    pub fn new(program: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            device_dir: PathBuf::from("/dev"),
        }
    }

    /// Look for `videoN` nodes somewhere other than `/dev`
    pub fn with_device_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.device_dir = dir.into();
        self
    }

    fn device_path(&self, index: u32) -> PathBuf {
        self.device_dir.join(format!("video{}", index))
    }
}

impl CameraBackend for SnapshotBackend {
    fn probe(&self) -> Vec<u32> {
        let Ok(entries) = std::fs::read_dir(&self.device_dir) else {
            return Vec::new();
        };

        let mut indices: Vec<u32> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| parse_video_index(&entry.file_name().to_string_lossy()))
            .collect();
        indices.sort_unstable();
        indices
    }

    fn open(&self, index: u32) -> Result<Box<dyn CameraDevice>, CameraError> {
        let device = self.device_path(index);
        if !device.exists() {
            return Err(CameraError::Open(format!("{} does not exist", device.display())));
        }

        Ok(Box::new(SnapshotCamera {
            index,
            program: self.program.clone(),
            args: expand_args(&self.args, &device),
            sequence: AtomicU32::new(0),
            closed: AtomicBool::new(false),
            cancel: Notify::new(),
        }))
    }
}

struct SnapshotCamera {
    index: u32,
    program: String,
    args: Vec<String>,
    sequence: AtomicU32,
    closed: AtomicBool,
    cancel: Notify,
}

#[async_trait]
impl CameraDevice for SnapshotCamera {
    fn index(&self) -> u32 {
        self.index
    }

    async fn capture(&self) -> Result<VideoFrame, CameraError> {
        let cancelled = self.cancel.notified();
        tokio::pin!(cancelled);
        cancelled.as_mut().enable();
        if self.closed.load(Ordering::SeqCst) {
            return Err(CameraError::Capture("camera closed".into()));
        }

        debug!("Camera {}: running {} {:?}", self.index, self.program, self.args);
        // The child dies with this future, whether it times out or is closed
        let child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| CameraError::Capture(format!("{}: {}", self.program, e)))?;

        let output = tokio::select! {
            output = child.wait_with_output() => {
                output.map_err(|e| CameraError::Capture(format!("{}: {}", self.program, e)))?
            }
            _ = &mut cancelled => return Err(CameraError::Capture("camera closed".into())),
        };

        if !output.status.success() {
            return Err(CameraError::Capture(format!(
                "{} exited with {}: {}",
                self.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        VideoFrame::jpeg(output.stdout, sequence)
    }

    fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            debug!("Camera {} closed", self.index);
            self.cancel.notify_waiters();
        }
    }
}

fn parse_video_index(name: &str) -> Option<u32> {
    name.strip_prefix("video")?.parse().ok()
}

fn expand_args(args: &[String], device: &Path) -> Vec<String> {
    let device = device.to_string_lossy();
    args.iter().map(|arg| arg.replace(DEVICE_PLACEHOLDER, &device)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_video_index() {
        assert_eq!(parse_video_index("video0"), Some(0));
        assert_eq!(parse_video_index("video12"), Some(12));
        assert_eq!(parse_video_index("video"), None);
        assert_eq!(parse_video_index("vbi0"), None);
    }

    #[test]
    fn test_expand_args_substitutes_device() {
        let args = vec!["-i".to_string(), "{device}".to_string()];
        let expanded = expand_args(&args, Path::new("/dev/video2"));
        assert_eq!(expanded, vec!["-i", "/dev/video2"]);
    }

    #[test]
    fn test_open_missing_device_fails() {
        let backend = SnapshotBackend::default().with_device_dir("/nonexistent-camera-dir");
        assert!(backend.probe().is_empty());
        assert!(matches!(backend.open(0), Err(CameraError::Open(_))));
    }

    fn scratch_device_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("kiosk-snapshot-{}-{}", name, std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("video0"), b"").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_close_kills_running_snapshot() {
        let dir = scratch_device_dir("close");
        let backend = SnapshotBackend::new("sleep", vec!["30".into()]).with_device_dir(&dir);
        assert_eq!(backend.probe(), vec![0]);
        let camera: std::sync::Arc<dyn CameraDevice> = std::sync::Arc::from(backend.open(0).unwrap());

        let capture = {
            let camera = std::sync::Arc::clone(&camera);
            tokio::spawn(async move { camera.capture().await })
        };
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
        camera.close();

        let result = tokio::time::timeout(std::time::Duration::from_secs(5), capture)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(CameraError::Capture(_))));
        assert!(camera.capture().await.is_err());
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[tokio::test]
    async fn test_snapshot_output_passes_through_as_jpeg() {
        let dir = scratch_device_dir("jpeg");
        let jpeg_path = dir.join("frame.jpg");
        let frame = VideoFrame::rgb(vec![200; 8 * 4 * 3], 8, 4, 0).unwrap();
        std::fs::write(&jpeg_path, frame.to_jpeg(90).unwrap()).unwrap();

        let backend = SnapshotBackend::new("cat", vec![jpeg_path.to_string_lossy().into_owned()]).with_device_dir(&dir);
        let camera = backend.open(0).unwrap();
        let captured = camera.capture().await.unwrap();
        assert_eq!(captured.format, crate::PixelFormat::Mjpeg);
        assert_eq!((captured.width, captured.height), (8, 4));
        assert_eq!(captured.sequence, 1);
        std::fs::remove_dir_all(&dir).unwrap();
    }
}
