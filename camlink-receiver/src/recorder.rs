//! Dataset recording.
//!
//! One recording is a timestamped directory under the dataset root:
//!
//! ```text
//! <output_dir>/<unix-seconds>/
//!     task_info.json
//!     cam_high/frame_000000.jpg
//!     cam_left_wrist/frame_000000.jpg
//! ```
//!
//! Frames are written exactly as they came off the wire, so every file is
//! the sender's JPEG byte for byte.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use camlink_core::{CameraIdentity, EncodedFrame};

/// Metadata stored alongside a recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_description: String,
    pub task_type: String,
    /// Unix seconds at which recording started.
    pub started_at: u64,
    /// Frame counts keyed by camera directory name.
    #[serde(default)]
    pub frames: BTreeMap<String, u64>,
}

/// Writes received frames into a recording directory.
pub struct Recorder {
    dir: PathBuf,
    info: TaskInfo,
    counters: HashMap<CameraIdentity, u64>,
}

impl Recorder {
    /// Create `<root>/<unix-seconds>/` and write the initial `task_info.json`.
    pub fn create(
        root: &Path,
        task_description: impl Into<String>,
        task_type: impl Into<String>,
    ) -> io::Result<Self> {
        let started_at = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);

        // Two recordings in the same second get a numeric suffix.
        let mut dir = root.join(started_at.to_string());
        let mut suffix = 1;
        while dir.exists() {
            dir = root.join(format!("{started_at}_{suffix}"));
            suffix += 1;
        }
        std::fs::create_dir_all(&dir)?;

        let recorder = Self {
            dir,
            info: TaskInfo {
                task_description: task_description.into(),
                task_type: task_type.into(),
                started_at,
                frames: BTreeMap::new(),
            },
            counters: HashMap::new(),
        };
        recorder.write_info()?;
        Ok(recorder)
    }

    /// The recording directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Frames written for `camera`.
    pub fn frame_count(&self, camera: CameraIdentity) -> u64 {
        self.counters.get(&camera).copied().unwrap_or(0)
    }

    /// Write one frame as the next numbered file of its camera and
    /// return the path.
    pub fn record(&mut self, camera: CameraIdentity, frame: &EncodedFrame) -> io::Result<PathBuf> {
        let cam_dir = self.dir.join(camera.dir_name());
        let index = self.frame_count(camera);
        if index == 0 {
            std::fs::create_dir_all(&cam_dir)?;
        }

        let path = cam_dir.join(format!("frame_{index:06}.jpg"));
        std::fs::write(&path, frame.as_bytes())?;
        self.counters.insert(camera, index + 1);
        Ok(path)
    }

    /// Rewrite `task_info.json` with the final frame counts.
    pub fn finish(mut self) -> io::Result<TaskInfo> {
        self.info.frames = self
            .counters
            .iter()
            .map(|(camera, count)| (camera.dir_name().to_string(), *count))
            .collect();
        self.write_info()?;
        Ok(self.info)
    }

    fn write_info(&self) -> io::Result<()> {
        let json = serde_json::to_string_pretty(&self.info).map_err(io::Error::other)?;
        std::fs::write(self.dir.join("task_info.json"), json)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn jpeg_stub(tag: u8) -> EncodedFrame {
        EncodedFrame::from(vec![0xFF, 0xD8, tag, 0xFF, 0xD9])
    }

    #[test]
    fn creates_dir_with_task_info() {
        let root = tempfile::tempdir().unwrap();
        let rec = Recorder::create(root.path(), "pick up the cube", "pick_place").unwrap();

        assert!(rec.dir().starts_with(root.path()));
        let text = std::fs::read_to_string(rec.dir().join("task_info.json")).unwrap();
        let info: TaskInfo = serde_json::from_str(&text).unwrap();
        assert_eq!(info.task_description, "pick up the cube");
        assert_eq!(info.task_type, "pick_place");
        assert!(info.frames.is_empty());
    }

    #[test]
    fn frames_are_numbered_per_camera() {
        let root = tempfile::tempdir().unwrap();
        let mut rec = Recorder::create(root.path(), "", "").unwrap();

        let a = rec.record(CameraIdentity::High, &jpeg_stub(1)).unwrap();
        let b = rec.record(CameraIdentity::High, &jpeg_stub(2)).unwrap();
        let c = rec.record(CameraIdentity::LeftWrist, &jpeg_stub(3)).unwrap();

        assert!(a.ends_with("cam_high/frame_000000.jpg"));
        assert!(b.ends_with("cam_high/frame_000001.jpg"));
        assert!(c.ends_with("cam_left_wrist/frame_000000.jpg"));
        assert_eq!(std::fs::read(&b).unwrap(), vec![0xFF, 0xD8, 2, 0xFF, 0xD9]);
        assert_eq!(rec.frame_count(CameraIdentity::High), 2);
    }

    #[test]
    fn finish_records_counts() {
        let root = tempfile::tempdir().unwrap();
        let mut rec = Recorder::create(root.path(), "wave", "gesture").unwrap();
        rec.record(CameraIdentity::LeftWrist, &jpeg_stub(0)).unwrap();
        let dir = rec.dir().to_path_buf();

        let info = rec.finish().unwrap();
        assert_eq!(info.frames.get("cam_left_wrist"), Some(&1));

        let text = std::fs::read_to_string(dir.join("task_info.json")).unwrap();
        let on_disk: TaskInfo = serde_json::from_str(&text).unwrap();
        assert_eq!(on_disk, info);
    }

    #[test]
    fn same_second_recordings_do_not_collide() {
        let root = tempfile::tempdir().unwrap();
        let first = Recorder::create(root.path(), "", "").unwrap();
        let second = Recorder::create(root.path(), "", "").unwrap();
        assert_ne!(first.dir(), second.dir());
    }
}
