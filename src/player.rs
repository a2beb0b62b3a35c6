// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

//! 播放控制器 (playback controller)
//!
//! Owns the source, the playback flags and the active model. Three effective
//! states: no source, open and playing, open and paused. Every user control
//! maps to one method; the GUI timer calls [`Player::tick`].

use std::path::{Path, PathBuf};

use crate::model::annotate::{Annotator, OverlayFlags};
use crate::model::yolo::Yolo;
use crate::model::{artifact_path, ModelKind, ModelSize, Thresholds};
use crate::render::{process, Surface};
use crate::source::{CameraSource, FileSource, FrameSource};

pub struct Player {
    source: Option<Box<dyn FrameSource>>,
    running: bool,
    position: u64,

    model: Option<Yolo>,
    annotator: Option<Annotator>,
    kind: ModelKind,
    size: ModelSize,
    pub detecting: bool,
    pub show_box: bool,
    pub show_mask: bool,

    model_dir: PathBuf,
    thresholds: Thresholds,
}

impl Player {
    pub fn new(model_dir: PathBuf, thresholds: Thresholds) -> Self {
        Self {
            source: None,
            running: false,
            position: 0,
            model: None,
            annotator: None,
            kind: ModelKind::Detect,
            size: ModelSize::N,
            detecting: false,
            show_box: true,
            show_mask: true,
            model_dir,
            thresholds,
        }
    }

    fn attach(&mut self, source: Box<dyn FrameSource>) {
        self.source = Some(source);
        self.running = true;
        self.position = 0;
    }

    /// Switch to the live camera. Never fails; a dead device shows up as an
    /// immediately finished stream on the next tick.
    pub fn open_camera(&mut self, index: i32) {
        log::info!("opening camera {index}");
        self.attach(Box::new(CameraSource::open(index)));
    }

    /// Switch to a video file. On failure the current source is kept.
    pub fn open_video(&mut self, path: &Path) {
        match FileSource::open(path) {
            Ok(source) => {
                log::info!("opened video {}", path.display());
                self.attach(Box::new(source));
            }
            Err(e) => log::error!("{e:#}"),
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
    }

    pub fn play(&mut self) {
        if self.source.is_some() {
            self.running = true;
        }
    }

    /// Restart a file from its first frame. No-op for cameras and when
    /// nothing is open.
    pub fn replay(&mut self) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        if source.is_camera() {
            return;
        }
        source.seek(0);
        self.position = 0;
        self.running = true;
    }

    /// Pause and show exactly the frame at `pos`. No-op for cameras.
    pub fn seek(&mut self, pos: u64, surface: &mut dyn Surface) {
        let Some(source) = self.source.as_mut() else {
            return;
        };
        if source.is_camera() {
            return;
        }
        self.running = false;
        source.seek(pos);
        self.render_next(surface);
    }

    /// Advance one frame if playing. A failed read ends playback without
    /// closing the source, so Replay and Seek still work afterwards.
    pub fn tick(&mut self, surface: &mut dyn Surface) {
        if self.source.is_none() || !self.running {
            return;
        }
        if !self.render_next(surface) {
            log::info!("playback finished");
            self.running = false;
        }
    }

    /// Read one frame, run it through the pipeline and present it. Returns
    /// false when the source has no more frames.
    fn render_next(&mut self, surface: &mut dyn Surface) -> bool {
        let Some(source) = self.source.as_mut() else {
            return false;
        };
        let Some(frame) = source.read() else {
            return false;
        };
        self.position = source.position();

        let detector = if self.detecting {
            self.model.as_mut().zip(self.annotator.as_ref())
        } else {
            None
        };
        let flags = OverlayFlags {
            show_box: self.show_box,
            show_mask: self.show_mask,
        };
        match process(&frame, detector, flags) {
            Ok(img) => surface.present(&img),
            Err(e) => log::error!("frame pipeline failed: {e:#}"),
        }
        true
    }

    pub fn toggle_detection(&mut self) {
        self.detecting = !self.detecting;
        log::info!(
            "detection {}",
            if self.detecting { "enabled" } else { "disabled" }
        );
    }

    /// Load the artifact for `(kind, size)` from the model dir. A missing or
    /// broken artifact logs one error and keeps the current model.
    pub fn change_model(&mut self, kind: ModelKind, size: ModelSize) {
        let path = artifact_path(&self.model_dir, kind, size);
        if !path.is_file() {
            log::error!("model file not found: {}", path.display());
            return;
        }
        match Yolo::load(&path, kind, self.thresholds) {
            Ok(model) => {
                self.annotator = Some(Annotator::new(model.names().to_vec()));
                self.model = Some(model);
                self.kind = kind;
                self.size = size;
            }
            Err(e) => log::error!("{e:#}"),
        }
    }

    pub fn is_open(&self) -> bool {
        self.source.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn is_camera(&self) -> bool {
        self.source.as_ref().is_some_and(|s| s.is_camera())
    }

    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn total_frames(&self) -> u64 {
        self.source.as_ref().map_or(0, |s| s.total_frames())
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn size(&self) -> ModelSize {
        self.size
    }

    pub fn has_model(&self) -> bool {
        self.model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use image::RgbImage;

    /// Finite scripted source standing in for a video file (or, with
    /// `camera: true`, a live device).
    struct FakeSource {
        total: u64,
        next: u64,
        camera: bool,
    }

    impl FakeSource {
        fn video(total: u64) -> Self {
            Self {
                total,
                next: 0,
                camera: false,
            }
        }

        fn camera() -> Self {
            Self {
                total: u64::MAX,
                next: 0,
                camera: true,
            }
        }
    }

    impl FrameSource for FakeSource {
        fn read(&mut self) -> Option<Frame> {
            if self.next >= self.total {
                return None;
            }
            self.next += 1;
            Some(Frame::new(vec![0u8; 8 * 8 * 3], 8, 8))
        }

        fn seek(&mut self, pos: u64) {
            if !self.camera {
                self.next = pos.min(self.total);
            }
        }

        fn total_frames(&self) -> u64 {
            if self.camera {
                0
            } else {
                self.total
            }
        }

        fn position(&mut self) -> u64 {
            if self.camera {
                0
            } else {
                self.next
            }
        }

        fn is_camera(&self) -> bool {
            self.camera
        }
    }

    struct CountingSurface {
        presents: usize,
    }

    impl CountingSurface {
        fn new() -> Self {
            Self { presents: 0 }
        }
    }

    impl Surface for CountingSurface {
        fn present(&mut self, _img: &RgbImage) {
            self.presents += 1;
        }
    }

    fn player() -> Player {
        Player::new(PathBuf::from("/nonexistent-models"), Thresholds::default())
    }

    #[test]
    fn exhausting_a_file_stops_playback_without_closing() {
        let mut p = player();
        p.attach(Box::new(FakeSource::video(10)));
        let mut surface = CountingSurface::new();

        for _ in 0..10 {
            p.tick(&mut surface);
        }
        assert_eq!(surface.presents, 10);
        assert!(p.is_running());
        assert_eq!(p.position(), 10);

        p.tick(&mut surface);
        assert_eq!(surface.presents, 10);
        assert!(!p.is_running());
        assert!(p.is_open());
    }

    #[test]
    fn pause_stops_ticks_and_play_resumes() {
        let mut p = player();
        p.attach(Box::new(FakeSource::video(10)));
        let mut surface = CountingSurface::new();

        p.pause();
        p.tick(&mut surface);
        assert_eq!(surface.presents, 0);

        p.play();
        p.tick(&mut surface);
        assert_eq!(surface.presents, 1);
    }

    #[test]
    fn play_without_source_stays_stopped() {
        let mut p = player();
        p.play();
        assert!(!p.is_running());
        let mut surface = CountingSurface::new();
        p.tick(&mut surface);
        assert_eq!(surface.presents, 0);
    }

    #[test]
    fn seek_pauses_and_presents_exactly_one_frame() {
        let mut p = player();
        p.attach(Box::new(FakeSource::video(10)));
        let mut surface = CountingSurface::new();

        p.seek(3, &mut surface);
        assert!(!p.is_running());
        assert_eq!(surface.presents, 1);
        // the frame at index 3 was consumed
        assert_eq!(p.position(), 4);
    }

    #[test]
    fn replay_rewinds_and_resumes() {
        let mut p = player();
        p.attach(Box::new(FakeSource::video(3)));
        let mut surface = CountingSurface::new();

        for _ in 0..4 {
            p.tick(&mut surface);
        }
        assert!(!p.is_running());

        p.replay();
        assert!(p.is_running());
        assert_eq!(p.position(), 0);
        p.tick(&mut surface);
        assert_eq!(surface.presents, 4);
        assert_eq!(p.position(), 1);
    }

    #[test]
    fn camera_ignores_seek_and_replay() {
        let mut p = player();
        p.attach(Box::new(FakeSource::camera()));
        let mut surface = CountingSurface::new();

        p.seek(5, &mut surface);
        assert_eq!(surface.presents, 0);
        assert!(p.is_running());

        p.pause();
        p.replay();
        assert!(!p.is_running());
    }

    #[test]
    fn missing_model_artifact_keeps_current_selection() {
        let mut p = player();
        p.change_model(ModelKind::Pose, ModelSize::X);
        assert!(!p.has_model());
        assert_eq!(p.kind(), ModelKind::Detect);
        assert_eq!(p.size(), ModelSize::N);
    }

    static LOG_RECORDS: std::sync::Mutex<Vec<(log::Level, String)>> =
        std::sync::Mutex::new(Vec::new());

    struct RecordingLogger;

    impl log::Log for RecordingLogger {
        fn enabled(&self, _metadata: &log::Metadata) -> bool {
            true
        }

        fn log(&self, record: &log::Record) {
            LOG_RECORDS
                .lock()
                .unwrap()
                .push((record.level(), record.args().to_string()));
        }

        fn flush(&self) {}
    }

    #[test]
    fn missing_model_artifact_logs_exactly_one_error() {
        static LOGGER: RecordingLogger = RecordingLogger;
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Trace);

        // unique dir so records from other tests cannot match
        let dir = PathBuf::from("/nonexistent-models-logged-once");
        let mut p = Player::new(dir, Thresholds::default());
        p.change_model(ModelKind::Segment, ModelSize::M);

        let records = LOG_RECORDS.lock().unwrap();
        let errors: Vec<_> = records
            .iter()
            .filter(|(level, msg)| {
                *level == log::Level::Error && msg.contains("nonexistent-models-logged-once")
            })
            .collect();
        assert_eq!(errors.len(), 1);
    }

    #[test]
    fn toggle_detection_flips_flag() {
        let mut p = player();
        assert!(!p.detecting);
        p.toggle_detection();
        assert!(p.detecting);
        p.toggle_detection();
        assert!(!p.detecting);
    }
}
