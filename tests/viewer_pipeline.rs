//! 表示パイプラインの統合テスト
//!
//! モックポートを通してViewerのend-to-end動作を検証する。
//! カメラやウィンドウは不要で、どの環境でも実行できる。

use std::sync::{Arc, Mutex};
use std::time::Duration;

use BigKahuna::application::locator::CameraLocator;
use BigKahuna::application::subtitle::SubtitleSlot;
use BigKahuna::application::viewer::{LoopExit, Viewer, ViewerOptions};
use BigKahuna::domain::ports::{
    CameraPort, DetectorPort, DeviceInfo, DisplayPort, ProbeOutcome, ProbePort,
};
use BigKahuna::domain::types::{
    BoundingBox, DetectionOutput, Detections, Frame, Overlay,
};
use BigKahuna::domain::{DomainError, DomainResult};

struct FiniteCamera {
    frames_left: usize,
    releases: Arc<Mutex<usize>>,
}

impl CameraPort for FiniteCamera {
    fn read_frame(&mut self) -> DomainResult<Frame> {
        if self.frames_left == 0 {
            return Err(DomainError::FrameRead("stream ended".to_string()));
        }
        self.frames_left -= 1;
        Ok(Frame::new(vec![0u8; 2 * 2 * 3], 2, 2))
    }

    fn device_info(&self) -> DeviceInfo {
        DeviceInfo {
            index: 1,
            width: 2,
            height: 2,
            name: "virtual".to_string(),
        }
    }

    fn release(&mut self) -> DomainResult<()> {
        *self.releases.lock().unwrap() += 1;
        Ok(())
    }
}

#[derive(Default)]
struct RecordingDisplay {
    overlays: Arc<Mutex<Vec<Overlay>>>,
    closes: Arc<Mutex<usize>>,
    quit_after: usize,
    shows: usize,
}

impl DisplayPort for RecordingDisplay {
    fn show(&mut self, _frame: &Frame, overlay: &Overlay) -> DomainResult<()> {
        self.shows += 1;
        self.overlays.lock().unwrap().push(overlay.clone());
        Ok(())
    }

    fn poll_key(&mut self, _timeout: Duration) -> DomainResult<Option<i32>> {
        if self.quit_after > 0 && self.shows >= self.quit_after {
            Ok(Some('q' as i32))
        } else {
            Ok(None)
        }
    }

    fn close(&mut self) -> DomainResult<()> {
        *self.closes.lock().unwrap() += 1;
        Ok(())
    }
}

struct CountingDetector {
    per_frame: usize,
}

impl DetectorPort for CountingDetector {
    fn detect(&mut self, frame: &Frame) -> DomainResult<DetectionOutput> {
        let boxes = (0..self.per_frame)
            .map(|i| BoundingBox {
                x: i as f32,
                y: 0.0,
                width: 1.0,
                height: 1.0,
                label: "thing".to_string(),
                confidence: 0.8,
            })
            .collect();
        Ok(DetectionOutput {
            detections: Detections { boxes },
            annotated: frame.clone(),
        })
    }

    fn backend_name(&self) -> &'static str {
        "counting"
    }
}

fn options() -> ViewerOptions {
    ViewerOptions {
        key_poll: Duration::from_millis(1),
        quit_key: 'q' as i32,
        stats_interval: Duration::from_secs(3600),
    }
}

#[test]
fn viewer_with_subtitles_runs_to_stream_end() {
    let releases = Arc::new(Mutex::new(0));
    let camera = FiniteCamera {
        frames_left: 5,
        releases: releases.clone(),
    };
    let display = RecordingDisplay::default();
    let overlays = display.overlays.clone();
    let closes = display.closes.clone();

    let slot = SubtitleSlot::new();
    slot.publish("integration test");

    let viewer: Viewer<_, _, CountingDetector> =
        Viewer::new(camera, display, None, Some(slot), options());
    let exit = viewer.run();

    assert_eq!(exit, LoopExit::ReadFailure);
    assert_eq!(*releases.lock().unwrap(), 1);
    assert_eq!(*closes.lock().unwrap(), 1);

    let overlays = overlays.lock().unwrap();
    assert_eq!(overlays.len(), 5);
    for overlay in overlays.iter() {
        assert!(overlay.lines[0].text.starts_with("FPS: "));
        assert_eq!(overlay.lines[1].text, "Subtitle: integration test");
    }
}

#[test]
fn viewer_with_detector_reports_counts_until_quit() {
    let releases = Arc::new(Mutex::new(0));
    let camera = FiniteCamera {
        frames_left: 100,
        releases: releases.clone(),
    };
    let display = RecordingDisplay {
        quit_after: 3,
        ..Default::default()
    };
    let overlays = display.overlays.clone();

    let detector = CountingDetector { per_frame: 2 };
    let viewer = Viewer::new(camera, display, Some(detector), None, options());
    let exit = viewer.run();

    assert_eq!(exit, LoopExit::QuitKey);
    assert_eq!(*releases.lock().unwrap(), 1);

    let overlays = overlays.lock().unwrap();
    assert_eq!(overlays.len(), 3);
    for overlay in overlays.iter() {
        assert_eq!(overlay.lines[1].text, "Objects Detected: 2");
    }
}

#[test]
fn locator_feeds_viewer_default_selection() {
    struct TwoLive;
    impl ProbePort for TwoLive {
        fn probe(&mut self, index: i32) -> ProbeOutcome {
            if index == 1 || index == 4 {
                ProbeOutcome::Live
            } else {
                ProbeOutcome::OpenFailed
            }
        }
    }

    let locator = CameraLocator::new(10, Some(1));
    let located = locator.locate(&mut TwoLive).unwrap();

    assert_eq!(located.default_index, 1);
    assert_eq!(located.cameras.len(), 2);
}
