//! 表示ループモジュール
//!
//! カメラから1フレーム読み、（設定されていれば）検出を通し、FPSと情報行の
//! オーバーレイを構成して表示する逐次ループ。終了条件は終了キーの押下か
//! フレーム読み取り失敗の2つだけで、どちらの経路でもクリーンアップは
//! ちょうど1回実行される。

use std::time::{Duration, Instant};

use crate::application::stats::{FpsCounter, StatKind, StatsCollector};
use crate::application::subtitle::SubtitleSlot;
use crate::domain::{CameraPort, DetectorPort, DisplayPort, Frame, Overlay, OverlayColor};

/// FPS行の描画位置（左下基準）
const FPS_POSITION: (i32, i32) = (20, 50);
/// 情報行（検出数または字幕）の描画位置
const INFO_POSITION: (i32, i32) = (20, 90);

/// ループの終了理由
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    /// 終了キーが押された（正常終了）
    QuitKey,
    /// フレーム読み取りに失敗した（ストリーム終端またはデバイス喪失）
    ReadFailure,
}

/// 表示ループの動作設定
#[derive(Debug, Clone)]
pub struct ViewerOptions {
    /// キーポーリングの待ち時間
    pub key_poll: Duration,
    /// 終了キーのASCIIコード
    pub quit_key: i32,
    /// 統計レポートの出力間隔
    pub stats_interval: Duration,
}

impl Default for ViewerOptions {
    fn default() -> Self {
        Self {
            key_poll: Duration::from_millis(1),
            quit_key: 'q' as i32,
            stats_interval: Duration::from_secs(10),
        }
    }
}

/// 表示ループ本体
///
/// カメラ・表示・検出器はすべてポート経由で注入される。検出器と字幕スロットは
/// 任意であり、両方Noneなら素のFPS付きビューアとして動く。
pub struct Viewer<C, D, T>
where
    C: CameraPort,
    D: DisplayPort,
    T: DetectorPort,
{
    camera: C,
    display: D,
    detector: Option<T>,
    subtitles: Option<SubtitleSlot>,
    options: ViewerOptions,
    fps: FpsCounter,
    stats: StatsCollector,
}

impl<C, D, T> Viewer<C, D, T>
where
    C: CameraPort,
    D: DisplayPort,
    T: DetectorPort,
{
    /// 新しいViewerを作成
    pub fn new(
        camera: C,
        display: D,
        detector: Option<T>,
        subtitles: Option<SubtitleSlot>,
        options: ViewerOptions,
    ) -> Self {
        let stats_interval = options.stats_interval;
        Self {
            camera,
            display,
            detector,
            subtitles,
            options,
            fps: FpsCounter::new(),
            stats: StatsCollector::new(stats_interval),
        }
    }

    /// ループを回し、終了理由を返す
    ///
    /// どの終了経路でもカメラ解放とウィンドウクローズをちょうど1回行う。
    /// クリーンアップ中のエラーはログに残すだけで、終了理由を上書きしない。
    pub fn run(mut self) -> LoopExit {
        let info = self.camera.device_info();
        tracing::info!(
            "Starting viewer: device {} ({}x{})",
            info.index,
            info.width,
            info.height
        );
        if let Some(detector) = &self.detector {
            tracing::info!("Detection backend: {}", detector.backend_name());
        }

        let exit = self.run_loop();

        match exit {
            LoopExit::QuitKey => tracing::info!("Quit key pressed, shutting down"),
            LoopExit::ReadFailure => {
                tracing::warn!("Frame read failed, shutting down")
            }
        }

        self.cleanup();
        exit
    }

    /// ループ本体（クリーンアップは呼び出し側が行う）
    fn run_loop(&mut self) -> LoopExit {
        loop {
            let iteration_start = Instant::now();

            let frame = match self.camera.read_frame() {
                Ok(frame) => frame,
                Err(e) => {
                    tracing::warn!("Frame read error: {}", e);
                    return LoopExit::ReadFailure;
                }
            };

            // 検出は任意。エラーはこのイテレーションだけ生フレームに縮退する。
            let detector_configured = self.detector.is_some();
            let (display_frame, detection_count) = self.detect(frame);

            let fps = self.fps.tick(Instant::now());
            let overlay = self.compose_overlay(fps, detector_configured, detection_count);

            let render_start = Instant::now();
            if let Err(e) = self.display.show(&display_frame, &overlay) {
                tracing::error!("Display error: {}", e);
                return LoopExit::ReadFailure;
            }
            self.stats.record_duration(StatKind::Render, render_start.elapsed());

            self.stats.record_frame();
            self.stats
                .record_duration(StatKind::EndToEnd, iteration_start.elapsed());
            if self.stats.should_report() {
                self.stats.report_and_reset();
            }

            match self.display.poll_key(self.options.key_poll) {
                Ok(Some(code)) if code == self.options.quit_key => {
                    return LoopExit::QuitKey;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Key polling error: {}", e);
                }
            }
        }
    }

    /// 検出ステップ: 注釈済みフレームと検出数を返す
    ///
    /// 検出器なしなら生フレームをそのまま返す（検出数もNone）。
    /// 検出エラーも生フレームに縮退するが、数え損ねたのでNone。
    fn detect(&mut self, frame: Frame) -> (Frame, Option<usize>) {
        let Some(detector) = &mut self.detector else {
            return (frame, None);
        };

        let detect_start = Instant::now();
        let result = detector.detect(&frame);
        self.stats
            .record_duration(StatKind::Detect, detect_start.elapsed());

        match result {
            Ok(output) => {
                let count = output.detections.count();
                (output.annotated, Some(count))
            }
            Err(e) => {
                tracing::warn!("Detection error, showing raw frame: {}", e);
                (frame, None)
            }
        }
    }

    /// このイテレーションのオーバーレイを構成する
    ///
    /// FPS行は常に描画する。情報行は、検出器が構成されていれば検出数
    /// （検出エラーで数が取れないイテレーションは行なし）、構成されていなければ
    /// 字幕スロットの現在値（空文字列なら描画自体をスキップ）。
    fn compose_overlay(
        &self,
        fps: f64,
        detector_configured: bool,
        detection_count: Option<usize>,
    ) -> Overlay {
        let mut overlay = Overlay::new();
        overlay.push(format!("FPS: {:.2}", fps), FPS_POSITION, OverlayColor::GREEN);

        if detector_configured {
            if let Some(count) = detection_count {
                overlay.push(
                    format!("Objects Detected: {}", count),
                    INFO_POSITION,
                    OverlayColor::GREEN,
                );
            }
        } else if let Some(slot) = &self.subtitles {
            let text = slot.read();
            if !text.is_empty() {
                overlay.push(
                    format!("Subtitle: {}", text),
                    INFO_POSITION,
                    OverlayColor::YELLOW,
                );
            }
        }

        overlay
    }

    /// リソース解放（ちょうど1回だけ呼ばれる）
    ///
    /// 片方の失敗がもう片方の解放を妨げないよう、エラーはログに落とすだけにする。
    fn cleanup(&mut self) {
        if let Err(e) = self.camera.release() {
            tracing::warn!("Camera release error: {}", e);
        }
        if let Err(e) = self.display.close() {
            tracing::warn!("Display close error: {}", e);
        }
        tracing::info!("Viewer resources released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{
        BoundingBox, DetectionOutput, Detections, DeviceInfo, DomainError, DomainResult,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    fn test_frame(tag: u8) -> Frame {
        Frame::new(vec![tag; 12], 2, 2)
    }

    /// 指定回数だけ成功し、その後読み取り失敗するモックカメラ
    struct MockCamera {
        frames_left: usize,
        release_count: Rc<RefCell<usize>>,
    }

    impl MockCamera {
        fn new(frames: usize) -> (Self, Rc<RefCell<usize>>) {
            let release_count = Rc::new(RefCell::new(0));
            (
                Self {
                    frames_left: frames,
                    release_count: release_count.clone(),
                },
                release_count,
            )
        }
    }

    impl CameraPort for MockCamera {
        fn read_frame(&mut self) -> DomainResult<Frame> {
            if self.frames_left == 0 {
                return Err(DomainError::FrameRead("end of stream".to_string()));
            }
            self.frames_left -= 1;
            Ok(test_frame(self.frames_left as u8))
        }

        fn device_info(&self) -> DeviceInfo {
            DeviceInfo {
                index: 0,
                width: 2,
                height: 2,
                name: "mock".to_string(),
            }
        }

        fn release(&mut self) -> DomainResult<()> {
            *self.release_count.borrow_mut() += 1;
            Ok(())
        }
    }

    #[derive(Default)]
    struct DisplayLog {
        shown: Vec<(Frame, Overlay)>,
        close_count: usize,
    }

    /// 表示呼び出しを記録するモックディスプレイ
    ///
    /// key_scriptのi番目の値がi回目のpoll_keyの結果になる。
    struct MockDisplay {
        log: Rc<RefCell<DisplayLog>>,
        key_script: Vec<Option<i32>>,
        polls: usize,
    }

    impl MockDisplay {
        fn new(key_script: Vec<Option<i32>>) -> (Self, Rc<RefCell<DisplayLog>>) {
            let log = Rc::new(RefCell::new(DisplayLog::default()));
            (
                Self {
                    log: log.clone(),
                    key_script,
                    polls: 0,
                },
                log,
            )
        }
    }

    impl DisplayPort for MockDisplay {
        fn show(&mut self, frame: &Frame, overlay: &Overlay) -> DomainResult<()> {
            self.log
                .borrow_mut()
                .shown
                .push((frame.clone(), overlay.clone()));
            Ok(())
        }

        fn poll_key(&mut self, _timeout: Duration) -> DomainResult<Option<i32>> {
            let key = self.key_script.get(self.polls).copied().flatten();
            self.polls += 1;
            Ok(key)
        }

        fn close(&mut self) -> DomainResult<()> {
            self.log.borrow_mut().close_count += 1;
            Ok(())
        }
    }

    /// 一定の検出数を返すモック検出器
    struct MockDetector {
        count: usize,
        fail: bool,
    }

    impl DetectorPort for MockDetector {
        fn detect(&mut self, frame: &Frame) -> DomainResult<DetectionOutput> {
            if self.fail {
                return Err(DomainError::Detection("model exploded".to_string()));
            }
            let boxes = (0..self.count)
                .map(|i| BoundingBox {
                    x: i as f32,
                    y: 0.0,
                    width: 1.0,
                    height: 1.0,
                    label: "object".to_string(),
                    confidence: 0.9,
                })
                .collect();
            let mut annotated = frame.clone();
            // 注釈で画素が変わったことを模す
            if let Some(first) = annotated.data.first_mut() {
                *first = 0xFF;
            }
            Ok(DetectionOutput {
                detections: Detections { boxes },
                annotated,
            })
        }

        fn backend_name(&self) -> &'static str {
            "mock"
        }
    }

    /// 検出器なしのViewer型を明示するためのエイリアス用ダミー
    type NoDetector = MockDetector;

    fn options() -> ViewerOptions {
        ViewerOptions {
            key_poll: Duration::from_millis(1),
            quit_key: 'q' as i32,
            stats_interval: Duration::from_secs(3600),
        }
    }

    #[test]
    fn test_read_failure_terminates_after_showing_prior_frames() {
        // 5フレーム目の読み取り失敗で終了し、4フレームが表示されていること
        let (camera, release_count) = MockCamera::new(4);
        let (display, log) = MockDisplay::new(vec![]);

        let viewer: Viewer<_, _, NoDetector> =
            Viewer::new(camera, display, None, None, options());
        let exit = viewer.run();

        assert_eq!(exit, LoopExit::ReadFailure);
        assert_eq!(log.borrow().shown.len(), 4);
        assert_eq!(*release_count.borrow(), 1);
        assert_eq!(log.borrow().close_count, 1);
    }

    #[test]
    fn test_quit_key_exits_cleanly() {
        let (camera, release_count) = MockCamera::new(100);
        let (display, log) = MockDisplay::new(vec![None, None, Some('q' as i32)]);

        let viewer: Viewer<_, _, NoDetector> =
            Viewer::new(camera, display, None, None, options());
        let exit = viewer.run();

        assert_eq!(exit, LoopExit::QuitKey);
        assert_eq!(log.borrow().shown.len(), 3);
        assert_eq!(*release_count.borrow(), 1);
        assert_eq!(log.borrow().close_count, 1);
    }

    #[test]
    fn test_other_keys_do_not_exit() {
        let (camera, _) = MockCamera::new(100);
        let (display, log) =
            MockDisplay::new(vec![Some('a' as i32), Some('z' as i32), Some('q' as i32)]);

        let viewer: Viewer<_, _, NoDetector> =
            Viewer::new(camera, display, None, None, options());
        let exit = viewer.run();

        assert_eq!(exit, LoopExit::QuitKey);
        assert_eq!(log.borrow().shown.len(), 3);
    }

    #[test]
    fn test_no_detector_shows_raw_frame_pixels() {
        // 検出器なしでは表示フレームがキャプチャと同一バッファ内容であること
        let (camera, _) = MockCamera::new(1);
        let (display, log) = MockDisplay::new(vec![]);

        let viewer: Viewer<_, _, NoDetector> =
            Viewer::new(camera, display, None, None, options());
        viewer.run();

        let log = log.borrow();
        assert_eq!(log.shown[0].0.data, vec![0u8; 12]);
    }

    #[test]
    fn test_detector_annotates_and_counts() {
        let (camera, _) = MockCamera::new(1);
        let (display, log) = MockDisplay::new(vec![]);
        let detector = MockDetector {
            count: 3,
            fail: false,
        };

        let viewer = Viewer::new(camera, display, Some(detector), None, options());
        viewer.run();

        let log = log.borrow();
        let (frame, overlay) = &log.shown[0];
        // 注釈済みフレームが表示されている
        assert_eq!(frame.data[0], 0xFF);
        // 情報行は検出数
        assert_eq!(overlay.lines.len(), 2);
        assert_eq!(overlay.lines[1].text, "Objects Detected: 3");
        assert_eq!(overlay.lines[1].position, (20, 90));
        assert_eq!(overlay.lines[1].color, OverlayColor::GREEN);
    }

    #[test]
    fn test_detector_error_degrades_to_raw_frame() {
        // 検出エラーはループを止めず、そのイテレーションは生フレームを表示すること
        let (camera, release_count) = MockCamera::new(2);
        let (display, log) = MockDisplay::new(vec![]);
        let detector = MockDetector {
            count: 0,
            fail: true,
        };

        let viewer = Viewer::new(camera, display, Some(detector), None, options());
        let exit = viewer.run();

        assert_eq!(exit, LoopExit::ReadFailure);
        let log = log.borrow();
        assert_eq!(log.shown.len(), 2);
        // 生フレーム（注釈マークなし）
        assert_ne!(log.shown[0].0.data[0], 0xFF);
        // 縮退時は検出数の行を出さない（FPS行のみ）
        assert_eq!(log.shown[0].1.lines.len(), 1);
        assert_eq!(*release_count.borrow(), 1);
    }

    #[test]
    fn test_detector_error_does_not_fall_back_to_subtitle() {
        // 検出器が構成されている限り、検出エラーのイテレーションでも
        // 字幕行は出ないこと（情報行なし、FPS行のみ）
        let (camera, _) = MockCamera::new(2);
        let (display, log) = MockDisplay::new(vec![]);
        let slot = SubtitleSlot::new();
        slot.publish("should stay hidden");
        let detector = MockDetector {
            count: 0,
            fail: true,
        };

        let viewer = Viewer::new(camera, display, Some(detector), Some(slot), options());
        viewer.run();

        let log = log.borrow();
        for (_, overlay) in log.shown.iter() {
            assert_eq!(overlay.lines.len(), 1);
            assert!(overlay.lines[0].text.starts_with("FPS: "));
        }
    }

    #[test]
    fn test_fps_line_always_present() {
        let (camera, _) = MockCamera::new(3);
        let (display, log) = MockDisplay::new(vec![]);

        let viewer: Viewer<_, _, NoDetector> =
            Viewer::new(camera, display, None, None, options());
        viewer.run();

        for (_, overlay) in log.borrow().shown.iter() {
            assert!(overlay.lines[0].text.starts_with("FPS: "));
            assert_eq!(overlay.lines[0].position, (20, 50));
            assert_eq!(overlay.lines[0].color, OverlayColor::GREEN);
        }
        // 初回イテレーションのFPSは0
        assert_eq!(log.borrow().shown[0].1.lines[0].text, "FPS: 0.00");
    }

    #[test]
    fn test_empty_subtitle_skips_info_line() {
        // 字幕スロットが空文字列のときは情報行の描画自体が発生しないこと
        let (camera, _) = MockCamera::new(1);
        let (display, log) = MockDisplay::new(vec![]);
        let slot = SubtitleSlot::new();

        let viewer: Viewer<_, _, NoDetector> =
            Viewer::new(camera, display, None, Some(slot), options());
        viewer.run();

        assert_eq!(log.borrow().shown[0].1.lines.len(), 1);
    }

    #[test]
    fn test_subtitle_drawn_at_info_position() {
        let (camera, _) = MockCamera::new(1);
        let (display, log) = MockDisplay::new(vec![]);
        let slot = SubtitleSlot::new();
        slot.publish("hello there");

        let viewer: Viewer<_, _, NoDetector> =
            Viewer::new(camera, display, None, Some(slot), options());
        viewer.run();

        let log = log.borrow();
        let overlay = &log.shown[0].1;
        assert_eq!(overlay.lines.len(), 2);
        assert_eq!(overlay.lines[1].text, "Subtitle: hello there");
        assert_eq!(overlay.lines[1].position, (20, 90));
        assert_eq!(overlay.lines[1].color, OverlayColor::YELLOW);
    }

    #[test]
    fn test_detection_count_takes_precedence_over_subtitle() {
        // 検出器が構成されているときは情報行は検出数であり、字幕は出ないこと
        let (camera, _) = MockCamera::new(1);
        let (display, log) = MockDisplay::new(vec![]);
        let slot = SubtitleSlot::new();
        slot.publish("should not appear");
        let detector = MockDetector {
            count: 0,
            fail: false,
        };

        let viewer = Viewer::new(camera, display, Some(detector), Some(slot), options());
        viewer.run();

        let log = log.borrow();
        assert_eq!(log.shown[0].1.lines[1].text, "Objects Detected: 0");
    }

    #[test]
    fn test_zero_frames_still_cleans_up_once() {
        // 最初の読み取りから失敗しても解放とクローズは1回ずつ行われること
        let (camera, release_count) = MockCamera::new(0);
        let (display, log) = MockDisplay::new(vec![]);

        let viewer: Viewer<_, _, NoDetector> =
            Viewer::new(camera, display, None, None, options());
        let exit = viewer.run();

        assert_eq!(exit, LoopExit::ReadFailure);
        assert_eq!(log.borrow().shown.len(), 0);
        assert_eq!(*release_count.borrow(), 1);
        assert_eq!(log.borrow().close_count, 1);
    }
}
