//! 配信制御シーケンスの統合テスト
//!
//! モックの制御ポートを通して、コマンド順序と切断保証を検証する。

use std::sync::{Arc, Mutex};

use BigKahuna::application::streaming::run_control_sequence;
use BigKahuna::domain::ports::StreamControlPort;
use BigKahuna::domain::{DomainError, DomainResult};

#[derive(Clone, Default)]
struct SharedLog(Arc<Mutex<Vec<String>>>);

impl SharedLog {
    fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn push(&self, entry: &str) {
        self.0.lock().unwrap().push(entry.to_string());
    }
}

struct FlakyControl {
    log: SharedLog,
    connect_succeeds: bool,
}

impl StreamControlPort for FlakyControl {
    fn connect(&mut self) -> DomainResult<()> {
        self.log.push("connect");
        if self.connect_succeeds {
            Ok(())
        } else {
            Err(DomainError::ControlConnection("no endpoint".to_string()))
        }
    }

    fn select_scene(&mut self, name: &str) -> DomainResult<()> {
        self.log.push(&format!("scene:{}", name));
        Ok(())
    }

    fn start_stream(&mut self) -> DomainResult<()> {
        self.log.push("start");
        Ok(())
    }

    fn stop_stream(&mut self) -> DomainResult<()> {
        self.log.push("stop");
        Ok(())
    }

    fn disconnect(&mut self) -> DomainResult<()> {
        self.log.push("disconnect");
        Ok(())
    }
}

#[test]
fn sequence_passes_configured_scene_name() {
    let log = SharedLog::default();
    let mut control = FlakyControl {
        log: log.clone(),
        connect_succeeds: true,
    };

    let outcome = run_control_sequence(&mut control, "Main Scene").unwrap();

    assert_eq!(
        log.entries(),
        vec!["connect", "scene:Main Scene", "start", "stop", "disconnect"]
    );
    assert!(outcome.disconnected);
}

#[test]
fn failed_connection_still_disconnects_once() {
    let log = SharedLog::default();
    let mut control = FlakyControl {
        log: log.clone(),
        connect_succeeds: false,
    };

    let result = run_control_sequence(&mut control, "Main Scene");

    assert!(result.is_err());
    assert_eq!(log.entries(), vec!["connect", "disconnect"]);
}
