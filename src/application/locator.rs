//! カメラ探索モジュール
//!
//! 有界のインデックス範囲を走査し、オープン＋1フレーム読み取りの両方に
//! 成功したデバイスだけを生存とみなします。OBS仮想カメラの慣習インデックスは
//! 設定可能なヒントであり、保証ではありません。

use crate::domain::{CameraDescriptor, DomainError, DomainResult, ProbeOutcome, ProbePort};

/// カメラ探索の結果
#[derive(Debug, Clone)]
pub struct LocatedCameras {
    /// 生存が確認されたデバイス（インデックス昇順）
    pub cameras: Vec<CameraDescriptor>,
    /// 既定として選ばれたインデックス
    ///
    /// 優先ヒントが生存していればそれ、いなければ最小の生存インデックス。
    pub default_index: i32,
}

impl LocatedCameras {
    /// 指定インデックスが生存集合に含まれるか
    pub fn contains(&self, index: i32) -> bool {
        self.cameras.iter().any(|c| c.index == index)
    }
}

/// カメラ探索器
#[derive(Debug, Clone)]
pub struct CameraLocator {
    /// 走査するインデックスの上限（0..probe_limit）
    probe_limit: i32,
    /// 仮想カメラとして優先するインデックスのヒント
    preferred_index: Option<i32>,
}

impl CameraLocator {
    /// 優先ヒント付き仮想カメラのラベル
    const PREFERRED_LABEL: &'static str = "OBS Virtual Camera (Default)";

    /// 新しいCameraLocatorを作成
    pub fn new(probe_limit: i32, preferred_index: Option<i32>) -> Self {
        Self {
            probe_limit,
            preferred_index,
        }
    }

    /// 有界範囲のデバイスを走査して生存集合と既定インデックスを返す
    ///
    /// 各インデックスの探索は独立しており、1つの失敗が残りを打ち切ることはない。
    ///
    /// # Returns
    /// - `Ok(LocatedCameras)`: 1台以上の生存デバイスが見つかった
    /// - `Err(DomainError::NoDeviceFound)`: 生存デバイスなし（呼び出し側は続行不能）
    pub fn locate<P: ProbePort>(&self, probe: &mut P) -> DomainResult<LocatedCameras> {
        tracing::info!(
            "Detecting available cameras (indices 0..{})...",
            self.probe_limit
        );

        let mut cameras = Vec::new();

        for index in 0..self.probe_limit {
            match probe.probe(index) {
                ProbeOutcome::Live => {
                    let name = if self.preferred_index == Some(index) {
                        Self::PREFERRED_LABEL.to_string()
                    } else {
                        format!("Camera Index {}", index)
                    };
                    tracing::info!("[{}] {}", index, name);
                    cameras.push(CameraDescriptor::new(index, name));
                }
                ProbeOutcome::OpenFailed => {
                    tracing::debug!("Index {}: open failed", index);
                }
                ProbeOutcome::ReadFailed => {
                    tracing::debug!("Index {}: opened but read failed", index);
                }
            }
        }

        if cameras.is_empty() {
            tracing::error!(
                "No cameras detected. Ensure OBS Virtual Camera or a webcam is enabled."
            );
            return Err(DomainError::NoDeviceFound);
        }

        let default_index = self.select_default(&cameras);

        Ok(LocatedCameras {
            cameras,
            default_index,
        })
    }

    /// 既定インデックスの選択規則
    ///
    /// 優先ヒントが生存集合に含まれていれば必ずそれ。含まれていなければ最小の
    /// 生存インデックス（camerasは昇順に構築されるため先頭要素）。
    fn select_default(&self, cameras: &[CameraDescriptor]) -> i32 {
        if let Some(preferred) = self.preferred_index {
            if cameras.iter().any(|c| c.index == preferred) {
                return preferred;
            }
        }
        // locate()は空集合をエラーにしているため、ここでは必ず1台以上ある
        cameras.first().map(|c| c.index).unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// 台本どおりの結果を返すモック探索器
    struct ScriptedProbe {
        outcomes: HashMap<i32, ProbeOutcome>,
        probed: Vec<i32>,
    }

    impl ScriptedProbe {
        fn new(outcomes: &[(i32, ProbeOutcome)]) -> Self {
            Self {
                outcomes: outcomes.iter().copied().collect(),
                probed: Vec::new(),
            }
        }
    }

    impl ProbePort for ScriptedProbe {
        fn probe(&mut self, index: i32) -> ProbeOutcome {
            self.probed.push(index);
            self.outcomes
                .get(&index)
                .copied()
                .unwrap_or(ProbeOutcome::OpenFailed)
        }
    }

    #[test]
    fn test_only_live_indices_included() {
        // オープンと読み取りの両方に成功したインデックスだけが結果に含まれること
        let mut probe = ScriptedProbe::new(&[
            (0, ProbeOutcome::Live),
            (1, ProbeOutcome::ReadFailed),
            (2, ProbeOutcome::OpenFailed),
            (3, ProbeOutcome::Live),
        ]);

        let locator = CameraLocator::new(10, Some(1));
        let located = locator.locate(&mut probe).unwrap();

        let indices: Vec<i32> = located.cameras.iter().map(|c| c.index).collect();
        assert_eq!(indices, vec![0, 3]);
    }

    #[test]
    fn test_probe_failure_does_not_short_circuit() {
        // あるインデックスの失敗が残りの走査を打ち切らないこと
        let mut probe = ScriptedProbe::new(&[(9, ProbeOutcome::Live)]);

        let locator = CameraLocator::new(10, None);
        let located = locator.locate(&mut probe).unwrap();

        assert_eq!(probe.probed, (0..10).collect::<Vec<i32>>());
        assert_eq!(located.default_index, 9);
    }

    #[test]
    fn test_preferred_index_chosen_when_live() {
        let mut probe = ScriptedProbe::new(&[
            (0, ProbeOutcome::Live),
            (1, ProbeOutcome::Live),
            (2, ProbeOutcome::Live),
        ]);

        let locator = CameraLocator::new(10, Some(1));
        let located = locator.locate(&mut probe).unwrap();

        assert_eq!(located.default_index, 1);
        assert!(located
            .cameras
            .iter()
            .any(|c| c.index == 1 && c.name.contains("OBS Virtual Camera")));
    }

    #[test]
    fn test_fallback_to_minimum_live_index() {
        // 優先インデックスが生存していない場合は最小の生存インデックスが既定になること
        let mut probe = ScriptedProbe::new(&[
            (2, ProbeOutcome::Live),
            (5, ProbeOutcome::Live),
        ]);

        let locator = CameraLocator::new(10, Some(1));
        let located = locator.locate(&mut probe).unwrap();

        assert_eq!(located.default_index, 2);
    }

    #[test]
    fn test_no_device_found_is_fatal() {
        let mut probe = ScriptedProbe::new(&[]);

        let locator = CameraLocator::new(10, Some(1));
        let result = locator.locate(&mut probe);

        assert!(matches!(result, Err(DomainError::NoDeviceFound)));
    }

    #[test]
    fn test_contains() {
        let mut probe = ScriptedProbe::new(&[(0, ProbeOutcome::Live), (3, ProbeOutcome::Live)]);
        let locator = CameraLocator::new(10, None);
        let located = locator.locate(&mut probe).unwrap();

        assert!(located.contains(0));
        assert!(located.contains(3));
        assert!(!located.contains(1));
    }
}
