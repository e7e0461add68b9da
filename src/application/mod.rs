//! Application層: ユースケースの組み立て
//!
//! Domain層のポートを注入されて動くオーケストレーション。
//! 具体的なデバイスやネットワークの知識はInfrastructure層に閉じる。

pub mod locator;
pub mod stats;
pub mod streaming;
pub mod subtitle;
pub mod viewer;

pub use locator::{CameraLocator, LocatedCameras};
pub use stats::{FpsCounter, StatKind, StatsCollector};
pub use streaming::{run_control_sequence, ControlOutcome};
pub use subtitle::{SubtitleProducer, SubtitleSlot};
pub use viewer::{LoopExit, Viewer, ViewerOptions};
