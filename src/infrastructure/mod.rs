//! Infrastructure層: 外部デバイス・サービスとの境界
//!
//! Domain層のポートに対する具体実装。OpenCV、cpal、HTTP、WebSocketの
//! 知識はすべてこの層に閉じ込める。

pub mod camera;
pub mod detect;
pub mod display;
pub mod microphone;
pub mod obs_control;
pub mod recognizer;

pub use camera::{OpenCvCameraAdapter, OpenCvProbe};
pub use detect::DetectorSelector;
pub use display::HighguiDisplayAdapter;
pub use microphone::CpalMicrophoneAdapter;
pub use obs_control::ObsWebSocketAdapter;
pub use recognizer::CloudRecognizerAdapter;
