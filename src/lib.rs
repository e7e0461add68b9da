//! BigKahuna - Library
//!
//! このライブラリは、バイナリターゲット（配信制御やschema生成など）で
//! プロジェクトのモジュールにアクセスするために提供されています。

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod logging;
