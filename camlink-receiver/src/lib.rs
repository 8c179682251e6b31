//! # camlink-receiver: PC-side camera stream receiver
//!
//! Accepts one TCP connection per camera, checks that every frame is a
//! decodable JPEG, reports per-camera rates and optionally records the
//! frames into a dataset directory.

pub mod config;
pub mod recorder;
pub mod service;
