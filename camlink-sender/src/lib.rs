//! # camlink-sender: device-side camera streamer
//!
//! Captures frames from a frame source, throttles them to the target
//! cadence, JPEG-encodes the survivors and streams them to the PC
//! receiver over a single TCP connection per camera.

pub mod config;
pub mod service;
pub mod source;
