//! Command payload builders and reply layouts
//!
//! One function per device command, returning the fixed command payload
//! (command code little-endian first, then arguments). Reply layouts are
//! thin typed views over the ack argument bytes.

pub mod cmd_config;
pub mod cmd_detection;
pub mod cmd_system;
