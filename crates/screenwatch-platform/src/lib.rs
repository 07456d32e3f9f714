//! screenwatch-platform: platform-specific I/O boundary for screenwatch.
//!
//! This crate provides:
//! - A display power signal source reading Linux sysfs (`display_power`)
//! - A crossbeam-channel backed event sink (`sink`)

mod display_power;
mod sink;

// Re-export the sysfs signal source
pub use display_power::{
    aggregate, classify_bl_power, classify_dpms, discover, read_display_power, PowerFile,
    PowerFileKind, SysfsSignalSource, SysfsSourceConfig,
};

// Re-export sinks
pub use sink::ChannelSink;
