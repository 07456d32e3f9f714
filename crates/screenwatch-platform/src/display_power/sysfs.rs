//! Linux sysfs readings for display power.
//!
//! - DRM connectors expose `/sys/class/drm/<card>-<connector>/dpms`
//!   ("On", "Standby", "Suspend", "Off").
//! - Backlights expose `/sys/class/backlight/<device>/bl_power`
//!   (0 = unblank, 4 = powerdown, anything else is an intermediate state).

use screenwatch_core::NotificationKind;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

const DPMS_FILE: &str = "dpms";
const BL_POWER_FILE: &str = "bl_power";

/// Which attribute a power file represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerFileKind {
    Dpms,
    BlPower,
}

/// A discovered power attribute file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PowerFile {
    pub path: PathBuf,
    pub kind: PowerFileKind,
}

/// Classify a DRM connector `dpms` value.
pub fn classify_dpms(value: &str) -> NotificationKind {
    match value.trim() {
        "On" => NotificationKind::ScreenOn,
        "Off" => NotificationKind::ScreenOff,
        other => NotificationKind::Other(format!("dpms:{}", other.to_lowercase())),
    }
}

/// Classify a backlight `bl_power` value.
pub fn classify_bl_power(value: &str) -> NotificationKind {
    match value.trim() {
        "0" => NotificationKind::ScreenOn,
        "4" => NotificationKind::ScreenOff,
        other => NotificationKind::Other(format!("bl_power:{}", other)),
    }
}

/// Find every power attribute file below the given class roots.
///
/// Missing roots contribute nothing.
pub fn discover(drm_root: &Path, backlight_root: &Path) -> io::Result<Vec<PowerFile>> {
    let mut files = find_files(drm_root, DPMS_FILE, PowerFileKind::Dpms)?;
    files.extend(find_files(backlight_root, BL_POWER_FILE, PowerFileKind::BlPower)?);
    Ok(files)
}

fn find_files(root: &Path, name: &str, kind: PowerFileKind) -> io::Result<Vec<PowerFile>> {
    let entries = match fs::read_dir(root) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path().join(name);
        if path.is_file() {
            files.push(PowerFile { path, kind });
        }
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(files)
}

/// Read one power file.
pub fn read_file(file: &PowerFile) -> io::Result<NotificationKind> {
    let value = fs::read_to_string(&file.path)?;
    Ok(match file.kind {
        PowerFileKind::Dpms => classify_dpms(&value),
        PowerFileKind::BlPower => classify_bl_power(&value),
    })
}

/// Combine per-device readings into one display state.
///
/// On if any device is on; otherwise off if any device is off; otherwise the
/// first intermediate reading. `None` when there are no readings.
pub fn aggregate(readings: &[NotificationKind]) -> Option<NotificationKind> {
    if readings.contains(&NotificationKind::ScreenOn) {
        Some(NotificationKind::ScreenOn)
    } else if readings.contains(&NotificationKind::ScreenOff) {
        Some(NotificationKind::ScreenOff)
    } else {
        readings.first().cloned()
    }
}

/// Read the aggregate display state below the given roots.
pub fn read_display_power(
    drm_root: &Path,
    backlight_root: &Path,
) -> io::Result<Option<NotificationKind>> {
    let files = discover(drm_root, backlight_root)?;
    let readings = files
        .iter()
        .map(read_file)
        .collect::<io::Result<Vec<_>>>()?;
    Ok(aggregate(&readings))
}
