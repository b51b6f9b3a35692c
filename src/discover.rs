//! Source discovery by USB id.

use crate::config::UsbId;
use crate::error::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Directory holding the event nodes.
pub const INPUT_DIR: &str = "/dev/input";

/// Numeric suffix of an `eventN` node, if `path` names one.
pub fn event_index(path: &Path) -> Option<u32> {
    path.file_name()?
        .to_str()?
        .strip_prefix("event")?
        .parse()
        .ok()
}

/// Event nodes in `dir`, ordered by their number.
pub fn event_nodes(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut nodes: Vec<(u32, PathBuf)> = fs::read_dir(dir)?
        .flatten()
        .map(|entry| entry.path())
        .filter_map(|path| Some((event_index(&path)?, path)))
        .collect();
    nodes.sort_by_key(|(index, _)| *index);
    Ok(nodes.into_iter().map(|(_, path)| path).collect())
}

/// First of `nodes` for which `identify` reports `wanted`.
///
/// Nodes that cannot be identified are skipped.
pub fn first_matching<F>(nodes: &[PathBuf], wanted: UsbId, mut identify: F) -> Option<PathBuf>
where
    F: FnMut(&Path) -> std::io::Result<UsbId>,
{
    nodes.iter().find_map(|path| match identify(path) {
        Ok(id) if id == wanted => Some(path.clone()),
        Ok(_) => None,
        Err(e) => {
            log::debug!("skipping {}: {e}", path.display());
            None
        }
    })
}

/// Find the lowest-numbered event node reporting `wanted` as its USB id.
pub fn find_by_usb_id(wanted: UsbId) -> Result<PathBuf> {
    let nodes = event_nodes(Path::new(INPUT_DIR))?;
    let found = first_matching(&nodes, wanted, |path| {
        let device = evdev::Device::open(path)?;
        let id = device.input_id();
        Ok(UsbId::new(id.vendor(), id.product()))
    });
    match found {
        Some(path) => {
            log::info!("found {wanted} at {}", path.display());
            Ok(path)
        }
        None => Err(Error::NoMatchingDevice(wanted.to_string())),
    }
}
