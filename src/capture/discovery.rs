//! Monitor-source lookup through `pactl`.

use super::{CaptureError, spawn_error};
use std::process::{Command, Stdio};
use tracing::debug;

const PACTL: &str = "pactl";
const MONITOR_SUFFIX: &str = ".monitor";

/// Monitor of the default sink, or failing that the first monitor source listed.
pub fn default_monitor() -> Result<String, CaptureError> {
    match pactl(&["get-default-sink"]) {
        Ok(sink) => {
            if let Some(monitor) = monitor_for_sink(&sink) {
                debug!("[discovery] default sink monitor: {monitor}");
                return Ok(monitor);
            }
        }
        Err(err) => debug!("[discovery] default sink lookup failed: {err}"),
    }

    list_monitor_sources()?
        .into_iter()
        .next()
        .ok_or(CaptureError::NoMonitorSource)
}

pub fn list_monitor_sources() -> Result<Vec<String>, CaptureError> {
    pactl(&["list", "short", "sources"]).map(|listing| parse_monitor_sources(&listing))
}

fn pactl(args: &[&str]) -> Result<String, CaptureError> {
    let output = Command::new(PACTL)
        .args(args)
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|err| spawn_error(PACTL, err))?;

    if !output.status.success() {
        return Err(CaptureError::CommandFailed {
            tool: PACTL,
            status: output.status.to_string(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn monitor_for_sink(sink: &str) -> Option<String> {
    let sink = sink.trim();
    (!sink.is_empty()).then(|| format!("{sink}{MONITOR_SUFFIX}"))
}

/// Source names containing `.monitor` from `pactl list short sources` output
/// (tab separated, name in the second column).
fn parse_monitor_sources(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().nth(1))
        .filter(|name| name.contains(MONITOR_SUFFIX))
        .map(str::to_string)
        .collect()
}
