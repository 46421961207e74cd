use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command as ProcessCommand, Stdio};

use anyhow::{Context, Result, anyhow};
use log::debug;
use serde_json::Value;

use super::process::run_in_foreground;
use super::{Probe, StreamClient};

pub(crate) const STREAMLINK: &str = "streamlink";

#[derive(Debug, Clone)]
pub(crate) struct Streamlink {
    bin: PathBuf,
}

impl Streamlink {
    pub(crate) fn from_env() -> Self {
        Self {
            bin: resolve_streamlink_bin_from_env(env::var_os("CRLY_STREAMLINK_BIN")),
        }
    }

    fn label(&self) -> String {
        self.bin.display().to_string()
    }
}

impl StreamClient for Streamlink {
    fn play(&self, url: &str, quality: &str) -> Result<bool> {
        debug!("launching {} {url} {quality}", self.label());
        let mut cmd = ProcessCommand::new(&self.bin);
        cmd.arg(url)
            .arg(quality)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());
        let status = run_in_foreground(cmd, &self.label())?;
        debug!("{} exited with {status}", self.label());
        Ok(status.success())
    }

    fn probe(&self, url: &str) -> Result<Probe> {
        debug!("probing {url}");
        let output = ProcessCommand::new(&self.bin)
            .arg("--json")
            .arg(url)
            .stdin(Stdio::null())
            .output()
            .with_context(|| format!("failed to launch {}", self.label()))?;
        let raw = String::from_utf8_lossy(&output.stdout);
        parse_probe_output(&raw).with_context(|| {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            if stderr.is_empty() {
                format!("{} exited with {}", self.label(), output.status)
            } else {
                format!("{} exited with {}: {stderr}", self.label(), output.status)
            }
        })
    }

    fn ensure_installed(&self) -> Result<()> {
        find_program(&self.bin, env::var_os("PATH"))
            .map(|found| debug!("using {}", found.display()))
            .ok_or_else(|| anyhow!("required program not found: {}", self.label()))
    }

    fn describe(&self) -> String {
        find_program(&self.bin, env::var_os("PATH"))
            .map(|found| found.display().to_string())
            .unwrap_or_else(|| format!("{} (not found)", self.label()))
    }
}

pub(crate) fn resolve_streamlink_bin_from_env(env_value: Option<OsString>) -> PathBuf {
    match env_value {
        Some(value) if !value.is_empty() => PathBuf::from(value),
        _ => PathBuf::from(STREAMLINK),
    }
}

/// Explicit paths must exist; bare names are looked up on `path_var`.
pub(crate) fn find_program(bin: &Path, path_var: Option<OsString>) -> Option<PathBuf> {
    if bin.components().count() > 1 {
        return bin.is_file().then(|| bin.to_path_buf());
    }
    let path_var = path_var?;
    env::split_paths(&path_var)
        .map(|dir| dir.join(bin))
        .find(|candidate| candidate.is_file())
}

pub(crate) fn parse_probe_output(raw: &str) -> Result<Probe> {
    let value: Value = serde_json::from_str(raw.trim()).context("unexpected streamlink output")?;

    if let Some(error) = value.get("error") {
        let reason = error
            .as_str()
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        return Ok(Probe::Unavailable(reason));
    }

    let streams = value
        .get("streams")
        .and_then(Value::as_object)
        .ok_or_else(|| anyhow!("streamlink output has no streams"))?;
    if streams.is_empty() {
        return Ok(Probe::Unavailable("no playable streams".to_string()));
    }

    let title = value
        .pointer("/metadata/title")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|title| !title.is_empty())
        .map(str::to_string);
    let qualities = streams.keys().cloned().collect();

    Ok(Probe::Available { title, qualities })
}
