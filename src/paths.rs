use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{Context, Result};

pub fn state_file_path() -> Result<PathBuf> {
    if let Some(custom) = env::var_os("CRLY_STATE_FILE").filter(|value| !value.is_empty()) {
        return Ok(PathBuf::from(custom));
    }
    let base = dirs::config_dir().context("unable to resolve config directory")?;
    Ok(base.join("crly").join("state.json"))
}

pub fn base_url() -> String {
    base_url_from_env(env::var_os("CRLY_BASE_URL"))
}

pub(crate) fn base_url_from_env(env_value: Option<OsString>) -> String {
    match env_value.and_then(|value| value.into_string().ok()) {
        Some(value) if !value.trim().is_empty() => value.trim().trim_end_matches('/').to_string(),
        _ => "https://www.crunchyroll.com".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_defaults_when_unset_or_blank() {
        assert_eq!(base_url_from_env(None), "https://www.crunchyroll.com");
        assert_eq!(
            base_url_from_env(Some(OsString::from("  "))),
            "https://www.crunchyroll.com"
        );
    }

    #[test]
    fn base_url_strips_trailing_slash() {
        assert_eq!(
            base_url_from_env(Some(OsString::from("http://localhost:8080/"))),
            "http://localhost:8080"
        );
    }
}
