use anyhow::{Context, Result, anyhow, bail};
use chrono::{DateTime, Local};

pub(crate) fn normalize_show_name(raw: &str, base_url: &str) -> Option<String> {
    let mut name = raw.trim();
    if let Some(rest) = name.strip_prefix(base_url) {
        name = rest;
    } else if let Some(idx) = name.find("://") {
        // Full URL from another host: keep only the path.
        let after_scheme = &name[idx + 3..];
        name = after_scheme
            .find('/')
            .map(|slash| &after_scheme[slash..])
            .unwrap_or("");
    }
    let name = name.trim_matches('/');
    // A pasted episode URL selects its series.
    let name = match name.split_once('/') {
        Some((series, _)) => series,
        None => name,
    };

    let slug = name
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
        .to_lowercase();
    if slug.is_empty() { None } else { Some(slug) }
}

pub(crate) fn parse_episode_number(raw: &str) -> Result<u32> {
    let trimmed = raw.trim();
    let episode = trimmed
        .parse::<u32>()
        .with_context(|| format!("invalid episode number '{trimmed}'"))?;
    if episode == 0 {
        bail!("invalid episode number '{trimmed}': episodes start at 1");
    }
    Ok(episode)
}

pub(crate) fn next_episode_number(current: u32) -> Result<u32> {
    current
        .checked_add(1)
        .ok_or_else(|| anyhow!("episode {current} has no successor"))
}

pub(crate) fn parse_quality(raw: &str) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        bail!("quality must not be empty");
    }
    if trimmed.chars().any(char::is_whitespace) {
        bail!("invalid quality '{trimmed}': use a single stream name such as 'best' or '720p'");
    }
    Ok(trimmed.to_string())
}

pub(crate) fn episode_url(base_url: &str, show: &str, episode: u32) -> String {
    format!("{}/{show}/episode-{episode}", base_url.trim_end_matches('/'))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    let mut out = s.to_string();
    if out.chars().count() > max {
        out = out.chars().take(max.saturating_sub(3)).collect::<String>() + "...";
    }
    out
}

pub(crate) fn format_timestamp_display(raw: &str) -> String {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| {
            dt.with_timezone(&Local)
                .format("%Y-%m-%d %H:%M %:z")
                .to_string()
        })
        .unwrap_or_else(|_| raw.to_string())
}
