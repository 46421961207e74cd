use std::io::Write;

use anyhow::{Context, Result, anyhow};
use chrono::Utc;
use log::{debug, warn};

use super::dispatch::OptionValue;
use super::episode::{
    episode_url, format_timestamp_display, next_episode_number, normalize_show_name,
    parse_episode_number, parse_quality, truncate,
};
use super::lock;
use super::stream::{Probe, StreamClient};
use crate::cli::Cli;
use crate::store::Store;

pub(crate) struct Session<'a> {
    pub(crate) store: Store,
    pub(crate) client: &'a dyn StreamClient,
    pub(crate) base_url: String,
    pub(crate) pid: u32,
    pub(crate) out: &'a mut dyn Write,
}

impl Session<'_> {
    fn selected_show(&self) -> Result<String> {
        self.store
            .state()
            .show
            .clone()
            .ok_or_else(|| anyhow!("no show selected; use --show <name>"))
    }

    fn url_for(&self, show: &str, episode: u32) -> String {
        episode_url(&self.base_url, show, episode)
    }
}

fn text_value<'v>(value: OptionValue<'v>, flag: &str) -> Result<&'v str> {
    match value {
        OptionValue::Text(text) => Ok(text),
        OptionValue::Switch => Err(anyhow!("{flag} expects a value")),
    }
}

fn on_off(flag: bool) -> &'static str {
    if flag { "on" } else { "off" }
}

pub(crate) fn debug(session: &mut Session<'_>, _value: OptionValue<'_>, cli: &Cli) -> Result<()> {
    let state_json = serde_json::to_string_pretty(session.store.state())
        .context("failed to serialize state")?;
    writeln!(session.out, "crly v{}", env!("CARGO_PKG_VERSION"))?;
    writeln!(session.out, "state file: {}", session.store.path().display())?;
    writeln!(session.out, "streamlink: {}", session.client.describe())?;
    writeln!(session.out, "base url:   {}", session.base_url)?;
    writeln!(session.out, "pid:        {}", session.pid)?;
    writeln!(session.out, "options:    {cli:?}")?;
    writeln!(session.out, "state:\n{state_json}")?;
    Ok(())
}

pub(crate) fn show(session: &mut Session<'_>, value: OptionValue<'_>, _cli: &Cli) -> Result<()> {
    let raw = text_value(value, "--show")?;
    let slug = normalize_show_name(raw, &session.base_url)
        .ok_or_else(|| anyhow!("invalid show name '{}'", raw.trim()))?;

    let episode = session
        .store
        .tracked(&slug)
        .map(|entry| entry.next_episode())
        .unwrap_or(1);
    let state = session.store.state_mut();
    state.show = Some(slug.clone());
    state.episode = episode;

    writeln!(session.out, "Selected show: {slug} (episode {episode})")?;
    Ok(())
}

pub(crate) fn episode(session: &mut Session<'_>, value: OptionValue<'_>, _cli: &Cli) -> Result<()> {
    let show = session.selected_show()?;
    let episode = parse_episode_number(text_value(value, "--episode")?)?;
    session.store.state_mut().episode = episode;
    writeln!(session.out, "Selected episode {episode} of {show}")?;
    Ok(())
}

pub(crate) fn quality(session: &mut Session<'_>, value: OptionValue<'_>, _cli: &Cli) -> Result<()> {
    let quality = parse_quality(text_value(value, "--quality")?)?;
    writeln!(session.out, "Quality set to {quality}")?;
    session.store.state_mut().quality = quality;
    Ok(())
}

pub(crate) fn next(session: &mut Session<'_>, _value: OptionValue<'_>, _cli: &Cli) -> Result<()> {
    let show = session.selected_show()?;
    let episode = next_episode_number(session.store.state().episode)?;
    session.store.state_mut().episode = episode;
    writeln!(session.out, "Selected episode {episode} of {show}")?;
    Ok(())
}

pub(crate) fn track(session: &mut Session<'_>, _value: OptionValue<'_>, _cli: &Cli) -> Result<()> {
    let show = session.selected_show()?;
    let last_watched = session.store.state().episode.saturating_sub(1);
    if session.store.track(&show, last_watched) {
        writeln!(
            session.out,
            "Tracking {show} from episode {}",
            last_watched + 1
        )?;
    } else {
        writeln!(session.out, "Already tracking {show}")?;
    }
    Ok(())
}

pub(crate) fn updates(session: &mut Session<'_>, _value: OptionValue<'_>, _cli: &Cli) -> Result<()> {
    let targets: Vec<(String, u32)> = session
        .store
        .state()
        .tracked
        .iter()
        .map(|entry| (entry.show.clone(), entry.next_episode()))
        .collect();
    if targets.is_empty() {
        writeln!(session.out, "No tracked shows yet. Select one with --show and run --track.")?;
        return Ok(());
    }

    writeln!(session.out, "{:<40} {:<8} {}", "SHOW", "NEXT EP", "STATUS")?;
    for (show, next_episode) in targets {
        let url = session.url_for(&show, next_episode);
        let status = match session.client.probe(&url) {
            Ok(Probe::Available { title, .. }) => match title {
                Some(title) => format!("new episode: {title}"),
                None => "new episode".to_string(),
            },
            Ok(Probe::Unavailable(reason)) => {
                debug!("{url}: {reason}");
                "up to date".to_string()
            }
            Err(err) => {
                warn!("failed to check {show}: {err:#}");
                "check failed".to_string()
            }
        };
        if let Some(entry) = session.store.tracked_mut(&show) {
            entry.last_checked_at = Some(Utc::now().to_rfc3339());
        }
        writeln!(
            session.out,
            "{:<40} {:<8} {}",
            truncate(&show, 40),
            next_episode,
            status
        )?;
    }
    Ok(())
}

pub(crate) fn info(session: &mut Session<'_>, _value: OptionValue<'_>, _cli: &Cli) -> Result<()> {
    let show = session.selected_show()?;
    let state = session.store.state();
    let url = session.url_for(&show, state.episode);

    writeln!(session.out, "Show:      {show}")?;
    writeln!(session.out, "URL:       {url}")?;
    writeln!(session.out, "Episode:   {}", state.episode)?;
    writeln!(session.out, "Quality:   {}", state.quality)?;
    writeln!(session.out, "Autoplay:  {}", on_off(state.autoplay))?;
    match session.store.tracked(&show) {
        Some(entry) => {
            let watched = match entry.last_watched_at.as_deref() {
                Some(at) => format!(", last watched {}", format_timestamp_display(at)),
                None => String::new(),
            };
            writeln!(
                session.out,
                "Tracking:  watched {} episode(s), next is {}{watched}",
                entry.last_watched,
                entry.next_episode()
            )?;
        }
        None => writeln!(session.out, "Tracking:  no")?,
    }

    let status = match session.client.probe(&url) {
        Ok(Probe::Available { title, qualities }) => {
            let title = title.map(|t| format!(" \"{t}\"")).unwrap_or_default();
            format!("available{title} [{}]", qualities.join(", "))
        }
        Ok(Probe::Unavailable(reason)) => format!("unavailable ({reason})"),
        Err(err) => {
            warn!("failed to probe {url}: {err:#}");
            "unknown".to_string()
        }
    };
    writeln!(session.out, "Status:    {status}")?;
    Ok(())
}

pub(crate) fn autoplay(session: &mut Session<'_>, _value: OptionValue<'_>, _cli: &Cli) -> Result<()> {
    let state = session.store.state_mut();
    state.autoplay = !state.autoplay;
    let enabled = state.autoplay;
    writeln!(session.out, "Autoplay {}", on_off(enabled))?;
    Ok(())
}

pub(crate) fn play(session: &mut Session<'_>, _value: OptionValue<'_>, _cli: &Cli) -> Result<()> {
    let show = session.selected_show()?;
    lock::acquire(&mut session.store, session.pid)?;
    let played = play_from_selected(session, &show);
    let released = lock::release(&mut session.store, session.pid);
    played?;
    released?;
    Ok(())
}

fn play_from_selected(session: &mut Session<'_>, show: &str) -> Result<()> {
    loop {
        let episode = session.store.state().episode;
        let quality = session.store.state().quality.clone();
        let url = session.url_for(show, episode);

        writeln!(session.out, "Playing {show} episode {episode} ({quality})")?;
        session.out.flush()?;
        if !session.client.play(&url, &quality)? {
            writeln!(
                session.out,
                "Playback failed/interrupted. Progress not updated."
            )?;
            return Ok(());
        }

        if session.store.record_watched(show, episode)? {
            session.store.save()?;
            writeln!(session.out, "Updated progress: {show} -> episode {episode}")?;
        }

        if !session.store.state().autoplay {
            return Ok(());
        }

        let next = next_episode_number(episode)?;
        match session.client.probe(&session.url_for(show, next)) {
            Ok(probe) if probe.is_available() => {
                session.store.state_mut().episode = next;
                session.store.save()?;
                writeln!(session.out, "Autoplay: continuing with episode {next}")?;
            }
            Ok(_) => {
                writeln!(session.out, "Autoplay: episode {next} is not available yet")?;
                return Ok(());
            }
            Err(err) => {
                warn!("failed to check episode {next} of {show}: {err:#}");
                return Ok(());
            }
        }
    }
}
