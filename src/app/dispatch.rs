use anyhow::Result;
use log::debug;

use super::handlers::{self, Session};
use crate::cli::Cli;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OptionKind {
    Debug,
    Show,
    Episode,
    Quality,
    Next,
    Track,
    Updates,
    Info,
    Autoplay,
    Play,
}

/// Handlers run in this order no matter where the flags appear on the command line.
pub(crate) const OPTION_PRIORITY: [OptionKind; 10] = [
    OptionKind::Debug,
    OptionKind::Show,
    OptionKind::Episode,
    OptionKind::Quality,
    OptionKind::Next,
    OptionKind::Track,
    OptionKind::Updates,
    OptionKind::Info,
    OptionKind::Autoplay,
    OptionKind::Play,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum OptionValue<'a> {
    Switch,
    Text(&'a str),
}

pub(crate) type Handler = fn(&mut Session<'_>, OptionValue<'_>, &Cli) -> Result<()>;

impl OptionKind {
    pub(crate) fn flag(self) -> &'static str {
        match self {
            OptionKind::Debug => "--debug",
            OptionKind::Show => "--show",
            OptionKind::Episode => "--episode",
            OptionKind::Quality => "--quality",
            OptionKind::Next => "--next",
            OptionKind::Track => "--track",
            OptionKind::Updates => "--updates",
            OptionKind::Info => "--info",
            OptionKind::Autoplay => "--autoplay",
            OptionKind::Play => "--play",
        }
    }

    pub(crate) fn value(self, cli: &Cli) -> Option<OptionValue<'_>> {
        let switch = |set: bool| set.then_some(OptionValue::Switch);
        match self {
            OptionKind::Debug => switch(cli.debug),
            OptionKind::Show => cli.show.as_deref().map(OptionValue::Text),
            OptionKind::Episode => cli.episode.as_deref().map(OptionValue::Text),
            OptionKind::Quality => cli.quality.as_deref().map(OptionValue::Text),
            OptionKind::Next => switch(cli.next),
            OptionKind::Track => switch(cli.track),
            OptionKind::Updates => switch(cli.updates),
            OptionKind::Info => switch(cli.info),
            OptionKind::Autoplay => switch(cli.autoplay),
            OptionKind::Play => switch(cli.play),
        }
    }

    pub(crate) fn mutates_state(self) -> bool {
        !matches!(self, OptionKind::Debug | OptionKind::Info)
    }

    pub(crate) fn needs_stream_client(self) -> bool {
        matches!(
            self,
            OptionKind::Updates | OptionKind::Info | OptionKind::Play
        )
    }

    fn handler(self) -> Handler {
        match self {
            OptionKind::Debug => handlers::debug,
            OptionKind::Show => handlers::show,
            OptionKind::Episode => handlers::episode,
            OptionKind::Quality => handlers::quality,
            OptionKind::Next => handlers::next,
            OptionKind::Track => handlers::track,
            OptionKind::Updates => handlers::updates,
            OptionKind::Info => handlers::info,
            OptionKind::Autoplay => handlers::autoplay,
            OptionKind::Play => handlers::play,
        }
    }
}

pub(crate) fn selected_options(cli: &Cli) -> Vec<(OptionKind, OptionValue<'_>)> {
    OPTION_PRIORITY
        .iter()
        .filter_map(|kind| kind.value(cli).map(|value| (*kind, value)))
        .collect()
}

/// Runs every selected handler in priority order, saving after each one that
/// touches the state. The first failure stops the run.
pub(crate) fn dispatch(session: &mut Session<'_>, cli: &Cli) -> Result<()> {
    for (kind, value) in selected_options(cli) {
        debug!("dispatching {} ({value:?})", kind.flag());
        let handler = kind.handler();
        handler(session, value, cli)?;
        if kind.mutates_state() {
            session.store.save()?;
        }
    }
    Ok(())
}
