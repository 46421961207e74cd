mod process;
mod streamlink;

pub(crate) use streamlink::*;

use anyhow::Result;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Probe {
    Available {
        title: Option<String>,
        qualities: Vec<String>,
    },
    Unavailable(String),
}

impl Probe {
    pub(crate) fn is_available(&self) -> bool {
        matches!(self, Probe::Available { .. })
    }
}

/// Seam between the handlers and the external streaming tool.
pub(crate) trait StreamClient {
    /// Plays `url` on the terminal; `Ok(false)` means the player failed or was interrupted.
    fn play(&self, url: &str, quality: &str) -> Result<bool>;

    fn probe(&self, url: &str) -> Result<Probe>;

    /// Fails when the tool cannot be found.
    fn ensure_installed(&self) -> Result<()>;

    fn describe(&self) -> String;
}
