mod dispatch;
mod episode;
mod handlers;
mod lock;
mod stream;


use std::io::{self, Write};
use std::path::PathBuf;

use anyhow::Result;
use log::debug;

use crate::cli::Cli;
use crate::paths::{base_url, state_file_path};
use crate::store::Store;

use self::dispatch::{dispatch, selected_options};
use self::handlers::Session;
use self::lock::{ExitGuard, ensure_not_locked};
use self::stream::{StreamClient, Streamlink};

pub fn run(cli: Cli) -> Result<()> {
    let state_path = state_file_path()?;
    let client = Streamlink::from_env();
    let mut stdout = io::stdout();
    run_with_client(&cli, state_path, &client, base_url(), &mut stdout)
}

pub(crate) fn run_with_client<'a>(
    cli: &Cli,
    state_path: PathBuf,
    client: &'a dyn StreamClient,
    base_url: String,
    out: &'a mut dyn Write,
) -> Result<()> {
    let mut store = Store::open(&state_path)?;
    let pid = std::process::id();
    debug!("state file {} (pid {pid})", state_path.display());

    // Declared before the session so it drops last, after every save.
    let _exit_guard = ExitGuard::new(state_path, pid);

    let options = selected_options(cli);
    if options.iter().any(|(kind, _)| kind.mutates_state()) {
        ensure_not_locked(&mut store, pid)?;
    }
    if options.iter().any(|(kind, _)| kind.needs_stream_client()) {
        client.ensure_installed()?;
    }

    let mut session = Session {
        store,
        client,
        base_url,
        pid,
        out,
    };
    dispatch(&mut session, cli)
}
