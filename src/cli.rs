use clap::Parser;

#[derive(Debug, Default, Parser)]
#[command(
    name = "crly",
    version = concat!("v", env!("CARGO_PKG_VERSION")),
    about = "Track and watch episodic shows through streamlink",
    arg_required_else_help = true,
    disable_version_flag = true
)]
pub struct Cli {
    /// Select a show
    #[arg(short, long, value_name = "name")]
    pub show: Option<String>,

    /// Select an episode (default: oldest ep)
    #[arg(short, long, value_name = "number")]
    pub episode: Option<String>,

    /// Set the video quality (default: "best")
    #[arg(short, long, value_name = "quality")]
    pub quality: Option<String>,

    /// Play the selected episode
    #[arg(short, long)]
    pub play: bool,

    /// Autoplay episodes (default: false)
    #[arg(short, long)]
    pub autoplay: bool,

    /// Select the next episode
    #[arg(short, long)]
    pub next: bool,

    /// Print information about the show
    #[arg(short, long)]
    pub info: bool,

    /// Begin tracking a show
    #[arg(short, long)]
    pub track: bool,

    /// Check tracked shows for updates
    #[arg(short, long)]
    pub updates: bool,

    /// Print debug information
    #[arg(short, long)]
    pub debug: bool,

    /// Print the current version
    #[arg(short = 'v', long, action = clap::ArgAction::Version)]
    pub version: Option<bool>,
}
