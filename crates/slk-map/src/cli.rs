use clap::{Args, Parser, Subcommand, ValueEnum};
use slk_batch::ClientConfig;
use slk_geom::CarriagewaySide;
use std::path::PathBuf;

/// Environment variable consulted when `--endpoint` is not given
pub const ENDPOINT_ENV: &str = "SLK_MAP_ENDPOINT";

/// Generic function to get environment variable, parsing it to the desired type.
pub fn get_env<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|s| s.parse().ok())
}

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// SLK Map - Georeference road ranges by straight line kilometre and lay out SLK tick marks
pub struct Cli {
    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Georeference a JSON list of queries in one batch request and print GeoJSON
    Fetch(FetchArgs),
    /// Place SLK tick marks along a pixel-space polyline and print them as JSON
    Ticks(TickArgs),
}

#[derive(Args, Debug, Clone)]
pub struct FetchArgs {
    /// JSON array of {road, slk_from, slk_to, offset?, cwy?} objects
    #[clap(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// Batch endpoint URL [default: $SLK_MAP_ENDPOINT, then the public service]
    #[clap(long)]
    pub endpoint: Option<String>,

    /// Multiplier applied to every query offset (e.g. -1 to flip sides)
    #[clap(long, default_value = "1.0", allow_negative_numbers = true)]
    pub offset_multiplier: f64,

    /// Give up on the request after this many seconds
    #[clap(long)]
    pub timeout_secs: Option<u64>,

    /// Write GeoJSON here instead of stdout
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

impl FetchArgs {
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::default();
        if let Some(endpoint) = self
            .endpoint
            .clone()
            .or_else(|| get_env::<String>(ENDPOINT_ENV))
        {
            config.endpoint = endpoint;
        }
        config.timeout_secs = self.timeout_secs;
        config
    }
}

#[derive(Args, Debug, Clone)]
pub struct TickArgs {
    /// JSON array of [x, y] pixel coordinates
    #[clap(short, long, value_name = "FILE")]
    pub input: PathBuf,

    /// SLK at the first point of the polyline
    #[clap(long, allow_negative_numbers = true)]
    pub slk_from: f64,

    /// SLK at the last point of the polyline
    #[clap(long, allow_negative_numbers = true)]
    pub slk_to: f64,

    /// Map units per pixel; selects the tick spacing
    #[clap(short, long, default_value = "1.0")]
    pub resolution: f64,

    /// Canvas width in pixels; ticks outside the canvas are dropped
    #[clap(long)]
    pub width: Option<f64>,

    /// Canvas height in pixels
    #[clap(long)]
    pub height: Option<f64>,

    /// Carriageway the line belongs to; right carriageways get no labels
    #[clap(long, value_enum)]
    pub carriageway: Option<SideArg>,

    /// Offset the polyline this many pixels to the left before placing ticks
    #[clap(long, default_value = "0.0", allow_negative_numbers = true)]
    pub offset_px: f64,

    /// Write JSON here instead of stdout
    #[clap(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideArg {
    Left,
    Right,
    Single,
}

impl From<SideArg> for CarriagewaySide {
    fn from(side: SideArg) -> Self {
        match side {
            SideArg::Left => CarriagewaySide::Left,
            SideArg::Right => CarriagewaySide::Right,
            SideArg::Single => CarriagewaySide::Single,
        }
    }
}
