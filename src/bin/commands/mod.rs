pub mod artists;
pub mod markets;
pub mod output;
pub mod probe;
pub mod stations;
pub mod tracks;

use chrono::NaiveDate;
use clap::Subcommand;
use cm_spins::{CancellationState, ChartmetricClient, RunConfig};

/// Shared state for every subcommand.
pub struct RunContext {
    pub client: ChartmetricClient,
    pub config: RunConfig,
    pub cancel: CancellationState,
    pub json: bool,
}

impl RunContext {
    pub fn artist_or_default(&self, artist: Option<u64>) -> u64 {
        artist.unwrap_or(self.config.artist_id)
    }

    pub fn since_or_default(&self, since: Option<NaiveDate>) -> NaiveDate {
        since.unwrap_or(self.config.since)
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// Collect an artist's tracks and sum their SiriusXM streams
    ///
    /// Pages through the track listing until it is exhausted, then reports
    /// totals for the latest, weekly and monthly windows and the top tracks.
    ///
    /// Usage examples:
    /// # Airbag, top 10 tracks
    /// cm-spins tracks --artist 127473 --top 10
    ///
    /// # Smaller pages, stop after 3 pages
    /// cm-spins tracks --page-size 50 --max-pages 3
    Tracks {
        /// Chartmetric artist ID (defaults to ARTIST_ID)
        #[arg(long)]
        artist: Option<u64>,

        /// Number of top tracks to show
        #[arg(long, default_value = "10")]
        top: usize,

        /// Records per page
        #[arg(long, default_value = "100")]
        page_size: u32,

        /// Stop after this many pages
        #[arg(long, default_value = "500")]
        max_pages: u32,
    },

    /// Per-station airplay totals, split into SiriusXM and other stations
    ///
    /// Usage examples:
    /// cm-spins stations --artist 550716 --since 2024-01-01
    Stations {
        /// Chartmetric artist ID (defaults to ARTIST_ID)
        #[arg(long)]
        artist: Option<u64>,

        /// Lower date bound, YYYY-MM-DD (defaults to SINCE)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// Maximum number of stations to request
        #[arg(long)]
        limit: Option<u32>,
    },

    /// Broadcast market counts for one country
    ///
    /// Usage examples:
    /// cm-spins markets --artist 127473 --country US
    Markets {
        /// Chartmetric artist ID (defaults to ARTIST_ID)
        #[arg(long)]
        artist: Option<u64>,

        /// Lower date bound, YYYY-MM-DD (defaults to SINCE)
        #[arg(long)]
        since: Option<NaiveDate>,

        /// ISO country code
        #[arg(long, default_value = "US")]
        country: String,
    },

    /// Compare SiriusXM streams across several artists
    ///
    /// Artists are given as ID or ID=NAME. Without arguments the sample
    /// artists (Duki, Airbag, Nicki Nicole) are used. Up to CONCURRENCY
    /// artists are collected at once; output keeps the argument order.
    ///
    /// Usage examples:
    /// cm-spins artists
    /// cm-spins artists 550716=Duki 1417553="Nicki Nicole" --top 3
    Artists {
        /// Artists as ID or ID=NAME
        artists: Vec<String>,

        /// Number of top tracks to show per artist
        #[arg(long, default_value = "5")]
        top: usize,
    },

    /// Try the known candidate endpoints and report what each returns
    ///
    /// Usage examples:
    /// cm-spins probe --artist 127473
    Probe {
        /// Chartmetric artist ID (defaults to ARTIST_ID)
        #[arg(long)]
        artist: Option<u64>,
    },
}

pub async fn execute_command(
    command: Commands,
    context: &RunContext,
) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Commands::Tracks {
            artist,
            top,
            page_size,
            max_pages,
        } => {
            tracks::handle_tracks(context, context.artist_or_default(artist), top, page_size, max_pages)
                .await
        }
        Commands::Stations {
            artist,
            since,
            limit,
        } => {
            stations::handle_stations(
                context,
                context.artist_or_default(artist),
                context.since_or_default(since),
                limit,
            )
            .await
        }
        Commands::Markets {
            artist,
            since,
            country,
        } => {
            markets::handle_markets(
                context,
                context.artist_or_default(artist),
                context.since_or_default(since),
                &country,
            )
            .await
        }
        Commands::Artists { artists, top } => artists::handle_artists(context, &artists, top).await,
        Commands::Probe { artist } => {
            probe::handle_probe(context, context.artist_or_default(artist)).await
        }
    }
}
