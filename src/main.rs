use anyhow::Result;
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;

mod client;
mod config;
mod models;
mod playlist;

#[cfg(test)]
mod playlist_tests;

use crate::client::JellyfinClient;
use crate::config::load_config;
use crate::playlist::{CuratedPlaylist, CurationConfig, PlaylistCurator};

#[derive(Parser)]
#[command(name = "daily-playlist")]
#[command(about = "Curates a daily fixed-length playlist on a Jellyfin server")]
#[command(version)]
struct Args {
    /// Optional JSON file overriding the curation constants
    #[arg(short = 'c', long = "config")]
    config_file: Option<String>,

    /// Enable debug mode - print playlist details to stdout instead of uploading
    #[arg(short = 'd', long = "debug")]
    debug: bool,

    /// Quiet mode - reduce output verbosity
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Seed for the random draws, for reproducible playlists
    #[arg(short = 's', long = "seed", env = "PLAYLIST_SEED")]
    seed: Option<u64>,

    /// Target length in hours (overrides PLAYLIST_LENGTH)
    #[arg(long = "hours")]
    hours: Option<f64>,

    /// Playlist name (overrides PLAYLIST_NAME)
    #[arg(short = 'n', long = "name")]
    name: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = if args.quiet { "warn" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_level))
        .init();

    // Load server configuration from .env
    let config = load_config()?;

    let curation = match &args.config_file {
        Some(path) => {
            log::info!("Loading curation settings from {path}");
            CurationConfig::load_from_file(path)?
        }
        None => CurationConfig::default(),
    };
    let curation = config.apply_overrides(curation, args.hours);

    let playlist_name = args.name.clone().unwrap_or_else(|| config.playlist_name.clone());

    log::info!("Connecting to {}", config.server_url);
    let client = JellyfinClient::connect(&config)?;

    let mut rng = match args.seed {
        Some(seed) => {
            log::info!("Using random seed {seed}");
            StdRng::seed_from_u64(seed)
        }
        None => StdRng::from_entropy(),
    };

    let curator = PlaylistCurator::new(curation);
    let playlist = curator.curate(&client, &mut rng)?;
    log_report(&playlist);

    if playlist.tracks.is_empty() {
        log::warn!("No tracks selected - skipping playlist creation.");
        return Err(anyhow::anyhow!("Playlist '{}' would be empty", playlist_name));
    }

    if args.debug {
        print_playlist(&playlist_name, &playlist);
        return Ok(());
    }

    match client.create_playlist(&playlist_name, &playlist.track_ids()) {
        Ok(playlist_id) => {
            println!(
                "✓ Successfully created playlist '{}' with ID: {}",
                playlist_name, playlist_id
            );
            Ok(())
        }
        Err(e) => {
            eprintln!("✗ Failed to create playlist '{}': {}", playlist_name, e);
            Err(e)
        }
    }
}

fn log_report(playlist: &CuratedPlaylist) {
    let report = &playlist.report;
    log::info!(
        "Pool: {} candidates, {} after dedupe, {} skipped in head, {} stuffed, {} trimmed",
        report.pool_size,
        report.deduped_size,
        report.skipped_in_head,
        report.stuffed,
        report.trimmed
    );
    if report.used_fallback_ranking {
        log::info!("Shortlist ranked without listen activity");
    }
    if !report.degradations.is_empty() {
        log::debug!("{} degradations during curation", report.degradations.len());
    }
}

/// Debug mode listing, one line per track
fn print_playlist(name: &str, playlist: &CuratedPlaylist) {
    let total = playlist.total_duration_secs() as u64;
    println!("\n🔍 DEBUG MODE: Playlist '{}' (would create via API)", name);
    println!(
        "   Tracks: {} | Duration: {}h{:02}m",
        playlist.tracks.len(),
        total / 3600,
        (total % 3600) / 60
    );

    for (i, track) in playlist.tracks.iter().enumerate() {
        let favorite = if track.is_favorite { " ★" } else { "" };
        let duration = track.duration_secs as u64;
        let artist = track.album_artist.as_deref().unwrap_or("Unknown");
        let genres = if track.genres.is_empty() {
            String::new()
        } else {
            format!(" | {}", track.genres.join(", "))
        };
        println!(
            "     {}. \"{}\" by {}{} ({}x) {}:{:02}{}",
            i + 1,
            track.name,
            artist,
            favorite,
            track.play_count,
            duration / 60,
            duration % 60,
            genres
        );
        println!("        ID: {}", track.id);
    }
}
