use std::collections::BTreeSet;
use std::net::IpAddr;
use std::path::PathBuf;

use anyhow::{anyhow, bail, Context};
use bitfrost_core::{
    ArtNetOutput, Axis, ConfigError, ConfigManager, GridPainter, LightingPatch, LineOutcome,
    NetworkConfig, PixelEffect, PixelEffectType, Settings,
};
use bitfrost_fixtures::{Color, Coordinate, FixtureLibrary};
use clap::Parser;

/// Drive an LED pixel grid over Art-Net with a built-in test pattern.
#[derive(Parser, Debug)]
#[command(name = "bitfrost")]
#[command(about = "Art-Net LED grid driver")]
struct Args {
    /// Configuration file, created with defaults if missing (default: config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Art-Net destination IP address
    #[arg(long, value_parser = parse_ip)]
    dest_ip: Option<IpAddr>,

    /// Art-Net port
    #[arg(long)]
    port: Option<u16>,

    /// Broadcast instead of unicasting to the destination
    #[arg(long)]
    broadcast: bool,

    /// Pixels per row
    #[arg(long)]
    width: Option<u32>,

    /// Number of rows
    #[arg(long)]
    height: Option<u32>,

    /// DMX address of the first pixel
    #[arg(long)]
    start_address: Option<u32>,

    /// Fixture library id or profile name (RGB, GRB, RGBW)
    #[arg(long)]
    profile: Option<String>,

    /// JSON file with extra fixture definitions
    #[arg(long)]
    library: Option<PathBuf>,

    /// Pattern colour as #rrggbb
    #[arg(long, value_parser = parse_color, default_value = "#ffffff")]
    color: Color,

    /// Test pattern: solid or chase
    #[arg(long, default_value = "solid")]
    pattern: PixelEffectType,

    /// Frames per second, overrides the configured refresh interval
    #[arg(long)]
    fps: Option<f64>,
}

impl Args {
    fn apply(&self, settings: &mut Settings) {
        if let Some(ip) = self.dest_ip {
            settings.destination_ip = ip.to_string();
        }
        if let Some(port) = self.port {
            settings.artnet_port = port;
        }
        if self.broadcast {
            settings.broadcast = true;
        }
        if let Some(width) = self.width {
            settings.grid_width = width;
        }
        if let Some(height) = self.height {
            settings.grid_height = height;
        }
        if let Some(address) = self.start_address {
            settings.start_address = address;
        }
        if let Some(profile) = &self.profile {
            settings.fixture_profile = profile.clone();
        }
        if let Some(fps) = self.fps {
            // Out-of-range results are caught by validation
            settings.refresh_interval_ms = (1000.0 / fps).round() as u64;
        }
    }
}

fn parse_ip(s: &str) -> Result<IpAddr, String> {
    s.parse().map_err(|e| format!("Invalid IP address: {}", e))
}

fn parse_color(s: &str) -> Result<Color, String> {
    Color::from_hex(s).ok_or_else(|| format!("Invalid colour '{}', expected #rrggbb", s))
}

fn load_library(path: Option<&PathBuf>) -> anyhow::Result<FixtureLibrary> {
    let Some(path) = path else {
        return Ok(FixtureLibrary::new());
    };
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read fixture library {}", path.display()))?;
    let library = FixtureLibrary::from_json(&json)?;
    log::info!("Loaded {} fixture definitions", library.definitions.len());
    Ok(library)
}

/// Patch one horizontal line per row, rows packed back to back from `start_address`.
fn patch_grid(
    patch: &LightingPatch,
    settings: &Settings,
    library: &FixtureLibrary,
) -> anyhow::Result<()> {
    let profile = library.profile(&settings.fixture_profile).ok_or_else(|| {
        anyhow!(
            "Unknown fixture profile '{}'. Available: {}",
            settings.fixture_profile,
            library.ids().join(", ")
        )
    })?;

    let row_channels = settings.grid_width * profile.channel_count() as u32;
    let mut address = settings.start_address;
    for y in 0..settings.grid_height {
        let origin = Coordinate::new(0, y as i32);
        match patch.add_line(
            origin,
            Axis::Horizontal,
            address,
            settings.grid_width as usize,
            profile,
        )? {
            LineOutcome::Added(count) => {
                log::debug!("Patched row {} ({} fixtures) at address {}", y, count, address)
            }
            LineOutcome::RolledBack { failed_at, cause } => {
                bail!("Row {} failed at fixture {}: {}", y, failed_at, cause)
            }
        }
        address = address
            .checked_add(row_channels)
            .ok_or_else(|| anyhow!("Grid does not fit in the DMX address space"))?;
    }

    log::info!(
        "Patched {}x{} {} grid: {} fixtures, {} channels, {} layout",
        settings.grid_width,
        settings.grid_height,
        profile.kind(),
        patch.total_fixtures(),
        patch.total_channels(),
        patch.layout().as_str()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mut config_manager = ConfigManager::new(args.config.clone());
    let mut settings = config_manager.load()?;
    args.apply(&mut settings);
    ConfigManager::validate_settings(&settings).map_err(ConfigError::Validation)?;

    let library = load_library(args.library.as_ref())?;
    let patch = LightingPatch::with_layout(settings.universe_layout);
    patch_grid(&patch, &settings, &library)?;

    let network_config = NetworkConfig::from_settings(&settings)?;
    log::info!(
        "Art-Net mode: {}, destination: {}, port: {}",
        network_config.get_mode_string(),
        network_config.get_destination(),
        network_config.port
    );

    let universes: BTreeSet<u16> = (0..settings.universe_count)
        .chain(patch.universes())
        .collect();
    let mut output = ArtNetOutput::bind(&network_config, universes, settings.max_universe).await?;
    output.attach(&patch);
    output.start(settings.refresh_interval())?;

    let painter = GridPainter::new(&patch, settings.grid_width, settings.grid_height);
    let effect = PixelEffect::new(args.pattern, args.color);
    log::info!(
        "Running {} pattern in {}. Press Ctrl-C to stop.",
        effect.effect_type.as_str(),
        effect.color
    );

    let mut ticker = tokio::time::interval(settings.refresh_interval());
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    let mut step: u64 = 0;
    loop {
        tokio::select! {
            result = &mut shutdown => {
                if let Err(e) = result {
                    log::error!("Failed to listen for Ctrl-C: {}", e);
                }
                break;
            }
            _ = ticker.tick() => {
                effect.render(&painter, step);
                patch.publish();
                step = step.wrapping_add(1);
            }
        }
    }

    log::info!("Shutting down...");
    patch.clear_sinks();
    output.close();

    let status = output.status();
    for universe in output.universes() {
        if let Some(status) = status.get(&universe) {
            log::info!(
                "Universe {}: {} frames sent, {} send failures",
                universe,
                status["frames_sent"],
                status["send_failures"]
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_overrides_settings() {
        let args = Args::parse_from([
            "bitfrost",
            "--dest-ip",
            "10.0.0.7",
            "--width",
            "8",
            "--fps",
            "50",
            "--pattern",
            "chase",
        ]);
        assert_eq!(args.pattern, PixelEffectType::Chase);
        assert_eq!(args.color, Color::new(255, 255, 255));

        let mut settings = Settings::default();
        args.apply(&mut settings);
        assert_eq!(settings.destination_ip, "10.0.0.7");
        assert_eq!(settings.grid_width, 8);
        assert_eq!(settings.refresh_interval_ms, 20);
        assert_eq!(settings.grid_height, Settings::default().grid_height);
    }

    #[test]
    fn test_patch_grid_packs_rows() {
        let mut settings = Settings::default();
        settings.grid_width = 4;
        settings.grid_height = 2;
        settings.fixture_profile = "ws2811-grb".to_string();

        let patch = LightingPatch::new();
        patch_grid(&patch, &settings, &FixtureLibrary::new()).unwrap();

        assert_eq!(patch.total_fixtures(), 8);
        assert_eq!(patch.lookup(13), Ok(Coordinate::new(0, 1)));
    }

    #[test]
    fn test_patch_grid_unknown_profile() {
        let mut settings = Settings::default();
        settings.fixture_profile = "moving-head".to_string();

        let patch = LightingPatch::new();
        assert!(patch_grid(&patch, &settings, &FixtureLibrary::new()).is_err());
        assert_eq!(patch.total_fixtures(), 0);
    }
}
