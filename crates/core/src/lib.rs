pub use artnet::network_config::{ArtNetDestination, ArtNetMode, NetworkConfig};
pub use artnet::output::ArtNetOutput;
pub use artnet::packet::{DmxFrame, ARTNET_PORT, DMX_CHANNELS};
pub use artnet::transmitter::{
    Transmitter, TransmitterState, DEFAULT_MAX_UNIVERSE, DEFAULT_REFRESH_INTERVAL,
};
pub use bitfrost_fixtures::{
    ChannelType, Color, Coordinate, FixtureDefinition, FixtureLibrary, FixtureProfile,
    ProfileKind,
};
pub use config::{
    ConfigError, ConfigFile, ConfigManager, ConfigOption, ConfigSchema, OutputConfigSchema,
    PatchConfigSchema, Settings,
};
pub use error::{PacketError, PatchError, TransmitError};
pub use patch::{
    Axis, Fixture, FixtureId, FrameSink, GridPainter, LightingPatch, LineOutcome, UniverseLayout,
};
pub use pixel::{PixelEffect, PixelEffectType};

pub mod artnet;
mod config;
mod error;
pub mod patch;
pub mod pixel;
