use bitfrost_fixtures::Coordinate;
use thiserror::Error;

/// Structural errors returned by the lighting patch.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatchError {
    #[error("Fixture already patched at {0}")]
    DuplicateCoordinate(Coordinate),

    #[error("DMX channel {channel} is already in use by the fixture at {owner}")]
    DuplicateChannel { channel: u32, owner: Coordinate },

    #[error("No fixture at {0}")]
    FixtureNotFound(Coordinate),

    #[error("DMX channel {0} is not assigned")]
    ChannelNotFound(u32),

    #[error("Invalid DMX start address {0}")]
    InvalidAddress(u32),

    #[error("Failed to roll back line: {0}")]
    RollbackFailed(Box<PatchError>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PacketError {
    #[error("DMX payload of {0} bytes exceeds 512 bytes")]
    PayloadTooLarge(usize),
}

#[derive(Debug, Error)]
pub enum TransmitError {
    #[error("DMX payload of {0} bytes exceeds 512 bytes")]
    PayloadTooLarge(usize),

    #[error("Universe {universe} is outside 0..={max}")]
    InvalidUniverse { universe: u16, max: u16 },

    #[error("Art-Net send failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("No Art-Net destination configured for universe {0}")]
    NoDestination(u16),

    #[error("Transmitter is closed")]
    Closed,

    #[error("Transmitter must be started from within a tokio runtime")]
    NoRuntime,
}

impl From<PacketError> for TransmitError {
    fn from(err: PacketError) -> Self {
        match err {
            PacketError::PayloadTooLarge(len) => TransmitError::PayloadTooLarge(len),
        }
    }
}
