//! Art-Net OpDmx framing.
//!
//! Send-only: nothing in this crate parses incoming Art-Net traffic.

use crate::error::PacketError;

/// Number of channels in one DMX512 universe.
pub const DMX_CHANNELS: usize = 512;

/// Default Art-Net UDP port.
pub const ARTNET_PORT: u16 = 6454;

pub const HEADER_LEN: usize = 18;

const ARTNET_ID: &[u8; 8] = b"Art-Net\0";
const OP_DMX: u16 = 0x5000;
const PROTOCOL_VERSION: u16 = 14;

/// One universe worth of channel values. Index 0 is DMX channel 1.
pub type DmxFrame = [u8; DMX_CHANNELS];

/// Build an ArtDmx packet carrying `data` for `universe`.
///
/// Only the low byte of `universe` is written (SubUni); Net is always 0. The caller owns the
/// sequence counter.
pub fn encode(data: &[u8], universe: u16, sequence: u8) -> Result<Vec<u8>, PacketError> {
    if data.len() > DMX_CHANNELS {
        return Err(PacketError::PayloadTooLarge(data.len()));
    }

    let mut packet = Vec::with_capacity(HEADER_LEN + data.len());

    packet.extend_from_slice(ARTNET_ID);
    // OpCode is little-endian, protocol version big-endian
    packet.extend_from_slice(&OP_DMX.to_le_bytes());
    packet.extend_from_slice(&PROTOCOL_VERSION.to_be_bytes());
    packet.push(sequence);
    packet.push(0); // Physical
    packet.push((universe & 0xFF) as u8); // SubUni
    packet.push(0); // Net
    packet.extend_from_slice(&(data.len() as u16).to_be_bytes());
    packet.extend_from_slice(data);

    Ok(packet)
}
