//! Client<->server frame protocol:
//!
//! ```text
//! byte  0     : PacketType
//! bytes 1..3  : body length, big-endian 24-bit unsigned
//! bytes 4..N  : body (opaque per type)
//! ```
//!
//! WebSocket binary frames carry exactly one [`Packet`]; a TCP transport
//! would need to reassemble across reads, which is why [`FrameDecoder`] is
//! stateful and accepts partial buffers rather than assuming one full frame
//! per call.

use bytes::{Buf, BufMut, BytesMut};
use thiserror::Error;

/// Largest body a single packet may carry. 24-bit length field tops out at
/// 16MiB; we cap well below that to bound per-connection memory.
pub const MAX_PACKET_SIZE: usize = 64 * 1024;

const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketType {
    Handshake,
    HandshakeAck,
    Heartbeat,
    Data,
    Kick,
}

impl PacketType {
    fn from_byte(b: u8) -> Result<Self, FrameError> {
        match b {
            0x01 => Ok(Self::Handshake),
            0x02 => Ok(Self::HandshakeAck),
            0x03 => Ok(Self::Heartbeat),
            0x04 => Ok(Self::Data),
            0x05 => Ok(Self::Kick),
            other => Err(FrameError::UnknownType(other)),
        }
    }

    fn to_byte(self) -> u8 {
        match self {
            Self::Handshake => 0x01,
            Self::HandshakeAck => 0x02,
            Self::Heartbeat => 0x03,
            Self::Data => 0x04,
            Self::Kick => 0x05,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub kind: PacketType,
    pub body: Vec<u8>,
}

impl Packet {
    pub fn new(kind: PacketType, body: Vec<u8>) -> Result<Self, FrameError> {
        if body.len() > MAX_PACKET_SIZE {
            return Err(FrameError::TooLarge(body.len()));
        }
        Ok(Self { kind, body })
    }

    pub fn encode(&self) -> Result<BytesMut, FrameError> {
        if self.body.len() > MAX_PACKET_SIZE {
            return Err(FrameError::TooLarge(self.body.len()));
        }
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.body.len());
        buf.put_u8(self.kind.to_byte());
        let len = self.body.len() as u32;
        buf.put_u8(((len >> 16) & 0xff) as u8);
        buf.put_u8(((len >> 8) & 0xff) as u8);
        buf.put_u8((len & 0xff) as u8);
        buf.put_slice(&self.body);
        Ok(buf)
    }

    /// Decodes exactly one packet from a buffer known to hold one complete
    /// frame, e.g. a websocket binary message.
    pub fn decode_one(buf: &[u8]) -> Result<Self, FrameError> {
        let mut decoder = FrameDecoder::new();
        decoder.feed(buf);
        match decoder.next_packet()? {
            Some(packet) => Ok(packet),
            None => Err(FrameError::Incomplete),
        }
    }
}

#[derive(Debug, Error)]
pub enum FrameError {
    #[error("unknown packet type byte {0:#x}")]
    UnknownType(u8),
    #[error("body length {0} exceeds MaxPacketSize ({MAX_PACKET_SIZE})")]
    TooLarge(usize),
    #[error("buffer does not contain a complete frame")]
    Incomplete,
}

/// Reassembles packets from a byte stream. Safe to reuse across reads: a
/// call to [`feed`] followed by repeated [`next_packet`] drains whatever
/// complete frames are currently buffered and leaves a partial tail intact
/// for the next feed.
#[derive(Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.put_slice(bytes);
    }

    /// Rejects an oversized length prefix immediately without waiting for
    /// the rest of the frame to arrive.
    pub fn next_packet(&mut self) -> Result<Option<Packet>, FrameError> {
        if self.buf.len() < HEADER_LEN {
            return Ok(None);
        }

        let type_byte = self.buf[0];
        let len = ((self.buf[1] as usize) << 16) | ((self.buf[2] as usize) << 8) | self.buf[3] as usize;

        if len > MAX_PACKET_SIZE {
            return Err(FrameError::TooLarge(len));
        }

        if self.buf.len() < HEADER_LEN + len {
            return Ok(None);
        }

        let kind = PacketType::from_byte(type_byte)?;
        self.buf.advance(HEADER_LEN);
        let body = self.buf.split_to(len).to_vec();
        Ok(Some(Packet { kind, body }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_for_all_sizes_up_to_max() {
        for len in [0usize, 1, 3, 255, 4096, MAX_PACKET_SIZE] {
            let body = vec![0xabu8; len];
            let packet = Packet::new(PacketType::Data, body.clone()).unwrap();
            let encoded = packet.encode().unwrap();

            let mut decoder = FrameDecoder::new();
            decoder.feed(&encoded);
            let decoded = decoder.next_packet().unwrap().unwrap();

            assert_eq!(decoded.kind, PacketType::Data);
            assert_eq!(decoded.body, body);
        }
    }

    #[test]
    fn rejects_length_over_max_packet_size_without_state_change() {
        let mut decoder = FrameDecoder::new();
        let mut header = vec![PacketType::Handshake.to_byte()];
        let oversized = MAX_PACKET_SIZE + 1;
        header.push(((oversized >> 16) & 0xff) as u8);
        header.push(((oversized >> 8) & 0xff) as u8);
        header.push((oversized & 0xff) as u8);
        decoder.feed(&header);

        let err = decoder.next_packet().unwrap_err();
        assert!(matches!(err, FrameError::TooLarge(n) if n == oversized));
    }

    #[test]
    fn reassembles_across_partial_feeds() {
        let packet = Packet::new(PacketType::Heartbeat, b"ping".to_vec()).unwrap();
        let encoded = packet.encode().unwrap();

        let mut decoder = FrameDecoder::new();
        decoder.feed(&encoded[..2]);
        assert!(decoder.next_packet().unwrap().is_none());

        decoder.feed(&encoded[2..]);
        let decoded = decoder.next_packet().unwrap().unwrap();
        assert_eq!(decoded.body, b"ping");
    }

    #[test]
    fn unknown_type_byte_is_rejected() {
        let mut decoder = FrameDecoder::new();
        decoder.feed(&[0xff, 0, 0, 0]);
        assert!(matches!(
            decoder.next_packet().unwrap_err(),
            FrameError::UnknownType(0xff)
        ));
    }
}
