pub mod frame;
pub mod message;

pub use frame::{FrameDecoder, FrameError, Packet, PacketType, MAX_PACKET_SIZE};
pub use message::{
    HandshakeAckSys, HandshakeRequest, HandshakeResponse, HandshakeSys, Message, MessageError,
    MessageType, HEARTBEAT_INTERVAL_SECS,
};
