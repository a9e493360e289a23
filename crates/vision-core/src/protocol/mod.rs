//! Protocol module containing message types, the JSON codec, and
//! correlation-id allocation.

pub mod codec;
pub mod messages;
pub mod sequence;

pub use codec::{decode_frame, encode_request, ProtocolError};
pub use messages::*;
pub use sequence::MessageIdCounter;
