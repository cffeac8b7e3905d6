//! Wire framing for `Message` values sent between transports: a 1-byte
//! format version, a 4-byte big-endian length, then a JSON body. Replaces
//! the original's `pickle`-based framing (arbitrary code execution on
//! deserialization) and the teacher's raw length-prefixed TCP reads with an
//! explicit, versioned, safely-decodable format (§4.13).

use crate::message::Message;

/// Bumped if the body encoding ever changes incompatibly.
pub const WIRE_VERSION: u8 = 1;

const VERSION_LEN: usize = 1;
const LENGTH_LEN: usize = 4;
pub const HEADER_LEN: usize = VERSION_LEN + LENGTH_LEN;

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("unsupported wire version {0}, expected {WIRE_VERSION}")]
    UnsupportedVersion(u8),
    #[error("frame body failed to deserialize: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Encode a message as a standalone frame: version byte, length, body.
pub fn encode_frame(message: &Message) -> Result<Vec<u8>, serde_json::Error> {
    let body = serde_json::to_vec(message)?;
    let mut frame = Vec::with_capacity(HEADER_LEN + body.len());
    frame.push(WIRE_VERSION);
    frame.extend_from_slice(&(body.len() as u32).to_be_bytes());
    frame.extend_from_slice(&body);
    Ok(frame)
}

/// Decode a frame's header, returning the declared body length. Callers
/// read exactly `HEADER_LEN` bytes first, pass them here, then read the
/// returned number of body bytes and hand them to `decode_body`.
pub fn decode_header(header: &[u8; HEADER_LEN]) -> Result<u32, WireError> {
    let version = header[0];
    if version != WIRE_VERSION {
        return Err(WireError::UnsupportedVersion(version));
    }
    let mut len_bytes = [0u8; LENGTH_LEN];
    len_bytes.copy_from_slice(&header[VERSION_LEN..]);
    Ok(u32::from_be_bytes(len_bytes))
}

pub fn decode_body(body: &[u8]) -> Result<Message, WireError> {
    Ok(serde_json::from_slice(body)?)
}
