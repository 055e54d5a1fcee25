//! Chunk codec: text to fixed-width integers and back
//!
//! Content is stored as a sequence of 128-bit cells. Each cell packs up to
//! [`CHUNK_BYTES`] bytes big-endian; the final window is right-padded with
//! zero bytes when shorter than a full chunk.
//!
//! Padding is removed once, from the end of the fully reassembled buffer,
//! so zero bytes inside the content survive. Content that itself ends in
//! NUL bytes loses them on the way back: `decode(encode("a\0"))` is `"a"`.

use crate::error::DecodeError;

/// One 16-byte window of content packed big-endian
pub type Chunk = u128;

/// Number of content bytes carried by one chunk
pub const CHUNK_BYTES: usize = 16;

/// Number of chunks needed for `byte_len` bytes of content
pub fn chunk_count(byte_len: usize) -> usize {
    byte_len.div_ceil(CHUNK_BYTES)
}

/// Encode text as an ordered chunk sequence
///
/// Empty input yields an empty sequence.
pub fn encode(text: &str) -> Vec<Chunk> {
    encode_bytes(text.as_bytes())
}

/// Encode raw bytes as an ordered chunk sequence
pub fn encode_bytes(bytes: &[u8]) -> Vec<Chunk> {
    bytes
        .chunks(CHUNK_BYTES)
        .map(|window| {
            let mut cell = [0u8; CHUNK_BYTES];
            cell[..window.len()].copy_from_slice(window);
            Chunk::from_be_bytes(cell)
        })
        .collect()
}

/// Unpack chunks into bytes, stripping trailing zero bytes from the whole buffer
pub fn decode_bytes(chunks: &[Chunk]) -> Vec<u8> {
    let mut bytes: Vec<u8> = chunks.iter().flat_map(|c| c.to_be_bytes()).collect();
    let end = bytes.iter().rposition(|&b| b != 0).map_or(0, |i| i + 1);
    bytes.truncate(end);
    bytes
}

/// Decode a chunk sequence back into text
pub fn decode(chunks: &[Chunk]) -> Result<String, DecodeError> {
    Ok(String::from_utf8(decode_bytes(chunks))?)
}
