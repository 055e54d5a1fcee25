//! Content reassembly from decrypted values

use anonpoetry_core::{
    Chunk, DecodeError, Handle, HandleValueMap, MissingHandleError, PoetryResult, codec,
};

/// Look up `ordered` handles in submission order
pub fn collect_chunks(ordered: &[Handle], values: &HandleValueMap) -> Result<Vec<Chunk>, MissingHandleError> {
    ordered
        .iter()
        .enumerate()
        .map(|(position, handle)| {
            values
                .get(handle)
                .copied()
                .ok_or(MissingHandleError {
                    handle: *handle,
                    position,
                })
        })
        .collect()
}

/// Rebuild text from its ordered chunk handles
pub fn reassemble_text(ordered: &[Handle], values: &HandleValueMap) -> PoetryResult<String> {
    let chunks = collect_chunks(ordered, values)?;
    Ok(codec::decode(&chunks)?)
}

/// Project a single 32-bit counter
pub fn reassemble_count(handle: &Handle, values: &HandleValueMap) -> PoetryResult<u32> {
    let value = values.get(handle).copied().ok_or(MissingHandleError {
        handle: *handle,
        position: 0,
    })?;
    Ok(u32::try_from(value).map_err(|_| DecodeError::CounterOverflow(value))?)
}
