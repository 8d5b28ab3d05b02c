//! Length-prefixed wire framing (spec.md §4.5): `4-byte BE length || envelope`.
//!
//! Grounded on `lib-protocols/src/wire/mod.rs`'s `read_framed_message` /
//! `write_framed_message`: the length is checked against a cap before the
//! payload buffer is allocated, so a hostile or corrupt prefix can't be used
//! to force an oversized allocation.

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::error::{Result, TransportError};

pub const DEFAULT_MAX_FRAME_BYTES: u32 = 16 * 1024 * 1024;

pub async fn read_frame<R: AsyncReadExt + Unpin>(reader: &mut R, max_frame_bytes: u32) -> Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_be_bytes(len_buf);
    if len > max_frame_bytes {
        return Err(TransportError::FrameTooLarge { len, max: max_frame_bytes });
    }
    let mut payload = vec![0u8; len as usize];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

pub async fn write_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, payload: &[u8], max_frame_bytes: u32) -> Result<()> {
    let len = payload.len() as u32;
    if len > max_frame_bytes {
        return Err(TransportError::FrameTooLarge { len, max: max_frame_bytes });
    }
    writer.write_all(&len.to_be_bytes()).await?;
    writer.write_all(payload).await?;
    writer.flush().await?;
    Ok(())
}
