/*!
Length-prefixed framing over an ordered byte stream.

Every message on a connection, during the handshake and after
establishment, is one frame: a 4-byte big-endian payload length followed
by exactly that many payload bytes. The codec is payload-format-agnostic
and delivers frames all-or-nothing, in arrival order, regardless of how
the input is fragmented or coalesced.
*/

use byteorder::{BigEndian, ByteOrder};
use bytes::{Buf, BytesMut};

use crate::constants::sizes::frame::LENGTH_PREFIX;
use crate::error::{Error, Result};

/// Encode a payload as one frame: 4-byte big-endian length, then payload.
///
/// # Panics
///
/// Panics if the payload length does not fit the u32 length prefix;
/// truncating it would emit a frame the peer cannot reconcile.
pub fn encode_frame(payload: &[u8]) -> Vec<u8> {
    let declared = declared_length(payload.len());
    let mut frame = Vec::with_capacity(LENGTH_PREFIX + payload.len());
    let mut prefix = [0u8; LENGTH_PREFIX];
    BigEndian::write_u32(&mut prefix, declared);
    frame.extend_from_slice(&prefix);
    frame.extend_from_slice(payload);
    frame
}

fn declared_length(payload_len: usize) -> u32 {
    assert!(
        payload_len <= u32::MAX as usize,
        "frame payload length {} exceeds the u32 length prefix",
        payload_len
    );
    payload_len as u32
}

/// Incremental frame decoder.
///
/// Input chunks accumulate in an internal buffer; complete frames are
/// extracted as soon as their declared length's worth of bytes is
/// present. A declared length above `max_frame_size` is rejected before
/// any payload is buffered for it.
#[derive(Debug)]
pub struct FrameDecoder {
    buffer: BytesMut,
    max_frame_size: usize,
}

impl FrameDecoder {
    /// Create a decoder enforcing the given maximum payload length.
    pub fn new(max_frame_size: usize) -> Self {
        Self {
            buffer: BytesMut::new(),
            max_frame_size,
        }
    }

    /// Append raw bytes from the transport.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Extract the next complete frame, if one is buffered.
    ///
    /// Returns `Ok(None)` when more input is needed. Returns an error if
    /// the declared length exceeds the configured maximum; the decoder
    /// must not be used again after that.
    pub fn next_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if self.buffer.len() < LENGTH_PREFIX {
            return Ok(None);
        }

        let declared = BigEndian::read_u32(&self.buffer[..LENGTH_PREFIX]) as usize;
        if declared > self.max_frame_size {
            return Err(Error::Protocol(format!(
                "declared frame length {} exceeds maximum {}",
                declared, self.max_frame_size
            )));
        }

        if self.buffer.len() < LENGTH_PREFIX + declared {
            return Ok(None);
        }

        self.buffer.advance(LENGTH_PREFIX);
        let payload = self.buffer.split_to(declared).to_vec();
        Ok(Some(payload))
    }

    /// Append bytes and deliver every frame they complete, in order.
    pub fn feed<F>(&mut self, bytes: &[u8], mut on_frame: F) -> Result<()>
    where
        F: FnMut(Vec<u8>),
    {
        self.extend(bytes);
        while let Some(payload) = self.next_frame()? {
            on_frame(payload);
        }
        Ok(())
    }

    /// Number of bytes currently buffered but not yet delivered.
    pub fn pending_bytes(&self) -> usize {
        self.buffer.len()
    }
}
