//! Reading and writing single TLVs

use zbsec_api::{Result, WireError};

/// Tag byte plus length byte
pub const TLV_HEADER_SIZE: usize = 2;

/// Largest payload a one-byte length can describe
pub const TLV_MAX_PAYLOAD: usize = u8::MAX as usize;

/// Borrowed view of one TLV inside a buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TlvView<'a> {
    /// Tag byte
    pub tag: u8,
    /// Payload bytes
    pub payload: &'a [u8],
    /// Offset of the header within the scanned buffer
    pub offset: usize,
}

impl TlvView<'_> {
    /// Encoded size including the header
    pub fn encoded_len(&self) -> usize {
        TLV_HEADER_SIZE + self.payload.len()
    }
}

/// Append one TLV to `buffer`
///
/// Fails with `InvalidFormat` when the payload does not fit the one-byte
/// length; the buffer is left untouched in that case.
pub fn write_tlv(buffer: &mut Vec<u8>, tag: u8, payload: &[u8]) -> Result<()> {
    let len = u8::try_from(payload.len())
        .map_err(|_| WireError::InvalidFormat("TLV payload longer than 255 bytes"))?;
    buffer.reserve(TLV_HEADER_SIZE + payload.len());
    buffer.push(tag);
    buffer.push(len);
    buffer.extend_from_slice(payload);
    Ok(())
}

/// Forward-only reader over a TLV buffer
#[derive(Debug, Clone)]
pub struct TlvCursor<'a> {
    buffer: &'a [u8],
    position: usize,
}

impl<'a> TlvCursor<'a> {
    /// Start at the beginning of `buffer`
    pub fn new(buffer: &'a [u8]) -> Self {
        TlvCursor {
            buffer,
            position: 0,
        }
    }

    /// Offset of the next header
    pub fn position(&self) -> usize {
        self.position
    }

    /// Bytes not yet consumed
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.position
    }

    /// True once every byte has been consumed
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Read the next TLV and advance past it
    ///
    /// Returns `Ok(None)` at the end of the buffer. A header cut short is
    /// reported as `MalformedTlv` with the header size as the declared
    /// length; a payload running past the end reports the declared payload
    /// length. The cursor does not move on error.
    pub fn read_next(&mut self) -> Result<Option<TlvView<'a>>> {
        let buffer: &'a [u8] = self.buffer;
        let rest = &buffer[self.position..];
        let (tag, declared) = match rest {
            [] => return Ok(None),
            [tag] => {
                return Err(WireError::MalformedTlv {
                    tag: *tag,
                    declared: TLV_HEADER_SIZE,
                    remaining: 1,
                }
                .into())
            }
            [tag, len, ..] => (*tag, *len as usize),
        };
        let body = &rest[TLV_HEADER_SIZE..];
        if declared > body.len() {
            return Err(WireError::MalformedTlv {
                tag,
                declared,
                remaining: body.len(),
            }
            .into());
        }
        let view = TlvView {
            tag,
            payload: &body[..declared],
            offset: self.position,
        };
        self.position += TLV_HEADER_SIZE + declared;
        Ok(Some(view))
    }
}

impl<'a> Iterator for TlvCursor<'a> {
    type Item = Result<TlvView<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.read_next() {
            Ok(Some(view)) => Some(Ok(view)),
            Ok(None) => None,
            Err(e) => {
                // stop after the first error
                self.position = self.buffer.len();
                Some(Err(e))
            }
        }
    }
}

/// First TLV with `tag`, scanning without modifying the buffer
///
/// Scanning stops at the first malformed header, so a TLV located after
/// corrupt bytes is never returned.
pub fn find_tlv(tag: u8, buffer: &[u8]) -> Option<TlvView<'_>> {
    TlvCursor::new(buffer)
        .map_while(|item| item.ok())
        .find(|view| view.tag == tag)
}
