//! Whole-buffer validation

use tracing::debug;
use zbsec_api::{Error, Result, WireError};

use crate::codec::TlvCursor;
use crate::tags::{self, RESERVED_SENTINEL};

/// Validate every TLV of a received buffer before any of them is used
///
/// - an empty buffer yields `NotFound`
/// - a header or payload running past the end, a tag at or above the
///   reserved sentinel, a known tag with the wrong payload length or a
///   second copy of a non-repeatable tag yields `InvalidFormat`
///
/// Unknown tags inside the assigned range are accepted and skipped.
pub fn general_processing(buffer: &[u8]) -> Result<()> {
    if buffer.is_empty() {
        return Err(WireError::NotFound(RESERVED_SENTINEL).into());
    }

    let mut seen = [false; RESERVED_SENTINEL as usize];
    let mut cursor = TlvCursor::new(buffer);
    loop {
        let view = match cursor.read_next() {
            Ok(Some(view)) => view,
            Ok(None) => return Ok(()),
            Err(Error::Wire(WireError::MalformedTlv {
                tag,
                declared,
                remaining,
            })) => {
                debug!(tag, declared, remaining, "TLV runs past the buffer end");
                return Err(WireError::InvalidFormat("TLV length exceeds buffer").into());
            }
            Err(e) => return Err(e),
        };

        if tags::classify(view.tag).is_none() {
            debug!(tag = view.tag, "TLV tag outside the assigned range");
            return Err(WireError::InvalidFormat("reserved TLV tag").into());
        }
        if !tags::length_rule(view.tag).accepts(view.payload.len()) {
            debug!(tag = view.tag, len = view.payload.len(), "TLV has the wrong length");
            return Err(WireError::InvalidFormat("TLV payload length").into());
        }
        let slot = &mut seen[view.tag as usize];
        if *slot && !tags::is_repeatable(view.tag) {
            debug!(tag = view.tag, "duplicate TLV");
            return Err(WireError::InvalidFormat("duplicate TLV").into());
        }
        *slot = true;
    }
}
