//! # Fixed-Length Frame Scanner
//!
//! Locates a fixed-length RTU frame inside a raw capture by prefix match and CRC check.
//!
//! A raw capture may start with stale or noisy bytes, so every offset is tried in order.
//! A prefix hit with a bad CRC does not stop the scan: noise can produce one accidental
//! prefix match before the real frame.

use super::crc::{frame_crc, MIN_VERIFIABLE_LEN};
use crate::error::{Rs485Error, Result};

/// An offset whose bytes start with the expected prefix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    /// Offset of the candidate inside the capture
    pub index: usize,
    /// CRC computed over the candidate body
    pub calculated: u16,
    /// CRC carried in the candidate's trailing two bytes
    pub received: u16,
}

impl Candidate {
    /// Whether the candidate's CRC checks out
    pub fn is_valid(&self) -> bool {
        self.calculated == self.received
    }
}

/// Reject extraction requests that can never succeed
///
/// # Errors
///
/// Returns `InvalidFrameRequest` if:
/// - `prefix` is empty
/// - `expected_len` is shorter than the prefix or too short to carry a CRC
/// - the output buffer cannot hold `expected_len` bytes
///
/// A capture shorter than `expected_len` is not checked here: it simply
/// yields no candidates.
pub fn check_frame_request(
    prefix: &[u8],
    expected_len: usize,
    out_len: usize,
) -> Result<()> {
    if prefix.is_empty() {
        return Err(Rs485Error::InvalidFrameRequest(
            "prefix cannot be empty".to_string(),
        ));
    }

    if expected_len < prefix.len() || expected_len < MIN_VERIFIABLE_LEN {
        return Err(Rs485Error::InvalidFrameRequest(format!(
            "expected length {} too short for prefix of {} bytes plus CRC",
            expected_len,
            prefix.len()
        )));
    }

    if out_len < expected_len {
        return Err(Rs485Error::InvalidFrameRequest(format!(
            "output buffer holds {} bytes, frame needs {}",
            out_len, expected_len
        )));
    }

    Ok(())
}

/// Iterate every prefix match in `capture`, lowest offset first
///
/// Only offsets with room for a full `expected_len` frame are considered.
pub fn prefix_candidates<'a>(
    capture: &'a [u8],
    prefix: &'a [u8],
    expected_len: usize,
) -> impl Iterator<Item = Candidate> + 'a {
    let windows = if expected_len == 0 { None } else { Some(capture.windows(expected_len)) };

    windows
        .into_iter()
        .flatten()
        .enumerate()
        .filter(move |(_, window)| window.starts_with(prefix))
        .filter_map(|(index, window)| {
            frame_crc(window).map(|(calculated, received)| Candidate {
                index,
                calculated,
                received,
            })
        })
}

/// Offset of the first CRC-valid frame, if any
pub fn find_frame(capture: &[u8], prefix: &[u8], expected_len: usize) -> Option<usize> {
    prefix_candidates(capture, prefix, expected_len)
        .find(Candidate::is_valid)
        .map(|candidate| candidate.index)
}
