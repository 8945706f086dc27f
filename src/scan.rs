//! Signature pattern compilation and chunked memory scanning.
//!
//! A signature is a byte sequence with wildcard positions, written either
//! IDA-style (`"48 8B ?? 05"`) or as a byte slice plus a code-style mask
//! (`"xx?x"`). Scanning walks an address range in fixed-size chunks, pulling
//! each chunk through a read callback so the same scanner runs against a
//! live process or an in-memory buffer.

use tracing::trace;

use crate::error::{Error, Result};
use crate::types::Addr;

/// Default chunk size for remote scans. One read per 64 KiB keeps the
/// syscall count low without large transient buffers.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// A compiled signature: parallel byte values and match flags.
///
/// Immutable after construction and cheap to clone; compile once, scan many
/// times.
#[derive(Debug, Clone)]
pub struct Pattern {
    bytes: Vec<u8>,
    mask: Vec<bool>,
}

impl Pattern {
    /// Compile an IDA-style signature: whitespace-separated two-digit hex
    /// bytes with `?` or `??` wildcards, e.g. `"DE AD ?? EF"`.
    pub fn parse(signature: &str) -> Result<Pattern> {
        let mut bytes = Vec::new();
        let mut mask = Vec::new();
        for token in signature.split_whitespace() {
            if token == "?" || token == "??" {
                bytes.push(0);
                mask.push(false);
            } else {
                let b = u8::from_str_radix(token, 16)
                    .map_err(|_| Error::Pattern(format!("invalid hex byte '{}'", token)))?;
                bytes.push(b);
                mask.push(true);
            }
        }
        if bytes.is_empty() {
            return Err(Error::Pattern("empty signature".into()));
        }
        Ok(Pattern { bytes, mask })
    }

    /// Compile from a raw byte sequence and a code-style mask where `x`
    /// requires an exact match and `?` is a wildcard, e.g.
    /// `with_mask(&[0xDE, 0xAD, 0, 0xEF], "xx?x")`.
    ///
    /// Rejected outright when the mask length differs from the byte count;
    /// a mismatched pair must never reach a scan.
    pub fn with_mask(bytes: &[u8], mask: &str) -> Result<Pattern> {
        if bytes.is_empty() {
            return Err(Error::Pattern("empty signature".into()));
        }
        if bytes.len() != mask.len() {
            return Err(Error::Pattern(format!(
                "mask length {} does not match byte count {}",
                mask.len(),
                bytes.len()
            )));
        }
        let mut flags = Vec::with_capacity(mask.len());
        for c in mask.chars() {
            match c {
                'x' | 'X' => flags.push(true),
                '?' => flags.push(false),
                other => {
                    return Err(Error::Pattern(format!("invalid mask character '{}'", other)))
                }
            }
        }
        Ok(Pattern {
            bytes: bytes.to_vec(),
            mask: flags,
        })
    }

    /// Number of tokens in the signature. Always at least one.
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    /// Test the pattern against the start of `window`.
    /// `window` must hold at least `self.len()` bytes.
    fn matches(&self, window: &[u8]) -> bool {
        self.bytes
            .iter()
            .zip(&self.mask)
            .zip(window)
            .all(|((&pat, &must), &byte)| !must || pat == byte)
    }
}

/// Half-open address range `[start, end)` to scan.
#[derive(Debug, Clone, Copy)]
pub struct Region {
    pub start: Addr,
    pub end: Addr,
}

impl Region {
    /// Build a region, rejecting inverted bounds.
    pub fn new(start: Addr, end: Addr) -> Result<Region> {
        if start > end {
            return Err(Error::Process(format!(
                "inverted scan region {}..{}",
                start, end
            )));
        }
        Ok(Region { start, end })
    }

    pub fn len(&self) -> u64 {
        self.end.get() - self.start.get()
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }
}

/// Whether a scan stops at the first hit or collects every hit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanMode {
    First,
    All,
}

/// Scan `region` for `pattern`, fetching memory through `read`.
///
/// The region is walked in `chunk_size` pieces. Each fetch is extended by
/// `pattern.len() - 1` trailing bytes so a match straddling two chunks is
/// still seen in full; candidate start offsets stay within the chunk proper,
/// so every address is owned by exactly one chunk and nothing is reported
/// twice. A chunk whose read fails is skipped — executable images routinely
/// interleave with unreadable guard regions, and one bad page must not kill
/// the whole scan.
///
/// Matches are confined to the region: a hit whose tail would extend past
/// `region.end` is not reported. An empty region yields no matches and
/// performs no reads. Results are in ascending address order.
pub fn scan_range<F>(
    region: Region,
    pattern: &Pattern,
    mode: ScanMode,
    chunk_size: usize,
    mut read: F,
) -> Vec<Addr>
where
    F: FnMut(Addr, usize) -> Result<Vec<u8>>,
{
    let plen = pattern.len();
    let total = region.len();
    let mut hits = Vec::new();
    if total < plen as u64 {
        return hits;
    }
    let chunk_size = chunk_size.max(1) as u64;

    let mut chunk_start = 0u64;
    while chunk_start < total {
        let chunk_len = chunk_size.min(total - chunk_start);
        // Trailing overlap: the lookback window for the next chunk's
        // leading edge, capped at the region end.
        let want = (chunk_len + plen as u64 - 1).min(total - chunk_start);
        let base = region.start + chunk_start;

        let data = match read(base, want as usize) {
            Ok(d) => d,
            Err(err) => {
                trace!(chunk = %base, len = want, %err, "skipping unreadable chunk");
                chunk_start += chunk_size;
                continue;
            }
        };

        let usable = data.len().min(want as usize);
        for i in 0..chunk_len as usize {
            if i + plen > usable {
                break;
            }
            if pattern.matches(&data[i..i + plen]) {
                hits.push(base + i as u64);
                if mode == ScanMode::First {
                    return hits;
                }
            }
        }

        chunk_start += chunk_size;
    }
    hits
}
