//! Pooled scratch objects used while decoding an envelope.

use flate2::{Decompress, FlushDecompress, Status};

use crate::pool::{Pool, Reset};

/// Buffers that grew past this capacity are shrunk before re-entering the pool.
pub const MAX_RETAINED_BUFFER: usize = 64 * 1024;

/// Initial capacity of a freshly built scratch buffer.
const INITIAL_BUFFER: usize = 4 * 1024;

/// Output growth step while inflating.
const INFLATE_CHUNK: usize = 4 * 1024;

/// How an inflate pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Inflated {
    /// The deflate stream reached its end marker.
    Complete,
    /// Input ran out or turned corrupt before the end marker.
    Truncated,
}

/// Raw DEFLATE (RFC 1951) stream decoder, reusable across requests.
pub struct Inflater {
    inner: Decompress,
}

impl Inflater {
    pub fn new() -> Self {
        Self {
            inner: Decompress::new(false),
        }
    }

    /// Inflate `input` into `out`, which must not grow past `limit` bytes.
    ///
    /// Returns `Err(limit)` when the cap is exceeded. Corrupt or short input
    /// is not an error: whatever was produced before the fault stays in
    /// `out` and the pass reports [`Inflated::Truncated`].
    pub fn inflate(&mut self, input: &[u8], out: &mut Vec<u8>, limit: usize) -> Result<Inflated, usize> {
        self.inner.reset(false);
        loop {
            let room = (limit + 1).saturating_sub(out.len()).min(INFLATE_CHUNK);
            out.reserve(room);

            let in_before = self.inner.total_in();
            let out_before = self.inner.total_out();
            let consumed = in_before as usize;
            let status = match self.inner.decompress_vec(
                &input[consumed.min(input.len())..],
                out,
                FlushDecompress::Finish,
            ) {
                Ok(status) => status,
                Err(e) => {
                    tracing::debug!(error = %e, produced = out.len(), "Header block stream corrupt");
                    return Ok(Inflated::Truncated);
                }
            };

            if out.len() > limit {
                return Err(limit);
            }

            match status {
                Status::StreamEnd => return Ok(Inflated::Complete),
                Status::Ok | Status::BufError => {
                    let stalled = self.inner.total_in() == in_before
                        && self.inner.total_out() == out_before;
                    if stalled {
                        return Ok(Inflated::Truncated);
                    }
                }
            }
        }
    }
}

impl Default for Inflater {
    fn default() -> Self {
        Self::new()
    }
}

impl Reset for Inflater {
    fn reset(&mut self) {
        self.inner.reset(false);
    }
}

fn new_buffer() -> Vec<u8> {
    Vec::with_capacity(INITIAL_BUFFER)
}

/// The process-wide scratch pools shared by all in-flight requests.
#[derive(Debug)]
pub struct ScratchPools {
    pub inflaters: Pool<Inflater>,
    pub buffers: Pool<Vec<u8>>,
}

impl ScratchPools {
    pub fn new(max_idle: usize) -> Self {
        Self {
            inflaters: Pool::new(Inflater::new, max_idle),
            buffers: Pool::new(new_buffer, max_idle),
        }
    }
}
