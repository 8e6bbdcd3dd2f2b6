//! Chunked upload body that reports progress as chunks are handed to the transport.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::models::UploadProgress;

/// Callback receiving upload progress. Runs inline with I/O, so it must be quick.
pub type ProgressCallback = Arc<dyn Fn(UploadProgress) + Send + Sync>;

/// Open while the owning call is unresolved. Once closed, progress
/// callbacks for that call are dropped even if the transport keeps
/// polling the body.
#[derive(Debug, Clone)]
pub(crate) struct ProgressGate {
    open: Arc<AtomicBool>,
}

impl ProgressGate {
    pub(crate) fn new() -> Self {
        Self {
            open: Arc::new(AtomicBool::new(true)),
        }
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    pub(crate) fn close(&self) {
        self.open.store(false, Ordering::SeqCst);
    }

    /// Guard closing the gate when dropped, covering every exit path.
    pub(crate) fn close_on_drop(&self) -> GateGuard {
        GateGuard { gate: self.clone() }
    }
}

pub(crate) struct GateGuard {
    gate: ProgressGate,
}

impl Drop for GateGuard {
    fn drop(&mut self) {
        self.gate.close();
    }
}

/// Split a payload into zero-copy chunks of at most `chunk_size` bytes.
fn split_chunks(data: Bytes, chunk_size: usize) -> Vec<Bytes> {
    let chunk_size = chunk_size.max(1);
    let mut chunks = Vec::with_capacity(data.len().div_ceil(chunk_size));
    let mut start = 0;
    while start < data.len() {
        let end = (start + chunk_size).min(data.len());
        chunks.push(data.slice(start..end));
        start = end;
    }
    chunks
}

/// Build a body stream over `data` that reports progress per chunk.
///
/// `loaded` is non-decreasing and `total` constant across events. An empty
/// payload yields no chunks and no events.
pub(crate) fn progress_stream(
    data: Bytes,
    chunk_size: usize,
    callback: Option<ProgressCallback>,
    gate: ProgressGate,
) -> impl Stream<Item = Result<Bytes, std::io::Error>> + Send + 'static {
    let total = data.len() as u64;
    let mut loaded: u64 = 0;

    stream::iter(split_chunks(data, chunk_size)).map(move |chunk| {
        loaded += chunk.len() as u64;
        if let Some(callback) = &callback {
            if gate.is_open() {
                callback(UploadProgress::new(loaded, total));
            }
        }
        Ok(chunk)
    })
}
