use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Reference point for a seek request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekOrigin {
    Start,
    Current,
    End,
}

/// Random-access byte stream a decode session pulls from
///
/// Reads past the end return 0 and seeks are clamped into `[0, len]`, so none of
/// these operations can fail.
pub trait SeekableByteSource: Send + Sync {
    /// Copy up to `buf.len()` bytes and advance the cursor by the amount copied
    fn read(&mut self, buf: &mut [u8]) -> usize;

    /// Move the cursor relative to `origin`, clamped into `[0, len]`; returns the new position
    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> u64;

    /// Current cursor position
    fn tell(&self) -> u64;

    /// Reset the cursor to the start of the stream
    fn rewind(&mut self) {
        self.seek(0, SeekOrigin::Start);
    }
}

/// Clamp `base + offset` into `[0, size]`
pub fn clamp_seek(base: u64, offset: i64, size: u64) -> u64 {
    let target = base as i128 + offset as i128;
    target.clamp(0, size as i128) as u64
}

/// Byte source over an in-memory asset buffer
///
/// The cursor is shared with the owning [`AudioAsset`](super::store::AudioAsset), so
/// its position stays observable after the source has been handed to a decoder.
#[derive(Debug, Clone)]
pub struct AssetSource {
    data: Arc<[u8]>,
    position: Arc<AtomicUsize>,
}

impl AssetSource {
    pub(crate) fn new(data: Arc<[u8]>, position: Arc<AtomicUsize>) -> Self {
        Self { data, position }
    }

    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }
}

impl SeekableByteSource for AssetSource {
    fn read(&mut self, buf: &mut [u8]) -> usize {
        let position = self.position.load(Ordering::Relaxed).min(self.data.len());
        let to_read = buf.len().min(self.data.len() - position);

        if to_read > 0 {
            buf[..to_read].copy_from_slice(&self.data[position..position + to_read]);
            self.position.store(position + to_read, Ordering::Relaxed);
        }

        to_read
    }

    fn seek(&mut self, offset: i64, origin: SeekOrigin) -> u64 {
        let size = self.size();
        let base = match origin {
            SeekOrigin::Start => 0,
            SeekOrigin::Current => self.tell(),
            SeekOrigin::End => size,
        };
        let target = clamp_seek(base, offset, size);
        self.position.store(target as usize, Ordering::Relaxed);
        target
    }

    fn tell(&self) -> u64 {
        self.position.load(Ordering::Relaxed) as u64
    }
}
