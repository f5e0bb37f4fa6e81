pub mod decoder;
pub mod engine;
pub mod pcm;
pub mod resampler;
pub mod sink;
pub mod source;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use decoder::{DecodeSession, StreamDecoder, SymphoniaDecoder};
pub use engine::{EngineHandle, EngineStats, PlaybackEngine, PlaybackState};
pub use pcm::SampleSpec;
pub use resampler::LinearResampler;
pub use sink::{AudioSink, CpalSinkFactory, SinkFactory};
pub use source::{AssetSource, SeekOrigin, SeekableByteSource};
pub use store::{AudioAsset, TrackStore};
