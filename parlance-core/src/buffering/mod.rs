//! Sample staging buffers owned by a single session task.
//!
//! `SampleRing` is the bounded-memory staging layer of the streaming
//! pipeline: the audio ring holds the rolling utterance window, the chunk
//! ring holds the sub-frame remainder between transport payloads. Both are
//! exclusively owned by one ingestion task, so no internal locking exists.

pub mod chunk;
pub mod ring;

pub use chunk::AudioChunk;
pub use ring::SampleRing;
