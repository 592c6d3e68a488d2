//! Track sources for jam - manifest, fetching, decoding, and buffer loading

mod config;
mod decoder;
mod fetch;
mod loader;
mod track;

pub use config::Config;
pub use decoder::{DecodedBuffer, LoadError, TrackDecoder, MIN_DURATION_SECS};
pub use fetch::{ByteFetcher, FetchError, SourceFetcher, StaticFetcher};
pub use loader::{BufferMap, TrackBufferLoader};
pub use track::{JamManifest, LoopDescriptor, LoopId, ManifestError, TrackDescriptor, TrackId};
