// crates/slipstream-core/src/lib.rs
//
// Plain data shared across the slipstream crates: frames, packets, time
// conversions, options, errors and the capability traits the engine consumes.
// No threads, no queues — just types.

pub mod capability;
pub mod error;
pub mod media_types;
pub mod options;
pub mod helpers;

pub use error::{Error, Result};
pub use media_types::{Frame, FrameData, HwBuffer, MediaInfo, Packet, PixelFormat};
pub use options::{MediaOptions, OptValue, StreamSelect};
pub use capability::{Decoder, DecoderOptions, FrameSink, Source};
pub use helpers::time::{secs_to_ts, ts_to_secs, TimeBase, TIME_BASE};
