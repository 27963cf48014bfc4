// crates/slipstream-media/src/lib.rs
//
// The playback engine: bounded queues, buffer governor, reorder buffer, the
// three pipeline workers (reader → decoder → filterer), the controller that
// owns them, the hardware-decoder adapter and the client-facing get-frame
// adapter. All public API that embedders call lives in `media`.

pub mod control;
pub mod decode;
pub mod filter;
pub mod governor;
pub mod hwdec;
pub mod media;
pub mod queue;
pub mod reader;
pub mod reorder;

pub use control::{AsyncController, Backend, SessionParts};
pub use filter::{FilterConfig, FrameFilter, ScaleFilter};
pub use governor::BufferGovernor;
pub use hwdec::{Completion, HwDecoder, HwDecoderConfig, HwOutput, HwSession};
pub use media::{Context, Media};
pub use queue::{FrameQueue, Msg, MsgQueue, PacketQueue};
pub use reorder::ReorderBuffer;

pub use slipstream_core::{
    secs_to_ts, ts_to_secs, Decoder, DecoderOptions, Error, Frame, FrameData, FrameSink, HwBuffer,
    MediaInfo, MediaOptions, OptValue, Packet, PixelFormat, Result, Source, StreamSelect, TimeBase,
};
