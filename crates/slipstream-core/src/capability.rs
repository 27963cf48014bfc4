// crates/slipstream-core/src/capability.rs
//
// The seams where external collaborators plug in. The engine specifies the
// byte layer, the codec and the frame consumer as traits and owns nothing
// about their internals — a demuxer, an OS decode session or a filter graph
// all live behind these.

use std::sync::Arc;

use crate::error::Result;
use crate::helpers::time::TimeBase;
use crate::media_types::{Frame, Packet, PixelFormat};
use crate::options::MediaOptions;

// ── Source ────────────────────────────────────────────────────────────────────

/// The byte layer: pulls compressed packets and seeks by canonical
/// microseconds. Seeking is allowed to land on a keyframe before (or, for
/// forward-only sources, after) the target; the decode-side fixup rules
/// absorb either outcome.
pub trait Source: Send {
    /// Next packet in stream order. `Err(TryAgain)` is a valid retryable
    /// condition; `Err(Eof)` is the normal end.
    fn pull_packet(&mut self) -> Result<Packet>;

    /// Reposition so the next pulled packet decodes toward `ts` (canonical
    /// microseconds).
    fn seek(&mut self, ts: i64) -> Result<()>;

    /// Time base of the pts values on pulled packets.
    fn time_base(&self) -> TimeBase;

    /// Total stream duration in canonical microseconds, if known.
    fn duration(&self) -> Option<i64> {
        None
    }

    /// Coded picture size, if known ahead of decode.
    fn dimensions(&self) -> Option<(u32, u32)> {
        None
    }
}

// ── Decoder ───────────────────────────────────────────────────────────────────

/// The slice of `MediaOptions` a decoder implementation gets to see at init.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecoderOptions {
    pub sw_pix_fmt:       PixelFormat,
    pub vt_pix_fmt:       PixelFormat,
    pub autorotate:       bool,
    pub export_mvs:       bool,
    pub use_pkt_duration: bool,
    pub max_pixels:       Option<u32>,
}

impl DecoderOptions {
    pub fn from_media(opts: &MediaOptions) -> Self {
        DecoderOptions {
            sw_pix_fmt:       opts.sw_pix_fmt,
            vt_pix_fmt:       opts.vt_pix_fmt,
            autorotate:       opts.autorotate,
            export_mvs:       opts.export_mvs,
            use_pkt_duration: opts.use_pkt_duration,
            max_pixels:       opts.max_pixels,
        }
    }
}

/// Where decoders deliver their output.
///
/// `queue_frame(Some(frame))` hands over one decoded frame, `ts` still in the
/// decoder's stream time base; `queue_frame(None)` signals end-of-stream for
/// the current segment and returns `Err(Eof)`. Implementations may call this
/// from any thread — hardware sessions fire completions on pool threads the
/// engine does not own — and the call may block on downstream back-pressure.
pub trait FrameSink: Send + Sync {
    fn queue_frame(&self, frame: Option<Frame>) -> Result<()>;
}

/// The codec capability.
///
/// Lifecycle: `init` once with the sink the decoder keeps for its whole
/// life, then any number of `push_packet`/`flush` calls. Teardown is `Drop`.
pub trait Decoder: Send {
    fn init(&mut self, sink: Arc<dyn FrameSink>, opts: &DecoderOptions) -> Result<()>;

    /// Submit one packet. `None` is a drain request: the decoder emits
    /// everything it still holds (ending with `queue_frame(None)`) and
    /// returns `Err(Eof)` once nothing is left.
    fn push_packet(&mut self, pkt: Option<&Packet>) -> Result<()>;

    /// Synchronous drain without teardown, used when a seek crosses the
    /// decoder. Pending output is emitted or dropped; either way the decoder
    /// is ready for pre-roll packets afterwards.
    fn flush(&mut self) -> Result<()>;
}
