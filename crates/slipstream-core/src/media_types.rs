// crates/slipstream-core/src/media_types.rs
//
// Types that flow through the pipeline queues and out to the client.
// No locks, no queues — just plain data with ownership semantics:
// a Packet moves from reader to decoder and dies on submission; a Frame is
// Arc-shared so the client adapter can cache one for re-delivery.

use std::fmt;
use std::sync::Arc;

// ── Packet ────────────────────────────────────────────────────────────────────

/// One opaque compressed payload pulled from the source.
///
/// `pts` and `duration` are in the source stream's own time base; the decode
/// dispatch rescales to canonical microseconds when frames come back out.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub data:     Box<[u8]>,
    pub pts:      i64,
    pub duration: Option<i64>,
    pub keyframe: bool,
}

impl Packet {
    pub fn new(data: impl Into<Box<[u8]>>, pts: i64) -> Self {
        Packet { data: data.into(), pts, duration: None, keyframe: false }
    }

    pub fn with_duration(mut self, duration: i64) -> Self {
        self.duration = Some(duration);
        self
    }

    pub fn key(mut self) -> Self {
        self.keyframe = true;
        self
    }
}

// ── Pixel formats ─────────────────────────────────────────────────────────────

/// The small set of formats the engine needs to name. `Auto` lets the
/// decoder pick; opaque hardware surfaces carry `HwSurface`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PixelFormat {
    #[default]
    Auto,
    Rgba,
    Bgra,
    Yuv420p,
    Nv12,
    HwSurface,
}

impl PixelFormat {
    /// Parse the option-string spelling. Unknown names are rejected by the
    /// option layer, not mapped to Auto.
    pub fn from_name(name: &str) -> Option<PixelFormat> {
        match name {
            "auto"    => Some(PixelFormat::Auto),
            "rgba"    => Some(PixelFormat::Rgba),
            "bgra"    => Some(PixelFormat::Bgra),
            "yuv420p" => Some(PixelFormat::Yuv420p),
            "nv12"    => Some(PixelFormat::Nv12),
            _         => None,
        }
    }

    /// Bytes per pixel for packed single-plane formats, None for planar or
    /// opaque payloads.
    pub fn packed_bpp(&self) -> Option<usize> {
        match self {
            PixelFormat::Rgba | PixelFormat::Bgra => Some(4),
            _ => None,
        }
    }
}

// ── Hardware buffer handle ────────────────────────────────────────────────────

/// An opaque hardware-decoded buffer.
///
/// The release hook runs exactly once, when the last `Arc` clone drops — that
/// is where the platform surface goes back to its pool and where the
/// buffer-count governor gets its credit back.
pub struct HwBuffer {
    id:      u64,
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl HwBuffer {
    pub fn new(id: u64, release: impl FnOnce() + Send + Sync + 'static) -> Self {
        HwBuffer { id, release: Some(Box::new(release)) }
    }

    /// A handle with no release hook, for sessions whose buffers need no
    /// explicit return.
    pub fn untracked(id: u64) -> Self {
        HwBuffer { id, release: None }
    }

    pub fn id(&self) -> u64 {
        self.id
    }
}

impl Drop for HwBuffer {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for HwBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HwBuffer").field("id", &self.id).finish()
    }
}

// ── Frame ─────────────────────────────────────────────────────────────────────

/// Frame payload: packed software pixel bytes, or an opaque hardware handle.
#[derive(Debug, Clone)]
pub enum FrameData {
    Software(Arc<[u8]>),
    Hardware(Arc<HwBuffer>),
}

/// A decoded frame.
///
/// `ts` is in the decoder's stream time base when a decoder emits it and in
/// canonical microseconds everywhere downstream of the decode dispatch, which
/// rescales exactly once.
#[derive(Debug, Clone)]
pub struct Frame {
    pub data:     FrameData,
    pub width:    u32,
    pub height:   u32,
    pub format:   PixelFormat,
    pub ts:       i64,
    pub duration: Option<i64>,
}

impl Frame {
    pub fn software(data: Vec<u8>, width: u32, height: u32, format: PixelFormat, ts: i64) -> Self {
        Frame {
            data: FrameData::Software(Arc::from(data)),
            width,
            height,
            format,
            ts,
            duration: None,
        }
    }

    pub fn hardware(buffer: HwBuffer, width: u32, height: u32, ts: i64) -> Self {
        Frame {
            data: FrameData::Hardware(Arc::new(buffer)),
            width,
            height,
            format: PixelFormat::HwSurface,
            ts,
            duration: None,
        }
    }
}

// ── Probe info ────────────────────────────────────────────────────────────────

/// What the source knows about itself, surfaced through `Media::info`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaInfo {
    /// Total duration in canonical microseconds, if the source knows it.
    pub duration: Option<i64>,
    pub width:    u32,
    pub height:   u32,
}
