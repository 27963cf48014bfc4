// crates/slipstream-media/src/filter.rs
//
// Filter stage: the external filter-graph capability and the worker that
// runs it between the frames queue and the sink, plus the built-in software
// filter used when the backend does not bring its own.

use std::sync::Arc;

use log::{debug, warn};

use slipstream_core::helpers::geometry::fit_pixels;
use slipstream_core::{Error, Frame, FrameData, MediaOptions, PixelFormat, Result};

use crate::queue::FrameQueue;

// ── Capability ────────────────────────────────────────────────────────────────

/// Everything a filter implementation gets to know at init.
#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    /// Filter-graph expression for engines that parse one. The built-in
    /// filter ignores it.
    pub expression:  Option<String>,
    /// Drop frames past this presentation time (canonical microseconds).
    pub max_ts:      Option<i64>,
    /// Pixel budget for output frames.
    pub max_pixels:  Option<u32>,
    /// Upstream pixel format, when the backend knows it ahead of time.
    pub format_hint: PixelFormat,
}

impl FilterConfig {
    pub fn from_media(opts: &MediaOptions) -> Self {
        FilterConfig {
            expression:  opts.filters.clone(),
            max_ts:      opts.trim_duration,
            max_pixels:  opts.max_pixels,
            format_hint: opts.sw_pix_fmt,
        }
    }
}

/// The filter-graph capability. `run` owns the stage loop: it pulls from
/// `input` until the recv latch fires, pushes results to `output`, and
/// returns when either side terminates. Upstream EOF is a normal return;
/// any other condition comes back as the error.
pub trait FrameFilter: Send {
    fn init(&mut self, config: &FilterConfig) -> Result<()>;
    fn run(&mut self, input: &FrameQueue, output: &FrameQueue) -> Result<()>;
}

// ── Built-in software filter ──────────────────────────────────────────────────

/// Trim + downscale filter used when no external graph is configured.
///
/// Honours `max_ts` (frames past the trim bound are dropped) and
/// `max_pixels` (packed RGBA/BGRA software frames are downscaled
/// nearest-neighbour, aspect preserved). Hardware surfaces and planar
/// formats pass through untouched — scaling those is the business of a real
/// graph engine.
#[derive(Default)]
pub struct ScaleFilter {
    max_ts:     Option<i64>,
    max_pixels: Option<u32>,
}

impl ScaleFilter {
    pub fn new() -> Self {
        ScaleFilter::default()
    }

    fn apply(&self, frame: Frame) -> Frame {
        let Some(max_pixels) = self.max_pixels else {
            return frame;
        };
        let Some(bpp) = frame.format.packed_bpp() else {
            return frame;
        };
        let FrameData::Software(src) = &frame.data else {
            return frame;
        };
        let (out_w, out_h) = fit_pixels(frame.width, frame.height, max_pixels);
        if (out_w, out_h) == (frame.width, frame.height) {
            return frame;
        }

        let src_w = frame.width as usize;
        let mut data = Vec::with_capacity(out_w as usize * out_h as usize * bpp);
        for row in 0..out_h as usize {
            let src_row = row * frame.height as usize / out_h as usize;
            for col in 0..out_w as usize {
                let src_col = col * src_w / out_w as usize;
                let p = (src_row * src_w + src_col) * bpp;
                data.extend_from_slice(&src[p..p + bpp]);
            }
        }

        Frame {
            data: FrameData::Software(Arc::from(data)),
            width: out_w,
            height: out_h,
            ..frame
        }
    }
}

impl FrameFilter for ScaleFilter {
    fn init(&mut self, config: &FilterConfig) -> Result<()> {
        if let Some(expr) = &config.expression {
            debug!("[filter] ignoring expression {expr:?} (built-in filter)");
        }
        self.max_ts = config.max_ts;
        self.max_pixels = config.max_pixels;
        Ok(())
    }

    fn run(&mut self, input: &FrameQueue, output: &FrameQueue) -> Result<()> {
        loop {
            let frame = match input.recv() {
                Ok(f) => f,
                Err(Error::Eof) => return Ok(()),
                Err(e) => return Err(e),
            };
            if let Some(max_ts) = self.max_ts {
                if frame.ts > max_ts {
                    continue; // trimmed
                }
            }
            output.send(self.apply(frame))?;
        }
    }
}

// ── Worker ────────────────────────────────────────────────────────────────────

/// Body of the filterer thread. When the capability returns, the sink is
/// latched so the client drains and then sees EOF; on a downstream failure
/// the frames queue is latched and flushed so the decoder stops producing.
pub(crate) fn run_filter_worker(
    mut filter: Box<dyn FrameFilter>,
    config: FilterConfig,
    input: Arc<FrameQueue>,
    output: Arc<FrameQueue>,
) {
    if let Err(e) = filter.init(&config) {
        warn!("[filter] init: {e}");
        input.set_err_send(e.clone());
        input.flush();
        output.set_err_recv(Error::Eof);
        return;
    }

    match filter.run(&input, &output) {
        Ok(()) => {
            output.set_err_recv(Error::Eof);
        }
        Err(e) => {
            if e != Error::Eof {
                warn!("[filter] {e}");
            }
            input.set_err_send(e);
            input.flush();
            output.set_err_recv(Error::Eof);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use slipstream_core::TIME_BASE;

    fn rgba_frame(w: u32, h: u32, ts: i64) -> Frame {
        Frame::software(vec![128u8; (w * h * 4) as usize], w, h, PixelFormat::Rgba, ts)
    }

    fn scale_filter(max_ts: Option<i64>, max_pixels: Option<u32>) -> ScaleFilter {
        let mut f = ScaleFilter::new();
        f.init(&FilterConfig { max_ts, max_pixels, ..FilterConfig::default() }).unwrap();
        f
    }

    #[test]
    fn downscales_to_the_pixel_budget() {
        let f = scale_filter(None, Some(640 * 360));
        let out = f.apply(rgba_frame(1920, 1080, 0));
        assert_eq!((out.width, out.height), (640, 360));
        match &out.data {
            FrameData::Software(data) => assert_eq!(data.len(), 640 * 360 * 4),
            other => panic!("unexpected payload {other:?}"),
        }
    }

    #[test]
    fn small_frames_and_hw_surfaces_pass_through() {
        let f = scale_filter(None, Some(640 * 360));
        let out = f.apply(rgba_frame(320, 240, 7));
        assert_eq!((out.width, out.height, out.ts), (320, 240, 7));

        let hw = Frame::hardware(slipstream_core::HwBuffer::untracked(1), 1920, 1080, 0);
        let out = f.apply(hw);
        assert_eq!((out.width, out.height), (1920, 1080));
    }

    #[test]
    fn run_trims_past_the_bound_and_forwards_the_rest() {
        let mut f = scale_filter(Some(TIME_BASE), None);
        let input = FrameQueue::new(8);
        let output = FrameQueue::new(8);
        for ts in [0, TIME_BASE / 2, TIME_BASE, 2 * TIME_BASE] {
            input.send(rgba_frame(2, 2, ts)).unwrap();
        }
        input.set_err_recv(Error::Eof);
        f.run(&input, &output).unwrap();

        let mut seen = Vec::new();
        while let Ok(frame) = output.recv() {
            seen.push(frame.ts);
            if output.is_empty() {
                break;
            }
        }
        assert_eq!(seen, [0, TIME_BASE / 2, TIME_BASE]);
    }

    #[test]
    fn run_propagates_a_downstream_latch() {
        let mut f = scale_filter(None, None);
        let input = FrameQueue::new(8);
        let output = FrameQueue::new(8);
        input.send(rgba_frame(2, 2, 0)).unwrap();
        output.set_err_send(Error::Eof);
        assert_eq!(f.run(&input, &output), Err(Error::Eof));
    }
}
