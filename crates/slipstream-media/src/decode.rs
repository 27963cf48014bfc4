// crates/slipstream-media/src/decode.rs
//
// Decoder worker: consumes packets and seek markers, drives the decoder
// capability, and owns the timestamp-fixup rules that make "frame at time t"
// deterministic across seeks.
//
// The fixup lives in FrameDispatch::queue_frame, the sink handed to the
// decoder at init. Decoders call it from wherever their output appears —
// the worker thread for synchronous codecs, foreign pool threads for
// hardware sessions — so the fixup state sits behind its own mutex, held
// across the queue send to keep emission order identical to fixup order.
// Lock order: dispatch state, then queue internals; never the reverse.
//
// The two-sided safety net around a seek target:
//   undershoot — the source lands on an earlier keyframe; pre-target frames
//   are dropped, except the latest one, which is cached in case the stream
//   never reaches the target (single images, target past EOF). At
//   end-of-segment the cache is promoted: its ts is raised to the target and
//   it is emitted, so the client's query still matches.
//   overshoot — the first frame past the target is retimed down to the
//   target, so a query at t ≥ target cannot be jumped over.

use std::sync::Arc;
use std::thread;

use log::{debug, error};
use parking_lot::Mutex;

use slipstream_core::{Decoder, DecoderOptions, Error, Frame, FrameSink, Result, TimeBase};

use crate::filter::{self, FilterConfig, FrameFilter};
use crate::queue::{FrameQueue, Msg, PacketQueue};

// ── Frame dispatch (timestamp fixup) ──────────────────────────────────────────

struct Fixup {
    /// Armed seek target, canonical microseconds. Cleared once a frame
    /// passes the filter.
    seek_request: Option<i64>,
    /// Latest frame whose ts fell below the armed target.
    cached:       Option<Frame>,
}

pub(crate) struct FrameDispatch {
    frames_queue: Arc<FrameQueue>,
    time_base:    TimeBase,
    state:        Mutex<Fixup>,
}

impl FrameDispatch {
    pub(crate) fn new(frames_queue: Arc<FrameQueue>, time_base: TimeBase) -> Self {
        FrameDispatch {
            frames_queue,
            time_base,
            state: Mutex::new(Fixup { seek_request: None, cached: None }),
        }
    }

    /// Arm a new seek target. Any frame cached for the previous target is
    /// stale and dropped with it.
    pub(crate) fn arm(&self, target: i64) {
        let mut st = self.state.lock();
        st.seek_request = Some(target);
        st.cached = None;
    }
}

impl FrameSink for FrameDispatch {
    fn queue_frame(&self, frame: Option<Frame>) -> Result<()> {
        let mut st = self.state.lock();

        let Some(mut frame) = frame else {
            // End of segment. Promote the cached pre-target frame so a query
            // at the target still gets an answer.
            if let Some(mut held) = st.cached.take() {
                if let Some(target) = st.seek_request.take() {
                    if held.ts < target {
                        held.ts = target;
                    }
                }
                self.frames_queue.send(held)?;
            }
            return Err(Error::Eof);
        };

        frame.ts = self.time_base.to_canonical(frame.ts);
        frame.duration = frame.duration.map(|d| self.time_base.to_canonical(d));

        if let Some(target) = st.seek_request {
            if frame.ts < target {
                // Keep exactly one "last frame before the target".
                st.cached = Some(frame);
                return Ok(());
            }
        }

        if let Some(held) = st.cached.take() {
            self.frames_queue.send(held)?;
        } else if let Some(target) = st.seek_request {
            if target > 0 && frame.ts > target {
                frame.ts = target;
            }
        }

        st.seek_request = None;
        self.frames_queue.send(frame)
    }
}

// ── Decoder worker ────────────────────────────────────────────────────────────

/// Body of the decoder thread. Spawns the filterer, runs the
/// packet/seek/drain state machine, then tears down the stage: EOF toward
/// the filterer (which is drained and joined), stop toward the reader.
pub(crate) fn run_decoder(
    pkt_queue: Arc<PacketQueue>,
    frames_queue: Arc<FrameQueue>,
    sink_queue: Arc<FrameQueue>,
    mut decoder: Box<dyn Decoder>,
    frame_filter: Box<dyn FrameFilter>,
    filter_cfg: FilterConfig,
    dec_opts: DecoderOptions,
    time_base: TimeBase,
) {
    let dispatch = Arc::new(FrameDispatch::new(Arc::clone(&frames_queue), time_base));

    let filter_in = Arc::clone(&frames_queue);
    let filter_out = Arc::clone(&sink_queue);
    let filterer =
        thread::spawn(move || filter::run_filter_worker(frame_filter, filter_cfg, filter_in, filter_out));

    let mut fatal: Option<Error> = None;
    let sink: Arc<dyn FrameSink> = Arc::clone(&dispatch) as Arc<dyn FrameSink>;
    if let Err(e) = decoder.init(sink, &dec_opts) {
        error!("[decoder] init: {e}");
        fatal = Some(e);
    }

    while fatal.is_none() {
        match pkt_queue.recv() {
            Ok(Msg::Seek(target)) => {
                // Make room first so a flush that emits pending output cannot
                // wedge on a full queue, then drop whatever it produced: it
                // all belongs to the pre-seek segment.
                frames_queue.flush();
                if let Err(e) = decoder.flush() {
                    if e.is_fatal() {
                        error!("[decoder] flush: {e}");
                        fatal = Some(e);
                        continue;
                    }
                }
                frames_queue.flush();
                dispatch.arm(target);
            }
            Ok(Msg::Packet(pkt)) => {
                match decoder.push_packet(Some(&pkt)) {
                    Ok(()) => {}
                    Err(Error::InvalidData(msg)) => {
                        debug!("[decoder] dropping malformed packet: {msg}");
                    }
                    Err(Error::Eof) => break,
                    Err(e) => {
                        error!("[decoder] {e}");
                        fatal = Some(e);
                    }
                }
                // packet released here, after submission
            }
            Err(Error::Eof) => {
                // Upstream is done; drain the codec until it reports empty.
                loop {
                    match decoder.push_packet(None) {
                        Ok(()) => {}
                        Err(Error::Eof) => break,
                        Err(e) => {
                            if e.is_fatal() {
                                error!("[decoder] drain: {e}");
                            }
                            break;
                        }
                    }
                }
                break;
            }
            Err(e) => {
                debug!("[decoder] stopping: {e}");
                break;
            }
        }
    }

    // Promote a still-cached frame if the decoder never signalled
    // end-of-segment itself; a second signal is a no-op.
    let _ = dispatch.queue_frame(None);

    frames_queue.set_err_recv(Error::Eof);
    pkt_queue.set_err_send(fatal.unwrap_or(Error::Eof));
    pkt_queue.flush();
    if filterer.join().is_err() {
        error!("[decoder] filterer panicked");
    }
}
