// crates/slipstream-media/src/control.rs
//
// Async controller: owns one playback session — three queues, three worker
// threads — and the start/stop/seek/pop lifecycle.
//
// Thread and join chain (start spawns left to right, stop joins right to
// left through the chain itself):
//
//   reader ──packet queue──▶ decoder ──frames queue──▶ filterer ──sink──▶ client
//
// The reader thread spawns the decoder thread and joins it on exit; the
// decoder does the same with the filterer. stop() only ever joins the
// reader. To guarantee every blocked worker wakes, stop() latches BOTH
// sides of all three queues with EOF and flushes them before joining.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use log::error;

use slipstream_core::{Decoder, DecoderOptions, Error, Frame, MediaInfo, MediaOptions, Result, Source};

use crate::decode;
use crate::filter::{FilterConfig, FrameFilter, ScaleFilter};
use crate::queue::{FrameQueue, MsgQueue, PacketQueue};
use crate::reader::{self, SeekSlot};

// ── Backend seam ──────────────────────────────────────────────────────────────

/// The external collaborators for one playback session.
///
/// `filter` may be None; the built-in [`ScaleFilter`] then runs the stage.
pub struct SessionParts {
    pub source:  Box<dyn Source>,
    pub decoder: Box<dyn Decoder>,
    pub filter:  Option<Box<dyn FrameFilter>>,
}

/// Opens the collaborators. Called on every start, so a stopped media
/// restarts with fresh demuxer/codec state — the options (including
/// `auto_hwaccel`) steer what the backend builds.
pub trait Backend: Send {
    fn open(&mut self, opts: &MediaOptions) -> Result<SessionParts>;
}

// ── Controller ────────────────────────────────────────────────────────────────

struct Session {
    pkt_queue:    Arc<PacketQueue>,
    frames_queue: Arc<FrameQueue>,
    sink_queue:   Arc<FrameQueue>,
    seek_slot:    Arc<SeekSlot>,
    reader:       Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct AsyncController {
    session: Option<Session>,
    info:    Option<MediaInfo>,
}

impl AsyncController {
    pub fn new() -> Self {
        AsyncController::default()
    }

    /// Spawn the pipeline. `skip` arms an initial seek so the very first
    /// packets already decode toward it. Idempotent while running.
    pub fn start(
        &mut self,
        backend: &mut dyn Backend,
        opts: &MediaOptions,
        skip: Option<i64>,
    ) -> Result<()> {
        if self.session.is_some() {
            return Ok(());
        }

        let parts = backend.open(opts)?;
        let time_base = parts.source.time_base();
        self.info = Some(probe_info(parts.source.as_ref()));

        let pkt_queue = Arc::new(MsgQueue::new(opts.max_nb_packets));
        let frames_queue = Arc::new(MsgQueue::new(opts.max_nb_frames));
        let sink_queue = Arc::new(MsgQueue::new(opts.max_nb_sink));
        let seek_slot = Arc::new(SeekSlot::new());
        if let Some(target) = skip {
            seek_slot.set(target);
        }

        let frame_filter = parts.filter.unwrap_or_else(|| Box::new(ScaleFilter::new()));
        let filter_cfg = FilterConfig::from_media(opts);
        let dec_opts = DecoderOptions::from_media(opts);
        let pkt_skip_mod = opts.pkt_skip_mod;

        let r_pkt = Arc::clone(&pkt_queue);
        let r_frames = Arc::clone(&frames_queue);
        let r_sink = Arc::clone(&sink_queue);
        let r_slot = Arc::clone(&seek_slot);
        let source = parts.source;
        let decoder = parts.decoder;

        let reader = thread::spawn(move || {
            let d_pkt = Arc::clone(&r_pkt);
            let decoder_thread = thread::spawn(move || {
                decode::run_decoder(
                    d_pkt,
                    r_frames,
                    r_sink,
                    decoder,
                    frame_filter,
                    filter_cfg,
                    dec_opts,
                    time_base,
                );
            });
            reader::run_reader(source, r_pkt, r_slot, pkt_skip_mod);
            if decoder_thread.join().is_err() {
                error!("[reader] decoder thread panicked");
            }
        });

        self.session = Some(Session {
            pkt_queue,
            frames_queue,
            sink_queue,
            seek_slot,
            reader: Some(reader),
        });
        Ok(())
    }

    /// Tear the session down. Safe to call any number of times, from any
    /// state; returns once every worker has exited.
    pub fn stop(&mut self) {
        let Some(mut s) = self.session.take() else {
            return;
        };
        for q in [&s.frames_queue, &s.sink_queue] {
            q.set_err_send(Error::Eof);
            q.set_err_recv(Error::Eof);
            q.flush();
        }
        s.pkt_queue.set_err_send(Error::Eof);
        s.pkt_queue.set_err_recv(Error::Eof);
        s.pkt_queue.flush();

        if let Some(handle) = s.reader.take() {
            if handle.join().is_err() {
                error!("[control] reader thread panicked");
            }
        }
    }

    /// Replace the pending seek target (latest wins within one source-poll
    /// cycle) and shed frames already staged for the client — they belong to
    /// the pre-seek timeline.
    pub fn seek(&mut self, target: i64) {
        if let Some(s) = &self.session {
            s.seek_slot.set(target);
            s.sink_queue.flush();
        }
    }

    /// Blocking receive from the sink. None once the session is over.
    pub fn pop_frame(&mut self) -> Option<Frame> {
        self.session.as_ref().and_then(|s| s.sink_queue.recv().ok())
    }

    pub fn started(&self) -> bool {
        self.session.is_some()
    }

    /// What the source reported at the most recent open.
    pub fn info(&self) -> Option<MediaInfo> {
        self.info
    }
}

impl Drop for AsyncController {
    fn drop(&mut self) {
        self.stop();
    }
}

fn probe_info(source: &dyn Source) -> MediaInfo {
    let (width, height) = source.dimensions().unwrap_or((0, 0));
    MediaInfo { duration: source.duration(), width, height }
}
