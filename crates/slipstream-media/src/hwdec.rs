// crates/slipstream-media/src/hwdec.rs
//
// Hardware-decoder adapter: a Decoder implementation that drives an abstract
// asynchronous decode session (trait HwSession) whose completion callbacks
// may fire on pool threads we do not own, in decode order, arbitrarily late
// — even after an apparent drain returned.
//
// Three mechanisms meet here:
//   in-flight cap   — at most `max_inflight` samples in the air per session;
//                     submission blocks past that.
//   reorder buffer  — completions arrive in decode order; frames leave in
//                     presentation order.
//   governor        — each buffer handed downstream takes one reference;
//                     dropping the frame gives it back. A saturated governor
//                     blocks the completion thread, which is exactly the
//                     back-pressure that keeps the session inside its pool.
//
// A session generation counter makes late callbacks harmless: after a failed
// submission (which zeroes the in-flight count) or teardown, completions
// from the old generation release their buffer and touch nothing else.

use std::sync::Arc;

use log::debug;
use parking_lot::{Condvar, Mutex};

use slipstream_core::{Decoder, DecoderOptions, Error, Frame, FrameSink, HwBuffer, Packet, Result};

use crate::governor::BufferGovernor;
use crate::reorder::ReorderBuffer;

// ── Session capability ────────────────────────────────────────────────────────

/// One decoded surface coming back from the session, pts still in the
/// source stream time base.
pub struct HwOutput {
    pub pts:    i64,
    pub width:  u32,
    pub height: u32,
    pub buffer: HwBuffer,
}

/// Called exactly once per submitted sample, from any thread. None means the
/// sample produced no picture.
pub type Completion = Box<dyn FnOnce(Option<HwOutput>) + Send>;

/// The platform decode session. `drain` asks it to finish everything
/// submitted; completions may still be in flight when it returns.
pub trait HwSession: Send {
    fn submit(&mut self, sample: &Packet, completion: Completion) -> Result<()>;
    fn drain(&mut self) -> Result<()>;
}

// ── Adapter ───────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
pub struct HwDecoderConfig {
    /// Samples allowed in the air at once. The default of 3 is the
    /// documented platform-deadlock workaround; other platforms can raise it.
    pub max_inflight: u32,
    /// Initial governor cap: buffers alive outside the decoder (client hands
    /// plus one for the session context).
    pub buffer_refs:  u32,
}

impl Default for HwDecoderConfig {
    fn default() -> Self {
        HwDecoderConfig { max_inflight: 3, buffer_refs: 8 }
    }
}

struct Inflight {
    count:      u32,
    generation: u64,
}

struct Shared {
    inflight:  Mutex<Inflight>,
    quiescent: Condvar,
    governor:  Arc<BufferGovernor>,
    reorder:   Mutex<ReorderBuffer>,
}

pub struct HwDecoder<S: HwSession> {
    session: S,
    shared:  Arc<Shared>,
    sink:    Option<Arc<dyn FrameSink>>,
    config:  HwDecoderConfig,
}

impl<S: HwSession> HwDecoder<S> {
    pub fn new(session: S) -> Self {
        HwDecoder::with_config(session, HwDecoderConfig::default())
    }

    pub fn with_config(session: S, config: HwDecoderConfig) -> Self {
        let governor = Arc::new(BufferGovernor::new(config.buffer_refs));
        HwDecoder {
            session,
            shared: Arc::new(Shared {
                inflight:  Mutex::new(Inflight { count: 0, generation: 0 }),
                quiescent: Condvar::new(),
                governor:  Arc::clone(&governor),
                reorder:   Mutex::new(ReorderBuffer::new(governor)),
            }),
            sink: None,
            config,
        }
    }

    pub fn governor(&self) -> Arc<BufferGovernor> {
        Arc::clone(&self.shared.governor)
    }

    /// Wait until every completion of the current generation has fired.
    /// A drain does not guarantee that by itself.
    fn wait_quiescent(&self) {
        let mut fl = self.shared.inflight.lock();
        let generation = fl.generation;
        while fl.count > 0 && fl.generation == generation {
            self.shared.quiescent.wait(&mut fl);
        }
    }

    fn sink(&self) -> Result<Arc<dyn FrameSink>> {
        self.sink
            .clone()
            .ok_or_else(|| Error::Decoder("hardware decoder used before init".into()))
    }

    /// Drain the session and hand everything still staged to the sink in
    /// presentation order.
    fn drain_session(&mut self, sink: &Arc<dyn FrameSink>) -> Result<()> {
        self.session.drain()?;
        self.wait_quiescent();
        let remaining = self.shared.reorder.lock().drain();
        for frame in remaining {
            sink.queue_frame(Some(frame))?;
        }
        Ok(())
    }
}

fn completion(shared: Arc<Shared>, sink: Arc<dyn FrameSink>, generation: u64) -> Completion {
    Box::new(move |output: Option<HwOutput>| {
        let stale = shared.inflight.lock().generation != generation;
        if let Some(out) = output {
            if stale {
                debug!("[hwdec] releasing late buffer {} from a dead session", out.buffer.id());
                drop(out);
            } else {
                // Take one reference for the buffer about to leave the
                // decoder. Blocks when the client sits on too many frames.
                shared.governor.adjust_ref(1);
                let governor = Arc::clone(&shared.governor);
                let inner = out.buffer;
                let handle = HwBuffer::new(inner.id(), move || {
                    drop(inner);
                    governor.adjust_ref(-1);
                });
                let frame = Frame::hardware(handle, out.width, out.height, out.pts);
                let ready = shared.reorder.lock().push(frame);
                for frame in ready {
                    if sink.queue_frame(Some(frame)).is_err() {
                        break; // downstream gone; remaining frames just drop
                    }
                }
            }
        }
        let mut fl = shared.inflight.lock();
        if fl.generation == generation && fl.count > 0 {
            fl.count -= 1;
        }
        shared.quiescent.notify_all();
    })
}

impl<S: HwSession> Decoder for HwDecoder<S> {
    fn init(&mut self, sink: Arc<dyn FrameSink>, _opts: &DecoderOptions) -> Result<()> {
        self.sink = Some(sink);
        Ok(())
    }

    fn push_packet(&mut self, pkt: Option<&Packet>) -> Result<()> {
        let sink = self.sink()?;
        let Some(pkt) = pkt else {
            // Drain request: finish the session, flush the staging area,
            // terminate the segment.
            self.drain_session(&sink)?;
            let _ = sink.queue_frame(None);
            return Err(Error::Eof);
        };

        let generation = {
            let mut fl = self.shared.inflight.lock();
            while fl.count >= self.config.max_inflight {
                self.shared.quiescent.wait(&mut fl);
            }
            fl.count += 1;
            fl.generation
        };

        match self.session.submit(pkt, completion(Arc::clone(&self.shared), sink, generation)) {
            Ok(()) => Ok(()),
            Err(e) => {
                // The sample is not re-sent. Whether its completion still
                // fires is the session's business; bumping the generation
                // makes a late one harmless.
                let mut fl = self.shared.inflight.lock();
                fl.count = 0;
                fl.generation += 1;
                drop(fl);
                self.shared.quiescent.notify_all();
                Err(Error::External(format!("hardware submit: {e}")))
            }
        }
    }

    fn flush(&mut self) -> Result<()> {
        let sink = self.sink()?;
        self.drain_session(&sink)?;
        let _ = sink.queue_frame(None);
        Ok(())
    }
}

impl<S: HwSession> Drop for HwDecoder<S> {
    fn drop(&mut self) {
        {
            let mut fl = self.shared.inflight.lock();
            fl.count = 0;
            fl.generation += 1;
        }
        self.shared.quiescent.notify_all();
        // Staged frames drop here and give their references back; then the
        // session context returns its own.
        self.shared.reorder.lock().drain();
        self.shared.governor.release_owner();
    }
}
