// crates/slipstream-media/src/media.rs
//
// Client surface: Media wraps one controller and translates "frame at time
// t" into seek/pull decisions against the sink; Context is the bag of
// medias an embedder keys by id.
//
// Media keeps a two-frame client-side window: the last delivered frame and
// the first frame pulled past the target. Between them most get_frame calls
// are answered without touching the pipeline, and a repeated call with the
// same t returns the same frame.

use std::collections::HashMap;

use uuid::Uuid;

use slipstream_core::{secs_to_ts, ts_to_secs, Error, Frame, MediaInfo, OptValue, Result};
use slipstream_core::{MediaOptions, Source};

use crate::control::{AsyncController, Backend};

// ── Media ─────────────────────────────────────────────────────────────────────

pub struct Media {
    opts:    MediaOptions,
    backend: Box<dyn Backend>,
    /// Last frame delivered to the caller, for re-delivery without a repull.
    /// Declared before the controller: cached frames must give their buffer
    /// credits back before the pipeline is joined.
    prev_frame:     Option<Frame>,
    /// First frame seen past the current target; answers the next call.
    pending:        Option<Frame>,
    controller:     AsyncController,
    /// Latest requested-but-unsatisfied seek target. Doubles as the pending
    /// initial skip while stopped.
    armed_seek:     Option<i64>,
    /// ts of the newest frame pulled off the sink.
    last_pushed_ts: Option<i64>,
    eof:            bool,
}

impl Media {
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Media::with_options(backend, MediaOptions::default())
    }

    pub fn with_options(backend: Box<dyn Backend>, opts: MediaOptions) -> Self {
        Media {
            opts,
            backend,
            controller:     AsyncController::new(),
            armed_seek:     None,
            last_pushed_ts: None,
            prev_frame:     None,
            pending:        None,
            eof:            false,
        }
    }

    pub fn options(&self) -> &MediaOptions {
        &self.opts
    }

    /// Set one option by name. Options are frozen while the pipeline runs.
    pub fn set_option(&mut self, name: &str, value: impl Into<OptValue>) -> Result<()> {
        if self.controller.started() {
            return Err(Error::Unsupported("options are frozen while started".into()));
        }
        self.opts.set(name, value)
    }

    /// Spawn the pipeline (prefetch). A pending seek or the `skip` option
    /// becomes the initial target. Idempotent while running.
    pub fn start(&mut self) -> Result<()> {
        let skip = self.armed_seek.or(self.opts.skip);
        self.start_session(skip)
    }

    /// Tear the pipeline down and forget all playback state. Idempotent;
    /// a later get_frame restarts and re-seeks from scratch.
    ///
    /// Cached frames are released before the workers are joined — a blocked
    /// hardware completion may be waiting on exactly those buffer credits.
    pub fn stop(&mut self) {
        self.prev_frame = None;
        self.pending = None;
        self.controller.stop();
        self.armed_seek = None;
        self.last_pushed_ts = None;
        self.eof = false;
    }

    /// Request playback reposition to `secs`. While stopped this just arms
    /// the target for the next start; after EOF it retires the dead session
    /// so the next get_frame starts a fresh one.
    pub fn seek(&mut self, secs: f64) {
        let target = secs_to_ts(secs.max(0.0));
        self.prev_frame = None;
        self.pending = None;
        if self.controller.started() && !self.eof {
            self.controller.seek(target);
        } else if self.eof {
            self.controller.stop();
            self.eof = false;
        }
        self.armed_seek = Some(target);
        self.last_pushed_ts = None;
    }

    /// The frame to show at `secs`: the newest frame whose ts is ≤ the
    /// target, or None once the stream is over and nothing buffered applies.
    /// Starts (or restarts) the pipeline as needed.
    pub fn get_frame(&mut self, secs: f64) -> Option<Frame> {
        let target = secs_to_ts(secs.max(0.0));
        let trigger = self.opts.dist_time_seek_trigger;

        // Served by the client-side window? prev brackets the target from
        // below, pending from above — nothing new can be needed.
        if let (Some(prev), Some(next)) = (&self.prev_frame, &self.pending) {
            if prev.ts <= target && next.ts > target {
                return self.prev_frame.clone();
            }
        }

        let needs_seek = match (self.last_pushed_ts, self.armed_seek) {
            (_, Some(armed)) => target < armed || target - armed > trigger,
            (Some(last), None) => target < last || target - last > trigger,
            (None, None) => true,
        };

        if !self.controller.started() {
            let skip = if needs_seek { Some(target) } else { self.armed_seek };
            if self.start_session(skip).is_err() {
                return None;
            }
            self.armed_seek = skip;
        } else if needs_seek {
            self.prev_frame = None;
            self.pending = None;
            if self.eof {
                // The reader already exited; a slot write would go unread.
                self.controller.stop();
                self.eof = false;
                if self.start_session(Some(target)).is_err() {
                    return None;
                }
            } else {
                self.controller.seek(target);
            }
            self.armed_seek = Some(target);
            self.last_pushed_ts = None;
        }

        let mut candidate = self.pending.take();
        loop {
            match self.controller.pop_frame() {
                Some(frame) => {
                    // While a seek is in flight, frames above its target are
                    // stragglers from the pre-seek timeline: the decoder
                    // guarantees the first post-seek frame sits at or below
                    // the target (dropped-until, clamped or promoted).
                    if let Some(armed) = self.armed_seek {
                        if frame.ts > armed {
                            continue;
                        }
                        self.armed_seek = None;
                    }
                    self.last_pushed_ts = Some(frame.ts);
                    if frame.ts > target {
                        self.pending = Some(frame);
                        break;
                    }
                    candidate = Some(frame); // the earlier candidate drops here
                }
                None => {
                    self.eof = true;
                    break;
                }
            }
        }

        match candidate {
            Some(frame) => {
                self.prev_frame = Some(frame.clone());
                Some(frame)
            }
            // EOF before anything at or under the target: fall back to the
            // last delivered frame, or report nothing.
            None => self.prev_frame.clone(),
        }
    }

    /// What the source reports about itself. Opens the backend for a one-off
    /// probe when the pipeline has never run.
    pub fn info(&mut self) -> Result<MediaInfo> {
        if let Some(info) = self.controller.info() {
            return Ok(info);
        }
        let parts = self.backend.open(&self.opts)?;
        let source: &dyn Source = parts.source.as_ref();
        let (width, height) = source.dimensions().unwrap_or((0, 0));
        Ok(MediaInfo { duration: source.duration(), width, height })
    }

    /// Stream duration in seconds, if the source knows it.
    pub fn duration(&mut self) -> Option<f64> {
        self.info().ok().and_then(|i| i.duration).map(ts_to_secs)
    }

    fn start_session(&mut self, skip: Option<i64>) -> Result<()> {
        self.eof = false;
        self.controller.start(self.backend.as_mut(), &self.opts, skip)
    }
}

// ── Context ───────────────────────────────────────────────────────────────────

/// Owner of every media an embedder created. Dropping the context (or a
/// removed media) stops its pipeline and releases everything it holds.
#[derive(Default)]
pub struct Context {
    medias: HashMap<Uuid, Media>,
}

impl Context {
    pub fn new() -> Self {
        Context::default()
    }

    pub fn add_media(&mut self, backend: Box<dyn Backend>) -> Uuid {
        let id = Uuid::new_v4();
        self.medias.insert(id, Media::new(backend));
        id
    }

    pub fn media_mut(&mut self, id: &Uuid) -> Option<&mut Media> {
        self.medias.get_mut(id)
    }

    pub fn remove_media(&mut self, id: &Uuid) -> bool {
        self.medias.remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.medias.len()
    }

    pub fn is_empty(&self) -> bool {
        self.medias.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::control::SessionParts;

    /// Backend that always fails to open: exercises the error paths.
    struct BrokenBackend;

    impl Backend for BrokenBackend {
        fn open(&mut self, _opts: &MediaOptions) -> Result<SessionParts> {
            Err(Error::Unsupported("no such file".into()))
        }
    }

    #[test]
    fn get_frame_on_a_broken_backend_is_null_not_a_panic() {
        let mut media = Media::new(Box::new(BrokenBackend));
        assert!(media.get_frame(1.0).is_none());
        assert!(media.start().is_err());
        media.stop(); // still idempotent
    }

    #[test]
    fn seek_while_stopped_arms_the_next_start() {
        let mut media = Media::new(Box::new(BrokenBackend));
        media.seek(12.5);
        assert_eq!(media.armed_seek, Some(12_500_000));
        media.seek(3.0); // latest wins
        assert_eq!(media.armed_seek, Some(3_000_000));
        media.stop();
        assert_eq!(media.armed_seek, None);
    }

    #[test]
    fn negative_seek_clamps_to_zero() {
        let mut media = Media::new(Box::new(BrokenBackend));
        media.seek(-4.2);
        assert_eq!(media.armed_seek, Some(0));
    }

    #[test]
    fn context_owns_medias_by_id() {
        let mut ctx = Context::new();
        let id = ctx.add_media(Box::new(BrokenBackend));
        assert!(ctx.media_mut(&id).is_some());
        assert_eq!(ctx.len(), 1);
        assert!(ctx.remove_media(&id));
        assert!(!ctx.remove_media(&id));
        assert!(ctx.is_empty());
    }

    #[test]
    fn options_are_frozen_only_while_started() {
        // BrokenBackend never starts, so set_option keeps working.
        let mut media = Media::new(Box::new(BrokenBackend));
        media.set_option("skip", 1.0).unwrap();
        assert_eq!(media.options().skip, Some(1_000_000));
    }
}
