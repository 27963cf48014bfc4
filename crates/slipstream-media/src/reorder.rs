// crates/slipstream-media/src/reorder.rs
//
// Decode-order → presentation-order staging.
//
// Hardware sessions fire completion callbacks in decode order, which differs
// from presentation order by a small bounded lookahead (B-frames). The
// buffer holds frames sorted by ts; a new arrival proves every older entry
// final, because a later-decoded frame cannot carry an earlier pts than one
// the decoder already handed out for this session.
//
// Every insert raises the governor cap by one and every removal lowers it,
// so staging here never eats into the client's buffer budget.

use std::sync::Arc;

use slipstream_core::Frame;

use crate::governor::BufferGovernor;

pub struct ReorderBuffer {
    entries:  Vec<Frame>, // ascending ts; small (< 16 typical)
    governor: Arc<BufferGovernor>,
}

impl ReorderBuffer {
    pub fn new(governor: Arc<BufferGovernor>) -> Self {
        ReorderBuffer { entries: Vec::new(), governor }
    }

    /// Stage one frame; returns the entries that became safe to emit, in
    /// presentation order.
    ///
    /// A frame older than everything staged goes to the front and nothing is
    /// released. Otherwise every entry strictly older than the new frame is
    /// drained and the frame takes its sorted slot among the rest.
    pub fn push(&mut self, frame: Frame) -> Vec<Frame> {
        if self.entries.first().map_or(true, |f| frame.ts < f.ts) {
            self.entries.insert(0, frame);
            self.governor.adjust_max(1);
            return Vec::new();
        }

        let ready_len = self.entries.iter().take_while(|f| f.ts < frame.ts).count();
        let ready: Vec<Frame> = self.entries.drain(..ready_len).collect();
        self.governor.adjust_max(-(ready.len() as i32));

        let pos = self
            .entries
            .iter()
            .position(|f| f.ts > frame.ts)
            .unwrap_or(self.entries.len());
        self.entries.insert(pos, frame);
        self.governor.adjust_max(1);

        ready
    }

    /// Empty the buffer in presentation order. The caller emits the result
    /// (end-of-stream) or drops it (seek).
    pub fn drain(&mut self) -> Vec<Frame> {
        self.governor.adjust_max(-(self.entries.len() as i32));
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
