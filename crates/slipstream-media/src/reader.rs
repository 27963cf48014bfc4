// crates/slipstream-media/src/reader.rs
//
// Reader worker: pulls packets from the source, interleaves seek markers,
// feeds the packet queue.
//
// The marker goes onto the queue BEFORE the source seek runs, so the decoder
// always observes the boundary before the first post-seek packet can arrive.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, warn};
use parking_lot::Mutex;

use slipstream_core::{Error, Source};

use crate::queue::{Msg, PacketQueue};

/// How long to sleep when the source says TryAgain.
const PULL_RETRY_INTERVAL: Duration = Duration::from_millis(10);

/// Latest-wins slot for pending seek requests. The controller replaces the
/// value from its thread; the reader takes-and-clears once per loop, so any
/// number of seeks within one source-poll cycle collapse into the last one.
#[derive(Default)]
pub(crate) struct SeekSlot {
    request: Mutex<Option<i64>>,
}

impl SeekSlot {
    pub(crate) fn new() -> Self {
        SeekSlot::default()
    }

    pub(crate) fn set(&self, target: i64) {
        *self.request.lock() = Some(target);
    }

    fn take(&self) -> Option<i64> {
        self.request.lock().take()
    }
}

/// Body of the reader thread.
pub(crate) fn run_reader(
    mut source: Box<dyn Source>,
    pkt_queue: Arc<PacketQueue>,
    seek_slot: Arc<SeekSlot>,
    pkt_skip_mod: i64,
) {
    let mut seq: i64 = 0;
    loop {
        if let Some(target) = seek_slot.take() {
            if pkt_queue.send(Msg::Seek(target)).is_err() {
                break;
            }
            if let Err(e) = source.seek(target) {
                // The decoder-side pts filter absorbs whatever position the
                // source is actually at; log and keep reading.
                warn!("[reader] seek to {target}: {e}");
            }
        }

        match source.pull_packet() {
            Ok(pkt) => {
                seq += 1;
                if pkt_skip_mod > 1 && !pkt.keyframe && seq % pkt_skip_mod != 0 {
                    continue; // approximate fast decode: drop non-key packets
                }
                if pkt_queue.send(Msg::Packet(pkt)).is_err() {
                    break; // packet released by drop
                }
            }
            Err(Error::TryAgain) => thread::sleep(PULL_RETRY_INTERVAL),
            Err(Error::Eof) => {
                pkt_queue.set_err_recv(Error::Eof);
                break;
            }
            Err(e) => {
                error!("[reader] pull: {e}");
                pkt_queue.set_err_recv(e);
                break;
            }
        }
    }
}
