// crates/slipstream-media/src/governor.rs
//
// Buffer-count governor: the back-pressure semaphore bounding how many
// hardware-decoded buffers are alive outside the decoder (client hands +
// reorder staging).
//
// Releasing a frame is the only credit. A decode callback that wants to hand
// over one more buffer blocks in adjust_ref(+1) until the client drops one,
// so a decoder that outruns the client stalls here — with a name — instead
// of deep inside a platform buffer pool.
//
// The session context counts as one logical holder from construction; it
// gives that reference back through release_owner() at teardown. Freeing is
// the final Arc drop, kept separate from the quiescence wait.

use log::warn;
use parking_lot::{Condvar, Mutex};

struct Counts {
    refcount: u32,
    refmax:   u32,
}

pub struct BufferGovernor {
    counts:   Mutex<Counts>,
    released: Condvar,
}

impl BufferGovernor {
    /// `refmax` is the initial cap; it moves with the reorder buffer depth
    /// through adjust_max. Caps below 2 would deadlock the first submission,
    /// so they are raised to 2.
    pub fn new(refmax: u32) -> Self {
        BufferGovernor {
            counts: Mutex::new(Counts {
                refcount: 1, // the session context's own hold
                refmax:   refmax.max(2),
            }),
            released: Condvar::new(),
        }
    }

    /// Grow or shrink the cap. Growing wakes blocked submitters.
    pub fn adjust_max(&self, delta: i32) {
        let mut c = self.counts.lock();
        c.refmax = c.refmax.saturating_add_signed(delta).max(2);
        self.released.notify_all();
    }

    /// Take (+1) or return (-1) one buffer reference.
    ///
    /// A take that would reach the cap blocks until a release or a cap raise
    /// makes room. A return below zero is tolerated with a warning — a decode
    /// callback can fire after a failed submission already reset the session.
    pub fn adjust_ref(&self, delta: i32) {
        let mut c = self.counts.lock();
        if delta > 0 {
            debug_assert_eq!(delta, 1, "references move one at a time");
            while c.refcount + 1 >= c.refmax {
                self.released.wait(&mut c);
            }
            c.refcount += 1;
        } else if delta < 0 {
            debug_assert_eq!(delta, -1, "references move one at a time");
            if c.refcount == 0 {
                warn!("[governor] release with zero refcount (late callback?)");
                return;
            }
            c.refcount -= 1;
            self.released.notify_all();
        }
    }

    /// Give back the session context's own reference at teardown. When this
    /// drops the count to zero nothing holds the governor but live Arcs, and
    /// the last of those frees it.
    pub fn release_owner(&self) {
        self.adjust_ref(-1);
    }

    pub fn refcount(&self) -> u32 {
        self.counts.lock().refcount
    }

    pub fn refmax(&self) -> u32 {
        self.counts.lock().refmax
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn take_blocks_at_saturation_until_a_release() {
        let g = Arc::new(BufferGovernor::new(3)); // refcount 1, room for 1 more
        g.adjust_ref(1);
        assert_eq!(g.refcount(), 2);

        let g2 = Arc::clone(&g);
        let taker = thread::spawn(move || {
            g2.adjust_ref(1); // would reach refmax — must wait
            g2.refcount()
        });
        thread::sleep(Duration::from_millis(30));
        assert_eq!(g.refcount(), 2, "blocked taker must not have incremented");

        g.adjust_ref(-1);
        assert_eq!(taker.join().unwrap(), 2);
    }

    #[test]
    fn raising_the_cap_unblocks_a_taker() {
        let g = Arc::new(BufferGovernor::new(2));
        let g2 = Arc::clone(&g);
        let taker = thread::spawn(move || g2.adjust_ref(1));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(g.refcount(), 1);

        g.adjust_max(1);
        taker.join().unwrap();
        assert_eq!(g.refcount(), 2);
    }

    #[test]
    fn invariant_holds_across_operations() {
        let g = BufferGovernor::new(8);
        for _ in 0..5 {
            g.adjust_ref(1);
            assert!(g.refcount() <= g.refmax());
        }
        g.adjust_max(-1);
        assert!(g.refcount() <= g.refmax());
        for _ in 0..5 {
            g.adjust_ref(-1);
            assert!(g.refcount() <= g.refmax());
        }
        assert_eq!(g.refcount(), 1);
    }

    #[test]
    fn late_release_after_zero_is_tolerated() {
        let g = BufferGovernor::new(4);
        g.release_owner();
        assert_eq!(g.refcount(), 0);
        g.adjust_ref(-1); // late callback; warns, does not underflow
        assert_eq!(g.refcount(), 0);
    }
}
