// crates/slipstream-media/tests/invariants.rs
//
// Property tests for the universal invariants: queue bounds and ordering,
// reorder completeness, and output geometry. The seek-fixup property lives
// with the dispatch in decode.rs.

use std::collections::VecDeque;
use std::sync::Arc;

use proptest::prelude::*;

use slipstream_core::helpers::geometry::fit_pixels;
use slipstream_media::{BufferGovernor, Error, Frame, MsgQueue, PixelFormat, ReorderBuffer};

fn frame(ts: i64) -> Frame {
    Frame::software(vec![0u8; 4], 2, 2, PixelFormat::Rgba, ts)
}

proptest! {
    /// Any input whose elements are displaced by less than the decoder
    /// lookahead comes out of the reorder buffer fully sorted and complete.
    #[test]
    fn bounded_displacement_input_is_fully_reordered(
        len in 1usize..40,
        seed in any::<u64>(),
    ) {
        let mut ts: Vec<i64> = (0..len as i64).map(|i| i * 40_000).collect();
        // deterministic bounded shuffle: swap disjoint adjacent pairs
        for i in (0..len.saturating_sub(1)).step_by(2) {
            if (seed >> (i % 64)) & 1 == 1 {
                ts.swap(i, i + 1);
            }
        }

        let governor = Arc::new(BufferGovernor::new(4));
        let mut rb = ReorderBuffer::new(governor);
        let mut out = Vec::new();
        for &t in &ts {
            out.extend(rb.push(frame(t)).into_iter().map(|f| f.ts));
        }
        out.extend(rb.drain().into_iter().map(|f| f.ts));

        let mut expected = ts.clone();
        expected.sort_unstable();
        prop_assert_eq!(out, expected);
    }

    /// The queue agrees with a plain VecDeque model and never exceeds its
    /// capacity, under any non-blocking op interleaving; latched EOF is
    /// observed only after the drain.
    #[test]
    fn queue_matches_the_fifo_model(
        capacity in 1usize..8,
        ops in proptest::collection::vec(any::<bool>(), 1..200),
    ) {
        let q = MsgQueue::new(capacity);
        let mut model: VecDeque<u32> = VecDeque::new();
        let mut next = 0u32;

        for op in ops {
            if op {
                if model.len() < capacity {
                    q.send(next).unwrap();
                    model.push_back(next);
                    next += 1;
                }
            } else if let Some(expect) = model.pop_front() {
                prop_assert_eq!(q.recv().unwrap(), expect);
            }
            prop_assert!(q.len() <= capacity, "queue over capacity");
            prop_assert_eq!(q.len(), model.len());
        }

        q.set_err_recv(Error::Eof);
        for expect in model {
            prop_assert_eq!(q.recv().unwrap(), expect);
        }
        prop_assert_eq!(q.recv(), Err(Error::Eof));
    }

    /// Fitted output dimensions respect the pixel budget, stay even, and
    /// leave already-fitting inputs alone.
    #[test]
    fn fitted_dimensions_respect_the_budget(
        w in 2u32..4096,
        h in 2u32..4096,
        max in 16u32..4_000_000,
    ) {
        let (ow, oh) = fit_pixels(w, h, max);
        if (w as u64 * h as u64) <= max as u64 {
            prop_assert_eq!((ow, oh), (w, h));
        } else {
            prop_assert!(ow as u64 * oh as u64 <= max as u64);
            prop_assert_eq!(ow % 2, 0);
            prop_assert_eq!(oh % 2, 0);
            prop_assert!(ow >= 2 && oh >= 2);
        }
    }
}
