// crates/slipstream-media/src/queue.rs
//
// Bounded, flushable, typed message queue — the single shared-state unit the
// pipeline stages communicate through.
//
// Error latches, one per direction:
//   set_err_send(e) — subsequent send() calls fail with `e` immediately.
//     Installed from the consuming side ("I'm gone, stop producing") and by
//     stop(). A blocked sender wakes and fails.
//   set_err_recv(e) — recv() returns `e` once the queue is empty. Installed
//     from the producing side ("no more items, drain is fine"), almost
//     always with Eof.
//
// EOF is an ordinary Error value, not a separate channel. The queue owns
// undelivered items; flush() and Drop release them through their own Drop
// impls (variant-aware for the packet/seek sum type).

use std::collections::VecDeque;

use parking_lot::{Condvar, Mutex};

use slipstream_core::{Error, Frame, Packet, Result};

/// Message type of the packet queue. Seek markers share the queue with
/// packets so their ordering relative to packets is preserved.
#[derive(Debug, PartialEq)]
pub enum Msg {
    Packet(Packet),
    /// Seek boundary: everything after this marker decodes toward the target
    /// (canonical microseconds).
    Seek(i64),
}

pub type PacketQueue = MsgQueue<Msg>;
pub type FrameQueue = MsgQueue<Frame>;

struct State<T> {
    items:    VecDeque<T>,
    err_send: Option<Error>,
    err_recv: Option<Error>,
}

pub struct MsgQueue<T> {
    state:     Mutex<State<T>>,
    not_full:  Condvar,
    not_empty: Condvar,
    capacity:  usize,
}

impl<T> MsgQueue<T> {
    pub fn new(capacity: usize) -> Self {
        MsgQueue {
            state: Mutex::new(State {
                items:    VecDeque::with_capacity(capacity.max(1)),
                err_send: None,
                err_recv: None,
            }),
            not_full:  Condvar::new(),
            not_empty: Condvar::new(),
            capacity:  capacity.max(1),
        }
    }

    /// Block until there is space, then enqueue. Fails immediately once the
    /// send latch is set; the message is dropped in that case.
    pub fn send(&self, msg: T) -> Result<()> {
        let mut st = self.state.lock();
        while st.err_send.is_none() && st.items.len() >= self.capacity {
            self.not_full.wait(&mut st);
        }
        if let Some(e) = &st.err_send {
            return Err(e.clone());
        }
        st.items.push_back(msg);
        self.not_empty.notify_one();
        Ok(())
    }

    /// Block until an item is available. Remaining items are delivered even
    /// after the recv latch is set; the latch value is returned only once
    /// the queue is empty.
    pub fn recv(&self) -> Result<T> {
        let mut st = self.state.lock();
        while st.err_recv.is_none() && st.items.is_empty() {
            self.not_empty.wait(&mut st);
        }
        match st.items.pop_front() {
            Some(msg) => {
                self.not_full.notify_one();
                Ok(msg)
            }
            None => Err(st.err_recv.clone().unwrap_or(Error::Eof)),
        }
    }

    /// Drop every pending item and wake blocked senders.
    pub fn flush(&self) {
        let mut st = self.state.lock();
        st.items.clear();
        self.not_full.notify_all();
    }

    /// Sticky: the first installed error wins.
    pub fn set_err_send(&self, e: Error) {
        let mut st = self.state.lock();
        st.err_send.get_or_insert(e);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    /// Sticky: the first installed error wins.
    pub fn set_err_recv(&self, e: Error) {
        let mut st = self.state.lock();
        st.err_recv.get_or_insert(e);
        self.not_full.notify_all();
        self.not_empty.notify_all();
    }

    pub fn len(&self) -> usize {
        self.state.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.lock().items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn fifo_order() {
        let q = MsgQueue::new(4);
        for i in 0..4 {
            q.send(i).unwrap();
        }
        for i in 0..4 {
            assert_eq!(q.recv().unwrap(), i);
        }
    }

    #[test]
    fn send_blocks_at_capacity_until_a_recv() {
        let q = Arc::new(MsgQueue::new(2));
        q.send(1).unwrap();
        q.send(2).unwrap();

        let q2 = Arc::clone(&q);
        let sender = thread::spawn(move || q2.send(3));
        thread::sleep(Duration::from_millis(30));
        assert_eq!(q.len(), 2, "third send must not have landed yet");

        assert_eq!(q.recv().unwrap(), 1);
        sender.join().unwrap().unwrap();
        assert_eq!(q.recv().unwrap(), 2);
        assert_eq!(q.recv().unwrap(), 3);
    }

    #[test]
    fn recv_latch_delivers_remaining_items_first() {
        let q = MsgQueue::new(4);
        q.send("a").unwrap();
        q.send("b").unwrap();
        q.set_err_recv(Error::Eof);
        assert_eq!(q.recv().unwrap(), "a");
        assert_eq!(q.recv().unwrap(), "b");
        assert_eq!(q.recv(), Err(Error::Eof));
        // sticky
        assert_eq!(q.recv(), Err(Error::Eof));
    }

    #[test]
    fn send_latch_fails_immediately_and_wakes_blocked_senders() {
        let q = Arc::new(MsgQueue::new(1));
        q.send(1).unwrap();

        let q2 = Arc::clone(&q);
        let sender = thread::spawn(move || q2.send(2));
        thread::sleep(Duration::from_millis(30));
        q.set_err_send(Error::Eof);

        assert_eq!(sender.join().unwrap(), Err(Error::Eof));
        assert_eq!(q.send(3), Err(Error::Eof));
        // the item that made it in is still delivered
        assert_eq!(q.recv().unwrap(), 1);
    }

    #[test]
    fn first_latched_error_wins() {
        let q: MsgQueue<u8> = MsgQueue::new(1);
        q.set_err_recv(Error::External("backend died".into()));
        q.set_err_recv(Error::Eof);
        assert_eq!(q.recv(), Err(Error::External("backend died".into())));
    }

    #[test]
    fn flush_drops_items_and_unblocks_senders() {
        let q = Arc::new(MsgQueue::new(1));
        q.send(1).unwrap();

        let q2 = Arc::clone(&q);
        let sender = thread::spawn(move || q2.send(2));
        thread::sleep(Duration::from_millis(30));
        q.flush();

        sender.join().unwrap().unwrap();
        assert_eq!(q.recv().unwrap(), 2, "only the post-flush item survives");
    }

    #[test]
    fn recv_blocks_until_a_send() {
        let q = Arc::new(MsgQueue::new(1));
        let q2 = Arc::clone(&q);
        let receiver = thread::spawn(move || q2.recv());
        thread::sleep(Duration::from_millis(30));
        q.send(42).unwrap();
        assert_eq!(receiver.join().unwrap().unwrap(), 42);
    }
}
