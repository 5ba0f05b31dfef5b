//! Mailbox Pair
//!
//! A [`Mailbox`] owns one frame queue and hands out two kinds of
//! non-owning handle over it:
//!
//! ```text
//!                 ┌──────────── Mailbox (owner: manager) ───────────┐
//!  sender A ──┐   │                                                 │
//!  sender B ──┼──►│ WriteOnlyMailbox ──► [frame][frame][frame] ──►  │──► ReadOnlyMailbox ──► actor
//!  sender C ──┘   │   add_frame()          Mutex<Vec<Frame>>        │      remove_frames()
//!                 └─────────────────────────────────────────────────┘
//! ```
//!
//! Handles hold a `Weak` reference: once the owner drops the mailbox, writes
//! are discarded and reads come back empty. Any number of writers may push
//! concurrently; a read takes the whole queue in one swap.

use crate::key::ActorKey;
use crate::message::MessageFrame;
use crate::fatal_assert;
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

#[derive(Default)]
struct FrameQueue {
    frames: Mutex<Vec<MessageFrame>>,
}

impl FrameQueue {
    fn push(&self, frame: MessageFrame) {
        fatal_assert!(!frame.is_empty(), "empty frame from {}", frame.source());
        self.frames.lock().push(frame);
    }

    fn drain(&self) -> Vec<MessageFrame> {
        std::mem::take(&mut *self.frames.lock())
    }
}

/// Owning side of an actor's mailbox
pub struct Mailbox {
    owner: ActorKey,
    queue: Arc<FrameQueue>,
}

impl Mailbox {
    pub fn new(owner: ActorKey) -> Self {
        Self {
            owner,
            queue: Arc::new(FrameQueue::default()),
        }
    }

    pub fn owner(&self) -> ActorKey {
        self.owner
    }

    pub fn writer(&self) -> WriteOnlyMailbox {
        WriteOnlyMailbox {
            owner: self.owner,
            queue: Arc::downgrade(&self.queue),
        }
    }

    pub fn reader(&self) -> ReadOnlyMailbox {
        ReadOnlyMailbox {
            owner: self.owner,
            queue: Arc::downgrade(&self.queue),
        }
    }

    /// Enqueue directly as the owner
    pub fn add_frame(&self, frame: MessageFrame) {
        fatal_assert!(!frame.is_empty(), "empty frame from {}", frame.source());
        self.queue.push(frame);
    }

    /// Frames currently queued
    pub fn pending_frames(&self) -> usize {
        self.queue.frames.lock().len()
    }
}

impl fmt::Debug for Mailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("owner", &self.owner)
            .field("pending_frames", &self.pending_frames())
            .finish()
    }
}

/// Enqueue-only handle to another actor's mailbox
#[derive(Clone)]
pub struct WriteOnlyMailbox {
    owner: ActorKey,
    queue: Weak<FrameQueue>,
}

impl WriteOnlyMailbox {
    /// Identity of the actor that reads this mailbox
    pub fn owner(&self) -> ActorKey {
        self.owner
    }

    /// Enqueue a frame. Returns `false` when the mailbox no longer exists.
    ///
    /// Empty frames are a protocol violation.
    pub fn add_frame(&self, frame: MessageFrame) -> bool {
        fatal_assert!(!frame.is_empty(), "empty frame from {}", frame.source());
        match self.queue.upgrade() {
            Some(queue) => {
                queue.push(frame);
                true
            }
            None => false,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.queue.strong_count() > 0
    }
}

impl fmt::Debug for WriteOnlyMailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriteOnlyMailbox")
            .field("owner", &self.owner)
            .field("connected", &self.is_connected())
            .finish()
    }
}

/// Drain-only handle to an actor's own mailbox
pub struct ReadOnlyMailbox {
    owner: ActorKey,
    queue: Weak<FrameQueue>,
}

impl ReadOnlyMailbox {
    pub fn owner(&self) -> ActorKey {
        self.owner
    }

    /// Take every queued frame, oldest first
    pub fn remove_frames(&self) -> Vec<MessageFrame> {
        self.queue
            .upgrade()
            .map(|queue| queue.drain())
            .unwrap_or_default()
    }
}

impl fmt::Debug for ReadOnlyMailbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReadOnlyMailbox")
            .field("owner", &self.owner)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::key::Subject;
    use crate::message::{downcast_ref, Message};
    use std::thread;

    #[derive(Debug)]
    struct Note(usize);
    impl Message for Note {}

    fn frame(source: ActorKey, value: usize) -> MessageFrame {
        let mut frame = MessageFrame::new(source);
        frame.push(Arc::new(Note(value)));
        frame
    }

    fn owner() -> ActorKey {
        ActorKey::new(Subject::Logic, 1, 1)
    }

    #[test]
    fn test_frames_drain_in_enqueue_order() {
        let mailbox = Mailbox::new(owner());
        let writer = mailbox.writer();
        let reader = mailbox.reader();

        for value in 0..3 {
            assert!(writer.add_frame(frame(owner(), value)));
        }
        let frames = reader.remove_frames();
        assert_eq!(frames.len(), 3);
        for (expected, frame) in frames.iter().enumerate() {
            let note = downcast_ref::<Note>(&frame.messages()[0]);
            assert_eq!(note.map(|n| n.0), Some(expected));
        }
        assert!(reader.remove_frames().is_empty());
    }

    #[test]
    fn test_handles_outlived_by_owner() {
        let mailbox = Mailbox::new(owner());
        let writer = mailbox.writer();
        let reader = mailbox.reader();
        drop(mailbox);

        assert!(!writer.is_connected());
        assert!(!writer.add_frame(frame(owner(), 1)));
        assert!(reader.remove_frames().is_empty());
    }

    #[test]
    #[should_panic(expected = "empty frame")]
    fn test_empty_frame_is_fatal() {
        let mailbox = Mailbox::new(owner());
        mailbox.writer().add_frame(MessageFrame::new(owner()));
    }

    #[test]
    fn test_concurrent_writers() {
        let mailbox = Mailbox::new(owner());
        let writers: Vec<_> = (0..4)
            .map(|w| {
                let writer = mailbox.writer();
                thread::spawn(move || {
                    let source = ActorKey::new(Subject::Ai, 1, w + 1);
                    for value in 0..100 {
                        writer.add_frame(frame(source, value));
                    }
                })
            })
            .collect();
        for handle in writers {
            handle.join().unwrap();
        }

        let frames = mailbox.reader().remove_frames();
        assert_eq!(frames.len(), 400);

        // Per-writer order survives interleaving
        for w in 1..=4u16 {
            let values: Vec<usize> = frames
                .iter()
                .filter(|f| f.source().minor() == w)
                .filter_map(|f| downcast_ref::<Note>(&f.messages()[0]).map(|n| n.0))
                .collect();
            assert_eq!(values, (0..100).collect::<Vec<_>>());
        }
    }
}
