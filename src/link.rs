//! Unbuffered, blocking rendezvous links between pipeline tasks.
//!
//! A link has capacity zero: `send` blocks until the paired `recv` is issued
//! on the opposite endpoint and vice versa, so data moves only at a
//! synchronized handoff. Operations on one link are FIFO in issue order per
//! side; the link enforces nothing beyond pairwise rendezvous. Which side
//! sends or receives in which order is a contract between the two connected
//! tasks — violating it deadlocks the pipeline, a fatal configuration error
//! rather than something detected at runtime.

use crossbeam_channel::{Receiver, Sender, bounded};

/// The peer endpoint was dropped; for a forever-running graph this only
/// happens at shutdown, and worker loops treat it as the exit signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Disconnected;

/// Sending half of a link. Owned by exactly one task; deliberately not
/// clonable so an endpoint cannot be aliased across tasks.
pub struct LinkSender<T>(Sender<T>);

/// Receiving half of a link. Owned by exactly one task.
pub struct LinkReceiver<T>(Receiver<T>);

/// Allocates a rendezvous link and returns its two endpoints. Topology
/// builders are the single place links are allocated and paired.
pub fn link<T>() -> (LinkSender<T>, LinkReceiver<T>) {
    let (tx, rx) = bounded(0);
    (LinkSender(tx), LinkReceiver(rx))
}

impl<T> LinkSender<T> {
    /// Blocks until the paired receive occurs, then moves `value` across.
    pub fn send(&self, value: T) -> Result<(), Disconnected> {
        self.0.send(value).map_err(|_| Disconnected)
    }
}

impl<T> LinkReceiver<T> {
    /// Blocks until the paired send occurs and returns the moved value.
    pub fn recv(&self) -> Result<T, Disconnected> {
        self.0.recv().map_err(|_| Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::thread;
    use std::time::Duration;

    #[test]
    fn test_send_blocks_until_receive() {
        let (tx, rx) = link::<i32>();
        let delivered = Arc::new(AtomicBool::new(false));
        let flag = delivered.clone();

        let sender = thread::spawn(move || {
            tx.send(7).unwrap();
            flag.store(true, Ordering::SeqCst);
        });

        // No receive has been issued yet; the send must still be parked.
        thread::sleep(Duration::from_millis(50));
        assert!(!delivered.load(Ordering::SeqCst));

        assert_eq!(rx.recv().unwrap(), 7);
        sender.join().unwrap();
        assert!(delivered.load(Ordering::SeqCst));
    }

    #[test]
    fn test_fifo_in_issue_order() {
        let (tx, rx) = link::<usize>();
        let sender = thread::spawn(move || {
            for i in 0..100 {
                tx.send(i).unwrap();
            }
        });

        for i in 0..100 {
            assert_eq!(rx.recv().unwrap(), i);
        }
        sender.join().unwrap();
    }

    #[test]
    fn test_drop_receiver_disconnects_sender() {
        let (tx, rx) = link::<i32>();
        drop(rx);
        assert_eq!(tx.send(1), Err(Disconnected));
    }

    #[test]
    fn test_drop_sender_disconnects_receiver() {
        let (tx, rx) = link::<i32>();
        drop(tx);
        assert_eq!(rx.recv(), Err(Disconnected));
    }

    #[test]
    fn test_values_move_not_copy() {
        let (tx, rx) = link::<Vec<i32>>();
        let handle = thread::spawn(move || {
            tx.send(vec![1, 2, 3]).unwrap();
        });
        assert_eq!(rx.recv().unwrap(), vec![1, 2, 3]);
        handle.join().unwrap();
    }
}
