//! Single-threaded event loop for the standalone host.
//!
//! Timers and cross-thread messages (file watcher events, signals) are both
//! handled on the thread that calls [`EventLoop::run`], so every engine
//! callback runs there and nowhere else.

use std::cell::{Cell, RefCell};
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::ops::ControlFlow;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::time::{Duration, Instant};

/// Messages other threads send to the loop.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopMessage {
    /// A watched file was created, modified or removed
    DocumentChanged(PathBuf),
    /// Stop the running cycle and start a fresh one (SIGHUP)
    Restart,
    /// Leave the loop (SIGINT, SIGTERM)
    Shutdown,
}

struct Timer {
    deadline: Instant,
    seq: u64,
    callback: Box<dyn FnOnce()>,
}

impl PartialEq for Timer {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}

impl Eq for Timer {}

impl PartialOrd for Timer {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Timer {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.deadline, self.seq).cmp(&(other.deadline, other.seq))
    }
}

// Upper bound on a single blocking wait when no timer is queued
const IDLE_WAIT: Duration = Duration::from_secs(60);

pub struct EventLoop {
    timers: RefCell<BinaryHeap<Reverse<Timer>>>,
    next_seq: Cell<u64>,
    sender: Sender<LoopMessage>,
    receiver: Receiver<LoopMessage>,
}

impl Default for EventLoop {
    fn default() -> Self {
        Self::new()
    }
}

impl EventLoop {
    pub fn new() -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            timers: RefCell::new(BinaryHeap::new()),
            next_seq: Cell::new(0),
            sender,
            receiver,
        }
    }

    /// Sender for threads that need to wake the loop.
    pub fn sender(&self) -> Sender<LoopMessage> {
        self.sender.clone()
    }

    /// Queue `callback` to run once after `delay`. Timers with the same
    /// deadline run in the order they were scheduled.
    pub fn schedule(&self, delay: Duration, callback: Box<dyn FnOnce()>) {
        let seq = self.next_seq.get();
        self.next_seq.set(seq + 1);
        self.timers.borrow_mut().push(Reverse(Timer {
            deadline: Instant::now() + delay,
            seq,
            callback,
        }));
    }

    pub fn pending_timers(&self) -> usize {
        self.timers.borrow().len()
    }

    /// Run every timer whose deadline has passed. Returns how many ran.
    pub fn run_due_timers(&self) -> usize {
        let mut ran = 0;
        loop {
            let now = Instant::now();
            // The borrow must end before the callback, which may schedule more
            let timer = {
                let mut timers = self.timers.borrow_mut();
                match timers.peek() {
                    Some(Reverse(timer)) if timer.deadline <= now => timers.pop(),
                    _ => None,
                }
            };
            let Some(Reverse(timer)) = timer else {
                return ran;
            };
            (timer.callback)();
            ran += 1;
        }
    }

    fn next_wait(&self) -> Duration {
        self.timers
            .borrow()
            .peek()
            .map(|Reverse(timer)| timer.deadline.saturating_duration_since(Instant::now()))
            .unwrap_or(IDLE_WAIT)
    }

    /// Run timers and hand messages to `on_message` until it breaks.
    pub fn run<F>(&self, mut on_message: F)
    where
        F: FnMut(LoopMessage) -> ControlFlow<()>,
    {
        loop {
            self.run_due_timers();

            match self.receiver.recv_timeout(self.next_wait()) {
                Ok(message) => {
                    if on_message(message).is_break() {
                        return;
                    }
                }
                Err(RecvTimeoutError::Timeout) => {}
                // Unreachable while we hold a sender ourselves
                Err(RecvTimeoutError::Disconnected) => return,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    #[test]
    fn test_timers_run_in_deadline_then_schedule_order() {
        let event_loop = EventLoop::new();
        let order = Rc::new(RefCell::new(Vec::new()));

        for (delay, label) in [(20, "late"), (0, "first"), (0, "second")] {
            let order = Rc::clone(&order);
            event_loop.schedule(
                Duration::from_millis(delay),
                Box::new(move || order.borrow_mut().push(label)),
            );
        }

        assert_eq!(event_loop.run_due_timers(), 2);
        assert_eq!(*order.borrow(), vec!["first", "second"]);
        assert_eq!(event_loop.pending_timers(), 1);

        std::thread::sleep(Duration::from_millis(30));
        assert_eq!(event_loop.run_due_timers(), 1);
        assert_eq!(*order.borrow(), vec!["first", "second", "late"]);
    }

    #[test]
    fn test_callbacks_can_schedule_more_work() {
        let event_loop = Rc::new(EventLoop::new());
        let ran = Rc::new(Cell::new(false));

        let inner_loop = Rc::clone(&event_loop);
        let inner_ran = Rc::clone(&ran);
        event_loop.schedule(
            Duration::ZERO,
            Box::new(move || {
                inner_loop.schedule(Duration::ZERO, Box::new(move || inner_ran.set(true)));
            }),
        );

        assert_eq!(event_loop.run_due_timers(), 2);
        assert!(ran.get());
    }

    #[test]
    fn test_run_stops_on_shutdown_from_another_thread() {
        let event_loop = EventLoop::new();
        let sender = event_loop.sender();
        std::thread::spawn(move || {
            let _ = sender.send(LoopMessage::DocumentChanged(PathBuf::from("a.json")));
            let _ = sender.send(LoopMessage::Shutdown);
        });

        let mut seen = Vec::new();
        event_loop.run(|message| {
            let stop = message == LoopMessage::Shutdown;
            seen.push(message);
            if stop {
                ControlFlow::Break(())
            } else {
                ControlFlow::Continue(())
            }
        });

        assert_eq!(
            seen,
            vec![
                LoopMessage::DocumentChanged(PathBuf::from("a.json")),
                LoopMessage::Shutdown
            ]
        );
    }
}
