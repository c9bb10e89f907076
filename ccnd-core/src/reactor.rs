//! Single-threaded, poll-only event loop (spec §4.A, §5).
//!
//! The reactor owns a `mio::Poll`, a table of registered I/O interests and a
//! min-heap of scheduled events keyed by deadline. Nothing in this module
//! may block except the call to `Poll::poll` itself.

use mio::{Events, Poll, Token};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

/// What a scheduled event's callback returns.
pub enum EventOutcome {
    /// The event fired once and should not be rescheduled.
    Done,
    /// Reschedule after `Duration` from now.
    Reschedule(Duration),
}

/// A pending scheduled event. Ordered by deadline (min-heap via `Reverse`
/// semantics baked into `Ord`), with a monotonic sequence number as a FIFO
/// tiebreak among equal deadlines (spec §5: "events with equal deadlines
/// fire in scheduling order").
struct ScheduledEvent {
    deadline: Instant,
    seq: u64,
    id: u64,
    callback: Box<dyn FnMut(bool) -> EventOutcome>,
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.deadline == other.deadline && self.seq == other.seq
    }
}
impl Eq for ScheduledEvent {}

impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest deadline sorts highest.
        other.deadline.cmp(&self.deadline).then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Handle returned by `Reactor::schedule`, usable with `Reactor::cancel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerId(pub u64);

/// Floor applied to the poll timeout once two zero-delay rounds happen back
/// to back, so a badly-behaved handler that keeps rescheduling at 0 cannot
/// busy-loop the process (spec §4.A step 3).
const BUSY_LOOP_FLOOR: Duration = Duration::from_millis(1);

pub struct Reactor {
    poll: Poll,
    events: Events,
    heap: BinaryHeap<ScheduledEvent>,
    cancelled: std::collections::HashSet<u64>,
    next_seq: u64,
    next_timer_id: u64,
    zero_delay_rounds: u32,
    running: bool,
}

impl Reactor {
    pub fn new() -> std::io::Result<Self> {
        Ok(Self {
            poll: Poll::new()?,
            events: Events::with_capacity(1024),
            heap: BinaryHeap::new(),
            cancelled: std::collections::HashSet::new(),
            next_seq: 0,
            next_timer_id: 0,
            zero_delay_rounds: 0,
            running: true,
        })
    }

    pub fn poll_registry(&self) -> &mio::Registry {
        self.poll.registry()
    }

    /// Schedule `callback` to fire after `delay`. Returns a handle that can
    /// be passed to `cancel`.
    pub fn schedule(
        &mut self,
        delay: Duration,
        callback: impl FnMut(bool) -> EventOutcome + 'static,
    ) -> TimerId {
        let id = self.next_timer_id;
        self.next_timer_id += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.heap.push(ScheduledEvent {
            deadline: Instant::now() + delay,
            seq,
            id,
            callback: Box::new(callback),
        });
        TimerId(id)
    }

    /// Mark a timer cancelled. The callback still runs once (with
    /// `cancel == true`) so it can free any state it owns (spec §5
    /// cancellation contract), but is never rescheduled after that.
    pub fn cancel(&mut self, id: TimerId) {
        self.cancelled.insert(id.0);
    }

    pub fn stop(&mut self) {
        self.running = false;
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Run all events whose deadline has passed. Returns the delay until the
    /// next pending event, or `None` if the heap is empty.
    fn run_due_events(&mut self) -> Option<Duration> {
        let now = Instant::now();
        loop {
            match self.heap.peek() {
                Some(ev) if ev.deadline <= now => {
                    let mut ev = self.heap.pop().unwrap();
                    let cancelled = self.cancelled.remove(&ev.id);
                    match (ev.callback)(cancelled) {
                        EventOutcome::Done => {}
                        EventOutcome::Reschedule(delay) if !cancelled => {
                            let seq = self.next_seq;
                            self.next_seq += 1;
                            self.heap.push(ScheduledEvent {
                                deadline: Instant::now() + delay,
                                seq,
                                id: ev.id,
                                callback: ev.callback,
                            });
                        }
                        EventOutcome::Reschedule(_) => {}
                    }
                }
                _ => break,
            }
        }
        self.heap.peek().map(|ev| ev.deadline.saturating_duration_since(Instant::now()))
    }

    /// Run one iteration: drain due scheduled events, compute the poll
    /// timeout, poll, and hand the caller the fired I/O events to dispatch.
    ///
    /// `dispatch` is called once per iteration with the set of ready mio
    /// events; it is the caller's job to route POLLIN/POLLOUT/POLLERR to the
    /// right face (spec §4.A steps 4-5: face-table dispatch is out of this
    /// module's concern, it only drives the loop).
    pub fn run_once(&mut self, mut dispatch: impl FnMut(&Events)) -> std::io::Result<()> {
        let next_delay = self.run_due_events();

        let mut timeout = next_delay;
        if let Some(d) = timeout {
            if d.is_zero() {
                self.zero_delay_rounds += 1;
                if self.zero_delay_rounds >= 2 {
                    timeout = Some(BUSY_LOOP_FLOOR);
                }
            } else {
                self.zero_delay_rounds = 0;
            }
        } else {
            self.zero_delay_rounds = 0;
        }

        self.poll.poll(&mut self.events, timeout)?;
        if !self.events.is_empty() {
            dispatch(&self.events);
        }
        // run any events whose deadline now falls within this same tick
        self.run_due_events();
        Ok(())
    }

    pub fn register(
        &self,
        source: &mut impl mio::event::Source,
        token: Token,
        interests: mio::Interest,
    ) -> std::io::Result<()> {
        self.poll.registry().register(source, token, interests)
    }

    pub fn reregister(
        &self,
        source: &mut impl mio::event::Source,
        token: Token,
        interests: mio::Interest,
    ) -> std::io::Result<()> {
        self.poll.registry().reregister(source, token, interests)
    }

    pub fn deregister(&self, source: &mut impl mio::event::Source) -> std::io::Result<()> {
        self.poll.registry().deregister(source)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[test]
    fn scheduled_events_fire_in_deadline_then_fifo_order() {
        let mut reactor = Reactor::new().unwrap();
        let order = Rc::new(RefCell::new(Vec::new()));

        let o1 = order.clone();
        reactor.schedule(Duration::from_millis(0), move |_| {
            o1.borrow_mut().push(1);
            EventOutcome::Done
        });
        let o2 = order.clone();
        reactor.schedule(Duration::from_millis(0), move |_| {
            o2.borrow_mut().push(2);
            EventOutcome::Done
        });

        reactor.run_once(|_| {}).unwrap();
        assert_eq!(*order.borrow(), vec![1, 2]);
    }

    #[test]
    fn cancelled_timer_runs_once_with_cancel_flag_and_does_not_reschedule() {
        let mut reactor = Reactor::new().unwrap();
        let seen_cancel = Rc::new(RefCell::new(false));
        let fire_count = Rc::new(RefCell::new(0));

        let seen = seen_cancel.clone();
        let count = fire_count.clone();
        let id = reactor.schedule(Duration::from_millis(0), move |cancelled| {
            *seen.borrow_mut() = cancelled;
            *count.borrow_mut() += 1;
            EventOutcome::Reschedule(Duration::from_millis(0))
        });
        reactor.cancel(id);
        reactor.run_once(|_| {}).unwrap();
        assert!(*seen_cancel.borrow());
        assert_eq!(*fire_count.borrow(), 1);
    }
}
