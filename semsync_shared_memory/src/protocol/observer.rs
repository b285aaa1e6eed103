//! Hooks invoked from inside the critical sections

use crate::buffer::Snapshot;
use parking_lot::Mutex;

/// Observer of completed passes.
///
/// Both hooks run while the role still holds its gate, so the order of calls
/// across roles is the order in which critical sections were entered. Keep
/// implementations short: they extend the critical section.
pub trait PassObserver: Sync {
    /// Producer finished writing pass `pass`
    fn pass_written(&self, _pass: u32) {}

    /// Consumer finished copying pass `pass`
    fn pass_read(&self, _pass: u32, _snapshot: &Snapshot) {}
}

impl PassObserver for () {}

/// One recorded critical section
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassEvent {
    /// Write pass by the producer
    Written(u32),
    /// Read pass by the consumer, with what it copied
    Read(u32, Snapshot),
}

/// Observer keeping every pass in entry order
#[derive(Debug, Default)]
pub struct PassRecorder {
    events: Mutex<Vec<PassEvent>>,
}

impl PassRecorder {
    /// Empty recorder
    pub fn new() -> Self {
        Self::default()
    }

    /// All events so far
    pub fn events(&self) -> Vec<PassEvent> {
        self.events.lock().clone()
    }

    /// Snapshots of all read passes
    pub fn snapshots(&self) -> Vec<Snapshot> {
        self.events
            .lock()
            .iter()
            .filter_map(|event| match event {
                PassEvent::Read(_, snapshot) => Some(*snapshot),
                PassEvent::Written(_) => None,
            })
            .collect()
    }

    /// Whether the history is write 0, read 0, write 1, read 1, ...
    pub fn is_strictly_alternating(&self) -> bool {
        let events = self.events.lock();
        events.len() % 2 == 0
            && events.iter().enumerate().all(|(i, event)| {
                let pass = (i / 2) as u32;
                match event {
                    PassEvent::Written(n) => i % 2 == 0 && *n == pass,
                    PassEvent::Read(n, _) => i % 2 == 1 && *n == pass,
                }
            })
    }
}

impl PassObserver for PassRecorder {
    fn pass_written(&self, pass: u32) {
        self.events.lock().push(PassEvent::Written(pass));
    }

    fn pass_read(&self, pass: u32, snapshot: &Snapshot) {
        self.events.lock().push(PassEvent::Read(pass, *snapshot));
    }
}
