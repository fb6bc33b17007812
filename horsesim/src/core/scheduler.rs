use crate::core::program::ProgramId;
use std::collections::HashMap;

/// TickHandle is a recurring timer armed for one program.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickHandle {
    pub interval_ms: u64,
    pub next_due_ms: u64,
}

/// TickScheduler keeps one recurring timer per program on a virtual clock. Time only moves when
/// the owner advances it, so races can be stepped without waiting on real timers.
#[derive(Debug, Default, Clone)]
pub struct TickScheduler {
    now_ms: u64,
    handles: HashMap<ProgramId, TickHandle>,
}

impl TickScheduler {
    pub fn new() -> TickScheduler {
        TickScheduler::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    /// arm registers a recurring timer that first fires one interval from now. An already armed
    /// timer of the program is replaced.
    pub fn arm(&mut self, program_id: ProgramId, interval_ms: u64) -> TickHandle {
        let interval_ms = interval_ms.max(1);
        let handle = TickHandle {
            interval_ms,
            next_due_ms: self.now_ms.saturating_add(interval_ms),
        };
        self.handles.insert(program_id, handle);
        handle
    }

    /// cancel removes the timer of the program. Returns false if none was armed.
    pub fn cancel(&mut self, program_id: ProgramId) -> bool {
        self.handles.remove(&program_id).is_some()
    }

    pub fn cancel_all(&mut self) {
        self.handles.clear();
    }

    pub fn is_armed(&self, program_id: ProgramId) -> bool {
        self.handles.contains_key(&program_id)
    }

    /// pop_due returns the next timer due at or before `until_ms`, moves the clock to its due time
    /// and reschedules it one interval later. Timers due at the same time fire in program id order.
    /// Timers may be cancelled between two calls. Due times saturate at the end of the clock.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<ProgramId> {
        let (&program_id, _) = self
            .handles
            .iter()
            .filter(|(_, handle)| handle.next_due_ms <= until_ms)
            .min_by_key(|&(&id, handle)| (handle.next_due_ms, id))?;

        let handle = self.handles.get_mut(&program_id)?;
        self.now_ms = self.now_ms.max(handle.next_due_ms);
        handle.next_due_ms = handle.next_due_ms.saturating_add(handle.interval_ms);

        Some(program_id)
    }

    /// skip_to reschedules every timer due at or before `until_ms` to its first due time after
    /// `until_ms` without firing it.
    pub fn skip_to(&mut self, until_ms: u64) {
        for handle in self.handles.values_mut() {
            if handle.next_due_ms <= until_ms {
                let missed = (until_ms - handle.next_due_ms) / handle.interval_ms + 1;
                handle.next_due_ms = handle
                    .next_due_ms
                    .saturating_add(missed.saturating_mul(handle.interval_ms));
            }
        }
    }

    /// advance_to moves the clock forward without firing anything. The clock never goes back.
    pub fn advance_to(&mut self, t_ms: u64) {
        self.now_ms = self.now_ms.max(t_ms);
    }
}
