//! Repeating engine jobs and the tick-driven scheduler that fires them.

/// A job the engine runs on the host's main thread.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EngineJob {
    /// Server tick (and random tick) for every tickable instance.
    Tick,
    /// Re-persist every live instance.
    Autosave,
}

/// "Run `job` after `delay` ticks, then every `period` ticks."
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RepeatingTask {
    /// What to run.
    pub job: EngineJob,
    /// Ticks before the first run; 0 runs on the next tick.
    pub delay: u64,
    /// Ticks between runs; 0 is treated as 1.
    pub period: u64,
}

/// The host's repeating-task primitive.
pub trait Scheduler {
    /// Registers `task`. Tasks are never cancelled.
    fn schedule_repeating(&mut self, task: RepeatingTask);
}

#[derive(Clone, Copy, Debug)]
struct Slot {
    task: RepeatingTask,
    next_due: u64,
}

/// A [`Scheduler`] the host advances once per server tick.
///
/// A task with delay `d` first fires on the advance that brings the tick
/// counter to `d` (a delay of 0 fires on the first advance) and then every
/// `period` ticks. A period of 0 is treated as 1.
#[derive(Debug, Default)]
pub struct TickScheduler {
    slots: Vec<Slot>,
    total_ticks: u64,
}

impl TickScheduler {
    /// Creates a scheduler with no tasks at tick 0.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves one tick forward and returns the jobs due on it, in the order
    /// their tasks were scheduled.
    pub fn advance(&mut self) -> Vec<EngineJob> {
        self.total_ticks += 1;
        let now = self.total_ticks;
        let mut due = Vec::new();
        for slot in &mut self.slots {
            if slot.next_due <= now {
                due.push(slot.task.job);
                slot.next_due = now + slot.task.period.max(1);
            }
        }
        due
    }

    /// Number of advances since creation.
    pub fn total_ticks(&self) -> u64 {
        self.total_ticks
    }

    /// Number of scheduled tasks.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Returns `true` if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

impl Scheduler for TickScheduler {
    fn schedule_repeating(&mut self, task: RepeatingTask) {
        tracing::debug!(
            "Scheduled {:?}: delay {} ticks, period {} ticks",
            task.job,
            task.delay,
            task.period
        );
        self.slots.push(Slot {
            task,
            next_due: self.total_ticks + task.delay.max(1),
        });
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
