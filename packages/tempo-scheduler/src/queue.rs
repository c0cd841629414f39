use crate::heap::{HeapNode, MinHeap};
use crate::priority::Priority;
use crate::profiling::{Profiler, ProfilingEvent};
use crate::task::{Callback, QueueKind, Task, TaskHandle, TaskKey};
use slotmap::SlotMap;

#[derive(Debug, Clone, Copy)]
pub(crate) struct QueueEntry {
    id: u64,
    sort_index: f64,
    key: TaskKey,
}

impl HeapNode for QueueEntry {
    fn id(&self) -> u64 {
        self.id
    }

    fn sort_index(&self) -> f64 {
        self.sort_index
    }
}

/// The ready queue and the delay queue, plus the task records both point into.
///
/// A record leaves `tasks` only when its entry is popped off a heap, so a
/// cancelled task keeps its slot until the queue reaches it.
pub(crate) struct TaskQueues {
    tasks: SlotMap<TaskKey, Task>,
    ready: MinHeap<QueueEntry>,
    delayed: MinHeap<QueueEntry>,
    next_id: u64,
}

impl TaskQueues {
    pub fn new() -> Self {
        Self {
            tasks: SlotMap::with_key(),
            ready: MinHeap::new(),
            delayed: MinHeap::new(),
            next_id: 1,
        }
    }

    pub fn insert(
        &mut self,
        callback: Callback,
        priority: Priority,
        start_time: f64,
        expiration_time: f64,
        queue: QueueKind,
    ) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;

        let sort_index = match queue {
            QueueKind::Delay => start_time,
            QueueKind::Ready => expiration_time,
        };
        let key = self.tasks.insert(Task {
            id,
            callback: Some(callback),
            priority,
            start_time,
            expiration_time,
            sort_index,
            queue,
            cancelled: false,
            is_queued: false,
        });

        let entry = QueueEntry { id, sort_index, key };
        match queue {
            QueueKind::Delay => self.delayed.push(entry),
            QueueKind::Ready => self.ready.push(entry),
        }
        TaskHandle { key, id }
    }

    pub fn get(&self, handle: &TaskHandle) -> Option<&Task> {
        self.tasks.get(handle.key).filter(|task| task.id == handle.id)
    }

    pub fn get_mut(&mut self, handle: &TaskHandle) -> Option<&mut Task> {
        self.tasks
            .get_mut(handle.key)
            .filter(|task| task.id == handle.id)
    }

    pub fn peek_ready(&self) -> Option<TaskHandle> {
        self.ready.peek().map(|entry| TaskHandle {
            key: entry.key,
            id: entry.id,
        })
    }

    pub fn peek_delayed(&self) -> Option<TaskHandle> {
        self.delayed.peek().map(|entry| TaskHandle {
            key: entry.key,
            id: entry.id,
        })
    }

    /// Start time of the earliest delayed task, cancelled or not.
    pub fn first_timer_start(&self) -> Option<f64> {
        self.delayed
            .peek()
            .and_then(|entry| self.tasks.get(entry.key))
            .map(|task| task.start_time)
    }

    /// Pops the ready-queue head and drops its record.
    pub fn pop_ready(&mut self) -> Option<Task> {
        let entry = self.ready.pop()?;
        self.tasks.remove(entry.key)
    }

    pub fn ready_len(&self) -> usize {
        self.ready.len()
    }

    pub fn delayed_len(&self) -> usize {
        self.delayed.len()
    }

    /// Moves every delayed task whose start time has come into the ready queue.
    ///
    /// Returns how many tasks were promoted.
    pub fn advance_timers(&mut self, now: f64, profiler: &mut Profiler) -> usize {
        let mut promoted = 0;
        while let Some(entry) = self.delayed.peek().copied() {
            let Some(timer) = self.tasks.get_mut(entry.key) else {
                self.delayed.pop();
                continue;
            };

            if timer.callback.is_none() {
                // Timer was cancelled.
                self.delayed.pop();
                self.tasks.remove(entry.key);
            } else if timer.start_time <= now {
                self.delayed.pop();
                timer.sort_index = timer.expiration_time;
                timer.queue = QueueKind::Ready;
                if profiler.is_enabled() {
                    timer.is_queued = true;
                    profiler.record(ProfilingEvent::TaskStart {
                        id: timer.id,
                        priority: timer.priority,
                        time: now,
                    });
                }
                self.ready.push(QueueEntry {
                    id: timer.id,
                    sort_index: timer.sort_index,
                    key: entry.key,
                });
                promoted += 1;
            } else {
                // Remaining timers are pending.
                break;
            }
        }

        if promoted > 0 {
            tracing::debug!("promoted {} delayed task(s) at {:.3}", promoted, now);
        }
        promoted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::Status;

    fn noop() -> Callback {
        Box::new(|_| Status::Done)
    }

    fn delayed(queues: &mut TaskQueues, start: f64) -> TaskHandle {
        queues.insert(
            noop(),
            Priority::Normal,
            start,
            start + Priority::Normal.timeout(),
            QueueKind::Delay,
        )
    }

    #[test]
    fn test_ids_follow_creation_order() {
        let mut queues = TaskQueues::new();
        let a = queues.insert(noop(), Priority::Normal, 0.0, 5000.0, QueueKind::Ready);
        let b = delayed(&mut queues, 10.0);
        let c = queues.insert(noop(), Priority::Low, 0.0, 10000.0, QueueKind::Ready);
        assert_eq!((a.id(), b.id(), c.id()), (1, 2, 3));
    }

    #[test]
    fn test_promotion_waits_for_start_time() {
        let mut queues = TaskQueues::new();
        let mut profiler = Profiler::new(false, 1);
        let handle = delayed(&mut queues, 100.0);

        assert_eq!(queues.advance_timers(99.0, &mut profiler), 0);
        assert_eq!(queues.ready_len(), 0);
        assert_eq!(queues.get(&handle).unwrap().sort_index, 100.0);

        assert_eq!(queues.advance_timers(100.0, &mut profiler), 1);
        assert_eq!(queues.delayed_len(), 0);
        assert_eq!(queues.peek_ready(), Some(handle));

        let task = queues.get(&handle).unwrap();
        assert_eq!(task.queue, QueueKind::Ready);
        assert_eq!(task.sort_index, task.expiration_time);
        assert_eq!(task.sort_index, 5100.0);
    }

    #[test]
    fn test_promotion_stops_at_first_pending_timer() {
        let mut queues = TaskQueues::new();
        let mut profiler = Profiler::new(false, 1);
        let late = delayed(&mut queues, 300.0);
        let early = delayed(&mut queues, 50.0);
        let middle = delayed(&mut queues, 200.0);

        assert_eq!(queues.advance_timers(250.0, &mut profiler), 2);
        assert_eq!(queues.peek_ready(), Some(early));
        assert_eq!(queues.first_timer_start(), Some(300.0));
        assert_eq!(queues.get(&middle).unwrap().queue, QueueKind::Ready);
        assert_eq!(queues.get(&late).unwrap().queue, QueueKind::Delay);
    }

    #[test]
    fn test_cancelled_timers_are_discarded() {
        let mut queues = TaskQueues::new();
        let mut profiler = Profiler::new(false, 1);
        let cancelled = delayed(&mut queues, 10.0);
        let kept = delayed(&mut queues, 20.0);
        queues.get_mut(&cancelled).unwrap().callback = None;

        assert_eq!(queues.advance_timers(5.0, &mut profiler), 0);
        assert_eq!(queues.delayed_len(), 1);
        assert!(queues.get(&cancelled).is_none());
        assert_eq!(queues.first_timer_start(), Some(20.0));
        assert!(queues.get(&kept).is_some());
    }

    #[test]
    fn test_pop_ready_releases_record() {
        let mut queues = TaskQueues::new();
        let handle = queues.insert(noop(), Priority::Immediate, 0.0, -1.0, QueueKind::Ready);
        let task = queues.pop_ready().unwrap();
        assert_eq!(task.id, handle.id());
        assert!(queues.get(&handle).is_none());
        assert!(queues.pop_ready().is_none());
    }
}
