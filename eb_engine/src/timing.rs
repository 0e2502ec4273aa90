//! Sleep helpers and cancellable delayed actions on the local task set.
//!
//! Everything here runs on a current-thread runtime inside a `LocalSet`;
//! spawning outside one panics.

use std::time::Duration;

use tokio::task::JoinHandle;

pub async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Length of one step when `total_ms` is split into `steps` slices.
pub fn step_interval(total_ms: u64, steps: u32) -> Duration {
    Duration::from_millis(total_ms) / steps.max(1)
}

/// Action scheduled to run once after a delay unless cancelled first.
#[derive(Debug)]
pub struct ScheduledTask {
    label: String,
    handle: JoinHandle<()>,
}

impl ScheduledTask {
    pub fn after<F>(label: impl Into<String>, delay: Duration, action: F) -> Self
    where
        F: FnOnce() + 'static,
    {
        let handle = tokio::task::spawn_local(async move {
            tokio::time::sleep(delay).await;
            action();
        });
        Self {
            label: label.into(),
            handle,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn cancel(&self) {
        self.handle.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}

#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: Vec<ScheduledTask>,
}

impl TaskGroup {
    pub fn push(&mut self, task: ScheduledTask) {
        self.tasks.retain(|existing| !existing.is_finished());
        self.tasks.push(task);
    }

    /// Number of scheduled actions that have not run or been cancelled.
    pub fn pending(&self) -> usize {
        self.tasks.iter().filter(|task| !task.is_finished()).count()
    }

    pub fn pending_labels(&self) -> Vec<String> {
        self.tasks
            .iter()
            .filter(|task| !task.is_finished())
            .map(|task| task.label.clone())
            .collect()
    }

    /// Cancels everything still pending and empties the group.
    pub fn cancel_all(&mut self) -> usize {
        let pending = self.pending();
        for task in self.tasks.drain(..) {
            task.cancel();
        }
        pending
    }
}

impl Extend<ScheduledTask> for TaskGroup {
    fn extend<I: IntoIterator<Item = ScheduledTask>>(&mut self, iter: I) {
        for task in iter {
            self.push(task);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;
    use std::rc::Rc;

    use super::*;
    use tokio::task::LocalSet;

    #[test]
    fn step_interval_splits_evenly() {
        assert_eq!(step_interval(500, 50), Duration::from_millis(10));
        assert_eq!(step_interval(100, 0), Duration::from_millis(100));
    }

    #[tokio::test(start_paused = true)]
    async fn scheduled_task_runs_after_delay() {
        LocalSet::new()
            .run_until(async {
                let fired = Rc::new(Cell::new(false));
                let flag = fired.clone();
                let task = ScheduledTask::after("bell", Duration::from_secs(5), move || {
                    flag.set(true)
                });

                sleep_ms(4_999).await;
                assert!(!fired.get());
                sleep_ms(2).await;
                assert!(fired.get());
                assert!(task.is_finished());
            })
            .await;
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_all_prevents_pending_actions() {
        LocalSet::new()
            .run_until(async {
                let fired = Rc::new(Cell::new(0));
                let mut group = TaskGroup::default();
                for secs in [1, 300, 360] {
                    let fired = fired.clone();
                    group.push(ScheduledTask::after(
                        format!("t{secs}"),
                        Duration::from_secs(secs),
                        move || fired.set(fired.get() + 1),
                    ));
                }

                sleep_ms(1_500).await;
                assert_eq!(fired.get(), 1);
                assert_eq!(group.pending(), 2);
                assert_eq!(group.pending_labels(), vec!["t300", "t360"]);

                assert_eq!(group.cancel_all(), 2);
                sleep_ms(400_000).await;
                assert_eq!(fired.get(), 1);
                assert_eq!(group.pending(), 0);
            })
            .await;
    }
}
