use serde::{Deserialize, Deserializer, Serialize};

use crate::task::Task;

/// Aggregate counts over the task set.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Stats {
    pub total_tasks: u64,
    pub completed_tasks: u64,
    pub pending_tasks: u64,
    #[serde(deserialize_with = "rounded_percent")]
    pub completion_rate: u8,
}

impl Stats {
    pub fn from_counts(total: u64, completed: u64) -> Self {
        let completed = completed.min(total);
        Self {
            total_tasks: total,
            completed_tasks: completed,
            pending_tasks: total - completed,
            completion_rate: completion_rate(completed, total),
        }
    }
}

/// `round(100 * completed / total)` with halves rounded up, `0` when empty.
pub fn completion_rate(completed: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let completed = completed.min(total);
    let rate = (200 * completed + total) / (2 * total);
    rate as u8
}

/// Stats recomputed from the locally cached task list.
pub fn local_stats(tasks: &[Task]) -> Stats {
    let total = tasks.len() as u64;
    let completed = tasks.iter().filter(|task| task.completed).count() as u64;
    Stats::from_counts(total, completed)
}

// The backend reports the rate with two decimals; clamp into 0..=100.
fn rounded_percent<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = f64::deserialize(deserializer)?;
    if !raw.is_finite() {
        return Err(serde::de::Error::custom(format!(
            "completion_rate is not a finite number: {raw}"
        )));
    }
    Ok(raw.round().clamp(0.0, 100.0) as u8)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use serde_json::json;

    use super::{Stats, completion_rate, local_stats};
    use crate::task::Task;

    fn task(id: u64, completed: bool) -> Task {
        let now = Utc::now();
        Task {
            id,
            title: format!("task {id}"),
            description: None,
            completed,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn rate_rounds_to_whole_percent() {
        assert_eq!(completion_rate(1, 3), 33);
        assert_eq!(completion_rate(2, 3), 67);
        assert_eq!(completion_rate(1, 8), 13);
        assert_eq!(completion_rate(1, 200), 1);
        assert_eq!(completion_rate(3, 3), 100);
    }

    #[test]
    fn empty_set_has_zero_rate() {
        assert_eq!(completion_rate(0, 0), 0);
        assert_eq!(local_stats(&[]), Stats::default());
    }

    #[test]
    fn local_stats_balance() {
        let tasks = vec![task(1, true), task(2, false), task(3, false)];
        let stats = local_stats(&tasks);
        assert_eq!(stats.total_tasks, 3);
        assert_eq!(stats.completed_tasks, 1);
        assert_eq!(stats.pending_tasks, 2);
        assert_eq!(stats.total_tasks, stats.completed_tasks + stats.pending_tasks);
        assert_eq!(stats.completion_rate, 33);
    }

    #[test]
    fn decodes_fractional_server_rate() {
        let stats: Stats = serde_json::from_value(json!({
            "total_tasks": 3,
            "completed_tasks": 2,
            "pending_tasks": 1,
            "completion_rate": 66.67
        }))
        .expect("stats should decode");
        assert_eq!(stats.completion_rate, 67);

        let zero: Stats = serde_json::from_value(json!({
            "total_tasks": 0,
            "completed_tasks": 0,
            "pending_tasks": 0,
            "completion_rate": 0
        }))
        .expect("stats should decode");
        assert_eq!(zero, Stats::default());
    }
}
