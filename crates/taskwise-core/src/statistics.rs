use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::task::{Priority, Task, TaskFilter, TaskStatus};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_date: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_date: Option<NaiveDate>,
}

impl StatisticsQuery {
    pub fn to_filter(&self) -> TaskFilter {
        TaskFilter {
            assignee_id: self.user_id,
            created_from: self.start_date,
            created_to: self.end_date,
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusCounts {
    pub todo: i64,
    pub in_progress: i64,
    pub review: i64,
    pub done: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriorityCounts {
    pub low: i64,
    pub medium: i64,
    pub high: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Statistics {
    pub total_tasks: i64,
    pub by_status: StatusCounts,
    pub by_priority: PriorityCounts,
    pub overdue: i64,
    pub completion_rate: f64,
}

impl Statistics {
    pub fn from_tasks(tasks: &[Task], today: NaiveDate) -> Self {
        let mut stats = Statistics {
            total_tasks: tasks.len() as i64,
            ..Default::default()
        };
        for task in tasks {
            match task.status {
                TaskStatus::Todo => stats.by_status.todo += 1,
                TaskStatus::InProgress => stats.by_status.in_progress += 1,
                TaskStatus::Review => stats.by_status.review += 1,
                TaskStatus::Done => stats.by_status.done += 1,
            }
            match task.priority {
                Priority::Low => stats.by_priority.low += 1,
                Priority::Medium => stats.by_priority.medium += 1,
                Priority::High => stats.by_priority.high += 1,
            }
            if task.is_overdue(today) {
                stats.overdue += 1;
            }
        }
        if stats.total_tasks > 0 {
            let rate = stats.by_status.done as f64 / stats.total_tasks as f64 * 100.0;
            stats.completion_rate = (rate * 10.0).round() / 10.0;
        }
        stats
    }
}
