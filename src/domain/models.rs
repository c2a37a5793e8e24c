use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

pub type UserId = i64;
pub type TaskId = i64;
pub type RecordId = i64;

pub const LEAVE_TASK_ID: TaskId = 1;
pub const LEAVE_TASK_NAME: &str = "Away";

// Intervals shorter than this are dropped at settlement to debounce
// rapid task switching.
pub const MIN_RECORD_DURATION_MS: i64 = 1000;
// Window for gluing adjacent records back together after a manual edit.
pub const SNAP_TOLERANCE_MS: i64 = 5000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum UserRole {
    Admin,
    Member,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskOwner {
    System,
    User(UserId),
}

impl TaskOwner {
    pub fn is_system(&self) -> bool {
        matches!(self, TaskOwner::System)
    }

    pub fn owned_by(&self, user_id: UserId) -> bool {
        matches!(self, TaskOwner::User(owner) if *owner == user_id)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ActiveInterval {
    pub task_id: TaskId,
    pub started_at: i64,
}

impl ActiveInterval {
    pub fn elapsed(&self, now_millis: i64) -> i64 {
        now_millis - self.started_at
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.started_at < 0 {
            return Err("active_interval.started_at must not be negative".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: UserRole,
    pub daily_goal_hours: i64,
    pub can_edit_time: bool,
    pub task_order: Vec<TaskId>,
    pub active: Option<ActiveInterval>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.username, "user.username")?;
        if !(1..=24).contains(&self.daily_goal_hours) {
            return Err("user.daily_goal_hours must be between 1 and 24".to_string());
        }
        if let Some(active) = &self.active {
            active.validate()?;
        }
        Ok(())
    }

    pub fn is_admin(&self) -> bool {
        matches!(self.role, UserRole::Admin)
    }

    pub fn daily_goal_millis(&self) -> i64 {
        self.daily_goal_hours * 3_600_000
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub owner: TaskOwner,
    pub is_active: bool,
    pub is_deleted: bool,
    pub records_tag: Option<bool>,
}

impl Task {
    pub fn validate(&self) -> Result<(), String> {
        validate_non_empty(&self.name, "task.name")
    }

    /// Whether time on this task counts toward aggregate totals: the
    /// explicit tag wins; absent, system tasks are excluded and owned
    /// tasks included.
    pub fn counts_toward_totals(&self) -> bool {
        match self.records_tag {
            Some(tag) => tag,
            None => !self.owner.is_system(),
        }
    }
}

// Fallback listing order when a task has no position in the user's
// explicit order: system tasks first, then ascending id.
pub fn compare_default(a: &Task, b: &Task) -> Ordering {
    match (a.owner.is_system(), b.owner.is_system()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.id.cmp(&b.id),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TimeRecord {
    pub id: RecordId,
    pub user_id: UserId,
    pub task_id: TaskId,
    pub start_time: i64,
    pub end_time: i64,
    pub duration: i64,
    pub record_date: String,
    pub created_at: DateTime<Utc>,
}

impl TimeRecord {
    pub fn validate(&self) -> Result<(), String> {
        if self.end_time < self.start_time {
            return Err("time_record.end_time must be >= time_record.start_time".to_string());
        }
        if self.duration != self.end_time - self.start_time {
            return Err("time_record.duration must equal end_time - start_time".to_string());
        }
        validate_date(&self.record_date, "time_record.record_date")
    }
}

fn validate_non_empty(value: &str, field_name: &str) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{field_name} must not be empty"));
    }
    Ok(())
}

fn validate_date(value: &str, field_name: &str) -> Result<(), String> {
    chrono::NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .map_err(|_| format!("{field_name} must be YYYY-MM-DD"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn sample_user() -> User {
        User {
            id: 7,
            username: "ada".to_string(),
            role: UserRole::Member,
            daily_goal_hours: 8,
            can_edit_time: false,
            task_order: vec![3, 2],
            active: None,
            created_at: fixed_time("2026-03-01T08:00:00Z"),
        }
    }

    fn sample_task() -> Task {
        Task {
            id: 2,
            name: "Algebra".to_string(),
            owner: TaskOwner::User(7),
            is_active: true,
            is_deleted: false,
            records_tag: None,
        }
    }

    fn sample_record() -> TimeRecord {
        TimeRecord {
            id: 11,
            user_id: 7,
            task_id: 2,
            start_time: 1_000,
            end_time: 61_000,
            duration: 60_000,
            record_date: "2026-03-01".to_string(),
            created_at: fixed_time("2026-03-01T08:01:01Z"),
        }
    }

    #[test]
    fn user_validate_rejects_bad_goal_and_blank_name() {
        assert!(sample_user().validate().is_ok());

        let mut user = sample_user();
        user.daily_goal_hours = 0;
        assert!(user.validate().is_err());

        let mut user = sample_user();
        user.username = "  ".to_string();
        assert!(user.validate().is_err());
    }

    #[test]
    fn record_validate_checks_range_duration_and_date() {
        assert!(sample_record().validate().is_ok());

        let mut record = sample_record();
        record.end_time = record.start_time - 1;
        assert!(record.validate().is_err());

        let mut record = sample_record();
        record.duration = 1;
        assert!(record.validate().is_err());

        let mut record = sample_record();
        record.record_date = "01/03/2026".to_string();
        assert!(record.validate().is_err());
    }

    #[test]
    fn effective_records_tag_falls_back_to_ownership() {
        let mut task = sample_task();
        assert!(task.counts_toward_totals());

        task.owner = TaskOwner::System;
        assert!(!task.counts_toward_totals());

        task.records_tag = Some(true);
        assert!(task.counts_toward_totals());

        task.owner = TaskOwner::User(7);
        task.records_tag = Some(false);
        assert!(!task.counts_toward_totals());
    }

    #[test]
    fn task_owner_answers_ownership_queries() {
        assert!(TaskOwner::System.is_system());
        assert!(!TaskOwner::System.owned_by(7));
        assert!(TaskOwner::User(7).owned_by(7));
        assert!(!TaskOwner::User(7).owned_by(8));
    }

    #[test]
    fn default_order_puts_system_tasks_first_then_ids() {
        let system = Task {
            id: 1,
            name: LEAVE_TASK_NAME.to_string(),
            owner: TaskOwner::System,
            is_active: true,
            is_deleted: false,
            records_tag: None,
        };
        let mut owned_late = sample_task();
        owned_late.id = 9;
        let owned_early = sample_task();

        let mut tasks = vec![owned_late.clone(), system.clone(), owned_early.clone()];
        tasks.sort_by(compare_default);

        let ids: Vec<TaskId> = tasks.iter().map(|task| task.id).collect();
        assert_eq!(ids, vec![1, 2, 9]);
    }

    #[test]
    fn active_interval_reports_elapsed_time() {
        let interval = ActiveInterval {
            task_id: 2,
            started_at: 10_000,
        };
        assert_eq!(interval.elapsed(25_000), 15_000);
    }
}
