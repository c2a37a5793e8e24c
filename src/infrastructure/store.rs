use crate::domain::models::{RecordId, Task, TaskId, TimeRecord, User, UserId};
use crate::infrastructure::error::StoreError;

/// Persistence contract for users, tasks and time records. Entities
/// with id 0 are inserted and returned with their assigned id; any
/// other id upserts the row at that id (the Leave task is seeded with
/// a fixed id).
pub trait TrackerStore: Send + Sync {
    fn get_user(&self, user_id: UserId) -> Result<Option<User>, StoreError>;
    fn save_user(&self, user: &User) -> Result<User, StoreError>;
    fn list_users(&self) -> Result<Vec<User>, StoreError>;

    fn get_task(&self, task_id: TaskId) -> Result<Option<Task>, StoreError>;
    fn save_task(&self, task: &Task) -> Result<Task, StoreError>;
    fn list_tasks(&self) -> Result<Vec<Task>, StoreError>;
    fn list_tasks_for_user(&self, user_id: UserId) -> Result<Vec<Task>, StoreError>;

    fn get_record(&self, record_id: RecordId) -> Result<Option<TimeRecord>, StoreError>;
    fn save_record(&self, record: &TimeRecord) -> Result<TimeRecord, StoreError>;
    fn records_for_day(&self, user_id: UserId, date: &str) -> Result<Vec<TimeRecord>, StoreError>;
    fn records_for_range(
        &self,
        user_id: UserId,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<TimeRecord>, StoreError>;

    fn duration_by_user(&self, date: &str) -> Result<Vec<(UserId, i64)>, StoreError>;
    fn total_duration(
        &self,
        user_id: UserId,
        range: Option<(&str, &str)>,
    ) -> Result<i64, StoreError>;

    /// Atomic settlement boundary: persists the user's new
    /// current-task state and the optionally settled record as one
    /// unit. Either both apply or neither does.
    fn commit_switch(&self, user: &User, settled: Option<&TimeRecord>) -> Result<(), StoreError>;

    /// Atomic edit boundary: persists a batch of moved records and the
    /// optionally adjusted user state as one unit.
    fn commit_edit(&self, records: &[TimeRecord], user: Option<&User>) -> Result<(), StoreError>;
}
