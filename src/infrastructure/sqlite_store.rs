use crate::domain::models::{
    ActiveInterval, RecordId, Task, TaskId, TaskOwner, TimeRecord, User, UserId, UserRole,
};
use crate::infrastructure::error::StoreError;
use crate::infrastructure::store::TrackerStore;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

// Records on tasks with an explicit true tag count, as do records on
// untagged user-owned tasks. Untagged system tasks never count.
const COUNTED_TASK_FILTER: &str =
    "(t.records_tag = 1 OR (t.records_tag IS NULL AND t.owner_user_id IS NOT NULL))";

#[derive(Debug, Clone)]
pub struct SqliteTrackerStore {
    db_path: PathBuf,
}

impl SqliteTrackerStore {
    pub fn new(db_path: impl AsRef<Path>) -> Self {
        Self {
            db_path: db_path.as_ref().to_path_buf(),
        }
    }

    fn connect(&self) -> Result<Connection, StoreError> {
        Connection::open(&self.db_path).map_err(StoreError::from)
    }
}

struct UserRow {
    id: UserId,
    username: String,
    role: String,
    daily_goal_hours: i64,
    can_edit_time: bool,
    task_order: String,
    current_task_id: Option<TaskId>,
    current_task_started_at: Option<i64>,
    created_at: String,
}

impl UserRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            role: row.get(2)?,
            daily_goal_hours: row.get(3)?,
            can_edit_time: row.get(4)?,
            task_order: row.get(5)?,
            current_task_id: row.get(6)?,
            current_task_started_at: row.get(7)?,
            created_at: row.get(8)?,
        })
    }

    fn into_user(self) -> Result<User, StoreError> {
        let active = match (self.current_task_id, self.current_task_started_at) {
            (Some(task_id), Some(started_at)) => Some(ActiveInterval { task_id, started_at }),
            (None, None) => None,
            _ => {
                return Err(StoreError::Inconsistent(format!(
                    "user {} has a half-set active interval",
                    self.id
                )));
            }
        };
        Ok(User {
            id: self.id,
            username: self.username,
            role: parse_role(&self.role)?,
            daily_goal_hours: self.daily_goal_hours,
            can_edit_time: self.can_edit_time,
            task_order: serde_json::from_str(&self.task_order)?,
            active,
            created_at: parse_timestamp(&self.created_at, "users.created_at")?,
        })
    }
}

struct RecordRow {
    id: RecordId,
    user_id: UserId,
    task_id: TaskId,
    start_time: i64,
    end_time: i64,
    duration: i64,
    record_date: String,
    created_at: String,
}

impl RecordRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            user_id: row.get(1)?,
            task_id: row.get(2)?,
            start_time: row.get(3)?,
            end_time: row.get(4)?,
            duration: row.get(5)?,
            record_date: row.get(6)?,
            created_at: row.get(7)?,
        })
    }

    fn into_record(self) -> Result<TimeRecord, StoreError> {
        Ok(TimeRecord {
            id: self.id,
            user_id: self.user_id,
            task_id: self.task_id,
            start_time: self.start_time,
            end_time: self.end_time,
            duration: self.duration,
            record_date: self.record_date,
            created_at: parse_timestamp(&self.created_at, "time_records.created_at")?,
        })
    }
}

fn read_task(row: &rusqlite::Row<'_>) -> rusqlite::Result<Task> {
    let owner_user_id: Option<UserId> = row.get(2)?;
    Ok(Task {
        id: row.get(0)?,
        name: row.get(1)?,
        owner: match owner_user_id {
            Some(user_id) => TaskOwner::User(user_id),
            None => TaskOwner::System,
        },
        is_active: row.get(3)?,
        is_deleted: row.get(4)?,
        records_tag: row.get(5)?,
    })
}

fn parse_role(value: &str) -> Result<UserRole, StoreError> {
    match value {
        "admin" => Ok(UserRole::Admin),
        "member" => Ok(UserRole::Member),
        other => Err(StoreError::Inconsistent(format!(
            "unknown user role '{other}'"
        ))),
    }
}

fn role_to_str(role: UserRole) -> &'static str {
    match role {
        UserRole::Admin => "admin",
        UserRole::Member => "member",
    }
}

fn parse_timestamp(raw: &str, column: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|error| StoreError::Inconsistent(format!("invalid {column} '{raw}': {error}")))
}

fn insert_record(connection: &Connection, record: &TimeRecord) -> Result<TimeRecord, StoreError> {
    let mut stored = record.clone();
    if stored.id == 0 {
        connection.execute(
            "INSERT INTO time_records
               (user_id, task_id, start_time, end_time, duration, record_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                stored.user_id,
                stored.task_id,
                stored.start_time,
                stored.end_time,
                stored.duration,
                stored.record_date,
                stored.created_at.to_rfc3339(),
            ],
        )?;
        stored.id = connection.last_insert_rowid();
    } else {
        connection.execute(
            "INSERT INTO time_records
               (id, user_id, task_id, start_time, end_time, duration, record_date, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
             ON CONFLICT(id) DO UPDATE SET
               user_id = excluded.user_id,
               task_id = excluded.task_id,
               start_time = excluded.start_time,
               end_time = excluded.end_time,
               duration = excluded.duration,
               record_date = excluded.record_date,
               created_at = excluded.created_at",
            params![
                stored.id,
                stored.user_id,
                stored.task_id,
                stored.start_time,
                stored.end_time,
                stored.duration,
                stored.record_date,
                stored.created_at.to_rfc3339(),
            ],
        )?;
    }
    Ok(stored)
}

fn update_user_state(connection: &Connection, user: &User) -> Result<(), StoreError> {
    let updated = connection.execute(
        "UPDATE users SET
           username = ?2,
           role = ?3,
           daily_goal_hours = ?4,
           can_edit_time = ?5,
           task_order = ?6,
           current_task_id = ?7,
           current_task_started_at = ?8
         WHERE id = ?1",
        params![
            user.id,
            user.username,
            role_to_str(user.role),
            user.daily_goal_hours,
            user.can_edit_time,
            serde_json::to_string(&user.task_order)?,
            user.active.map(|active| active.task_id),
            user.active.map(|active| active.started_at),
        ],
    )?;
    if updated == 0 {
        return Err(StoreError::Inconsistent(format!(
            "cannot commit state for unknown user {}",
            user.id
        )));
    }
    Ok(())
}

impl TrackerStore for SqliteTrackerStore {
    fn get_user(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                "SELECT id, username, role, daily_goal_hours, can_edit_time, task_order,
                        current_task_id, current_task_started_at, created_at
                 FROM users WHERE id = ?1",
                params![user_id],
                UserRow::read,
            )
            .optional()?;
        row.map(UserRow::into_user).transpose()
    }

    fn save_user(&self, user: &User) -> Result<User, StoreError> {
        let connection = self.connect()?;
        let mut stored = user.clone();
        let task_order = serde_json::to_string(&stored.task_order)?;
        if stored.id == 0 {
            connection.execute(
                "INSERT INTO users
                   (username, role, daily_goal_hours, can_edit_time, task_order,
                    current_task_id, current_task_started_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    stored.username,
                    role_to_str(stored.role),
                    stored.daily_goal_hours,
                    stored.can_edit_time,
                    task_order,
                    stored.active.map(|active| active.task_id),
                    stored.active.map(|active| active.started_at),
                    stored.created_at.to_rfc3339(),
                ],
            )?;
            stored.id = connection.last_insert_rowid();
        } else {
            connection.execute(
                "INSERT INTO users
                   (id, username, role, daily_goal_hours, can_edit_time, task_order,
                    current_task_id, current_task_started_at, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
                 ON CONFLICT(id) DO UPDATE SET
                   username = excluded.username,
                   role = excluded.role,
                   daily_goal_hours = excluded.daily_goal_hours,
                   can_edit_time = excluded.can_edit_time,
                   task_order = excluded.task_order,
                   current_task_id = excluded.current_task_id,
                   current_task_started_at = excluded.current_task_started_at,
                   created_at = excluded.created_at",
                params![
                    stored.id,
                    stored.username,
                    role_to_str(stored.role),
                    stored.daily_goal_hours,
                    stored.can_edit_time,
                    task_order,
                    stored.active.map(|active| active.task_id),
                    stored.active.map(|active| active.started_at),
                    stored.created_at.to_rfc3339(),
                ],
            )?;
        }
        Ok(stored)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, username, role, daily_goal_hours, can_edit_time, task_order,
                    current_task_id, current_task_started_at, created_at
             FROM users ORDER BY id",
        )?;
        let rows = statement.query_map([], UserRow::read)?;
        let mut users = Vec::new();
        for row in rows {
            users.push(row?.into_user()?);
        }
        Ok(users)
    }

    fn get_task(&self, task_id: TaskId) -> Result<Option<Task>, StoreError> {
        let connection = self.connect()?;
        let task = connection
            .query_row(
                "SELECT id, name, owner_user_id, is_active, is_deleted, records_tag
                 FROM tasks WHERE id = ?1",
                params![task_id],
                read_task,
            )
            .optional()?;
        Ok(task)
    }

    fn save_task(&self, task: &Task) -> Result<Task, StoreError> {
        let connection = self.connect()?;
        let mut stored = task.clone();
        let owner_user_id = match stored.owner {
            TaskOwner::System => None,
            TaskOwner::User(user_id) => Some(user_id),
        };
        if stored.id == 0 {
            connection.execute(
                "INSERT INTO tasks (name, owner_user_id, is_active, is_deleted, records_tag)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    stored.name,
                    owner_user_id,
                    stored.is_active,
                    stored.is_deleted,
                    stored.records_tag,
                ],
            )?;
            stored.id = connection.last_insert_rowid();
        } else {
            connection.execute(
                "INSERT INTO tasks (id, name, owner_user_id, is_active, is_deleted, records_tag)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(id) DO UPDATE SET
                   name = excluded.name,
                   owner_user_id = excluded.owner_user_id,
                   is_active = excluded.is_active,
                   is_deleted = excluded.is_deleted,
                   records_tag = excluded.records_tag",
                params![
                    stored.id,
                    stored.name,
                    owner_user_id,
                    stored.is_active,
                    stored.is_deleted,
                    stored.records_tag,
                ],
            )?;
        }
        Ok(stored)
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, name, owner_user_id, is_active, is_deleted, records_tag
             FROM tasks ORDER BY id",
        )?;
        let rows = statement.query_map([], read_task)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    fn list_tasks_for_user(&self, user_id: UserId) -> Result<Vec<Task>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, name, owner_user_id, is_active, is_deleted, records_tag
             FROM tasks
             WHERE owner_user_id IS NULL OR owner_user_id = ?1
             ORDER BY id",
        )?;
        let rows = statement.query_map(params![user_id], read_task)?;
        let mut tasks = Vec::new();
        for row in rows {
            tasks.push(row?);
        }
        Ok(tasks)
    }

    fn get_record(&self, record_id: RecordId) -> Result<Option<TimeRecord>, StoreError> {
        let connection = self.connect()?;
        let row = connection
            .query_row(
                "SELECT id, user_id, task_id, start_time, end_time, duration, record_date, created_at
                 FROM time_records WHERE id = ?1",
                params![record_id],
                RecordRow::read,
            )
            .optional()?;
        row.map(RecordRow::into_record).transpose()
    }

    fn save_record(&self, record: &TimeRecord) -> Result<TimeRecord, StoreError> {
        let connection = self.connect()?;
        insert_record(&connection, record)
    }

    fn records_for_day(&self, user_id: UserId, date: &str) -> Result<Vec<TimeRecord>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, user_id, task_id, start_time, end_time, duration, record_date, created_at
             FROM time_records
             WHERE user_id = ?1 AND record_date = ?2
             ORDER BY start_time",
        )?;
        let rows = statement.query_map(params![user_id, date], RecordRow::read)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn records_for_range(
        &self,
        user_id: UserId,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<TimeRecord>, StoreError> {
        let connection = self.connect()?;
        let mut statement = connection.prepare(
            "SELECT id, user_id, task_id, start_time, end_time, duration, record_date, created_at
             FROM time_records
             WHERE user_id = ?1 AND record_date >= ?2 AND record_date <= ?3
             ORDER BY start_time",
        )?;
        let rows = statement.query_map(params![user_id, start_date, end_date], RecordRow::read)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?.into_record()?);
        }
        Ok(records)
    }

    fn duration_by_user(&self, date: &str) -> Result<Vec<(UserId, i64)>, StoreError> {
        let connection = self.connect()?;
        let sql = format!(
            "SELECT tr.user_id, SUM(tr.duration) AS total
             FROM time_records tr
             JOIN tasks t ON tr.task_id = t.id
             WHERE tr.record_date = ?1 AND {COUNTED_TASK_FILTER}
             GROUP BY tr.user_id
             ORDER BY total DESC"
        );
        let mut statement = connection.prepare(&sql)?;
        let rows = statement.query_map(params![date], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut totals = Vec::new();
        for row in rows {
            totals.push(row?);
        }
        Ok(totals)
    }

    fn total_duration(
        &self,
        user_id: UserId,
        range: Option<(&str, &str)>,
    ) -> Result<i64, StoreError> {
        let connection = self.connect()?;
        let total = match range {
            Some((start_date, end_date)) => {
                let sql = format!(
                    "SELECT COALESCE(SUM(tr.duration), 0)
                     FROM time_records tr
                     JOIN tasks t ON tr.task_id = t.id
                     WHERE tr.user_id = ?1
                       AND tr.record_date >= ?2 AND tr.record_date <= ?3
                       AND {COUNTED_TASK_FILTER}"
                );
                connection.query_row(&sql, params![user_id, start_date, end_date], |row| {
                    row.get(0)
                })?
            }
            None => {
                let sql = format!(
                    "SELECT COALESCE(SUM(tr.duration), 0)
                     FROM time_records tr
                     JOIN tasks t ON tr.task_id = t.id
                     WHERE tr.user_id = ?1 AND {COUNTED_TASK_FILTER}"
                );
                connection.query_row(&sql, params![user_id], |row| row.get(0))?
            }
        };
        Ok(total)
    }

    fn commit_switch(&self, user: &User, settled: Option<&TimeRecord>) -> Result<(), StoreError> {
        let mut connection = self.connect()?;
        let tx = connection.transaction()?;
        update_user_state(&tx, user)?;
        if let Some(record) = settled {
            insert_record(&tx, record)?;
        }
        tx.commit()?;
        Ok(())
    }

    fn commit_edit(&self, records: &[TimeRecord], user: Option<&User>) -> Result<(), StoreError> {
        let mut connection = self.connect()?;
        let tx = connection.transaction()?;
        for record in records {
            insert_record(&tx, record)?;
        }
        if let Some(user) = user {
            update_user_state(&tx, user)?;
        }
        tx.commit()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::storage::initialize_database;
    use tempfile::tempdir;

    fn fixed_time(value: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(value)
            .expect("valid datetime")
            .with_timezone(&Utc)
    }

    fn open_store() -> (tempfile::TempDir, SqliteTrackerStore) {
        let dir = tempdir().expect("temp dir");
        let path = dir.path().join("tracker.sqlite");
        initialize_database(&path).expect("initialize schema");
        (dir, SqliteTrackerStore::new(&path))
    }

    fn sample_user(username: &str) -> User {
        User {
            id: 0,
            username: username.to_string(),
            role: UserRole::Member,
            daily_goal_hours: 8,
            can_edit_time: false,
            task_order: vec![3, 1, 2],
            active: None,
            created_at: fixed_time("2026-03-01T08:00:00Z"),
        }
    }

    fn sample_task(name: &str, owner: TaskOwner) -> Task {
        Task {
            id: 0,
            name: name.to_string(),
            owner,
            is_active: true,
            is_deleted: false,
            records_tag: None,
        }
    }

    fn sample_record(user_id: UserId, task_id: TaskId, start: i64, duration: i64) -> TimeRecord {
        TimeRecord {
            id: 0,
            user_id,
            task_id,
            start_time: start,
            end_time: start + duration,
            duration,
            record_date: "2026-03-01".to_string(),
            created_at: fixed_time("2026-03-01T12:00:00Z"),
        }
    }

    #[test]
    fn user_round_trip_preserves_order_and_active_interval() {
        let (_dir, store) = open_store();

        let mut user = sample_user("ada");
        user.active = Some(ActiveInterval {
            task_id: 4,
            started_at: 1_700_000_000_000,
        });
        let stored = store.save_user(&user).expect("save user");
        assert!(stored.id > 0);

        let reloaded = store
            .get_user(stored.id)
            .expect("get user")
            .expect("user exists");
        assert_eq!(reloaded.task_order, vec![3, 1, 2]);
        assert_eq!(
            reloaded.active,
            Some(ActiveInterval {
                task_id: 4,
                started_at: 1_700_000_000_000
            })
        );
        assert_eq!(reloaded.created_at, user.created_at);
    }

    #[test]
    fn fixed_id_task_seeding_then_fresh_inserts() {
        let (_dir, store) = open_store();

        let mut leave = sample_task("Away", TaskOwner::System);
        leave.id = 1;
        let stored = store.save_task(&leave).expect("seed leave");
        assert_eq!(stored.id, 1);

        // saving again with the same id updates in place
        let mut renamed = stored.clone();
        renamed.name = "Leave".to_string();
        store.save_task(&renamed).expect("update leave");
        assert_eq!(store.list_tasks().expect("list").len(), 1);

        let fresh = store
            .save_task(&sample_task("Algebra", TaskOwner::User(1)))
            .expect("save task");
        assert!(fresh.id > 1);
    }

    #[test]
    fn task_listing_scopes_to_owner_and_system() {
        let (_dir, store) = open_store();
        let ada = store.save_user(&sample_user("ada")).expect("save user");
        let grace = store.save_user(&sample_user("grace")).expect("save user");

        store
            .save_task(&sample_task("Away", TaskOwner::System))
            .expect("save system task");
        store
            .save_task(&sample_task("Algebra", TaskOwner::User(ada.id)))
            .expect("save ada task");
        store
            .save_task(&sample_task("Compilers", TaskOwner::User(grace.id)))
            .expect("save grace task");

        let visible = store.list_tasks_for_user(ada.id).expect("list tasks");
        let names: Vec<&str> = visible.iter().map(|task| task.name.as_str()).collect();
        assert_eq!(names, vec!["Away", "Algebra"]);
    }

    #[test]
    fn duration_by_user_applies_tag_filter_and_descends() {
        let (_dir, store) = open_store();
        let ada = store.save_user(&sample_user("ada")).expect("save user");
        let grace = store.save_user(&sample_user("grace")).expect("save user");

        let leave = store
            .save_task(&sample_task("Away", TaskOwner::System))
            .expect("save leave");
        let algebra = store
            .save_task(&sample_task("Algebra", TaskOwner::User(ada.id)))
            .expect("save task");
        let compilers = store
            .save_task(&sample_task("Compilers", TaskOwner::User(grace.id)))
            .expect("save task");

        store
            .save_record(&sample_record(ada.id, algebra.id, 0, 3_600_000))
            .expect("save record");
        store
            .save_record(&sample_record(grace.id, compilers.id, 0, 7_200_000))
            .expect("save record");
        store
            .save_record(&sample_record(ada.id, leave.id, 0, 9_999_000))
            .expect("save record");

        let totals = store.duration_by_user("2026-03-01").expect("aggregate");
        assert_eq!(totals, vec![(grace.id, 7_200_000), (ada.id, 3_600_000)]);

        // tagging leave back in flips the aggregate
        let mut counted_leave = leave.clone();
        counted_leave.records_tag = Some(true);
        store.save_task(&counted_leave).expect("update leave");
        let totals = store.duration_by_user("2026-03-01").expect("aggregate");
        assert_eq!(totals[0], (ada.id, 13_599_000));
    }

    #[test]
    fn total_duration_supports_optional_range() {
        let (_dir, store) = open_store();
        let ada = store.save_user(&sample_user("ada")).expect("save user");
        let task = store
            .save_task(&sample_task("Algebra", TaskOwner::User(ada.id)))
            .expect("save task");

        let mut early = sample_record(ada.id, task.id, 0, 1_000_000);
        early.record_date = "2026-02-27".to_string();
        store.save_record(&early).expect("save record");
        store
            .save_record(&sample_record(ada.id, task.id, 0, 2_000_000))
            .expect("save record");

        assert_eq!(store.total_duration(ada.id, None).expect("sum"), 3_000_000);
        assert_eq!(
            store
                .total_duration(ada.id, Some(("2026-03-01", "2026-03-31")))
                .expect("sum"),
            2_000_000
        );
        assert_eq!(
            store
                .total_duration(ada.id, Some(("2026-04-01", "2026-04-30")))
                .expect("sum"),
            0
        );
    }

    #[test]
    fn records_for_day_sorts_by_start_time() {
        let (_dir, store) = open_store();
        let ada = store.save_user(&sample_user("ada")).expect("save user");
        let task = store
            .save_task(&sample_task("Algebra", TaskOwner::User(ada.id)))
            .expect("save task");

        store
            .save_record(&sample_record(ada.id, task.id, 50_000, 10_000))
            .expect("save record");
        store
            .save_record(&sample_record(ada.id, task.id, 10_000, 10_000))
            .expect("save record");

        let records = store.records_for_day(ada.id, "2026-03-01").expect("query");
        let starts: Vec<i64> = records.iter().map(|record| record.start_time).collect();
        assert_eq!(starts, vec![10_000, 50_000]);
    }

    #[test]
    fn commit_switch_persists_state_and_record_together() {
        let (_dir, store) = open_store();
        let mut ada = store.save_user(&sample_user("ada")).expect("save user");
        let task = store
            .save_task(&sample_task("Algebra", TaskOwner::User(ada.id)))
            .expect("save task");

        ada.active = Some(ActiveInterval {
            task_id: task.id,
            started_at: 500_000,
        });
        let settled = sample_record(ada.id, task.id, 100_000, 400_000);
        store
            .commit_switch(&ada, Some(&settled))
            .expect("commit switch");

        let reloaded = store
            .get_user(ada.id)
            .expect("get user")
            .expect("user exists");
        assert_eq!(
            reloaded.active,
            Some(ActiveInterval {
                task_id: task.id,
                started_at: 500_000
            })
        );
        let records = store.records_for_day(ada.id, "2026-03-01").expect("query");
        assert_eq!(records.len(), 1);
        assert!(records[0].id > 0);
    }

    #[test]
    fn commit_switch_rejects_unknown_users() {
        let (_dir, store) = open_store();
        let mut ghost = sample_user("ghost");
        ghost.id = 99;
        assert!(store.commit_switch(&ghost, None).is_err());
    }

    #[test]
    fn commit_edit_writes_the_batch_in_one_transaction() {
        let (_dir, store) = open_store();
        let mut ada = store.save_user(&sample_user("ada")).expect("save user");
        let task = store
            .save_task(&sample_task("Algebra", TaskOwner::User(ada.id)))
            .expect("save task");
        let first = store
            .save_record(&sample_record(ada.id, task.id, 0, 1_000_000))
            .expect("save record");
        let second = store
            .save_record(&sample_record(ada.id, task.id, 1_003_000, 1_000_000))
            .expect("save record");

        let mut moved = first.clone();
        moved.end_time = 1_500_000;
        moved.duration = moved.end_time - moved.start_time;
        let mut snapped = second.clone();
        snapped.start_time = 1_500_000;
        snapped.duration = snapped.end_time - snapped.start_time;
        ada.active = Some(ActiveInterval {
            task_id: task.id,
            started_at: 9_000_000,
        });

        store
            .commit_edit(&[moved, snapped], Some(&ada))
            .expect("commit edit");
        let reloaded = store.get_record(first.id).expect("get").expect("record");
        assert_eq!(reloaded.end_time, 1_500_000);
        let reloaded = store.get_record(second.id).expect("get").expect("record");
        assert_eq!(reloaded.start_time, 1_500_000);
        let reloaded = store.get_user(ada.id).expect("get").expect("user");
        assert_eq!(
            reloaded.active,
            Some(ActiveInterval {
                task_id: task.id,
                started_at: 9_000_000
            })
        );

        // an unknown user rolls the record writes back with it
        let mut ghost = sample_user("ghost");
        ghost.id = 99;
        let mut widened = store.get_record(first.id).expect("get").expect("record");
        widened.end_time = 1_600_000;
        widened.duration = widened.end_time - widened.start_time;
        assert!(store.commit_edit(&[widened], Some(&ghost)).is_err());
        let untouched = store.get_record(first.id).expect("get").expect("record");
        assert_eq!(untouched.end_time, 1_500_000);
    }

    #[test]
    fn half_set_interval_columns_surface_as_inconsistent() {
        let (dir, store) = open_store();
        let ada = store.save_user(&sample_user("ada")).expect("save user");

        let connection =
            Connection::open(dir.path().join("tracker.sqlite")).expect("open raw connection");
        connection
            .execute(
                "UPDATE users SET current_task_id = 5, current_task_started_at = NULL WHERE id = ?1",
                params![ada.id],
            )
            .expect("corrupt row");

        let error = store.get_user(ada.id).expect_err("inconsistent row");
        assert!(matches!(error, StoreError::Inconsistent(_)));
    }
}
