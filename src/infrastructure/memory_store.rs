use crate::domain::models::{RecordId, Task, TaskId, TimeRecord, User, UserId};
use crate::infrastructure::error::StoreError;
use crate::infrastructure::store::TrackerStore;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<UserId, User>,
    tasks: HashMap<TaskId, Task>,
    // Vec keeps insertion order, which makes ranking ties stable.
    records: Vec<TimeRecord>,
    next_user_id: UserId,
    next_task_id: TaskId,
    next_record_id: RecordId,
}

impl Inner {
    fn counted_task_ids(&self) -> Vec<TaskId> {
        self.tasks
            .values()
            .filter(|task| task.counts_toward_totals())
            .map(|task| task.id)
            .collect()
    }

    fn push_record(&mut self, record: &TimeRecord) -> TimeRecord {
        let mut stored = record.clone();
        if stored.id == 0 {
            self.next_record_id += 1;
            stored.id = self.next_record_id;
        } else {
            self.next_record_id = self.next_record_id.max(stored.id);
        }
        if let Some(existing) = self
            .records
            .iter_mut()
            .find(|existing| existing.id == stored.id)
        {
            *existing = stored.clone();
        } else {
            self.records.push(stored.clone());
        }
        stored
    }
}

#[derive(Debug, Default)]
pub struct InMemoryTrackerStore {
    inner: Mutex<Inner>,
}

impl InMemoryTrackerStore {
    fn lock(&self) -> Result<MutexGuard<'_, Inner>, StoreError> {
        self.inner
            .lock()
            .map_err(|error| StoreError::Inconsistent(format!("store lock poisoned: {error}")))
    }
}

impl TrackerStore for InMemoryTrackerStore {
    fn get_user(&self, user_id: UserId) -> Result<Option<User>, StoreError> {
        Ok(self.lock()?.users.get(&user_id).cloned())
    }

    fn save_user(&self, user: &User) -> Result<User, StoreError> {
        let mut inner = self.lock()?;
        let mut stored = user.clone();
        if stored.id == 0 {
            inner.next_user_id += 1;
            stored.id = inner.next_user_id;
        } else {
            inner.next_user_id = inner.next_user_id.max(stored.id);
        }
        inner.users.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn list_users(&self) -> Result<Vec<User>, StoreError> {
        let inner = self.lock()?;
        let mut users: Vec<User> = inner.users.values().cloned().collect();
        users.sort_by_key(|user| user.id);
        Ok(users)
    }

    fn get_task(&self, task_id: TaskId) -> Result<Option<Task>, StoreError> {
        Ok(self.lock()?.tasks.get(&task_id).cloned())
    }

    fn save_task(&self, task: &Task) -> Result<Task, StoreError> {
        let mut inner = self.lock()?;
        let mut stored = task.clone();
        if stored.id == 0 {
            inner.next_task_id += 1;
            stored.id = inner.next_task_id;
        } else {
            inner.next_task_id = inner.next_task_id.max(stored.id);
        }
        inner.tasks.insert(stored.id, stored.clone());
        Ok(stored)
    }

    fn list_tasks(&self) -> Result<Vec<Task>, StoreError> {
        let inner = self.lock()?;
        let mut tasks: Vec<Task> = inner.tasks.values().cloned().collect();
        tasks.sort_by_key(|task| task.id);
        Ok(tasks)
    }

    fn list_tasks_for_user(&self, user_id: UserId) -> Result<Vec<Task>, StoreError> {
        let inner = self.lock()?;
        let mut tasks: Vec<Task> = inner
            .tasks
            .values()
            .filter(|task| task.owner.is_system() || task.owner.owned_by(user_id))
            .cloned()
            .collect();
        tasks.sort_by_key(|task| task.id);
        Ok(tasks)
    }

    fn get_record(&self, record_id: RecordId) -> Result<Option<TimeRecord>, StoreError> {
        let inner = self.lock()?;
        Ok(inner
            .records
            .iter()
            .find(|record| record.id == record_id)
            .cloned())
    }

    fn save_record(&self, record: &TimeRecord) -> Result<TimeRecord, StoreError> {
        let mut inner = self.lock()?;
        Ok(inner.push_record(record))
    }

    fn records_for_day(&self, user_id: UserId, date: &str) -> Result<Vec<TimeRecord>, StoreError> {
        let inner = self.lock()?;
        let mut records: Vec<TimeRecord> = inner
            .records
            .iter()
            .filter(|record| record.user_id == user_id && record.record_date == date)
            .cloned()
            .collect();
        records.sort_by_key(|record| record.start_time);
        Ok(records)
    }

    fn records_for_range(
        &self,
        user_id: UserId,
        start_date: &str,
        end_date: &str,
    ) -> Result<Vec<TimeRecord>, StoreError> {
        let inner = self.lock()?;
        let mut records: Vec<TimeRecord> = inner
            .records
            .iter()
            .filter(|record| {
                record.user_id == user_id
                    && record.record_date.as_str() >= start_date
                    && record.record_date.as_str() <= end_date
            })
            .cloned()
            .collect();
        records.sort_by_key(|record| record.start_time);
        Ok(records)
    }

    fn duration_by_user(&self, date: &str) -> Result<Vec<(UserId, i64)>, StoreError> {
        let inner = self.lock()?;
        let counted = inner.counted_task_ids();

        let mut totals: Vec<(UserId, i64)> = Vec::new();
        for record in &inner.records {
            if record.record_date != date || !counted.contains(&record.task_id) {
                continue;
            }
            match totals.iter_mut().find(|(user, _)| *user == record.user_id) {
                Some((_, total)) => *total += record.duration,
                None => totals.push((record.user_id, record.duration)),
            }
        }
        // Stable sort keeps first-seen order between equal totals.
        totals.sort_by(|a, b| b.1.cmp(&a.1));
        Ok(totals)
    }

    fn total_duration(
        &self,
        user_id: UserId,
        range: Option<(&str, &str)>,
    ) -> Result<i64, StoreError> {
        let inner = self.lock()?;
        let counted = inner.counted_task_ids();

        Ok(inner
            .records
            .iter()
            .filter(|record| record.user_id == user_id && counted.contains(&record.task_id))
            .filter(|record| match range {
                Some((start, end)) => {
                    record.record_date.as_str() >= start && record.record_date.as_str() <= end
                }
                None => true,
            })
            .map(|record| record.duration)
            .sum())
    }

    fn commit_switch(&self, user: &User, settled: Option<&TimeRecord>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        if !inner.users.contains_key(&user.id) {
            return Err(StoreError::Inconsistent(format!(
                "cannot commit switch for unknown user {}",
                user.id
            )));
        }
        inner.users.insert(user.id, user.clone());
        if let Some(record) = settled {
            inner.push_record(record);
        }
        Ok(())
    }

    fn commit_edit(&self, records: &[TimeRecord], user: Option<&User>) -> Result<(), StoreError> {
        let mut inner = self.lock()?;
        // validate first; a failed commit must not touch the maps
        if let Some(user) = user {
            if !inner.users.contains_key(&user.id) {
                return Err(StoreError::Inconsistent(format!(
                    "cannot commit edit for unknown user {}",
                    user.id
                )));
            }
            inner.users.insert(user.id, user.clone());
        }
        for record in records {
            inner.push_record(record);
        }
        Ok(())
    }
}
