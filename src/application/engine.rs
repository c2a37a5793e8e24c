use crate::application::error::EngineError;
use crate::domain::clock::TrackerClock;
use crate::domain::models::{
    compare_default, ActiveInterval, RecordId, Task, TaskId, TaskOwner, TimeRecord, User, UserId,
    LEAVE_TASK_ID, MIN_RECORD_DURATION_MS, SNAP_TOLERANCE_MS,
};
use crate::infrastructure::store::TrackerStore;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

pub struct TaskSwitchEngine<S: TrackerStore> {
    store: Arc<S>,
    clock: TrackerClock,
}

impl<S: TrackerStore> TaskSwitchEngine<S> {
    pub fn new(store: Arc<S>, clock: TrackerClock) -> Self {
        Self { store, clock }
    }

    pub fn clock(&self) -> &TrackerClock {
        &self.clock
    }

    fn load_user(&self, user_id: UserId) -> Result<User, EngineError> {
        self.store
            .get_user(user_id)?
            .ok_or(EngineError::NotFound {
                entity: "user",
                id: user_id,
            })
    }

    fn load_task(&self, task_id: TaskId) -> Result<Task, EngineError> {
        self.store
            .get_task(task_id)?
            .ok_or(EngineError::NotFound {
                entity: "task",
                id: task_id,
            })
    }

    /// Closes the user's active interval at `end_time`. Intervals
    /// shorter than the debounce threshold produce no record. The
    /// record date comes from the interval start, so a session running
    /// past the cutover still lands on the day it began.
    fn settled_record(&self, user: &User, end_time: i64) -> Option<TimeRecord> {
        let active = user.active?;
        let duration = end_time - active.started_at;
        if duration < MIN_RECORD_DURATION_MS {
            return None;
        }
        Some(TimeRecord {
            id: 0,
            user_id: user.id,
            task_id: active.task_id,
            start_time: active.started_at,
            end_time,
            duration,
            record_date: self.clock.logical_date_millis(active.started_at),
            created_at: self.clock.now(),
        })
    }

    // switching to the task already running is legal and restarts it
    pub fn switch_task(&self, user_id: UserId, new_task_id: TaskId) -> Result<User, EngineError> {
        let mut user = self.load_user(user_id)?;
        let task = self.load_task(new_task_id)?;
        if task.is_deleted {
            return Err(EngineError::NotFound {
                entity: "task",
                id: new_task_id,
            });
        }
        if !task.owner.is_system() && !task.owner.owned_by(user_id) {
            return Err(EngineError::Unauthorized {
                user_id,
                entity: "task",
                id: new_task_id,
            });
        }

        let now = self.clock.now_millis();
        let settled = self.settled_record(&user, now);
        user.active = Some(ActiveInterval {
            task_id: new_task_id,
            started_at: now,
        });
        self.store.commit_switch(&user, settled.as_ref())?;
        Ok(user)
    }

    pub fn settle_user(&self, user_id: UserId, now_millis: i64) -> Result<User, EngineError> {
        let mut user = self.load_user(user_id)?;
        if user.active.is_none() {
            return Ok(user);
        }
        let settled = self.settled_record(&user, now_millis);
        user.active = None;
        self.store.commit_switch(&user, settled.as_ref())?;
        Ok(user)
    }

    pub fn settle_user_daily_task(&self, user_id: UserId) -> Result<User, EngineError> {
        let now = self.clock.now();
        let hour = self.clock.local_hour(now);
        if !(hour >= 23 || hour < self.clock.cutover_hour()) {
            return Err(EngineError::TooEarly(format!(
                "settlement opens at 23:00 and closes at {:02}:00, local hour is {hour}",
                self.clock.cutover_hour()
            )));
        }
        self.settle_user(user_id, now.timestamp_millis())
    }

    pub fn arm_leave_if_idle(&self, user_id: UserId, now_millis: i64) -> Result<bool, EngineError> {
        let mut user = self.load_user(user_id)?;
        if user.active.is_some() {
            return Ok(false);
        }
        user.active = Some(ActiveInterval {
            task_id: LEAVE_TASK_ID,
            started_at: now_millis,
        });
        self.store.save_user(&user)?;
        Ok(true)
    }

    pub fn add_task(&self, user_id: UserId, name: &str) -> Result<Task, EngineError> {
        self.load_user(user_id)?;
        let task = Task {
            id: 0,
            name: name.trim().to_string(),
            owner: TaskOwner::User(user_id),
            is_active: true,
            is_deleted: false,
            records_tag: Some(true),
        };
        task.validate().map_err(EngineError::Validation)?;
        Ok(self.store.save_task(&task)?)
    }

    pub fn delete_task(&self, user_id: UserId, task_id: TaskId) -> Result<User, EngineError> {
        if task_id == LEAVE_TASK_ID {
            return Err(EngineError::Forbidden(
                "the Away task cannot be deleted".to_string(),
            ));
        }
        let mut task = self.load_task(task_id)?;
        if task.is_deleted {
            return Err(EngineError::NotFound {
                entity: "task",
                id: task_id,
            });
        }
        if !task.owner.owned_by(user_id) {
            return Err(EngineError::Unauthorized {
                user_id,
                entity: "task",
                id: task_id,
            });
        }

        let mut user = self.load_user(user_id)?;
        let had_order_entry = user.task_order.contains(&task_id);
        user.task_order.retain(|id| *id != task_id);

        let is_current = user.active.map(|active| active.task_id) == Some(task_id);
        if is_current {
            let now = self.clock.now_millis();
            let settled = self.settled_record(&user, now);
            user.active = Some(ActiveInterval {
                task_id: LEAVE_TASK_ID,
                started_at: now,
            });
            self.store.commit_switch(&user, settled.as_ref())?;
        } else if had_order_entry {
            user = self.store.save_user(&user)?;
        }

        task.is_deleted = true;
        self.store.save_task(&task)?;
        Ok(user)
    }

    /// Moves a record's boundaries, re-stamps its date from the new
    /// start, then glues neighbours on the original day back onto the
    /// moved boundaries so no gap or overlap is left behind. Only
    /// immediate neighbours are adjusted; edits never cascade.
    pub fn update_time_record(
        &self,
        user_id: UserId,
        record_id: RecordId,
        new_start: i64,
        new_end: i64,
    ) -> Result<TimeRecord, EngineError> {
        let mut user = self.load_user(user_id)?;
        if !user.can_edit_time {
            return Err(EngineError::PermissionDenied(format!(
                "user {user_id} may not edit time records"
            )));
        }
        let mut record =
            self.store
                .get_record(record_id)?
                .ok_or(EngineError::NotFound {
                    entity: "time record",
                    id: record_id,
                })?;
        if record.user_id != user_id {
            return Err(EngineError::PermissionDenied(format!(
                "time record {record_id} does not belong to user {user_id}"
            )));
        }
        if new_start >= new_end {
            return Err(EngineError::InvalidRange(format!(
                "start {new_start} must be before end {new_end}"
            )));
        }

        let old_start = record.start_time;
        let old_end = record.end_time;
        let original_date = record.record_date.clone();

        record.start_time = new_start;
        record.end_time = new_end;
        record.duration = new_end - new_start;
        record.record_date = self.clock.logical_date_millis(new_start);

        let mut edited = vec![record.clone()];
        for mut neighbor in self.store.records_for_day(user_id, &original_date)? {
            if neighbor.id == record.id {
                continue;
            }
            let mut snapped = false;
            // a record that used to begin where the edit ended follows
            // the edit's new end, unless that would invert it
            if (neighbor.start_time - old_end).abs() <= SNAP_TOLERANCE_MS
                && neighbor.start_time != new_end
                && new_end <= neighbor.end_time
            {
                neighbor.start_time = new_end;
                snapped = true;
            }
            // and one that used to end where the edit began follows
            // the new start
            if (neighbor.end_time - old_start).abs() <= SNAP_TOLERANCE_MS
                && neighbor.end_time != new_start
                && new_start >= neighbor.start_time
            {
                neighbor.end_time = new_start;
                snapped = true;
            }
            if snapped {
                neighbor.duration = neighbor.end_time - neighbor.start_time;
                edited.push(neighbor);
            }
        }

        let mut adjusted = None;
        if let Some(active) = user.active {
            if (active.started_at - old_end).abs() <= SNAP_TOLERANCE_MS
                && active.started_at != new_end
            {
                user.active = Some(ActiveInterval {
                    task_id: active.task_id,
                    started_at: new_end,
                });
                adjusted = Some(user);
            }
        }

        self.store.commit_edit(&edited, adjusted.as_ref())?;
        Ok(record)
    }

    pub fn list_tasks(&self, user_id: UserId) -> Result<Vec<Task>, EngineError> {
        let user = self.load_user(user_id)?;
        let mut tasks: Vec<Task> = self
            .store
            .list_tasks_for_user(user_id)?
            .into_iter()
            .filter(|task| !task.is_deleted)
            .collect();

        let positions: HashMap<TaskId, usize> = user
            .task_order
            .iter()
            .enumerate()
            .map(|(index, id)| (*id, index))
            .collect();
        tasks.sort_by(|a, b| match (positions.get(&a.id), positions.get(&b.id)) {
            (Some(a_pos), Some(b_pos)) => a_pos.cmp(b_pos),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => compare_default(a, b),
        });
        Ok(tasks)
    }

    pub fn update_task_order(
        &self,
        user_id: UserId,
        order: Vec<TaskId>,
    ) -> Result<User, EngineError> {
        let mut user = self.load_user(user_id)?;
        user.task_order = order;
        Ok(self.store.save_user(&user)?)
    }

    pub fn update_task_records_tag(
        &self,
        user_id: UserId,
        task_id: TaskId,
        records_tag: Option<bool>,
    ) -> Result<Task, EngineError> {
        let user = self.load_user(user_id)?;
        let mut task = self.load_task(task_id)?;
        if !task.owner.owned_by(user_id) && !user.is_admin() {
            return Err(EngineError::Unauthorized {
                user_id,
                entity: "task",
                id: task_id,
            });
        }
        task.records_tag = records_tag;
        Ok(self.store.save_task(&task)?)
    }

    pub fn grant_time_edit_permission(
        &self,
        admin_id: UserId,
        target_user_id: UserId,
        can_edit: bool,
    ) -> Result<User, EngineError> {
        let admin = self.load_user(admin_id)?;
        if !admin.is_admin() {
            return Err(EngineError::PermissionDenied(format!(
                "user {admin_id} is not an administrator"
            )));
        }
        let mut target = self.load_user(target_user_id)?;
        target.can_edit_time = can_edit;
        Ok(self.store.save_user(&target)?)
    }

    pub fn update_daily_goal(&self, user_id: UserId, hours: i64) -> Result<User, EngineError> {
        let mut user = self.load_user(user_id)?;
        user.daily_goal_hours = hours;
        user.validate().map_err(EngineError::Validation)?;
        Ok(self.store.save_user(&user)?)
    }
}
