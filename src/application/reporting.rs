use crate::application::error::EngineError;
use crate::domain::clock::{dates_between, parse_date, previous_date, trailing_dates, TrackerClock};
use crate::domain::models::{Task, TaskId, User, UserId};
use crate::infrastructure::store::TrackerStore;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PieSlice {
    pub name: String,
    pub value: i64,
    pub formatted: String,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct LineChart {
    pub dates: Vec<String>,
    pub durations: Vec<i64>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct TimelineEntry {
    pub task_name: String,
    pub start_time: i64,
    pub end_time: i64,
    pub duration: i64,
    pub is_system: bool,
    pub counted: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct DayStatus {
    pub date: String,
    pub duration: i64,
    pub met_goal: bool,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckInStatus {
    pub daily_goal_hours: i64,
    pub days: Vec<DayStatus>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RankingEntry {
    pub user_id: UserId,
    pub username: String,
    pub duration: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct RankingStats {
    pub today: Vec<RankingEntry>,
    pub my_rank: Option<usize>,
    pub participants: usize,
    pub yesterday_top3: Vec<RankingEntry>,
    pub total_duration: i64,
}

pub fn format_duration(millis: i64) -> String {
    let seconds = millis / 1000;
    let minutes = (seconds % 3600) / 60;
    let hours = seconds / 3600;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m {}s", seconds % 60)
    }
}

pub struct ReportingService<S: TrackerStore> {
    store: Arc<S>,
    clock: TrackerClock,
}

impl<S: TrackerStore> ReportingService<S> {
    pub fn new(store: Arc<S>, clock: TrackerClock) -> Self {
        Self { store, clock }
    }

    fn load_user(&self, user_id: UserId) -> Result<User, EngineError> {
        self.store
            .get_user(user_id)?
            .ok_or(EngineError::NotFound {
                entity: "user",
                id: user_id,
            })
    }

    fn task_index(&self) -> Result<HashMap<TaskId, Task>, EngineError> {
        Ok(self
            .store
            .list_tasks()?
            .into_iter()
            .map(|task| (task.id, task))
            .collect())
    }

    pub fn pie_chart(&self, user_id: UserId, date: &str) -> Result<Vec<PieSlice>, EngineError> {
        let mut by_task: BTreeMap<TaskId, i64> = BTreeMap::new();
        for record in self.store.records_for_day(user_id, date)? {
            *by_task.entry(record.task_id).or_insert(0) += record.duration;
        }

        let tasks = self.task_index()?;
        let mut slices: Vec<PieSlice> = by_task
            .into_iter()
            .map(|(task_id, value)| PieSlice {
                name: tasks
                    .get(&task_id)
                    .map(|task| task.name.clone())
                    .unwrap_or_else(|| "Unknown Task".to_string()),
                value,
                formatted: format_duration(value),
            })
            .collect();
        slices.sort_by(|a, b| b.value.cmp(&a.value));
        Ok(slices)
    }

    pub fn line_chart(
        &self,
        user_id: UserId,
        start_date: &str,
        end_date: &str,
    ) -> Result<LineChart, EngineError> {
        if parse_date(start_date).is_none() || parse_date(end_date).is_none() {
            return Err(EngineError::Validation(format!(
                "dates must be YYYY-MM-DD, got '{start_date}'..'{end_date}'"
            )));
        }

        let excluded: HashSet<TaskId> = self
            .store
            .list_tasks()?
            .into_iter()
            .filter(|task| !task.counts_toward_totals())
            .map(|task| task.id)
            .collect();

        let mut by_date: HashMap<String, i64> = HashMap::new();
        for record in self.store.records_for_range(user_id, start_date, end_date)? {
            if excluded.contains(&record.task_id) {
                continue;
            }
            *by_date.entry(record.record_date.clone()).or_insert(0) += record.duration;
        }

        let dates = dates_between(start_date, end_date);
        let durations = dates
            .iter()
            .map(|date| by_date.get(date).copied().unwrap_or(0))
            .collect();
        Ok(LineChart { dates, durations })
    }

    pub fn timeline(&self, user_id: UserId, date: &str) -> Result<Vec<TimelineEntry>, EngineError> {
        let user = self.load_user(user_id)?;
        let tasks = self.task_index()?;
        let entry = |task_id: TaskId, start_time: i64, end_time: i64| {
            let task = tasks.get(&task_id);
            TimelineEntry {
                task_name: task
                    .map(|task| task.name.clone())
                    .unwrap_or_else(|| "Unknown".to_string()),
                start_time,
                end_time,
                duration: end_time - start_time,
                is_system: task.map(|task| task.owner.is_system()).unwrap_or(false),
                counted: task.map(Task::counts_toward_totals).unwrap_or(false),
            }
        };

        let mut entries: Vec<TimelineEntry> = self
            .store
            .records_for_day(user_id, date)?
            .into_iter()
            .map(|record| entry(record.task_id, record.start_time, record.end_time))
            .collect();

        if date == self.clock.logical_today() {
            if let Some(active) = user.active {
                let now = self.clock.now_millis();
                entries.push(entry(active.task_id, active.started_at, now));
            }
        }

        entries.sort_by_key(|entry| entry.start_time);
        Ok(entries)
    }

    pub fn check_in_status(&self, user_id: UserId) -> Result<CheckInStatus, EngineError> {
        let user = self.load_user(user_id)?;
        let dates = trailing_dates(&self.clock.logical_today(), 7);
        let (Some(first), Some(last)) = (dates.first(), dates.last()) else {
            return Ok(CheckInStatus {
                daily_goal_hours: user.daily_goal_hours,
                days: Vec::new(),
            });
        };

        let line = self.line_chart(user_id, first, last)?;
        let goal_millis = user.daily_goal_millis();
        let days = line
            .dates
            .into_iter()
            .zip(line.durations)
            .map(|(date, duration)| DayStatus {
                date,
                duration,
                met_goal: duration >= goal_millis,
            })
            .collect();
        Ok(CheckInStatus {
            daily_goal_hours: user.daily_goal_hours,
            days,
        })
    }

    pub fn rankings(
        &self,
        user_id: UserId,
        range: Option<(&str, &str)>,
    ) -> Result<RankingStats, EngineError> {
        self.load_user(user_id)?;
        if let Some((start_date, end_date)) = range {
            if parse_date(start_date).is_none() || parse_date(end_date).is_none() {
                return Err(EngineError::Validation(format!(
                    "dates must be YYYY-MM-DD, got '{start_date}'..'{end_date}'"
                )));
            }
        }

        let usernames: HashMap<UserId, String> = self
            .store
            .list_users()?
            .into_iter()
            .map(|user| (user.id, user.username))
            .collect();
        let to_entries = |totals: Vec<(UserId, i64)>| -> Vec<RankingEntry> {
            totals
                .into_iter()
                .map(|(entry_user, duration)| RankingEntry {
                    user_id: entry_user,
                    username: usernames
                        .get(&entry_user)
                        .cloned()
                        .unwrap_or_else(|| "Unknown".to_string()),
                    duration,
                })
                .collect()
        };

        let today = self.clock.logical_today();
        let today_entries = to_entries(self.store.duration_by_user(&today)?);
        let my_rank = today_entries
            .iter()
            .position(|entry| entry.user_id == user_id)
            .map(|index| index + 1);
        let participants = today_entries.len();

        let yesterday_top3 = match previous_date(&today) {
            Some(yesterday) => {
                let mut entries = to_entries(self.store.duration_by_user(&yesterday)?);
                entries.truncate(3);
                entries
            }
            None => Vec::new(),
        };

        let total_duration = self.store.total_duration(user_id, range)?;
        Ok(RankingStats {
            today: today_entries,
            my_rank,
            participants,
            yesterday_top3,
            total_duration,
        })
    }
}
