use chrono::{DateTime, Duration, LocalResult, NaiveDate, TimeZone, Timelike, Utc};
use chrono_tz::Tz;
use std::sync::Arc;
use std::time::Duration as StdDuration;

pub type NowProvider = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub const DEFAULT_CUTOVER_HOUR: u32 = 4;
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Maps an instant to its logical accounting date: the local calendar
/// date, shifted one day back while the local hour is before the
/// cutover hour. A session crossing real midnight stays on one date.
pub fn logical_date(instant: DateTime<Utc>, timezone: Tz, cutover_hour: u32) -> String {
    let local = instant.with_timezone(&timezone);
    let mut date = local.date_naive();
    if local.hour() < cutover_hour {
        date = date.pred_opt().unwrap_or(date);
    }
    date.format(DATE_FORMAT).to_string()
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value, DATE_FORMAT).ok()
}

pub fn previous_date(value: &str) -> Option<String> {
    let date = parse_date(value)?;
    Some(date.pred_opt()?.format(DATE_FORMAT).to_string())
}

pub fn dates_between(start: &str, end: &str) -> Vec<String> {
    let (Some(start), Some(end)) = (parse_date(start), parse_date(end)) else {
        return Vec::new();
    };

    let mut dates = Vec::new();
    let mut cursor = start;
    while cursor <= end {
        dates.push(cursor.format(DATE_FORMAT).to_string());
        let Some(next) = cursor.succ_opt() else {
            break;
        };
        cursor = next;
    }
    dates
}

pub fn trailing_dates(end: &str, days: u32) -> Vec<String> {
    let Some(end) = parse_date(end) else {
        return Vec::new();
    };
    let Some(start) = end.checked_sub_days(chrono::Days::new(days.saturating_sub(1) as u64))
    else {
        return Vec::new();
    };
    dates_between(
        &start.format(DATE_FORMAT).to_string(),
        &end.format(DATE_FORMAT).to_string(),
    )
}

#[derive(Clone)]
pub struct TrackerClock {
    timezone: Tz,
    cutover_hour: u32,
    now_provider: NowProvider,
}

impl TrackerClock {
    pub fn new(timezone: Tz, cutover_hour: u32) -> Self {
        Self {
            timezone,
            cutover_hour,
            now_provider: Arc::new(Utc::now),
        }
    }

    pub fn with_now_provider(mut self, now_provider: NowProvider) -> Self {
        self.now_provider = now_provider;
        self
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    pub fn cutover_hour(&self) -> u32 {
        self.cutover_hour
    }

    pub fn now(&self) -> DateTime<Utc> {
        (self.now_provider)()
    }

    pub fn now_millis(&self) -> i64 {
        self.now().timestamp_millis()
    }

    pub fn local_hour(&self, instant: DateTime<Utc>) -> u32 {
        instant.with_timezone(&self.timezone).hour()
    }

    pub fn logical_date_at(&self, instant: DateTime<Utc>) -> String {
        logical_date(instant, self.timezone, self.cutover_hour)
    }

    pub fn logical_date_millis(&self, millis: i64) -> String {
        let instant = DateTime::<Utc>::from_timestamp_millis(millis)
            .unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        self.logical_date_at(instant)
    }

    pub fn logical_today(&self) -> String {
        self.logical_date_at(self.now())
    }

    /// Time to sleep until the next local occurrence of `hour`:00,
    /// tolerating DST gaps by aiming one wall-clock hour later.
    pub fn until_next_local_hour(&self, hour: u32) -> StdDuration {
        let now_utc = self.now();
        let now_local = now_utc.with_timezone(&self.timezone);
        let mut date = now_local.date_naive();
        if now_local.hour() >= hour {
            date = date.succ_opt().unwrap_or(date);
        }

        let Some(naive) = date.and_hms_opt(hour, 0, 0) else {
            return StdDuration::from_secs(3600);
        };
        let target = match self.timezone.from_local_datetime(&naive) {
            LocalResult::Single(target) | LocalResult::Ambiguous(target, _) => target,
            LocalResult::None => {
                match self
                    .timezone
                    .from_local_datetime(&(naive + Duration::hours(1)))
                {
                    LocalResult::Single(target) | LocalResult::Ambiguous(target, _) => target,
                    LocalResult::None => return StdDuration::from_secs(3600),
                }
            }
        };

        (target.with_timezone(&Utc) - now_utc)
            .to_std()
            .unwrap_or(StdDuration::from_secs(1))
    }
}
