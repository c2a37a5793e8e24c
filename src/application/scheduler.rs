use crate::application::engine::TaskSwitchEngine;
use crate::application::error::EngineError;
use crate::infrastructure::config::ScheduleConfig;
use crate::infrastructure::store::TrackerStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{sleep, Duration};
use tracing::{debug, info, warn};

// one user failing must not block the rest of the pass
pub fn enforce_idle_users<S: TrackerStore>(
    engine: &TaskSwitchEngine<S>,
    store: &S,
    now_millis: i64,
) -> Result<usize, EngineError> {
    let mut armed = 0;
    for user in store.list_users()? {
        match engine.arm_leave_if_idle(user.id, now_millis) {
            Ok(true) => {
                debug!(user = user.id, username = %user.username, "armed Away for idle user");
                armed += 1;
            }
            Ok(false) => {}
            Err(error) => {
                warn!(user = user.id, %error, "idle check failed for user, skipping");
            }
        }
    }
    Ok(armed)
}

pub fn run_daily_settlement<S: TrackerStore>(
    engine: &TaskSwitchEngine<S>,
    store: &S,
    now_millis: i64,
) -> Result<usize, EngineError> {
    let mut settled = 0;
    for user in store.list_users()? {
        let was_active = user.active.is_some();
        match engine.settle_user(user.id, now_millis) {
            Ok(_) => {
                if was_active {
                    settled += 1;
                }
            }
            Err(error) => {
                warn!(user = user.id, %error, "settlement failed for user, skipping");
            }
        }
    }
    Ok(settled)
}

fn within_poll_window(hour: u32, config: &ScheduleConfig) -> bool {
    hour >= config.poll_window_start_hour && hour < config.poll_window_end_hour
}

pub struct EnforcementScheduler<S: TrackerStore> {
    engine: Arc<TaskSwitchEngine<S>>,
    store: Arc<S>,
    config: ScheduleConfig,
}

impl<S: TrackerStore + 'static> EnforcementScheduler<S> {
    pub fn new(engine: Arc<TaskSwitchEngine<S>>, store: Arc<S>, config: ScheduleConfig) -> Self {
        Self {
            engine,
            store,
            config,
        }
    }

    pub fn spawn(self) -> Vec<JoinHandle<()>> {
        vec![
            tokio::spawn(Self::morning_check_loop(
                self.engine.clone(),
                self.store.clone(),
                self.config.morning_hour,
            )),
            tokio::spawn(Self::mandatory_poll_loop(
                self.engine.clone(),
                self.store.clone(),
                self.config.clone(),
            )),
            tokio::spawn(Self::daily_settlement_loop(self.engine, self.store)),
        ]
    }

    async fn morning_check_loop(engine: Arc<TaskSwitchEngine<S>>, store: Arc<S>, hour: u32) {
        loop {
            let wait = engine.clock().until_next_local_hour(hour);
            sleep(wait).await;
            match enforce_idle_users(engine.as_ref(), store.as_ref(), engine.clock().now_millis())
            {
                Ok(armed) => info!(armed, "morning check complete"),
                Err(error) => warn!(%error, "morning check failed"),
            }
        }
    }

    async fn mandatory_poll_loop(
        engine: Arc<TaskSwitchEngine<S>>,
        store: Arc<S>,
        config: ScheduleConfig,
    ) {
        let interval = Duration::from_secs(config.poll_interval_secs);
        loop {
            sleep(interval).await;
            let now = engine.clock().now();
            if !within_poll_window(engine.clock().local_hour(now), &config) {
                continue;
            }
            if let Err(error) =
                enforce_idle_users(engine.as_ref(), store.as_ref(), now.timestamp_millis())
            {
                warn!(%error, "mandatory poll failed");
            }
        }
    }

    async fn daily_settlement_loop(engine: Arc<TaskSwitchEngine<S>>, store: Arc<S>) {
        loop {
            let wait = engine
                .clock()
                .until_next_local_hour(engine.clock().cutover_hour());
            sleep(wait).await;
            match run_daily_settlement(
                engine.as_ref(),
                store.as_ref(),
                engine.clock().now_millis(),
            ) {
                Ok(settled) => info!(settled, "daily settlement complete"),
                Err(error) => warn!(%error, "daily settlement failed"),
            }
        }
    }
}
