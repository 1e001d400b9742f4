pub(crate) mod cadence;
pub mod daemon;
pub(crate) mod jobs;

#[allow(dead_code)]
const _SPAWN_JST_BATCH_DAEMON_GUARD: fn(Scheduler, Vec<String>) -> tokio::task::JoinHandle<()> =
    daemon::spawn_jst_batch_daemon;
pub(crate) use jobs::{JobContext, Scheduler};
