//! Sync job submission and polling
//!
//! A [`SyncJobs`] backend accepts a job for a connection and reports its state
//! when polled. [`SyncCoordinator`] drives one job to completion per call,
//! refusing to start a second job for a connection that already has one in
//! flight, and gives up after a configured wait.

use async_trait::async_trait;
use integrator_core::{Connection, ConnectionId, ConnectionStatus, Error, Result, SyncConfig};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Reference to a submitted job
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct JobHandle {
    /// Job id assigned by the backend
    pub id: Uuid,
    /// Connection the job syncs
    pub connection_id: ConnectionId,
}

/// Job state as reported by a poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobState {
    /// Still running
    Pending,
    /// Finished successfully
    Succeeded,
    /// Finished with an error
    Failed(String),
}

impl JobState {
    /// Whether the job has finished
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// Backend that runs sync jobs
#[async_trait]
pub trait SyncJobs: Send + Sync {
    /// Start a job for `connection`
    async fn submit(&self, connection: &Connection) -> Result<JobHandle>;

    /// Current state of a submitted job
    async fn poll(&self, handle: &JobHandle) -> Result<JobState>;

    /// Abandon a job; the backend forgets it
    async fn cancel(&self, handle: &JobHandle) -> Result<()>;

    /// Backend name for logging
    fn name(&self) -> &str;
}

/// In-process job backend that finishes every job after a fixed delay
pub struct SimulatedSyncJobs {
    delay: Duration,
    failure: Option<String>,
    jobs: Mutex<HashMap<Uuid, Instant>>,
}

impl SimulatedSyncJobs {
    /// Jobs succeed `delay` after submission
    #[must_use]
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            failure: None,
            jobs: Mutex::new(HashMap::new()),
        }
    }

    /// Backend using the configured simulated delay
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.simulated_delay())
    }

    /// Make every job fail with `reason` once its delay has passed
    #[must_use]
    pub fn failing_with(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Number of jobs submitted and not yet reported finished
    #[must_use]
    pub fn pending_jobs(&self) -> usize {
        self.jobs.lock().len()
    }
}

impl Default for SimulatedSyncJobs {
    fn default() -> Self {
        Self::from_config(&SyncConfig::default())
    }
}

impl fmt::Debug for SimulatedSyncJobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SimulatedSyncJobs")
            .field("delay", &self.delay)
            .field("failure", &self.failure)
            .field("pending_jobs", &self.pending_jobs())
            .finish()
    }
}

#[async_trait]
impl SyncJobs for SimulatedSyncJobs {
    async fn submit(&self, connection: &Connection) -> Result<JobHandle> {
        let handle = JobHandle {
            id: Uuid::new_v4(),
            connection_id: connection.id.clone(),
        };
        self.jobs.lock().insert(handle.id, Instant::now());
        debug!(
            job_id = %handle.id,
            connection_id = %handle.connection_id,
            "simulated job submitted"
        );
        Ok(handle)
    }

    async fn poll(&self, handle: &JobHandle) -> Result<JobState> {
        let mut jobs = self.jobs.lock();
        let submitted = *jobs
            .get(&handle.id)
            .ok_or_else(|| Error::not_found(format!("sync job {}", handle.id)))?;

        if submitted.elapsed() < self.delay {
            return Ok(JobState::Pending);
        }

        jobs.remove(&handle.id);
        Ok(self
            .failure
            .clone()
            .map_or(JobState::Succeeded, JobState::Failed))
    }

    async fn cancel(&self, handle: &JobHandle) -> Result<()> {
        if self.jobs.lock().remove(&handle.id).is_none() {
            return Err(Error::not_found(format!("sync job {}", handle.id)));
        }
        debug!(job_id = %handle.id, "simulated job cancelled");
        Ok(())
    }

    fn name(&self) -> &str {
        "simulated"
    }
}

/// How a finished sync went
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// The job completed
    Succeeded,
    /// The job reported a failure
    Failed {
        /// Reason given by the backend
        reason: String,
    },
}

impl SyncOutcome {
    /// Connection status this outcome implies
    #[must_use]
    pub const fn status(&self) -> ConnectionStatus {
        match self {
            Self::Succeeded => ConnectionStatus::Connected,
            Self::Failed { .. } => ConnectionStatus::Error,
        }
    }
}

/// Runs sync jobs, at most one per connection at a time
#[derive(Clone)]
pub struct SyncCoordinator {
    jobs: Arc<dyn SyncJobs>,
    in_flight: Arc<Mutex<HashSet<ConnectionId>>>,
    poll_interval: Duration,
    max_wait: Duration,
}

impl fmt::Debug for SyncCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SyncCoordinator")
            .field("jobs", &self.jobs.name())
            .field("in_flight", &self.in_flight.lock().len())
            .field("poll_interval", &self.poll_interval)
            .field("max_wait", &self.max_wait)
            .finish()
    }
}

impl SyncCoordinator {
    /// Coordinator polling `jobs` every `poll_interval` for at most `max_wait`
    #[must_use]
    pub fn new(jobs: Arc<dyn SyncJobs>, poll_interval: Duration, max_wait: Duration) -> Self {
        Self {
            jobs,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
            poll_interval,
            max_wait,
        }
    }

    /// Coordinator using the configured poll interval and wait limit
    #[must_use]
    pub fn from_config(jobs: Arc<dyn SyncJobs>, config: &SyncConfig) -> Self {
        Self::new(jobs, config.poll_interval(), config.max_wait())
    }

    /// Whether `id` has a job in flight
    #[must_use]
    pub fn is_syncing(&self, id: &ConnectionId) -> bool {
        self.in_flight.lock().contains(id)
    }

    /// Connections with a job in flight
    #[must_use]
    pub fn in_flight(&self) -> Vec<ConnectionId> {
        let mut ids: Vec<ConnectionId> = self.in_flight.lock().iter().cloned().collect();
        ids.sort();
        ids
    }

    /// Submit a job for `connection` and wait for it to finish
    ///
    /// # Errors
    ///
    /// - [`Error::Busy`] if the connection already has a job in flight
    /// - [`Error::Timeout`] if the job is still pending after the wait limit
    /// - any error the job backend returns
    pub async fn run(&self, connection: &Connection) -> Result<SyncOutcome> {
        let _guard = InFlightGuard::acquire(&self.in_flight, &connection.id)?;

        info!(
            connection_id = %connection.id,
            connection = %connection.name,
            backend = self.jobs.name(),
            "sync started"
        );
        let handle = self.jobs.submit(connection).await?;
        let started = Instant::now();

        loop {
            match self.jobs.poll(&handle).await? {
                JobState::Pending => {
                    if started.elapsed() >= self.max_wait {
                        warn!(
                            job_id = %handle.id,
                            connection_id = %connection.id,
                            "sync timed out"
                        );
                        if let Err(e) = self.jobs.cancel(&handle).await {
                            warn!(
                                job_id = %handle.id,
                                error = %e,
                                "failed to cancel timed out job"
                            );
                        }
                        return Err(Error::Timeout {
                            duration_ms: u64::try_from(self.max_wait.as_millis())
                                .unwrap_or(u64::MAX),
                        });
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
                JobState::Succeeded => {
                    info!(job_id = %handle.id, connection_id = %connection.id, "sync succeeded");
                    return Ok(SyncOutcome::Succeeded);
                }
                JobState::Failed(reason) => {
                    warn!(
                        job_id = %handle.id,
                        connection_id = %connection.id,
                        %reason,
                        "sync failed"
                    );
                    return Ok(SyncOutcome::Failed { reason });
                }
            }
        }
    }
}

/// Marks a connection in flight until dropped
struct InFlightGuard {
    set: Arc<Mutex<HashSet<ConnectionId>>>,
    id: ConnectionId,
}

impl InFlightGuard {
    fn acquire(set: &Arc<Mutex<HashSet<ConnectionId>>>, id: &ConnectionId) -> Result<Self> {
        if !set.lock().insert(id.clone()) {
            return Err(Error::busy(format!("sync for connection {id}")));
        }
        Ok(Self {
            set: Arc::clone(set),
            id: id.clone(),
        })
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.set.lock().remove(&self.id);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use integrator_core::{Destination, Schedule, ScheduleFrequency, Secret, Source};
    use pretty_assertions::assert_eq;

    fn connection(id: &str) -> Connection {
        Connection {
            id: ConnectionId::from(id),
            name: format!("conn {id}"),
            source: Source::default(),
            destination: Destination::default(),
            schedule: Schedule {
                frequency: ScheduleFrequency::Hourly,
                start_time: NaiveDate::from_ymd_opt(2024, 1, 1)
                    .unwrap()
                    .and_hms_opt(0, 0, 0)
                    .unwrap(),
            },
            status: ConnectionStatus::Disconnected,
            base_url: String::new(),
            api_key: Secret::default(),
        }
    }

    fn coordinator(jobs: SimulatedSyncJobs, max_wait: Duration) -> SyncCoordinator {
        SyncCoordinator::new(Arc::new(jobs), Duration::from_millis(100), max_wait)
    }

    #[tokio::test(start_paused = true)]
    async fn test_simulated_job_succeeds_after_delay() {
        let jobs = SimulatedSyncJobs::new(Duration::from_secs(1));
        let handle = jobs.submit(&connection("a")).await.unwrap();

        assert_eq!(jobs.poll(&handle).await.unwrap(), JobState::Pending);
        tokio::time::advance(Duration::from_millis(1000)).await;
        assert_eq!(jobs.poll(&handle).await.unwrap(), JobState::Succeeded);
        assert_eq!(jobs.pending_jobs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_unknown_job_is_not_found() {
        let jobs = SimulatedSyncJobs::default();
        let handle = JobHandle {
            id: Uuid::new_v4(),
            connection_id: ConnectionId::from("x"),
        };
        assert!(matches!(
            jobs.poll(&handle).await,
            Err(Error::NotFound { .. })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_success() {
        let sync = coordinator(SimulatedSyncJobs::default(), Duration::from_secs(60));
        let conn = connection("a");

        let outcome = sync.run(&conn).await.unwrap();
        assert_eq!(outcome, SyncOutcome::Succeeded);
        assert_eq!(outcome.status(), ConnectionStatus::Connected);
        assert!(!sync.is_syncing(&conn.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_reports_failure() {
        let jobs =
            SimulatedSyncJobs::new(Duration::from_millis(300)).failing_with("quota exceeded");
        let sync = coordinator(jobs, Duration::from_secs(60));

        let outcome = sync.run(&connection("a")).await.unwrap();
        assert_eq!(
            outcome,
            SyncOutcome::Failed {
                reason: "quota exceeded".to_string()
            }
        );
        assert_eq!(outcome.status(), ConnectionStatus::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_duplicate_sync_is_refused() {
        let sync = coordinator(SimulatedSyncJobs::default(), Duration::from_secs(60));
        let conn = connection("a");

        let (first, second) = tokio::join!(sync.run(&conn), sync.run(&conn));
        let results = [first, second];

        assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
        assert_eq!(
            results
                .iter()
                .filter(|r| matches!(r, Err(Error::Busy { .. })))
                .count(),
            1
        );
        assert!(sync.in_flight().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_distinct_connections_sync_concurrently() {
        let sync = coordinator(SimulatedSyncJobs::default(), Duration::from_secs(60));
        let a = connection("a");
        let b = connection("b");

        let (first, second) = tokio::join!(sync.run(&a), sync.run(&b));
        assert_eq!(first.unwrap(), SyncOutcome::Succeeded);
        assert_eq!(second.unwrap(), SyncOutcome::Succeeded);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_is_visible_while_running() {
        let sync = coordinator(SimulatedSyncJobs::default(), Duration::from_secs(60));
        let conn = connection("a");

        let task = {
            let sync = sync.clone();
            let conn = conn.clone();
            tokio::spawn(async move { sync.run(&conn).await })
        };
        tokio::task::yield_now().await;
        assert!(sync.is_syncing(&conn.id));
        assert_eq!(sync.in_flight(), vec![conn.id.clone()]);

        assert_eq!(task.await.unwrap().unwrap(), SyncOutcome::Succeeded);
        assert!(!sync.is_syncing(&conn.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_times_out_and_releases_connection() {
        let jobs = SimulatedSyncJobs::new(Duration::from_secs(10));
        let sync = coordinator(jobs, Duration::from_secs(1));
        let conn = connection("a");

        let result = sync.run(&conn).await;
        match result {
            Err(Error::Timeout { duration_ms }) => assert_eq!(duration_ms, 1000),
            other => panic!("Expected timeout, got {other:?}"),
        }
        assert!(!sync.is_syncing(&conn.id));
    }

    #[tokio::test(start_paused = true)]
    async fn test_timed_out_jobs_are_cancelled() {
        let jobs = Arc::new(SimulatedSyncJobs::new(Duration::from_secs(10)));
        let sync = SyncCoordinator::new(
            Arc::clone(&jobs) as Arc<dyn SyncJobs>,
            Duration::from_millis(100),
            Duration::from_secs(1),
        );

        for id in ["a", "b", "c", "d", "e"] {
            assert!(matches!(
                sync.run(&connection(id)).await,
                Err(Error::Timeout { .. })
            ));
        }
        tokio::time::advance(Duration::from_secs(3600)).await;
        assert_eq!(jobs.pending_jobs(), 0);
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_not_found() {
        let jobs = SimulatedSyncJobs::default();
        let handle = jobs.submit(&connection("a")).await.unwrap();

        jobs.cancel(&handle).await.unwrap();
        assert_eq!(jobs.pending_jobs(), 0);
        assert!(matches!(
            jobs.cancel(&handle).await,
            Err(Error::NotFound { .. })
        ));
    }
}
