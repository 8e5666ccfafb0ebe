//! Batch Executor
//!
//! Fans one command out to many devices.
//!
//! # Architecture
//!
//! ```text
//!                  ┌──────────┐   (index, Running)    ┌────────────┐   BatchEvent
//!  queue ────────► │ worker 1 │ ────────────────────► │            │ ───────────► observer
//!  (index, name)   │ worker 2 │   (index, outcome)    │ aggregator │
//!                  │ worker N │ ────────────────────► │            │ ──► Vec<BatchEntry>
//!                  └──────────┘                       └────────────┘
//! ```
//!
//! `N = min(max_concurrency, targets)`. Workers never touch the result
//! vector; the aggregator places outcomes by index and is the only sender
//! of events, so per-device events are strictly ordered. Slots a dead
//! worker never reported are filled in when the worker channel closes.

use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::types::{
    BatchEntry, BatchError, BatchEvent, DeviceFailure, DeviceStatus, JobSummary,
};
use crate::config::BatchConfig;
use crate::device::SessionOpener;
use crate::inventory::{DeviceRecord, Inventory};

/// Executor limits
#[derive(Debug, Clone, Copy)]
pub struct ExecutorSettings {
    pub max_concurrency: usize,
    pub device_timeout: Duration,
    pub cancel_grace: Duration,
}

impl From<&BatchConfig> for ExecutorSettings {
    fn from(config: &BatchConfig) -> Self {
        Self {
            max_concurrency: config.max_concurrency,
            device_timeout: config.device_timeout(),
            cancel_grace: config.cancel_grace(),
        }
    }
}

struct ActiveJob {
    summary: JobSummary,
    cancel: CancellationToken,
}

/// Removes the job from the registry and cancels it when the run ends or
/// the driving future is dropped
struct JobRegistration<'a> {
    jobs: &'a DashMap<Uuid, ActiveJob>,
    id: Uuid,
    cancel: CancellationToken,
}

impl Drop for JobRegistration<'_> {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.jobs.remove(&self.id);
    }
}

enum WorkerMsg {
    Running(usize),
    Done(usize, Result<String, DeviceFailure>),
}

pub struct BatchExecutor {
    inventory: Arc<Inventory>,
    opener: Arc<dyn SessionOpener>,
    settings: ExecutorSettings,
    jobs: DashMap<Uuid, ActiveJob>,
}

impl BatchExecutor {
    pub fn new(
        inventory: Arc<Inventory>,
        opener: Arc<dyn SessionOpener>,
        settings: ExecutorSettings,
    ) -> Self {
        Self {
            inventory,
            opener,
            settings,
            jobs: DashMap::new(),
        }
    }

    /// Reject malformed requests before any I/O
    pub fn validate(targets: &[String], command: &str) -> Result<(), BatchError> {
        if targets.is_empty() {
            return Err(BatchError::EmptyTargets);
        }
        if command.trim().is_empty() {
            return Err(BatchError::EmptyCommand);
        }
        let mut seen = HashSet::with_capacity(targets.len());
        for target in targets {
            if !seen.insert(target.as_str()) {
                return Err(BatchError::DuplicateTarget(target.clone()));
            }
        }
        Ok(())
    }

    /// Run `command` on every target and return one entry per target, in order
    ///
    /// Cancelling `cancel` (or dropping the returned future) stops the job:
    /// devices not yet started end as `cancelled`, in-flight devices get the
    /// cancel grace period to finish.
    pub async fn execute(
        &self,
        targets: Vec<String>,
        command: String,
        observer: Option<mpsc::UnboundedSender<BatchEvent>>,
        cancel: CancellationToken,
    ) -> Result<Vec<BatchEntry>, BatchError> {
        let targets: Vec<String> = targets.into_iter().map(|t| t.trim().to_string()).collect();
        Self::validate(&targets, &command)?;
        let command = command.trim().to_string();

        let job_id = Uuid::new_v4();
        self.jobs.insert(
            job_id,
            ActiveJob {
                summary: JobSummary {
                    id: job_id,
                    command: command.clone(),
                    devices: targets.clone(),
                    started_at: Utc::now(),
                },
                cancel: cancel.clone(),
            },
        );
        let _registration = JobRegistration {
            jobs: &self.jobs,
            id: job_id,
            cancel: cancel.clone(),
        };

        info!(
            "Batch {} started: {:?} on {} device(s)",
            job_id,
            command,
            targets.len()
        );
        let emit = |event: BatchEvent| {
            if let Some(observer) = &observer {
                let _ = observer.send(event);
            }
        };
        emit(BatchEvent::Started {
            job_id,
            command: command.clone(),
            devices: targets.clone(),
        });

        let snapshot = self.inventory.snapshot();
        let queue: VecDeque<(usize, Option<DeviceRecord>)> = targets
            .iter()
            .enumerate()
            .map(|(index, name)| (index, snapshot.device(name).cloned()))
            .collect();
        let queue = Arc::new(Mutex::new(queue));

        let workers = self.settings.max_concurrency.max(1).min(targets.len());
        let (tx, mut rx) = mpsc::unbounded_channel::<WorkerMsg>();
        let command = Arc::new(command);

        for worker_id in 0..workers {
            let ctx = WorkerContext {
                queue: Arc::clone(&queue),
                tx: tx.clone(),
                opener: Arc::clone(&self.opener),
                command: Arc::clone(&command),
                settings: self.settings,
                cancel: cancel.clone(),
            };
            tokio::spawn(async move {
                ctx.run().await;
                debug!("Batch worker {} exited", worker_id);
            });
        }
        drop(tx);

        let mut states = vec![DeviceStatus::Pending; targets.len()];
        let mut results: Vec<Option<BatchEntry>> = vec![None; targets.len()];

        while let Some(msg) = rx.recv().await {
            match msg {
                WorkerMsg::Running(index) => {
                    states[index] = DeviceStatus::Running;
                    emit(state_event(job_id, index, &targets[index], DeviceStatus::Running, None));
                }
                WorkerMsg::Done(index, outcome) => {
                    let entry = match outcome {
                        Ok(output) => BatchEntry::success(&targets[index], output),
                        Err(failure) => {
                            debug!("Batch {}: {} failed: {}", job_id, targets[index], failure);
                            BatchEntry::error(&targets[index], failure.to_string())
                        }
                    };
                    states[index] = entry.status;
                    emit(state_event(
                        job_id,
                        index,
                        &targets[index],
                        entry.status,
                        Some(entry.output.clone()),
                    ));
                    results[index] = Some(entry);
                }
            }
        }

        // Every worker is gone; anything unreported belonged to a dead worker
        let results: Vec<BatchEntry> = results
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.unwrap_or_else(|| {
                    warn!("Batch {}: no result for {}", job_id, targets[index]);
                    if states[index] == DeviceStatus::Pending {
                        emit(state_event(job_id, index, &targets[index], DeviceStatus::Running, None));
                    }
                    let entry = BatchEntry::error(&targets[index], DeviceFailure::WorkerLost.to_string());
                    emit(state_event(
                        job_id,
                        index,
                        &targets[index],
                        DeviceStatus::Error,
                        Some(entry.output.clone()),
                    ));
                    entry
                })
            })
            .collect();

        let failed = results.iter().filter(|r| r.status == DeviceStatus::Error).count();
        info!(
            "Batch {} finished: {} succeeded, {} failed",
            job_id,
            results.len() - failed,
            failed
        );
        emit(BatchEvent::Finished {
            job_id,
            results: results.clone(),
        });

        Ok(results)
    }

    /// Active jobs, oldest first
    pub fn list_jobs(&self) -> Vec<JobSummary> {
        let mut jobs: Vec<JobSummary> = self.jobs.iter().map(|j| j.summary.clone()).collect();
        jobs.sort_by_key(|j| j.started_at);
        jobs
    }

    /// Cancel an active job; false if no such job is running
    pub fn cancel_job(&self, id: &Uuid) -> bool {
        match self.jobs.get(id) {
            Some(job) => {
                info!("Batch {} cancel requested", id);
                job.cancel.cancel();
                true
            }
            None => false,
        }
    }
}

fn state_event(
    job_id: Uuid,
    index: usize,
    device: &str,
    status: DeviceStatus,
    output: Option<String>,
) -> BatchEvent {
    BatchEvent::State {
        job_id,
        index,
        device: device.to_string(),
        status,
        output,
    }
}

struct WorkerContext {
    queue: Arc<Mutex<VecDeque<(usize, Option<DeviceRecord>)>>>,
    tx: mpsc::UnboundedSender<WorkerMsg>,
    opener: Arc<dyn SessionOpener>,
    command: Arc<String>,
    settings: ExecutorSettings,
    cancel: CancellationToken,
}

impl WorkerContext {
    async fn run(self) {
        loop {
            let next = self.queue.lock().pop_front();
            let Some((index, record)) = next else {
                break;
            };

            if self.tx.send(WorkerMsg::Running(index)).is_err() {
                break;
            }

            let outcome = match record {
                None => Err(DeviceFailure::UnknownDevice),
                Some(_) if self.cancel.is_cancelled() => Err(DeviceFailure::Cancelled),
                Some(record) => self.run_device(&record).await,
            };

            if self.tx.send(WorkerMsg::Done(index, outcome)).is_err() {
                break;
            }
        }
    }

    async fn run_device(&self, record: &DeviceRecord) -> Result<String, DeviceFailure> {
        let work = async {
            let mut session = self.opener.open(record).await?;
            let output = session.run_command(&self.command).await;
            session.close().await;
            Ok::<_, DeviceFailure>(output?)
        };
        let work = tokio::time::timeout(self.settings.device_timeout, work);
        tokio::pin!(work);

        let finished = tokio::select! {
            result = &mut work => Some(result),
            _ = self.cancel.cancelled() => None,
        };

        let result = match finished {
            Some(result) => result,
            None => {
                debug!("{}: cancelled in flight, waiting up to {:?}", record.name, self.settings.cancel_grace);
                match tokio::time::timeout(self.settings.cancel_grace, &mut work).await {
                    Ok(result) => result,
                    Err(_) => return Err(DeviceFailure::Cancelled),
                }
            }
        };

        result.map_err(|_| DeviceFailure::Timeout)?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::{DeviceSession, SessionError};
    use async_trait::async_trait;
    use std::collections::{BTreeSet, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Clone)]
    enum Script {
        Reply { delay: Duration, output: &'static str },
        Hang,
        Fail(SessionError),
    }

    struct FakeSession {
        script: Script,
        closes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl DeviceSession for FakeSession {
        async fn run_command(&mut self, _command: &str) -> Result<String, SessionError> {
            match &self.script {
                Script::Reply { delay, output } => {
                    tokio::time::sleep(*delay).await;
                    Ok(output.to_string())
                }
                Script::Hang => {
                    std::future::pending::<()>().await;
                    unreachable!()
                }
                Script::Fail(e) => Err(e.clone()),
            }
        }

        async fn close(self: Box<Self>) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Default)]
    struct FakeOpener {
        scripts: HashMap<String, Script>,
        opened: AtomicUsize,
        in_flight: AtomicUsize,
        peak: AtomicUsize,
        closes: Arc<AtomicUsize>,
    }

    impl FakeOpener {
        fn with(scripts: &[(&str, Script)]) -> Self {
            Self {
                scripts: scripts
                    .iter()
                    .map(|(name, script)| (name.to_string(), script.clone()))
                    .collect(),
                ..Default::default()
            }
        }
    }

    #[async_trait]
    impl SessionOpener for FakeOpener {
        async fn open(&self, device: &DeviceRecord) -> Result<Box<dyn DeviceSession>, SessionError> {
            self.opened.fetch_add(1, Ordering::SeqCst);
            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(5)).await;
            self.in_flight.fetch_sub(1, Ordering::SeqCst);

            let script = self
                .scripts
                .get(&device.name)
                .cloned()
                .unwrap_or(Script::Reply {
                    delay: Duration::ZERO,
                    output: "ok",
                });
            if let Script::Fail(SessionError::Unreachable(msg)) = &script {
                return Err(SessionError::Unreachable(msg.clone()));
            }
            Ok(Box::new(FakeSession {
                script,
                closes: self.closes.clone(),
            }))
        }
    }

    async fn inventory_with(names: &[&str]) -> Arc<Inventory> {
        let inventory = Arc::new(Inventory::in_memory());
        for name in names {
            inventory
                .add_device(DeviceRecord {
                    name: name.to_string(),
                    host: "10.0.0.1".into(),
                    port: 22,
                    device_type: "cisco_ios".into(),
                    credential_name: "lab".into(),
                    jumphost_profile: None,
                    jumphost2_profile: None,
                    tags: BTreeSet::new(),
                })
                .await
                .unwrap();
        }
        inventory
    }

    fn settings(timeout_ms: u64) -> ExecutorSettings {
        ExecutorSettings {
            max_concurrency: 5,
            device_timeout: Duration::from_millis(timeout_ms),
            cancel_grace: Duration::from_millis(50),
        }
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_mixed_outcomes_in_submitted_order() {
        let opener = Arc::new(FakeOpener::with(&[
            (
                "r1",
                Script::Reply {
                    delay: Duration::from_millis(10),
                    output: "Version 1.0",
                },
            ),
            ("r2", Script::Hang),
        ]));
        let executor = BatchExecutor::new(inventory_with(&["r1", "r2"]).await, opener, settings(200));

        let results = executor
            .execute(
                names(&["r1", "r2", "ghost"]),
                "show version".into(),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(
            results,
            vec![
                BatchEntry::success("r1", "Version 1.0"),
                BatchEntry::error("r2", "timeout"),
                BatchEntry::error("ghost", "unknown device"),
            ]
        );
        assert!(executor.list_jobs().is_empty());
    }

    #[tokio::test]
    async fn test_order_independent_of_completion_order() {
        let opener = Arc::new(FakeOpener::with(&[
            (
                "slow",
                Script::Reply {
                    delay: Duration::from_millis(80),
                    output: "slow",
                },
            ),
            (
                "fast",
                Script::Reply {
                    delay: Duration::ZERO,
                    output: "fast",
                },
            ),
        ]));
        let executor =
            BatchExecutor::new(inventory_with(&["slow", "fast"]).await, opener, settings(1000));

        let results = executor
            .execute(names(&["slow", "fast"]), "show clock".into(), None, CancellationToken::new())
            .await
            .unwrap();

        let devices: Vec<_> = results.iter().map(|r| r.device.as_str()).collect();
        assert_eq!(devices, vec!["slow", "fast"]);
        assert_eq!(results[0].output, "slow");
    }

    #[tokio::test]
    async fn test_session_errors_do_not_stop_other_devices() {
        let opener = Arc::new(FakeOpener::with(&[
            ("r1", Script::Fail(SessionError::Unreachable("no route to host".into()))),
            ("r2", Script::Fail(SessionError::Command("shell closed by device".into()))),
        ]));
        let executor =
            BatchExecutor::new(inventory_with(&["r1", "r2", "r3"]).await, opener.clone(), settings(1000));

        let results = executor
            .execute(names(&["r1", "r2", "r3"]), "show ip int brief".into(), None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results[0].status, DeviceStatus::Error);
        assert_eq!(results[0].output, "unreachable: no route to host");
        assert_eq!(results[1].output, "command failed: shell closed by device");
        assert_eq!(results[2], BatchEntry::success("r3", "ok"));
        // Sessions that opened are closed even when the command fails
        assert_eq!(opener.closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_validation_before_io() {
        let opener = Arc::new(FakeOpener::default());
        let executor = BatchExecutor::new(inventory_with(&["r1"]).await, opener.clone(), settings(100));

        let run = |targets: Vec<String>, command: &str| {
            executor.execute(targets, command.to_string(), None, CancellationToken::new())
        };

        assert_eq!(run(vec![], "show version").await, Err(BatchError::EmptyTargets));
        assert_eq!(run(names(&["r1"]), "   ").await, Err(BatchError::EmptyCommand));
        assert_eq!(
            run(names(&["r1", "r1"]), "show version").await,
            Err(BatchError::DuplicateTarget("r1".into()))
        );
        assert_eq!(opener.opened.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let targets: Vec<String> = (0..12).map(|i| format!("d{}", i)).collect();
        let refs: Vec<&str> = targets.iter().map(String::as_str).collect();
        let opener = Arc::new(FakeOpener::default());
        let mut limits = settings(1000);
        limits.max_concurrency = 3;
        let executor = BatchExecutor::new(inventory_with(&refs).await, opener.clone(), limits);

        let results = executor
            .execute(targets.clone(), "show version".into(), None, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(results.len(), 12);
        assert!(results.iter().all(|r| r.status == DeviceStatus::Success));
        assert!(opener.peak.load(Ordering::SeqCst) <= 3);
    }

    #[tokio::test]
    async fn test_events_follow_lifecycle() {
        let opener = Arc::new(FakeOpener::default());
        let executor = BatchExecutor::new(inventory_with(&["r1"]).await, opener, settings(1000));
        let (tx, mut rx) = mpsc::unbounded_channel();

        executor
            .execute(names(&["r1", "ghost"]), "show version".into(), Some(tx), CancellationToken::new())
            .await
            .unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert!(matches!(events.first(), Some(BatchEvent::Started { .. })));
        assert!(matches!(events.last(), Some(BatchEvent::Finished { results, .. }) if results.len() == 2));

        for device in ["r1", "ghost"] {
            let statuses: Vec<DeviceStatus> = events
                .iter()
                .filter_map(|e| match e {
                    BatchEvent::State { device: d, status, .. } if d == device => Some(*status),
                    _ => None,
                })
                .collect();
            assert_eq!(statuses.len(), 2, "{}", device);
            assert_eq!(statuses[0], DeviceStatus::Running);
            assert!(statuses[1].is_terminal());
        }
    }

    #[tokio::test]
    async fn test_cancel_marks_unfinished_devices() {
        let opener = Arc::new(FakeOpener::with(&[
            (
                "quick",
                Script::Reply {
                    delay: Duration::ZERO,
                    output: "done",
                },
            ),
            ("stuck", Script::Hang),
            ("queued", Script::Hang),
        ]));
        let mut limits = settings(10_000);
        limits.max_concurrency = 2;
        let executor = Arc::new(BatchExecutor::new(
            inventory_with(&["quick", "stuck", "queued"]).await,
            opener,
            limits,
        ));

        let cancel = CancellationToken::new();
        let run = {
            let executor = executor.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                executor
                    .execute(names(&["quick", "stuck", "queued"]), "show run".into(), None, cancel)
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(100)).await;
        let jobs = executor.list_jobs();
        assert_eq!(jobs.len(), 1);
        assert!(executor.cancel_job(&jobs[0].id));

        let results = run.await.unwrap().unwrap();
        assert_eq!(results[0], BatchEntry::success("quick", "done"));
        assert_eq!(results[1], BatchEntry::error("stuck", "cancelled"));
        assert_eq!(results[2], BatchEntry::error("queued", "cancelled"));
        assert!(executor.list_jobs().is_empty());
        assert!(!executor.cancel_job(&jobs[0].id));
    }

    #[tokio::test]
    async fn test_in_flight_device_finishing_within_grace_keeps_result() {
        let opener = Arc::new(FakeOpener::with(&[
            (
                "slow",
                Script::Reply {
                    delay: Duration::from_millis(150),
                    output: "Version 2.1",
                },
            ),
            ("stuck", Script::Hang),
        ]));
        let mut limits = settings(10_000);
        limits.cancel_grace = Duration::from_millis(400);
        let executor = BatchExecutor::new(
            inventory_with(&["slow", "stuck"]).await,
            opener.clone(),
            limits,
        );

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            trigger.cancel();
        });

        let results = executor
            .execute(names(&["slow", "stuck"]), "show version".into(), None, cancel)
            .await
            .unwrap();

        assert_eq!(results[0], BatchEntry::success("slow", "Version 2.1"));
        assert_eq!(results[1], BatchEntry::error("stuck", "cancelled"));
        assert_eq!(opener.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_precancelled_job_attempts_nothing() {
        let opener = Arc::new(FakeOpener::default());
        let executor = BatchExecutor::new(inventory_with(&["r1", "r2"]).await, opener.clone(), settings(100));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let results = executor
            .execute(names(&["r1", "r2"]), "show version".into(), None, cancel)
            .await
            .unwrap();

        assert!(results.iter().all(|r| r.output == "cancelled"));
        assert_eq!(opener.opened.load(Ordering::SeqCst), 0);
    }
}
