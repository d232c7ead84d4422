//! Shared integration test harness.
//!
//! One-line setup that wires a directory, an in-memory service, and a
//! connected client, plus a recording process listener and oneshot
//! response adapters so async tests can await a single outcome.

#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use humantask_core::bridge::ProcessEventListener;
use humantask_core::client::{ResponseHandler, TaskClient};
use humantask_core::config::HumanTaskConfig;
use humantask_core::directory::StaticDirectory;
use humantask_core::error::{Result, TaskServiceError};
use humantask_core::models::{Content, NewTask, Task, TaskSummary};
use humantask_core::service::{ResponseOutcome, TaskService};

/// Handler that forwards the single outcome into a oneshot channel
pub fn oneshot_handler() -> (
    impl ResponseHandler + 'static,
    tokio::sync::oneshot::Receiver<Result<ResponseOutcome>>,
) {
    let (tx, rx) = tokio::sync::oneshot::channel();
    let tx = Mutex::new(Some(tx));
    let handler = move |outcome: Result<ResponseOutcome>| {
        if let Some(tx) = tx.lock().take() {
            let _ = tx.send(outcome);
        }
    };
    (handler, rx)
}

async fn outcome(
    rx: tokio::sync::oneshot::Receiver<Result<ResponseOutcome>>,
) -> Result<ResponseOutcome> {
    rx.await
        .unwrap_or_else(|_| Err(TaskServiceError::transport_failure("handler dropped")))
}

/// Directory fixture shared by the integration tests
pub const CRUSADERS: &str = "Crusaders";
pub const KNIGHTS_TEMPLER: &str = "Knights Templer";

pub struct TestSuite {
    pub service: TaskService,
    pub client: TaskClient,
    pub directory: Arc<StaticDirectory>,
}

impl TestSuite {
    pub fn setup() -> Self {
        Self::setup_with_config(HumanTaskConfig::default())
    }

    pub fn setup_with_config(config: HumanTaskConfig) -> Self {
        humantask_core::logging::init_structured_logging();

        let directory = Arc::new(StaticDirectory::new());
        directory.add_member(CRUSADERS, "Darth Vader");
        directory.add_member(CRUSADERS, "Tony Stark");
        directory.add_member(KNIGHTS_TEMPLER, "Luke Cage");

        let service = TaskService::in_memory(directory.clone(), config);
        let client = TaskClient::connect(&service);
        Self {
            service,
            client,
            directory,
        }
    }

    pub async fn add_task(&self, spec: NewTask) -> Result<i64> {
        let (handler, rx) = oneshot_handler();
        self.client.add_task(spec, handler).await?;
        match outcome(rx).await? {
            ResponseOutcome::TaskAdded { task_id } => Ok(task_id),
            other => panic!("unexpected add_task response: {other:?}"),
        }
    }

    pub async fn claim(&self, task_id: i64, user: &str) -> Result<()> {
        let (handler, rx) = oneshot_handler();
        self.client.claim(task_id, user, handler).await?;
        outcome(rx).await.map(|_| ())
    }

    pub async fn start(&self, task_id: i64, user: &str) -> Result<()> {
        let (handler, rx) = oneshot_handler();
        self.client.start(task_id, user, handler).await?;
        outcome(rx).await.map(|_| ())
    }

    pub async fn complete(&self, task_id: i64, user: &str, result: Option<Vec<u8>>) -> Result<()> {
        let (handler, rx) = oneshot_handler();
        self.client.complete(task_id, user, result, handler).await?;
        outcome(rx).await.map(|_| ())
    }

    pub async fn fail(&self, task_id: i64, user: &str, fault: Option<Vec<u8>>) -> Result<()> {
        let (handler, rx) = oneshot_handler();
        self.client.fail(task_id, user, fault, handler).await?;
        outcome(rx).await.map(|_| ())
    }

    pub async fn skip(&self, task_id: i64, user: &str) -> Result<()> {
        let (handler, rx) = oneshot_handler();
        self.client.skip(task_id, user, handler).await?;
        outcome(rx).await.map(|_| ())
    }

    pub async fn exit(&self, task_id: i64, user: &str) -> Result<()> {
        let (handler, rx) = oneshot_handler();
        self.client.exit(task_id, user, handler).await?;
        outcome(rx).await.map(|_| ())
    }

    pub async fn release(&self, task_id: i64, user: &str) -> Result<()> {
        let (handler, rx) = oneshot_handler();
        self.client.release(task_id, user, handler).await?;
        outcome(rx).await.map(|_| ())
    }

    pub async fn suspend(&self, task_id: i64, user: &str) -> Result<()> {
        let (handler, rx) = oneshot_handler();
        self.client.suspend(task_id, user, handler).await?;
        outcome(rx).await.map(|_| ())
    }

    pub async fn resume(&self, task_id: i64, user: &str) -> Result<()> {
        let (handler, rx) = oneshot_handler();
        self.client.resume(task_id, user, handler).await?;
        outcome(rx).await.map(|_| ())
    }

    pub async fn get_task(&self, task_id: i64) -> Result<Task> {
        let (handler, rx) = oneshot_handler();
        self.client.get_task(task_id, handler).await?;
        match outcome(rx).await? {
            ResponseOutcome::Task(task) => Ok(*task),
            other => panic!("unexpected get_task response: {other:?}"),
        }
    }

    pub async fn get_content(&self, content_id: i64) -> Result<Content> {
        let (handler, rx) = oneshot_handler();
        self.client.get_content(content_id, handler).await?;
        match outcome(rx).await? {
            ResponseOutcome::Content(content) => Ok(content),
            other => panic!("unexpected get_content response: {other:?}"),
        }
    }

    pub async fn tasks_assigned_as_potential_owner(
        &self,
        user: Option<&str>,
        groups: &[String],
    ) -> Result<Vec<TaskSummary>> {
        let (handler, rx) = oneshot_handler();
        self.client
            .get_tasks_assigned_as_potential_owner(user, groups, "en-UK", handler)
            .await?;
        match outcome(rx).await? {
            ResponseOutcome::Summaries(summaries) => Ok(summaries),
            other => panic!("unexpected query response: {other:?}"),
        }
    }

    pub async fn sub_tasks_assigned_as_potential_owner(
        &self,
        parent_id: i64,
        user: &str,
    ) -> Result<Vec<TaskSummary>> {
        let (handler, rx) = oneshot_handler();
        self.client
            .get_sub_tasks_assigned_as_potential_owner(parent_id, user, "en-UK", handler)
            .await?;
        match outcome(rx).await? {
            ResponseOutcome::Summaries(summaries) => Ok(summaries),
            other => panic!("unexpected sub-task query response: {other:?}"),
        }
    }

    /// Server-side snapshot, bypassing the protocol
    pub async fn status_of(&self, task_id: i64) -> humantask_core::TaskStatus {
        self.service.get_task(task_id).await.unwrap().status
    }
}

/// Listener that records every terminal callback it receives
#[derive(Default)]
pub struct RecordingListener {
    completed: Mutex<Vec<(i64, HashMap<String, Value>)>>,
    aborted: Mutex<Vec<i64>>,
}

impl RecordingListener {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn completed(&self) -> Vec<(i64, HashMap<String, Value>)> {
        self.completed.lock().clone()
    }

    pub fn aborted(&self) -> Vec<i64> {
        self.aborted.lock().clone()
    }

    pub async fn wait_for_completed(&self, expected: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.completed.lock().len() >= expected).await
    }

    pub async fn wait_for_aborted(&self, expected: usize, timeout: Duration) -> bool {
        wait_until(timeout, || self.aborted.lock().len() >= expected).await
    }
}

#[async_trait]
impl ProcessEventListener for RecordingListener {
    async fn on_completed(&self, process_instance_id: i64, results: HashMap<String, Value>) {
        self.completed.lock().push((process_instance_id, results));
    }

    async fn on_aborted(&self, process_instance_id: i64) {
        self.aborted.lock().push(process_instance_id);
    }
}

async fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
