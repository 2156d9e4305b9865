use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common_problem::ApiError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

pub const QUEUE_GITHUB_API: &str = "github_api";
pub const QUEUE_DEFAULT: &str = "default";

pub const TASK_CHECK_REPO: &str = "deployments.check";
pub const TASK_HEALTH_CHECK: &str = "health_check";

/// Stored results disappear after this window.
pub const RESULT_TTL_SECONDS: u64 = 3600;
/// A task is killed outright once it runs this long.
pub const HARD_TIME_LIMIT_SECS: u64 = 1800;
/// Crossing this threshold only logs a warning.
pub const SOFT_TIME_LIMIT_SECS: u64 = 1500;

/// JSON payload placed on a named queue. Tasks are addressed by name; args
/// must be JSON-serializable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskEnvelope {
    pub id: String,
    pub task: String,
    pub args: Value,
    pub queue: String,
    pub priority: u8,
    pub enqueued_at: DateTime<Utc>,
}

fn queue_key(name: &str) -> String {
    format!("queue:{name}")
}

fn result_key(task_id: &str) -> String {
    format!("task-result:{task_id}")
}

#[async_trait]
pub trait QueueEngine: Send + Sync {
    async fn push(&self, queue: &str, payload: String) -> Result<()>;
    /// Pop one payload from the first non-empty queue, blocking up to
    /// `timeout_secs`. Returns the queue key and payload.
    async fn pop(&self, queues: &[String], timeout_secs: usize)
        -> Result<Option<(String, String)>>;
    async fn store_result(&self, task_id: &str, payload: String, ttl_secs: u64) -> Result<()>;
    async fn fetch_result(&self, task_id: &str) -> Result<Option<String>>;
}

// ---------------- Redis implementation ----------------

#[derive(Clone)]
pub struct RedisQueue {
    manager: ConnectionManager,
}

impl RedisQueue {
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).context("Failed to create Redis client")?;
        let manager = ConnectionManager::new(client)
            .await
            .context("Failed to create Redis connection manager")?;
        Ok(Self { manager })
    }
}

#[async_trait]
impl QueueEngine for RedisQueue {
    async fn push(&self, queue: &str, payload: String) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn.lpush(queue_key(queue), payload).await?;
        Ok(())
    }

    async fn pop(
        &self,
        queues: &[String],
        timeout_secs: usize,
    ) -> Result<Option<(String, String)>> {
        let keys: Vec<String> = queues.iter().map(|name| queue_key(name)).collect();
        let mut conn = self.manager.clone();
        let popped: Option<(String, String)> = conn.brpop(keys, timeout_secs as f64).await?;
        Ok(popped)
    }

    async fn store_result(&self, task_id: &str, payload: String, ttl_secs: u64) -> Result<()> {
        let mut conn = self.manager.clone();
        let _: () = conn
            .set_ex(result_key(task_id), payload, ttl_secs)
            .await?;
        Ok(())
    }

    async fn fetch_result(&self, task_id: &str) -> Result<Option<String>> {
        let mut conn = self.manager.clone();
        let value: Option<String> = conn.get(result_key(task_id)).await?;
        Ok(value)
    }
}

// ---------------- In-memory implementation (tests) ----------------

#[derive(Default)]
pub struct InMemoryQueue {
    queues: Mutex<HashMap<String, VecDeque<String>>>,
    results: Mutex<HashMap<String, String>>,
}

impl InMemoryQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QueueEngine for InMemoryQueue {
    async fn push(&self, queue: &str, payload: String) -> Result<()> {
        let mut guard = self.queues.lock().await;
        guard
            .entry(queue_key(queue))
            .or_default()
            .push_front(payload);
        Ok(())
    }

    async fn pop(
        &self,
        queues: &[String],
        _timeout_secs: usize,
    ) -> Result<Option<(String, String)>> {
        let mut guard = self.queues.lock().await;
        for name in queues {
            let key = queue_key(name);
            if let Some(deque) = guard.get_mut(&key) {
                if let Some(payload) = deque.pop_back() {
                    return Ok(Some((key, payload)));
                }
            }
        }
        Ok(None)
    }

    async fn store_result(&self, task_id: &str, payload: String, _ttl_secs: u64) -> Result<()> {
        let mut guard = self.results.lock().await;
        guard.insert(result_key(task_id), payload);
        Ok(())
    }

    async fn fetch_result(&self, task_id: &str) -> Result<Option<String>> {
        let guard = self.results.lock().await;
        Ok(guard.get(&result_key(task_id)).cloned())
    }
}

// ---------------- Facade ----------------

/// Narrow task-queue contract the gateway and worker share: submit by name,
/// consume by queue, results expire on their own.
#[derive(Clone)]
pub struct TaskQueue {
    engine: Arc<dyn QueueEngine>,
}

impl TaskQueue {
    pub async fn redis(redis_url: &str) -> Result<Self> {
        Ok(Self {
            engine: Arc::new(RedisQueue::new(redis_url).await?),
        })
    }

    pub fn memory() -> Self {
        Self {
            engine: Arc::new(InMemoryQueue::new()),
        }
    }

    pub async fn enqueue(
        &self,
        task: &str,
        args: Value,
        queue: &str,
        priority: u8,
    ) -> Result<String, ApiError> {
        let envelope = TaskEnvelope {
            id: Uuid::new_v4().to_string(),
            task: task.to_owned(),
            args,
            queue: queue.to_owned(),
            priority,
            enqueued_at: Utc::now(),
        };
        let payload = serde_json::to_string(&envelope).map_err(ApiError::internal)?;

        self.engine.push(queue, payload).await.map_err(|err| {
            ApiError::upstream(
                "tasks/queue-unavailable",
                StatusCode::BAD_GATEWAY,
                format!("Task queue is unavailable: {err}"),
            )
        })?;

        debug!(task_id = %envelope.id, task, queue, "task enqueued");
        Ok(envelope.id)
    }

    /// Next envelope from the given queues (listed in priority order).
    pub async fn next_task(
        &self,
        queues: &[String],
        timeout_secs: usize,
    ) -> Result<Option<TaskEnvelope>> {
        let Some((_, payload)) = self.engine.pop(queues, timeout_secs).await? else {
            return Ok(None);
        };
        let envelope: TaskEnvelope =
            serde_json::from_str(&payload).context("Malformed task envelope")?;
        Ok(Some(envelope))
    }

    pub async fn store_result(&self, task_id: &str, result: &Value) -> Result<()> {
        let payload = serde_json::to_string(result)?;
        self.engine
            .store_result(task_id, payload, RESULT_TTL_SECONDS)
            .await
    }

    pub async fn result(&self, task_id: &str) -> Result<Option<Value>, ApiError> {
        let payload = self.engine.fetch_result(task_id).await.map_err(|err| {
            ApiError::upstream(
                "tasks/queue-unavailable",
                StatusCode::BAD_GATEWAY,
                format!("Task queue is unavailable: {err}"),
            )
        })?;

        match payload {
            Some(payload) => {
                let value = serde_json::from_str(&payload).map_err(ApiError::internal)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn envelope_round_trips_through_queue() {
        let queue = TaskQueue::memory();
        let task_id = queue
            .enqueue(
                TASK_CHECK_REPO,
                json!({"repo": "octocat/Hello-World", "token": "t"}),
                QUEUE_GITHUB_API,
                8,
            )
            .await
            .expect("enqueue");

        let envelope = queue
            .next_task(&[QUEUE_GITHUB_API.to_string()], 1)
            .await
            .expect("pop")
            .expect("envelope present");

        assert_eq!(envelope.id, task_id);
        assert_eq!(envelope.task, TASK_CHECK_REPO);
        assert_eq!(envelope.args["repo"], "octocat/Hello-World");
        assert_eq!(envelope.priority, 8);
    }

    #[tokio::test]
    async fn queues_drain_in_listed_order() {
        let queue = TaskQueue::memory();
        queue
            .enqueue(TASK_HEALTH_CHECK, json!({}), QUEUE_DEFAULT, 0)
            .await
            .expect("enqueue default");
        queue
            .enqueue(TASK_CHECK_REPO, json!({}), QUEUE_GITHUB_API, 8)
            .await
            .expect("enqueue github");

        let queues = vec![QUEUE_GITHUB_API.to_string(), QUEUE_DEFAULT.to_string()];
        let first = queue.next_task(&queues, 1).await.unwrap().unwrap();
        assert_eq!(first.queue, QUEUE_GITHUB_API);

        let second = queue.next_task(&queues, 1).await.unwrap().unwrap();
        assert_eq!(second.queue, QUEUE_DEFAULT);

        assert!(queue.next_task(&queues, 1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn results_are_stored_and_fetched_by_task_id() {
        let queue = TaskQueue::memory();
        queue
            .store_result("task-1", &json!({"status": "ok"}))
            .await
            .expect("store");

        let result = queue.result("task-1").await.expect("fetch");
        assert_eq!(result, Some(json!({"status": "ok"})));
        assert_eq!(queue.result("task-2").await.expect("fetch"), None);
    }
}
