use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use serde_json::{json, Value};
use tracing::{error, info, warn};

use agent_gateway::config::load_gateway_config;
use agent_gateway::github::GithubClient;
use agent_gateway::queue::{
    TaskEnvelope, TaskQueue, HARD_TIME_LIMIT_SECS, QUEUE_DEFAULT, QUEUE_GITHUB_API,
    SOFT_TIME_LIMIT_SECS, TASK_CHECK_REPO, TASK_HEALTH_CHECK,
};

const POP_TIMEOUT_SECS: usize = 5;

/// Queue worker: pops task envelopes off the named queues (highest priority
/// queue first) and dispatches them by task name. Failures are logged and
/// recorded in the result store, never retried.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let config = load_gateway_config()?;
    let queue = TaskQueue::redis(&config.redis_url).await?;
    let github = GithubClient::new(reqwest::Client::new(), config.github_api_url.as_str());

    let queues = vec![QUEUE_GITHUB_API.to_string(), QUEUE_DEFAULT.to_string()];
    info!(queues = ?queues, "worker consuming queues");

    loop {
        let envelope = match queue.next_task(&queues, POP_TIMEOUT_SECS).await {
            Ok(Some(envelope)) => envelope,
            Ok(None) => continue,
            Err(err) => {
                warn!(error = %err, "failed to pop task, backing off");
                tokio::time::sleep(Duration::from_secs(1)).await;
                continue;
            }
        };

        info!(task_id = %envelope.id, task = %envelope.task, queue = %envelope.queue, "starting task");
        let started = Instant::now();

        let outcome = tokio::time::timeout(
            Duration::from_secs(HARD_TIME_LIMIT_SECS),
            run_task(&github, &envelope),
        )
        .await;

        let elapsed = started.elapsed();
        if elapsed.as_secs() > SOFT_TIME_LIMIT_SECS {
            warn!(
                task_id = %envelope.id,
                elapsed_secs = elapsed.as_secs(),
                "task exceeded soft time limit"
            );
        }

        let result = match outcome {
            Ok(Ok(value)) => {
                info!(task_id = %envelope.id, "finished task");
                json!({ "task_id": envelope.id, "status": "ok", "result": value })
            }
            Ok(Err(err)) => {
                error!(task_id = %envelope.id, error = %err, "task failed");
                json!({ "task_id": envelope.id, "status": "failed", "error": err.to_string() })
            }
            Err(_) => {
                error!(task_id = %envelope.id, "task hit hard time limit");
                json!({ "task_id": envelope.id, "status": "failed", "error": "hard time limit exceeded" })
            }
        };

        if let Err(err) = queue.store_result(&envelope.id, &result).await {
            warn!(task_id = %envelope.id, error = %err, "failed to store task result");
        }
    }
}

async fn run_task(github: &GithubClient, envelope: &TaskEnvelope) -> anyhow::Result<Value> {
    match envelope.task.as_str() {
        TASK_CHECK_REPO => {
            let repo = envelope
                .args
                .get("repo")
                .and_then(Value::as_str)
                .context("task args missing 'repo'")?;
            let token = envelope
                .args
                .get("token")
                .and_then(Value::as_str)
                .context("task args missing 'token'")?;
            let info = github.fetch_repo(repo, token).await?;
            Ok(serde_json::to_value(info)?)
        }
        TASK_HEALTH_CHECK => Ok(json!({ "status": "healthy" })),
        other => bail!("unknown task '{other}'"),
    }
}
