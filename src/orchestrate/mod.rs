//! Execution lifecycle: admission, per-execution resource wiring, runner
//! dispatch, and terminal reporting.
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use rand::Rng;
use rand::distributions::Alphanumeric;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::bridge::{SessionHandle, SessionRegistry};
use crate::error::{AppError, AppResult, LimitKind, OrchestrateError};
use crate::heartbeat::{HeartbeatMonitor, spawn_watchdog};
use crate::pki::{DirectPkiConnection, HttpPkiConnection, PkiConnection, PkiStore};
use crate::pool::WorkerPool;
use crate::runner::{ClientReport, ClientRunner, ClientStatus};
use crate::script::{ensure_allowed, ensure_client_indices, partition_by_client};
use crate::shutdown::{AbortReason, abort_channel};

mod types;


pub use types::{ExecutionReport, ExecutionRequest, ExecutionStatus, FirstFailure, Limits};

const SESSION_TOKEN_LEN: usize = 32;

fn current_time_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |elapsed| elapsed.as_millis())
}

fn build_execution_id() -> String {
    format!("{}-{}", current_time_ms(), std::process::id())
}

fn build_session_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SESSION_TOKEN_LEN)
        .map(char::from)
        .collect()
}

pub struct Orchestrator {
    limits: Limits,
    pool: WorkerPool,
    registry: SessionRegistry,
}

impl Orchestrator {
    #[must_use]
    pub fn new(limits: Limits, registry: SessionRegistry) -> Self {
        let pool = WorkerPool::new(limits.max_client_workers, limits.max_clients_per_user);
        Self {
            limits,
            pool,
            registry,
        }
    }

    /// Registry handle for the bridge listeners serving this orchestrator's
    /// sessions.
    #[must_use]
    pub fn registry(&self) -> SessionRegistry {
        self.registry.clone()
    }

    /// Runs one execution to completion.
    ///
    /// Admission failures (limits, unknown client indices, disallowed
    /// actions) return an error before any per-execution state exists.
    /// Once admitted, the result is always a definitive report; client
    /// failures are carried in the report, not as an `Err`.
    ///
    /// Concurrent calls share one pool and one registry, so executions
    /// started from separate tasks contend for the same ceilings.
    ///
    /// # Errors
    ///
    /// Returns [`OrchestrateError::LimitExceeded`], `ActionNotAllowed`, or
    /// a validation error on rejection.
    pub async fn start_execution(
        &self,
        request: ExecutionRequest,
        external_cancel: Option<watch::Receiver<bool>>,
    ) -> AppResult<ExecutionReport> {
        if request.script.len() > self.limits.max_actions {
            return Err(AppError::orchestrate(OrchestrateError::LimitExceeded {
                kind: LimitKind::Actions,
                requested: request.script.len(),
                ceiling: self.limits.max_actions,
            }));
        }
        ensure_client_indices(&request.script, request.client_count)
            .map_err(AppError::validation)?;
        if let Some(allowed) = &request.allowed_actions {
            ensure_allowed(&request.script, allowed).map_err(AppError::orchestrate)?;
        }
        let mut pool = self.pool.clone();
        let permit = pool
            .admit(&request.owner_user_id, request.client_count)
            .map_err(AppError::orchestrate)?;

        let execution_id = build_execution_id();
        let token = request
            .session_token
            .clone()
            .unwrap_or_else(build_session_token);
        let created_at = chrono::Utc::now();
        info!(
            "Execution {} admitted: {} clients, {} actions, owner {}",
            execution_id,
            request.client_count,
            request.script.len(),
            request.owner_user_id
        );

        let heartbeat = HeartbeatMonitor::new(self.limits.heartbeat_timeout);
        let (abort_tx, mut abort_seen_rx) = abort_channel();
        let runner_pki: Arc<dyn PkiConnection> = match request.pki_base_url.as_deref() {
            Some(base_url) => Arc::new(HttpPkiConnection::new(
                base_url,
                &token,
                self.limits.server_script_response_timeout,
            )?),
            None => Arc::new(DirectPkiConnection::new(Arc::new(PkiStore::new()))),
        };

        // The bridge session must see the same backing store the runners
        // use, so it shares the runners' connection.
        let mut registry = self.registry.clone();
        registry.register(
            &token,
            SessionHandle {
                execution_id: execution_id.clone(),
                pki: Arc::clone(&runner_pki),
                heartbeat: heartbeat.clone(),
            },
        );
        // A supplied token signals a server script is expected, so the
        // watchdog arms right away.
        let arm_immediately = request.require_server_script || request.session_token.is_some();
        let watchdog = spawn_watchdog(
            heartbeat.clone(),
            token.clone(),
            abort_tx.clone(),
            arm_immediately,
        );
        let mut aux_tasks: Vec<JoinHandle<()>> = Vec::new();
        if let Some(budget) = self.limits.run_timeout {
            let budget_tx = abort_tx.clone();
            aux_tasks.push(tokio::spawn(async move {
                tokio::time::sleep(budget).await;
                if budget_tx.send(AbortReason::RunBudgetExceeded).is_err() {
                    // Execution already finished.
                }
            }));
        }
        if let Some(mut cancel_rx) = external_cancel {
            let cancel_tx = abort_tx.clone();
            aux_tasks.push(tokio::spawn(async move {
                loop {
                    if *cancel_rx.borrow() {
                        if cancel_tx.send(AbortReason::Cancelled).is_err() {
                            // Execution already finished.
                        }
                        break;
                    }
                    if cancel_rx.changed().await.is_err() {
                        break;
                    }
                }
            }));
        }

        let partitions = partition_by_client(&request.script, request.client_count);
        let target_addr = request.target_addr();
        let (report_tx, mut report_rx) = mpsc::unbounded_channel::<ClientReport>();
        let mut runner_tasks: Vec<(usize, JoinHandle<()>)> = Vec::new();
        for (client_index, actions) in partitions.into_iter().enumerate() {
            let runner = ClientRunner::new(
                client_index,
                target_addr.clone(),
                actions,
                self.limits.action_timeout,
                request.timeout_policy,
                Arc::clone(&runner_pki),
                abort_tx.subscribe(),
            );
            let task_tx = report_tx.clone();
            runner_tasks.push((
                client_index,
                tokio::spawn(async move {
                    if task_tx.send(runner.run().await).is_err() {
                        // Collector already gone.
                    }
                }),
            ));
        }
        drop(report_tx);

        // Reports arrive in completion order; the first failure seen here
        // is the execution's first-failure identity.
        let mut clients: Vec<ClientReport> = Vec::with_capacity(request.client_count);
        let mut first_failure: Option<FirstFailure> = None;
        while let Some(report) = report_rx.recv().await {
            if report.status == ClientStatus::Failed && first_failure.is_none() {
                first_failure = Some(FirstFailure {
                    client_index: report.client_index,
                    action_index: report.failed_action,
                    reason: report
                        .reason
                        .clone()
                        .unwrap_or_else(|| "unknown failure".to_owned()),
                });
            }
            clients.push(report);
        }
        for (client_index, task) in runner_tasks {
            if let Err(join_err) = task.await {
                let reason = AppError::orchestrate(OrchestrateError::RunnerPanic {
                    message: join_err.to_string(),
                })
                .to_string();
                if first_failure.is_none() {
                    first_failure = Some(FirstFailure {
                        client_index,
                        action_index: None,
                        reason: reason.clone(),
                    });
                }
                clients.push(ClientReport {
                    client_index,
                    status: ClientStatus::Failed,
                    failed_action: None,
                    reason: Some(reason),
                });
            }
        }
        clients.sort_by_key(|report| report.client_index);

        watchdog.abort();
        for task in aux_tasks {
            task.abort();
        }
        registry.deregister(&token);
        drop(permit);

        let aborted = match abort_seen_rx.try_recv() {
            Ok(AbortReason::HeartbeatLost) => Some(
                AppError::orchestrate(OrchestrateError::HeartbeatLost {
                    session_id: execution_id.clone(),
                })
                .to_string(),
            ),
            Ok(AbortReason::RunBudgetExceeded) => {
                Some(AppError::orchestrate(OrchestrateError::RunBudgetExceeded).to_string())
            }
            Ok(AbortReason::Cancelled) => {
                Some(AppError::orchestrate(OrchestrateError::Cancelled).to_string())
            }
            Err(_empty) => None,
        };

        let status = if clients
            .iter()
            .all(|report| report.status == ClientStatus::Succeeded)
        {
            ExecutionStatus::Succeeded
        } else {
            ExecutionStatus::Failed
        };
        match status {
            ExecutionStatus::Succeeded => {
                info!("Execution {} succeeded", execution_id);
            }
            _ => {
                warn!(
                    "Execution {} failed{}",
                    execution_id,
                    aborted
                        .as_deref()
                        .map(|reason| format!(" ({})", reason))
                        .unwrap_or_default()
                );
            }
        }

        let flag = match status {
            ExecutionStatus::Succeeded => Some(request.flag),
            _ => None,
        };
        Ok(ExecutionReport {
            execution_id,
            owner_user_id: request.owner_user_id,
            status,
            created_at,
            clients,
            first_failure,
            aborted,
            flag,
        })
    }
}
