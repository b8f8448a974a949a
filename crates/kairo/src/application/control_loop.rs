//! Control Loop - the autonomous driver
//!
//! One background task runs iterations strictly in sequence:
//! directive → similar-task check → context → reasoning → record →
//! count → maybe consolidate → interruptible sleep.
//!
//! `LoopState` sits behind a single lock and is only mutated through this
//! module. Every wait observes the cancellation token, so `stop` returns
//! promptly even while paused.

use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::json;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::application::{
    ConsolidationService, HumanDirectiveQueue, LoopPauser, MemoryTieringService, ResilientCaller,
};
use crate::config::LoopConfig;
use crate::domain::{DomainError, LoopState, LoopStatus, MemoryItem, MemoryKind};
use crate::ports::{ConversationHandle, ReasoningProvider, ScoredMemory};

const OUTCOME_MARKERS: [(&str, MemoryKind); 4] = [
    ("SUCCESS:", MemoryKind::Success),
    ("FAILURE:", MemoryKind::Failure),
    ("DECISION:", MemoryKind::Decision),
    ("REFLECTION:", MemoryKind::Reflection),
];

/// Split a reasoning response into a memory kind and its body
pub fn classify_outcome(response: &str) -> (MemoryKind, String) {
    let trimmed = response.trim();
    for (marker, kind) in OUTCOME_MARKERS {
        let matched = trimmed
            .get(..marker.len())
            .map(|head| head.eq_ignore_ascii_case(marker))
            .unwrap_or(false);
        if matched {
            let body = trimmed[marker.len()..].trim();
            let body = if body.is_empty() { trimmed } else { body };
            return (kind, body.to_string());
        }
    }
    if trimmed.is_empty() {
        return (MemoryKind::Observation, "(empty response)".to_string());
    }
    (MemoryKind::Observation, trimmed.to_string())
}

/// Shared handle to the loop's state; the only writer of `LoopState`.
/// Never handed out, so pause and resume go through `ControlLoop`.
#[derive(Clone, Default)]
pub(crate) struct LoopStateHandle {
    state: Arc<Mutex<LoopState>>,
}

impl LoopStateHandle {
    fn lock(&self) -> MutexGuard<'_, LoopState> {
        // A panic while holding this lock cannot leave a half-written state:
        // every critical section is a single field assignment.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn status(&self) -> LoopStatus {
        self.lock().status()
    }

    fn is_paused(&self) -> bool {
        self.lock().is_paused()
    }

    fn iteration_count(&self) -> u64 {
        self.lock().iteration_count
    }

    fn current_directive(&self) -> Option<String> {
        self.lock().current_directive.clone()
    }

    fn set_running(&self, running: bool) {
        self.lock().is_running = running;
    }

    fn set_paused_by_request(&self, paused: bool) {
        self.lock().paused_by_request = paused;
    }

    fn set_directive(&self, directive: String) {
        self.lock().current_directive = Some(directive);
    }

    fn increment(&self) -> u64 {
        let mut state = self.lock();
        state.iteration_count += 1;
        state.iteration_count
    }
}

impl LoopPauser for LoopStateHandle {
    fn pause(&self) {
        self.lock().held_for_consolidation = true;
    }

    fn resume(&self) {
        self.lock().held_for_consolidation = false;
    }
}

struct LoopWorker {
    state: LoopStateHandle,
    tiering: Arc<MemoryTieringService>,
    consolidation: Arc<ConsolidationService>,
    reasoning: Arc<dyn ReasoningProvider>,
    directives: Arc<HumanDirectiveQueue>,
    inference: ResilientCaller,
    config: LoopConfig,
    conversation: ConversationHandle,
}

/// Autonomous control loop
pub struct ControlLoop {
    worker: Arc<LoopWorker>,
    shutdown: CancellationToken,
    run_token: Mutex<Option<CancellationToken>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl ControlLoop {
    pub fn new(
        tiering: Arc<MemoryTieringService>,
        consolidation: Arc<ConsolidationService>,
        reasoning: Arc<dyn ReasoningProvider>,
        directives: Arc<HumanDirectiveQueue>,
        inference: ResilientCaller,
        config: LoopConfig,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            worker: Arc::new(LoopWorker {
                state: LoopStateHandle::default(),
                tiering,
                consolidation,
                reasoning,
                directives,
                inference,
                config,
                conversation: ConversationHandle::new("control-loop"),
            }),
            shutdown,
            run_token: Mutex::new(None),
            task: Mutex::new(None),
        }
    }

    pub fn status(&self) -> LoopStatus {
        self.worker.state.status()
    }

    /// Spawn the loop task. Fails if it is already running.
    pub fn start(&self) -> Result<(), DomainError> {
        let mut task = self
            .task
            .lock()
            .map_err(|_| DomainError::Conflict("control loop lock poisoned".into()))?;
        if task.as_ref().is_some_and(|t| !t.is_finished()) {
            return Err(DomainError::Conflict("control loop is already running".into()));
        }

        let token = self.shutdown.child_token();
        if let Ok(mut run_token) = self.run_token.lock() {
            *run_token = Some(token.clone());
        }

        self.worker.state.set_running(true);
        let worker = self.worker.clone();
        *task = Some(tokio::spawn(async move { worker.run(token).await }));

        tracing::info!(
            "🔄 Control loop started (delay: {:?})",
            self.worker.config.iteration_delay()
        );
        Ok(())
    }

    /// Cancel the loop and wait for its task to finish. Safe while paused.
    pub async fn stop(&self) {
        if let Ok(mut run_token) = self.run_token.lock() {
            if let Some(token) = run_token.take() {
                token.cancel();
            }
        }
        let task = match self.task.lock() {
            Ok(mut task) => task.take(),
            Err(_) => None,
        };
        if let Some(task) = task {
            if let Err(e) = task.await {
                tracing::error!("❌ Control loop task ended abnormally: {}", e);
            }
        }
        self.worker.state.set_running(false);
        tracing::info!("🛑 Control loop stopped");
    }

    /// Human pause; takes effect before the next iteration starts
    pub fn pause(&self) {
        self.worker.state.set_paused_by_request(true);
        tracing::info!("⏸️  Control loop paused");
    }

    /// Clears a human pause; a consolidation hold stays in place
    pub fn resume(&self) {
        self.worker.state.set_paused_by_request(false);
        tracing::info!("▶️  Control loop resumed");
    }
}

impl LoopWorker {
    async fn run(&self, cancel: CancellationToken) {
        let poll = self.config.pause_poll();
        let delay = self.config.iteration_delay();

        'outer: loop {
            while self.state.is_paused() {
                tokio::select! {
                    _ = cancel.cancelled() => break 'outer,
                    _ = tokio::time::sleep(poll) => {}
                }
            }
            if cancel.is_cancelled() {
                break;
            }

            let iteration = self.state.iteration_count() + 1;
            match self.iterate(iteration, &cancel).await {
                Ok(()) => {}
                Err(DomainError::Cancelled) => break,
                Err(e) => self.record_failure(iteration, &e, &cancel).await,
            }

            let count = self.state.increment();

            if self.consolidation.should_run(count) {
                match self.consolidation.run(&self.state, &cancel).await {
                    Ok(_) => {}
                    Err(DomainError::Cancelled) => break,
                    Err(e) => tracing::error!("❌ Consolidation failed: {}", e),
                }
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }

        self.state.set_running(false);
        tracing::debug!("🔄 Control loop task exiting");
    }

    async fn iterate(&self, iteration: u64, cancel: &CancellationToken) -> Result<(), DomainError> {
        if let Some(directive) = self.directives.try_next().await {
            self.state.set_directive(directive.text.clone());
            let ack = MemoryItem::new(
                MemoryKind::Decision,
                format!("Accepted directive: {}", directive.text),
            )
            .with_tags(["directive"])
            .with_metadata(json!({ "directive_id": directive.id }));
            self.tiering.record(ack, cancel).await?;
            tracing::info!("📨 Directive accepted: {}", directive.text);
        }

        let directive = self.state.current_directive();
        let goal = directive
            .clone()
            .unwrap_or_else(|| self.config.default_goal.clone());

        let similar = match self.tiering.find_similar_completed_task(&goal, cancel).await {
            Ok(hit) => hit,
            Err(DomainError::Cancelled) => return Err(DomainError::Cancelled),
            Err(e) => {
                tracing::warn!("⚠️  Similar-task lookup failed: {}", e);
                None
            }
        };

        let context = self
            .tiering
            .build_combined_context(
                &goal,
                self.config.context_max_recent,
                self.config.context_max_relevant,
                cancel,
            )
            .await?;

        let prompt = iteration_prompt(iteration, &goal, similar.as_ref(), &context);
        tracing::debug!("🧠 Iteration {} reasoning on: {}", iteration, goal);

        let response = self
            .inference
            .call("reasoning.infer", cancel, || {
                self.reasoning.infer(&prompt, &self.conversation)
            })
            .await?;

        let (kind, body) = classify_outcome(&response);
        let outcome = MemoryItem::new(kind, body)
            .with_tags(["iteration"])
            .with_metadata(json!({
                "iteration": iteration,
                "directive": directive,
                "output": response,
            }));
        let stored = self.tiering.record(outcome, cancel).await?;

        tracing::info!("🔄 Iteration {} recorded {} {}", iteration, stored.kind, stored.id);
        Ok(())
    }

    async fn record_failure(&self, iteration: u64, error: &DomainError, cancel: &CancellationToken) {
        tracing::warn!("⚠️  Iteration {} failed: {}", iteration, error);
        let item = MemoryItem::new(
            MemoryKind::Failure,
            format!("Iteration {} failed: {}", iteration, error),
        )
        .with_tags(["iteration", "error"])
        .with_metadata(json!({ "iteration": iteration }));

        if let Err(e) = self.tiering.record(item, cancel).await {
            tracing::error!("❌ Could not record failure of iteration {}: {}", iteration, e);
        }
    }
}

fn iteration_prompt(
    iteration: u64,
    goal: &str,
    similar: Option<&ScoredMemory>,
    context: &str,
) -> String {
    let mut prompt = format!(
        "You are an autonomous agent working in a continuous loop (iteration {}).\n\n## Current goal\n{}\n",
        iteration, goal
    );

    if let Some(hit) = similar {
        prompt.push_str(&format!(
            "\n## Previously completed similar work (similarity {:.2})\n{}\nAvoid redoing it unless something has changed.\n",
            hit.score, hit.item.summary
        ));
    }

    prompt.push('\n');
    prompt.push_str(context);
    prompt.push_str(
        "\nDecide the next step and report its outcome. Begin with SUCCESS:, FAILURE:, \
         DECISION: or REFLECTION: when one applies.",
    );
    prompt
}
