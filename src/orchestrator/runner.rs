//! Plan runner: walks a plan's topology, dispatching tasks to the executor
//! under one concurrency gate per plan.
//!
//! All three topologies share one engine. A parallel plan is a single stage,
//! a staged plan is a sequence of stages, and a pipeline is a sequence of
//! width-one stages whose prompts are bound from the previous result.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::event::OrchestratorEvent;
use super::executor::Executor;
use super::gate::{ConcurrencyGate, GatePermit};
use super::report::{Report, ReportLimits};
use crate::agent::{resolve_subagent, AgentRuntime, TaskRouter, ToolRegistry};
use crate::config::OrchestratorConfig;
use crate::error::Result;
use crate::task::{
    OrchestrateRequest, ParallelRequest, PipelineRequest, PipelineStep, Plan, PlanBody, Request,
    Task, TaskSpec, TaskStatus,
};

const EVENT_CAPACITY: usize = 256;

/// Error text for a pipeline step whose template bound to a blank prompt
const EMPTY_PROMPT_REASON: &str = "cancelled (rendered prompt is empty)";

/// Error text for tasks that never started because a plan was halted
fn halt_reason(shutdown: &CancellationToken) -> &'static str {
    if shutdown.is_cancelled() {
        "cancelled (shutdown)"
    } else {
        "cancelled (fail_fast)"
    }
}

/// State shared by every task dispatched within one plan run
#[derive(Clone)]
struct RunContext {
    run_id: String,
    gate: ConcurrencyGate,
    /// Stops further dispatch. Child of the orchestrator's shutdown token.
    halt: CancellationToken,
    fail_fast: bool,
}

/// Most recent pipeline result, bound into the next step's template
struct PipelineContext {
    previous_result: String,
}

impl PipelineContext {
    fn new(initial_context: String) -> Self {
        Self {
            previous_result: initial_context,
        }
    }

    fn bind(&self, step: &PipelineStep) -> Task {
        step.bind(&self.previous_result)
    }

    /// Returns false when the step did not succeed and the pipeline must stop.
    fn advance(&mut self, task: &Task) -> bool {
        match (&task.status, &task.result) {
            (TaskStatus::Succeeded, Some(result)) => {
                self.previous_result = result.clone();
                true
            }
            _ => false,
        }
    }
}

/// Subagent orchestrator.
///
/// Holds its collaborators explicitly; create one per host session. Plans run
/// on the same instance do not share a concurrency gate.
pub struct Orchestrator {
    config: OrchestratorConfig,
    executor: Arc<Executor>,
    router: Arc<dyn TaskRouter>,
    shutdown: CancellationToken,
    events: broadcast::Sender<OrchestratorEvent>,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        runtime: Arc<dyn AgentRuntime>,
        router: Arc<dyn TaskRouter>,
        tools: Arc<dyn ToolRegistry>,
    ) -> Self {
        let executor = Arc::new(Executor::new(runtime, tools, config.task_timeout()));
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            config,
            executor,
            router,
            shutdown: CancellationToken::new(),
            events,
        }
    }

    /// Subscribe to progress events.
    pub fn subscribe(&self) -> broadcast::Receiver<OrchestratorEvent> {
        self.events.subscribe()
    }

    /// Stop dispatching on every plan and signal running sessions.
    pub fn shutdown(&self) {
        info!("orchestrator shutting down");
        self.shutdown.cancel();
    }

    pub fn is_shut_down(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Validate and run any request shape.
    pub async fn handle(&self, request: Request) -> Result<Report> {
        let tool = request.tool_name();
        let plan = Plan::from_request(request, self.config.max_concurrent)?;
        debug!(tool, tasks = plan.task_count(), "request validated");
        Ok(self.run(plan).await)
    }

    pub async fn task(&self, spec: TaskSpec) -> Result<Report> {
        self.handle(Request::Task(spec)).await
    }

    pub async fn parallel_tasks(&self, request: ParallelRequest) -> Result<Report> {
        self.handle(Request::ParallelTasks(request)).await
    }

    pub async fn orchestrate(&self, request: OrchestrateRequest) -> Result<Report> {
        self.handle(Request::Orchestrate(request)).await
    }

    pub async fn pipeline(&self, request: PipelineRequest) -> Result<Report> {
        self.handle(Request::Pipeline(request)).await
    }

    /// Run a validated plan. Always yields a report.
    pub async fn run(&self, plan: Plan) -> Report {
        let topology = plan.topology();
        let task_count = plan.task_count();
        let ctx = RunContext {
            run_id: format!("run-{}", Uuid::new_v4().simple()),
            gate: ConcurrencyGate::new(plan.max_concurrent),
            halt: self.shutdown.child_token(),
            fail_fast: plan.fail_fast,
        };
        let clock = Instant::now();

        info!(
            run_id = %ctx.run_id,
            topology = ?topology,
            tasks = task_count,
            max_concurrent = ctx.gate.capacity(),
            fail_fast = plan.fail_fast,
            "plan started"
        );
        self.emit(OrchestratorEvent::PlanStarted {
            run_id: ctx.run_id.clone(),
            topology,
            task_count,
        });

        let tasks = match plan.body {
            PlanBody::Parallel(tasks) => self.run_stage(tasks, &ctx).await,
            PlanBody::Staged(stages) => self.run_stages(stages, &ctx).await,
            PlanBody::Pipeline {
                steps,
                initial_context,
            } => self.run_pipeline(steps, initial_context, &ctx).await,
        };

        let report = Report::build(
            ctx.run_id.clone(),
            topology,
            &tasks,
            clock.elapsed().as_millis() as u64,
            self.limits(),
        );

        info!(
            run_id = %ctx.run_id,
            outcome = report.outcome.as_str(),
            succeeded = report.succeeded,
            failed = report.failed,
            cancelled = report.cancelled,
            peak_running = ctx.gate.peak(),
            duration_ms = report.total_duration_ms,
            "plan finished"
        );
        self.emit(OrchestratorEvent::PlanFinished {
            run_id: ctx.run_id.clone(),
            outcome: report.outcome,
        });
        report
    }

    fn limits(&self) -> ReportLimits {
        ReportLimits {
            digest_result_limit: self.config.digest_result_limit,
            task_result_limit: self.config.task_result_limit,
        }
    }

    fn emit(&self, event: OrchestratorEvent) {
        // no receivers is fine
        let _ = self.events.send(event);
    }

    fn cancel_undispatched(&self, mut task: Task, ctx: &RunContext, reason: &str) -> Task {
        task.cancel(reason);
        debug!(run_id = %ctx.run_id, task_id = %task.id, reason, "task not dispatched");
        self.emit(OrchestratorEvent::TaskFinished {
            run_id: ctx.run_id.clone(),
            task_id: task.id.clone(),
            status: task.status,
            duration_ms: 0,
        });
        task
    }

    async fn run_stages(&self, stages: Vec<Vec<Task>>, ctx: &RunContext) -> Vec<Task> {
        let total = stages.len();
        let mut finished = Vec::new();

        for (index, stage) in stages.into_iter().enumerate() {
            if ctx.halt.is_cancelled() {
                let reason = halt_reason(&self.shutdown);
                finished.extend(
                    stage
                        .into_iter()
                        .map(|task| self.cancel_undispatched(task, ctx, reason)),
                );
                continue;
            }
            debug!(
                run_id = %ctx.run_id,
                stage = index + 1,
                of = total,
                tasks = stage.len(),
                "stage started"
            );
            finished.extend(self.run_stage(stage, ctx).await);
        }
        finished
    }

    /// Steps run strictly one at a time; any step that does not succeed
    /// halts the pipeline.
    async fn run_pipeline(
        &self,
        steps: Vec<PipelineStep>,
        initial_context: String,
        ctx: &RunContext,
    ) -> Vec<Task> {
        let mut context = PipelineContext::new(initial_context);
        let mut finished = Vec::with_capacity(steps.len());

        for (index, step) in steps.iter().enumerate() {
            if ctx.halt.is_cancelled() {
                let reason = if self.shutdown.is_cancelled() {
                    halt_reason(&self.shutdown)
                } else {
                    "cancelled (previous step did not succeed)"
                };
                finished.push(self.cancel_undispatched(step.unbound(), ctx, reason));
                continue;
            }

            debug!(run_id = %ctx.run_id, step = index + 1, of = steps.len(), "pipeline step");
            let task = context.bind(step);
            if task.prompt.trim().is_empty() {
                warn!(run_id = %ctx.run_id, step = index + 1, "pipeline step rendered an empty prompt");
                finished.push(self.cancel_undispatched(task, ctx, EMPTY_PROMPT_REASON));
                ctx.halt.cancel();
                continue;
            }
            for task in self.run_stage(vec![task], ctx).await {
                if !context.advance(&task) {
                    ctx.halt.cancel();
                }
                finished.push(task);
            }
        }
        finished
    }

    /// Dispatch `tasks` in submission order as gate slots free up, then wait
    /// for all of them. Returns the tasks in submission order.
    async fn run_stage(&self, tasks: Vec<Task>, ctx: &RunContext) -> Vec<Task> {
        let originals = tasks.clone();
        let mut slots: Vec<Option<Task>> = Vec::new();
        slots.resize_with(tasks.len(), || None);

        let mut join_set = JoinSet::new();
        let mut queue = tasks.into_iter().enumerate();

        while let Some((index, task)) = queue.next() {
            let permit = tokio::select! {
                biased;
                _ = ctx.halt.cancelled() => None,
                permit = ctx.gate.acquire() => permit.ok(),
            };
            let Some(permit) = permit.filter(|_| !ctx.halt.is_cancelled()) else {
                let reason = halt_reason(&self.shutdown);
                for (i, task) in std::iter::once((index, task)).chain(queue.by_ref()) {
                    slots[i] = Some(self.cancel_undispatched(task, ctx, reason));
                }
                break;
            };
            debug!(
                run_id = %ctx.run_id,
                task_id = %task.id,
                running = ctx.gate.in_flight(),
                "task admitted"
            );
            join_set.spawn(self.dispatch(index, task, permit, ctx.clone()));
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, task)) => slots[index] = Some(task),
                Err(e) => error!(run_id = %ctx.run_id, error = %e, "dispatched task panicked"),
            }
        }

        slots
            .into_iter()
            .zip(originals)
            .map(|(slot, original)| {
                slot.unwrap_or_else(|| {
                    let mut task = original;
                    task.start();
                    task.fail("subagent task panicked");
                    task
                })
            })
            .collect()
    }

    /// Resolve, execute and account for one admitted task. The permit is held
    /// until the task is terminal.
    fn dispatch(
        &self,
        index: usize,
        mut task: Task,
        permit: GatePermit,
        ctx: RunContext,
    ) -> impl Future<Output = (usize, Task)> + Send + 'static {
        let executor = Arc::clone(&self.executor);
        let router = Arc::clone(&self.router);
        let shutdown = self.shutdown.clone();
        let events = self.events.clone();
        let router_timeout = self.config.router_timeout();
        let fallback = self.config.fallback_subagent;

        async move {
            let _permit = permit;

            task.subagent_type = resolve_subagent(
                router.as_ref(),
                task.subagent_type,
                &task.prompt,
                router_timeout,
                fallback,
            )
            .await;

            if ctx.halt.is_cancelled() {
                task.cancel(halt_reason(&shutdown));
            } else {
                let _ = events.send(OrchestratorEvent::TaskStarted {
                    run_id: ctx.run_id.clone(),
                    task_id: task.id.clone(),
                    description: task.description.clone(),
                    subagent_type: task.subagent_type,
                });
                task = executor.execute(task, &shutdown).await;
            }

            if ctx.fail_fast && task.status == TaskStatus::Failed && !ctx.halt.is_cancelled() {
                warn!(
                    run_id = %ctx.run_id,
                    task_id = %task.id,
                    "task failed, cancelling tasks not yet started"
                );
                ctx.halt.cancel();
            }

            let _ = events.send(OrchestratorEvent::TaskFinished {
                run_id: ctx.run_id.clone(),
                task_id: task.id.clone(),
                status: task.status,
                duration_ms: task.duration_ms(),
            });
            (index, task)
        }
    }
}
