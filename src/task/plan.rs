use serde::{Deserialize, Serialize};

use super::{SubagentType, Task};
use crate::error::{OrchestratorError, Result, MAX_CONCURRENT_CEILING};

/// Placeholder replaced by the previous step's result in pipeline templates.
pub const PREVIOUS_RESULT_PLACEHOLDER: &str = "{previous_result}";

fn default_description() -> String {
    "Task".into()
}

/// A task as submitted by the caller
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskSpec {
    #[serde(alias = "subagentType")]
    pub subagent_type: SubagentType,
    pub prompt: String,
    #[serde(default = "default_description")]
    pub description: String,
}

impl TaskSpec {
    pub fn new(
        subagent_type: SubagentType,
        prompt: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            subagent_type,
            prompt: prompt.into(),
            description: description.into(),
        }
    }

    fn validate(&self) -> Result<()> {
        if self.prompt.trim().is_empty() {
            return Err(OrchestratorError::MissingPrompt(self.description.clone()));
        }
        Ok(())
    }

    fn into_task(self) -> Task {
        Task::new(self.subagent_type, self.prompt, self.description)
    }
}

/// One pipeline step; the prompt is a template bound at dispatch
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineStep {
    #[serde(alias = "subagentType")]
    pub subagent_type: SubagentType,
    #[serde(alias = "promptTemplate")]
    pub prompt_template: String,
    #[serde(default = "default_description")]
    pub description: String,
}

impl PipelineStep {
    pub fn new(
        subagent_type: SubagentType,
        prompt_template: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            subagent_type,
            prompt_template: prompt_template.into(),
            description: description.into(),
        }
    }

    /// Substitutes `previous` verbatim at every placeholder occurrence.
    pub fn render(&self, previous: &str) -> String {
        self.prompt_template
            .replace(PREVIOUS_RESULT_PLACEHOLDER, previous)
    }

    /// Materializes the step into a task bound to `previous`
    pub fn bind(&self, previous: &str) -> Task {
        Task::new(self.subagent_type, self.render(previous), self.description.clone())
    }

    /// A never-dispatched task standing in for this step in the report
    pub fn unbound(&self) -> Task {
        Task::new(
            self.subagent_type,
            self.prompt_template.clone(),
            self.description.clone(),
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParallelRequest {
    pub tasks: Vec<TaskSpec>,
    #[serde(default, alias = "failFast")]
    pub fail_fast: bool,
    #[serde(default, alias = "maxConcurrent")]
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrchestrateRequest {
    pub stages: Vec<Vec<TaskSpec>>,
    #[serde(default, alias = "failFast")]
    pub fail_fast: bool,
    #[serde(default, alias = "maxConcurrent")]
    pub max_concurrent: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineRequest {
    pub steps: Vec<PipelineStep>,
    #[serde(default, alias = "initialContext")]
    pub initial_context: String,
}

/// Request envelope, tagged by tool name
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "tool", rename_all = "snake_case")]
pub enum Request {
    Task(TaskSpec),
    ParallelTasks(ParallelRequest),
    Orchestrate(OrchestrateRequest),
    Pipeline(PipelineRequest),
}

impl Request {
    pub fn tool_name(&self) -> &'static str {
        match self {
            Self::Task(_) => "task",
            Self::ParallelTasks(_) => "parallel_tasks",
            Self::Orchestrate(_) => "orchestrate",
            Self::Pipeline(_) => "pipeline",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Topology {
    Parallel,
    Staged,
    Pipeline,
}

impl Topology {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Parallel => "parallel",
            Self::Staged => "staged",
            Self::Pipeline => "pipeline",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Parallel => "Parallel tasks",
            Self::Staged => "Staged orchestration",
            Self::Pipeline => "Pipeline",
        }
    }
}

#[derive(Debug, Clone)]
pub enum PlanBody {
    Parallel(Vec<Task>),
    Staged(Vec<Vec<Task>>),
    Pipeline {
        steps: Vec<PipelineStep>,
        initial_context: String,
    },
}

/// A validated plan, ready to run. Only built through the validating
/// constructors, so `max_concurrent` is always within the ceiling.
#[derive(Debug, Clone)]
pub struct Plan {
    pub(crate) body: PlanBody,
    pub(crate) fail_fast: bool,
    /// Global across the whole run, not per stage
    pub(crate) max_concurrent: usize,
}

/// Rejects a requested concurrency outside `1..=MAX_CONCURRENT_CEILING`.
pub fn validate_concurrency(requested: usize) -> Result<usize> {
    if requested == 0 {
        return Err(OrchestratorError::InvalidConcurrency);
    }
    if requested > MAX_CONCURRENT_CEILING {
        return Err(OrchestratorError::CapacityExceeded {
            requested,
            ceiling: MAX_CONCURRENT_CEILING,
        });
    }
    Ok(requested)
}

impl Plan {
    pub fn topology(&self) -> Topology {
        match self.body {
            PlanBody::Parallel(_) => Topology::Parallel,
            PlanBody::Staged(_) => Topology::Staged,
            PlanBody::Pipeline { .. } => Topology::Pipeline,
        }
    }

    /// Number of tasks (or steps) the report will list
    pub fn task_count(&self) -> usize {
        match &self.body {
            PlanBody::Parallel(tasks) => tasks.len(),
            PlanBody::Staged(stages) => stages.iter().map(Vec::len).sum(),
            PlanBody::Pipeline { steps, .. } => steps.len(),
        }
    }

    pub fn parallel(request: ParallelRequest, default_max: usize) -> Result<Self> {
        let max_concurrent = validate_concurrency(request.max_concurrent.unwrap_or(default_max))?;
        if request.tasks.is_empty() {
            return Err(OrchestratorError::EmptyPlan);
        }
        for spec in &request.tasks {
            spec.validate()?;
        }
        Ok(Self {
            body: PlanBody::Parallel(request.tasks.into_iter().map(TaskSpec::into_task).collect()),
            fail_fast: request.fail_fast,
            max_concurrent,
        })
    }

    pub fn staged(request: OrchestrateRequest, default_max: usize) -> Result<Self> {
        let max_concurrent = validate_concurrency(request.max_concurrent.unwrap_or(default_max))?;
        if request.stages.is_empty() {
            return Err(OrchestratorError::EmptyPlan);
        }
        for (index, stage) in request.stages.iter().enumerate() {
            if stage.is_empty() {
                return Err(OrchestratorError::EmptyStage(index));
            }
            for spec in stage {
                spec.validate()?;
            }
        }
        let stages = request
            .stages
            .into_iter()
            .map(|stage| stage.into_iter().map(TaskSpec::into_task).collect())
            .collect();
        Ok(Self {
            body: PlanBody::Staged(stages),
            fail_fast: request.fail_fast,
            max_concurrent,
        })
    }

    /// Pipelines always run one step at a time and always halt on failure.
    pub fn pipeline(request: PipelineRequest) -> Result<Self> {
        if request.steps.is_empty() {
            return Err(OrchestratorError::EmptyPlan);
        }
        for step in &request.steps {
            if step.prompt_template.trim().is_empty() {
                return Err(OrchestratorError::MissingPrompt(step.description.clone()));
            }
        }
        Ok(Self {
            body: PlanBody::Pipeline {
                steps: request.steps,
                initial_context: request.initial_context,
            },
            fail_fast: true,
            max_concurrent: 1,
        })
    }

    pub fn single(spec: TaskSpec) -> Result<Self> {
        Self::parallel(
            ParallelRequest {
                tasks: vec![spec],
                fail_fast: false,
                max_concurrent: Some(1),
            },
            1,
        )
    }

    pub fn from_request(request: Request, default_max: usize) -> Result<Self> {
        match request {
            Request::Task(spec) => Self::single(spec),
            Request::ParallelTasks(req) => Self::parallel(req, default_max),
            Request::Orchestrate(req) => Self::staged(req, default_max),
            Request::Pipeline(req) => Self::pipeline(req),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(prompt: &str) -> TaskSpec {
        TaskSpec::new(SubagentType::Coder, prompt, prompt)
    }

    #[test]
    fn test_capacity_validation() {
        let request = ParallelRequest {
            tasks: vec![spec("a")],
            fail_fast: false,
            max_concurrent: Some(15),
        };
        let err = Plan::parallel(request, 10).unwrap_err();
        assert!(matches!(
            err,
            OrchestratorError::CapacityExceeded {
                requested: 15,
                ceiling: 10
            }
        ));
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        assert!(matches!(
            validate_concurrency(0),
            Err(OrchestratorError::InvalidConcurrency)
        ));
        assert_eq!(validate_concurrency(10).unwrap(), 10);
    }

    #[test]
    fn test_more_tasks_than_slots_is_allowed() {
        let request = ParallelRequest {
            tasks: (0..12).map(|i| spec(&format!("t{}", i))).collect(),
            fail_fast: false,
            max_concurrent: Some(3),
        };
        let plan = Plan::parallel(request, 10).unwrap();
        assert_eq!(plan.task_count(), 12);
        assert_eq!(plan.max_concurrent, 3);
    }

    #[test]
    fn test_empty_plans_rejected() {
        let request = ParallelRequest {
            tasks: vec![],
            fail_fast: false,
            max_concurrent: None,
        };
        assert!(matches!(
            Plan::parallel(request, 10),
            Err(OrchestratorError::EmptyPlan)
        ));

        let request = OrchestrateRequest {
            stages: vec![vec![spec("a")], vec![]],
            fail_fast: false,
            max_concurrent: None,
        };
        assert!(matches!(
            Plan::staged(request, 10),
            Err(OrchestratorError::EmptyStage(1))
        ));
    }

    #[test]
    fn test_blank_prompt_rejected() {
        assert!(matches!(
            Plan::single(spec("   ")),
            Err(OrchestratorError::MissingPrompt(_))
        ));
    }

    #[test]
    fn test_pipeline_forces_width_one_and_halting() {
        let request = PipelineRequest {
            steps: vec![PipelineStep::new(SubagentType::Finder, "find TODOs", "find")],
            initial_context: String::new(),
        };
        let plan = Plan::pipeline(request).unwrap();
        assert_eq!(plan.topology(), Topology::Pipeline);
        assert_eq!(plan.max_concurrent, 1);
        assert!(plan.fail_fast);
    }

    #[test]
    fn test_render_substitutes_verbatim() {
        let step = PipelineStep::new(SubagentType::Planner, "Prioritize: {previous_result}", "p");
        assert_eq!(step.render("TODO at line 4"), "Prioritize: TODO at line 4");

        let plain = PipelineStep::new(SubagentType::Planner, "no placeholder", "p");
        assert_eq!(plain.render("ignored"), "no placeholder");
    }

    #[test]
    fn test_request_envelope_deserialization() {
        let json = r#"{
            "tool": "parallel_tasks",
            "tasks": [
                {"subagent_type": "finder", "prompt": "find auth", "description": "Find auth"},
                {"subagentType": "auto", "prompt": "explain caching"}
            ],
            "failFast": true,
            "max_concurrent": 2
        }"#;
        let request: Request = serde_json::from_str(json).unwrap();
        assert_eq!(request.tool_name(), "parallel_tasks");
        let Request::ParallelTasks(req) = request else {
            panic!("wrong variant");
        };
        assert!(req.fail_fast);
        assert_eq!(req.max_concurrent, Some(2));
        assert_eq!(req.tasks[1].subagent_type, SubagentType::Auto);
        assert_eq!(req.tasks[1].description, "Task");
    }

    #[test]
    fn test_pipeline_request_deserialization() {
        let json = r#"{
            "tool": "pipeline",
            "steps": [{"subagent_type": "finder", "prompt_template": "{previous_result}", "description": "s1"}],
            "initial_context": "src/"
        }"#;
        let request: Request = serde_json::from_str(json).unwrap();
        let plan = Plan::from_request(request, 10).unwrap();
        assert_eq!(plan.topology(), Topology::Pipeline);
        assert_eq!(plan.task_count(), 1);
    }
}
