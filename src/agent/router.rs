use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::RouterError;
use crate::task::SubagentType;

/// Outcome of classifying a prompt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingDecision {
    pub subagent: SubagentType,
    pub reasoning: String,
}

/// Picks a concrete subagent type for an `auto` task.
#[async_trait]
pub trait TaskRouter: Send + Sync {
    async fn route(&self, prompt: &str) -> Result<RoutingDecision, RouterError>;
}

/// Resolves a subagent type, consulting the router only for `auto`.
///
/// Router errors, timeouts and `auto` answers all fall back to `fallback`;
/// routing never fails a task.
pub async fn resolve_subagent(
    router: &dyn TaskRouter,
    requested: SubagentType,
    prompt: &str,
    timeout: Duration,
    fallback: SubagentType,
) -> SubagentType {
    if !requested.is_auto() {
        return requested;
    }

    match tokio::time::timeout(timeout, router.route(prompt)).await {
        Ok(Ok(decision)) if !decision.subagent.is_auto() => {
            info!(
                subagent = %decision.subagent,
                reasoning = %decision.reasoning,
                "auto-routed task"
            );
            decision.subagent
        }
        Ok(Ok(_)) => {
            warn!(fallback = %fallback, "router answered auto, using fallback");
            fallback
        }
        Ok(Err(e)) => {
            warn!(error = %e, fallback = %fallback, "routing failed, using fallback");
            fallback
        }
        Err(_) => {
            warn!(
                timeout_ms = timeout.as_millis() as u64,
                fallback = %fallback,
                "routing timed out, using fallback"
            );
            fallback
        }
    }
}

/// Keyword families, checked in order; the first family with a hit wins.
const KEYWORD_RULES: &[(SubagentType, &[&str])] = &[
    (SubagentType::Reviewer, &["review", "audit", "critique", "code quality"]),
    (SubagentType::Planner, &["plan", "roadmap", "break down", "design a", "steps to"]),
    (SubagentType::Finder, &["find", "locate", "where is", "search for", "list all"]),
    (SubagentType::Librarian, &["documentation", "docs", "library", "crate", "package", "api reference"]),
    (SubagentType::Oracle, &["why does", "debug", "root cause", "tradeoff", "architecture"]),
    (SubagentType::Coder, &["implement", "fix", "refactor", "add ", "write", "rename", "update"]),
    (SubagentType::Researcher, &["research", "explain", "investigate", "how does", "summarize", "compare"]),
];

/// Cheap local classifier that matches prompt keywords.
#[derive(Debug, Clone, Default)]
pub struct KeywordRouter;

impl KeywordRouter {
    pub fn new() -> Self {
        Self
    }

    pub fn classify(&self, prompt: &str) -> Option<RoutingDecision> {
        let lowered = prompt.to_lowercase();
        KEYWORD_RULES.iter().find_map(|(kind, keywords)| {
            keywords
                .iter()
                .find(|kw| lowered.contains(*kw))
                .map(|kw| RoutingDecision {
                    subagent: *kind,
                    reasoning: format!("matched keyword '{}'", kw.trim()),
                })
        })
    }
}

#[async_trait]
impl TaskRouter for KeywordRouter {
    async fn route(&self, prompt: &str) -> Result<RoutingDecision, RouterError> {
        self.classify(prompt).ok_or(RouterError::Unrecognized)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct SlowRouter;

    #[async_trait]
    impl TaskRouter for SlowRouter {
        async fn route(&self, _prompt: &str) -> Result<RoutingDecision, RouterError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(RoutingDecision {
                subagent: SubagentType::Coder,
                reasoning: "too late".into(),
            })
        }
    }

    struct BrokenRouter;

    #[async_trait]
    impl TaskRouter for BrokenRouter {
        async fn route(&self, _prompt: &str) -> Result<RoutingDecision, RouterError> {
            Err(RouterError::Unavailable("provider down".into()))
        }
    }

    struct AutoRouter;

    #[async_trait]
    impl TaskRouter for AutoRouter {
        async fn route(&self, _prompt: &str) -> Result<RoutingDecision, RouterError> {
            Ok(RoutingDecision {
                subagent: SubagentType::Auto,
                reasoning: "unsure".into(),
            })
        }
    }

    const TIMEOUT: Duration = Duration::from_millis(50);

    #[test]
    fn test_keyword_classification() {
        let router = KeywordRouter::new();
        let cases = [
            ("Review the auth module", SubagentType::Reviewer),
            ("Plan the migration", SubagentType::Planner),
            ("Find all usages of Config", SubagentType::Finder),
            ("Check the tokio docs for select", SubagentType::Librarian),
            ("Why does the cache miss on restart?", SubagentType::Oracle),
            ("Implement retry logic", SubagentType::Coder),
            ("Explain how sessions are stored", SubagentType::Researcher),
        ];
        for (prompt, expected) in cases {
            let decision = router.classify(prompt).unwrap();
            assert_eq!(decision.subagent, expected, "prompt: {}", prompt);
            assert!(decision.reasoning.starts_with("matched keyword"));
        }
        assert!(router.classify("hello there").is_none());
    }

    #[tokio::test]
    async fn test_concrete_type_skips_router() {
        let resolved = resolve_subagent(
            &BrokenRouter,
            SubagentType::Reviewer,
            "anything",
            TIMEOUT,
            SubagentType::Researcher,
        )
        .await;
        assert_eq!(resolved, SubagentType::Reviewer);
    }

    #[tokio::test]
    async fn test_auto_uses_router_decision() {
        let resolved = resolve_subagent(
            &KeywordRouter,
            SubagentType::Auto,
            "Fix the flaky test",
            TIMEOUT,
            SubagentType::Researcher,
        )
        .await;
        assert_eq!(resolved, SubagentType::Coder);
    }

    #[tokio::test]
    async fn test_router_failure_falls_back() {
        let resolved = resolve_subagent(
            &BrokenRouter,
            SubagentType::Auto,
            "anything",
            TIMEOUT,
            SubagentType::Researcher,
        )
        .await;
        assert_eq!(resolved, SubagentType::Researcher);

        let resolved = resolve_subagent(
            &KeywordRouter,
            SubagentType::Auto,
            "hello there",
            TIMEOUT,
            SubagentType::Researcher,
        )
        .await;
        assert_eq!(resolved, SubagentType::Researcher);
    }

    #[tokio::test]
    async fn test_router_timeout_falls_back() {
        let resolved = resolve_subagent(
            &SlowRouter,
            SubagentType::Auto,
            "anything",
            TIMEOUT,
            SubagentType::Planner,
        )
        .await;
        assert_eq!(resolved, SubagentType::Planner);
    }

    #[tokio::test]
    async fn test_router_answering_auto_falls_back() {
        let resolved = resolve_subagent(
            &AutoRouter,
            SubagentType::Auto,
            "anything",
            TIMEOUT,
            SubagentType::Researcher,
        )
        .await;
        assert_eq!(resolved, SubagentType::Researcher);
    }
}
