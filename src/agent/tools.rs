use std::collections::BTreeSet;

/// Read-only view of the parent's tool registry, handed to child sessions.
pub trait ToolRegistry: Send + Sync {
    /// Names of the tools a child session may use
    fn tool_names(&self) -> Vec<String>;

    fn contains(&self, name: &str) -> bool {
        self.tool_names().iter().any(|n| n == name)
    }
}

/// Fixed set of tool names
#[derive(Debug, Clone, Default)]
pub struct StaticToolRegistry {
    names: BTreeSet<String>,
}

impl StaticToolRegistry {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl ToolRegistry for StaticToolRegistry {
    fn tool_names(&self) -> Vec<String> {
        self.names.iter().cloned().collect()
    }

    fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_static_registry() {
        let registry = StaticToolRegistry::new(["read", "grep", "read"]);
        assert_eq!(registry.tool_names(), vec!["grep", "read"]);
        assert!(registry.contains("grep"));
        assert!(!registry.contains("bash"));
    }
}
