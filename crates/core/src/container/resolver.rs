use crate::errors::CoreError;
use std::collections::BTreeSet;

/// Dependency resolution path for error reporting
#[derive(Debug, Clone, Default)]
pub struct ResolutionPath {
    pub nodes: Vec<usize>,
}

impl ResolutionPath {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, node: usize) {
        self.nodes.push(node);
    }

    pub fn pop(&mut self) -> Option<usize> {
        self.nodes.pop()
    }

    pub fn contains(&self, node: usize) -> bool {
        self.nodes.contains(&node)
    }

    /// Render the path as `A -> B -> A`, starting at the first occurrence of the
    /// last node so only the cycle itself is shown
    pub fn path_string(&self, graph: &DependencyGraph) -> String {
        let start = self
            .nodes
            .last()
            .and_then(|last| self.nodes.iter().position(|node| node == last))
            .unwrap_or(0);

        self.nodes[start..]
            .iter()
            .map(|&node| graph.label(node))
            .collect::<Vec<_>>()
            .join(" -> ")
    }
}

/// Dependency graph node
#[derive(Debug, Clone)]
pub struct DependencyNode {
    pub label: String,
    pub dependencies: Vec<usize>,
    pub dependents: Vec<usize>,
}

/// Graph of planned provider invocations. Node ids are creation order.
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    nodes: Vec<DependencyNode>,
}

impl DependencyGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its id
    pub fn add_node(&mut self, label: impl Into<String>) -> usize {
        self.nodes.push(DependencyNode {
            label: label.into(),
            dependencies: Vec::new(),
            dependents: Vec::new(),
        });
        self.nodes.len() - 1
    }

    /// Record that `node` needs `dependency` to run first
    pub fn add_dependency(&mut self, node: usize, dependency: usize) {
        if self.nodes[node].dependencies.contains(&dependency) {
            return;
        }
        self.nodes[node].dependencies.push(dependency);
        self.nodes[dependency].dependents.push(node);
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn label(&self, node: usize) -> &str {
        &self.nodes[node].label
    }

    pub fn dependencies(&self, node: usize) -> &[usize] {
        &self.nodes[node].dependencies
    }

    pub fn dependents(&self, node: usize) -> &[usize] {
        &self.nodes[node].dependents
    }

    /// Detect circular dependencies
    pub fn detect_cycles(&self) -> Result<(), CoreError> {
        let mut visited = vec![false; self.nodes.len()];
        let mut in_progress = vec![false; self.nodes.len()];

        for node in 0..self.nodes.len() {
            if !visited[node] {
                let mut path = ResolutionPath::new();
                self.detect_cycle_dfs(node, &mut visited, &mut in_progress, &mut path)?;
            }
        }

        Ok(())
    }

    fn detect_cycle_dfs(
        &self,
        node: usize,
        visited: &mut [bool],
        in_progress: &mut [bool],
        path: &mut ResolutionPath,
    ) -> Result<(), CoreError> {
        if in_progress[node] {
            path.push(node);
            return Err(CoreError::CircularDependency {
                path: path.path_string(self),
                cycle_service: self.label(node).to_string(),
            });
        }

        if visited[node] {
            return Ok(());
        }

        in_progress[node] = true;
        path.push(node);

        for &dependency in &self.nodes[node].dependencies {
            self.detect_cycle_dfs(dependency, visited, in_progress, path)?;
        }

        path.pop();
        in_progress[node] = false;
        visited[node] = true;

        Ok(())
    }

    /// Execution order: dependencies first, ties broken by node creation order
    pub fn topological_sort(&self) -> Result<Vec<usize>, CoreError> {
        self.detect_cycles()?;

        let mut in_degree: Vec<usize> = self.nodes.iter().map(|node| node.dependencies.len()).collect();
        let mut ready: BTreeSet<usize> = (0..self.nodes.len()).filter(|&node| in_degree[node] == 0).collect();
        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node) = ready.pop_first() {
            result.push(node);

            for &dependent in &self.nodes[node].dependents {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    ready.insert(dependent);
                }
            }
        }

        if result.len() != self.nodes.len() {
            return Err(CoreError::CircularDependency {
                path: "Complex circular dependency detected".to_string(),
                cycle_service: "Multiple providers".to_string(),
            });
        }

        Ok(result)
    }
}
