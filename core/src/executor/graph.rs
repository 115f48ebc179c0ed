use std::collections::HashMap;

use crate::error::ExecutorError;
use crate::executor::types::{Schedulable, StepGroup};

#[derive(Clone, Copy, PartialEq, Eq)]
enum Mark {
    Unvisited,
    InProgress,
    Done,
}

/// Step dependency graph (DAG)
#[derive(Debug, Clone)]
pub struct StepGraph<T: Schedulable> {
    /// Steps in input order
    nodes: Vec<T>,

    /// step_id -> position in `nodes`
    index: HashMap<String, usize>,

    /// Reverse edges: position -> positions of steps that depend on it
    dependents: Vec<Vec<usize>>,
}

impl<T: Schedulable> StepGraph<T> {
    /// Construct the graph. Duplicate ids are rejected here; dependency
    /// references are checked by [`validate`](Self::validate).
    pub fn from_steps(steps: &[T]) -> Result<Self, ExecutorError> {
        let mut index = HashMap::with_capacity(steps.len());
        for (pos, step) in steps.iter().enumerate() {
            if index.insert(step.id().to_string(), pos).is_some() {
                return Err(ExecutorError::DuplicateStepId(step.id().to_string()));
            }
        }

        let mut dependents = vec![Vec::new(); steps.len()];
        for (pos, step) in steps.iter().enumerate() {
            for dep in step.dependencies() {
                if let Some(&dep_pos) = index.get(dep) {
                    dependents[dep_pos].push(pos);
                }
            }
        }

        Ok(Self {
            nodes: steps.to_vec(),
            index,
            dependents,
        })
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&T> {
        self.index.get(id).map(|&pos| &self.nodes[pos])
    }

    /// Validate dependency relationships: missing references first, then cycles.
    pub fn validate(&self) -> Result<(), ExecutorError> {
        for step in &self.nodes {
            for dep in step.dependencies() {
                if !self.index.contains_key(dep) {
                    return Err(ExecutorError::DependencyNotFound {
                        step_id: step.id().to_string(),
                        missing_dep: dep.clone(),
                    });
                }
            }
        }

        if let Some(cycle) = self.detect_cycle() {
            return Err(ExecutorError::CircularDependency {
                step_id: cycle[0].clone(),
                path: cycle.join(" -> "),
            });
        }

        Ok(())
    }

    /// Leveled topological order by rounds of in-degree reduction.
    ///
    /// Every step of level N has all its dependencies in levels < N. Within a
    /// level steps keep input order, but callers must not rely on it.
    ///
    /// # Time Complexity
    ///
    /// O(V + E) where V = number of steps, E = number of dependencies
    pub fn resolve_order(&self) -> Result<Vec<StepGroup<T>>, ExecutorError> {
        self.validate()?;

        let mut remaining: Vec<usize> = self
            .nodes
            .iter()
            .map(|s| s.dependencies().len())
            .collect();

        let mut current: Vec<usize> = (0..self.nodes.len())
            .filter(|&pos| remaining[pos] == 0)
            .collect();

        let mut groups = Vec::new();
        let mut placed = 0;

        while placed < self.nodes.len() {
            if current.is_empty() {
                return Err(ExecutorError::UnresolvableGraph {
                    remaining: self.nodes.len() - placed,
                });
            }

            let mut next = Vec::new();
            for &pos in &current {
                for &dependent in &self.dependents[pos] {
                    remaining[dependent] -= 1;
                    if remaining[dependent] == 0 {
                        next.push(dependent);
                    }
                }
            }
            next.sort_unstable();

            placed += current.len();
            groups.push(StepGroup {
                level: groups.len(),
                steps: current.iter().map(|&pos| self.nodes[pos].clone()).collect(),
            });
            current = next;
        }

        Ok(groups)
    }

    /// Depth-first search with three-color marking.
    ///
    /// Returns the cycle as a path of step ids, first id repeated at the end.
    fn detect_cycle(&self) -> Option<Vec<String>> {
        let mut marks = vec![Mark::Unvisited; self.nodes.len()];
        let mut path = Vec::new();

        for pos in 0..self.nodes.len() {
            if marks[pos] == Mark::Unvisited {
                if let Some(cycle) = self.dfs_cycle(pos, &mut marks, &mut path) {
                    return Some(cycle);
                }
            }
        }

        None
    }

    fn dfs_cycle(
        &self,
        pos: usize,
        marks: &mut [Mark],
        path: &mut Vec<usize>,
    ) -> Option<Vec<String>> {
        marks[pos] = Mark::InProgress;
        path.push(pos);

        for dep in self.nodes[pos].dependencies() {
            let Some(&dep_pos) = self.index.get(dep) else {
                continue;
            };
            match marks[dep_pos] {
                Mark::InProgress => {
                    let start = path.iter().rposition(|&p| p == dep_pos).unwrap_or(0);
                    let mut cycle: Vec<String> = path[start..]
                        .iter()
                        .map(|&p| self.nodes[p].id().to_string())
                        .collect();
                    cycle.push(self.nodes[dep_pos].id().to_string());
                    return Some(cycle);
                }
                Mark::Unvisited => {
                    if let Some(cycle) = self.dfs_cycle(dep_pos, marks, path) {
                        return Some(cycle);
                    }
                }
                Mark::Done => {}
            }
        }

        path.pop();
        marks[pos] = Mark::Done;
        None
    }
}

/// Validate a step set without leveling it.
pub fn validate<T: Schedulable>(steps: &[T]) -> Result<(), ExecutorError> {
    StepGraph::from_steps(steps)?.validate()
}

/// Validate and level a step set.
pub fn resolve_order<T: Schedulable>(steps: &[T]) -> Result<Vec<StepGroup<T>>, ExecutorError> {
    StepGraph::from_steps(steps)?.resolve_order()
}
