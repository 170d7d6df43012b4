use crate::error::{Result, SchedulerError};
use atlas_types::DagJobSpec;
use std::collections::{HashMap, HashSet, VecDeque};

/// Dependency graph over one DAG submission batch. Edges only cover
/// dependencies that point at ids within the same batch; references to
/// already-admitted jobs are resolved at admission, not here.
pub struct JobGraph {
    nodes: Vec<String>,
    edges: Vec<(String, String)>,
}

impl JobGraph {
    pub fn from_specs(specs: &[DagJobSpec]) -> Result<Self> {
        let mut seen = HashSet::new();
        let mut nodes = Vec::with_capacity(specs.len());
        for spec in specs {
            if !seen.insert(spec.id.clone()) {
                return Err(SchedulerError::DuplicateJobId(spec.id.clone()));
            }
            nodes.push(spec.id.clone());
        }

        let in_batch: HashSet<&str> = nodes.iter().map(String::as_str).collect();
        let mut edges = Vec::new();
        for spec in specs {
            for dep in &spec.deps {
                if in_batch.contains(dep.as_str()) {
                    edges.push((dep.clone(), spec.id.clone()));
                }
            }
        }

        Ok(Self { nodes, edges })
    }

    /// Kahn's algorithm: repeatedly remove in-degree-0 nodes; leftovers mean
    /// a cycle and the whole batch is rejected.
    pub fn topological_sort(&self) -> Result<Vec<String>> {
        let mut in_degree: HashMap<&str, usize> =
            self.nodes.iter().map(|n| (n.as_str(), 0)).collect();
        for (_, to) in &self.edges {
            *in_degree.entry(to.as_str()).or_insert(0) += 1;
        }

        let mut queue: VecDeque<&str> = self
            .nodes
            .iter()
            .map(String::as_str)
            .filter(|n| in_degree[n] == 0)
            .collect();

        let mut sorted = Vec::with_capacity(self.nodes.len());
        while let Some(node) = queue.pop_front() {
            sorted.push(node.to_string());
            for (from, to) in &self.edges {
                if from == node {
                    let degree = in_degree.get_mut(to.as_str()).unwrap();
                    *degree -= 1;
                    if *degree == 0 {
                        queue.push_back(to.as_str());
                    }
                }
            }
        }

        if sorted.len() != self.nodes.len() {
            return Err(SchedulerError::CyclicDependency);
        }
        Ok(sorted)
    }

    pub fn validate(&self) -> Result<()> {
        self.topological_sort().map(|_| ())
    }
}
