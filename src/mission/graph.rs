//! Derived adjacency view over a mission's stages. Built once per mission
//! load; never serialised. Edges are stored as stage indices so the graph
//! stays valid while stage state mutates.

use super::stage::{Stage, StageState};
use std::collections::HashMap;

#[derive(Debug, Clone, Default)]
pub struct Graph {
    pub down: Vec<Vec<usize>>,
    pub up: Vec<Vec<usize>>,
}

impl Graph {
    /// Build adjacency from each stage's declared upstream and downstream
    /// lists. References to unknown stages are skipped here; validation
    /// reports them separately.
    pub fn build(stages: &[Stage]) -> Self {
        let index: HashMap<&str, usize> = stages
            .iter()
            .enumerate()
            .map(|(i, s)| (s.name.as_str(), i))
            .collect();

        let mut graph = Graph {
            down: vec![Vec::new(); stages.len()],
            up: vec![Vec::new(); stages.len()],
        };

        for (i, stage) in stages.iter().enumerate() {
            for u in &stage.upstream {
                if let Some(&j) = index.get(u.as_str()) {
                    graph.add_link(j, i);
                }
            }
            for d in &stage.downstream {
                if let Some(&j) = index.get(d.as_str()) {
                    graph.add_link(i, j);
                }
            }
        }

        graph
    }

    /// Insert an edge `from -> to`, deduplicating repeat declarations (a link
    /// may be declared on both ends).
    fn add_link(&mut self, from: usize, to: usize) {
        if !self.down[from].contains(&to) {
            self.down[from].push(to);
        }
        if !self.up[to].contains(&from) {
            self.up[to].push(from);
        }
    }

    /// Depth-first cycle detection. Returns the index of the first stage from
    /// which a cycle is reachable, or `None` for an acyclic graph.
    pub fn check_cycle(&self) -> Option<usize> {
        let n = self.down.len();
        let mut visited = vec![false; n];
        let mut on_stack = vec![false; n];

        for start in 0..n {
            if !visited[start] && self.cycle_from(start, &mut visited, &mut on_stack) {
                return Some(start);
            }
        }
        None
    }

    fn cycle_from(&self, i: usize, visited: &mut [bool], on_stack: &mut [bool]) -> bool {
        visited[i] = true;
        on_stack[i] = true;
        for &d in &self.down[i] {
            if !visited[d] {
                if self.cycle_from(d, visited, on_stack) {
                    return true;
                }
            } else if on_stack[d] {
                return true;
            }
        }
        on_stack[i] = false;
        false
    }

    /// Treats edges as undirected and walks from stage 0. Returns the first
    /// stage that cannot be reached, or `None` when the graph is weakly
    /// connected.
    pub fn check_connectivity(&self) -> Option<usize> {
        let n = self.down.len();
        if n == 0 {
            return None;
        }
        let mut visited = vec![false; n];
        let mut queue = vec![0usize];
        visited[0] = true;
        while let Some(i) = queue.pop() {
            for &j in self.up[i].iter().chain(self.down[i].iter()) {
                if !visited[j] {
                    visited[j] = true;
                    queue.push(j);
                }
            }
        }
        visited.iter().position(|v| !v)
    }

    /// True when every upstream dependency of `i` is satisfied: finished or
    /// excluded counts directly, skipped counts only if the skipped stage's
    /// own upstream is satisfied, and any other state blocks. Roots are
    /// always satisfied.
    pub fn are_upstream_finished(&self, stages: &[Stage], i: usize) -> bool {
        for &u in &self.up[i] {
            match stages[u].state {
                StageState::Finished | StageState::Excluded => continue,
                StageState::Skipped => {
                    if !self.are_upstream_finished(stages, u) {
                        return false;
                    }
                }
                _ => return false,
            }
        }
        true
    }
}
