use crate::model::Pipeline;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::Dfs;
use std::collections::{HashMap, HashSet};

/// Dependency graph of the jobs in a pipeline. Edges point from a job to the
/// jobs that depend on it.
struct DependencyGraph {
    graph: DiGraph<String, ()>,
    /// Jobs naming at least one dependency that is not a job.
    orphans: Vec<NodeIndex>,
}

impl DependencyGraph {
    fn build(pipeline: &Pipeline) -> Self {
        let mut graph = DiGraph::new();
        let mut node_map: HashMap<String, NodeIndex> = HashMap::new();
        for name in pipeline.jobs.keys() {
            node_map.insert(name.clone(), graph.add_node(name.clone()));
        }

        let mut orphans = Vec::new();
        for (name, job) in &pipeline.jobs {
            let idx = node_map[name];
            for dep in &job.dependencies {
                match node_map.get(dep) {
                    Some(&dep_idx) => {
                        graph.add_edge(dep_idx, idx, ());
                    }
                    None => {
                        log::debug!("Job '{}' depends on missing job '{}'", name, dep);
                        orphans.push(idx);
                    }
                }
            }
        }

        Self { graph, orphans }
    }

    /// Every job that reaches a missing dependency through its dependency chain.
    fn unsatisfied(&self) -> HashSet<String> {
        let mut removed = HashSet::new();
        let Some(&first) = self.orphans.first() else {
            return removed;
        };

        let mut dfs = Dfs::new(&self.graph, first);
        for &orphan in &self.orphans {
            dfs.move_to(orphan);
            while let Some(idx) = dfs.next(&self.graph) {
                removed.insert(self.graph[idx].clone());
            }
        }
        removed
    }
}

/// Remove every job whose dependencies are not all present, transitively.
///
/// The result is the fixed point of repeatedly dropping jobs that name a
/// missing dependency: no remaining job depends on a job outside the result.
/// Cycles among present jobs are left alone.
pub fn prune_orphans(mut pipeline: Pipeline) -> Pipeline {
    let graph = DependencyGraph::build(&pipeline);
    let removed = graph.unsatisfied();
    if removed.is_empty() {
        return pipeline;
    }

    pipeline.jobs.retain(|name, _| {
        let keep = !removed.contains(name);
        if !keep {
            log::debug!("Removing job '{}': unsatisfied dependencies", name);
        }
        keep
    });
    pipeline
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::normalizer::Normalizer;

    fn pipeline(yaml: &str) -> Pipeline {
        Normalizer::default().normalize_str(yaml).unwrap()
    }

    #[test]
    fn test_nothing_to_prune() {
        let p = pipeline(
            r#"
build: [make]
test:
  script: [make test]
  dependencies: [build]
"#,
        );
        assert_eq!(prune_orphans(p).job_names(), vec!["build", "test"]);
    }

    #[test]
    fn test_chain_is_removed_transitively() {
        let p = pipeline(
            r#"
a:
  script: [a]
  dependencies: [b]
b:
  script: [b]
  dependencies: [c]
d:
  script: [d]
  dependencies: [a]
keep: [k]
"#,
        );
        // `c` does not exist, so b, then a, then d go
        assert_eq!(prune_orphans(p).job_names(), vec!["keep"]);
    }

    #[test]
    fn test_cycles_terminate() {
        let p = pipeline(
            r#"
x:
  script: [x]
  dependencies: [y]
y:
  script: [y]
  dependencies: [x]
z:
  script: [z]
  dependencies: [x, gone]
w:
  script: [w]
  dependencies: [z, w]
"#,
        );
        assert_eq!(prune_orphans(p).job_names(), vec!["x", "y"]);
    }

    #[test]
    fn test_result_is_closed_under_dependencies() {
        let p = pipeline(
            r#"
a: {script: [a], dependencies: [missing]}
b: {script: [b], dependencies: [a]}
c: {script: [c], dependencies: [b, e]}
e: {script: [e]}
f: {script: [f], dependencies: [e]}
"#,
        );
        let pruned = prune_orphans(p);
        for job in pruned.jobs.values() {
            for dep in &job.dependencies {
                assert!(pruned.jobs.contains_key(dep));
            }
        }
        assert_eq!(pruned.job_names(), vec!["e", "f"]);
    }
}
