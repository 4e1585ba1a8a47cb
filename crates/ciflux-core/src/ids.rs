use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Last issued identifiers, for the caller to persist between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IdSnapshot {
    pub job: u64,
    pub pipeline: u64,
}

/// Issues pipeline and job identifiers for one project.
///
/// Share one instance (behind an `Arc`) between every pipeline of a project.
/// Both counters only ever grow; concurrent callers never receive the same id.
#[derive(Debug, Default)]
pub struct IdGenerator {
    last_job_id: AtomicU64,
    last_pipeline_id: AtomicU64,
}

impl IdGenerator {
    /// Seed with the last ids already in use.
    pub fn new(last_job_id: u64, last_pipeline_id: u64) -> Self {
        Self {
            last_job_id: AtomicU64::new(last_job_id),
            last_pipeline_id: AtomicU64::new(last_pipeline_id),
        }
    }

    pub fn from_snapshot(snapshot: IdSnapshot) -> Self {
        Self::new(snapshot.job, snapshot.pipeline)
    }

    pub fn next_pipeline_id(&self) -> u64 {
        self.last_pipeline_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn next_job_id(&self) -> u64 {
        self.last_job_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn current_ids(&self) -> IdSnapshot {
        IdSnapshot {
            job: self.last_job_id.load(Ordering::SeqCst),
            pipeline: self.last_pipeline_id.load(Ordering::SeqCst),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn test_counters_are_independent() {
        let ids = IdGenerator::default();
        assert_eq!(ids.next_pipeline_id(), 1);
        assert_eq!(ids.next_job_id(), 1);
        assert_eq!(ids.next_job_id(), 2);
        assert_eq!(ids.next_pipeline_id(), 2);
        assert_eq!(ids.current_ids(), IdSnapshot { job: 2, pipeline: 2 });
    }

    #[test]
    fn test_seeded_from_snapshot() {
        let ids = IdGenerator::from_snapshot(IdSnapshot {
            job: 41,
            pipeline: 7,
        });
        assert_eq!(ids.next_job_id(), 42);
        assert_eq!(ids.next_pipeline_id(), 8);
    }

    #[test]
    fn test_snapshot_serializes() {
        let json = serde_json::to_string(&IdSnapshot { job: 3, pipeline: 1 }).unwrap();
        assert_eq!(json, r#"{"job":3,"pipeline":1}"#);
        let back: IdSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.job, 3);
    }

    #[test]
    fn test_concurrent_ids_are_unique() {
        let ids = Arc::new(IdGenerator::new(100, 0));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let ids = Arc::clone(&ids);
                std::thread::spawn(move || {
                    let mut issued = Vec::new();
                    let mut last = 0;
                    for _ in 0..500 {
                        let id = ids.next_job_id();
                        assert!(id > last, "ids must increase per caller");
                        last = id;
                        issued.push(id);
                    }
                    issued
                })
            })
            .collect();

        let mut all = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(all.insert(id), "duplicate id {id}");
            }
        }
        assert_eq!(all.len(), 4000);
        assert_eq!(ids.current_ids().job, 4100);
        assert_eq!(*all.iter().min().unwrap(), 101);
    }
}
