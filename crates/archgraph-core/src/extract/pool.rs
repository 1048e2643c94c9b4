//! Bounded worker pool for diagram extraction.
//!
//! Fan-out over a fixed number of scoped threads fed by a bounded job
//! channel; fan-in collects every file result and re-sorts by path before
//! returning, so output never depends on completion order.

use super::diagram::{DiagramSource, FileExtraction, extract_file};
use crate::cancel::CancelFlag;
use crate::ident::IdIndex;
use crate::primitives::{DEFAULT_MAX_DIAGRAM_BYTES, DEFAULT_WORKERS};
use crate::ArchError;
use crossbeam_channel::{bounded, unbounded};
use std::thread;

/// Fixed-size pool that parses diagram sources concurrently.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiagramPool {
    workers: usize,
    max_bytes: usize,
}

impl Default for DiagramPool {
    fn default() -> Self {
        Self::new(DEFAULT_WORKERS, DEFAULT_MAX_DIAGRAM_BYTES)
    }
}

impl DiagramPool {
    /// Create a pool. A worker count of 0 is raised to 1.
    #[must_use]
    pub fn new(workers: usize, max_bytes: usize) -> Self {
        Self {
            workers: workers.max(1),
            max_bytes,
        }
    }

    #[must_use]
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Extract every source, returning per-file results sorted by path.
    ///
    /// Blocks until every dispatched file is done. If `cancel` is set,
    /// dispatch stops, in-flight files finish, and `ArchError::Cancelled`
    /// is returned.
    pub fn extract(
        &self,
        sources: &[DiagramSource],
        index: &IdIndex,
        cancel: &CancelFlag,
    ) -> Result<Vec<FileExtraction>, ArchError> {
        let max_bytes = self.max_bytes;
        let mut results = self.run(sources, cancel, |source| {
            extract_file(source, index, max_bytes)
        })?;
        results.sort_by(|(ia, a), (ib, b)| a.path.cmp(&b.path).then(ia.cmp(ib)));

        for (_, extraction) in &results {
            match &extraction.error {
                Some(error) => tracing::warn!(
                    file = %extraction.path.display(),
                    %error,
                    "diagram skipped"
                ),
                None => tracing::debug!(
                    file = %extraction.path.display(),
                    edges = extraction.relationships.len(),
                    warnings = extraction.warnings.len(),
                    "diagram parsed"
                ),
            }
        }

        Ok(results.into_iter().map(|(_, extraction)| extraction).collect())
    }

    /// Fan `work` out over the workers. Results come back in completion
    /// order, tagged with their source index.
    fn run<W>(
        &self,
        sources: &[DiagramSource],
        cancel: &CancelFlag,
        work: W,
    ) -> Result<Vec<(usize, FileExtraction)>, ArchError>
    where
        W: Fn(&DiagramSource) -> FileExtraction + Sync,
    {
        if cancel.is_cancelled() {
            return Err(ArchError::Cancelled);
        }

        let (job_tx, job_rx) = bounded::<usize>(self.workers);
        let (result_tx, result_rx) = unbounded::<(usize, FileExtraction)>();
        let work = &work;
        let mut dispatched = 0usize;
        let mut cancelled = false;

        thread::scope(|scope| {
            for _ in 0..self.workers.min(sources.len()) {
                let job_rx = job_rx.clone();
                let result_tx = result_tx.clone();
                scope.spawn(move || {
                    for i in job_rx.iter() {
                        if result_tx.send((i, work(&sources[i]))).is_err() {
                            break;
                        }
                    }
                });
            }

            for i in 0..sources.len() {
                if cancel.is_cancelled() {
                    cancelled = true;
                    break;
                }
                if job_tx.send(i).is_err() {
                    break;
                }
                dispatched = dispatched.saturating_add(1);
            }
            // Closing the job channel lets idle workers exit.
            drop(job_tx);
        });
        drop(result_tx);

        if cancelled {
            tracing::info!(
                dispatched,
                total = sources.len(),
                "diagram extraction cancelled"
            );
            return Err(ArchError::Cancelled);
        }

        Ok(result_rx.try_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::QualifiedId;
    use std::path::PathBuf;

    fn id(s: &str) -> QualifiedId {
        QualifiedId::normalize(s).expect("valid id")
    }

    fn index() -> IdIndex {
        IdIndex::new((0..10).map(|i| id(&format!("sys/c{i}"))).chain([id("sys")]))
    }

    fn sources(n: usize) -> Vec<DiagramSource> {
        // Reverse order so the pool has to sort.
        (0..n)
            .rev()
            .map(|i| DiagramSource {
                path: PathBuf::from(format!("diagrams/{i:03}.d2")),
                scope: id("sys"),
                text: format!("c{} -> c{}: step {i}", i % 10, (i + 1) % 10),
            })
            .collect()
    }

    #[test]
    fn results_sorted_by_path() {
        let pool = DiagramPool::new(3, DEFAULT_MAX_DIAGRAM_BYTES);
        let out = pool
            .extract(&sources(12), &index(), &CancelFlag::new())
            .expect("extract");
        let paths: Vec<_> = out.iter().map(|f| f.path.clone()).collect();
        let mut sorted = paths.clone();
        sorted.sort();
        assert_eq!(paths, sorted);
        assert_eq!(out.len(), 12);
    }

    #[test]
    fn malformed_file_does_not_abort_others() {
        let mut input = sources(4);
        input.push(DiagramSource {
            path: PathBuf::from("diagrams/bad.d2"),
            scope: id("sys"),
            text: "c1 -> : broken".to_string(),
        });
        let out = DiagramPool::default()
            .extract(&input, &index(), &CancelFlag::new())
            .expect("extract");
        assert_eq!(out.len(), 5);
        assert_eq!(out.iter().filter(|f| f.error.is_some()).count(), 1);
        assert_eq!(out.iter().map(|f| f.relationships.len()).sum::<usize>(), 4);
    }

    #[test]
    fn cancelled_before_start() {
        let cancel = CancelFlag::new();
        cancel.cancel();
        let result = DiagramPool::default().extract(&sources(5), &index(), &cancel);
        assert!(matches!(result, Err(ArchError::Cancelled)));
    }

    #[test]
    fn cancelled_mid_build_finishes_dispatched_files() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let input = sources(50);
        let cancel = CancelFlag::new();
        let finished = AtomicUsize::new(0);
        let index = index();

        // One worker and a one-slot queue: dispatch can run at most two
        // files ahead of the worker, which cancels while on its first file.
        let result = DiagramPool::new(1, DEFAULT_MAX_DIAGRAM_BYTES).run(&input, &cancel, |source| {
            cancel.cancel();
            let extraction = extract_file(source, &index, DEFAULT_MAX_DIAGRAM_BYTES);
            finished.fetch_add(1, Ordering::SeqCst);
            extraction
        });

        assert!(matches!(result, Err(ArchError::Cancelled)));
        let finished = finished.load(Ordering::SeqCst);
        assert!((1..=3).contains(&finished), "finished {finished} files");
    }

    #[test]
    fn empty_input_spawns_nothing() {
        let out = DiagramPool::new(8, DEFAULT_MAX_DIAGRAM_BYTES)
            .extract(&[], &index(), &CancelFlag::new())
            .expect("extract");
        assert!(out.is_empty());
    }

    #[test]
    fn zero_workers_raised_to_one() {
        assert_eq!(DiagramPool::new(0, 10).workers(), 1);
    }
}
