//! # Concurrency Tests using Loom
//!
//! This module uses loom to check the cancellation and result aggregation
//! pattern used by parallel feature runs: workers check a shared
//! `CancellationToken` before starting a feature, a failing feature cancels
//! it when stop-on-failure is active, and results are collected by index and
//! reordered afterwards.

#[cfg(test)]
mod tests {
    use loom::sync::atomic::{AtomicUsize, Ordering};
    use loom::sync::{Arc, Mutex};
    use loom::thread;
    use tokio_util::sync::CancellationToken;

    // loom explores deep interleavings; give the model a larger stack.
    const STACK_SIZE: usize = 8 * 1024 * 1024; // 8 MB

    fn run_model<F>(model: F)
    where
        F: Fn() + Sync + Send + 'static,
    {
        let handle = std::thread::Builder::new()
            .name("loom-test-thread".into())
            .stack_size(STACK_SIZE)
            .spawn(move || loom::model(model))
            .unwrap();
        handle.join().unwrap();
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Outcome {
        Passed,
        Failed,
        Skipped,
    }

    /// Feature 0 fails and cancels the run; feature 1 races the cancellation.
    /// Whatever the interleaving, results come back in index order, the
    /// failure is recorded and the token ends up cancelled.
    #[test]
    fn test_stop_on_failure_cancellation_is_thread_safe() {
        run_model(|| {
            let token = CancellationToken::new();
            let results = Arc::new(Mutex::new(Vec::new()));
            let started = Arc::new(AtomicUsize::new(0));

            let handles: Vec<_> = (0..2)
                .map(|index| {
                    let worker_token = token.child_token();
                    let results = results.clone();
                    let started = started.clone();
                    thread::spawn(move || {
                        let outcome = if worker_token.is_cancelled() {
                            Outcome::Skipped
                        } else {
                            started.fetch_add(1, Ordering::Relaxed);
                            if index == 0 {
                                worker_token.cancel();
                                Outcome::Failed
                            } else {
                                Outcome::Passed
                            }
                        };
                        results.lock().unwrap().push((index, outcome));
                    })
                })
                .collect();

            for handle in handles {
                handle.join().unwrap();
            }

            let mut results = results.lock().unwrap().clone();
            results.sort_by_key(|(index, _)| *index);
            assert_eq!(results.len(), 2);
            assert_eq!(results[0], (0, Outcome::Failed));
            assert!(matches!(results[1].1, Outcome::Passed | Outcome::Skipped));

            let started = started.load(Ordering::Relaxed);
            assert!((1..=2).contains(&started), "started {started} features");
        });
    }

    /// An external stop on the parent token reaches every worker's child
    /// token; a worker that observed it never starts its feature.
    #[test]
    fn test_external_stop_reaches_child_tokens() {
        run_model(|| {
            let token = CancellationToken::new();
            let started = Arc::new(AtomicUsize::new(0));

            let worker_token = token.child_token();
            let worker_started = started.clone();
            let worker = thread::spawn(move || {
                if worker_token.is_cancelled() {
                    return false;
                }
                worker_started.fetch_add(1, Ordering::Relaxed);
                true
            });

            token.cancel();
            let ran = worker.join().unwrap();

            assert!(token.is_cancelled());
            assert_eq!(started.load(Ordering::Relaxed), usize::from(ran));
            assert!(token.child_token().is_cancelled());
        });
    }
}
