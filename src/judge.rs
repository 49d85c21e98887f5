use std::sync::Arc;
use std::thread;
use std::time::Duration;

use log::{error, info, warn};

use crate::checker::resolve_checker;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::language::resolve_language;
use crate::model::{Attempt, CheckedTest, Task};
use crate::post_processor::resolve_post_processor;
use crate::store::Store;
use crate::supervisor::{supervise, Limits, Timing};
use crate::workspace::Workspace;
use crate::Status;

/// Drives attempts through workspace setup, compilation, supervised
/// execution, checking, scoring and persistence. Cloneable: judging
/// threads carry their own handle to the shared store.
#[derive(Clone)]
pub struct Engine {
    config: EngineConfig,
    store: Arc<dyn Store>,
}

impl Engine {
    pub fn new(config: EngineConfig, store: Arc<dyn Store>) -> Self {
        Self { config, store }
    }

    /// Accepts a submission and schedules judging in the background.
    /// Returns as soon as the attempt and its in-progress checked tests
    /// are persisted; callers observe completion by polling `snapshot`.
    /// Tests may join the returned handle instead.
    ///
    /// Unknown languages and missing tasks fail here, before anything is
    /// persisted or spawned.
    pub fn submit(
        &self,
        author: &str,
        task_id: u64,
        solution: &str,
        language: &str,
    ) -> Result<(Attempt, thread::JoinHandle<()>)> {
        resolve_language(language)?;
        let task = self
            .store
            .task(task_id)
            .ok_or_else(|| Error::NotFound(format!("task {}", task_id)))?;

        let mut attempt = self
            .store
            .create_attempt(author, task_id, solution, language);
        let checked_ids: Vec<u64> = task
            .testset
            .iter()
            .map(|test| self.store.create_checked_test(test.id).id)
            .collect();
        self.store.attach_checked_tests(attempt.id, &checked_ids);
        attempt.checked_tests = checked_ids;
        self.store.save_attempt(&attempt);
        info!(
            "attempt {}: accepted for task {} ({} tests)",
            attempt.id,
            task.id,
            attempt.checked_tests.len()
        );

        let engine = self.clone();
        let background_attempt = attempt.clone();
        let handle = thread::spawn(move || {
            if let Err(err) = engine.judge(&background_attempt, &task) {
                // record a stable terminal state, but keep the fault
                // visible to operators
                error!("attempt {}: judging failed: {}", background_attempt.id, err);
                engine.resolve_with_server_error(&background_attempt);
            }
        });
        Ok((attempt, handle))
    }

    /// Persisted view of an attempt for polling callers. While any test
    /// is still in progress the returned score is refreshed through the
    /// post-processor; stored state and terminal statuses are untouched,
    /// so the call is idempotent once judging has finished.
    pub fn snapshot(&self, attempt_id: u64) -> Result<(Attempt, Vec<CheckedTest>)> {
        let mut attempt = self
            .store
            .attempt(attempt_id)
            .ok_or_else(|| Error::NotFound(format!("attempt {}", attempt_id)))?;
        let checked = self.store.checked_tests(&attempt.checked_tests);

        if checked.iter().any(|t| t.status == Status::Testing) {
            let task = self
                .store
                .task(attempt.task_id)
                .ok_or_else(|| Error::NotFound(format!("task {}", attempt.task_id)))?;
            let post_processor = resolve_post_processor(task.post_processor_name.as_deref());
            attempt.score = post_processor(&checked);
        }
        Ok((attempt, checked))
    }

    fn judge(&self, attempt: &Attempt, task: &Task) -> Result<()> {
        let language = resolve_language(&attempt.language)?;
        let workspace = Workspace::prepare(&self.config.workspace_root, attempt.id)?;

        match language.compile(workspace.path(), &attempt.solution) {
            Err(Error::Compilation(diagnostics)) => {
                info!("attempt {}: compilation failed", attempt.id);
                self.resolve_all(attempt, Status::CompileError, &diagnostics);
            }
            Err(other) => return Err(other),
            Ok(program) => {
                let argv = language.launch_command(workspace.path(), &program);
                self.run_tests(attempt, task, &argv);
            }
        }

        self.score(attempt, task);
        Ok(())
    }

    /// Fan-out: one worker per test. A fault in one worker resolves only
    /// its own test; siblings keep running.
    fn run_tests(&self, attempt: &Attempt, task: &Task, argv: &[String]) {
        let checker = resolve_checker(task.checker_name.as_deref());
        let limits = Limits {
            time_limit: task.time_limit,
            memory_limit: task.memory_limit,
        };
        let timing = Timing {
            poll_interval: Duration::from_millis(self.config.poll_interval_ms),
            idle_limit: Duration::from_millis(self.config.idle_limit_ms),
        };

        let mut workers = Vec::new();
        for checked_id in attempt.checked_tests.iter().copied() {
            let mut checked = match self.store.checked_test(checked_id) {
                Some(checked) => checked,
                None => continue,
            };
            let test = match task.testset.iter().find(|t| t.id == checked.test_id) {
                Some(test) => test.clone(),
                None => continue,
            };
            let argv = argv.to_vec();
            let store = Arc::clone(&self.store);
            let attempt_id = attempt.id;
            let worker = thread::spawn(move || {
                if let Err(err) = supervise(&argv, &test, checker, limits, timing, &mut checked)
                {
                    error!(
                        "attempt {}: supervision of test {} failed: {}",
                        attempt_id, test.id, err
                    );
                    checked.status = Status::ServerError;
                    checked.message = err.to_string();
                }
                store.save_checked_test(&checked);
            });
            workers.push((checked_id, worker));
        }

        for (checked_id, worker) in workers {
            if worker.join().is_err() {
                warn!("attempt {}: a test worker panicked", attempt.id);
                if let Some(mut checked) = self.store.checked_test(checked_id) {
                    if checked.status == Status::Testing {
                        checked.status = Status::ServerError;
                        checked.message = "test worker panicked".into();
                        self.store.save_checked_test(&checked);
                    }
                }
            }
        }
    }

    fn score(&self, attempt: &Attempt, task: &Task) {
        let checked = self.store.checked_tests(&attempt.checked_tests);
        let post_processor = resolve_post_processor(task.post_processor_name.as_deref());
        let mut attempt = attempt.clone();
        attempt.score = post_processor(&checked);
        self.store.save_attempt(&attempt);
        info!("attempt {}: scored {:.1}", attempt.id, attempt.score);
    }

    /// Same terminal status and message for every test of the attempt
    /// (compile errors, and the fault path below).
    fn resolve_all(&self, attempt: &Attempt, status: Status, message: &str) {
        for checked_id in &attempt.checked_tests {
            if let Some(mut checked) = self.store.checked_test(*checked_id) {
                checked.status = status;
                checked.message = message.into();
                self.store.save_checked_test(&checked);
            }
        }
    }

    /// Fault boundary of the judging thread: whatever happened, no checked
    /// test stays in progress and the attempt still gets a score.
    fn resolve_with_server_error(&self, attempt: &Attempt) {
        for checked_id in &attempt.checked_tests {
            if let Some(mut checked) = self.store.checked_test(*checked_id) {
                if checked.status == Status::Testing {
                    checked.status = Status::ServerError;
                    self.store.save_checked_test(&checked);
                }
            }
        }
        if let Some(task) = self.store.task(attempt.task_id) {
            self.score(attempt, &task);
        }
    }
}
