use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

use crate::model::{Attempt, CheckedTest, Task};

/// Persistence consumed by the engine. Implementations are called from
/// background judging threads; a mutation must be visible to concurrent
/// `snapshot` readers as soon as the call returns.
pub trait Store: Send + Sync {
    fn task(&self, id: u64) -> Option<Task>;

    fn create_attempt(
        &self,
        author: &str,
        task_id: u64,
        solution: &str,
        language: &str,
    ) -> Attempt;
    fn save_attempt(&self, attempt: &Attempt);
    fn attempt(&self, id: u64) -> Option<Attempt>;

    fn create_checked_test(&self, test_id: u64) -> CheckedTest;
    fn save_checked_test(&self, checked: &CheckedTest);
    fn checked_test(&self, id: u64) -> Option<CheckedTest>;
    fn attach_checked_tests(&self, attempt_id: u64, checked_ids: &[u64]);

    fn checked_tests(&self, ids: &[u64]) -> Vec<CheckedTest> {
        ids.iter().filter_map(|id| self.checked_test(*id)).collect()
    }
}

/// In-process store: Mutex-guarded maps. Enough for single-node judging
/// and for tests; a database-backed store implements the same trait.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    next_id: u64,
    tasks: HashMap<u64, Task>,
    attempts: HashMap<u64, Attempt>,
    checked_tests: HashMap<u64, CheckedTest>,
}

impl Inner {
    fn allocate_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Task CRUD belongs to external collaborators; tests and embedders
    /// seed tasks through this.
    pub fn add_task(&self, task: Task) {
        self.inner.lock().unwrap().tasks.insert(task.id, task);
    }
}

impl Store for MemStore {
    fn task(&self, id: u64) -> Option<Task> {
        self.inner.lock().unwrap().tasks.get(&id).cloned()
    }

    fn create_attempt(
        &self,
        author: &str,
        task_id: u64,
        solution: &str,
        language: &str,
    ) -> Attempt {
        let mut inner = self.inner.lock().unwrap();
        let attempt = Attempt {
            id: inner.allocate_id(),
            author: author.into(),
            task_id,
            solution: solution.into(),
            language: language.into(),
            checked_tests: Vec::new(),
            score: 0.0,
            created: SystemTime::now(),
        };
        inner.attempts.insert(attempt.id, attempt.clone());
        attempt
    }

    fn save_attempt(&self, attempt: &Attempt) {
        self.inner
            .lock()
            .unwrap()
            .attempts
            .insert(attempt.id, attempt.clone());
    }

    fn attempt(&self, id: u64) -> Option<Attempt> {
        self.inner.lock().unwrap().attempts.get(&id).cloned()
    }

    fn create_checked_test(&self, test_id: u64) -> CheckedTest {
        let mut inner = self.inner.lock().unwrap();
        let checked = CheckedTest::new(inner.allocate_id(), test_id);
        inner.checked_tests.insert(checked.id, checked.clone());
        checked
    }

    fn save_checked_test(&self, checked: &CheckedTest) {
        self.inner
            .lock()
            .unwrap()
            .checked_tests
            .insert(checked.id, checked.clone());
    }

    fn checked_test(&self, id: u64) -> Option<CheckedTest> {
        self.inner.lock().unwrap().checked_tests.get(&id).cloned()
    }

    fn attach_checked_tests(&self, attempt_id: u64, checked_ids: &[u64]) {
        let mut inner = self.inner.lock().unwrap();
        if let Some(attempt) = inner.attempts.get_mut(&attempt_id) {
            attempt.checked_tests.extend_from_slice(checked_ids);
        }
    }
}
