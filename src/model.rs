use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::Status;

/// One input/expected-output pair. Tests live in testsets shared between
/// tasks; the task record here carries the resolved set and never changes
/// while an attempt is being judged against it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Test {
    pub id: u64,
    pub input: String,
    pub output: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: u64,
    pub name: String,
    /// CPU time budget in milliseconds.
    pub time_limit: u64,
    /// Resident set budget in kilobytes.
    pub memory_limit: u64,
    pub checker_name: Option<String>,
    pub post_processor_name: Option<String>,
    pub testset: Vec<Test>,
}

/// Result of running an attempt's program against one test. Counters are
/// running maxima recorded by the supervisor and never move backwards.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckedTest {
    pub id: u64,
    pub test_id: u64,
    pub status: Status,
    /// Kilobytes of resident memory, running maximum.
    pub memory_used: u64,
    /// Milliseconds of CPU time, running maximum.
    pub time_used: u64,
    /// Free text: the program's stderr, or compiler diagnostics.
    pub message: String,
}

impl CheckedTest {
    pub fn new(id: u64, test_id: u64) -> Self {
        Self {
            id,
            test_id,
            status: Status::Testing,
            memory_used: 0,
            time_used: 0,
            message: String::new(),
        }
    }
}

/// One graded submission. Mutated only by the orchestrator; the score is
/// meaningful once every checked test is terminal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Attempt {
    pub id: u64,
    pub author: String,
    pub task_id: u64,
    pub solution: String,
    pub language: String,
    pub checked_tests: Vec<u64>,
    /// In [0, 100].
    pub score: f64,
    pub created: SystemTime,
}

impl Attempt {
    /// Verdict summary over the attempt's checked tests: `Testing` while
    /// any test is unresolved, otherwise the first non-accepted status,
    /// otherwise `Accepted`.
    pub fn status(&self, checked_tests: &[CheckedTest]) -> Status {
        if checked_tests.is_empty()
            || checked_tests.iter().any(|t| t.status == Status::Testing)
        {
            return Status::Testing;
        }
        checked_tests
            .iter()
            .map(|t| t.status)
            .find(|s| *s != Status::Accepted)
            .unwrap_or(Status::Accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn checked(id: u64, status: Status) -> CheckedTest {
        let mut t = CheckedTest::new(id, id);
        t.status = status;
        t
    }

    fn attempt() -> Attempt {
        Attempt {
            id: 1,
            author: "pupil".into(),
            task_id: 1,
            solution: String::new(),
            language: "Python".into(),
            checked_tests: vec![],
            score: 0.0,
            created: SystemTime::now(),
        }
    }

    #[test]
    fn new_checked_test_is_in_progress() {
        let t = CheckedTest::new(1, 7);
        assert_eq!(t.status, Status::Testing);
        assert_eq!(t.memory_used, 0);
        assert_eq!(t.time_used, 0);
    }

    #[test]
    fn attempt_status_testing_while_unresolved() {
        let tests = vec![checked(1, Status::Accepted), checked(2, Status::Testing)];
        assert_eq!(attempt().status(&tests), Status::Testing);
    }

    #[test]
    fn attempt_status_first_failure_wins() {
        let tests = vec![
            checked(1, Status::Accepted),
            checked(2, Status::WrongAnswer),
            checked(3, Status::TimeLimitExceeded),
        ];
        assert_eq!(attempt().status(&tests), Status::WrongAnswer);
    }

    #[test]
    fn attempt_status_all_accepted() {
        let tests = vec![checked(1, Status::Accepted), checked(2, Status::Accepted)];
        assert_eq!(attempt().status(&tests), Status::Accepted);
    }
}
