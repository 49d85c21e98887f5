pub mod checker;
pub mod config;
pub mod error;
pub mod judge;
pub mod language;
pub mod model;
pub mod post_processor;
pub mod probe;
pub mod store;
pub mod supervisor;
pub mod workspace;

use std::fmt;

use serde::{Deserialize, Serialize};

/// Verdict of one checked test. `Testing` is the only non-terminal state;
/// every checked test leaves it exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Status {
    Testing,
    Accepted,
    CompileError,
    WrongAnswer,
    TimeLimitExceeded,
    MemoryLimitExceeded,
    IdleLimitExceeded,
    RuntimeError,
    ServerError,
}

impl Status {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Status::Testing)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let code = match self {
            Status::Testing => "TS",
            Status::Accepted => "OK",
            Status::CompileError => "CE",
            Status::WrongAnswer => "WA",
            Status::TimeLimitExceeded => "TL",
            Status::MemoryLimitExceeded => "ML",
            Status::IdleLimitExceeded => "IL",
            Status::RuntimeError => "RE",
            Status::ServerError => "SE",
        };
        write!(f, "{}", code)
    }
}

pub use crate::model::{Attempt, CheckedTest, Task, Test};
