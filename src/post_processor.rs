use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::model::CheckedTest;
use crate::Status;

/// Converts a finished set of checked tests into a score in [0, 100].
pub type PostProcessorFn = fn(&[CheckedTest]) -> f64;

/// Default scoring: percentage of accepted tests. An empty set scores
/// zero rather than dividing by it.
pub fn percentage(checked_tests: &[CheckedTest]) -> f64 {
    if checked_tests.is_empty() {
        return 0.0;
    }
    let accepted = checked_tests
        .iter()
        .filter(|t| t.status == Status::Accepted)
        .count();
    accepted as f64 / checked_tests.len() as f64 * 100.0
}

/// Full marks only when every test passed.
fn all_or_nothing(checked_tests: &[CheckedTest]) -> f64 {
    if !checked_tests.is_empty()
        && checked_tests.iter().all(|t| t.status == Status::Accepted)
    {
        100.0
    } else {
        0.0
    }
}

lazy_static! {
    static ref POST_PROCESSORS: HashMap<&'static str, PostProcessorFn> = {
        let mut processors = HashMap::new();
        processors.insert("all_or_nothing", all_or_nothing as PostProcessorFn);
        processors
    };
}

/// Same fallback discipline as the checkers: unknown names silently
/// resolve to the percentage default.
pub fn resolve_post_processor(name: Option<&str>) -> PostProcessorFn {
    name.and_then(|name| POST_PROCESSORS.get(name).copied())
        .unwrap_or(percentage as PostProcessorFn)
}
