use std::collections::HashMap;

use lazy_static::lazy_static;

use crate::model::Test;

/// Decides whether produced output satisfies a test's expectation.
pub type CheckerFn = fn(&Test, &str) -> bool;

/// Trims every line and the overall text, so whitespace-only differences
/// never separate expected and produced output. Applied identically to
/// both sides by the default checker; custom checkers get it too.
pub fn normalize(text: &str) -> String {
    text.lines()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Default checker: exact comparison after normalization.
pub fn contents_are_equal(test: &Test, output: &str) -> bool {
    normalize(&test.output) == normalize(output)
}

/// Accepts any two integers whose sum equals the number in the test input.
fn two_sum(test: &Test, output: &str) -> bool {
    let want: i64 = match normalize(&test.input).parse() {
        Ok(value) => value,
        Err(_) => return false,
    };
    let numbers: Vec<i64> = normalize(output)
        .split_whitespace()
        .map(|token| token.parse())
        .collect::<std::result::Result<_, _>>()
        .unwrap_or_default();
    // adversarial output may sit at the edge of the integer range
    numbers.len() == 2 && numbers[0].checked_add(numbers[1]) == Some(want)
}

lazy_static! {
    static ref CHECKERS: HashMap<&'static str, CheckerFn> = {
        let mut checkers = HashMap::new();
        checkers.insert("two_sum", two_sum as CheckerFn);
        checkers
    };
}

/// A missing or unknown checker is never fatal to the attempt: resolution
/// silently degrades to the exact-compare default.
pub fn resolve_checker(name: Option<&str>) -> CheckerFn {
    name.and_then(|name| CHECKERS.get(name).copied())
        .unwrap_or(contents_are_equal as CheckerFn)
}
