//! Shared test utilities for cmap.

pub mod fixtures;
pub mod logging;

/// Table-driven test case structure.
#[derive(Debug, Clone)]
pub struct TestCase<I, E> {
    pub name: &'static str,
    pub input: I,
    pub expected: E,
}

/// Run table-driven cases, printing each so failures are easy to locate.
///
/// # Panics
/// On the first case whose result differs from its expectation.
pub fn run_table_tests<I, E, F>(cases: Vec<TestCase<I, E>>, test_fn: F)
where
    I: std::fmt::Debug + Clone,
    E: std::fmt::Debug + PartialEq,
    F: Fn(I) -> E,
{
    for case in cases {
        println!("[CASE] {}: {:?}", case.name, case.input);
        let actual = test_fn(case.input.clone());
        assert_eq!(actual, case.expected, "case '{}' failed", case.name);
    }
}
