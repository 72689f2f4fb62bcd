use cmap::config::OverlapConfig;
use cmap::core::OverlapClass;
use cmap::overlap::OverlapDetector;
use cmap::similarity::EmbeddingSimilarity;
use cmap::test_utils::{TestCase, run_table_tests};
use proptest::prelude::*;

#[test]
fn classification_boundaries() {
    let config = OverlapConfig::default();
    let similarity = EmbeddingSimilarity::default();
    let detector = OverlapDetector::new(&config, &similarity);
    run_table_tests(
        vec![
            TestCase { name: "zero", input: 0.0, expected: OverlapClass::None },
            TestCase { name: "just below minor", input: 0.719, expected: OverlapClass::None },
            TestCase { name: "at minor", input: 0.72, expected: OverlapClass::Minor },
            TestCase { name: "at material", input: 0.82, expected: OverlapClass::Minor },
            TestCase { name: "above material", input: 0.821, expected: OverlapClass::Material },
            TestCase { name: "identical", input: 1.0, expected: OverlapClass::Material },
        ],
        |value: f32| detector.classify(value),
    );
}

proptest! {
    #[test]
    fn classification_is_monotone(a in 0.0f32..=1.0, b in 0.0f32..=1.0) {
        let config = OverlapConfig::default();
        let similarity = EmbeddingSimilarity::default();
        let detector = OverlapDetector::new(&config, &similarity);
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(detector.classify(low) <= detector.classify(high));
    }
}
