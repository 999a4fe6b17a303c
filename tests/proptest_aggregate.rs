// Property tests: the aggregate does not depend on how the input is split

use proptest::prelude::*;
use std::io::Cursor;

use ndstat::{CancelToken, ParallelConfig, ParallelProcessor};

#[derive(Debug, Clone)]
enum Line {
    LoggedIn(Option<u16>),
    LoggedOut(Option<u16>),
    Other(Option<u16>),
    Blank,
    Garbage,
}

fn line_strategy() -> impl Strategy<Value = Line> {
    let length = proptest::option::of(0u16..1000);
    prop_oneof![
        length.clone().prop_map(Line::LoggedIn),
        length.clone().prop_map(Line::LoggedOut),
        length.prop_map(Line::Other),
        Just(Line::Blank),
        Just(Line::Garbage),
    ]
}

fn render(lines: &[Line]) -> String {
    let field = |len: &Option<u16>| match len {
        Some(v) => format!(",\"length\":{}.25", v),
        None => String::new(),
    };
    lines
        .iter()
        .map(|line| match line {
            Line::LoggedIn(len) => format!("{{\"auth\":\"Logged In\"{}}}\n", field(len)),
            Line::LoggedOut(len) => format!("{{\"auth\":\"Logged Out\"{}}}\n", field(len)),
            Line::Other(len) => format!("{{\"auth\":\"Guest\"{}}}\n", field(len)),
            Line::Blank => "   \n".to_string(),
            Line::Garbage => "{oops\n".to_string(),
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn aggregate_matches_sequential_count(
        lines in proptest::collection::vec(line_strategy(), 0..300),
        batch_size in 1usize..40,
        workers in 1usize..6,
        capacity in 1usize..4,
    ) {
        let processor = ParallelProcessor::new(ParallelConfig {
            num_workers: workers,
            batch_size,
            queue_capacity: Some(capacity),
            ..Default::default()
        });
        let outcome = processor
            .run_reader(Cursor::new(render(&lines).into_bytes()), &CancelToken::new())
            .unwrap();
        let s = outcome.snapshot;

        let mut expected_records = 0u64;
        let mut expected_in = 0u64;
        let mut expected_out = 0u64;
        let mut expected_lengths = 0u64;
        let mut expected_sum = 0.0f64;
        for line in &lines {
            let len = match line {
                Line::LoggedIn(len) => { expected_in += 1; len }
                Line::LoggedOut(len) => { expected_out += 1; len }
                Line::Other(len) => len,
                Line::Blank | Line::Garbage => continue,
            };
            expected_records += 1;
            if let Some(v) = len {
                expected_lengths += 1;
                expected_sum += *v as f64 + 0.25;
            }
        }

        prop_assert_eq!(s.record_count, expected_records);
        prop_assert_eq!(s.logged_in, expected_in);
        prop_assert_eq!(s.logged_out, expected_out);
        prop_assert_eq!(s.length_count, expected_lengths);
        prop_assert!((s.length_sum - expected_sum).abs() < 1e-6);
        prop_assert_eq!(
            s.batches_merged,
            (expected_records + batch_size as u64 - 1) / batch_size as u64
        );
        prop_assert!(!outcome.is_partial());

        let garbage = lines.iter().filter(|l| matches!(l, Line::Garbage)).count();
        prop_assert_eq!(outcome.stats.parse_errors, garbage);
    }
}
