mod common;

use common::corpus::{messy_plain, Lcg};
use ellipsize::normalize::normalize_plain;
use ellipsize::{fit, FitParams, LineEnd, TruncationResult};

const CASES: u64 = 400;
const ELLIPSIS_PX: f32 = 30.0;

fn mono(text: &str) -> f32 {
    text.chars().count() as f32 * 10.0
}

fn flat(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn shown_words(result: &TruncationResult) -> String {
    let joined = result
        .lines
        .iter()
        .map(|line| line.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");
    flat(&joined)
}

struct Case {
    source: String,
    width: f32,
    max_lines: usize,
}

fn case(seed: u64) -> Case {
    let mut rng = Lcg::new(seed);
    Case {
        source: messy_plain(&mut rng),
        width: 5.0 + rng.below(400) as f32,
        max_lines: 1 + rng.below(5),
    }
}

#[test]
fn never_exceeds_line_budget_or_width() {
    for seed in 0..CASES {
        let c = case(seed);
        let text = normalize_plain(&c.source);
        let params = FitParams::new(c.width, c.max_lines).with_ellipsis_width(ELLIPSIS_PX);
        let result = fit(&mono, &text, params);

        assert!(
            result.lines.len() <= c.max_lines,
            "seed {}: {} lines for budget {}",
            seed,
            result.lines.len(),
            c.max_lines
        );
        for line in &result.lines {
            let used = if line.is_truncated() {
                mono(&line.text) + ELLIPSIS_PX
            } else {
                mono(&line.text)
            };
            assert!(
                used <= c.width,
                "seed {}: {:?} uses {} of {}",
                seed,
                line.text,
                used,
                c.width
            );
        }
        let truncated_lines = result.lines.iter().filter(|l| l.is_truncated()).count();
        assert!(truncated_lines <= 1, "seed {}", seed);
        if truncated_lines == 1 {
            assert!(result.truncated);
            assert_eq!(result.lines.last().map(|l| l.end), Some(LineEnd::Truncated));
        }
    }
}

#[test]
fn untruncated_output_rejoins_to_normalized_text() {
    let mut untruncated = 0;
    for seed in 0..CASES {
        let c = case(seed);
        let text = normalize_plain(&c.source);
        let params = FitParams::new(c.width, c.max_lines).with_ellipsis_width(ELLIPSIS_PX);
        let result = fit(&mono, &text, params);
        if !result.truncated {
            untruncated += 1;
            assert_eq!(result.rejoin(), text.to_string(), "seed {}", seed);
        }
    }
    assert!(untruncated > 0, "generator never produced fitting text");
}

#[test]
fn shown_text_is_a_prefix_of_the_content() {
    for seed in 0..CASES {
        let c = case(seed);
        let text = normalize_plain(&c.source);
        let canonical = flat(&text.to_string());
        for trim in [false, true] {
            let params = FitParams::new(c.width, c.max_lines)
                .with_ellipsis_width(ELLIPSIS_PX)
                .with_trim_trailing_whitespace(trim);
            let result = fit(&mono, &text, params);
            let shown = shown_words(&result);
            assert!(
                canonical.starts_with(&shown),
                "seed {} trim {}: {:?} is not a prefix of {:?}",
                seed,
                trim,
                shown,
                canonical
            );
        }
    }
}

#[test]
fn widening_never_introduces_truncation() {
    for seed in 0..CASES {
        let c = case(seed);
        let text = normalize_plain(&c.source);
        let narrow = fit(
            &mono,
            &text,
            FitParams::new(c.width, c.max_lines).with_ellipsis_width(ELLIPSIS_PX),
        );
        let wide = fit(
            &mono,
            &text,
            FitParams::new(c.width + 40.0, c.max_lines).with_ellipsis_width(ELLIPSIS_PX),
        );
        if !narrow.truncated {
            assert!(!wide.truncated, "seed {}", seed);
        }
    }
}

#[test]
fn trimmed_truncation_point_has_no_trailing_space() {
    for seed in 0..CASES {
        let c = case(seed);
        let text = normalize_plain(&c.source);
        let params = FitParams::new(c.width, c.max_lines)
            .with_ellipsis_width(ELLIPSIS_PX)
            .with_trim_trailing_whitespace(true);
        let result = fit(&mono, &text, params);
        if let Some(last) = result.lines.last().filter(|l| l.is_truncated()) {
            assert_eq!(last.text.trim_end(), last.text, "seed {}", seed);
            assert!(!last.text.is_empty(), "seed {}: empty cut line kept", seed);
        }
    }
}

#[test]
fn fitting_is_deterministic_and_normalization_idempotent() {
    for seed in 0..CASES {
        let c = case(seed);
        let text = normalize_plain(&c.source);
        assert_eq!(normalize_plain(&text.to_string()), text, "seed {}", seed);

        let params = FitParams::new(c.width, c.max_lines).with_ellipsis_width(ELLIPSIS_PX);
        assert_eq!(fit(&mono, &text, params), fit(&mono, &text, params));
    }
}
