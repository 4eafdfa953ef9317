//! Cheap token estimate for sizing exports against LLM context windows.
//!
//! This is a heuristic, not a tokenizer. It tends to land within the same
//! order of magnitude as BPE tokenizers for source code, which is all the chunk
//! planner and the statistics block need.

const CHARS_PER_TOKEN: f64 = 4.0;
const WORD_WEIGHT: f64 = 0.3;
const LINE_WEIGHT: f64 = 0.2;

/// `chars / 4 + 0.3 * words + 0.2 * lines`, truncated.
pub fn estimate(text: &str) -> usize {
    if text.is_empty() {
        return 0;
    }
    let chars = text.chars().count() as f64;
    let words = text.split_whitespace().count() as f64;
    let lines = text.lines().count() as f64;
    (chars / CHARS_PER_TOKEN + WORD_WEIGHT * words + LINE_WEIGHT * lines) as usize
}

/// Upper bounds (inclusive) and labels, smallest first.
pub const CONTEXT_WINDOWS: &[(usize, &str)] = &[
    (8_000, "GPT-3.5 (8K)"),
    (16_000, "GPT-3.5-16K"),
    (32_000, "GPT-4 (32K)"),
    (100_000, "Claude 2/3 (100K)"),
    (200_000, "Claude 3 Opus (200K)"),
];

pub const EXCEEDS_CONTEXT_WINDOWS: &str = "Exceeds most context windows";

pub fn context_window_fit(tokens: usize) -> &'static str {
    CONTEXT_WINDOWS
        .iter()
        .find(|(limit, _)| tokens <= *limit)
        .map(|(_, label)| *label)
        .unwrap_or(EXCEEDS_CONTEXT_WINDOWS)
}

#[cfg(test)]
mod tests {
    use super::*;

    // The numbers below pin the heuristic itself; they say nothing about how a
    // real tokenizer would count the same text.
    #[test]
    fn estimate_is_an_approximation_formula() {
        assert_eq!(estimate(""), 0);
        // 18 chars, 3 words, 2 lines: 4.5 + 0.9 + 0.4
        assert_eq!(estimate("import os\nprint(1)"), 5);
        let line = "x".repeat(400);
        assert_eq!(estimate(&line), 100);
    }

    #[test]
    fn estimate_never_decreases_with_more_text() {
        for sample in ["a", "fn main() {}\n", "one two three", "  \n\n  ", "ß∂ƒ©"] {
            let doubled = format!("{sample}{sample}");
            assert!(estimate(&doubled) >= estimate(sample), "sample {sample:?}");
        }
    }

    #[test]
    fn context_window_ladder() {
        assert_eq!(context_window_fit(0), "GPT-3.5 (8K)");
        assert_eq!(context_window_fit(8_000), "GPT-3.5 (8K)");
        assert_eq!(context_window_fit(8_001), "GPT-3.5-16K");
        assert_eq!(context_window_fit(32_000), "GPT-4 (32K)");
        assert_eq!(context_window_fit(100_000), "Claude 2/3 (100K)");
        assert_eq!(context_window_fit(150_000), "Claude 3 Opus (200K)");
        assert_eq!(context_window_fit(200_001), EXCEEDS_CONTEXT_WINDOWS);
    }
}
