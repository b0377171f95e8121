//! Deterministic text generators shared by integration tests.

const WORDS: &[&str] = &[
    "lorem", "ipsum", "dolor", "sit", "amet", "a", "consectetur", "adipiscing", "elit",
    "supercalifragilistic", "ut", "labore", "et", "dolore", "magna", "aliqua", "enim",
    "ad", "minim", "veniam", "x", "quis", "nostrud", "exercitation",
];

/// Small linear congruential generator; stable across platforms.
#[derive(Clone, Debug)]
pub struct Lcg(u64);

impl Lcg {
    pub fn new(seed: u64) -> Self {
        Self(seed ^ 0x9E37_79B9_7F4A_7C15)
    }

    pub fn next_u32(&mut self) -> u32 {
        self.0 = self
            .0
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);
        (self.0 >> 33) as u32
    }

    /// Uniform-ish value in `0..bound`.
    pub fn below(&mut self, bound: usize) -> usize {
        (self.next_u32() as usize) % bound.max(1)
    }
}

/// `count` words separated by single spaces.
pub fn words(rng: &mut Lcg, count: usize) -> String {
    let mut out = String::new();
    for idx in 0..count {
        if idx > 0 {
            out.push(' ');
        }
        out.push_str(WORDS[rng.below(WORDS.len())]);
    }
    out
}

/// Plain text with mixed spacing, blank lines and the occasional accent.
pub fn messy_plain(rng: &mut Lcg) -> String {
    let paragraphs = 1 + rng.below(4);
    let mut out = String::new();
    for p in 0..paragraphs {
        if p > 0 {
            out.push_str(["\n", "\n\n", "\r\n", "\n \n"][rng.below(4)]);
        }
        let count = 1 + rng.below(18);
        for idx in 0..count {
            if idx > 0 {
                out.push_str([" ", "  ", "\t", " "][rng.below(4)]);
            }
            out.push_str(WORDS[rng.below(WORDS.len())]);
            if rng.below(9) == 0 {
                out.push_str("e\u{301}");
            }
        }
    }
    out
}
