use itertools::Itertools;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use strsim::{jaro_winkler, normalized_levenshtein};

/// String similarity measure, every variant scores in [0.0, 1.0].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SimilarityMetric {
    /// Ratcliff/Obershelp "gestalt" ratio: 2 * matched chars / total chars.
    #[default]
    SequenceRatio,
    Levenshtein,
    JaroWinkler,
}

impl FromStr for SimilarityMetric {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sequence" | "sequence-ratio" | "ratcliff-obershelp" => Ok(Self::SequenceRatio),
            "levenshtein" => Ok(Self::Levenshtein),
            "jaro-winkler" | "jaro_winkler" => Ok(Self::JaroWinkler),
            other => Err(format!("unknown similarity metric '{}'", other)),
        }
    }
}

impl fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::SequenceRatio => "sequence",
            Self::Levenshtein => "levenshtein",
            Self::JaroWinkler => "jaro-winkler",
        };
        f.write_str(name)
    }
}

/// Fuzzy matcher for resource names against schema titles
#[derive(Debug, Clone)]
pub struct FuzzyMatcher {
    /// A pair matches only when its score is strictly above this value
    pub similarity_threshold: f64,
    pub metric: SimilarityMetric,
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self {
            similarity_threshold: 0.6,
            metric: SimilarityMetric::SequenceRatio,
        }
    }
}

/// Best (candidate, query) pairing found by [`FuzzyMatcher::find_best_match`].
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch {
    pub query_index: usize,
    pub candidate_index: usize,
    pub score: f64,
}

impl FuzzyMatcher {
    pub fn new(threshold: f64, metric: SimilarityMetric) -> Self {
        Self {
            similarity_threshold: threshold,
            metric,
        }
    }

    /// Calculate similarity between two strings, compared as-is
    pub fn similarity(&self, s1: &str, s2: &str) -> f64 {
        match self.metric {
            SimilarityMetric::SequenceRatio => sequence_ratio(s1, s2),
            SimilarityMetric::Levenshtein => normalized_levenshtein(s1, s2),
            SimilarityMetric::JaroWinkler => jaro_winkler(s1, s2),
        }
    }

    pub fn is_match(&self, score: f64) -> bool {
        score > self.similarity_threshold
    }

    /// Scan every (query, candidate) pair, queries outermost, and keep the
    /// first pair reaching the strictly greatest score. Pairs scoring 0 are
    /// never returned.
    pub fn find_best_match<Q, C>(&self, queries: &[Q], candidates: &[C]) -> Option<BestMatch>
    where
        Q: AsRef<str>,
        C: AsRef<str>,
    {
        let mut best: Option<BestMatch> = None;
        let mut best_score = 0.0;

        for (qi, query) in queries.iter().enumerate() {
            for (ci, candidate) in candidates.iter().enumerate() {
                let score = self.similarity(candidate.as_ref(), query.as_ref());
                if score > best_score {
                    best_score = score;
                    best = Some(BestMatch {
                        query_index: qi,
                        candidate_index: ci,
                        score,
                    });
                }
            }
        }

        best
    }
}

/// Second strings at least this long get the popularity junk heuristic.
const AUTOJUNK_MIN_LEN: usize = 200;

/// Ratcliff/Obershelp similarity over chars.
///
/// The longest common block is taken first (earliest in `a`, then earliest
/// in `b` on ties), then both sides of it are matched recursively. When `b`
/// has at least 200 chars, chars occurring in it more than `len / 100 + 1`
/// times cannot seed a block; they only extend a block found elsewhere.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    let popular = popular_chars(&b);
    2.0 * matched_chars(&a, &b, &popular) as f64 / total as f64
}

fn popular_chars(b: &[char]) -> HashSet<char> {
    if b.len() < AUTOJUNK_MIN_LEN {
        return HashSet::new();
    }
    let limit = b.len() / 100 + 1;
    b.iter()
        .counts()
        .into_iter()
        .filter(|(_, n)| *n > limit)
        .map(|(c, _)| *c)
        .collect()
}

fn matched_chars(a: &[char], b: &[char], popular: &HashSet<char>) -> usize {
    let (i, j, k) = longest_common_block(a, b, popular);
    if k == 0 {
        return 0;
    }
    k + matched_chars(&a[..i], &b[..j], popular) + matched_chars(&a[i + k..], &b[j + k..], popular)
}

/// Returns (start in a, start in b, length) of the longest common substring
/// seeded by non-popular chars, widened over equal chars on both sides.
fn longest_common_block(a: &[char], b: &[char], popular: &HashSet<char>) -> (usize, usize, usize) {
    let mut best = (0, 0, 0);
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb && !popular.contains(cb) { prev[j] + 1 } else { 0 };
            let k = curr[j + 1];
            if k > best.2 {
                best = (i + 1 - k, j + 1 - k, k);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    let (mut i, mut j, mut k) = best;
    while i > 0 && j > 0 && a[i - 1] == b[j - 1] {
        i -= 1;
        j -= 1;
        k += 1;
    }
    while i + k < a.len() && j + k < b.len() && a[i + k] == b[j + k] {
        k += 1;
    }
    (i, j, k)
}
