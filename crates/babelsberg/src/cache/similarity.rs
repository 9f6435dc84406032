//! Sequence-matching similarity ratio.
//!
//! Ratcliff/Obershelp similarity over characters: recursively find the
//! longest common substring, then match the pieces on either side. The
//! ratio is `2 * matches / (len_a + len_b)`, 1.0 for identical strings and
//! 0.0 for disjoint ones.

/// Similarity ratio between two strings in [0, 1].
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let total = a_chars.len() + b_chars.len();
    if total == 0 {
        return 1.0;
    }
    let matches = matching_chars(&a_chars, &b_chars);
    2.0 * matches as f64 / total as f64
}

/// Total characters matched by recursive longest-common-substring pairing.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    // Explicit stack instead of recursion: block ranges awaiting matching.
    let mut total = 0usize;
    let mut stack: Vec<((usize, usize), (usize, usize))> = vec![((0, a.len()), (0, b.len()))];

    while let Some(((a_lo, a_hi), (b_lo, b_hi))) = stack.pop() {
        if a_lo >= a_hi || b_lo >= b_hi {
            continue;
        }
        let (ai, bi, size) = longest_common_substring(&a[a_lo..a_hi], &b[b_lo..b_hi]);
        if size == 0 {
            continue;
        }
        total += size;
        stack.push(((a_lo, a_lo + ai), (b_lo, b_lo + bi)));
        stack.push(((a_lo + ai + size, a_hi), (b_lo + bi + size, b_hi)));
    }
    total
}

/// Longest common substring of two slices: (start_a, start_b, length).
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    // Rolling row of match lengths ending at (i, j).
    let mut prev = vec![0usize; b.len() + 1];
    let mut current = vec![0usize; b.len() + 1];

    for (i, &ca) in a.iter().enumerate() {
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                let len = prev[j] + 1;
                current[j + 1] = len;
                if len > best.2 {
                    best = (i + 1 - len, j + 1 - len, len);
                }
            } else {
                current[j + 1] = 0;
            }
        }
        std::mem::swap(&mut prev, &mut current);
        current.fill(0);
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_strings() {
        assert!((sequence_ratio("hello world", "hello world") - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_disjoint_strings() {
        assert_eq!(sequence_ratio("aaaa", "bbbb"), 0.0);
    }

    #[test]
    fn test_empty_strings() {
        assert_eq!(sequence_ratio("", ""), 1.0);
        assert_eq!(sequence_ratio("abc", ""), 0.0);
    }

    #[test]
    fn test_symmetry() {
        let r1 = sequence_ratio("the quick brown fox", "the quick red fox");
        let r2 = sequence_ratio("the quick red fox", "the quick brown fox");
        assert!((r1 - r2).abs() < 1e-12);
    }

    #[test]
    fn test_near_duplicate_scores_high() {
        let ratio = sequence_ratio("hello, world", "hello world");
        assert!(ratio > 0.9, "got {ratio}");
    }

    #[test]
    fn test_unrelated_scores_low() {
        let ratio = sequence_ratio(
            "translation pipelines preserve document structure",
            "four score and seven years ago",
        );
        assert!(ratio < 0.5, "got {ratio}");
    }

    #[test]
    fn test_known_ratio() {
        // "abcd" vs "bcde": LCS "bcd" (3 chars), remainders match nothing.
        // ratio = 2 * 3 / 8 = 0.75
        assert!((sequence_ratio("abcd", "bcde") - 0.75).abs() < 1e-12);
    }
}
