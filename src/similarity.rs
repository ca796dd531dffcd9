//! Edit distance and normalized string similarity.
//!
//! Both functions work on `char`s, not bytes, so accented labels compare the
//! way a reader would expect.

/// Minimum number of single-character insertions, deletions and
/// substitutions turning `a` into `b`.
///
/// Two-row dynamic programming: O(len(a)·len(b)) time, O(len(b)) space.
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut previous: Vec<usize> = (0..=b_chars.len()).collect();
    let mut current = vec![0usize; b_chars.len() + 1];

    for (i, ca) in a_chars.iter().enumerate() {
        current[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            current[j + 1] = (previous[j + 1] + 1)
                .min(current[j] + 1)
                .min(previous[j] + cost);
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[b_chars.len()]
}

/// Normalized similarity in `[0, 1]`.
///
/// `(max_len - edit_distance) / max_len`. Exactly one empty input scores 0;
/// two empty inputs are identical and score 1.
pub fn similarity(a: &str, b: &str) -> f64 {
    let len_a = a.chars().count();
    let len_b = b.chars().count();

    match (len_a, len_b) {
        (0, 0) => return 1.0,
        (0, _) | (_, 0) => return 0.0,
        _ => {}
    }

    let (longer, shorter) = if len_a >= len_b { (a, b) } else { (b, a) };
    let max_len = len_a.max(len_b);
    let distance = edit_distance(longer, shorter);

    (max_len.saturating_sub(distance)) as f64 / max_len as f64
}
