// "Did you mean?" suggestions for unknown annotation names

/// Find the candidate closest to `name` within an edit distance of 3.
pub fn closest_match<'a>(
    name: &str,
    candidates: impl Iterator<Item = &'a str>,
) -> Option<String> {
    const THRESHOLD: usize = 3;

    if name.is_empty() {
        return None;
    }

    let mut best: Option<(&str, usize)> = None;
    for candidate in candidates {
        if candidate == name {
            continue;
        }
        if name.len().abs_diff(candidate.len()) > THRESHOLD {
            continue;
        }
        let distance = edit_distance(name, candidate);
        if distance <= THRESHOLD && best.map_or(true, |(_, d)| distance < d) {
            best = Some((candidate, distance));
        }
    }

    best.map(|(s, _)| s.to_string())
}

/// Levenshtein edit distance, two-row implementation.
fn edit_distance(a: &str, b: &str) -> usize {
    let a_len = a.chars().count();
    let b_len = b.chars().count();

    if a_len == 0 {
        return b_len;
    }
    if b_len == 0 {
        return a_len;
    }

    let mut prev_row: Vec<usize> = (0..=b_len).collect();
    let mut curr_row: Vec<usize> = vec![0; b_len + 1];

    for (i, a_char) in a.chars().enumerate() {
        curr_row[0] = i + 1;

        for (j, b_char) in b.chars().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }

        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_len]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_edit_distance() {
        assert_eq!(edit_distance("kitten", "sitting"), 3);
        assert_eq!(edit_distance("same", "same"), 0);
        assert_eq!(edit_distance("", "abc"), 3);
    }

    #[test]
    fn test_closest_match() {
        let candidates = ["allow_unused", "setting"];
        assert_eq!(
            closest_match("alow_unused", candidates.into_iter()),
            Some("allow_unused".to_string())
        );
        assert_eq!(closest_match("completely_different", candidates.into_iter()), None);
    }

    #[test]
    fn test_exact_match_is_skipped() {
        assert_eq!(closest_match("setting", ["setting"].into_iter()), None);
    }
}
