//! Job selection syntax used by the command line (`"1-3;5"`).

use std::collections::BTreeSet;

/// Parse a selection string into sorted, de-duplicated 1-based indices no
/// greater than `max`.
///
/// Parts are separated by `;`. A part is either a single number or an
/// inclusive `start-end` range; ranges are clipped to `1..=max`. Malformed
/// parts and reversed ranges are ignored rather than rejected.
pub fn parse_selection(input: &str, max: usize) -> Vec<usize> {
    let mut selected = BTreeSet::new();

    for part in input.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        match part.split_once('-') {
            Some((start, end)) => {
                if let (Ok(start), Ok(end)) = (start.trim().parse::<usize>(), end.trim().parse::<usize>()) {
                    selected.extend(start.max(1)..=end.min(max));
                }
            }
            None => {
                if let Ok(index) = part.parse::<usize>() {
                    if (1..=max).contains(&index) {
                        selected.insert(index);
                    }
                }
            }
        }
    }

    selected.into_iter().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_and_list() {
        assert_eq!(parse_selection("2", 5), vec![2]);
        assert_eq!(parse_selection("3;1", 5), vec![1, 3]);
    }

    #[test]
    fn test_range_merges_and_dedups() {
        assert_eq!(parse_selection("1-3;2;5", 5), vec![1, 2, 3, 5]);
    }

    #[test]
    fn test_malformed_parts_ignored() {
        assert!(parse_selection("", 5).is_empty());
        assert_eq!(parse_selection("a;4;1-x;3-1", 5), vec![4]);
    }

    #[test]
    fn test_out_of_range_indices_clipped() {
        assert_eq!(parse_selection("0;2;9", 3), vec![2]);
        assert_eq!(parse_selection("0-2", 3), vec![1, 2]);
        assert_eq!(parse_selection("2-4000000000", 3), vec![2, 3]);
        assert!(parse_selection("1-4000000000", 0).is_empty());
    }
}
