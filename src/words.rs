//! Word counts for the blessings cloud.

use std::collections::HashMap;
use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

/// Tokens of this many chars or fewer are not counted.
pub const MIN_WORD_EXCLUSIVE: usize = 3;

pub const SPHERE_RADIUS: f64 = 5.0;
const SIZE_PER_COUNT: f64 = 0.15;
const MIN_SIZE: f64 = 0.3;
const MAX_SIZE: f64 = 1.2;

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// Lowercases, strips everything but word chars and whitespace, and splits on whitespace runs.
/// Short tokens are dropped.
pub fn tokenize(message: &str) -> Vec<String> {
    let cleaned: String = message
        .to_lowercase()
        .chars()
        .filter(|c| is_word_char(*c) || c.is_whitespace())
        .collect();
    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() > MIN_WORD_EXCLUSIVE)
        .map(str::to_string)
        .collect()
}

/// Counts every kept token across all messages. Recomputed from the full set each time.
pub fn word_frequencies<I, S>(messages: I) -> HashMap<String, u32>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts = HashMap::new();
    for message in messages {
        for token in tokenize(message.as_ref()) {
            *counts.entry(token).or_insert(0) += 1;
        }
    }
    counts
}

/// Most frequent first, ties alphabetical.
pub fn ranked(frequencies: &HashMap<String, u32>) -> Vec<(String, u32)> {
    let mut words: Vec<(String, u32)> = frequencies
        .iter()
        .map(|(word, count)| (word.clone(), *count))
        .collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedWord {
    pub word: String,
    pub count: u32,
    pub position: [f64; 3],
    pub size: f64,
}

pub fn font_size(count: u32) -> f64 {
    (count as f64 * SIZE_PER_COUNT).clamp(MIN_SIZE, MAX_SIZE)
}

/// Spreads the words over a sphere with the golden-spiral method, in the order given.
pub fn sphere_layout(words: &[(String, u32)]) -> Vec<PlacedWord> {
    let n = words.len();
    words
        .iter()
        .enumerate()
        .map(|(i, (word, count))| {
            let phi = if n == 1 {
                PI / 2.0
            } else {
                (-1.0 + (2.0 * i as f64) / n as f64).acos()
            };
            let theta = (n as f64 * PI).sqrt() * phi;
            PlacedWord {
                word: word.clone(),
                count: *count,
                position: [
                    SPHERE_RADIUS * theta.cos() * phi.sin(),
                    SPHERE_RADIUS * theta.sin() * phi.sin(),
                    SPHERE_RADIUS * phi.cos(),
                ],
                size: font_size(*count),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anniversary_example() {
        let counts = word_frequencies([
            "Happy Anniversary to you both!",
            "Happy fiftieth anniversary!!",
        ]);
        let expected: HashMap<String, u32> = [
            ("happy", 2),
            ("anniversary", 2),
            ("both", 1),
            ("fiftieth", 1),
        ]
        .into_iter()
        .map(|(w, c)| (w.to_string(), c))
        .collect();
        assert_eq!(counts, expected);
    }

    #[test]
    fn test_empty_input() {
        assert!(word_frequencies(Vec::<String>::new()).is_empty());
        assert!(word_frequencies(["", "   ", "a to be"]).is_empty());
        assert!(sphere_layout(&[]).is_empty());
    }

    #[test]
    fn test_punctuation_inside_words_is_removed() {
        let counts = word_frequencies(["Bless-you, dear ones! God's grace"]);
        assert_eq!(counts.get("blessyou"), Some(&1));
        assert_eq!(counts.get("gods"), Some(&1));
        assert_eq!(counts.get("grace"), Some(&1));
        assert_eq!(counts.get("ones"), Some(&1));
        assert_eq!(counts.get("dear"), Some(&1));
    }

    #[test]
    fn test_length_is_counted_in_chars() {
        // Four chars, more than four bytes.
        let counts = word_frequencies(["Très jolí día"]);
        assert_eq!(counts.get("très"), Some(&1));
        assert_eq!(counts.get("jolí"), Some(&1));
        assert!(!counts.contains_key("día"));
    }

    #[test]
    fn test_ranked_orders_by_count_then_word() {
        let counts = word_frequencies(["love love love", "zeal, bliss", "bliss"]);
        let ranked = ranked(&counts);
        assert_eq!(
            ranked,
            vec![
                ("love".to_string(), 3),
                ("bliss".to_string(), 2),
                ("zeal".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_layout_stays_on_sphere() {
        let words: Vec<(String, u32)> = (1..=12).map(|i| (format!("word{i}"), i)).collect();
        let placed = sphere_layout(&words);
        assert_eq!(placed.len(), 12);
        for p in &placed {
            let [x, y, z] = p.position;
            let r = (x * x + y * y + z * z).sqrt();
            assert!((r - SPHERE_RADIUS).abs() < 1e-9, "radius {r}");
            assert!((MIN_SIZE..=MAX_SIZE).contains(&p.size));
        }
        // Same input, same layout.
        assert_eq!(placed, sphere_layout(&words));
    }

    #[test]
    fn test_font_size_is_clamped() {
        assert_eq!(font_size(1), MIN_SIZE);
        assert!((font_size(4) - 0.6).abs() < 1e-9);
        assert_eq!(font_size(50), MAX_SIZE);
    }
}
