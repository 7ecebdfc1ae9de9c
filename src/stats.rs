use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\w[\w']*").unwrap());

/// Common English words left out of the word cloud
const STOPWORDS: &[&str] = &[
    "a", "about", "above", "after", "again", "against", "all", "also", "am", "an", "and", "any",
    "are", "aren't", "as", "at", "be", "because", "been", "before", "being", "below", "between",
    "both", "but", "by", "can", "can't", "cannot", "could", "couldn't", "did", "didn't", "do",
    "does", "doesn't", "doing", "don't", "down", "during", "each", "else", "ever", "few", "for",
    "from", "further", "get", "had", "hadn't", "has", "hasn't", "have", "haven't", "having", "he",
    "her", "here", "hers", "herself", "him", "himself", "his", "how", "however", "i", "i'd",
    "i'll", "i'm", "i've", "if", "in", "into", "is", "isn't", "it", "it's", "its", "itself",
    "just", "like", "me", "more", "most", "my", "myself", "no", "nor", "not", "of", "off", "on",
    "once", "only", "or", "other", "otherwise", "ought", "our", "ours", "ourselves", "out",
    "over", "own", "same", "shall", "she", "should", "shouldn't", "since", "so", "some", "such",
    "than", "that", "the", "their", "theirs", "them", "themselves", "then", "there", "these",
    "they", "this", "those", "through", "to", "too", "under", "until", "up", "very", "was",
    "wasn't", "we", "were", "weren't", "what", "when", "where", "which", "while", "who", "whom",
    "why", "with", "won't", "would", "wouldn't", "you", "your", "yours", "yourself",
    "yourselves",
];

/// Welford's online algorithm for the running mean, plus min/max
#[derive(Debug, Clone, Default)]
pub struct WelfordStats {
    count: u64,
    mean: f64,
    min: Option<f64>,
    max: Option<f64>,
}

impl WelfordStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f64) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f64;
        self.min = Some(self.min.map_or(value, |m| m.min(value)));
        self.max = Some(self.max.map_or(value, |m| m.max(value)));
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    /// `None` until at least one value has been seen
    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then_some(self.mean)
    }

    pub fn min(&self) -> Option<f64> {
        self.min
    }

    pub fn max(&self) -> Option<f64> {
        self.max
    }
}

impl FromIterator<f64> for WelfordStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = WelfordStats::new();
        for value in iter {
            stats.update(value);
        }
        stats
    }
}

/// One equal-width histogram bin
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u64,
}

/// Equal-width histogram over `[min, max]`, the last bin closed on the right
///
/// A constant sample is spread over `[v - 0.5, v + 0.5]`.
pub fn histogram(values: &[f64], bins: usize) -> Vec<HistogramBin> {
    let stats: WelfordStats = values.iter().copied().collect();
    let (Some(mut low), Some(mut high)) = (stats.min(), stats.max()) else {
        return Vec::new();
    };
    if bins == 0 {
        return Vec::new();
    }
    if low == high {
        low -= 0.5;
        high += 0.5;
    }

    let width = (high - low) / bins as f64;
    let mut counts = vec![0u64; bins];
    for &value in values {
        let index = (((value - low) / width) as usize).min(bins - 1);
        counts[index] += 1;
    }

    counts
        .into_iter()
        .enumerate()
        .map(|(i, count)| HistogramBin {
            lower: low + width * i as f64,
            upper: if i + 1 == bins {
                high
            } else {
                low + width * (i + 1) as f64
            },
            count,
        })
        .collect()
}

/// Number of responses giving one rating
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingCount {
    pub rating: f64,
    pub count: u64,
}

/// Distinct ratings in ascending order with their counts
pub fn rating_counts(values: &[f64]) -> Vec<RatingCount> {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));

    let mut counts: Vec<RatingCount> = Vec::new();
    for value in sorted {
        match counts.last_mut() {
            Some(last) if last.rating == value => last.count += 1,
            _ => counts.push(RatingCount {
                rating: value,
                count: 1,
            }),
        }
    }
    counts
}

/// Number of responses in one category
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryCount {
    pub category: String,
    pub count: u64,
}

/// Distinct categories in first-appearance order with their counts
pub fn category_counts<'a>(values: impl IntoIterator<Item = &'a str>) -> Vec<CategoryCount> {
    let mut positions: HashMap<&str, usize> = HashMap::new();
    let mut counts: Vec<CategoryCount> = Vec::new();

    for value in values {
        match positions.get(value) {
            Some(&i) => counts[i].count += 1,
            None => {
                positions.insert(value, counts.len());
                counts.push(CategoryCount {
                    category: value.to_string(),
                    count: 1,
                });
            }
        }
    }
    counts
}

/// A word cloud entry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WordCount {
    pub word: String,
    pub count: u64,
    /// Count relative to the most frequent word (0, 1]
    pub weight: f64,
}

/// Word frequencies across free-text answers, most frequent first
pub fn word_frequencies<'a>(
    texts: impl IntoIterator<Item = &'a str>,
    max_words: usize,
) -> Vec<WordCount> {
    let mut counts: HashMap<String, u64> = HashMap::new();

    for text in texts {
        let lowered = text.to_lowercase();
        for token in WORD_PATTERN.find_iter(&lowered) {
            let word = token.as_str();
            let word = word.strip_suffix("'s").unwrap_or(word);
            if word.is_empty()
                || STOPWORDS.contains(&word)
                || word.chars().all(|c| c.is_numeric())
            {
                continue;
            }
            *counts.entry(word.to_string()).or_insert(0) += 1;
        }
    }

    let mut words: Vec<(String, u64)> = counts.into_iter().collect();
    words.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    words.truncate(max_words);

    let top = words.first().map(|(_, c)| *c).unwrap_or(1) as f64;
    words
        .into_iter()
        .map(|(word, count)| WordCount {
            word,
            count,
            weight: count as f64 / top,
        })
        .collect()
}
