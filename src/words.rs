//! Curated vocabulary pool and per-cycle sampling

use crate::{Error, Result};
use rand::seq::SliceRandom;

/// Curated list of vocabulary for daily learning
pub const VOCABULARY_POOL: &[&str] = &[
    "Ephemeral", "Serendipity", "Quintessential", "Ineffable", "Languid",
    "Pervasive", "Eloquent", "Melancholy", "Paradigm", "Surreptitious",
    "Nefarious", "Fastidious", "Capricious", "Resilient", "Stoic",
    "Ubiquitous", "Pragmatic", "Benevolent", "Tenacious", "Altruistic",
    "Enigma", "Aesthetic", "Meticulous", "Placid", "Superfluous",
    "Venerable", "Zealous", "Quixotic", "Arcane", "Luminous",
    "Assiduous", "Clarity", "Euphoria", "Incendiary", "Mellifluous",
    "Petrichor", "Sonorous", "Vivid", "Wanderlust", "Zenith",
    "Abundant", "Bountiful", "Diligent", "Exuberant", "Fervent",
    "Gracious", "Harmonious", "Intrepid", "Jovial", "Kindred",
];

/// A fixed pool of words sampled without replacement.
///
/// Holds no state between calls: every `sample` is an independent draw.
#[derive(Debug, Clone)]
pub struct WordSource {
    pool: Vec<String>,
}

impl WordSource {
    /// Build a source over a custom pool. Blank entries are ignored and
    /// duplicates keep their first occurrence.
    pub fn new<I, S>(pool: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut words: Vec<String> = Vec::new();
        for word in pool {
            let word = word.into().trim().to_string();
            if word.is_empty() || words.iter().any(|w| w.eq_ignore_ascii_case(&word)) {
                continue;
            }
            words.push(word);
        }
        Self { pool: words }
    }

    /// Source over the built-in curated pool
    pub fn curated() -> Self {
        Self::new(VOCABULARY_POOL.iter().copied())
    }

    pub fn pool(&self) -> &[String] {
        &self.pool
    }

    /// Draw `count` distinct words in random order.
    pub fn sample(&self, count: usize) -> Result<Vec<String>> {
        if count > self.pool.len() {
            return Err(Error::InsufficientPool {
                requested: count,
                available: self.pool.len(),
            });
        }

        let mut shuffled = self.pool.clone();
        shuffled.shuffle(&mut rand::rng());
        shuffled.truncate(count);
        Ok(shuffled)
    }
}

impl Default for WordSource {
    fn default() -> Self {
        Self::curated()
    }
}
