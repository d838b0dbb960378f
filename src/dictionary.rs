//! Dictionary lookups against the free dictionary API.
//!
//! Every failure here is soft: a word that cannot be resolved is logged and
//! dropped so the rest of the batch can still be rendered.

use crate::{Error, Result, WallpaperConfig, WordEntry};
use futures::future::join_all;
use log::{debug, warn};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

/// One entry of the provider's response list
#[derive(Debug, Clone, Deserialize)]
pub struct ApiEntry {
    #[serde(default)]
    pub word: String,
    #[serde(default)]
    pub phonetics: Vec<ApiPhonetic>,
    pub meanings: Vec<ApiMeaning>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiPhonetic {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMeaning {
    #[serde(rename = "partOfSpeech")]
    pub part_of_speech: String,
    pub definitions: Vec<ApiDefinition>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiDefinition {
    pub definition: String,
    #[serde(default)]
    pub example: Option<String>,
}

/// HTTP client for the dictionary provider
#[derive(Debug, Clone)]
pub struct DictionaryClient {
    client: reqwest::Client,
    base_url: Url,
}

impl DictionaryClient {
    pub fn new(config: &WallpaperConfig) -> Result<Self> {
        let base_url = Url::parse(&config.dictionary_url).map_err(|e| {
            Error::ConfigError(format!("Invalid dictionary URL '{}': {}", config.dictionary_url, e))
        })?;
        if base_url.cannot_be_a_base() {
            return Err(Error::ConfigError(format!(
                "Dictionary URL '{}' cannot take a path",
                config.dictionary_url
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.lookup_timeout_ms))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| Error::NetworkError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    /// URL queried for `word`
    pub fn lookup_url(&self, word: &str) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments.pop_if_empty().push(word);
        }
        url
    }

    /// Resolve a single word, returning `None` on any failure.
    pub async fn resolve(&self, word: &str) -> Option<WordEntry> {
        match self.try_resolve(word).await {
            Ok(entry) => Some(entry),
            Err(e) => {
                warn!("{}", e);
                None
            }
        }
    }

    /// Resolve every word concurrently.
    ///
    /// All lookups run to completion before failures are filtered out; the
    /// surviving entries keep the order of `words`.
    pub async fn resolve_all(&self, words: &[String]) -> Vec<WordEntry> {
        let results = join_all(words.iter().map(|word| self.resolve(word))).await;
        results.into_iter().flatten().collect()
    }

    async fn try_resolve(&self, word: &str) -> Result<WordEntry> {
        let lookup_err = |reason: String| Error::Lookup { word: word.to_string(), reason };

        let url = self.lookup_url(word);
        debug!("Looking up '{}' at {}", word, url);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| lookup_err(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(lookup_err(format!("HTTP {}", status)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| lookup_err(format!("failed to read body: {}", e)))?;

        let entries: Vec<ApiEntry> = serde_json::from_slice(&body)
            .map_err(|e| lookup_err(format!("malformed payload: {}", e)))?;

        select_entry(word, &entries).map_err(lookup_err)
    }
}

/// Pick the sense to display from a provider response.
///
/// Meanings are scanned in order and the first definition carrying an example
/// wins, along with its meaning's part of speech. Without one, the first
/// definition of the first meaning is used and its example is synthesized.
pub fn select_entry(requested: &str, entries: &[ApiEntry]) -> std::result::Result<WordEntry, String> {
    let entry = entries.first().ok_or("empty response")?;

    let with_example = entry.meanings.iter().find_map(|m| {
        m.definitions
            .iter()
            .find(|d| has_text(&d.example))
            .map(|d| (m, d))
    });
    let (meaning, definition) = match with_example {
        Some(sense) => sense,
        None => {
            let first_meaning = entry.meanings.first().ok_or("no meanings")?;
            let first_definition = first_meaning.definitions.first().ok_or("no definitions")?;
            (first_meaning, first_definition)
        }
    };

    if definition.definition.trim().is_empty() {
        return Err("empty definition".to_string());
    }

    let example = match &definition.example {
        Some(example) if !example.trim().is_empty() => example.clone(),
        _ => fallback_example(&meaning.part_of_speech),
    };

    let headword = if entry.word.trim().is_empty() { requested } else { entry.word.as_str() };

    Ok(WordEntry {
        word: capitalize_first(headword),
        phonetic: entry
            .phonetics
            .first()
            .and_then(|p| p.text.clone())
            .unwrap_or_default(),
        part_of_speech: meaning.part_of_speech.clone(),
        definition: definition.definition.clone(),
        example,
    })
}

/// Example used when the provider offers none for the chosen sense
pub fn fallback_example(part_of_speech: &str) -> String {
    format!("The {} used in a common context.", part_of_speech)
}

/// Upper-case the first character, leaving the rest untouched.
pub fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.trim().is_empty())
}
