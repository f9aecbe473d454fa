//! Static persona metadata used to build generation prompts.
//!
//! Profiles are pure data: free-text descriptive fields keyed by a
//! short identifier. The catalog is loaded once and never mutated, and
//! lookups are tolerant: an unknown key yields a default (all-empty)
//! profile instead of an error, so a misspelled persona degrades to a
//! generic voice rather than failing the conversation.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Descriptive record of a philosopher's positions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhilosopherProfile {
    /// Full display name.
    #[serde(default)]
    pub name: String,
    /// Historical era.
    #[serde(default)]
    pub era: String,
    /// Signature concepts.
    #[serde(default)]
    pub key_concepts: Vec<String>,
    /// Core beliefs, as a prose fragment.
    #[serde(default)]
    pub beliefs: String,
    /// How the philosopher argues.
    #[serde(default)]
    pub style: String,
}

/// Descriptive record of an author's literary voice.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorProfile {
    /// Full display name.
    #[serde(default)]
    pub name: String,
    /// Writing characteristics.
    #[serde(default)]
    pub characteristics: String,
    /// Narrative voice.
    #[serde(default)]
    pub voice: String,
}

/// Immutable lookup of philosopher and author profiles.
#[derive(Clone, Debug, Default)]
pub struct PersonaCatalog {
    philosophers: HashMap<String, PhilosopherProfile>,
    authors: HashMap<String, AuthorProfile>,
    default_philosopher: PhilosopherProfile,
    default_author: AuthorProfile,
}

impl PersonaCatalog {
    /// The catalog shipped with the crate.
    pub fn builtin() -> Self {
        Self::from_json(
            include_str!("data/philosophers.json"),
            include_str!("data/authors.json"),
        )
        .expect("builtin persona data is valid")
    }

    /// Builds a catalog from JSON maps of profiles, for callers that
    /// ship their own metadata files.
    pub fn from_json(
        philosophers: &str,
        authors: &str,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            philosophers: serde_json::from_str(philosophers)?,
            authors: serde_json::from_str(authors)?,
            default_philosopher: Default::default(),
            default_author: Default::default(),
        })
    }

    /// Looks up a philosopher profile, falling back to an empty one.
    #[inline]
    pub fn philosopher(&self, key: &str) -> &PhilosopherProfile {
        self.philosophers
            .get(key)
            .unwrap_or(&self.default_philosopher)
    }

    /// Looks up an author profile, falling back to an empty one.
    #[inline]
    pub fn author(&self, key: &str) -> &AuthorProfile {
        self.authors.get(key).unwrap_or(&self.default_author)
    }

    /// Keys of every known philosopher, sorted.
    pub fn philosopher_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> =
            self.philosophers.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }

    /// Keys of every known author, sorted.
    pub fn author_keys(&self) -> Vec<&str> {
        let mut keys: Vec<&str> =
            self.authors.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}
