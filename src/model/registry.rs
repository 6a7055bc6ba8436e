use crate::error::{Error, Result};
use std::collections::{BTreeMap, HashMap};
use std::fs;

const COMPLETE_MARKER: &str = "yes";

/// One registry row: column name to value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDescriptor {
    fields: HashMap<String, String>,
}

impl ModelDescriptor {
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields.get(column).map(String::as_str)
    }

    /// Value of a column every well-formed registry carries.
    pub fn require(&self, column: &str) -> Result<&str> {
        self.get(column)
            .ok_or_else(|| Error::MissingColumn(column.to_string()))
    }

    pub fn trg_language(&self) -> Result<&str> {
        self.require("trg_language")
    }

    pub fn domain(&self) -> Result<&str> {
        self.require("domain")
    }
}

/// Models for a single source language, keyed by target language.
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    src_language: String,
    models: BTreeMap<String, ModelDescriptor>,
}

impl ModelRegistry {
    /// Parse the TSV registry, keeping complete models for `src_language`.
    ///
    /// When several rows share a target language the first one wins, unless a
    /// later row is tagged with `domain`, in which case that row replaces it.
    pub fn parse(text: &str, src_language: &str, domain: &str) -> Result<Self> {
        // Tabs are separators, so empty trailing fields must survive the trim.
        let mut lines = text
            .split('\n')
            .map(|line| line.trim_matches(|c: char| c != '\t' && c.is_whitespace()))
            .enumerate();

        let headers: Vec<&str> = match lines.next() {
            Some((_, header)) if !header.is_empty() => header.split('\t').collect(),
            _ => {
                return Err(Error::MalformedRegistry {
                    line: 1,
                    expected: 1,
                    found: 0,
                })
            }
        };

        let mut models = BTreeMap::new();
        for (index, line) in lines {
            if line.is_empty() {
                continue;
            }

            let values: Vec<&str> = line.split('\t').collect();
            if values.len() != headers.len() {
                return Err(Error::MalformedRegistry {
                    line: index + 1,
                    expected: headers.len(),
                    found: values.len(),
                });
            }

            let descriptor = ModelDescriptor {
                fields: headers
                    .iter()
                    .zip(values)
                    .map(|(h, v)| (h.to_string(), v.to_string()))
                    .collect(),
            };

            if descriptor.require("src_language")? != src_language
                || descriptor.require("complete")? != COMPLETE_MARKER
            {
                continue;
            }

            let trg_language = descriptor.trg_language()?.to_string();
            if models.contains_key(&trg_language) && descriptor.domain()? != domain {
                continue;
            }
            models.insert(trg_language, descriptor);
        }

        tracing::info!("Found {} Masakhane models.", models.len());

        Ok(Self {
            src_language: src_language.to_string(),
            models,
        })
    }

    /// Load the registry from an `http(s)` URL or a local file.
    pub fn fetch(location: &str, src_language: &str, domain: &str) -> Result<Self> {
        let text = if location.starts_with("http://") || location.starts_with("https://") {
            tracing::info!("Fetching model registry from {}", location);
            reqwest::blocking::get(location)?
                .error_for_status()?
                .text()?
        } else {
            tracing::info!("Reading model registry from {}", location);
            fs::read_to_string(location)?
        };

        Self::parse(&text, src_language, domain)
    }

    pub fn src_language(&self) -> &str {
        &self.src_language
    }

    pub fn get(&self, trg_language: &str) -> Option<&ModelDescriptor> {
        self.models.get(trg_language)
    }

    pub fn contains(&self, trg_language: &str) -> bool {
        self.models.contains_key(trg_language)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }

    pub fn target_languages(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ModelDescriptor)> {
        self.models.iter().map(|(k, v)| (k.as_str(), v))
    }
}
