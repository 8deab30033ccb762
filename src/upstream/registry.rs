use rustc_hash::FxHashMap;

use crate::config::{ModelsConfig, UnknownModelPolicy};
use crate::error::AdapterError;

use super::{UpstreamDescriptor, DESCRIPTORS};

/// One public model alias and the upstream that serves it.
#[derive(Debug, Clone)]
pub struct ModelEntry {
    pub alias: String,
    pub upstream_model: &'static str,
    pub descriptor: &'static UpstreamDescriptor,
}

/// Outcome of resolving a requested alias.
#[derive(Debug, Clone, Copy)]
pub struct Resolution<'a> {
    pub entry: &'a ModelEntry,
    pub fell_back: bool,
}

/// Read-only alias table built once at startup.
pub struct ModelRegistry {
    entries: Vec<ModelEntry>,
    index: FxHashMap<String, usize>,
    fallback_alias: String,
    unknown_model: UnknownModelPolicy,
}

/// Whether `alias` names a model of any upstream.
#[must_use]
pub fn is_known_alias(alias: &str) -> bool {
    DESCRIPTORS.iter().any(|descriptor| {
        descriptor
            .models
            .iter()
            .any(|model| descriptor.alias_for(model) == alias)
    })
}

impl ModelRegistry {
    #[must_use]
    pub fn new(config: &ModelsConfig) -> Self {
        let model_count = DESCRIPTORS.iter().map(|d| d.models.len()).sum();
        let mut entries = Vec::with_capacity(model_count);
        let mut index = FxHashMap::default();
        index.reserve(model_count);

        for descriptor in &DESCRIPTORS {
            for model in descriptor.models {
                let alias = descriptor.alias_for(model);
                if index.contains_key(&alias) {
                    tracing::warn!(alias = %alias, "duplicate model alias ignored");
                    continue;
                }
                index.insert(alias.clone(), entries.len());
                entries.push(ModelEntry {
                    alias,
                    upstream_model: model,
                    descriptor,
                });
            }
        }

        Self {
            entries,
            index,
            fallback_alias: config.fallback_model.trim().to_string(),
            unknown_model: config.unknown_model,
        }
    }

    #[must_use]
    pub fn get(&self, alias: &str) -> Option<&ModelEntry> {
        self.index.get(alias).map(|&idx| &self.entries[idx])
    }

    /// Resolve an alias, applying the unknown-model policy.
    ///
    /// # Errors
    ///
    /// Returns [`AdapterError::InvalidRequest`] when the alias is unknown and
    /// the policy is `reject`, or when the fallback itself is not registered.
    pub fn resolve(&self, alias: &str) -> Result<Resolution<'_>, AdapterError> {
        if let Some(entry) = self.get(alias) {
            return Ok(Resolution {
                entry,
                fell_back: false,
            });
        }

        if self.unknown_model == UnknownModelPolicy::Reject {
            return Err(AdapterError::InvalidRequest(format!(
                "unknown model '{alias}'"
            )));
        }

        let Some(entry) = self.get(&self.fallback_alias) else {
            return Err(AdapterError::InvalidRequest(format!(
                "unknown model '{alias}' and fallback '{}' is not registered",
                self.fallback_alias
            )));
        };
        tracing::warn!(
            requested = alias,
            fallback = %entry.alias,
            "unknown model alias, using fallback"
        );
        Ok(Resolution {
            entry,
            fell_back: true,
        })
    }

    /// All entries in listing order.
    pub fn entries(&self) -> impl Iterator<Item = &ModelEntry> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Each provider's default model, one per provider.
    pub fn provider_defaults(&self) -> impl Iterator<Item = &ModelEntry> {
        DESCRIPTORS.iter().filter_map(|descriptor| {
            self.get(&descriptor.alias_for(descriptor.default_model))
        })
    }
}
