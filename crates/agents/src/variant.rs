//! Agent variants and the registry the router selects from.

use std::{collections::BTreeMap, fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::prompt;

pub const GENERAL_VARIANT: &str = "general";
pub const RESEARCH_VARIANT: &str = "research";
pub const CONTRACT_VARIANT: &str = "contract";

/// A piece of information a variant needs before it may take over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Slot {
    Parties,
    Term,
    KeyConditions,
}

impl Slot {
    pub const ALL: [Slot; 3] = [Slot::Parties, Slot::Term, Slot::KeyConditions];

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Parties => "parties",
            Self::Term => "term",
            Self::KeyConditions => "key_conditions",
        }
    }

    /// Human wording used in clarification replies.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Parties => "the parties involved (who is signing)",
            Self::Term => "the duration or term of the agreement",
            Self::KeyConditions => "the key terms and conditions (what is being agreed)",
        }
    }
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Slot {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|slot| slot.as_str() == s)
            .ok_or_else(|| format!("unknown slot: {s}"))
    }
}

/// A specialised agent persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentVariant {
    pub name: String,
    pub capability: String,
    #[serde(default)]
    pub required_slots: Vec<Slot>,
    #[serde(default)]
    pub instructions: String,
    /// Model id override; `None` uses the executor's default model.
    #[serde(default)]
    pub model: Option<String>,
}

impl AgentVariant {
    pub fn new(name: impl Into<String>, capability: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            capability: capability.into(),
            required_slots: Vec::new(),
            instructions: String::new(),
            model: None,
        }
    }

    #[must_use]
    pub fn with_required_slots(mut self, slots: impl IntoIterator<Item = Slot>) -> Self {
        self.required_slots = slots.into_iter().collect();
        self
    }

    #[must_use]
    pub fn with_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.instructions = instructions.into();
        self
    }

    #[must_use]
    pub fn with_model(mut self, model: Option<String>) -> Self {
        self.model = model;
        self
    }

    pub fn general() -> Self {
        Self::new(GENERAL_VARIANT, "legal_advice").with_instructions(prompt::GENERAL_INSTRUCTIONS)
    }

    pub fn research() -> Self {
        Self::new(RESEARCH_VARIANT, "legal_research")
            .with_instructions(prompt::RESEARCH_INSTRUCTIONS)
    }

    pub fn contract() -> Self {
        Self::new(CONTRACT_VARIANT, "contract_drafting")
            .with_required_slots(Slot::ALL)
            .with_instructions(prompt::CONTRACT_INSTRUCTIONS)
    }
}

/// Registered variants plus the default used when classification is unusable.
#[derive(Debug, Clone)]
pub struct VariantRegistry {
    variants: BTreeMap<String, AgentVariant>,
    default: String,
}

impl VariantRegistry {
    /// A registry holding only `default`.
    pub fn new(default: AgentVariant) -> Self {
        let name = default.name.clone();
        let mut variants = BTreeMap::new();
        variants.insert(name.clone(), default);
        Self {
            variants,
            default: name,
        }
    }

    /// The built-in general (default), research and contract variants.
    pub fn builtin() -> Self {
        let mut registry = Self::new(AgentVariant::general());
        registry.register(AgentVariant::research());
        registry.register(AgentVariant::contract());
        registry
    }

    /// Add or replace a variant. Replacing the default keeps it the default.
    pub fn register(&mut self, variant: AgentVariant) {
        self.variants.insert(variant.name.clone(), variant);
    }

    /// Point every variant at `model` unless it already names one.
    pub fn set_default_model(&mut self, model: &str) {
        for variant in self.variants.values_mut() {
            if variant.model.is_none() {
                variant.model = Some(model.to_string());
            }
        }
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&AgentVariant> {
        self.variants.get(name)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.variants.contains_key(name)
    }

    #[must_use]
    pub fn default_variant(&self) -> &AgentVariant {
        // The default is inserted in `new` and `register` only replaces it.
        &self.variants[&self.default]
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variants.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = &AgentVariant> {
        self.variants.values()
    }
}

impl Default for VariantRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn builtin_registry_has_three_variants() {
        let registry = VariantRegistry::builtin();
        let names: Vec<&str> = registry.names().collect();
        assert_eq!(names, vec!["contract", "general", "research"]);
        assert_eq!(registry.default_variant().name, GENERAL_VARIANT);
    }

    #[test]
    fn contract_requires_all_slots() {
        let registry = VariantRegistry::builtin();
        let contract = registry.get(CONTRACT_VARIANT).unwrap();
        assert_eq!(contract.required_slots, vec![
            Slot::Parties,
            Slot::Term,
            Slot::KeyConditions
        ]);
        assert!(registry.get(GENERAL_VARIANT).unwrap().required_slots.is_empty());
    }

    #[test]
    fn replacing_default_keeps_it_default() {
        let mut registry = VariantRegistry::builtin();
        registry.register(AgentVariant::new(GENERAL_VARIANT, "custom"));
        assert_eq!(registry.default_variant().capability, "custom");
    }

    #[test]
    fn set_default_model_keeps_overrides() {
        let mut registry = VariantRegistry::builtin();
        registry.register(AgentVariant::research().with_model(Some("gpt-4o".into())));
        registry.set_default_model("gpt-4");
        assert_eq!(registry.get(RESEARCH_VARIANT).unwrap().model.as_deref(), Some("gpt-4o"));
        assert_eq!(registry.get(CONTRACT_VARIANT).unwrap().model.as_deref(), Some("gpt-4"));
    }

    #[test]
    fn slot_parses_snake_case() {
        assert_eq!("key_conditions".parse::<Slot>().unwrap(), Slot::KeyConditions);
        assert!("duration".parse::<Slot>().is_err());
    }
}
