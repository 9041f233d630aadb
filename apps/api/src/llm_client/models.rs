//! Model Candidate Resolver: turns a caller's model preference into the ordered
//! list of concrete model ids the orchestrator will try.

use thiserror::Error;

/// Symbolic alias for an operator-configured model id. Declaration order is
/// the fixed fallback precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    Primary,
    Secondary,
    Fallback,
    Tiny,
}

impl ModelTier {
    pub const ALL: [ModelTier; 4] = [
        ModelTier::Primary,
        ModelTier::Secondary,
        ModelTier::Fallback,
        ModelTier::Tiny,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Primary => "primary",
            ModelTier::Secondary => "secondary",
            ModelTier::Fallback => "fallback",
            ModelTier::Tiny => "tiny",
        }
    }

    /// Case-insensitive tier lookup.
    pub fn parse(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .into_iter()
            .find(|tier| tier.as_str().eq_ignore_ascii_case(name))
    }
}

#[derive(Debug, Error)]
pub enum ModelConfigError {
    #[error(
        "No default model configured: set at least one of LLM_MODEL_PRIMARY, \
        LLM_MODEL_SECONDARY, LLM_MODEL_FALLBACK, LLM_MODEL_TINY"
    )]
    NoDefaults,
}

/// The four operator-configured defaults. Any may be blank.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelDefaults {
    pub primary: Option<String>,
    pub secondary: Option<String>,
    pub fallback: Option<String>,
    pub tiny: Option<String>,
}

impl ModelDefaults {
    /// Non-blank default for `tier`.
    pub fn get(&self, tier: ModelTier) -> Option<&str> {
        let slot = match tier {
            ModelTier::Primary => &self.primary,
            ModelTier::Secondary => &self.secondary,
            ModelTier::Fallback => &self.fallback,
            ModelTier::Tiny => &self.tiny,
        };
        slot.as_deref().filter(|id| !id.trim().is_empty())
    }

    /// Fails when every tier is blank, so a misconfigured deployment dies at startup
    /// rather than on the first request.
    pub fn validate(&self) -> Result<(), ModelConfigError> {
        if ModelTier::ALL.iter().any(|tier| self.get(*tier).is_some()) {
            Ok(())
        } else {
            Err(ModelConfigError::NoDefaults)
        }
    }

    /// Ordered, duplicate-free candidates for `preference`.
    ///
    /// A tier name resolves to that tier's default; any other non-blank value is
    /// used verbatim as a raw model id. Either way it goes first, followed by every
    /// non-blank default in precedence order.
    pub fn ordered(&self, preference: Option<&str>) -> Vec<String> {
        let mut candidates: Vec<String> = Vec::with_capacity(5);

        if let Some(preference) = preference.filter(|p| !p.trim().is_empty()) {
            match ModelTier::parse(preference) {
                Some(tier) => {
                    if let Some(id) = self.get(tier) {
                        push_unique(&mut candidates, id);
                    }
                }
                None => push_unique(&mut candidates, preference),
            }
        }

        for tier in ModelTier::ALL {
            if let Some(id) = self.get(tier) {
                push_unique(&mut candidates, id);
            }
        }

        candidates
    }
}

fn push_unique(candidates: &mut Vec<String>, id: &str) {
    if !candidates.iter().any(|existing| existing == id) {
        candidates.push(id.to_string());
    }
}
