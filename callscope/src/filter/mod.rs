//! Filter policy and the compiled filter engine
//!
//! The policy document is loaded once at session start and is read-only
//! thereafter. [`FilterEngine::allowed`] is the pure predicate consulted by
//! the stack reconstructor on every Enter. The count thresholds
//! (`min_call_count` / `max_call_count`) are deliberately *not* part of that
//! predicate: they are applied at snapshot time against final aggregated
//! counts, which are not knowable during reconstruction.
//!
//! ## Precedence
//!
//! First matching rule wins, specificity before generality, exclusion before
//! inclusion at equal specificity:
//!
//! 1. module-specific exclude
//! 2. module-specific include
//! 3. global exclude
//! 4. global include
//! 5. depth limit (`depth >= call_depth_limit` → disallowed)
//! 6. default-allow
//!
//! Patterns use anchored regex semantics against the function name; a rule
//! set under `module_specific_filters` applies only to entities of that
//! module.

use crate::domain::{EntityId, PolicyError};
use regex::Regex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Global include/exclude pattern lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GlobalFilters {
    #[serde(default)]
    pub include_patterns: Vec<String>,
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

/// Per-module include/exclude pattern lists.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModuleFilters {
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
}

/// The policy document as consumed from configuration.
///
/// Immutable once loaded; an unusable policy (invalid regex) is a load-time
/// failure and the session must not start.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FilterPolicy {
    #[serde(default)]
    pub global_filters: GlobalFilters,
    #[serde(default)]
    pub module_specific_filters: HashMap<String, ModuleFilters>,
    #[serde(default)]
    pub call_depth_limit: Option<usize>,
    #[serde(default)]
    pub min_call_count: Option<u64>,
    #[serde(default)]
    pub max_call_count: Option<u64>,
}

impl FilterPolicy {
    pub fn from_json(document: &str) -> Result<Self, PolicyError> {
        Ok(serde_json::from_str(document)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, PolicyError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }
}

/// Edge/node count bounds applied when taking a snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountBounds {
    pub min: Option<u64>,
    pub max: Option<u64>,
}

impl CountBounds {
    pub fn admits(&self, count: u64) -> bool {
        self.min.is_none_or(|min| count >= min) && self.max.is_none_or(|max| count <= max)
    }
}

#[derive(Debug)]
struct CompiledModule {
    include: Vec<Regex>,
    exclude: Vec<Regex>,
}

/// Compiled form of a [`FilterPolicy`], ready for per-event evaluation.
#[derive(Debug)]
pub struct FilterEngine {
    global_include: Vec<Regex>,
    global_exclude: Vec<Regex>,
    modules: HashMap<String, CompiledModule>,
    depth_limit: Option<usize>,
    count_bounds: CountBounds,
}

impl FilterEngine {
    /// Compile a policy, anchoring every pattern. Fails on the first invalid
    /// pattern, naming the rule set it came from.
    pub fn compile(policy: &FilterPolicy) -> Result<Self, PolicyError> {
        let global_include = compile_set(&policy.global_filters.include_patterns, "global include")?;
        let global_exclude = compile_set(&policy.global_filters.exclude_patterns, "global exclude")?;

        let mut modules = HashMap::new();
        for (module, filters) in &policy.module_specific_filters {
            let include = compile_set(&filters.include, &format!("module `{module}` include"))?;
            let exclude = compile_set(&filters.exclude, &format!("module `{module}` exclude"))?;
            modules.insert(module.clone(), CompiledModule { include, exclude });
        }

        Ok(Self {
            global_include,
            global_exclude,
            modules,
            depth_limit: policy.call_depth_limit,
            count_bounds: CountBounds { min: policy.min_call_count, max: policy.max_call_count },
        })
    }

    /// A policy with no rules: every call is allowed, no count bounds.
    pub fn allow_all() -> Self {
        Self {
            global_include: Vec::new(),
            global_exclude: Vec::new(),
            modules: HashMap::new(),
            depth_limit: None,
            count_bounds: CountBounds::default(),
        }
    }

    /// Should a call to `entity` observed at `depth` be tracked?
    ///
    /// Pure predicate; evaluated in precedence order, first match wins.
    pub fn allowed(&self, entity: &EntityId, depth: usize) -> bool {
        if let Some(rules) = self.modules.get(entity.module()) {
            if matches_any(&rules.exclude, entity.function()) {
                return false;
            }
            if matches_any(&rules.include, entity.function()) {
                return true;
            }
        }
        if matches_any(&self.global_exclude, entity.function()) {
            return false;
        }
        if matches_any(&self.global_include, entity.function()) {
            return true;
        }
        if let Some(limit) = self.depth_limit {
            if depth >= limit {
                return false;
            }
        }
        true
    }

    /// Count thresholds for snapshot-time re-filtering.
    pub fn count_bounds(&self) -> CountBounds {
        self.count_bounds
    }
}

fn matches_any(patterns: &[Regex], function: &str) -> bool {
    patterns.iter().any(|p| p.is_match(function))
}

fn compile_set(patterns: &[String], scope: &str) -> Result<Vec<Regex>, PolicyError> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{pattern})$")).map_err(|source| PolicyError::InvalidPattern {
                scope: scope.to_string(),
                pattern: pattern.clone(),
                source,
            })
        })
        .collect()
}
