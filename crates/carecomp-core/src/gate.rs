use crate::error::{CarecompError, Result};
use crate::types::{Module, Role};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// True when `role` sits at or above `min` in `staff < manager < admin < dev`.
pub fn role_at_least(role: Role, min: Role) -> bool {
    role >= min
}

/// String form of [`role_at_least`]. Unknown role strings are an error.
pub fn gate(role: &str, min: &str) -> Result<bool> {
    Ok(role_at_least(role.parse()?, min.parse()?))
}

pub fn require_role(role: Role, min: Role) -> Result<()> {
    if role_at_least(role, min) {
        Ok(())
    } else {
        Err(CarecompError::PermissionDenied {
            required: min.to_string(),
            actual: role.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// FeatureFlags
// ---------------------------------------------------------------------------

/// Stored per-organization module switches. Modules without an entry are on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureFlags(pub BTreeMap<Module, bool>);

impl FeatureFlags {
    pub fn is_enabled(&self, module: Module) -> bool {
        self.0.get(&module).copied().unwrap_or(true)
    }

    pub fn set(&mut self, module: Module, enabled: bool) {
        self.0.insert(module, enabled);
    }

    /// Every known module with its resolved value.
    pub fn resolved(&self) -> BTreeMap<Module, bool> {
        Module::all()
            .iter()
            .map(|m| (*m, self.is_enabled(*m)))
            .collect()
    }

    /// Apply string-keyed updates; unknown module names are rejected.
    pub fn apply(&mut self, updates: &BTreeMap<String, bool>) -> Result<()> {
        for (name, enabled) in updates {
            let module: Module = name.parse()?;
            self.set(module, *enabled);
        }
        Ok(())
    }
}

/// Flags as shown to the caller. A dev organization sees every module on,
/// whatever is stored; enforcement keeps using the stored flags.
pub fn effective_flags(flags: &FeatureFlags, is_dev_org: bool) -> BTreeMap<Module, bool> {
    if is_dev_org {
        Module::all().iter().map(|m| (*m, true)).collect()
    } else {
        flags.resolved()
    }
}

pub fn require_feature(flags: &FeatureFlags, module: Module) -> Result<()> {
    if flags.is_enabled(module) {
        Ok(())
    } else {
        Err(CarecompError::FeatureDisabled(module.to_string()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
