use serde::{Deserialize, Serialize};

/// Strategy families. Each family has its own registry and default.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyFamily {
    Cost,
    Pricing,
    Allocation,
    Batch,
    Validation,
}

impl StrategyFamily {
    pub const ALL: [StrategyFamily; 5] = [
        StrategyFamily::Cost,
        StrategyFamily::Pricing,
        StrategyFamily::Allocation,
        StrategyFamily::Batch,
        StrategyFamily::Validation,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            StrategyFamily::Cost => "cost",
            StrategyFamily::Pricing => "pricing",
            StrategyFamily::Allocation => "allocation",
            StrategyFamily::Batch => "batch",
            StrategyFamily::Validation => "validation",
        }
    }
}

impl core::fmt::Display for StrategyFamily {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Common surface of every strategy.
pub trait Strategy: Send + Sync {
    /// Registry key, unique within the family.
    fn name(&self) -> &str;

    fn family(&self) -> StrategyFamily;

    /// Human-readable summary for introspection.
    fn description(&self) -> &str;
}

/// Introspection row returned by registry listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyInfo {
    pub family: StrategyFamily,
    pub name: String,
    pub description: String,
    pub is_default: bool,
}
