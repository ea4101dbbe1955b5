//! Named strategy registries.
//!
//! Resolution order for a tenant-scoped lookup:
//! explicit name on the operation → tenant override → family default.
//! An unknown name is `NotFound`; an empty name means "not given".

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, PoisonError, RwLock};

use stockledger_core::{DomainError, DomainResult, TenantId};

use crate::allocation::{AllocationStrategy, DueDateAllocation, FifoAllocation};
use crate::batch::{BatchStrategy, FefoBatchStrategy, FifoBatchStrategy};
use crate::cost::{CostStrategy, FifoCost, MovingAverageCost};
use crate::pricing::{PricingStrategy, StandardPricing, TieredPricing};
use crate::strategy::{Strategy, StrategyFamily, StrategyInfo};
use crate::validation::{StandardValidation, StrictValidation, ValidationStrategy};

/// Name → implementation map for one family, with an optional default.
pub struct Registry<S: ?Sized> {
    family: StrategyFamily,
    entries: BTreeMap<String, Arc<S>>,
    default: Option<String>,
}

impl<S: Strategy + ?Sized> Registry<S> {
    pub fn new(family: StrategyFamily) -> Self {
        Self {
            family,
            entries: BTreeMap::new(),
            default: None,
        }
    }

    pub fn family(&self) -> StrategyFamily {
        self.family
    }

    pub fn register(&mut self, strategy: Arc<S>) -> DomainResult<()> {
        let name = strategy.name().to_string();
        if name.trim().is_empty() {
            return Err(DomainError::invalid_input(format!(
                "{} strategy name cannot be empty",
                self.family
            )));
        }
        if strategy.family() != self.family {
            return Err(DomainError::invalid_input(format!(
                "strategy '{name}' belongs to family {}, not {}",
                strategy.family(),
                self.family
            )));
        }
        if self.entries.contains_key(&name) {
            return Err(DomainError::invalid_input(format!(
                "{} strategy '{name}' already registered",
                self.family
            )));
        }
        self.entries.insert(name, strategy);
        Ok(())
    }

    /// Removes a strategy; clears the default if it pointed at it.
    pub fn unregister(&mut self, name: &str) -> DomainResult<Arc<S>> {
        let removed = self.entries.remove(name).ok_or_else(|| self.missing(name))?;
        if self.default.as_deref() == Some(name) {
            self.default = None;
        }
        Ok(removed)
    }

    pub fn set_default(&mut self, name: &str) -> DomainResult<()> {
        if !self.entries.contains_key(name) {
            return Err(self.missing(name));
        }
        self.default = Some(name.to_string());
        Ok(())
    }

    pub fn default_name(&self) -> Option<&str> {
        self.default.as_deref()
    }

    /// `None` or an empty name resolves to the default.
    pub fn get(&self, name: Option<&str>) -> DomainResult<Arc<S>> {
        let name = match name.filter(|n| !n.is_empty()) {
            Some(n) => n,
            None => self.default.as_deref().ok_or_else(|| {
                DomainError::not_found(format!("no default {} strategy set", self.family))
            })?,
        };
        self.entries
            .get(name)
            .cloned()
            .ok_or_else(|| self.missing(name))
    }

    pub fn is_registered(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    pub fn descriptions(&self) -> Vec<StrategyInfo> {
        self.entries
            .iter()
            .map(|(name, s)| StrategyInfo {
                family: self.family,
                name: name.clone(),
                description: s.description().to_string(),
                is_default: self.default.as_deref() == Some(name.as_str()),
            })
            .collect()
    }

    fn missing(&self, name: &str) -> DomainError {
        DomainError::not_found(format!("{} strategy '{name}'", self.family))
    }
}

/// Ties a family trait object to its slot in [`StrategyRegistry`].
pub trait FamilyRegistry: Strategy {
    const FAMILY: StrategyFamily;

    fn slot(registry: &StrategyRegistry) -> &RwLock<Registry<Self>>;
}

impl FamilyRegistry for dyn CostStrategy {
    const FAMILY: StrategyFamily = StrategyFamily::Cost;

    fn slot(registry: &StrategyRegistry) -> &RwLock<Registry<Self>> {
        &registry.cost
    }
}

impl FamilyRegistry for dyn BatchStrategy {
    const FAMILY: StrategyFamily = StrategyFamily::Batch;

    fn slot(registry: &StrategyRegistry) -> &RwLock<Registry<Self>> {
        &registry.batch
    }
}

impl FamilyRegistry for dyn PricingStrategy {
    const FAMILY: StrategyFamily = StrategyFamily::Pricing;

    fn slot(registry: &StrategyRegistry) -> &RwLock<Registry<Self>> {
        &registry.pricing
    }
}

impl FamilyRegistry for dyn AllocationStrategy {
    const FAMILY: StrategyFamily = StrategyFamily::Allocation;

    fn slot(registry: &StrategyRegistry) -> &RwLock<Registry<Self>> {
        &registry.allocation
    }
}

impl FamilyRegistry for dyn ValidationStrategy {
    const FAMILY: StrategyFamily = StrategyFamily::Validation;

    fn slot(registry: &StrategyRegistry) -> &RwLock<Registry<Self>> {
        &registry.validation
    }
}

fn poisoned<T>(_: PoisonError<T>) -> DomainError {
    DomainError::invalid_state("strategy registry lock poisoned")
}

/// All five family registries plus per-tenant overrides.
///
/// Shared behind an `Arc`; registration may happen at runtime.
pub struct StrategyRegistry {
    cost: RwLock<Registry<dyn CostStrategy>>,
    batch: RwLock<Registry<dyn BatchStrategy>>,
    pricing: RwLock<Registry<dyn PricingStrategy>>,
    allocation: RwLock<Registry<dyn AllocationStrategy>>,
    validation: RwLock<Registry<dyn ValidationStrategy>>,
    overrides: RwLock<HashMap<(TenantId, StrategyFamily), String>>,
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl core::fmt::Debug for StrategyRegistry {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("StrategyRegistry").finish_non_exhaustive()
    }
}

impl StrategyRegistry {
    /// Empty registries, no defaults.
    pub fn new() -> Self {
        Self {
            cost: RwLock::new(Registry::new(StrategyFamily::Cost)),
            batch: RwLock::new(Registry::new(StrategyFamily::Batch)),
            pricing: RwLock::new(Registry::new(StrategyFamily::Pricing)),
            allocation: RwLock::new(Registry::new(StrategyFamily::Allocation)),
            validation: RwLock::new(Registry::new(StrategyFamily::Validation)),
            overrides: RwLock::new(HashMap::new()),
        }
    }

    /// Built-in strategies with defaults `moving_average`, `fifo`,
    /// `standard`, `fifo`, `standard` (cost, batch, pricing, allocation,
    /// validation).
    pub fn with_defaults() -> DomainResult<Self> {
        let registry = Self::new();
        registry.install_builtins()?;
        Ok(registry)
    }

    /// Registers every built-in strategy and makes the first of each family
    /// its default. Fails if a built-in name is already registered.
    pub fn install_builtins(&self) -> DomainResult<()> {
        self.register::<dyn CostStrategy>(Arc::new(MovingAverageCost))?;
        self.register::<dyn CostStrategy>(Arc::new(FifoCost))?;
        self.register::<dyn BatchStrategy>(Arc::new(FifoBatchStrategy))?;
        self.register::<dyn BatchStrategy>(Arc::new(FefoBatchStrategy))?;
        self.register::<dyn PricingStrategy>(Arc::new(StandardPricing))?;
        self.register::<dyn PricingStrategy>(Arc::new(TieredPricing::new(Vec::new())))?;
        self.register::<dyn AllocationStrategy>(Arc::new(FifoAllocation))?;
        self.register::<dyn AllocationStrategy>(Arc::new(DueDateAllocation))?;
        self.register::<dyn ValidationStrategy>(Arc::new(StandardValidation))?;
        self.register::<dyn ValidationStrategy>(Arc::new(StrictValidation))?;

        self.set_default::<dyn CostStrategy>(MovingAverageCost::NAME)?;
        self.set_default::<dyn BatchStrategy>(FifoBatchStrategy::NAME)?;
        self.set_default::<dyn PricingStrategy>(StandardPricing::NAME)?;
        self.set_default::<dyn AllocationStrategy>(FifoAllocation::NAME)?;
        self.set_default::<dyn ValidationStrategy>(StandardValidation::NAME)?;
        Ok(())
    }

    pub fn register<S: FamilyRegistry + ?Sized>(&self, strategy: Arc<S>) -> DomainResult<()> {
        let family = S::FAMILY;
        let name = strategy.name().to_string();
        S::slot(self).write().map_err(poisoned)?.register(strategy)?;
        tracing::debug!(family = %family, strategy = %name, "strategy registered");
        Ok(())
    }

    /// Removes a strategy, clearing the family default and any tenant
    /// overrides that pointed at it.
    pub fn unregister<S: FamilyRegistry + ?Sized>(&self, name: &str) -> DomainResult<()> {
        let family = S::FAMILY;
        S::slot(self).write().map_err(poisoned)?.unregister(name)?;
        self.overrides
            .write()
            .map_err(poisoned)?
            .retain(|(_, f), n| !(*f == family && n == name));
        tracing::debug!(family = %family, strategy = %name, "strategy unregistered");
        Ok(())
    }

    pub fn set_default<S: FamilyRegistry + ?Sized>(&self, name: &str) -> DomainResult<()> {
        let family = S::FAMILY;
        S::slot(self).write().map_err(poisoned)?.set_default(name)?;
        tracing::debug!(family = %family, strategy = %name, "default strategy set");
        Ok(())
    }

    pub fn default_name<S: FamilyRegistry + ?Sized>(&self) -> DomainResult<Option<String>> {
        Ok(S::slot(self)
            .read()
            .map_err(poisoned)?
            .default_name()
            .map(str::to_string))
    }

    /// Lookup by name, ignoring tenant overrides.
    pub fn get<S: FamilyRegistry + ?Sized>(&self, name: Option<&str>) -> DomainResult<Arc<S>> {
        S::slot(self).read().map_err(poisoned)?.get(name)
    }

    /// Tenant-aware lookup: explicit name, then tenant override, then default.
    pub fn resolve<S: FamilyRegistry + ?Sized>(
        &self,
        tenant_id: TenantId,
        explicit: Option<&str>,
    ) -> DomainResult<Arc<S>> {
        if let Some(name) = explicit.filter(|n| !n.is_empty()) {
            return self.get::<S>(Some(name));
        }
        let tenant_choice = self
            .overrides
            .read()
            .map_err(poisoned)?
            .get(&(tenant_id, S::FAMILY))
            .cloned();
        self.get::<S>(tenant_choice.as_deref())
    }

    pub fn names<S: FamilyRegistry + ?Sized>(&self) -> DomainResult<Vec<String>> {
        Ok(S::slot(self).read().map_err(poisoned)?.names())
    }

    pub fn is_registered(&self, family: StrategyFamily, name: &str) -> DomainResult<bool> {
        Ok(match family {
            StrategyFamily::Cost => self.cost.read().map_err(poisoned)?.is_registered(name),
            StrategyFamily::Batch => self.batch.read().map_err(poisoned)?.is_registered(name),
            StrategyFamily::Pricing => self.pricing.read().map_err(poisoned)?.is_registered(name),
            StrategyFamily::Allocation => {
                self.allocation.read().map_err(poisoned)?.is_registered(name)
            }
            StrategyFamily::Validation => {
                self.validation.read().map_err(poisoned)?.is_registered(name)
            }
        })
    }

    /// Every registered strategy across all families, ordered by family then name.
    pub fn descriptions(&self) -> DomainResult<Vec<StrategyInfo>> {
        let mut out = Vec::new();
        out.extend(self.cost.read().map_err(poisoned)?.descriptions());
        out.extend(self.pricing.read().map_err(poisoned)?.descriptions());
        out.extend(self.allocation.read().map_err(poisoned)?.descriptions());
        out.extend(self.batch.read().map_err(poisoned)?.descriptions());
        out.extend(self.validation.read().map_err(poisoned)?.descriptions());
        Ok(out)
    }

    pub fn set_tenant_override(
        &self,
        tenant_id: TenantId,
        family: StrategyFamily,
        name: &str,
    ) -> DomainResult<()> {
        if !self.is_registered(family, name)? {
            return Err(DomainError::not_found(format!("{family} strategy '{name}'")));
        }
        self.overrides
            .write()
            .map_err(poisoned)?
            .insert((tenant_id, family), name.to_string());
        tracing::debug!(tenant_id = %tenant_id, family = %family, strategy = %name, "tenant strategy override set");
        Ok(())
    }

    pub fn clear_tenant_override(
        &self,
        tenant_id: TenantId,
        family: StrategyFamily,
    ) -> DomainResult<()> {
        self.overrides
            .write()
            .map_err(poisoned)?
            .remove(&(tenant_id, family));
        Ok(())
    }

    pub fn cost(
        &self,
        tenant_id: TenantId,
        explicit: Option<&str>,
    ) -> DomainResult<Arc<dyn CostStrategy>> {
        self.resolve::<dyn CostStrategy>(tenant_id, explicit)
    }

    pub fn batch(
        &self,
        tenant_id: TenantId,
        explicit: Option<&str>,
    ) -> DomainResult<Arc<dyn BatchStrategy>> {
        self.resolve::<dyn BatchStrategy>(tenant_id, explicit)
    }
}
