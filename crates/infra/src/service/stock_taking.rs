use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tracing::{debug, info, info_span};

use stockledger_core::{
    AggregateRoot, DomainError, DomainResult, ProductId, TenantId, UserId, WarehouseId,
};
use stockledger_events::{EventBus, EventEnvelope};
use stockledger_inventory::{
    AdjustStock, CountEntry, InventoryEvent, InventoryItem, NewStockTakingItem, SourceRef,
    StockTaking, StockTakingEvent, StockTakingId, StockTakingItem, StockTakingProgress,
    StockTakingStatus, format_taking_number,
};

use super::{ITEM_AGGREGATE, STOCK_TAKING_AGGREGATE, ServiceResult, publish};
use crate::config::EngineConfig;
use crate::store::{InventoryStore, UnitOfWork};

/// Source type recorded on ledger entries produced by an approved count.
pub const STOCK_TAKING_SOURCE: &str = "stock_taking";

/// Input for creating a stock taking. The number is assigned by the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateStockTaking {
    pub tenant_id: TenantId,
    pub warehouse_id: WarehouseId,
    pub taking_date: NaiveDate,
    pub created_by: UserId,
    pub remark: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Product to put on a count sheet. Quantity and cost are snapshotted from
/// the live inventory item when the line is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTakingProduct {
    pub product_id: ProductId,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
}

/// Physical count reconciliation.
///
/// Approval is the only operation that touches live inventory: it writes
/// every adjustment and the APPROVED taking in a single unit of work.
pub struct StockTakingService<S, B> {
    store: S,
    bus: B,
    config: EngineConfig,
}

impl<S, B> StockTakingService<S, B> {
    pub fn new(store: S, bus: B, config: EngineConfig) -> Self {
        Self { store, bus, config }
    }
}

impl<S, B> StockTakingService<S, B>
where
    S: InventoryStore,
    B: EventBus<EventEnvelope<JsonValue>>,
{
    fn load(&self, tenant_id: TenantId, taking_id: StockTakingId) -> ServiceResult<StockTaking> {
        self.store
            .stock_taking(tenant_id, taking_id)?
            .ok_or_else(|| DomainError::not_found(format!("stock taking {taking_id}")).into())
    }

    fn publish_taking(&self, taking: &StockTaking, events: Vec<StockTakingEvent>) {
        publish(
            &self.bus,
            taking.tenant_id(),
            taking.id_typed().as_aggregate_id(),
            STOCK_TAKING_AGGREGATE,
            taking.version(),
            events,
        );
    }

    /// Load, apply `decide`, commit against the loaded version, publish.
    fn mutate(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        decide: impl FnOnce(&mut StockTaking) -> DomainResult<Option<StockTakingEvent>>,
    ) -> ServiceResult<StockTaking> {
        let mut taking = self.load(tenant_id, taking_id)?;
        let loaded = taking.version();
        let event = decide(&mut taking)?;
        if taking.version() == loaded {
            return Ok(taking);
        }

        let mut work = UnitOfWork::new();
        work.put_stock_taking(taking.clone(), loaded);
        self.store.commit(work)?;

        debug!(
            taking_number = taking.taking_number(),
            status = %taking.status(),
            version = taking.version(),
            "stock taking committed"
        );
        self.publish_taking(&taking, event.into_iter().collect());
        Ok(taking)
    }

    /// Create a DRAFT taking numbered `PREFIX-YYYYMMDD-NNNN`.
    pub fn create(&self, cmd: &CreateStockTaking) -> ServiceResult<StockTaking> {
        let span = info_span!(
            "stock_taking.create",
            tenant_id = %cmd.tenant_id,
            warehouse_id = %cmd.warehouse_id
        );
        let _guard = span.enter();

        let sequence = self.store.next_taking_sequence(cmd.tenant_id, cmd.taking_date)?;
        let number =
            format_taking_number(&self.config.taking_number_prefix, cmd.taking_date, sequence);
        let (taking, event) = StockTaking::create(
            StockTakingId::generate(),
            cmd.tenant_id,
            cmd.warehouse_id,
            number,
            cmd.taking_date,
            cmd.created_by,
            cmd.remark.clone(),
            cmd.occurred_at,
        )?;

        let mut work = UnitOfWork::new();
        work.put_stock_taking(taking.clone(), 0);
        self.store.commit(work)?;

        info!(taking_number = taking.taking_number(), "stock taking created");
        self.publish_taking(&taking, vec![event]);
        Ok(taking)
    }

    /// Add count lines, snapshotting each product's current total quantity
    /// and unit cost in the taking's warehouse (zero when never stocked).
    pub fn add_items(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        products: Vec<StockTakingProduct>,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        let taking = self.load(tenant_id, taking_id)?;
        let mut lines = Vec::with_capacity(products.len());
        for product in products {
            let snapshot =
                self.store
                    .item(tenant_id, taking.warehouse_id(), product.product_id)?;
            let (system_quantity, unit_cost) = snapshot
                .map(|item| (item.total_quantity().value(), item.unit_cost()))
                .unwrap_or_default();
            lines.push(NewStockTakingItem {
                product_id: product.product_id,
                product_code: product.product_code,
                product_name: product.product_name,
                unit: product.unit,
                system_quantity,
                unit_cost,
            });
        }
        self.mutate(tenant_id, taking_id, |t| {
            t.add_items(lines, at)?;
            Ok(None)
        })
    }

    pub fn add_item(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        product: StockTakingProduct,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        self.add_items(tenant_id, taking_id, vec![product], at)
    }

    pub fn remove_item(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        product_id: ProductId,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        self.mutate(tenant_id, taking_id, |t| {
            t.remove_item(product_id, at)?;
            Ok(None)
        })
    }

    pub fn start_counting(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        self.mutate(tenant_id, taking_id, |t| t.start_counting(at).map(Some))
    }

    pub fn record_counts(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        entries: Vec<CountEntry>,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        self.mutate(tenant_id, taking_id, |t| {
            t.record_counts(entries, at)?;
            Ok(None)
        })
    }

    pub fn record_count(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        entry: CountEntry,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        self.record_counts(tenant_id, taking_id, vec![entry], at)
    }

    pub fn submit_for_approval(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        self.mutate(tenant_id, taking_id, |t| t.submit_for_approval(at).map(Some))
    }

    /// Approve and reconcile. Each differing line adjusts its item's total to
    /// the counted quantity. All adjustments and the status change commit
    /// together; if any adjustment is refused nothing is written and the
    /// taking stays PENDING_APPROVAL.
    pub fn approve(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        approved_by: UserId,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        let span = info_span!(
            "stock_taking.approve",
            tenant_id = %tenant_id,
            taking_id = %taking_id
        );
        let _guard = span.enter();

        let mut taking = self.load(tenant_id, taking_id)?;
        let loaded = taking.version();
        let (adjustments, approved) = taking.approve(approved_by, note, at)?;

        let source = SourceRef::new(STOCK_TAKING_SOURCE, taking.taking_number())?;
        let reason = format!("stock taking {}", taking.taking_number());
        let warehouse_id = taking.warehouse_id();

        let mut work = UnitOfWork::new();
        let mut item_events: Vec<(InventoryItem, Vec<InventoryEvent>)> = Vec::new();
        for adjustment in &adjustments {
            let mut item = self
                .store
                .item(tenant_id, warehouse_id, adjustment.product_id)?
                .unwrap_or_else(|| {
                    InventoryItem::open(tenant_id, warehouse_id, adjustment.product_id, at)
                });
            let item_loaded = item.version();
            let cmd = AdjustStock {
                tenant_id,
                warehouse_id,
                product_id: adjustment.product_id,
                actual_quantity: adjustment.actual_quantity.value(),
                reason: reason.clone(),
                source: source.clone(),
                occurred_at: at,
            };
            if let Some(change) = item.adjust_stock(&cmd)? {
                work.put_item(item.clone(), item_loaded)
                    .append(change.transaction);
                item_events.push((item, change.events));
            }
        }
        work.put_stock_taking(taking.clone(), loaded);
        self.store.commit(work)?;

        info!(
            taking_number = taking.taking_number(),
            adjusted_items = item_events.len(),
            "stock taking approved"
        );
        for (item, events) in item_events {
            publish(
                &self.bus,
                tenant_id,
                item.id_typed().as_aggregate_id(),
                ITEM_AGGREGATE,
                item.version(),
                events,
            );
        }
        self.publish_taking(&taking, vec![approved]);
        Ok(taking)
    }

    pub fn reject(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        rejected_by: UserId,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        self.mutate(tenant_id, taking_id, |t| {
            t.reject(rejected_by, reason, at).map(Some)
        })
    }

    pub fn cancel(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
        reason: Option<String>,
        at: DateTime<Utc>,
    ) -> ServiceResult<StockTaking> {
        self.mutate(tenant_id, taking_id, |t| t.cancel(reason, at).map(Some))
    }

    pub fn get(&self, tenant_id: TenantId, taking_id: StockTakingId) -> ServiceResult<StockTaking> {
        self.load(tenant_id, taking_id)
    }

    pub fn get_by_number(
        &self,
        tenant_id: TenantId,
        taking_number: &str,
    ) -> ServiceResult<StockTaking> {
        self.store
            .stock_taking_by_number(tenant_id, taking_number)?
            .ok_or_else(|| DomainError::not_found(format!("stock taking {taking_number}")).into())
    }

    pub fn list(
        &self,
        tenant_id: TenantId,
        status: Option<StockTakingStatus>,
        warehouse_id: Option<WarehouseId>,
    ) -> ServiceResult<Vec<StockTaking>> {
        Ok(self.store.stock_takings(tenant_id, status, warehouse_id)?)
    }

    pub fn progress(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
    ) -> ServiceResult<StockTakingProgress> {
        Ok(self.load(tenant_id, taking_id)?.progress()?)
    }

    pub fn items_with_difference(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
    ) -> ServiceResult<Vec<StockTakingItem>> {
        let taking = self.load(tenant_id, taking_id)?;
        Ok(taking.items_with_difference().into_iter().cloned().collect())
    }

    pub fn uncounted_items(
        &self,
        tenant_id: TenantId,
        taking_id: StockTakingId,
    ) -> ServiceResult<Vec<StockTakingItem>> {
        let taking = self.load(tenant_id, taking_id)?;
        Ok(taking.uncounted_items().into_iter().cloned().collect())
    }
}
