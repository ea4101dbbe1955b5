//! Stock taking: physical count reconciliation.
//!
//! ```text
//! DRAFT --start--> COUNTING --submit--> PENDING_APPROVAL --approve--> APPROVED
//! DRAFT --cancel--> CANCELLED           PENDING_APPROVAL --reject---> REJECTED
//! COUNTING --cancel--> CANCELLED
//! ```
//!
//! Approval is the only transition with inventory side effects: it hands back
//! one adjustment request per item whose count differs from the snapshot.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use stockledger_core::{
    AggregateRoot, DomainError, DomainResult, ProductId, Quantity, TenantId, UserId,
    WarehouseId, checked_total, ensure_cost,
};

use crate::events::StockTakingEvent;
use crate::ids::StockTakingId;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StockTakingStatus {
    Draft,
    Counting,
    PendingApproval,
    Approved,
    Rejected,
    Cancelled,
}

impl StockTakingStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            StockTakingStatus::Draft => "DRAFT",
            StockTakingStatus::Counting => "COUNTING",
            StockTakingStatus::PendingApproval => "PENDING_APPROVAL",
            StockTakingStatus::Approved => "APPROVED",
            StockTakingStatus::Rejected => "REJECTED",
            StockTakingStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn can_transition_to(self, next: StockTakingStatus) -> bool {
        use StockTakingStatus::*;
        matches!(
            (self, next),
            (Draft, Counting)
                | (Draft, Cancelled)
                | (Counting, PendingApproval)
                | (Counting, Cancelled)
                | (PendingApproval, Approved)
                | (PendingApproval, Rejected)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            StockTakingStatus::Approved | StockTakingStatus::Rejected | StockTakingStatus::Cancelled
        )
    }
}

impl core::fmt::Display for StockTakingStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// `PREFIX-YYYYMMDD-NNNN`, sequence per tenant per day.
pub fn format_taking_number(prefix: &str, date: NaiveDate, sequence: u32) -> String {
    format!("{prefix}-{}-{sequence:04}", date.format("%Y%m%d"))
}

/// One product line. `system_quantity` is snapshotted when the line is added.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTakingItem {
    pub product_id: ProductId,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
    pub system_quantity: Quantity,
    pub actual_quantity: Option<Quantity>,
    pub unit_cost: Decimal,
    pub remark: Option<String>,
}

impl StockTakingItem {
    pub fn is_counted(&self) -> bool {
        self.actual_quantity.is_some()
    }

    /// `actual - system`; zero until counted.
    pub fn difference_quantity(&self) -> Decimal {
        self.actual_quantity
            .map(|actual| actual.value() - self.system_quantity.value())
            .unwrap_or(Decimal::ZERO)
    }

    pub fn difference_amount(&self) -> DomainResult<Decimal> {
        self.difference_quantity()
            .checked_mul(self.unit_cost)
            .ok_or_else(|| {
                DomainError::invalid_input(format!(
                    "difference amount for product {} exceeds the decimal range",
                    self.product_id
                ))
            })
    }

    pub fn has_difference(&self) -> bool {
        !self.difference_quantity().is_zero()
    }
}

/// Input for adding a product line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewStockTakingItem {
    pub product_id: ProductId,
    pub product_code: String,
    pub product_name: String,
    pub unit: String,
    pub system_quantity: Decimal,
    pub unit_cost: Decimal,
}

/// Input for recording a count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CountEntry {
    pub product_id: ProductId,
    pub actual_quantity: Decimal,
    pub remark: Option<String>,
}

/// Reconciling adjustment produced by approval.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockAdjustmentRequest {
    pub product_id: ProductId,
    pub system_quantity: Quantity,
    pub actual_quantity: Quantity,
    pub difference: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTakingProgress {
    pub total_items: usize,
    pub counted_items: usize,
    pub difference_items: usize,
    pub total_difference: Decimal,
    pub is_complete: bool,
    /// 0-100, two decimal places.
    pub progress_percent: Decimal,
}

/// Aggregate root: StockTaking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockTaking {
    id: StockTakingId,
    tenant_id: TenantId,
    warehouse_id: WarehouseId,
    taking_number: String,
    status: StockTakingStatus,
    taking_date: NaiveDate,
    items: Vec<StockTakingItem>,
    created_by: UserId,
    approved_by: Option<UserId>,
    approval_note: Option<String>,
    rejection_reason: Option<String>,
    remark: Option<String>,
    started_at: Option<DateTime<Utc>>,
    completed_at: Option<DateTime<Utc>>,
    approved_at: Option<DateTime<Utc>>,
    version: u64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl AggregateRoot for StockTaking {
    type Id = StockTakingId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}

impl StockTaking {
    /// New taking in DRAFT with no lines.
    #[allow(clippy::too_many_arguments)]
    pub fn create(
        id: StockTakingId,
        tenant_id: TenantId,
        warehouse_id: WarehouseId,
        taking_number: impl Into<String>,
        taking_date: NaiveDate,
        created_by: UserId,
        remark: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<(Self, StockTakingEvent)> {
        let taking_number = taking_number.into();
        if taking_number.trim().is_empty() {
            return Err(DomainError::invalid_input("taking number cannot be empty"));
        }
        if created_by.is_nil() {
            return Err(DomainError::invalid_input("creator cannot be empty"));
        }
        let taking = Self {
            id,
            tenant_id,
            warehouse_id,
            taking_number: taking_number.clone(),
            status: StockTakingStatus::Draft,
            taking_date,
            items: Vec::new(),
            created_by,
            approved_by: None,
            approval_note: None,
            rejection_reason: None,
            remark,
            started_at: None,
            completed_at: None,
            approved_at: None,
            version: 1,
            created_at: at,
            updated_at: at,
        };
        let event = StockTakingEvent::Created {
            tenant_id,
            taking_id: id,
            taking_number,
            warehouse_id,
            created_by,
            occurred_at: at,
        };
        Ok((taking, event))
    }

    pub fn id_typed(&self) -> StockTakingId {
        self.id
    }

    pub fn tenant_id(&self) -> TenantId {
        self.tenant_id
    }

    pub fn warehouse_id(&self) -> WarehouseId {
        self.warehouse_id
    }

    pub fn taking_number(&self) -> &str {
        &self.taking_number
    }

    pub fn status(&self) -> StockTakingStatus {
        self.status
    }

    pub fn taking_date(&self) -> NaiveDate {
        self.taking_date
    }

    pub fn items(&self) -> &[StockTakingItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&StockTakingItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn created_by(&self) -> UserId {
        self.created_by
    }

    pub fn approved_by(&self) -> Option<UserId> {
        self.approved_by
    }

    pub fn approval_note(&self) -> Option<&str> {
        self.approval_note.as_deref()
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        self.rejection_reason.as_deref()
    }

    pub fn remark(&self) -> Option<&str> {
        self.remark.as_deref()
    }

    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn approved_at(&self) -> Option<DateTime<Utc>> {
        self.approved_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn progress(&self) -> DomainResult<StockTakingProgress> {
        let total_items = self.items.len();
        let counted_items = self.items.iter().filter(|i| i.is_counted()).count();
        let differing = self.items.iter().filter(|i| i.has_difference());
        let difference_items = differing.clone().count();
        let amounts = differing
            .map(StockTakingItem::difference_amount)
            .collect::<DomainResult<Vec<_>>>()?;
        let total_difference = checked_total(amounts)?;
        let progress_percent = if total_items == 0 {
            Decimal::ZERO
        } else {
            (Decimal::from(counted_items) * Decimal::ONE_HUNDRED / Decimal::from(total_items))
                .round_dp(2)
        };
        Ok(StockTakingProgress {
            total_items,
            counted_items,
            difference_items,
            total_difference,
            is_complete: total_items > 0 && counted_items == total_items,
            progress_percent,
        })
    }

    pub fn items_with_difference(&self) -> Vec<&StockTakingItem> {
        self.items.iter().filter(|i| i.has_difference()).collect()
    }

    pub fn uncounted_items(&self) -> Vec<&StockTakingItem> {
        self.items.iter().filter(|i| !i.is_counted()).collect()
    }
}

impl StockTaking {
    fn touch(&mut self, at: DateTime<Utc>) {
        self.version += 1;
        self.updated_at = at;
    }

    fn ensure_status(&self, expected: StockTakingStatus, action: &str) -> DomainResult<()> {
        if self.status != expected {
            return Err(DomainError::invalid_state(format!(
                "can only {action} in {expected} status (stock taking {} is {})",
                self.taking_number, self.status
            )));
        }
        Ok(())
    }

    fn transition(&mut self, next: StockTakingStatus, at: DateTime<Utc>) -> DomainResult<()> {
        if !self.status.can_transition_to(next) {
            return Err(DomainError::invalid_state(format!(
                "cannot transition stock taking {} from {} to {}",
                self.taking_number, self.status, next
            )));
        }
        self.status = next;
        self.touch(at);
        Ok(())
    }

    pub fn add_item(&mut self, item: NewStockTakingItem, at: DateTime<Utc>) -> DomainResult<()> {
        self.add_items(vec![item], at)
    }

    /// All-or-nothing: one bad line rejects the whole batch.
    pub fn add_items(&mut self, items: Vec<NewStockTakingItem>, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_status(StockTakingStatus::Draft, "add items")?;
        let mut accepted: Vec<StockTakingItem> = Vec::with_capacity(items.len());
        for new in items {
            let duplicate = self.item(new.product_id).is_some()
                || accepted.iter().any(|i| i.product_id == new.product_id);
            if duplicate {
                return Err(DomainError::invalid_input(format!(
                    "product {} already in stock taking",
                    new.product_id
                )));
            }
            accepted.push(StockTakingItem {
                product_id: new.product_id,
                product_code: new.product_code,
                product_name: new.product_name,
                unit: new.unit,
                system_quantity: Quantity::new(new.system_quantity)?,
                actual_quantity: None,
                unit_cost: ensure_cost(new.unit_cost)?,
                remark: None,
            });
        }
        if accepted.is_empty() {
            return Ok(());
        }
        self.items.extend(accepted);
        self.touch(at);
        Ok(())
    }

    pub fn remove_item(&mut self, product_id: ProductId, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_status(StockTakingStatus::Draft, "remove items")?;
        let index = self
            .items
            .iter()
            .position(|i| i.product_id == product_id)
            .ok_or_else(|| DomainError::not_found(format!("product {product_id} in stock taking")))?;
        self.items.remove(index);
        self.touch(at);
        Ok(())
    }

    pub fn start_counting(&mut self, at: DateTime<Utc>) -> DomainResult<StockTakingEvent> {
        if self.status == StockTakingStatus::Draft && self.items.is_empty() {
            return Err(DomainError::invalid_state(
                "cannot start counting a stock taking with no items",
            ));
        }
        self.transition(StockTakingStatus::Counting, at)?;
        self.started_at = Some(at);
        Ok(StockTakingEvent::CountingStarted {
            tenant_id: self.tenant_id,
            taking_id: self.id,
            total_items: self.items.len(),
            occurred_at: at,
        })
    }

    pub fn record_count(&mut self, entry: CountEntry, at: DateTime<Utc>) -> DomainResult<()> {
        self.record_counts(vec![entry], at)
    }

    /// All-or-nothing, like [`StockTaking::add_items`]. Recounting a line
    /// overwrites the previous count.
    pub fn record_counts(&mut self, entries: Vec<CountEntry>, at: DateTime<Utc>) -> DomainResult<()> {
        self.ensure_status(StockTakingStatus::Counting, "record counts")?;
        let mut updates = Vec::with_capacity(entries.len());
        for entry in entries {
            let index = self
                .items
                .iter()
                .position(|i| i.product_id == entry.product_id)
                .ok_or_else(|| {
                    DomainError::not_found(format!("product {} in stock taking", entry.product_id))
                })?;
            let actual = Quantity::new(entry.actual_quantity)?;
            updates.push((index, actual, entry.remark));
        }
        if updates.is_empty() {
            return Ok(());
        }
        for (index, actual, remark) in updates {
            let line = &mut self.items[index];
            line.actual_quantity = Some(actual);
            line.remark = remark;
        }
        self.touch(at);
        Ok(())
    }

    pub fn submit_for_approval(&mut self, at: DateTime<Utc>) -> DomainResult<StockTakingEvent> {
        let progress = self.progress()?;
        if self.status == StockTakingStatus::Counting && !progress.is_complete {
            return Err(DomainError::invalid_state(format!(
                "not all items have been counted ({}/{})",
                progress.counted_items, progress.total_items
            )));
        }
        self.transition(StockTakingStatus::PendingApproval, at)?;
        self.completed_at = Some(at);
        Ok(StockTakingEvent::SubmittedForApproval {
            tenant_id: self.tenant_id,
            taking_id: self.id,
            difference_items: progress.difference_items,
            total_difference: progress.total_difference,
            occurred_at: at,
        })
    }

    /// Approve and return the adjustments to apply, one per differing line.
    pub fn approve(
        &mut self,
        approved_by: UserId,
        note: Option<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<(Vec<StockAdjustmentRequest>, StockTakingEvent)> {
        if approved_by.is_nil() {
            return Err(DomainError::invalid_input("approver cannot be empty"));
        }
        self.transition(StockTakingStatus::Approved, at)?;
        self.approved_by = Some(approved_by);
        self.approval_note = note;
        self.approved_at = Some(at);

        let adjustments: Vec<_> = self
            .items
            .iter()
            .filter_map(|line| {
                let actual = line.actual_quantity?;
                line.has_difference().then(|| StockAdjustmentRequest {
                    product_id: line.product_id,
                    system_quantity: line.system_quantity,
                    actual_quantity: actual,
                    difference: line.difference_quantity(),
                })
            })
            .collect();

        let event = StockTakingEvent::Approved {
            tenant_id: self.tenant_id,
            taking_id: self.id,
            approved_by,
            adjusted_items: adjustments.len(),
            occurred_at: at,
        };
        Ok((adjustments, event))
    }

    pub fn reject(
        &mut self,
        rejected_by: UserId,
        reason: impl Into<String>,
        at: DateTime<Utc>,
    ) -> DomainResult<StockTakingEvent> {
        let reason = reason.into();
        if reason.trim().is_empty() {
            return Err(DomainError::invalid_input("rejection reason is required"));
        }
        if rejected_by.is_nil() {
            return Err(DomainError::invalid_input("approver cannot be empty"));
        }
        self.transition(StockTakingStatus::Rejected, at)?;
        self.approved_by = Some(rejected_by);
        self.rejection_reason = Some(reason.clone());
        self.approved_at = Some(at);
        Ok(StockTakingEvent::Rejected {
            tenant_id: self.tenant_id,
            taking_id: self.id,
            rejected_by,
            reason,
            occurred_at: at,
        })
    }

    pub fn cancel(&mut self, reason: Option<String>, at: DateTime<Utc>) -> DomainResult<StockTakingEvent> {
        self.transition(StockTakingStatus::Cancelled, at)?;
        if let Some(reason) = reason.as_ref().filter(|r| !r.trim().is_empty()) {
            self.remark = Some(reason.clone());
        }
        Ok(StockTakingEvent::Cancelled {
            tenant_id: self.tenant_id,
            taking_id: self.id,
            reason,
            occurred_at: at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap()
    }

    fn draft() -> StockTaking {
        let (taking, _) = StockTaking::create(
            StockTakingId::generate(),
            TenantId::new(),
            WarehouseId::new(),
            "ST-20240601-0001",
            t0().date_naive(),
            UserId::new(),
            None,
            t0(),
        )
        .unwrap();
        taking
    }

    fn line(product_id: ProductId, system: Decimal) -> NewStockTakingItem {
        NewStockTakingItem {
            product_id,
            product_code: "P-1".to_string(),
            product_name: "Widget".to_string(),
            unit: "pcs".to_string(),
            system_quantity: system,
            unit_cost: dec!(10),
        }
    }

    fn count(product_id: ProductId, actual: Decimal) -> CountEntry {
        CountEntry {
            product_id,
            actual_quantity: actual,
            remark: None,
        }
    }

    fn counting_with(lines: &[(ProductId, Decimal)]) -> StockTaking {
        let mut taking = draft();
        taking
            .add_items(lines.iter().map(|(p, q)| line(*p, *q)).collect(), t0())
            .unwrap();
        taking.start_counting(t0()).unwrap();
        taking
    }

    #[test]
    fn taking_number_format() {
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();
        assert_eq!(format_taking_number("ST", date, 7), "ST-20240601-0007");
    }

    #[test]
    fn transition_table() {
        use StockTakingStatus::*;
        assert!(Draft.can_transition_to(Counting));
        assert!(Counting.can_transition_to(Cancelled));
        assert!(!Draft.can_transition_to(PendingApproval));
        assert!(!PendingApproval.can_transition_to(Cancelled));
        assert!(!Approved.can_transition_to(Approved));
        assert!(Rejected.is_terminal());
    }

    #[test]
    fn duplicate_product_is_rejected_atomically() {
        let mut taking = draft();
        let p = ProductId::new();
        let err = taking
            .add_items(vec![line(p, dec!(5)), line(ProductId::new(), dec!(1)), line(p, dec!(2))], t0())
            .unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
        assert!(taking.items().is_empty());
    }

    #[test]
    fn items_only_change_in_draft() {
        let p = ProductId::new();
        let mut taking = counting_with(&[(p, dec!(5))]);
        let err = taking.add_item(line(ProductId::new(), dec!(1)), t0()).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
        assert_eq!(taking.remove_item(p, t0()).unwrap_err().code(), "INVALID_STATE");
    }

    #[test]
    fn remove_missing_item_is_not_found() {
        let mut taking = draft();
        assert_eq!(
            taking.remove_item(ProductId::new(), t0()).unwrap_err().code(),
            "NOT_FOUND"
        );
    }

    #[test]
    fn start_counting_requires_items() {
        let mut taking = draft();
        assert_eq!(taking.start_counting(t0()).unwrap_err().code(), "INVALID_STATE");
    }

    #[test]
    fn counts_only_in_counting() {
        let p = ProductId::new();
        let mut taking = draft();
        taking.add_item(line(p, dec!(5)), t0()).unwrap();
        assert_eq!(
            taking.record_count(count(p, dec!(5)), t0()).unwrap_err().code(),
            "INVALID_STATE"
        );
    }

    #[test]
    fn count_for_unknown_product_is_not_found() {
        let mut taking = counting_with(&[(ProductId::new(), dec!(5))]);
        let err = taking.record_count(count(ProductId::new(), dec!(1)), t0()).unwrap_err();
        assert_eq!(err.code(), "NOT_FOUND");
    }

    #[test]
    fn negative_count_is_invalid_input() {
        let p = ProductId::new();
        let mut taking = counting_with(&[(p, dec!(5))]);
        let err = taking.record_count(count(p, dec!(-1)), t0()).unwrap_err();
        assert_eq!(err.code(), "INVALID_INPUT");
    }

    #[test]
    fn progress_tracks_counts_and_differences() {
        let (a, b, c) = (ProductId::new(), ProductId::new(), ProductId::new());
        let mut taking = counting_with(&[(a, dec!(70)), (b, dec!(10)), (c, dec!(3))]);
        taking
            .record_counts(vec![count(a, dec!(65)), count(b, dec!(10))], t0())
            .unwrap();

        let progress = taking.progress().unwrap();
        assert_eq!(progress.counted_items, 2);
        assert_eq!(progress.difference_items, 1);
        assert_eq!(progress.total_difference, dec!(-50));
        assert_eq!(progress.progress_percent, dec!(66.67));
        assert!(!progress.is_complete);
        assert_eq!(taking.uncounted_items().len(), 1);
        assert_eq!(taking.items_with_difference()[0].product_id, a);
    }

    #[test]
    fn difference_value_out_of_range_is_an_error() {
        let p = ProductId::new();
        let mut taking = draft();
        let mut costly = line(p, dec!(0));
        costly.unit_cost = dec!(10000000000);
        taking.add_item(costly, t0()).unwrap();
        taking.start_counting(t0()).unwrap();
        taking.record_count(count(p, dec!(100000000000000000000)), t0()).unwrap();

        assert_eq!(taking.items()[0].difference_amount().unwrap_err().code(), "INVALID_INPUT");
        assert!(taking.progress().is_err());
        let before = taking.clone();
        assert!(taking.submit_for_approval(t0()).is_err());
        assert_eq!(taking, before);
    }

    #[test]
    fn submit_requires_every_item_counted() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let mut taking = counting_with(&[(a, dec!(1)), (b, dec!(1))]);
        taking.record_count(count(a, dec!(1)), t0()).unwrap();
        assert_eq!(taking.submit_for_approval(t0()).unwrap_err().code(), "INVALID_STATE");

        taking.record_count(count(b, dec!(1)), t0()).unwrap();
        taking.submit_for_approval(t0()).unwrap();
        assert_eq!(taking.status(), StockTakingStatus::PendingApproval);
        assert!(taking.completed_at().is_some());
    }

    #[test]
    fn approve_yields_adjustments_only_for_differences() {
        let (a, b) = (ProductId::new(), ProductId::new());
        let mut taking = counting_with(&[(a, dec!(70)), (b, dec!(10))]);
        taking
            .record_counts(vec![count(a, dec!(65)), count(b, dec!(10))], t0())
            .unwrap();
        taking.submit_for_approval(t0()).unwrap();

        let approver = UserId::new();
        let (adjustments, event) = taking.approve(approver, Some("ok".to_string()), t0()).unwrap();

        assert_eq!(adjustments.len(), 1);
        assert_eq!(adjustments[0].product_id, a);
        assert_eq!(adjustments[0].difference, dec!(-5));
        assert!(matches!(event, StockTakingEvent::Approved { adjusted_items: 1, .. }));
        assert_eq!(taking.approved_by(), Some(approver));

        let err = taking.approve(approver, None, t0()).unwrap_err();
        assert_eq!(err.code(), "INVALID_STATE");
    }

    #[test]
    fn reject_requires_reason() {
        let p = ProductId::new();
        let mut taking = counting_with(&[(p, dec!(1))]);
        taking.record_count(count(p, dec!(2)), t0()).unwrap();
        taking.submit_for_approval(t0()).unwrap();

        assert_eq!(
            taking.reject(UserId::new(), "  ", t0()).unwrap_err().code(),
            "INVALID_INPUT"
        );
        taking.reject(UserId::new(), "recount aisle 4", t0()).unwrap();
        assert_eq!(taking.status(), StockTakingStatus::Rejected);
        assert_eq!(taking.rejection_reason(), Some("recount aisle 4"));
    }

    #[test]
    fn cancel_from_draft_or_counting_only() {
        let mut taking = draft();
        taking.cancel(Some("duplicate".to_string()), t0()).unwrap();
        assert_eq!(taking.status(), StockTakingStatus::Cancelled);
        assert_eq!(taking.remark(), Some("duplicate"));

        let p = ProductId::new();
        let mut pending = counting_with(&[(p, dec!(1))]);
        pending.record_count(count(p, dec!(1)), t0()).unwrap();
        pending.submit_for_approval(t0()).unwrap();
        assert_eq!(pending.cancel(None, t0()).unwrap_err().code(), "INVALID_STATE");
    }
}
