use crate::{
    auth::{AccessPolicy, Action, Actor, Resource},
    db::{self, ContentionRetry, DbPool},
    entities::{office_inventory, office_transaction::TransactionType},
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::INVENTORY_ADJUSTMENTS,
    services::{
        audit::{self, NewEntry},
        ledger,
    },
};
use serde::Serialize;
use sea_orm::TransactionTrait;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Clone)]
pub struct AdjustInventoryInput {
    pub office_id: i32,
    pub item_id: i32,
    pub delta: i32,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentResult {
    pub office_id: i32,
    pub item_id: i32,
    pub delta: i32,
    pub new_quantity: i32,
    pub reference_number: String,
}

/// Read access to the ledger and privileged manual corrections.
#[derive(Clone)]
pub struct OfficeInventoryService {
    db: Arc<DbPool>,
    policy: Arc<AccessPolicy>,
    event_sender: Arc<EventSender>,
    retry: ContentionRetry,
}

impl OfficeInventoryService {
    pub fn new(
        db: Arc<DbPool>,
        policy: Arc<AccessPolicy>,
        event_sender: Arc<EventSender>,
        retry: ContentionRetry,
    ) -> Self {
        Self {
            db,
            policy,
            event_sender,
            retry,
        }
    }

    fn require(&self, actor: &Actor, action: Action, office_id: i32) -> Result<(), ServiceError> {
        super::require(&self.policy, actor, Resource::OfficeInventory, action, office_id)
    }

    /// The office a "my office" request refers to.
    pub fn own_office(&self, actor: &Actor) -> Result<i32, ServiceError> {
        actor.office_id.ok_or_else(|| {
            ServiceError::ValidationError("User is not assigned to an office".to_string())
        })
    }

    #[instrument(skip(self, actor))]
    pub async fn by_office(
        &self,
        actor: &Actor,
        office_id: i32,
    ) -> Result<Vec<office_inventory::Model>, ServiceError> {
        self.require(actor, Action::View, office_id)?;
        ledger::list_by_office(&*self.db, office_id).await
    }

    #[instrument(skip(self, actor))]
    pub async fn quantity(
        &self,
        actor: &Actor,
        office_id: i32,
        item_id: i32,
    ) -> Result<i32, ServiceError> {
        self.require(actor, Action::View, office_id)?;
        ledger::get_quantity(&*self.db, office_id, item_id).await
    }

    /// Stock of one item across offices. Scoped actors see only their own
    /// office's entry.
    #[instrument(skip(self, actor))]
    pub async fn by_item(
        &self,
        actor: &Actor,
        item_id: i32,
    ) -> Result<Vec<office_inventory::Model>, ServiceError> {
        let entries = ledger::list_by_item(&*self.db, item_id).await?;
        if self.policy.overrides_scope(actor) {
            return Ok(entries);
        }
        let office_id = actor.office_id.ok_or_else(ServiceError::access_denied)?;
        self.require(actor, Action::View, office_id)?;
        Ok(entries
            .into_iter()
            .filter(|entry| entry.office_id == office_id)
            .collect())
    }

    #[instrument(skip(self, actor, input), fields(user_id = actor.user_id, office_id = input.office_id, item_id = input.item_id))]
    pub async fn adjust(
        &self,
        actor: &Actor,
        input: AdjustInventoryInput,
    ) -> Result<AdjustmentResult, ServiceError> {
        let result = db::retry_on_contention(self.retry, "adjust_inventory", || {
            self.adjust_once(actor, &input)
        })
        .await?;

        INVENTORY_ADJUSTMENTS.inc();
        info!(
            delta = result.delta,
            new_quantity = result.new_quantity,
            reference_number = %result.reference_number,
            "inventory adjusted"
        );
        self.event_sender
            .publish(Event::InventoryAdjusted {
                office_id: result.office_id,
                item_id: result.item_id,
                delta: result.delta,
                new_quantity: result.new_quantity,
                reference_number: result.reference_number.clone(),
            })
            .await;
        Ok(result)
    }

    async fn adjust_once(
        &self,
        actor: &Actor,
        input: &AdjustInventoryInput,
    ) -> Result<AdjustmentResult, ServiceError> {
        self.require(actor, Action::Adjust, input.office_id)?;
        if input.reason.trim().is_empty() {
            return Err(ServiceError::ValidationError(
                "An adjustment needs a reason".to_string(),
            ));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let new_quantity = ledger::adjust(&txn, input.office_id, input.item_id, input.delta).await?;

        // Outgoing corrections name the office as source, incoming as destination.
        let (from, to) = if input.delta < 0 {
            (Some(input.office_id), None)
        } else {
            (None, Some(input.office_id))
        };
        let row = audit::record(
            &txn,
            NewEntry::completed(
                TransactionType::Adjustment,
                input.item_id,
                from,
                to,
                input.delta.saturating_abs(),
                actor.user_id,
                Some(input.reason.trim().to_string()),
            ),
        )
        .await?;
        txn.commit().await.map_err(ServiceError::db_error)?;

        Ok(AdjustmentResult {
            office_id: input.office_id,
            item_id: input.item_id,
            delta: input.delta,
            new_quantity,
            reference_number: row.reference_number,
        })
    }
}
