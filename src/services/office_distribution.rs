use crate::{
    auth::{AccessPolicy, Action, Actor, Resource},
    db::{self, ContentionRetry, DbPool},
    entities::{
        item, office,
        office_transaction::{self, TransactionType},
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::OFFICE_DISTRIBUTIONS,
    services::{
        audit::{self, NewEntry},
        ledger,
    },
};
use sea_orm::{ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, TransactionTrait};
use std::sync::Arc;
use tracing::{info, instrument};

/// One immediate movement along the office tree.
#[derive(Debug, Clone)]
pub struct MovementInput {
    pub item_id: i32,
    pub from_office_id: i32,
    pub to_office_id: i32,
    pub quantity: i32,
    pub remarks: Option<String>,
    pub initiated_by_user_id: i32,
}

/// Paged audit rows plus the total count.
pub type TransactionPage = (Vec<office_transaction::Model>, u64);

/// Pre-approved stock movements between an office and its direct parent or
/// children, and the office-scoped history views over the audit log.
#[derive(Clone)]
pub struct OfficeDistributionService {
    db: Arc<DbPool>,
    policy: Arc<AccessPolicy>,
    event_sender: Arc<EventSender>,
    retry: ContentionRetry,
}

/// Remarks of a return carry the reason after a ` | Reason: ` marker.
pub fn return_remarks(remarks: Option<&str>, reason: Option<&str>) -> Option<String> {
    let remarks = remarks.map(str::trim).filter(|r| !r.is_empty());
    let reason = reason.map(str::trim).filter(|r| !r.is_empty());
    match (remarks, reason) {
        (Some(remarks), Some(reason)) => Some(format!("{} | Reason: {}", remarks, reason)),
        (None, Some(reason)) => Some(format!("Reason: {}", reason)),
        (Some(remarks), None) => Some(remarks.to_string()),
        (None, None) => None,
    }
}

impl OfficeDistributionService {
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
        super::require(
            &self.policy,
            actor,
            Resource::OfficeDistributions,
            action,
            office_id,
        )
    }

    /// Parent office hands stock to one of its direct children.
    #[instrument(skip(self, actor, input), fields(user_id = actor.user_id))]
    pub async fn distribute(
        &self,
        actor: &Actor,
        input: MovementInput,
    ) -> Result<office_transaction::Model, ServiceError> {
        let row = db::retry_on_contention(self.retry, "distribute", || {
            self.move_once(actor, &input, TransactionType::Distribution, input.remarks.clone())
        })
        .await?;

        OFFICE_DISTRIBUTIONS.with_label_values(&["distribution"]).inc();
        info!(reference_number = %row.reference_number, quantity = row.quantity, "stock distributed");
        self.event_sender
            .publish(Event::StockDistributed {
                reference_number: row.reference_number.clone(),
                item_id: input.item_id,
                from_office_id: input.from_office_id,
                to_office_id: input.to_office_id,
                quantity: input.quantity,
            })
            .await;
        Ok(row)
    }

    /// Child office sends stock back to its direct parent.
    #[instrument(skip(self, actor, input, return_reason), fields(user_id = actor.user_id))]
    pub async fn return_to_parent(
        &self,
        actor: &Actor,
        input: MovementInput,
        return_reason: Option<String>,
    ) -> Result<office_transaction::Model, ServiceError> {
        let remarks = return_remarks(input.remarks.as_deref(), return_reason.as_deref());
        let row = db::retry_on_contention(self.retry, "return_to_parent", || {
            self.move_once(actor, &input, TransactionType::Return, remarks.clone())
        })
        .await?;

        OFFICE_DISTRIBUTIONS.with_label_values(&["return"]).inc();
        info!(reference_number = %row.reference_number, quantity = row.quantity, "stock returned");
        self.event_sender
            .publish(Event::StockReturned {
                reference_number: row.reference_number.clone(),
                item_id: input.item_id,
                from_office_id: input.from_office_id,
                to_office_id: input.to_office_id,
                quantity: input.quantity,
            })
            .await;
        Ok(row)
    }

    async fn move_once(
        &self,
        actor: &Actor,
        input: &MovementInput,
        kind: TransactionType,
        remarks: Option<String>,
    ) -> Result<office_transaction::Model, ServiceError> {
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".to_string(),
            ));
        }
        if input.from_office_id == input.to_office_id {
            return Err(ServiceError::ValidationError(
                "Source and destination offices must differ".to_string(),
            ));
        }
        self.require(actor, Action::Create, input.from_office_id)?;
        if input.initiated_by_user_id != actor.user_id && !self.policy.overrides_scope(actor) {
            return Err(ServiceError::access_denied());
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        item::Entity::find_by_id(input.item_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", input.item_id)))?;
        let from = find_office(&txn, input.from_office_id).await?;
        let to = find_office(&txn, input.to_office_id).await?;

        match kind {
            TransactionType::Distribution if !from.is_parent_of(&to) => {
                return Err(ServiceError::ValidationError(format!(
                    "Office {} is not a direct child of office {}",
                    to.id, from.id
                )))
            }
            TransactionType::Return if !to.is_parent_of(&from) => {
                return Err(ServiceError::ValidationError(format!(
                    "Office {} is not the parent of office {}",
                    to.id, from.id
                )))
            }
            _ => {}
        }

        ledger::reserve(&txn, from.id, input.item_id, input.quantity).await?;
        ledger::commit_receive(&txn, to.id, input.item_id, input.quantity).await?;

        let row = audit::record(
            &txn,
            NewEntry::completed(
                kind,
                input.item_id,
                Some(from.id),
                Some(to.id),
                input.quantity,
                input.initiated_by_user_id,
                remarks,
            ),
        )
        .await?;

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(row)
    }

    #[instrument(skip(self, actor))]
    pub async fn transactions(
        &self,
        actor: &Actor,
        office_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<TransactionPage, ServiceError> {
        self.require(actor, Action::View, office_id)?;
        audit::by_office(&*self.db, office_id, page, limit).await
    }

    #[instrument(skip(self, actor))]
    pub async fn pending(
        &self,
        actor: &Actor,
        office_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<TransactionPage, ServiceError> {
        self.require(actor, Action::View, office_id)?;
        audit::pending_by_office(&*self.db, office_id, page, limit).await
    }

    #[instrument(skip(self, actor))]
    pub async fn distribution_history(
        &self,
        actor: &Actor,
        office_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<TransactionPage, ServiceError> {
        self.require(actor, Action::View, office_id)?;
        audit::distribution_history(&*self.db, office_id, page, limit).await
    }

    #[instrument(skip(self, actor))]
    pub async fn return_history(
        &self,
        actor: &Actor,
        office_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<TransactionPage, ServiceError> {
        self.require(actor, Action::View, office_id)?;
        audit::return_history(&*self.db, office_id, page, limit).await
    }

    /// History of an item. Scoped actors only see rows touching their office.
    #[instrument(skip(self, actor))]
    pub async fn item_history(
        &self,
        actor: &Actor,
        item_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<TransactionPage, ServiceError> {
        let office_filter = if self.policy.overrides_scope(actor) {
            None
        } else {
            let office_id = actor.office_id.ok_or_else(ServiceError::access_denied)?;
            self.require(actor, Action::View, office_id)?;
            Some(office_id)
        };
        audit::by_item(&*self.db, item_id, office_filter, page, limit).await
    }

    /// One audit row, if the actor's office is on either side of it.
    #[instrument(skip(self, actor))]
    pub async fn by_reference(
        &self,
        actor: &Actor,
        reference_number: &str,
    ) -> Result<office_transaction::Model, ServiceError> {
        let row = audit::by_reference(&*self.db, reference_number)
            .await?
            .ok_or_else(|| {
                super::missing(
                    &self.policy,
                    actor,
                    format!("Transaction {} not found", reference_number),
                )
            })?;
        let visible = [row.from_office_id, row.to_office_id]
            .into_iter()
            .flatten()
            .any(|office_id| {
                self.policy
                    .permits(actor, Resource::OfficeDistributions, Action::View, office_id)
            });
        if !visible {
            return Err(ServiceError::access_denied());
        }
        Ok(row)
    }

    #[instrument(skip(self, actor))]
    pub async fn children(
        &self,
        actor: &Actor,
        office_id: i32,
    ) -> Result<Vec<office::Model>, ServiceError> {
        self.require(actor, Action::View, office_id)?;
        find_office(&*self.db, office_id).await?;
        office::Entity::find()
            .filter(office::Column::ParentId.eq(office_id))
            .order_by_asc(office::Column::Name)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    #[instrument(skip(self, actor))]
    pub async fn parent(
        &self,
        actor: &Actor,
        office_id: i32,
    ) -> Result<Option<office::Model>, ServiceError> {
        self.require(actor, Action::View, office_id)?;
        let office = find_office(&*self.db, office_id).await?;
        match office.parent_id {
            Some(parent_id) => office::Entity::find_by_id(parent_id)
                .one(&*self.db)
                .await
                .map_err(ServiceError::db_error),
            None => Ok(None),
        }
    }
}

async fn find_office<C: ConnectionTrait>(conn: &C, id: i32) -> Result<office::Model, ServiceError> {
    office::Entity::find_by_id(id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("Office {} not found", id)))
}
