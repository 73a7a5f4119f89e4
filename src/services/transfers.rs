use crate::{
    auth::{AccessPolicy, Action, Actor, Resource},
    db::{self, ContentionRetry, DbPool},
    entities::{
        item, office,
        item_instance::{self, InstanceStatus},
        office_transaction::{TransactionStatus, TransactionType},
        transfer::{self, Entity as Transfer, TransferAction, TransferStatus, TransferType},
        transfer_instance,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::{TRANSFERS_CREATED, TRANSFER_TRANSITIONS},
    services::{
        audit::{self, NewEntry},
        item_instances,
        ledger::{self, ReservationToken},
    },
};
use chrono::{DateTime, NaiveDate, Utc};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;

const RECENT_LIMIT: u64 = 10;

#[derive(Debug, Clone)]
pub struct CreateTransferInput {
    pub item_id: i32,
    pub from_office_id: i32,
    pub to_office_id: i32,
    pub quantity: i32,
    /// Who the request is filed for. Only global roles may file for others.
    pub initiated_by_user_id: Option<i32>,
    pub transfer_type: TransferType,
    pub remarks: Option<String>,
    pub date_distributed: Option<DateTime<Utc>>,
    pub instance_ids: Vec<i32>,
}

/// Fields a PENDING transfer may still change.
#[derive(Debug, Clone, Default)]
pub struct EditTransferInput {
    pub quantity: Option<i32>,
    pub date_distributed: Option<DateTime<Utc>>,
    /// `None` keeps the current remarks. A blank string clears them.
    pub remarks: Option<String>,
}

/// Which side of a transfer the caller's office is on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Incoming,
    Outgoing,
    #[default]
    All,
}

#[derive(Debug, Clone)]
pub struct TransferFilter {
    pub direction: Direction,
    pub status: Option<TransferStatus>,
    pub page: u64,
    pub limit: u64,
}

/// The transfer workflow: reservation on create, credit on approval, release
/// on reject/cancel/delete. Every operation is one database transaction.
#[derive(Clone)]
pub struct TransferService {
    db: Arc<DbPool>,
    policy: Arc<AccessPolicy>,
    event_sender: Arc<EventSender>,
    retry: ContentionRetry,
}

impl TransferService {
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

    fn require(
        &self,
        actor: &Actor,
        action: Action,
        office_id: i32,
    ) -> Result<(), ServiceError> {
        super::require(&self.policy, actor, Resource::Transfers, action, office_id)
    }

    fn can_view(&self, actor: &Actor, transfer: &transfer::Model) -> bool {
        self.policy
            .permits(actor, Resource::Transfers, Action::View, transfer.from_office_id)
            || self
                .policy
                .permits(actor, Resource::Transfers, Action::View, transfer.to_office_id)
    }

    async fn load<C: ConnectionTrait>(
        &self,
        conn: &C,
        actor: &Actor,
        id: i32,
    ) -> Result<transfer::Model, ServiceError> {
        Transfer::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| super::missing(&self.policy, actor, format!("Transfer {} not found", id)))
    }

    /// Files a PENDING transfer and reserves its stock at the source office.
    #[instrument(skip(self, actor, input), fields(user_id = actor.user_id))]
    pub async fn create(
        &self,
        actor: &Actor,
        input: CreateTransferInput,
    ) -> Result<transfer::Model, ServiceError> {
        let created = db::retry_on_contention(self.retry, "create_transfer", || {
            self.create_once(actor, &input)
        })
        .await?;

        TRANSFERS_CREATED.inc();
        info!(
            transfer_id = created.id,
            reference_number = %created.reference_number,
            quantity = created.quantity,
            "transfer created"
        );
        self.event_sender
            .publish(Event::TransferCreated {
                transfer_id: created.id,
                reference_number: created.reference_number.clone(),
                item_id: created.item_id,
                from_office_id: created.from_office_id,
                to_office_id: created.to_office_id,
                quantity: created.quantity,
            })
            .await;
        Ok(created)
    }

    async fn create_once(
        &self,
        actor: &Actor,
        input: &CreateTransferInput,
    ) -> Result<transfer::Model, ServiceError> {
        if input.from_office_id == input.to_office_id {
            return Err(ServiceError::ValidationError(
                "Source and destination offices must differ".to_string(),
            ));
        }
        if input.quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".to_string(),
            ));
        }
        self.require(actor, Action::Create, input.from_office_id)?;
        let initiated_by = match input.initiated_by_user_id {
            Some(user_id) if user_id != actor.user_id && !self.policy.overrides_scope(actor) => {
                return Err(ServiceError::access_denied())
            }
            Some(user_id) => user_id,
            None => actor.user_id,
        };

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        item::Entity::find_by_id(input.item_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", input.item_id)))?;
        for office_id in [input.from_office_id, input.to_office_id] {
            office::Entity::find_by_id(office_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::NotFound(format!("Office {} not found", office_id)))?;
        }

        let instance_ids = self.check_instances(&txn, input).await?;

        ledger::reserve(&txn, input.from_office_id, input.item_id, input.quantity).await?;

        let audit_type = audit_type_for(input.transfer_type);
        let reference_number = super::reference_number(audit_type.reference_prefix());
        let now = Utc::now();

        let created = transfer::ActiveModel {
            item_id: Set(input.item_id),
            from_office_id: Set(input.from_office_id),
            to_office_id: Set(input.to_office_id),
            quantity: Set(input.quantity),
            initiated_by_user_id: Set(initiated_by),
            status: Set(TransferStatus::Pending),
            transfer_type: Set(input.transfer_type),
            date_distributed: Set(input.date_distributed.unwrap_or(now)),
            remarks: Set(input.remarks.clone()),
            reference_number: Set(reference_number.clone()),
            approved_by: Set(None),
            approved_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        audit::record(
            &txn,
            NewEntry {
                reference_number,
                transaction_type: audit_type,
                item_id: input.item_id,
                from_office_id: Some(input.from_office_id),
                to_office_id: Some(input.to_office_id),
                quantity: input.quantity,
                status: TransactionStatus::Pending,
                initiated_by,
                approved_by: None,
                remarks: input.remarks.clone(),
                transfer_id: Some(created.id),
            },
        )
        .await?;

        for instance_id in instance_ids {
            transfer_instance::ActiveModel {
                transfer_id: Set(created.id),
                instance_id: Set(instance_id),
                ..Default::default()
            }
            .insert(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(created)
    }

    /// Serialized units named on a new transfer must match it exactly: one
    /// per unit of quantity, same item, circulating at the source office, and
    /// not already travelling with another PENDING transfer.
    async fn check_instances<C: ConnectionTrait>(
        &self,
        conn: &C,
        input: &CreateTransferInput,
    ) -> Result<Vec<i32>, ServiceError> {
        if input.instance_ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: BTreeSet<i32> = input.instance_ids.iter().copied().collect();
        if ids.len() != input.instance_ids.len() || ids.len() as i32 != input.quantity {
            return Err(ServiceError::ValidationError(format!(
                "Expected {} distinct item instances, got {}",
                input.quantity,
                input.instance_ids.len()
            )));
        }

        let instances = item_instance::Entity::find()
            .filter(item_instance::Column::Id.is_in(ids.iter().copied()))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if instances.len() != ids.len() {
            return Err(ServiceError::InvalidInstanceState(
                "Some item instances do not exist".to_string(),
            ));
        }
        if let Some(bad) = instances.iter().find(|i| {
            i.item_id != input.item_id
                || i.current_office_id != input.from_office_id
                || !i.status.is_circulating()
        }) {
            return Err(ServiceError::InvalidInstanceState(format!(
                "Item instance {} cannot travel with this transfer",
                bad.barcode
            )));
        }

        let linked: Vec<i32> = transfer_instance::Entity::find()
            .filter(transfer_instance::Column::InstanceId.is_in(ids.iter().copied()))
            .all(conn)
            .await
            .map_err(ServiceError::db_error)?
            .into_iter()
            .map(|link| link.transfer_id)
            .collect();
        if !linked.is_empty() {
            let busy = Transfer::find()
                .filter(transfer::Column::Id.is_in(linked))
                .filter(transfer::Column::Status.eq(TransferStatus::Pending))
                .count(conn)
                .await
                .map_err(ServiceError::db_error)?;
            if busy > 0 {
                return Err(ServiceError::InvalidInstanceState(
                    "Some item instances already belong to a pending transfer".to_string(),
                ));
            }
        }
        Ok(ids.into_iter().collect())
    }

    /// Compare-and-set on (id, PENDING, version). Losing the race is a
    /// `Conflict`, never a second application.
    async fn finish<C: ConnectionTrait>(
        conn: &C,
        transfer: &transfer::Model,
        action: TransferAction,
        approved_by: Option<i32>,
    ) -> Result<TransferStatus, ServiceError> {
        let next = transfer.status.apply(action).ok_or_else(|| {
            ServiceError::Conflict(format!(
                "Transfer {} is {}, expected PENDING",
                transfer.id, transfer.status
            ))
        })?;

        let now = Utc::now();
        let mut update = Transfer::update_many()
            .col_expr(transfer::Column::Status, Expr::value(next.as_str()))
            .col_expr(transfer::Column::Version, Expr::col(transfer::Column::Version).add(1))
            .col_expr(transfer::Column::UpdatedAt, Expr::value(now));
        if let Some(user_id) = approved_by {
            update = update
                .col_expr(transfer::Column::ApprovedBy, Expr::value(user_id))
                .col_expr(transfer::Column::ApprovedAt, Expr::value(now));
        }
        let result = update
            .filter(transfer::Column::Id.eq(transfer.id))
            .filter(transfer::Column::Status.eq(TransferStatus::Pending))
            .filter(transfer::Column::Version.eq(transfer.version))
            .exec(conn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Transfer {} is no longer pending",
                transfer.id
            )));
        }
        Ok(next)
    }

    async fn reload<C: ConnectionTrait>(conn: &C, id: i32) -> Result<transfer::Model, ServiceError> {
        Transfer::find_by_id(id)
            .one(conn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Transfer {} not found", id)))
    }

    fn token(transfer: &transfer::Model) -> ReservationToken {
        ReservationToken {
            office_id: transfer.from_office_id,
            item_id: transfer.item_id,
            quantity: transfer.quantity,
        }
    }

    /// Destination office accepts: stock is credited, linked units move, and
    /// the transfer ends COMPLETED.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn approve(&self, actor: &Actor, id: i32) -> Result<transfer::Model, ServiceError> {
        let completed = db::retry_on_contention(self.retry, "approve_transfer", || {
            self.approve_once(actor, id)
        })
        .await?;

        TRANSFER_TRANSITIONS
            .with_label_values(&[TransferStatus::Completed.as_str()])
            .inc();
        info!(transfer_id = id, approved_by = actor.user_id, "transfer completed");
        self.event_sender
            .publish(Event::TransferCompleted {
                transfer_id: id,
                reference_number: completed.reference_number.clone(),
                approved_by: actor.user_id,
            })
            .await;
        Ok(completed)
    }

    /// Same as [`TransferService::approve`].
    pub async fn accept(&self, actor: &Actor, id: i32) -> Result<transfer::Model, ServiceError> {
        self.approve(actor, id).await
    }

    async fn approve_once(&self, actor: &Actor, id: i32) -> Result<transfer::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let transfer = self.load(&txn, actor, id).await?;
        self.require(actor, Action::Approve, transfer.to_office_id)?;

        debug!(transfer_id = id, from = %transfer.status, to = %TransferStatus::Approved, "approving");
        Self::finish(&txn, &transfer, TransferAction::Approve, Some(actor.user_id)).await?;

        ledger::commit_receive(&txn, transfer.to_office_id, transfer.item_id, transfer.quantity)
            .await?;

        let linked: Vec<i32> = item_instances::list_for_transfer(&txn, transfer.id)
            .await?
            .into_iter()
            .map(|i| i.id)
            .collect();
        let arrival_status = match transfer.transfer_type {
            TransferType::Return => InstanceStatus::InStock,
            _ => InstanceStatus::Distributed,
        };
        item_instances::reassign(
            &txn,
            &linked,
            transfer.from_office_id,
            transfer.to_office_id,
            arrival_status,
        )
        .await?;

        audit::transition(
            &txn,
            &transfer.reference_number,
            TransactionStatus::Completed,
            Some(actor.user_id),
            None,
        )
        .await?;

        let completed = Self::reload(&txn, id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(completed)
    }

    /// Destination office declines: the reservation goes back to the source.
    #[instrument(skip(self, actor, reason), fields(user_id = actor.user_id))]
    pub async fn reject(
        &self,
        actor: &Actor,
        id: i32,
        reason: Option<String>,
    ) -> Result<transfer::Model, ServiceError> {
        let rejected = db::retry_on_contention(self.retry, "reject_transfer", || {
            self.reject_once(actor, id, reason.clone())
        })
        .await?;

        TRANSFER_TRANSITIONS
            .with_label_values(&[TransferStatus::Rejected.as_str()])
            .inc();
        info!(transfer_id = id, "transfer rejected");
        self.event_sender
            .publish(Event::TransferRejected {
                transfer_id: id,
                reason,
            })
            .await;
        Ok(rejected)
    }

    async fn reject_once(
        &self,
        actor: &Actor,
        id: i32,
        reason: Option<String>,
    ) -> Result<transfer::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let transfer = self.load(&txn, actor, id).await?;
        self.require(actor, Action::Approve, transfer.to_office_id)?;

        Self::finish(&txn, &transfer, TransferAction::Reject, None).await?;
        ledger::release(&txn, Self::token(&transfer)).await?;
        audit::transition(
            &txn,
            &transfer.reference_number,
            TransactionStatus::Rejected,
            None,
            reason,
        )
        .await?;

        let rejected = Self::reload(&txn, id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(rejected)
    }

    /// Withdrawn by its initiator, or by someone who may delete transfers at
    /// the source office.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn cancel(&self, actor: &Actor, id: i32) -> Result<transfer::Model, ServiceError> {
        let cancelled = db::retry_on_contention(self.retry, "cancel_transfer", || {
            self.cancel_once(actor, id)
        })
        .await?;

        TRANSFER_TRANSITIONS
            .with_label_values(&[TransferStatus::Cancelled.as_str()])
            .inc();
        info!(transfer_id = id, "transfer cancelled");
        self.event_sender.publish(Event::TransferCancelled(id)).await;
        Ok(cancelled)
    }

    async fn cancel_once(&self, actor: &Actor, id: i32) -> Result<transfer::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let transfer = self.load(&txn, actor, id).await?;
        if transfer.initiated_by_user_id != actor.user_id {
            self.require(actor, Action::Delete, transfer.from_office_id)?;
        }

        Self::finish(&txn, &transfer, TransferAction::Cancel, None).await?;
        ledger::release(&txn, Self::token(&transfer)).await?;
        audit::transition(
            &txn,
            &transfer.reference_number,
            TransactionStatus::Cancelled,
            None,
            None,
        )
        .await?;

        let cancelled = Self::reload(&txn, id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(cancelled)
    }

    /// Changes a PENDING transfer. A new quantity is re-reserved against
    /// current stock; if it is not available the old reservation stays.
    #[instrument(skip(self, actor, input), fields(user_id = actor.user_id))]
    pub async fn edit(
        &self,
        actor: &Actor,
        id: i32,
        input: EditTransferInput,
    ) -> Result<transfer::Model, ServiceError> {
        let edited = db::retry_on_contention(self.retry, "edit_transfer", || {
            self.edit_once(actor, id, &input)
        })
        .await?;

        info!(transfer_id = id, quantity = edited.quantity, "transfer edited");
        self.event_sender.publish(Event::TransferUpdated(id)).await;
        Ok(edited)
    }

    async fn edit_once(
        &self,
        actor: &Actor,
        id: i32,
        input: &EditTransferInput,
    ) -> Result<transfer::Model, ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let transfer = self.load(&txn, actor, id).await?;
        self.require(actor, Action::Edit, transfer.from_office_id)?;

        if transfer.status.apply(TransferAction::Edit).is_none() {
            return Err(ServiceError::Conflict(format!(
                "Transfer {} is {}, expected PENDING",
                transfer.id, transfer.status
            )));
        }

        let quantity = input.quantity.unwrap_or(transfer.quantity);
        if quantity <= 0 {
            return Err(ServiceError::ValidationError(
                "Quantity must be greater than zero".to_string(),
            ));
        }
        if quantity != transfer.quantity {
            let linked = transfer_instance::Entity::find()
                .filter(transfer_instance::Column::TransferId.eq(transfer.id))
                .count(&txn)
                .await
                .map_err(ServiceError::db_error)?;
            if linked > 0 {
                return Err(ServiceError::ValidationError(
                    "Quantity of a transfer with linked item instances cannot change".to_string(),
                ));
            }
            ledger::release(&txn, Self::token(&transfer)).await?;
            ledger::reserve(&txn, transfer.from_office_id, transfer.item_id, quantity).await?;
        }

        let remarks = match input.remarks.as_deref() {
            None => transfer.remarks.clone(),
            Some(text) if text.trim().is_empty() => None,
            Some(text) => Some(text.to_string()),
        };
        let date_distributed = input.date_distributed.unwrap_or(transfer.date_distributed);

        let result = Transfer::update_many()
            .col_expr(transfer::Column::Quantity, Expr::value(quantity))
            .col_expr(transfer::Column::Remarks, Expr::value(remarks.clone()))
            .col_expr(transfer::Column::DateDistributed, Expr::value(date_distributed))
            .col_expr(transfer::Column::Version, Expr::col(transfer::Column::Version).add(1))
            .col_expr(transfer::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(transfer::Column::Id.eq(transfer.id))
            .filter(transfer::Column::Status.eq(TransferStatus::Pending))
            .filter(transfer::Column::Version.eq(transfer.version))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Transfer {} was modified concurrently",
                transfer.id
            )));
        }

        audit::update_pending(&txn, &transfer.reference_number, quantity, remarks).await?;

        let edited = Self::reload(&txn, id).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(edited)
    }

    /// Removes a transfer. A PENDING one gives its reservation back first; the
    /// audit row always stays.
    #[instrument(skip(self, actor), fields(user_id = actor.user_id))]
    pub async fn delete(&self, actor: &Actor, id: i32) -> Result<(), ServiceError> {
        db::retry_on_contention(self.retry, "delete_transfer", || self.delete_once(actor, id))
            .await?;

        info!(transfer_id = id, "transfer deleted");
        self.event_sender.publish(Event::TransferDeleted(id)).await;
        Ok(())
    }

    async fn delete_once(&self, actor: &Actor, id: i32) -> Result<(), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let transfer = self.load(&txn, actor, id).await?;
        self.require(actor, Action::Delete, transfer.from_office_id)?;

        if transfer.status == TransferStatus::Pending {
            ledger::release(&txn, Self::token(&transfer)).await?;
            audit::transition(
                &txn,
                &transfer.reference_number,
                TransactionStatus::Cancelled,
                None,
                None,
            )
            .await?;
        }

        transfer_instance::Entity::delete_many()
            .filter(transfer_instance::Column::TransferId.eq(transfer.id))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        let result = Transfer::delete_many()
            .filter(transfer::Column::Id.eq(transfer.id))
            .filter(transfer::Column::Version.eq(transfer.version))
            .exec(&txn)
            .await
            .map_err(ServiceError::db_error)?;
        if result.rows_affected == 0 {
            return Err(ServiceError::Conflict(format!(
                "Transfer {} was modified concurrently",
                transfer.id
            )));
        }

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(())
    }

    #[instrument(skip(self, actor))]
    pub async fn get(&self, actor: &Actor, id: i32) -> Result<transfer::Model, ServiceError> {
        let transfer = self.load(&*self.db, actor, id).await?;
        if !self.can_view(actor, &transfer) {
            return Err(ServiceError::access_denied());
        }
        Ok(transfer)
    }

    /// Item instances travelling with a transfer.
    #[instrument(skip(self, actor))]
    pub async fn barcodes(
        &self,
        actor: &Actor,
        id: i32,
    ) -> Result<Vec<item_instance::Model>, ServiceError> {
        let transfer = self.get(actor, id).await?;
        item_instances::list_for_transfer(&*self.db, transfer.id).await
    }

    /// Restricts a query to what the actor may see. Global roles see all
    /// transfers; `direction` is then relative to their own office, if any.
    fn visibility(&self, actor: &Actor, direction: Direction) -> Result<Condition, ServiceError> {
        let office_id = match actor.office_id {
            Some(office_id) => office_id,
            None if self.policy.overrides_scope(actor) => return Ok(Condition::all()),
            None => return Err(ServiceError::access_denied()),
        };
        if !self.policy.overrides_scope(actor) {
            self.require(actor, Action::View, office_id)?;
        }
        let condition = match direction {
            Direction::Incoming => Condition::all().add(transfer::Column::ToOfficeId.eq(office_id)),
            Direction::Outgoing => {
                Condition::all().add(transfer::Column::FromOfficeId.eq(office_id))
            }
            Direction::All if self.policy.overrides_scope(actor) => Condition::all(),
            Direction::All => Condition::any()
                .add(transfer::Column::FromOfficeId.eq(office_id))
                .add(transfer::Column::ToOfficeId.eq(office_id)),
        };
        Ok(condition)
    }

    #[instrument(skip(self, actor))]
    pub async fn list(
        &self,
        actor: &Actor,
        filter: TransferFilter,
    ) -> Result<(Vec<transfer::Model>, u64), ServiceError> {
        let mut query = Transfer::find().filter(self.visibility(actor, filter.direction)?);
        if let Some(status) = filter.status {
            query = query.filter(transfer::Column::Status.eq(status));
        }
        let paginator = query
            .order_by_desc(transfer::Column::CreatedAt)
            .order_by_desc(transfer::Column::Id)
            .paginate(&*self.db, filter.limit.max(1));
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(super::page_index(filter.page))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((items, total))
    }

    /// The latest visible transfers.
    pub async fn recent(&self, actor: &Actor) -> Result<Vec<transfer::Model>, ServiceError> {
        Transfer::find()
            .filter(self.visibility(actor, Direction::All)?)
            .order_by_desc(transfer::Column::CreatedAt)
            .order_by_desc(transfer::Column::Id)
            .limit(RECENT_LIMIT)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }

    /// Visible transfers distributed between the two dates, both inclusive.
    #[instrument(skip(self, actor))]
    pub async fn by_date_range(
        &self,
        actor: &Actor,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<transfer::Model>, ServiceError> {
        if start > end {
            return Err(ServiceError::ValidationError(
                "startDate must not be after endDate".to_string(),
            ));
        }
        let from = start.and_time(chrono::NaiveTime::MIN).and_utc();
        // No successor for the last representable day, so leave it open.
        let until = end
            .succ_opt()
            .map(|next| next.and_time(chrono::NaiveTime::MIN).and_utc());

        let mut query = Transfer::find()
            .filter(self.visibility(actor, Direction::All)?)
            .filter(transfer::Column::DateDistributed.gte(from));
        if let Some(until) = until {
            query = query.filter(transfer::Column::DateDistributed.lt(until));
        }
        query
            .order_by_desc(transfer::Column::DateDistributed)
            .order_by_desc(transfer::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}

/// Audit rows of RETURN transfers are RETURNs; everything else is a
/// DISTRIBUTION.
pub fn audit_type_for(transfer_type: TransferType) -> TransactionType {
    match transfer_type {
        TransferType::Return => TransactionType::Return,
        _ => TransactionType::Distribution,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::services::test_support::{seed_item, seed_office, test_db};
    use assert_matches::assert_matches;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    struct Fixture {
        db: Arc<DbPool>,
        service: TransferService,
        a: i32,
        b: i32,
        c: i32,
        item: item::Model,
        _events: mpsc::Receiver<Event>,
    }

    async fn fixture(stock_at_a: i32) -> Fixture {
        let db = Arc::new(test_db().await);
        let a = seed_office(&db, "A", None).await.id;
        let b = seed_office(&db, "B", None).await.id;
        let c = seed_office(&db, "C", None).await.id;
        let item = seed_item(&db, "CHAIR").await;
        if stock_at_a > 0 {
            ledger::commit_receive(&*db, a, item.id, stock_at_a).await.unwrap();
        }
        let (tx, rx) = mpsc::channel(64);
        let service = TransferService::new(
            db.clone(),
            Arc::new(AccessPolicy::default()),
            Arc::new(EventSender::new(tx)),
            ContentionRetry::default(),
        );
        Fixture {
            db,
            service,
            a,
            b,
            c,
            item,
            _events: rx,
        }
    }

    fn request(f: &Fixture, quantity: i32) -> CreateTransferInput {
        CreateTransferInput {
            item_id: f.item.id,
            from_office_id: f.a,
            to_office_id: f.b,
            quantity,
            initiated_by_user_id: None,
            transfer_type: TransferType::Allocation,
            remarks: Some("for the new lab".into()),
            date_distributed: None,
            instance_ids: vec![],
        }
    }

    async fn qty(f: &Fixture, office_id: i32) -> i32 {
        ledger::get_quantity(&*f.db, office_id, f.item.id).await.unwrap()
    }

    #[tokio::test]
    async fn create_reserves_and_approve_credits_once() {
        let f = fixture(50).await;
        let sender = Actor::new(1, Role::User, Some(f.a));
        let receiver = Actor::new(2, Role::User, Some(f.b));

        let t = f.service.create(&sender, request(&f, 20)).await.unwrap();
        assert_eq!(t.status, TransferStatus::Pending);
        assert!(t.reference_number.starts_with("DIST-"));
        assert_eq!(qty(&f, f.a).await, 30);

        let done = f.service.approve(&receiver, t.id).await.unwrap();
        assert_eq!(done.status, TransferStatus::Completed);
        assert_eq!(done.approved_by, Some(2));
        assert_eq!(qty(&f, f.b).await, 20);
        assert_eq!(qty(&f, f.a).await, 30);

        assert_matches!(
            f.service.approve(&receiver, t.id).await,
            Err(ServiceError::Conflict(_))
        );
        assert_eq!(qty(&f, f.b).await, 20);

        let row = audit::by_reference(&*f.db, &t.reference_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, TransactionStatus::Completed);
        assert_eq!(row.transfer_id, Some(t.id));
    }

    #[tokio::test]
    async fn insufficient_stock_creates_nothing() {
        let f = fixture(10).await;
        let sender = Actor::new(1, Role::User, Some(f.a));
        assert_matches!(
            f.service.create(&sender, request(&f, 15)).await,
            Err(ServiceError::InsufficientStock {
                requested: 15,
                available: 10
            })
        );
        assert_eq!(qty(&f, f.a).await, 10);
        assert_eq!(Transfer::find().count(&*f.db).await.unwrap(), 0);
        assert_eq!(
            audit::by_office(&*f.db, f.a, 1, 10).await.unwrap().1,
            0
        );
    }

    #[tokio::test]
    async fn reject_restores_source() {
        let f = fixture(12).await;
        let sender = Actor::new(1, Role::User, Some(f.a));
        let receiver = Actor::new(2, Role::User, Some(f.b));
        let t = f.service.create(&sender, request(&f, 5)).await.unwrap();

        let rejected = f
            .service
            .reject(&receiver, t.id, Some("not needed".into()))
            .await
            .unwrap();
        assert_eq!(rejected.status, TransferStatus::Rejected);
        assert_eq!(qty(&f, f.a).await, 12);
        assert_eq!(qty(&f, f.b).await, 0);

        let row = audit::by_reference(&*f.db, &t.reference_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.rejection_reason.as_deref(), Some("not needed"));
    }

    #[tokio::test]
    async fn bystanders_are_denied_every_action() {
        let f = fixture(10).await;
        let sender = Actor::new(1, Role::Admin, Some(f.a));
        let bystander = Actor::new(3, Role::Admin, Some(f.c));
        let t = f.service.create(&sender, request(&f, 4)).await.unwrap();

        assert_matches!(f.service.approve(&bystander, t.id).await, Err(ServiceError::Forbidden(_)));
        assert_matches!(
            f.service.reject(&bystander, t.id, None).await,
            Err(ServiceError::Forbidden(_))
        );
        assert_matches!(f.service.cancel(&bystander, t.id).await, Err(ServiceError::Forbidden(_)));
        assert_matches!(
            f.service
                .edit(&bystander, t.id, EditTransferInput { quantity: Some(1), ..Default::default() })
                .await,
            Err(ServiceError::Forbidden(_))
        );
        assert_matches!(f.service.get(&bystander, t.id).await, Err(ServiceError::Forbidden(_)));
        // the same answer as for a transfer that does not exist
        assert_matches!(f.service.get(&bystander, 9_999).await, Err(ServiceError::Forbidden(_)));

        let root = Actor::new(4, Role::SuperAdmin, None);
        assert_matches!(f.service.get(&root, 9_999).await, Err(ServiceError::NotFound(_)));
        assert_eq!(qty(&f, f.a).await, 6);
    }

    #[tokio::test]
    async fn source_office_cannot_approve_its_own_request() {
        let f = fixture(10).await;
        let sender = Actor::new(1, Role::Admin, Some(f.a));
        let t = f.service.create(&sender, request(&f, 4)).await.unwrap();
        assert_matches!(f.service.approve(&sender, t.id).await, Err(ServiceError::Forbidden(_)));
    }

    #[tokio::test]
    async fn edit_rereserves_against_current_stock() {
        let f = fixture(10).await;
        let admin = Actor::new(1, Role::Admin, Some(f.a));
        let t = f.service.create(&admin, request(&f, 4)).await.unwrap();
        assert_eq!(qty(&f, f.a).await, 6);

        let edited = f
            .service
            .edit(&admin, t.id, EditTransferInput { quantity: Some(9), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(edited.quantity, 9);
        assert_eq!(edited.version, t.version + 1);
        assert_eq!(qty(&f, f.a).await, 1);

        assert_matches!(
            f.service
                .edit(&admin, t.id, EditTransferInput { quantity: Some(11), ..Default::default() })
                .await,
            Err(ServiceError::InsufficientStock { requested: 11, available: 10 })
        );
        assert_eq!(qty(&f, f.a).await, 1);
        assert_eq!(f.service.get(&admin, t.id).await.unwrap().quantity, 9);
    }

    #[tokio::test]
    async fn blank_remarks_clear_and_missing_remarks_keep() {
        let f = fixture(10).await;
        let admin = Actor::new(1, Role::Admin, Some(f.a));
        let t = f.service.create(&admin, request(&f, 2)).await.unwrap();

        let kept = f
            .service
            .edit(&admin, t.id, EditTransferInput { quantity: Some(3), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(kept.remarks.as_deref(), Some("for the new lab"));

        let cleared = f
            .service
            .edit(&admin, t.id, EditTransferInput { remarks: Some("  ".into()), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(cleared.remarks, None);
        let row = audit::by_reference(&*f.db, &t.reference_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.remarks, None);
    }

    #[tokio::test]
    async fn plain_users_cannot_edit() {
        let f = fixture(10).await;
        let user = Actor::new(1, Role::User, Some(f.a));
        let t = f.service.create(&user, request(&f, 2)).await.unwrap();
        assert_matches!(
            f.service
                .edit(&user, t.id, EditTransferInput { remarks: Some("x".into()), ..Default::default() })
                .await,
            Err(ServiceError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn initiator_may_cancel_and_stock_returns() {
        let f = fixture(10).await;
        let user = Actor::new(1, Role::User, Some(f.a));
        let t = f.service.create(&user, request(&f, 7)).await.unwrap();
        let cancelled = f.service.cancel(&user, t.id).await.unwrap();
        assert_eq!(cancelled.status, TransferStatus::Cancelled);
        assert_eq!(qty(&f, f.a).await, 10);
        assert_matches!(f.service.cancel(&user, t.id).await, Err(ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn delete_pending_releases_and_keeps_audit_row() {
        let f = fixture(10).await;
        let admin = Actor::new(1, Role::Admin, Some(f.a));
        let t = f.service.create(&admin, request(&f, 3)).await.unwrap();

        f.service.delete(&admin, t.id).await.unwrap();
        assert_eq!(qty(&f, f.a).await, 10);
        assert_matches!(f.service.get(&admin, t.id).await, Err(ServiceError::Forbidden(_)));
        let row = audit::by_reference(&*f.db, &t.reference_number)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.status, TransactionStatus::Cancelled);
    }

    #[tokio::test]
    async fn same_office_and_foreign_initiator_are_refused() {
        let f = fixture(10).await;
        let user = Actor::new(1, Role::User, Some(f.a));
        let mut same = request(&f, 1);
        same.to_office_id = f.a;
        assert_matches!(
            f.service.create(&user, same).await,
            Err(ServiceError::ValidationError(_))
        );

        let mut on_behalf = request(&f, 1);
        on_behalf.initiated_by_user_id = Some(99);
        assert_matches!(
            f.service.create(&user, on_behalf).await,
            Err(ServiceError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn linked_instances_travel_on_approval() {
        let f = fixture(0).await;
        let units = item_instances::register(&*f.db, &f.item, f.a, None, dec!(10), 2)
            .await
            .unwrap();
        ledger::commit_receive(&*f.db, f.a, f.item.id, 2).await.unwrap();

        let sender = Actor::new(1, Role::User, Some(f.a));
        let receiver = Actor::new(2, Role::User, Some(f.b));
        let mut input = request(&f, 2);
        input.instance_ids = units.iter().map(|u| u.id).collect();
        let t = f.service.create(&sender, input.clone()).await.unwrap();

        // the same units cannot be promised twice
        ledger::commit_receive(&*f.db, f.a, f.item.id, 2).await.unwrap();
        assert_matches!(
            f.service.create(&sender, input).await,
            Err(ServiceError::InvalidInstanceState(_))
        );

        f.service.approve(&receiver, t.id).await.unwrap();
        let moved = f.service.barcodes(&receiver, t.id).await.unwrap();
        assert_eq!(moved.len(), 2);
        assert!(moved
            .iter()
            .all(|u| u.current_office_id == f.b && u.status == InstanceStatus::Distributed));
    }

    #[tokio::test]
    async fn listing_follows_direction_and_scope() {
        let f = fixture(30).await;
        ledger::commit_receive(&*f.db, f.b, f.item.id, 5).await.unwrap();
        let at_a = Actor::new(1, Role::User, Some(f.a));
        let at_b = Actor::new(2, Role::User, Some(f.b));
        let at_c = Actor::new(3, Role::User, Some(f.c));

        f.service.create(&at_a, request(&f, 1)).await.unwrap();
        f.service.create(&at_a, request(&f, 2)).await.unwrap();
        let mut back = request(&f, 1);
        back.from_office_id = f.b;
        back.to_office_id = f.a;
        f.service.create(&at_b, back).await.unwrap();

        let all = |direction| TransferFilter {
            direction,
            status: None,
            page: 1,
            limit: 20,
        };
        assert_eq!(f.service.list(&at_a, all(Direction::All)).await.unwrap().1, 3);
        assert_eq!(f.service.list(&at_a, all(Direction::Outgoing)).await.unwrap().1, 2);
        assert_eq!(f.service.list(&at_a, all(Direction::Incoming)).await.unwrap().1, 1);
        assert_eq!(f.service.list(&at_c, all(Direction::All)).await.unwrap().1, 0);
        assert_eq!(f.service.recent(&at_b).await.unwrap().len(), 3);

        let today = Utc::now().date_naive();
        assert_eq!(
            f.service.by_date_range(&at_a, today, today).await.unwrap().len(),
            3
        );
        assert_matches!(
            f.service
                .by_date_range(&at_a, today, today - Duration::days(1))
                .await,
            Err(ServiceError::ValidationError(_))
        );
    }

    #[tokio::test]
    async fn date_range_may_end_on_the_last_representable_day() {
        let f = fixture(10).await;
        let at_a = Actor::new(1, Role::User, Some(f.a));
        f.service.create(&at_a, request(&f, 1)).await.unwrap();

        let today = Utc::now().date_naive();
        let found = f
            .service
            .by_date_range(&at_a, today, NaiveDate::MAX)
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
    }
}
