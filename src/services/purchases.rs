use crate::{
    auth::{AccessPolicy, Action, Actor, Resource},
    db::{self, ContentionRetry, DbPool},
    entities::{
        item, item_instance, office,
        office_transaction::TransactionType,
        purchase::{self, Entity as Purchase},
        purchase_line,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    metrics::PURCHASED_UNITS,
    services::{
        audit::{self, NewEntry},
        item_instances, ledger,
    },
};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
    TransactionTrait,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;

#[derive(Debug, Clone)]
pub struct PurchaseLineInput {
    pub item_id: i32,
    pub quantity: i32,
    pub unit_price: Decimal,
}

#[derive(Debug, Clone)]
pub struct ReceivePurchaseInput {
    pub office_id: i32,
    pub vendor_name: Option<String>,
    pub invoice_number: Option<String>,
    pub purchased_at: Option<DateTime<Utc>>,
    pub remarks: Option<String>,
    pub lines: Vec<PurchaseLineInput>,
}

/// A purchase with its lines and the units it brought in.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseDetail {
    pub purchase: purchase::Model,
    pub lines: Vec<purchase_line::Model>,
    pub instances: Vec<item_instance::Model>,
}

/// Stock intake: every purchased unit becomes a barcoded instance and the
/// ledger is credited by the same amount.
#[derive(Clone)]
pub struct PurchaseService {
    db: Arc<DbPool>,
    policy: Arc<AccessPolicy>,
    event_sender: Arc<EventSender>,
    retry: ContentionRetry,
}

impl PurchaseService {
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

    #[instrument(skip(self, actor, input), fields(user_id = actor.user_id, office_id = input.office_id))]
    pub async fn receive(
        &self,
        actor: &Actor,
        input: ReceivePurchaseInput,
    ) -> Result<PurchaseDetail, ServiceError> {
        let detail = db::retry_on_contention(self.retry, "receive_purchase", || {
            self.receive_once(actor, &input)
        })
        .await?;

        let units = detail.instances.len();
        PURCHASED_UNITS.inc_by(units as u64);
        info!(purchase_id = detail.purchase.id, units, "purchase received");
        self.event_sender
            .publish(Event::PurchaseReceived {
                purchase_id: detail.purchase.id,
                office_id: detail.purchase.office_id,
                units,
            })
            .await;
        Ok(detail)
    }

    async fn receive_once(
        &self,
        actor: &Actor,
        input: &ReceivePurchaseInput,
    ) -> Result<PurchaseDetail, ServiceError> {
        super::require(
            &self.policy,
            actor,
            Resource::Purchases,
            Action::Create,
            input.office_id,
        )?;
        if input.lines.is_empty() {
            return Err(ServiceError::ValidationError(
                "A purchase needs at least one line".to_string(),
            ));
        }
        if let Some(line) = input.lines.iter().find(|l| l.quantity <= 0) {
            return Err(ServiceError::ValidationError(format!(
                "Quantity for item {} must be greater than zero",
                line.item_id
            )));
        }
        if let Some(line) = input.lines.iter().find(|l| l.unit_price.is_sign_negative()) {
            return Err(ServiceError::ValidationError(format!(
                "Unit price for item {} must not be negative",
                line.item_id
            )));
        }

        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;

        office::Entity::find_by_id(input.office_id)
            .one(&txn)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Office {} not found", input.office_id)))?;

        let purchase = purchase::ActiveModel {
            office_id: Set(input.office_id),
            vendor_name: Set(input.vendor_name.clone()),
            invoice_number: Set(input.invoice_number.clone()),
            purchased_at: Set(input.purchased_at.unwrap_or_else(Utc::now)),
            created_by: Set(actor.user_id),
            ..Default::default()
        }
        .insert(&txn)
        .await
        .map_err(ServiceError::db_error)?;

        let mut lines = Vec::with_capacity(input.lines.len());
        let mut instances = Vec::new();
        for line in &input.lines {
            let item = item::Entity::find_by_id(line.item_id)
                .one(&txn)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", line.item_id)))?;

            lines.push(
                purchase_line::ActiveModel {
                    purchase_id: Set(purchase.id),
                    item_id: Set(item.id),
                    quantity: Set(line.quantity),
                    unit_price: Set(line.unit_price),
                    ..Default::default()
                }
                .insert(&txn)
                .await
                .map_err(ServiceError::db_error)?,
            );

            instances.extend(
                item_instances::register(
                    &txn,
                    &item,
                    input.office_id,
                    Some(purchase.id),
                    line.unit_price,
                    line.quantity,
                )
                .await?,
            );
            ledger::commit_receive(&txn, input.office_id, item.id, line.quantity).await?;

            audit::record(
                &txn,
                NewEntry::completed(
                    TransactionType::Purchase,
                    item.id,
                    None,
                    Some(input.office_id),
                    line.quantity,
                    actor.user_id,
                    input.remarks.clone(),
                ),
            )
            .await?;
        }

        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(PurchaseDetail {
            purchase,
            lines,
            instances,
        })
    }

    #[instrument(skip(self, actor))]
    pub async fn get(&self, actor: &Actor, id: i32) -> Result<PurchaseDetail, ServiceError> {
        let purchase = self.load(actor, id).await?;
        let lines = purchase_line::Entity::find()
            .filter(purchase_line::Column::PurchaseId.eq(id))
            .order_by_asc(purchase_line::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)?;
        let instances = self.units_of(id).await?;

        Ok(PurchaseDetail {
            purchase,
            lines,
            instances,
        })
    }

    /// The barcoded units a purchase brought in.
    #[instrument(skip(self, actor))]
    pub async fn instances(
        &self,
        actor: &Actor,
        id: i32,
    ) -> Result<Vec<item_instance::Model>, ServiceError> {
        let purchase = self.load(actor, id).await?;
        self.units_of(purchase.id).await
    }

    /// Purchases received by one office, newest first. Without an office,
    /// global roles see every purchase and everyone else sees their own
    /// office's.
    #[instrument(skip(self, actor))]
    pub async fn list(
        &self,
        actor: &Actor,
        office_id: Option<i32>,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<purchase::Model>, u64), ServiceError> {
        let office_id = match office_id {
            Some(office_id) => Some(office_id),
            None if self.policy.overrides_scope(actor) => None,
            None => Some(actor.office_id.ok_or_else(ServiceError::access_denied)?),
        };
        let mut query = Purchase::find();
        if let Some(office_id) = office_id {
            super::require(&self.policy, actor, Resource::Purchases, Action::View, office_id)?;
            query = query.filter(purchase::Column::OfficeId.eq(office_id));
        }

        let paginator = query
            .order_by_desc(purchase::Column::PurchasedAt)
            .order_by_desc(purchase::Column::Id)
            .paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(super::page_index(page))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((items, total))
    }

    async fn load(&self, actor: &Actor, id: i32) -> Result<purchase::Model, ServiceError> {
        let purchase = Purchase::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| super::missing(&self.policy, actor, format!("Purchase {} not found", id)))?;
        super::require(
            &self.policy,
            actor,
            Resource::Purchases,
            Action::View,
            purchase.office_id,
        )?;
        Ok(purchase)
    }

    async fn units_of(&self, purchase_id: i32) -> Result<Vec<item_instance::Model>, ServiceError> {
        item_instance::Entity::find()
            .filter(item_instance::Column::PurchaseId.eq(purchase_id))
            .order_by_asc(item_instance::Column::Id)
            .all(&*self.db)
            .await
            .map_err(ServiceError::db_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::entities::item_instance::InstanceStatus;
    use crate::services::test_support::{seed_item, seed_office, test_db};
    use assert_matches::assert_matches;
    use rust_decimal_macros::dec;
    use std::collections::HashSet;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn intake_creates_units_and_credits_ledger() {
        let db = Arc::new(test_db().await);
        let office = seed_office(&db, "STORE", None).await;
        let chair = seed_item(&db, "CHR-01").await;
        let desk = seed_item(&db, "DSK-02").await;
        let (tx, mut rx) = mpsc::channel(8);
        let service = PurchaseService::new(
            db.clone(),
            Arc::new(AccessPolicy::default()),
            Arc::new(EventSender::new(tx)),
            ContentionRetry::default(),
        );
        let clerk = Actor::new(5, Role::Admin, Some(office.id));

        let detail = service
            .receive(
                &clerk,
                ReceivePurchaseInput {
                    office_id: office.id,
                    vendor_name: Some("Campus Supplies".into()),
                    invoice_number: Some("INV-77".into()),
                    purchased_at: None,
                    remarks: None,
                    lines: vec![
                        PurchaseLineInput {
                            item_id: chair.id,
                            quantity: 3,
                            unit_price: dec!(45.00),
                        },
                        PurchaseLineInput {
                            item_id: desk.id,
                            quantity: 2,
                            unit_price: dec!(120.50),
                        },
                    ],
                },
            )
            .await
            .unwrap();

        assert_eq!(detail.lines.len(), 2);
        assert_eq!(detail.instances.len(), 5);
        let barcodes: HashSet<_> = detail.instances.iter().map(|i| i.barcode.clone()).collect();
        assert_eq!(barcodes.len(), 5);
        assert!(detail
            .instances
            .iter()
            .all(|i| i.status == InstanceStatus::InStock && i.current_office_id == office.id));
        assert_eq!(ledger::get_quantity(&*db, office.id, chair.id).await.unwrap(), 3);
        assert_eq!(ledger::get_quantity(&*db, office.id, desk.id).await.unwrap(), 2);
        assert_matches!(rx.recv().await, Some(Event::PurchaseReceived { units: 5, .. }));

        let fetched = service.get(&clerk, detail.purchase.id).await.unwrap();
        assert_eq!(fetched.instances.len(), 5);
    }

    #[tokio::test]
    async fn unknown_item_rolls_back_everything() {
        let db = Arc::new(test_db().await);
        let office = seed_office(&db, "STORE", None).await;
        let chair = seed_item(&db, "CHR").await;
        let (tx, _rx) = mpsc::channel(8);
        let service = PurchaseService::new(
            db.clone(),
            Arc::new(AccessPolicy::default()),
            Arc::new(EventSender::new(tx)),
            ContentionRetry::default(),
        );
        let clerk = Actor::new(5, Role::Admin, Some(office.id));

        let result = service
            .receive(
                &clerk,
                ReceivePurchaseInput {
                    office_id: office.id,
                    vendor_name: None,
                    invoice_number: None,
                    purchased_at: None,
                    remarks: None,
                    lines: vec![
                        PurchaseLineInput {
                            item_id: chair.id,
                            quantity: 1,
                            unit_price: dec!(1),
                        },
                        PurchaseLineInput {
                            item_id: 404,
                            quantity: 1,
                            unit_price: dec!(1),
                        },
                    ],
                },
            )
            .await;
        assert_matches!(result, Err(ServiceError::NotFound(_)));
        assert_eq!(ledger::get_quantity(&*db, office.id, chair.id).await.unwrap(), 0);
        assert_eq!(Purchase::find().all(&*db).await.unwrap().len(), 0);

        let outsider = Actor::new(6, Role::User, Some(office.id));
        assert_matches!(
            service
                .receive(
                    &outsider,
                    ReceivePurchaseInput {
                        office_id: office.id,
                        vendor_name: None,
                        invoice_number: None,
                        purchased_at: None,
                        remarks: None,
                        lines: vec![],
                    },
                )
                .await,
            Err(ServiceError::Forbidden(_))
        );
    }

    #[tokio::test]
    async fn listing_is_scoped_to_the_receiving_office() {
        let db = Arc::new(test_db().await);
        let north = seed_office(&db, "NORTH", None).await;
        let south = seed_office(&db, "SOUTH", None).await;
        let pen = seed_item(&db, "PEN").await;
        let (tx, _rx) = mpsc::channel(8);
        let service = PurchaseService::new(
            db.clone(),
            Arc::new(AccessPolicy::default()),
            Arc::new(EventSender::new(tx)),
            ContentionRetry::default(),
        );
        let intake = |office_id| ReceivePurchaseInput {
            office_id,
            vendor_name: None,
            invoice_number: None,
            purchased_at: None,
            remarks: None,
            lines: vec![PurchaseLineInput {
                item_id: pen.id,
                quantity: 2,
                unit_price: dec!(0.80),
            }],
        };
        let north_admin = Actor::new(1, Role::Admin, Some(north.id));
        let south_admin = Actor::new(2, Role::Admin, Some(south.id));
        let first = service.receive(&north_admin, intake(north.id)).await.unwrap();
        service.receive(&north_admin, intake(north.id)).await.unwrap();
        service.receive(&south_admin, intake(south.id)).await.unwrap();

        let (own, total) = service.list(&north_admin, None, 1, 1).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(own.len(), 1);
        assert!(own.iter().all(|p| p.office_id == north.id));

        let root = Actor::new(9, Role::SuperAdmin, None);
        assert_eq!(service.list(&root, None, 1, 20).await.unwrap().1, 3);
        assert_eq!(service.list(&root, Some(south.id), 1, 20).await.unwrap().1, 1);
        assert_matches!(
            service.list(&north_admin, Some(south.id), 1, 20).await,
            Err(ServiceError::Forbidden(_))
        );

        let units = service.instances(&north_admin, first.purchase.id).await.unwrap();
        assert_eq!(units.len(), 2);
        assert!(units.iter().all(|u| u.purchase_id == Some(first.purchase.id)));
        assert_matches!(
            service.instances(&south_admin, first.purchase.id).await,
            Err(ServiceError::Forbidden(_))
        );
    }
}
