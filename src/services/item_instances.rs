use crate::{
    auth::{AccessPolicy, Action, Actor, Resource},
    db::{self, ContentionRetry, DbPool},
    entities::{
        item,
        item_instance::{self, Entity as ItemInstance, InstanceStatus},
        transfer_instance,
    },
    errors::ServiceError,
    events::{Event, EventSender},
};
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{info, instrument};

const MAX_BARCODE_ATTEMPTS: u32 = 1000;

pub async fn find_by_id<C: ConnectionTrait>(
    conn: &C,
    instance_id: i32,
) -> Result<Option<item_instance::Model>, ServiceError> {
    ItemInstance::find_by_id(instance_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

pub async fn find_by_barcode<C: ConnectionTrait>(
    conn: &C,
    barcode: &str,
) -> Result<item_instance::Model, ServiceError> {
    ItemInstance::find()
        .filter(item_instance::Column::Barcode.eq(barcode))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .ok_or_else(|| ServiceError::NotFound(format!("No item instance with barcode {}", barcode)))
}

/// Moves every listed instance from `source_office_id` to `new_office_id`.
///
/// All or nothing: if any instance is missing, sits elsewhere, or is no
/// longer circulating, nothing is written.
pub async fn reassign<C: ConnectionTrait>(
    conn: &C,
    instance_ids: &[i32],
    source_office_id: i32,
    new_office_id: i32,
    new_status: InstanceStatus,
) -> Result<u64, ServiceError> {
    let ids: BTreeSet<i32> = instance_ids.iter().copied().collect();
    if ids.is_empty() {
        return Ok(0);
    }
    if !new_status.is_circulating() {
        return Err(ServiceError::InvalidInstanceState(format!(
            "Instances cannot be moved into status {}",
            new_status
        )));
    }

    let found = ItemInstance::find()
        .filter(item_instance::Column::Id.is_in(ids.iter().copied()))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if found.len() != ids.len() {
        let present: BTreeSet<i32> = found.iter().map(|i| i.id).collect();
        let missing: Vec<i32> = ids.difference(&present).copied().collect();
        return Err(ServiceError::InvalidInstanceState(format!(
            "Item instances {:?} do not exist",
            missing
        )));
    }
    if let Some(bad) = found
        .iter()
        .find(|i| i.current_office_id != source_office_id || !i.status.is_circulating())
    {
        return Err(ServiceError::InvalidInstanceState(format!(
            "Item instance {} is {} at office {}, not circulating at office {}",
            bad.barcode, bad.status, bad.current_office_id, source_office_id
        )));
    }

    let now = Utc::now();
    let mut update = ItemInstance::update_many()
        .col_expr(item_instance::Column::CurrentOfficeId, Expr::value(new_office_id))
        .col_expr(item_instance::Column::Status, Expr::value(new_status.as_str()))
        .col_expr(item_instance::Column::UpdatedAt, Expr::value(now));
    if new_status == InstanceStatus::Distributed {
        update = update.col_expr(item_instance::Column::DistributedAt, Expr::value(now));
    }

    // Conditions repeated so a concurrent writer cannot slip in between the
    // check above and this write.
    let result = update
        .filter(item_instance::Column::Id.is_in(ids.iter().copied()))
        .filter(item_instance::Column::CurrentOfficeId.eq(source_office_id))
        .filter(
            item_instance::Column::Status
                .is_in([InstanceStatus::InStock, InstanceStatus::Distributed]),
        )
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected != ids.len() as u64 {
        return Err(ServiceError::InvalidInstanceState(
            "Item instances changed while being reassigned".to_string(),
        ));
    }
    Ok(result.rows_affected)
}

/// Instances at an office, ordered by id. `page` is 1-based.
pub async fn list_by_office<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    page: u64,
    limit: u64,
) -> Result<(Vec<item_instance::Model>, u64), ServiceError> {
    let paginator = ItemInstance::find()
        .filter(item_instance::Column::CurrentOfficeId.eq(office_id))
        .order_by_asc(item_instance::Column::Id)
        .paginate(conn, limit.max(1));
    let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
    let items = paginator
        .fetch_page(super::page_index(page))
        .await
        .map_err(ServiceError::db_error)?;
    Ok((items, total))
}

pub async fn list_for_transfer<C: ConnectionTrait>(
    conn: &C,
    transfer_id: i32,
) -> Result<Vec<item_instance::Model>, ServiceError> {
    let instance_ids: Vec<i32> = transfer_instance::Entity::find()
        .filter(transfer_instance::Column::TransferId.eq(transfer_id))
        .all(conn)
        .await
        .map_err(ServiceError::db_error)?
        .into_iter()
        .map(|link| link.instance_id)
        .collect();
    if instance_ids.is_empty() {
        return Ok(Vec::new());
    }
    ItemInstance::find()
        .filter(item_instance::Column::Id.is_in(instance_ids))
        .order_by_asc(item_instance::Column::Id)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

/// `YYYYMMDD-ITEMCODE-`, with the item code cut down to uppercase
/// alphanumerics.
pub fn barcode_prefix(date: NaiveDate, item_code: &str) -> String {
    let code: String = item_code
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    format!("{}-{}-", date.format("%Y%m%d"), code)
}

pub fn barcode(prefix: &str, sequence: u64) -> String {
    format!("{}{:06}", prefix, sequence)
}

async fn barcode_taken<C: ConnectionTrait>(conn: &C, candidate: &str) -> Result<bool, ServiceError> {
    let count = ItemInstance::find()
        .filter(item_instance::Column::Barcode.eq(candidate))
        .count(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(count > 0)
}

/// Creates `count` IN_STOCK units of `item` at `office_id`, each with a fresh
/// barcode.
#[instrument(skip(conn, item), fields(item_id = item.id))]
pub async fn register<C: ConnectionTrait>(
    conn: &C,
    item: &item::Model,
    office_id: i32,
    purchase_id: Option<i32>,
    unit_price: Decimal,
    count: i32,
) -> Result<Vec<item_instance::Model>, ServiceError> {
    let prefix = barcode_prefix(Utc::now().date_naive(), &item.item_code);
    let mut sequence = ItemInstance::find()
        .filter(item_instance::Column::Barcode.starts_with(&prefix))
        .count(conn)
        .await
        .map_err(ServiceError::db_error)?
        + 1;

    let mut created = Vec::with_capacity(count.max(0) as usize);
    for _ in 0..count {
        let mut attempts = 0;
        let mut candidate = barcode(&prefix, sequence);
        while barcode_taken(conn, &candidate).await? {
            attempts += 1;
            if attempts >= MAX_BARCODE_ATTEMPTS {
                return Err(ServiceError::InternalError(format!(
                    "Failed to generate unique barcode after {} attempts",
                    MAX_BARCODE_ATTEMPTS
                )));
            }
            sequence += 1;
            candidate = barcode(&prefix, sequence);
        }
        sequence += 1;

        let instance = item_instance::ActiveModel {
            item_id: Set(item.id),
            barcode: Set(candidate),
            unit_price: Set(unit_price),
            status: Set(InstanceStatus::InStock),
            current_office_id: Set(office_id),
            distributed_at: Set(None),
            purchase_id: Set(purchase_id),
            remarks: Set(None),
            ..Default::default()
        }
        .insert(conn)
        .await
        .map_err(ServiceError::db_error)?;
        created.push(instance);
    }
    Ok(created)
}

/// Explicit status change, honouring the one-way transition table. Returns
/// the updated instance and the status it left.
pub async fn update_status<C: ConnectionTrait>(
    conn: &C,
    instance: item_instance::Model,
    new_status: InstanceStatus,
    remarks: Option<String>,
) -> Result<(item_instance::Model, InstanceStatus), ServiceError> {
    let previous = instance.status;
    if !previous.can_transition_to(new_status) {
        return Err(ServiceError::InvalidInstanceState(format!(
            "Item instance {} cannot go from {} to {}",
            instance.barcode, previous, new_status
        )));
    }

    let mut update = ItemInstance::update_many()
        .col_expr(item_instance::Column::Status, Expr::value(new_status.as_str()))
        .col_expr(item_instance::Column::UpdatedAt, Expr::value(Utc::now()));
    if let Some(remarks) = remarks {
        update = update.col_expr(item_instance::Column::Remarks, Expr::value(remarks));
    }
    let result = update
        .filter(item_instance::Column::Id.eq(instance.id))
        .filter(item_instance::Column::Status.eq(previous))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Item instance {} was modified concurrently",
            instance.barcode
        )));
    }

    let updated = find_by_id(conn, instance.id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Item instance {} not found", instance.id)))?;
    Ok((updated, previous))
}

/// Office-scoped access to the registry for the HTTP layer.
#[derive(Clone)]
pub struct ItemInstanceService {
    db: Arc<DbPool>,
    policy: Arc<AccessPolicy>,
    event_sender: Arc<EventSender>,
    retry: ContentionRetry,
}

impl ItemInstanceService {
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

    fn visible(&self, actor: &Actor, instance: &item_instance::Model) -> Result<(), ServiceError> {
        super::require(
            &self.policy,
            actor,
            Resource::ItemInstances,
            Action::View,
            instance.current_office_id,
        )
    }

    #[instrument(skip(self, actor))]
    pub async fn get(&self, actor: &Actor, id: i32) -> Result<item_instance::Model, ServiceError> {
        let instance = find_by_id(&*self.db, id)
            .await?
            .ok_or_else(|| super::missing(&self.policy, actor, format!("Item instance {} not found", id)))?;
        self.visible(actor, &instance)?;
        Ok(instance)
    }

    #[instrument(skip(self, actor))]
    pub async fn get_by_barcode(
        &self,
        actor: &Actor,
        barcode: &str,
    ) -> Result<item_instance::Model, ServiceError> {
        let instance = match find_by_barcode(&*self.db, barcode).await {
            Ok(instance) => instance,
            Err(ServiceError::NotFound(msg)) => {
                return Err(super::missing(&self.policy, actor, msg))
            }
            Err(e) => return Err(e),
        };
        self.visible(actor, &instance)?;
        Ok(instance)
    }

    #[instrument(skip(self, actor))]
    pub async fn list_by_office(
        &self,
        actor: &Actor,
        office_id: i32,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<item_instance::Model>, u64), ServiceError> {
        super::require(
            &self.policy,
            actor,
            Resource::OfficeInventory,
            Action::View,
            office_id,
        )?;
        list_by_office(&*self.db, office_id, page, limit).await
    }

    #[instrument(skip(self, actor, remarks))]
    pub async fn update_status(
        &self,
        actor: &Actor,
        id: i32,
        new_status: InstanceStatus,
        remarks: Option<String>,
    ) -> Result<item_instance::Model, ServiceError> {
        let (updated, previous) = db::retry_on_contention(self.retry, "update_instance_status", || {
            self.update_status_once(actor, id, new_status, remarks.clone())
        })
        .await?;

        info!(instance_id = id, from = %previous, to = %new_status, "item instance status changed");
        self.event_sender
            .publish(Event::InstanceStatusChanged {
                instance_id: id,
                from: previous,
                to: new_status,
            })
            .await;
        Ok(updated)
    }

    async fn update_status_once(
        &self,
        actor: &Actor,
        id: i32,
        new_status: InstanceStatus,
        remarks: Option<String>,
    ) -> Result<(item_instance::Model, InstanceStatus), ServiceError> {
        let txn = self.db.begin().await.map_err(ServiceError::db_error)?;
        let instance = find_by_id(&txn, id)
            .await?
            .ok_or_else(|| super::missing(&self.policy, actor, format!("Item instance {} not found", id)))?;
        super::require(
            &self.policy,
            actor,
            Resource::ItemInstances,
            Action::Edit,
            instance.current_office_id,
        )?;
        let result = update_status(&txn, instance, new_status, remarks).await?;
        txn.commit().await.map_err(ServiceError::db_error)?;
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::services::test_support::{seed_item, seed_office, test_db};
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;
    use tokio::sync::mpsc;

    proptest! {
        #[test]
        fn barcodes_follow_date_code_sequence(code in "[a-z0-9 _-]{1,12}", seq in 1u64..999_999) {
            let date = NaiveDate::from_ymd_opt(2024, 11, 11).unwrap();
            let value = barcode(&barcode_prefix(date, &code), seq);
            let parts: Vec<&str> = value.splitn(3, '-').collect();
            prop_assert_eq!(parts[0], "20241111");
            prop_assert!(parts[1].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
            prop_assert_eq!(parts[2].len(), 6);
            prop_assert_eq!(parts[2].parse::<u64>().unwrap(), seq);
        }
    }

    #[test]
    fn prefix_strips_punctuation() {
        let date = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(barcode_prefix(date, "itm-001"), "20240501-ITM001-");
    }

    #[tokio::test]
    async fn register_issues_sequential_unique_barcodes() {
        let db = test_db().await;
        let office = seed_office(&db, "HQ", None).await;
        let item = seed_item(&db, "itm-7").await;

        let first = register(&db, &item, office.id, None, dec!(12.50), 3).await.unwrap();
        let second = register(&db, &item, office.id, None, dec!(12.50), 2).await.unwrap();

        let barcodes: BTreeSet<String> = first
            .iter()
            .chain(second.iter())
            .map(|i| i.barcode.clone())
            .collect();
        assert_eq!(barcodes.len(), 5);
        assert!(first[0].barcode.ends_with("-ITM7-000001"));
        assert!(second[1].barcode.ends_with("-ITM7-000005"));
        assert!(first.iter().all(|i| i.status == InstanceStatus::InStock));
    }

    #[tokio::test]
    async fn reassign_is_all_or_nothing() {
        let db = test_db().await;
        let a = seed_office(&db, "A", None).await;
        let b = seed_office(&db, "B", None).await;
        let item = seed_item(&db, "PC").await;
        let units = register(&db, &item, a.id, None, dec!(1), 2).await.unwrap();
        let elsewhere = register(&db, &item, b.id, None, dec!(1), 1).await.unwrap();

        let ids = vec![units[0].id, units[1].id, elsewhere[0].id];
        assert_matches!(
            reassign(&db, &ids, a.id, b.id, InstanceStatus::Distributed).await,
            Err(ServiceError::InvalidInstanceState(_))
        );
        let (still_at_a, _) = list_by_office(&db, a.id, 1, 10).await.unwrap();
        assert_eq!(still_at_a.len(), 2);

        let moved = reassign(&db, &[units[0].id, units[1].id], a.id, b.id, InstanceStatus::Distributed)
            .await
            .unwrap();
        assert_eq!(moved, 2);
        let unit = find_by_barcode(&db, &units[0].barcode).await.unwrap();
        assert_eq!(unit.current_office_id, b.id);
        assert_eq!(unit.status, InstanceStatus::Distributed);
        assert!(unit.distributed_at.is_some());
    }

    #[tokio::test]
    async fn damaged_units_do_not_move() {
        let db = test_db().await;
        let a = seed_office(&db, "A", None).await;
        let b = seed_office(&db, "B", None).await;
        let item = seed_item(&db, "PC").await;
        let unit = register(&db, &item, a.id, None, dec!(1), 1).await.unwrap().remove(0);

        let (damaged, prev) = update_status(&db, unit, InstanceStatus::Damaged, Some("cracked".into()))
            .await
            .unwrap();
        assert_eq!(prev, InstanceStatus::InStock);
        assert_eq!(damaged.remarks.as_deref(), Some("cracked"));

        assert_matches!(
            reassign(&db, &[damaged.id], a.id, b.id, InstanceStatus::Distributed).await,
            Err(ServiceError::InvalidInstanceState(_))
        );
        assert_matches!(
            update_status(&db, damaged, InstanceStatus::InStock, None).await,
            Err(ServiceError::InvalidInstanceState(_))
        );
    }

    #[tokio::test]
    async fn pagination_is_restartable() {
        let db = test_db().await;
        let a = seed_office(&db, "A", None).await;
        let item = seed_item(&db, "PEN").await;
        register(&db, &item, a.id, None, dec!(0.5), 5).await.unwrap();

        let (page1, total) = list_by_office(&db, a.id, 1, 2).await.unwrap();
        let (page3, _) = list_by_office(&db, a.id, 3, 2).await.unwrap();
        let (again, _) = list_by_office(&db, a.id, 1, 2).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(page3.len(), 1);
        assert_eq!(page1, again);
        assert!(page1[0].id < page1[1].id);
    }

    #[tokio::test]
    async fn service_hides_other_offices_instances() {
        let db = Arc::new(test_db().await);
        let a = seed_office(&db, "A", None).await;
        let b = seed_office(&db, "B", None).await;
        let item = seed_item(&db, "PC").await;
        let unit = register(&*db, &item, a.id, None, dec!(1), 1).await.unwrap().remove(0);

        let (tx, _rx) = mpsc::channel(8);
        let service = ItemInstanceService::new(
            db,
            Arc::new(AccessPolicy::default()),
            Arc::new(EventSender::new(tx)),
            ContentionRetry::default(),
        );

        let insider = Actor::new(1, Role::Admin, Some(a.id));
        let outsider = Actor::new(2, Role::Admin, Some(b.id));
        assert!(service.get_by_barcode(&insider, &unit.barcode).await.is_ok());
        assert_matches!(
            service.get(&outsider, unit.id).await,
            Err(ServiceError::Forbidden(_))
        );
        assert_matches!(
            service.get_by_barcode(&outsider, "nope").await,
            Err(ServiceError::Forbidden(_))
        );
        assert_matches!(
            service
                .update_status(&outsider, unit.id, InstanceStatus::Lost, None)
                .await,
            Err(ServiceError::Forbidden(_))
        );
        let lost = service
            .update_status(&insider, unit.id, InstanceStatus::Lost, None)
            .await
            .unwrap();
        assert_eq!(lost.status, InstanceStatus::Lost);
    }
}
