//! Per-office stock counters.
//!
//! Every function takes any [`ConnectionTrait`] so callers can run it on the
//! pool or inside their own transaction. Decrements are a single conditional
//! `UPDATE`, never a read followed by a write.

use crate::{
    entities::{
        item,
        office,
        office_inventory::{self, Entity as OfficeInventory},
    },
    errors::ServiceError,
    metrics::LEDGER_FAILURES,
};
use chrono::Utc;
use sea_orm::{
    sea_query::{Expr, OnConflict},
    ActiveValue::NotSet,
    ColumnTrait, ConnectionTrait, EntityTrait, QueryFilter, QueryOrder, Set,
};
use tracing::{debug, instrument};

/// Proof that `quantity` units were taken out of an office's stock. Handing
/// it back to [`release`] puts them back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReservationToken {
    pub office_id: i32,
    pub item_id: i32,
    pub quantity: i32,
}

/// Available quantity, 0 when the office has never held the item.
pub async fn get_quantity<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    item_id: i32,
) -> Result<i32, ServiceError> {
    let entry = OfficeInventory::find()
        .filter(office_inventory::Column::OfficeId.eq(office_id))
        .filter(office_inventory::Column::ItemId.eq(item_id))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?;
    Ok(entry.map(|e| e.quantity).unwrap_or(0))
}

async fn ensure_office_and_item<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    item_id: i32,
) -> Result<(), ServiceError> {
    if office::Entity::find_by_id(office_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .is_none()
    {
        return Err(ServiceError::NotFound(format!("Office {} not found", office_id)));
    }
    if item::Entity::find_by_id(item_id)
        .one(conn)
        .await
        .map_err(ServiceError::db_error)?
        .is_none()
    {
        return Err(ServiceError::NotFound(format!("Item {} not found", item_id)));
    }
    Ok(())
}

fn ensure_positive(quantity: i32) -> Result<(), ServiceError> {
    if quantity <= 0 {
        return Err(ServiceError::ValidationError(
            "Quantity must be greater than zero".to_string(),
        ));
    }
    Ok(())
}

/// Takes `quantity` units out of the office's stock, or fails without side
/// effects when fewer are available.
#[instrument(skip(conn))]
pub async fn reserve<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    item_id: i32,
    quantity: i32,
) -> Result<ReservationToken, ServiceError> {
    ensure_positive(quantity)?;

    let result = OfficeInventory::update_many()
        .col_expr(
            office_inventory::Column::Quantity,
            Expr::col(office_inventory::Column::Quantity).sub(quantity),
        )
        .col_expr(
            office_inventory::Column::Version,
            Expr::col(office_inventory::Column::Version).add(1),
        )
        .col_expr(office_inventory::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(office_inventory::Column::OfficeId.eq(office_id))
        .filter(office_inventory::Column::ItemId.eq(item_id))
        .filter(office_inventory::Column::Quantity.gte(quantity))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        ensure_office_and_item(conn, office_id, item_id).await?;
        let available = get_quantity(conn, office_id, item_id).await?;
        LEDGER_FAILURES
            .with_label_values(&["insufficient_stock"])
            .inc();
        debug!(office_id, item_id, quantity, available, "reservation refused");
        return Err(ServiceError::InsufficientStock {
            requested: quantity,
            available,
        });
    }

    Ok(ReservationToken {
        office_id,
        item_id,
        quantity,
    })
}

/// Adds `quantity` units to the office's stock, creating the entry on first
/// arrival. Refuses an increment that would carry the counter past
/// `i32::MAX`.
#[instrument(skip(conn))]
pub async fn commit_receive<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    item_id: i32,
    quantity: i32,
) -> Result<(), ServiceError> {
    ensure_positive(quantity)?;
    ensure_office_and_item(conn, office_id, item_id).await?;

    let now = Utc::now();
    let entry = office_inventory::ActiveModel {
        id: NotSet,
        office_id: Set(office_id),
        item_id: Set(item_id),
        quantity: Set(quantity),
        version: Set(1),
        created_at: Set(now),
        updated_at: Set(now),
    };

    let applied = OfficeInventory::insert(entry)
        .on_conflict(
            OnConflict::columns([
                office_inventory::Column::OfficeId,
                office_inventory::Column::ItemId,
            ])
            .value(
                office_inventory::Column::Quantity,
                Expr::col((OfficeInventory, office_inventory::Column::Quantity)).add(quantity),
            )
            .value(
                office_inventory::Column::Version,
                Expr::col((OfficeInventory, office_inventory::Column::Version)).add(1),
            )
            .value(office_inventory::Column::UpdatedAt, Expr::value(now))
            .action_and_where(
                Expr::col((OfficeInventory, office_inventory::Column::Quantity))
                    .lte(i32::MAX - quantity),
            )
            .to_owned(),
        )
        .exec_without_returning(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if applied == 0 {
        LEDGER_FAILURES.with_label_values(&["stock_limit"]).inc();
        debug!(office_id, item_id, quantity, "increment refused");
        return Err(ServiceError::ValidationError(format!(
            "Receiving {} units would exceed the stock limit for item {} at office {}",
            quantity, item_id, office_id
        )));
    }

    Ok(())
}

/// Gives reserved units back to the office they were taken from.
pub async fn release<C: ConnectionTrait>(
    conn: &C,
    token: ReservationToken,
) -> Result<(), ServiceError> {
    commit_receive(conn, token.office_id, token.item_id, token.quantity).await
}

/// Signed correction. Negative deltas follow [`reserve`] and can never push
/// the counter below zero. Returns the resulting quantity.
pub async fn adjust<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    item_id: i32,
    delta: i32,
) -> Result<i32, ServiceError> {
    match delta {
        0 => {
            return Err(ServiceError::ValidationError(
                "Adjustment delta must not be zero".to_string(),
            ))
        }
        d if d > 0 => commit_receive(conn, office_id, item_id, d).await?,
        d => {
            let amount = d.checked_neg().ok_or_else(|| {
                ServiceError::ValidationError("Adjustment delta out of range".to_string())
            })?;
            reserve(conn, office_id, item_id, amount).await?;
        }
    }
    get_quantity(conn, office_id, item_id).await
}

pub async fn list_by_office<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
) -> Result<Vec<office_inventory::Model>, ServiceError> {
    OfficeInventory::find()
        .filter(office_inventory::Column::OfficeId.eq(office_id))
        .order_by_asc(office_inventory::Column::ItemId)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}

pub async fn list_by_item<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
) -> Result<Vec<office_inventory::Model>, ServiceError> {
    OfficeInventory::find()
        .filter(office_inventory::Column::ItemId.eq(item_id))
        .order_by_asc(office_inventory::Column::OfficeId)
        .all(conn)
        .await
        .map_err(ServiceError::db_error)
}
