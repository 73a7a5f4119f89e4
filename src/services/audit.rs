//! Append-only audit trail of stock movements.
//!
//! Rows are written inside the caller's transaction. A row only changes while
//! it is PENDING, and only through [`transition`] or [`update_pending`], both
//! of which are conditional on the PENDING status.

use crate::{
    entities::office_transaction::{
        self, Entity as OfficeTransaction, TransactionStatus, TransactionType,
    },
    errors::ServiceError,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Select, Set,
};
use tracing::debug;

/// Everything needed to write one audit row.
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub reference_number: String,
    pub transaction_type: TransactionType,
    pub item_id: i32,
    pub from_office_id: Option<i32>,
    pub to_office_id: Option<i32>,
    pub quantity: i32,
    pub status: TransactionStatus,
    pub initiated_by: i32,
    pub approved_by: Option<i32>,
    pub remarks: Option<String>,
    pub transfer_id: Option<i32>,
}

impl NewEntry {
    /// A movement that needs no approval: recorded as COMPLETED and approved
    /// by whoever made it.
    pub fn completed(
        transaction_type: TransactionType,
        item_id: i32,
        from_office_id: Option<i32>,
        to_office_id: Option<i32>,
        quantity: i32,
        initiated_by: i32,
        remarks: Option<String>,
    ) -> Self {
        Self {
            reference_number: super::reference_number(transaction_type.reference_prefix()),
            transaction_type,
            item_id,
            from_office_id,
            to_office_id,
            quantity,
            status: TransactionStatus::Completed,
            initiated_by,
            approved_by: Some(initiated_by),
            remarks,
            transfer_id: None,
        }
    }
}

pub async fn record<C: ConnectionTrait>(
    conn: &C,
    entry: NewEntry,
) -> Result<office_transaction::Model, ServiceError> {
    let now = Utc::now();
    let approved_at = entry.approved_by.map(|_| now);
    office_transaction::ActiveModel {
        reference_number: Set(entry.reference_number),
        transaction_type: Set(entry.transaction_type),
        item_id: Set(entry.item_id),
        from_office_id: Set(entry.from_office_id),
        to_office_id: Set(entry.to_office_id),
        quantity: Set(entry.quantity),
        status: Set(entry.status),
        initiated_by: Set(entry.initiated_by),
        approved_by: Set(entry.approved_by),
        approved_at: Set(approved_at),
        rejection_reason: Set(None),
        remarks: Set(entry.remarks),
        transfer_id: Set(entry.transfer_id),
        transaction_date: Set(now),
        ..Default::default()
    }
    .insert(conn)
    .await
    .map_err(ServiceError::db_error)
}

/// Moves a PENDING row to its final status. Fails with `Conflict` when the
/// row is missing or already final, so each outcome is written exactly once.
pub async fn transition<C: ConnectionTrait>(
    conn: &C,
    reference_number: &str,
    new_status: TransactionStatus,
    approved_by: Option<i32>,
    rejection_reason: Option<String>,
) -> Result<(), ServiceError> {
    let now = Utc::now();
    let mut update = OfficeTransaction::update_many()
        .col_expr(office_transaction::Column::Status, Expr::value(new_status.as_str()))
        .col_expr(office_transaction::Column::UpdatedAt, Expr::value(now));
    if let Some(user_id) = approved_by {
        update = update
            .col_expr(office_transaction::Column::ApprovedBy, Expr::value(user_id))
            .col_expr(office_transaction::Column::ApprovedAt, Expr::value(now));
    }
    if let Some(reason) = rejection_reason {
        update = update.col_expr(office_transaction::Column::RejectionReason, Expr::value(reason));
    }

    let result = update
        .filter(office_transaction::Column::ReferenceNumber.eq(reference_number))
        .filter(office_transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;

    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Audit entry {} is no longer pending",
            reference_number
        )));
    }
    debug!(reference_number, status = %new_status, "audit entry finalised");
    Ok(())
}

/// Keeps a PENDING row in step with an edited transfer.
pub async fn update_pending<C: ConnectionTrait>(
    conn: &C,
    reference_number: &str,
    quantity: i32,
    remarks: Option<String>,
) -> Result<(), ServiceError> {
    let result = OfficeTransaction::update_many()
        .col_expr(office_transaction::Column::Quantity, Expr::value(quantity))
        .col_expr(office_transaction::Column::Remarks, Expr::value(remarks))
        .col_expr(office_transaction::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(office_transaction::Column::ReferenceNumber.eq(reference_number))
        .filter(office_transaction::Column::Status.eq(TransactionStatus::Pending))
        .exec(conn)
        .await
        .map_err(ServiceError::db_error)?;
    if result.rows_affected == 0 {
        return Err(ServiceError::Conflict(format!(
            "Audit entry {} is no longer pending",
            reference_number
        )));
    }
    Ok(())
}

async fn fetch_page<C: ConnectionTrait>(
    conn: &C,
    query: Select<OfficeTransaction>,
    page: u64,
    limit: u64,
) -> Result<(Vec<office_transaction::Model>, u64), ServiceError> {
    let paginator = query
        .order_by_desc(office_transaction::Column::TransactionDate)
        .order_by_desc(office_transaction::Column::Id)
        .paginate(conn, limit.max(1));
    let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
    let rows = paginator
        .fetch_page(super::page_index(page))
        .await
        .map_err(ServiceError::db_error)?;
    Ok((rows, total))
}

fn touches_office(office_id: i32) -> Condition {
    Condition::any()
        .add(office_transaction::Column::FromOfficeId.eq(office_id))
        .add(office_transaction::Column::ToOfficeId.eq(office_id))
}

/// Rows where the office is on either side, newest first.
pub async fn by_office<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    page: u64,
    limit: u64,
) -> Result<(Vec<office_transaction::Model>, u64), ServiceError> {
    fetch_page(
        conn,
        OfficeTransaction::find().filter(touches_office(office_id)),
        page,
        limit,
    )
    .await
}

/// Movement history of one item, newest first. `office_id` narrows it to
/// rows touching that office.
pub async fn by_item<C: ConnectionTrait>(
    conn: &C,
    item_id: i32,
    office_id: Option<i32>,
    page: u64,
    limit: u64,
) -> Result<(Vec<office_transaction::Model>, u64), ServiceError> {
    let mut query =
        OfficeTransaction::find().filter(office_transaction::Column::ItemId.eq(item_id));
    if let Some(office_id) = office_id {
        query = query.filter(touches_office(office_id));
    }
    fetch_page(conn, query, page, limit).await
}

pub async fn by_reference<C: ConnectionTrait>(
    conn: &C,
    reference_number: &str,
) -> Result<Option<office_transaction::Model>, ServiceError> {
    OfficeTransaction::find()
        .filter(office_transaction::Column::ReferenceNumber.eq(reference_number))
        .one(conn)
        .await
        .map_err(ServiceError::db_error)
}

pub async fn pending_by_office<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    page: u64,
    limit: u64,
) -> Result<(Vec<office_transaction::Model>, u64), ServiceError> {
    fetch_page(
        conn,
        OfficeTransaction::find()
            .filter(touches_office(office_id))
            .filter(office_transaction::Column::Status.eq(TransactionStatus::Pending)),
        page,
        limit,
    )
    .await
}

/// Completed distributions sent out by the office.
pub async fn distribution_history<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    page: u64,
    limit: u64,
) -> Result<(Vec<office_transaction::Model>, u64), ServiceError> {
    fetch_page(
        conn,
        OfficeTransaction::find()
            .filter(office_transaction::Column::FromOfficeId.eq(office_id))
            .filter(
                office_transaction::Column::TransactionType.eq(TransactionType::Distribution),
            )
            .filter(office_transaction::Column::Status.eq(TransactionStatus::Completed)),
        page,
        limit,
    )
    .await
}

/// Completed returns received by the office.
pub async fn return_history<C: ConnectionTrait>(
    conn: &C,
    office_id: i32,
    page: u64,
    limit: u64,
) -> Result<(Vec<office_transaction::Model>, u64), ServiceError> {
    fetch_page(
        conn,
        OfficeTransaction::find()
            .filter(office_transaction::Column::ToOfficeId.eq(office_id))
            .filter(office_transaction::Column::TransactionType.eq(TransactionType::Return))
            .filter(office_transaction::Column::Status.eq(TransactionStatus::Completed)),
        page,
        limit,
    )
    .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::test_support::{seed_item, seed_office, test_db};
    use assert_matches::assert_matches;

    fn pending(item_id: i32, from: i32, to: i32) -> NewEntry {
        NewEntry {
            reference_number: crate::services::reference_number("DIST"),
            transaction_type: TransactionType::Distribution,
            item_id,
            from_office_id: Some(from),
            to_office_id: Some(to),
            quantity: 4,
            status: TransactionStatus::Pending,
            initiated_by: 7,
            approved_by: None,
            remarks: None,
            transfer_id: Some(1),
        }
    }

    #[tokio::test]
    async fn transitions_apply_once() {
        let db = test_db().await;
        let a = seed_office(&db, "A", None).await;
        let b = seed_office(&db, "B", None).await;
        let item = seed_item(&db, "BOOK").await;

        let row = record(&db, pending(item.id, a.id, b.id)).await.unwrap();
        assert_eq!(row.status, TransactionStatus::Pending);
        assert!(row.approved_at.is_none());

        transition(&db, &row.reference_number, TransactionStatus::Completed, Some(9), None)
            .await
            .unwrap();
        assert_matches!(
            transition(
                &db,
                &row.reference_number,
                TransactionStatus::Rejected,
                None,
                Some("late".into())
            )
            .await,
            Err(ServiceError::Conflict(_))
        );

        let stored = by_reference(&db, &row.reference_number).await.unwrap().unwrap();
        assert_eq!(stored.status, TransactionStatus::Completed);
        assert_eq!(stored.approved_by, Some(9));
        assert!(stored.rejection_reason.is_none());
    }

    #[tokio::test]
    async fn rejection_reason_is_kept() {
        let db = test_db().await;
        let a = seed_office(&db, "A", None).await;
        let b = seed_office(&db, "B", None).await;
        let item = seed_item(&db, "BOOK").await;
        let row = record(&db, pending(item.id, a.id, b.id)).await.unwrap();

        transition(
            &db,
            &row.reference_number,
            TransactionStatus::Rejected,
            None,
            Some("wrong item".into()),
        )
        .await
        .unwrap();
        let stored = by_reference(&db, &row.reference_number).await.unwrap().unwrap();
        assert_eq!(stored.rejection_reason.as_deref(), Some("wrong item"));
        assert_matches!(
            update_pending(&db, &row.reference_number, 2, None).await,
            Err(ServiceError::Conflict(_))
        );
    }

    #[tokio::test]
    async fn office_queries_filter_by_side_and_type() {
        let db = test_db().await;
        let parent = seed_office(&db, "P", None).await;
        let child = seed_office(&db, "C", Some(parent.id)).await;
        let item = seed_item(&db, "BOOK").await;

        record(
            &db,
            NewEntry::completed(
                TransactionType::Distribution,
                item.id,
                Some(parent.id),
                Some(child.id),
                5,
                1,
                None,
            ),
        )
        .await
        .unwrap();
        record(
            &db,
            NewEntry::completed(
                TransactionType::Return,
                item.id,
                Some(child.id),
                Some(parent.id),
                2,
                2,
                None,
            ),
        )
        .await
        .unwrap();
        record(&db, pending(item.id, parent.id, child.id)).await.unwrap();

        assert_eq!(by_office(&db, child.id, 1, 10).await.unwrap().1, 3);
        assert_eq!(pending_by_office(&db, parent.id, 1, 10).await.unwrap().1, 1);
        assert_eq!(distribution_history(&db, parent.id, 1, 10).await.unwrap().1, 1);
        assert_eq!(distribution_history(&db, child.id, 1, 10).await.unwrap().1, 0);
        assert_eq!(return_history(&db, parent.id, 1, 10).await.unwrap().1, 1);

        let (history, total) = by_item(&db, item.id, None, 1, 2).await.unwrap();
        assert_eq!(total, 3);
        assert_eq!(history.len(), 2);
        assert!(history[0].id > history[1].id);
    }
}
