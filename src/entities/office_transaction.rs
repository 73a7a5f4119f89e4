use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub use super::transfer::TransferStatus as TransactionStatus;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    #[sea_orm(string_value = "DISTRIBUTION")]
    Distribution,
    #[sea_orm(string_value = "RETURN")]
    Return,
    #[sea_orm(string_value = "PURCHASE")]
    Purchase,
    #[sea_orm(string_value = "ADJUSTMENT")]
    Adjustment,
}

impl TransactionType {
    /// Prefix of reference numbers minted for this kind of movement.
    pub fn reference_prefix(&self) -> &'static str {
        match self {
            TransactionType::Distribution => "DIST",
            TransactionType::Return => "RET",
            TransactionType::Purchase => "PUR",
            TransactionType::Adjustment => "ADJ",
        }
    }
}

/// Append-only audit entry for every stock movement. Once its status is
/// terminal the row is never touched again, and rows are never deleted.
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "office_transactions")]
#[serde(rename_all = "camelCase")]
#[schema(as = OfficeTransaction)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    #[sea_orm(unique)]
    pub reference_number: String,
    pub transaction_type: TransactionType,
    pub item_id: i32,
    pub from_office_id: Option<i32>,
    pub to_office_id: Option<i32>,
    pub quantity: i32,
    pub status: TransactionStatus,
    pub initiated_by: i32,
    pub approved_by: Option<i32>,
    pub approved_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub remarks: Option<String>,
    pub transfer_id: Option<i32>,
    pub transaction_date: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::item::Entity",
        from = "Column::ItemId",
        to = "super::item::Column::Id"
    )]
    Item,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

#[async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;
        let now = Utc::now();
        if insert {
            active_model.created_at = Set(now);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}
