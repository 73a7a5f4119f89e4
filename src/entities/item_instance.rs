use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Lifecycle of a single barcoded unit.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, EnumIter, DeriveActiveEnum, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstanceStatus {
    #[sea_orm(string_value = "IN_STOCK")]
    InStock,
    #[sea_orm(string_value = "DISTRIBUTED")]
    Distributed,
    #[sea_orm(string_value = "DAMAGED")]
    Damaged,
    #[sea_orm(string_value = "LOST")]
    Lost,
    #[sea_orm(string_value = "RETIRED")]
    Retired,
}

impl InstanceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstanceStatus::InStock => "IN_STOCK",
            InstanceStatus::Distributed => "DISTRIBUTED",
            InstanceStatus::Damaged => "DAMAGED",
            InstanceStatus::Lost => "LOST",
            InstanceStatus::Retired => "RETIRED",
        }
    }

    /// Units that can still move between offices.
    pub fn is_circulating(&self) -> bool {
        matches!(self, InstanceStatus::InStock | InstanceStatus::Distributed)
    }

    /// Allowed status changes. Only IN_STOCK and DISTRIBUTED flip back and
    /// forth; everything else moves toward RETIRED.
    pub fn can_transition_to(&self, next: InstanceStatus) -> bool {
        use InstanceStatus::*;
        match (*self, next) {
            (InStock, Distributed) | (Distributed, InStock) => true,
            (InStock | Distributed, Damaged | Lost | Retired) => true,
            (Damaged | Lost, Retired) => true,
            _ => false,
        }
    }
}

impl std::fmt::Display for InstanceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "item_instances")]
#[serde(rename_all = "camelCase")]
#[schema(as = ItemInstance)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub item_id: i32,
    #[sea_orm(unique)]
    pub barcode: String,
    #[sea_orm(column_type = "Decimal(Some((12, 2)))")]
    pub unit_price: Decimal,
    pub status: InstanceStatus,
    pub current_office_id: i32,
    pub distributed_at: Option<DateTime<Utc>>,
    pub purchase_id: Option<i32>,
    pub remarks: Option<String>,
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
    #[sea_orm(
        belongs_to = "super::office::Entity",
        from = "Column::CurrentOfficeId",
        to = "super::office::Column::Id"
    )]
    CurrentOffice,
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

#[cfg(test)]
mod tests {
    use super::InstanceStatus::{self, *};
    use rstest::rstest;

    #[rstest]
    #[case(InStock, Distributed, true)]
    #[case(Distributed, InStock, true)]
    #[case(InStock, Damaged, true)]
    #[case(Distributed, Lost, true)]
    #[case(Damaged, Retired, true)]
    #[case(Lost, Retired, true)]
    #[case(Damaged, InStock, false)]
    #[case(Lost, Distributed, false)]
    #[case(Retired, InStock, false)]
    #[case(Retired, Damaged, false)]
    #[case(InStock, InStock, false)]
    fn transition_table(
        #[case] from: InstanceStatus,
        #[case] to: InstanceStatus,
        #[case] allowed: bool,
    ) {
        assert_eq!(from.can_transition_to(to), allowed);
    }

    #[test]
    fn only_stock_and_distributed_circulate() {
        assert!(InStock.is_circulating());
        assert!(Distributed.is_circulating());
        assert!(!Damaged.is_circulating());
        assert!(!Lost.is_circulating());
        assert!(!Retired.is_circulating());
    }

    #[test]
    fn serializes_in_wire_format() {
        assert_eq!(serde_json::to_string(&InStock).unwrap(), "\"IN_STOCK\"");
    }
}
