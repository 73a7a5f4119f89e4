use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Status shared by transfers and their audit rows. Parses
/// case-insensitively through `FromStr`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
    strum::EnumString,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE", ascii_case_insensitive)]
pub enum TransferStatus {
    #[sea_orm(string_value = "PENDING")]
    Pending,
    #[sea_orm(string_value = "APPROVED")]
    Approved,
    #[sea_orm(string_value = "REJECTED")]
    Rejected,
    #[sea_orm(string_value = "COMPLETED")]
    Completed,
    #[sea_orm(string_value = "CANCELLED")]
    Cancelled,
}

/// What a caller asks the state machine to do with a transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferAction {
    Approve,
    Reject,
    Cancel,
    Edit,
}

impl TransferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransferStatus::Pending => "PENDING",
            TransferStatus::Approved => "APPROVED",
            TransferStatus::Rejected => "REJECTED",
            TransferStatus::Completed => "COMPLETED",
            TransferStatus::Cancelled => "CANCELLED",
        }
    }

    /// Nothing leaves a terminal status. APPROVED counts as terminal because
    /// approval always runs straight through to COMPLETED.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransferStatus::Pending)
    }

    /// The status a transfer ends up in after `action`, or `None` when the
    /// action is not allowed from this status.
    pub fn apply(self, action: TransferAction) -> Option<TransferStatus> {
        match (self, action) {
            (TransferStatus::Pending, TransferAction::Approve) => Some(TransferStatus::Completed),
            (TransferStatus::Pending, TransferAction::Reject) => Some(TransferStatus::Rejected),
            (TransferStatus::Pending, TransferAction::Cancel) => Some(TransferStatus::Cancelled),
            (TransferStatus::Pending, TransferAction::Edit) => Some(TransferStatus::Pending),
            _ => None,
        }
    }
}

impl std::fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(20))")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransferType {
    #[default]
    #[sea_orm(string_value = "ALLOCATION")]
    Allocation,
    #[sea_orm(string_value = "TRANSFER")]
    Transfer,
    #[sea_orm(string_value = "MOVEMENT")]
    Movement,
    #[sea_orm(string_value = "RETURN")]
    Return,
}

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "transfers")]
#[serde(rename_all = "camelCase")]
#[schema(as = Transfer)]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub item_id: i32,
    pub from_office_id: i32,
    pub to_office_id: i32,
    pub quantity: i32,
    pub initiated_by_user_id: i32,
    pub status: TransferStatus,
    pub transfer_type: TransferType,
    pub date_distributed: DateTime<Utc>,
    pub remarks: Option<String>,
    #[sea_orm(unique)]
    pub reference_number: String,
    pub approved_by: Option<i32>,
    pub approved_at: Option<DateTime<Utc>>,
    pub version: i32,
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
    #[sea_orm(has_many = "super::transfer_instance::Entity")]
    Instances,
}

impl Related<super::item::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Item.def()
    }
}

impl Related<super::transfer_instance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instances.def()
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
            active_model.version = Set(1);
        }
        active_model.updated_at = Set(now);
        Ok(active_model)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use sea_orm::Iterable;

    fn any_status() -> impl Strategy<Value = TransferStatus> {
        prop_oneof![
            Just(TransferStatus::Pending),
            Just(TransferStatus::Approved),
            Just(TransferStatus::Rejected),
            Just(TransferStatus::Completed),
            Just(TransferStatus::Cancelled),
        ]
    }

    fn any_action() -> impl Strategy<Value = TransferAction> {
        prop_oneof![
            Just(TransferAction::Approve),
            Just(TransferAction::Reject),
            Just(TransferAction::Cancel),
            Just(TransferAction::Edit),
        ]
    }

    proptest! {
        #[test]
        fn terminal_states_absorb_every_action(status in any_status(), action in any_action()) {
            if status.is_terminal() {
                prop_assert_eq!(status.apply(action), None);
            }
        }

        #[test]
        fn any_action_sequence_stays_closed(actions in prop::collection::vec(any_action(), 0..12)) {
            let mut status = TransferStatus::Pending;
            let mut left_pending = false;
            for action in actions {
                if let Some(next) = status.apply(action) {
                    prop_assert!(!left_pending, "a terminal status accepted an action");
                    status = next;
                    left_pending = status.is_terminal();
                }
            }
            prop_assert_ne!(status, TransferStatus::Approved);
        }
    }

    #[test]
    fn pending_transitions() {
        let p = TransferStatus::Pending;
        assert_eq!(p.apply(TransferAction::Approve), Some(TransferStatus::Completed));
        assert_eq!(p.apply(TransferAction::Reject), Some(TransferStatus::Rejected));
        assert_eq!(p.apply(TransferAction::Cancel), Some(TransferStatus::Cancelled));
        assert_eq!(p.apply(TransferAction::Edit), Some(TransferStatus::Pending));
    }

    #[test]
    fn status_strings_round_trip() {
        for status in TransferStatus::iter() {
            assert_eq!(status.as_str().parse::<TransferStatus>(), Ok(status));
        }
        assert_eq!("pending".parse::<TransferStatus>(), Ok(TransferStatus::Pending));
        assert!("shipped".parse::<TransferStatus>().is_err());
    }

    #[test]
    fn transfer_type_defaults_to_allocation() {
        assert_eq!(TransferType::default(), TransferType::Allocation);
        assert_eq!(
            serde_json::from_str::<TransferType>("\"RETURN\"").unwrap(),
            TransferType::Return
        );
    }
}
