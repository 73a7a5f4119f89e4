use crate::{
    auth::{AccessPolicy, Action, Actor, Permission, Resource},
    db::DbPool,
    entities::{
        item::{self, Entity as Item},
        office::{self, Entity as Office},
    },
    errors::ServiceError,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use std::sync::Arc;
use tracing::{info, instrument};

#[derive(Debug, Clone)]
pub struct CreateOfficeInput {
    pub name: String,
    pub code: String,
    pub parent_id: Option<i32>,
}

#[derive(Debug, Clone)]
pub struct CreateItemInput {
    pub name: String,
    pub item_code: String,
    pub description: Option<String>,
}

/// Offices and items. Not office-scoped: anyone holding `catalog:view` sees
/// the whole catalog.
#[derive(Clone)]
pub struct CatalogService {
    db: Arc<DbPool>,
    policy: Arc<AccessPolicy>,
}

impl CatalogService {
    pub fn new(db: Arc<DbPool>, policy: Arc<AccessPolicy>) -> Self {
        Self { db, policy }
    }

    fn require(&self, actor: &Actor, action: Action) -> Result<(), ServiceError> {
        let permission = Permission::new(Resource::Catalog, action);
        if self.policy.allows(actor.role, permission) || actor.extra_permissions.contains(&permission)
        {
            Ok(())
        } else {
            Err(ServiceError::access_denied())
        }
    }

    #[instrument(skip(self, actor, input), fields(code = %input.code))]
    pub async fn create_office(
        &self,
        actor: &Actor,
        input: CreateOfficeInput,
    ) -> Result<office::Model, ServiceError> {
        self.require(actor, Action::Manage)?;
        let db = &*self.db;

        if let Some(parent_id) = input.parent_id {
            Office::find_by_id(parent_id)
                .one(db)
                .await
                .map_err(ServiceError::db_error)?
                .ok_or_else(|| {
                    ServiceError::ValidationError(format!("Parent office {} does not exist", parent_id))
                })?;
        }
        let taken = Office::find()
            .filter(office::Column::Code.eq(input.code.as_str()))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Office code {} is already in use",
                input.code
            )));
        }

        let created = office::ActiveModel {
            name: Set(input.name),
            code: Set(input.code),
            parent_id: Set(input.parent_id),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;
        info!(office_id = created.id, "office created");
        Ok(created)
    }

    pub async fn get_office(&self, actor: &Actor, id: i32) -> Result<office::Model, ServiceError> {
        self.require(actor, Action::View)?;
        Office::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Office {} not found", id)))
    }

    pub async fn list_offices(
        &self,
        actor: &Actor,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<office::Model>, u64), ServiceError> {
        self.require(actor, Action::View)?;
        let paginator = Office::find()
            .order_by_asc(office::Column::Id)
            .paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let offices = paginator
            .fetch_page(super::page_index(page))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((offices, total))
    }

    #[instrument(skip(self, actor, input), fields(item_code = %input.item_code))]
    pub async fn create_item(
        &self,
        actor: &Actor,
        input: CreateItemInput,
    ) -> Result<item::Model, ServiceError> {
        self.require(actor, Action::Manage)?;
        let db = &*self.db;

        let taken = Item::find()
            .filter(item::Column::ItemCode.eq(input.item_code.as_str()))
            .count(db)
            .await
            .map_err(ServiceError::db_error)?;
        if taken > 0 {
            return Err(ServiceError::Conflict(format!(
                "Item code {} is already in use",
                input.item_code
            )));
        }

        let created = item::ActiveModel {
            name: Set(input.name),
            item_code: Set(input.item_code),
            description: Set(input.description),
            ..Default::default()
        }
        .insert(db)
        .await
        .map_err(ServiceError::db_error)?;
        info!(item_id = created.id, "item created");
        Ok(created)
    }

    pub async fn get_item(&self, actor: &Actor, id: i32) -> Result<item::Model, ServiceError> {
        self.require(actor, Action::View)?;
        Item::find_by_id(id)
            .one(&*self.db)
            .await
            .map_err(ServiceError::db_error)?
            .ok_or_else(|| ServiceError::NotFound(format!("Item {} not found", id)))
    }

    pub async fn list_items(
        &self,
        actor: &Actor,
        page: u64,
        limit: u64,
    ) -> Result<(Vec<item::Model>, u64), ServiceError> {
        self.require(actor, Action::View)?;
        let paginator = Item::find()
            .order_by_asc(item::Column::Id)
            .paginate(&*self.db, limit.max(1));
        let total = paginator.num_items().await.map_err(ServiceError::db_error)?;
        let items = paginator
            .fetch_page(super::page_index(page))
            .await
            .map_err(ServiceError::db_error)?;
        Ok((items, total))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use crate::services::test_support::test_db;
    use assert_matches::assert_matches;

    #[tokio::test]
    async fn catalog_management_is_super_admin_only() {
        let service = CatalogService::new(
            Arc::new(test_db().await),
            Arc::new(AccessPolicy::default()),
        );
        let root = Actor::new(1, Role::SuperAdmin, None);
        let admin = Actor::new(2, Role::Admin, Some(1));
        let guest = Actor::new(3, Role::Guest, None);

        let hq = service
            .create_office(
                &root,
                CreateOfficeInput {
                    name: "Head Office".into(),
                    code: "HQ".into(),
                    parent_id: None,
                },
            )
            .await
            .unwrap();
        let branch = service
            .create_office(
                &root,
                CreateOfficeInput {
                    name: "Physics".into(),
                    code: "PHY".into(),
                    parent_id: Some(hq.id),
                },
            )
            .await
            .unwrap();
        assert_eq!(branch.parent_id, Some(hq.id));

        assert_matches!(
            service
                .create_office(
                    &root,
                    CreateOfficeInput {
                        name: "Dup".into(),
                        code: "HQ".into(),
                        parent_id: None,
                    },
                )
                .await,
            Err(ServiceError::Conflict(_))
        );
        assert_matches!(
            service
                .create_item(
                    &admin,
                    CreateItemInput {
                        name: "Chair".into(),
                        item_code: "CHR".into(),
                        description: None,
                    },
                )
                .await,
            Err(ServiceError::Forbidden(_))
        );

        let (offices, total) = service.list_offices(&guest, 1, 10).await.unwrap();
        assert_eq!(total, 2);
        assert_eq!(offices[0].code, "HQ");
        assert_matches!(service.get_item(&guest, 5).await, Err(ServiceError::NotFound(_)));
    }
}
