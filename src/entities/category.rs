//! Category entity - Groups products in the catalog.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Category database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "categories")]
pub struct Model {
    /// Unique identifier for the category
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Category name (e.g., "Lighting")
    #[sea_orm(unique)]
    pub name: String,
    /// Parent category for nested catalogs, `None` for top-level categories
    pub parent_id: Option<i64>,
}

/// Defines relationships between Category and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Optional parent category
    #[sea_orm(belongs_to = "Entity", from = "Column::ParentId", to = "Column::Id")]
    Parent,
    /// One category has many products
    #[sea_orm(has_many = "super::product::Entity")]
    Products,
}

impl Related<super::product::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Products.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
