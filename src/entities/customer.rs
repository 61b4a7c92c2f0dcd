use chrono::{DateTime, Utc};
use sea_orm::entity::prelude::*;
use sea_orm::{ActiveValue, ActiveValue::Set, ConnectionTrait};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// Customer entity
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, Validate, ToSchema)]
#[sea_orm(table_name = "customers")]
pub struct Model {
    /// Primary key
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,

    /// Customer name
    #[validate(length(
        min = 1,
        max = 255,
        message = "Customer name must be between 1 and 255 characters"
    ))]
    pub name: String,

    /// Sales region the customer belongs to
    pub region: CustomerRegion,

    /// Customer classification
    pub customer_type: CustomerType,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,
}

/// Customer region enumeration, validated at the data-model boundary.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    EnumIter,
    DeriveActiveEnum,
    ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
pub enum CustomerRegion {
    #[sea_orm(string_value = "North")]
    North,
    #[sea_orm(string_value = "South")]
    South,
    #[sea_orm(string_value = "East")]
    East,
    #[sea_orm(string_value = "West")]
    West,
    #[sea_orm(string_value = "Central")]
    Central,
}

impl CustomerRegion {
    /// Stable display name, used for deterministic tie-breaks in reports.
    pub fn as_str(&self) -> &'static str {
        match self {
            CustomerRegion::North => "North",
            CustomerRegion::South => "South",
            CustomerRegion::East => "East",
            CustomerRegion::West => "West",
            CustomerRegion::Central => "Central",
        }
    }
}

/// Customer type enumeration
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
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(15))")]
pub enum CustomerType {
    #[sea_orm(string_value = "Individual")]
    Individual,
    #[sea_orm(string_value = "Business")]
    Business,
    #[sea_orm(string_value = "Government")]
    Government,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::sale::Entity")]
    Sales,
}

impl Related<super::sale::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Sales.def()
    }
}

#[async_trait::async_trait]
impl ActiveModelBehavior for ActiveModel {
    async fn before_save<C>(self, _db: &C, insert: bool) -> Result<Self, DbErr>
    where
        C: ConnectionTrait,
    {
        let mut active_model = self;

        if insert {
            if let ActiveValue::NotSet = active_model.created_at {
                active_model.created_at = Set(Utc::now());
            }
        }

        let model: Model = active_model.clone().try_into().map_err(|_| {
            DbErr::Custom("Failed to convert ActiveModel to Model for validation".to_string())
        })?;

        if let Err(err) = model.validate() {
            return Err(DbErr::Custom(format!("Validation error: {}", err)));
        }

        Ok(active_model)
    }
}
