//! `SeaORM` Entity for companies table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "companies")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub name: String,
    pub code: String,
    pub domain: String,
    pub status: String,
    pub plan: String,
    pub subscription_status: String,
    pub max_users: Option<i32>,
    pub max_customers: Option<i32>,
    pub max_products: Option<i32>,
    pub max_budgets: Option<i32>,
    pub expires_at: Option<DateTimeWithTimeZone>,
    #[sea_orm(column_type = "JsonBinary")]
    pub modules: Json,
    #[sea_orm(column_type = "JsonBinary")]
    pub contact: Json,
    pub created_by: Option<Uuid>,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::users::Entity")]
    Users,
    #[sea_orm(has_many = "super::company_status_history::Entity")]
    StatusHistory,
    #[sea_orm(has_many = "super::trade_spends::Entity")]
    TradeSpends,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Users.def()
    }
}

impl Related<super::company_status_history::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::StatusHistory.def()
    }
}

impl Related<super::trade_spends::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TradeSpends.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
