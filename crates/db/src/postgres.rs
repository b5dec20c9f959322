//! PostgreSQL store backed by `SeaORM`.
//!
//! Enumerations are stored as their snake_case strings and composite values
//! (module grants, permissions, approval limits, assignments) as JSONB. Rows
//! that no longer map back to a domain value surface as
//! [`StoreError::Corrupt`].

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::prelude::{DateTimeWithTimeZone, Json};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Set, TransactionTrait,
};
use serde::Serialize;
use serde::de::DeserializeOwned;
use spendgate_core::access::{Scoped, Stamped};
use spendgate_core::identity::{
    ApprovalCategory, Department, NewUser, Role, User, UserStatus, UserUpdate,
};
use spendgate_core::spend::{NewTradeSpend, SpendStatus, TradeSpend, TradeSpendFilter};
use spendgate_core::tenant::{
    Company, CompanyStatus, CompanyUpdate, ModuleGrant, NewCompany, Plan, Resource,
    ResourceLimits, StatusChange, Subscription, SubscriptionStatus, plan_transition,
};
use spendgate_shared::types::{CompanyId, CustomerId, TradeSpendId, UserId, VendorId};
use uuid::Uuid;

use crate::entities::{companies, company_status_history, trade_spends, users};
use crate::error::StoreError;
use crate::store::{
    CompanyStore, StatusChangeOutcome, StoreResult, TradeSpendStore, UserFilter, UserStore,
    UserTotals,
};

/// Store over a `SeaORM` connection.
#[derive(Debug, Clone)]
pub struct PgStore {
    db: DatabaseConnection,
}

impl PgStore {
    /// Creates a store over an open connection.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// The underlying connection.
    #[must_use]
    pub const fn connection(&self) -> &DatabaseConnection {
        &self.db
    }
}

fn corrupt(column: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Corrupt(format!("unexpected {column} value '{value}'"))
}

fn parse_column<T>(
    value: &str,
    column: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> StoreResult<T> {
    parse(value).ok_or_else(|| corrupt(column, value))
}

fn from_json<T: DeserializeOwned>(value: Json, column: &str) -> StoreResult<T> {
    serde_json::from_value(value).map_err(|e| corrupt(column, e))
}

fn to_json<T: Serialize>(value: &T, column: &str) -> StoreResult<Json> {
    serde_json::to_value(value).map_err(|e| corrupt(column, e))
}

fn utc(at: DateTimeWithTimeZone) -> DateTime<Utc> {
    at.with_timezone(&Utc)
}

fn limit_from_db(value: Option<i32>, column: &str) -> StoreResult<Option<u32>> {
    value
        .map(|v| u32::try_from(v).map_err(|_| corrupt(column, v)))
        .transpose()
}

fn limit_to_db(value: Option<u32>) -> Option<i32> {
    value.map(|v| i32::try_from(v).unwrap_or(i32::MAX))
}

fn user_from_model(m: users::Model) -> StoreResult<User> {
    Ok(User {
        id: UserId::from_uuid(m.id),
        company_id: m.company_id.map(CompanyId::from_uuid),
        employee_id: m.employee_id,
        email: m.email,
        password_hash: m.password_hash,
        first_name: m.first_name,
        last_name: m.last_name,
        role: parse_column(&m.role, "users.role", Role::parse)?,
        department: parse_column(&m.department, "users.department", Department::parse)?,
        permissions: from_json(m.permissions, "users.permissions")?,
        approval_limits: from_json(m.approval_limits, "users.approval_limits")?,
        assigned: from_json(m.assigned, "users.assigned")?,
        is_active: m.is_active,
        status: parse_column(&m.status, "users.status", UserStatus::parse)?,
        password_changed_at: m.password_changed_at.map(utc),
        last_login_at: m.last_login_at.map(utc),
        created_at: utc(m.created_at),
        updated_at: utc(m.updated_at),
    })
}

fn user_to_active(u: &User) -> StoreResult<users::ActiveModel> {
    Ok(users::ActiveModel {
        id: Set(u.id.into_inner()),
        company_id: Set(u.company_id.map(CompanyId::into_inner)),
        employee_id: Set(u.employee_id.clone()),
        email: Set(u.email.clone()),
        password_hash: Set(u.password_hash.clone()),
        first_name: Set(u.first_name.clone()),
        last_name: Set(u.last_name.clone()),
        role: Set(u.role.as_str().to_string()),
        department: Set(u.department.as_str().to_string()),
        permissions: Set(to_json(&u.permissions, "users.permissions")?),
        approval_limits: Set(to_json(&u.approval_limits, "users.approval_limits")?),
        assigned: Set(to_json(&u.assigned, "users.assigned")?),
        is_active: Set(u.is_active),
        status: Set(u.status.as_str().to_string()),
        password_changed_at: Set(u.password_changed_at.map(Into::into)),
        last_login_at: Set(u.last_login_at.map(Into::into)),
        created_at: Set(u.created_at.into()),
        updated_at: Set(u.updated_at.into()),
    })
}

fn change_from_model(m: company_status_history::Model) -> StoreResult<StatusChange> {
    Ok(StatusChange {
        from: parse_column(&m.from_status, "history.from_status", CompanyStatus::parse)?,
        to: parse_column(&m.to_status, "history.to_status", CompanyStatus::parse)?,
        actor: UserId::from_uuid(m.actor_id),
        reason: m.reason,
        at: utc(m.changed_at),
    })
}

fn company_from_model(
    m: companies::Model,
    status_history: Vec<StatusChange>,
) -> StoreResult<Company> {
    Ok(Company {
        id: CompanyId::from_uuid(m.id),
        name: m.name,
        code: m.code,
        domain: m.domain,
        status: parse_column(&m.status, "companies.status", CompanyStatus::parse)?,
        subscription: Subscription {
            plan: parse_column(&m.plan, "companies.plan", Plan::parse)?,
            status: parse_column(
                &m.subscription_status,
                "companies.subscription_status",
                SubscriptionStatus::parse,
            )?,
            limits: ResourceLimits {
                max_users: limit_from_db(m.max_users, "companies.max_users")?,
                max_customers: limit_from_db(m.max_customers, "companies.max_customers")?,
                max_products: limit_from_db(m.max_products, "companies.max_products")?,
                max_budgets: limit_from_db(m.max_budgets, "companies.max_budgets")?,
            },
            expires_at: m.expires_at.map(utc),
        },
        modules: from_json(m.modules, "companies.modules")?,
        contact: from_json(m.contact, "companies.contact")?,
        status_history,
        created_by: m.created_by.map(UserId::from_uuid),
        created_at: utc(m.created_at),
        updated_at: utc(m.updated_at),
    })
}

fn company_to_active(c: &Company) -> StoreResult<companies::ActiveModel> {
    let limits = c.subscription.limits;
    Ok(companies::ActiveModel {
        id: Set(c.id.into_inner()),
        name: Set(c.name.clone()),
        code: Set(c.code.clone()),
        domain: Set(c.domain.clone()),
        status: Set(c.status.as_str().to_string()),
        plan: Set(c.subscription.plan.as_str().to_string()),
        subscription_status: Set(c.subscription.status.as_str().to_string()),
        max_users: Set(limit_to_db(limits.max_users)),
        max_customers: Set(limit_to_db(limits.max_customers)),
        max_products: Set(limit_to_db(limits.max_products)),
        max_budgets: Set(limit_to_db(limits.max_budgets)),
        expires_at: Set(c.subscription.expires_at.map(Into::into)),
        modules: Set(to_json(&c.modules, "companies.modules")?),
        contact: Set(to_json(&c.contact, "companies.contact")?),
        created_by: Set(c.created_by.map(UserId::into_inner)),
        created_at: Set(c.created_at.into()),
        updated_at: Set(c.updated_at.into()),
    })
}

fn spend_from_model(m: trade_spends::Model) -> StoreResult<TradeSpend> {
    Ok(TradeSpend {
        id: TradeSpendId::from_uuid(m.id),
        company_id: CompanyId::from_uuid(m.company_id),
        customer_id: CustomerId::from_uuid(m.customer_id),
        vendor_id: m.vendor_id.map(VendorId::from_uuid),
        category: parse_column(&m.category, "trade_spends.category", ApprovalCategory::parse)?,
        amount: m.amount,
        description: m.description,
        status: parse_column(&m.status, "trade_spends.status", SpendStatus::parse)?,
        created_by: UserId::from_uuid(m.created_by),
        approved_by: m.approved_by.map(UserId::from_uuid),
        approved_at: m.approved_at.map(utc),
        created_at: utc(m.created_at),
        updated_at: utc(m.updated_at),
    })
}

fn spend_to_active(s: &TradeSpend) -> trade_spends::ActiveModel {
    trade_spends::ActiveModel {
        id: Set(s.id.into_inner()),
        company_id: Set(s.company_id.into_inner()),
        customer_id: Set(s.customer_id.into_inner()),
        vendor_id: Set(s.vendor_id.map(VendorId::into_inner)),
        category: Set(s.category.as_str().to_string()),
        amount: Set(s.amount),
        description: Set(s.description.clone()),
        status: Set(s.status.as_str().to_string()),
        created_by: Set(s.created_by.into_inner()),
        approved_by: Set(s.approved_by.map(UserId::into_inner)),
        approved_at: Set(s.approved_at.map(Into::into)),
        created_at: Set(s.created_at.into()),
        updated_at: Set(s.updated_at.into()),
    }
}

/// Loads the status history of the given companies, oldest first.
async fn load_history<C: ConnectionTrait>(
    conn: &C,
    company_ids: Vec<Uuid>,
) -> StoreResult<HashMap<Uuid, Vec<StatusChange>>> {
    let rows = company_status_history::Entity::find()
        .filter(company_status_history::Column::CompanyId.is_in(company_ids))
        .order_by_asc(company_status_history::Column::ChangedAt)
        .all(conn)
        .await?;

    let mut by_company: HashMap<Uuid, Vec<StatusChange>> = HashMap::new();
    for row in rows {
        let company_id = row.company_id;
        by_company
            .entry(company_id)
            .or_default()
            .push(change_from_model(row)?);
    }
    Ok(by_company)
}

async fn load_company<C: ConnectionTrait>(
    conn: &C,
    id: CompanyId,
) -> StoreResult<Option<Company>> {
    let Some(model) = companies::Entity::find_by_id(id.into_inner()).one(conn).await? else {
        return Ok(None);
    };
    let history = load_history(conn, vec![model.id])
        .await?
        .remove(&model.id)
        .unwrap_or_default();
    company_from_model(model, history).map(Some)
}

impl PgStore {
    async fn scoped_user_model(
        &self,
        scope: &Scoped<UserId>,
    ) -> StoreResult<Option<users::Model>> {
        Ok(users::Entity::find_by_id(scope.filter().into_inner())
            .filter(users::Column::CompanyId.eq(scope.company_id().into_inner()))
            .one(&self.db)
            .await?)
    }

    async fn save_user(&self, user: &User) -> StoreResult<User> {
        let model = user_to_active(user)?.update(&self.db).await?;
        user_from_model(model)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_user(&self, id: UserId) -> StoreResult<Option<User>> {
        users::Entity::find_by_id(id.into_inner())
            .one(&self.db)
            .await?
            .map(user_from_model)
            .transpose()
    }

    async fn find_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.db)
            .await?
            .map(user_from_model)
            .transpose()
    }

    async fn create_platform_user(&self, new: NewUser) -> StoreResult<User> {
        let user = new.into_user(UserId::new(), Utc::now());
        let model = user_to_active(&user)?.insert(&self.db).await?;
        user_from_model(model)
    }

    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> StoreResult<()> {
        users::Entity::update_many()
            .col_expr(users::Column::LastLoginAt, Expr::value(at))
            .filter(users::Column::Id.eq(id.into_inner()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn change_password(
        &self,
        id: UserId,
        password_hash: String,
        at: DateTime<Utc>,
    ) -> StoreResult<()> {
        users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(password_hash))
            .col_expr(users::Column::PasswordChangedAt, Expr::value(at))
            .col_expr(users::Column::UpdatedAt, Expr::value(at))
            .filter(users::Column::Id.eq(id.into_inner()))
            .exec(&self.db)
            .await?;
        Ok(())
    }

    async fn rename_user(
        &self,
        id: UserId,
        first_name: String,
        last_name: String,
    ) -> StoreResult<Option<User>> {
        let Some(model) = users::Entity::find_by_id(id.into_inner()).one(&self.db).await? else {
            return Ok(None);
        };
        let mut user = user_from_model(model)?;
        user.first_name = first_name;
        user.last_name = last_name;
        user.updated_at = Utc::now();
        self.save_user(&user).await.map(Some)
    }

    async fn user_totals(&self) -> StoreResult<UserTotals> {
        let tenant_users = users::Entity::find().filter(users::Column::CompanyId.is_not_null());
        let total = tenant_users.clone().count(&self.db).await?;
        let active = tenant_users
            .filter(users::Column::IsActive.eq(true))
            .filter(users::Column::Status.eq(UserStatus::Active.as_str()))
            .count(&self.db)
            .await?;
        Ok(UserTotals { total, active })
    }

    async fn list_users(&self, scope: Scoped<UserFilter>) -> StoreResult<Vec<User>> {
        let (company_id, filter) = scope.into_parts();
        let mut query =
            users::Entity::find().filter(users::Column::CompanyId.eq(company_id.into_inner()));
        if let Some(role) = filter.role {
            query = query.filter(users::Column::Role.eq(role.as_str()));
        }
        if let Some(active) = filter.is_active {
            query = query.filter(users::Column::IsActive.eq(active));
        }
        query
            .order_by_asc(users::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(user_from_model)
            .collect()
    }

    async fn count_users(&self, scope: Scoped<()>) -> StoreResult<u64> {
        Ok(users::Entity::find()
            .filter(users::Column::CompanyId.eq(scope.company_id().into_inner()))
            .count(&self.db)
            .await?)
    }

    async fn get_user(&self, scope: Scoped<UserId>) -> StoreResult<Option<User>> {
        self.scoped_user_model(&scope)
            .await?
            .map(user_from_model)
            .transpose()
    }

    async fn create_user(&self, new: Stamped<NewUser>) -> StoreResult<User> {
        let company_id = new.company_id();
        let mut user = new.into_inner().into_user(UserId::new(), Utc::now());
        user.company_id = Some(company_id);

        let txn = self.db.begin().await?;
        // Row lock serialises concurrent creates against the same quota.
        if let Some(company) = companies::Entity::find_by_id(company_id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await?
        {
            let current = users::Entity::find()
                .filter(users::Column::CompanyId.eq(company_id.into_inner()))
                .count(&txn)
                .await?;
            company_from_model(company, Vec::new())?
                .subscription
                .limits
                .check(Resource::Users, current)?;
        }
        let model = user_to_active(&user)?.insert(&txn).await?;
        txn.commit().await?;
        user_from_model(model)
    }

    async fn update_user(
        &self,
        scope: Scoped<UserId>,
        update: UserUpdate,
    ) -> StoreResult<Option<User>> {
        let Some(model) = self.scoped_user_model(&scope).await? else {
            return Ok(None);
        };
        let mut user = user_from_model(model)?;
        update.apply(&mut user, Utc::now());
        self.save_user(&user).await.map(Some)
    }

    async fn set_user_active(
        &self,
        scope: Scoped<UserId>,
        active: bool,
    ) -> StoreResult<Option<User>> {
        let Some(model) = self.scoped_user_model(&scope).await? else {
            return Ok(None);
        };
        let mut user = user_from_model(model)?;
        user.is_active = active;
        user.updated_at = Utc::now();
        self.save_user(&user).await.map(Some)
    }
}

#[async_trait]
impl CompanyStore for PgStore {
    async fn find_company(&self, id: CompanyId) -> StoreResult<Option<Company>> {
        load_company(&self.db, id).await
    }

    async fn list_companies(&self) -> StoreResult<Vec<Company>> {
        let models = companies::Entity::find()
            .order_by_asc(companies::Column::CreatedAt)
            .all(&self.db)
            .await?;
        let mut history = load_history(&self.db, models.iter().map(|m| m.id).collect()).await?;
        models
            .into_iter()
            .map(|m| {
                let entries = history.remove(&m.id).unwrap_or_default();
                company_from_model(m, entries)
            })
            .collect()
    }

    async fn create_company_with_admin(
        &self,
        company: NewCompany,
        admin: NewUser,
    ) -> StoreResult<(Company, User)> {
        let now = Utc::now();
        let company = company.into_company(CompanyId::new(), now);
        let mut admin = admin.into_user(UserId::new(), now);
        admin.company_id = Some(company.id);

        let txn = self.db.begin().await?;
        let company_model = company_to_active(&company)?.insert(&txn).await?;
        let admin_model = user_to_active(&admin)?.insert(&txn).await?;
        txn.commit().await?;

        Ok((
            company_from_model(company_model, Vec::new())?,
            user_from_model(admin_model)?,
        ))
    }

    async fn update_company(
        &self,
        id: CompanyId,
        update: CompanyUpdate,
    ) -> StoreResult<Option<Company>> {
        let Some(mut company) = load_company(&self.db, id).await? else {
            return Ok(None);
        };
        update.apply(&mut company, Utc::now());
        companies::Entity::update_many()
            .col_expr(companies::Column::Name, Expr::value(company.name.clone()))
            .col_expr(
                companies::Column::Contact,
                Expr::value(to_json(&company.contact, "companies.contact")?),
            )
            .col_expr(companies::Column::UpdatedAt, Expr::value(company.updated_at))
            .filter(companies::Column::Id.eq(id.into_inner()))
            .exec(&self.db)
            .await?;
        Ok(Some(company))
    }

    async fn update_subscription(
        &self,
        id: CompanyId,
        subscription: Subscription,
    ) -> StoreResult<Option<Company>> {
        let txn = self.db.begin().await?;
        let Some(model) = companies::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            return Ok(None);
        };
        let mut current = company_from_model(model, Vec::new())?.subscription;
        current.change_to(subscription.clone())?;

        let limits = subscription.limits;
        companies::Entity::update_many()
            .col_expr(companies::Column::Plan, Expr::value(subscription.plan.as_str()))
            .col_expr(
                companies::Column::SubscriptionStatus,
                Expr::value(subscription.status.as_str()),
            )
            .col_expr(companies::Column::MaxUsers, Expr::value(limit_to_db(limits.max_users)))
            .col_expr(
                companies::Column::MaxCustomers,
                Expr::value(limit_to_db(limits.max_customers)),
            )
            .col_expr(
                companies::Column::MaxProducts,
                Expr::value(limit_to_db(limits.max_products)),
            )
            .col_expr(
                companies::Column::MaxBudgets,
                Expr::value(limit_to_db(limits.max_budgets)),
            )
            .col_expr(companies::Column::ExpiresAt, Expr::value(subscription.expires_at))
            .col_expr(companies::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(companies::Column::Id.eq(id.into_inner()))
            .exec(&txn)
            .await?;
        txn.commit().await?;

        load_company(&self.db, id).await
    }

    async fn replace_modules(
        &self,
        id: CompanyId,
        modules: Vec<ModuleGrant>,
    ) -> StoreResult<Option<Company>> {
        let result = companies::Entity::update_many()
            .col_expr(
                companies::Column::Modules,
                Expr::value(to_json(&modules, "companies.modules")?),
            )
            .col_expr(companies::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(companies::Column::Id.eq(id.into_inner()))
            .exec(&self.db)
            .await?;

        if result.rows_affected == 0 {
            return Ok(None);
        }
        load_company(&self.db, id).await
    }

    async fn change_company_status(
        &self,
        id: CompanyId,
        to: CompanyStatus,
        actor: UserId,
        reason: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<StatusChangeOutcome>> {
        let txn = self.db.begin().await?;

        // Row lock serialises concurrent transitions of the same company.
        let Some(model) = companies::Entity::find_by_id(id.into_inner())
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            return Ok(None);
        };
        let history = load_history(&txn, vec![model.id])
            .await?
            .remove(&model.id)
            .unwrap_or_default();
        let mut company = company_from_model(model, history)?;

        let plan = plan_transition(&company, to, actor, reason, now)?;
        plan.apply_to(&mut company);

        companies::Entity::update_many()
            .col_expr(companies::Column::Status, Expr::value(to.as_str()))
            .col_expr(companies::Column::UpdatedAt, Expr::value(now))
            .filter(companies::Column::Id.eq(id.into_inner()))
            .exec(&txn)
            .await?;

        company_status_history::ActiveModel {
            id: Set(Uuid::now_v7()),
            company_id: Set(id.into_inner()),
            from_status: Set(plan.change.from.as_str().to_string()),
            to_status: Set(plan.change.to.as_str().to_string()),
            actor_id: Set(actor.into_inner()),
            reason: Set(plan.change.reason.clone()),
            changed_at: Set(now.into()),
        }
        .insert(&txn)
        .await?;

        let mut cascaded_users = 0;
        if let Some(cascade) = plan.cascade {
            let result = users::Entity::update_many()
                .col_expr(users::Column::Status, Expr::value(cascade.to.as_str()))
                .col_expr(users::Column::UpdatedAt, Expr::value(now))
                .filter(users::Column::CompanyId.eq(id.into_inner()))
                .filter(
                    users::Column::Status.is_in(cascade.from.iter().map(UserStatus::as_str)),
                )
                .exec(&txn)
                .await?;
            cascaded_users = result.rows_affected;
        }

        txn.commit().await?;

        Ok(Some(StatusChangeOutcome {
            company,
            cascaded_users,
        }))
    }
}

#[async_trait]
impl TradeSpendStore for PgStore {
    async fn list_trade_spends(
        &self,
        scope: Scoped<TradeSpendFilter>,
    ) -> StoreResult<Vec<TradeSpend>> {
        let (company_id, filter) = scope.into_parts();
        let mut query = trade_spends::Entity::find()
            .filter(trade_spends::Column::CompanyId.eq(company_id.into_inner()));
        if let Some(status) = filter.status {
            query = query.filter(trade_spends::Column::Status.eq(status.as_str()));
        }
        if let Some(customer) = filter.customer_id {
            query = query.filter(trade_spends::Column::CustomerId.eq(customer.into_inner()));
        }
        if let Some(customers) = filter.customers_in {
            query = query.filter(
                trade_spends::Column::CustomerId
                    .is_in(customers.into_iter().map(CustomerId::into_inner)),
            );
        }
        query
            .order_by_desc(trade_spends::Column::CreatedAt)
            .all(&self.db)
            .await?
            .into_iter()
            .map(spend_from_model)
            .collect()
    }

    async fn get_trade_spend(
        &self,
        scope: Scoped<TradeSpendId>,
    ) -> StoreResult<Option<TradeSpend>> {
        trade_spends::Entity::find_by_id(scope.filter().into_inner())
            .filter(trade_spends::Column::CompanyId.eq(scope.company_id().into_inner()))
            .one(&self.db)
            .await?
            .map(spend_from_model)
            .transpose()
    }

    async fn create_trade_spend(
        &self,
        new: Stamped<NewTradeSpend>,
        created_by: UserId,
    ) -> StoreResult<TradeSpend> {
        let company_id = new.company_id();
        let spend =
            new.into_inner()
                .into_spend(TradeSpendId::new(), company_id, created_by, Utc::now());
        let model = spend_to_active(&spend).insert(&self.db).await?;
        spend_from_model(model)
    }

    async fn approve_trade_spend(
        &self,
        scope: Scoped<TradeSpendId>,
        approver: UserId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<TradeSpend>> {
        let txn = self.db.begin().await?;
        let Some(model) = trade_spends::Entity::find_by_id(scope.filter().into_inner())
            .filter(trade_spends::Column::CompanyId.eq(scope.company_id().into_inner()))
            .lock_exclusive()
            .one(&txn)
            .await?
        else {
            return Ok(None);
        };

        let mut spend = spend_from_model(model)?;
        spend.approve(approver, now)?;

        let model = trade_spends::ActiveModel {
            id: Set(spend.id.into_inner()),
            status: Set(spend.status.as_str().to_string()),
            approved_by: Set(spend.approved_by.map(UserId::into_inner)),
            approved_at: Set(spend.approved_at.map(Into::into)),
            updated_at: Set(now.into()),
            ..Default::default()
        }
        .update(&txn)
        .await?;
        txn.commit().await?;

        spend_from_model(model).map(Some)
    }
}
