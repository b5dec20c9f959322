//! Initial database migration.
//!
//! Creates the tenant, user, status history and trade spend tables. Every
//! tenant-owned table carries a non-null `company_id`.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        db.execute_unprepared(COMPANIES_SQL).await?;
        db.execute_unprepared(USERS_SQL).await?;
        db.execute_unprepared(STATUS_HISTORY_SQL).await?;
        db.execute_unprepared(TRADE_SPENDS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(
            r"
DROP TABLE IF EXISTS trade_spends CASCADE;
DROP TABLE IF EXISTS company_status_history CASCADE;
DROP TABLE IF EXISTS users CASCADE;
DROP TABLE IF EXISTS companies CASCADE;
",
        )
        .await?;
        Ok(())
    }
}

const COMPANIES_SQL: &str = r"
CREATE TABLE companies (
    id UUID PRIMARY KEY,
    name VARCHAR(200) NOT NULL,
    code VARCHAR(50) NOT NULL,
    domain VARCHAR(255) NOT NULL,
    status VARCHAR(20) NOT NULL DEFAULT 'active',
    plan VARCHAR(20) NOT NULL DEFAULT 'trial',
    subscription_status VARCHAR(20) NOT NULL DEFAULT 'trial',
    max_users INTEGER,
    max_customers INTEGER,
    max_products INTEGER,
    max_budgets INTEGER,
    expires_at TIMESTAMPTZ,
    modules JSONB NOT NULL DEFAULT '[]',
    contact JSONB NOT NULL DEFAULT '{}',
    created_by UUID,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_companies_code UNIQUE (code),
    CONSTRAINT uq_companies_domain UNIQUE (domain),
    CONSTRAINT chk_companies_status
        CHECK (status IN ('active', 'suspended', 'inactive', 'deleted')),
    CONSTRAINT chk_companies_subscription_status
        CHECK (subscription_status IN ('active', 'trial', 'suspended', 'cancelled', 'expired'))
);

-- Names are unique regardless of case
CREATE UNIQUE INDEX uq_companies_name ON companies (lower(name));

CREATE INDEX idx_companies_status ON companies(status);
";

const USERS_SQL: &str = r"
CREATE TABLE users (
    id UUID PRIMARY KEY,
    company_id UUID REFERENCES companies(id) ON DELETE RESTRICT,
    employee_id VARCHAR(50) NOT NULL,
    email VARCHAR(255) NOT NULL,
    password_hash VARCHAR(255) NOT NULL,
    first_name VARCHAR(100) NOT NULL,
    last_name VARCHAR(100) NOT NULL,
    role VARCHAR(30) NOT NULL,
    department VARCHAR(30) NOT NULL,
    permissions JSONB NOT NULL DEFAULT '[]',
    approval_limits JSONB NOT NULL DEFAULT '{}',
    assigned JSONB NOT NULL DEFAULT '{}',
    is_active BOOLEAN NOT NULL DEFAULT true,
    status VARCHAR(20) NOT NULL DEFAULT 'active',
    password_changed_at TIMESTAMPTZ,
    last_login_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT uq_users_email UNIQUE (email),
    CONSTRAINT uq_users_company_employee UNIQUE (company_id, employee_id),
    CONSTRAINT chk_users_email_lower CHECK (email = lower(email)),
    CONSTRAINT chk_users_status CHECK (status IN ('active', 'suspended', 'deleted')),
    -- Only the platform super-admin lives outside a company
    CONSTRAINT chk_users_company CHECK ((company_id IS NULL) = (role = 'super_admin'))
);

CREATE INDEX idx_users_company ON users(company_id, created_at);
";

const STATUS_HISTORY_SQL: &str = r"
CREATE TABLE company_status_history (
    id UUID PRIMARY KEY,
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE CASCADE,
    from_status VARCHAR(20) NOT NULL,
    to_status VARCHAR(20) NOT NULL,
    actor_id UUID NOT NULL,
    reason TEXT NOT NULL,
    changed_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_status_history_reason CHECK (length(trim(reason)) > 0)
);

CREATE INDEX idx_status_history_company ON company_status_history(company_id, changed_at);
";

const TRADE_SPENDS_SQL: &str = r"
CREATE TABLE trade_spends (
    id UUID PRIMARY KEY,
    company_id UUID NOT NULL REFERENCES companies(id) ON DELETE RESTRICT,
    customer_id UUID NOT NULL,
    vendor_id UUID,
    category VARCHAR(30) NOT NULL,
    amount NUMERIC(18, 2) NOT NULL,
    description TEXT NOT NULL DEFAULT '',
    status VARCHAR(20) NOT NULL DEFAULT 'pending',
    created_by UUID NOT NULL REFERENCES users(id),
    approved_by UUID REFERENCES users(id),
    approved_at TIMESTAMPTZ,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_trade_spends_amount CHECK (amount > 0),
    CONSTRAINT chk_trade_spends_status CHECK (status IN ('pending', 'approved', 'rejected'))
);

CREATE INDEX idx_trade_spends_company ON trade_spends(company_id, created_at DESC);
CREATE INDEX idx_trade_spends_customer ON trade_spends(company_id, customer_id);
";
