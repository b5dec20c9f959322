//! `SeaORM` entities.

pub mod companies;
pub mod company_status_history;
pub mod trade_spends;
pub mod users;
