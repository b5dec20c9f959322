//! Request gates, applied in this order: authenticate, rate limit, tenant
//! isolation, route policy.

pub mod auth;
pub mod policy;
pub mod rate_limit;
pub mod tenant;

pub use auth::{CurrentUser, authenticate};
pub use policy::{enforce, guarded, platform_only};
pub use rate_limit::{RateLimiter, rate_limit};
pub use tenant::{Access, Tenant, isolate};
