//! Users, roles and the authorization data attached to them.

mod role;
mod user;

pub use role::{Department, Role};
pub use user::{
    ApprovalCategory, ApprovalLimits, AssignedEntities, NewUser, Permission, User, UserStatus,
    UserUpdate, normalize_email,
};
