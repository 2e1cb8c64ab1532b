use super::ids::UserId;
use serde::{Deserialize, Serialize};

/// Owner of accounts. Created once, never changed.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct User {
    pub id: UserId,
    pub name: String,
}
