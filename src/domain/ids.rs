//! Store-generated row ids.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! row_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            pub fn get(self) -> u64 {
                self.0
            }

            /// Ids are generated by the store starting at 1, so zero is never valid.
            pub fn is_valid(self) -> bool {
                self.0 > 0
            }

            /// Big-endian bytes, so that byte order matches numeric order.
            pub fn to_key(self) -> [u8; 8] {
                self.0.to_be_bytes()
            }
        }

        impl From<u64> for $name {
            fn from(id: u64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

row_id!(
    /// Identifier of a [`User`](super::user::User) row.
    UserId
);
row_id!(
    /// Identifier of an [`Account`](super::account::Account) row.
    AccountId
);
row_id!(
    /// Identifier of a [`Transfer`](super::transfer::Transfer) audit row.
    TransferId
);
