//! Transfer requests and their audit rows.

use super::account::{Account, Amount, Balance};
use super::ids::{AccountId, TransferId, UserId};
use crate::error::SubmitError;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Arguments of a transfer, checked once at the call site.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    request_id: String,
    user_id: UserId,
    src_account_id: AccountId,
    dst_account_id: AccountId,
    amount: Amount,
}

impl TransferRequest {
    /// Rejects a blank request id, zero ids, a non-positive amount and a
    /// source equal to the destination.
    pub fn new(
        request_id: impl Into<String>,
        user_id: UserId,
        src_account_id: AccountId,
        dst_account_id: AccountId,
        amount: Decimal,
    ) -> Result<Self, SubmitError> {
        let request_id = request_id.into();
        if request_id.trim().is_empty() {
            return Err(SubmitError::InvalidArgument("request id must not be blank"));
        }
        if !user_id.is_valid() {
            return Err(SubmitError::InvalidArgument("user id must be greater than zero"));
        }
        if !src_account_id.is_valid() || !dst_account_id.is_valid() {
            return Err(SubmitError::InvalidArgument(
                "account id must be greater than zero",
            ));
        }
        if src_account_id == dst_account_id {
            return Err(SubmitError::InvalidArgument(
                "source and destination accounts must differ",
            ));
        }
        Ok(Self {
            request_id,
            user_id,
            src_account_id,
            dst_account_id,
            amount: Amount::new(amount)?,
        })
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn src_account_id(&self) -> AccountId {
        self.src_account_id
    }

    pub fn dst_account_id(&self) -> AccountId {
        self.dst_account_id
    }

    pub fn amount(&self) -> Amount {
        self.amount
    }
}

/// Immutable audit record of a completed transfer.
///
/// Captures both accounts' balances before and after the move, and the owner
/// of the source account at the time of the transfer.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
pub struct Transfer {
    pub id: TransferId,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub src_account_id: AccountId,
    pub dst_account_id: AccountId,
    pub user_id: UserId,
    pub amount: Amount,
    pub src_before: Balance,
    pub src_after: Balance,
    pub dst_before: Balance,
    pub dst_after: Balance,
}

/// A transfer row before the store has assigned it an id.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct NewTransfer {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub src_account_id: AccountId,
    pub dst_account_id: AccountId,
    pub user_id: UserId,
    pub amount: Amount,
    pub src_before: Balance,
    pub src_after: Balance,
    pub dst_before: Balance,
    pub dst_after: Balance,
}

impl NewTransfer {
    /// Computes the post-transfer balances of `src` and `dst`.
    ///
    /// Returns `None` when `src` cannot cover `amount`. `src` and `dst` must be
    /// distinct accounts.
    pub fn between(
        request_id: impl Into<String>,
        src: &Account,
        dst: &Account,
        amount: Amount,
        timestamp: DateTime<Utc>,
    ) -> Option<Self> {
        let src_after = src.balance.checked_sub(amount)?;
        Some(Self {
            request_id: request_id.into(),
            timestamp,
            src_account_id: src.id,
            dst_account_id: dst.id,
            user_id: src.owner_id,
            amount,
            src_before: src.balance,
            src_after,
            dst_before: dst.balance,
            dst_after: dst.balance + amount,
        })
    }

    pub fn into_transfer(self, id: TransferId) -> Transfer {
        Transfer {
            id,
            request_id: self.request_id,
            timestamp: self.timestamp,
            src_account_id: self.src_account_id,
            dst_account_id: self.dst_account_id,
            user_id: self.user_id,
            amount: self.amount,
            src_before: self.src_before,
            src_after: self.src_after,
            dst_before: self.dst_before,
            dst_after: self.dst_after,
        }
    }
}
