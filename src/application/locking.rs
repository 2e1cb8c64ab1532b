//! Deadlock-free locking of a transfer's two account rows.

use crate::domain::account::Account;
use crate::domain::ids::AccountId;
use crate::domain::ports::StoreTransaction;
use crate::error::StoreResult;

/// Rows of a transfer's two accounts, read under their exclusive locks.
#[derive(Debug)]
pub struct LockedPair {
    pub src: Option<Account>,
    pub dst: Option<Account>,
}

/// Locks the rows of `src` and `dst`, lower account id first.
///
/// Every transaction that holds two account locks takes them through this
/// function, so all of them request locks in the same global order and no
/// cycle of waiters can form.
pub fn lock_pair(
    tx: &mut dyn StoreTransaction,
    src: AccountId,
    dst: AccountId,
) -> StoreResult<LockedPair> {
    if src == dst {
        let account = tx.lock_account(src)?;
        return Ok(LockedPair {
            src: account.clone(),
            dst: account,
        });
    }

    let (first, second) = if src < dst { (src, dst) } else { (dst, src) };
    let first = tx.lock_account(first)?;
    let second = tx.lock_account(second)?;

    Ok(if src < dst {
        LockedPair {
            src: first,
            dst: second,
        }
    } else {
        LockedPair {
            src: second,
            dst: first,
        }
    })
}
