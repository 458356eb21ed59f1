// crates/keel-treasury/src/boardroom.rs
//
// Boardroom allocation table.
//
// Each epoch's boardroom dollars and governance shares are split across the
// registered boardrooms in proportion to their weights. Dollar and share
// weights are independent. Integer division leaves dust, which goes to the
// last entry with a non-zero weight so nothing is stranded in the treasury.

use serde::{Deserialize, Serialize};

use keel_core::{mul_div, AccountId, Amount, KeelError};

/// A dividend sink and its weights.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardroomEntry {
    pub account: AccountId,
    pub dollar_weight: u32,
    pub share_weight: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoardroomAllocation {
    entries: Vec<BoardroomEntry>,
}

impl BoardroomAllocation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> &[BoardroomEntry] {
        &self.entries
    }

    pub fn add_boardroom(&mut self, account: AccountId, dollar_weight: u32, share_weight: u32) -> Result<(), KeelError> {
        if self.entries.iter().any(|e| e.account == account) {
            return Err(KeelError::InvalidState(format!(
                "boardroom {} already registered",
                account
            )));
        }
        self.entries.push(BoardroomEntry {
            account,
            dollar_weight,
            share_weight,
        });
        Ok(())
    }

    pub fn update_boardroom(&mut self, account: &AccountId, dollar_weight: u32, share_weight: u32) -> Result<(), KeelError> {
        let entry = self
            .entries
            .iter_mut()
            .find(|e| &e.account == account)
            .ok_or_else(|| KeelError::NotFound(format!("boardroom {}", account)))?;
        entry.dollar_weight = dollar_weight;
        entry.share_weight = share_weight;
        Ok(())
    }

    pub fn remove_boardroom(&mut self, account: &AccountId) -> Result<BoardroomEntry, KeelError> {
        let index = self
            .entries
            .iter()
            .position(|e| &e.account == account)
            .ok_or_else(|| KeelError::NotFound(format!("boardroom {}", account)))?;
        Ok(self.entries.remove(index))
    }

    /// Sum of dollar weights.
    pub fn total_dollar_weight(&self) -> u128 {
        self.entries.iter().map(|e| e.dollar_weight as u128).sum()
    }

    /// Sum of share weights; zero means no shares are routed anywhere.
    pub fn total_share_weight(&self) -> u128 {
        self.entries.iter().map(|e| e.share_weight as u128).sum()
    }

    /// Split `amount` dollars by dollar weight. Empty when no weight is set.
    pub fn split_dollars(&self, amount: Amount) -> Result<Vec<(AccountId, Amount)>, KeelError> {
        split(&self.entries, amount, |e| e.dollar_weight)
    }

    /// Split `amount` shares by share weight. Empty when no weight is set.
    pub fn split_shares(&self, amount: Amount) -> Result<Vec<(AccountId, Amount)>, KeelError> {
        split(&self.entries, amount, |e| e.share_weight)
    }
}

fn split(
    entries: &[BoardroomEntry],
    amount: Amount,
    weight: impl Fn(&BoardroomEntry) -> u32,
) -> Result<Vec<(AccountId, Amount)>, KeelError> {
    let total: u128 = entries.iter().map(|e| weight(e) as u128).sum();
    if total == 0 || amount == 0 {
        return Ok(Vec::new());
    }

    let weighted: Vec<&BoardroomEntry> = entries.iter().filter(|e| weight(e) > 0).collect();
    let mut out = Vec::with_capacity(weighted.len());
    let mut remaining = amount;
    for (i, entry) in weighted.iter().enumerate() {
        let portion = if i + 1 == weighted.len() {
            remaining
        } else {
            mul_div(amount, weight(entry) as u128, total)?
        };
        remaining -= portion;
        out.push((entry.account.clone(), portion));
    }
    Ok(out)
}
