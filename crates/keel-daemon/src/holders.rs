// crates/keel-daemon/src/holders.rs
//
// Simulated market participants. After every epoch each holder reacts to the
// sampled price: under peg it buys bonds (and optionally parks them in the
// bond pool), above the ceiling it pulls its bonds back and redeems what the
// reserve allows. Rejections such as a spent epoch budget are expected and
// only logged.

use keel_core::{bps_of, format_amount, AccountId, Amount, KeelError, ONE};
use keel_treasury::Protocol;

use crate::config::HolderConfig;

#[derive(Debug, Clone)]
pub struct Holder {
    account: AccountId,
    bond_bps: u32,
    pool_deposit: bool,
}

/// What a holder did in one epoch.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HolderActivity {
    pub bought: Amount,
    pub deposited: Amount,
    pub withdrawn: Amount,
    pub claimed: Amount,
    pub redeemed: Amount,
}

impl Holder {
    pub fn from_config(config: &HolderConfig) -> Self {
        Self {
            account: AccountId::new(config.account.clone()),
            bond_bps: config.bond_bps,
            pool_deposit: config.pool_deposit,
        }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn act(&self, protocol: &mut Protocol, price: Amount) -> Result<HolderActivity, KeelError> {
        let mut activity = HolderActivity::default();
        if price < ONE {
            let budget = bps_of(protocol.dollar.balance_of(&self.account), self.bond_bps)?;
            if budget > 0 {
                match protocol.buy_bonds(&self.account, budget) {
                    Ok(()) => activity.bought = budget,
                    Err(e) => tracing::debug!("{}: bond purchase rejected: {}", self.account, e),
                }
            }
            let bonds = protocol.bond.balance_of(&self.account);
            if self.pool_deposit && bonds > 0 {
                match protocol.deposit(&self.account, bonds) {
                    Ok(_) => activity.deposited = bonds,
                    Err(e) => tracing::warn!("{}: pool deposit rejected: {}", self.account, e),
                }
            }
        } else if price > protocol.treasury.policy().dollar_price_ceiling {
            let pooled = protocol.pool.balance_of(&self.account);
            if pooled > 0 || protocol.pool.pending_dollars(&self.account) > 0 {
                match protocol.withdraw(&self.account, pooled) {
                    Ok(receipt) => {
                        activity.withdrawn = receipt.bonds;
                        activity.claimed = receipt.dollars;
                    }
                    Err(e) => tracing::warn!("{}: pool withdrawal rejected: {}", self.account, e),
                }
            }
            let redeemable = protocol
                .bond
                .balance_of(&self.account)
                .min(protocol.treasury.reserve());
            if redeemable > 0 {
                match protocol.redeem_bonds(&self.account, redeemable) {
                    Ok(()) => activity.redeemed = redeemable,
                    Err(e) => tracing::debug!("{}: redemption rejected: {}", self.account, e),
                }
            }
        }

        if activity != HolderActivity::default() {
            tracing::info!(
                "{}: bought {} deposited {} withdrew {} claimed {} redeemed {}",
                self.account,
                format_amount(activity.bought),
                format_amount(activity.deposited),
                format_amount(activity.withdrawn),
                format_amount(activity.claimed),
                format_amount(activity.redeemed)
            );
        }
        Ok(activity)
    }
}
