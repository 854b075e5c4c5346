//! Deterministic in-process wallet backend.
//!
//! Default backend for development, demos, and tests. Keeps a decimal ledger
//! per token, derives the address and every transaction hash from blake3 so
//! runs are reproducible, and fills swaps at fixed reference rates with no
//! price impact. No gas is modeled.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use super::{
    NATIVE_SYMBOL, SwapReceipt, TokenBalance, TxReceipt, WRAPPED_NATIVE_SYMBOL, WalletBackend,
    ensure_positive, validate_address,
};
use crate::error::WalletError;

/// Reference rate: one ETH (or WETH) buys this many USDC.
const ETH_USDC_RATE: Decimal = dec!(2400);

pub struct SimulatedWallet {
    address: String,
    network: String,
    ledger: Mutex<HashMap<String, Decimal>>,
    nonce: AtomicU64,
}

impl SimulatedWallet {
    /// Build a wallet whose address derives from `seed`. Starts funded with
    /// 10 ETH and 2500 USDC.
    pub fn new(seed: &str, network: impl Into<String>) -> Self {
        let mut balances = HashMap::new();
        balances.insert(NATIVE_SYMBOL.to_string(), dec!(10));
        balances.insert(WRAPPED_NATIVE_SYMBOL.to_string(), Decimal::ZERO);
        balances.insert("USDC".to_string(), dec!(2500));
        Self::with_balances(seed, network, balances)
    }

    pub fn with_balances(
        seed: &str,
        network: impl Into<String>,
        balances: HashMap<String, Decimal>,
    ) -> Self {
        Self {
            address: derive_address(seed),
            network: network.into(),
            ledger: Mutex::new(balances),
            nonce: AtomicU64::new(0),
        }
    }

    fn next_tx_hash(&self, label: &str) -> String {
        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.address.as_bytes());
        hasher.update(&nonce.to_be_bytes());
        hasher.update(label.as_bytes());
        format!("0x{}", hasher.finalize().to_hex())
    }

    /// Lock the ledger, recovering from poisoning. Every mutation validates
    /// before writing, so a recovered map is still consistent.
    fn ledger(&self) -> MutexGuard<'_, HashMap<String, Decimal>> {
        self.ledger.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn balance_of(&self, symbol: &str) -> Result<Decimal, WalletError> {
        let ledger = self.ledger();
        ledger
            .get(symbol)
            .copied()
            .ok_or_else(|| WalletError::UnknownToken {
                symbol: symbol.to_string(),
            })
    }

    /// Move `amount` out of `from` and (optionally) into `to`, atomically.
    fn debit_credit(
        &self,
        from: &str,
        to: Option<&str>,
        amount: Decimal,
        credit: Decimal,
    ) -> Result<(), WalletError> {
        let mut ledger = self.ledger();
        let available = ledger
            .get(from)
            .copied()
            .ok_or_else(|| WalletError::UnknownToken {
                symbol: from.to_string(),
            })?;
        if available < amount {
            return Err(WalletError::InsufficientFunds {
                requested: amount,
                available,
            });
        }
        if let Some(to) = to
            && !ledger.contains_key(to)
        {
            return Err(WalletError::UnknownToken {
                symbol: to.to_string(),
            });
        }
        *ledger.entry(from.to_string()).or_default() = available - amount;
        if let Some(to) = to {
            *ledger.entry(to.to_string()).or_default() += credit;
        }
        Ok(())
    }
}

/// Fixed reference rate between two known tokens. ETH and WETH price as one.
fn swap_rate(from: &str, to: &str) -> Result<Decimal, WalletError> {
    let price_key = |symbol: &str| -> Result<&'static str, WalletError> {
        match symbol {
            NATIVE_SYMBOL | WRAPPED_NATIVE_SYMBOL => Ok("ETH"),
            "USDC" => Ok("USDC"),
            other => Err(WalletError::UnknownToken {
                symbol: other.to_string(),
            }),
        }
    };
    match (price_key(from)?, price_key(to)?) {
        ("ETH", "USDC") => Ok(ETH_USDC_RATE),
        ("USDC", "ETH") => Ok(Decimal::ONE / ETH_USDC_RATE),
        _ => Ok(Decimal::ONE),
    }
}

fn derive_address(seed: &str) -> String {
    let hash = blake3::hash(seed.as_bytes());
    let hex = hash.to_hex();
    // 20-byte address: the first 40 hex chars of the digest.
    format!("0x{}", &hex.as_str()[..40])
}

#[async_trait]
impl WalletBackend for SimulatedWallet {
    fn address(&self) -> &str {
        &self.address
    }

    fn network(&self) -> &str {
        &self.network
    }

    async fn native_balance(&self) -> Result<Decimal, WalletError> {
        self.balance_of(NATIVE_SYMBOL)
    }

    async fn token_balance(&self, symbol: &str) -> Result<TokenBalance, WalletError> {
        Ok(TokenBalance {
            symbol: symbol.to_string(),
            balance: self.balance_of(symbol)?,
        })
    }

    async fn transfer_native(&self, to: &str, amount: Decimal) -> Result<TxReceipt, WalletError> {
        validate_address(to)?;
        ensure_positive(amount)?;
        self.debit_credit(NATIVE_SYMBOL, None, amount, Decimal::ZERO)?;
        Ok(TxReceipt {
            tx_hash: self.next_tx_hash("transfer"),
        })
    }

    async fn transfer_token(
        &self,
        symbol: &str,
        to: &str,
        amount: Decimal,
    ) -> Result<TxReceipt, WalletError> {
        validate_address(to)?;
        ensure_positive(amount)?;
        self.debit_credit(symbol, None, amount, Decimal::ZERO)?;
        Ok(TxReceipt {
            tx_hash: self.next_tx_hash("token_transfer"),
        })
    }

    async fn swap(
        &self,
        from_token: &str,
        to_token: &str,
        amount: Decimal,
        _slippage_bps: u32,
    ) -> Result<SwapReceipt, WalletError> {
        ensure_positive(amount)?;
        let rate = swap_rate(from_token, to_token)?;
        let amount_out = (amount * rate).round_dp(8);
        self.debit_credit(from_token, Some(to_token), amount, amount_out)?;
        Ok(SwapReceipt {
            tx_hash: self.next_tx_hash("swap"),
            from_token: from_token.to_string(),
            to_token: to_token.to_string(),
            amount_in: amount,
            amount_out,
        })
    }

    async fn wrap(&self, amount: Decimal) -> Result<TxReceipt, WalletError> {
        ensure_positive(amount)?;
        self.debit_credit(NATIVE_SYMBOL, Some(WRAPPED_NATIVE_SYMBOL), amount, amount)?;
        Ok(TxReceipt {
            tx_hash: self.next_tx_hash("wrap"),
        })
    }

    async fn unwrap(&self, amount: Decimal) -> Result<TxReceipt, WalletError> {
        ensure_positive(amount)?;
        self.debit_credit(WRAPPED_NATIVE_SYMBOL, Some(NATIVE_SYMBOL), amount, amount)?;
        Ok(TxReceipt {
            tx_hash: self.next_tx_hash("unwrap"),
        })
    }
}
