//! Preflight checks for marketplace transactions.
//!
//! Mirrors the checks the marketplace front-end runs before submitting a
//! `buyHero`, `listHero`, `updatePrice` or `cancelListing` transaction.
//! Signing and submission stay with the wallet.

use std::future::Future;
use std::time::Duration;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::price::{format_price, TokenAmount, TOKEN_DECIMALS};
use crate::types::Hero;

/// Allowance requested when the current one does not cover the price.
pub const MAX_UINT256: &str =
    "115792089237316195423570985008687907853269984665640564039457584007913129639935";

/// Gas limit used when estimation fails.
pub const FALLBACK_GAS: u64 = 500_000;

/// Allowance re-checks after an approval is sent.
pub const ALLOWANCE_MAX_RETRIES: u32 = 5;
pub const ALLOWANCE_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TradeError {
    #[error("hero {0} is not for sale")]
    NotForSale(String),

    #[error("hero {0} is already owned by the buyer")]
    OwnHero(String),

    #[error("insufficient balance: need {needed}")]
    InsufficientBalance { needed: String },

    #[error("allowance still below {needed} after {retries} checks")]
    AllowanceNotUpdated { needed: String, retries: u32 },

    #[error("hero {0} is not owned by the seller")]
    NotOwner(String),

    #[error("hero {0} is already listed")]
    AlreadyListed(String),

    #[error("hero {0} is currently on a quest and cannot be listed")]
    OnQuest(String),

    #[error("invalid price {0:?}")]
    InvalidPrice(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PurchaseQuote {
    pub hero_id: String,
    pub price: TokenAmount,
    pub price_display: String,
    /// True when an approval for [`MAX_UINT256`] must be sent first.
    pub needs_approval: bool,
    pub gas_limit: u64,
}

/// Validate a purchase and produce what the wallet needs to submit it.
pub fn quote_purchase(
    hero: &Hero,
    buyer: &str,
    balance: &TokenAmount,
    allowance: &TokenAmount,
    estimated_gas: Option<u64>,
) -> Result<PurchaseQuote, TradeError> {
    if !hero.is_for_sale {
        return Err(TradeError::NotForSale(hero.id.clone()));
    }
    if hero.is_owned_by(buyer) {
        return Err(TradeError::OwnHero(hero.id.clone()));
    }
    if balance < &hero.price {
        return Err(TradeError::InsufficientBalance { needed: format_price(&hero.price) });
    }
    Ok(PurchaseQuote {
        hero_id: hero.id.clone(),
        price: hero.price.clone(),
        price_display: format_price(&hero.price),
        needs_approval: allowance < &hero.price,
        gas_limit: gas_limit(estimated_gas),
    })
}

/// Estimated gas plus a 50% buffer. A failed estimate is replaced by
/// [`FALLBACK_GAS`] before the buffer is applied.
pub fn gas_limit(estimated: Option<u64>) -> u64 {
    let gas = estimated.unwrap_or(FALLBACK_GAS);
    gas.saturating_add(gas / 2)
}

// ---------------------------------------------------------------------------
// Sell side
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ListingQuote {
    pub hero_id: String,
    pub price: TokenAmount,
    pub price_display: String,
    /// Things the seller has to accept before submitting.
    pub warnings: Vec<String>,
    /// False while warnings are present and the request was not forced.
    pub ready: bool,
    pub gas_limit: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancelQuote {
    pub hero_id: String,
    pub gas_limit: u64,
}

/// Validate listing `hero` at the decimal `price` (whole tokens).
///
/// A hero on a quest cannot be listed. Equipped items transfer with the
/// hero, so `equipped_slots > 0` yields a warning and the quote is only
/// `ready` once the seller resends with `force`.
pub fn quote_listing(
    hero: &Hero,
    seller: &str,
    price: &str,
    equipped_slots: u32,
    force: bool,
    estimated_gas: Option<u64>,
) -> Result<ListingQuote, TradeError> {
    if !hero.is_owned_by(seller) {
        return Err(TradeError::NotOwner(hero.id.clone()));
    }
    if hero.is_for_sale {
        return Err(TradeError::AlreadyListed(hero.id.clone()));
    }
    if hero.is_on_quest {
        return Err(TradeError::OnQuest(hero.id.clone()));
    }
    let price = parse_listing_price(price)?;

    let mut warnings = Vec::new();
    if equipped_slots > 0 {
        warnings.push(format!(
            "hero has {equipped_slots} equipped item(s) that will be sold with it"
        ));
    }
    let ready = warnings.is_empty() || force;
    debug!(hero_id = %hero.id, %price, ready, "listing quoted");

    Ok(ListingQuote {
        hero_id: hero.id.clone(),
        price_display: format_price(&price),
        price,
        warnings,
        ready,
        gas_limit: gas_limit(estimated_gas),
    })
}

/// Validate changing the price of the seller's own active listing.
pub fn quote_price_update(
    hero: &Hero,
    seller: &str,
    price: &str,
    estimated_gas: Option<u64>,
) -> Result<ListingQuote, TradeError> {
    ensure_own_listing(hero, seller)?;
    let price = parse_listing_price(price)?;
    Ok(ListingQuote {
        hero_id: hero.id.clone(),
        price_display: format_price(&price),
        price,
        warnings: Vec::new(),
        ready: true,
        gas_limit: gas_limit(estimated_gas),
    })
}

/// Validate withdrawing the seller's own active listing.
pub fn quote_cancel(hero: &Hero, seller: &str, estimated_gas: Option<u64>) -> Result<CancelQuote, TradeError> {
    ensure_own_listing(hero, seller)?;
    Ok(CancelQuote { hero_id: hero.id.clone(), gas_limit: gas_limit(estimated_gas) })
}

/// Price updates and cancellations only apply to a listed hero the caller
/// owns.
pub fn ensure_own_listing(hero: &Hero, seller: &str) -> Result<(), TradeError> {
    if !hero.is_owned_by(seller) {
        return Err(TradeError::NotOwner(hero.id.clone()));
    }
    if !hero.is_for_sale {
        return Err(TradeError::NotForSale(hero.id.clone()));
    }
    Ok(())
}

/// Whole-token decimal to smallest units. Zero is not a valid price.
pub fn parse_listing_price(input: &str) -> Result<TokenAmount, TradeError> {
    TokenAmount::parse_units(input, TOKEN_DECIMALS)
        .filter(|p| !p.is_zero())
        .ok_or_else(|| TradeError::InvalidPrice(input.trim().to_string()))
}

/// Poll `read_allowance` after an approval until it covers `required`.
///
/// Waits `delay` before each of up to `retries` reads. Read errors count as
/// a failed attempt.
pub async fn wait_for_allowance<F, Fut, E>(
    required: &TokenAmount,
    retries: u32,
    delay: Duration,
    mut read_allowance: F,
) -> Result<TokenAmount, TradeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<TokenAmount, E>>,
    E: std::fmt::Display,
{
    for attempt in 1..=retries {
        tokio::time::sleep(delay).await;
        match read_allowance().await {
            Ok(current) if &current >= required => return Ok(current),
            Ok(current) => debug!(attempt, %current, %required, "allowance not yet updated"),
            Err(e) => warn!(attempt, "allowance read failed: {e}"),
        }
    }
    Err(TradeError::AllowanceNotUpdated { needed: required.to_string(), retries })
}
