//! Order resolver
//!
//! Turns a verified payment notification into the set of tickets it should
//! produce. Pure: no store access, no token minting.
//!
//! Derivation rules:
//! - non-successful payments derive nothing
//! - an explicit attendee list yields one ticket per attendee
//! - no attendee list yields one ticket for the payer
//! - missing attendee prices split the remaining order total evenly, to the
//!   minor unit, with the remainder on the first unpriced attendee

use admit_common::db::Attendee;
use admit_common::ids::derivation_key;
use admit_common::{Error, Result, TicketIdGenerator};
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::str::FromStr;
use tracing::warn;

/// Currency minor-unit precision used for price splitting
pub const PRICE_SCALE: u32 = 2;

/// Placeholder for absent attendee profile fields
const NOT_APPLICABLE: &str = "N/A";

/// Provider webhook envelope
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentNotification {
    #[serde(default)]
    pub event: Option<String>,
    pub data: PaymentData,
}

/// Provider transaction record
///
/// Shared by webhook notifications and the transaction listing API.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentData {
    #[serde(default)]
    pub id: Option<i64>,
    pub tx_ref: String,
    #[serde(default)]
    pub flw_ref: Option<String>,
    #[serde(deserialize_with = "deserialize_amount")]
    pub amount: Decimal,
    pub currency: String,
    pub status: String,
    #[serde(default)]
    pub customer: Customer,
    #[serde(default, alias = "meta_data")]
    pub meta: Option<PaymentMeta>,
}

/// Paying customer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Customer {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone_number: Option<String>,
}

/// Checkout metadata attached by the storefront
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PaymentMeta {
    /// Attendee list, either a JSON array or a stringified JSON array
    #[serde(default)]
    pub attendees: Option<Value>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
}

/// One attendee as submitted at checkout
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AttendeeInput {
    #[serde(default)]
    pub full_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub level: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default, deserialize_with = "deserialize_optional_amount")]
    pub price: Option<Decimal>,
}

/// Contact details used when an attendee omits their own
#[derive(Debug, Clone, Default)]
pub struct PayerContact {
    pub name: Option<String>,
    pub email: String,
    pub phone: String,
}

/// A ticket the order should produce, before it is written
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedTicket {
    pub ticket_id: String,
    pub derivation_key: String,
    pub attendee: Attendee,
    pub price: Decimal,
}

/// Everything the issuance engine needs for one logical order
#[derive(Debug, Clone)]
pub struct OrderDerivation {
    pub order_ref: String,
    pub amount: Decimal,
    pub currency: String,
    pub tickets: Vec<DerivedTicket>,
}

impl OrderDerivation {
    pub fn total_price(&self) -> Decimal {
        self.tickets.iter().map(|t| t.price).sum()
    }
}

/// Parse a raw webhook body
pub fn parse_notification(body: &[u8]) -> Result<PaymentNotification> {
    serde_json::from_slice(body)
        .map_err(|e| Error::Validation(format!("Malformed payment notification: {}", e)))
}

/// Whether a provider status string means the payment settled
pub fn is_successful(status: &str) -> bool {
    status.trim().eq_ignore_ascii_case("successful")
}

/// Resolve a provider transaction into its ticket set
///
/// Returns `Ok(None)` for payments that did not succeed.
pub fn resolve(data: &PaymentData, ids: &TicketIdGenerator) -> Result<Option<OrderDerivation>> {
    if !is_successful(&data.status) {
        return Ok(None);
    }

    let meta = data.meta.clone().unwrap_or_default();
    let mut attendees = match &meta.attendees {
        Some(raw) => parse_attendees(raw)?,
        None => Vec::new(),
    };

    let payer = PayerContact {
        name: data.customer.name.clone(),
        email: data.customer.email.clone().unwrap_or_default(),
        phone: data.customer.phone_number.clone().unwrap_or_default(),
    };

    if attendees.is_empty() {
        attendees.push(AttendeeInput {
            full_name: payer.name.clone(),
            department: meta.department.clone(),
            level: meta.level.clone(),
            gender: meta.gender.clone(),
            ..AttendeeInput::default()
        });
    }

    derive_order(&data.tx_ref, data.amount, &data.currency, &payer, attendees, ids).map(Some)
}

/// Derive tickets for an order from an explicit attendee list
///
/// Shared by provider notifications and administrative creation.
pub fn derive_order(
    order_ref: &str,
    amount: Decimal,
    currency: &str,
    payer: &PayerContact,
    attendees: Vec<AttendeeInput>,
    ids: &TicketIdGenerator,
) -> Result<OrderDerivation> {
    let order_ref = order_ref.trim();
    if order_ref.is_empty() {
        return Err(Error::Validation("tx_ref is empty".to_string()));
    }
    let currency = currency.trim();
    if currency.is_empty() {
        return Err(Error::Validation("currency is empty".to_string()));
    }
    if amount.is_sign_negative() {
        return Err(Error::Validation(format!("amount {} is negative", amount)));
    }
    if attendees.is_empty() {
        return Err(Error::Validation("order has no attendees".to_string()));
    }

    let explicit: Vec<Option<Decimal>> = attendees.iter().map(|a| a.price).collect();
    if let Some(negative) = explicit.iter().flatten().find(|p| p.is_sign_negative()) {
        return Err(Error::Validation(format!("attendee price {} is negative", negative)));
    }
    let prices = split_prices(order_ref, amount, &explicit)?;

    let mut tickets = Vec::with_capacity(attendees.len());
    for (index, (input, price)) in attendees.into_iter().zip(prices).enumerate() {
        let attendee = validate_attendee(input, payer)
            .map_err(|e| Error::Validation(format!("attendee {}: {}", index + 1, e)))?;

        let ticket_id = ids.generate();
        tickets.push(DerivedTicket {
            derivation_key: derivation_key(order_ref, &ticket_id),
            ticket_id,
            attendee,
            price,
        });
    }

    Ok(OrderDerivation {
        order_ref: order_ref.to_string(),
        amount,
        currency: currency.to_string(),
        tickets,
    })
}

/// Attendee list from metadata; a string value holds stringified JSON
fn parse_attendees(raw: &Value) -> Result<Vec<AttendeeInput>> {
    let parsed = match raw {
        Value::Null => return Ok(Vec::new()),
        Value::String(s) if s.trim().is_empty() => return Ok(Vec::new()),
        Value::String(s) => serde_json::from_str(s),
        Value::Array(_) => serde_json::from_value(raw.clone()),
        other => {
            return Err(Error::Validation(format!(
                "attendees must be a list, got {}",
                other
            )))
        }
    };

    parsed.map_err(|e| Error::Validation(format!("Malformed attendee list: {}", e)))
}

fn validate_attendee(input: AttendeeInput, payer: &PayerContact) -> std::result::Result<Attendee, String> {
    let full_name = input
        .full_name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty())
        .ok_or_else(|| "full_name is required".to_string())?;

    Ok(Attendee {
        full_name,
        email: non_empty(input.email).unwrap_or_else(|| payer.email.clone()),
        phone: non_empty(input.phone).unwrap_or_else(|| payer.phone.clone()),
        department: non_empty(input.department).unwrap_or_else(|| NOT_APPLICABLE.to_string()),
        level: non_empty(input.level).unwrap_or_else(|| NOT_APPLICABLE.to_string()),
        gender: non_empty(input.gender).unwrap_or_else(|| NOT_APPLICABLE.to_string()),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Attribute the order total across attendees
///
/// Explicit prices are kept when they reconcile with the total; the rest of
/// the total is split evenly over the unpriced attendees. When explicit prices
/// cannot reconcile, the whole total is split evenly over everyone. The result
/// always sums to `total` exactly. Sums beyond the decimal range are rejected.
pub fn split_prices(order_ref: &str, total: Decimal, explicit: &[Option<Decimal>]) -> Result<Vec<Decimal>> {
    let unpriced: Vec<usize> = explicit
        .iter()
        .enumerate()
        .filter(|(_, p)| p.is_none())
        .map(|(i, _)| i)
        .collect();
    let priced_sum = checked_sum(explicit.iter().flatten().copied())
        .ok_or_else(|| Error::Validation("attendee prices overflow".to_string()))?;

    let reconciles = if unpriced.is_empty() {
        priced_sum == total
    } else {
        priced_sum <= total
    };

    if !reconciles {
        warn!(
            order_ref = %order_ref,
            total = %total,
            priced_sum = %priced_sum,
            "Attendee prices do not match order total, splitting evenly"
        );
        return split_evenly(total, explicit.len());
    }

    let rest = total
        .checked_sub(priced_sum)
        .ok_or_else(|| Error::Validation("attendee prices overflow".to_string()))?;

    let mut prices: Vec<Decimal> = explicit.iter().map(|p| p.unwrap_or(Decimal::ZERO)).collect();
    for (slot, share) in unpriced.iter().zip(split_evenly(rest, unpriced.len())?) {
        prices[*slot] = share;
    }
    Ok(prices)
}

/// Split `amount` into `parts` shares truncated to minor units; the first
/// share absorbs the remainder
pub fn split_evenly(amount: Decimal, parts: usize) -> Result<Vec<Decimal>> {
    if parts == 0 {
        return Ok(Vec::new());
    }

    let overflow = || Error::Validation(format!("amount {} cannot be split {} ways", amount, parts));
    let count = Decimal::from(parts as u64);
    let share = amount
        .checked_div(count)
        .ok_or_else(overflow)?
        .round_dp_with_strategy(PRICE_SCALE, RoundingStrategy::ToZero);
    let remainder = share
        .checked_mul(count)
        .and_then(|spread| amount.checked_sub(spread))
        .ok_or_else(overflow)?;

    let mut shares = vec![share; parts];
    shares[0] = shares[0].checked_add(remainder).ok_or_else(overflow)?;
    Ok(shares)
}

/// Sum of `values`, or `None` on overflow
pub fn checked_sum(values: impl IntoIterator<Item = Decimal>) -> Option<Decimal> {
    values
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, v| acc.checked_add(v))
}

fn decimal_from_value(value: &Value) -> std::result::Result<Option<Decimal>, String> {
    match value {
        Value::Null => Ok(None),
        Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .map(Some)
            .map_err(|e| format!("invalid amount {}: {}", n, e)),
        Value::String(s) if s.trim().is_empty() => Ok(None),
        Value::String(s) => Decimal::from_str(s.trim())
            .map(Some)
            .map_err(|e| format!("invalid amount {:?}: {}", s, e)),
        other => Err(format!("invalid amount {}", other)),
    }
}

fn deserialize_amount<'de, D>(deserializer: D) -> std::result::Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    decimal_from_value(&value)
        .map_err(serde::de::Error::custom)?
        .ok_or_else(|| serde::de::Error::custom("amount is required"))
}

fn deserialize_optional_amount<'de, D>(deserializer: D) -> std::result::Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    decimal_from_value(&value).map_err(serde::de::Error::custom)
}
