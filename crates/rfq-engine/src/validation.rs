//! Input checks applied before anything touches storage.

use rust_decimal::Decimal;
use trade_core::{NewRfq, NewRfqResponse, ResponseRevision, RfqResponse};

use crate::error::{RfqError, RfqResult};

const MAX_UNIT_LEN: usize = 50;

/// Money columns carry two decimal places.
const MONEY_SCALE: u32 = 2;
/// Integer digits of `NUMERIC(18, 2)` (prices, budgets).
const PRICE_DIGITS: u32 = 16;
/// Integer digits of `NUMERIC(20, 2)` (quote and order totals).
const TOTAL_DIGITS: u32 = 18;

fn invalid(msg: impl Into<String>) -> RfqError {
    RfqError::Validation(msg.into())
}

/// Trim and upper-case an ISO 4217 code; anything but three letters is rejected.
pub fn normalize_currency(raw: &str) -> RfqResult<String> {
    let code = raw.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(invalid("currency is required"));
    }
    if code.len() != 3 || !code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Err(invalid(format!(
            "currency '{}' is not a three-letter ISO 4217 code",
            raw.trim()
        )));
    }
    Ok(code)
}

/// Positive, at most two decimal places, below `10^integer_digits`. Returned
/// at scale 2 so what the caller sees matches what storage keeps.
fn check_money(field: &str, mut value: Decimal, integer_digits: u32) -> RfqResult<Decimal> {
    if value <= Decimal::ZERO {
        return Err(invalid(format!("{} must be greater than zero", field)));
    }
    if value.normalize().scale() > MONEY_SCALE {
        return Err(invalid(format!(
            "{} must have at most {} decimal places",
            field, MONEY_SCALE
        )));
    }
    if value >= Decimal::from(10_i64.pow(integer_digits)) {
        return Err(invalid(format!("{} is too large", field)));
    }

    value.rescale(MONEY_SCALE);
    Ok(value)
}

/// `unit_price * moq`, rejected when it would not fit a stored total.
pub fn quote_total(unit_price: Decimal, moq: i32) -> RfqResult<Decimal> {
    let limit = Decimal::from(10_i64.pow(TOTAL_DIGITS));
    match RfqResponse::compute_total(unit_price, moq) {
        Some(total) if total < limit => Ok(total),
        _ => Err(invalid("totalPrice (unitPrice x moq) is too large")),
    }
}

fn trim_opt(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Validate and normalize an RFQ draft.
pub fn validate_new_rfq(input: NewRfq) -> RfqResult<NewRfq> {
    if input.quantity <= 0 {
        return Err(invalid("quantity must be greater than zero"));
    }

    let unit = input.unit.trim().to_string();
    if unit.is_empty() {
        return Err(invalid("unit is required"));
    }
    if unit.chars().count() > MAX_UNIT_LEN {
        return Err(invalid(format!("unit must be at most {} characters", MAX_UNIT_LEN)));
    }

    let budget = input
        .budget
        .map(|budget| check_money("budget", budget, PRICE_DIGITS))
        .transpose()?;

    let currency = normalize_currency(&input.currency)?;

    Ok(NewRfq {
        product_name: trim_opt(input.product_name),
        product_image: trim_opt(input.product_image),
        specifications: trim_opt(input.specifications),
        requirements: trim_opt(input.requirements),
        delivery_location: trim_opt(input.delivery_location),
        unit,
        currency,
        budget,
        ..input
    })
}

fn check_moq(moq: i32) -> RfqResult<()> {
    if moq <= 0 {
        return Err(invalid("moq must be greater than zero"));
    }
    Ok(())
}

fn check_delivery_days(days: i32) -> RfqResult<()> {
    if days <= 0 {
        return Err(invalid("estimatedDelivery must be greater than zero"));
    }
    Ok(())
}

/// Validate and normalize a new quote. Currency stays optional here; the
/// RFQ's currency fills it in later.
pub fn validate_new_response(input: NewRfqResponse) -> RfqResult<NewRfqResponse> {
    let unit_price = check_money("unitPrice", input.unit_price, PRICE_DIGITS)?;
    check_moq(input.moq)?;
    check_delivery_days(input.estimated_delivery)?;
    quote_total(unit_price, input.moq)?;

    let currency = match input.currency.as_deref() {
        Some(raw) if !raw.trim().is_empty() => Some(normalize_currency(raw)?),
        _ => None,
    };

    Ok(NewRfqResponse {
        unit_price,
        currency,
        payment_terms: trim_opt(input.payment_terms),
        specifications: trim_opt(input.specifications),
        message: trim_opt(input.message),
        ..input
    })
}

/// Validate the fields a revision sets; unset fields are not checked. The
/// merged total is checked by the caller once the stored quote is known.
pub fn validate_revision(input: ResponseRevision) -> RfqResult<ResponseRevision> {
    let unit_price = input
        .unit_price
        .map(|price| check_money("unitPrice", price, PRICE_DIGITS))
        .transpose()?;
    if let Some(moq) = input.moq {
        check_moq(moq)?;
    }
    if let Some(days) = input.estimated_delivery {
        check_delivery_days(days)?;
    }

    Ok(ResponseRevision {
        unit_price,
        payment_terms: trim_opt(input.payment_terms),
        specifications: trim_opt(input.specifications),
        message: trim_opt(input.message),
        ..input
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn rfq_input() -> NewRfq {
        NewRfq {
            quantity: 200,
            unit: " piece ".to_string(),
            currency: "usd".to_string(),
            product_name: Some("  ".to_string()),
            ..Default::default()
        }
    }

    fn response_input() -> NewRfqResponse {
        NewRfqResponse {
            rfq_id: Uuid::new_v4(),
            unit_price: Decimal::new(18500, 2),
            currency: None,
            moq: 150,
            estimated_delivery: 21,
            payment_terms: Some("30% deposit".to_string()),
            specifications: None,
            message: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_rfq_normalization() {
        let rfq = validate_new_rfq(rfq_input()).unwrap();
        assert_eq!(rfq.unit, "piece");
        assert_eq!(rfq.currency, "USD");
        assert_eq!(rfq.product_name, None);
    }

    #[test]
    fn test_rfq_rejections() {
        let mut zero = rfq_input();
        zero.quantity = 0;
        assert!(matches!(validate_new_rfq(zero), Err(RfqError::Validation(_))));

        let mut no_unit = rfq_input();
        no_unit.unit = "   ".to_string();
        assert!(validate_new_rfq(no_unit).is_err());

        let mut no_currency = rfq_input();
        no_currency.currency = String::new();
        assert!(validate_new_rfq(no_currency).is_err());

        let mut negative_budget = rfq_input();
        negative_budget.budget = Some(Decimal::new(-1, 0));
        assert!(validate_new_rfq(negative_budget).is_err());
    }

    #[test]
    fn test_currency_codes() {
        assert_eq!(normalize_currency(" eur ").unwrap(), "EUR");
        assert!(normalize_currency("US").is_err());
        assert!(normalize_currency("USDT").is_err());
        assert!(normalize_currency("U$D").is_err());
    }

    #[test]
    fn test_response_rejections() {
        assert!(validate_new_response(response_input()).is_ok());

        let mut free = response_input();
        free.unit_price = Decimal::ZERO;
        assert!(matches!(validate_new_response(free), Err(RfqError::Validation(_))));

        let mut no_moq = response_input();
        no_moq.moq = 0;
        assert!(validate_new_response(no_moq).is_err());

        let mut instant = response_input();
        instant.estimated_delivery = -3;
        assert!(validate_new_response(instant).is_err());

        let mut bad_currency = response_input();
        bad_currency.currency = Some("dollars".to_string());
        assert!(validate_new_response(bad_currency).is_err());
    }

    #[test]
    fn test_revision_checks_only_present_fields() {
        assert!(validate_revision(ResponseRevision::default()).is_ok());
        assert!(validate_revision(ResponseRevision {
            moq: Some(0),
            ..Default::default()
        })
        .is_err());
        assert!(validate_revision(ResponseRevision {
            unit_price: Some(Decimal::new(-5, 0)),
            ..Default::default()
        })
        .is_err());
        assert!(validate_revision(ResponseRevision {
            unit_price: Some(Decimal::new(1, 3)),
            ..Default::default()
        })
        .is_err());
    }

    #[test]
    fn test_prices_must_fit_two_decimal_places() {
        let mut sub_cent = response_input();
        sub_cent.unit_price = Decimal::new(1, 3);
        assert!(matches!(validate_new_response(sub_cent), Err(RfqError::Validation(_))));

        let mut half_cent = response_input();
        half_cent.unit_price = Decimal::new(185005, 3);
        assert!(validate_new_response(half_cent).is_err());

        // trailing zeros are not extra precision
        let mut padded = response_input();
        padded.unit_price = Decimal::new(185000, 3);
        let padded = validate_new_response(padded).unwrap();
        assert_eq!(padded.unit_price.to_string(), "185.00");

        let mut whole = response_input();
        whole.unit_price = Decimal::new(185, 0);
        assert_eq!(validate_new_response(whole).unwrap().unit_price.to_string(), "185.00");
    }

    #[test]
    fn test_prices_must_fit_storage() {
        let mut huge = response_input();
        huge.unit_price = Decimal::MAX;
        huge.moq = 2;
        assert!(matches!(validate_new_response(huge), Err(RfqError::Validation(_))));

        let mut at_limit = response_input();
        at_limit.unit_price = Decimal::from(10_i64.pow(16));
        assert!(validate_new_response(at_limit).is_err());

        // price fits, price x moq does not
        let mut big_total = response_input();
        big_total.unit_price = Decimal::from(10_i64.pow(15));
        big_total.moq = 1_000;
        assert!(validate_new_response(big_total).is_err());

        let mut budget = rfq_input();
        budget.budget = Some(Decimal::MAX);
        assert!(validate_new_rfq(budget).is_err());

        let mut cents = rfq_input();
        cents.budget = Some(Decimal::new(5000001, 3));
        assert!(validate_new_rfq(cents).is_err());
    }

    #[test]
    fn test_quote_total() {
        assert_eq!(
            quote_total(Decimal::new(18500, 2), 150).unwrap(),
            Decimal::new(2775000, 2)
        );
        assert!(quote_total(Decimal::MAX, 2).is_err());
        assert!(quote_total(Decimal::from(10_i64.pow(16) - 1), 1_000).is_err());
    }
}
