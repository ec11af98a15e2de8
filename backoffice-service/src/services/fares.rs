//! DSR fare derivation.

use crate::models::Dsr;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use thiserror::Error;

/// VAT charged on the agency's commission (15%).
pub fn vat_rate() -> Decimal {
    Decimal::new(15, 2)
}

/// Rounds to 2 decimal places, half away from zero.
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

#[derive(Debug, Error, PartialEq)]
pub enum FareError {
    #[error("{0} must not be negative")]
    Negative(&'static str),

    #[error("discount ({discount}) exceeds base fare plus taxes ({gross})")]
    DiscountExceedsGross { discount: Decimal, gross: Decimal },
}

impl From<FareError> for AppError {
    fn from(err: FareError) -> Self {
        AppError::BadRequest(err.into())
    }
}

/// Caller-entered fare components.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FareInputs {
    pub base_fare: Decimal,
    pub taxes: Decimal,
    pub discount: Decimal,
    pub net_fare: Decimal,
}

impl FareInputs {
    pub fn of(dsr: &Dsr) -> Self {
        Self {
            base_fare: dsr.base_fare,
            taxes: dsr.taxes,
            discount: dsr.discount,
            net_fare: dsr.net_fare,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DerivedFares {
    pub selling_fare: Decimal,
    pub commission: Decimal,
    pub vat_on_commission: Decimal,
}

impl DerivedFares {
    pub fn of(dsr: &Dsr) -> Self {
        Self {
            selling_fare: dsr.selling_fare,
            commission: dsr.commission,
            vat_on_commission: dsr.vat_on_commission,
        }
    }

    pub fn apply_to(&self, dsr: &mut Dsr) {
        dsr.selling_fare = self.selling_fare;
        dsr.commission = self.commission;
        dsr.vat_on_commission = self.vat_on_commission;
    }
}

/// `sellingFare = baseFare + taxes - discount`, `commission = sellingFare - netFare`,
/// `vatOnCommission = commission * 15%`, each rounded to 2 decimals.
pub fn derive(inputs: FareInputs) -> Result<DerivedFares, FareError> {
    for (name, value) in [
        ("baseFare", inputs.base_fare),
        ("taxes", inputs.taxes),
        ("discount", inputs.discount),
        ("netFare", inputs.net_fare),
    ] {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(FareError::Negative(name));
        }
    }

    let gross = inputs.base_fare + inputs.taxes;
    if inputs.discount > gross {
        return Err(FareError::DiscountExceedsGross {
            discount: inputs.discount,
            gross,
        });
    }

    let selling_fare = round_money(gross - inputs.discount);
    let commission = round_money(selling_fare - inputs.net_fare);
    let vat_on_commission = round_money(commission * vat_rate());

    Ok(DerivedFares {
        selling_fare,
        commission,
        vat_on_commission,
    })
}

/// Derives the fares and writes them onto the DSR, replacing whatever it carried.
pub fn apply_derivation(dsr: &mut Dsr) -> Result<(), FareError> {
    derive(FareInputs::of(dsr))?.apply_to(dsr);
    Ok(())
}
