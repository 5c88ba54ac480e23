use serde::{Deserialize, Serialize};
use std::fmt;

/// Amount of stroops in a single unit of currency.
pub const STROOPS_PER_UNIT: i64 = 10_000_000;

/// The amount owed to a single farmer for a reservation, in stroops.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EscrowDetail {
    /// Id of the farmer.
    pub farmer_id: i64,
    /// Amount owed, in stroops.
    pub total_amount: i64,
}

/// Payment instructions for a workload reservation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerEscrowInformation {
    /// Address of the escrow account to pay to.
    pub address: String,
    /// Asset to pay with.
    pub asset: String,
    /// Amounts owed per farmer.
    pub details: Vec<EscrowDetail>,
}

impl CustomerEscrowInformation {
    /// The total amount to pay into the escrow. The sum is exact, an overflow is an error rather
    /// than a wrapped amount.
    pub fn total(&self) -> Result<i64, EscrowError> {
        self.details.iter().try_fold(0i64, |acc, detail| {
            acc.checked_add(detail.total_amount)
                .ok_or(EscrowError::Overflow {
                    farmer_id: detail.farmer_id,
                })
        })
    }
}

/// Payment instructions for a capacity pool purchase.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CustomerCapacityEscrowInformation {
    /// Address of the escrow account to pay to.
    pub address: String,
    /// Asset to pay with.
    pub asset: String,
    /// Amount to pay, in stroops.
    pub amount: i64,
}

/// Errors while aggregating escrow amounts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EscrowError {
    /// The total does not fit in 64 bits.
    Overflow {
        /// The farmer whose amount overflowed the total.
        farmer_id: i64,
    },
}

impl fmt::Display for EscrowError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EscrowError::Overflow { farmer_id } => write!(
                f,
                "escrow total overflows when adding the amount of farmer {}",
                farmer_id
            ),
        }
    }
}

impl std::error::Error for EscrowError {}

/// Render an amount of stroops as a decimal string with 7 digits.
pub fn format_amount(amount: i64) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    let unit = STROOPS_PER_UNIT as u64;
    format!("{}{}.{:07}", sign, abs / unit, abs % unit)
}
