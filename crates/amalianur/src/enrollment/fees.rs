use serde::Serialize;

use super::domain::{FeeSchedule, Tier};

impl FeeSchedule {
    /// Amount due for a tier. An unselected tier costs nothing.
    ///
    /// The `active` flag is informational only; the lookup never consults it.
    pub fn fee_for(&self, tier: Option<Tier>) -> u64 {
        match tier {
            Some(Tier::Kb) => self.tier_kb,
            Some(Tier::Tk) => self.tier_tk,
            Some(Tier::Mts) => self.tier_mts,
            None => 0,
        }
    }

    pub fn quote(&self, tier: Option<Tier>) -> FeeQuote {
        let fee = self.fee_for(tier);
        FeeQuote {
            tier,
            fee,
            formatted: format_rupiah(fee),
        }
    }
}

/// Fee shown next to the tier selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FeeQuote {
    pub tier: Option<Tier>,
    pub fee: u64,
    pub formatted: String,
}

/// Indonesian rupiah with `.` thousands separators and no decimals, e.g. `Rp1.000.000`.
pub fn format_rupiah(amount: u64) -> String {
    let digits = amount.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3 + 2);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(ch);
    }
    format!("Rp{grouped}")
}
