use serde::{Deserialize, Serialize};

/// One apartment listing as emitted on the output stream.
///
/// `url` is the stable identity used by the dedup history. Prices stay in the
/// marketplace display format; only the maintenance fee is numeric.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListingRecord {
    pub title: String,
    pub rental_price: String,
    /// Configured neighborhood name (the key of the search file's map), not the URL slug.
    pub neighborhood: String,
    pub total_price: String,
    pub location: String,
    pub bedrooms: Option<u8>,
    pub area: Option<String>,
    pub maintenance_fee: Option<u64>,
    pub url: String,
}

impl ListingRecord {
    /// Records the maintenance fee and recomputes the total price.
    ///
    /// The total keeps the rent display string when the rent is not numeric.
    pub fn apply_fee(&mut self, fee: u64) {
        self.maintenance_fee = Some(fee);
        self.total_price = match display_amount(&self.rental_price) {
            Some(rent) => format_thousands(rent.saturating_add(fee)),
            None => self.rental_price.clone(),
        };
    }

    /// Integer part of the rent, when the display string carries one.
    pub fn rent_amount(&self) -> Option<u64> {
        display_amount(&self.rental_price)
    }
}

/// Parses the integer part of a display amount such as `25.000` or `18.500,50`.
pub fn display_amount(display: &str) -> Option<u64> {
    let integer_part = display.split(',').next().unwrap_or_default();
    let digits: String = integer_part
        .chars()
        .filter(|ch| !matches!(ch, '.' | ' ' | '\u{a0}'))
        .collect();
    if digits.is_empty() || !digits.chars().all(|ch| ch.is_ascii_digit()) {
        return None;
    }
    digits.parse().ok()
}

/// Formats an amount with `.` as the thousands separator.
pub fn format_thousands(amount: u64) -> String {
    let digits = amount.to_string();
    let mut formatted = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            formatted.push('.');
        }
        formatted.push(ch);
    }
    formatted
}
