use std::{collections::HashSet, str::FromStr, sync::Arc};

use alloy_primitives::Address;
use thiserror::Error;

/// Errors from parsing operator-supplied addresses
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AddressParseError {
    /// Not a 20-byte hex string
    #[error("`{0}` is not a 20-byte hex address")]
    Malformed(String),
    /// Mixed-case input whose casing is not the EIP-55 checksum
    #[error("`{0}` has an invalid EIP-55 checksum")]
    BadChecksum(String),
}

/// Parse an address from operator input.
///
/// All-lowercase and all-uppercase hex digits are accepted as-is. Mixed-case input must
/// carry a valid EIP-55 checksum.
pub fn parse_address(input: &str) -> Result<Address, AddressParseError> {
    let trimmed = input.trim();
    let digits = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed);

    let address =
        Address::from_str(digits).map_err(|_| AddressParseError::Malformed(input.to_owned()))?;

    let has_lower = digits.bytes().any(|b| b.is_ascii_lowercase());
    let has_upper = digits.bytes().any(|b| b.is_ascii_uppercase());
    if has_lower && has_upper && address.to_checksum(None)[2..] != *digits {
        return Err(AddressParseError::BadChecksum(input.to_owned()));
    }

    Ok(address)
}

/// Canonical text form of an address as stored and compared: EIP-55 checksummed hex
pub fn canonical(address: &Address) -> String {
    address.to_checksum(None)
}

/// Immutable snapshot of the addresses whose transactions are recorded.
///
/// Loaded once per run. Clones share the same set.
#[derive(Debug, Clone, Default)]
pub struct Watchlist {
    addresses: Arc<HashSet<Address>>,
}

impl Watchlist {
    /// Number of watched addresses
    pub fn len(&self) -> usize {
        self.addresses.len()
    }

    /// Whether no address is watched
    pub fn is_empty(&self) -> bool {
        self.addresses.is_empty()
    }

    /// Whether `address` is watched
    pub fn contains(&self, address: &Address) -> bool {
        self.addresses.contains(address)
    }

    /// Transaction filter: true when the resolved sender or the recipient is watched.
    ///
    /// `from` is `None` when sender recovery failed and `to` is `None` for contract
    /// creations; a missing side never matches.
    pub fn matches(&self, from: Option<&Address>, to: Option<&Address>) -> bool {
        from.is_some_and(|a| self.contains(a)) || to.is_some_and(|a| self.contains(a))
    }
}

impl FromIterator<Address> for Watchlist {
    fn from_iter<I: IntoIterator<Item = Address>>(iter: I) -> Self {
        Self { addresses: Arc::new(iter.into_iter().collect()) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const WATCHED: Address = address!("0x28c6c06298d514db089934071355e5743bf21d60");
    const OTHER: Address = address!("0x0000000000000000000000000000000000000111");

    #[test]
    fn matches_on_either_side() {
        let watchlist: Watchlist = [WATCHED].into_iter().collect();

        assert!(watchlist.matches(Some(&WATCHED), Some(&OTHER)));
        assert!(watchlist.matches(Some(&OTHER), Some(&WATCHED)));
        assert!(!watchlist.matches(Some(&OTHER), Some(&OTHER)));
    }

    #[test]
    fn missing_sides_never_match() {
        let watchlist: Watchlist = [WATCHED].into_iter().collect();

        // unresolved sender still matches on the recipient
        assert!(watchlist.matches(None, Some(&WATCHED)));
        // contract creation still matches on the sender
        assert!(watchlist.matches(Some(&WATCHED), None));
        assert!(!watchlist.matches(None, None));
    }

    #[test]
    fn empty_watchlist_matches_nothing() {
        let watchlist = Watchlist::default();
        assert!(watchlist.is_empty());
        assert!(!watchlist.matches(Some(&WATCHED), Some(&WATCHED)));
    }

    #[test]
    fn parses_lowercase_and_checksummed_input() {
        let checksummed = canonical(&WATCHED);
        assert_eq!(checksummed, "0x28C6c06298d514Db089934071355E5743bf21d60");

        assert_eq!(parse_address("0x28c6c06298d514db089934071355e5743bf21d60"), Ok(WATCHED));
        assert_eq!(parse_address("28C6C06298D514DB089934071355E5743BF21D60"), Ok(WATCHED));
        assert_eq!(parse_address(&checksummed), Ok(WATCHED));
        assert_eq!(parse_address(" 0x28c6c06298d514db089934071355e5743bf21d60\n"), Ok(WATCHED));
    }

    #[test]
    fn rejects_bad_checksum_and_garbage() {
        assert!(matches!(
            parse_address("0x28c6C06298d514Db089934071355E5743bf21d60"),
            Err(AddressParseError::BadChecksum(_))
        ));
        assert!(matches!(parse_address("0x1234"), Err(AddressParseError::Malformed(_))));
        assert!(matches!(parse_address("not an address"), Err(AddressParseError::Malformed(_))));
    }
}
