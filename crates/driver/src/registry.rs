//! Watched address registration
use alloy_primitives::Address;
use primitives::watchlist::{AddressParseError, Watchlist, canonical, parse_address};
use storage::{Store, StoreError};
use thiserror::Error;
use tracing::{info, warn};

/// Reasons an address cannot be registered
#[derive(Debug, Error)]
pub enum RegistrationError {
    /// Input is not a valid address
    #[error(transparent)]
    InvalidAddress(#[from] AddressParseError),
    /// Address is already watched
    #[error("address {0} is already registered")]
    AlreadyExists(String),
    /// Store failure
    #[error(transparent)]
    Store(StoreError),
}

/// Validate `input` and persist it, checksummed, as a watched address
pub async fn register_address(store: &dyn Store, input: &str) -> Result<Address, RegistrationError> {
    let address = parse_address(input)?;
    let text = canonical(&address);

    if store.find_address(&text).await.map_err(RegistrationError::Store)?.is_some() {
        return Err(RegistrationError::AlreadyExists(text));
    }

    match store.create_address(&text).await {
        Ok(()) => {
            info!(address = %text, "Registered address");
            Ok(address)
        }
        // lost a race with a concurrent registration
        Err(e) if e.is_constraint_violation() => Err(RegistrationError::AlreadyExists(text)),
        Err(e) => Err(RegistrationError::Store(e)),
    }
}

/// Snapshot of every watched address in the store
pub async fn load_watchlist(store: &dyn Store) -> Result<Watchlist, StoreError> {
    let rows = store.all_addresses().await?;
    let watchlist: Watchlist = rows
        .iter()
        .filter_map(|row| match parse_address(&row.address) {
            Ok(address) => Some(address),
            Err(e) => {
                warn!(address = %row.address, err = %e, "Skipping unparseable watched address");
                None
            }
        })
        .collect();

    info!(count = watchlist.len(), "Loaded watched addresses");
    Ok(watchlist)
}

#[cfg(test)]
mod tests {
    use super::*;
    use storage::SqliteStore;

    const LOWER: &str = "0x28c6c06298d514db089934071355e5743bf21d60";
    const CHECKSUMMED: &str = "0x28C6c06298d514Db089934071355E5743bf21d60";

    #[tokio::test]
    async fn stores_checksummed_form() {
        let store = SqliteStore::in_memory().await.unwrap();

        let address = register_address(&store, LOWER).await.unwrap();

        assert_eq!(canonical(&address), CHECKSUMMED);
        let rows = store.all_addresses().await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].address, CHECKSUMMED);
    }

    #[tokio::test]
    async fn rejects_duplicates_in_any_casing() {
        let store = SqliteStore::in_memory().await.unwrap();
        register_address(&store, CHECKSUMMED).await.unwrap();

        for input in [CHECKSUMMED, LOWER, "0x28C6C06298D514DB089934071355E5743BF21D60"] {
            let err = register_address(&store, input).await.unwrap_err();
            assert!(matches!(err, RegistrationError::AlreadyExists(ref a) if a == CHECKSUMMED));
        }
        assert_eq!(store.all_addresses().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_invalid_input() {
        let store = SqliteStore::in_memory().await.unwrap();

        for input in ["", "0x1234", "not an address", "0x28C6c06298d514db089934071355e5743bf21d60"] {
            let err = register_address(&store, input).await.unwrap_err();
            assert!(matches!(err, RegistrationError::InvalidAddress(_)), "{input}: {err}");
        }
        assert!(store.all_addresses().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn watchlist_skips_unparseable_rows() {
        let store = SqliteStore::in_memory().await.unwrap();
        register_address(&store, LOWER).await.unwrap();
        store.create_address("garbage").await.unwrap();

        let watchlist = load_watchlist(&store).await.unwrap();

        assert_eq!(watchlist.len(), 1);
        assert!(watchlist.contains(&parse_address(LOWER).unwrap()));
    }
}
