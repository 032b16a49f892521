use crate::error::{Error, Result};
use crate::models::market::PairUniverse;

/// Maps a pair contract address to its numeric pair id within one
/// exchange/chain. Address comparison is case-insensitive.
#[derive(Debug, Clone, Copy)]
pub struct PairResolver {
    exchange_id: i64,
    chain_id: i64,
}

impl PairResolver {
    pub fn new(exchange_id: i64, chain_id: i64) -> Self {
        Self {
            exchange_id,
            chain_id,
        }
    }

    pub fn resolve(&self, universe: &PairUniverse, address: &str) -> Result<i64> {
        let needle = address.trim();
        let matches: Vec<i64> = universe
            .entries()
            .iter()
            .filter(|e| {
                e.exchange_id == self.exchange_id
                    && e.chain_id == self.chain_id
                    && e.address.eq_ignore_ascii_case(needle)
            })
            .map(|e| e.pair_id)
            .collect();

        match matches.as_slice() {
            [] => Err(Error::PairNotFound(needle.to_string())),
            [pair_id] => Ok(*pair_id),
            // the exchange/chain filter should make this impossible
            _ => Err(Error::AmbiguousPair(needle.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::market::PairEntry;

    fn entry(address: &str, exchange_id: i64, chain_id: i64, pair_id: i64) -> PairEntry {
        PairEntry {
            address: address.to_string(),
            exchange_id,
            chain_id,
            pair_id,
        }
    }

    fn universe() -> PairUniverse {
        PairUniverse::new(vec![
            entry("0xaaa", 1, 1, 10),
            // same address listed under another exchange id
            entry("0xaaa", 2, 1, 11),
            entry("0xbbb", 1, 1, 20),
            entry("0xccc", 1, 1, 30),
            entry("0xccc", 1, 1, 31),
        ])
    }

    #[test]
    fn resolves_single_match_for_target_exchange() {
        let resolver = PairResolver::new(1, 1);
        assert_eq!(resolver.resolve(&universe(), "0xaaa").unwrap(), 10);
    }

    #[test]
    fn address_comparison_is_case_insensitive() {
        let resolver = PairResolver::new(1, 1);
        assert_eq!(resolver.resolve(&universe(), "0xAAA").unwrap(), 10);
        assert_eq!(resolver.resolve(&universe(), "  0xBbB ").unwrap(), 20);
    }

    #[test]
    fn unknown_address_is_not_found() {
        let resolver = PairResolver::new(1, 1);
        let err = resolver.resolve(&universe(), "0xdead").unwrap_err();
        assert!(matches!(err, Error::PairNotFound(_)));
    }

    #[test]
    fn duplicate_listing_is_ambiguous() {
        let resolver = PairResolver::new(1, 1);
        let err = resolver.resolve(&universe(), "0xccc").unwrap_err();
        assert!(matches!(err, Error::AmbiguousPair(_)));
    }
}
