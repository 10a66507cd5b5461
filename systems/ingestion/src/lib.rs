#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Converts raw gift payloads from the feed into queue commands.
//!
//! Every payload, including the synthetic gifts injected for testing, goes
//! through [`parse_gift`]. Malformed payloads are logged and dropped; they
//! never reach the world.

use std::num::NonZeroU32;

use galton_board_core::{Command, GiftMetadata, GiftPayload, GiftRequest, ImageRef};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;
use tracing::{debug, warn};

/// Prefix of the randomised owner assigned to synthetic gifts.
pub const TEST_OWNER_PREFIX: &str = "Test User";

/// Reasons a payload is rejected.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The payload is not a JSON gift object.
    #[error("payload is not a gift object: {0}")]
    InvalidJson(#[from] serde_json::Error),
    /// The payload has no `diamond_count`.
    #[error("payload is missing diamond_count")]
    MissingWeight,
    /// The payload is worth no tokens.
    #[error("diamond_count must be positive")]
    ZeroWeight,
    /// The payload's weight is negative or too large to represent.
    #[error("diamond_count {0} is out of range")]
    WeightOutOfRange(i64),
}

/// Parses and validates one raw payload.
pub fn parse_gift(raw: &str) -> Result<GiftRequest, IngestError> {
    let payload: GiftPayload = serde_json::from_str(raw)?;
    request_from_payload(payload)
}

/// Validates an already decoded payload.
pub fn request_from_payload(payload: GiftPayload) -> Result<GiftRequest, IngestError> {
    let count = payload.diamond_count.ok_or(IngestError::MissingWeight)?;
    let count = u32::try_from(count).map_err(|_| IngestError::WeightOutOfRange(count))?;
    let weight = NonZeroU32::new(count).ok_or(IngestError::ZeroWeight)?;

    let metadata = GiftMetadata {
        gift_name: payload.gift_name,
        gift_amount: payload.gift_amount,
        gift_image: payload.gift_image.map(ImageRef::new),
    };

    Ok(GiftRequest::new(
        weight,
        payload.nickname,
        payload.avatar.map(ImageRef::new),
        metadata,
    ))
}

/// Configuration parameters required to construct the ingestion system.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    test_gift_weight: NonZeroU32,
    rng_seed: u64,
}

impl Config {
    /// Creates a configuration for synthetic gifts of `test_gift_weight` tokens.
    #[must_use]
    pub const fn new(test_gift_weight: NonZeroU32, rng_seed: u64) -> Self {
        Self {
            test_gift_weight,
            rng_seed,
        }
    }
}

/// System that turns feed payloads into queue commands.
#[derive(Debug)]
pub struct Ingestion {
    test_gift_weight: NonZeroU32,
    rng: ChaCha8Rng,
    accepted: u64,
    rejected: u64,
}

impl Ingestion {
    /// Creates a new ingestion system using the supplied configuration.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            test_gift_weight: config.test_gift_weight,
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            accepted: 0,
            rejected: 0,
        }
    }

    /// Parses every payload, emitting an enqueue followed by an immediate drain
    /// for each valid gift.
    pub fn handle<'a, I>(&mut self, payloads: I, out: &mut Vec<Command>)
    where
        I: IntoIterator<Item = &'a str>,
    {
        for raw in payloads {
            match parse_gift(raw) {
                Ok(gift) => {
                    self.accepted = self.accepted.saturating_add(1);
                    debug!(weight = gift.weight().get(), owner = ?gift.owner(), "gift accepted");
                    out.push(Command::EnqueueGift { gift });
                    out.push(Command::DrainGiftQueue);
                }
                Err(error) => {
                    self.rejected = self.rejected.saturating_add(1);
                    warn!(%error, "dropping malformed gift payload");
                }
            }
        }
    }

    /// Builds the raw payload of a synthetic gift with a randomised owner.
    #[must_use]
    pub fn synthetic_payload(&mut self) -> String {
        let payload = GiftPayload {
            diamond_count: Some(i64::from(self.test_gift_weight.get())),
            nickname: Some(format!("{TEST_OWNER_PREFIX}{}", self.rng.gen::<f64>())),
            ..GiftPayload::default()
        };
        match serde_json::to_string(&payload) {
            Ok(raw) => raw,
            Err(error) => {
                warn!(%error, "failed to encode synthetic gift");
                String::new()
            }
        }
    }

    /// Injects a synthetic gift through the same path as feed payloads.
    pub fn inject_test_gift(&mut self, out: &mut Vec<Command>) {
        let raw = self.synthetic_payload();
        self.handle([raw.as_str()], out);
    }

    /// Number of payloads accepted so far.
    #[must_use]
    pub const fn accepted(&self) -> u64 {
        self.accepted
    }

    /// Number of payloads dropped so far.
    #[must_use]
    pub const fn rejected(&self) -> u64 {
        self.rejected
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_payload_is_parsed() {
        let gift = parse_gift(
            r#"{"nickname":"ada","avatar":"https://a/b.png","diamond_count":5,
                "gift_name":"Rose","gift_image":"https://a/rose.png","gift_amount":5}"#,
        )
        .expect("valid payload");

        assert_eq!(gift.weight().get(), 5);
        assert_eq!(gift.owner(), Some("ada"));
        assert_eq!(gift.avatar(), Some(&ImageRef::new("https://a/b.png")));
        assert_eq!(gift.metadata().gift_name.as_deref(), Some("Rose"));
        assert_eq!(gift.metadata().gift_amount, Some(5));
    }

    #[test]
    fn null_optional_fields_are_tolerated() {
        let gift = parse_gift(r#"{"diamond_count":1,"avatar":null,"nickname":null}"#)
            .expect("valid payload");
        assert_eq!(gift.owner(), None);
        assert_eq!(gift.avatar(), None);
    }

    #[test]
    fn invalid_payloads_are_classified() {
        assert!(matches!(
            parse_gift("not json"),
            Err(IngestError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_gift(r#"["diamond_count", 5]"#),
            Err(IngestError::InvalidJson(_))
        ));
        assert!(matches!(
            parse_gift(r#"{"nickname":"ada"}"#),
            Err(IngestError::MissingWeight)
        ));
        assert!(matches!(
            parse_gift(r#"{"diamond_count":0}"#),
            Err(IngestError::ZeroWeight)
        ));
        assert!(matches!(
            parse_gift(r#"{"diamond_count":-3}"#),
            Err(IngestError::WeightOutOfRange(-3))
        ));
        assert!(matches!(
            parse_gift(r#"{"diamond_count":"five"}"#),
            Err(IngestError::InvalidJson(_))
        ));
    }

    #[test]
    fn synthetic_owners_are_randomised() {
        let mut ingestion = Ingestion::new(Config::new(
            NonZeroU32::new(100).expect("non-zero"),
            11,
        ));
        let first = parse_gift(&ingestion.synthetic_payload()).expect("synthetic payload");
        let second = parse_gift(&ingestion.synthetic_payload()).expect("synthetic payload");

        assert_eq!(first.weight().get(), 100);
        let first_owner = first.owner().expect("owner");
        assert!(first_owner.starts_with(TEST_OWNER_PREFIX));
        assert_ne!(first.owner(), second.owner());
        assert_eq!(first.avatar(), None);
    }
}
