//! Reversible text encoding for persisted collections.
//!
//! A collection is serialized to JSON and then base64-encoded. This keeps the
//! stored blobs from being human-readable at a glance and nothing more: there
//! is no key, anyone with the blob can decode it. Do not treat it as
//! encryption.

use base64::{engine::general_purpose, Engine as _};
use serde::de::DeserializeOwned;
use serde::Serialize;

/// A persisted blob that could not be decoded. Callers treat this as "no
/// data" rather than failing.
#[derive(Debug, thiserror::Error)]
pub enum StorageCorrupt {
    #[error("blob is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
    #[error("blob is not valid utf-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
    #[error("blob does not hold the expected structure: {0}")]
    Structure(#[from] serde_json::Error),
}

pub fn encode<T: Serialize>(value: &T) -> Result<String, serde_json::Error> {
    let json = serde_json::to_string(value)?;
    Ok(general_purpose::STANDARD.encode(json.as_bytes()))
}

pub fn decode<T: DeserializeOwned>(blob: &str) -> Result<T, StorageCorrupt> {
    let bytes = general_purpose::STANDARD.decode(blob.trim())?;
    let json = String::from_utf8(bytes)?;
    Ok(serde_json::from_str(&json)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CapturedItem, Category, VaultSettings};

    #[test]
    fn blob_is_not_plain_json() {
        let item = CapturedItem::new("secret text".into(), Category::Text);
        let blob = encode(&vec![item]).unwrap();
        assert!(!blob.contains("secret text"));
        assert!(!blob.contains('{'));
    }

    #[test]
    fn empty_collection_survives() {
        let blob = encode(&Vec::<CapturedItem>::new()).unwrap();
        let back: Vec<CapturedItem> = decode(&blob).unwrap();
        assert!(back.is_empty());
    }

    #[test]
    fn garbage_is_reported_as_corrupt() {
        assert!(matches!(
            decode::<VaultSettings>("!!not base64!!"),
            Err(StorageCorrupt::Base64(_))
        ));
        let wrong_shape = general_purpose::STANDARD.encode("[1,2,3]");
        assert!(matches!(
            decode::<VaultSettings>(&wrong_shape),
            Err(StorageCorrupt::Structure(_))
        ));
    }

    #[test]
    fn non_ascii_content_round_trips() {
        let item = CapturedItem::new("مرحبا بالعالم".into(), Category::Text);
        let blob = encode(&item).unwrap();
        let back: CapturedItem = decode(&blob).unwrap();
        assert_eq!(back, item);
    }
}
