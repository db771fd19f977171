//! Protect and reveal: opportunistic payload encryption.
//!
//! `protect` seals an item's plaintext `payload` into `encPayload` with the
//! owner's public key. `reveal` reverses it with the matching private key.
//! Both pass items through untouched when the caller lacks keys or the
//! source field is absent.

use tracing::debug;

use tenantvault_core::Item;

use crate::caller::Caller;
use crate::envelope::SealedPayload;
use crate::error::Result;

/// Seal the payload of an item owned by `caller`.
pub fn protect(mut item: Item, caller: &Caller) -> Result<Item> {
    let Some(keys) = &caller.keys else {
        return Ok(item);
    };
    if !item.is_owned_by(&caller.user_id) {
        return Ok(item);
    }
    let Some(payload) = item.payload.take() else {
        return Ok(item);
    };

    // serde_json maps are sorted, so this is canonical.
    let plaintext = serde_json::to_vec(&payload)?;
    let sealed = SealedPayload::seal(&plaintext, &keys.public)?;
    item.enc_payload = Some(sealed.to_base64());
    Ok(item)
}

/// Open the sealed payload of an item with the caller's private key.
///
/// Items sealed to a different key are returned unchanged.
pub fn reveal(mut item: Item, caller: &Caller) -> Result<Item> {
    let Some(encoded) = item.enc_payload.as_deref() else {
        return Ok(item);
    };
    let Some(keys) = &caller.keys else {
        debug!(item_id = %item.id, "caller has no keys, payload stays sealed");
        return Ok(item);
    };

    let sealed = SealedPayload::from_base64(encoded)?;
    if !sealed.is_sealed_to(&keys.public) {
        debug!(item_id = %item.id, "payload sealed to another principal");
        return Ok(item);
    }

    let plaintext = sealed.open(&keys.secret)?;
    item.payload = Some(serde_json::from_slice(&plaintext)?);
    item.enc_payload = None;
    Ok(item)
}

/// Reveal every item independently, keeping one result per item.
pub fn reveal_all(items: Vec<Item>, caller: &Caller) -> Vec<Result<Item>> {
    items.into_iter().map(|item| reveal(item, caller)).collect()
}
