//! Initial config values before dependency-ordered resolution.
//!
//! Only the static provider is available at this stage, so any template
//! that reads another item renders as empty. The driver corrects those
//! values once the items they depend on are known.

use crate::crypto::{Cipher, decrypt_value};
use crate::models::{ConfigGroup, ItemValue, ItemValues};
use crate::templating::{Builder, StaticCtx};

/// Compute the starting `{value, default}` pair for every item.
///
/// An entry in `existing` wins unless the item is read-only. Password
/// values are decrypted when a cipher is available and the stored value
/// decrypts cleanly.
pub fn new_config_context(
    groups: &[ConfigGroup],
    existing: &ItemValues,
    static_ctx: &StaticCtx,
    cipher: Option<&dyn Cipher>,
) -> ItemValues {
    let builder = Builder::new().with_ctx(static_ctx.clone());
    let mut values = ItemValues::new();

    for item in groups.iter().flat_map(|g| &g.items) {
        let mut value = match existing.get(&item.name) {
            Some(stored) if !item.readonly => stored.clone(),
            stored => {
                if stored.is_some() {
                    tracing::warn!("Ignoring supplied value for read-only item '{}'", item.name);
                }
                ItemValue::new(
                    render_or_empty(&builder, &item.name, &item.value),
                    render_or_empty(&builder, &item.name, &item.default),
                )
            }
        };

        if item.is_password()
            && value.has_value()
            && let Some(cipher) = cipher
        {
            value.value = decrypt_or_original(cipher, &item.name, &value.value);
        }
        values.insert(item.name.clone(), value);
    }

    values
}

/// Render with the static-only builder, substituting `""` on failure.
pub(crate) fn render_or_empty(builder: &Builder, name: &str, text: &str) -> String {
    match builder.render_template(name, text) {
        Ok(rendered) => rendered,
        Err(e) => {
            tracing::debug!("Static render of '{}' failed, using empty value: {}", name, e);
            String::new()
        }
    }
}

/// Decrypt a stored password, keeping the original text if it is not
/// an encrypted value.
pub(crate) fn decrypt_or_original(cipher: &dyn Cipher, name: &str, stored: &str) -> String {
    match decrypt_value(cipher, stored) {
        Ok(plaintext) => plaintext,
        Err(e) => {
            tracing::debug!("Keeping stored value of '{}' as is: {}", name, e);
            stored.to_string()
        }
    }
}
