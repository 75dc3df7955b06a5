//! Key-selector prefixes.
//!
//! Payloads may carry leading `{key:value}` groups that select the encryptor
//! to use, e.g. `{key:mykey}{name:app}ciphertext`. The selector map always
//! contains the request's `name` and `profiles`; extra groups are parsed off
//! the payload, and everything except `name`/`profiles` is re-applied to the
//! ciphertext so the selection survives a round trip.

use std::collections::BTreeMap;

pub const NAME_KEY: &str = "name";
pub const PROFILES_KEY: &str = "profiles";

/// The selector map for `(name, profiles)` plus any prefix groups in `text`.
pub fn encryptor_keys(name: &str, profiles: &str, text: &str) -> BTreeMap<String, String> {
    let mut keys = BTreeMap::new();
    keys.insert(NAME_KEY.to_string(), name.to_string());
    keys.insert(PROFILES_KEY.to_string(), profiles.to_string());

    let mut rest = text.trim_start();
    while let Some((key, value, remainder)) = parse_group(rest) {
        keys.insert(key.to_string(), value.to_string());
        rest = remainder;
    }
    keys
}

/// `text` with its leading `{key:value}` groups removed.
pub fn strip_prefix(text: &str) -> &str {
    let mut rest = text;
    while let Some((_, _, remainder)) = parse_group(rest) {
        rest = remainder;
    }
    rest
}

/// Re-apply the non-request selector keys as a prefix of `input`.
pub fn add_prefix(keys: &BTreeMap<String, String>, input: String) -> String {
    let mut out = String::new();
    for (key, value) in keys {
        if key == NAME_KEY || key == PROFILES_KEY {
            continue;
        }
        out.push('{');
        out.push_str(key);
        out.push(':');
        out.push_str(value);
        out.push('}');
    }
    out.push_str(&input);
    out
}

fn parse_group(text: &str) -> Option<(&str, &str, &str)> {
    let rest = text.strip_prefix('{')?;
    let end = rest.find('}')?;
    let (key, value) = rest[..end].split_once(':')?;
    Some((key, value, &rest[end + 1..]))
}
