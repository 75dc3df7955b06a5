//! Recovery of payloads mangled by form posting.
//!
//! Clients regularly POST what they mean as plain text with a form content
//! type, which URL-encodes the payload and eats base64 padding. The rule
//! below is externally observed and must not be cleaned up:
//!
//! For input that does *not* carry `Content-Type: text/plain` and ends in
//! `=`:
//!
//! 1. URL-decode (form style: `+` becomes space, `%XX` decoded).
//! 2. When decrypting, turn spaces back into `+` (base64 recovered).
//! 3. `candidate` is the decoded data minus its last character.
//! 4. When decrypting: iff the decoded data still ends in `=` and has odd
//!    length, return `candidate` if it parses as hex, else if it parses as
//!    base64; otherwise return the decoded data unstripped.
//! 5. When encrypting: return `candidate` (the client sent a form but meant
//!    text).
//!
//! Everything else passes through unchanged.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use percent_encoding::percent_decode_str;

/// Undo form mangling of `data`; `cipher` selects the decrypt-side rules.
pub fn strip_form_data(data: &str, text_plain: bool, cipher: bool) -> String {
    if text_plain || !data.ends_with('=') {
        return data.to_string();
    }

    let mut data = url_decode(data);
    if cipher {
        data = data.replace(' ', "+");
    }
    if data.is_empty() {
        return data;
    }
    let cut = data.char_indices().last().map(|(i, _)| i).unwrap_or(0);
    let candidate = data[..cut].to_string();

    if cipher {
        let length = data.chars().count();
        if data.ends_with('=') && length % 2 == 1 {
            if hex::decode(&candidate).is_ok() {
                return candidate;
            }
            if BASE64.decode(candidate.as_bytes()).is_ok() {
                return candidate;
            }
        }
        return data;
    }

    candidate
}

/// Form-style URL decoding: `+` means space, `%XX` is percent-decoded.
fn url_decode(data: &str) -> String {
    let plus_replaced = data.replace('+', " ");
    percent_decode_str(&plus_replaced)
        .decode_utf8_lossy()
        .into_owned()
}
