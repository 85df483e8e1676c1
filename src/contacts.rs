//! Phone number extraction and contacts.txt output

use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::client::Chat;
use crate::error::Result;

/// Leading digit run directly followed by `@`, e.g. `79991234567@s.whatsapp.net`.
static USER_JID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)@").expect("static regex is valid"));

/// Phone number for a user JID, `None` for groups and broadcast lists.
pub fn phone_number(jid: &str) -> Option<String> {
    USER_JID
        .captures(jid)
        .map(|caps| format!("+{}", &caps[1]))
}

/// Map chats to `+<digits>` numbers, keeping chat order and duplicates.
pub fn extract_phone_numbers(chats: &[Chat]) -> Vec<String> {
    chats
        .iter()
        .filter_map(|chat| phone_number(&chat.jid))
        .collect()
}

/// Overwrite `path` with one number per line (LF, no trailing newline).
pub fn write_contacts<P: AsRef<Path>>(path: P, numbers: &[String]) -> Result<usize> {
    fs::write(path.as_ref(), numbers.join("\n"))?;
    Ok(numbers.len())
}
