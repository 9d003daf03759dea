//! Reading and rewriting the per-commit patch descriptor trailer.

use crate::errors::Result;

/// All values of trailer `key` in a commit message, in message order.
pub fn descriptors(message: &str, key: &str) -> Result<Vec<String>> {
    let trailers = git2::message_trailers_strs(message)?;
    Ok(trailers
        .iter()
        .filter(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v.trim().to_string())
        .collect())
}

/// Return `message` with exactly one `key: value` trailer, replacing any
/// existing values of that key.
pub fn set_descriptor(message: &str, key: &str, value: &str) -> String {
    let trimmed = message.trim_end();
    let new_trailer = format!("{key}: {value}");

    let (body, block) = match trimmed.rfind("\n\n") {
        Some(i) if is_trailer_block(&trimmed[i + 2..]) => (&trimmed[..i], Some(&trimmed[i + 2..])),
        _ => (trimmed, None),
    };

    let mut lines: Vec<&str> = Vec::new();
    if let Some(block) = block {
        let mut skipping = false;
        for line in block.lines() {
            if line.starts_with(char::is_whitespace) {
                if !skipping {
                    lines.push(line);
                }
                continue;
            }
            skipping = trailer_key(line).is_some_and(|k| k.eq_ignore_ascii_case(key));
            if !skipping {
                lines.push(line);
            }
        }
    }

    let mut result = String::with_capacity(trimmed.len() + new_trailer.len() + 3);
    result.push_str(body);
    result.push_str("\n\n");
    for line in lines {
        result.push_str(line);
        result.push('\n');
    }
    result.push_str(&new_trailer);
    result.push('\n');
    result
}

/// Whether git recognizes `key` as a trailer token: ASCII letters, digits
/// and `-`.
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
}

fn trailer_key(line: &str) -> Option<&str> {
    let (key, _) = line.split_once(':')?;
    is_valid_key(key).then_some(key)
}

fn is_trailer_block(paragraph: &str) -> bool {
    let mut saw_trailer = false;
    for line in paragraph.lines() {
        if line.starts_with(char::is_whitespace) && saw_trailer {
            continue;
        }
        if trailer_key(line).is_none() {
            return false;
        }
        saw_trailer = true;
    }
    saw_trailer
}
