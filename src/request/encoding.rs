//! Translation of form-encoded text into HTML entities.
//!
//! Body parameters arrive percent-encoded and are never decoded by the reader.
//! Chain nodes that echo submitted text into a page use this to render it
//! safely: every escape becomes an entity instead of a raw character.

/// Replace form encoding with HTML entities.
///
/// - `+` becomes a space
/// - `%0D%0A` becomes `<br/>`
/// - `%HH` becomes a named entity for `"`, `&`, `<`, `>` and no-break space,
///   and a numeric entity (`&#233;`) otherwise
///
/// Malformed escapes are copied through unchanged.
pub fn translate_to_html_entities(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = String::with_capacity(input.len());
    let mut start = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'+' => {
                out.push_str(&input[start..i]);
                out.push(' ');
                i += 1;
                start = i;
            }
            b'%' if bytes.len() - i >= 6 && bytes[i..i + 6].eq_ignore_ascii_case(b"%0D%0A") => {
                out.push_str(&input[start..i]);
                out.push_str("<br/>");
                i += 6;
                start = i;
            }
            b'%' => match hex_byte(bytes.get(i + 1..i + 3)) {
                Some(code) => {
                    out.push_str(&input[start..i]);
                    push_entity(&mut out, code);
                    i += 3;
                    start = i;
                }
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    out.push_str(&input[start..]);
    out
}

/// Both bytes must be hex digits; `from_str_radix` alone accepts a sign.
fn hex_byte(pair: Option<&[u8]>) -> Option<u8> {
    let pair = pair?;
    if !pair.iter().all(u8::is_ascii_hexdigit) {
        return None;
    }
    u8::from_str_radix(std::str::from_utf8(pair).ok()?, 16).ok()
}

fn push_entity(out: &mut String, code: u8) {
    match code {
        0x22 => out.push_str("&quot;"),
        0x26 => out.push_str("&amp;"),
        0x3C => out.push_str("&lt;"),
        0x3E => out.push_str("&gt;"),
        0xA0 => out.push_str("&nbsp;"),
        _ => {
            out.push_str("&#");
            out.push_str(&code.to_string());
            out.push(';');
        }
    }
}
