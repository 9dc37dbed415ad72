use html_escape::decode_html_entities;
use scraper::{Html, Node};

/// Normalizes a post body or news message into plain text so that the two
/// can be compared with a substring check.
///
/// Platform bodies arrive as rendered HTML with entities nested inside the
/// markup, feed messages may carry raw entities and backslash escapes. The
/// steps are:
/// 1. decode HTML entities
/// 2. interpret the text as a quoted string literal, if it is one
/// 3. strip every tag, keeping text content only
/// 4. decode HTML entities again
pub fn canonicalize(raw: &str) -> String {
    let decoded = decode_html_entities(raw);
    let unquoted = unquote(&decoded).unwrap_or_else(|| decoded.into_owned());
    let stripped = strip_markup(&unquoted);
    decode_html_entities(&stripped).into_owned()
}

/// Reads `s` as the body of a double-quoted literal with backslash escapes:
/// `\a \b \f \n \r \t \v \\ \"`, `\xHH`, three-digit octal `\ooo`,
/// `\uHHHH` and `\UHHHHHHHH`.
///
/// Returns `None` if it is not a valid literal body, for example because of a
/// bare `"`, a raw newline, an unknown escape such as `\'` or `\/`, or byte
/// escapes that do not form UTF-8.
fn unquote(s: &str) -> Option<String> {
    if !s.contains('\\') {
        return None;
    }

    let mut out: Vec<u8> = Vec::with_capacity(s.len());
    let mut chars = s.chars();

    while let Some(c) = chars.next() {
        match c {
            '"' | '\n' => return None,
            '\\' => {
                let escaped = chars.next()?;
                match escaped {
                    'a' => out.push(0x07),
                    'b' => out.push(0x08),
                    'f' => out.push(0x0c),
                    'n' => out.push(b'\n'),
                    'r' => out.push(b'\r'),
                    't' => out.push(b'\t'),
                    'v' => out.push(0x0b),
                    '\\' => out.push(b'\\'),
                    '"' => out.push(b'"'),
                    'x' => out.push(u8::try_from(digits(&mut chars, 2, 16, 0)?).ok()?),
                    '0'..='7' => {
                        let first = escaped.to_digit(8)?;
                        out.push(u8::try_from(digits(&mut chars, 2, 8, first)?).ok()?);
                    }
                    'u' => push_char(&mut out, char::from_u32(digits(&mut chars, 4, 16, 0)?)?),
                    'U' => push_char(&mut out, char::from_u32(digits(&mut chars, 8, 16, 0)?)?),
                    _ => return None,
                }
            }
            c => push_char(&mut out, c),
        }
    }

    String::from_utf8(out).ok()
}

/// Reads exactly `count` digits in `radix`, continuing from `value`.
fn digits(
    chars: &mut std::str::Chars<'_>,
    count: usize,
    radix: u32,
    mut value: u32,
) -> Option<u32> {
    for _ in 0..count {
        value = value * radix + chars.next()?.to_digit(radix)?;
    }
    Some(value)
}

fn push_char(out: &mut Vec<u8>, c: char) {
    let mut buf = [0; 4];
    out.extend_from_slice(c.encode_utf8(&mut buf).as_bytes());
}

/// Allow-nothing sanitizer: every element is removed, text nodes are kept,
/// `script` and `style` contents are dropped entirely.
fn strip_markup(s: &str) -> String {
    if !s.contains('<') {
        return s.to_string();
    }

    let fragment = Html::parse_fragment(s);
    let mut out = String::with_capacity(s.len());

    for node in fragment.root_element().descendants() {
        let Node::Text(text) = node.value() else {
            continue;
        };
        let hidden = node.ancestors().any(|ancestor| {
            matches!(
                ancestor.value(),
                Node::Element(element) if matches!(element.name(), "script" | "style")
            )
        });
        if !hidden {
            out.push_str(text);
        }
    }

    out
}
