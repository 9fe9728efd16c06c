//! Percent-encoding helpers for segments, query values and fragments

/// Bytes `encodeURIComponent` leaves untouched.
fn is_component_safe(byte: u8) -> bool {
    matches!(
        byte,
        b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'!' | b'~' | b'*' | b'\''
    )
}

fn encode_with(input: &str, keep: &[u8]) -> String {
    let mut result = String::with_capacity(input.len() * 3);
    for byte in input.bytes() {
        if is_component_safe(byte) || keep.contains(&byte) {
            result.push(byte as char);
        } else {
            result.push_str(&format!("%{:02X}", byte));
        }
    }
    result
}

/// Encodes a path segment or matrix parameter. Parentheses are always escaped
/// because they delimit outlets.
pub fn encode_segment(input: &str) -> String {
    encode_with(input, b"@:$,&")
}

pub fn encode_query(input: &str) -> String {
    encode_with(input, b"@:$,;")
}

pub fn encode_fragment(input: &str) -> String {
    encode_with(input, b";,/?:@&=+$#()")
}

/// Decodes `%XX` escapes. Invalid escapes are kept verbatim.
pub fn decode(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            if let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2])) {
                out.push(hi << 4 | lo);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(byte: u8) -> Option<u8> {
    (byte as char).to_digit(16).map(|d| d as u8)
}
