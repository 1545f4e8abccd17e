//! Base64 VLQ as used by the `mappings` field of a source map.

const BASE64: &[u8; 64] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789+/";

const VLQ_BASE_SHIFT: u32 = 5;
const VLQ_BASE: i64 = 1 << VLQ_BASE_SHIFT;
const VLQ_BASE_MASK: i64 = VLQ_BASE - 1;
const VLQ_CONTINUATION_BIT: i64 = VLQ_BASE;

/// Append the VLQ encoding of `value` to `out`.
pub fn encode(value: i64, out: &mut String) {
    let mut vlq = if value < 0 {
        ((-value) << 1) | 1
    } else {
        value << 1
    };

    loop {
        let mut digit = vlq & VLQ_BASE_MASK;
        vlq >>= VLQ_BASE_SHIFT;
        if vlq > 0 {
            digit |= VLQ_CONTINUATION_BIT;
        }
        out.push(BASE64[digit as usize] as char);
        if vlq == 0 {
            break;
        }
    }
}

/// Decode every value in one comma-free segment.
pub fn decode_segment(segment: &str) -> eyre::Result<Vec<i64>> {
    let mut values = Vec::with_capacity(5);
    let mut value: i64 = 0;
    let mut shift = 0;

    for c in segment.bytes() {
        let digit = base64_value(c)
            .ok_or_else(|| eyre::eyre!("invalid base64 character {:?} in mappings", c as char))?;
        eyre::ensure!(shift < 60, "VLQ value too large in segment {segment:?}");

        value += (digit & VLQ_BASE_MASK) << shift;
        if digit & VLQ_CONTINUATION_BIT != 0 {
            shift += VLQ_BASE_SHIFT;
            continue;
        }

        let negative = value & 1 == 1;
        let magnitude = value >> 1;
        values.push(if negative { -magnitude } else { magnitude });
        value = 0;
        shift = 0;
    }

    eyre::ensure!(shift == 0, "truncated VLQ value in segment {segment:?}");
    Ok(values)
}

fn base64_value(c: u8) -> Option<i64> {
    let value = match c {
        b'A'..=b'Z' => c - b'A',
        b'a'..=b'z' => c - b'a' + 26,
        b'0'..=b'9' => c - b'0' + 52,
        b'+' => 62,
        b'/' => 63,
        _ => return None,
    };
    Some(value as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encoded(values: &[i64]) -> String {
        let mut out = String::new();
        for v in values {
            encode(*v, &mut out);
        }
        out
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encoded(&[0]), "A");
        assert_eq!(encoded(&[1]), "C");
        assert_eq!(encoded(&[-1]), "D");
        assert_eq!(encoded(&[16]), "gB");
        assert_eq!(encoded(&[0, 0, 1, 0]), "AACA");
    }

    #[test]
    fn decodes_multi_digit_values() {
        assert_eq!(decode_segment("gB").unwrap(), vec![16]);
        assert_eq!(decode_segment("AACA").unwrap(), vec![0, 0, 1, 0]);
        assert_eq!(decode_segment("2HwcqxB").unwrap(), vec![123, 456, 789]);
    }

    #[test]
    fn rejects_garbage() {
        assert!(decode_segment("A!").is_err());
        assert!(decode_segment("g").is_err());
    }
}
