use data_encoding::{BASE64_NOPAD, DecodeError};

/**
    Convert a standard base64 string to the provider's URL-safe form:
    `+` -> `-`, `/` -> `_`, trailing `=` padding stripped.
*/
pub fn to_urlsafe_nopad(std_b64: &str) -> String {
    std_b64
        .trim_end_matches('=')
        .replace('+', "-")
        .replace('/', "_")
}

/**
    Decode a URL-safe base64 string into bytes.

    The provider is inconsistent about padding, so both padded and unpadded
    inputs are accepted. Standard-alphabet input decodes too.
*/
pub fn decode_urlsafe(s: &str) -> Result<Vec<u8>, DecodeError> {
    let std = s
        .trim()
        .trim_end_matches('=')
        .replace('-', "+")
        .replace('_', "/");
    BASE64_NOPAD.decode(std.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use data_encoding::BASE64;

    #[test]
    fn urlsafe_conversion_substitutes_and_strips() {
        assert_eq!(to_urlsafe_nopad("a+b/c=="), "a-b_c");
        assert_eq!(to_urlsafe_nopad("abcd"), "abcd");
    }

    #[test]
    fn decode_urlsafe_round_trip() {
        let data: Vec<u8> = (0u8..=255).collect();
        let encoded = to_urlsafe_nopad(&BASE64.encode(&data));
        assert_eq!(decode_urlsafe(&encoded).unwrap(), data);
    }

    #[test]
    fn decode_urlsafe_accepts_padded_input() {
        let padded = BASE64.encode(b"hi").replace('+', "-").replace('/', "_");
        assert_eq!(decode_urlsafe(&padded).unwrap(), b"hi");
    }

    #[test]
    fn decode_urlsafe_accepts_standard_alphabet() {
        assert_eq!(decode_urlsafe(&BASE64.encode(b"hi")).unwrap(), b"hi");
    }

    #[test]
    fn decode_urlsafe_rejects_garbage() {
        assert!(decode_urlsafe("not base64 at all!").is_err());
    }
}
