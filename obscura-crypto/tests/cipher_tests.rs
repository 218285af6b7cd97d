use obscura_crypto::{
    decrypt, decrypt_reference, encrypt, encrypt_reference, CryptoError, ProtectedReference,
    SecretKey,
};
use pretty_assertions::assert_eq;

fn key(s: &str) -> SecretKey {
    SecretKey::parse(s).unwrap()
}

// ── Known vectors ────────────────────────────────────────────────

#[test]
fn known_vector_encrypts_deterministically() {
    let reference = encrypt("bafyABC", &key("123456789012"));
    // b+1, a+2, f+3, y+4, A+5, B+6, C+7
    assert_eq!(reference.as_str(), "6363697d46484a");
}

#[test]
fn known_vector_decrypts_with_right_key() {
    let reference = encrypt("bafyABC", &key("123456789012"));
    assert_eq!(decrypt(&reference, &key("123456789012")).unwrap(), "bafyABC");
}

#[test]
fn wrong_key_decrypts_silently_to_garbage() {
    let reference = encrypt("bafyABC", &key("123456789012"));
    let garbled = decrypt(&reference, &key("999999999999")).unwrap();
    assert_ne!(garbled, "bafyABC");
    assert_eq!(garbled, "ZZ`t=?A");
}

#[test]
fn key_cycles_with_period_twelve() {
    let k = key("100000000000");
    let reference = encrypt(&"a".repeat(25), &k);
    let bytes = hex_bytes(reference.as_str());
    for (i, b) in bytes.iter().enumerate() {
        let expected = if i % 12 == 0 { b'b' } else { b'a' };
        assert_eq!(*b, expected, "byte {i}");
    }
}

#[test]
fn shift_wraps_modulo_256() {
    // U+00FF encodes as c3 bf.
    let k = key("999999999999");
    let plaintext = "\u{ff}";
    let reference = encrypt(plaintext, &k);
    assert_eq!(reference.as_str(), "ccc8");
    assert_eq!(decrypt(&reference, &k).unwrap(), plaintext);

    let reference = ProtectedReference::parse("0001").unwrap();
    let restored = decrypt(&reference, &k).unwrap();
    // 0x00 - 9 and 0x01 - 9 wrap to 0xf7 0xf8, which are not valid UTF-8.
    assert_eq!(restored, "\u{fffd}\u{fffd}");
}

#[test]
fn empty_plaintext_yields_empty_reference() {
    let reference = encrypt("", &key("123456789012"));
    assert!(reference.is_empty());
    assert_eq!(reference.byte_len(), 0);
    assert_eq!(decrypt(&reference, &key("123456789012")).unwrap(), "");
}

#[test]
fn multibyte_utf8_roundtrips() {
    let k = key("987654321098");
    let address = "bafy-ファイル-📁";
    let reference = encrypt(address, &k);
    assert_eq!(reference.byte_len(), address.len());
    assert_eq!(decrypt(&reference, &k).unwrap(), address);
}

#[test]
fn output_is_lowercase_even_length_hex() {
    let reference = encrypt("QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG", &key("555555555555"));
    assert_eq!(reference.as_str().len() % 2, 0);
    assert!(reference
        .as_str()
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
}

// ── Key validation ───────────────────────────────────────────────

#[test]
fn string_keyed_entry_points_reject_bad_keys() {
    for bad in ["", "12345678901", "1234567890123", "12345678901a", "1234 5678901", "１２３４５６７８９０１２"] {
        assert!(
            matches!(encrypt_reference("bafy", bad), Err(CryptoError::InvalidKeyFormat(_))),
            "encrypt accepted {bad:?}"
        );
        assert!(
            matches!(decrypt_reference("6263", bad), Err(CryptoError::InvalidKeyFormat(_))),
            "decrypt accepted {bad:?}"
        );
    }
}

#[test]
fn key_is_checked_before_ciphertext() {
    // Both inputs are bad; the key error wins.
    let err = decrypt_reference("xyz", "short").unwrap_err();
    assert!(matches!(err, CryptoError::InvalidKeyFormat(_)));
}

// ── Ciphertext validation ───────────────────────────────────────

#[test]
fn odd_length_reference_is_rejected() {
    let err = decrypt_reference("abc", "123456789012").unwrap_err();
    assert!(matches!(err, CryptoError::InvalidCiphertextEncoding(_)));
}

#[test]
fn non_hex_reference_is_rejected() {
    let err = decrypt_reference("zz00", "123456789012").unwrap_err();
    assert!(matches!(err, CryptoError::InvalidCiphertextEncoding(_)));
}

#[test]
fn uppercase_hex_is_normalized() {
    let reference = ProtectedReference::parse("6363697D46484A").unwrap();
    assert_eq!(reference.as_str(), "6363697d46484a");
    assert_eq!(decrypt(&reference, &key("123456789012")).unwrap(), "bafyABC");
}

#[test]
fn reference_serializes_as_plain_string() {
    let reference = encrypt("bafyABC", &key("123456789012"));
    let json = serde_json::to_string(&reference).unwrap();
    assert_eq!(json, "\"6363697d46484a\"");

    let back: ProtectedReference = serde_json::from_str(&json).unwrap();
    assert_eq!(back, reference);

    assert!(serde_json::from_str::<ProtectedReference>("\"abc\"").is_err());
}

fn hex_bytes(s: &str) -> Vec<u8> {
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).unwrap())
        .collect()
}

mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn any_key() -> impl Strategy<Value = SecretKey> {
        (obscura_crypto::KEY_MIN..=obscura_crypto::KEY_MAX)
            .prop_map(|v| SecretKey::from_u64(v).unwrap())
    }

    proptest! {
        #[test]
        fn roundtrip_any_string(s in any::<String>(), k in any_key()) {
            let reference = encrypt(&s, &k);
            prop_assert_eq!(decrypt(&reference, &k).unwrap(), s);
        }

        #[test]
        fn reference_length_is_twice_byte_length(s in any::<String>(), k in any_key()) {
            let reference = encrypt(&s, &k);
            prop_assert_eq!(reference.as_str().len(), s.len() * 2);
        }

        #[test]
        fn string_api_matches_typed_api(s in "[a-zA-Z0-9]{0,64}", k in any_key()) {
            let typed = encrypt(&s, &k);
            let stringly = encrypt_reference(&s, k.as_str()).unwrap();
            prop_assert_eq!(&typed, &stringly);
            prop_assert_eq!(decrypt_reference(stringly.as_str(), k.as_str()).unwrap(), s);
        }
    }
}
