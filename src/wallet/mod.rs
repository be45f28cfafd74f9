use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};

/// Generate a new secp256k1 keypair and return (priv_hex, pub_hex_compressed).
/// The compressed public key hex doubles as the identity on the ledger.
pub fn generate_keypair_hex() -> (String, String) {
    let secp = Secp256k1::new();
    let (sk, pk) = secp.generate_keypair(&mut OsRng);
    (hex::encode(sk.secret_bytes()), hex::encode(pk.serialize()))
}

/// Compressed public key (hex) for a secret key (hex).
pub fn public_key_hex(secret_hex: &str) -> Result<String, &'static str> {
    let sk = parse_secret(secret_hex)?;
    let secp = Secp256k1::signing_only();
    Ok(hex::encode(PublicKey::from_secret_key(&secp, &sk).serialize()))
}

/// Normalize a hex public key (lowercase, compressed) after checking it parses.
pub fn normalize_pubkey_hex(pubkey_hex: &str) -> Result<String, &'static str> {
    let bytes = hex::decode(pubkey_hex).map_err(|_| "invalid pubkey hex")?;
    let pk = PublicKey::from_slice(&bytes).map_err(|_| "invalid pubkey bytes")?;
    Ok(hex::encode(pk.serialize()))
}

/// Sign a 32-byte digest; returns the hex DER signature.
pub fn sign_hex(secret_hex: &str, msg32: [u8; 32]) -> Result<String, &'static str> {
    let sk = parse_secret(secret_hex)?;
    let secp = Secp256k1::signing_only();
    let msg = Message::from_digest_slice(&msg32).map_err(|_| "invalid message length")?;
    let sig = secp.sign_ecdsa(&msg, &sk);
    Ok(hex::encode(&*sig.serialize_der()))
}

/// Verify a signature (hex DER) against the given pubkey (hex, compressed) and message hash (32 bytes).
pub fn verify_signature_hex(
    pubkey_hex: &str,
    sig_hex: &str,
    msg32: [u8; 32],
) -> Result<bool, &'static str> {
    let secp = Secp256k1::verification_only();

    let sig_bytes = hex::decode(sig_hex).map_err(|_| "invalid signature hex")?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| "invalid DER signature")?;

    let pk_bytes = hex::decode(pubkey_hex).map_err(|_| "invalid pubkey hex")?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| "invalid pubkey bytes")?;

    let msg = Message::from_digest_slice(&msg32).map_err(|_| "invalid message length")?;
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}

fn parse_secret(secret_hex: &str) -> Result<SecretKey, &'static str> {
    let bytes = hex::decode(secret_hex).map_err(|_| "invalid secret key hex")?;
    SecretKey::from_slice(&bytes).map_err(|_| "invalid secret key bytes")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_then_verify() {
        let (sk, pk) = generate_keypair_hex();
        assert_eq!(public_key_hex(&sk).unwrap(), pk);

        let digest = crate::crypto::sha256(b"10 boxes of gloves");
        let sig = sign_hex(&sk, digest).unwrap();
        assert!(verify_signature_hex(&pk, &sig, digest).unwrap());

        let other = crate::crypto::sha256(b"11 boxes of gloves");
        assert!(!verify_signature_hex(&pk, &sig, other).unwrap());
    }

    #[test]
    fn rejects_garbage_keys() {
        assert!(normalize_pubkey_hex("zz").is_err());
        assert!(normalize_pubkey_hex("02ab").is_err());
        assert!(sign_hex("00", [0u8; 32]).is_err());
    }
}
