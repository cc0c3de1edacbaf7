use hmac::{Hmac, Mac};
use sha2::Sha512;

type HmacSha512 = Hmac<Sha512>;

/// Fields covered by the gateway signature, in lexicographic order. The
/// canonical string is the concatenation of their values, so field ordering
/// in the delivered JSON does not matter.
const SIGNED_FIELDS: [&str; 5] = [
    "amount_cents",
    "currency",
    "order_ref",
    "success",
    "transaction_ref",
];

/// Authenticates inbound gateway notifications with the pre-shared secret.
/// Never panics on malformed input; anything that does not check out is a
/// verification failure.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: String,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        SignatureVerifier {
            secret: secret.into(),
        }
    }

    /// Hex HMAC-SHA512 over the canonical field string. Used by the mock
    /// gateway and by tests to produce valid signatures.
    pub fn compute(&self, payload: &serde_json::Value) -> String {
        let mut mac = match HmacSha512::new_from_slice(self.secret.as_bytes()) {
            Ok(m) => m,
            Err(_) => return String::new(),
        };
        mac.update(canonical_string(payload).as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    /// Constant-time check of the supplied signature. Missing secret, empty
    /// or non-hex signature, or any mismatch all return false.
    pub fn verify(&self, payload: &serde_json::Value, provided: &str) -> bool {
        if self.secret.is_empty() || provided.is_empty() {
            return false;
        }
        let provided_bytes = match hex::decode(provided.trim()) {
            Ok(b) => b,
            Err(_) => return false,
        };

        let mut mac = match HmacSha512::new_from_slice(self.secret.as_bytes()) {
            Ok(m) => m,
            Err(_) => return false,
        };
        mac.update(canonical_string(payload).as_bytes());
        mac.verify_slice(&provided_bytes).is_ok()
    }
}

fn canonical_string(payload: &serde_json::Value) -> String {
    let mut out = String::new();
    for field in SIGNED_FIELDS {
        match payload.get(field) {
            Some(serde_json::Value::String(s)) => out.push_str(s),
            Some(serde_json::Value::Bool(b)) => out.push_str(if *b { "true" } else { "false" }),
            Some(serde_json::Value::Number(n)) => out.push_str(&n.to_string()),
            _ => {}
        }
    }
    out
}
