use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Verifies the two HMAC-SHA256 channels the gateway signs with the shared
/// secret: the browser-delivered callback (advisory) and the
/// server-to-server webhook (authoritative).
///
/// Webhook signatures cover the exact raw bytes of the request body, so the
/// body must be verified before any JSON parsing touches it. Comparison is
/// constant-time via `Mac::verify_slice`.
#[derive(Clone)]
pub struct SignatureVerifier {
    secret: Vec<u8>,
}

impl SignatureVerifier {
    pub fn new(secret: impl Into<Vec<u8>>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Authoritative channel: HMAC over the raw request body, hex-encoded in
    /// the signature header.
    pub fn verify_webhook(&self, raw_body: &[u8], signature_hex: &str) -> bool {
        let expected = match hex::decode(signature_hex.trim()) {
            Ok(bytes) => bytes,
            Err(_) => return false,
        };
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(raw_body);
        mac.verify_slice(&expected).is_ok()
    }

    /// Advisory channel: HMAC over `order_reference|payment_reference`.
    /// Tells the browser "looks successful"; never proof of capture.
    pub fn verify_callback(
        &self,
        order_reference: &str,
        payment_reference: &str,
        signature_hex: &str,
    ) -> bool {
        let payload = format!("{}|{}", order_reference, payment_reference);
        self.verify_webhook(payload.as_bytes(), signature_hex)
    }

    /// Produces the hex signature for a payload. The provider's side of the
    /// contract; used by the mock gateway and tests.
    pub fn sign(&self, payload: &[u8]) -> String {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .expect("HMAC can take key of any size");
        mac.update(payload);
        hex::encode(mac.finalize().into_bytes())
    }
}
