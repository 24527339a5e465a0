//! Webhook signature verification.
//!
//! Stripe signs `"{t}.{body}"` with the endpoint secret and sends
//! `Stripe-Signature: t=<unix>,v1=<hex>[,v1=<hex>...]`.

use crate::crypto::{constant_time_eq, hmac_sha256_hex};

use super::client::StripeError;

/// Verify a `Stripe-Signature` header against the raw request body.
///
/// `now` and `tolerance_seconds` bound how old the signed timestamp may be.
///
/// # Errors
///
/// `MalformedSignature` when the header lacks a timestamp or any `v1`
/// signature, `InvalidSignature` when no signature matches or the timestamp
/// is outside the tolerance.
pub fn verify_signature(
    payload: &[u8],
    header: &str,
    secret: &str,
    tolerance_seconds: i64,
    now: i64,
) -> Result<(), StripeError> {
    let mut timestamp: Option<&str> = None;
    let mut signatures: Vec<&str> = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", ts)) => timestamp = Some(ts),
            Some(("v1", sig)) => signatures.push(sig),
            _ => {}
        }
    }

    let timestamp =
        timestamp.ok_or_else(|| StripeError::MalformedSignature("missing timestamp".into()))?;
    let signed_at: i64 = timestamp
        .parse()
        .map_err(|_| StripeError::MalformedSignature("non-numeric timestamp".into()))?;
    if signatures.is_empty() {
        return Err(StripeError::MalformedSignature("no v1 signature".into()));
    }

    if now.abs_diff(signed_at) > tolerance_seconds.unsigned_abs() {
        tracing::warn!(signed_at, now, "Webhook timestamp outside tolerance");
        return Err(StripeError::InvalidSignature);
    }

    let mut signed_payload = Vec::with_capacity(timestamp.len() + 1 + payload.len());
    signed_payload.extend_from_slice(timestamp.as_bytes());
    signed_payload.push(b'.');
    signed_payload.extend_from_slice(payload);

    let expected = hmac_sha256_hex(secret.as_bytes(), &signed_payload)
        .map_err(|e| StripeError::Configuration(e.to_string()))?;

    if signatures
        .iter()
        .any(|sig| constant_time_eq(expected.as_bytes(), sig.as_bytes()))
    {
        Ok(())
    } else {
        Err(StripeError::InvalidSignature)
    }
}

/// Build a `Stripe-Signature` header value for `payload` signed at `timestamp`.
///
/// # Errors
///
/// Propagates HMAC key errors.
pub fn sign_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String, StripeError> {
    let mut signed_payload = format!("{timestamp}.").into_bytes();
    signed_payload.extend_from_slice(payload);
    let signature = hmac_sha256_hex(secret.as_bytes(), &signed_payload)
        .map_err(|e| StripeError::Configuration(e.to_string()))?;
    Ok(format!("t={timestamp},v1={signature}"))
}
