//! HMAC-SHA256 request signing shared by the REST adapters
//!
//! - Binance: hex digest of the encoded query string
//! - KuCoin (v1): hex digest of base64(`endpoint/nonce/params`)
//! - OKEx (v3): base64 digest of `timestamp + METHOD + path + body`

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::adapters::errors::{ExchangeError, ExchangeResult};

type HmacSha256 = Hmac<Sha256>;

fn digest(secret: &str, message: &str) -> ExchangeResult<Vec<u8>> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| ExchangeError::AuthenticationFailed(format!("Invalid HMAC key: {}", e)))?;
    mac.update(message.as_bytes());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Lowercase hex HMAC-SHA256
pub fn hmac_sha256_hex(secret: &str, message: &str) -> ExchangeResult<String> {
    Ok(hex::encode(digest(secret, message)?))
}

/// Standard base64 HMAC-SHA256
pub fn hmac_sha256_base64(secret: &str, message: &str) -> ExchangeResult<String> {
    Ok(BASE64.encode(digest(secret, message)?))
}

/// KuCoin v1 signature for `endpoint` (path without host), `nonce` (ms) and
/// the sorted, encoded query string
pub fn kucoin_signature(
    secret: &str,
    endpoint: &str,
    nonce: i64,
    query: &str,
) -> ExchangeResult<String> {
    let plain = format!("{}/{}/{}", endpoint, nonce, query);
    hmac_sha256_hex(secret, &BASE64.encode(plain.as_bytes()))
}

/// OKEx v3 prehash string
pub fn okex_prehash(timestamp: &str, method: &str, request_path: &str, body: &str) -> String {
    format!("{}{}{}{}", timestamp, method.to_uppercase(), request_path, body)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hmac_hex_known_vector() {
        let sig = hmac_sha256_hex("key", "The quick brown fox jumps over the lazy dog").unwrap();
        assert_eq!(
            sig,
            "f7bc83f430538424b13298e6aa6fb143ef4d59a14946175997479dbc2d1a3cd8"
        );
    }

    #[test]
    fn test_binance_documented_signature() {
        let secret = "NhqPtmdSJYdKjVHjA7PZj4Mge3R5YNiP1e3UZjInClVN65XAbvqqM6A7H5fATj0j";
        let query = "symbol=LTCBTC&side=BUY&type=LIMIT&timeInForce=GTC&quantity=1&price=0.1&recvWindow=5000&timestamp=1499827319559";
        assert_eq!(
            hmac_sha256_hex(secret, query).unwrap(),
            "c8db56825ae71d6d79447849e617115f4a920fa2acdcab2b053c4b2838bd6b71"
        );
    }

    #[test]
    fn test_base64_matches_hex_digest() {
        let hex_sig = hmac_sha256_hex("secret", "message").unwrap();
        let b64_sig = hmac_sha256_base64("secret", "message").unwrap();
        let decoded = BASE64.decode(b64_sig).unwrap();
        assert_eq!(hex::encode(decoded), hex_sig);
    }

    #[test]
    fn test_kucoin_signature_signs_base64_plaintext() {
        let plain = BASE64.encode("/v1/order/1500000000000/amount=10&symbol=NULS-ETH");
        let expected = hmac_sha256_hex("secret", &plain).unwrap();
        let actual =
            kucoin_signature("secret", "/v1/order", 1_500_000_000_000, "amount=10&symbol=NULS-ETH")
                .unwrap();
        assert_eq!(actual, expected);
    }

    #[test]
    fn test_okex_prehash_uppercases_method() {
        let prehash = okex_prehash("2019-03-08T10:59:25.789Z", "post", "/api/spot/v3/orders", "{}");
        assert_eq!(prehash, "2019-03-08T10:59:25.789ZPOST/api/spot/v3/orders{}");
    }
}
