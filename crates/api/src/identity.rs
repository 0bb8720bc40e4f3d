//! Caller identity forwarded by the upstream gateway.

use axum::http::HeaderMap;
use common::{BuyerId, VendorId};

use crate::error::ApiError;

pub const BUYER_ID_HEADER: &str = "x-buyer-id";
pub const VENDOR_ID_HEADER: &str = "x-vendor-id";

/// Reads the authenticated buyer from the request headers.
pub fn buyer_id(headers: &HeaderMap) -> Result<BuyerId, ApiError> {
    parse_header(headers, BUYER_ID_HEADER)
}

/// Reads the authenticated vendor from the request headers.
pub fn vendor_id(headers: &HeaderMap) -> Result<VendorId, ApiError> {
    parse_header(headers, VENDOR_ID_HEADER)
}

fn parse_header<T>(headers: &HeaderMap, name: &str) -> Result<T, ApiError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let value = headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::BadRequest(format!("Missing {name} header")))?;
    value
        .trim()
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid {name} header: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_reads_buyer_header() {
        let buyer = BuyerId::new();
        let mut headers = HeaderMap::new();
        headers.insert(
            BUYER_ID_HEADER,
            HeaderValue::from_str(&buyer.to_string()).unwrap(),
        );
        assert_eq!(buyer_id(&headers).unwrap(), buyer);
    }

    #[test]
    fn test_missing_or_malformed_header() {
        let mut headers = HeaderMap::new();
        assert!(matches!(vendor_id(&headers), Err(ApiError::BadRequest(_))));

        headers.insert(VENDOR_ID_HEADER, HeaderValue::from_static("vendor-7"));
        assert!(matches!(vendor_id(&headers), Err(ApiError::BadRequest(_))));
    }
}
