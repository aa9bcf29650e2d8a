//! Response envelope returned by the vault and sync API facades.
//!
//! Facades never propagate errors to their callers: every outcome, including
//! failures, is folded into an [`ApiResponse`].

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

impl<T> ApiResponse<T> {
    #[must_use]
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error_message: None,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error_message: Some(message.into()),
        }
    }

    /// A failed response that still carries a payload (e.g. conflict details).
    #[must_use]
    pub fn failure_with(data: T, message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: Some(data),
            error_message: Some(message.into()),
        }
    }

    pub fn from_result<E: std::fmt::Display>(result: Result<T, E>) -> Self {
        match result {
            Ok(data) => Self::ok(data),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

impl ApiResponse<()> {
    /// Success without a payload.
    #[must_use]
    pub fn done() -> Self {
        Self {
            success: true,
            data: None,
            error_message: None,
        }
    }

    pub fn from_outcome<E: std::fmt::Display>(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::done(),
            Err(e) => Self::failure(e.to_string()),
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_serializes_camel_case() {
        let resp: ApiResponse<()> = ApiResponse::failure("invalid PIN");
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "success": false, "errorMessage": "invalid PIN" })
        );
    }

    #[test]
    fn from_result_keeps_error_text() {
        let resp: ApiResponse<u8> = ApiResponse::from_result(Err::<u8, _>("vault is locked"));
        assert!(!resp.success);
        assert_eq!(resp.error_message.as_deref(), Some("vault is locked"));

        let resp: ApiResponse<u8> = ApiResponse::from_result(Ok::<_, String>(3));
        assert_eq!(resp.data, Some(3));
    }

    #[test]
    fn done_omits_data() {
        let json = serde_json::to_value(ApiResponse::done()).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true }));

        let resp = ApiResponse::from_outcome(Err::<(), _>("vault is unavailable"));
        assert!(!resp.success);
    }
}
