use crate::error::ErrorCategory;

fn api_error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request_error",
        ErrorCategory::ServerError => "api_error",
    }
}

#[must_use]
pub(crate) fn api_error_payload(cat: ErrorCategory, message: &str) -> serde_json::Value {
    serde_json::json!({
        "error": {
            "message": message,
            "type": api_error_type(cat),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_shape() {
        let payload = api_error_payload(ErrorCategory::ServerError, "boom");
        assert_eq!(
            payload,
            serde_json::json!({"error": {"message": "boom", "type": "api_error"}})
        );
    }
}
