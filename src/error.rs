//! Error Handling Module
//!
//! Provides type-safe error handling with proper HTTP status code mapping.
//! Uses thiserror for domain errors and integrates with tracing for structured logging.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

use crate::fhe::FheError;

/// 렌딩 프로토콜 에러 타입
///
/// # Design Decision
///
/// 각 에러 variant는 적절한 HTTP 상태 코드에 매핑됨
/// - 클라이언트 에러: 4xx (잘못된 요청, 인증 실패 등)
/// - 서버 에러: 5xx (내부 오류)
///
/// 중요: 클램핑(요청 금액 > 잔액)은 에러가 아님.
/// 암호문 비교 결과를 노출하지 않기 위해 성공으로 처리되며,
/// 호출자는 `transferred` 핸들을 복호화해 실제 적용 금액을 확인함.
#[derive(Debug, Error)]
pub enum LendingError {
    // ============ 400 Bad Request ============
    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    // ============ 401 Unauthorized ============
    /// 복호화 grant 서명이 구조화 메시지 또는 서명자와 불일치
    #[error("Grant signature does not match the signed request")]
    SignatureInvalid,

    // ============ 403 Forbidden ============
    /// operator 권한이 부여된 적 없음
    #[error("No operator allowance granted to the pool")]
    NoAllowance,

    /// operator 권한의 유효기간 경과
    #[error("Operator allowance has expired")]
    AllowanceExpired,

    /// 복호화 grant의 시간 창(window) 밖
    #[error("Decryption grant is outside its validity window")]
    ExpiredGrant,

    /// grant 범위에 없는 컨트랙트의 핸들 또는 타인의 핸들 요청
    #[error("Handle is outside the authorized decryption scope")]
    ScopeViolation,

    // ============ 422 Unprocessable Entity ============
    /// 암호문/증명 쌍이 (contract, sender) 바인딩 검증에 실패
    #[error("Ciphertext input proof rejected")]
    InvalidProof,

    /// 한 번도 초기화되지 않은 핸들 (zero handle)
    #[error("Ciphertext handle is uninitialized")]
    UninitializedHandle,

    // ============ 500 Internal Server Error ============
    #[error("Internal server error")]
    InternalError,

    // ============ 503 Service Unavailable ============
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),
}

/// API 에러 응답 구조
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl IntoResponse for LendingError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            // 4xx 클라이언트 에러
            LendingError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                "BAD_REQUEST",
                msg.clone(),
                None,
            ),
            LendingError::ValidationError(msg) => (
                StatusCode::BAD_REQUEST,
                "VALIDATION_ERROR",
                "Validation failed".to_string(),
                Some(msg.clone()),
            ),
            LendingError::SignatureInvalid => (
                StatusCode::UNAUTHORIZED,
                "SIGNATURE_INVALID",
                self.to_string(),
                None,
            ),
            LendingError::NoAllowance => (
                StatusCode::FORBIDDEN,
                "NO_ALLOWANCE",
                self.to_string(),
                None,
            ),
            LendingError::AllowanceExpired => (
                StatusCode::FORBIDDEN,
                "ALLOWANCE_EXPIRED",
                self.to_string(),
                None,
            ),
            LendingError::ExpiredGrant => (
                StatusCode::FORBIDDEN,
                "EXPIRED_GRANT",
                self.to_string(),
                None,
            ),
            LendingError::ScopeViolation => (
                StatusCode::FORBIDDEN,
                "SCOPE_VIOLATION",
                self.to_string(),
                None,
            ),
            LendingError::InvalidProof => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "INVALID_PROOF",
                self.to_string(),
                None,
            ),
            LendingError::UninitializedHandle => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "UNINITIALIZED_HANDLE",
                self.to_string(),
                None,
            ),

            // 5xx 서버 에러
            LendingError::InternalError => {
                // 내부 에러는 클라이언트에 상세 정보 노출 안 함
                tracing::error!("Internal error: {:?}", self);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
            LendingError::ServiceUnavailable(service) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "SERVICE_UNAVAILABLE",
                format!("{} is currently unavailable", service),
                None,
            ),
        };

        let body = ErrorResponse {
            error: message,
            code: code.to_string(),
            details,
        };

        (status, Json(body)).into_response()
    }
}

/// FHE 코프로세서 에러를 LendingError로 변환
impl From<FheError> for LendingError {
    fn from(err: FheError) -> Self {
        match err {
            FheError::InvalidProof => LendingError::InvalidProof,
            FheError::UninitializedHandle => LendingError::UninitializedHandle,
            FheError::UnknownHandle(h) => {
                LendingError::ValidationError(format!("unknown ciphertext handle {}", h))
            }
        }
    }
}

/// anyhow 에러를 LendingError로 변환
impl From<anyhow::Error> for LendingError {
    fn from(err: anyhow::Error) -> Self {
        tracing::error!("Anyhow error: {:?}", err);
        LendingError::InternalError
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_response_omits_empty_details() {
        let body = ErrorResponse {
            error: "Operator allowance has expired".to_string(),
            code: "ALLOWANCE_EXPIRED".to_string(),
            details: None,
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["code"], "ALLOWANCE_EXPIRED");
        assert!(json.get("details").is_none());
    }

    #[test]
    fn test_error_response_carries_validation_details() {
        let body = ErrorResponse {
            error: "Validation failed".to_string(),
            code: "VALIDATION_ERROR".to_string(),
            details: Some("invalid Ethereum address: 0x1234".to_string()),
        };

        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["details"], "invalid Ethereum address: 0x1234");
    }

    #[test]
    fn test_fhe_errors_map_to_protocol_errors() {
        assert!(matches!(
            LendingError::from(FheError::InvalidProof),
            LendingError::InvalidProof
        ));
        assert!(matches!(
            LendingError::from(FheError::UninitializedHandle),
            LendingError::UninitializedHandle
        ));
        assert!(matches!(
            LendingError::from(FheError::UnknownHandle("0xab".to_string())),
            LendingError::ValidationError(_)
        ));
    }
}
