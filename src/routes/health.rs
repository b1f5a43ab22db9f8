//! Health Check Endpoint
//!
//! # Interview Q&A
//!
//! Q: Health check 엔드포인트는 왜 필요한가?
//! A: 3가지 용도
//!    1. 로드밸런서 헬스체크 (ALB, nginx)
//!    2. Kubernetes liveness/readiness probe
//!    3. 모니터링 시스템 연동 (Prometheus, Datadog)

use axum::{extract::State, Json};
use serde::Serialize;

use crate::types::address_to_hex;
use crate::AppState;

/// Health check 응답
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub pool_address: String,
    pub token_address: String,
    pub decryption_backend: String,
    pub timestamp: String,
}

/// GET /health
///
/// 서버 및 의존성 상태 확인
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        pool_address: address_to_hex(&state.config.pool_address),
        token_address: address_to_hex(&state.config.token_address),
        decryption_backend: if state.config.decryption_service_url.is_some() {
            "remote".to_string()
        } else {
            "in-process".to_string()
        },
        timestamp: chrono::Utc::now().to_rfc3339(),
    })
}
