//! Token Endpoints (faucet / operator)
//!
//! 토큰 커스터디 collaborator의 외부 표면:
//! 데모 faucet과 Allowance Gate의 `setOperator`.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::LendingError;
use crate::types::{address_to_hex, parse_address};
use crate::AppState;

// ============ Request/Response Types ============

/// faucet 요청
#[derive(Debug, Deserialize)]
pub struct FaucetRequest {
    pub address: String,
    pub amount: u64,
}

#[derive(Debug, Serialize)]
pub struct FaucetResponse {
    pub address: String,
    /// 민팅 후 암호화 잔액 핸들
    pub balance_handle: String,
}

/// setOperator 요청
#[derive(Debug, Deserialize)]
pub struct SetOperatorRequest {
    pub holder: String,
    /// 생략 시 렌딩 풀 주소
    pub spender: Option<String>,
    /// 권한 만료 시각 (unix seconds)
    pub expiry: u64,
}

#[derive(Debug, Serialize)]
pub struct SetOperatorResponse {
    pub holder: String,
    pub spender: String,
    pub expiry: u64,
}

// ============ Handlers ============

/// POST /token/faucet
pub async fn faucet(
    State(state): State<AppState>,
    Json(body): Json<FaucetRequest>,
) -> Result<Json<FaucetResponse>, LendingError> {
    if body.amount == 0 {
        return Err(LendingError::ValidationError(
            "faucet amount must be positive".to_string(),
        ));
    }

    let address = parse_address(&body.address)?;
    let balance = state.token.faucet(address, body.amount).await?;

    Ok(Json(FaucetResponse {
        address: address_to_hex(&address),
        balance_handle: balance.to_hex(),
    }))
}

/// POST /token/operator
///
/// 시간 제한 operator 권한 부여. 재호출 시 expiry 덮어쓰기 (idempotent).
pub async fn set_operator(
    State(state): State<AppState>,
    Json(body): Json<SetOperatorRequest>,
) -> Result<Json<SetOperatorResponse>, LendingError> {
    let holder = parse_address(&body.holder)?;
    let spender = match &body.spender {
        Some(value) => parse_address(value)?,
        None => state.pool.address(),
    };

    state.token.set_operator(holder, spender, body.expiry).await;

    Ok(Json(SetOperatorResponse {
        holder: address_to_hex(&holder),
        spender: address_to_hex(&spender),
        expiry: body.expiry,
    }))
}
