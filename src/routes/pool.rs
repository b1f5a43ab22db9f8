//! Lending Pool Endpoints
//!
//! 4개의 상태 변경 호출 + 2개의 읽기 호출.
//! 모든 변경 호출은 (handle, proof) 쌍을 받고, 읽기 호출은
//! 불투명한 핸들만 반환한다 — 이 레이어에서 복호화는 일어나지 않음.
//!
//! # Clamping Surface
//!
//! 응답의 `transferred_handle`은 클램프 후 실제 적용 금액의 핸들.
//! "요청보다 적게 적용됨"은 실패가 아니라 성공이며, 호출자는
//! 이 핸들을 복호화 인가 프로토콜로 풀어 유효 금액을 확인한다.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::error::LendingError;
use crate::ledger::MutationReceipt;
use crate::types::{address_to_hex, parse_address, parse_handle, parse_hex_bytes};
use crate::AppState;

// ============ Request/Response Types ============

/// 상태 변경 요청 (deposit / withdraw / borrow / repay 공통)
#[derive(Debug, Deserialize)]
pub struct MutationRequest {
    pub holder: String,
    /// 암호화 입력 핸들 (0x + 64 hex)
    pub handle: String,
    /// 입력 증명
    pub input_proof: String,
}

/// 상태 변경 응답
#[derive(Debug, Serialize)]
pub struct MutationResponse {
    pub operation: String,
    pub holder: String,
    /// 실제 적용(클램프 후) 금액의 핸들
    pub transferred_handle: String,
    pub deposit_handle: String,
    pub debt_handle: String,
}

/// getAccountData 응답
#[derive(Debug, Serialize)]
pub struct AccountResponse {
    pub holder: String,
    pub deposit_handle: String,
    pub debt_handle: String,
}

/// getTotals 응답
#[derive(Debug, Serialize)]
pub struct TotalsResponse {
    pub total_deposits_handle: String,
    pub total_borrows_handle: String,
    pub pool_balance_handle: String,
}

impl From<MutationReceipt> for MutationResponse {
    fn from(receipt: MutationReceipt) -> Self {
        Self {
            operation: receipt.operation.to_string(),
            holder: address_to_hex(&receipt.holder),
            transferred_handle: receipt.transferred.to_hex(),
            deposit_handle: receipt.account.deposit.to_hex(),
            debt_handle: receipt.account.debt.to_hex(),
        }
    }
}

fn now() -> u64 {
    chrono::Utc::now().timestamp() as u64
}

// ============ Handlers ============

/// POST /pool/deposit
pub async fn deposit(
    State(state): State<AppState>,
    Json(body): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, LendingError> {
    let holder = parse_address(&body.holder)?;
    let handle = parse_handle(&body.handle)?;
    let proof = parse_hex_bytes(&body.input_proof)?;

    let receipt = state.pool.deposit(holder, handle, &proof, now()).await?;
    Ok(Json(receipt.into()))
}

/// POST /pool/withdraw
pub async fn withdraw(
    State(state): State<AppState>,
    Json(body): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, LendingError> {
    let holder = parse_address(&body.holder)?;
    let handle = parse_handle(&body.handle)?;
    let proof = parse_hex_bytes(&body.input_proof)?;

    let receipt = state.pool.withdraw(holder, handle, &proof, now()).await?;
    Ok(Json(receipt.into()))
}

/// POST /pool/borrow
pub async fn borrow(
    State(state): State<AppState>,
    Json(body): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, LendingError> {
    let holder = parse_address(&body.holder)?;
    let handle = parse_handle(&body.handle)?;
    let proof = parse_hex_bytes(&body.input_proof)?;

    let receipt = state.pool.borrow(holder, handle, &proof, now()).await?;
    Ok(Json(receipt.into()))
}

/// POST /pool/repay
pub async fn repay(
    State(state): State<AppState>,
    Json(body): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, LendingError> {
    let holder = parse_address(&body.holder)?;
    let handle = parse_handle(&body.handle)?;
    let proof = parse_hex_bytes(&body.input_proof)?;

    let receipt = state.pool.repay(holder, handle, &proof, now()).await?;
    Ok(Json(receipt.into()))
}

/// GET /pool/account/:address
pub async fn get_account(
    State(state): State<AppState>,
    Path(address): Path<String>,
) -> Result<Json<AccountResponse>, LendingError> {
    let holder = parse_address(&address)?;
    let account = state.pool.account_data(holder).await;

    Ok(Json(AccountResponse {
        holder: address_to_hex(&holder),
        deposit_handle: account.deposit.to_hex(),
        debt_handle: account.debt.to_hex(),
    }))
}

/// GET /pool/totals
pub async fn get_totals(
    State(state): State<AppState>,
) -> Result<Json<TotalsResponse>, LendingError> {
    let totals = state.pool.totals().await;

    Ok(Json(TotalsResponse {
        total_deposits_handle: totals.total_deposits.to_hex(),
        total_borrows_handle: totals.total_borrows.to_hex(),
        pool_balance_handle: totals.pool_balance.to_hex(),
    }))
}
