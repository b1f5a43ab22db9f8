//! Encrypted Input Endpoints
//!
//! 클라이언트 측 암호화 헬퍼. 원본 dApp에서는 지갑 옆의 SDK가
//! `createEncryptedInput`을 수행하지만, 로컬 코프로세서 환경에서는
//! 이 엔드포인트가 그 역할을 대신한다.
//!
//! 주의: 여기로 들어온 평문은 핸들 발급 직후 버려지며,
//! 이후 어떤 원장 경로에서도 평문이 다시 나타나지 않는다.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::error::LendingError;
use crate::fhe::EncryptedInputBuilder;
use crate::types::parse_address;
use crate::AppState;

/// 암호화 입력 생성 요청
#[derive(Debug, Deserialize)]
pub struct EncryptInputRequest {
    /// 대상 컨트랙트 (바인딩 대상)
    pub contract_address: String,
    /// 입력을 제출할 sender (바인딩 대상)
    pub user_address: String,
    /// 암호화할 u64 값 목록
    pub amounts: Vec<u64>,
}

/// 암호화 입력 생성 응답
#[derive(Debug, Serialize)]
pub struct EncryptInputResponse {
    pub handles: Vec<String>,
    pub input_proof: String,
}

/// POST /input/encrypt
pub async fn encrypt_input(
    State(state): State<AppState>,
    Json(body): Json<EncryptInputRequest>,
) -> Result<Json<EncryptInputResponse>, LendingError> {
    if body.amounts.is_empty() {
        return Err(LendingError::ValidationError(
            "at least one amount is required".to_string(),
        ));
    }

    let contract = parse_address(&body.contract_address)?;
    let user = parse_address(&body.user_address)?;

    let mut builder = EncryptedInputBuilder::new(contract, user);
    for amount in &body.amounts {
        builder = builder.add64(*amount);
    }
    let input = builder.encrypt(&state.runtime).await;

    Ok(Json(EncryptInputResponse {
        handles: input.handles.iter().map(|h| h.to_hex()).collect(),
        input_proof: format!("0x{}", hex::encode(&input.proof)),
    }))
}
