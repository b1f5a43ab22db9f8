//! Decryption Protocol Endpoints
//!
//! Phase 1 헬퍼(keypair 생성)와 Phase 2(reveal 요청)의 HTTP 표면.
//! grant 서명은 holder의 지갑에서 일어나므로 서버는 서명을 받기만 한다.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::decrypt::{DecryptionGrant, EphemeralKeypair, HandleContractPair, RevealRequest};
use crate::error::LendingError;
use crate::types::{parse_address, parse_handle, parse_hex_bytes};
use crate::AppState;

// ============ Request/Response Types ============

#[derive(Debug, Serialize)]
pub struct KeypairResponse {
    pub public_key: String,
    pub private_key: String,
}

/// reveal 요청 wire 형식 (원본 relayer SDK의 userDecrypt 인자와 동일 구성)
#[derive(Debug, Deserialize)]
pub struct UserDecryptRequest {
    pub handle_contract_pairs: Vec<WirePair>,
    pub private_key: String,
    pub public_key: String,
    pub signature: String,
    pub contract_addresses: Vec<String>,
    pub user_address: String,
    pub start_timestamp: u64,
    pub duration_days: u64,
}

#[derive(Debug, Deserialize)]
pub struct WirePair {
    pub handle: String,
    pub contract_address: String,
}

#[derive(Debug, Serialize)]
pub struct UserDecryptResponse {
    pub request_id: String,
    /// handle(hex) → 평문(10진 문자열)
    pub values: HashMap<String, String>,
}

// ============ Handlers ============

/// POST /decrypt/keypair
///
/// 요청 단위 ephemeral keypair 생성 (Phase 1 헬퍼).
/// 비밀키는 응답으로만 전달되고 서버에는 남지 않음.
pub async fn generate_keypair() -> Json<KeypairResponse> {
    let keypair = EphemeralKeypair::generate();

    Json(KeypairResponse {
        public_key: format!("0x{}", hex::encode(&keypair.public_key)),
        private_key: format!("0x{}", hex::encode(&keypair.private_key)),
    })
}

/// POST /decrypt/user
///
/// Phase 2 reveal 요청. 검증 실패 시 원장 상태는 전혀 영향받지 않음.
pub async fn user_decrypt(
    State(state): State<AppState>,
    Json(body): Json<UserDecryptRequest>,
) -> Result<Json<UserDecryptResponse>, LendingError> {
    if body.handle_contract_pairs.is_empty() {
        return Err(LendingError::ValidationError(
            "at least one handle/contract pair is required".to_string(),
        ));
    }

    let mut pairs = Vec::with_capacity(body.handle_contract_pairs.len());
    for pair in &body.handle_contract_pairs {
        pairs.push(HandleContractPair {
            handle: parse_handle(&pair.handle)?,
            contract: parse_address(&pair.contract_address)?,
        });
    }

    let mut contract_scope = Vec::with_capacity(body.contract_addresses.len());
    for address in &body.contract_addresses {
        contract_scope.push(parse_address(address)?);
    }

    let request = RevealRequest {
        pairs,
        private_key: parse_hex_bytes(&body.private_key)?,
        grant: DecryptionGrant {
            public_key: parse_hex_bytes(&body.public_key)?,
            contract_scope,
            start_timestamp: body.start_timestamp,
            duration_days: body.duration_days,
            signature: parse_hex_bytes(&body.signature)?,
        },
        holder: parse_address(&body.user_address)?,
    };

    let now = chrono::Utc::now().timestamp() as u64;
    let outcome = state.oracle.user_decrypt(&request, now).await?;

    Ok(Json(UserDecryptResponse {
        request_id: outcome.request_id.to_string(),
        values: outcome.values,
    }))
}
