//! Decryption Oracle Client
//!
//! reveal 요청을 검증하고 복호화 서비스에 전달하는 Phase 2 구현.
//!
//! # Trust Model
//!
//! 복호화 서비스는 "검증 전까지 신뢰하지 않는" 외부 오라클:
//! 매핑이 돌아왔다는 사실 자체를 권한의 증거로 취급하지 않는다.
//! 서명·keypair 일관성·시간 창·scope·핸들 ACL 검사를 모두
//! 통과시킨 뒤에만 서비스 호출이 나간다.
//!
//! # Backends
//!
//! 1. In-process (기본): 로컬 FheRuntime에서 직접 복호화 (개발/테스트)
//! 2. Remote: `DECRYPTION_SERVICE_URL` 설정 시 HTTP POST로 위임

use std::collections::HashMap;
use std::sync::Arc;

use ethers::types::Address;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::LendingError;
use crate::fhe::{FheRuntime, Handle};
use crate::types::address_to_hex;

use super::{DecryptionGrant, EphemeralKeypair};

/// 공개 대상: (핸들, 핸들을 발급한 컨트랙트)
#[derive(Debug, Clone, Copy)]
pub struct HandleContractPair {
    pub handle: Handle,
    pub contract: Address,
}

/// Phase 2 reveal 요청
///
/// 서명/scope/시간 창은 grant 안에 들어 있고, private_key는
/// keypair 일관성 검증용으로만 쓰인 뒤 폐기된다.
#[derive(Debug, Clone)]
pub struct RevealRequest {
    pub pairs: Vec<HandleContractPair>,
    pub private_key: Vec<u8>,
    pub grant: DecryptionGrant,
    pub holder: Address,
}

/// reveal 결과: 제출한 각 핸들 → 평문(10진 문자열)
#[derive(Debug)]
pub struct RevealOutcome {
    pub request_id: Uuid,
    pub values: HashMap<String, String>,
}

/// 원격 복호화 서비스 wire 형식
#[derive(Serialize)]
struct RemoteRevealBody {
    handle_contract_pairs: Vec<RemotePair>,
    public_key: String,
    signature: String,
    contract_addresses: Vec<String>,
    user_address: String,
    start_timestamp: u64,
    duration_days: u64,
}

#[derive(Serialize)]
struct RemotePair {
    handle: String,
    contract_address: String,
}

#[derive(Deserialize)]
struct RemoteRevealResponse {
    values: HashMap<String, String>,
}

/// 복호화 오라클 클라이언트
pub struct DecryptionOracle {
    runtime: Arc<FheRuntime>,
    chain_id: u64,
    /// EIP-712 verifyingContract (복호화 게이트웨이 주소)
    gateway: Address,
    remote_url: Option<String>,
    http: reqwest::Client,
}

impl DecryptionOracle {
    pub fn new(
        runtime: Arc<FheRuntime>,
        chain_id: u64,
        gateway: Address,
        remote_url: Option<String>,
    ) -> Self {
        Self {
            runtime,
            chain_id,
            gateway,
            remote_url,
            http: reqwest::Client::new(),
        }
    }

    /// reveal 요청 처리
    ///
    /// # Verification Order
    ///
    /// 1. keypair 일관성: private_key → public_key 재유도 일치 (SignatureInvalid)
    /// 2. grant 서명: digest 복구 주소 == holder (SignatureInvalid)
    /// 3. 시간 창: start <= now <= start + durationDays (ExpiredGrant)
    /// 4. 쌍별 scope: 핸들의 컨트랙트가 grant scope에 포함 (ScopeViolation)
    /// 5. 핸들 ACL: holder에게 복호화가 허용된 핸들인가 (ScopeViolation)
    ///
    /// 원장 상태는 어떤 경우에도 변경되지 않음.
    pub async fn user_decrypt(
        &self,
        request: &RevealRequest,
        now: u64,
    ) -> Result<RevealOutcome, LendingError> {
        let request_id = Uuid::new_v4();

        let derived = EphemeralKeypair::derive_public(&request.private_key)?;
        if derived != request.grant.public_key {
            return Err(LendingError::SignatureInvalid);
        }

        request
            .grant
            .verify(request.holder, self.chain_id, self.gateway)?;

        if !request.grant.is_active(now) {
            return Err(LendingError::ExpiredGrant);
        }

        for pair in &request.pairs {
            if !request.grant.allows(pair.contract) {
                return Err(LendingError::ScopeViolation);
            }
            // grant는 양도 불가 capability: 타인의 핸들은 ACL에서 걸러짐
            if !self.runtime.is_allowed(pair.handle, request.holder).await {
                return Err(LendingError::ScopeViolation);
            }
        }

        tracing::info!(
            %request_id,
            holder = %address_to_hex(&request.holder),
            pairs = request.pairs.len(),
            "reveal request authorized"
        );

        let values = match &self.remote_url {
            Some(url) => self.reveal_remote(url, request).await?,
            None => self.reveal_local(request).await?,
        };

        Ok(RevealOutcome { request_id, values })
    }

    /// In-process 백엔드: 로컬 코프로세서에서 복호화
    async fn reveal_local(
        &self,
        request: &RevealRequest,
    ) -> Result<HashMap<String, String>, LendingError> {
        let mut values = HashMap::with_capacity(request.pairs.len());
        for pair in &request.pairs {
            let cleartext = self.runtime.cleartext(pair.handle).await?;
            values.insert(pair.handle.to_hex(), cleartext.to_string());
        }
        Ok(values)
    }

    /// Remote 백엔드: 외부 복호화 서비스에 위임
    async fn reveal_remote(
        &self,
        url: &str,
        request: &RevealRequest,
    ) -> Result<HashMap<String, String>, LendingError> {
        let body = RemoteRevealBody {
            handle_contract_pairs: request
                .pairs
                .iter()
                .map(|pair| RemotePair {
                    handle: pair.handle.to_hex(),
                    contract_address: address_to_hex(&pair.contract),
                })
                .collect(),
            public_key: format!("0x{}", hex::encode(&request.grant.public_key)),
            signature: format!("0x{}", hex::encode(&request.grant.signature)),
            contract_addresses: request
                .grant
                .contract_scope
                .iter()
                .map(address_to_hex)
                .collect(),
            user_address: address_to_hex(&request.holder),
            start_timestamp: request.grant.start_timestamp,
            duration_days: request.grant.duration_days,
        };

        let response = self
            .http
            .post(format!("{}/user-decrypt", url.trim_end_matches('/')))
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!("decryption service unreachable: {}", e);
                LendingError::ServiceUnavailable("decryption service".to_string())
            })?;

        if !response.status().is_success() {
            return Err(LendingError::ServiceUnavailable(
                "decryption service".to_string(),
            ));
        }

        let parsed: RemoteRevealResponse = response.json().await.map_err(|e| {
            tracing::error!("decryption service returned malformed body: {}", e);
            LendingError::ServiceUnavailable("decryption service".to_string())
        })?;

        Ok(parsed.values)
    }
}
