//! Decryption Grant (EIP-712)
//!
//! ephemeral keypair와 시간 창, 컨트랙트 scope를 holder의 장기 키 서명으로
//! 묶는 구조화 메시지. 도메인 분리로 다른 프로토콜과의 서명 재사용을 차단.
//!
//! # Interview Q&A
//!
//! Q: 왜 일반 메시지 서명이 아니라 EIP-712 typed-data인가?
//! A: cross-protocol replay 방지
//!    - 도메인 구분자(name, version, chainId, verifyingContract)가 digest에 포함
//!    - 같은 바이트열이라도 다른 체인/컨트랙트용 서명은 복구 주소가 달라짐
//!    - 지갑이 서명 내용을 구조적으로 표시 가능 (blind signing 방지)
//!
//! Q: ephemeral keypair는 왜 요청마다 새로 만드는가?
//! A: grant가 세션 단위 capability이기 때문
//!    - 키 유출 시 피해 범위가 한 번의 reveal 창으로 제한됨
//!    - 캐싱/재사용 없음: 생성은 순수 함수이고 수명 관리가 필요 없음

use ethers::core::k256::ecdsa::SigningKey;
use ethers::core::k256::elliptic_curve::sec1::ToEncodedPoint;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::{Address, Signature, H256, RecoveryMessage};
use sha3::{Digest, Keccak256};

use crate::error::LendingError;

pub const EIP712_DOMAIN_NAME: &str = "Decryption";
pub const EIP712_DOMAIN_VERSION: &str = "1";

const DOMAIN_TYPE: &str =
    "EIP712Domain(string name,string version,uint256 chainId,address verifyingContract)";
const REQUEST_TYPE: &str = "UserDecryptRequestVerification(bytes publicKey,address[] contractAddresses,uint256 startTimestamp,uint256 durationDays)";

fn keccak(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// uint256 ABI 인코딩 (32바이트 big-endian)
fn encode_u256(value: u64) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[24..].copy_from_slice(&value.to_be_bytes());
    out
}

/// address ABI 인코딩 (좌측 12바이트 zero-padding)
fn encode_address(addr: &Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(addr.as_bytes());
    out
}

/// 요청 단위의 일회용 비대칭 키쌍 (secp256k1)
///
/// 복호화 서비스로의 응답 암호화 바인딩에 쓰이는 전송용 키.
/// 생성은 순수 함수: 캐싱도, 세션 간 재사용도 없음.
#[derive(Debug, Clone)]
pub struct EphemeralKeypair {
    /// SEC1 비압축 공개키 (65바이트, 0x04 prefix)
    pub public_key: Vec<u8>,
    /// 32바이트 비밀키 — holder 로컬에만 존재
    pub private_key: Vec<u8>,
}

impl EphemeralKeypair {
    pub fn generate() -> Self {
        let signing_key = SigningKey::random(&mut rand::rngs::OsRng);
        let public_key = signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec();

        Self {
            public_key,
            private_key: signing_key.to_bytes().to_vec(),
        }
    }

    /// 비밀키에서 공개키 재유도 — reveal 요청의 keypair 일관성 검증에 사용
    pub fn derive_public(private_key: &[u8]) -> Result<Vec<u8>, LendingError> {
        let signing_key =
            SigningKey::from_slice(private_key).map_err(|_| LendingError::SignatureInvalid)?;
        Ok(signing_key
            .verifying_key()
            .to_encoded_point(false)
            .as_bytes()
            .to_vec())
    }
}

/// 서명된 복호화 grant
///
/// 원장에는 절대 저장되지 않는 ephemeral 값 — 한 번의 reveal 요청에
/// 사용된 뒤 폐기됨.
#[derive(Debug, Clone)]
pub struct DecryptionGrant {
    /// grant에 바인딩된 ephemeral 공개키
    pub public_key: Vec<u8>,
    /// 공개가 허용된 컨트랙트 주소 집합
    pub contract_scope: Vec<Address>,
    /// 유효 창 시작 (unix seconds)
    pub start_timestamp: u64,
    /// 유효 기간 (일 단위)
    pub duration_days: u64,
    /// holder의 typed-data 서명 (65바이트)
    pub signature: Vec<u8>,
}

impl DecryptionGrant {
    /// EIP-712 digest 계산
    ///
    /// digest = keccak(0x1901 ‖ domainSeparator ‖ structHash)
    pub fn digest(
        public_key: &[u8],
        contract_scope: &[Address],
        start_timestamp: u64,
        duration_days: u64,
        chain_id: u64,
        verifying_contract: Address,
    ) -> H256 {
        // domainSeparator
        let mut domain = Vec::with_capacity(32 * 5);
        domain.extend_from_slice(&keccak(DOMAIN_TYPE.as_bytes()));
        domain.extend_from_slice(&keccak(EIP712_DOMAIN_NAME.as_bytes()));
        domain.extend_from_slice(&keccak(EIP712_DOMAIN_VERSION.as_bytes()));
        domain.extend_from_slice(&encode_u256(chain_id));
        domain.extend_from_slice(&encode_address(&verifying_contract));
        let domain_separator = keccak(&domain);

        // structHash: 동적 타입(bytes, address[])은 내용의 keccak으로 인코딩
        let mut scope_bytes = Vec::with_capacity(32 * contract_scope.len());
        for addr in contract_scope {
            scope_bytes.extend_from_slice(&encode_address(addr));
        }

        let mut message = Vec::with_capacity(32 * 5);
        message.extend_from_slice(&keccak(REQUEST_TYPE.as_bytes()));
        message.extend_from_slice(&keccak(public_key));
        message.extend_from_slice(&keccak(&scope_bytes));
        message.extend_from_slice(&encode_u256(start_timestamp));
        message.extend_from_slice(&encode_u256(duration_days));
        let struct_hash = keccak(&message);

        let mut preimage = Vec::with_capacity(2 + 64);
        preimage.extend_from_slice(&[0x19, 0x01]);
        preimage.extend_from_slice(&domain_separator);
        preimage.extend_from_slice(&struct_hash);

        H256::from(keccak(&preimage))
    }

    /// holder의 장기 키로 grant 서명 (클라이언트 측 Phase 1)
    pub fn sign(
        wallet: &LocalWallet,
        public_key: Vec<u8>,
        contract_scope: Vec<Address>,
        start_timestamp: u64,
        duration_days: u64,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Result<Self, LendingError> {
        let digest = Self::digest(
            &public_key,
            &contract_scope,
            start_timestamp,
            duration_days,
            chain_id,
            verifying_contract,
        );

        let signature = wallet
            .sign_hash(digest)
            .map_err(|_| LendingError::SignatureInvalid)?;

        Ok(Self {
            public_key,
            contract_scope,
            start_timestamp,
            duration_days,
            signature: signature.to_vec(),
        })
    }

    /// 서명 검증: digest에서 복구한 주소가 holder와 일치해야 함
    pub fn verify(
        &self,
        holder: Address,
        chain_id: u64,
        verifying_contract: Address,
    ) -> Result<(), LendingError> {
        let digest = Self::digest(
            &self.public_key,
            &self.contract_scope,
            self.start_timestamp,
            self.duration_days,
            chain_id,
            verifying_contract,
        );

        let signature = Signature::try_from(self.signature.as_slice())
            .map_err(|_| LendingError::SignatureInvalid)?;
        let recovered = signature
            .recover(RecoveryMessage::Hash(digest))
            .map_err(|_| LendingError::SignatureInvalid)?;

        if recovered != holder {
            return Err(LendingError::SignatureInvalid);
        }
        Ok(())
    }

    /// 시간 창 검사: startTimestamp <= now <= startTimestamp + durationDays
    pub fn is_active(&self, now: u64) -> bool {
        let end = self
            .start_timestamp
            .saturating_add(self.duration_days.saturating_mul(24 * 60 * 60));
        now >= self.start_timestamp && now <= end
    }

    /// scope 검사: 해당 컨트랙트의 핸들 공개가 허가되었는가
    pub fn allows(&self, contract: Address) -> bool {
        self.contract_scope.contains(&contract)
    }
}
