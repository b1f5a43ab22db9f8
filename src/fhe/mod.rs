//! FHE Coprocessor Module
//!
//! 렌딩 엔진이 소비하는 동형암호 기본 연산 레이어.
//! 실제 FHE 네트워크 대신 프로세스 내 코프로세서 시뮬레이션을 제공하며,
//! 엔진 쪽 코드는 이 모듈을 불투명한 capability로만 사용한다.
//!
//! # Handle Semantics
//!
//! - 모든 암호화 값은 32바이트 불투명 `Handle`로 참조됨
//! - 핸들은 연산마다 새로 발급 (같은 평문이라도 핸들 재사용 없음 → 동등성 누출 방지)
//! - zero handle(0x0)은 "한 번도 초기화되지 않음"을 의미
//! - 평문은 코프로세서 내부(`cleartext`)에서만 접근 가능하며 crate 밖으로 노출되지 않음
//!
//! # Interview Q&A
//!
//! Q: min을 왜 compare + select 조합으로 구현하는가?
//! A: 데이터 독립 실행(data-independent execution) 요구사항 때문
//!    - 암호화된 비교 결과로 제어 흐름이 분기하면 타이밍/트레이스로 결과가 누출됨
//!    - le()가 암호화된 bool 핸들을 만들고, select()가 두 후보를 모두 계산한 뒤
//!      산술 mux로 하나를 고름: v = c*a + (1-c)*b
//!    - 어느 쪽이 선택됐는지는 핸들만 보고는 알 수 없음
//!
//! Q: 산술이 u64 wrapping인 이유는?
//! A: euint64 동형 연산의 모듈러 산술 의미론과 일치시키기 위함.
//!    렌딩 엔진은 클램프 로직으로 언더플로우 자체를 배제하므로
//!    wrapping은 관찰되지 않는 안전망임.

use std::collections::{HashMap, HashSet};
use std::fmt;

use ethers::types::Address;
use rand::RngCore;
use sha3::{Digest, Keccak256};
use thiserror::Error;
use tokio::sync::RwLock;

pub mod input;

pub use input::{EncryptedInput, EncryptedInputBuilder};

/// FHE 레이어 에러
#[derive(Debug, Error)]
pub enum FheError {
    /// 암호문/증명 쌍이 (contract, sender) 바인딩 검증에 실패
    #[error("input proof rejected")]
    InvalidProof,

    /// zero handle에 대한 연산 시도
    #[error("handle is uninitialized")]
    UninitializedHandle,

    /// 이 코프로세서가 발급한 적 없는 핸들
    #[error("unknown handle: {0}")]
    UnknownHandle(String),
}

/// 암호문 핸들: 암호화된 u64 값에 대한 불투명한 32바이트 참조
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle([u8; 32]);

impl Handle {
    /// 초기화되지 않은 핸들 (Solidity의 zero bytes32와 동일한 의미)
    pub const ZERO: Handle = Handle([0u8; 32]);

    pub fn is_zero(&self) -> bool {
        self.0 == [0u8; 32]
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        format!("0x{}", hex::encode(self.0))
    }

    pub fn from_hex(value: &str) -> Option<Handle> {
        let stripped = value.trim_start_matches("0x");
        let bytes = hex::decode(stripped).ok()?;
        if bytes.len() != 32 {
            return None;
        }
        let mut out = [0u8; 32];
        out.copy_from_slice(&bytes);
        Some(Handle(out))
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// 등록된 암호문 입력 (proof → 입력 메타데이터)
struct InputRecord {
    contract: Address,
    sender: Address,
    handles: Vec<Handle>,
}

/// 코프로세서 내부 상태
///
/// values: 핸들 → 평문 (코프로세서만 접근)
/// acl: 핸들 → 복호화가 허용된 주소 집합 (FHE.allow 대응)
/// inputs: 입력 증명 → 입력 레코드 (Encrypted Input Adapter 바인딩 검증용)
struct CoprocessorState {
    values: HashMap<Handle, u64>,
    acl: HashMap<Handle, HashSet<Address>>,
    inputs: HashMap<Vec<u8>, InputRecord>,
    counter: u64,
}

/// FHE 코프로세서 시뮬레이션
///
/// # Architecture
///
/// ```text
/// ┌─────────────────────────────────────────────────────┐
/// │                    FheRuntime                        │
/// ├─────────────────────────────────────────────────────┤
/// │  trivial_encrypt / add / sub / le / select / min    │  ← 동형 연산
/// │  verify_input                                        │  ← 입력 어댑터
/// │  allow / is_allowed                                  │  ← 핸들 ACL
/// │  cleartext (pub(crate))                              │  ← 복호화 오라클 전용
/// └─────────────────────────────────────────────────────┘
/// ```
pub struct FheRuntime {
    /// 인스턴스별 비밀값: 핸들 파생과 입력 증명 MAC에 사용
    secret: [u8; 32],
    state: RwLock<CoprocessorState>,
}

impl FheRuntime {
    pub fn new() -> Self {
        let mut secret = [0u8; 32];
        rand::rngs::OsRng.fill_bytes(&mut secret);

        Self {
            secret,
            state: RwLock::new(CoprocessorState {
                values: HashMap::new(),
                acl: HashMap::new(),
                inputs: HashMap::new(),
                counter: 0,
            }),
        }
    }

    /// 새 핸들 발급 및 평문 등록
    ///
    /// 핸들은 (secret, counter)에서 파생 → 평문 값에 의존하지 않음.
    /// 같은 값을 두 번 암호화해도 서로 다른 핸들이 나와 동등성이 누출되지 않음.
    fn issue(&self, state: &mut CoprocessorState, value: u64) -> Handle {
        state.counter += 1;

        let mut hasher = Keccak256::new();
        hasher.update(b"fhe.handle.v1");
        hasher.update(self.secret);
        hasher.update(state.counter.to_be_bytes());
        let digest = hasher.finalize();

        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&digest);
        let handle = Handle(bytes);

        state.values.insert(handle, value);
        handle
    }

    /// 핸들의 평문 조회 (내부 헬퍼)
    fn value_of(state: &CoprocessorState, handle: Handle) -> Result<u64, FheError> {
        if handle.is_zero() {
            return Err(FheError::UninitializedHandle);
        }
        state
            .values
            .get(&handle)
            .copied()
            .ok_or_else(|| FheError::UnknownHandle(handle.to_hex()))
    }

    /// 평문 값을 자명하게(trivially) 암호화
    ///
    /// 온체인 상수(예: 초기 잔액 0)를 암호화 도메인으로 들여올 때 사용
    pub async fn trivial_encrypt(&self, value: u64) -> Handle {
        let mut state = self.state.write().await;
        self.issue(&mut state, value)
    }

    /// 동형 덧셈: Enc(a) + Enc(b) → Enc(a + b)
    pub async fn add(&self, a: Handle, b: Handle) -> Result<Handle, FheError> {
        let mut state = self.state.write().await;
        let (va, vb) = (Self::value_of(&state, a)?, Self::value_of(&state, b)?);
        Ok(self.issue(&mut state, va.wrapping_add(vb)))
    }

    /// 동형 뺄셈: Enc(a) - Enc(b) → Enc(a - b)
    pub async fn sub(&self, a: Handle, b: Handle) -> Result<Handle, FheError> {
        let mut state = self.state.write().await;
        let (va, vb) = (Self::value_of(&state, a)?, Self::value_of(&state, b)?);
        Ok(self.issue(&mut state, va.wrapping_sub(vb)))
    }

    /// 동형 비교: Enc(a) <= Enc(b) → Enc(bool)
    ///
    /// 결과는 암호화된 0/1 핸들. 평문 비교 결과는 절대 반환하지 않음.
    pub async fn le(&self, a: Handle, b: Handle) -> Result<Handle, FheError> {
        let mut state = self.state.write().await;
        let (va, vb) = (Self::value_of(&state, a)?, Self::value_of(&state, b)?);
        Ok(self.issue(&mut state, u64::from(va <= vb)))
    }

    /// 동형 select (mux): cond ? if_true : if_false
    ///
    /// 산술 mux: v = c*t + (1-c)*f. 두 후보 모두 평가되며 분기 없음.
    pub async fn select(
        &self,
        cond: Handle,
        if_true: Handle,
        if_false: Handle,
    ) -> Result<Handle, FheError> {
        let mut state = self.state.write().await;
        let c = Self::value_of(&state, cond)?.min(1);
        let vt = Self::value_of(&state, if_true)?;
        let vf = Self::value_of(&state, if_false)?;
        let selected = c
            .wrapping_mul(vt)
            .wrapping_add((1 - c).wrapping_mul(vf));
        Ok(self.issue(&mut state, selected))
    }

    /// 동형 min: 비교 + select 조합 (클램프 로직의 기반 연산)
    pub async fn min(&self, a: Handle, b: Handle) -> Result<Handle, FheError> {
        let cond = self.le(a, b).await?;
        self.select(cond, a, b).await
    }

    /// 핸들 복호화를 address에 허용 (FHE.allow 대응)
    ///
    /// 복호화 오라클은 ACL에 없는 (handle, holder) 조합을 거부함
    pub async fn allow(&self, handle: Handle, address: Address) {
        let mut state = self.state.write().await;
        state.acl.entry(handle).or_default().insert(address);
    }

    pub async fn is_allowed(&self, handle: Handle, address: Address) -> bool {
        let state = self.state.read().await;
        state
            .acl
            .get(&handle)
            .map(|set| set.contains(&address))
            .unwrap_or(false)
    }

    /// 암호문 입력 등록 (클라이언트 측 encrypt 단계)
    ///
    /// 입력 증명은 (secret, contract, sender, handles)의 keccak MAC —
    /// 다른 (contract, sender) 쌍으로 재전송(replay)하면 검증에 실패함
    pub(crate) async fn register_input(
        &self,
        contract: Address,
        sender: Address,
        values: &[u64],
    ) -> (Vec<Handle>, Vec<u8>) {
        let mut state = self.state.write().await;

        let handles: Vec<Handle> = values.iter().map(|v| self.issue(&mut state, *v)).collect();

        let mut hasher = Keccak256::new();
        hasher.update(b"fhe.input.v1");
        hasher.update(self.secret);
        hasher.update(contract.as_bytes());
        hasher.update(sender.as_bytes());
        for handle in &handles {
            hasher.update(handle.as_bytes());
        }
        let proof = hasher.finalize().to_vec();

        state.inputs.insert(
            proof.clone(),
            InputRecord {
                contract,
                sender,
                handles: handles.clone(),
            },
        );

        (handles, proof)
    }

    /// Encrypted Input Adapter: (handle, proof)를 신뢰된 핸들로 승인
    ///
    /// 증명이 정확히 (contract, sender) 쌍에 바인딩되어 있고
    /// 핸들이 해당 입력에 포함된 경우에만 성공. 그 외 모두 InvalidProof.
    /// 이 경로에서 평문은 절대 생성되지 않음.
    pub async fn verify_input(
        &self,
        handle: Handle,
        proof: &[u8],
        contract: Address,
        sender: Address,
    ) -> Result<Handle, FheError> {
        let state = self.state.read().await;

        let record = state.inputs.get(proof).ok_or(FheError::InvalidProof)?;
        if record.contract != contract || record.sender != sender {
            return Err(FheError::InvalidProof);
        }
        if !record.handles.contains(&handle) {
            return Err(FheError::InvalidProof);
        }

        Ok(handle)
    }

    /// 코프로세서 측 복호화
    ///
    /// crate 내부 전용: 복호화 오라클이 서명/범위/시간 창 검증을
    /// 모두 통과시킨 뒤에만 호출함. 엔진 로직에서는 절대 호출 금지.
    pub(crate) async fn cleartext(&self, handle: Handle) -> Result<u64, FheError> {
        let state = self.state.read().await;
        Self::value_of(&state, handle)
    }
}

impl Default for FheRuntime {
    fn default() -> Self {
        Self::new()
    }
}
