//! Encrypted Input Adapter
//!
//! 호출자가 제출한 (ciphertext, proof) 쌍을 동형 연산에 사용 가능한
//! 신뢰된 핸들로 승인하는 진입점.
//!
//! # Binding
//!
//! 증명은 정확히 (대상 contract, sender) 쌍에 바인딩됨.
//! 어떤 컨트랙트용으로 만든 암호문을 다른 컨트랙트나 다른 sender로
//! 재전송하면 `InvalidProof`로 거부됨 — replay 방지의 핵심.
//!
//! # Example
//!
//! ```ignore
//! let input = EncryptedInputBuilder::new(pool_address, user_address)
//!     .add64(200)
//!     .encrypt(&runtime)
//!     .await;
//!
//! // 서버 측: 핸들 승인 (평문 미노출)
//! let handle = runtime
//!     .verify_input(input.handles[0], &input.proof, pool_address, user_address)
//!     .await?;
//! ```

use ethers::types::Address;

use super::{FheRuntime, Handle};

/// 암호화된 입력: 핸들 목록 + 입력 증명
#[derive(Debug, Clone)]
pub struct EncryptedInput {
    pub handles: Vec<Handle>,
    pub proof: Vec<u8>,
}

/// 클라이언트 측 암호화 입력 빌더
///
/// 원본 dApp의 `createEncryptedInput(contract, user).add64(v).encrypt()`와
/// 동일한 흐름. 빌더 자체는 평문을 들고 있다가 encrypt 시점에
/// 코프로세서에 등록하고 증명을 받아온다.
pub struct EncryptedInputBuilder {
    contract: Address,
    sender: Address,
    values: Vec<u64>,
}

impl EncryptedInputBuilder {
    pub fn new(contract: Address, sender: Address) -> Self {
        Self {
            contract,
            sender,
            values: Vec::new(),
        }
    }

    /// 64비트 평문 값 추가
    pub fn add64(mut self, value: u64) -> Self {
        self.values.push(value);
        self
    }

    /// 코프로세서에 입력 등록 후 (handles, proof) 반환
    pub async fn encrypt(self, runtime: &FheRuntime) -> EncryptedInput {
        let (handles, proof) = runtime
            .register_input(self.contract, self.sender, &self.values)
            .await;

        EncryptedInput { handles, proof }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhe::FheError;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    #[tokio::test]
    async fn test_valid_input_is_admitted() {
        let rt = FheRuntime::new();
        let (pool, user) = (addr(10), addr(20));

        let input = EncryptedInputBuilder::new(pool, user)
            .add64(200)
            .encrypt(&rt)
            .await;

        let handle = rt
            .verify_input(input.handles[0], &input.proof, pool, user)
            .await
            .unwrap();
        assert_eq!(handle, input.handles[0]);
    }

    #[tokio::test]
    async fn test_replay_against_other_contract_fails() {
        let rt = FheRuntime::new();
        let (pool, other_pool, user) = (addr(10), addr(11), addr(20));

        let input = EncryptedInputBuilder::new(pool, user)
            .add64(200)
            .encrypt(&rt)
            .await;

        assert!(matches!(
            rt.verify_input(input.handles[0], &input.proof, other_pool, user)
                .await,
            Err(FheError::InvalidProof)
        ));
    }

    #[tokio::test]
    async fn test_replay_by_other_sender_fails() {
        let rt = FheRuntime::new();
        let (pool, user, attacker) = (addr(10), addr(20), addr(21));

        let input = EncryptedInputBuilder::new(pool, user)
            .add64(200)
            .encrypt(&rt)
            .await;

        assert!(matches!(
            rt.verify_input(input.handles[0], &input.proof, pool, attacker)
                .await,
            Err(FheError::InvalidProof)
        ));
    }

    #[tokio::test]
    async fn test_tampered_proof_fails() {
        let rt = FheRuntime::new();
        let (pool, user) = (addr(10), addr(20));

        let input = EncryptedInputBuilder::new(pool, user)
            .add64(200)
            .encrypt(&rt)
            .await;

        let mut tampered = input.proof.clone();
        tampered[0] ^= 0xff;

        assert!(matches!(
            rt.verify_input(input.handles[0], &tampered, pool, user).await,
            Err(FheError::InvalidProof)
        ));
    }

    #[tokio::test]
    async fn test_foreign_handle_with_valid_proof_fails() {
        let rt = FheRuntime::new();
        let (pool, user) = (addr(10), addr(20));

        let input_a = EncryptedInputBuilder::new(pool, user)
            .add64(200)
            .encrypt(&rt)
            .await;
        let input_b = EncryptedInputBuilder::new(pool, user)
            .add64(999)
            .encrypt(&rt)
            .await;

        // 다른 입력의 핸들을 input_a의 증명으로 승인 시도
        assert!(matches!(
            rt.verify_input(input_b.handles[0], &input_a.proof, pool, user)
                .await,
            Err(FheError::InvalidProof)
        ));
    }

    #[tokio::test]
    async fn test_multiple_values_in_one_input() {
        let rt = FheRuntime::new();
        let (pool, user) = (addr(10), addr(20));

        let input = EncryptedInputBuilder::new(pool, user)
            .add64(1)
            .add64(2)
            .add64(3)
            .encrypt(&rt)
            .await;

        assert_eq!(input.handles.len(), 3);
        for handle in &input.handles {
            assert!(rt.verify_input(*handle, &input.proof, pool, user).await.is_ok());
        }
    }
}
