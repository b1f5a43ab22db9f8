//! Confidential Token Module (fheUSDT)
//!
//! 암호화 잔액을 보관하는 토큰 커스터디 컴포넌트.
//! 렌딩 풀은 이 토큰의 operator 권한을 통해서만 사용자 잔액을 이동시킬 수 있다.
//!
//! # Allowance Gate
//!
//! `set_operator(holder, spender, expiry)`는 시간 제한이 있는 포괄 권한:
//! - 금액 단위로 차감되는 quota가 아님 (시간 창 기반 blanket permission)
//! - 재부여 시 expiry를 덮어써서 연장 (idempotent)
//! - `now > expiry`면 `AllowanceExpired`, 부여된 적 없으면 `NoAllowance`
//!
//! # Transfer Semantics
//!
//! 이체는 항상 송신자 잔액으로 클램프됨: 잔액을 초과하는 요청은
//! 실패하거나 음수가 되는 대신 `min(amount, balance)`만큼만 이동.
//! 비교 결과는 암호화 도메인 밖으로 나오지 않으며, 실제 이동량의
//! 핸들이 반환되어 호출자가 복호화로만 확인 가능.

use std::collections::HashMap;
use std::sync::Arc;

use ethers::types::Address;
use tokio::sync::RwLock;

use crate::error::LendingError;
use crate::fhe::{FheRuntime, Handle};

/// 토큰 내부 상태
struct TokenState {
    /// holder → 암호화 잔액 핸들
    balances: HashMap<Address, Handle>,
    /// (holder, spender) → operator 권한 만료 시각 (unix seconds)
    operators: HashMap<(Address, Address), u64>,
}

/// 암호화 잔액 토큰 (fheUSDT 대응)
pub struct ConfidentialToken {
    address: Address,
    runtime: Arc<FheRuntime>,
    state: RwLock<TokenState>,
}

impl ConfidentialToken {
    pub fn new(address: Address, runtime: Arc<FheRuntime>) -> Self {
        Self {
            address,
            runtime,
            state: RwLock::new(TokenState {
                balances: HashMap::new(),
                operators: HashMap::new(),
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    /// 잔액 핸들 초기화 보장 (첫 접촉 시 암호화된 0)
    async fn ensure_balance(
        &self,
        state: &mut TokenState,
        holder: Address,
    ) -> Handle {
        if let Some(handle) = state.balances.get(&holder) {
            return *handle;
        }
        let zero = self.runtime.trivial_encrypt(0).await;
        self.runtime.allow(zero, holder).await;
        state.balances.insert(holder, zero);
        zero
    }

    /// Faucet: 데모용 민팅
    ///
    /// 평문 금액을 자명 암호화해 잔액에 더함. 새 잔액 핸들 반환.
    pub async fn faucet(&self, to: Address, amount: u64) -> Result<Handle, LendingError> {
        let mut state = self.state.write().await;

        let balance = self.ensure_balance(&mut state, to).await;
        let minted = self.runtime.trivial_encrypt(amount).await;
        let new_balance = self.runtime.add(balance, minted).await?;

        self.runtime.allow(new_balance, to).await;
        state.balances.insert(to, new_balance);

        tracing::info!(holder = %format!("{:#x}", to), amount, "faucet mint");
        Ok(new_balance)
    }

    /// Operator 권한 부여 (시간 창 기반)
    ///
    /// 재부여는 expiry를 덮어씀 — 연장/단축 모두 holder의 자유
    pub async fn set_operator(&self, holder: Address, spender: Address, expiry: u64) {
        let mut state = self.state.write().await;
        state.operators.insert((holder, spender), expiry);

        tracing::info!(
            holder = %format!("{:#x}", holder),
            spender = %format!("{:#x}", spender),
            expiry,
            "operator granted"
        );
    }

    pub async fn operator_expiry(&self, holder: Address, spender: Address) -> Option<u64> {
        let state = self.state.read().await;
        state.operators.get(&(holder, spender)).copied()
    }

    /// Allowance Gate: 위임 이동 전 반드시 통과해야 하는 검사
    pub async fn check_operator(
        &self,
        holder: Address,
        spender: Address,
        now: u64,
    ) -> Result<(), LendingError> {
        let expiry = self
            .operator_expiry(holder, spender)
            .await
            .ok_or(LendingError::NoAllowance)?;

        if now > expiry {
            return Err(LendingError::AllowanceExpired);
        }
        Ok(())
    }

    /// 암호화 잔액 핸들 조회 (미접촉 holder는 zero handle)
    pub async fn balance_of(&self, holder: Address) -> Handle {
        let state = self.state.read().await;
        state.balances.get(&holder).copied().unwrap_or(Handle::ZERO)
    }

    /// 송신자 본인 권한의 이체 (클램프 적용)
    ///
    /// 반환값: 실제 이동한 금액의 핸들 (요청 금액이 아님!)
    pub async fn transfer(
        &self,
        from: Address,
        to: Address,
        amount: Handle,
    ) -> Result<Handle, LendingError> {
        let mut state = self.state.write().await;

        let from_balance = self.ensure_balance(&mut state, from).await;
        let to_balance = self.ensure_balance(&mut state, to).await;

        // 언더플로우 없는 이동: transferred = min(amount, balance)
        let transferred = self.runtime.min(amount, from_balance).await?;
        let new_from = self.runtime.sub(from_balance, transferred).await?;
        let new_to = self.runtime.add(to_balance, transferred).await?;

        self.runtime.allow(new_from, from).await;
        self.runtime.allow(new_to, to).await;
        self.runtime.allow(transferred, from).await;
        self.runtime.allow(transferred, to).await;

        state.balances.insert(from, new_from);
        state.balances.insert(to, new_to);

        Ok(transferred)
    }

    /// Operator 권한을 통한 위임 이체
    ///
    /// operator == from이면 본인 이체로 간주하고 allowance 검사 생략.
    /// 그 외에는 Allowance Gate 통과가 선행 조건.
    pub async fn transfer_from(
        &self,
        operator: Address,
        from: Address,
        to: Address,
        amount: Handle,
        now: u64,
    ) -> Result<Handle, LendingError> {
        if operator != from {
            self.check_operator(from, operator, now).await?;
        }
        self.transfer(from, to, amount).await
    }
}
