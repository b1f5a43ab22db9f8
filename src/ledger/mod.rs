//! Confidential Ledger Module
//!
//! 암호화 상태 기계의 본체: 계정별 (deposit, debt) 핸들과 풀 전체 totals를
//! 4개의 상태 변경 연산(deposit / withdraw / borrow / repay)으로만 갱신한다.
//!
//! # Invariants
//!
//! 1. 보존(Conservation): 모든 계정 deposit 핸들의 합 = total_deposits,
//!    debt 핸들의 합 = total_borrows. 갱신 규칙의 대수적 항등식으로 유지되며
//!    평문으로는 검증 불가.
//! 2. 짝지음(Pairing): 계정 갱신과 totals 갱신은 같은 임계 구역 안에서
//!    함께 일어남. 부분 적용은 버그가 아니라 정합성 위반.
//! 3. 무음 클램프: withdraw/repay는 잔액 초과 요청 시 실패하는 대신
//!    `min(requested, available)`로 클램프. 비교 결과는 복호화 없이
//!    동형 compare + select로만 계산됨.
//!
//! # Concurrency
//!
//! 하나의 `RwLock<PoolState>` write guard를 mutation 전체에 걸쳐 보유
//! → 트랜잭션 직렬화 (single-writer-at-a-time). 증명/allowance 검사는
//! 첫 상태 기록 전에 끝나므로 실패 시 관찰 가능한 부분 커밋이 없음.
//!
//! # Interview Q&A
//!
//! Q: 왜 withdraw가 에러 대신 클램프하는가?
//! A: "잔액 부족" 에러 자체가 암호화된 잔액에 대한 1비트 누출이기 때문.
//!    요청 > 잔액 여부를 호출자(및 관찰자)가 알 수 없어야 하므로
//!    항상 성공하되 실제 이동량 핸들을 돌려준다.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;

use ethers::types::Address;
use tokio::sync::RwLock;

use crate::error::LendingError;
use crate::fhe::{FheRuntime, Handle};
use crate::token::ConfidentialToken;

/// 계정별 암호화 상태
///
/// 첫 접촉 이후 두 핸들 모두 항상 정의됨 (암호화된 0 포함). null 없음.
#[derive(Debug, Clone, Copy)]
pub struct Account {
    pub deposit: Handle,
    pub debt: Handle,
}

/// 풀 전체 암호화 totals (프로세스 단일 집계)
///
/// pool_balance는 토큰 커스터디 추적치: deposit/repay에 더하고
/// withdraw/borrow에서 뺌 → 항상 total_deposits - total_borrows와 일치.
#[derive(Debug, Clone, Copy)]
pub struct Totals {
    pub total_deposits: Handle,
    pub total_borrows: Handle,
    pub pool_balance: Handle,
}

/// Borrow 용량 정책 (플러그형 훅)
///
/// 관찰된 표면에는 담보 비율 검사가 없음 — 용량 검증을 정책 훅으로
/// 분리하고 기본값은 무제한. 어느 정책이든 동형 연산만 사용.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowPolicy {
    /// 풀 커스터디 외 추가 제약 없음 (기본값)
    Unrestricted,
    /// 부채가 예치 잔액을 넘지 않도록 잔여 한도로 클램프
    DepositBounded,
}

impl Default for BorrowPolicy {
    fn default() -> Self {
        BorrowPolicy::Unrestricted
    }
}

impl FromStr for BorrowPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "unrestricted" => Ok(BorrowPolicy::Unrestricted),
            "deposit_bounded" | "deposit-bounded" => Ok(BorrowPolicy::DepositBounded),
            other => Err(format!("unknown borrow policy: {}", other)),
        }
    }
}

/// 상태 변경 연산의 영수증
///
/// `transferred`는 실제 적용(클램프 후) 금액의 핸들.
/// 호출자는 요청 금액이 전부 적용됐다고 가정해서는 안 되며,
/// 이 핸들을 복호화해 유효 금액을 확인한다.
#[derive(Debug, Clone, Copy)]
pub struct MutationReceipt {
    pub operation: &'static str,
    pub holder: Address,
    pub transferred: Handle,
    pub account: Account,
}

struct PoolState {
    accounts: HashMap<Address, Account>,
    totals: Totals,
}

/// 기밀 렌딩 풀
pub struct LendingPool {
    address: Address,
    token: Arc<ConfidentialToken>,
    runtime: Arc<FheRuntime>,
    policy: BorrowPolicy,
    state: RwLock<PoolState>,
}

impl LendingPool {
    /// 풀 생성 — totals는 암호화된 0으로 초기화
    pub async fn new(
        address: Address,
        token: Arc<ConfidentialToken>,
        runtime: Arc<FheRuntime>,
        policy: BorrowPolicy,
    ) -> Self {
        let totals = Totals {
            total_deposits: runtime.trivial_encrypt(0).await,
            total_borrows: runtime.trivial_encrypt(0).await,
            pool_balance: runtime.trivial_encrypt(0).await,
        };

        Self {
            address,
            token,
            runtime,
            policy,
            state: RwLock::new(PoolState {
                accounts: HashMap::new(),
                totals,
            }),
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn policy(&self) -> BorrowPolicy {
        self.policy
    }

    /// 계정 초기화 보장 (첫 접촉 시 두 핸들 모두 암호화된 0)
    async fn ensure_account(&self, state: &mut PoolState, holder: Address) -> Account {
        if let Some(account) = state.accounts.get(&holder) {
            return *account;
        }

        let deposit = self.runtime.trivial_encrypt(0).await;
        let debt = self.runtime.trivial_encrypt(0).await;
        self.runtime.allow(deposit, holder).await;
        self.runtime.allow(debt, holder).await;

        let account = Account { deposit, debt };
        state.accounts.insert(holder, account);
        account
    }

    /// 갱신된 핸들들에 대한 복호화 권한 부여 (holder + 풀 자신)
    async fn allow_account(&self, holder: Address, account: &Account, totals: &Totals) {
        for handle in [
            account.deposit,
            account.debt,
            totals.total_deposits,
            totals.total_borrows,
            totals.pool_balance,
        ] {
            self.runtime.allow(handle, holder).await;
            self.runtime.allow(handle, self.address).await;
        }
    }

    /// 입력 승인: Encrypted Input Adapter 경유
    async fn admit(
        &self,
        holder: Address,
        handle: Handle,
        proof: &[u8],
    ) -> Result<Handle, LendingError> {
        Ok(self
            .runtime
            .verify_input(handle, proof, self.address, holder)
            .await?)
    }

    /// deposit(handle): 무조건 가산 — 비교 불필요
    ///
    /// 선행 조건: (holder → pool) operator 권한. 토큰이 holder → pool로
    /// 이동한 양(transferred)만큼 계정/totals에 가산.
    pub async fn deposit(
        &self,
        holder: Address,
        handle: Handle,
        proof: &[u8],
        now: u64,
    ) -> Result<MutationReceipt, LendingError> {
        let amount = self.admit(holder, handle, proof).await?;
        // 상태 기록 전에 allowance 검사 → 실패 시 커스터디/원장 모두 무변
        self.token.check_operator(holder, self.address, now).await?;

        let mut state = self.state.write().await;
        let account = self.ensure_account(&mut state, holder).await;

        let transferred = self
            .token
            .transfer_from(self.address, holder, self.address, amount, now)
            .await?;

        let account = Account {
            deposit: self.runtime.add(account.deposit, transferred).await?,
            debt: account.debt,
        };
        let totals = Totals {
            total_deposits: self
                .runtime
                .add(state.totals.total_deposits, transferred)
                .await?,
            total_borrows: state.totals.total_borrows,
            pool_balance: self
                .runtime
                .add(state.totals.pool_balance, transferred)
                .await?,
        };

        self.allow_account(holder, &account, &totals).await;
        state.accounts.insert(holder, account);
        state.totals = totals;

        tracing::info!(holder = %format!("{:#x}", holder), "deposit committed");
        Ok(MutationReceipt {
            operation: "deposit",
            holder,
            transferred,
            account,
        })
    }

    /// withdraw(handle): allowed = min(requested, deposit)로 무음 클램프
    ///
    /// holder에게 실제 이체되는 양은 requested가 아닌 allowed.
    pub async fn withdraw(
        &self,
        holder: Address,
        handle: Handle,
        proof: &[u8],
        _now: u64,
    ) -> Result<MutationReceipt, LendingError> {
        let amount = self.admit(holder, handle, proof).await?;

        let mut state = self.state.write().await;
        let account = self.ensure_account(&mut state, holder).await;

        let allowed = self.runtime.min(amount, account.deposit).await?;
        // 풀 자기 잔액 이동 — operator 불필요. 다른 계정이 대출 중이면
        // 풀 커스터디가 allowed보다 작을 수 있고, 그때는 토큰 측 클램프가
        // 한 번 더 적용됨. 원장은 allowed가 아니라 transferred로 커밋.
        let transferred = self.token.transfer(self.address, holder, allowed).await?;

        let account = Account {
            deposit: self.runtime.sub(account.deposit, transferred).await?,
            debt: account.debt,
        };
        let totals = Totals {
            total_deposits: self
                .runtime
                .sub(state.totals.total_deposits, transferred)
                .await?,
            total_borrows: state.totals.total_borrows,
            pool_balance: self
                .runtime
                .sub(state.totals.pool_balance, transferred)
                .await?,
        };

        self.allow_account(holder, &account, &totals).await;
        state.accounts.insert(holder, account);
        state.totals = totals;

        tracing::info!(holder = %format!("{:#x}", holder), "withdraw committed");
        Ok(MutationReceipt {
            operation: "withdraw",
            holder,
            transferred,
            account,
        })
    }

    /// borrow(handle): 정책 훅 → 풀 유동성 클램프 → 부채 가산
    pub async fn borrow(
        &self,
        holder: Address,
        handle: Handle,
        proof: &[u8],
        _now: u64,
    ) -> Result<MutationReceipt, LendingError> {
        let amount = self.admit(holder, handle, proof).await?;

        let mut state = self.state.write().await;
        let account = self.ensure_account(&mut state, holder).await;

        let capped = match self.policy {
            BorrowPolicy::Unrestricted => amount,
            BorrowPolicy::DepositBounded => {
                // headroom = deposit - min(debt, deposit); allowed = min(req, headroom)
                let spent = self.runtime.min(account.debt, account.deposit).await?;
                let headroom = self.runtime.sub(account.deposit, spent).await?;
                self.runtime.min(amount, headroom).await?
            }
        };
        // 커스터디 제약: 풀이 보관 중인 것보다 많이 빌려줄 수 없음
        let allowed = self.runtime.min(capped, state.totals.pool_balance).await?;

        let transferred = self.token.transfer(self.address, holder, allowed).await?;

        let account = Account {
            deposit: account.deposit,
            debt: self.runtime.add(account.debt, transferred).await?,
        };
        let totals = Totals {
            total_deposits: state.totals.total_deposits,
            total_borrows: self
                .runtime
                .add(state.totals.total_borrows, transferred)
                .await?,
            pool_balance: self
                .runtime
                .sub(state.totals.pool_balance, transferred)
                .await?,
        };

        self.allow_account(holder, &account, &totals).await;
        state.accounts.insert(holder, account);
        state.totals = totals;

        tracing::info!(holder = %format!("{:#x}", holder), "borrow committed");
        Ok(MutationReceipt {
            operation: "borrow",
            holder,
            transferred,
            account,
        })
    }

    /// repay(handle): allowed = min(requested, debt) — 초과분은 인출하지 않음
    ///
    /// 토큰 이동 요청이 정확히 allowed여야 과청구가 없음:
    /// 요청 전액을 끌어온 뒤 차액을 돌려주는 방식은 금지.
    pub async fn repay(
        &self,
        holder: Address,
        handle: Handle,
        proof: &[u8],
        now: u64,
    ) -> Result<MutationReceipt, LendingError> {
        let amount = self.admit(holder, handle, proof).await?;
        self.token.check_operator(holder, self.address, now).await?;

        let mut state = self.state.write().await;
        let account = self.ensure_account(&mut state, holder).await;

        let allowed = self.runtime.min(amount, account.debt).await?;
        let transferred = self
            .token
            .transfer_from(self.address, holder, self.address, allowed, now)
            .await?;

        let account = Account {
            deposit: account.deposit,
            debt: self.runtime.sub(account.debt, transferred).await?,
        };
        let totals = Totals {
            total_deposits: state.totals.total_deposits,
            total_borrows: self
                .runtime
                .sub(state.totals.total_borrows, transferred)
                .await?,
            pool_balance: self
                .runtime
                .add(state.totals.pool_balance, transferred)
                .await?,
        };

        self.allow_account(holder, &account, &totals).await;
        state.accounts.insert(holder, account);
        state.totals = totals;

        tracing::info!(holder = %format!("{:#x}", holder), "repay committed");
        Ok(MutationReceipt {
            operation: "repay",
            holder,
            transferred,
            account,
        })
    }

    /// getAccountData: (depositHandle, debtHandle) — 복호화 없음
    ///
    /// 미접촉 계정은 zero handle 쌍 (Solidity 미초기화 euint64와 동일 표현)
    pub async fn account_data(&self, holder: Address) -> Account {
        let state = self.state.read().await;
        state.accounts.get(&holder).copied().unwrap_or(Account {
            deposit: Handle::ZERO,
            debt: Handle::ZERO,
        })
    }

    /// getTotals: (totalDeposits, totalBorrows, poolBalance) — 복호화 없음
    pub async fn totals(&self) -> Totals {
        let state = self.state.read().await;
        state.totals
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fhe::EncryptedInputBuilder;

    const DAY: u64 = 24 * 60 * 60;
    const NOW: u64 = 1_700_000_000;

    fn addr(n: u64) -> Address {
        Address::from_low_u64_be(n)
    }

    struct Harness {
        runtime: Arc<FheRuntime>,
        token: Arc<ConfidentialToken>,
        pool: LendingPool,
    }

    async fn setup(policy: BorrowPolicy) -> Harness {
        let runtime = Arc::new(FheRuntime::new());
        let token = Arc::new(ConfidentialToken::new(addr(1), runtime.clone()));
        let pool = LendingPool::new(addr(2), token.clone(), runtime.clone(), policy).await;
        Harness {
            runtime,
            token,
            pool,
        }
    }

    impl Harness {
        /// faucet + operator 부여 (24시간)
        async fn fund(&self, holder: Address, amount: u64) {
            self.token.faucet(holder, amount).await.unwrap();
            self.token
                .set_operator(holder, self.pool.address(), NOW + DAY)
                .await;
        }

        /// 암호화 입력 생성 헬퍼
        async fn encrypt(&self, holder: Address, amount: u64) -> (Handle, Vec<u8>) {
            let input = EncryptedInputBuilder::new(self.pool.address(), holder)
                .add64(amount)
                .encrypt(&self.runtime)
                .await;
            (input.handles[0], input.proof)
        }

        async fn value(&self, handle: Handle) -> u64 {
            self.runtime.cleartext(handle).await.unwrap()
        }

        async fn assert_account(&self, holder: Address, deposit: u64, debt: u64) {
            let account = self.pool.account_data(holder).await;
            assert_eq!(self.value(account.deposit).await, deposit, "deposit mismatch");
            assert_eq!(self.value(account.debt).await, debt, "debt mismatch");
        }

        async fn assert_totals(&self, deposits: u64, borrows: u64, balance: u64) {
            let totals = self.pool.totals().await;
            assert_eq!(self.value(totals.total_deposits).await, deposits);
            assert_eq!(self.value(totals.total_borrows).await, borrows);
            assert_eq!(self.value(totals.pool_balance).await, balance);
        }
    }

    #[tokio::test]
    async fn test_sequential_scenario_totals_mirror_account() {
        // faucet 1000 → operator 24h → deposit 200 → borrow 180 → repay 120
        let h = setup(BorrowPolicy::Unrestricted).await;
        let user = addr(20);
        h.fund(user, 1_000).await;

        let (handle, proof) = h.encrypt(user, 200).await;
        h.pool.deposit(user, handle, &proof, NOW).await.unwrap();
        h.assert_account(user, 200, 0).await;
        h.assert_totals(200, 0, 200).await;

        let (handle, proof) = h.encrypt(user, 180).await;
        h.pool.borrow(user, handle, &proof, NOW).await.unwrap();
        h.assert_account(user, 200, 180).await;
        h.assert_totals(200, 180, 20).await;

        let (handle, proof) = h.encrypt(user, 120).await;
        h.pool.repay(user, handle, &proof, NOW).await.unwrap();
        h.assert_account(user, 200, 60).await;
        h.assert_totals(200, 60, 140).await;
    }

    #[tokio::test]
    async fn test_withdraw_over_balance_clamps_to_zero() {
        let h = setup(BorrowPolicy::Unrestricted).await;
        let user = addr(20);
        h.fund(user, 1_000).await;

        let (handle, proof) = h.encrypt(user, 200).await;
        h.pool.deposit(user, handle, &proof, NOW).await.unwrap();

        // 200 예치 후 500 인출 요청 → 유효 인출 200, 잔액 0, 에러 없음
        let (handle, proof) = h.encrypt(user, 500).await;
        let receipt = h.pool.withdraw(user, handle, &proof, NOW).await.unwrap();

        assert_eq!(h.value(receipt.transferred).await, 200);
        h.assert_account(user, 0, 0).await;
        h.assert_totals(0, 0, 0).await;

        // 토큰은 전액 회수됨
        let token_balance = h.token.balance_of(user).await;
        assert_eq!(h.value(token_balance).await, 1_000);
    }

    #[tokio::test]
    async fn test_repay_over_debt_clamps_and_never_overcharges() {
        let h = setup(BorrowPolicy::Unrestricted).await;
        let user = addr(20);
        h.fund(user, 1_000).await;

        let (handle, proof) = h.encrypt(user, 500).await;
        h.pool.deposit(user, handle, &proof, NOW).await.unwrap();
        let (handle, proof) = h.encrypt(user, 180).await;
        h.pool.borrow(user, handle, &proof, NOW).await.unwrap();

        // 부채 180에 500 상환 요청 → 유효 상환 180, 부채 0
        let (handle, proof) = h.encrypt(user, 500).await;
        let receipt = h.pool.repay(user, handle, &proof, NOW).await.unwrap();

        assert_eq!(h.value(receipt.transferred).await, 180);
        h.assert_account(user, 500, 0).await;
        h.assert_totals(500, 0, 500).await;

        // 초과분은 지갑에서 인출되지 않음: 1000 - 500(deposit) + 180(borrow) - 180(repay)
        let token_balance = h.token.balance_of(user).await;
        assert_eq!(h.value(token_balance).await, 500);
    }

    #[tokio::test]
    async fn test_deposit_without_allowance_leaves_state_unchanged() {
        let h = setup(BorrowPolicy::Unrestricted).await;
        let user = addr(20);
        h.token.faucet(user, 1_000).await.unwrap(); // operator 미부여

        let (handle, proof) = h.encrypt(user, 200).await;
        let err = h.pool.deposit(user, handle, &proof, NOW).await.unwrap_err();
        assert!(matches!(err, LendingError::NoAllowance));

        // 원장/커스터디 모두 무변
        h.assert_totals(0, 0, 0).await;
        let token_balance = h.token.balance_of(user).await;
        assert_eq!(h.value(token_balance).await, 1_000);
    }

    #[tokio::test]
    async fn test_expired_allowance_rejected() {
        let h = setup(BorrowPolicy::Unrestricted).await;
        let user = addr(20);
        h.token.faucet(user, 1_000).await.unwrap();
        h.token.set_operator(user, h.pool.address(), NOW - 1).await;

        let (handle, proof) = h.encrypt(user, 200).await;
        let err = h.pool.deposit(user, handle, &proof, NOW).await.unwrap_err();
        assert!(matches!(err, LendingError::AllowanceExpired));
    }

    #[tokio::test]
    async fn test_invalid_proof_rejected_before_any_state_change() {
        let h = setup(BorrowPolicy::Unrestricted).await;
        let user = addr(20);
        h.fund(user, 1_000).await;

        // 다른 컨트랙트용으로 만든 입력을 풀에 제출
        let input = EncryptedInputBuilder::new(addr(99), user)
            .add64(200)
            .encrypt(&h.runtime)
            .await;

        let err = h
            .pool
            .deposit(user, input.handles[0], &input.proof, NOW)
            .await
            .unwrap_err();
        assert!(matches!(err, LendingError::InvalidProof));
        h.assert_totals(0, 0, 0).await;
    }

    #[tokio::test]
    async fn test_withdraw_clamped_by_pool_liquidity_when_funds_are_lent_out() {
        let h = setup(BorrowPolicy::Unrestricted).await;
        let (alice, bob) = (addr(20), addr(21));
        h.fund(alice, 1_000).await;
        h.fund(bob, 1_000).await;

        let (handle, proof) = h.encrypt(alice, 300).await;
        h.pool.deposit(alice, handle, &proof, NOW).await.unwrap();
        let (handle, proof) = h.encrypt(bob, 200).await;
        h.pool.borrow(bob, handle, &proof, NOW).await.unwrap();

        // alice의 예치는 300이지만 풀 커스터디는 100뿐 → 100만 인출됨
        let (handle, proof) = h.encrypt(alice, 300).await;
        let receipt = h.pool.withdraw(alice, handle, &proof, NOW).await.unwrap();

        assert_eq!(h.value(receipt.transferred).await, 100);
        h.assert_account(alice, 200, 0).await;
        h.assert_totals(200, 200, 0).await;

        // 원장은 transferred 기준으로 커밋되어 보존 불변식 유지
        let token_balance = h.token.balance_of(alice).await;
        assert_eq!(h.value(token_balance).await, 1_000 - 300 + 100);
    }

    #[tokio::test]
    async fn test_borrow_clamped_by_pool_liquidity() {
        let h = setup(BorrowPolicy::Unrestricted).await;
        let (alice, bob) = (addr(20), addr(21));
        h.fund(alice, 1_000).await;
        h.fund(bob, 1_000).await;

        let (handle, proof) = h.encrypt(alice, 100).await;
        h.pool.deposit(alice, handle, &proof, NOW).await.unwrap();

        // 풀 유동성 100에서 bob이 500 대출 요청 → 100으로 클램프
        let (handle, proof) = h.encrypt(bob, 500).await;
        let receipt = h.pool.borrow(bob, handle, &proof, NOW).await.unwrap();

        assert_eq!(h.value(receipt.transferred).await, 100);
        h.assert_account(bob, 0, 100).await;
        h.assert_totals(100, 100, 0).await;
    }

    #[tokio::test]
    async fn test_deposit_bounded_policy_limits_borrow() {
        let h = setup(BorrowPolicy::DepositBounded).await;
        let (alice, bob) = (addr(20), addr(21));
        h.fund(alice, 1_000).await;
        h.fund(bob, 1_000).await;

        // 유동성 확보용 예치
        let (handle, proof) = h.encrypt(alice, 800).await;
        h.pool.deposit(alice, handle, &proof, NOW).await.unwrap();

        // bob: 예치 100, 대출 요청 500 → headroom 100으로 클램프
        let (handle, proof) = h.encrypt(bob, 100).await;
        h.pool.deposit(bob, handle, &proof, NOW).await.unwrap();
        let (handle, proof) = h.encrypt(bob, 500).await;
        let receipt = h.pool.borrow(bob, handle, &proof, NOW).await.unwrap();

        assert_eq!(h.value(receipt.transferred).await, 100);
        h.assert_account(bob, 100, 100).await;

        // headroom 0에서 추가 대출 → 0
        let (handle, proof) = h.encrypt(bob, 50).await;
        let receipt = h.pool.borrow(bob, handle, &proof, NOW).await.unwrap();
        assert_eq!(h.value(receipt.transferred).await, 0);
    }

    #[tokio::test]
    async fn test_conservation_across_multiple_accounts() {
        let h = setup(BorrowPolicy::Unrestricted).await;
        let (alice, bob) = (addr(20), addr(21));
        h.fund(alice, 1_000).await;
        h.fund(bob, 1_000).await;

        let (handle, proof) = h.encrypt(alice, 300).await;
        h.pool.deposit(alice, handle, &proof, NOW).await.unwrap();
        let (handle, proof) = h.encrypt(bob, 450).await;
        h.pool.deposit(bob, handle, &proof, NOW).await.unwrap();
        let (handle, proof) = h.encrypt(alice, 120).await;
        h.pool.borrow(alice, handle, &proof, NOW).await.unwrap();
        let (handle, proof) = h.encrypt(bob, 200).await;
        h.pool.withdraw(bob, handle, &proof, NOW).await.unwrap();

        // totals = 계정 합
        let a = h.pool.account_data(alice).await;
        let b = h.pool.account_data(bob).await;
        let deposits = h.value(a.deposit).await + h.value(b.deposit).await;
        let debts = h.value(a.debt).await + h.value(b.debt).await;

        let totals = h.pool.totals().await;
        assert_eq!(h.value(totals.total_deposits).await, deposits);
        assert_eq!(h.value(totals.total_borrows).await, debts);
        assert_eq!(h.value(totals.pool_balance).await, deposits - debts);
    }

    #[tokio::test]
    async fn test_account_data_before_first_touch_is_zero_handles() {
        let h = setup(BorrowPolicy::Unrestricted).await;
        let account = h.pool.account_data(addr(77)).await;
        assert!(account.deposit.is_zero());
        assert!(account.debt.is_zero());
    }

    #[tokio::test]
    async fn test_deposit_sum_never_negative_over_mixed_sequence() {
        // deposit/withdraw 임의 시퀀스 후 deposit = Σ예치 - Σ(실제 인출), 음수 불가
        let h = setup(BorrowPolicy::Unrestricted).await;
        let user = addr(20);
        h.fund(user, 10_000).await;

        let mut expected: u64 = 0;
        let script: &[(&str, u64)] = &[
            ("deposit", 500),
            ("withdraw", 200),
            ("withdraw", 10_000), // 클램프: 300만 인출
            ("deposit", 50),
            ("withdraw", 49),
            ("withdraw", 2),      // 클램프: 1만 인출
        ];

        for (op, amount) in script {
            let (handle, proof) = h.encrypt(user, *amount).await;
            let receipt = match *op {
                "deposit" => h.pool.deposit(user, handle, &proof, NOW).await.unwrap(),
                _ => h.pool.withdraw(user, handle, &proof, NOW).await.unwrap(),
            };
            let applied = h.value(receipt.transferred).await;
            if *op == "deposit" {
                expected += applied;
            } else {
                expected -= applied;
            }
        }

        assert_eq!(expected, 0);
        h.assert_account(user, 0, 0).await;
        h.assert_totals(0, 0, 0).await;
    }
}
