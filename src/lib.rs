//! FHE Confidential Lending API Library
//!
//! # Overview
//!
//! 이 라이브러리는 기밀 렌딩 원장(confidential lending ledger)의
//! 백엔드 엔진과 API를 제공합니다. 계정 잔액(예치/부채)과 풀 전체
//! totals는 전부 암호문 핸들로만 저장·갱신되며, 원장 자신도 평문을
//! 볼 수 없습니다.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                          API                                 │
//! │                                                              │
//! │  ┌────────┐  ┌────────┐  ┌────────┐  ┌─────────┐  ┌───────┐ │
//! │  │ Routes │  │ Ledger │  │ Token  │  │ Decrypt │  │  FHE  │ │
//! │  └───┬────┘  └───┬────┘  └───┬────┘  └────┬────┘  └───┬───┘ │
//! │      │           │           │            │           │     │
//! │      └───────────┴───────────┴────────────┴───────────┘     │
//! │                              │                               │
//! └──────────────────────────────┼───────────────────────────────┘
//!                                │
//!                                ▼
//!                    ┌──────────────────────┐
//!                    │  Decryption Service  │  (외부, 검증 후 호출)
//!                    └──────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `config`: 환경 설정 관리
//! - `error`: 에러 타입 및 처리
//! - `fhe`: 동형암호 코프로세서 capability + 암호화 입력 어댑터
//! - `token`: 암호화 잔액 토큰 + Allowance Gate
//! - `ledger`: 기밀 렌딩 원장 + totals 집계
//! - `decrypt`: 복호화 인가 프로토콜 (EIP-712 grant + 오라클)
//! - `routes`: HTTP 엔드포인트 핸들러
//! - `types`: 공통 타입 정의
//!
//! ## Usage
//!
//! ```rust,ignore
//! use fhe_lending_api::{build_state, Config};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::from_env()?;
//!     let state = build_state(config).await;
//!
//!     // ... 서버 시작
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

pub mod config;
pub mod decrypt;
pub mod error;
pub mod fhe;
pub mod ledger;
pub mod routes;
pub mod token;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use decrypt::DecryptionOracle;
pub use error::LendingError;
pub use fhe::FheRuntime;
pub use ledger::LendingPool;
pub use token::ConfidentialToken;

/// 애플리케이션 전역 상태
#[derive(Clone)]
pub struct AppState {
    pub runtime: Arc<FheRuntime>,
    pub token: Arc<ConfidentialToken>,
    pub pool: Arc<LendingPool>,
    pub oracle: Arc<DecryptionOracle>,
    pub config: Arc<Config>,
}

/// 인스턴스 배선 (배포 스크립트의 효과에 해당)
///
/// 토큰을 먼저 올리고, 풀을 토큰 주소에 바인딩해 생성한다.
pub async fn build_state(config: Config) -> AppState {
    let runtime = Arc::new(FheRuntime::new());

    let token = Arc::new(ConfidentialToken::new(config.token_address, runtime.clone()));
    let pool = Arc::new(
        LendingPool::new(
            config.pool_address,
            token.clone(),
            runtime.clone(),
            config.borrow_policy,
        )
        .await,
    );
    let oracle = Arc::new(DecryptionOracle::new(
        runtime.clone(),
        config.chain_id,
        config.gateway_address,
        config.decryption_service_url.clone(),
    ));

    AppState {
        runtime,
        token,
        pool,
        oracle,
        config: Arc::new(config),
    }
}
