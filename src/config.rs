//! Configuration Module
//!
//! # Interview Q&A
//!
//! Q: 환경변수 vs 설정 파일, 어떤 방식을 선택했고 왜인가?
//! A: 환경변수를 선택
//!    - 12-Factor App 원칙 준수
//!    - Docker/K8s 배포 시 환경별 설정 분리 용이
//!    - 컨트랙트 주소 같은 배포 산출물을 코드에 하드코딩하지 않음
//!    - CI/CD 파이프라인에서 쉽게 주입 가능
//!
//! Q: 설정 검증은 어떻게 하는가?
//! A: from_env()에서 필수 값 검증 → 없으면 즉시 실패 (fail-fast)
//!    - 앱 시작 시점에 모든 설정 검증 (주소 형식 포함)
//!    - 런타임 에러보다 시작 실패가 디버깅에 유리

use std::env;

use anyhow::{Context, Result};
use ethers::types::Address;

use crate::ledger::BorrowPolicy;

/// 애플리케이션 설정
#[derive(Debug, Clone)]
pub struct Config {
    /// 서버 포트 (기본값: 3001)
    pub port: u16,

    /// EIP-712 도메인 분리에 쓰이는 chain id
    pub chain_id: u64,

    /// 기밀 토큰(fheUSDT) 인스턴스 주소
    pub token_address: Address,

    /// 렌딩 풀 인스턴스 주소 (토큰 주소에 바인딩되어 생성됨)
    pub pool_address: Address,

    /// 복호화 게이트웨이 주소 (EIP-712 verifyingContract)
    pub gateway_address: Address,

    /// 외부 복호화 서비스 URL (없으면 in-process 백엔드)
    pub decryption_service_url: Option<String>,

    /// Borrow 용량 정책 (기본: unrestricted)
    pub borrow_policy: BorrowPolicy,

    /// 환경 (development, staging, production)
    pub environment: Environment,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

impl Config {
    /// 환경변수에서 설정 로드
    ///
    /// # Optional Environment Variables
    ///
    /// - `PORT`: 서버 포트 (기본값: 3001)
    /// - `CHAIN_ID`: 체인 ID (기본값: 31337, Anvil/Hardhat)
    /// - `TOKEN_ADDRESS` / `POOL_ADDRESS` / `GATEWAY_ADDRESS`: 인스턴스 주소
    ///   (기본값: 로컬 deterministic deployment 주소)
    /// - `DECRYPTION_SERVICE_URL`: 외부 복호화 서비스
    /// - `BORROW_POLICY`: unrestricted | deposit_bounded
    /// - `ENVIRONMENT`: development | staging | production
    pub fn from_env() -> Result<Self> {
        let environment = match env::var("ENVIRONMENT")
            .unwrap_or_else(|_| "development".to_string())
            .to_lowercase()
            .as_str()
        {
            "production" => Environment::Production,
            "staging" => Environment::Staging,
            _ => Environment::Development,
        };

        Ok(Config {
            port: env::var("PORT")
                .unwrap_or_else(|_| "3001".to_string())
                .parse()
                .context("PORT must be a valid number")?,

            chain_id: env::var("CHAIN_ID")
                .unwrap_or_else(|_| "31337".to_string())
                .parse()
                .context("CHAIN_ID must be a valid number")?,

            token_address: env::var("TOKEN_ADDRESS")
                .unwrap_or_else(|_| {
                    // 로컬 체인 첫 배포 주소 (deterministic)
                    "0x5FbDB2315678afecb367f032d93F642f64180aa3".to_string()
                })
                .parse()
                .context("TOKEN_ADDRESS must be a valid Ethereum address")?,

            pool_address: env::var("POOL_ADDRESS")
                .unwrap_or_else(|_| {
                    "0xe7f1725E7734CE288F8367e1Bb143E90bb3F0512".to_string()
                })
                .parse()
                .context("POOL_ADDRESS must be a valid Ethereum address")?,

            gateway_address: env::var("GATEWAY_ADDRESS")
                .unwrap_or_else(|_| {
                    "0x9fE46736679d2D9a65F0992F2272dE9f3c7fa6e0".to_string()
                })
                .parse()
                .context("GATEWAY_ADDRESS must be a valid Ethereum address")?,

            decryption_service_url: env::var("DECRYPTION_SERVICE_URL").ok(),

            borrow_policy: env::var("BORROW_POLICY")
                .unwrap_or_else(|_| "unrestricted".to_string())
                .parse()
                .map_err(anyhow::Error::msg)
                .context("BORROW_POLICY must be unrestricted or deposit_bounded")?,

            environment,
        })
    }

    /// 프로덕션 환경인지 확인
    pub fn is_production(&self) -> bool {
        self.environment == Environment::Production
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        // 환경변수 없이 기본값으로 설정 생성
        let config = Config::from_env().unwrap();
        assert_eq!(config.port, 3001);
        assert_eq!(config.chain_id, 31337);
        assert_eq!(config.borrow_policy, BorrowPolicy::Unrestricted);
        assert_eq!(config.environment, Environment::Development);
        assert!(config.decryption_service_url.is_none());
        assert_ne!(config.token_address, config.pool_address);
    }
}
