//! API Routes Module
//!
//! 모든 HTTP 엔드포인트 정의
//!
//! # Routes
//! - `/health` - 헬스 체크
//! - `/input/*` - 암호화 입력 생성 (클라이언트 헬퍼)
//! - `/token/*` - faucet, operator 권한
//! - `/pool/*` - 예치/인출/대출/상환 + 핸들 조회
//! - `/decrypt/*` - 복호화 인가 프로토콜

pub mod health;
pub mod input;
pub mod token;
pub mod pool;
pub mod decrypt;
