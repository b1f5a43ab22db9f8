//! Decryption Authorization Protocol
//!
//! 원장과 분리된 비동기 공개 경로: holder가 자신의 핸들을
//! 서명 기반 grant로 선택적으로 공개(reveal)받는다.
//!
//! # Two-Phase Protocol
//!
//! ```text
//! Phase 1 (grant 구성, 클라이언트 측):
//!   ephemeral keypair 생성 → EIP-712 구조화 메시지
//!   (publicKey, contractAddresses, startTimestamp, durationDays)
//!   → holder의 장기 키로 typed-data 서명
//!
//! Phase 2 (reveal 요청):
//!   {handle, contract} 쌍들 + keypair + 서명 + scope + 시간 창
//!   → 복호화 서비스 → handle → 평문 매핑
//! ```
//!
//! # Guarantees
//!
//! - grant는 서명자가 명시적으로 scope에 넣은 컨트랙트의 핸들만,
//!   서명자 본인에 대해서만 공개를 허가함
//! - 타인에게 전달(forward)해도 타인의 핸들은 공개되지 않음 (핸들 ACL)
//! - 원장 상태는 이 경로에서 절대 변경되지 않음 (read-only)
//! - grant는 요청마다 새로 만들며 재사용하지 않음 — startTimestamp가
//!   매번 새 유효 창을 고정하므로 세션 간 재사용은 의미가 없음

mod grant;
mod oracle;

pub use grant::{DecryptionGrant, EphemeralKeypair, EIP712_DOMAIN_NAME, EIP712_DOMAIN_VERSION};
pub use oracle::{DecryptionOracle, HandleContractPair, RevealOutcome, RevealRequest};
