//! Common Types Module
//!
//! 주소/핸들/hex 페이로드 파싱 등 라우트 전반에서 쓰이는 공통 헬퍼

use ethers::types::Address;

use crate::error::LendingError;
use crate::fhe::Handle;

/// Ethereum 주소 파싱
///
/// 형식 오류는 ValidationError로 매핑 (호출자 입력 문제)
pub fn parse_address(value: &str) -> Result<Address, LendingError> {
    value
        .parse::<Address>()
        .map_err(|_| LendingError::ValidationError(format!("invalid Ethereum address: {}", value)))
}

/// 암호문 핸들 파싱 (0x + 64 hex)
pub fn parse_handle(value: &str) -> Result<Handle, LendingError> {
    Handle::from_hex(value)
        .ok_or_else(|| LendingError::ValidationError(format!("invalid ciphertext handle: {}", value)))
}

/// 0x prefix를 허용하는 hex 바이트 파싱
pub fn parse_hex_bytes(value: &str) -> Result<Vec<u8>, LendingError> {
    hex::decode(value.trim_start_matches("0x"))
        .map_err(|_| LendingError::ValidationError(format!("invalid hex payload: {}", value)))
}

/// 전체 길이의 소문자 hex 주소 문자열 (Display는 축약 표기라 사용 불가)
pub fn address_to_hex(addr: &Address) -> String {
    format!("{:#x}", addr)
}
