//! FHE Confidential Lending API Server
//!
//! # Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        Client (Frontend)                     │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Axum Web Server                         │
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                      Routes Layer                        ││
//! │  │  /health  /input/*  /token/*  /pool/*  /decrypt/*       ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Domain Layer                          ││
//! │  │  LendingPool    ConfidentialToken    DecryptionOracle   ││
//! │  └─────────────────────────────────────────────────────────┘│
//! │  ┌─────────────────────────────────────────────────────────┐│
//! │  │                    Crypto Layer                          ││
//! │  │  FheRuntime (handles, input proofs, handle ACL)         ││
//! │  └─────────────────────────────────────────────────────────┘│
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │              External Decryption Service (optional)          │
//! │  grant 검증 통과 후에만 호출 — 미설정 시 in-process 복호화   │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use fhe_lending_api::{build_state, routes, AppState, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 환경변수 로드
    dotenvy::dotenv().ok();

    // 로깅 초기화
    // RUST_LOG=debug 형태로 레벨 제어 가능
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "fhe_lending_api=debug,tower_http=debug".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("🚀 Starting FHE Confidential Lending API Server");

    // 설정 로드
    let config = Config::from_env()?;
    tracing::info!("📋 Configuration loaded");
    tracing::info!("🪙 Token instance at {:#x}", config.token_address);
    tracing::info!("🏦 Lending pool at {:#x}", config.pool_address);

    if config.decryption_service_url.is_some() {
        tracing::info!("🔑 Decryption backend: remote service");
    } else {
        tracing::info!("🔑 Decryption backend: in-process");
    }

    let port = config.port;
    let state = build_state(config).await;
    tracing::info!("🔐 FHE runtime and ledger initialized");

    // 라우터 구성
    let app = create_router(state);

    // 서버 시작
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("🌐 Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// 라우터 생성
///
/// # Route Structure
///
/// ```text
/// GET  /health                  - 서버 상태 확인
///
/// POST /input/encrypt           - 암호화 입력 (handle, proof) 생성
///
/// POST /token/faucet            - 데모 민팅
/// POST /token/operator          - 시간 제한 operator 권한 부여
///
/// POST /pool/deposit            - 예치
/// POST /pool/withdraw           - 출금 (잔액으로 클램프)
/// POST /pool/borrow             - 대출 (유동성으로 클램프)
/// POST /pool/repay              - 상환 (부채로 클램프)
/// GET  /pool/account/:address   - 계정 핸들 조회
/// GET  /pool/totals             - 풀 totals 핸들 조회
///
/// POST /decrypt/keypair         - ephemeral keypair 생성
/// POST /decrypt/user            - grant 검증 후 핸들 복호화
/// ```
fn create_router(state: AppState) -> Router {
    // CORS 설정
    // 프로덕션에서는 특정 도메인만 허용
    // 개발 환경에서는 localhost 허용
    let cors = if state.config.is_production() {
        let allowed_origins = std::env::var("ALLOWED_ORIGINS")
            .unwrap_or_else(|_| "https://yourdomain.com".to_string());
        let origins: Vec<_> = allowed_origins
            .split(',')
            .filter_map(|s| s.trim().parse().ok())
            .collect();
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
            .allow_headers([axum::http::header::CONTENT_TYPE])
    } else {
        CorsLayer::new()
            .allow_origin([
                "http://localhost:5173".parse().unwrap(), // Vite dev server
                "http://localhost:3000".parse().unwrap(),
                "http://127.0.0.1:5173".parse().unwrap(),
            ])
            .allow_methods(Any)
            .allow_headers(Any)
    };

    Router::new()
        // Health check
        .route("/health", get(routes::health::health_check))

        // Encrypted input
        .route("/input/encrypt", post(routes::input::encrypt_input))

        // Token
        .route("/token/faucet", post(routes::token::faucet))
        .route("/token/operator", post(routes::token::set_operator))

        // Lending pool
        .route("/pool/deposit", post(routes::pool::deposit))
        .route("/pool/withdraw", post(routes::pool::withdraw))
        .route("/pool/borrow", post(routes::pool::borrow))
        .route("/pool/repay", post(routes::pool::repay))
        .route("/pool/account/:address", get(routes::pool::get_account))
        .route("/pool/totals", get(routes::pool::get_totals))

        // Decryption protocol
        .route("/decrypt/keypair", post(routes::decrypt::generate_keypair))
        .route("/decrypt/user", post(routes::decrypt::user_decrypt))

        // 미들웨어
        .layer(TraceLayer::new_for_http())
        .layer(cors)

        // 상태 주입
        .with_state(state)
}
