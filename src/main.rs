use anyhow::{Context, Result};
use clap::{Arg, ArgAction, Command};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use xcrack_position_engine::config::Config;
use xcrack_position_engine::engine::{TransitionEngine, TransitionRequest};
use xcrack_position_engine::swapers::{StaticRateSwaper, Swaper};
use xcrack_position_engine::types::Token;

/// 시나리오 파일: 요청 + (선택) 오프라인 가격
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Scenario {
    request: TransitionRequest,
    /// When present, quotes come from these prices instead of the swap APIs
    #[serde(default)]
    prices: Vec<ScenarioPrice>,
    #[serde(default = "default_swap_fee_bps")]
    swap_fee_bps: u32,
}

#[derive(Debug, Deserialize)]
struct ScenarioPrice {
    token: Token,
    price: Decimal,
}

fn default_swap_fee_bps() -> u32 {
    30
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let matches = Command::new("position-planner")
        .version("0.1.0")
        .author("xCrack Team <team@xcrack.dev>")
        .about("🦀 레버리지 포지션 트랜지션 플래너")
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("설정 파일 경로")
                .default_value("config/default.toml"),
        )
        .arg(
            Arg::new("scenario")
                .short('s')
                .long("scenario")
                .value_name("FILE")
                .help("트랜지션 시나리오 JSON 파일")
                .required_unless_present("init-config"),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("로그 레벨 (trace, debug, info, warn, error)")
                .default_value("info"),
        )
        .arg(
            Arg::new("init-config")
                .long("init-config")
                .help("기본 설정을 --config 경로에 쓰고 종료")
                .action(ArgAction::SetTrue),
        )
        .get_matches();

    let log_filter = match matches.get_one::<String>("log-level").map(String::as_str) {
        Some(level @ ("trace" | "debug" | "info" | "warn" | "error")) => level.to_string(),
        _ => "info".to_string(),
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| log_filter.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = matches
        .get_one::<String>("config")
        .map(String::as_str)
        .unwrap_or("config/default.toml");

    if matches.get_flag("init-config") {
        Config::default().save(config_path).await?;
        info!("📝 기본 설정 저장: {}", config_path);
        return Ok(());
    }

    let config = if Path::new(config_path).exists() {
        info!("📋 설정 파일 로드 중: {}", config_path);
        Config::load(config_path).await?
    } else {
        warn!("⚠️ 설정 파일 없음 ({}), 기본 설정 사용", config_path);
        Config::default()
    };
    if let Err(e) = config.validate() {
        error!("❌ 설정 검증 실패: {}", e);
        std::process::exit(1);
    }

    let scenario_path = matches
        .get_one::<String>("scenario")
        .context("--scenario is required")?;
    let raw = tokio::fs::read_to_string(scenario_path)
        .await
        .with_context(|| format!("시나리오 파일을 읽을 수 없습니다: {}", scenario_path))?;
    let scenario: Scenario = serde_json::from_str(&raw).context("시나리오 파싱 실패")?;

    let mut engine = TransitionEngine::from_config(&config)?;
    if !scenario.prices.is_empty() {
        info!("🧪 오프라인 가격 {}개로 견적", scenario.prices.len());
        let swaper = scenario
            .prices
            .iter()
            .fold(
                StaticRateSwaper::new("offline", config.engine.chain_id, scenario.swap_fee_bps),
                |swaper, entry| swaper.with_price(entry.token.clone(), entry.price),
            );
        engine = engine.with_swapers(vec![Arc::new(swaper) as Arc<dyn Swaper>]);
    }

    let output = engine.transition(&scenario.request).await?;
    if let Some(blocking) = &output.error {
        warn!("⛔ {} 차단됨: {}", scenario.request.kind(), blocking);
    }
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}
