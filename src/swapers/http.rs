use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{SwapQuotation, Swaper, SwaperError};
use crate::config::SwaperConfig;
use crate::types::{Token, TokenAmount};

/// Quote API backed swaper (paraswap / openocean style aggregators)
///
/// `POST {base_url}/v1/logics/{id}:swap-token/quote` with either
/// `{input, tokenOut}` (exact in) or `{tokenIn, output}` (exact out).
pub struct HttpSwaper {
    config: SwaperConfig,
    chain_id: u64,
    client: reqwest::Client,
    token_cache: DashMap<u64, Vec<Token>>,
}

#[derive(Debug, Deserialize)]
struct ApiTokenAmount {
    token: Token,
    amount: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuoteResponse {
    input: ApiTokenAmount,
    output: ApiTokenAmount,
    #[serde(default)]
    slippage: Option<u32>,
    #[serde(flatten)]
    extra: serde_json::Map<String, serde_json::Value>,
}

/// What the caller pinned down in a quote request
#[derive(Debug, Clone, Copy)]
enum Requested<'a> {
    ExactIn { input: &'a TokenAmount, token_out: &'a Token },
    ExactOut { token_in: &'a Token, output: &'a TokenAmount },
}

impl Requested<'_> {
    fn tokens(&self) -> (&Token, &Token) {
        match self {
            Self::ExactIn { input, token_out } => (&input.token, token_out),
            Self::ExactOut { token_in, output } => (token_in, &output.token),
        }
    }

    /// The response must quote the pair asked for and keep the fixed side.
    fn check(&self, input: &TokenAmount, output: &TokenAmount) -> Result<(), SwaperError> {
        let (token_in, token_out) = self.tokens();
        if &input.token != token_in || &output.token != token_out {
            return Err(SwaperError::InvalidResponse(format!(
                "quoted {} -> {}, requested {} -> {}",
                input.token, output.token, token_in, token_out
            )));
        }
        let (fixed, quoted) = match self {
            Self::ExactIn { input: requested, .. } => (*requested, input),
            Self::ExactOut { output: requested, .. } => (*requested, output),
        };
        if fixed.amount != quoted.amount {
            return Err(SwaperError::InvalidResponse(format!("quoted {}, requested {}", quoted, fixed)));
        }
        Ok(())
    }
}

impl HttpSwaper {
    pub fn new(config: SwaperConfig, chain_id: u64) -> Self {
        Self {
            config,
            chain_id,
            client: reqwest::Client::new(),
            token_cache: DashMap::new(),
        }
    }

    fn base_url(&self) -> &str {
        self.config.base_url.trim_end_matches('/')
    }

    fn quote_url(&self) -> String {
        format!("{}/v1/logics/{}:swap-token/quote", self.base_url(), self.config.id)
    }

    fn tokens_url(&self) -> String {
        format!("{}/v1/logics/{}:swap-token/tokens?chainId={}", self.base_url(), self.config.id, self.chain_id)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.config.timeout_ms)
    }

    fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let builder = builder.timeout(self.timeout());
        match &self.config.api_key {
            Some(key) => builder.header("x-api-key", key),
            None => builder,
        }
    }

    async fn post_quote(&self, body: serde_json::Value, token_in: &Token, token_out: &Token) -> Result<QuoteResponse, SwaperError> {
        let start = Instant::now();
        let response = self
            .request(self.client.post(self.quote_url()))
            .json(&body)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("{} quote failed ({}): {}", self.config.id, status, text);
            return Err(classify_status(status, token_in, token_out, text));
        }

        let quote: QuoteResponse = response
            .json()
            .await
            .map_err(|e| SwaperError::InvalidResponse(e.to_string()))?;
        debug!("{} quote {} -> {} ({}ms)", self.config.id, token_in, token_out, start.elapsed().as_millis());
        Ok(quote)
    }

    fn to_quotation(&self, response: QuoteResponse, requested: Requested<'_>, slippage_bps: u32) -> Result<SwapQuotation, SwaperError> {
        let input = parse_amount(response.input)?;
        let output = parse_amount(response.output)?;
        requested.check(&input, &output)?;
        let exact_in = matches!(requested, Requested::ExactIn { .. });
        Ok(SwapQuotation {
            swaper: self.config.id.clone(),
            input,
            output,
            slippage_bps: response.slippage.unwrap_or(slippage_bps),
            exact_in,
            payload: serde_json::Value::Object(response.extra),
            quoted_at: Utc::now(),
        })
    }
}

fn parse_amount(raw: ApiTokenAmount) -> Result<TokenAmount, SwaperError> {
    TokenAmount::parse(raw.token, &raw.amount).map_err(|e| SwaperError::InvalidResponse(e.to_string()))
}

fn map_transport_error(e: reqwest::Error) -> SwaperError {
    if e.is_timeout() {
        SwaperError::Timeout
    } else {
        SwaperError::Network(e.to_string())
    }
}

/// 4xx means the aggregator found no route; anything else is transport.
fn classify_status(status: reqwest::StatusCode, token_in: &Token, token_out: &Token, body: String) -> SwaperError {
    if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
        SwaperError::no_route(token_in, token_out)
    } else {
        SwaperError::Network(format!("HTTP {}: {}", status, body))
    }
}

#[async_trait]
impl Swaper for HttpSwaper {
    fn id(&self) -> &str {
        &self.config.id
    }

    fn chain_id(&self) -> u64 {
        self.chain_id
    }

    fn supports_exact_out(&self) -> bool {
        self.config.exact_out
    }

    async fn tokens(&self) -> Result<Vec<Token>, SwaperError> {
        if let Some(cached) = self.token_cache.get(&self.chain_id) {
            return Ok(cached.value().clone());
        }

        let response = self
            .request(self.client.get(self.tokens_url()))
            .send()
            .await
            .map_err(map_transport_error)?;
        if !response.status().is_success() {
            return Err(SwaperError::Network(format!("Failed to fetch token list: HTTP {}", response.status())));
        }
        let tokens: Vec<Token> = response
            .json()
            .await
            .map_err(|e| SwaperError::InvalidResponse(e.to_string()))?;

        debug!("{} lists {} tokens on chain {}", self.config.id, tokens.len(), self.chain_id);
        self.token_cache.insert(self.chain_id, tokens.clone());
        Ok(tokens)
    }

    async fn quote_exact_in(
        &self,
        input: &TokenAmount,
        token_out: &Token,
        slippage_bps: u32,
    ) -> Result<SwapQuotation, SwaperError> {
        let body = json!({
            "chainId": self.chain_id,
            "input": { "token": input.token, "amount": input.amount.to_string() },
            "tokenOut": token_out,
            "slippage": slippage_bps,
        });
        let response = self.post_quote(body, &input.token, token_out).await?;
        self.to_quotation(response, Requested::ExactIn { input, token_out }, slippage_bps)
    }

    async fn quote_exact_out(
        &self,
        token_in: &Token,
        output: &TokenAmount,
        slippage_bps: u32,
    ) -> Result<SwapQuotation, SwaperError> {
        if !self.config.exact_out {
            return super::emulate_exact_out(self, token_in, output, slippage_bps).await;
        }
        let body = json!({
            "chainId": self.chain_id,
            "tokenIn": token_in,
            "output": { "token": output.token, "amount": output.amount.to_string() },
            "slippage": slippage_bps,
        });
        let response = self.post_quote(body, token_in, &output.token).await?;
        self.to_quotation(response, Requested::ExactOut { token_in, output }, slippage_bps)
    }
}
