//! Оплата билетов.
//!
//! `PaymentProcessor` - внешний участник с контрактом успех/отказ:
//! 1.  **SimulatedPayments**: одобряет сразу, без реального списания.
//! 2.  **GatewayPayments**: HTTP клиент платежного шлюза с токенами SHA-256.
//!     Все сетевые вызовы идут через `CircuitBreaker`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::config::{CircuitBreakerConfig, PaymentConfig};

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("payment declined: {0}")]
    Declined(String),

    #[error("payment gateway is temporarily unavailable")]
    CircuitOpen,

    #[error("payment gateway error: {0}")]
    Gateway(String),
}

/// Данные карты из формы оплаты. В логи не попадают.
#[derive(Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CardDetails {
    #[validate(custom(function = "validate_card_number"))]
    pub card_number: String,
    #[validate(custom(function = "validate_expiry"))]
    pub expiry_date: String,
    #[validate(length(min = 3, max = 4), custom(function = "validate_digits"))]
    pub cvv: String,
    #[validate(length(min = 1, max = 100))]
    pub cardholder_name: String,
}

impl CardDetails {
    pub fn last4(&self) -> &str {
        let digits = self.card_number.trim();
        &digits[digits.len().saturating_sub(4)..]
    }
}

impl fmt::Debug for CardDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CardDetails")
            .field("card_number", &format_args!("****{}", self.last4()))
            .finish_non_exhaustive()
    }
}

fn validate_digits(value: &str) -> Result<(), ValidationError> {
    if value.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("digits_only"))
    }
}

fn validate_card_number(value: &str) -> Result<(), ValidationError> {
    let digits: String = value.chars().filter(|c| !c.is_whitespace()).collect();
    if (12..=19).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit()) {
        Ok(())
    } else {
        Err(ValidationError::new("card_number"))
    }
}

// MM/YY
fn validate_expiry(value: &str) -> Result<(), ValidationError> {
    let valid = match value.split_once('/') {
        Some((month, year)) => {
            month.len() == 2
                && year.len() == 2
                && year.chars().all(|c| c.is_ascii_digit())
                && matches!(month.parse::<u8>(), Ok(1..=12))
        }
        None => false,
    };
    if valid {
        Ok(())
    } else {
        Err(ValidationError::new("expiry_date"))
    }
}

#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: String,
    pub amount: i64,
    pub currency: String,
    pub description: String,
    pub email: Option<String>,
    pub card: CardDetails,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Approved { reference: String },
    Declined { reason: String },
}

#[async_trait]
pub trait PaymentProcessor: Send + Sync {
    async fn authorize(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError>;
    async fn refund(&self, reference: &str, amount: i64) -> Result<(), PaymentError>;
}

/// Заглушка оплаты: сразу сообщает об успехе. Режим отказа нужен тестам.
#[derive(Debug, Default)]
pub struct SimulatedPayments {
    decline: bool,
    authorized: AtomicUsize,
    refunds: Mutex<Vec<String>>,
}

impl SimulatedPayments {
    pub fn approving() -> Self {
        Self::default()
    }

    pub fn declining() -> Self {
        Self {
            decline: true,
            ..Self::default()
        }
    }

    pub fn authorized_count(&self) -> usize {
        self.authorized.load(Ordering::Relaxed)
    }

    pub fn refunded(&self) -> Vec<String> {
        self.refunds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl PaymentProcessor for SimulatedPayments {
    async fn authorize(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError> {
        if self.decline {
            return Ok(PaymentOutcome::Declined {
                reason: "card declined".into(),
            });
        }
        self.authorized.fetch_add(1, Ordering::Relaxed);
        info!(
            "Simulated payment approved: order={}, amount={} {}",
            request.order_id, request.amount, request.currency
        );
        Ok(PaymentOutcome::Approved {
            reference: format!("sim-{}", Uuid::new_v4()),
        })
    }

    async fn refund(&self, reference: &str, amount: i64) -> Result<(), PaymentError> {
        info!("Simulated refund: reference={}, amount={}", reference, amount);
        self.refunds
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(reference.to_string());
        Ok(())
    }
}

/// Состояния выключателя.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CircuitState {
    /// Запросы идут к шлюзу.
    Closed,
    /// Порог сбоев достигнут, запросы блокируются до таймаута.
    Open,
    /// Таймаут прошел, пропускаем пробный запрос.
    HalfOpen,
}

#[derive(Debug)]
pub struct CircuitBreaker {
    state: RwLock<CircuitState>,
    failure_count: AtomicU32,
    opened_at: Mutex<Option<Instant>>,
    failure_threshold: u32,
    timeout: Duration,
}

impl CircuitBreaker {
    pub fn new(failure_threshold: u32, timeout: Duration) -> Self {
        Self {
            state: RwLock::new(CircuitState::Closed),
            failure_count: AtomicU32::new(0),
            opened_at: Mutex::new(None),
            failure_threshold: failure_threshold.max(1),
            timeout,
        }
    }

    pub fn can_execute(&self) -> bool {
        let state = *self.state.read().unwrap_or_else(PoisonError::into_inner);
        match state {
            CircuitState::Closed | CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let elapsed = self
                    .opened_at
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .map(|at| at.elapsed());
                if elapsed.map_or(true, |e| e >= self.timeout) {
                    *self.state.write().unwrap_or_else(PoisonError::into_inner) = CircuitState::HalfOpen;
                    info!("Circuit breaker transitioning to HalfOpen state");
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn record_success(&self) {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if *state == CircuitState::HalfOpen {
            info!("Circuit breaker recovered - transitioning to Closed state");
        }
        *state = CircuitState::Closed;
        self.failure_count.store(0, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        let failures = self.failure_count.fetch_add(1, Ordering::Relaxed) + 1;
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let open = match *state {
            CircuitState::Closed => failures >= self.failure_threshold,
            // Пробный запрос провалился
            CircuitState::HalfOpen => true,
            CircuitState::Open => false,
        };
        if open {
            *state = CircuitState::Open;
            *self.opened_at.lock().unwrap_or_else(PoisonError::into_inner) = Some(Instant::now());
            error!(
                "Circuit breaker OPENED - {} failures, threshold {}",
                failures, self.failure_threshold
            );
        }
    }

    pub fn state(&self) -> CircuitState {
        *self.state.read().unwrap_or_else(PoisonError::into_inner)
    }
}

// --- Модели API платежного шлюза ---

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInitRequest<'a> {
    team_slug: &'a str,
    token: String,
    amount: i64,
    order_id: &'a str,
    currency: &'a str,
    description: &'a str,
    email: Option<&'a str>,
    language: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PaymentInitResponse {
    success: bool,
    payment_id: Option<String>,
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentConfirmRequest<'a> {
    team_slug: &'a str,
    token: String,
    payment_id: &'a str,
    amount: i64,
    currency: &'a str,
    order_id: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PaymentCancelRequest<'a> {
    team_slug: &'a str,
    token: String,
    payment_id: &'a str,
    amount: i64,
}

#[derive(Debug, Deserialize)]
struct GatewayAck {
    success: bool,
    message: Option<String>,
}

/// Клиент хостового платежного шлюза: init, затем confirm.
pub struct GatewayPayments {
    team_slug: String,
    password: String,
    base_url: String,
    http_client: reqwest::Client,
    circuit_breaker: CircuitBreaker,
}

impl GatewayPayments {
    pub fn from_config(
        config: &PaymentConfig,
        breaker: &CircuitBreakerConfig,
    ) -> Result<Self, PaymentError> {
        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| PaymentError::Gateway(e.to_string()))?;

        Ok(Self {
            team_slug: config.merchant_id.clone(),
            password: config.merchant_password.clone(),
            base_url: config.gateway_url.trim_end_matches('/').to_string(),
            http_client,
            circuit_breaker: CircuitBreaker::new(
                breaker.failure_threshold,
                Duration::from_secs(breaker.timeout_seconds),
            ),
        })
    }

    pub fn circuit_state(&self) -> CircuitState {
        self.circuit_breaker.state()
    }

    fn amount_token(&self, amount: i64, currency: &str, order_id: &str) -> String {
        sha256_hex(&format!(
            "{}{}{}{}{}",
            amount, currency, order_id, self.password, self.team_slug
        ))
    }

    fn payment_token(&self, payment_id: &str) -> String {
        sha256_hex(&format!("{}{}{}", payment_id, self.password, self.team_slug))
    }

    /// POST через выключатель. Сетевые сбои и 5xx считаются отказом шлюза.
    async fn post<B: Serialize, R: for<'de> Deserialize<'de>>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<R, PaymentError> {
        if !self.circuit_breaker.can_execute() {
            warn!("Circuit breaker is OPEN - blocking payment gateway request");
            return Err(PaymentError::CircuitOpen);
        }

        let result = async {
            self.http_client
                .post(format!("{}{}", self.base_url, path))
                .json(body)
                .send()
                .await?
                .error_for_status()?
                .json::<R>()
                .await
        }
        .await;

        match result {
            Ok(response) => {
                self.circuit_breaker.record_success();
                Ok(response)
            }
            Err(e) => {
                error!("Payment gateway request to {} failed: {}", path, e);
                self.circuit_breaker.record_failure();
                Err(PaymentError::Gateway(e.to_string()))
            }
        }
    }

    /// Закрывает созданный, но не подтвержденный платеж.
    async fn abandon(&self, payment_id: &str, amount: i64) {
        if let Err(e) = self.refund(payment_id, amount).await {
            warn!("Failed to cancel unconfirmed payment {}: {}", payment_id, e);
        }
    }
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())
}

#[async_trait]
impl PaymentProcessor for GatewayPayments {
    async fn authorize(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError> {
        info!(
            "Creating gateway payment: order={}, amount={} {}",
            request.order_id, request.amount, request.currency
        );

        let init: PaymentInitResponse = self
            .post(
                "/api/v1/PaymentInit/init",
                &PaymentInitRequest {
                    team_slug: &self.team_slug,
                    token: self.amount_token(request.amount, &request.currency, &request.order_id),
                    amount: request.amount,
                    order_id: &request.order_id,
                    currency: &request.currency,
                    description: &request.description,
                    email: request.email.as_deref(),
                    language: "da",
                },
            )
            .await?;

        let payment_id = match (init.success, init.payment_id) {
            (true, Some(id)) => id,
            (_, _) => {
                let reason = init.message.unwrap_or_else(|| "payment was not created".into());
                warn!("Gateway refused payment for order {}: {}", request.order_id, reason);
                return Ok(PaymentOutcome::Declined { reason });
            }
        };

        let confirm: Result<GatewayAck, PaymentError> = self
            .post(
                "/api/v1/PaymentConfirm/confirm",
                &PaymentConfirmRequest {
                    team_slug: &self.team_slug,
                    token: self.amount_token(request.amount, &request.currency, &request.order_id),
                    payment_id: &payment_id,
                    amount: request.amount,
                    currency: &request.currency,
                    order_id: &request.order_id,
                },
            )
            .await;

        match confirm {
            Ok(ack) if ack.success => {
                info!("Payment {} confirmed for order {}", payment_id, request.order_id);
                Ok(PaymentOutcome::Approved { reference: payment_id })
            }
            Ok(ack) => {
                self.abandon(&payment_id, request.amount).await;
                Ok(PaymentOutcome::Declined {
                    reason: ack.message.unwrap_or_else(|| "payment was not confirmed".into()),
                })
            }
            Err(e) => {
                self.abandon(&payment_id, request.amount).await;
                Err(e)
            }
        }
    }

    async fn refund(&self, reference: &str, amount: i64) -> Result<(), PaymentError> {
        let ack: GatewayAck = self
            .post(
                "/api/v1/PaymentCancel/cancel",
                &PaymentCancelRequest {
                    team_slug: &self.team_slug,
                    token: self.payment_token(reference),
                    payment_id: reference,
                    amount,
                },
            )
            .await?;
        if ack.success {
            info!("Payment {} refunded", reference);
            Ok(())
        } else {
            Err(PaymentError::Gateway(
                ack.message.unwrap_or_else(|| "refund rejected".into()),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn card() -> CardDetails {
        CardDetails {
            card_number: "4111 1111 1111 1111".into(),
            expiry_date: "12/29".into(),
            cvv: "123".into(),
            cardholder_name: "Karen Blixen".into(),
        }
    }

    fn request() -> PaymentRequest {
        PaymentRequest {
            order_id: "order-1".into(),
            amount: 200,
            currency: "DKK".into(),
            description: "2 tickets".into(),
            email: None,
            card: card(),
        }
    }

    fn gateway(url: &str, threshold: u32) -> GatewayPayments {
        let config = PaymentConfig {
            provider: crate::config::PaymentProvider::Gateway,
            merchant_id: "malling".into(),
            merchant_password: "secret".into(),
            gateway_url: url.to_string(),
            currency: "DKK".into(),
        };
        let breaker = CircuitBreakerConfig {
            failure_threshold: threshold,
            timeout_seconds: 60,
        };
        GatewayPayments::from_config(&config, &breaker).unwrap()
    }

    #[test]
    fn card_validation_and_masking() {
        assert!(card().validate().is_ok());

        let mut bad = card();
        bad.expiry_date = "13/29".into();
        assert!(bad.validate().is_err());

        let debug = format!("{:?}", card());
        assert!(debug.contains("****1111"));
        assert!(!debug.contains("4111 1111"));
    }

    #[test]
    fn breaker_opens_at_threshold_and_half_opens_after_timeout() {
        let breaker = CircuitBreaker::new(2, Duration::ZERO);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Closed);
        breaker.record_failure();
        assert_eq!(breaker.state(), CircuitState::Open);

        assert!(breaker.can_execute());
        assert_eq!(breaker.state(), CircuitState::HalfOpen);
        breaker.record_success();
        assert_eq!(breaker.state(), CircuitState::Closed);

        let slow = CircuitBreaker::new(1, Duration::from_secs(60));
        slow.record_failure();
        assert!(!slow.can_execute());
    }

    #[tokio::test]
    async fn gateway_init_then_confirm_approves() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/PaymentInit/init"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "paymentId": "pay-42"
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/PaymentConfirm/confirm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = gateway(&server.uri(), 3).authorize(&request()).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Approved { reference: "pay-42".into() });
    }

    #[tokio::test]
    async fn gateway_refusal_is_a_decline() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/PaymentInit/init"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "message": "insufficient funds"
            })))
            .mount(&server)
            .await;

        let outcome = gateway(&server.uri(), 3).authorize(&request()).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Declined { reason: "insufficient funds".into() });
    }

    #[tokio::test]
    async fn unconfirmed_payment_is_cancelled() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/PaymentInit/init"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "paymentId": "pay-7"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/PaymentConfirm/confirm"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "message": "3-D Secure failed"
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/api/v1/PaymentCancel/cancel"))
            .and(body_partial_json(serde_json::json!({ "paymentId": "pay-7", "amount": 200 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let outcome = gateway(&server.uri(), 3).authorize(&request()).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Declined { reason: "3-D Secure failed".into() });
    }

    #[tokio::test]
    async fn repeated_gateway_failures_open_the_circuit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let client = gateway(&server.uri(), 2);
        assert!(matches!(client.authorize(&request()).await, Err(PaymentError::Gateway(_))));
        assert!(matches!(client.authorize(&request()).await, Err(PaymentError::Gateway(_))));
        assert!(matches!(client.authorize(&request()).await, Err(PaymentError::CircuitOpen)));
        assert_eq!(client.circuit_state(), CircuitState::Open);
    }
}
