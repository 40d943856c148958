//! Client-side service config model
//!
//! This is the view of a service config that configures a real client
//! connection. Parsing follows the gRPC client's acceptance rules: unknown
//! fields are ignored, but every field the client understands must be
//! well-formed, and the policies it carries must be internally consistent.
//! Keys are matched regardless of case and a `null` config is empty, as gRPC
//! clients decode configs with Go's `encoding/json`.

use crate::keys;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;
use std::time::Duration;
use thiserror::Error;
use tonic::transport::Endpoint;
use tonic::Code;

/// Upper bound on retry attempts enforced by gRPC clients
const MAX_RETRY_ATTEMPTS: u32 = 5;

/// Largest duration representable by `google.protobuf.Duration`
const MAX_DURATION_SECONDS: u64 = 315_576_000_000;

const NANOS_PER_SECOND: i128 = 1_000_000_000;

const FIELDS: &[&str] = &[
    "loadBalancingPolicy",
    "loadBalancingConfig",
    "methodConfig",
    "retryThrottling",
    "healthCheckConfig",
    "name",
    "service",
    "method",
    "waitForReady",
    "timeout",
    "maxRequestMessageBytes",
    "maxResponseMessageBytes",
    "retryPolicy",
    "maxAttempts",
    "initialBackoff",
    "maxBackoff",
    "backoffMultiplier",
    "retryableStatusCodes",
    "maxTokens",
    "tokenRatio",
    "serviceName",
];

/// Reasons a client rejects a service config
#[derive(Debug, Error)]
pub enum ServiceConfigError {
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid loadBalancingConfig: {0}")]
    LoadBalancingConfig(String),

    #[error("invalid method config name: cannot combine empty 'service' and nonempty 'method' {0:?}")]
    MethodWithoutService(String),

    #[error("invalid method config: duplicate name {0}")]
    DuplicateName(String),

    #[error("invalid duration {0:?}")]
    Duration(String),

    #[error("invalid retry policy: {0}")]
    RetryPolicy(String),

    #[error("invalid retry throttling policy: {0}")]
    RetryThrottling(String),

    #[error("invalid status code {0}")]
    StatusCode(String),
}

/// Load balancing policies a client can be configured with
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoadBalancingPolicy {
    #[default]
    PickFirst,
    RoundRobin,
}

impl LoadBalancingPolicy {
    fn from_name(name: &str) -> Option<Self> {
        match name {
            "pick_first" => Some(Self::PickFirst),
            "round_robin" => Some(Self::RoundRobin),
            _ => None,
        }
    }
}

/// (service, method) a method config applies to; empty strings are wildcards
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodPath {
    pub service: String,
    pub method: String,
}

impl std::fmt::Display for MethodPath {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "/{}/{}", self.service, self.method)
    }
}

/// Retry policy of a method config
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub backoff_multiplier: f64,
    pub retryable_status_codes: Vec<Code>,
}

/// Client-wide retry throttling
#[derive(Debug, Clone, PartialEq)]
pub struct RetryThrottling {
    pub max_tokens: f64,
    pub token_ratio: f64,
}

/// Per-method policies
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MethodConfig {
    pub names: Vec<MethodPath>,
    pub wait_for_ready: Option<bool>,
    pub timeout: Option<Duration>,
    pub max_request_message_bytes: Option<i64>,
    pub max_response_message_bytes: Option<i64>,
    pub retry_policy: Option<RetryPolicy>,
}

/// A service config as accepted by a gRPC client
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClientServiceConfig {
    pub load_balancing: LoadBalancingPolicy,
    pub method_configs: Vec<MethodConfig>,
    pub retry_throttling: Option<RetryThrottling>,
    pub health_check_service: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawServiceConfig {
    load_balancing_policy: Option<String>,
    load_balancing_config: Option<Vec<Map<String, Value>>>,
    method_config: Option<Vec<RawMethodConfig>>,
    retry_throttling: Option<RawRetryThrottling>,
    health_check_config: Option<RawHealthCheckConfig>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawMethodConfig {
    name: Option<Vec<RawName>>,
    wait_for_ready: Option<bool>,
    timeout: Option<String>,
    max_request_message_bytes: Option<i64>,
    max_response_message_bytes: Option<i64>,
    retry_policy: Option<RawRetryPolicy>,
}

#[derive(Debug, Deserialize)]
struct RawName {
    service: Option<String>,
    method: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRetryPolicy {
    max_attempts: Option<i64>,
    initial_backoff: Option<String>,
    max_backoff: Option<String>,
    backoff_multiplier: Option<f64>,
    retryable_status_codes: Option<Vec<RawStatusCode>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawStatusCode {
    Name(String),
    Number(i64),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawRetryThrottling {
    max_tokens: Option<f64>,
    token_ratio: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHealthCheckConfig {
    service_name: Option<String>,
}

impl ClientServiceConfig {
    /// Parse and validate service config JSON text
    pub fn from_json(text: &str) -> Result<Self, ServiceConfigError> {
        let raw: RawServiceConfig = match keys::parse_object(text.as_bytes(), FIELDS)? {
            Some(value) => serde_json::from_value(value)?,
            None => RawServiceConfig::default(),
        };

        let load_balancing = match raw.load_balancing_config {
            Some(configs) => select_load_balancing_config(&configs)?,
            None => raw
                .load_balancing_policy
                .as_deref()
                .and_then(|name| LoadBalancingPolicy::from_name(&name.to_ascii_lowercase()))
                .unwrap_or_default(),
        };

        let mut seen = HashSet::new();
        let mut method_configs = Vec::new();
        for raw_method in raw.method_config.unwrap_or_default() {
            // Entries without names apply to nothing and are not validated
            if raw_method.name.is_none() {
                continue;
            }
            let method_config = convert_method_config(raw_method)?;
            for path in &method_config.names {
                if !seen.insert(path.clone()) {
                    return Err(ServiceConfigError::DuplicateName(path.to_string()));
                }
            }
            method_configs.push(method_config);
        }

        let retry_throttling = raw
            .retry_throttling
            .map(convert_retry_throttling)
            .transpose()?;

        Ok(Self {
            load_balancing,
            method_configs,
            retry_throttling,
            health_check_service: raw.health_check_config.and_then(|c| c.service_name),
        })
    }

    /// Method config that applies to every method of every service, if any
    pub fn default_method_config(&self) -> Option<&MethodConfig> {
        self.method_configs.iter().find(|config| {
            config
                .names
                .iter()
                .any(|name| name.service.is_empty() && name.method.is_empty())
        })
    }

    /// Configure a client endpoint with the parts of the config it supports
    pub fn apply(&self, endpoint: Endpoint) -> Endpoint {
        match self.default_method_config().and_then(|config| config.timeout) {
            Some(timeout) => endpoint.timeout(timeout),
            None => endpoint,
        }
    }
}

/// Pick the first supported policy of a `loadBalancingConfig` list
fn select_load_balancing_config(
    configs: &[Map<String, Value>],
) -> Result<LoadBalancingPolicy, ServiceConfigError> {
    for config in configs {
        if config.len() != 1 {
            return Err(ServiceConfigError::LoadBalancingConfig(format!(
                "each entry must contain exactly one policy, found {}",
                config.len()
            )));
        }
        if let Some(policy) = config.keys().find_map(|name| LoadBalancingPolicy::from_name(name)) {
            return Ok(policy);
        }
    }

    Err(ServiceConfigError::LoadBalancingConfig(
        "no supported policies found".to_string(),
    ))
}

fn convert_method_config(raw: RawMethodConfig) -> Result<MethodConfig, ServiceConfigError> {
    let names = raw
        .name
        .unwrap_or_default()
        .into_iter()
        .map(|name| {
            let service = name.service.unwrap_or_default();
            let method = name.method.unwrap_or_default();
            if service.is_empty() && !method.is_empty() {
                return Err(ServiceConfigError::MethodWithoutService(method));
            }
            Ok(MethodPath { service, method })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(MethodConfig {
        names,
        wait_for_ready: raw.wait_for_ready,
        timeout: raw.timeout.as_deref().map(parse_duration).transpose()?,
        max_request_message_bytes: raw.max_request_message_bytes,
        max_response_message_bytes: raw.max_response_message_bytes,
        retry_policy: raw.retry_policy.map(convert_retry_policy).transpose()?,
    })
}

fn convert_retry_policy(raw: RawRetryPolicy) -> Result<RetryPolicy, ServiceConfigError> {
    let max_attempts = raw.max_attempts.unwrap_or_default();
    if max_attempts <= 1 {
        return Err(ServiceConfigError::RetryPolicy(format!(
            "maxAttempts must be greater than 1, got {}",
            max_attempts
        )));
    }

    let initial_backoff = required_positive_duration("initialBackoff", raw.initial_backoff)?;
    let max_backoff = required_positive_duration("maxBackoff", raw.max_backoff)?;

    let backoff_multiplier = raw.backoff_multiplier.unwrap_or_default();
    if backoff_multiplier <= 0.0 {
        return Err(ServiceConfigError::RetryPolicy(
            "backoffMultiplier must be greater than 0".to_string(),
        ));
    }

    let retryable_status_codes = raw
        .retryable_status_codes
        .unwrap_or_default()
        .iter()
        .map(parse_status_code)
        .collect::<Result<Vec<_>, _>>()?;
    if retryable_status_codes.is_empty() {
        return Err(ServiceConfigError::RetryPolicy(
            "retryableStatusCodes must not be empty".to_string(),
        ));
    }

    Ok(RetryPolicy {
        max_attempts: u32::try_from(max_attempts)
            .unwrap_or(MAX_RETRY_ATTEMPTS)
            .min(MAX_RETRY_ATTEMPTS),
        initial_backoff,
        max_backoff,
        backoff_multiplier,
        retryable_status_codes,
    })
}

fn required_positive_duration(
    field: &str,
    value: Option<String>,
) -> Result<Duration, ServiceConfigError> {
    let duration = value.as_deref().map(parse_duration).transpose()?;
    match duration {
        Some(d) if !d.is_zero() => Ok(d),
        _ => Err(ServiceConfigError::RetryPolicy(format!(
            "{} must be greater than 0",
            field
        ))),
    }
}

fn convert_retry_throttling(raw: RawRetryThrottling) -> Result<RetryThrottling, ServiceConfigError> {
    let max_tokens = raw.max_tokens.unwrap_or_default();
    if max_tokens <= 0.0 || max_tokens > 1000.0 {
        return Err(ServiceConfigError::RetryThrottling(format!(
            "maxTokens must be in (0, 1000], got {}",
            max_tokens
        )));
    }

    let token_ratio = raw.token_ratio.unwrap_or_default();
    if token_ratio <= 0.0 {
        return Err(ServiceConfigError::RetryThrottling(format!(
            "tokenRatio must be greater than 0, got {}",
            token_ratio
        )));
    }

    Ok(RetryThrottling {
        max_tokens,
        token_ratio,
    })
}

/// Parse a protobuf JSON duration such as "1s", "0.250s" or "-2s"
///
/// Follows the gRPC client: an optional sign, then a whole part, a fraction,
/// or both. The fraction is added to the signed whole part, and negative
/// durations read as zero.
///
/// Examples:
/// - "5s" -> 5s
/// - ".5s" -> 500ms
/// - "1.000000001s" -> 1s 1ns
/// - "-1s" -> 0s
pub fn parse_duration(value: &str) -> Result<Duration, ServiceConfigError> {
    let invalid = || ServiceConfigError::Duration(value.to_string());

    let number = value.strip_suffix('s').ok_or_else(invalid)?;
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() && fraction.is_empty() {
        return Err(invalid());
    }

    let seconds: i64 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    if seconds.unsigned_abs() > MAX_DURATION_SECONDS {
        return Err(invalid());
    }

    let nanos: i64 = match fraction.len() {
        0 => 0,
        len if len <= 9 && fraction.bytes().all(|b| b.is_ascii_digit()) => {
            let digits: i64 = fraction.parse().map_err(|_| invalid())?;
            digits * 10i64.pow(9 - len as u32)
        }
        _ => return Err(invalid()),
    };

    let total = i128::from(seconds) * NANOS_PER_SECOND + i128::from(nanos);
    if total <= 0 {
        return Ok(Duration::ZERO);
    }
    let secs = u64::try_from(total / NANOS_PER_SECOND).map_err(|_| invalid())?;
    let subsec = u32::try_from(total % NANOS_PER_SECOND).map_err(|_| invalid())?;
    Ok(Duration::new(secs, subsec))
}

fn parse_status_code(code: &RawStatusCode) -> Result<Code, ServiceConfigError> {
    match code {
        RawStatusCode::Number(n) if (0..=16).contains(n) => Ok(Code::from_i32(*n as i32)),
        RawStatusCode::Number(n) => Err(ServiceConfigError::StatusCode(n.to_string())),
        RawStatusCode::Name(name) => {
            let code = match name.as_str() {
                "OK" => Code::Ok,
                "CANCELLED" => Code::Cancelled,
                "UNKNOWN" => Code::Unknown,
                "INVALID_ARGUMENT" => Code::InvalidArgument,
                "DEADLINE_EXCEEDED" => Code::DeadlineExceeded,
                "NOT_FOUND" => Code::NotFound,
                "ALREADY_EXISTS" => Code::AlreadyExists,
                "PERMISSION_DENIED" => Code::PermissionDenied,
                "RESOURCE_EXHAUSTED" => Code::ResourceExhausted,
                "FAILED_PRECONDITION" => Code::FailedPrecondition,
                "ABORTED" => Code::Aborted,
                "OUT_OF_RANGE" => Code::OutOfRange,
                "UNIMPLEMENTED" => Code::Unimplemented,
                "INTERNAL" => Code::Internal,
                "UNAVAILABLE" => Code::Unavailable,
                "DATA_LOSS" => Code::DataLoss,
                "UNAUTHENTICATED" => Code::Unauthenticated,
                _ => return Err(ServiceConfigError::StatusCode(format!("{:?}", name))),
            };
            Ok(code)
        }
    }
}
