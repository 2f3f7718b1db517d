//! The narrow client seam the harness drives its load through.
//!
//! This mirrors the surface of the TLSRPT reporting client library: open a
//! connection, build a delivery request out of policy blocks and failure
//! records, submit it, and classify the outcome. The datagram payload uses
//! the collector's compact JSON schema, but faithfully reimplementing the
//! report wire format is explicitly not a goal of this crate — the payload
//! builder exists only so the harness has something real to send.

use serde_json::{Value, json};

mod socket;

pub use self::socket::{ConnectionMode, SocketClient};

/// Well-known socket path of a locally running TLSRPT collector.
pub const DEFAULT_SOCKET_PATH: &str = "/tmp/tlsrpt-receiver.socket";

/// Outcome of a send attempt, split into the two classes the harness
/// reports differently: errors raised by this library itself versus errors
/// mapped from an OS errno.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The delivery request cannot be turned into a datagram.
    #[error("malformed delivery request: {0}")]
    Malformed(&'static str),

    #[error("failed to encode report payload: {0}")]
    Encode(#[from] serde_json::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl ClientError {
    /// Whether this is an internal library error rather than one derived
    /// from an OS errno.
    pub fn is_internal(&self) -> bool {
        !matches!(self, Self::Io(_))
    }

    /// The raw errno for OS-derived errors.
    pub fn os_error(&self) -> Option<i32> {
        match self {
            Self::Io(err) => err.raw_os_error(),
            _ => None,
        }
    }
}

/// What the core consumes: deliver one report datagram to the endpoint.
///
/// Implementations are shared across the calibrator, every background worker
/// and the burst loop, so submission takes `&self`.
pub trait ReportClient: Send + Sync {
    fn submit(&self, report: &DeliveryRequest) -> Result<(), ClientError>;
}

/// Policy kinds defined by the collector protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyType {
    Tlsa,
    Sts,
    NoPolicyFound,
}

impl PolicyType {
    pub(crate) fn code(self) -> u8 {
        match self {
            Self::Tlsa => 1,
            Self::Sts => 2,
            Self::NoPolicyFound => 9,
        }
    }
}

/// RFC 8460 result types, carried as the collector's numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    StartTlsNotSupported,
    CertificateHostMismatch,
    CertificateNotTrusted,
    CertificateExpired,
    ValidationFailure,
    StsPolicyFetchError,
    StsPolicyInvalid,
    StsWebpkiInvalid,
    TlsaInvalid,
    DnssecInvalid,
    DaneRequired,
}

impl FailureKind {
    pub(crate) fn code(self) -> u16 {
        match self {
            Self::StartTlsNotSupported => 201,
            Self::CertificateHostMismatch => 202,
            Self::CertificateNotTrusted => 203,
            Self::CertificateExpired => 204,
            Self::ValidationFailure => 205,
            Self::StsPolicyFetchError => 301,
            Self::StsPolicyInvalid => 302,
            Self::StsWebpkiInvalid => 303,
            Self::TlsaInvalid => 304,
            Self::DnssecInvalid => 305,
            Self::DaneRequired => 306,
        }
    }
}

/// Compliance verdict a policy block is finalized with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinalResult {
    Success,
    Failure,
}

impl FinalResult {
    fn failed_flag(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::Failure => 1,
        }
    }
}

/// One structured failure record inside a policy block.
#[derive(Debug, Clone)]
pub struct FailureDetail {
    pub result_type: FailureKind,
    pub sending_mta_ip: String,
    pub receiving_mx_hostname: Option<String>,
    pub receiving_mx_helo: Option<String>,
    pub receiving_ip: String,
    pub additional_information: String,
    pub failure_reason_code: String,
}

impl FailureDetail {
    fn to_wire(&self) -> Value {
        let mut obj = json!({
            "c": self.result_type.code(),
            "s": self.sending_mta_ip,
            "r": self.receiving_ip,
            "a": self.additional_information,
            "f": self.failure_reason_code,
        });
        if let Some(hostname) = &self.receiving_mx_hostname {
            obj["n"] = json!(hostname);
        }
        if let Some(helo) = &self.receiving_mx_helo {
            obj["h"] = json!(helo);
        }
        obj
    }
}

/// One unit of a reported compliance check.
#[derive(Debug, Clone)]
pub struct PolicyBlock {
    policy_type: PolicyType,
    policy_domain: Option<String>,
    policy_strings: Vec<String>,
    mx_host_patterns: Vec<String>,
    failures: Vec<FailureDetail>,
    verdict: FinalResult,
}

impl PolicyBlock {
    pub fn new(policy_type: PolicyType, policy_domain: Option<&str>) -> Self {
        Self {
            policy_type,
            policy_domain: policy_domain.map(str::to_owned),
            policy_strings: Vec::new(),
            mx_host_patterns: Vec::new(),
            failures: Vec::new(),
            verdict: FinalResult::Success,
        }
    }

    /// Append one free-form policy description line.
    pub fn policy_string(mut self, line: &str) -> Self {
        self.policy_strings.push(line.to_owned());
        self
    }

    pub fn mx_host_pattern(mut self, pattern: &str) -> Self {
        self.mx_host_patterns.push(pattern.to_owned());
        self
    }

    pub fn failure(mut self, detail: FailureDetail) -> Self {
        self.failures.push(detail);
        self
    }

    /// Finalize the block with its compliance verdict.
    pub fn finish(mut self, verdict: FinalResult) -> Self {
        self.verdict = verdict;
        self
    }

    pub fn policy_type(&self) -> PolicyType {
        self.policy_type
    }

    fn to_wire(&self) -> Value {
        let mut obj = json!({
            "policy-type": self.policy_type.code(),
            "policy-string": self.policy_strings,
            "mx-host-pattern": self.mx_host_patterns,
            "f": self.verdict.failed_flag(),
            "t": self.failures.len(),
            "failure-details": self.failures.iter().map(FailureDetail::to_wire).collect::<Vec<_>>(),
        });
        if let Some(domain) = &self.policy_domain {
            obj["policy-domain"] = json!(domain);
        }
        obj
    }
}

/// One report transaction: the reported domain, its TLSRPT DNS record, and
/// the policy blocks observed for it.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    domain: String,
    record: String,
    policies: Vec<PolicyBlock>,
}

impl DeliveryRequest {
    pub fn new(domain: impl Into<String>, record: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            record: record.into(),
            policies: Vec::new(),
        }
    }

    pub fn push_policy(&mut self, policy: PolicyBlock) {
        self.policies.push(policy);
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    pub fn policies(&self) -> &[PolicyBlock] {
        &self.policies
    }

    /// Encode into the collector's datagram payload.
    pub fn to_wire(&self) -> Result<Vec<u8>, ClientError> {
        if self.policies.is_empty() {
            return Err(ClientError::Malformed("delivery request carries no policy blocks"));
        }
        let datagram = json!({
            "d": self.domain,
            "pr": self.record,
            "policies": self.policies.iter().map(PolicyBlock::to_wire).collect::<Vec<_>>(),
        });
        Ok(serde_json::to_vec(&datagram)?)
    }
}
