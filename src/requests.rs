//! Deterministic synthetic report workload.
//!
//! Request index `i` fully determines the generated delivery request: the
//! reported domain, which of the four policy-block templates are attached,
//! and the compliance verdict. No randomness, so runs are reproducible and
//! the collector sees a stable mix of payload shapes and sizes.

use crate::client::{
    DeliveryRequest, FailureDetail, FailureKind, FinalResult, PolicyBlock, PolicyType,
};

/// TLSRPT policy-discovery record attached to every synthetic request.
pub const POLICY_RECORD: &str = "v=TLSRPTv1;rua=mailto:reports@example.com";

pub struct ReportSynthesizer {
    domains: u64,
    force_policy: u8,
}

impl ReportSynthesizer {
    /// `domains` is the number of distinct reported domains to cycle
    /// through; `force_policy` is 0 for a varying policy mix, or a 1–15
    /// bitmask selecting a fixed set of the four templates.
    pub fn new(domains: u32, force_policy: u8) -> Self {
        Self {
            domains: u64::from(domains.max(1)),
            force_policy: force_policy & 0xF,
        }
    }

    /// Request `i` reports on `test-(i mod domains).example.com`.
    pub fn domain(&self, i: u64) -> String {
        format!("test-{}.example.com", i % self.domains)
    }

    /// Which of the four policy templates request `i` carries. In varying
    /// mode this is the low four bits of `i`, nudged by one whenever that
    /// would come out empty, so every request carries at least one block.
    fn policy_mask(&self, i: u64) -> u8 {
        if self.force_policy != 0 {
            self.force_policy
        } else {
            ((i + u64::from(i % 16 == 0)) & 0xF) as u8
        }
    }

    fn verdict(i: u64) -> FinalResult {
        if (i / 16) % 2 == 0 {
            FinalResult::Success
        } else {
            FinalResult::Failure
        }
    }

    pub fn build(&self, i: u64) -> DeliveryRequest {
        let mut req = DeliveryRequest::new(self.domain(i), POLICY_RECORD);
        let mask = self.policy_mask(i);
        let verdict = Self::verdict(i);

        if mask & 1 != 0 {
            req.push_policy(sts_policy(verdict));
        }
        if mask & 2 != 0 {
            req.push_policy(tlsa_policy(verdict));
        }
        if mask & 4 != 0 {
            req.push_policy(no_policy_found(verdict));
        }
        if mask & 8 != 0 {
            req.push_policy(sts_policy_without_failures(verdict));
        }
        req
    }
}

fn sts_failure(kind: FailureKind, sending_mta_ip: &str, receiving_ip: &str) -> FailureDetail {
    FailureDetail {
        result_type: kind,
        sending_mta_ip: sending_mta_ip.to_owned(),
        receiving_mx_hostname: Some("mailin.example.com".to_owned()),
        receiving_mx_helo: Some("test-ehlo.example.com".to_owned()),
        receiving_ip: receiving_ip.to_owned(),
        additional_information: "This is additional information".to_owned(),
        failure_reason_code: "999 TEST ERROR".to_owned(),
    }
}

fn sts_policy(verdict: FinalResult) -> PolicyBlock {
    PolicyBlock::new(PolicyType::Sts, Some("company-y.example"))
        .policy_string("version: STSv1")
        .policy_string("mode: testing")
        .policy_string("mx: *.mail.company-y.example")
        .policy_string("max_age: 86400")
        .mx_host_pattern("*.mail.company-y.example")
        .failure(sts_failure(FailureKind::StsPolicyInvalid, "1.2.3.4", "11.22.33.44"))
        .failure(sts_failure(FailureKind::StsWebpkiInvalid, "1.2.3.5", "11.22.33.55"))
        .finish(verdict)
}

fn tlsa_policy(verdict: FinalResult) -> PolicyBlock {
    PolicyBlock::new(PolicyType::Tlsa, Some("company-y.example"))
        .policy_string("3 0 1 1F850A337E6DB9C609C522D136A475638CC43E1ED424F8EEC8513D747D1D085D")
        .policy_string("3 0 1 12350A337E6DB9C6123522D136A475638CC43E1ED424F8EEC8513D747D1D1234")
        .failure(sts_failure(FailureKind::CertificateExpired, "1.2.3.4", "11.22.33.55"))
        .finish(verdict)
}

fn no_policy_found(verdict: FinalResult) -> PolicyBlock {
    PolicyBlock::new(PolicyType::NoPolicyFound, None)
        .failure(FailureDetail {
            result_type: FailureKind::ValidationFailure,
            sending_mta_ip: "192.168.25.25".to_owned(),
            receiving_mx_hostname: None,
            receiving_mx_helo: None,
            receiving_ip: "11.22.33.55".to_owned(),
            additional_information: "Something unexpected happened".to_owned(),
            failure_reason_code: "http://www.google.com/".to_owned(),
        })
        .finish(verdict)
}

fn sts_policy_without_failures(verdict: FinalResult) -> PolicyBlock {
    PolicyBlock::new(PolicyType::Sts, Some("company-y.example"))
        .policy_string("version: STSv1")
        .policy_string("mode: testing and will contain no failures")
        .policy_string("mx: *.mail.company-y.example")
        .policy_string("max_age: 86400")
        .mx_host_pattern("*.mail.company-y.example")
        .finish(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{ReportClient, stub::StubClient};

    #[test]
    fn domain_selection_is_deterministic() {
        let synth = ReportSynthesizer::new(1000, 0);
        assert_eq!(synth.domain(0), "test-0.example.com");
        assert_eq!(synth.domain(999), "test-999.example.com");
        assert_eq!(synth.domain(1000), "test-0.example.com");
        assert_eq!(synth.domain(2503), "test-503.example.com");
    }

    #[test]
    fn varying_mix_never_builds_an_empty_request() {
        let synth = ReportSynthesizer::new(10, 0);
        for i in 0..256 {
            assert!(!synth.build(i).policies().is_empty(), "request {i} is empty");
        }
    }

    #[test]
    fn varying_mix_follows_the_index_bits() {
        let synth = ReportSynthesizer::new(10, 0);
        // i = 5 -> bits 1 and 4: the STS and no-policy-found templates.
        let req = synth.build(5);
        let types: Vec<_> = req.policies().iter().map(|p| p.policy_type()).collect();
        assert_eq!(types, vec![PolicyType::Sts, PolicyType::NoPolicyFound]);
        // Multiples of 16 are nudged to the first template.
        assert_eq!(synth.build(16).policies().len(), 1);
    }

    #[test]
    fn verdict_alternates_every_sixteen_requests() {
        assert_eq!(ReportSynthesizer::verdict(0), crate::client::FinalResult::Success);
        assert_eq!(ReportSynthesizer::verdict(15), crate::client::FinalResult::Success);
        assert_eq!(ReportSynthesizer::verdict(16), crate::client::FinalResult::Failure);
        assert_eq!(ReportSynthesizer::verdict(31), crate::client::FinalResult::Failure);
        assert_eq!(ReportSynthesizer::verdict(32), crate::client::FinalResult::Success);
    }

    #[test]
    fn single_domain_forced_policy_end_to_end() {
        // One domain, only the first policy bit set, a transport that always
        // succeeds: 100 consecutive sends target the same domain and build
        // only the STS template.
        let synth = ReportSynthesizer::new(1, 1);
        let client = StubClient::ok();
        for i in 0..100 {
            let req = synth.build(i);
            assert_eq!(req.policies().len(), 1);
            assert_eq!(req.policies()[0].policy_type(), PolicyType::Sts);
            client.submit(&req).unwrap();
        }
        assert_eq!(client.calls(), 100);
        let domains = client.seen_domains.lock();
        assert!(domains.iter().all(|d| d == "test-0.example.com"));
    }
}
