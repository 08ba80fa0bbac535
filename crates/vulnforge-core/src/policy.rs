use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::finding::{NormalizedDataset, RiskMetrics, Severity};

/// How a policy document came to exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationMethod {
    Llm,
    Fallback,
}

/// One remediation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Policy {
    pub id: String,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub priority: Option<Severity>,
    #[serde(default)]
    pub actions: Vec<String>,
    #[serde(default)]
    pub affected_components: Vec<String>,
    #[serde(default)]
    pub sla: Option<String>,
}

/// Structured remediation policy produced by a model backend or by the
/// fallback generator. `policies` is non-empty in every terminal state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyDocument {
    pub model_id: String,
    pub generation_method: GenerationMethod,
    /// 0–100, assigned by the quality evaluator.
    pub quality_score: f64,
    pub response_time_secs: f64,
    pub policies: Vec<Policy>,
    pub recommendations: Vec<String>,
}

/// Per-model metrics recorded in the comparison.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ModelMetrics {
    pub quality_score: f64,
    pub response_time_secs: f64,
    pub policy_count: usize,
    pub recommendation_count: usize,
}

/// Outcome of racing two model backends against the same input.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelComparisonResult {
    pub per_model_metrics: BTreeMap<String, ModelMetrics>,
    pub winner: String,
    pub rationale: String,
}

/// The `{policies, recommendations}` payload models are asked to emit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PolicyPayload {
    #[serde(default)]
    pub policies: Vec<Policy>,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl PolicyPayload {
    pub fn is_empty(&self) -> bool {
        self.policies.is_empty() && self.recommendations.is_empty()
    }
}

/// Best-effort extraction of a policy payload from a model response.
///
/// Models are instructed to return strict JSON but frequently wrap it in
/// prose. First locate a JSON object between the outermost braces; if that
/// fails, fall back to line-oriented bullet parsing. Returns `None` when
/// nothing policy-shaped is present.
pub fn extract_policy_payload(text: &str) -> Option<PolicyPayload> {
    if let Some(payload) = extract_json_object(text) {
        if !payload.is_empty() {
            return Some(payload);
        }
    }
    let payload = extract_bullets(text);
    if payload.is_empty() {
        debug!("response contained no policy-shaped content");
        None
    } else {
        Some(payload)
    }
}

fn extract_json_object(text: &str) -> Option<PolicyPayload> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&text[start..=end]).ok()
}

fn extract_bullets(text: &str) -> PolicyPayload {
    #[derive(PartialEq)]
    enum Section {
        None,
        Policies,
        Recommendations,
    }

    let mut payload = PolicyPayload::default();
    let mut section = Section::None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let lower = line.to_lowercase();
        if let Some(content) = strip_bullet(line) {
            match section {
                Section::Recommendations => payload.recommendations.push(content.to_string()),
                Section::Policies if content.len() > 20 => {
                    let priority = if lower.contains("critical")
                        || lower.contains("immediate")
                        || lower.contains("urgent")
                    {
                        Some(Severity::High)
                    } else {
                        Some(Severity::Medium)
                    };
                    payload.policies.push(Policy {
                        id: format!("POLICY-{:03}", payload.policies.len() + 1),
                        title: content.chars().take(100).collect(),
                        description: content.to_string(),
                        priority,
                        actions: vec![content.to_string()],
                        affected_components: Vec::new(),
                        sla: None,
                    });
                }
                _ => {}
            }
        } else if lower.contains("recommendation") || lower.contains("suggest") {
            section = Section::Recommendations;
        } else if lower.contains("polic") || lower.contains("remediation") {
            section = Section::Policies;
        }
    }

    payload
}

fn strip_bullet(line: &str) -> Option<&str> {
    let rest = line
        .strip_prefix("- ")
        .or_else(|| line.strip_prefix("* "))
        .or_else(|| line.strip_prefix("• "))
        .or_else(|| {
            line.split_once(". ")
                .filter(|(num, _)| num.chars().all(|c| c.is_ascii_digit()) && !num.is_empty())
                .map(|(_, rest)| rest)
        })?;
    let rest = rest.trim();
    (!rest.is_empty()).then_some(rest)
}

/// Deterministic rule-based fallback: synthesizes a minimal but valid policy
/// document directly from the risk metrics when every model attempt is
/// exhausted. Emits one policy per severity tier present, category-specific
/// hygiene policies, and a baseline policy when the dataset is empty, so
/// `policies` is never empty.
pub fn fallback_payload(
    metrics: &RiskMetrics,
    by_category: &BTreeMap<String, usize>,
) -> PolicyPayload {
    let mut policies = Vec::new();

    if metrics.critical > 0 {
        policies.push(Policy {
            id: String::new(),
            title: "Immediate critical vulnerability remediation".into(),
            description: format!(
                "Address all {} CRITICAL severity vulnerabilities within 24 hours.",
                metrics.critical
            ),
            priority: Some(Severity::Critical),
            actions: vec![
                "Review all CRITICAL findings with the security team".into(),
                "Create emergency remediation tickets with P0 priority".into(),
                "Deploy security patches immediately".into(),
                "Verify fixes with a re-scan within 24 hours".into(),
            ],
            affected_components: Vec::new(),
            sla: Some("24 hours".into()),
        });
    }
    if metrics.high > 0 {
        policies.push(Policy {
            id: String::new(),
            title: "High severity vulnerability management".into(),
            description: format!(
                "Remediate {} HIGH severity vulnerabilities within 72 hours.",
                metrics.high
            ),
            priority: Some(Severity::High),
            actions: vec![
                "Prioritize HIGH vulnerabilities by exploitability".into(),
                "Assign remediation tasks to the owning team".into(),
                "Test patches in staging before rollout".into(),
                "Deploy fixes within the 72-hour SLA".into(),
            ],
            affected_components: Vec::new(),
            sla: Some("72 hours".into()),
        });
    }
    if metrics.medium > 0 || metrics.low > 0 {
        policies.push(Policy {
            id: String::new(),
            title: "Scheduled remediation of lower-severity findings".into(),
            description: format!(
                "Fold {} MEDIUM and {} LOW severity findings into the next \
                 maintenance cycle.",
                metrics.medium, metrics.low
            ),
            priority: Some(Severity::Medium),
            actions: vec![
                "Batch lower-severity fixes into the regular release train".into(),
                "Track residual risk in the vulnerability register".into(),
            ],
            affected_components: Vec::new(),
            sla: Some("30 days".into()),
        });
    }

    for (category, count) in by_category {
        if let Some(policy) = category_policy(category, *count) {
            policies.push(policy);
        }
    }

    if policies.is_empty() {
        // Empty dataset still yields a valid non-empty document.
        policies.push(Policy {
            id: String::new(),
            title: "Maintain security scanning baseline".into(),
            description: "No findings were reported; keep the scanning \
                          pipeline active to preserve this posture."
                .into(),
            priority: Some(Severity::Low),
            actions: vec![
                "Keep all scanners enabled as mandatory CI gates".into(),
                "Review scanner coverage quarterly".into(),
            ],
            affected_components: Vec::new(),
            sla: Some("90 days".into()),
        });
    }

    for (idx, policy) in policies.iter_mut().enumerate() {
        policy.id = format!("POLICY-{:03}", idx + 1);
    }

    let mut recommendations = vec![
        "Integrate security scanning in the CI/CD pipeline as a mandatory gate".to_string(),
        "Establish a security incident response procedure".to_string(),
        "Schedule periodic security audits and penetration tests".to_string(),
        "Enable automated dependency update monitoring".to_string(),
        "Maintain security runbooks for the remediation SLAs above".to_string(),
    ];
    if metrics.critical > 0 || metrics.high > 10 {
        recommendations.insert(
            0,
            "URGENT: immediate security review required, critical-risk findings detected"
                .to_string(),
        );
    }

    PolicyPayload {
        policies,
        recommendations,
    }
}

fn category_policy(category: &str, count: usize) -> Option<Policy> {
    let (title, actions): (String, Vec<String>) = match category {
        "dependency" => (
            "Dependency security update strategy".into(),
            vec![
                "Update all packages with known CVEs".into(),
                "Enable automated dependency vulnerability scanning".into(),
                "Pin dependency versions after verification".into(),
            ],
        ),
        "container" => (
            "Container image hardening".into(),
            vec![
                "Use minimal, current base images".into(),
                "Run containers as a non-root user".into(),
                "Rescan images before every deployment".into(),
            ],
        ),
        "secrets" => (
            "Credential hygiene and rotation".into(),
            vec![
                "Rotate every exposed credential immediately".into(),
                "Move secrets to a managed secret store".into(),
                "Enable pre-commit secret scanning".into(),
            ],
        ),
        "static-analysis" => (
            "Secure code development practices".into(),
            vec![
                "Address code-level findings flagged by static analysis".into(),
                "Enable security linters in pre-commit hooks".into(),
                "Require security review for affected modules".into(),
            ],
        ),
        "dynamic" => (
            "Web application security hardening".into(),
            vec![
                "Remediate issues found by dynamic testing".into(),
                "Set missing security response headers".into(),
                "Re-run dynamic scans against staging after fixes".into(),
            ],
        ),
        _ => return None,
    };
    Some(Policy {
        id: String::new(),
        title,
        description: format!("Address {count} findings in the {category} category."),
        priority: Some(Severity::Medium),
        actions,
        affected_components: vec![category.to_string()],
        sla: None,
    })
}

/// Wrap a fallback payload into a complete document for the given model slot.
pub fn fallback_document(
    model_id: &str,
    dataset: &NormalizedDataset,
    response_time_secs: f64,
) -> PolicyDocument {
    let payload = fallback_payload(&dataset.risk_metrics, &dataset.by_category);
    PolicyDocument {
        model_id: model_id.to_string(),
        generation_method: GenerationMethod::Fallback,
        quality_score: 0.0,
        response_time_secs,
        policies: payload.policies,
        recommendations: payload.recommendations,
    }
}
