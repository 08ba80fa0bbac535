use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::finding::{NormalizedDataset, Severity};
use crate::policy::{Policy, PolicyDocument};

/// Blend weights for the three quality axes. Policy defaults, tunable.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityWeights {
    pub specificity: f64,
    pub relevance: f64,
    pub completeness: f64,
}

impl Default for QualityWeights {
    fn default() -> Self {
        Self {
            specificity: 0.30,
            relevance: 0.40,
            completeness: 0.30,
        }
    }
}

/// Per-axis scores (0–100 each) plus the weighted overall score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct QualityBreakdown {
    pub specificity: f64,
    pub relevance: f64,
    pub completeness: f64,
    pub overall: f64,
}

/// Score a policy document against the dataset it was generated from.
/// Pure and deterministic for a fixed `(document, dataset)` pair.
pub fn evaluate(
    document: &PolicyDocument,
    dataset: &NormalizedDataset,
    weights: &QualityWeights,
) -> QualityBreakdown {
    let specificity = specificity_score(document, dataset);
    let relevance = relevance_score(document, dataset);
    let completeness = completeness_score(&document.policies);
    let overall = weights.specificity * specificity
        + weights.relevance * relevance
        + weights.completeness * completeness;
    debug!(
        model = %document.model_id,
        specificity,
        relevance,
        completeness,
        overall,
        "evaluated policy document"
    );
    QualityBreakdown {
        specificity,
        relevance,
        completeness,
        overall,
    }
}

/// Identifiers a policy can cite: finding ids and package/file names.
fn dataset_identifiers(dataset: &NormalizedDataset) -> Vec<String> {
    let mut identifiers = BTreeSet::new();
    for finding in &dataset.findings {
        identifiers.insert(finding.id.to_lowercase());
        if let Some(location) = finding.location() {
            identifiers.insert(location.to_lowercase());
        }
    }
    identifiers.into_iter().collect()
}

fn policy_text(policy: &Policy) -> String {
    let mut text = format!("{} {}", policy.title, policy.description);
    for action in &policy.actions {
        text.push(' ');
        text.push_str(action);
    }
    for component in &policy.affected_components {
        text.push(' ');
        text.push_str(component);
    }
    text.to_lowercase()
}

/// Identifiers shorter than this must match on word boundaries; bare
/// substring search would let a package like `apt` match inside `adapt`.
const WORD_BOUNDARY_FLOOR: usize = 6;

/// Whether lowercased `text` cites the lowercased `identifier`.
fn cites(text: &str, identifier: &str) -> bool {
    if identifier.is_empty() {
        return false;
    }
    if identifier.len() >= WORD_BOUNDARY_FLOOR {
        return text.contains(identifier);
    }
    text.match_indices(identifier).any(|(start, matched)| {
        let before = text[..start].chars().next_back();
        let after = text[start + matched.len()..].chars().next();
        before.map_or(true, |c| !c.is_alphanumeric())
            && after.map_or(true, |c| !c.is_alphanumeric())
    })
}

/// Share of policies/recommendations citing at least one concrete
/// identifier drawn from the input dataset.
fn specificity_score(document: &PolicyDocument, dataset: &NormalizedDataset) -> f64 {
    let identifiers = dataset_identifiers(dataset);
    if identifiers.is_empty() {
        // Nothing to cite: specificity is vacuously satisfied.
        return 100.0;
    }
    let items: Vec<String> = document
        .policies
        .iter()
        .map(policy_text)
        .chain(document.recommendations.iter().map(|r| r.to_lowercase()))
        .collect();
    if items.is_empty() {
        return 0.0;
    }
    let citing = items
        .iter()
        .filter(|item| identifiers.iter().any(|id| cites(item, id)))
        .count();
    100.0 * citing as f64 / items.len() as f64
}

/// Share of distinct `(category, severity)` pairs in the dataset addressed
/// by at least one policy: a category mention or a finding-id citation from
/// the pair. A bare priority tier does not count; a generic HIGH policy that
/// cites nothing addresses nothing.
fn relevance_score(document: &PolicyDocument, dataset: &NormalizedDataset) -> f64 {
    let pairs: BTreeSet<(String, Severity)> = dataset
        .findings
        .iter()
        .map(|f| (f.category.clone(), f.severity))
        .collect();
    if pairs.is_empty() {
        return 100.0;
    }

    let texts: Vec<String> = document.policies.iter().map(policy_text).collect();
    let addressed = pairs
        .iter()
        .filter(|(category, severity)| {
            dataset
                .findings
                .iter()
                .filter(|f| &f.category == category && f.severity == *severity)
                .any(|finding| {
                    texts.iter().any(|text| {
                        cites(text, &category.to_lowercase())
                            || cites(text, &finding.id.to_lowercase())
                    })
                })
        })
        .count();
    100.0 * addressed as f64 / pairs.len() as f64
}

/// Structural completeness per policy: non-empty `actions`, a `priority`,
/// and at least one of `sla`/`affected_components`.
fn completeness_score(policies: &[Policy]) -> f64 {
    if policies.is_empty() {
        return 0.0;
    }
    let total: f64 = policies
        .iter()
        .map(|policy| {
            let mut elements = 0.0;
            if !policy.actions.is_empty() {
                elements += 1.0;
            }
            if policy.priority.is_some() {
                elements += 1.0;
            }
            if policy.sla.is_some() || !policy.affected_components.is_empty() {
                elements += 1.0;
            }
            elements / 3.0
        })
        .sum();
    100.0 * total / policies.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::AdapterOutput;
    use crate::finding::Finding;
    use crate::normalize::{normalize, NormalizeConfig};
    use crate::policy::GenerationMethod;

    fn finding(id: &str, severity: Severity, category: &str, package: &str) -> Finding {
        Finding {
            id: id.into(),
            tool: "trivy".into(),
            severity,
            category: category.into(),
            cwe: Vec::new(),
            cvss_score: None,
            title: format!("{id} in {package}"),
            description: String::new(),
            package: Some(package.into()),
            file: None,
            line: None,
            remediation: None,
            references: Vec::new(),
        }
    }

    fn dataset() -> NormalizedDataset {
        normalize(
            vec![AdapterOutput {
                findings: vec![
                    finding("CVE-2024-1", Severity::Critical, "container", "openssl"),
                    finding("CVE-2024-2", Severity::High, "dependency", "requests"),
                ],
                warnings: Vec::new(),
            }],
            &NormalizeConfig::default(),
        )
    }

    fn policy(description: &str, priority: Option<Severity>, sla: Option<&str>) -> Policy {
        Policy {
            id: "POLICY-001".into(),
            title: "Remediation".into(),
            description: description.into(),
            priority,
            actions: vec!["act".into()],
            affected_components: Vec::new(),
            sla: sla.map(Into::into),
        }
    }

    fn document(policies: Vec<Policy>, recommendations: Vec<String>) -> PolicyDocument {
        PolicyDocument {
            model_id: "test/model".into(),
            generation_method: GenerationMethod::Llm,
            quality_score: 0.0,
            response_time_secs: 1.0,
            policies,
            recommendations,
        }
    }

    #[test]
    fn specificity_counts_identifier_citations() {
        let doc = document(
            vec![
                policy("Patch CVE-2024-1 in openssl", Some(Severity::Critical), None),
                policy("Improve posture generally", Some(Severity::Medium), None),
            ],
            vec!["Upgrade requests".into(), "Train the team".into()],
        );
        // 2 of 4 items cite an identifier.
        let score = specificity_score(&doc, &dataset());
        assert!((score - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn relevance_counts_addressed_category_severity_pairs() {
        let doc = document(
            vec![policy(
                "Harden container images",
                Some(Severity::Medium),
                None,
            )],
            Vec::new(),
        );
        // Addresses (container, CRITICAL) via category mention only.
        let score = relevance_score(&doc, &dataset());
        assert!((score - 50.0).abs() < f64::EPSILON);
    }

    #[test]
    fn priority_alone_does_not_address_a_pair() {
        // A generic policy carrying only a matching priority tier must not
        // count as addressing every pair at that severity.
        let doc = document(
            vec![policy(
                "Tighten things up generally",
                Some(Severity::High),
                None,
            )],
            Vec::new(),
        );
        let score = relevance_score(&doc, &dataset());
        assert_eq!(score, 0.0);
    }

    #[test]
    fn short_identifiers_match_on_word_boundaries_only() {
        let data = normalize(
            vec![AdapterOutput {
                findings: vec![finding("CVE-2024-9", Severity::High, "container", "apt")],
                warnings: Vec::new(),
            }],
            &NormalizeConfig::default(),
        );

        let vague = document(
            vec![policy("Adapt the capture pipeline", Some(Severity::High), None)],
            Vec::new(),
        );
        assert_eq!(specificity_score(&vague, &data), 0.0);

        let citing = document(
            vec![policy("Pin apt to a patched version", Some(Severity::High), None)],
            Vec::new(),
        );
        assert!((specificity_score(&citing, &data) - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn completeness_requires_all_structural_elements() {
        let complete = vec![policy("d", Some(Severity::High), Some("24 hours"))];
        assert!((completeness_score(&complete) - 100.0).abs() < f64::EPSILON);

        let no_priority = vec![policy("d", None, Some("24 hours"))];
        let score = completeness_score(&no_priority);
        assert!((score - 100.0 * 2.0 / 3.0).abs() < 1e-9);

        assert_eq!(completeness_score(&[]), 0.0);
    }

    #[test]
    fn evaluation_is_deterministic() {
        let doc = document(
            vec![policy("Patch CVE-2024-1", Some(Severity::High), Some("24h"))],
            vec!["Enable scanning".into()],
        );
        let data = dataset();
        let weights = QualityWeights::default();
        let a = evaluate(&doc, &data, &weights);
        let b = evaluate(&doc, &data, &weights);
        assert_eq!(a.overall, b.overall);
        assert!(a.overall > 0.0 && a.overall <= 100.0);
    }

    #[test]
    fn empty_dataset_gives_vacuous_specificity_and_relevance() {
        let doc = document(
            vec![policy("baseline", Some(Severity::Low), Some("90 days"))],
            Vec::new(),
        );
        let empty = NormalizedDataset::empty();
        let breakdown = evaluate(&doc, &empty, &QualityWeights::default());
        assert!((breakdown.specificity - 100.0).abs() < f64::EPSILON);
        assert!((breakdown.relevance - 100.0).abs() < f64::EPSILON);
    }
}
