use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{timeout, Instant};
use tracing::{debug, info, instrument, warn};

use crate::finding::NormalizedDataset;
use crate::llm::ModelClient;
use crate::policy::{
    extract_policy_payload, fallback_document, GenerationMethod, PolicyDocument,
};

/// Timing and retry bounds for the dual-model run.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct InvokerConfig {
    /// Per-call timeout.
    pub call_timeout_secs: u64,
    /// Top-level deadline covering both concurrent calls.
    pub deadline_secs: u64,
}

impl Default for InvokerConfig {
    fn default() -> Self {
        Self {
            call_timeout_secs: 120,
            deadline_secs: 300,
        }
    }
}

/// Terminal state of one model call. Both variants carry a valid document;
/// `Exhausted` has already been routed through the fallback generator.
#[derive(Debug)]
enum CallOutcome {
    Parsed(PolicyDocument),
    Exhausted { reason: String, elapsed_secs: f64 },
}

/// Race both backends against the same prompt and return one valid
/// `PolicyDocument` per slot.
///
/// The two calls run concurrently with no shared mutable state; each writes
/// its own result slot and the caller joins both (join semantics, not a
/// race). If the top-level deadline expires, in-flight calls are treated as
/// exhausted and routed to fallback; no retries happen past the deadline.
#[instrument(skip_all, fields(primary = primary.model_id(), secondary = secondary.model_id()))]
pub async fn generate_policy_pair(
    dataset: &NormalizedDataset,
    prompt: &str,
    primary: &dyn ModelClient,
    secondary: &dyn ModelClient,
    config: &InvokerConfig,
) -> (PolicyDocument, PolicyDocument) {
    let deadline = Duration::from_secs(config.deadline_secs);
    let call_timeout = Duration::from_secs(config.call_timeout_secs);
    let started = Instant::now();

    let race = async {
        tokio::join!(
            invoke_model(primary, prompt, call_timeout),
            invoke_model(secondary, prompt, call_timeout)
        )
    };

    let (first, second) = match timeout(deadline, race).await {
        Ok(outcomes) => outcomes,
        Err(_) => {
            let elapsed = started.elapsed().as_secs_f64();
            warn!(elapsed_secs = elapsed, "top-level deadline exceeded");
            let exhausted = || CallOutcome::Exhausted {
                reason: "pipeline deadline exceeded".into(),
                elapsed_secs: elapsed,
            };
            (exhausted(), exhausted())
        }
    };

    (
        resolve(first, primary.model_id(), dataset),
        resolve(second, secondary.model_id(), dataset),
    )
}

fn resolve(
    outcome: CallOutcome,
    model_id: &str,
    dataset: &NormalizedDataset,
) -> PolicyDocument {
    match outcome {
        CallOutcome::Parsed(doc) => doc,
        CallOutcome::Exhausted {
            reason,
            elapsed_secs,
        } => {
            info!(model = model_id, %reason, "routing exhausted call to fallback");
            fallback_document(model_id, dataset, elapsed_secs)
        }
    }
}

/// One call's state machine:
/// `PENDING -> IN_FLIGHT -> {PARSED | RETRY -> IN_FLIGHT | EXHAUSTED}`.
/// Retry scheduling for transient failures lives inside the client; this
/// layer adds the parse step (with one structured-extraction retry) and
/// maps every failure to `Exhausted`.
async fn invoke_model(
    client: &dyn ModelClient,
    prompt: &str,
    call_timeout: Duration,
) -> CallOutcome {
    let started = Instant::now();

    let text = match bounded_generate(client, prompt, call_timeout).await {
        Ok(text) => text,
        Err(err) => {
            return CallOutcome::Exhausted {
                reason: err.to_string(),
                elapsed_secs: started.elapsed().as_secs_f64(),
            }
        }
    };

    if let Some(payload) = extract_policy_payload(&text) {
        if !payload.policies.is_empty() {
            debug!(
                model = client.model_id(),
                policies = payload.policies.len(),
                "parsed policy payload"
            );
            return CallOutcome::Parsed(PolicyDocument {
                model_id: client.model_id().to_string(),
                generation_method: GenerationMethod::Llm,
                quality_score: 0.0,
                response_time_secs: started.elapsed().as_secs_f64(),
                policies: payload.policies,
                recommendations: payload.recommendations,
            });
        }
    }

    // Unparseable body: one structured-extraction retry, then exhausted.
    warn!(model = client.model_id(), "unparseable response, retrying once");
    match bounded_generate(client, prompt, call_timeout).await {
        Ok(retry_text) => match extract_policy_payload(&retry_text) {
            Some(payload) if !payload.policies.is_empty() => {
                CallOutcome::Parsed(PolicyDocument {
                    model_id: client.model_id().to_string(),
                    generation_method: GenerationMethod::Llm,
                    quality_score: 0.0,
                    response_time_secs: started.elapsed().as_secs_f64(),
                    policies: payload.policies,
                    recommendations: payload.recommendations,
                })
            }
            _ => CallOutcome::Exhausted {
                reason: "response did not contain a policy payload".into(),
                elapsed_secs: started.elapsed().as_secs_f64(),
            },
        },
        Err(err) => CallOutcome::Exhausted {
            reason: err.to_string(),
            elapsed_secs: started.elapsed().as_secs_f64(),
        },
    }
}

async fn bounded_generate(
    client: &dyn ModelClient,
    prompt: &str,
    call_timeout: Duration,
) -> Result<String, crate::llm::ModelCallError> {
    match timeout(call_timeout, client.generate(prompt)).await {
        Ok(result) => result,
        Err(_) => Err(crate::llm::ModelCallError::Timeout),
    }
}
