//! Autonomous scan-diagnose-remediate loop.
//!
//! Each tick lists the inventory, classifies every row, and for each
//! incident retrieves guidance, asks the model for a decision, executes
//! it if it is in the autonomous set, and sends one notification. The
//! loop never shares the operator's session context.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use aiops_guidelines::GuidelineRetriever;
use aiops_notify::Notifier;
use aiops_protocol::{
    Guideline, IncidentRecord, IncidentTier, InstanceFilter, InstanceRow, InstanceState,
    RemediationAction, RemediationDecision,
};

use crate::config::MonitorConfig;
use crate::dispatcher::ActionDispatcher;
use crate::extractor::extract_decision;
use crate::model::LanguageModel;

/// Classify inventory rows. Stopped is Critical; running above
/// `threshold` percent CPU is Warning; everything else is healthy.
pub fn classify(rows: &[InstanceRow], threshold: f64) -> Vec<IncidentRecord> {
    rows.iter()
        .filter_map(|row| {
            let (tier, trigger) = match row.state {
                InstanceState::Stopped => (IncidentTier::Critical, "Stopped (stopped)".to_string()),
                InstanceState::Running if row.utilization > threshold => (
                    IncidentTier::Warning,
                    format!("High CPU ({:.1}%)", row.utilization),
                ),
                _ => return None,
            };
            Some(IncidentRecord {
                resource_id: row.id.clone(),
                name: row.name.clone(),
                tier,
                trigger,
            })
        })
        .collect()
}

/// Build the decision prompt for one incident.
pub fn decision_prompt(incident: &IncidentRecord, logs: Option<&str>, guidance: &[Guideline]) -> String {
    let mut prompt = String::from(
        "[ROLE] Senior AWS SRE.\n\
         [GOAL] Recover service based on logs and operating guidelines.\n",
    );
    prompt.push_str(&format!(
        "[INCIDENT] {}, {}\n[LOGS] {}\n",
        incident.name,
        incident.trigger,
        logs.filter(|l| !l.trim().is_empty())
            .unwrap_or("No logs available")
    ));
    if !guidance.is_empty() {
        prompt.push_str("\n[RELATED GUIDELINES]\n");
        for (idx, g) in guidance.iter().enumerate() {
            prompt.push_str(&format!(
                "{}. [{}] (confidence: {:.2})\n{}\n\n",
                idx + 1,
                g.id,
                g.confidence,
                g.text
            ));
        }
    }
    prompt.push_str(
        "\n[AVAILABLE ACTIONS]\n\
         1. START_INSTANCE (if stopped and safe to start)\n\
         2. REBOOT_INSTANCE (if hung, stuck or high CPU)\n\
         3. ADVISE_SCALE_UP (if out of memory)\n\
         4. MANUAL_CHECK (if logs show data corruption or an unknown error)\n\
         \n\
         [OUTPUT]\n\
         JSON format: {\"action\": \"ACTION_NAME\", \"root_cause\": \"summary\", \"reason\": \"logic\"}\n",
    );
    prompt
}

/// The last `n` characters of `text`.
fn tail_chars(text: &str, n: usize) -> &str {
    let count = text.chars().count();
    if count <= n {
        return text;
    }
    text.char_indices()
        .nth(count - n)
        .map_or(text, |(i, _)| &text[i..])
}

/// What happened to one incident.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IncidentOutcome {
    pub incident: IncidentRecord,
    pub decision: Option<RemediationDecision>,
    /// Whether a cloud-mutating call was made.
    pub executed: bool,
    pub result: String,
}

/// Summary of one scan.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TickReport {
    pub scanned: usize,
    pub outcomes: Vec<IncidentOutcome>,
    /// A stop request arrived before every incident was handled.
    pub interrupted: bool,
    /// Set when the inventory listing failed.
    pub scan_error: Option<String>,
}

pub struct RemediationLoop {
    dispatcher: Arc<ActionDispatcher>,
    retriever: Arc<dyn GuidelineRetriever>,
    model: Arc<dyn LanguageModel>,
    notifier: Arc<dyn Notifier>,
    config: MonitorConfig,
}

impl RemediationLoop {
    pub fn new(
        dispatcher: Arc<ActionDispatcher>,
        retriever: Arc<dyn GuidelineRetriever>,
        model: Arc<dyn LanguageModel>,
        notifier: Arc<dyn Notifier>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            dispatcher,
            retriever,
            model,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    /// Run one full scan.
    pub async fn tick(&self) -> TickReport {
        self.run_tick(None).await
    }

    /// Run one scan, checking `stop` between incidents. The incident in
    /// flight when a stop arrives is completed.
    pub async fn run_tick(&self, stop: Option<&watch::Receiver<bool>>) -> TickReport {
        let cloud = self.dispatcher.cloud();
        let mut report = TickReport::default();

        let rows = match self
            .dispatcher
            .call(cloud.list_instances(InstanceFilter::All))
            .await
        {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(error = %e, "inventory scan failed, skipping tick");
                report.scan_error = Some(e.to_string());
                return report;
            }
        };
        report.scanned = rows.len();
        if rows.is_empty() {
            tracing::debug!("inventory empty, nothing to classify");
            return report;
        }

        let incidents = classify(&rows, self.config.utilization_threshold);
        tracing::info!(
            scanned = rows.len(),
            incidents = incidents.len(),
            region = cloud.region(),
            "scan complete"
        );

        for incident in incidents {
            if stop.is_some_and(|rx| *rx.borrow()) {
                tracing::info!("stop requested, leaving remaining incidents");
                report.interrupted = true;
                break;
            }
            report.outcomes.push(self.handle_incident(incident).await);
        }
        report
    }

    async fn handle_incident(&self, incident: IncidentRecord) -> IncidentOutcome {
        tracing::warn!(
            instance_id = %incident.resource_id,
            name = %incident.name,
            tier = ?incident.tier,
            trigger = %incident.trigger,
            "incident detected"
        );

        let decision = match tokio::time::timeout(
            self.config.tick_timeout(),
            self.diagnose(&incident),
        )
        .await
        {
            Ok(decision) => decision,
            Err(_) => {
                tracing::warn!(instance_id = %incident.resource_id, "diagnosis timed out");
                None
            }
        };

        let (executed, result) = match &decision {
            None => (
                false,
                String::from("No action taken: the model gave no usable decision."),
            ),
            Some(d) => self.execute(&incident, d.action).await,
        };

        self.report(&incident, decision.as_ref(), &result).await;
        IncidentOutcome {
            incident,
            decision,
            executed,
            result,
        }
    }

    /// Retrieve guidance, gather logs and ask the model. `None` when no
    /// decision could be obtained.
    async fn diagnose(&self, incident: &IncidentRecord) -> Option<RemediationDecision> {
        let query = format!("{} {}", incident.trigger, incident.name);
        let guidance = match self
            .retriever
            .search(&query, self.config.guideline_top_n)
            .await
        {
            Ok(guidance) => guidance,
            Err(e) => {
                tracing::warn!(error = %e, "guideline retrieval failed, continuing without");
                Vec::new()
            }
        };

        let cloud = self.dispatcher.cloud();
        let logs = match self
            .dispatcher
            .call(cloud.recent_logs(&incident.resource_id, self.config.log_lines))
            .await
        {
            Ok(lines) => Some(lines.join("\n")),
            Err(e) => {
                tracing::warn!(instance_id = %incident.resource_id, error = %e, "log fetch failed");
                None
            }
        };
        let excerpt = logs
            .as_deref()
            .map(|l| tail_chars(l, self.config.log_excerpt_chars));

        let prompt = decision_prompt(incident, excerpt, &guidance);
        let raw = match self.model.complete(&prompt).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(model = self.model.name(), error = %e, "decision model call failed");
                return None;
            }
        };

        let decision = extract_decision(&raw);
        match &decision {
            Some(d) => tracing::info!(
                instance_id = %incident.resource_id,
                action = %d.action,
                root_cause = %d.root_cause,
                "decision parsed"
            ),
            None => tracing::warn!(
                instance_id = %incident.resource_id,
                raw = %raw,
                "decision unparseable"
            ),
        }
        decision
    }

    async fn execute(&self, incident: &IncidentRecord, action: RemediationAction) -> (bool, String) {
        match action {
            RemediationAction::AdviseScaleUp => (
                false,
                format!(
                    "Advisory: scale up {} to a larger size. No automatic change made.",
                    incident.name
                ),
            ),
            RemediationAction::ManualCheck => (
                false,
                format!("Manual check required for {}. No automatic change made.", incident.name),
            ),
            RemediationAction::None => (false, String::from("Model chose no action.")),
            RemediationAction::Start | RemediationAction::Reboot => {
                match self
                    .dispatcher
                    .execute_remediation(action, &incident.resource_id)
                    .await
                {
                    Ok(Some(state)) => (true, format!("{action} executed, instance is now {state}.")),
                    Ok(None) => (false, format!("{action} not executed.")),
                    Err(e) => {
                        tracing::warn!(
                            instance_id = %incident.resource_id,
                            action = %action,
                            error = %e,
                            "remediation failed"
                        );
                        (true, format!("{action} failed: {e}"))
                    }
                }
            }
        }
    }

    async fn report(
        &self,
        incident: &IncidentRecord,
        decision: Option<&RemediationDecision>,
        result: &str,
    ) {
        let title = format!(
            "{} {}: {}",
            incident.tier.emoji(),
            incident.tier.impact(),
            incident.name
        );
        let mut body = format!(
            "*Instance:* {} ({})\n*Trigger:* {}\n",
            incident.name, incident.resource_id, incident.trigger
        );
        match decision {
            Some(d) => body.push_str(&format!(
                "*AI decision:* `{}`\n*Root cause:* {}\n*Reason:* {}\n",
                d.action, d.root_cause, d.reason
            )),
            None => body.push_str("*AI decision:* none\n"),
        }
        body.push_str(&format!("*Result:* {result}"));
        self.notifier.send(&title, &body).await;
    }
}

/// Observable state of the background loop.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonitorStatus {
    pub running: bool,
    pub interval_secs: u64,
    pub ticks: u64,
    pub last_incidents: usize,
}

#[derive(Default)]
struct LoopStats {
    ticks: AtomicU64,
    last_incidents: AtomicUsize,
}

struct Running {
    stop: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Starts and stops the remediation loop as a background task.
pub struct MonitorController {
    remediation: Arc<RemediationLoop>,
    stats: Arc<LoopStats>,
    running: Mutex<Option<Running>>,
}

impl MonitorController {
    pub fn new(remediation: Arc<RemediationLoop>) -> Self {
        Self {
            remediation,
            stats: Arc::new(LoopStats::default()),
            running: Mutex::new(None),
        }
    }

    /// Start the loop. Returns false if it was already running.
    pub async fn start(&self) -> bool {
        let mut running = self.running.lock().await;
        if running.as_ref().is_some_and(|r| !r.task.is_finished()) {
            return false;
        }

        let (stop, stop_rx) = watch::channel(false);
        let remediation = self.remediation.clone();
        let stats = self.stats.clone();
        let interval = remediation.config().interval();
        let task = tokio::spawn(run_loop(remediation, stats, interval, stop_rx));
        *running = Some(Running { stop, task });
        drop(running);

        tracing::info!(interval_secs = interval.as_secs(), "remediation loop started");
        self.remediation
            .notifier
            .send(
                "System Notification",
                &format!("AIOps monitoring started (interval: {}s)", interval.as_secs()),
            )
            .await;
        true
    }

    /// Stop the loop and wait for the in-flight incident to finish.
    /// Returns false if it was not running.
    pub async fn stop(&self) -> bool {
        let Some(Running { stop, task }) = self.running.lock().await.take() else {
            return false;
        };
        let _ = stop.send(true);
        if let Err(e) = task.await {
            tracing::warn!(error = %e, "remediation task ended abnormally");
        }
        tracing::info!("remediation loop stopped");
        true
    }

    pub async fn is_running(&self) -> bool {
        self.running
            .lock()
            .await
            .as_ref()
            .is_some_and(|r| !r.task.is_finished())
    }

    pub async fn status(&self) -> MonitorStatus {
        MonitorStatus {
            running: self.is_running().await,
            interval_secs: self.remediation.config().interval_secs,
            ticks: self.stats.ticks.load(Ordering::SeqCst),
            last_incidents: self.stats.last_incidents.load(Ordering::SeqCst),
        }
    }
}

async fn run_loop(
    remediation: Arc<RemediationLoop>,
    stats: Arc<LoopStats>,
    interval: Duration,
    mut stop: watch::Receiver<bool>,
) {
    loop {
        if *stop.borrow() {
            break;
        }
        let report = remediation.run_tick(Some(&stop)).await;
        stats.ticks.fetch_add(1, Ordering::SeqCst);
        stats
            .last_incidents
            .store(report.outcomes.len(), Ordering::SeqCst);

        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            changed = stop.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
}
