//! Markdown rendering of deep error reports.
//!
//! The full report is shaped for pasting into an LLM conversation: identity
//! and stack first, then the trigger chain, history, flow, runtime state and
//! a closing analysis request. Free text (messages, stacks, event names,
//! log lines) is secret-scrubbed as it is rendered. Output depends only on
//! the report, so the same report always renders to the same text.

use chrono::DateTime;
use fh_common::{format_duration_ms, InteractionEvent, OutputFormat, TelemetryEvent};
use fh_redact::scrub_secrets;
use serde_json::Value;
use tracing::debug;

use crate::config::ReportConfig;
use crate::error::Result;
use crate::report::DeepErrorReport;
use crate::sections::*;

/// Longest rendered state value in the state-change list.
const MAX_INLINE_VALUE_CHARS: usize = 80;

/// Markdown report generator.
pub struct ReportGenerator {
    config: ReportConfig,
}

impl ReportGenerator {
    /// Create a new report generator with configuration.
    pub fn new(config: ReportConfig) -> Self {
        Self { config }
    }

    /// Create a generator with default configuration.
    pub fn default_config() -> Self {
        Self::new(ReportConfig::default())
    }

    /// Get the current configuration.
    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Render in the requested output format.
    pub fn render(&self, report: &DeepErrorReport, format: OutputFormat) -> Result<String> {
        let out = match format {
            OutputFormat::Md => self.generate_llm(report),
            OutputFormat::Quick => self.generate_quick(report),
            OutputFormat::Json => report.to_json()?,
        };
        debug!(
            report_id = %report.id,
            format = %format,
            bytes = out.len(),
            "report rendered"
        );
        Ok(out)
    }

    /// Full Markdown report.
    pub fn generate_llm(&self, report: &DeepErrorReport) -> String {
        let mut out = String::new();
        out.push_str(&self.render_header(report));
        out.push_str(&render_error(report));
        out.push_str(&render_trigger(&report.trigger));
        out.push_str(&render_timeline(report));
        if self.config.sections.interactions {
            out.push_str(&render_interactions(report));
        }
        if self.config.sections.process_flow {
            out.push_str(&render_flow(&report.flow));
        }
        if self.config.sections.environment {
            out.push_str(&render_runtime(&report.runtime));
        }
        if self.config.sections.console {
            out.push_str(&render_console(&report.console));
        }
        out.push_str(&render_environment(&report.metadata));
        if self.config.closing_prompt {
            out.push_str(CLOSING_PROMPT);
        }
        out
    }

    /// Condensed report: error, location, trigger, last action, top stack lines.
    pub fn generate_quick(&self, report: &DeepErrorReport) -> String {
        let mut out = String::new();
        out.push_str(&format!("**Error:** {}\n", free_text(&report.error.headline())));

        let mut location = format!("`{}`", report.call_site.file_line());
        if let Some(component) = report.call_site.component.as_deref() {
            location.push_str(&format!(" ({})", component));
        }
        out.push_str(&format!("**Location:** {}\n", location));

        let trigger = report
            .trigger
            .api_failure
            .as_ref()
            .map(ApiFailure::label)
            .or_else(|| report.trigger.direct_cause.clone())
            .unwrap_or_else(|| "unknown".to_string());
        out.push_str(&format!("**Trigger:** {}\n", trigger));
        out.push_str(&format!(
            "**Last action:** {}\n",
            report.trigger.user_action.as_deref().unwrap_or("none")
        ));

        let lines = report.error.stack_lines();
        if !lines.is_empty() {
            let top: Vec<&str> = lines
                .into_iter()
                .take(self.config.quick_stack_lines)
                .collect();
            out.push_str("\n**Stack:**\n");
            out.push_str(&fenced(&scrub_secrets(&top.join("\n")), "text"));
        }
        out
    }

    fn render_header(&self, report: &DeepErrorReport) -> String {
        let title = self
            .config
            .title
            .clone()
            .unwrap_or_else(|| format!("Error Report: {}", report.error.name));
        format!(
            "# 🐛 {}\n\n> Report `{}` generated {} for session `{}`\n\n",
            title,
            report.id,
            report.generated_at.to_rfc3339(),
            report.metadata.session_id
        )
    }
}

impl Default for ReportGenerator {
    fn default() -> Self {
        Self::default_config()
    }
}

/// Full Markdown report with default configuration.
pub fn generate_llm_report(report: &DeepErrorReport) -> String {
    ReportGenerator::default_config().generate_llm(report)
}

/// Quick Markdown report with default configuration.
pub fn generate_quick_report(report: &DeepErrorReport) -> String {
    ReportGenerator::default_config().generate_quick(report)
}

const CLOSING_PROMPT: &str = "---\n\n## 🤖 Analysis Request\n\n\
Please analyze this error and provide:\n\n\
1. **Root cause**: what most likely caused this error, given the trigger chain and timeline?\n\
2. **Fix**: the concrete code change that resolves it.\n\
3. **Prevention**: how to keep this class of error from recurring (validation, tests, guards).\n\
4. **Related issues**: other code paths likely affected by the same problem.\n";

fn render_error(report: &DeepErrorReport) -> String {
    let error = &report.error;
    let site = &report.call_site;
    let mut out = String::from("## ❌ Error\n\n");
    out.push_str(&format!("- **Type:** `{}`\n", error.name));
    out.push_str(&format!("- **Message:** {}\n", free_text(&error.message)));
    if let Some(component) = site.component.as_deref() {
        out.push_str(&format!("- **Context:** {}\n", component));
    }
    match (site.location(), site.function.as_deref()) {
        (Some(location), Some(function)) => {
            out.push_str(&format!("- **Origin:** `{}` at `{}`\n", function, location))
        }
        (Some(location), None) => out.push_str(&format!("- **Origin:** `{}`\n", location)),
        _ => out.push_str("- **Origin:** unknown (stack not parseable)\n"),
    }
    out.push('\n');

    if !error.causes.is_empty() {
        out.push_str("### Caused by\n\n");
        for cause in &error.causes {
            out.push_str(&format!("- {}\n", free_text(cause)));
        }
        out.push('\n');
    }

    out.push_str("### Stack Trace\n\n");
    let lines = error.stack_lines();
    if lines.is_empty() {
        out.push_str("_No stack trace captured._\n\n");
    } else {
        out.push_str(&fenced(&scrub_secrets(&lines.join("\n")), "text"));
        out.push('\n');
    }
    out
}

fn render_trigger(trigger: &TriggerSection) -> String {
    let mut out = String::from("## 🎯 Trigger Chain\n\n");
    out.push_str(&format!(
        "- **Direct cause:** {}\n",
        trigger.direct_cause.as_deref().unwrap_or("unknown")
    ));
    out.push_str(&format!(
        "- **Last user action:** {}\n",
        trigger.user_action.as_deref().unwrap_or("none")
    ));
    match &trigger.api_failure {
        Some(failure) => out.push_str(&format!("- **API failure:** {}\n", failure.label())),
        None => out.push_str("- **API failure:** none\n"),
    }
    out.push_str(&format!(
        "- **Last state change:** {}\n",
        trigger.state_change.as_deref().unwrap_or("none")
    ));
    out.push_str(&format!("- **Sequence:** {}\n\n", trigger.sequence_text()));
    out
}

fn render_timeline(report: &DeepErrorReport) -> String {
    let timeline = &report.timeline;
    let at = report.generated_at.timestamp_millis();
    let mut out = format!(
        "## 📜 Timeline (last {})\n\n",
        format_duration_ms(timeline.window_ms as f64)
    );
    if timeline.is_empty() {
        out.push_str("_No events recorded before the error._\n\n");
        return out;
    }

    out.push_str(&format!(
        "{} events in window, {} most recent shown (newest first).\n\n",
        timeline.events_in_window,
        timeline.recent_events.len()
    ));
    if !timeline.recent_events.is_empty() {
        out.push_str("| Time | Δ | Category | Severity | Event |\n");
        out.push_str("|------|---|----------|----------|-------|\n");
        for event in &timeline.recent_events {
            out.push_str(&format!(
                "| {} | {} | {} | {} | {} |\n",
                clock_time(event.timestamp),
                relative(event.timestamp, at),
                event.category,
                event.severity,
                cell(&free_text(&event.name))
            ));
        }
        out.push('\n');
    }

    if !timeline.user_actions.is_empty() {
        out.push_str("### Recent User Actions\n\n");
        for (i, event) in timeline.user_actions.iter().enumerate() {
            out.push_str(&format!(
                "{}. `{}` {}\n",
                i + 1,
                relative(event.timestamp, at),
                free_text(&event.name)
            ));
        }
        out.push('\n');
    }

    if !timeline.api_calls.is_empty() {
        out.push_str("### Recent API Calls\n\n");
        out.push_str("| Δ | Request | Status | Duration |\n");
        out.push_str("|---|---------|--------|----------|\n");
        for event in &timeline.api_calls {
            out.push_str(&format!(
                "| {} | {} | {} | {} |\n",
                relative(event.timestamp, at),
                cell(&free_text(&event.name)),
                api_status(event),
                event
                    .duration
                    .map(format_duration_ms)
                    .unwrap_or_else(|| "-".to_string())
            ));
        }
        out.push('\n');
    }

    if !timeline.state_changes.is_empty() {
        out.push_str("### Recent State Changes\n\n");
        for event in &timeline.state_changes {
            out.push_str(&format!(
                "- `{}` {}: `{}` → `{}`\n",
                relative(event.timestamp, at),
                single_line(&event.name),
                inline_value(event.meta("old_value")),
                inline_value(event.meta("new_value"))
            ));
        }
        out.push('\n');
    }
    out
}

fn render_interactions(report: &DeepErrorReport) -> String {
    if report.interactions.is_empty() {
        return String::new();
    }
    let at = report.generated_at.timestamp_millis();
    let mut out = String::from("## 🖱️ Recent Interactions\n\n");
    for interaction in &report.interactions {
        out.push_str(&format!(
            "- `{}` {}\n",
            relative(interaction.timestamp, at),
            describe_interaction(interaction)
        ));
    }
    out.push('\n');
    out
}

fn describe_interaction(interaction: &InteractionEvent) -> String {
    let mut out = format!(
        "**{}** on `{}`",
        interaction.kind,
        interaction.target.selector()
    );
    if let Some(text) = interaction.target.text_content.as_deref() {
        out.push_str(&format!(" \"{}\"", single_line(text)));
    }
    if let Some(key) = interaction.key.as_deref() {
        out.push_str(&format!(" key={}", key));
    }
    if let Some(value) = interaction.input_value.as_deref() {
        out.push_str(&format!(" value={}", value));
    }
    if let Some(pos) = interaction.position {
        out.push_str(&format!(" at ({:.0}, {:.0})", pos.x, pos.y));
    }
    out
}

fn render_flow(flow: &FlowSection) -> String {
    let mut out = String::from("## 🔀 Process Flow\n\n");
    if !flow.error_chain.is_empty() {
        out.push_str(&format!("**Error chain:** {}\n\n", flow.chain_text()));
        if let Some(failed) = flow.failing_process() {
            if let Some(err) = &failed.error {
                out.push_str(&format!(
                    "**Failed in** `{}` after {}: {}\n\n",
                    failed.name,
                    failed.duration_label(),
                    free_text(&err.to_string())
                ));
            }
        }
    }
    out.push_str(&fenced(&flow.visualization, "text"));
    out.push('\n');

    if !flow.active.is_empty() {
        out.push_str("### Active Processes\n\n");
        for process in &flow.active {
            out.push_str(&format!(
                "- {} `{}` (depth {}, `{}`)\n",
                process.status.icon(),
                process.name,
                process.depth,
                process.id
            ));
        }
        out.push('\n');
    }

    let stats = &flow.stats;
    out.push_str(&format!(
        "**Stats:** {} total, {} active, {} errors, avg duration {}\n\n",
        stats.total,
        stats.active,
        stats.errors,
        stats
            .avg_duration_ms
            .map(format_duration_ms)
            .unwrap_or_else(|| "n/a".to_string())
    ));
    out
}

fn render_runtime(runtime: &RuntimeSnapshot) -> String {
    let mut out = String::from("## 🖥️ Runtime Snapshot\n\n");
    out.push_str("| Capability | Value |\n");
    out.push_str("|------------|-------|\n");

    let memory = runtime.memory.describe(|m| {
        let mut s = format!("{} used", format_bytes(m.used_bytes));
        if let Some(total) = m.total_bytes {
            s.push_str(&format!(", {} total", format_bytes(total)));
        }
        if let Some(limit) = m.limit_bytes {
            s.push_str(&format!(", {} limit", format_bytes(limit)));
        }
        if let Some(pct) = m.usage_pct() {
            s.push_str(&format!(" ({:.1}%)", pct));
        }
        s
    });
    let connection = runtime.connection.describe(|c| {
        let mut s = c.effective_type.clone();
        if let Some(down) = c.downlink_mbps {
            s.push_str(&format!(", {:.1} Mbps", down));
        }
        if let Some(rtt) = c.rtt_ms {
            s.push_str(&format!(", rtt {} ms", rtt));
        }
        if c.save_data {
            s.push_str(", save-data");
        }
        s
    });
    let viewport = runtime
        .viewport
        .describe(|v| format!("{}x{} @{}x", v.width, v.height, v.pixel_ratio));
    let timing = runtime.timing.describe(|t| {
        let mut s = format!("up {}", format_duration_ms(t.since_start_ms));
        if let Some(dcl) = t.dom_content_loaded_ms {
            s.push_str(&format!(", DOMContentLoaded {}", format_duration_ms(dcl)));
        }
        if let Some(load) = t.load_complete_ms {
            s.push_str(&format!(", load {}", format_duration_ms(load)));
        }
        s
    });
    let resources = runtime.resources.describe(|r| {
        format!(
            "{} total ({} script, {} stylesheet, {} image, {} font, {} other)",
            r.total(),
            r.script,
            r.stylesheet,
            r.image,
            r.font,
            r.other
        )
    });

    for (label, value) in [
        ("Memory", memory),
        ("Connection", connection),
        ("Viewport", viewport),
        ("Timing", timing),
        ("Resources", resources),
    ] {
        out.push_str(&format!("| {} | {} |\n", label, cell(&value)));
    }
    out.push('\n');
    out
}

fn render_console(lines: &[ConsoleLine]) -> String {
    let mut out = String::from("## 🧾 Console Activity\n\n");
    if lines.is_empty() {
        out.push_str("_No console output captured._\n\n");
        return out;
    }
    let body: Vec<String> = lines
        .iter()
        .map(|l| {
            let target = if l.target.is_empty() {
                String::new()
            } else {
                format!(" {}:", l.target)
            };
            format!(
                "[{}] {}{} {}",
                clock_time(l.timestamp),
                l.level.to_string().to_ascii_uppercase(),
                target,
                free_text(&l.message)
            )
        })
        .collect();
    out.push_str(&fenced(&body.join("\n"), "text"));
    out.push('\n');
    out
}

fn render_environment(meta: &ReportMetadata) -> String {
    let mut out = String::from("## 🌐 Environment\n\n");
    out.push_str("| Key | Value |\n");
    out.push_str("|-----|-------|\n");
    let rows = [
        ("Session", meta.session_id.to_string()),
        ("User", meta.user_id.clone().unwrap_or_else(|| "anonymous".to_string())),
        ("Location", meta.location.clone()),
        ("Platform", meta.platform.clone()),
        ("Locale", meta.locale.describe(|l| l.clone())),
        ("Online", yes_no(meta.online).to_string()),
        ("User agent", meta.user_agent.clone()),
    ];
    for (key, value) in rows {
        out.push_str(&format!("| {} | {} |\n", key, cell(&value)));
    }
    out.push('\n');

    if !meta.additional.is_empty() {
        out.push_str("### Additional Metadata\n\n");
        let json = serde_json::to_string_pretty(&meta.additional)
            .unwrap_or_else(|_| "{}".to_string());
        out.push_str(&fenced(&json, "json"));
        out.push('\n');
    }
    out
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn api_status(event: &TelemetryEvent) -> String {
    match event.meta_u64("status") {
        Some(status) if status >= 400 => format!("❌ {}", status),
        Some(status) => status.to_string(),
        None => "-".to_string(),
    }
}

/// Wrap `body` in a code fence longer than any backtick run inside it.
fn fenced(body: &str, lang: &str) -> String {
    let mut longest = 0;
    let mut run = 0;
    for c in body.chars() {
        if c == '`' {
            run += 1;
            longest = longest.max(run);
        } else {
            run = 0;
        }
    }
    let fence = "`".repeat(longest.max(2) + 1);
    format!("{fence}{lang}\n{body}\n{fence}\n")
}

/// Table-safe cell text.
fn cell(s: &str) -> String {
    single_line(s).replace('|', "\\|")
}

/// Single-line text with secrets replaced.
fn free_text(s: &str) -> String {
    scrub_secrets(&single_line(s)).into_owned()
}

fn single_line(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn inline_value(value: Option<&Value>) -> String {
    let text = match value {
        Some(Value::String(s)) => s.clone(),
        Some(v) => v.to_string(),
        None => "undefined".to_string(),
    };
    let text = single_line(&text).replace('`', "'");
    if text.chars().count() > MAX_INLINE_VALUE_CHARS {
        let cut: String = text.chars().take(MAX_INLINE_VALUE_CHARS).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

fn clock_time(ts_ms: i64) -> String {
    DateTime::from_timestamp_millis(ts_ms)
        .map(|dt| dt.format("%H:%M:%S%.3f").to_string())
        .unwrap_or_else(|| ts_ms.to_string())
}

fn relative(ts_ms: i64, at_ms: i64) -> String {
    format!("{:+.1}s", (ts_ms - at_ms) as f64 / 1000.0)
}
