use std::collections::BTreeMap;

use serde::Deserialize;
use tracing::warn;

use crate::host::HostEnv;

/// Snapshot of the runtime's trace-compilation options.
///
/// The serde renames carry the exact option names of the host's option table;
/// that mapping is the single source of truth between the two sides and must
/// not drift.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct RuntimeOptions {
    #[serde(rename = "jiterpreter-traces-enabled")]
    pub enable_traces: bool,
    #[serde(rename = "jiterpreter-interp-entry-enabled")]
    pub enable_interp_entry: bool,
    #[serde(rename = "jiterpreter-jit-call-enabled")]
    pub enable_jit_call: bool,
    #[serde(rename = "jiterpreter-backward-branch-entries-enabled")]
    pub enable_backward_branches: bool,
    #[serde(rename = "jiterpreter-call-resume-enabled")]
    pub enable_call_resume: bool,
    #[serde(rename = "jiterpreter-wasm-eh-enabled")]
    pub enable_wasm_eh: bool,
    #[serde(rename = "jiterpreter-disable-heuristic")]
    pub disable_heuristic: bool,
    #[serde(rename = "jiterpreter-stats-enabled")]
    pub enable_stats: bool,
    #[serde(rename = "jiterpreter-estimate-heat")]
    pub estimate_heat: bool,
    #[serde(rename = "jiterpreter-count-bailouts")]
    pub count_bailouts: bool,
    #[serde(rename = "jiterpreter-dump-traces")]
    pub dump_traces: bool,
    #[serde(rename = "jiterpreter-use-constants")]
    pub use_constants: bool,
    #[serde(rename = "jiterpreter-backward-branches-enabled")]
    pub no_exit_backward_branches: bool,
    #[serde(rename = "jiterpreter-direct-jit-calls")]
    pub direct_jit_calls: bool,
    #[serde(rename = "jiterpreter-eliminate-null-checks")]
    pub eliminate_null_checks: bool,
    #[serde(rename = "jiterpreter-minimum-trace-length")]
    pub minimum_trace_length: u32,
    #[serde(rename = "jiterpreter-minimum-trace-hit-count")]
    pub minimum_trace_hit_count: u32,
    #[serde(rename = "jiterpreter-jit-call-hit-count")]
    pub jit_call_hit_count: u32,
    #[serde(rename = "jiterpreter-jit-call-queue-flush-threshold")]
    pub jit_call_flush_threshold: u32,
    #[serde(rename = "jiterpreter-interp-entry-hit-count")]
    pub interp_entry_hit_count: u32,
    #[serde(rename = "jiterpreter-interp-entry-queue-flush-threshold")]
    pub interp_entry_flush_threshold: u32,
    #[serde(rename = "jiterpreter-wasm-bytes-limit")]
    pub wasm_bytes_limit: u32,
    #[serde(flatten)]
    unknown: BTreeMap<String, serde_json::Value>,
}

impl Default for RuntimeOptions {
    fn default() -> Self {
        Self {
            enable_traces: true,
            enable_interp_entry: true,
            enable_jit_call: true,
            enable_backward_branches: true,
            enable_call_resume: false,
            enable_wasm_eh: false,
            disable_heuristic: false,
            enable_stats: false,
            estimate_heat: false,
            count_bailouts: false,
            dump_traces: false,
            use_constants: true,
            no_exit_backward_branches: true,
            direct_jit_calls: true,
            eliminate_null_checks: true,
            minimum_trace_length: 8,
            minimum_trace_hit_count: 5000,
            jit_call_hit_count: 2800,
            jit_call_flush_threshold: 128,
            interp_entry_hit_count: 1000,
            interp_entry_flush_threshold: 96,
            wasm_bytes_limit: 16 * 1024 * 1024,
            unknown: BTreeMap::new(),
        }
    }
}

/// Parse the host's options JSON, warning about (and skipping) keys this
/// build does not recognise.
pub fn parse_options_json(json: &str) -> serde_json::Result<RuntimeOptions> {
    let table: RuntimeOptions = serde_json::from_str(json)?;
    for key in table.unknown.keys() {
        warn!(option = key.as_str(), "ignoring unrecognised option key");
    }
    Ok(table)
}

/// A single option change applied back through the host's option parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionOverride {
    EnableTraces(bool),
    EnableInterpEntry(bool),
    EnableJitCall(bool),
    EnableBackwardBranches(bool),
    EnableCallResume(bool),
    EnableWasmEh(bool),
    DisableHeuristic(bool),
    EnableStats(bool),
    EstimateHeat(bool),
    CountBailouts(bool),
    DumpTraces(bool),
    UseConstants(bool),
    NoExitBackwardBranches(bool),
    DirectJitCalls(bool),
    EliminateNullChecks(bool),
    MinimumTraceLength(u32),
    MinimumTraceHitCount(u32),
    JitCallHitCount(u32),
    JitCallFlushThreshold(u32),
    InterpEntryHitCount(u32),
    InterpEntryFlushThreshold(u32),
    WasmBytesLimit(u32),
}

impl OptionOverride {
    /// Kebab-case option name understood by the host parser.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::EnableTraces(_) => "jiterpreter-traces-enabled",
            Self::EnableInterpEntry(_) => "jiterpreter-interp-entry-enabled",
            Self::EnableJitCall(_) => "jiterpreter-jit-call-enabled",
            Self::EnableBackwardBranches(_) => "jiterpreter-backward-branch-entries-enabled",
            Self::EnableCallResume(_) => "jiterpreter-call-resume-enabled",
            Self::EnableWasmEh(_) => "jiterpreter-wasm-eh-enabled",
            Self::DisableHeuristic(_) => "jiterpreter-disable-heuristic",
            Self::EnableStats(_) => "jiterpreter-stats-enabled",
            Self::EstimateHeat(_) => "jiterpreter-estimate-heat",
            Self::CountBailouts(_) => "jiterpreter-count-bailouts",
            Self::DumpTraces(_) => "jiterpreter-dump-traces",
            Self::UseConstants(_) => "jiterpreter-use-constants",
            Self::NoExitBackwardBranches(_) => "jiterpreter-backward-branches-enabled",
            Self::DirectJitCalls(_) => "jiterpreter-direct-jit-calls",
            Self::EliminateNullChecks(_) => "jiterpreter-eliminate-null-checks",
            Self::MinimumTraceLength(_) => "jiterpreter-minimum-trace-length",
            Self::MinimumTraceHitCount(_) => "jiterpreter-minimum-trace-hit-count",
            Self::JitCallHitCount(_) => "jiterpreter-jit-call-hit-count",
            Self::JitCallFlushThreshold(_) => "jiterpreter-jit-call-queue-flush-threshold",
            Self::InterpEntryHitCount(_) => "jiterpreter-interp-entry-hit-count",
            Self::InterpEntryFlushThreshold(_) => "jiterpreter-interp-entry-queue-flush-threshold",
            Self::WasmBytesLimit(_) => "jiterpreter-wasm-bytes-limit",
        }
    }

    /// Render the `--name` / `--no-name` / `--name=value` parser argument.
    #[must_use]
    pub fn host_arg(self) -> String {
        let name = self.name();
        match self {
            Self::EnableTraces(on)
            | Self::EnableInterpEntry(on)
            | Self::EnableJitCall(on)
            | Self::EnableBackwardBranches(on)
            | Self::EnableCallResume(on)
            | Self::EnableWasmEh(on)
            | Self::DisableHeuristic(on)
            | Self::EnableStats(on)
            | Self::EstimateHeat(on)
            | Self::CountBailouts(on)
            | Self::DumpTraces(on)
            | Self::UseConstants(on)
            | Self::NoExitBackwardBranches(on)
            | Self::DirectJitCalls(on)
            | Self::EliminateNullChecks(on) => {
                if on {
                    format!("--{name}")
                } else {
                    format!("--no-{name}")
                }
            }
            Self::MinimumTraceLength(value)
            | Self::MinimumTraceHitCount(value)
            | Self::JitCallHitCount(value)
            | Self::JitCallFlushThreshold(value)
            | Self::InterpEntryHitCount(value)
            | Self::InterpEntryFlushThreshold(value)
            | Self::WasmBytesLimit(value) => format!("--{name}={value}"),
        }
    }
}

/// Push a set of overrides through the host option parser.
pub fn apply_options(host: &mut dyn HostEnv, overrides: &[OptionOverride]) {
    for patch in overrides {
        host.parse_option(&patch.host_arg());
    }
}

/// Patch applied when repeated trace failures force generation off.
pub const DISABLE_GENERATION: [OptionOverride; 3] = [
    OptionOverride::EnableTraces(false),
    OptionOverride::EnableInterpEntry(false),
    OptionOverride::EnableJitCall(false),
];

/// Cached copy of the host options table, refreshed whenever the host's
/// option version counter advances.
#[derive(Debug, Default)]
pub struct OptionsCache {
    version: Option<u32>,
    table: RuntimeOptions,
}

impl OptionsCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Current options table; callers must treat the result as read-only.
    pub fn get(&mut self, host: &dyn HostEnv) -> &RuntimeOptions {
        let version = host.options_version();
        if self.version != Some(version) {
            match parse_options_json(&host.options_json()) {
                Ok(table) => {
                    self.table = table;
                    self.version = Some(version);
                }
                // Keep serving the stale table; the host snapshot was bad.
                Err(err) => warn!("failed to parse host options JSON: {err}"),
            }
        }
        &self.table
    }
}
