//! Runtime configuration for an organization.
//!
//! The original system kept configuration in a process-wide singleton; here it
//! is an ordinary value constructed once (usually from the CLI) and threaded
//! through the [`Organization`](crate::orgllm::organization::Organization)
//! handle. Tests build as many independent configs as they need.
//!
//! # Example
//!
//! ```rust
//! use orgllm::OrgConfig;
//! use std::path::PathBuf;
//!
//! let config = OrgConfig {
//!     workspace_root: PathBuf::from("/tmp/orgs"),
//!     continuous_mode: true,
//!     continuous_limit: 50,
//!     ..OrgConfig::default()
//! };
//! assert_eq!(config.unit_cost, 100);
//! ```

use std::path::PathBuf;

/// Configuration for one organization runtime.
///
/// Every knob the entrypoint exposes lands here; the organization and its
/// agents read it through the shared handle and never consult globals.
#[derive(Debug, Clone)]
pub struct OrgConfig {
    /// Directory under which each organization keeps its workspace
    /// (`<workspace_root>/<org_name>/...`).
    pub workspace_root: PathBuf,
    /// Run agent loops without a step limit prompt.
    pub continuous_mode: bool,
    /// Maximum loop iterations per agent in continuous mode; `0` means no limit.
    pub continuous_limit: u64,
    /// Verbose diagnostics.
    pub debug_mode: bool,
    /// Speak assistant output aloud (handled by an external adapter).
    pub speak_mode: bool,
    /// Force the fast/small model for every call.
    pub force_small_model: bool,
    /// Force the large model for every call.
    pub force_large_model: bool,
    /// Memory backend name (the JSON-file store is the built-in).
    pub memory_backend: String,
    /// Browser the web tools should impersonate.
    pub browser_name: String,
    /// Allow tools to download files into agent workspaces.
    pub allow_downloads: bool,
    /// Skip the news banner at startup.
    pub skip_news: bool,
    /// Skip re-prompting when resuming an existing organization.
    pub skip_reprompt: bool,
    /// Install plugin dependencies at startup.
    pub install_plugin_deps: bool,
    /// Whether the process runs in organization mode at all.
    pub org_mode: bool,
    /// Model used for agent loop completions.
    pub fast_model: String,
    /// Model used when an agent escalates to the large tier.
    pub smart_model: String,
    /// Token ceiling handed to the model client per call.
    pub max_response_tokens: usize,
    /// Per-node cost charged each loop iteration.
    pub unit_cost: i64,
    /// Seconds between agent loop iterations.
    pub loop_interval_secs: u64,
    /// Timeout for the recursive operating-cost computation.
    pub cost_timeout_secs: u64,
}

impl Default for OrgConfig {
    fn default() -> Self {
        Self {
            workspace_root: PathBuf::from("organizations"),
            continuous_mode: false,
            continuous_limit: 0,
            debug_mode: false,
            speak_mode: false,
            force_small_model: false,
            force_large_model: false,
            memory_backend: "json_file".to_string(),
            browser_name: "chrome".to_string(),
            allow_downloads: false,
            skip_news: false,
            skip_reprompt: false,
            install_plugin_deps: false,
            org_mode: true,
            fast_model: "gpt-4o-mini".to_string(),
            smart_model: "gpt-4o".to_string(),
            max_response_tokens: 4_000,
            unit_cost: 100,
            loop_interval_secs: 1,
            cost_timeout_secs: 10,
        }
    }
}

impl OrgConfig {
    /// The model name the agent loops should use, honoring the force flags.
    pub fn loop_model(&self) -> &str {
        if self.force_large_model {
            &self.smart_model
        } else {
            &self.fast_model
        }
    }
}
