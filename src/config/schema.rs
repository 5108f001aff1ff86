//! Workflow configuration schema: defaults, validation, and the typed view.
//!
//! The configuration file is YAML with six fixed top-level sections:
//!
//! ```yaml
//! repository:
//!   path: /work/project        # empty until `fbt init` has run
//!   remote: origin
//!   remote_url: null
//! branches:
//!   main: main
//!   prefix: feature/
//! commit:
//!   author_name: AI Agent
//!   author_email: ai-agent@example.com
//!   message_template: "feat: {message}"
//! merge:
//!   strategy: merge            # or "rebase"
//!   squash: false
//! logging:
//!   level: INFO                # DEBUG, INFO, WARNING, ERROR, CRITICAL
//!   file: feature_branch.log
//! agent:
//!   model: default
//!   temperature: 0.7           # 0.0 - 1.0
//! ```
//!
//! Validation works on the untyped tree so that a failure can name the exact
//! section and field. [`WorkflowConfig`] is only built from a tree that has
//! already passed [`validate`].

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};

use crate::{Error, Result};

/// Top-level sections, in validation order.
pub const SECTIONS: [&str; 6] = ["repository", "branches", "commit", "merge", "logging", "agent"];

/// Section name used by older config files for `agent`.
const LEGACY_AGENT_SECTION: &str = "ai_agent";

static EMAIL_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email pattern is a valid regex")
});

/// How a feature branch is brought into the main branch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergeStrategy {
    /// `git merge` the feature branch into main
    #[default]
    Merge,
    /// Rebase the feature branch onto main, then fast-forward main
    Rebase,
}

impl MergeStrategy {
    /// Parse from string (exact, lowercase).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "merge" => Some(MergeStrategy::Merge),
            "rebase" => Some(MergeStrategy::Rebase),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::Merge => "merge",
            MergeStrategy::Rebase => "rebase",
        }
    }
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Log level names accepted in `logging.level`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Critical,
}

impl LogLevel {
    /// Parse from string (exact, uppercase).
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "DEBUG" => Some(LogLevel::Debug),
            "INFO" => Some(LogLevel::Info),
            "WARNING" => Some(LogLevel::Warning),
            "ERROR" => Some(LogLevel::Error),
            "CRITICAL" => Some(LogLevel::Critical),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Error => "ERROR",
            LogLevel::Critical => "CRITICAL",
        }
    }

    /// The closest `tracing` level. `CRITICAL` has no counterpart and maps to `ERROR`.
    pub fn to_tracing(&self) -> tracing::Level {
        match self {
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Warning => tracing::Level::WARN,
            LogLevel::Error | LogLevel::Critical => tracing::Level::ERROR,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Typed, read-only view of a validated configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub repository: RepositorySettings,
    pub branches: BranchSettings,
    pub commit: CommitSettings,
    pub merge: MergeSettings,
    pub logging: LoggingSettings,
    pub agent: AgentSettings,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositorySettings {
    /// Working tree path; empty until `fbt init` has run
    pub path: String,
    /// Remote name used for push
    pub remote: String,
    #[serde(default)]
    pub remote_url: Option<String>,
}

impl RepositorySettings {
    /// The configured remote URL, treating an empty string as unset.
    pub fn remote_url(&self) -> Option<&str> {
        self.remote_url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BranchSettings {
    pub main: String,
    pub prefix: String,
}

impl BranchSettings {
    /// Prefix `name` unless it already carries the configured prefix.
    pub fn feature_name(&self, name: &str) -> String {
        if name.starts_with(&self.prefix) {
            name.to_string()
        } else {
            format!("{}{}", self.prefix, name)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommitSettings {
    pub author_name: String,
    pub author_email: String,
    pub message_template: String,
}

impl CommitSettings {
    /// Render `message` through `message_template`.
    ///
    /// A template without a `{message}` placeholder is used as a prefix.
    pub fn format_message(&self, message: &str) -> String {
        if self.message_template.contains("{message}") {
            self.message_template.replace("{message}", message)
        } else {
            format!("{}{}", self.message_template, message)
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeSettings {
    pub strategy: MergeStrategy,
    pub squash: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingSettings {
    pub level: LogLevel,
    pub file: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentSettings {
    pub model: String,
    pub temperature: f64,
}

impl WorkflowConfig {
    /// Build the typed view, validating first.
    pub fn from_value(config: &Value) -> Result<Self> {
        validate(config)?;
        Ok(serde_json::from_value(config.clone())?)
    }
}

/// The built-in configuration written on first run.
pub fn default_config() -> Value {
    json!({
        "repository": {
            "path": "",
            "remote": "origin",
            "remote_url": null,
        },
        "branches": {
            "main": "main",
            "prefix": "feature/",
        },
        "commit": {
            "author_name": "AI Agent",
            "author_email": "ai-agent@example.com",
            "message_template": "feat: {message}",
        },
        "merge": {
            "strategy": "merge",
            "squash": false,
        },
        "logging": {
            "level": "INFO",
            "file": "feature_branch.log",
        },
        "agent": {
            "model": "default",
            "temperature": 0.7,
        },
    })
}

/// Rename a legacy `ai_agent` section to `agent`.
///
/// Returns true if the tree was changed. A tree that already has `agent`
/// keeps it and the legacy section is left alone.
pub fn migrate_legacy_sections(config: &mut Value) -> bool {
    let Some(map) = config.as_object_mut() else {
        return false;
    };
    if map.contains_key("agent") {
        return false;
    }
    match map.remove(LEGACY_AGENT_SECTION) {
        Some(section) => {
            map.insert("agent".to_string(), section);
            true
        }
        None => false,
    }
}

/// Validate a configuration tree. The first violation is returned.
pub fn validate(config: &Value) -> Result<()> {
    let root = config
        .as_object()
        .ok_or_else(|| invalid("(root)", "(root)", "configuration must be a mapping of sections"))?;

    let repository = section(root, "repository")?;
    require_str(repository, "repository", "path")?;
    require_str(repository, "repository", "remote")?;
    optional_str(repository, "repository", "remote_url")?;

    let branches = section(root, "branches")?;
    require_non_empty(branches, "branches", "main")?;
    require_str(branches, "branches", "prefix")?;

    let commit = section(root, "commit")?;
    require_str(commit, "commit", "author_name")?;
    let email = require_str(commit, "commit", "author_email")?;
    if !EMAIL_PATTERN.is_match(email) {
        return Err(invalid(
            "commit",
            "author_email",
            &format!("'{}' is not a valid email address", email),
        ));
    }
    require_str(commit, "commit", "message_template")?;

    let merge = section(root, "merge")?;
    let strategy = require_str(merge, "merge", "strategy")?;
    if MergeStrategy::parse(strategy).is_none() {
        return Err(invalid(
            "merge",
            "strategy",
            &format!("'{}' is not one of: merge, rebase", strategy),
        ));
    }
    match merge.get("squash") {
        None => return Err(missing("merge", "squash")),
        Some(Value::Bool(_)) => {}
        Some(_) => return Err(invalid("merge", "squash", "field 'squash' must be a boolean")),
    }

    let logging = section(root, "logging")?;
    let level = require_str(logging, "logging", "level")?;
    if LogLevel::parse(level).is_none() {
        return Err(invalid(
            "logging",
            "level",
            &format!(
                "'{}' is not one of: DEBUG, INFO, WARNING, ERROR, CRITICAL",
                level
            ),
        ));
    }
    require_str(logging, "logging", "file")?;

    let agent = section(root, "agent")?;
    require_str(agent, "agent", "model")?;
    let temperature = match agent.get("temperature") {
        None => return Err(missing("agent", "temperature")),
        Some(value) => value.as_f64().ok_or_else(|| {
            invalid("agent", "temperature", "field 'temperature' must be a number")
        })?,
    };
    if !(0.0..=1.0).contains(&temperature) {
        return Err(invalid(
            "agent",
            "temperature",
            &format!("field 'temperature' must be between 0 and 1, got {}", temperature),
        ));
    }

    Ok(())
}

fn invalid(section: &str, field: &str, reason: &str) -> Error {
    Error::ConfigValidation {
        section: section.to_string(),
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn missing(section: &str, field: &str) -> Error {
    invalid(section, field, &format!("missing required field '{}'", field))
}

fn section<'a>(root: &'a Map<String, Value>, name: &str) -> Result<&'a Map<String, Value>> {
    match root.get(name) {
        Some(Value::Object(map)) => Ok(map),
        Some(_) => Err(invalid(name, "(section)", "section must be a mapping")),
        None => Err(invalid(
            name,
            "(section)",
            &format!("missing required section '{}'", name),
        )),
    }
}

fn require_str<'a>(section: &'a Map<String, Value>, name: &str, field: &str) -> Result<&'a str> {
    match section.get(field) {
        Some(Value::String(s)) => Ok(s),
        Some(_) => Err(invalid(
            name,
            field,
            &format!("field '{}' must be a string", field),
        )),
        None => Err(missing(name, field)),
    }
}

fn require_non_empty<'a>(
    section: &'a Map<String, Value>,
    name: &str,
    field: &str,
) -> Result<&'a str> {
    let value = require_str(section, name, field)?;
    if value.trim().is_empty() {
        return Err(invalid(
            name,
            field,
            &format!("field '{}' must not be empty", field),
        ));
    }
    Ok(value)
}

fn optional_str(section: &Map<String, Value>, name: &str, field: &str) -> Result<()> {
    match section.get(field) {
        None | Some(Value::Null) | Some(Value::String(_)) => Ok(()),
        Some(_) => Err(invalid(
            name,
            field,
            &format!("field '{}' must be a string or null", field),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field_of(err: Error) -> (String, String) {
        match err {
            Error::ConfigValidation { section, field, .. } => (section, field),
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    fn without(section: &str, field: &str) -> Value {
        let mut config = default_config();
        config[section].as_object_mut().unwrap().remove(field);
        config
    }

    fn with(section: &str, field: &str, value: Value) -> Value {
        let mut config = default_config();
        config[section][field] = value;
        config
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&default_config()).is_ok());
    }

    #[test]
    fn test_typed_view_of_defaults() {
        let config = WorkflowConfig::from_value(&default_config()).unwrap();
        assert_eq!(config.branches.main, "main");
        assert_eq!(config.merge.strategy, MergeStrategy::Merge);
        assert!(!config.merge.squash);
        assert_eq!(config.logging.level, LogLevel::Info);
        assert_eq!(config.repository.remote_url(), None);
        assert!((config.agent.temperature - 0.7).abs() < f64::EPSILON);
    }

    #[test]
    fn test_each_missing_section_is_named() {
        for name in SECTIONS {
            let mut config = default_config();
            config.as_object_mut().unwrap().remove(name);
            let (section, _) = field_of(validate(&config).unwrap_err());
            assert_eq!(section, name);
        }
    }

    #[test]
    fn test_each_missing_required_field_is_named() {
        let required = [
            ("repository", "path"),
            ("repository", "remote"),
            ("branches", "main"),
            ("branches", "prefix"),
            ("commit", "author_name"),
            ("commit", "author_email"),
            ("commit", "message_template"),
            ("merge", "strategy"),
            ("merge", "squash"),
            ("logging", "level"),
            ("logging", "file"),
            ("agent", "model"),
            ("agent", "temperature"),
        ];
        for (section, field) in required {
            let err = validate(&without(section, field)).unwrap_err();
            assert_eq!(field_of(err), (section.to_string(), field.to_string()));
        }
    }

    #[test]
    fn test_remote_url_is_optional() {
        assert!(validate(&without("repository", "remote_url")).is_ok());
        assert!(validate(&with("repository", "remote_url", json!("git@host:r.git"))).is_ok());
        let err = validate(&with("repository", "remote_url", json!(42))).unwrap_err();
        assert_eq!(field_of(err).1, "remote_url");
    }

    #[test]
    fn test_invalid_email_rejected() {
        for email in ["not-an-email", "a@b", "@example.com", "a b@example.com"] {
            let err = validate(&with("commit", "author_email", json!(email))).unwrap_err();
            assert_eq!(field_of(err), ("commit".into(), "author_email".into()));
        }
    }

    #[test]
    fn test_invalid_strategy_rejected() {
        let err = validate(&with("merge", "strategy", json!("octopus"))).unwrap_err();
        assert!(err.to_string().contains("octopus"));
        assert_eq!(field_of(err).1, "strategy");
        assert!(validate(&with("merge", "strategy", json!("rebase"))).is_ok());
    }

    #[test]
    fn test_error_message_names_the_field() {
        let cases = [
            ("commit", "author_email", json!("nobody"), "commit.author_email"),
            ("merge", "strategy", json!("octopus"), "merge.strategy"),
            ("logging", "level", json!("verbose"), "logging.level"),
        ];
        for (section, field, value, location) in cases {
            let message = validate(&with(section, field, value)).unwrap_err().to_string();
            assert!(
                message.starts_with(&format!("Invalid configuration in '{}': ", location)),
                "unexpected message: {message}"
            );
        }

        let mut config = default_config();
        config.as_object_mut().unwrap().remove("merge");
        let message = validate(&config).unwrap_err().to_string();
        assert!(message.starts_with("Invalid configuration in 'merge': "));
    }

    #[test]
    fn test_squash_must_be_bool() {
        let err = validate(&with("merge", "squash", json!("yes"))).unwrap_err();
        assert_eq!(field_of(err).1, "squash");
    }

    #[test]
    fn test_log_level_is_case_sensitive() {
        let err = validate(&with("logging", "level", json!("info"))).unwrap_err();
        assert_eq!(field_of(err).1, "level");
        for level in ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL"] {
            assert!(validate(&with("logging", "level", json!(level))).is_ok());
        }
    }

    #[test]
    fn test_temperature_bounds() {
        assert!(validate(&with("agent", "temperature", json!(0))).is_ok());
        assert!(validate(&with("agent", "temperature", json!(1.0))).is_ok());
        for bad in [json!(1.5), json!(-0.1), json!("0.5")] {
            let err = validate(&with("agent", "temperature", bad)).unwrap_err();
            assert_eq!(field_of(err).1, "temperature");
        }
    }

    #[test]
    fn test_non_mapping_root_rejected() {
        assert!(validate(&Value::Null).is_err());
        assert!(validate(&json!(["repository"])).is_err());
    }

    #[test]
    fn test_section_must_be_mapping() {
        let mut config = default_config();
        config["merge"] = json!("merge");
        assert_eq!(field_of(validate(&config).unwrap_err()).0, "merge");
    }

    #[test]
    fn test_migrate_legacy_agent_section() {
        let mut config = default_config();
        let agent = config.as_object_mut().unwrap().remove("agent").unwrap();
        config["ai_agent"] = agent;
        assert!(validate(&config).is_err());

        assert!(migrate_legacy_sections(&mut config));
        assert!(validate(&config).is_ok());
        assert!(config.get("ai_agent").is_none());
        assert!(!migrate_legacy_sections(&mut config));
    }

    #[test]
    fn test_format_message() {
        let config = WorkflowConfig::from_value(&default_config()).unwrap();
        assert_eq!(config.commit.format_message("add login"), "feat: add login");

        let prefix_only = CommitSettings {
            message_template: "wip: ".to_string(),
            ..config.commit
        };
        assert_eq!(prefix_only.format_message("x"), "wip: x");
    }

    #[test]
    fn test_feature_name_prefix() {
        let config = WorkflowConfig::from_value(&default_config()).unwrap();
        assert_eq!(config.branches.feature_name("login"), "feature/login");
        assert_eq!(config.branches.feature_name("feature/login"), "feature/login");
    }
}
