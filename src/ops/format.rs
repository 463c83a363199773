//! Output formatting for plans and create reports (human/JSON).

use serde::Serialize;

use crate::builder::variables::BuildVariables;
use crate::core::dependency::DependencyKind;
use crate::core::option::{OptionValue, RemovedOption, ResolvedConfiguration};
use crate::core::platform::Platform;
use crate::core::recipe::PackageIdentity;
use crate::ops::create::{CreateReport, Plan};
use crate::ops::lifecycle::{LifecycleStage, StageRecord, StageStatus};
use crate::ops::validate::ValidationReport;

/// Output format for command results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable output (default)
    #[default]
    Human,
    /// Machine-readable JSON output
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = OutputFormatParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "human" => Ok(OutputFormat::Human),
            "json" => Ok(OutputFormat::Json),
            _ => Err(OutputFormatParseError(s.to_string())),
        }
    }
}

/// Error parsing output format option.
#[derive(Debug, Clone, thiserror::Error)]
#[error("invalid output format '{0}', valid values: human, json")]
pub struct OutputFormatParseError(pub String);

#[derive(Serialize)]
struct PlanJson<'a> {
    package: &'a PackageIdentity,
    platform: &'a Platform,
    package_id: &'a str,
    options: &'a std::collections::BTreeMap<String, OptionValue>,
    removed: &'a [RemovedOption],
    dependencies: Vec<DependencyJson<'a>>,
    variables: &'a BuildVariables,
}

#[derive(Serialize)]
struct DependencyJson<'a> {
    name: &'a str,
    version: String,
    kind: DependencyKind,
    transitive_headers: bool,
}

impl<'a> PlanJson<'a> {
    fn new(plan: &'a Plan) -> Self {
        PlanJson {
            package: &plan.package,
            platform: &plan.platform,
            package_id: &plan.package_id,
            options: plan.configuration.values(),
            removed: plan.configuration.removed(),
            dependencies: plan
                .dependencies
                .iter()
                .map(|d| DependencyJson {
                    name: d.name(),
                    version: d.version().to_string(),
                    kind: d.kind(),
                    transitive_headers: d.transitive_headers(),
                })
                .collect(),
            variables: &plan.variables,
        }
    }
}

#[derive(Serialize)]
struct CreateJson<'a> {
    #[serde(flatten)]
    plan: PlanJson<'a>,
    build_dir: String,
    artifact_location: String,
    stages: &'a [StageRecord],
    #[serde(skip_serializing_if = "Option::is_none")]
    validation: Option<&'a ValidationReport>,
}

/// Format a plan for display (human-readable).
pub fn format_plan(plan: &Plan) -> String {
    let mut output = String::new();

    output.push_str(&format!("Package: {} ({})\n", plan.package, plan.package.kind));
    output.push_str(&format!("Platform: {}\n", plan.platform));
    output.push_str(&format!("Package ID: {}\n", &plan.package_id[..16]));

    output.push_str(&format_configuration(&plan.configuration));

    output.push_str("\nDependencies:\n");
    if plan.dependencies.is_empty() {
        output.push_str("  (none)\n");
    }
    for dep in &plan.dependencies {
        let mut flags = Vec::new();
        if dep.kind() == DependencyKind::TestRequires {
            flags.push("test");
        }
        if dep.transitive_headers() {
            flags.push("transitive headers");
        }
        if flags.is_empty() {
            output.push_str(&format!("  {}\n", dep));
        } else {
            output.push_str(&format!("  {} [{}]\n", dep, flags.join(", ")));
        }
    }

    output.push_str("\nBuild variables:\n");
    for (name, value) in plan.variables.iter() {
        output.push_str(&format!("  {} = {}\n", name, value));
    }

    output
}

fn format_configuration(config: &ResolvedConfiguration) -> String {
    let mut output = String::from("\nOptions:\n");
    let width = config.iter().map(|(name, _)| name.len()).max().unwrap_or(0);
    for (name, value) in config.iter() {
        output.push_str(&format!("  {:width$}  {}\n", name, value, width = width));
    }
    for removed in config.removed() {
        output.push_str(&format!("  {:width$}  (removed: {})\n", removed.name, removed.reason, width = width));
    }
    output
}

/// Format a plan as JSON.
pub fn format_plan_json(plan: &Plan) -> String {
    serde_json::to_string_pretty(&PlanJson::new(plan))
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize plan: {}"}}"#, e))
}

/// Format a create report for display (human-readable).
pub fn format_create(report: &CreateReport, verbose: bool) -> String {
    let mut output = String::new();
    let lifecycle = &report.lifecycle;

    output.push_str(&format!(
        "Create: {} for {}\n",
        report.plan.package, report.plan.platform
    ));
    output.push_str(&format!("{}\n\n", "=".repeat(50)));

    for record in &lifecycle.stages {
        output.push_str(&format_stage(record));
    }
    if let Some(validation) = &report.validation {
        // Consumer build stages are noise unless asked for.
        let stages = validation
            .stages
            .iter()
            .filter(|r| verbose || r.stage == LifecycleStage::ValidatePackage);
        for record in stages {
            output.push_str(&format_stage(record));
        }
    }

    output.push_str(&format!("\nPackage: {}\n", lifecycle.artifact_location.display()));
    if let Some(info) = &lifecycle.package_info {
        if !info.libs.is_empty() {
            output.push_str(&format!("Libraries: {}\n", info.libs.join(", ")));
        }
    }
    if verbose {
        output.push_str(&format!("Build directory: {}\n", lifecycle.build_dir.display()));
    }

    output
}

fn format_stage(record: &StageRecord) -> String {
    let mut output = match &record.status {
        StageStatus::Passed => format!("  [OK]   {} ({:.2?})\n", record.stage, record.duration),
        StageStatus::Skipped { reason } => format!("  [SKIP] {} ({})\n", record.stage, reason),
        StageStatus::Failed { message } => {
            format!("  [FAIL] {} ({:.2?})\n      {}\n", record.stage, record.duration, message)
        }
    };
    for warning in &record.warnings {
        output.push_str(&format!("      Warning: {}\n", warning));
    }
    output
}

/// Format a create report as JSON.
pub fn format_create_json(report: &CreateReport) -> String {
    let json = CreateJson {
        plan: PlanJson::new(&report.plan),
        build_dir: report.lifecycle.build_dir.display().to_string(),
        artifact_location: report.lifecycle.artifact_location.display().to_string(),
        stages: &report.lifecycle.stages,
        validation: report.validation.as_ref(),
    };
    serde_json::to_string_pretty(&json)
        .unwrap_or_else(|e| format!(r#"{{"error": "Failed to serialize report: {}"}}"#, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::option::OptionOverrides;
    use crate::core::platform::{Arch, Os};
    use crate::ops::create::plan;
    use crate::test_support::fixtures::base_recipe;

    fn windows_plan() -> Plan {
        let windows = Platform::new(Os::Windows, Arch::X86_64);
        plan(&base_recipe(), &OptionOverrides::new(), windows, windows).unwrap()
    }

    #[test]
    fn test_output_format_parse() {
        assert_eq!("json".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
        assert_eq!("Human".parse::<OutputFormat>().unwrap(), OutputFormat::Human);
        assert!("yaml".parse::<OutputFormat>().is_err());
    }

    #[test]
    fn test_format_plan_human() {
        let output = format_plan(&windows_plan());

        assert!(output.starts_with("Package: base/1.0.0 (library)"));
        assert!(output.contains("Platform: Windows-x86_64"));
        assert!(output.contains("fPIC"));
        assert!(output.contains("(removed: "));
        assert!(output.contains("  spdlog/1.15.3 [transitive headers]"));
        assert!(output.contains("  gtest/1.16.0 [test]"));
        assert!(output.contains("BUILD_SHARED_LIBS = OFF"));
    }

    #[test]
    fn test_format_plan_json() {
        let json: serde_json::Value = serde_json::from_str(&format_plan_json(&windows_plan())).unwrap();

        assert_eq!(json["package"]["name"], "base");
        assert_eq!(json["options"]["shared"], false);
        assert!(json["options"].get("fPIC").is_none());
        assert_eq!(json["removed"][0]["name"], "fPIC");
        assert_eq!(json["dependencies"][4]["kind"], "test_requires");
        assert_eq!(json["variables"]["BUILD_TESTING"], true);
    }
}
