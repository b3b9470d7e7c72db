//! Typed problem and solution data.
//!
//! Model output is decoded into a loose `serde_json::Value` first; the
//! `from_value` constructors here validate the shape and fill every optional
//! field with a typed default so nothing downstream has to check for absence.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use crate::error::{Error, Result};

pub const LEETCODE_PROBLEM: &str = "leetcode_problem";
pub const TECHNICAL_REQUIREMENT: &str = "technical_requirement";

pub const JAVASCRIPT: &str = "javascript";
pub const PYTHON: &str = "python";

pub const NO_JAVASCRIPT_SOLUTION: &str = "// No JavaScript solution available";
pub const NO_PYTHON_SOLUTION: &str = "# No Python solution available";
const DEFAULT_COMPLEXITY: &str = "O(n)";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProblemInfo {
    LeetcodeProblem(CodingProblem),
    TechnicalRequirement(TechnicalRequirement),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodingProblem {
    pub problem_statement: String,
    pub input_format: InputFormat,
    pub output_format: OutputFormat,
    pub constraints: Vec<Value>,
    pub test_cases: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputFormat {
    pub description: String,
    pub parameters: Vec<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputFormat {
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TechnicalRequirement {
    pub project_title: String,
    pub requirements_list: Vec<String>,
    pub tech_stack: Vec<String>,
    pub optional_features: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ui_ux_considerations: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_specifications: Vec<String>,
}

impl Default for InputFormat {
    fn default() -> Self {
        Self {
            description: "Input parameters".to_string(),
            parameters: Vec::new(),
        }
    }
}

impl Default for OutputFormat {
    fn default() -> Self {
        Self {
            description: "Output value".to_string(),
            kind: "any".to_string(),
            subtype: None,
        }
    }
}

impl ProblemInfo {
    /// Validate a decoded classification response.
    ///
    /// A missing or unrecognised `type` is treated as `leetcode_problem`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = as_object(value, "classification")?;

        let kind = obj.get("type").and_then(Value::as_str).unwrap_or_default();
        match kind {
            TECHNICAL_REQUIREMENT => Ok(ProblemInfo::TechnicalRequirement(
                TechnicalRequirement::from_object(obj),
            )),
            LEETCODE_PROBLEM => Ok(ProblemInfo::LeetcodeProblem(CodingProblem::from_object(obj))),
            other => {
                log::warn!(
                    "Classification returned type {:?}; defaulting to {}",
                    other,
                    LEETCODE_PROBLEM
                );
                Ok(ProblemInfo::LeetcodeProblem(CodingProblem::from_object(obj)))
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            ProblemInfo::LeetcodeProblem(_) => LEETCODE_PROBLEM,
            ProblemInfo::TechnicalRequirement(_) => TECHNICAL_REQUIREMENT,
        }
    }
}

impl CodingProblem {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let input_format = obj
            .get("input_format")
            .and_then(Value::as_object)
            .map(|f| {
                let defaults = InputFormat::default();
                InputFormat {
                    description: text_or(f.get("description"), &defaults.description),
                    parameters: array(f.get("parameters")),
                }
            })
            .unwrap_or_default();

        let output_format = obj
            .get("output_format")
            .and_then(Value::as_object)
            .map(|f| {
                let defaults = OutputFormat::default();
                OutputFormat {
                    description: text_or(f.get("description"), &defaults.description),
                    kind: text_or(f.get("type"), &defaults.kind),
                    subtype: f.get("subtype").and_then(Value::as_str).map(str::to_string),
                }
            })
            .unwrap_or_default();

        Self {
            problem_statement: text_or(obj.get("problem_statement"), ""),
            input_format,
            output_format,
            constraints: array(obj.get("constraints")),
            test_cases: array(obj.get("test_cases")),
        }
    }
}

impl TechnicalRequirement {
    fn from_object(obj: &Map<String, Value>) -> Self {
        let mut tech_stack: Vec<String> = Vec::new();
        for item in text_list(obj.get("tech_stack")) {
            if !tech_stack.contains(&item) {
                tech_stack.push(item);
            }
        }

        Self {
            project_title: text_or(obj.get("project_title"), "Technical Project"),
            requirements_list: text_list(obj.get("requirements_list")),
            tech_stack,
            optional_features: text_list(obj.get("optional_features")),
            ui_ux_considerations: text_list(obj.get("ui_ux_considerations")),
            additional_specifications: text_list(obj.get("additional_specifications")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Solution {
    LeetcodeProblem(CodeSolution),
    TechnicalRequirement(ProjectSolution),
}

impl Solution {
    pub fn type_name(&self) -> &'static str {
        match self {
            Solution::LeetcodeProblem(_) => LEETCODE_PROBLEM,
            Solution::TechnicalRequirement(_) => TECHNICAL_REQUIREMENT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeSolution {
    /// Language name to source text.
    pub code: BTreeMap<String, String>,
    pub primary_language: String,
    pub explanation: String,
    pub thoughts: Vec<String>,
    pub time_complexity: String,
    pub space_complexity: String,
    #[serde(default)]
    pub alternative_solutions: Vec<AlternativeSolution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlternativeSolution {
    pub explanation: String,
    pub time_complexity: String,
    pub space_complexity: String,
    pub code: BTreeMap<String, String>,
}

impl CodeSolution {
    /// Build from a decoded `{"solution": {...}, "alternative_solutions": [...]}`.
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = as_object(value, "solution")?;
        let primary = obj.get("solution").and_then(Value::as_object);

        let explanation = text_or(
            primary.and_then(|s| s.get("explanation")),
            "No explanation available",
        );
        let (time_complexity, space_complexity) =
            complexity(primary.and_then(|s| s.get("complexity")));

        let alternative_solutions: Vec<AlternativeSolution> = obj
            .get("alternative_solutions")
            .and_then(Value::as_array)
            .map(|alts| alts.iter().filter_map(AlternativeSolution::from_value).collect())
            .unwrap_or_default();

        let mut thoughts = vec![explanation.clone()];
        thoughts.extend(
            alternative_solutions
                .iter()
                .map(|alt| format!("Alternative: {}", alt.explanation)),
        );

        Ok(Self {
            code: code_map(primary.and_then(|s| s.get("code")), None),
            primary_language: PYTHON.to_string(),
            explanation,
            thoughts,
            time_complexity,
            space_complexity,
            alternative_solutions,
        })
    }

    pub fn primary_code(&self) -> &str {
        self.code
            .get(&self.primary_language)
            .map(String::as_str)
            .unwrap_or_default()
    }
}

impl AlternativeSolution {
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        let (time_complexity, space_complexity) = complexity(obj.get("complexity"));
        Some(Self {
            explanation: text_or(obj.get("explanation"), ""),
            time_complexity,
            space_complexity,
            code: obj
                .get("code")
                .and_then(Value::as_object)
                .map(|code| {
                    code.iter()
                        .filter_map(|(lang, src)| Some((lang.clone(), src.as_str()?.to_string())))
                        .collect()
                })
                .unwrap_or_default(),
        })
    }
}

/// `(time, space)` from a `{"time": .., "space": ..}` object.
pub(crate) fn complexity(value: Option<&Value>) -> (String, String) {
    let obj = value.and_then(Value::as_object);
    (
        text_or(obj.and_then(|c| c.get("time")), DEFAULT_COMPLEXITY),
        text_or(obj.and_then(|c| c.get("space")), DEFAULT_COMPLEXITY),
    )
}

/// A `javascript`/`python` code map where each missing entry comes from
/// `prior`, or else the "no solution" placeholder.
pub(crate) fn code_map(
    value: Option<&Value>,
    prior: Option<&BTreeMap<String, String>>,
) -> BTreeMap<String, String> {
    let obj = value.and_then(Value::as_object);
    [(JAVASCRIPT, NO_JAVASCRIPT_SOLUTION), (PYTHON, NO_PYTHON_SOLUTION)]
        .into_iter()
        .map(|(lang, placeholder)| {
            let src = obj
                .and_then(|c| c.get(lang))
                .and_then(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .or_else(|| {
                    prior
                        .and_then(|p| p.get(lang))
                        .filter(|s| !s.trim().is_empty())
                        .cloned()
                })
                .unwrap_or_else(|| placeholder.to_string());
            (lang.to_string(), src)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSolution {
    pub project_plan: ProjectPlan,
    pub implementation_steps: Vec<ImplementationStep>,
    pub file_structure: Vec<FileEntry>,
    pub key_features: Vec<KeyFeature>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectPlan {
    pub overview: String,
    pub architecture: String,
    /// Category (frontend, backend, ...) to technologies.
    pub tech_stack: BTreeMap<String, Vec<String>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImplementationStep {
    pub step: String,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEntry {
    pub path: String,
    pub purpose: String,
    pub code_sample: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyFeature {
    pub feature: String,
    pub implementation: String,
}

const STACK_CATEGORIES: [&str; 4] = ["frontend", "backend", "database", "deployment"];

impl Default for ProjectPlan {
    fn default() -> Self {
        Self {
            overview: "Project overview not available".to_string(),
            architecture: "Architecture details not available".to_string(),
            tech_stack: STACK_CATEGORIES
                .iter()
                .map(|c| (c.to_string(), Vec::new()))
                .collect(),
        }
    }
}

impl ProjectSolution {
    pub fn from_value(value: &Value) -> Result<Self> {
        let obj = as_object(value, "project plan")?;

        let project_plan = obj
            .get("project_plan")
            .and_then(Value::as_object)
            .map(|plan| {
                let defaults = ProjectPlan::default();
                let mut tech_stack = defaults.tech_stack.clone();
                if let Some(stack) = plan.get("tech_stack").and_then(Value::as_object) {
                    for (category, items) in stack {
                        tech_stack.insert(category.clone(), text_list(Some(items)));
                    }
                }
                ProjectPlan {
                    overview: text_or(plan.get("overview"), &defaults.overview),
                    architecture: text_or(plan.get("architecture"), &defaults.architecture),
                    tech_stack,
                }
            })
            .unwrap_or_default();

        Ok(Self {
            project_plan,
            implementation_steps: objects(obj.get("implementation_steps"), |o| ImplementationStep {
                step: text_or(o.get("step"), ""),
                details: text_or(o.get("details"), ""),
            }),
            file_structure: objects(obj.get("file_structure"), |o| FileEntry {
                path: text_or(o.get("path"), ""),
                purpose: text_or(o.get("purpose"), ""),
                code_sample: text_or(o.get("code_sample"), ""),
            }),
            key_features: objects(obj.get("key_features"), |o| KeyFeature {
                feature: text_or(o.get("feature"), ""),
                implementation: text_or(o.get("implementation"), ""),
            }),
        })
    }
}

/// Outcome of a debug/iteration pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RefinedResult {
    LeetcodeProblem(DebugReport),
    TechnicalRequirement(TechnicalRequirement),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DebugReport {
    pub debug_analysis: String,
    pub improved_solution: CodeSolution,
}

fn as_object<'a>(value: &'a Value, what: &str) -> Result<&'a Map<String, Value>> {
    value.as_object().ok_or_else(|| {
        Error::Validation(format!(
            "expected a JSON object for the {}, got {}",
            what,
            kind_of(value)
        ))
    })
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Non-empty string value, or `default`.
pub(crate) fn text_or(value: Option<&Value>, default: &str) -> String {
    value
        .and_then(Value::as_str)
        .filter(|s| !s.trim().is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| default.to_string())
}

/// Strings stay as they are; anything else becomes compact JSON text.
pub(crate) fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// A list of text items. A lone string becomes a one-item list.
pub(crate) fn text_list(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items
            .iter()
            .filter(|v| !v.is_null())
            .map(value_text)
            .collect(),
        Some(Value::String(s)) if !s.trim().is_empty() => vec![s.clone()],
        _ => Vec::new(),
    }
}

fn array(value: Option<&Value>) -> Vec<Value> {
    value.and_then(Value::as_array).cloned().unwrap_or_default()
}

fn objects<T>(value: Option<&Value>, build: impl Fn(&Map<String, Value>) -> T) -> Vec<T> {
    value
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_object).map(&build).collect())
        .unwrap_or_default()
}
