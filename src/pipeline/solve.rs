use std::collections::BTreeMap;
use tokio_util::sync::CancellationToken;

use super::{cancellable, SOLUTION_MAX_TOKENS};
use crate::ai::{prompts, CompletionGateway};
use crate::decode::{decode, truncate_chars};
use crate::error::{Error, Result};
use crate::problem::{
    CodeSolution, CodingProblem, FileEntry, ImplementationStep, KeyFeature, ProblemInfo,
    ProjectPlan, ProjectSolution, Solution, TechnicalRequirement, JAVASCRIPT, PYTHON,
};

const RAW_PREVIEW_CHARS: usize = 500;

pub const FALLBACK_NOTICE: &str =
    "Could not parse the model's response. Showing an example solution instead.";

const FALLBACK_JAVASCRIPT: &str = r#"function findMedianSortedArrays(nums1, nums2) {
  const merged = [...nums1, ...nums2].sort((a, b) => a - b);
  const mid = Math.floor(merged.length / 2);
  if (merged.length % 2 === 0) {
    return (merged[mid - 1] + merged[mid]) / 2;
  }
  return merged[mid];
}"#;

const FALLBACK_PYTHON: &str = r#"def find_median_sorted_arrays(nums1, nums2):
    merged = sorted(nums1 + nums2)
    mid = len(merged) // 2
    if len(merged) % 2 == 0:
        return (merged[mid - 1] + merged[mid]) / 2
    return merged[mid]"#;

/// Produce a [`Solution`] for `problem`.
///
/// A response that cannot be decoded or has the wrong shape degrades to a
/// documented fallback solution. Gateway failures and cancellation propagate.
pub async fn generate(
    gateway: &dyn CompletionGateway,
    problem: &ProblemInfo,
    token: &CancellationToken,
) -> Result<Solution> {
    log::info!("Generating solution for {}", problem.type_name());
    match problem {
        ProblemInfo::LeetcodeProblem(coding) => {
            solve_coding_problem(gateway, coding, token)
                .await
                .map(Solution::LeetcodeProblem)
        }
        ProblemInfo::TechnicalRequirement(requirement) => {
            plan_project(gateway, requirement, token)
                .await
                .map(Solution::TechnicalRequirement)
        }
    }
}

async fn solve_coding_problem(
    gateway: &dyn CompletionGateway,
    problem: &CodingProblem,
    token: &CancellationToken,
) -> Result<CodeSolution> {
    let problem_json = serde_json::to_string_pretty(problem)
        .map_err(|e| Error::Validation(format!("Could not serialise problem: {}", e)))?;

    let response = cancellable(
        token,
        gateway.complete_text(
            prompts::LEETCODE_SOLUTION_SYSTEM,
            &prompts::leetcode_solution_user(&problem_json),
            SOLUTION_MAX_TOKENS,
            true,
        ),
    )
    .await?;
    log::debug!("Solution response: {} chars", response.len());

    match decode(&response)
        .map_err(Error::from)
        .and_then(|value| CodeSolution::from_value(&value))
    {
        Ok(solution) => Ok(solution),
        Err(e) if e.is_decode() => {
            log::warn!("{}; using fallback solution", e);
            Ok(fallback_code_solution(&response))
        }
        Err(e) => Err(e),
    }
}

async fn plan_project(
    gateway: &dyn CompletionGateway,
    requirement: &TechnicalRequirement,
    token: &CancellationToken,
) -> Result<ProjectSolution> {
    let user_prompt = prompts::project_plan_user(
        &requirement.project_title,
        &requirement.requirements_list.join(", "),
        &requirement.tech_stack.join(", "),
        &requirement.optional_features.join(", "),
    );

    let response = cancellable(
        token,
        gateway.complete_text(
            prompts::PROJECT_PLAN_SYSTEM,
            &user_prompt,
            SOLUTION_MAX_TOKENS,
            true,
        ),
    )
    .await?;
    log::debug!("Project plan response: {} chars", response.len());

    match decode(&response)
        .map_err(Error::from)
        .and_then(|value| ProjectSolution::from_value(&value))
    {
        Ok(plan) => Ok(plan),
        Err(e) if e.is_decode() => {
            log::warn!("{}; using fallback project plan", e);
            Ok(fallback_project_solution(&requirement.project_title))
        }
        Err(e) => Err(e),
    }
}

/// Canned median-of-two-arrays solution, with the raw response kept in
/// `thoughts` so the failure stays visible.
pub fn fallback_code_solution(raw_response: &str) -> CodeSolution {
    let code: BTreeMap<String, String> = [
        (JAVASCRIPT.to_string(), FALLBACK_JAVASCRIPT.to_string()),
        (PYTHON.to_string(), FALLBACK_PYTHON.to_string()),
    ]
    .into_iter()
    .collect();

    CodeSolution {
        code,
        primary_language: PYTHON.to_string(),
        explanation: "Example solution: merge both arrays, sort the result and read the middle \
                      element (or the mean of the two middle elements)."
            .to_string(),
        thoughts: vec![
            FALLBACK_NOTICE.to_string(),
            truncate_chars(raw_response, RAW_PREVIEW_CHARS),
        ],
        time_complexity: "O(n log n)".to_string(),
        space_complexity: "O(n)".to_string(),
        alternative_solutions: Vec::new(),
    }
}

/// Minimal two-tier web application plan.
pub fn fallback_project_solution(project_title: &str) -> ProjectSolution {
    let mut project_plan = ProjectPlan {
        overview: format!(
            "{}: the model's plan could not be parsed, so this is a starter two-tier web \
             application to build on.",
            project_title
        ),
        architecture: "A React single-page frontend talking to a Node.js/Express REST API \
                       backed by MongoDB."
            .to_string(),
        ..ProjectPlan::default()
    };
    for (category, items) in [
        ("frontend", vec!["React"]),
        ("backend", vec!["Node.js", "Express"]),
        ("database", vec!["MongoDB"]),
        ("deployment", vec!["Vercel"]),
    ] {
        project_plan.tech_stack.insert(
            category.to_string(),
            items.into_iter().map(str::to_string).collect(),
        );
    }

    ProjectSolution {
        project_plan,
        implementation_steps: vec![
            ImplementationStep {
                step: "Set up the project".to_string(),
                details: "Create the React app and an Express server, each with its own \
                          package.json."
                    .to_string(),
            },
            ImplementationStep {
                step: "Build the API".to_string(),
                details: "Add REST endpoints for the core entities and connect them to MongoDB."
                    .to_string(),
            },
            ImplementationStep {
                step: "Build the UI".to_string(),
                details: "Create components for each screen and call the API from them."
                    .to_string(),
            },
        ],
        file_structure: vec![FileEntry {
            path: "src/App.js".to_string(),
            purpose: "Root React component".to_string(),
            code_sample: "export default function App() {\n  return <main />;\n}".to_string(),
        }],
        key_features: vec![KeyFeature {
            feature: "Core CRUD workflow".to_string(),
            implementation: "REST endpoints plus React forms and list views.".to_string(),
        }],
    }
}
