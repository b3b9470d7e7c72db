use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use super::{cancellable, DEBUG_MAX_TOKENS};
use crate::ai::{prompts, CompletionGateway, ContentPart};
use crate::capture::Screenshot;
use crate::decode::{decode, decode_or_synthesize, Salvage};
use crate::error::{Error, Result};
use crate::problem::{
    code_map, complexity, text_list, text_or, CodeSolution, CodingProblem, DebugReport,
    ProblemInfo, RefinedResult, Solution, TechnicalRequirement, JAVASCRIPT, PYTHON,
};

const DEFAULT_ANALYSIS: &str = "Analysis of debug information";
const DEFAULT_EXPLANATION: &str = "Improved solution based on debug information";

/// Refine an earlier result with new evidence.
///
/// Fails with `Error::Precondition` before touching the gateway when no
/// problem has been extracted yet.
pub async fn refine(
    gateway: &dyn CompletionGateway,
    problem: Option<&ProblemInfo>,
    prior: Option<&Solution>,
    screenshots: &[Screenshot],
    token: &CancellationToken,
) -> Result<RefinedResult> {
    let problem = problem.ok_or_else(|| {
        Error::Precondition(
            "No problem information available. Process a problem first.".to_string(),
        )
    })?;
    if screenshots.is_empty() {
        return Err(Error::Precondition("No screenshots to debug".to_string()));
    }

    log::info!(
        "Refining {} with {} screenshot(s)",
        problem.type_name(),
        screenshots.len()
    );
    match problem {
        ProblemInfo::LeetcodeProblem(coding) => {
            let prior_code = match prior {
                Some(Solution::LeetcodeProblem(code)) => Some(code),
                _ => None,
            };
            debug_coding_problem(gateway, coding, prior_code, screenshots, token)
                .await
                .map(RefinedResult::LeetcodeProblem)
        }
        ProblemInfo::TechnicalRequirement(requirement) => {
            refine_requirements(gateway, requirement, screenshots, token)
                .await
                .map(RefinedResult::TechnicalRequirement)
        }
    }
}

async fn debug_coding_problem(
    gateway: &dyn CompletionGateway,
    problem: &CodingProblem,
    prior: Option<&CodeSolution>,
    screenshots: &[Screenshot],
    token: &CancellationToken,
) -> Result<DebugReport> {
    let test_cases = serde_json::to_string_pretty(&problem.test_cases)
        .map_err(|e| Error::Validation(format!("Could not serialise test cases: {}", e)))?;
    let prompt = prompts::leetcode_debug_user(
        &problem.problem_statement,
        &test_cases,
        prior.map(CodeSolution::primary_code),
    );

    let response = cancellable(
        token,
        gateway.complete_vision(
            prompts::LEETCODE_DEBUG_SYSTEM,
            &with_images(&prompt, screenshots),
            DEBUG_MAX_TOKENS,
        ),
    )
    .await?;
    log::debug!("Debug response: {} chars", response.len());

    let value = match decode_or_synthesize(&response, synthesize_debug_report) {
        value @ Value::Object(_) => value,
        _ => synthesize_debug_report(&Salvage::new(&response)),
    };
    Ok(build_debug_report(&value, prior))
}

/// Last-resort reconstruction for the leetcode debug path.
fn synthesize_debug_report(salvage: &Salvage<'_>) -> Value {
    json!({
        "debug_analysis": salvage.string_field("debug_analysis"),
        "improved_solution": {
            "explanation": salvage.string_field("explanation"),
            "complexity": {
                "time": salvage.string_field("time"),
                "space": salvage.string_field("space"),
            },
            "code": {
                JAVASCRIPT: salvage.code_block(JAVASCRIPT),
                PYTHON: salvage.code_block(PYTHON),
            },
        },
    })
}

fn build_debug_report(value: &Value, prior: Option<&CodeSolution>) -> DebugReport {
    let improved = value.get("improved_solution");
    let explanation = text_or(
        improved.and_then(|s| s.get("explanation")),
        DEFAULT_EXPLANATION,
    );
    let (time_complexity, space_complexity) =
        complexity(improved.and_then(|s| s.get("complexity")));

    DebugReport {
        debug_analysis: text_or(value.get("debug_analysis"), DEFAULT_ANALYSIS),
        improved_solution: CodeSolution {
            code: code_map(
                improved.and_then(|s| s.get("code")),
                prior.map(|p| &p.code),
            ),
            primary_language: PYTHON.to_string(),
            thoughts: vec![explanation.clone()],
            explanation,
            time_complexity,
            space_complexity,
            alternative_solutions: Vec::new(),
        },
    }
}

async fn refine_requirements(
    gateway: &dyn CompletionGateway,
    requirement: &TechnicalRequirement,
    screenshots: &[Screenshot],
    token: &CancellationToken,
) -> Result<TechnicalRequirement> {
    let prompt = prompts::project_debug_user(
        &requirement.project_title,
        &requirement.requirements_list.join(", "),
    );

    let response = cancellable(
        token,
        gateway.complete_vision(
            prompts::PROJECT_DEBUG_SYSTEM,
            &with_images(&prompt, screenshots),
            DEBUG_MAX_TOKENS,
        ),
    )
    .await?;
    log::debug!("Requirement refinement response: {} chars", response.len());

    let value = decode(&response)?;
    let obj = value.as_object().ok_or_else(|| {
        Error::Validation("expected a JSON object for the refined requirements".to_string())
    })?;

    let mut enhanced = requirement.clone();
    // Append-only: the model is asked for new items but may repeat old ones
    enhanced
        .requirements_list
        .extend(text_list(obj.get("enhanced_requirements")));

    let ui_ux = text_list(obj.get("ui_ux_considerations"));
    if !ui_ux.is_empty() {
        enhanced.ui_ux_considerations = ui_ux;
    }
    let additional = text_list(obj.get("additional_specifications"));
    if !additional.is_empty() {
        enhanced.additional_specifications = additional;
    }

    Ok(enhanced)
}

fn with_images<'a>(prompt: &'a str, screenshots: &'a [Screenshot]) -> Vec<ContentPart<'a>> {
    std::iter::once(ContentPart::Text(prompt))
        .chain(screenshots.iter().map(|s| ContentPart::Image(&s.bytes)))
        .collect()
}
