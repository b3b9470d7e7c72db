//! Prompt text for every model call the pipelines make.

pub const EXTRACT_SCREENSHOTS_SYSTEM: &str = "You analyze screenshots of programming tasks. \
A screenshot set shows either a LeetCode-style coding problem or the technical requirements \
for a project to build. Identify which one it is and describe it as structured data.";

pub const EXTRACT_SCREENSHOTS_USER: &str = r#"Look at the screenshot(s) and decide whether they show a coding problem or technical project requirements.
Respond with a single JSON object. Its "type" field must be either "leetcode_problem" or "technical_requirement".

For "leetcode_problem" include:
  "problem_statement": string,
  "input_format": {"description": string, "parameters": array},
  "output_format": {"description": string, "type": string},
  "constraints": array,
  "test_cases": array

For "technical_requirement" include:
  "project_title": string,
  "requirements_list": array of strings,
  "tech_stack": array of strings,
  "optional_features": array of strings"#;

pub const TRANSCRIPT_ANALYSIS_SYSTEM: &str = "You analyze transcripts of technical interviews. \
Decide whether the speaker is describing a coding problem or the requirements of a project to \
build, and pull out everything needed to work on it.";

pub fn transcript_analysis_user(transcript: &str) -> String {
    format!(
        "Here is a transcript from a technical interview. Say what kind of question it is: a \
         coding problem (LeetCode style) or a request to build a project. Summarize the key \
         information. For a coding problem, list the problem statement, input and output \
         format, constraints and any test cases mentioned. For a project, list the title, \
         requirements, preferred technologies and optional features.\n\nTranscript: {}",
        transcript
    )
}

pub const TRANSCRIPT_EXTRACTION_SYSTEM: &str = "You turn an analysis of an interview question \
into structured JSON for a solution generator. Output only JSON.";

pub fn transcript_extraction_user(analysis: &str, transcript: &str) -> String {
    format!(
        "Using the analysis below, emit one JSON object describing the question.\n\n{}\n\n\
         Analysis: {}\n\nTranscript: {}",
        EXTRACT_SCREENSHOTS_USER, analysis, transcript
    )
}

pub const LEETCODE_SOLUTION_SYSTEM: &str = r##"You are a coding expert who writes optimal solutions to programming problems.
Explain the approach, analyze time and space complexity, and write clean code in BOTH JavaScript and Python.
Respond with one JSON object shaped like this:
{
  "solution": {
    "explanation": "How the approach works",
    "complexity": {"time": "O(...)", "space": "O(...)"},
    "code": {
      "javascript": "// JavaScript implementation",
      "python": "# Python implementation"
    }
  },
  "alternative_solutions": [
    {
      "explanation": "Another approach",
      "complexity": {"time": "O(...)", "space": "O(...)"},
      "code": {"javascript": "...", "python": "..."}
    }
  ]
}
Keep indentation and line breaks in the code. Write nothing outside the JSON object."##;

pub fn leetcode_solution_user(problem_json: &str) -> String {
    format!(
        "The problem:\n\n{}\n\nWrite an optimal solution with a full explanation and complete \
         code in both JavaScript and Python.",
        problem_json
    )
}

pub const PROJECT_PLAN_SYSTEM: &str = r#"You are a full-stack engineer who turns requirements into implementation plans.
Respond with one JSON object shaped like this:
{
  "project_plan": {
    "overview": "What the project is",
    "architecture": "How the pieces fit together",
    "tech_stack": {
      "frontend": ["..."],
      "backend": ["..."],
      "database": ["..."],
      "deployment": ["..."]
    }
  },
  "implementation_steps": [{"step": "What to do", "details": "How to do it"}],
  "file_structure": [{"path": "path/to/file", "purpose": "Why it exists", "code_sample": "Example content"}],
  "key_features": [{"feature": "Feature name", "implementation": "How to build it"}]
}
Be thorough enough to guide the whole build. Write nothing outside the JSON object."#;

pub fn project_plan_user(
    project_title: &str,
    requirements: &str,
    tech_stack: &str,
    optional_features: &str,
) -> String {
    format!(
        "Project title: {}\n\nRequirements: {}\n\nPreferred tech stack: {}\n\n\
         Optional features: {}\n\nProduce a complete implementation plan with steps, file \
         structure and code samples.",
        project_title, requirements, tech_stack, optional_features
    )
}

pub const LEETCODE_DEBUG_SYSTEM: &str = "You debug solutions to LeetCode-style problems. The \
screenshots may show compiler errors, failing test cases or extra details about the problem.";

pub fn leetcode_debug_user(problem_statement: &str, test_cases: &str, current_code: Option<&str>) -> String {
    let mut prompt = format!(
        "The user is solving this problem:\n\nProblem statement:\n{}\n\nTest cases:\n{}\n\n",
        problem_statement, test_cases
    );
    if let Some(code) = current_code {
        prompt.push_str(&format!("Current solution:\n{}\n\n", code));
    }
    prompt.push_str(
        r#"The new screenshots may show errors, failed test cases or additional requirements.
Analyze them and respond with one JSON object:
{
  "debug_analysis": "What is wrong and why",
  "improved_solution": {
    "explanation": "How the fix works",
    "complexity": {"time": "O(...)", "space": "O(...)"},
    "code": {"javascript": "...", "python": "..."}
  }
}"#,
    );
    prompt
}

pub const PROJECT_DEBUG_SYSTEM: &str = "You refine project plans. The screenshots may contain \
more detailed specifications, mockups or UI/UX requirements for a project already under way.";

pub fn project_debug_user(project_title: &str, requirements: &str) -> String {
    format!(
        r#"The user is building this project:

Project title: {}

Current requirements: {}

The new screenshots may show more specific details, mockups or requirements.
Respond with one JSON object:
{{
  "enhanced_requirements": ["requirements not already listed"],
  "ui_ux_considerations": ["..."],
  "additional_specifications": ["..."]
}}"#,
        project_title, requirements
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn solution_schema_keeps_both_code_placeholders() {
        assert!(LEETCODE_SOLUTION_SYSTEM.contains(r#""javascript": "// JavaScript implementation""#));
        assert!(LEETCODE_SOLUTION_SYSTEM.contains(r##""python": "# Python implementation""##));
        assert!(LEETCODE_SOLUTION_SYSTEM.ends_with("Write nothing outside the JSON object."));
    }

    #[test]
    fn debug_prompt_includes_current_code_only_when_known() {
        let with_code = leetcode_debug_user("Two sum", "[]", Some("def f(): pass"));
        assert!(with_code.contains("Current solution:\ndef f(): pass"));
        assert!(with_code.contains("\"debug_analysis\""));

        let without = leetcode_debug_user("Two sum", "[]", None);
        assert!(!without.contains("Current solution"));
    }
}
