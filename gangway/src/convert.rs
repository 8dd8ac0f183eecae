//! Converting job descriptions with the orchestrator's own tooling.
//!
//! The conversion is an opaque transform: we hand the rendered description
//! to the tool on stdin and read the machine-format JSON payload back from
//! stdout. The payload is only parsed far enough to find the job's logical
//! name, which the status poll needs.

use gangway_common::{orchestrator, prelude::*};
use std::io::Write;
use std::process::{Command, Stdio};

/// Run the tool's conversion command and parse its output as a submission
/// payload.
pub fn to_submission_payload(tool: &str, rendered: &str) -> Result<serde_json::Value> {
    run_capture_json(&[tool, "job", "run", "-output", "-"], rendered)
}

/// Hand the rendered description to the tool's own run command, passing its
/// output through to the console.
pub fn run_locally(tool: &str, rendered: &str) -> Result<()> {
    let mut child = Command::new(tool)
        .args(&["job", "run", "-"])
        .stdin(Stdio::piped())
        .spawn()
        .with_context(|| format!("error starting {}", tool))?;
    child
        .stdin
        .as_mut()
        .expect("child stdin is missing")
        .write_all(rendered.as_bytes())
        .with_context(|| format!("error writing input to {}", tool))?;
    let status = child
        .wait()
        .with_context(|| format!("error running {}", tool))?;
    if !status.success() {
        return Err(format_err!("{} exited with {}", tool, status));
    }
    Ok(())
}

/// Run a command with the given stdin, capture stdout, and parse it as
/// JSON.
fn run_capture_json(argv: &[&str], input: &str) -> Result<serde_json::Value> {
    debug!("running {:?}", argv);
    let mut child = Command::new(argv[0])
        .args(&argv[1..])
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        // Pass `stderr` through to the console instead of capturing.
        .stderr(Stdio::inherit())
        .spawn()
        .with_context(|| format!("error starting {:?}", argv))?;
    child
        .stdin
        .take()
        .expect("child stdin is missing")
        .write_all(input.as_bytes())
        .with_context(|| format!("error writing input to {:?}", argv))?;
    let output = child
        .wait_with_output()
        .with_context(|| format!("error running {:?}", argv))?;
    if !output.status.success() {
        return Err(format_err!("error running {:?}", argv));
    }
    serde_json::from_slice(&output.stdout)
        .with_context(|| format!("error parsing output of {:?}", argv))
}

/// Find the job's logical name inside a converted payload.
///
/// The machine format wraps everything in a `Job` object whose `ID` (or,
/// failing that, `Name`) is what the status endpoint keys on.
pub fn job_name(payload: &serde_json::Value) -> Result<String> {
    let job = payload
        .get("Job")
        .ok_or_else(|| format_err!("converted payload has no Job object"))?;
    let name = job
        .get("ID")
        .and_then(|v| v.as_str())
        .or_else(|| job.get("Name").and_then(|v| v.as_str()))
        .ok_or_else(|| format_err!("converted payload has no job ID or Name"))?;
    orchestrator::validate_job_name(name)?;
    Ok(name.to_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn job_name_prefers_the_id_field() {
        let payload = json!({ "Job": { "ID": "webproxy", "Name": "other" } });
        assert_eq!(job_name(&payload).unwrap(), "webproxy");
    }

    #[test]
    fn job_name_falls_back_to_name() {
        let payload = json!({ "Job": { "Name": "webproxy" } });
        assert_eq!(job_name(&payload).unwrap(), "webproxy");
    }

    #[test]
    fn job_name_requires_a_job_object() {
        assert!(job_name(&json!({})).is_err());
        assert!(job_name(&json!({ "Job": {} })).is_err());
    }

    #[test]
    fn job_name_rejects_illegal_names() {
        let payload = json!({ "Job": { "ID": "Web_Proxy" } });
        assert!(job_name(&payload).is_err());
    }

    #[test]
    fn run_capture_json_reads_tool_output() {
        // `cat` stands in for the conversion tool: stdin comes straight
        // back out as stdout.
        let payload = run_capture_json(&["cat"], r#"{"Job":{"ID":"webproxy"}}"#).unwrap();
        assert_eq!(job_name(&payload).unwrap(), "webproxy");
    }

    #[test]
    fn run_capture_json_fails_on_a_nonzero_exit() {
        assert!(run_capture_json(&["false"], "").is_err());
    }
}
