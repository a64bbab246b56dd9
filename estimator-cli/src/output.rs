use anyhow::Result;
use estimator::errors::{AssignmentError, BackendError};
use serde_json::{json, Value};

pub fn emit_response(command: &str, project: Option<&str>, data: Value, pretty: bool) -> Result<()> {
    let response = json!({
        "status": "ok",
        "command": command,
        "project": project,
        "result": data,
    });
    print_json(&response, pretty)
}

/// Print a failure with its stable code; validation and backend errors keep
/// their user-facing message.
pub fn emit_error(command: &str, err: &anyhow::Error, pretty: bool) -> Result<()> {
    let (code, message) = if let Some(assignment) = err.downcast_ref::<AssignmentError>() {
        (assignment.error_code(), assignment.user_message())
    } else if let Some(backend) = err.downcast_ref::<BackendError>() {
        ("BACKEND_ERROR", backend.user_message())
    } else {
        ("CLI_ERROR", format!("{:#}", err))
    };

    let response = json!({
        "status": "error",
        "command": command,
        "code": code,
        "message": message,
    });
    print_json(&response, pretty)
}

fn print_json(value: &Value, pretty: bool) -> Result<()> {
    if pretty {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", value);
    }
    Ok(())
}
