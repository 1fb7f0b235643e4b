//! JSON envelope for `envsync` commands and the error-code to exit-code map.
//!
//! Every run prints exactly one envelope to stdout: `{"success": true,
//! "data": ...}` or `{"success": false, "error": {...}}`.

use envsync::error::Hint;
use envsync::{Error, ErrorCode, Result};
use serde::Serialize;
use serde_json::Value;

#[derive(Debug, Serialize)]
pub struct CliResponse {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CliError>,
}

#[derive(Debug, Serialize)]
pub struct CliError {
    pub code: &'static str,
    pub message: String,
    pub details: Value,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<Hint>,
}

impl CliResponse {
    pub fn from_result(result: Result<Value>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                error: None,
            },
            Err(err) => Self {
                success: false,
                data: None,
                error: Some(CliError {
                    code: err.code.as_str(),
                    message: err.message,
                    details: err.details,
                    hints: err.hints,
                }),
            },
        }
    }

    fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| {
            Error::internal_json(e.to_string(), Some("serialize response".to_string()))
        })
    }
}

pub fn map_cmd_result_to_json<T: Serialize>(result: Result<(T, i32)>) -> (Result<Value>, i32) {
    match result {
        Ok((data, exit_code)) => match serde_json::to_value(data) {
            Ok(value) => (Ok(value), exit_code),
            Err(err) => (
                Err(Error::internal_json(
                    err.to_string(),
                    Some("serialize response".to_string()),
                )),
                1,
            ),
        },
        Err(err) => {
            let exit_code = exit_code_for_error(err.code);
            (Err(err), exit_code)
        }
    }
}

/// A declined confirmation is a successful run and never reaches here.
pub fn exit_code_for_error(code: ErrorCode) -> i32 {
    match code {
        ErrorCode::ConfigMissingFile
        | ErrorCode::ConfigInvalidJson
        | ErrorCode::ConfigInvalidYaml
        | ErrorCode::ConfigInvalidValue
        | ErrorCode::ValidationMissingArgument
        | ErrorCode::ValidationInvalidArgument => 2,

        ErrorCode::AliasNotFound => 4,

        ErrorCode::RemoteCommandFailed => 20,

        ErrorCode::ResetStepFailed | ErrorCode::InternalIoError | ErrorCode::InternalJsonError => 1,
    }
}

pub fn print_json_result(result: Result<Value>) -> Result<()> {
    use std::io::{self, Write};

    let payload = CliResponse::from_result(result).to_json()?;
    let mut handle = io::stdout().lock();
    if let Err(e) = writeln!(handle, "{}", payload) {
        if e.kind() == io::ErrorKind::BrokenPipe {
            return Ok(());
        }
        return Err(Error::internal_io(e.to_string(), Some("write stdout".to_string())));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use envsync::error::ResetStepFailedDetails;
    use envsync::reset::ResetReport;

    #[test]
    fn reset_step_failure_exits_with_one() {
        let err = Error::reset_step_failed(ResetStepFailedDetails {
            step: "Clear Cache".to_string(),
            position: 1,
            command: "cache-clear 2>&1".to_string(),
            exit_code: 7,
            output: vec!["no such command".to_string()],
            pipeline: ResetReport::idle(&[]),
        });
        let (value, exit_code) = map_cmd_result_to_json::<Value>(Err(err));
        assert!(value.is_err());
        assert_eq!(exit_code, 1);
    }

    #[test]
    fn alias_and_config_errors_have_distinct_exit_codes() {
        assert_eq!(exit_code_for_error(ErrorCode::AliasNotFound), 4);
        assert_eq!(exit_code_for_error(ErrorCode::ConfigMissingFile), 2);
        assert_eq!(exit_code_for_error(ErrorCode::RemoteCommandFailed), 20);
    }

    #[test]
    fn error_envelope_carries_code_and_hints() {
        let err = Error::alias_not_found("www", "prod");
        let json = CliResponse::from_result(Err(err)).to_json().unwrap();
        assert!(json.contains("\"code\": \"alias.not_found\""));
        assert!(json.contains("\"hints\""));
        assert!(json.contains("\"success\": false"));
        assert!(!json.contains("\"data\""));
    }

    #[test]
    fn success_envelope_omits_error() {
        let (value, exit_code) =
            map_cmd_result_to_json(Ok((serde_json::json!({"status": "completed"}), 0)));
        assert_eq!(exit_code, 0);

        let json = CliResponse::from_result(value).to_json().unwrap();
        assert!(json.contains("\"success\": true"));
        assert!(json.contains("\"status\": \"completed\""));
        assert!(!json.contains("\"error\""));
    }
}
