use crate::domain::ports::{ToolOutput, ToolRunner};
use crate::utils::error::ProvisioningError;

pub const EXIT_INVALID_COMMAND: i32 = 1;
pub const EXIT_INVALID_ID: i32 = 2;
pub const EXIT_INVALID_PORT: i32 = 3;
pub const EXIT_SUDO_REQUIRED: i32 = 4;
pub const EXIT_ALREADY_INSTALLED: i32 = 5;
pub const EXIT_NOT_INSTALLED: i32 = 6;
pub const EXIT_INSTANCE_EXISTS: i32 = 7;
pub const EXIT_INSTANCE_NOT_ENABLED: i32 = 8;
pub const EXIT_INSTANCE_MISSING: i32 = 9;

/// Exit-code meanings shared with the provisioning tool. The texts are part of
/// the client-facing protocol and must not change.
pub fn exit_code_message(code: i32) -> Option<&'static str> {
    match code {
        EXIT_INVALID_COMMAND => Some("Invalid command."),
        EXIT_INVALID_ID => Some("Invalid instance id."),
        EXIT_INVALID_PORT => Some("Invalid port."),
        EXIT_SUDO_REQUIRED => Some("Sudo required."),
        EXIT_ALREADY_INSTALLED => Some("Already installed"),
        EXIT_NOT_INSTALLED => Some("Landlord not installed correctly."),
        EXIT_INSTANCE_EXISTS => Some("Instance already exists."),
        EXIT_INSTANCE_NOT_ENABLED => Some("Instance not enabled."),
        EXIT_INSTANCE_MISSING => Some("Instance does not exist."),
        _ => None,
    }
}

/// Maps a non-successful run to a typed error.
pub fn classify(output: &ToolOutput) -> ProvisioningError {
    match output.exit_code {
        Some(code) => match exit_code_message(code) {
            Some(message) => ProvisioningError::new(code, message),
            None => ProvisioningError::new(code, format!("Unknown exit status ({})", code)),
        },
        None => ProvisioningError::new(0, format!("Unknown error ({}).", output.status)),
    }
}

/// Delete only translates a missing instance; every other failure keeps the
/// raw exit status text.
pub fn classify_delete(output: &ToolOutput) -> ProvisioningError {
    match output.exit_code {
        Some(EXIT_INSTANCE_MISSING) => classify(output),
        code => ProvisioningError::new(code.unwrap_or(0), output.status.clone()),
    }
}

/// Invokes the external provisioning tool and classifies its exit status.
pub struct ProvisioningGateway<R: ToolRunner> {
    runner: R,
}

impl<R: ToolRunner> ProvisioningGateway<R> {
    pub fn new(runner: R) -> Self {
        Self { runner }
    }

    pub async fn setup(&self, id: &str, port: u16) -> std::result::Result<(), ProvisioningError> {
        let output = self
            .execute(&["setup".to_string(), id.to_string(), port.to_string()])
            .await?;
        check(&output, classify)
    }

    pub async fn delete(&self, id: &str) -> std::result::Result<(), ProvisioningError> {
        let output = self.execute(&["delete".to_string(), id.to_string()]).await?;
        check(&output, classify_delete)
    }

    async fn execute(&self, args: &[String]) -> std::result::Result<ToolOutput, ProvisioningError> {
        let command_line = args.join(" ");
        tracing::info!("Running provisioning tool: {}", command_line);

        let output = match self.runner.run(args).await {
            Ok(output) => output,
            Err(e) => {
                tracing::error!("Unable to run provisioning tool {}: {}", command_line, e);
                return Err(ProvisioningError::new(0, format!("Unknown error ({}).", e)));
            }
        };

        // 無論成功與否都記錄輸出，供稽核
        tracing::info!(
            "Provisioning tool {} finished ({}):\n{}",
            command_line,
            output.status,
            output.output
        );
        Ok(output)
    }
}

fn check(
    output: &ToolOutput,
    classifier: fn(&ToolOutput) -> ProvisioningError,
) -> std::result::Result<(), ProvisioningError> {
    if output.success() {
        return Ok(());
    }
    let err = classifier(output);
    tracing::warn!("Provisioning tool failed: {} (exit {})", err, err.exit_code);
    Err(err)
}
