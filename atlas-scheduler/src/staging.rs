//! Folding of staged files into job payloads. `RUN` and `DEPLOY` skills name
//! a file inside the restricted staging directory; its bytes travel to the
//! worker base64-encoded inside the payload itself.

use atlas_types::dag::ParseError;
use atlas_types::DagJobSpec;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use std::path::Path;

pub const RUN_SKILL: &str = "RUN";
pub const DEPLOY_SKILL: &str = "DEPLOY";
pub const RUN_PAYLOAD_SKILL: &str = "RUN_PAYLOAD";
pub const DEPLOY_PAYLOAD_SKILL: &str = "DEPLOY_PAYLOAD";

/// The staging directory is restricted: only plain filenames directly inside
/// it may be read.
fn check_file_name(name: &str) -> Result<(), ParseError> {
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(ParseError::UnsafeFileName(name.to_string()));
    }
    Ok(())
}

async fn read_staged(staging_dir: &Path, name: &str) -> Result<String, ParseError> {
    check_file_name(name)?;
    let path = staging_dir.join(name);
    let bytes = tokio::fs::read(&path)
        .await
        .map_err(|e| ParseError::UnreadableFile {
            file: name.to_string(),
            reason: e.to_string(),
        })?;
    Ok(BASE64.encode(bytes))
}

/// `RUN_PAYLOAD|<filename>|<base64>`
pub async fn fold_run(staging_dir: &Path, file_name: &str) -> Result<String, ParseError> {
    let encoded = read_staged(staging_dir, file_name).await?;
    Ok(format!("{RUN_PAYLOAD_SKILL}|{file_name}|{encoded}"))
}

/// `DEPLOY_PAYLOAD|<filename>|<base64>|<port>`
pub async fn fold_deploy(
    staging_dir: &Path,
    file_name: &str,
    port: &str,
) -> Result<String, ParseError> {
    let encoded = read_staged(staging_dir, file_name).await?;
    Ok(format!("{DEPLOY_PAYLOAD_SKILL}|{file_name}|{encoded}|{port}"))
}

/// Payload for one parsed DAG definition. RUN and DEPLOY fold the staged
/// file; any other skill passes DATA through unchanged.
pub async fn fold_spec_payload(staging_dir: &Path, spec: &DagJobSpec) -> Result<String, ParseError> {
    match spec.skill.as_str() {
        RUN_SKILL => fold_run(staging_dir, spec.data.trim()).await,
        DEPLOY_SKILL => {
            // DATA is `<filename>[,<port>]` (a DAG field cannot hold pipes).
            let mut parts = spec.data.splitn(2, ',');
            let file = parts.next().unwrap_or("").trim();
            let port = parts.next().unwrap_or("").trim();
            fold_deploy(staging_dir, file, port).await
        }
        _ => Ok(format!("{}|{}", spec.skill, spec.data)),
    }
}
