//! Initial configurations pushed before any suite runs

use ocv_context::InitConfig;
use ocv_path::{Path, PathError};
use ocv_session::{DeviceSession, SessionError};
use ocv_value::TypedValue;
use std::path::PathBuf;
use thiserror::Error;
use tracing::{error, info};

/// Error applying an initial configuration
#[derive(Debug, Error)]
pub enum InitConfigError {
    #[error("initial configuration needs both a filename and an xpath")]
    Incomplete,

    #[error("cannot read initial configuration {path}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("initial configuration '{filename}' is not valid JSON: {source}")]
    BadJson {
        filename: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("bad xpath for initial configuration '{filename}': {source}")]
    BadPath {
        filename: String,
        #[source]
        source: PathError,
    },

    #[error("initial configuration '{filename}' rejected at {xpath}: {source}")]
    Rejected {
        filename: String,
        xpath: String,
        #[source]
        source: SessionError,
    },
}

/// Push the profile's initial configurations to the device.
///
/// Each entry is a JSON file whose content is Set at the entry's xpath,
/// with Update or, when `use_replace` is set, Replace. With `stop_on_error`
/// the first failing entry aborts the preamble; otherwise failures are
/// logged and the remaining entries are still applied.
pub async fn apply_init_configs(
    configs: &[InitConfig],
    session: &dyn DeviceSession,
    stop_on_error: bool,
    use_replace: bool,
) -> Result<(), InitConfigError> {
    if use_replace && !configs.is_empty() {
        info!("using Set Replace for each initial configuration");
    }
    for config in configs {
        match apply_one(config, session, use_replace).await {
            Ok(()) => info!(
                "initial configuration '{}' applied at {}",
                config.filename, config.xpath
            ),
            Err(err) if stop_on_error => return Err(err),
            Err(err) => error!("initial configuration skipped: {}", err),
        }
    }
    Ok(())
}

async fn apply_one(
    config: &InitConfig,
    session: &dyn DeviceSession,
    use_replace: bool,
) -> Result<(), InitConfigError> {
    if config.filename.is_empty() || config.xpath.is_empty() {
        return Err(InitConfigError::Incomplete);
    }
    let text =
        std::fs::read_to_string(&config.filename).map_err(|source| InitConfigError::ReadFile {
            path: PathBuf::from(&config.filename),
            source,
        })?;
    let doc: serde_json::Value =
        serde_json::from_str(&text).map_err(|source| InitConfigError::BadJson {
            filename: config.filename.clone(),
            source,
        })?;
    let path = Path::parse(&config.xpath).map_err(|source| InitConfigError::BadPath {
        filename: config.filename.clone(),
        source,
    })?;
    let value = TypedValue::Json(doc.to_string());
    let sent = if use_replace {
        session.set_replace(&path, value).await
    } else {
        session.set_update(&path, value).await
    };
    sent.map_err(|source| InitConfigError::Rejected {
        filename: config.filename.clone(),
        xpath: config.xpath.clone(),
        source,
    })
}
