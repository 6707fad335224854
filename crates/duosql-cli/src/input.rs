//! Template and binding input handling.

use anyhow::{Context, Result};
use duosql_core::{ParamValue, Params};
use std::io::Read;
use std::path::PathBuf;

/// Reads the template from a file, or from stdin when no path is given.
pub fn read_template(path: &Option<PathBuf>) -> Result<String> {
    match path {
        Some(path) => std::fs::read_to_string(path)
            .with_context(|| format!("failed to read template {}", path.display())),
        None => {
            let mut buffer = String::new();
            std::io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read template from stdin")?;
            Ok(buffer)
        }
    }
}

/// Builds the bindings from an optional JSON file plus repeated
/// `KEY=VALUE` arguments; the arguments win on conflicts.
pub fn collect_params(vars: &[String], file: &Option<PathBuf>) -> Result<Params> {
    let mut params = Params::new();

    if let Some(path) = file {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read params file {}", path.display()))?;
        let loaded: Params = serde_json::from_str(&text)
            .with_context(|| format!("params file {} is not a JSON object", path.display()))?;
        params.extend(loaded);
    }

    for var in vars {
        let Some((key, value)) = var.split_once('=') else {
            anyhow::bail!("parameter '{var}' is not in KEY=VALUE form");
        };
        let key = key.trim();
        if key.is_empty() {
            continue;
        }
        // JSON first, plain string as the fallback.
        let value = serde_json::from_str::<ParamValue>(value.trim())
            .unwrap_or_else(|_| ParamValue::from(value.trim()));
        params.insert(key.to_string(), value);
    }

    Ok(params)
}
