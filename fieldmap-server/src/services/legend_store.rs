//! Map legend configuration (`map_legend_config.json`)

use fieldmap_common::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::info;

const CUSTOMER_ICON_COLOR: &str = "customerIconColor";
const TECHNICIAN_ICON_COLOR: &str = "technicianIconColor";

/// Icon colours shown in the map legend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegendColors {
    pub customer_icon_color: String,
    pub technician_icon_color: String,
}

/// JSON document store for legend settings
///
/// The document may hold keys other than the colours; updates leave them
/// untouched.
#[derive(Debug, Clone)]
pub struct LegendStore {
    path: PathBuf,
}

impl LegendStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Full document
    pub async fn read(&self) -> Result<Map<String, Value>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound("Legend configuration not found".to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let document: Value = serde_json::from_slice(&bytes)?;
        match document {
            Value::Object(document) => Ok(document),
            _ => Err(Error::Internal(format!(
                "Legend configuration is not a JSON object: {}",
                self.path.display()
            ))),
        }
    }

    pub async fn legend_colors(&self) -> Result<LegendColors> {
        let document = self.read().await.map_err(|e| match e {
            Error::NotFound(_) => color_not_found(),
            other => other,
        })?;

        let color = |key: &str| {
            document
                .get(key)
                .and_then(Value::as_str)
                .map(str::to_string)
                .ok_or_else(color_not_found)
        };

        Ok(LegendColors {
            customer_icon_color: color(CUSTOMER_ICON_COLOR)?,
            technician_icon_color: color(TECHNICIAN_ICON_COLOR)?,
        })
    }

    /// Merge both colours into the document and write it back
    pub async fn update_colors(&self, colors: &LegendColors) -> Result<()> {
        let mut document = match self.read().await {
            Ok(document) => document,
            Err(Error::NotFound(_)) => Map::new(),
            Err(e) => return Err(e),
        };

        document.insert(
            CUSTOMER_ICON_COLOR.to_string(),
            Value::from(colors.customer_icon_color.as_str()),
        );
        document.insert(
            TECHNICIAN_ICON_COLOR.to_string(),
            Value::from(colors.technician_icon_color.as_str()),
        );

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let bytes = serde_json::to_vec_pretty(&Value::Object(document))?;
        tokio::fs::write(&self.path, bytes).await?;

        info!(
            customer = %colors.customer_icon_color,
            technician = %colors.technician_icon_color,
            "Legend colors updated"
        );
        Ok(())
    }
}

fn color_not_found() -> Error {
    Error::NotFound("Color configuration not found".to_string())
}
