//! Import options sent with project creation, and the file formats involved.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::CoreError;

/// Format of the uploaded source files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceFormat {
    Csv,
    Xml,
}

impl SourceFormat {
    /// File extension (without dot) of source files in this format.
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Xml => "xml",
        }
    }

    /// Explicit format hint for the service, if it cannot guess on its own.
    pub fn format_hint(&self) -> Option<&'static str> {
        match self {
            Self::Csv => None,
            Self::Xml => Some("text/xml"),
        }
    }
}

impl FromStr for SourceFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "xml" => Ok(Self::Xml),
            other => Err(CoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

/// Format of exported rows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Tsv,
}

impl ExportFormat {
    /// Name of the format as the export endpoint expects it.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Tsv => "tsv",
        }
    }

    /// Extension given to export files.
    pub fn extension(&self) -> &'static str {
        self.as_str()
    }
}

impl FromStr for ExportFormat {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            other => Err(CoreError::UnsupportedFormat(other.to_string())),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parser options for project creation.
///
/// Every known option is a typed field. Unset options serialize as `null`,
/// which the service treats as "use the importer default".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ImportOptions {
    pub encoding: Option<String>,
    pub store_empty_strings: bool,
    pub store_blank_cells_as_nulls: bool,
    pub store_blank_rows: bool,
    pub process_quotes: bool,
    pub column_widths: Option<Vec<i64>>,
    pub guess_cell_value_types: bool,
    pub header_lines: Option<i64>,
    pub ignore_lines: Option<i64>,
    pub include_file_sources: bool,
    pub limit: Option<i64>,
    pub lines_per_row: Option<i64>,
    pub project_name: Option<String>,
    pub project_tags: Option<Vec<String>>,
    pub record_path: Option<Vec<String>>,
    pub separator: Option<String>,
    pub sheets: Option<Vec<Value>>,
    pub skip_data_lines: Option<i64>,
    pub trim_strings: bool,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            encoding: Some("UTF-8".to_string()),
            store_empty_strings: true,
            store_blank_cells_as_nulls: true,
            store_blank_rows: true,
            process_quotes: true,
            column_widths: None,
            guess_cell_value_types: false,
            header_lines: None,
            ignore_lines: None,
            include_file_sources: false,
            limit: None,
            lines_per_row: None,
            project_name: None,
            project_tags: None,
            record_path: None,
            separator: None,
            sheets: None,
            skip_data_lines: None,
            trim_strings: false,
        }
    }
}

impl ImportOptions {
    /// Build the options for a source format.
    ///
    /// A record path only applies to XML, a column separator only to CSV.
    /// XML always carries a record path, empty when none was given.
    pub fn for_format(
        format: SourceFormat,
        encoding: Option<&str>,
        record_path: &[String],
        separator: Option<&str>,
    ) -> Self {
        let mut options = Self {
            encoding: encoding.map(str::to_string),
            ..Self::default()
        };

        match format {
            SourceFormat::Xml => {
                options.record_path = Some(record_path.to_vec());
            }
            SourceFormat::Csv => {
                if let Some(sep) = separator {
                    options.separator = Some(sep.to_string());
                    options.ignore_lines = Some(-1);
                    options.header_lines = Some(1);
                    options.skip_data_lines = Some(0);
                    options.limit = Some(-1);
                }
            }
        }

        options
    }

    /// Parse a JSON object of option overrides.
    pub fn parse_overrides(raw: &str) -> Result<Map<String, Value>, CoreError> {
        match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(CoreError::InvalidOptions(
                "overrides must be a JSON object".to_string(),
            )),
            Err(e) => Err(CoreError::InvalidOptions(e.to_string())),
        }
    }

    /// Apply overrides on top of these options.
    ///
    /// Overrides are validated against the option schema: unknown keys and
    /// values of the wrong type are rejected.
    pub fn with_overrides(self, overrides: &Map<String, Value>) -> Result<Self, CoreError> {
        if overrides.is_empty() {
            return Ok(self);
        }

        let mut value =
            serde_json::to_value(&self).map_err(|e| CoreError::Serialization(e.to_string()))?;
        if let Value::Object(fields) = &mut value {
            for (key, v) in overrides {
                fields.insert(key.clone(), v.clone());
            }
        }

        serde_json::from_value(value).map_err(|e| CoreError::InvalidOptions(e.to_string()))
    }

    /// Serialize to the JSON string the create endpoint expects.
    pub fn to_json_string(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}
