//! Typed deployment template and parameter documents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::TemplateError;

/// How the template generator should lay out its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactFormat {
    /// Values exactly as computed. Required for scale templates: the
    /// formatting pass rewrites numeric parameter values.
    Raw,
    /// Formatted and normalized for an initial deployment.
    Formatted,
}

/// Template and parameters as rendered by the generator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifacts {
    pub template: String,
    pub parameters: String,
}

impl RenderedArtifacts {
    /// Parse both documents into their typed form.
    pub fn parse(&self) -> Result<(DeploymentTemplate, DeploymentParameters), TemplateError> {
        let template = DeploymentTemplate::from_json(&self.template)?;
        let parameters = DeploymentParameters::from_json(&self.parameters)?;
        Ok((template, parameters))
    }
}

// ── Template ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentTemplate {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(rename = "contentVersion", default, skip_serializing_if = "Option::is_none")]
    pub content_version: Option<String>,
    #[serde(default)]
    pub parameters: Map<String, Value>,
    #[serde(default)]
    pub variables: Map<String, Value>,
    #[serde(default)]
    pub resources: Vec<TemplateResource>,
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub outputs: Map<String, Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One entry of the template's `resources` array.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TemplateResource {
    #[serde(rename = "type")]
    pub resource_type: String,
    /// Usually an expression such as `[concat(variables('masterVMNamePrefix'), copyIndex())]`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "dependsOn", default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TemplateResource {
    pub fn is_type(&self, resource_type: &str) -> bool {
        self.resource_type.eq_ignore_ascii_case(resource_type)
    }

    pub fn properties_mut(&mut self) -> Option<&mut Map<String, Value>> {
        self.extra.get_mut("properties").and_then(Value::as_object_mut)
    }
}

impl DeploymentTemplate {
    pub fn from_json(document: &str) -> Result<Self, TemplateError> {
        serde_json::from_str(document).map_err(|source| TemplateError::Parse {
            document: "template",
            source,
        })
    }

    pub fn to_value(&self) -> Result<Value, TemplateError> {
        serde_json::to_value(self).map_err(|source| TemplateError::Serialize {
            document: "template",
            source,
        })
    }

    pub fn variable(&self, key: &str) -> Option<&Value> {
        self.variables.get(key)
    }

    pub fn set_variable(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.variables.insert(key.into(), value.into());
    }

    pub fn has_resource_type(&self, resource_type: &str) -> bool {
        self.resources.iter().any(|r| r.is_type(resource_type))
    }
}

// ── Parameters ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeploymentParameters {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    #[serde(rename = "contentVersion", default, skip_serializing_if = "Option::is_none")]
    pub content_version: Option<String>,
    #[serde(default)]
    pub parameters: BTreeMap<String, ParameterValue>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A parameter entry: either an inline `value` or a passthrough reference.
///
/// Fields are kept verbatim so an explicit `"value": null` survives a
/// round trip.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct ParameterValue {
    pub fields: Map<String, Value>,
}

impl ParameterValue {
    const VALUE_KEY: &str = "value";

    /// The inline value, `Some(Value::Null)` when it was written as null.
    pub fn value(&self) -> Option<&Value> {
        self.fields.get(Self::VALUE_KEY)
    }

    pub fn set_value(&mut self, value: impl Into<Value>) {
        self.fields.insert(Self::VALUE_KEY.to_string(), value.into());
    }
}

impl DeploymentParameters {
    pub fn from_json(document: &str) -> Result<Self, TemplateError> {
        serde_json::from_str(document).map_err(|source| TemplateError::Parse {
            document: "parameters",
            source,
        })
    }

    /// The `parameters` object submitted alongside the template.
    pub fn to_value(&self) -> Result<Value, TemplateError> {
        serde_json::to_value(&self.parameters).map_err(|source| TemplateError::Serialize {
            document: "parameters",
            source,
        })
    }

    pub fn value(&self, key: &str) -> Option<&Value> {
        self.parameters.get(key).and_then(ParameterValue::value)
    }

    pub fn set_value(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.parameters.entry(key.into()).or_default().set_value(value);
    }
}

// ── Injection points ──────────────────────────────────────────────

/// Values computed for one scale-up and written into the regenerated
/// documents.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScaleInjections {
    /// Number of instances the template should allocate for the pool.
    pub count: Option<u32>,
    /// First agent index the template may allocate.
    pub offset: Option<u32>,
    /// Windows pool index.
    pub windows_index: Option<u32>,
}

impl ScaleInjections {
    pub fn count_key(pool: &str) -> String {
        format!("{pool}Count")
    }

    pub fn offset_key(pool: &str) -> String {
        format!("{pool}Offset")
    }

    pub fn windows_index_key(pool: &str) -> String {
        format!("{pool}Index")
    }

    /// Write the count and offset parameters.
    pub fn apply_parameters(&self, pool: &str, parameters: &mut DeploymentParameters) {
        if let Some(count) = self.count {
            parameters.set_value(Self::count_key(pool), count);
        }
        if let Some(offset) = self.offset {
            parameters.set_value(Self::offset_key(pool), offset);
        }
    }

    /// Write the Windows index variable.
    pub fn apply_template(&self, pool: &str, template: &mut DeploymentTemplate) {
        if let Some(index) = self.windows_index {
            template.set_variable(Self::windows_index_key(pool), index);
        }
    }
}
