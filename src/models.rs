use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Kind of platform object watched for creations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Datasets,
    Reuses,
    Organizations,
}

impl ItemKind {
    /// Path segment of the listing endpoint
    pub fn api_path(&self) -> &'static str {
        match self {
            ItemKind::Datasets => "datasets",
            ItemKind::Reuses => "reuses",
            ItemKind::Organizations => "organizations",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.api_path())
    }
}

/// A newly created dataset, reuse or organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
}

impl Item {
    /// Reduce a raw API record: `name`, else `title`; `page` when present.
    pub fn from_record(record: &Value) -> Self {
        let name = record
            .get("name")
            .and_then(Value::as_str)
            .or_else(|| record.get("title").and_then(Value::as_str))
            .unwrap_or_default()
            .to_string();
        let page = record
            .get("page")
            .and_then(Value::as_str)
            .map(str::to_string);
        Self { name, page }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SchemaRef {
    #[serde(default)]
    pub name: Option<String>,
}

/// One file attached to a dataset.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Resource {
    #[serde(default, alias = "title")]
    pub name: String,
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub schema: Option<SchemaRef>,
    #[serde(default)]
    pub extras: HashMap<String, Value>,
}

impl Resource {
    /// Declared schema name, if the resource carries a non-empty one.
    pub fn declared_schema(&self) -> Option<&str> {
        self.schema
            .as_ref()
            .and_then(|s| s.name.as_deref())
            .filter(|name| !name.is_empty())
    }

    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(Value::as_str)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OrganizationRef {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OwnerRef {
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
}

/// Dataset detail record, reduced to what schema classification reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DatasetDetail {
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub organization: Option<OrganizationRef>,
    #[serde(default)]
    pub owner: Option<OwnerRef>,
}

/// Display string for who published a dataset; empty when unknown.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrganizationInfo(String);

impl OrganizationInfo {
    /// An owning user takes precedence over the organization.
    pub fn from_detail(detail: &DatasetDetail) -> Self {
        if let Some(owner) = &detail.owner {
            if let Some(first) = &owner.first_name {
                let last = owner.last_name.as_deref().unwrap_or_default();
                return Self(format!("(Utilisateur {} {})", first, last));
            }
        }
        if let Some(name) = detail.organization.as_ref().and_then(|o| o.name.as_ref()) {
            return Self(format!("(Organisation {})", name));
        }
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OrganizationInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
