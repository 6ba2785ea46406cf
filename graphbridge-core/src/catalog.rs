//! Static endpoint catalog loading.
//!
//! The catalog is a JSON array of [`EndpointDefinition`] records. It is read
//! once at startup, validated, and shared read-only afterwards.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::model::{EndpointDefinition, ParamLocation};

/// Error type for catalog loading.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The catalog file could not be read.
    #[error("failed to read catalog {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The catalog is not valid JSON or has the wrong shape.
    #[error("failed to parse catalog: {0}")]
    Parse(#[from] serde_json::Error),

    /// Two endpoints share a name.
    #[error("duplicate endpoint name: {name}")]
    DuplicateName { name: String },

    /// A path parameter has no placeholder in its endpoint's path.
    #[error("endpoint {endpoint} declares path parameter {parameter} missing from {path}")]
    MissingPlaceholder {
        endpoint: String,
        parameter: String,
        path: String,
    },
}

/// An ordered, immutable sequence of endpoint definitions.
#[derive(Debug, Clone)]
pub struct Catalog {
    endpoints: Arc<[EndpointDefinition]>,
}

impl Catalog {
    /// Build a catalog from definitions, validating invariants.
    pub fn new(endpoints: Vec<EndpointDefinition>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for endpoint in &endpoints {
            if !seen.insert(endpoint.name.as_str()) {
                return Err(CatalogError::DuplicateName {
                    name: endpoint.name.clone(),
                });
            }
            validate_placeholders(endpoint)?;
        }

        Ok(Self {
            endpoints: endpoints.into(),
        })
    }

    /// Parse a catalog from JSON text.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let endpoints: Vec<EndpointDefinition> = serde_json::from_str(json)?;
        Self::new(endpoints)
    }

    /// Load a catalog from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let catalog = Self::from_json(&contents)?;
        tracing::debug!("Loaded {} endpoints from {:?}", catalog.len(), path);
        Ok(catalog)
    }

    /// All definitions in catalog order.
    pub fn endpoints(&self) -> &[EndpointDefinition] {
        &self.endpoints
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

/// Load and validate the catalog at `path`.
pub fn load_catalog(path: impl AsRef<Path>) -> Result<Catalog, CatalogError> {
    Catalog::load(path)
}

fn validate_placeholders(endpoint: &EndpointDefinition) -> Result<(), CatalogError> {
    for parameter in endpoint
        .parameters
        .iter()
        .filter(|p| p.location == ParamLocation::Path)
    {
        let braces = format!("{{{}}}", parameter.name);
        let colon = format!(":{}", parameter.name);
        if !endpoint.path.contains(&braces) && !endpoint.path.contains(&colon) {
            return Err(CatalogError::MissingPlaceholder {
                endpoint: endpoint.name.clone(),
                parameter: parameter.name.clone(),
                path: endpoint.path.clone(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{HttpMethod, ParameterDeclaration};

    #[test]
    fn test_from_json_preserves_order() {
        let catalog = Catalog::from_json(
            r#"[
                {"name": "list-mail-messages", "method": "get", "path": "/me/messages"},
                {"name": "send-mail", "method": "post", "path": "/me/sendMail"}
            ]"#,
        )
        .unwrap();

        let names: Vec<_> = catalog.endpoints().iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["list-mail-messages", "send-mail"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let result = Catalog::new(vec![
            EndpointDefinition::new("a", HttpMethod::Get, "/a"),
            EndpointDefinition::new("a", HttpMethod::Post, "/b"),
        ]);
        assert!(matches!(result, Err(CatalogError::DuplicateName { .. })));
    }

    #[test]
    fn test_path_parameter_needs_placeholder() {
        let ok = EndpointDefinition::new("get-message", HttpMethod::Get, "/me/messages/:messageId")
            .with_parameter(ParameterDeclaration::new("messageId", ParamLocation::Path));
        assert!(Catalog::new(vec![ok]).is_ok());

        let broken = EndpointDefinition::new("get-event", HttpMethod::Get, "/me/events")
            .with_parameter(ParameterDeclaration::new("eventId", ParamLocation::Path));
        assert!(matches!(
            Catalog::new(vec![broken]),
            Err(CatalogError::MissingPlaceholder { .. })
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let result = Catalog::load("/definitely/not/here/endpoints.json");
        assert!(matches!(result, Err(CatalogError::Io { .. })));
    }
}
