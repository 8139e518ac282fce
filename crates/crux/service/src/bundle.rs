//! Reading rule bundles from disk

use crate::{ServiceError, ServiceResult};
use crux_verifier::{Bundle, Registry};
use std::path::Path;

/// On-disk encodings of a [`Bundle`]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BundleFormat {
    Json,
    Yaml,
}

impl BundleFormat {
    /// Pick the format from the file extension
    pub fn from_path(path: &Path) -> ServiceResult<Self> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Ok(BundleFormat::Json),
            Some("yaml") | Some("yml") => Ok(BundleFormat::Yaml),
            _ => Err(ServiceError::Bundle(format!(
                "{}: expected a .json, .yaml or .yml file",
                path.display()
            ))),
        }
    }
}

pub fn parse_bundle(text: &str, format: BundleFormat) -> ServiceResult<Bundle> {
    match format {
        BundleFormat::Json => {
            serde_json::from_str(text).map_err(|e| ServiceError::Bundle(e.to_string()))
        }
        BundleFormat::Yaml => {
            serde_yaml::from_str(text).map_err(|e| ServiceError::Bundle(e.to_string()))
        }
    }
}

pub fn load_bundle(path: impl AsRef<Path>) -> ServiceResult<Bundle> {
    let path = path.as_ref();
    let format = BundleFormat::from_path(path)?;
    let text = std::fs::read_to_string(path)?;
    let bundle = parse_bundle(&text, format)?;
    tracing::debug!(
        path = %path.display(),
        schemas = bundle.schemas.len(),
        rule_sets = bundle.rule_sets.len(),
        "Bundle loaded"
    );
    Ok(bundle)
}

/// Load a bundle file and admit it into a fresh registry
pub fn load_registry(path: impl AsRef<Path>) -> ServiceResult<Registry> {
    let bundle = load_bundle(path)?;
    Ok(Registry::admit(bundle)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const YAML: &str = r#"
schemas:
  - kind: B
    class: cart
    patternSchema:
      - { name: total, valType: float }
    actionSchema:
      tasks: [discount]
      properties: [pct]
ruleSets:
  - setName: cart_main
    class: cart
    rules:
      - rulePattern:
          - { attrName: total, op: gt, attrVal: 100.0 }
        ruleActions:
          tasks: [discount]
          properties: { pct: "10" }
"#;

    #[test]
    fn test_format_from_extension() {
        assert_eq!(
            BundleFormat::from_path(Path::new("a/b.json")).unwrap(),
            BundleFormat::Json
        );
        assert_eq!(
            BundleFormat::from_path(Path::new("b.yml")).unwrap(),
            BundleFormat::Yaml
        );
        assert!(BundleFormat::from_path(Path::new("b.toml")).is_err());
        assert!(BundleFormat::from_path(Path::new("bundle")).is_err());
    }

    #[test]
    fn test_load_registry_from_yaml_file() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        file.write_all(YAML.as_bytes()).unwrap();

        let registry = load_registry(file.path()).unwrap();
        assert_eq!(registry.schema_count(), 1);
        assert!(registry.rule_set("cart_main").is_some());
    }

    #[test]
    fn test_invalid_bundle_is_rejected() {
        let broken = YAML.replace("          tasks: [discount]", "          tasks: [refund]");
        let bundle = parse_bundle(&broken, BundleFormat::Yaml).unwrap();
        assert!(matches!(
            Registry::admit(bundle),
            Err(crux_verifier::VerifyError::UnknownTask { .. })
        ));
    }

    #[test]
    fn test_malformed_json() {
        assert!(matches!(
            parse_bundle("{ not json", BundleFormat::Json),
            Err(ServiceError::Bundle(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_bundle("/nonexistent/bundle.json"),
            Err(ServiceError::Io(_))
        ));
    }
}
