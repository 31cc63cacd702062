//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Check uniqueness (chain ids, node names)
//! - Validate node shapes and value ranges
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: RegistryConfig → Result<(), Vec<ValidationError>>
//! - Per-chain parameter invariants are not checked here; they depend on
//!   the environment and the store and are checked by each chain's resolver

use std::collections::HashSet;
use std::fmt;
use std::net::SocketAddr;

use crate::config::schema::RegistryConfig;

/// A single semantic problem in the configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dotted path of the offending field.
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

impl std::error::Error for ValidationError {}

pub fn validate_config(config: &RegistryConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.general.rpc_timeout_secs == 0 {
        errors.push(ValidationError::new(
            "general.rpc_timeout_secs",
            "must be greater than 0",
        ));
    }

    if config.observability.metrics_enabled
        && config.observability.metrics_address.parse::<SocketAddr>().is_err()
    {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("'{}' is not a socket address", config.observability.metrics_address),
        ));
    }

    if config.health_check.enabled && config.health_check.interval_secs == 0 {
        errors.push(ValidationError::new(
            "health_check.interval_secs",
            "must be greater than 0 when health checks are enabled",
        ));
    }

    let mut chain_ids = HashSet::new();
    let mut node_names = HashSet::new();
    for (i, chain) in config.chains.iter().enumerate() {
        if !chain_ids.insert(chain.id) {
            errors.push(ValidationError::new(
                format!("chains[{i}].id"),
                format!("duplicate chain id {}", chain.id),
            ));
        }

        for (j, node) in chain.nodes.iter().enumerate() {
            let field = format!("chains[{i}].nodes[{j}]");
            if !node_names.insert(node.name.to_lowercase()) {
                errors.push(ValidationError::new(
                    &field,
                    format!("duplicate node name '{}'", node.name),
                ));
            }
            if let Err(e) = node.to_record(chain.id).validate() {
                errors.push(ValidationError::new(&field, e.to_string()));
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blockchain::types::ChainId;
    use crate::config::schema::{ChainEntry, NodeEntry};

    fn chain(id: u64, nodes: Vec<NodeEntry>) -> ChainEntry {
        ChainEntry {
            id: ChainId::from(id),
            cfg: Default::default(),
            nodes,
        }
    }

    fn primary(name: &str) -> NodeEntry {
        NodeEntry {
            name: name.to_string(),
            ws_url: Some("ws://localhost:8546".to_string()),
            http_url: None,
            send_only: false,
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate_config(&RegistryConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = RegistryConfig::default();
        config.general.rpc_timeout_secs = 0;
        config.observability.metrics_enabled = true;
        config.observability.metrics_address = "nowhere".to_string();

        let mut broken = primary("broken");
        broken.ws_url = Some("http://wrong-scheme".to_string());
        config.chains = vec![
            chain(1, vec![primary("a")]),
            chain(1, vec![primary("A"), broken]),
        ];

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field.as_str()).collect();
        assert_eq!(
            fields,
            vec![
                "general.rpc_timeout_secs",
                "observability.metrics_address",
                "chains[1].id",
                "chains[1].nodes[0]",
                "chains[1].nodes[1]",
            ]
        );
    }
}
