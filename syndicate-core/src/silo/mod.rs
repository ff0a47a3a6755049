//! Silo adapters, selected by name from configuration.

pub mod dev;

use std::str::FromStr;

use tracing::info;

use crate::config::SiloConfig;
use crate::contract::Silo;
use crate::error::SiloError;

pub use dev::DevSilo;

/// Silos with a built-in adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SiloKind {
    Dev,
}

impl FromStr for SiloKind {
    type Err = SiloError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "dev" | "dev.to" | "devto" => Ok(SiloKind::Dev),
            other => Err(SiloError::UnknownSilo(other.to_string())),
        }
    }
}

/// Construct the adapter for `config.name`.
///
/// A missing credential is not an error here; the adapter refuses to make
/// calls without one.
pub fn build(config: &SiloConfig) -> Result<Box<dyn Silo>, SiloError> {
    let kind: SiloKind = config.name.parse()?;
    info!(
        silo = %config.name,
        api_key_set = config.api_key.is_some(),
        "[SILO] Building adapter"
    );
    let silo: Box<dyn Silo> = match kind {
        SiloKind::Dev => {
            let mut dev = DevSilo::new(config.api_key.clone());
            if let Some(base_url) = &config.base_url {
                dev = dev.with_base_url(base_url.clone());
            }
            Box::new(dev)
        }
    };
    Ok(silo)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn silo_names_are_case_insensitive() {
        assert_eq!("DEV".parse::<SiloKind>().unwrap(), SiloKind::Dev);
        assert_eq!("dev.to".parse::<SiloKind>().unwrap(), SiloKind::Dev);
        assert!(matches!(
            "myspace".parse::<SiloKind>(),
            Err(SiloError::UnknownSilo(name)) if name == "myspace"
        ));
    }

    #[test]
    fn build_dispatches_on_name() {
        let config = SiloConfig {
            name: "DEV".into(),
            api_key: None,
            base_url: None,
        };
        let silo = build(&config).unwrap();
        assert_eq!(silo.name(), "dev");
    }
}
