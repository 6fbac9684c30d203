//! Lot filtering by user-configured criteria
//!
//! The engine is a pure predicate over canonical lot records. Every
//! criterion is optional; a lot is kept when all configured ones pass.
//! Text matching is case-insensitive over trimmed values.

use crate::model::LotRecord;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

/// Filter configuration loading errors
#[derive(Debug, Error)]
pub enum FilterError {
    #[error("Failed to read filters file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse YAML filters: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON filters: {0}")]
    Json(#[from] serde_json::Error),
}

/// Vehicle kind restriction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VehicleKind {
    #[serde(alias = "Carro", alias = "CARRO")]
    Carro,
    #[serde(alias = "Moto", alias = "MOTO")]
    Moto,
}

fn default_true() -> bool {
    true
}

/// Filter criteria as written in the filters file
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct FiltersConfig {
    #[serde(default = "default_true")]
    pub ignore_requires_login: bool,

    #[serde(default = "default_true")]
    pub ignore_sucata: bool,

    #[serde(default)]
    pub tipo_veiculo: Option<VehicleKind>,

    #[serde(default)]
    pub marcas_permitidas: Option<Vec<String>>,

    #[serde(default)]
    pub ano_min: Option<i32>,

    #[serde(default)]
    pub ano_max: Option<i32>,

    #[serde(default)]
    pub valor_max: Option<f64>,

    #[serde(default)]
    pub descricao_keywords_all: Option<Vec<String>>,

    #[serde(default)]
    pub descricao_keywords_any: Option<Vec<String>>,
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            ignore_requires_login: true,
            ignore_sucata: true,
            tipo_veiculo: None,
            marcas_permitidas: None,
            ano_min: None,
            ano_max: None,
            valor_max: None,
            descricao_keywords_all: None,
            descricao_keywords_any: None,
        }
    }
}

/// Loads filters from YAML (`.yaml`/`.yml`) or JSON (anything else)
pub fn load_filters_config(path: &Path) -> Result<FiltersConfig, FilterError> {
    let content = std::fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    if is_yaml {
        // An empty YAML document means "all defaults"
        if content.trim().is_empty() {
            return Ok(FiltersConfig::default());
        }
        Ok(serde_yaml::from_str(&content)?)
    } else {
        Ok(serde_json::from_str(&content)?)
    }
}

fn norm(text: Option<&str>) -> String {
    text.unwrap_or_default().trim().to_lowercase()
}

fn normalized_keywords(keywords: &[String]) -> Vec<String> {
    keywords
        .iter()
        .map(|k| norm(Some(k.as_str())))
        .filter(|k| !k.is_empty())
        .collect()
}

/// Predicate built from a [`FiltersConfig`]
#[derive(Debug, Clone)]
pub struct FilterEngine {
    config: FiltersConfig,
    brands: Vec<String>,
    keywords_all: Vec<String>,
    keywords_any: Vec<String>,
}

impl FilterEngine {
    pub fn new(config: FiltersConfig) -> Self {
        let brands = normalized_keywords(config.marcas_permitidas.as_deref().unwrap_or_default());
        let keywords_all =
            normalized_keywords(config.descricao_keywords_all.as_deref().unwrap_or_default());
        let keywords_any =
            normalized_keywords(config.descricao_keywords_any.as_deref().unwrap_or_default());
        Self {
            config,
            brands,
            keywords_all,
            keywords_any,
        }
    }

    pub fn config(&self) -> &FiltersConfig {
        &self.config
    }

    /// Returns true when the lot passes every configured criterion
    pub fn accept(&self, lot: &LotRecord) -> bool {
        let cfg = &self.config;

        if cfg.ignore_requires_login && lot.requires_login {
            return false;
        }

        let text = format!(
            "{} {}",
            norm(Some(lot.description_short.as_str())),
            norm(lot.raw_text.as_deref())
        );

        if cfg.ignore_sucata && text.contains("sucata") {
            return false;
        }

        match cfg.tipo_veiculo {
            Some(VehicleKind::Moto) if !text.contains("moto") => return false,
            Some(VehicleKind::Carro) if text.contains("moto") || text.contains("motocic") => {
                return false
            }
            _ => {}
        }

        if !self.brands.is_empty() {
            let brand_text = format!(
                "{} {}",
                norm(lot.brand_model.as_deref()),
                norm(Some(lot.description_short.as_str()))
            );
            if !self.brands.iter().any(|b| brand_text.contains(b.as_str())) {
                return false;
            }
        }

        if let (Some(min), Some(year)) = (cfg.ano_min, lot.year) {
            if year < min {
                return false;
            }
        }
        if let (Some(max), Some(year)) = (cfg.ano_max, lot.year) {
            if year > max {
                return false;
            }
        }

        if let (Some(max), Some(bid)) = (cfg.valor_max, lot.start_bid) {
            if bid > max {
                return false;
            }
        }

        if self.keywords_all.iter().any(|k| !text.contains(k.as_str())) {
            return false;
        }

        if !self.keywords_any.is_empty() && !self.keywords_any.iter().any(|k| text.contains(k.as_str())) {
            return false;
        }

        true
    }

    /// Keeps the lots that pass, preserving order
    pub fn filter(&self, lots: Vec<LotRecord>) -> Vec<LotRecord> {
        lots.into_iter().filter(|lot| self.accept(lot)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::{Builder, NamedTempFile};

    fn temp_with_suffix(suffix: &str) -> NamedTempFile {
        Builder::new().suffix(suffix).tempfile().unwrap()
    }

    fn lot(description: &str) -> LotRecord {
        LotRecord::new("a1", "1", description)
    }

    #[test]
    fn test_ignore_requires_login() {
        let mut locked = lot("Honda Civic");
        locked.requires_login = true;

        assert!(!FilterEngine::new(FiltersConfig::default()).accept(&locked));

        let permissive = FiltersConfig {
            ignore_requires_login: false,
            ..FiltersConfig::default()
        };
        assert!(FilterEngine::new(permissive).accept(&locked));
    }

    #[test]
    fn test_keywords_all() {
        let engine = FilterEngine::new(FiltersConfig {
            descricao_keywords_all: Some(vec!["honda".to_string(), " CIVIC ".to_string()]),
            ..FiltersConfig::default()
        });

        assert!(engine.accept(&lot("Honda Civic")));
        assert!(!engine.accept(&lot("Honda Fit")));
    }

    #[test]
    fn test_keywords_any_and_sucata() {
        let engine = FilterEngine::new(FiltersConfig {
            descricao_keywords_any: Some(vec!["civic".to_string(), "fit".to_string()]),
            ..FiltersConfig::default()
        });

        assert!(engine.accept(&lot("Honda Fit")));
        assert!(!engine.accept(&lot("Fiat Uno")));
        assert!(!engine.accept(&lot("Honda Fit - SUCATA")));
    }

    #[test]
    fn test_vehicle_kind() {
        let motos = FilterEngine::new(FiltersConfig {
            tipo_veiculo: Some(VehicleKind::Moto),
            ..FiltersConfig::default()
        });
        let cars = FilterEngine::new(FiltersConfig {
            tipo_veiculo: Some(VehicleKind::Carro),
            ..FiltersConfig::default()
        });

        let bike = lot("MOTOCICLETA HONDA CG 160");
        let car = lot("FIAT PALIO");
        assert!(motos.accept(&bike));
        assert!(!motos.accept(&car));
        assert!(!cars.accept(&bike));
        assert!(cars.accept(&car));
    }

    #[test]
    fn test_brands_year_and_value() {
        let engine = FilterEngine::new(FiltersConfig {
            marcas_permitidas: Some(vec!["Honda".to_string()]),
            ano_min: Some(2010),
            ano_max: Some(2020),
            valor_max: Some(5000.0),
            ..FiltersConfig::default()
        });

        let mut ok = lot("Lote 1");
        ok.brand_model = Some("HONDA/CG 160".to_string());
        ok.year = Some(2015);
        ok.start_bid = Some(4500.0);
        assert!(engine.accept(&ok));

        let mut unknown = lot("Honda sem dados");
        unknown.year = None;
        unknown.start_bid = None;
        assert!(engine.accept(&unknown));

        let mut old = ok.clone();
        old.year = Some(2005);
        assert!(!engine.accept(&old));

        let mut expensive = ok.clone();
        expensive.start_bid = Some(9000.0);
        assert!(!engine.accept(&expensive));

        let mut other = ok;
        other.brand_model = Some("FIAT/UNO".to_string());
        assert!(!engine.accept(&other));
    }

    #[test]
    fn test_load_filters_yaml_and_json() {
        let mut yaml = temp_with_suffix(".yaml");
        writeln!(yaml, "tipo_veiculo: moto\nano_min: 2012\nignore_sucata: false").unwrap();
        let config = load_filters_config(yaml.path()).unwrap();
        assert_eq!(config.tipo_veiculo, Some(VehicleKind::Moto));
        assert_eq!(config.ano_min, Some(2012));
        assert!(!config.ignore_sucata);
        assert!(config.ignore_requires_login);

        let mut json = temp_with_suffix(".json");
        write!(json, r#"{{"valor_max": 1500.5}}"#).unwrap();
        let config = load_filters_config(json.path()).unwrap();
        assert_eq!(config.valor_max, Some(1500.5));
        assert!(config.ignore_sucata);
    }

    #[test]
    fn test_load_filters_invalid_json() {
        let mut json = temp_with_suffix(".json");
        write!(json, "not json").unwrap();
        assert!(matches!(
            load_filters_config(json.path()),
            Err(FilterError::Json(_))
        ));
    }
}
