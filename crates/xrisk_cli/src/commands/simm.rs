//! SIMM command implementation

use std::path::Path;

use anyhow::{Context, Result};
use tracing::info;
use xrisk_analytics::simm::{load_crif, SimmCalculator, SimmConfiguration};

/// Parses SIMM parameters from TOML.
fn parse_simm_config(text: &str) -> Result<SimmConfiguration> {
    Ok(toml::from_str(text)?)
}

/// Run the simm command
pub fn run(crif: &Path, simm_config: &Path) -> Result<()> {
    let text = std::fs::read_to_string(simm_config)
        .with_context(|| format!("reading SIMM configuration {}", simm_config.display()))?;
    let config = parse_simm_config(&text).with_context(|| format!("parsing {}", simm_config.display()))?;
    let calculator = SimmCalculator::new(config)?;
    let records = load_crif(crif)?;
    let results = calculator.calculate(&records)?;
    info!(netting_sets = results.netting_sets.len(), records = records.len(), "SIMM complete");
    results.write_csv(std::io::stdout().lock())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simm_config() {
        let text = r#"
[risk_class_correlation]
default = 0.3

[risk_types.Risk_FX]
risk_class = "FX"
default_weight = 7.4

[risk_types.Risk_IRCurve]
risk_class = "InterestRate"
qualifier_correlation = 0.27
concentration_thresholds = { "1" = 230000000.0 }

[risk_types.Risk_IRCurve.weights]
"1" = 109.0

[risk_types.Risk_IRCurve.label1_correlation]
names = ["2y", "5y"]
matrix = [[1.0, 0.9], [0.9, 1.0]]
default = 0.5
"#;
        let config = parse_simm_config(text).unwrap();
        config.validate().unwrap();
        let ir = config.risk_type("Risk_IRCurve").unwrap();
        assert_eq!(ir.weight("Risk_IRCurve", "1").unwrap(), 109.0);
        assert_eq!(ir.label1_correlation.get("2y", "5y"), 0.9);
        assert_eq!(config.risk_class_correlation.get("FX", "InterestRate"), 0.3);
    }
}
