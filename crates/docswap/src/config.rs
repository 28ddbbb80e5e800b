//! Configuration loading and the translations from configuration to the
//! engine's types.

use std::ffi::OsString;

use docswap_config::Config;
use docswap_engine::{OoxmlOptions, RuleSet};
use ortho_config::OrthoConfig;

use crate::AppError;

pub(crate) trait ConfigLoader {
    /// Loads configuration from `args` and the other configured sources.
    fn load(&self, args: &[OsString]) -> Result<Config, AppError>;
}

/// Loads configuration through `ortho_config`: defaults, then the
/// configuration file, then `DOCSWAP_*` variables, then flags.
pub(crate) struct OrthoConfigLoader;

impl ConfigLoader for OrthoConfigLoader {
    fn load(&self, args: &[OsString]) -> Result<Config, AppError> {
        Config::load_from_iter(args.iter().cloned()).map_err(AppError::LoadConfiguration)
    }
}

/// Validates the configured rules and fixes their order.
pub(crate) fn rule_set(config: &Config) -> Result<RuleSet, AppError> {
    if config.rules().is_empty() {
        return Err(AppError::NoRules);
    }
    let pairs = config
        .rules()
        .iter()
        .map(|rule| (rule.search.as_str(), rule.replace.as_str()));
    Ok(RuleSet::from_pairs(pairs)?)
}

/// Part selection for the OOXML editor.
pub(crate) const fn ooxml_options(config: &Config) -> OoxmlOptions {
    OoxmlOptions {
        word_headers_footers: !config.skip_word_headers_footers,
        word_notes: !config.skip_word_notes,
        word_properties: config.word_properties,
        word_macro_enabled: !config.skip_word_macro_enabled,
        spreadsheet_inline_strings: !config.skip_spreadsheet_inline_strings,
        spreadsheet_properties: !config.skip_spreadsheet_properties,
        spreadsheet_macro_enabled: !config.skip_spreadsheet_macro_enabled,
    }
}

#[cfg(test)]
mod tests {
    use docswap_config::RuleSpec;
    use docswap_engine::RuleSetError;

    use super::*;

    #[test]
    fn rules_keep_their_configured_order() {
        let mut config = Config::new("in", "out");
        config.rules = vec![RuleSpec::new("b", "c"), RuleSpec::new("a", "b")];

        let rules = rule_set(&config).expect("valid rules");

        let searches: Vec<&str> = rules.iter().map(|rule| rule.search()).collect();
        assert_eq!(searches, ["b", "a"]);
    }

    #[test]
    fn duplicate_searches_are_rejected() {
        let mut config = Config::new("in", "out");
        config.rules = vec![RuleSpec::new("a", "b"), RuleSpec::new("a", "c")];

        assert!(matches!(
            rule_set(&config),
            Err(AppError::Rules(RuleSetError::DuplicateSearch(_)))
        ));
    }

    #[test]
    fn an_empty_rule_list_is_rejected() {
        let config = Config::new("in", "out");
        assert!(matches!(rule_set(&config), Err(AppError::NoRules)));
    }

    #[test]
    fn options_follow_the_configuration() {
        let mut config = Config::new("in", "out");
        config.word_properties = true;
        config.skip_spreadsheet_macro_enabled = true;

        let options = ooxml_options(&config);

        assert!(options.word_properties);
        assert!(!options.spreadsheet_macro_enabled);
        assert!(options.word_headers_footers);
    }

    #[test]
    fn default_configuration_selects_the_default_parts() {
        assert_eq!(
            ooxml_options(&Config::new("in", "out")),
            OoxmlOptions::default()
        );
    }
}
