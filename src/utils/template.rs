//! `%token%` substitution for reset command templates.

use regex::{Captures, Regex};
use std::sync::OnceLock;

pub struct Tokens;

impl Tokens {
    pub const AH_ENVIRONMENT_ID: &'static str = "%ah_environment_id%";
    pub const ENVIRONMENT_ID: &'static str = "%environment_id%";
    pub const SITE_ID: &'static str = "%site_id%";
    pub const SITE_URI: &'static str = "%site_uri%";
    pub const DRUSH_ALIAS: &'static str = "%drush_alias%";
}

/// Runtime values for the recognized tokens. Unset values leave their
/// placeholder untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenBindings {
    pub environment_id: Option<String>,
    pub site_id: Option<String>,
    pub site_uri: Option<String>,
    pub drush_alias: Option<String>,
}

impl TokenBindings {
    fn value_for(&self, token: &str) -> Option<&str> {
        match token {
            Tokens::AH_ENVIRONMENT_ID | Tokens::ENVIRONMENT_ID => self.environment_id.as_deref(),
            Tokens::SITE_ID => self.site_id.as_deref(),
            Tokens::SITE_URI => self.site_uri.as_deref(),
            Tokens::DRUSH_ALIAS => self.drush_alias.as_deref(),
            _ => None,
        }
    }
}

fn token_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        let alternatives = [
            Tokens::AH_ENVIRONMENT_ID,
            Tokens::ENVIRONMENT_ID,
            Tokens::SITE_ID,
            Tokens::SITE_URI,
            Tokens::DRUSH_ALIAS,
        ]
        .iter()
        .map(|t| regex::escape(t))
        .collect::<Vec<_>>()
        .join("|");
        Regex::new(&alternatives).expect("token pattern is valid")
    })
}

/// Replace every recognized token in one left-to-right pass.
///
/// Substituted values are never scanned again, so a value that itself
/// contains `%site_id%` stays as written.
pub fn substitute(template: &str, bindings: &TokenBindings) -> String {
    token_pattern()
        .replace_all(template, |caps: &Captures| {
            let token = &caps[0];
            bindings.value_for(token).unwrap_or(token).to_string()
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full() -> TokenBindings {
        TokenBindings {
            environment_id: Some("staging".to_string()),
            site_id: Some("www".to_string()),
            site_uri: Some("http://www.test".to_string()),
            drush_alias: Some("@www.local".to_string()),
        }
    }

    #[test]
    fn replaces_every_occurrence() {
        let out = substitute("%site_id%-%site_id% %environment_id%", &full());
        assert_eq!(out, "www-www staging");
    }

    #[test]
    fn ah_environment_id_maps_to_environment() {
        assert_eq!(substitute("env=%ah_environment_id%", &full()), "env=staging");
    }

    #[test]
    fn replaces_uri_and_alias() {
        let out = substitute("drush %drush_alias% --uri=%site_uri% status", &full());
        assert_eq!(out, "drush @www.local --uri=http://www.test status");
    }

    #[test]
    fn template_without_tokens_is_unchanged() {
        assert_eq!(substitute("cache-clear all", &full()), "cache-clear all");
    }

    #[test]
    fn unknown_tokens_are_left_verbatim() {
        let template = "%unknown% %SITE_ID% %site_id";
        assert_eq!(substitute(template, &full()), template);
        assert_eq!(substitute(template, &TokenBindings::default()), template);
    }

    #[test]
    fn unbound_tokens_are_left_verbatim() {
        let bindings = TokenBindings {
            environment_id: Some("local".to_string()),
            site_id: Some("www".to_string()),
            ..Default::default()
        };
        assert_eq!(
            substitute("%environment_id% %site_uri% %drush_alias%", &bindings),
            "local %site_uri% %drush_alias%"
        );
    }

    #[test]
    fn empty_uri_binding_removes_token() {
        let bindings = TokenBindings {
            site_uri: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(substitute("--uri=%site_uri%", &bindings), "--uri=");
    }

    #[test]
    fn substituted_values_are_not_rescanned() {
        let bindings = TokenBindings {
            environment_id: Some("%site_id%".to_string()),
            site_id: Some("www".to_string()),
            ..Default::default()
        };
        assert_eq!(
            substitute("%environment_id%/%site_id%", &bindings),
            "%site_id%/www"
        );
    }
}
