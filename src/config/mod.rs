use std::env;

/// Parser behaviour knobs, loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParserConfig {
    /// Surface fuzz entries whose status is outside 200–399 as findings.
    pub include_unsuccessful_fuzz: bool,
    /// Longest finding description kept before truncation.
    pub max_description_len: usize,
}

impl ParserConfig {
    pub const DEFAULT_MAX_DESCRIPTION_LEN: usize = 10_000;

    pub fn from_env() -> Self {
        Self {
            include_unsuccessful_fuzz: env::var("TOOLPARSE_FUZZ_INCLUDE_ALL")
                .ok()
                .and_then(|v| parse_flag(&v))
                .unwrap_or(false),
            max_description_len: env::var("TOOLPARSE_MAX_DESCRIPTION_LEN")
                .unwrap_or_else(|_| Self::DEFAULT_MAX_DESCRIPTION_LEN.to_string())
                .parse()
                .unwrap_or(Self::DEFAULT_MAX_DESCRIPTION_LEN),
        }
    }
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            include_unsuccessful_fuzz: false,
            max_description_len: Self::DEFAULT_MAX_DESCRIPTION_LEN,
        }
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_excludes_unsuccessful_fuzz() {
        let config = ParserConfig::default();
        assert!(!config.include_unsuccessful_fuzz);
        assert_eq!(config.max_description_len, 10_000);
    }

    #[test]
    fn flag_parsing() {
        assert_eq!(parse_flag("TRUE"), Some(true));
        assert_eq!(parse_flag(" on "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
