//! Query string parsing and matcher evaluation

use crate::{LogCasterError, Result};
use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};

/// Maximum keywords accepted per query; extras are ignored
pub const MAX_KEYWORDS: usize = 10;

/// Logical operator applied across keywords
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OperatorType {
    /// Every keyword must be a substring of the message
    #[default]
    And,
    /// At least one keyword must be a substring of the message
    Or,
}

/// A compiled query ready for evaluation against buffer entries
#[derive(Debug, Default)]
pub struct ParsedQuery {
    /// Keyword substrings, at most [`MAX_KEYWORDS`]
    pub keywords: Vec<String>,
    /// Optional case-insensitive regex required to match somewhere in the message
    pub regex: Option<Regex>,
    /// Inclusive lower time bound, Unix seconds
    pub time_from: Option<i64>,
    /// Inclusive upper time bound, Unix seconds
    pub time_to: Option<i64>,
    /// Operator applied to the keyword list only
    pub operator: OperatorType,
}

impl ParsedQuery {
    /// Parse the textual form `QUERY [key=value]...`.
    ///
    /// Tokens split on whitespace; tokens without `=` are skipped; keys are
    /// case-insensitive and unrecognized keys are ignored. `keyword` and
    /// `keywords` are aliases. `operator=OR` (any case) selects OR; anything
    /// else, including absence, selects AND.
    pub fn parse(query_string: &str) -> Result<Self> {
        let mut query = ParsedQuery::default();

        // Skip the leading QUERY keyword
        for token in query_string.split_whitespace().skip(1) {
            let Some((key, value)) = token.split_once('=') else {
                continue;
            };

            match key.to_ascii_lowercase().as_str() {
                "keyword" | "keywords" => {
                    for keyword in value.split(',') {
                        if query.keywords.len() >= MAX_KEYWORDS {
                            break;
                        }
                        if !keyword.is_empty() {
                            query.keywords.push(keyword.to_string());
                        }
                    }
                }
                "regex" => {
                    let compiled = RegexBuilder::new(value)
                        .case_insensitive(true)
                        .build()
                        .map_err(|e| {
                            LogCasterError::Query(format!("Invalid regex pattern: {}", e))
                        })?;
                    query.regex = Some(compiled);
                }
                "time_from" => {
                    query.time_from = Some(parse_unix_seconds(key, value)?);
                }
                "time_to" => {
                    query.time_to = Some(parse_unix_seconds(key, value)?);
                }
                "operator" => {
                    if value.eq_ignore_ascii_case("or") {
                        query.operator = OperatorType::Or;
                    }
                }
                _ => {}
            }
        }

        Ok(query)
    }

    /// Evaluate the matcher against a message and its ingest timestamp.
    ///
    /// Order: time window (inclusive, unset endpoint unbounded), then regex, then
    /// keywords under the configured operator. A query with no filters accepts
    /// everything.
    pub fn matches(&self, message: &str, timestamp: DateTime<Utc>) -> bool {
        let unix = timestamp.timestamp();
        if let Some(from) = self.time_from {
            if unix < from {
                return false;
            }
        }
        if let Some(to) = self.time_to {
            if unix > to {
                return false;
            }
        }

        if let Some(regex) = &self.regex {
            if !regex.is_match(message) {
                return false;
            }
        }

        if !self.keywords.is_empty() {
            match self.operator {
                OperatorType::And => {
                    if !self.keywords.iter().all(|kw| message.contains(kw.as_str())) {
                        return false;
                    }
                }
                OperatorType::Or => {
                    if !self.keywords.iter().any(|kw| message.contains(kw.as_str())) {
                        return false;
                    }
                }
            }
        }

        true
    }
}

fn parse_unix_seconds(key: &str, value: &str) -> Result<i64> {
    value
        .parse::<i64>()
        .map_err(|_| LogCasterError::Query(format!("Invalid {} value: {}", key, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc::now()
    }

    #[test]
    fn test_empty_query_accepts_everything() {
        let query = ParsedQuery::parse("QUERY").unwrap();
        assert!(query.matches("anything at all", now()));
        assert!(query.matches("", now()));
    }

    #[test]
    fn test_keyword_and_semantics() {
        let query = ParsedQuery::parse("QUERY keywords=error,timeout").unwrap();
        assert!(query.matches("error after timeout", now()));
        assert!(!query.matches("error only", now()));
        assert!(!query.matches("timeout only", now()));
    }

    #[test]
    fn test_keyword_or_semantics() {
        let query = ParsedQuery::parse("QUERY keywords=error,timeout operator=OR").unwrap();
        assert!(query.matches("an error happened", now()));
        assert!(query.matches("request timeout", now()));
        assert!(!query.matches("all good", now()));
    }

    #[test]
    fn test_operator_value_case_insensitive() {
        let query = ParsedQuery::parse("QUERY keywords=a operator=or").unwrap();
        assert_eq!(query.operator, OperatorType::Or);
        // Anything other than OR falls back to AND
        let query = ParsedQuery::parse("QUERY keywords=a operator=XOR").unwrap();
        assert_eq!(query.operator, OperatorType::And);
    }

    #[test]
    fn test_keyword_alias() {
        let query = ParsedQuery::parse("QUERY keyword=single").unwrap();
        assert_eq!(query.keywords, vec!["single".to_string()]);
    }

    #[test]
    fn test_keyword_cap() {
        let line = format!(
            "QUERY keywords={}",
            (0..20).map(|i| format!("k{}", i)).collect::<Vec<_>>().join(",")
        );
        let query = ParsedQuery::parse(&line).unwrap();
        assert_eq!(query.keywords.len(), MAX_KEYWORDS);
    }

    #[test]
    fn test_regex_case_insensitive() {
        let query = ParsedQuery::parse("QUERY regex=FAIL").unwrap();
        assert!(query.matches("pipeline failed quickly", now()));
        assert!(!query.matches("pipeline passed", now()));
    }

    #[test]
    fn test_invalid_regex_is_error() {
        assert!(ParsedQuery::parse("QUERY regex=(unclosed").is_err());
    }

    #[test]
    fn test_regex_and_or_keywords_both_required() {
        // Regex matches but neither OR keyword is a substring: no match
        let query = ParsedQuery::parse("QUERY keywords=err,timeout operator=OR regex=fail").unwrap();
        assert!(!query.matches("pipeline failed quickly", now()));
        // Adding a message satisfying one keyword matches
        assert!(query.matches("err: pipeline failed", now()));
    }

    #[test]
    fn test_time_window_inclusive() {
        let query = ParsedQuery::parse("QUERY time_from=1000 time_to=2000").unwrap();
        let at = |secs: i64| Utc.timestamp_opt(secs, 0).unwrap();
        assert!(!query.matches("m", at(999)));
        assert!(query.matches("m", at(1000)));
        assert!(query.matches("m", at(1500)));
        assert!(query.matches("m", at(2000)));
        assert!(!query.matches("m", at(2001)));
    }

    #[test]
    fn test_unset_time_bound_is_unbounded() {
        let query = ParsedQuery::parse("QUERY time_from=1000").unwrap();
        let at = |secs: i64| Utc.timestamp_opt(secs, 0).unwrap();
        assert!(query.matches("m", at(i32::MAX as i64)));
        assert!(!query.matches("m", at(999)));
    }

    #[test]
    fn test_invalid_time_is_error() {
        assert!(ParsedQuery::parse("QUERY time_from=notanumber").is_err());
    }

    #[test]
    fn test_unknown_keys_and_bare_tokens_ignored() {
        let query = ParsedQuery::parse("QUERY foo=bar stray keywords=ok").unwrap();
        assert_eq!(query.keywords, vec!["ok".to_string()]);
    }
}
