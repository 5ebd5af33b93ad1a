//! Response matching for module rules

use regex::bytes::Regex;

use super::Finding;
use crate::error::{Result, ScanError};
use crate::http::HttpResponse;
use crate::module::{MatchKind, MatchRule, Module};

/// Evaluates the module's rules against one response.
///
/// Every rule is evaluated, positive then negative, with no short-circuit.
/// The result is a hit when at least `matches_required` positive rules
/// matched, no required positive rule failed and no negative rule matched.
pub fn evaluate(module: &Module, response: &HttpResponse) -> Result<Finding> {
    let spec = &module.response;
    let mut count = 0;
    let mut force_no_hit = false;

    for rule in &spec.matches {
        let matched = test_rule(rule, response)?;
        if matched {
            count += 1;
        } else if rule.required {
            force_no_hit = true;
        }
    }

    for rule in &spec.must_not_match {
        if test_rule(rule, response)? {
            force_no_hit = true;
        }
    }

    let hit = count >= spec.matches_required && !force_no_hit;

    Ok(Finding {
        module: module.name.clone(),
        url: response.url.clone(),
        matches: count,
        hit,
        message: format!("{} at {} ({} matches)", module.name, response.url, count),
    })
}

/// Tests a single rule. Body and header values are matched as raw bytes.
pub fn test_rule(rule: &MatchRule, response: &HttpResponse) -> Result<bool> {
    match &rule.kind {
        MatchKind::Static { pattern } => Ok(contains(&response.body, pattern.as_bytes())),
        MatchKind::Regex { pattern } => Ok(compile(rule, pattern)?.is_match(&response.body)),
        MatchKind::Status { code } => Ok(response.status == *code),
        MatchKind::Header { name, pattern } => {
            Ok(compile(rule, pattern)?.is_match(response.header(name)))
        }
    }
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    needle.is_empty() || haystack.windows(needle.len()).any(|window| window == needle)
}

/// Compiles the rule's pattern once; later calls reuse the cached regex or
/// the cached error.
fn compile<'r>(rule: &'r MatchRule, pattern: &str) -> Result<&'r Regex> {
    rule.compiled
        .get_or_init(|| {
            Regex::new(pattern).map_err(|e| format!("invalid regex '{}': {}", pattern, e))
        })
        .as_ref()
        .map_err(|e| ScanError::Evaluation(e.clone()))
}
