//! Brace-comma endpoint patterns
//!
//! `{contacts,accounts,leads}` matches exactly one of the listed names,
//! `*` matches one path segment, everything else matches verbatim.
//! Patterns are compiled to an anchored regex once, at registry build time.

use crate::error::{Error, Result};
use regex::Regex;

/// A compiled endpoint pattern
#[derive(Debug, Clone)]
pub struct EndpointPattern {
    source: String,
    regex: Regex,
}

impl EndpointPattern {
    /// Compile a pattern
    pub fn compile(pattern: &str) -> Result<Self> {
        let invalid = |message: &str| Error::InvalidEndpointPattern {
            pattern: pattern.to_string(),
            message: message.to_string(),
        };

        if pattern.trim().is_empty() {
            return Err(invalid("pattern is empty"));
        }

        let mut expr = String::from("^");
        let mut rest = pattern;
        while let Some(open) = rest.find(['{', '}', '*']) {
            expr.push_str(&regex::escape(&rest[..open]));
            match rest.as_bytes()[open] {
                b'{' => {
                    let close = rest[open..]
                        .find('}')
                        .map(|i| open + i)
                        .ok_or_else(|| invalid("unclosed '{'"))?;
                    let group = &rest[open + 1..close];
                    if group.contains('{') {
                        return Err(invalid("nested '{'"));
                    }
                    let names: Vec<&str> = group.split(',').map(str::trim).collect();
                    if names.iter().any(|n| n.is_empty()) {
                        return Err(invalid("empty name in brace group"));
                    }
                    let alternatives: Vec<String> =
                        names.iter().map(|n| regex::escape(n)).collect();
                    expr.push_str("(?:");
                    expr.push_str(&alternatives.join("|"));
                    expr.push(')');
                    rest = &rest[close + 1..];
                }
                b'}' => return Err(invalid("unbalanced '}'")),
                _ => {
                    expr.push_str("[^/]+");
                    rest = &rest[open + 1..];
                }
            }
        }
        expr.push_str(&regex::escape(rest));
        expr.push('$');

        let regex = Regex::new(&expr).map_err(|e| invalid(&e.to_string()))?;
        Ok(Self {
            source: pattern.to_string(),
            regex,
        })
    }

    /// Check whether an object name matches
    pub fn matches(&self, object: &str) -> bool {
        self.regex.is_match(object)
    }

    /// The pattern as written
    pub fn as_str(&self) -> &str {
        &self.source
    }

    /// Names listed by the pattern when it has no wildcard
    ///
    /// `{a,b}/items` expands to `a/items`, `b/items`. Returns `None` if the
    /// pattern contains `*`.
    pub fn expand(&self) -> Option<Vec<String>> {
        if self.source.contains('*') {
            return None;
        }
        let mut out = vec![String::new()];
        let mut rest = self.source.as_str();
        while let Some(open) = rest.find('{') {
            let close = open + rest[open..].find('}')?;
            let literal = &rest[..open];
            let names: Vec<&str> = rest[open + 1..close].split(',').map(str::trim).collect();
            out = out
                .iter()
                .flat_map(|prefix| names.iter().map(move |n| format!("{prefix}{literal}{n}")))
                .collect();
            rest = &rest[close + 1..];
        }
        for s in &mut out {
            s.push_str(rest);
        }
        Some(out)
    }
}

impl PartialEq for EndpointPattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}
