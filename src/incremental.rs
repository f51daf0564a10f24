//! Incremental-read filters
//!
//! Translates a caller's `since`/`until` window into whatever the provider
//! expects: query parameters (`updated_at[gte]`), GraphQL variables
//! (`filter.updatedAt.gte`) or JSON body fields. Instants are always sent in
//! UTC in the provider's [`TimeFormat`].

use crate::error::Result;
use crate::http::{HttpRequest, ParamLocation};
use crate::types::TimeFormat;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Where and how an object accepts a time window
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct IncrementalFilter {
    #[serde(default)]
    pub since: Option<ParamLocation>,
    #[serde(default)]
    pub until: Option<ParamLocation>,
    #[serde(default)]
    pub format: TimeFormat,
}

impl IncrementalFilter {
    /// REST query parameters
    pub fn query(since: &str, until: Option<&str>) -> Self {
        Self {
            since: Some(ParamLocation::query(since)),
            until: until.map(ParamLocation::query),
            format: TimeFormat::default(),
        }
    }

    /// GraphQL `filter.<field>.{gte,lte}` variables
    pub fn graphql(field: &str) -> Self {
        Self {
            since: Some(ParamLocation::variable(format!("filter.{field}.gte"))),
            until: Some(ParamLocation::variable(format!("filter.{field}.lte"))),
            format: TimeFormat::default(),
        }
    }

    /// Use a different wire format
    #[must_use]
    pub fn with_format(mut self, format: TimeFormat) -> Self {
        self.format = format;
        self
    }

    /// Whether the object can be filtered by time at all
    pub fn supports_since(&self) -> bool {
        self.since.is_some()
    }

    /// Write the window into a request
    ///
    /// Bounds the filter has no location for are ignored.
    pub fn apply(
        &self,
        req: &mut HttpRequest,
        since: Option<&DateTime<Utc>>,
        until: Option<&DateTime<Utc>>,
    ) -> Result<()> {
        if let (Some(location), Some(instant)) = (&self.since, since) {
            req.set_param(location, self.format.format(instant))?;
        }
        if let (Some(location), Some(instant)) = (&self.until, until) {
            req.set_param(location, self.format.format(instant))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::url_builder::UrlBuilder;
    use chrono::{FixedOffset, TimeZone};
    use serde_json::json;

    fn instant(y: i32, m: u32, d: u32, h: u32, offset_hours: i32) -> DateTime<Utc> {
        FixedOffset::east_opt(offset_hours * 3600)
            .unwrap()
            .with_ymd_and_hms(y, m, d, h, 0, 0)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn test_query_params_in_utc() {
        let filter = IncrementalFilter::query("since", Some("until"));
        let mut req =
            HttpRequest::get(UrlBuilder::new("https://api.example.com", &["contacts"]).unwrap());
        // Caller in UTC-08:00
        let since = instant(2024, 10, 31, 16, -8);
        let until = instant(2024, 11, 30, 16, -8);
        filter.apply(&mut req, Some(&since), Some(&until)).unwrap();
        assert_eq!(req.url.query_param("since"), Some("2024-11-01T00:00:00Z"));
        assert_eq!(req.url.query_param("until"), Some("2024-12-01T00:00:00Z"));
    }

    #[test]
    fn test_graphql_variables() {
        let filter = IncrementalFilter::graphql("updatedAt");
        let mut req = HttpRequest::graphql(
            UrlBuilder::new("https://api.example.com", &["graphql"]).unwrap(),
            "query",
            json!({}),
        );
        filter
            .apply(&mut req, Some(&instant(2024, 11, 1, 0, 0)), None)
            .unwrap();
        assert_eq!(
            req.body.unwrap()["variables"],
            json!({"filter": {"updatedAt": {"gte": "2024-11-01T00:00:00Z"}}})
        );
    }

    #[test]
    fn test_unix_body_field() {
        let filter = IncrementalFilter {
            since: Some(ParamLocation::body("modifiedAfter")),
            until: None,
            format: TimeFormat::Unix,
        };
        let mut req = HttpRequest::post(
            UrlBuilder::new("https://api.example.com", &["search"]).unwrap(),
            json!({"limit": 10}),
        );
        filter
            .apply(&mut req, Some(&instant(2024, 11, 1, 0, 0)), None)
            .unwrap();
        assert_eq!(req.body.unwrap(), json!({"limit": 10, "modifiedAfter": 1_730_419_200}));
    }

    #[test]
    fn test_yaml() {
        let filter: IncrementalFilter = serde_yaml::from_str(
            "since: { in: query, name: fromDateTime }\nuntil: { in: query, name: toDateTime }\n",
        )
        .unwrap();
        assert!(filter.supports_since());
        assert_eq!(filter.format, TimeFormat::Rfc3339);
    }
}
