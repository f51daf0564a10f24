//! Tests for pagination strategies

use super::*;
use crate::error::{Error, ErrorKind};
use crate::http::{HttpRequest, ParamLocation};
use crate::types::JsonValue;
use crate::url_builder::UrlBuilder;
use serde_json::json;
use test_case::test_case;

fn get() -> HttpRequest {
    HttpRequest::get(UrlBuilder::new("https://api.example.com", &["items"]).unwrap())
}

fn records(n: usize) -> Vec<JsonValue> {
    (0..n).map(|i| json!({"id": i})).collect()
}

fn page<'a>(
    body: &'a JsonValue,
    records: &'a [JsonValue],
    page_size: usize,
    token: Option<&'a str>,
) -> Page<'a> {
    Page {
        body,
        records,
        page_size,
        token,
    }
}

// ============================================================================
// Page size policy
// ============================================================================

#[test]
fn test_page_size_policy() {
    let policy = PageSizePolicy::default();
    assert_eq!(policy.resolve(None).unwrap(), 50);
    assert_eq!(policy.resolve(Some(0)).unwrap(), 50);
    assert_eq!(policy.resolve(Some(500)).unwrap(), 500);

    let policy = PageSizePolicy::with_max(100, 25);
    assert_eq!(policy.resolve(None).unwrap(), 25);
    assert_eq!(policy.resolve(Some(1)).unwrap(), 1);
    let err = policy.resolve(Some(26)).unwrap_err();
    assert!(err.is(ErrorKind::BadRequest));
}

// ============================================================================
// Opaque cursor
// ============================================================================

#[test]
fn test_cursor_in_body_verbatim() {
    let p = CursorPaginator::new(ParamLocation::query("cursor"), "records.cursor")
        .page_size_param(ParamLocation::query("limit"));

    let body = json!({"calls": [{"id": "A"}, {"id": "B"}], "records": {"cursor": "c1"}});
    let recs = records(2);
    let next = advance(&p, &page(&body, &recs, 2, None)).unwrap();
    assert_eq!(next, NextPage::Continue("c1".to_string()));

    let mut req = get();
    p.apply(&mut req, 2, Some("c1")).unwrap();
    assert_eq!(
        req.url.to_string(),
        "https://api.example.com/items?limit=2&cursor=c1"
    );

    let body = json!({"calls": [{"id": "C"}], "records": {}});
    let recs = records(1);
    let next = advance(&p, &page(&body, &recs, 2, Some("c1"))).unwrap();
    assert!(next.is_done());
    assert_eq!(next.into_token(), "");
}

#[test]
fn test_cursor_loop_detected() {
    let p = CursorPaginator::new(ParamLocation::query("cursor"), "next");
    let body = json!({"next": "same"});
    let recs = records(3);
    let err = advance(&p, &page(&body, &recs, 3, Some("same"))).unwrap_err();
    assert!(matches!(err, Error::PaginationLoop { .. }));
    assert!(err.is(ErrorKind::PaginationLoop));
}

#[test]
fn test_graphql_cursor_stops_on_has_next_page() {
    let p = CursorPaginator::new(
        ParamLocation::variable("after"),
        "data.issues.pageInfo.endCursor",
    )
    .page_size_param(ParamLocation::variable("first"))
    .stop_when(StopWhen::field("data.issues.pageInfo.hasNextPage", false));

    let body = json!({"data": {"issues": {"nodes": [{}], "pageInfo": {
        "hasNextPage": false, "endCursor": "e1"
    }}}});
    let recs = records(1);
    assert!(advance(&p, &page(&body, &recs, 10, None)).unwrap().is_done());

    let mut req = HttpRequest::graphql(get().url, "query", json!({}));
    p.apply(&mut req, 10, Some("e0")).unwrap();
    assert_eq!(
        req.body.unwrap()["variables"],
        json!({"first": 10, "after": "e0"})
    );
}

#[test]
fn test_empty_page_is_done_even_with_cursor() {
    let p = CursorPaginator::new(ParamLocation::query("cursor"), "next");
    let body = json!({"items": [], "next": "more"});
    assert!(advance(&p, &page(&body, &[], 10, None)).unwrap().is_done());
}

#[test]
fn test_cursor_wrong_type_is_error() {
    let p = CursorPaginator::new(ParamLocation::query("cursor"), "next");
    let body = json!({"next": {"a": 1}});
    let recs = records(1);
    assert!(advance(&p, &page(&body, &recs, 1, None)).is_err());
}

// ============================================================================
// URL cursor
// ============================================================================

#[test]
fn test_url_cursor_replayed_verbatim() {
    let p = UrlCursorPaginator::new("links.next").page_size_param(ParamLocation::query("per_page"));
    let next_url = "https://api.example.com/items?page%5Bafter%5D=abc%3D&per_page=2";
    let body = json!({"data": [{}, {}], "links": {"next": next_url}});
    let recs = records(2);
    let next = advance(&p, &page(&body, &recs, 2, None)).unwrap();
    assert_eq!(next, NextPage::Continue(next_url.to_string()));

    let mut req = get();
    p.apply(&mut req, 2, Some(next_url)).unwrap();
    assert_eq!(req.url.to_string(), next_url);

    let body = json!({"data": [{}], "links": {"next": null}});
    let recs = records(1);
    assert!(advance(&p, &page(&body, &recs, 2, Some(next_url))).unwrap().is_done());
}

#[test]
fn test_url_cursor_origin_rewrite() {
    let p = UrlCursorPaginator::new("links.next").with_origin("http://127.0.0.1:9000");
    let mut req = get();
    p.apply(&mut req, 2, Some("https://api.example.com/v1/items?after=x"))
        .unwrap();
    assert_eq!(req.url.to_string(), "http://127.0.0.1:9000/v1/items?after=x");
}

// ============================================================================
// Page number & offset
// ============================================================================

#[test]
fn test_page_number_short_page_terminates() {
    let p = PageNumberPaginator::new(ParamLocation::query("page"), 1)
        .page_size_param(ParamLocation::query("per_page"));
    let body = json!({});

    let mut req = get();
    p.apply(&mut req, 50, None).unwrap();
    assert_eq!(req.url.query_param("page"), Some("1"));

    let full = records(50);
    let token = advance(&p, &page(&body, &full, 50, None)).unwrap().into_token();
    assert!(!token.is_empty());

    let mut req = get();
    p.apply(&mut req, 50, Some(&token)).unwrap();
    assert_eq!(req.url.query_param("page"), Some("2"));

    let short = records(13);
    assert!(advance(&p, &page(&body, &short, 50, Some(&token)))
        .unwrap()
        .is_done());
}

/// Three records served one per page by a fake provider of each family
fn serve_one(family: PaginationFamily, req: &HttpRequest) -> JsonValue {
    let url = url::Url::parse(&req.url.to_string()).unwrap();
    let param = |name: &str| {
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    };
    let stamps = [
        "2024-11-01T00:00:00Z",
        "2024-11-02T00:00:00Z",
        "2024-11-03T00:00:00Z",
    ];
    let start = match family {
        PaginationFamily::OpaqueCursor => param("cursor").map_or(0, |c| c[1..].parse().unwrap()),
        PaginationFamily::UrlCursor => param("after").map_or(0, |a| a.parse().unwrap()),
        PaginationFamily::PageNumber => param("page").map_or(0, |p| p.parse().unwrap()),
        PaginationFamily::Offset => param("offset").map_or(0, |o| o.parse().unwrap()),
        PaginationFamily::TimeWindow => param("since").map_or(0, |since| {
            stamps.iter().take_while(|s| **s <= since.as_str()).count()
        }),
        PaginationFamily::None => 0,
    };
    let items: Vec<JsonValue> = stamps
        .iter()
        .enumerate()
        .skip(start)
        .take(1)
        .map(|(i, s)| json!({"id": i, "updatedAt": s}))
        .collect();
    let next = start + 1;
    json!({
        "items": items,
        "next": format!("c{next}"),
        "links": {"next": format!("https://api.example.com/items?after={next}")}
    })
}

#[test_case(PaginationFamily::OpaqueCursor ; "opaque cursor")]
#[test_case(PaginationFamily::UrlCursor ; "url cursor")]
#[test_case(PaginationFamily::PageNumber ; "page number")]
#[test_case(PaginationFamily::Offset ; "offset")]
#[test_case(PaginationFamily::TimeWindow ; "time window")]
fn test_page_size_one_terminates(family: PaginationFamily) {
    let p: Box<dyn Paginator> = match family {
        PaginationFamily::OpaqueCursor => {
            Box::new(CursorPaginator::new(ParamLocation::query("cursor"), "next"))
        }
        PaginationFamily::UrlCursor => Box::new(UrlCursorPaginator::new("links.next")),
        PaginationFamily::PageNumber => {
            Box::new(PageNumberPaginator::new(ParamLocation::query("page"), 0))
        }
        PaginationFamily::Offset => Box::new(OffsetPaginator::new(
            ParamLocation::query("offset"),
            Some(ParamLocation::query("limit")),
        )),
        PaginationFamily::TimeWindow => {
            Box::new(TimeWindowPaginator::new(ParamLocation::query("since"), "updatedAt"))
        }
        PaginationFamily::None => unreachable!(),
    };

    let mut token: Option<String> = None;
    let mut seen = Vec::new();
    let mut calls = 0;
    loop {
        calls += 1;
        assert!(calls <= 4, "{family:?} did not terminate");
        let mut req = get();
        p.apply(&mut req, 1, token.as_deref()).unwrap();
        let body = serve_one(family, &req);
        let recs = body["items"].as_array().unwrap().clone();
        assert!(recs.len() <= 1);
        seen.extend(recs.iter().map(|r| r["id"].clone()));

        let next = advance(p.as_ref(), &page(&body, &recs, 1, token.as_deref())).unwrap();
        if next.is_done() {
            break;
        }
        token = Some(next.into_token());
    }
    // Three pages of one record, then an empty page
    assert_eq!(seen, vec![json!(0), json!(1), json!(2)]);
    assert_eq!(calls, 4);
}

#[test]
fn test_offset_advances_by_count() {
    let p = OffsetPaginator::new(
        ParamLocation::query("offset"),
        Some(ParamLocation::query("limit")),
    );
    let body = json!({});
    let recs = records(10);
    let token = advance(&p, &page(&body, &recs, 10, None)).unwrap().into_token();

    let mut req = get();
    p.apply(&mut req, 10, Some(&token)).unwrap();
    assert_eq!(req.url.query_param("offset"), Some("10"));
    assert_eq!(req.url.query_param("limit"), Some("10"));
}

#[test]
fn test_foreign_token_rejected() {
    let p = OffsetPaginator::new(ParamLocation::query("offset"), None);
    let mut req = get();
    let err = p.apply(&mut req, 10, Some("not-a-token!")).unwrap_err();
    assert!(err.is(ErrorKind::BadRequest));

    let page_token = PageState::Page(3).encode();
    assert!(p.apply(&mut req, 10, Some(&page_token)).is_err());
}

// ============================================================================
// Time window
// ============================================================================

#[test]
fn test_time_window_replays_high_water_mark() {
    let p = TimeWindowPaginator::new(ParamLocation::query("since"), "updatedAt");
    let body = json!({});
    let recs = vec![
        json!({"id": 1, "updatedAt": "2024-11-02T10:00:00Z"}),
        json!({"id": 2, "updatedAt": "2024-11-03T09:30:00+01:00"}),
    ];
    let token = advance(&p, &page(&body, &recs, 2, None)).unwrap().into_token();

    let mut req = get();
    p.apply(&mut req, 2, Some(&token)).unwrap();
    assert_eq!(req.url.query_param("since"), Some("2024-11-03T08:30:00Z"));

    // A short page ends the window
    let short = vec![json!({"id": 3, "updatedAt": "2024-11-04T00:00:00Z"})];
    assert!(advance(&p, &page(&body, &short, 2, Some(&token))).unwrap().is_done());
}

#[test]
fn test_time_window_stuck_mark_is_loop() {
    let p = TimeWindowPaginator::new(ParamLocation::query("since"), "updatedAt");
    let body = json!({});
    let recs = vec![
        json!({"updatedAt": "2024-11-02T10:00:00Z"}),
        json!({"updatedAt": "2024-11-02T10:00:00Z"}),
    ];
    let token = advance(&p, &page(&body, &recs, 2, None)).unwrap().into_token();
    let err = advance(&p, &page(&body, &recs, 2, Some(&token))).unwrap_err();
    assert!(err.is(ErrorKind::PaginationLoop));
}

#[test]
fn test_parse_timestamp_epochs() {
    let secs = parse_timestamp(&json!(1_730_419_200)).unwrap();
    let millis = parse_timestamp(&json!(1_730_419_200_000_i64)).unwrap();
    assert_eq!(secs, millis);
    assert!(parse_timestamp(&json!(true)).is_none());
}

// ============================================================================
// Definitions
// ============================================================================

#[test]
fn test_definition_from_yaml() {
    let def: PaginationDefinition = serde_yaml::from_str(
        r"
type: cursor
cursor_param: { in: query, name: cursor }
cursor_path: records.cursor
page_size_param: { in: query, name: limit }
",
    )
    .unwrap();
    assert_eq!(def.family(), PaginationFamily::OpaqueCursor);
    assert_eq!(def.build().family(), PaginationFamily::OpaqueCursor);

    let def: PaginationDefinition =
        serde_yaml::from_str("type: page_number\npage_param: { in: query, name: page }").unwrap();
    assert!(matches!(def, PaginationDefinition::PageNumber { start_page: 1, .. }));

    assert_eq!(PaginationDefinition::default().build().family(), PaginationFamily::None);
}

#[test]
fn test_no_paginator() {
    let body = json!({});
    let recs = records(100);
    assert!(advance(&NoPaginator, &page(&body, &recs, 10, None))
        .unwrap()
        .is_done());
}
