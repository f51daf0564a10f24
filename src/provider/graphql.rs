//! GraphQL handlers driven by a module definition
//!
//! Lists use relay-style connections (`nodes` + `pageInfo`), writes and
//! deletes are mutations whose variables are `{input, id}`. A 200 reply can
//! still carry failures: top-level `errors` and per-mutation `userErrors`
//! are both checked.

use super::handlers::{
    apply_window_and_cursor, error_messages, extract_records, ProviderHandlers, RequestContext,
};
use super::types::{GraphqlObjectDefinition, MetadataSource, ModuleDefinition, ObjectDefinition};
use crate::connector::{
    DeleteParams, DeleteResult, Fields, ReadParams, ReadResult, ReadResultRow, WriteParams,
    WriteResult,
};
use crate::error::{Error, ErrorKind, Result};
use crate::http::{FormatSwitch, HttpRequest, JsonResponse, ParamLocation};
use crate::jsonquery::JsonQuery;
use crate::pagination::{advance, CursorPaginator, Page, Paginator, StopWhen};
use crate::schema::{
    parse_sample_response, parse_type_introspection, type_query_variables, ObjectMetadata,
    SampleInferrer, TYPE_INTROSPECTION_QUERY,
};
use crate::types::{normalize_object_name, JsonValue};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

/// Connection arguments sent with every list query
///
/// Cursors are opaque strings; only `pageInfo.hasNextPage` is a boolean.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PaginationParameter {
    pub first: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub before: Option<String>,
}

impl PaginationParameter {
    /// First page of `first` nodes
    pub fn first(first: usize) -> Self {
        Self {
            first,
            ..Default::default()
        }
    }
}

/// Naming resolved for one object
#[derive(Debug, Clone)]
struct Names {
    object: String,
    type_name: String,
    query_field: String,
    record_field: String,
}

/// Handlers for a GraphQL module
#[derive(Debug, Clone)]
pub struct GraphQLHandlers {
    module: ModuleDefinition,
    errors: FormatSwitch,
}

impl GraphQLHandlers {
    /// Handlers for a module, with the provider's error format
    pub fn new(module: ModuleDefinition, errors: FormatSwitch) -> Self {
        Self { module, errors }
    }

    fn object(
        &self,
        ctx: &RequestContext<'_>,
        name: &str,
    ) -> (Names, ObjectDefinition, GraphqlObjectDefinition) {
        let object = normalize_object_name(name);
        let def = self.module.object(&object);
        let gql = def.graphql.clone().unwrap_or_default();

        let query_field = gql
            .query_field
            .clone()
            .unwrap_or_else(|| ctx.resolve_endpoint(&object));
        let type_name = gql
            .type_name
            .clone()
            .unwrap_or_else(|| upper_first(object.strip_suffix('s').unwrap_or(&object)));
        let record_field = gql
            .record_field
            .clone()
            .unwrap_or_else(|| lower_first(&type_name));

        let names = Names {
            object,
            type_name,
            query_field,
            record_field,
        };
        (names, def, gql)
    }

    fn paginator(names: &Names, def: &ObjectDefinition) -> Box<dyn Paginator> {
        match &def.pagination {
            Some(pagination) => pagination.build(),
            None => {
                let field = &names.query_field;
                Box::new(
                    CursorPaginator::new(
                        ParamLocation::variable("after"),
                        format!("data.{field}.pageInfo.endCursor"),
                    )
                    .page_size_param(ParamLocation::variable("first"))
                    .stop_when(StopWhen::field(
                        format!("data.{field}.pageInfo.hasNextPage"),
                        false,
                    )),
                )
            }
        }
    }

    fn records_path(names: &Names, def: &ObjectDefinition) -> String {
        def.records_path
            .clone()
            .unwrap_or_else(|| format!("data.{}.nodes", names.query_field))
    }

    fn filter_param(def: &ObjectDefinition) -> ParamLocation {
        def.filter_param
            .clone()
            .unwrap_or_else(|| ParamLocation::variable("filter"))
    }

    /// `$filter` is declared when the object filters by time or the caller
    /// passes a filter
    fn list_query(
        names: &Names,
        def: &ObjectDefinition,
        gql: &GraphqlObjectDefinition,
        params: &ReadParams,
    ) -> String {
        if let Some(query) = &gql.query {
            return query.clone();
        }
        let filtered =
            def.incremental.is_some() || def.filter_param.is_some() || params.filter.is_some();
        let (filter_decl, filter_arg) = if filtered {
            let filter_type = gql
                .filter_type
                .clone()
                .unwrap_or_else(|| format!("{}Filter", names.type_name));
            (format!(", $filter: {filter_type}"), ", filter: $filter")
        } else {
            (String::new(), "")
        };
        format!(
            "query List($first: Int, $after: String{filter_decl}) {{ {field}(first: $first, after: $after{filter_arg}) {{ nodes {{ {selection} }} pageInfo {{ hasNextPage endCursor }} }} }}",
            field = names.query_field,
            selection = selection(&params.fields, gql),
        )
    }

    fn mutation_payload(names: &Names, gql: &GraphqlObjectDefinition) -> String {
        let mut payload = format!("{} {{ id }}", names.record_field);
        if gql.user_errors.unwrap_or(false) {
            payload.push_str(" userErrors { field message }");
        }
        payload
    }

    fn create_mutation(names: &Names, gql: &GraphqlObjectDefinition) -> String {
        gql.create_mutation
            .clone()
            .unwrap_or_else(|| format!("{}Create", names.record_field))
    }

    fn update_mutation(names: &Names, gql: &GraphqlObjectDefinition) -> String {
        gql.update_mutation
            .clone()
            .unwrap_or_else(|| format!("{}Update", names.record_field))
    }

    fn delete_mutation(names: &Names, gql: &GraphqlObjectDefinition) -> String {
        gql.delete_mutation
            .clone()
            .unwrap_or_else(|| format!("{}Delete", names.record_field))
    }
}

impl ProviderHandlers for GraphQLHandlers {
    fn error_format(&self) -> FormatSwitch {
        self.errors.clone()
    }

    fn build_read_request(
        &self,
        ctx: &RequestContext<'_>,
        params: &ReadParams,
        page_size: usize,
    ) -> Result<HttpRequest> {
        let (names, def, gql) = self.object(ctx, &params.object_name);
        let variables = serde_json::to_value(PaginationParameter::first(page_size))?;
        let mut req = HttpRequest::graphql(
            ctx.url("")?,
            &Self::list_query(&names, &def, &gql, params),
            variables,
        );

        if let Some(filter) = &params.filter {
            let value = serde_json::from_str(filter).unwrap_or_else(|_| json!(filter));
            req.set_param(&Self::filter_param(&def), value)?;
        }

        let paginator = Self::paginator(&names, &def);
        apply_window_and_cursor(
            &mut req,
            paginator.as_ref(),
            def.incremental.as_ref(),
            params,
            page_size,
        )?;
        Ok(req)
    }

    fn parse_read_response(
        &self,
        ctx: &RequestContext<'_>,
        params: &ReadParams,
        page_size: usize,
        body: &JsonValue,
    ) -> Result<ReadResult> {
        check_errors(body, ErrorKind::BadRequest, 200)?;
        let (names, def, _) = self.object(ctx, &params.object_name);
        let records = extract_records(body, &Self::records_path(&names, &def))?;

        let paginator = Self::paginator(&names, &def);
        let next = advance(
            paginator.as_ref(),
            &Page {
                body,
                records: &records,
                page_size,
                token: params.token(),
            },
        )?;

        let rows = records
            .iter()
            .map(|r| ReadResultRow::from_record(r, &params.fields, def.id_path()))
            .collect();
        Ok(ReadResult::new(rows, next))
    }

    fn build_write_request(
        &self,
        ctx: &RequestContext<'_>,
        params: &WriteParams,
    ) -> Result<HttpRequest> {
        let (names, _, gql) = self.object(ctx, &params.object_name);
        let payload = Self::mutation_payload(&names, &gql);

        let (query, variables) = if params.is_create() {
            let input = gql
                .create_input
                .clone()
                .unwrap_or_else(|| format!("{}CreateInput", names.type_name));
            (
                format!(
                    "mutation Create($input: {input}!) {{ {m}(input: $input) {{ {payload} }} }}",
                    m = Self::create_mutation(&names, &gql),
                ),
                json!({ "input": params.record_data }),
            )
        } else {
            let input = gql
                .update_input
                .clone()
                .unwrap_or_else(|| format!("{}UpdateInput", names.type_name));
            (
                format!(
                    "mutation Update($id: String!, $input: {input}!) {{ {m}(id: $id, input: $input) {{ {payload} }} }}",
                    m = Self::update_mutation(&names, &gql),
                ),
                json!({ "id": params.record_id, "input": params.record_data }),
            )
        };
        Ok(HttpRequest::graphql(ctx.url("")?, &query, variables))
    }

    fn parse_write_response(
        &self,
        ctx: &RequestContext<'_>,
        params: &WriteParams,
        response: &JsonResponse,
    ) -> Result<WriteResult> {
        let body = response.json()?;
        check_errors(body, ErrorKind::BadRequest, response.status)?;

        let (names, _, gql) = self.object(ctx, &params.object_name);
        let mutation = if params.is_create() {
            Self::create_mutation(&names, &gql)
        } else {
            Self::update_mutation(&names, &gql)
        };

        let q = JsonQuery::new(body);
        if let Some(user_errors) = q.array_optional(&format!("data.{mutation}.userErrors"))? {
            if !user_errors.is_empty() {
                return Err(Error::api(
                    ErrorKind::BadRequest,
                    response.status,
                    error_messages(user_errors),
                ));
            }
        }

        let record_path = format!("data.{mutation}.{}", names.record_field);
        let record_id = q
            .id_optional(&format!("{record_path}.id"))
            .or_else(|| (!params.is_create()).then(|| params.record_id.clone()))
            .unwrap_or_default();
        let data = q.object_optional(&record_path)?.cloned();
        Ok(WriteResult::success(record_id, data))
    }

    fn build_delete_request(
        &self,
        ctx: &RequestContext<'_>,
        params: &DeleteParams,
    ) -> Result<HttpRequest> {
        let (names, _, gql) = self.object(ctx, &params.object_name);
        let query = format!(
            "mutation Delete($id: String!) {{ {m}(id: $id) {{ success }} }}",
            m = Self::delete_mutation(&names, &gql),
        );
        Ok(HttpRequest::graphql(
            ctx.url("")?,
            &query,
            json!({ "id": params.record_id }),
        ))
    }

    fn parse_delete_response(
        &self,
        _ctx: &RequestContext<'_>,
        _params: &DeleteParams,
        response: &JsonResponse,
    ) -> Result<DeleteResult> {
        // Errors on a delete mean the target is gone
        check_errors(&response.json_or_null(), ErrorKind::NotFound, response.status)?;
        Ok(DeleteResult { success: true })
    }

    fn build_metadata_request(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
    ) -> Result<HttpRequest> {
        let (names, def, gql) = self.object(ctx, object);
        match self.module.metadata.source {
            MetadataSource::Sample => {
                let params = ReadParams::new(object, Fields::All);
                Ok(HttpRequest::graphql(
                    ctx.url("")?,
                    &Self::list_query(&names, &def, &gql, &params),
                    serde_json::to_value(PaginationParameter::first(1))?,
                ))
            }
            _ => Ok(HttpRequest::graphql(
                ctx.url("")?,
                TYPE_INTROSPECTION_QUERY,
                type_query_variables(&names.type_name),
            )),
        }
    }

    fn parse_metadata_response(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        body: &JsonValue,
    ) -> Result<ObjectMetadata> {
        check_errors(body, ErrorKind::BadRequest, 200)?;
        let (names, def, _) = self.object(ctx, object);
        match self.module.metadata.source {
            MetadataSource::Sample => {
                let inferrer = SampleInferrer::new()
                    .with_datetime_detection(self.module.metadata.detect_datetime);
                parse_sample_response(
                    &names.object,
                    body,
                    &Self::records_path(&names, &def),
                    &inferrer,
                )
            }
            _ => parse_type_introspection(&names.object, body),
        }
    }

    fn build_record_request(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        id: &str,
        fields: &Fields,
    ) -> Result<HttpRequest> {
        let (names, _, gql) = self.object(ctx, object);
        let query = format!(
            "query Record($id: String!) {{ {field}(id: $id) {{ {selection} }} }}",
            field = names.record_field,
            selection = selection(fields, &gql),
        );
        Ok(HttpRequest::graphql(ctx.url("")?, &query, json!({ "id": id })))
    }

    fn parse_record_response(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        fields: &Fields,
        body: &JsonValue,
    ) -> Result<ReadResultRow> {
        check_errors(body, ErrorKind::NotFound, 200)?;
        let (names, def, _) = self.object(ctx, object);
        let path = format!("data.{}", names.record_field);
        match JsonQuery::new(body).value_optional(&path) {
            Some(record) => Ok(ReadResultRow::from_record(record, fields, def.id_path())),
            None => Err(Error::from_status(404).with_details([format!("{object} record not found")])),
        }
    }
}

/// Fail when a reply carries a non-empty top-level `errors` array
fn check_errors(body: &JsonValue, kind: ErrorKind, status: u16) -> Result<()> {
    match JsonQuery::new(body).array_optional("errors") {
        Ok(Some(errors)) if !errors.is_empty() => {
            Err(Error::api(kind, status, error_messages(errors)))
        }
        _ => Ok(()),
    }
}

/// Selection set for the requested fields; dotted names become nested sets
fn selection(fields: &Fields, gql: &GraphqlObjectDefinition) -> String {
    #[derive(Default)]
    struct Node(BTreeMap<String, Node>);

    fn render(node: &Node) -> String {
        node.0
            .iter()
            .map(|(name, child)| {
                if child.0.is_empty() {
                    name.clone()
                } else {
                    format!("{name} {{ {} }}", render(child))
                }
            })
            .collect::<Vec<_>>()
            .join(" ")
    }

    let names: BTreeSet<String> = match fields.names() {
        Some(names) => names.clone(),
        None => gql
            .default_fields
            .clone()
            .unwrap_or_default()
            .into_iter()
            .collect(),
    };

    let mut root = Node::default();
    root.0.insert("id".to_string(), Node::default());
    for name in &names {
        let mut node = &mut root;
        for part in name.split('.') {
            node = node.0.entry(part.to_string()).or_default();
        }
    }
    render(&root)
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod selection_tests {
    use super::*;

    #[test]
    fn test_selection_nests_dotted_fields() {
        let fields = Fields::of(["title", "team.name", "team.key"]);
        assert_eq!(
            selection(&fields, &GraphqlObjectDefinition::default()),
            "id team { key name } title"
        );
    }

    #[test]
    fn test_selection_defaults_for_all() {
        let gql = GraphqlObjectDefinition {
            default_fields: Some(vec!["title".into()]),
            ..Default::default()
        };
        assert_eq!(selection(&Fields::All, &gql), "id title");
        assert_eq!(upper_first("issue"), "Issue");
        assert_eq!(lower_first("Issue"), "issue");
    }
}
