//! REST handlers driven by a module definition

use super::handlers::{apply_window_and_cursor, extract_records, ProviderHandlers, RequestContext};
use super::types::{ModuleDefinition, ObjectDefinition};
use crate::connector::{
    DeleteParams, DeleteResult, Fields, ReadParams, ReadResult, ReadResultRow, WriteParams,
    WriteRecord, WriteResult,
};
use crate::error::{Error, ErrorKind, Result};
use crate::http::{FormatSwitch, HttpRequest, JsonResponse, ParamLocation};
use crate::jsonquery::JsonQuery;
use crate::pagination::{advance, Page};
use crate::schema::{parse_sample_response, ObjectMetadata, SampleInferrer};
use crate::types::{normalize_object_name, Capability, JsonObject, JsonValue, Method};
use crate::url_builder::UrlBuilder;

/// Handlers for a REST module
#[derive(Debug, Clone)]
pub struct DeclarativeHandlers {
    module: ModuleDefinition,
    errors: FormatSwitch,
}

impl DeclarativeHandlers {
    /// Handlers for a module, with the provider's error format
    pub fn new(module: ModuleDefinition, errors: FormatSwitch) -> Self {
        Self { module, errors }
    }

    fn object(&self, name: &str) -> (String, ObjectDefinition) {
        let name = normalize_object_name(name);
        let def = self.module.object(&name);
        (name, def)
    }

    fn collection_path(ctx: &RequestContext<'_>, name: &str, def: &ObjectDefinition) -> String {
        def.path
            .clone()
            .unwrap_or_else(|| ctx.resolve_endpoint(name))
    }

    fn record_url(
        &self,
        ctx: &RequestContext<'_>,
        name: &str,
        def: &ObjectDefinition,
        id: &str,
    ) -> Result<UrlBuilder> {
        match &def.record_path {
            Some(template) => {
                let id = UrlBuilder::encode_segment(id)?;
                ctx.url_with(template, &[("id", &id)])
            }
            None => {
                let mut url = ctx.url(&Self::collection_path(ctx, name, def))?;
                url.push_segment(id)?;
                Ok(url)
            }
        }
    }

    fn records_path(ctx: &RequestContext<'_>, name: &str, def: &ObjectDefinition) -> String {
        def.records_path
            .clone()
            .unwrap_or_else(|| ctx.array_field_name(name))
    }

    fn single_record<'a>(def: &ObjectDefinition, body: &'a JsonValue) -> Result<&'a JsonValue> {
        match &def.record_key {
            Some(key) => JsonQuery::new(body)
                .value_optional(key)
                .ok_or_else(|| Error::KeyNotFound { key: key.clone() }),
            None => Ok(body),
        }
    }
}

impl ProviderHandlers for DeclarativeHandlers {
    fn error_format(&self) -> FormatSwitch {
        self.errors.clone()
    }

    fn build_read_request(
        &self,
        ctx: &RequestContext<'_>,
        params: &ReadParams,
        page_size: usize,
    ) -> Result<HttpRequest> {
        let (name, def) = self.object(&params.object_name);
        let mut req = HttpRequest::get(ctx.url(&Self::collection_path(ctx, &name, &def))?);

        for (key, value) in def.query.iter().flatten() {
            req.url.with_query_param(key.clone(), ctx.render(value)?);
        }
        if let (Some(location), Some(filter)) = (&def.filter_param, &params.filter) {
            req.set_param(location, JsonValue::String(filter.clone()))?;
        }
        if let Some(location) = &def.associations_param {
            if !params.associated_objects.is_empty() {
                let joined = params.associated_objects.join(",");
                req.set_param(location, JsonValue::String(joined))?;
            }
        }

        let paginator = def.pagination().build();
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
        let (name, def) = self.object(&params.object_name);
        let records = extract_records(body, &Self::records_path(ctx, &name, &def))?;

        let paginator = def.pagination().build();
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
        let (name, def) = self.object(&params.object_name);
        let body = match &def.record_key {
            Some(key) => wrap(key, params.record_data.clone()),
            None => params.record_data.clone(),
        };

        let req = if params.is_create() {
            HttpRequest::new(Method::POST, ctx.url(&Self::collection_path(ctx, &name, &def))?)
        } else {
            HttpRequest::new(
                def.update_method(),
                self.record_url(ctx, &name, &def, &params.record_id)?,
            )
        };
        Ok(req.with_body(body))
    }

    fn parse_write_response(
        &self,
        _ctx: &RequestContext<'_>,
        params: &WriteParams,
        response: &JsonResponse,
    ) -> Result<WriteResult> {
        let (_, def) = self.object(&params.object_name);
        let body = response.json_or_null();

        let id_path = def.write_id_path.as_deref().unwrap_or(def.id_path());
        let record = Self::single_record(&def, &body).ok();
        let record_id = JsonQuery::new(&body)
            .id_optional(id_path)
            .or_else(|| record.and_then(|r| JsonQuery::new(r).id_optional(def.id_path())))
            .or_else(|| (!params.is_create()).then(|| params.record_id.clone()))
            .unwrap_or_default();

        let data = record.and_then(JsonValue::as_object).cloned();
        Ok(WriteResult::success(record_id, data))
    }

    fn build_delete_request(
        &self,
        ctx: &RequestContext<'_>,
        params: &DeleteParams,
    ) -> Result<HttpRequest> {
        let (name, def) = self.object(&params.object_name);
        Ok(HttpRequest::new(
            Method::DELETE,
            self.record_url(ctx, &name, &def, &params.record_id)?,
        ))
    }

    fn parse_delete_response(
        &self,
        _ctx: &RequestContext<'_>,
        _params: &DeleteParams,
        _response: &JsonResponse,
    ) -> Result<DeleteResult> {
        // Non-2xx never reaches the parser
        Ok(DeleteResult { success: true })
    }

    fn build_metadata_request(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
    ) -> Result<HttpRequest> {
        let params = ReadParams::new(object, Fields::All).page_size(1);
        self.build_read_request(ctx, &params, 1)
    }

    fn parse_metadata_response(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        body: &JsonValue,
    ) -> Result<ObjectMetadata> {
        let (name, def) = self.object(object);
        let inferrer =
            SampleInferrer::new().with_datetime_detection(self.module.metadata.detect_datetime);
        let path = Self::records_path(ctx, &name, &def);
        if path.starts_with('$') {
            let records = extract_records(body, &path)?;
            return Ok(match records.first() {
                Some(first) => inferrer.infer(&name, first),
                None => ObjectMetadata::new(&name),
            });
        }
        parse_sample_response(&name, body, &path, &inferrer)
    }

    fn build_record_request(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        id: &str,
        _fields: &Fields,
    ) -> Result<HttpRequest> {
        let (name, def) = self.object(object);
        Ok(HttpRequest::get(self.record_url(ctx, &name, &def, id)?))
    }

    fn parse_record_response(
        &self,
        _ctx: &RequestContext<'_>,
        object: &str,
        fields: &Fields,
        body: &JsonValue,
    ) -> Result<ReadResultRow> {
        let (_, def) = self.object(object);
        let record = Self::single_record(&def, body)?;
        Ok(ReadResultRow::from_record(record, fields, def.id_path()))
    }

    fn batch_limit(&self, _ctx: &RequestContext<'_>, object: &str) -> Option<usize> {
        let (_, def) = self.object(object);
        def.batch.map(|b| b.max_size.max(1))
    }

    fn build_batch_write_request(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        records: &[WriteRecord],
    ) -> Result<HttpRequest> {
        let (_, def) = self.object(object);
        let batch = def
            .batch
            .ok_or_else(|| Error::not_supported(object, Capability::Write))?;

        let items: Vec<JsonValue> = records
            .iter()
            .map(|r| {
                let mut item = r.record_data.clone();
                if !r.record_id.is_empty() {
                    if let JsonValue::Object(map) = &mut item {
                        map.insert(batch.id_field.clone(), JsonValue::String(r.record_id.clone()));
                    }
                }
                item
            })
            .collect();
        let body = match &batch.records_key {
            Some(key) => wrap(key, JsonValue::Array(items)),
            None => JsonValue::Array(items),
        };
        Ok(HttpRequest::post(ctx.url(&batch.path)?, body))
    }

    fn parse_batch_write_response(
        &self,
        _ctx: &RequestContext<'_>,
        object: &str,
        records: &[WriteRecord],
        response: &JsonResponse,
    ) -> Result<Vec<Result<WriteResult>>> {
        let (_, def) = self.object(object);
        let batch = def
            .batch
            .as_ref()
            .ok_or_else(|| Error::not_supported(object, Capability::Write))?;
        let body = response.json()?;
        let results = JsonQuery::new(body).array_required(&batch.results_path)?;

        let outcomes = records
            .iter()
            .enumerate()
            .map(|(i, record)| {
                let Some(result) = results.get(i) else {
                    return Err(Error::missing_values(format!(
                        "no result for record {i} of the batch"
                    )));
                };
                let q = JsonQuery::new(result);
                if let Some(message) = q.value_optional(&batch.error_path) {
                    let message = match message {
                        JsonValue::String(s) => s.clone(),
                        other => other.to_string(),
                    };
                    return Err(Error::api(ErrorKind::BadRequest, response.status, vec![message]));
                }
                let id = q
                    .id_optional(def.id_path())
                    .unwrap_or_else(|| record.record_id.clone());
                Ok(WriteResult::success(id, result.as_object().cloned()))
            })
            .collect();
        Ok(outcomes)
    }

    fn supports_records_by_ids(&self, _ctx: &RequestContext<'_>, object: &str) -> bool {
        self.object(object).1.by_ids.is_some()
    }

    fn build_records_by_ids_request(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        ids: &[String],
        _fields: &Fields,
    ) -> Result<HttpRequest> {
        let (_, def) = self.object(object);
        let by_ids = def
            .by_ids
            .ok_or_else(|| Error::not_supported(object, Capability::Read))?;

        let value = match &by_ids.ids_param {
            ParamLocation::Query(_) => JsonValue::String(ids.join(",")),
            _ => JsonValue::from(ids.to_vec()),
        };
        let mut req = HttpRequest::new(by_ids.method, ctx.url(&by_ids.path)?);
        req.set_param(&by_ids.ids_param, value)?;
        Ok(req)
    }

    fn parse_records_by_ids_response(
        &self,
        ctx: &RequestContext<'_>,
        object: &str,
        fields: &Fields,
        body: &JsonValue,
    ) -> Result<Vec<ReadResultRow>> {
        let (name, def) = self.object(object);
        let path = def
            .by_ids
            .as_ref()
            .and_then(|b| b.records_path.clone())
            .unwrap_or_else(|| Self::records_path(ctx, &name, &def));
        let records = extract_records(body, &path)?;
        Ok(records
            .iter()
            .map(|r| ReadResultRow::from_record(r, fields, def.id_path()))
            .collect())
    }
}

fn wrap(key: &str, value: JsonValue) -> JsonValue {
    let mut map = JsonObject::new();
    map.insert(key.to_string(), value);
    JsonValue::Object(map)
}
