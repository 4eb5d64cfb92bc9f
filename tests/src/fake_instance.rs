use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Map, Value};
use snc_core::{
    async_trait,
    transport::{Method, Request, Response},
    Result, Transport,
};
use std::{
    collections::{HashMap, HashSet, VecDeque},
    sync::{Arc, Mutex},
};

pub const INSTANCE: &str = "https://test.service-now.com";

const CANCELLED: &str = "Transaction cancelled: maximum execution time exceeded";

/// An in-memory ServiceNow instance.
///
/// Serves the table, attachment and batch APIs well enough for the client:
/// encoded queries (`=`, `!=`, `LIKE`, `STARTSWITH`, `IN`, comparisons,
/// `ISEMPTY`, `^OR`, `ORDERBY`), paging with `X-Total-Count`, display value
/// modes and field lists.
#[derive(Debug, Clone, Default)]
pub struct FakeInstance {
    state: Arc<Mutex<State>>,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Vec<Map<String, Value>>>,
    attachments: Vec<StoredAttachment>,
    next_id: u64,

    /// Ids to leave unserviced, one entry per batch call.
    unserviced: VecDeque<Vec<String>>,
    reject_writes: HashSet<String>,
    cancel_queries: bool,
    unauthenticated: bool,
}

#[derive(Debug, Clone)]
struct StoredAttachment {
    meta: Map<String, Value>,
    content: Vec<u8>,
}

impl State {
    fn new_sys_id(&mut self) -> String {
        self.next_id += 1;
        format!("{:032x}", self.next_id)
    }
}

impl FakeInstance {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store rows in `table`, assigning a `sys_id` where missing. Values may
    /// be plain or `{value, display_value}` objects. Returns the ids.
    pub fn insert_rows(&self, table: &str, rows: impl IntoIterator<Item = Value>) -> Vec<String> {
        let mut state = self.state.lock().unwrap();
        let mut ids = vec![];
        for row in rows {
            let Value::Object(mut row) = row else {
                panic!("rows must be JSON objects");
            };
            if !row.contains_key("sys_id") {
                let sys_id = state.new_sys_id();
                row.insert("sys_id".into(), Value::String(sys_id));
            }
            ids.push(raw(&row, "sys_id"));
            state.tables.entry(table.to_string()).or_default().push(row);
        }
        ids
    }

    /// `count` incident rows numbered `INC0000000`.. with alternating
    /// priorities 1 and 2.
    pub fn seed_incidents(&self, count: usize) -> Vec<String> {
        self.insert_rows(
            "incident",
            (0..count).map(|i| {
                json!({
                    "number": format!("INC{i:07}"),
                    "short_description": format!("incident {i}"),
                    "priority": if i % 2 == 0 { "1" } else { "2" },
                    "active": "true",
                })
            }),
        )
    }

    pub fn rows(&self, table: &str) -> Vec<Map<String, Value>> {
        let state = self.state.lock().unwrap();
        state.tables.get(table).cloned().unwrap_or_default()
    }

    pub fn row(&self, table: &str, sys_id: &str) -> Option<Map<String, Value>> {
        self.rows(table)
            .into_iter()
            .find(|row| raw(row, "sys_id") == sys_id)
    }

    pub fn store_attachment(
        &self,
        table: &str,
        table_sys_id: &str,
        file_name: &str,
        content: &[u8],
    ) -> String {
        let mut state = self.state.lock().unwrap();
        let sys_id = state.new_sys_id();
        state.attachments.push(StoredAttachment {
            meta: attachment_meta(&sys_id, table, table_sys_id, file_name, "text/plain", content.len()),
            content: content.to_vec(),
        });
        sys_id
    }

    pub fn attachment_count(&self) -> usize {
        self.state.lock().unwrap().attachments.len()
    }

    /// Leave `ids` unserviced in the next batch call.
    pub fn unservice(&self, ids: &[&str]) {
        self.state
            .lock()
            .unwrap()
            .unserviced
            .push_back(ids.iter().map(|id| id.to_string()).collect());
    }

    /// Writes to `table` fail as if a business rule aborted them.
    pub fn reject_writes(&self, table: &str) {
        self.state
            .lock()
            .unwrap()
            .reject_writes
            .insert(table.to_string());
    }

    /// List queries fail with a cancelled transaction.
    pub fn cancel_queries(&self) {
        self.state.lock().unwrap().cancel_queries = true;
    }

    /// Every request is rejected with 401.
    pub fn deny_all(&self) {
        self.state.lock().unwrap().unauthenticated = true;
    }

    pub fn handle(&self, request: &Request) -> Response {
        if self.state.lock().unwrap().unauthenticated {
            return error(401, "User Not Authenticated", "Required to provide Auth information");
        }

        let path = request.url.path().to_string();
        let segments: Vec<&str> = path.trim_start_matches('/').split('/').collect();

        match segments.as_slice() {
            ["api", "now", "v1", "batch"] => self.batch(request),
            ["api", "now", "table", table] => match request.method {
                Method::Get => self.list(table, request),
                Method::Post => self.create(table, request),
                _ => error(405, "Method not Supported", ""),
            },
            ["api", "now", "table", table, sys_id] => match request.method {
                Method::Get => self.get(table, sys_id, request),
                Method::Put | Method::Patch => self.modify(table, sys_id, request),
                Method::Delete => self.remove(table, sys_id),
                Method::Post => error(405, "Method not Supported", ""),
            },
            ["api", "now", "v1", "attachment"] => self.list_attachments(request),
            ["api", "now", "v1", "attachment", "file"] => self.upload(request),
            ["api", "now", "v1", "attachment", sys_id] => match request.method {
                Method::Get => self.attachment_meta(sys_id),
                Method::Delete => self.delete_attachment(sys_id),
                _ => error(405, "Method not Supported", ""),
            },
            ["api", "now", "v1", "attachment", sys_id, "file"] => self.attachment_file(sys_id),
            _ => error(400, "Invalid URL", &path),
        }
    }

    fn list(&self, table: &str, request: &Request) -> Response {
        let state = self.state.lock().unwrap();
        if state.cancel_queries {
            return error(500, CANCELLED, "");
        }

        let rows = state.tables.get(table).cloned().unwrap_or_default();
        let mode = request
            .query_param("sysparm_display_value")
            .unwrap_or_else(|| "false".into());
        let fields = request.query_param("sysparm_fields");
        let links = wants_links(request);

        let (page, total) = select(rows, request);
        let result: Vec<Value> = page
            .iter()
            .map(|row| render(row, &mode, fields.as_deref(), links))
            .collect();

        Response::json(200, &json!({ "result": result }))
            .with_header("X-Total-Count", total.to_string())
    }

    fn get(&self, table: &str, sys_id: &str, request: &Request) -> Response {
        let Some(row) = self.row(table, sys_id) else {
            return error(404, "No Record found", "Record doesn't exist or ACL restricts the record retrieval");
        };
        let mode = request
            .query_param("sysparm_display_value")
            .unwrap_or_else(|| "false".into());
        let fields = request.query_param("sysparm_fields");
        let links = wants_links(request);
        Response::json(200, &json!({ "result": render(&row, &mode, fields.as_deref(), links) }))
    }

    fn create(&self, table: &str, request: &Request) -> Response {
        let mut state = self.state.lock().unwrap();
        if state.reject_writes.contains(table) {
            return aborted(table);
        }

        let mut row = match body_object(request) {
            Ok(row) => row,
            Err(response) => return response,
        };
        if raw(&row, "sys_id").is_empty() {
            let sys_id = state.new_sys_id();
            row.insert("sys_id".into(), Value::String(sys_id));
        }
        state
            .tables
            .entry(table.to_string())
            .or_default()
            .push(row.clone());

        Response::json(201, &json!({ "result": render(&row, "all", None, false) }))
    }

    fn modify(&self, table: &str, sys_id: &str, request: &Request) -> Response {
        let mut state = self.state.lock().unwrap();
        if state.reject_writes.contains(table) {
            return aborted(table);
        }

        let changes = match body_object(request) {
            Ok(changes) => changes,
            Err(response) => return response,
        };
        let Some(row) = state
            .tables
            .get_mut(table)
            .and_then(|rows| rows.iter_mut().find(|row| raw(row, "sys_id") == sys_id))
        else {
            return error(404, "No Record found", "");
        };

        row.extend(changes);
        row.insert("sys_updated_by".into(), Value::String("admin".into()));
        Response::json(200, &json!({ "result": render(row, "all", None, false) }))
    }

    fn remove(&self, table: &str, sys_id: &str) -> Response {
        let mut state = self.state.lock().unwrap();
        if state.reject_writes.contains(table) {
            return aborted(table);
        }

        let Some(rows) = state.tables.get_mut(table) else {
            return error(404, "No Record found", "");
        };
        let before = rows.len();
        rows.retain(|row| raw(row, "sys_id") != sys_id);
        if rows.len() == before {
            return error(404, "No Record found", "");
        }
        Response::new(204, vec![], vec![])
    }

    fn list_attachments(&self, request: &Request) -> Response {
        let state = self.state.lock().unwrap();
        let rows = state.attachments.iter().map(|a| a.meta.clone()).collect();
        let (page, total) = select(rows, request);
        Response::json(200, &json!({ "result": page }))
            .with_header("X-Total-Count", total.to_string())
    }

    fn find_attachment(&self, sys_id: &str) -> Option<StoredAttachment> {
        let state = self.state.lock().unwrap();
        state
            .attachments
            .iter()
            .find(|a| raw(&a.meta, "sys_id") == sys_id)
            .cloned()
    }

    fn attachment_meta(&self, sys_id: &str) -> Response {
        match self.find_attachment(sys_id) {
            Some(attachment) => Response::json(200, &json!({ "result": attachment.meta })),
            None => error(404, "Record doesn't exist", ""),
        }
    }

    fn attachment_file(&self, sys_id: &str) -> Response {
        match self.find_attachment(sys_id) {
            Some(attachment) => Response::new(
                200,
                vec![("Content-Type".into(), raw(&attachment.meta, "content_type"))],
                attachment.content,
            ),
            None => error(404, "Record doesn't exist", ""),
        }
    }

    fn upload(&self, request: &Request) -> Response {
        let (Some(file_name), Some(table), Some(table_sys_id)) = (
            request.query_param("file_name"),
            request.query_param("table_name"),
            request.query_param("table_sys_id"),
        ) else {
            return error(400, "Missing parameters", "file_name, table_name and table_sys_id are required");
        };
        let content = request.body.clone().unwrap_or_default();
        let content_type = request
            .header_value("Content-Type")
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut state = self.state.lock().unwrap();
        let sys_id = state.new_sys_id();
        let meta = attachment_meta(&sys_id, &table, &table_sys_id, &file_name, &content_type, content.len());
        state.attachments.push(StoredAttachment {
            meta: meta.clone(),
            content,
        });

        Response::json(201, &json!({ "result": meta }))
            .with_header("Location", format!("{INSTANCE}/api/now/v1/attachment/{sys_id}/file"))
    }

    fn delete_attachment(&self, sys_id: &str) -> Response {
        let mut state = self.state.lock().unwrap();
        let before = state.attachments.len();
        state.attachments.retain(|a| raw(&a.meta, "sys_id") != sys_id);
        if state.attachments.len() == before {
            return error(404, "Record doesn't exist", "");
        }
        Response::new(204, vec![], vec![])
    }

    fn batch(&self, request: &Request) -> Response {
        let body: Value = match request.body.as_deref().map(serde_json::from_slice) {
            Some(Ok(body)) => body,
            _ => return error(400, "Invalid batch request", ""),
        };
        let unserviced_ids = self
            .state
            .lock()
            .unwrap()
            .unserviced
            .pop_front()
            .unwrap_or_default();

        let mut serviced = vec![];
        let mut unserviced = vec![];

        for rest in body["rest_requests"].as_array().into_iter().flatten() {
            let id = rest["id"].as_str().unwrap_or_default().to_string();
            if unserviced_ids.contains(&id) {
                unserviced.push(Value::String(id));
                continue;
            }

            let response = match sub_request(&request.url, rest) {
                Some(sub) => self.handle(&sub),
                None => error(400, "Invalid rest request", ""),
            };
            let headers: Vec<Value> = response
                .headers()
                .iter()
                .map(|(name, value)| json!({ "name": name, "value": value }))
                .collect();
            serviced.push(json!({
                "id": id,
                "status_code": response.status(),
                "status_text": "OK",
                "headers": headers,
                "execution_time": 1,
                "body": STANDARD.encode(response.bytes()),
            }));
        }

        Response::json(
            200,
            &json!({
                "batch_request_id": body["batch_request_id"],
                "serviced_requests": serviced,
                "unserviced_requests": unserviced,
            }),
        )
    }
}

#[async_trait]
impl Transport for FakeInstance {
    async fn send(&self, request: Request) -> Result<Response> {
        Ok(self.handle(&request))
    }
}

fn sub_request(base: &url::Url, rest: &Value) -> Option<Request> {
    let method = match rest["method"].as_str()? {
        "GET" => Method::Get,
        "POST" => Method::Post,
        "PUT" => Method::Put,
        "PATCH" => Method::Patch,
        "DELETE" => Method::Delete,
        _ => return None,
    };
    let mut request = Request::new(method, base.join(rest["url"].as_str()?).ok()?);
    for header in rest["headers"].as_array().into_iter().flatten() {
        request = request.header(header["name"].as_str()?, header["value"].as_str()?);
    }
    if let Some(body) = rest["body"].as_str() {
        request.body = Some(STANDARD.decode(body).ok()?);
    }
    Some(request)
}

fn body_object(request: &Request) -> std::result::Result<Map<String, Value>, Response> {
    match request.body.as_deref().map(serde_json::from_slice::<Value>) {
        Some(Ok(Value::Object(fields))) => Ok(fields
            .into_iter()
            .map(|(name, value)| match value {
                Value::Object(mut cell) => (name, cell.remove("value").unwrap_or(Value::Null)),
                value => (name, value),
            })
            .collect()),
        _ => Err(error(400, "Invalid body", "")),
    }
}

fn attachment_meta(
    sys_id: &str,
    table: &str,
    table_sys_id: &str,
    file_name: &str,
    content_type: &str,
    size: usize,
) -> Map<String, Value> {
    let Value::Object(meta) = json!({
        "sys_id": sys_id,
        "file_name": file_name,
        "table_name": table,
        "table_sys_id": table_sys_id,
        "content_type": content_type,
        "size_bytes": size.to_string(),
        "download_link": format!("{INSTANCE}/api/now/attachment/{sys_id}/file"),
    }) else {
        unreachable!()
    };
    meta
}

fn error(status: u16, message: &str, detail: &str) -> Response {
    Response::json(
        status,
        &json!({
            "error": { "message": message, "detail": detail },
            "status": "failure",
        }),
    )
}

fn aborted(table: &str) -> Response {
    error(
        403,
        &format!("Operation against file '{table}' was aborted by Business Rule 'Read only'"),
        "",
    )
}

/// The stored value of a field as a string.
fn raw(row: &Map<String, Value>, field: &str) -> String {
    match row.get(field) {
        Some(Value::Object(cell)) => cell.get("value").map(scalar).unwrap_or_default(),
        Some(value) => scalar(value),
        None => String::new(),
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn display(row: &Map<String, Value>, field: &str) -> Value {
    match row.get(field) {
        Some(Value::Object(cell)) => cell
            .get("display_value")
            .or_else(|| cell.get("value"))
            .cloned()
            .unwrap_or(Value::Null),
        Some(value) => value.clone(),
        None => Value::Null,
    }
}

fn wants_links(request: &Request) -> bool {
    request.query_param("sysparm_exclude_reference_link").as_deref() == Some("false")
}

fn render(row: &Map<String, Value>, mode: &str, fields: Option<&str>, links: bool) -> Value {
    let wanted: Option<Vec<&str>> = fields.map(|fields| fields.split(',').collect());
    let mut out = Map::new();

    for (name, value) in row {
        if wanted.as_ref().is_some_and(|wanted| !wanted.contains(&name.as_str())) {
            continue;
        }
        let value = match mode {
            "true" => display(row, name),
            "all" => match value {
                Value::Object(cell) => {
                    let mut cell = cell.clone();
                    cell.entry("display_value").or_insert_with(|| display(row, name));
                    if !links {
                        cell.remove("link");
                    }
                    Value::Object(cell)
                }
                value => json!({ "value": value, "display_value": value }),
            },
            _ => Value::String(raw(row, name)),
        };
        out.insert(name.clone(), value);
    }
    Value::Object(out)
}

/// Filter, sort and page `rows` by the request's query parameters. Returns
/// the page and the number of matching rows.
fn select(rows: Vec<Map<String, Value>>, request: &Request) -> (Vec<Map<String, Value>>, usize) {
    let query = request.query_param("sysparm_query").unwrap_or_default();
    let filter = Filter::parse(&query);

    let mut matching: Vec<_> = rows.into_iter().filter(|row| filter.matches(row)).collect();
    if let Some((field, descending)) = &filter.order {
        matching.sort_by_key(|row| raw(row, field));
        if *descending {
            matching.reverse();
        }
    }

    let total = matching.len();
    let offset = request
        .query_param("sysparm_offset")
        .and_then(|offset| offset.parse().ok())
        .unwrap_or(0);
    let limit = request
        .query_param("sysparm_limit")
        .and_then(|limit| limit.parse().ok())
        .unwrap_or(usize::MAX);

    let page = matching.into_iter().skip(offset).take(limit).collect();
    (page, total)
}

#[derive(Debug, Default)]
struct Filter {
    /// Conjunction of disjunctions.
    clauses: Vec<Vec<Condition>>,
    order: Option<(String, bool)>,
}

#[derive(Debug)]
struct Condition {
    field: String,
    operator: &'static str,
    value: String,
}

const OPERATORS: &[&str] = &[
    "ISNOTEMPTY", "ISEMPTY", "STARTSWITH", "LIKE", "!=", ">=", "<=", "=", "<", ">", "IN",
];

impl Filter {
    fn parse(query: &str) -> Filter {
        let mut filter = Filter::default();

        for part in query.split('^').filter(|part| !part.is_empty()) {
            if let Some(field) = part.strip_prefix("ORDERBYDESC") {
                filter.order = Some((field.to_string(), true));
            } else if let Some(field) = part.strip_prefix("ORDERBY") {
                filter.order = Some((field.to_string(), false));
            } else if part == "EQ" {
                continue;
            } else if let Some(term) = part.strip_prefix("OR") {
                let condition = Condition::parse(term);
                match filter.clauses.last_mut() {
                    Some(clause) => clause.push(condition),
                    None => filter.clauses.push(vec![condition]),
                }
            } else {
                filter.clauses.push(vec![Condition::parse(part)]);
            }
        }
        filter
    }

    fn matches(&self, row: &Map<String, Value>) -> bool {
        self.clauses
            .iter()
            .all(|clause| clause.iter().any(|condition| condition.matches(row)))
    }
}

impl Condition {
    fn parse(term: &str) -> Condition {
        let found = OPERATORS
            .iter()
            .filter_map(|operator| term.find(operator).map(|at| (at, *operator)))
            .min_by_key(|(at, operator)| (*at, usize::MAX - operator.len()));

        match found {
            Some((at, operator)) => Condition {
                field: term[..at].to_string(),
                operator,
                value: term[at + operator.len()..].to_string(),
            },
            None => Condition {
                field: term.to_string(),
                operator: "ISNOTEMPTY",
                value: String::new(),
            },
        }
    }

    fn matches(&self, row: &Map<String, Value>) -> bool {
        let actual = raw(row, &self.field);
        let numeric = || Some((actual.parse::<f64>().ok()?, self.value.parse::<f64>().ok()?));

        match self.operator {
            "=" => actual == self.value,
            "!=" => actual != self.value,
            "LIKE" => actual.contains(&self.value),
            "STARTSWITH" => actual.starts_with(&self.value),
            "IN" => self.value.split(',').any(|value| value == actual),
            "ISEMPTY" => actual.is_empty(),
            "ISNOTEMPTY" => !actual.is_empty(),
            operator => match numeric() {
                Some((a, b)) => match operator {
                    "<" => a < b,
                    "<=" => a <= b,
                    ">" => a > b,
                    _ => a >= b,
                },
                None => false,
            },
        }
    }
}
