//! Small builders for the OpenAPI fragments each module contributes.

use serde_json::{json, Value};

pub fn schema_ref(name: &str) -> Value {
    json!({ "$ref": format!("#/components/schemas/{name}") })
}

pub fn array_of(name: &str) -> Value {
    json!({ "type": "array", "items": schema_ref(name) })
}

pub fn path_param(name: &str) -> Value {
    json!({
        "name": name,
        "in": "path",
        "required": true,
        "schema": { "type": "string" }
    })
}

pub fn query_param(name: &str, description: &str) -> Value {
    json!({
        "name": name,
        "in": "query",
        "required": false,
        "description": description,
        "schema": { "type": "string" }
    })
}

fn error_response(description: &str) -> Value {
    json!({
        "description": description,
        "content": { "application/json": { "schema": schema_ref("ErrorResponse") } }
    })
}

/// One operation. `ok` is `(status, schema)`; `None` schema means no body.
pub fn operation(
    summary: &str,
    tag: &str,
    parameters: Vec<Value>,
    body: Option<&str>,
    ok: (&str, Option<Value>),
    errors: &[(&str, &str)],
) -> Value {
    let (status, schema) = ok;
    let mut responses = serde_json::Map::new();
    responses.insert(
        status.to_string(),
        match schema {
            Some(schema) => json!({
                "description": "OK",
                "content": { "application/json": { "schema": schema } }
            }),
            None => json!({ "description": "OK" }),
        },
    );
    for (code, description) in errors {
        responses.insert(code.to_string(), error_response(description));
    }

    let mut op = json!({
        "summary": summary,
        "tags": [tag],
        "responses": responses,
    });
    if !parameters.is_empty() {
        op["parameters"] = Value::Array(parameters);
    }
    if let Some(name) = body {
        op["requestBody"] = json!({
            "required": true,
            "content": { "application/json": { "schema": schema_ref(name) } }
        });
    }
    op
}

pub fn string_props(names: &[&str]) -> Value {
    let props: serde_json::Map<String, Value> = names
        .iter()
        .map(|name| (name.to_string(), json!({ "type": "string" })))
        .collect();
    Value::Object(props)
}
