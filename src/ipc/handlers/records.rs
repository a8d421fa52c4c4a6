use crate::cascade::{CascadeDeleter, DeleteError, DeleteRequest};
use crate::entities::{Column, ColumnKind, Entity};
use crate::ipc::error::{err, ok};
use crate::ipc::handlers::setup;
use crate::ipc::types::{AppState, Request};
use rusqlite::types::{Value as SqlValue, ValueRef};
use rusqlite::OptionalExtension;
use serde_json::{json, Value};

fn parse_entity(req: &Request) -> Result<Entity, Value> {
    let Some(tag) = req.params.get("entity").and_then(|v| v.as_str()) else {
        return Err(err(&req.id, "bad_params", "missing entity", None));
    };
    Entity::parse(tag).ok_or_else(|| {
        err(
            &req.id,
            "bad_params",
            format!("unknown entity: {}", tag),
            None,
        )
    })
}

fn parse_id(req: &Request) -> Result<i64, Value> {
    req.params
        .get("id")
        .and_then(|v| v.as_i64())
        .ok_or_else(|| err(&req.id, "bad_params", "missing id", None))
}

fn to_sql_value(col: &Column, v: &Value) -> Result<SqlValue, String> {
    match col.kind {
        ColumnKind::Text => {
            let Some(s) = v.as_str() else {
                return Err(format!("{} must be a string", col.name));
            };
            let s = s.trim();
            if col.required && s.is_empty() {
                return Err(format!("{} must not be empty", col.name));
            }
            Ok(SqlValue::Text(s.to_string()))
        }
        ColumnKind::Integer => v
            .as_i64()
            .map(SqlValue::Integer)
            .ok_or_else(|| format!("{} must be an integer", col.name)),
        ColumnKind::Real => v
            .as_f64()
            .map(SqlValue::Real)
            .ok_or_else(|| format!("{} must be a number", col.name)),
        ColumnKind::Flag => v
            .as_bool()
            .map(|b| SqlValue::Integer(b as i64))
            .ok_or_else(|| format!("{} must be a boolean", col.name)),
    }
}

fn select_list(entity: Entity) -> String {
    let mut names = vec!["id".to_string()];
    names.extend(entity.columns().iter().map(|c| format!("\"{}\"", c.name)));
    names.push("created_at".to_string());
    names.join(", ")
}

fn row_to_json(entity: Entity, row: &rusqlite::Row<'_>) -> rusqlite::Result<Value> {
    let mut obj = serde_json::Map::new();
    obj.insert("id".to_string(), json!(row.get::<_, i64>(0)?));
    for (i, col) in entity.columns().iter().enumerate() {
        let v = match row.get_ref(i + 1)? {
            ValueRef::Null => Value::Null,
            ValueRef::Integer(n) if col.kind == ColumnKind::Flag => Value::Bool(n != 0),
            ValueRef::Integer(n) => json!(n),
            ValueRef::Real(f) => json!(f),
            ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).to_string()),
            ValueRef::Blob(_) => Value::Null,
        };
        obj.insert(col.name.to_string(), v);
    }
    let created_at: String = row.get(entity.columns().len() + 1)?;
    obj.insert("createdAt".to_string(), Value::String(created_at));
    Ok(Value::Object(obj))
}

fn handle_records_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let entity = match parse_entity(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let Some(values) = req.params.get("values").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "values must be an object", None);
    };
    if let Some(unknown) = values.keys().find(|k| entity.column(k).is_none()) {
        return err(
            &req.id,
            "bad_params",
            format!("unknown column: {}", unknown),
            Some(json!({ "entity": entity })),
        );
    }

    let mut names: Vec<String> = Vec::new();
    let mut params: Vec<SqlValue> = Vec::new();
    for col in entity.columns() {
        match values.get(col.name) {
            None | Some(Value::Null) => {
                if col.required {
                    return err(
                        &req.id,
                        "bad_params",
                        format!("missing {}", col.name),
                        Some(json!({ "entity": entity })),
                    );
                }
            }
            Some(v) => match to_sql_value(col, v) {
                Ok(sv) => {
                    names.push(format!("\"{}\"", col.name));
                    params.push(sv);
                }
                Err(msg) => return err(&req.id, "bad_params", msg, None),
            },
        }
    }
    names.push("created_at".to_string());
    params.push(SqlValue::Text(chrono::Utc::now().to_rfc3339()));

    let placeholders = vec!["?"; params.len()].join(", ");
    let sql = format!(
        "INSERT INTO \"{}\"({}) VALUES({})",
        entity.table(),
        names.join(", "),
        placeholders
    );
    if let Err(e) = conn.execute(&sql, rusqlite::params_from_iter(params.iter())) {
        return err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": entity.table() })),
        );
    }

    let id = conn.last_insert_rowid();
    tracing::debug!(entity = %entity, id, "record created");
    ok(&req.id, json!({ "id": id }))
}

fn handle_records_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let entity = match parse_entity(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let id = match parse_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let sql = format!(
        "SELECT {} FROM \"{}\" WHERE id = ?",
        select_list(entity),
        entity.table()
    );
    match conn
        .query_row(&sql, [id], |row| row_to_json(entity, row))
        .optional()
    {
        Ok(Some(record)) => ok(&req.id, json!({ "record": record })),
        Ok(None) => err(
            &req.id,
            "not_found",
            format!("{} non trouvé", entity),
            None,
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_records_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "records": [] }));
    };
    let entity = match parse_entity(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };

    // Equality filters on id or integer columns only, e.g. { "gradeId": 5 }.
    let mut clauses: Vec<String> = Vec::new();
    let mut params: Vec<i64> = Vec::new();
    if let Some(filter) = req.params.get("filter") {
        let Some(filter) = filter.as_object() else {
            return err(&req.id, "bad_params", "filter must be an object", None);
        };
        for (k, v) in filter {
            let is_int_column = k == "id"
                || entity
                    .column(k)
                    .map(|c| c.kind == ColumnKind::Integer)
                    .unwrap_or(false);
            if !is_int_column {
                return err(
                    &req.id,
                    "bad_params",
                    format!("cannot filter on: {}", k),
                    None,
                );
            }
            let Some(n) = v.as_i64() else {
                return err(
                    &req.id,
                    "bad_params",
                    format!("{} filter must be an integer", k),
                    None,
                );
            };
            clauses.push(format!("\"{}\" = ?", k));
            params.push(n);
        }
    }

    let where_sql = if clauses.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", clauses.join(" AND "))
    };
    let sql = format!(
        "SELECT {} FROM \"{}\"{} ORDER BY id",
        select_list(entity),
        entity.table(),
        where_sql
    );
    let mut stmt = match conn.prepare(&sql) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = stmt
        .query_map(rusqlite::params_from_iter(params.iter()), |row| {
            row_to_json(entity, row)
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>());

    match rows {
        Ok(records) => ok(&req.id, json!({ "records": records })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_records_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let entity = match parse_entity(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let id = match parse_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let strategy = match setup::delete_strategy(conn) {
        Ok(s) => s,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };

    // Not-found, blocked and storage failures are all outcomes, not IPC errors.
    let outcome = CascadeDeleter::new(conn, &state.registry)
        .with_strategy(strategy)
        .delete(DeleteRequest { entity, id });
    match serde_json::to_value(&outcome) {
        Ok(v) => ok(&req.id, v),
        Err(e) => err(&req.id, "internal", e.to_string(), None),
    }
}

fn handle_records_delete_preview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let entity = match parse_entity(req) {
        Ok(e) => e,
        Err(resp) => return resp,
    };
    let id = match parse_id(req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    match CascadeDeleter::new(conn, &state.registry).preview(DeleteRequest { entity, id }) {
        Ok(plan) => match serde_json::to_value(&plan) {
            Ok(v) => ok(&req.id, v),
            Err(e) => err(&req.id, "internal", e.to_string(), None),
        },
        Err(e @ DeleteError::NotFound { .. }) => err(&req.id, "not_found", e.to_string(), None),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "records.create" => Some(handle_records_create(state, req)),
        "records.get" => Some(handle_records_get(state, req)),
        "records.list" => Some(handle_records_list(state, req)),
        "records.delete" => Some(handle_records_delete(state, req)),
        "records.deletePreview" => Some(handle_records_delete_preview(state, req)),
        _ => None,
    }
}
