use crate::db::{self, RecordError};
use crate::ids::{self, classes, IdError, IdKind, IdParams, Section};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, params_as, required_str};
use crate::ipc::types::{AppState, Request};
use serde_json::json;

const ISSUED_DEFAULT_LIMIT: i64 = 200;

fn id_error(req: &Request, e: &IdError) -> serde_json::Value {
    let details = match e {
        IdError::SequenceExhausted {
            key,
            sequence,
            width,
        } => Some(json!({ "key": key, "sequence": sequence, "width": width })),
        _ => None,
    };
    err(&req.id, e.code(), e.to_string(), details)
}

fn parse_kind(req: &Request) -> Result<IdKind, serde_json::Value> {
    let raw = required_str(req, "kind")?;
    raw.parse::<IdKind>()
        .map_err(|e| err(&req.id, "bad_params", e.to_string(), None))
}

fn optional_kind(req: &Request) -> Result<Option<IdKind>, serde_json::Value> {
    match optional_str(req, "kind") {
        None => Ok(None),
        Some(raw) => raw
            .parse::<IdKind>()
            .map(Some)
            .map_err(|e| err(&req.id, "bad_params", e.to_string(), None)),
    }
}

/// Writes new identifiers to the workspace registry when one is open.
fn record(
    state: &AppState,
    req: &Request,
    kind: IdKind,
    format: &str,
    identifiers: &[String],
) -> Option<serde_json::Value> {
    let conn = state.db.as_ref()?;
    match db::record_issued(conn, kind.as_str(), format, identifiers) {
        Ok(()) => None,
        Err(RecordError::Duplicate(identifier)) => Some(err(
            &req.id,
            "duplicate_identifier",
            format!("{identifier} was already issued"),
            Some(json!({ "identifier": identifier })),
        )),
        Err(RecordError::Db(e)) => Some(err(
            &req.id,
            "db_insert_failed",
            e.to_string(),
            Some(json!({ "table": "issued_ids" })),
        )),
    }
}

fn handle_generate(state: &mut AppState, req: &Request) -> serde_json::Value {
    let kind = match parse_kind(req) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let format = match required_str(req, "format") {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let params: IdParams = match params_as(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let identifier = match ids::generate(state.allocator.as_ref(), kind, format, &params) {
        Ok(id) => id,
        Err(e) => return id_error(req, &e),
    };
    if let Some(resp) = record(state, req, kind, format, std::slice::from_ref(&identifier)) {
        return resp;
    }

    ok(
        &req.id,
        json!({
            "identifier": identifier,
            "parsed": ids::parse_as(kind, &identifier),
        }),
    )
}

fn handle_generate_batch(state: &mut AppState, req: &Request) -> serde_json::Value {
    let kind = match parse_kind(req) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let format = match required_str(req, "format") {
        Ok(f) => f,
        Err(resp) => return resp,
    };
    let limit = state.config.batch_limit;
    let count = match req.params.get("count").and_then(|v| v.as_i64()) {
        Some(n) if n >= 1 && n <= i64::from(limit) => n as u32,
        Some(n) => {
            return err(
                &req.id,
                "invalid_batch_count",
                format!("count must be between 1 and {limit}, got {n}"),
                Some(json!({ "min": 1, "max": limit })),
            )
        }
        None => return err(&req.id, "bad_params", "missing integer count", None),
    };
    let params: IdParams = match params_as(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    let identifiers =
        match ids::generate_batch(state.allocator.as_ref(), kind, format, &params, count) {
            Ok(v) => v,
            Err(e) => return id_error(req, &e),
        };
    if let Some(resp) = record(state, req, kind, format, &identifiers) {
        return resp;
    }

    ok(
        &req.id,
        json!({
            "identifiers": identifiers,
            "count": identifiers.len(),
        }),
    )
}

fn handle_parse(req: &Request) -> serde_json::Value {
    let identifier = match required_str(req, "identifier") {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let parsed = match optional_kind(req) {
        Ok(Some(kind)) => ids::parse_as(kind, identifier),
        Ok(None) => ids::parse(identifier),
        Err(resp) => return resp,
    };
    ok(&req.id, json!(parsed))
}

fn handle_validate(req: &Request) -> serde_json::Value {
    let identifier = match required_str(req, "identifier") {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    let valid = match optional_kind(req) {
        Ok(Some(kind)) => ids::validate_as(kind, identifier),
        Ok(None) => ids::validate(identifier),
        Err(resp) => return resp,
    };
    ok(&req.id, json!({ "valid": valid }))
}

fn handle_badge(req: &Request) -> serde_json::Value {
    let identifier = match required_str(req, "identifier") {
        Ok(s) => s,
        Err(resp) => return resp,
    };
    ok(
        &req.id,
        json!({ "badgeNumber": ids::badge_number(identifier) }),
    )
}

fn handle_username(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut fields = Vec::with_capacity(3);
    for key in ["firstName", "lastName", "identifier"] {
        match required_str(req, key) {
            Ok(s) => fields.push(s),
            Err(resp) => return resp,
        }
    }
    let domain = optional_str(req, "domain").unwrap_or(state.config.email_domain.as_str());
    ok(
        &req.id,
        json!({ "username": ids::username(fields[0], fields[1], fields[2], domain) }),
    )
}

fn handle_issued(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return ok(&req.id, json!({ "issued": [] }));
    };
    let kind = match optional_kind(req) {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    let limit = match req.params.get("limit") {
        None => ISSUED_DEFAULT_LIMIT,
        Some(v) => match v.as_i64() {
            Some(n) if n > 0 => n,
            _ => return err(&req.id, "bad_params", "limit must be a positive integer", None),
        },
    };

    match db::list_issued(conn, kind.map(IdKind::as_str), limit) {
        Ok(rows) => ok(&req.id, json!({ "issued": rows })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn section_json(section: Section) -> serde_json::Value {
    json!({ "name": section.name(), "code": section.code() })
}

fn handle_class_codes(req: &Request) -> serde_json::Value {
    let rows: Vec<serde_json::Value> = classes::CLASS_CODES
        .iter()
        .map(|(name, code)| {
            json!({
                "name": name,
                "code": code,
                "section": classes::class_code_to_section(code).map(Section::name),
            })
        })
        .collect();
    let sections: Vec<serde_json::Value> = Section::ALL.into_iter().map(section_json).collect();
    ok(&req.id, json!({ "classes": rows, "sections": sections }))
}

fn handle_class_lookup(req: &Request) -> serde_json::Value {
    if let Some(code) = optional_str(req, "code") {
        let code = code.trim().to_ascii_uppercase();
        return ok(
            &req.id,
            json!({
                "code": code,
                "name": classes::class_code_to_name(&code),
                "section": classes::class_code_to_section(&code).map(section_json),
            }),
        );
    }
    if let Some(name) = optional_str(req, "name") {
        let code = classes::name_to_class_code(name.trim());
        return ok(
            &req.id,
            json!({
                "name": name.trim(),
                "code": code,
                "section": code.and_then(classes::class_code_to_section).map(section_json),
            }),
        );
    }
    err(&req.id, "bad_params", "missing code or name", None)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "ids.generate" => Some(handle_generate(state, req)),
        "ids.generateBatch" => Some(handle_generate_batch(state, req)),
        "ids.parse" => Some(handle_parse(req)),
        "ids.validate" => Some(handle_validate(req)),
        "ids.badge" => Some(handle_badge(req)),
        "ids.username" => Some(handle_username(state, req)),
        "ids.issued" => Some(handle_issued(state, req)),
        "classes.codes" => Some(handle_class_codes(req)),
        "classes.lookup" => Some(handle_class_lookup(req)),
        _ => None,
    }
}
