use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{params_as, required_str};
use crate::ipc::types::{AppState, Request};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct SeedEntry {
    key: String,
    sequence: u32,
}

#[derive(Debug, Deserialize)]
struct SeedParams {
    #[serde(default)]
    entries: Vec<SeedEntry>,
    key: Option<String>,
    sequence: Option<u32>,
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let key = match required_str(req, "key") {
        Ok(k) => k,
        Err(resp) => return resp,
    };
    match state.allocator.current(key) {
        Ok(current) => ok(&req.id, json!({ "key": key, "current": current })),
        Err(e) => err(&req.id, "allocator_failed", e.to_string(), None),
    }
}

/// Seeds one counter (`key` + `sequence`) or many (`entries`), e.g. when
/// migrating numbering from a previous system.
fn handle_seed(state: &mut AppState, req: &Request) -> serde_json::Value {
    let mut p: SeedParams = match params_as(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match (p.key.take(), p.sequence) {
        (Some(key), Some(sequence)) => p.entries.push(SeedEntry { key, sequence }),
        (None, None) => {}
        _ => {
            return err(
                &req.id,
                "bad_params",
                "key and sequence must be given together",
                None,
            )
        }
    }
    if p.entries.is_empty() {
        return err(&req.id, "bad_params", "nothing to seed", None);
    }

    for entry in &p.entries {
        if entry.key.trim().is_empty() {
            return err(&req.id, "bad_params", "seed key must not be empty", None);
        }
        if let Err(e) = state.allocator.seed(&entry.key, entry.sequence) {
            return err(
                &req.id,
                "allocator_failed",
                e.to_string(),
                Some(json!({ "key": entry.key })),
            );
        }
    }
    tracing::info!(count = p.entries.len(), "seeded sequence counters");
    ok(&req.id, json!({ "seeded": p.entries.len() }))
}

fn handle_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    match state.allocator.reset() {
        Ok(()) => {
            tracing::info!(allocator = state.allocator.kind(), "sequence counters reset");
            ok(&req.id, json!({ "reset": true }))
        }
        Err(e) => err(&req.id, "allocator_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "sequences.get" => Some(handle_get(state, req)),
        "sequences.seed" => Some(handle_seed(state, req)),
        "sequences.reset" => Some(handle_reset(state, req)),
        _ => None,
    }
}
