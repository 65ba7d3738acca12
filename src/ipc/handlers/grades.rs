use crate::grading::{self, GradingError, RankEntry, SubjectEntry, SubjectResult, TermResult};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::params_as;
use crate::ipc::types::{AppState, Request};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
struct GpaParams {
    results: Vec<SubjectResult>,
}

#[derive(Debug, Deserialize)]
struct CgpaParams {
    terms: Vec<TermResult>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SummaryParams {
    subjects: Vec<SubjectEntry>,
    #[serde(default)]
    prior_terms: Vec<TermResult>,
}

#[derive(Debug, Deserialize)]
struct RankParams {
    entries: Vec<RankEntry>,
}

fn grading_error(req: &Request, e: &GradingError) -> serde_json::Value {
    err(&req.id, e.code(), e.to_string(), None)
}

fn handle_scale(req: &Request) -> serde_json::Value {
    ok(&req.id, json!({ "bands": grading::GRADING_SCALE }))
}

fn handle_grade_for(req: &Request) -> serde_json::Value {
    let Some(score) = req.params.get("score").and_then(|v| v.as_f64()) else {
        return err(&req.id, "bad_params", "missing numeric score", None);
    };
    ok(&req.id, json!(grading::grade_for(score)))
}

fn handle_gpa(req: &Request) -> serde_json::Value {
    let p: GpaParams = match params_as(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match grading::aggregate(&p.results) {
        Ok(gpa) => ok(&req.id, json!({ "gpa": gpa })),
        Err(e) => grading_error(req, &e),
    }
}

fn handle_cgpa(req: &Request) -> serde_json::Value {
    let p: CgpaParams = match params_as(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match grading::aggregate_across_terms(&p.terms) {
        Ok(cgpa) => ok(&req.id, json!({ "cgpa": cgpa })),
        Err(e) => grading_error(req, &e),
    }
}

fn handle_summary(req: &Request) -> serde_json::Value {
    let p: SummaryParams = match params_as(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match grading::term_summary(&p.subjects, &p.prior_terms) {
        Ok(summary) => ok(&req.id, json!(summary)),
        Err(e) => grading_error(req, &e),
    }
}

fn handle_rank(req: &Request) -> serde_json::Value {
    let p: RankParams = match params_as(req) {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match grading::rank_class(&p.entries) {
        Ok(ranking) => ok(&req.id, json!(ranking)),
        Err(e) => grading_error(req, &e),
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "grades.scale" => Some(handle_scale(req)),
        "grades.gradeFor" => Some(handle_grade_for(req)),
        "grades.gpa" => Some(handle_gpa(req)),
        "grades.cgpa" => Some(handle_cgpa(req)),
        "results.summary" => Some(handle_summary(req)),
        "results.rank" => Some(handle_rank(req)),
        _ => None,
    }
}
