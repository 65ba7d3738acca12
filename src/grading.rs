use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use thiserror::Error;

/// Continuous-assessment and exam caps used by result entry.
pub const CA_MAX: f64 = 40.0;
pub const EXAM_MAX: f64 = 60.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBand {
    pub grade: &'static str,
    pub min_score: f64,
    pub max_score: f64,
    pub grade_point: f64,
    pub remark: &'static str,
}

/// Checked top to bottom. F is the fallback for anything no band claims.
pub const GRADING_SCALE: [GradeBand; 6] = [
    GradeBand {
        grade: "A",
        min_score: 70.0,
        max_score: 100.0,
        grade_point: 4.0,
        remark: "Excellent",
    },
    GradeBand {
        grade: "B",
        min_score: 60.0,
        max_score: 69.0,
        grade_point: 3.5,
        remark: "Very Good",
    },
    GradeBand {
        grade: "C",
        min_score: 50.0,
        max_score: 59.0,
        grade_point: 3.0,
        remark: "Good",
    },
    GradeBand {
        grade: "D",
        min_score: 45.0,
        max_score: 49.0,
        grade_point: 2.5,
        remark: "Fair",
    },
    GradeBand {
        grade: "E",
        min_score: 40.0,
        max_score: 44.0,
        grade_point: 2.0,
        remark: "Pass",
    },
    GradeBand {
        grade: "F",
        min_score: 0.0,
        max_score: 39.0,
        grade_point: 0.0,
        remark: "Fail",
    },
];

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeInfo {
    pub grade: &'static str,
    pub grade_point: f64,
    pub remark: &'static str,
}

impl From<&GradeBand> for GradeInfo {
    fn from(b: &GradeBand) -> Self {
        Self {
            grade: b.grade,
            grade_point: b.grade_point,
            remark: b.remark,
        }
    }
}

#[derive(Debug, Error)]
pub enum GradingError {
    #[error("{field} must be a finite number")]
    NotFinite { field: String },
    #[error("{field} must be between 0 and {max}, got {value}")]
    OutOfRange { field: String, value: f64, max: f64 },
    #[error("{field} must not be negative, got {value}")]
    Negative { field: String, value: f64 },
    #[error("total credit units {total} exceed {}", u32::MAX)]
    TooManyCredits { total: u64 },
}

impl GradingError {
    pub fn code(&self) -> &'static str {
        "invalid_grading_input"
    }
}

/// Two-decimal rounding for GPA/CGPA display values.
pub fn round_2dp(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

/// Grade for a total score.
///
/// Bands are matched on their lower bound, top to bottom, so fractional totals
/// such as 69.5 land in B rather than slipping between the integer bounds, and
/// totals above 100 stay in A. Anything below every band (negative, NaN) is F.
/// The score is never clamped.
pub fn grade_for(score: f64) -> GradeInfo {
    let band = GRADING_SCALE
        .iter()
        .find(|b| score >= b.min_score)
        .unwrap_or(&GRADING_SCALE[GRADING_SCALE.len() - 1]);
    GradeInfo::from(band)
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectResult {
    pub score: f64,
    pub credit_units: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermResult {
    pub gpa: f64,
    pub credits: u32,
}

fn weighted_mean<I>(pairs: I) -> f64
where
    I: IntoIterator<Item = (f64, u32)>,
{
    let mut weighted: f64 = 0.0;
    let mut total: u64 = 0;
    for (value, weight) in pairs {
        weighted += value * f64::from(weight);
        total += u64::from(weight);
    }
    if total == 0 {
        return 0.0;
    }
    round_2dp(weighted / total as f64)
}

/// Credit-weighted GPA over one term. Empty input or zero credits give 0.
pub fn aggregate(results: &[SubjectResult]) -> Result<f64, GradingError> {
    for (i, r) in results.iter().enumerate() {
        if !r.score.is_finite() {
            return Err(GradingError::NotFinite {
                field: format!("results[{i}].score"),
            });
        }
    }
    Ok(weighted_mean(
        results
            .iter()
            .map(|r| (grade_for(r.score).grade_point, r.credit_units)),
    ))
}

/// Credit-weighted mean of per-term GPAs.
pub fn aggregate_across_terms(terms: &[TermResult]) -> Result<f64, GradingError> {
    for (i, t) in terms.iter().enumerate() {
        let field = format!("terms[{i}].gpa");
        if !t.gpa.is_finite() {
            return Err(GradingError::NotFinite { field });
        }
        if t.gpa < 0.0 {
            return Err(GradingError::Negative {
                field,
                value: t.gpa,
            });
        }
    }
    Ok(weighted_mean(terms.iter().map(|t| (t.gpa, t.credits))))
}

/// CA plus exam, each checked against its cap.
pub fn score_total(ca_score: f64, exam_score: f64) -> Result<f64, GradingError> {
    check_component("caScore", ca_score, CA_MAX)?;
    check_component("examScore", exam_score, EXAM_MAX)?;
    Ok(ca_score + exam_score)
}

fn check_component(field: &str, value: f64, max: f64) -> Result<(), GradingError> {
    if !value.is_finite() {
        return Err(GradingError::NotFinite {
            field: field.to_string(),
        });
    }
    if !(0.0..=max).contains(&value) {
        return Err(GradingError::OutOfRange {
            field: field.to_string(),
            value,
            max,
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectEntry {
    pub subject: String,
    pub ca_score: f64,
    pub exam_score: f64,
    pub credit_units: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectLine {
    pub subject: String,
    pub ca_score: f64,
    pub exam_score: f64,
    pub total_score: f64,
    pub grade: &'static str,
    pub grade_point: f64,
    pub remark: &'static str,
    pub credit_units: u32,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TermSummary {
    pub subjects: Vec<SubjectLine>,
    pub total_credits: u64,
    pub total_grade_points: f64,
    pub gpa: f64,
    pub cgpa: f64,
}

/// One student's term: graded subject lines, GPA, and CGPA over `prior_terms`
/// plus this term.
pub fn term_summary(
    entries: &[SubjectEntry],
    prior_terms: &[TermResult],
) -> Result<TermSummary, GradingError> {
    let mut subjects = Vec::with_capacity(entries.len());
    let mut results = Vec::with_capacity(entries.len());
    for (i, e) in entries.iter().enumerate() {
        let total = score_total(e.ca_score, e.exam_score).map_err(|err| match err {
            GradingError::NotFinite { field } => GradingError::NotFinite {
                field: format!("subjects[{i}].{field}"),
            },
            GradingError::OutOfRange { field, value, max } => GradingError::OutOfRange {
                field: format!("subjects[{i}].{field}"),
                value,
                max,
            },
            other => other,
        })?;
        let g = grade_for(total);
        subjects.push(SubjectLine {
            subject: e.subject.clone(),
            ca_score: e.ca_score,
            exam_score: e.exam_score,
            total_score: total,
            grade: g.grade,
            grade_point: g.grade_point,
            remark: g.remark,
            credit_units: e.credit_units,
        });
        results.push(SubjectResult {
            score: total,
            credit_units: e.credit_units,
        });
    }

    let total_credits: u64 = entries.iter().map(|e| u64::from(e.credit_units)).sum();
    let total_grade_points: f64 = subjects
        .iter()
        .map(|s| s.grade_point * f64::from(s.credit_units))
        .sum();
    let gpa = aggregate(&results)?;

    let mut terms = prior_terms.to_vec();
    terms.push(TermResult {
        gpa,
        credits: u32::try_from(total_credits).map_err(|_| GradingError::TooManyCredits {
            total: total_credits,
        })?,
    });
    let cgpa = aggregate_across_terms(&terms)?;

    Ok(TermSummary {
        subjects,
        total_credits,
        total_grade_points,
        gpa,
        cgpa,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankEntry {
    pub student_id: String,
    pub score: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedStudent {
    pub student_id: String,
    pub score: f64,
    pub position: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassRanking {
    pub positions: Vec<RankedStudent>,
    pub class_average: f64,
    pub total_students: usize,
}

/// Competition ranking ("1224"): equal scores share a position and the next
/// distinct score skips ahead. Ties keep input order.
pub fn rank_class(entries: &[RankEntry]) -> Result<ClassRanking, GradingError> {
    for (i, e) in entries.iter().enumerate() {
        if !e.score.is_finite() {
            return Err(GradingError::NotFinite {
                field: format!("entries[{i}].score"),
            });
        }
    }

    let mut sorted: Vec<&RankEntry> = entries.iter().collect();
    sorted.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

    let mut positions = Vec::with_capacity(sorted.len());
    let mut prev: Option<(f64, usize)> = None;
    for (i, e) in sorted.into_iter().enumerate() {
        let position = match prev {
            Some((score, pos)) if score == e.score => pos,
            _ => i + 1,
        };
        prev = Some((e.score, position));
        positions.push(RankedStudent {
            student_id: e.student_id.clone(),
            score: e.score,
            position,
        });
    }

    let class_average = if entries.is_empty() {
        0.0
    } else {
        round_2dp(entries.iter().map(|e| e.score).sum::<f64>() / entries.len() as f64)
    };

    Ok(ClassRanking {
        total_students: positions.len(),
        positions,
        class_average,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subj(score: f64, credit_units: u32) -> SubjectResult {
        SubjectResult {
            score,
            credit_units,
        }
    }

    #[test]
    fn band_boundaries() {
        let g = grade_for(70.0);
        assert_eq!((g.grade, g.grade_point, g.remark), ("A", 4.0, "Excellent"));
        let g = grade_for(69.0);
        assert_eq!((g.grade, g.grade_point, g.remark), ("B", 3.5, "Very Good"));
        assert_eq!(grade_for(59.0).grade, "C");
        assert_eq!(grade_for(50.0).grade, "C");
        assert_eq!(grade_for(49.0).grade, "D");
        assert_eq!(grade_for(45.0).grade, "D");
        assert_eq!(grade_for(44.0).remark, "Pass");
        assert_eq!(grade_for(40.0).grade, "E");
        let g = grade_for(39.0);
        assert_eq!((g.grade, g.grade_point, g.remark), ("F", 0.0, "Fail"));
        assert_eq!(grade_for(0.0).grade, "F");
    }

    #[test]
    fn out_of_range_scores_are_not_clamped() {
        assert_eq!(grade_for(130.0).grade, "A");
        assert_eq!(grade_for(-5.0).grade, "F");
        assert_eq!(grade_for(f64::NAN).grade, "F");
        assert_eq!(grade_for(69.5).grade, "B");
        assert_eq!(grade_for(39.99).grade, "F");
    }

    #[test]
    fn scale_partitions_zero_to_hundred() {
        for w in GRADING_SCALE.windows(2) {
            assert_eq!(w[0].min_score, w[1].max_score + 1.0);
        }
        assert_eq!(GRADING_SCALE[0].max_score, 100.0);
        assert_eq!(GRADING_SCALE[5].min_score, 0.0);
    }

    #[test]
    fn gpa_weighted_and_rounded() {
        assert_eq!(aggregate(&[]).unwrap(), 0.0);
        assert_eq!(aggregate(&[subj(100.0, 0)]).unwrap(), 0.0);
        assert_eq!(aggregate(&[subj(80.0, 2), subj(50.0, 1)]).unwrap(), 3.67);
        assert_eq!(aggregate(&[subj(75.0, 3)]).unwrap(), 4.0);
        assert!(aggregate(&[subj(f64::NAN, 1)]).is_err());
    }

    #[test]
    fn cgpa_weighted_across_terms() {
        let t = |gpa, credits| TermResult { gpa, credits };
        assert_eq!(aggregate_across_terms(&[]).unwrap(), 0.0);
        assert_eq!(aggregate_across_terms(&[t(3.5, 0)]).unwrap(), 0.0);
        assert_eq!(
            aggregate_across_terms(&[t(3.0, 10), t(4.0, 20)]).unwrap(),
            3.67
        );
        assert!(aggregate_across_terms(&[t(-1.0, 3)]).is_err());
        assert!(aggregate_across_terms(&[t(f64::INFINITY, 3)]).is_err());
    }

    #[test]
    fn score_total_enforces_caps() {
        assert_eq!(score_total(30.0, 45.5).unwrap(), 75.5);
        assert!(score_total(41.0, 10.0).is_err());
        assert!(score_total(10.0, 60.5).is_err());
        assert!(score_total(-1.0, 10.0).is_err());
        let err = score_total(f64::NAN, 10.0).unwrap_err();
        assert_eq!(err.code(), "invalid_grading_input");
    }

    #[test]
    fn term_summary_rolls_up_subjects() {
        let entries = vec![
            SubjectEntry {
                subject: "Mathematics".into(),
                ca_score: 35.0,
                exam_score: 45.0,
                credit_units: 2,
            },
            SubjectEntry {
                subject: "English".into(),
                ca_score: 20.0,
                exam_score: 30.0,
                credit_units: 1,
            },
        ];
        let s = term_summary(&entries, &[]).unwrap();
        assert_eq!(s.subjects[0].total_score, 80.0);
        assert_eq!(s.subjects[0].grade, "A");
        assert_eq!(s.subjects[1].grade, "C");
        assert_eq!(s.total_credits, 3);
        assert_eq!(s.total_grade_points, 11.0);
        assert_eq!(s.gpa, 3.67);
        assert_eq!(s.cgpa, 3.67);

        let prior = [TermResult {
            gpa: 2.0,
            credits: 3,
        }];
        let s = term_summary(&entries, &prior).unwrap();
        assert_eq!(s.cgpa, round_2dp((2.0 * 3.0 + 3.67 * 3.0) / 6.0));
    }

    #[test]
    fn term_summary_names_the_bad_subject() {
        let entries = vec![SubjectEntry {
            subject: "Physics".into(),
            ca_score: 50.0,
            exam_score: 10.0,
            credit_units: 1,
        }];
        let err = term_summary(&entries, &[]).unwrap_err();
        assert!(err.to_string().contains("subjects[0].caScore"), "{err}");
    }

    #[test]
    fn term_summary_refuses_credit_totals_it_cannot_carry() {
        let heavy = |subject: &str| SubjectEntry {
            subject: subject.into(),
            ca_score: 30.0,
            exam_score: 40.0,
            credit_units: u32::MAX,
        };
        let err = term_summary(&[heavy("Mathematics"), heavy("English")], &[]).unwrap_err();
        assert!(
            matches!(err, GradingError::TooManyCredits { total } if total == 2 * u64::from(u32::MAX)),
            "{err}"
        );
        assert_eq!(err.code(), "invalid_grading_input");
    }

    #[test]
    fn ranking_shares_positions_on_ties() {
        let e = |id: &str, score| RankEntry {
            student_id: id.to_string(),
            score,
        };
        let r = rank_class(&[e("a", 70.0), e("b", 85.0), e("c", 70.0), e("d", 40.0)]).unwrap();
        let got: Vec<(&str, usize)> = r
            .positions
            .iter()
            .map(|p| (p.student_id.as_str(), p.position))
            .collect();
        assert_eq!(got, vec![("b", 1), ("a", 2), ("c", 2), ("d", 4)]);
        assert_eq!(r.class_average, 66.25);
        assert_eq!(r.total_students, 4);

        let empty = rank_class(&[]).unwrap();
        assert_eq!(empty.class_average, 0.0);
        assert!(rank_class(&[e("x", f64::NAN)]).is_err());
    }
}
