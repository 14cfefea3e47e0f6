use serde::Serialize;
use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use crate::model::{ExamAnalysis, QuestionEntry, ScheduleItem, TopicItem, TopicStatus};

/// Net score for the exam formats this system targets: correct answers
/// minus one-third of wrong answers. Not rounded; negatives are valid.
pub fn compute_net(correct: i64, wrong: i64) -> f64 {
    correct as f64 - wrong as f64 / 3.0
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct SubjectAccum {
    pub correct: i64,
    pub wrong: i64,
    pub net: f64,
    pub count: i64,
}

impl SubjectAccum {
    pub fn average_net(&self) -> f64 {
        if self.count > 0 {
            self.net / self.count as f64
        } else {
            0.0
        }
    }
}

/// Accumulates entries into per-subject buckets. A bucket is created at
/// zero the first time its subject appears, and the returned order is
/// first-seen order so callers get stable tie-breaks.
pub fn group_entries_by_subject(entries: &[QuestionEntry]) -> Vec<(String, SubjectAccum)> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut buckets: Vec<(String, SubjectAccum)> = Vec::new();
    for entry in entries {
        let idx = *index.entry(entry.subject.clone()).or_insert_with(|| {
            buckets.push((entry.subject.clone(), SubjectAccum::default()));
            buckets.len() - 1
        });
        let acc = &mut buckets[idx].1;
        acc.correct += entry.correct_answers;
        acc.wrong += entry.wrong_answers;
        acc.net += entry.net_score;
        acc.count += 1;
    }
    buckets
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatisticsOverview {
    pub total_questions: i64,
    pub total_correct: i64,
    pub total_wrong: i64,
    pub total_net: f64,
    pub subject_stats: BTreeMap<String, SubjectAccum>,
    pub recent_entries: Vec<QuestionEntry>,
    pub exam_analyses_count: usize,
}

/// Rolls one student's entries (insertion order = chronological) into
/// overview totals and a per-subject breakdown. `total_net` sums the
/// stored per-entry net scores; nothing is recomputed here.
pub fn statistics_overview(
    entries: &[QuestionEntry],
    exam_analyses_count: usize,
) -> StatisticsOverview {
    let mut total_questions = 0;
    let mut total_correct = 0;
    let mut total_wrong = 0;
    let mut total_net = 0.0;
    for entry in entries {
        total_questions += entry.total_questions;
        total_correct += entry.correct_answers;
        total_wrong += entry.wrong_answers;
        total_net += entry.net_score;
    }

    let subject_stats = group_entries_by_subject(entries).into_iter().collect();

    let recent_start = entries.len().saturating_sub(10);
    let recent_entries = entries[recent_start..].to_vec();

    StatisticsOverview {
        total_questions,
        total_correct,
        total_wrong,
        total_net,
        subject_stats,
        recent_entries,
        exam_analyses_count,
    }
}

#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformance {
    pub total_net: f64,
    pub count: i64,
    pub total_correct: i64,
    pub total_wrong: i64,
    pub average_net: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExamSummary {
    pub total_exams: usize,
    pub average_net: f64,
    pub best_exam: ExamAnalysis,
    pub worst_exam: ExamAnalysis,
    pub subject_performance: BTreeMap<String, SubjectPerformance>,
}

/// Aggregates a set of exam analyses into summary statistics. Returns
/// `None` for an empty input; the caller decides how to represent that
/// on the wire. Best/worst ties keep the first occurrence in input
/// order.
pub fn exam_analysis_summary(analyses: &[ExamAnalysis]) -> Option<ExamSummary> {
    let first = analyses.first()?;

    let mut best = first;
    let mut worst = first;
    let mut net_sum = 0.0;
    for analysis in analyses {
        net_sum += analysis.total_net;
        if analysis.total_net > best.total_net {
            best = analysis;
        }
        if analysis.total_net < worst.total_net {
            worst = analysis;
        }
    }

    let mut subject_performance: BTreeMap<String, SubjectPerformance> = BTreeMap::new();
    for analysis in analyses {
        for line in &analysis.subjects {
            let perf = subject_performance.entry(line.name.clone()).or_default();
            perf.total_net += line.net;
            perf.count += 1;
            perf.total_correct += line.correct;
            perf.total_wrong += line.wrong;
        }
    }
    for perf in subject_performance.values_mut() {
        perf.average_net = if perf.count > 0 {
            perf.total_net / perf.count as f64
        } else {
            0.0
        };
    }

    Some(ExamSummary {
        total_exams: analyses.len(),
        average_net: net_sum / analyses.len() as f64,
        best_exam: best.clone(),
        worst_exam: worst.clone(),
        subject_performance,
    })
}

pub const SUGGESTED_TOPIC: &str = "Weak topics";
pub const SUGGESTED_RESOURCE: &str = "Recommended resource";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleSuggestion {
    pub suggested_items: Vec<ScheduleItem>,
    pub analysis: BTreeMap<String, SubjectAccum>,
}

fn duration_hours(average_net: f64) -> i64 {
    if average_net < 20.0 {
        3
    } else if average_net < 30.0 {
        2
    } else {
        1
    }
}

/// Greedy weekly plan: one day per subject, weakest average net first,
/// capped at 7 days. Each day occupies a fixed 3-hour slot starting at
/// 09:00 + (day-1)*3 regardless of the block's actual duration; hours
/// are not clamped or wrapped past 24:00.
pub fn suggest_weekly_schedule(entries: &[QuestionEntry]) -> ScheduleSuggestion {
    let mut buckets = group_entries_by_subject(entries);
    // Stable sort: equal averages keep first-seen subject order.
    buckets.sort_by(|a, b| {
        a.1.average_net()
            .partial_cmp(&b.1.average_net())
            .unwrap_or(Ordering::Equal)
    });

    let mut suggested_items = Vec::new();
    for (i, (subject, acc)) in buckets.iter().take(7).enumerate() {
        let day = (i + 1) as i64;
        let average_net = acc.average_net();
        let duration = duration_hours(average_net);
        let start_hour = 9 + (day - 1) * 3;
        suggested_items.push(ScheduleItem {
            day,
            start_time: format!("{:02}:00", start_hour),
            end_time: format!("{:02}:00", start_hour + duration),
            subject: subject.clone(),
            topic: Some(SUGGESTED_TOPIC.to_string()),
            resource: Some(SUGGESTED_RESOURCE.to_string()),
            activity_type: "study".to_string(),
            notes: Some(format!(
                "Average net: {:.2} - needs improvement",
                average_net
            )),
        });
    }

    ScheduleSuggestion {
        suggested_items,
        analysis: buckets.into_iter().collect(),
    }
}

/// Sets the status of the first topic whose name equals `topic_name`,
/// leaving every other topic (including later duplicates) untouched.
/// Returns whether a topic matched; the caller reports not-found.
pub fn set_topic_status(topics: &mut [TopicItem], topic_name: &str, status: TopicStatus) -> bool {
    for topic in topics.iter_mut() {
        if topic.name == topic_name {
            topic.status = status;
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ExamType, SubjectLine};

    fn entry(subject: &str, total: i64, correct: i64, wrong: i64, empty: i64) -> QuestionEntry {
        QuestionEntry {
            id: format!("e-{subject}-{correct}-{wrong}"),
            student_id: "s1".to_string(),
            teacher_id: "t1".to_string(),
            exam_type: ExamType::Tyt,
            subject: subject.to_string(),
            total_questions: total,
            correct_answers: correct,
            wrong_answers: wrong,
            empty_answers: empty,
            net_score: compute_net(correct, wrong),
            date: "2025-01-01T00:00:00Z".to_string(),
            notes: None,
        }
    }

    fn analysis(name: &str, subjects: Vec<SubjectLine>) -> ExamAnalysis {
        let total_net = subjects.iter().map(|s| s.net).sum();
        ExamAnalysis {
            id: format!("a-{name}"),
            student_id: "s1".to_string(),
            teacher_id: "t1".to_string(),
            exam_type: ExamType::Tyt,
            exam_name: name.to_string(),
            exam_date: "2025-01-01T00:00:00Z".to_string(),
            subjects,
            total_net,
            notes: None,
            created_at: "2025-01-01T00:00:00Z".to_string(),
        }
    }

    fn line(name: &str, correct: i64, wrong: i64, net: f64) -> SubjectLine {
        SubjectLine {
            name: name.to_string(),
            correct,
            wrong,
            net,
        }
    }

    #[test]
    fn net_score_formula() {
        assert_eq!(compute_net(30, 9), 27.0);
        assert_eq!(compute_net(0, 0), 0.0);
        assert_eq!(compute_net(10, 30), 0.0);
        assert_eq!(compute_net(5, 3), 4.0);
    }

    #[test]
    fn net_score_can_go_negative() {
        assert!(compute_net(1, 6) < 0.0);
    }

    #[test]
    fn overview_totals_match_entry_sums() {
        let entries = vec![
            entry("Math", 40, 30, 9, 1),
            entry("Physics", 14, 10, 3, 1),
            entry("Math", 40, 20, 6, 14),
        ];
        let overview = statistics_overview(&entries, 2);

        assert_eq!(overview.total_questions, 94);
        assert_eq!(overview.total_correct, 60);
        assert_eq!(overview.total_wrong, 18);
        let expected_net: f64 = entries.iter().map(|e| e.net_score).sum();
        assert_eq!(overview.total_net, expected_net);
        assert_eq!(overview.exam_analyses_count, 2);

        let bucket_count: i64 = overview.subject_stats.values().map(|s| s.count).sum();
        assert_eq!(bucket_count, entries.len() as i64);

        let math = &overview.subject_stats["Math"];
        assert_eq!(math.correct, 50);
        assert_eq!(math.wrong, 15);
        assert_eq!(math.count, 2);
    }

    #[test]
    fn overview_of_nothing_is_all_zero() {
        let overview = statistics_overview(&[], 0);
        assert_eq!(overview.total_questions, 0);
        assert_eq!(overview.total_correct, 0);
        assert_eq!(overview.total_wrong, 0);
        assert_eq!(overview.total_net, 0.0);
        assert!(overview.subject_stats.is_empty());
        assert!(overview.recent_entries.is_empty());
        assert_eq!(overview.exam_analyses_count, 0);
    }

    #[test]
    fn recent_entries_keeps_last_ten_in_order() {
        let entries: Vec<QuestionEntry> =
            (0..13).map(|i| entry("Math", 10, i, 0, 10 - i)).collect();
        let overview = statistics_overview(&entries, 0);
        assert_eq!(overview.recent_entries.len(), 10);
        assert_eq!(overview.recent_entries[0].id, entries[3].id);
        assert_eq!(overview.recent_entries[9].id, entries[12].id);

        let few = statistics_overview(&entries[..4], 0);
        assert_eq!(few.recent_entries.len(), 4);
    }

    #[test]
    fn exam_summary_picks_best_and_worst() {
        let analyses = vec![
            analysis("Trial 1", vec![line("Math", 12, 6, 10.0)]),
            analysis("Trial 2", vec![line("Math", 52, 6, 50.0)]),
            analysis("Trial 3", vec![line("Math", 32, 6, 30.0)]),
        ];
        let summary = exam_analysis_summary(&analyses).expect("non-empty summary");
        assert_eq!(summary.total_exams, 3);
        assert_eq!(summary.average_net, 30.0);
        assert_eq!(summary.best_exam.total_net, 50.0);
        assert_eq!(summary.best_exam.exam_name, "Trial 2");
        assert_eq!(summary.worst_exam.total_net, 10.0);
        assert_eq!(summary.worst_exam.exam_name, "Trial 1");
    }

    #[test]
    fn exam_summary_tie_keeps_first_occurrence() {
        let analyses = vec![
            analysis("First", vec![line("Math", 20, 0, 20.0)]),
            analysis("Second", vec![line("Math", 20, 0, 20.0)]),
        ];
        let summary = exam_analysis_summary(&analyses).expect("non-empty summary");
        assert_eq!(summary.best_exam.exam_name, "First");
        assert_eq!(summary.worst_exam.exam_name, "First");
    }

    #[test]
    fn exam_summary_subject_performance_averages() {
        let analyses = vec![
            analysis(
                "Trial 1",
                vec![line("Math", 10, 3, 9.0), line("Physics", 5, 0, 5.0)],
            ),
            analysis("Trial 2", vec![line("Math", 20, 3, 19.0)]),
        ];
        let summary = exam_analysis_summary(&analyses).expect("non-empty summary");
        let math = &summary.subject_performance["Math"];
        assert_eq!(math.total_net, 28.0);
        assert_eq!(math.count, 2);
        assert_eq!(math.total_correct, 30);
        assert_eq!(math.total_wrong, 6);
        assert_eq!(math.average_net, 14.0);
        let physics = &summary.subject_performance["Physics"];
        assert_eq!(physics.count, 1);
        assert_eq!(physics.average_net, 5.0);
    }

    #[test]
    fn exam_summary_of_nothing_is_none() {
        assert!(exam_analysis_summary(&[]).is_none());
    }

    #[test]
    fn suggestion_caps_at_seven_days() {
        let entries: Vec<QuestionEntry> = (0..8)
            .map(|i| entry(&format!("Subject {i}"), 40, i * 4, 0, 40 - i * 4))
            .collect();
        let suggestion = suggest_weekly_schedule(&entries);
        assert_eq!(suggestion.suggested_items.len(), 7);
        assert_eq!(suggestion.analysis.len(), 8);
        // Strongest subject is the one dropped.
        assert!(suggestion
            .suggested_items
            .iter()
            .all(|item| item.subject != "Subject 7"));
    }

    #[test]
    fn suggestion_orders_weakest_first() {
        let entries = vec![
            entry("Strong", 40, 36, 0, 4),
            entry("Weak", 40, 9, 0, 31),
            entry("Middle", 40, 24, 0, 16),
        ];
        let suggestion = suggest_weekly_schedule(&entries);
        let order: Vec<&str> = suggestion
            .suggested_items
            .iter()
            .map(|i| i.subject.as_str())
            .collect();
        assert_eq!(order, vec!["Weak", "Middle", "Strong"]);
        assert_eq!(suggestion.suggested_items[0].day, 1);
        assert_eq!(suggestion.suggested_items[2].day, 3);
    }

    #[test]
    fn suggestion_ties_keep_first_seen_subject_order() {
        let entries = vec![
            entry("Later", 40, 15, 0, 25),
            entry("Earlier", 40, 15, 0, 25),
        ];
        // Both average 15; "Later" was seen first in entry order.
        let suggestion = suggest_weekly_schedule(&entries);
        assert_eq!(suggestion.suggested_items[0].subject, "Later");
        assert_eq!(suggestion.suggested_items[1].subject, "Earlier");
    }

    #[test]
    fn suggestion_duration_bands_and_boundaries() {
        assert_eq!(duration_hours(15.0), 3);
        assert_eq!(duration_hours(25.0), 2);
        assert_eq!(duration_hours(35.0), 1);
        assert_eq!(duration_hours(20.0), 2);
        assert_eq!(duration_hours(30.0), 1);
    }

    #[test]
    fn suggestion_time_slots_are_fixed_three_hour_stride() {
        let entries = vec![
            entry("A", 40, 5, 0, 35),  // avg 5 -> 3h
            entry("B", 40, 35, 0, 5),  // avg 35 -> 1h
        ];
        let suggestion = suggest_weekly_schedule(&entries);
        let first = &suggestion.suggested_items[0];
        assert_eq!(first.start_time, "09:00");
        assert_eq!(first.end_time, "12:00");
        let second = &suggestion.suggested_items[1];
        assert_eq!(second.start_time, "12:00");
        assert_eq!(second.end_time, "13:00");
        assert_eq!(
            first.notes.as_deref(),
            Some("Average net: 5.00 - needs improvement")
        );
    }

    #[test]
    fn suggestion_late_days_are_not_wrapped() {
        // Day 6 starts at 24:00, day 7 at 27:00; preserved as-is.
        let entries: Vec<QuestionEntry> = (0..7)
            .map(|i| entry(&format!("S{i}"), 40, i, 0, 40 - i))
            .collect();
        let suggestion = suggest_weekly_schedule(&entries);
        assert_eq!(suggestion.suggested_items[5].start_time, "24:00");
        assert_eq!(suggestion.suggested_items[6].start_time, "27:00");
    }

    #[test]
    fn suggestion_of_nothing_is_empty() {
        let suggestion = suggest_weekly_schedule(&[]);
        assert!(suggestion.suggested_items.is_empty());
        assert!(suggestion.analysis.is_empty());
    }

    #[test]
    fn topic_status_updates_first_match_only() {
        let mut topics = vec![
            TopicItem {
                name: "A".to_string(),
                status: TopicStatus::NotStarted,
            },
            TopicItem {
                name: "B".to_string(),
                status: TopicStatus::Completed,
            },
            TopicItem {
                name: "A".to_string(),
                status: TopicStatus::NotStarted,
            },
        ];
        assert!(set_topic_status(&mut topics, "A", TopicStatus::InProgress));
        assert_eq!(topics[0].status, TopicStatus::InProgress);
        assert_eq!(topics[1].status, TopicStatus::Completed);
        // Later duplicate untouched.
        assert_eq!(topics[2].status, TopicStatus::NotStarted);
    }

    #[test]
    fn topic_status_missing_name_changes_nothing() {
        let mut topics = vec![TopicItem {
            name: "A".to_string(),
            status: TopicStatus::NotStarted,
        }];
        assert!(!set_topic_status(&mut topics, "Z", TopicStatus::Completed));
        assert_eq!(topics[0].status, TopicStatus::NotStarted);
    }
}
