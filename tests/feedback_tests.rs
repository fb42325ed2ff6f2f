//! Feedback overlay tests
//!
//! - Attaching to the most recent answer across users and rounds
//! - Placeholder answers for unanswered questions
//! - Scores and grades untouched by feedback, placeholders and relabelling

mod common;

use common::{expert, user, Fixture, EXPERT, OTHER_USER, USER};
use privacy_diagnosis::config::DEFAULT_APPLIED_FEEDBACK_STATUS;
use privacy_diagnosis::service::requests::{
    FeedbackBatchEntry, FeedbackBatchRequest, FeedbackRequest, ListFeedbackRequest,
};
use privacy_diagnosis::{Actor, Battery, DiagnosisError, FeedbackTarget, ResponseCategory, UserId};

fn feedback_request(fx: &Fixture, battery: Battery, number: u32, text: &str) -> FeedbackRequest {
    FeedbackRequest {
        system_id: Some(fx.system.0),
        battery: Some(battery),
        question_number: Some(number),
        content: Some(text.to_string()),
    }
}

#[test]
fn test_feedback_targets_latest_answer_and_its_result() {
    let fx = Fixture::new();
    fx.save_intake(&user());
    fx.service
        .submit_responses(
            &user(),
            Battery::Quantitative,
            &fx.submission(1, &[(1, ResponseCategory::Unfulfilled)]),
        )
        .unwrap();
    let result = fx
        .service
        .complete_round(&user(), &fx.system_request())
        .unwrap();

    let feedback = fx
        .service
        .attach_feedback(
            &expert(),
            &feedback_request(&fx, Battery::Quantitative, 1, "Document the consent flow"),
        )
        .unwrap();

    assert_eq!(feedback.user_id, USER);
    assert_eq!(feedback.expert_id, EXPERT);
    assert_eq!(feedback.assessment_result_id, Some(result.id));
    assert!(matches!(feedback.target, FeedbackTarget::Quantitative(_)));
}

#[test]
fn test_feedback_picks_most_recent_across_users() {
    let fx = Fixture::new();
    fx.service
        .submit_responses(
            &user(),
            Battery::Qualitative,
            &fx.submission(1, &[(2, ResponseCategory::NotApplicable)]),
        )
        .unwrap();
    std::thread::sleep(std::time::Duration::from_millis(5));
    fx.service
        .submit_responses(
            &Actor::User(OTHER_USER),
            Battery::Qualitative,
            &fx.submission(1, &[(2, ResponseCategory::ConsultNeeded)]),
        )
        .unwrap();

    let feedback = fx
        .service
        .attach_feedback(&expert(), &feedback_request(&fx, Battery::Qualitative, 2, "ok"))
        .unwrap();
    assert_eq!(feedback.user_id, OTHER_USER);
    assert_eq!(feedback.assessment_result_id, None);
}

#[test]
fn test_placeholder_answer_lands_in_latest_round() {
    let fx = Fixture::new();
    fx.commit_round(&user());
    fx.commit_round(&user());
    fx.service
        .submit_responses(
            &user(),
            Battery::Quantitative,
            &fx.submission(3, &[(1, ResponseCategory::Fulfilled)]),
        )
        .unwrap();

    let feedback = fx
        .service
        .attach_feedback(&expert(), &feedback_request(&fx, Battery::Quantitative, 2, "Add a retention schedule"))
        .unwrap();
    assert_eq!(feedback.user_id, UserId(EXPERT.0));

    let round = fx
        .service
        .store()
        .read(|conn| {
            privacy_diagnosis::ledger::latest_response_round(
                conn,
                Battery::Quantitative,
                fx.system,
                UserId(EXPERT.0),
            )
        })
        .unwrap();
    assert_eq!(round, Some(3));
}

#[test]
fn test_feedback_never_changes_scores() {
    let fx = Fixture::new();
    fx.save_intake(&user());
    fx.service
        .submit_responses(
            &user(),
            Battery::Quantitative,
            &fx.submission(
                1,
                &[
                    (1, ResponseCategory::Fulfilled),
                    (2, ResponseCategory::ConsultNeeded),
                ],
            ),
        )
        .unwrap();
    let before = fx
        .service
        .complete_round(&user(), &fx.system_request())
        .unwrap();

    fx.service
        .attach_feedback(&expert(), &feedback_request(&fx, Battery::Quantitative, 2, "Consult done"))
        .unwrap();
    let updated = fx
        .service
        .mark_feedback_applied(&expert(), &fx.system_request())
        .unwrap();
    assert_eq!(updated, 1);

    let after = fx
        .service
        .results_history(&user(), &fx.system_request())
        .unwrap()
        .remove(0);
    assert_eq!(after.score, before.score);
    assert_eq!(after.grade, before.grade);
    assert_eq!(after.feedback_status, DEFAULT_APPLIED_FEEDBACK_STATUS);
}

#[test]
fn test_feedback_on_open_round_does_not_reach_its_score() {
    let fx = Fixture::new();
    fx.service
        .submit_responses(
            &user(),
            Battery::Quantitative,
            &fx.submission(1, &[(1, ResponseCategory::Unfulfilled)]),
        )
        .unwrap();
    fx.service
        .attach_feedback(
            &expert(),
            &feedback_request(&fx, Battery::Quantitative, 3, "Nobody answered the disposal question"),
        )
        .unwrap();

    let result = fx.commit_round(&user());
    assert_eq!(result.round, 1);
    assert_eq!(result.score, 0.0);
}

#[test]
fn test_second_user_in_same_round_does_not_reach_score() {
    let fx = Fixture::new();
    fx.service
        .submit_responses(
            &Actor::User(OTHER_USER),
            Battery::Quantitative,
            &fx.submission(
                1,
                &[
                    (1, ResponseCategory::Fulfilled),
                    (2, ResponseCategory::Fulfilled),
                ],
            ),
        )
        .unwrap();
    fx.service
        .submit_responses(
            &user(),
            Battery::Quantitative,
            &fx.submission(1, &[(3, ResponseCategory::ConsultNeeded)]),
        )
        .unwrap();

    let mine = fx.commit_round(&user());
    let theirs = fx.commit_round(&Actor::User(OTHER_USER));
    assert_eq!(mine.score, 3.0);
    assert_eq!(theirs.score, 20.0);
}

#[test]
fn test_mark_applied_without_results() {
    let fx = Fixture::new();
    assert!(matches!(
        fx.service
            .mark_feedback_applied(&expert(), &fx.system_request()),
        Err(DiagnosisError::NotFound(_))
    ));
}

#[test]
fn test_users_cannot_leave_feedback() {
    let fx = Fixture::new();
    let result = fx
        .service
        .attach_feedback(&user(), &feedback_request(&fx, Battery::Quantitative, 1, "self review"));
    assert!(matches!(result, Err(DiagnosisError::Unauthenticated(_))));
}

#[test]
fn test_unknown_question_feedback() {
    let fx = Fixture::new();
    let result = fx
        .service
        .attach_feedback(&expert(), &feedback_request(&fx, Battery::Qualitative, 99, "?"));
    assert!(matches!(
        result,
        Err(DiagnosisError::UnknownQuestion { number: 99, .. })
    ));
}

#[test]
fn test_batch_reports_skipped_entries_and_lists_newest_first() {
    let fx = Fixture::new();
    let ack = fx
        .service
        .attach_feedback_batch(
            &expert(),
            &FeedbackBatchRequest {
                system_id: Some(fx.system.0),
                battery: Some(Battery::Quantitative),
                items: vec![
                    FeedbackBatchEntry {
                        question_number: Some(1),
                        content: Some("first".to_string()),
                    },
                    FeedbackBatchEntry {
                        question_number: None,
                        content: Some("orphan".to_string()),
                    },
                    FeedbackBatchEntry {
                        question_number: Some(3),
                        content: Some("second".to_string()),
                    },
                    FeedbackBatchEntry {
                        question_number: Some(77),
                        content: Some("nowhere".to_string()),
                    },
                ],
            },
        )
        .unwrap();
    assert_eq!(ack.attached.len(), 2);
    assert_eq!(ack.skipped.len(), 2);
    assert_eq!(ack.skipped[1].question_number, Some(77));

    let listed = fx
        .service
        .list_feedback(
            &user(),
            &ListFeedbackRequest {
                system_id: Some(fx.system.0),
                question_number: None,
            },
        )
        .unwrap();
    assert_eq!(listed.len(), 2);
    assert_eq!(listed[0].content, "second");
    assert_eq!(listed[0].question_number, 3);
    assert_eq!(listed[0].battery, Battery::Quantitative);

    let filtered = fx
        .service
        .list_feedback(
            &user(),
            &ListFeedbackRequest {
                system_id: Some(fx.system.0),
                question_number: Some(1),
            },
        )
        .unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].expert_id, EXPERT);
}
