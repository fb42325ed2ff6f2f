//! Category gap analysis tests

mod common;

use common::{user, Fixture};
use privacy_diagnosis::{Actor, Battery, DiagnosisError, ResponseCategory, UserId};

#[test]
fn test_no_answers_means_no_diagnosis() {
    let fx = Fixture::new();
    let comparison = fx
        .service
        .compare_categories(&user(), &fx.system_request())
        .unwrap();
    assert!(!comparison.has_diagnosis);
    assert!(comparison.data.is_none());
}

#[test]
fn test_qualitative_answers_alone_do_not_count() {
    let fx = Fixture::new();
    fx.service
        .submit_responses(
            &user(),
            Battery::Qualitative,
            &fx.submission(1, &[(1, ResponseCategory::ConsultNeeded)]),
        )
        .unwrap();
    let comparison = fx
        .service
        .compare_categories(&user(), &fx.system_request())
        .unwrap();
    assert!(!comparison.has_diagnosis);
}

#[test]
fn test_weakest_category_first_and_zero_max_last() {
    let fx = Fixture::new();
    fx.service
        .submit_responses(
            &user(),
            Battery::Quantitative,
            &fx.submission(
                1,
                &[
                    (1, ResponseCategory::Fulfilled),
                    (2, ResponseCategory::ConsultNeeded),
                    (3, ResponseCategory::Unfulfilled),
                ],
            ),
        )
        .unwrap();

    let comparison = fx
        .service
        .compare_categories(&user(), &fx.system_request())
        .unwrap();
    assert!(comparison.has_diagnosis);
    assert_eq!(comparison.round, Some(1));

    let data = comparison.data.unwrap();
    let names: Vec<&str> = data.iter().map(|g| g.category.as_str()).collect();
    assert_eq!(names, vec!["Disposal", "Collection", "Retention"]);

    assert_eq!(data[0].percentage, Some(0.0));
    assert_eq!(data[1].achieved, 13.0);
    assert_eq!(data[1].maximum, 20.0);
    assert_eq!(data[1].percentage, Some(65.0));
    assert_eq!(data[2].maximum, 0.0);
    assert_eq!(data[2].percentage, None);
}

#[test]
fn test_uses_latest_round_only() {
    let fx = Fixture::new();
    fx.service
        .submit_responses(
            &user(),
            Battery::Quantitative,
            &fx.submission(1, &[(3, ResponseCategory::Unfulfilled)]),
        )
        .unwrap();
    fx.commit_round(&user());
    fx.service
        .submit_responses(
            &user(),
            Battery::Quantitative,
            &fx.submission(2, &[(3, ResponseCategory::Fulfilled)]),
        )
        .unwrap();

    let comparison = fx
        .service
        .compare_categories(&user(), &fx.system_request())
        .unwrap();
    assert_eq!(comparison.round, Some(2));
    let disposal = comparison
        .data
        .unwrap()
        .into_iter()
        .find(|g| g.category == "Disposal")
        .unwrap();
    assert_eq!(disposal.percentage, Some(100.0));
}

#[test]
fn test_other_users_answers_ignored() {
    let fx = Fixture::new();
    fx.service
        .submit_responses(
            &Actor::User(UserId(55)),
            Battery::Quantitative,
            &fx.submission(1, &[(1, ResponseCategory::Fulfilled)]),
        )
        .unwrap();
    let comparison = fx
        .service
        .compare_categories(&user(), &fx.system_request())
        .unwrap();
    assert!(!comparison.has_diagnosis);
}

#[test]
fn test_unknown_system() {
    let fx = Fixture::new();
    let mut request = fx.system_request();
    request.system_id = Some(fx.system.0 + 1);
    assert!(matches!(
        fx.service.compare_categories(&user(), &request),
        Err(DiagnosisError::NotFound(_))
    ));
}
