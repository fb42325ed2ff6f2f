//! Shared fixture for the integration suites: an on-disk store seeded with a
//! small catalog, one registered system, one user and one expert.

#![allow(dead_code)]

use privacy_diagnosis::catalog::{CatalogSeed, QualitativeSeed, QuantitativeSeed};
use privacy_diagnosis::models::{QualitativePoints, QuantitativePoints};
use privacy_diagnosis::service::requests::{
    ResponseEntry, SaveIntakeRequest, SubmitResponsesRequest, SystemRequest,
};
use privacy_diagnosis::{
    Actor, AssessmentResult, DiagnosisService, EngineConfig, ExpertId, ResponseCategory, Store, SystemId, UserId,
};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

pub const USER: UserId = UserId(7);
pub const OTHER_USER: UserId = UserId(8);
pub const EXPERT: ExpertId = ExpertId(900);

pub fn user() -> Actor {
    Actor::User(USER)
}

pub fn expert() -> Actor {
    Actor::Expert(EXPERT)
}

pub fn standard_points() -> QuantitativePoints {
    QuantitativePoints {
        fulfilled: 10.0,
        unfulfilled: 0.0,
        consult: 3.0,
        not_applicable: 1.0,
    }
}

/// Two categories: "Collection" (questions 1, 2) and "Disposal" (question 3).
/// "Retention" has no questions. Qualitative questions 1 and 2.
pub fn seed() -> CatalogSeed {
    let quantitative = |number: u32, category: &str| QuantitativeSeed {
        question_number: number,
        question: format!("Quantitative question {}", number),
        category: Some(category.to_string()),
        points: standard_points(),
    };
    let qualitative = |number: u32| QualitativeSeed {
        question_number: number,
        indicator: format!("Indicator {}", number),
        indicator_definition: Some(format!("Definition of indicator {}", number)),
        points: QualitativePoints {
            consult: 2.0,
            not_applicable: 1.0,
        },
    };

    CatalogSeed {
        categories: vec![
            "Collection".to_string(),
            "Disposal".to_string(),
            "Retention".to_string(),
        ],
        quantitative: vec![
            quantitative(1, "Collection"),
            quantitative(2, "Collection"),
            quantitative(3, "Disposal"),
        ],
        qualitative: vec![qualitative(1), qualitative(2)],
    }
}

pub struct Fixture {
    pub service: DiagnosisService,
    pub system: SystemId,
    _temp_dir: TempDir,
}

impl Fixture {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config = EngineConfig {
            database_path: temp_dir.path().join("diagnosis.db"),
            log_dir: temp_dir.path().join("logs"),
            ..EngineConfig::default()
        };
        let store = Store::open(&config.database_path, Duration::from_secs(5))
            .expect("Failed to open store");
        let service = DiagnosisService::new(Arc::new(store), config);
        service.import_catalog(&seed()).expect("Failed to import catalog");

        let system = service
            .register_system(
                &user(),
                &privacy_diagnosis::service::requests::RegisterSystemRequest {
                    name: Some("Member database".to_string()),
                },
            )
            .expect("Failed to register system")
            .id;

        Fixture {
            service,
            system,
            _temp_dir: temp_dir,
        }
    }

    pub fn system_request(&self) -> SystemRequest {
        SystemRequest::new(self.system)
    }

    pub fn save_intake(&self, actor: &Actor) {
        self.service
            .save_intake(
                actor,
                &SaveIntakeRequest {
                    system_id: Some(self.system.0),
                    organization: Some("Acme Corp".to_string()),
                    user_scale: Some("under 100".to_string()),
                    personal_info_system: Some(true),
                    ..SaveIntakeRequest::default()
                },
            )
            .expect("Failed to save intake");
    }

    /// Save an intake if needed and commit the actor's open round
    pub fn commit_round(&self, actor: &Actor) -> AssessmentResult {
        self.save_intake(actor);
        self.service
            .complete_round(actor, &self.system_request())
            .expect("Failed to complete round")
    }

    pub fn submission(&self, round: u32, answers: &[(u32, ResponseCategory)]) -> SubmitResponsesRequest {
        SubmitResponsesRequest {
            system_id: Some(self.system.0),
            round: Some(round),
            responses: answers
                .iter()
                .map(|(number, category)| entry(*number, *category))
                .collect(),
        }
    }
}

pub fn entry(number: u32, category: ResponseCategory) -> ResponseEntry {
    ResponseEntry {
        question_number: Some(number),
        category: Some(category),
        comment: None,
        attachment: None,
    }
}
