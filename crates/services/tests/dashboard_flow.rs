//! Account, catalog, and proctor flows against the in-memory API.

use std::time::Duration;

use exam_core::model::{
    Credentials, DraftError, ExamDraft, NewUser, QuestionDraft, Role,
};
use exam_core::time::fixed_clock;
use services::{ActivityKind, AppServices, AuthError, ProctorError};

fn student() -> NewUser {
    NewUser {
        name: "Ada".into(),
        email: "ada@example.com".into(),
        password: "pw".into(),
        role: Role::Student,
    }
}

fn quiz_draft() -> ExamDraft {
    ExamDraft {
        name: "Quiz".into(),
        description: Some("two questions".into()),
        duration_minutes: 5,
        questions: vec![
            QuestionDraft {
                text: "pick a".into(),
                options: vec!["a".into(), "b".into()],
                correct_answer: 0,
            },
            QuestionDraft {
                text: "pick b".into(),
                options: vec!["a".into(), "b".into()],
                correct_answer: 1,
            },
        ],
    }
}

#[tokio::test]
async fn register_then_login_then_logout() {
    let (services, _fake) = AppServices::in_memory(fixed_clock());
    let auth = services.auth();

    auth.register(&student()).await.unwrap();
    assert!(auth.current_user().is_none(), "registration does not sign in");

    let err = auth
        .login(&Credentials {
            email: "ada@example.com".into(),
            password: "wrong".into(),
        })
        .await
        .unwrap_err();
    assert!(matches!(err, AuthError::InvalidCredentials));

    let user = auth
        .login(&Credentials {
            email: "ada@example.com".into(),
            password: "pw".into(),
        })
        .await
        .unwrap();
    assert_eq!(user.name, "Ada");
    assert_eq!(user.role, Role::Student);
    assert_eq!(auth.current_user().map(|u| u.email), Some("ada@example.com".into()));

    assert_eq!(auth.verify().await.unwrap().email, "ada@example.com");

    auth.logout();
    assert!(auth.current_user().is_none());
    assert!(matches!(
        auth.verify().await.unwrap_err(),
        AuthError::NotLoggedIn
    ));
}

#[tokio::test]
async fn invalid_draft_never_reaches_the_backend() {
    let (services, fake) = AppServices::in_memory(fixed_clock());
    let mut draft = quiz_draft();
    draft.questions.clear();

    let err = services.proctor().create_exam(&draft).await.unwrap_err();
    assert!(matches!(err, ProctorError::Draft(DraftError::NoQuestions)));
    assert!(fake.submissions().is_empty());
    assert!(services.proctor().list_exams().await.unwrap().is_empty());
}

#[tokio::test]
async fn deactivated_exams_disappear_from_the_student_catalog() {
    let (services, _fake) = AppServices::in_memory(fixed_clock());
    let id = services.proctor().create_exam(&quiz_draft()).await.unwrap();

    let available = services.catalog().available_exams().await.unwrap();
    assert_eq!(available.len(), 1);
    assert_eq!(available[0].question_count, 2);

    services.proctor().set_exam_active(&id, false).await.unwrap();
    assert!(services.catalog().available_exams().await.unwrap().is_empty());

    // still visible on the admin side
    let listed = services.proctor().list_exams().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert!(!listed[0].active);

    services.proctor().set_exam_active(&id, true).await.unwrap();
    assert_eq!(services.catalog().available_exams().await.unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn full_attempt_shows_up_in_completed_and_on_the_proctor_board() {
    let (services, fake) = AppServices::in_memory(fixed_clock());
    let auth = services.auth();
    auth.register(&student()).await.unwrap();
    auth.login(&Credentials {
        email: "ada@example.com".into(),
        password: "pw".into(),
    })
    .await
    .unwrap();

    let id = services.proctor().create_exam(&quiz_draft()).await.unwrap();
    let (runtime, _events) = services.start_exam(id.clone()).await.unwrap();

    let questions = runtime.questions();
    runtime.select_answer(&questions[0].id, 0).unwrap();
    runtime.select_answer(&questions[1].id, 0).unwrap();
    runtime.report_activity(ActivityKind::TabSwitch).await;

    // one heartbeat lands on the proctor board
    tokio::time::advance(Duration::from_secs(10)).await;
    for _ in 0..8 {
        tokio::task::yield_now().await;
    }
    let board = services.proctor().active_students(&id).await.unwrap();
    assert_eq!(board.len(), 1);
    assert_eq!(board[0].student_name, "Ada");
    assert_eq!(board[0].warning_count, 1);
    assert!(board[0].time_left_seconds < 300);

    let receipt = runtime.submit().await.unwrap();
    assert!((receipt.score - 50.0).abs() < f64::EPSILON);

    let completed = services.catalog().completed_exams().await.unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].exam_id, id);
    assert!(!completed[0].forced_submission);
    assert!((completed[0].score - 50.0).abs() < f64::EPSILON);

    assert!(services.catalog().available_exams().await.unwrap().is_empty());
    assert_eq!(fake.submissions().len(), 1);
}
