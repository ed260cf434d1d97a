//! End-to-end evaluation handling against an in-memory store.

use std::sync::Arc;

use tally_core::{
  courseware::{
    BktConfig,
    CoursewareElement,
    CoursewareElementType,
    DocumentItemRef,
    PathwayConfig,
  },
  evaluation::{
    ChangeCompetencyMetAction,
    ChangeScoreAction,
    Correctness,
    GradePassbackAction,
    ProgressAction,
    ScenarioEvaluationResult,
    TriggeredAction,
  },
  event::LearnerEvent,
  progress::{Completion, ProgressionType},
  score::{MutationOperator, ScoreReason},
  store::LearnerStore,
};
use tally_store_sqlite::SqliteStore;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::{
  Engine,
  EngineConfig,
  Error,
  publish::BroadcastPublisher,
  testing::{Course, store},
};

type TestEngine = Engine<SqliteStore, BroadcastPublisher>;

async fn engine() -> (TestEngine, broadcast::Receiver<LearnerEvent>) {
  let publisher = BroadcastPublisher::new(64);
  let rx = publisher.subscribe();
  let engine = Engine::new(
    Arc::new(store().await),
    Arc::new(publisher),
    EngineConfig::default(),
  );
  (engine, rx)
}

fn result(correctness: Correctness, actions: Vec<TriggeredAction>) -> ScenarioEvaluationResult {
  ScenarioEvaluationResult {
    scenario_id: Some(Uuid::new_v4()),
    correctness,
    triggered_actions: actions,
    evaluation_result: true,
  }
}

fn progress(progression: ProgressionType) -> TriggeredAction {
  TriggeredAction::ChangeProgress(ProgressAction { progression })
}

fn drain(rx: &mut broadcast::Receiver<LearnerEvent>) -> Vec<LearnerEvent> {
  std::iter::from_fn(|| rx.try_recv().ok()).collect()
}

// ─── Progress ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn completing_a_screen_propagates_to_the_root() {
  let (engine, mut rx) = engine().await;
  let course = Course::linear(engine.store(), 2).await;
  let ctx = course.context(CoursewareElement::interactive(course.screens[0]));

  let outcome = engine
    .handle_evaluation(&ctx, &result(Correctness::Correct, vec![progress(
      ProgressionType::Complete,
    )]))
    .await
    .unwrap();

  let levels: Vec<(Uuid, Completion)> = outcome
    .progress
    .iter()
    .map(|p| (p.courseware_element_id, p.completion))
    .collect();
  assert_eq!(levels, vec![
    (course.screens[0], Completion::COMPLETE),
    (course.pathway, Completion::new(0.5, 0.5)),
    (course.root, Completion::new(0.5, 0.5)),
  ]);

  // Each level was recorded against the attempt chain.
  assert_eq!(outcome.progress[0].attempt_id, outcome.attempt.id);
  assert_eq!(Some(outcome.progress[1].attempt_id), outcome.attempt.parent_id);

  let events = drain(&mut rx);
  assert_eq!(events.len(), 3);
  assert!(events.iter().all(|e| matches!(e, LearnerEvent::ProgressUpdated { .. })));
}

#[tokio::test]
async fn finishing_every_screen_completes_the_root() {
  let (engine, _rx) = engine().await;
  let course = Course::linear(engine.store(), 2).await;

  let mut last = None;
  for screen in &course.screens {
    let ctx = course.context(CoursewareElement::interactive(*screen));
    last = Some(
      engine
        .handle_evaluation(&ctx, &result(Correctness::Correct, vec![progress(
          ProgressionType::Complete,
        )]))
        .await
        .unwrap(),
    );
  }

  let root = engine
    .store()
    .find_latest_progress(course.deployment.deployment_id, course.root, course.student)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(root.completion, Completion::COMPLETE);
  assert_eq!(last.unwrap().progress.len(), 3);
}

#[tokio::test]
async fn unchanged_pathway_stops_propagation() {
  let (engine, _rx) = engine().await;
  let course = Course::linear(engine.store(), 2).await;
  let ctx = course.context(CoursewareElement::interactive(course.screens[0]));
  let complete = result(Correctness::Correct, vec![progress(ProgressionType::Complete)]);

  engine.handle_evaluation(&ctx, &complete).await.unwrap();
  let again = engine.handle_evaluation(&ctx, &complete).await.unwrap();

  let elements: Vec<Uuid> =
    again.progress.iter().map(|p| p.courseware_element_id).collect();
  assert_eq!(elements, vec![course.screens[0], course.pathway]);
}

#[tokio::test]
async fn repeat_starts_the_next_attempt() {
  let (engine, _rx) = engine().await;
  let course = Course::linear(engine.store(), 1).await;
  let ctx = course.context(CoursewareElement::interactive(course.screens[0]));

  let outcome = engine
    .handle_evaluation(&ctx, &result(Correctness::Incorrect, vec![progress(
      ProgressionType::Repeat,
    )]))
    .await
    .unwrap();

  assert_eq!(outcome.progress[0].completion, Completion::new(0.0, 0.5));
  let next = outcome.next_attempt.unwrap();
  assert_eq!(next.value, 2);
  assert_eq!(next.parent_id, outcome.attempt.parent_id);

  let latest = engine
    .attempts()
    .find_latest_attempt(course.deployment.deployment_id, course.screens[0], course.student)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(latest.id, next.id);
}

#[tokio::test]
async fn nested_lesson_rolls_through_its_activity() {
  let (engine, _rx) = engine().await;
  let course = Course::nested(engine.store()).await;
  let ctx = course.context(CoursewareElement::interactive(course.inner_screen));

  let outcome = engine
    .handle_evaluation(&ctx, &result(Correctness::Correct, vec![progress(
      ProgressionType::Complete,
    )]))
    .await
    .unwrap();

  let levels: Vec<(Uuid, f64)> = outcome
    .progress
    .iter()
    .map(|p| (p.courseware_element_id, p.completion.value))
    .collect();
  assert_eq!(levels, vec![
    (course.inner_screen, 1.0),
    (course.inner_pathway, 1.0),
    (course.lesson, 1.0),
    (course.pathway, 0.5),
    (course.root, 0.5),
  ]);
}

#[tokio::test]
async fn go_to_outside_graph_pathway_fails() {
  let (engine, _rx) = engine().await;
  let course = Course::with_pathway(
    engine.store(),
    PathwayConfig::Graph { starting_walkable_id: None },
    2,
  )
  .await;
  let ctx = course.context(CoursewareElement::interactive(course.screens[0]));

  let err = engine
    .handle_evaluation(&ctx, &result(Correctness::Correct, vec![progress(
      ProgressionType::CompleteAndGoTo { walkable_id: Uuid::new_v4() },
    )]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidArgument(_)));
  assert!(!err.is_retryable());

  for element in [course.screens[0], course.pathway, course.root] {
    let latest = engine
      .store()
      .find_latest_progress(course.deployment.deployment_id, element, course.student)
      .await
      .unwrap();
    assert!(latest.is_none());
  }
  let attempt = engine
    .attempts()
    .find_latest_attempt(course.deployment.deployment_id, course.screens[0], course.student)
    .await
    .unwrap();
  assert!(attempt.is_none());
}

#[tokio::test]
async fn bkt_mastery_awards_competency() {
  let (engine, mut rx) = engine().await;
  let (document, item) = (Uuid::new_v4(), Uuid::new_v4());
  engine
    .store()
    .insert_document(document, Uuid::new_v4())
    .await
    .unwrap();
  let config = BktConfig {
    p_l0:              0.5,
    p_guess:           0.2,
    p_slip:            0.2,
    p_transit:         0.3,
    exit_after:        0,
    maintain_for:      1,
    mastery_threshold: 0.85,
    competency:        vec![DocumentItemRef { document_id: document, document_item_id: item }],
  };
  let course = Course::with_pathway(engine.store(), PathwayConfig::Bkt(config), 3).await;
  let ctx = course.context(CoursewareElement::interactive(course.screens[0]));

  let outcome = engine
    .handle_evaluation(&ctx, &result(Correctness::Correct, vec![progress(
      ProgressionType::Complete,
    )]))
    .await
    .unwrap();

  assert_eq!(outcome.progress[1].completion, Completion::COMPLETE);
  assert_eq!(outcome.competency.len(), 1);
  let award = &outcome.competency[0];
  assert_eq!(award.document_item_id, item);
  assert!((award.value - 0.716).abs() < 1e-6);
  assert_eq!(award.courseware_element_id, course.pathway);

  let events = drain(&mut rx);
  assert!(events.iter().any(|e| matches!(e, LearnerEvent::CompetencyUpdated { .. })));
}

// ─── Scores ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn score_action_rolls_up_and_publishes() {
  let (engine, mut rx) = engine().await;
  let course = Course::linear(engine.store(), 1).await;
  let screen = CoursewareElement::interactive(course.screens[0]);
  let ctx = course.context(screen);

  let outcome = engine
    .handle_evaluation(&ctx, &result(Correctness::Correct, vec![
      TriggeredAction::ChangeScore(ChangeScoreAction {
        element:  screen,
        operator: MutationOperator::Add,
        value:    3.0,
      }),
    ]))
    .await
    .unwrap();

  let elements: Vec<Uuid> = outcome.score_entries.iter().map(|e| e.element_id).collect();
  assert_eq!(elements, vec![course.screens[0], course.pathway, course.root]);
  assert_eq!(outcome.score_entries[0].attempt_id, outcome.attempt.id);

  let root = engine
    .scores()
    .compute_score(course.deployment.deployment_id, course.student, course.root, None)
    .await
    .unwrap();
  assert_eq!(root.value, 3.0);

  let scored: Vec<f64> = drain(&mut rx)
    .into_iter()
    .filter_map(|e| match e {
      LearnerEvent::ScoreUpdated { score, .. } => Some(score.value),
      _ => None,
    })
    .collect();
  assert_eq!(scored, vec![3.0, 3.0, 3.0]);
}

#[tokio::test]
async fn negative_set_rejects_the_whole_evaluation() {
  let (engine, _rx) = engine().await;
  let course = Course::linear(engine.store(), 1).await;
  let screen = CoursewareElement::interactive(course.screens[0]);
  let ctx = course.context(screen);

  let err = engine
    .handle_evaluation(&ctx, &result(Correctness::Correct, vec![
      progress(ProgressionType::Complete),
      TriggeredAction::ChangeScore(ChangeScoreAction {
        element:  screen,
        operator: MutationOperator::Set,
        value:    -2.0,
      }),
    ]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NegativeSetValue(v) if v == -2.0));

  // Validation runs before any attempt is created.
  let attempt = engine
    .attempts()
    .find_latest_attempt(course.deployment.deployment_id, course.screens[0], course.student)
    .await
    .unwrap();
  assert!(attempt.is_none());
}

// ─── Competency and grades ───────────────────────────────────────────────────

#[tokio::test]
async fn competency_action_propagates_to_parent_items() {
  let (engine, _rx) = engine().await;
  let course = Course::linear(engine.store(), 1).await;
  let (document, parent, child) = (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());
  let s = engine.store();
  s.insert_document(document, Uuid::new_v4()).await.unwrap();
  s.associate_items(document, child, parent).await.unwrap();
  s.associate_items(document, Uuid::new_v4(), parent).await.unwrap();

  let ctx = course.context(CoursewareElement::interactive(course.screens[0]));
  let outcome = engine
    .handle_evaluation(&ctx, &result(Correctness::Correct, vec![
      TriggeredAction::ChangeCompetency(ChangeCompetencyMetAction {
        document_id:      document,
        document_item_id: child,
        operator:         MutationOperator::Add,
        value:            0.8,
      }),
    ]))
    .await
    .unwrap();

  let values: Vec<(Uuid, f64)> = outcome
    .competency
    .iter()
    .map(|m| (m.document_item_id, m.value))
    .collect();
  assert_eq!(values, vec![(child, 0.8), (parent, 0.4)]);
  assert!(outcome.competency.iter().all(|m| m.attempt_id == outcome.attempt.id));
}

#[tokio::test]
async fn grade_passback_reports_the_root() {
  let (engine, mut rx) = engine().await;
  let course = Course::linear(engine.store(), 1).await;
  let screen = CoursewareElement::interactive(course.screens[0]);
  let ctx = course.context(screen);

  let outcome = engine
    .handle_evaluation(&ctx, &result(Correctness::Correct, vec![
      progress(ProgressionType::Complete),
      TriggeredAction::ChangeScore(ChangeScoreAction {
        element:  screen,
        operator: MutationOperator::Set,
        value:    10.0,
      }),
      TriggeredAction::GradePassback(GradePassbackAction::default()),
    ]))
    .await
    .unwrap();

  let grade = outcome.grades[0];
  assert_eq!(grade.element_id, course.root);
  assert_eq!(grade.score.value, 10.0);
  assert_eq!(grade.score.reason, ScoreReason::Scored);
  assert_eq!(grade.completion, Some(Completion::COMPLETE));

  let last = drain(&mut rx).pop().unwrap();
  assert!(matches!(last, LearnerEvent::GradePassback { element_id, .. } if element_id == course.root));
}

#[tokio::test]
async fn non_walkable_elements_cannot_be_evaluated() {
  let (engine, _rx) = engine().await;
  let course = Course::linear(engine.store(), 1).await;
  let ctx = course.context(CoursewareElement::new(
    course.pathway,
    CoursewareElementType::Pathway,
  ));

  let err = engine
    .handle_evaluation(&ctx, &result(Correctness::None, vec![]))
    .await
    .unwrap_err();
  assert!(matches!(err, Error::InvalidArgument(_)));
}
