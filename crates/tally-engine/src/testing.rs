//! Courseware fixtures shared by the engine's tests.

use tally_core::{
  courseware::{CoursewareElement, Deployment, LearnerPathway, PathwayConfig},
  evaluation::EvaluationContext,
};
use tally_store_sqlite::SqliteStore;
use uuid::Uuid;

pub(crate) async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

/// A published course and one student taking it.
///
/// `with_pathway` builds `root → pathway → screens`. `nested` additionally
/// places a lesson activity after the first screen, holding its own linear
/// pathway with a single screen:
///
/// ```text
/// root ─ pathway ┬ screens[0]
///                └ lesson ─ inner_pathway ─ inner_screen
/// ```
pub(crate) struct Course {
  pub deployment:    Deployment,
  pub student:       Uuid,
  pub root:          Uuid,
  pub pathway:       Uuid,
  pub screens:       Vec<Uuid>,
  pub lesson:        Uuid,
  pub inner_pathway: Uuid,
  pub inner_screen:  Uuid,
}

impl Course {
  pub async fn with_pathway(
    s: &SqliteStore,
    config: PathwayConfig,
    screen_count: usize,
  ) -> Self {
    let root = Uuid::new_v4();
    let deployment = Deployment {
      deployment_id:    Uuid::new_v4(),
      change_id:        Uuid::new_v4(),
      root_activity_id: root,
      cohort_id:        Uuid::new_v4(),
    };
    let dep = deployment.deployment_id;
    let pathway = Uuid::new_v4();

    s.insert_activity(dep, root, None).await.unwrap();
    s.insert_pathway(dep, &LearnerPathway { pathway_id: pathway, config }, root)
      .await
      .unwrap();

    let mut screens = Vec::with_capacity(screen_count);
    for _ in 0..screen_count {
      let screen = Uuid::new_v4();
      s.insert_interactive(dep, screen, pathway).await.unwrap();
      screens.push(screen);
    }

    Self {
      deployment,
      student: Uuid::new_v4(),
      root,
      pathway,
      screens,
      lesson: Uuid::nil(),
      inner_pathway: Uuid::nil(),
      inner_screen: Uuid::nil(),
    }
  }

  pub async fn linear(s: &SqliteStore, screen_count: usize) -> Self {
    Self::with_pathway(s, PathwayConfig::Linear, screen_count).await
  }

  pub async fn nested(s: &SqliteStore) -> Self {
    let mut course = Self::linear(s, 1).await;
    let dep = course.deployment.deployment_id;
    let (lesson, inner_pathway, inner_screen) =
      (Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4());

    s.insert_activity(dep, lesson, Some(course.pathway)).await.unwrap();
    s.insert_pathway(
      dep,
      &LearnerPathway { pathway_id: inner_pathway, config: PathwayConfig::Linear },
      lesson,
    )
    .await
    .unwrap();
    s.insert_interactive(dep, inner_screen, inner_pathway).await.unwrap();

    course.lesson = lesson;
    course.inner_pathway = inner_pathway;
    course.inner_screen = inner_screen;
    course
  }

  /// An evaluation of `element` by this course's student.
  pub fn context(&self, element: CoursewareElement) -> EvaluationContext {
    EvaluationContext {
      deployment: self.deployment,
      student_id: self.student,
      evaluation_id: Uuid::new_v4(),
      element,
    }
  }
}
