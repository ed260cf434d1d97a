//! In-process event publishing over a tokio broadcast channel.

use std::convert::Infallible;

use tally_core::event::{EventPublisher, LearnerEvent};
use tokio::sync::broadcast;

/// Fans learner events out to any number of live subscribers.
///
/// Events published while nobody is subscribed are dropped, and a
/// subscriber that falls more than `capacity` events behind skips ahead.
#[derive(Debug, Clone)]
pub struct BroadcastPublisher {
  tx: broadcast::Sender<LearnerEvent>,
}

impl BroadcastPublisher {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<LearnerEvent> { self.tx.subscribe() }
}

impl EventPublisher for BroadcastPublisher {
  type Error = Infallible;

  async fn publish(&self, event: LearnerEvent) -> Result<(), Infallible> {
    // No receivers is not an error.
    let _ = self.tx.send(event);
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use tally_core::score::Score;
  use uuid::Uuid;

  use super::*;

  fn passback() -> LearnerEvent {
    LearnerEvent::GradePassback {
      deployment_id: Uuid::new_v4(),
      student_id:    Uuid::new_v4(),
      element_id:    Uuid::new_v4(),
      score:         Score::NOT_ATTEMPTED,
      completion:    None,
    }
  }

  #[tokio::test]
  async fn subscribers_receive_published_events() {
    let publisher = BroadcastPublisher::new(8);
    let mut rx = publisher.subscribe();

    let event = passback();
    publisher.publish(event.clone()).await.unwrap();
    assert_eq!(rx.recv().await.unwrap(), event);
  }

  #[tokio::test]
  async fn publishing_without_subscribers_succeeds() {
    let publisher = BroadcastPublisher::new(8);
    publisher.publish(passback()).await.unwrap();
  }
}
