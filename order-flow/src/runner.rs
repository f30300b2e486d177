use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::draft::UserProfile;
use crate::error::Result;
use crate::event::Event;
use crate::flow::{FlowEngine, StepAction, StepResult};
use crate::notify::NotificationSink;
use crate::render::RenderDirective;
use crate::store::SessionStore;

/// Drives one event through one user's session: load the draft, take its
/// lock, run the engine, persist the outcome.
///
/// The session lock is held only across the synchronous engine step, never
/// across notification delivery, so a slow operator chat cannot stall the
/// user's next tap. Concurrent events from the same user queue on the lock
/// and are applied one at a time in arrival order.
pub struct DialogueRunner {
    engine: FlowEngine,
    store: Arc<dyn SessionStore>,
    sink: Arc<dyn NotificationSink>,
}

impl DialogueRunner {
    pub fn new(
        engine: FlowEngine,
        store: Arc<dyn SessionStore>,
        sink: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            engine,
            store,
            sink,
        }
    }

    /// Applies `event` to the user's session and returns what to show, if
    /// anything. Never fails on user input alone: bad input is answered with
    /// a screen, and only storage trouble surfaces as an error.
    pub async fn handle(
        &self,
        profile: &UserProfile,
        event: Event,
    ) -> Result<Option<RenderDirective>> {
        match event {
            Event::Start => {
                let handle = self.store.create(profile).await?;
                let mut draft = handle.lock().await;
                let step = self.engine.step(&mut draft, &Event::Start)?;
                draft.touch();
                info!(user_id = %profile.id, "dialogue started");
                Ok(step.directive)
            }
            Event::Cancel => {
                let existed = self.store.remove(&profile.id).await?;
                info!(user_id = %profile.id, existed, "dialogue cancelled");
                Ok(Some(FlowEngine::cancelled_screen()))
            }
            event => {
                let Some(handle) = self.store.get(&profile.id).await? else {
                    debug!(user_id = %profile.id, "event for unknown session");
                    return Ok(Some(FlowEngine::missing_session_screen()));
                };

                let outcome = {
                    let mut draft = handle.lock().await;
                    // Names and usernames change between messages; the draft
                    // keeps whatever the transport reported last.
                    draft.profile = profile.clone();
                    let outcome = self.engine.step(&mut draft, &event);
                    draft.touch();
                    outcome
                };

                match outcome {
                    Ok(step) => self.settle(profile, step).await,
                    Err(err) => {
                        warn!(user_id = %profile.id, error = %err, "discarding broken session");
                        self.store.remove(&profile.id).await?;
                        Ok(Some(FlowEngine::session_error_screen()))
                    }
                }
            }
        }
    }

    async fn settle(
        &self,
        profile: &UserProfile,
        step: StepResult,
    ) -> Result<Option<RenderDirective>> {
        match step.action {
            StepAction::WaitForInput => Ok(step.directive),
            StepAction::Discard => {
                self.store.remove(&profile.id).await?;
                Ok(step.directive)
            }
            StepAction::Complete(record) => {
                self.store.remove(&profile.id).await?;
                info!(user_id = %profile.id, product = %record.product, "order confirmed");
                if let Err(err) = self.sink.deliver(&record).await {
                    // The user's confirmation already went out; keep the full
                    // order in the log so it can be re-sent by hand.
                    error!(
                        user_id = %profile.id,
                        error = %err,
                        order = %record.operator_message(),
                        "operator notification failed"
                    );
                }
                Ok(step.directive)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    use crate::catalog::Catalog;
    use crate::draft::FlowState;
    use crate::error::FlowError;
    use crate::event::Selection;
    use crate::order::OrderRecord;
    use crate::store::InMemorySessionStore;

    struct RecordingSink {
        delivered: Mutex<Vec<OrderRecord>>,
    }

    impl RecordingSink {
        fn new() -> Self {
            Self {
                delivered: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl NotificationSink for RecordingSink {
        async fn deliver(&self, record: &OrderRecord) -> Result<()> {
            self.delivered.lock().unwrap().push(record.clone());
            Ok(())
        }
    }

    struct FailingSink;

    #[async_trait::async_trait]
    impl NotificationSink for FailingSink {
        async fn deliver(&self, _record: &OrderRecord) -> Result<()> {
            Err(FlowError::Notification("chat unreachable".to_string()))
        }
    }

    fn profile() -> UserProfile {
        UserProfile::new("42", "Анна Иванова").with_username("anna")
    }

    fn runner_with(sink: Arc<dyn NotificationSink>) -> (DialogueRunner, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let engine = FlowEngine::new(Arc::new(Catalog::standard("missing-photos")));
        let runner = DialogueRunner::new(engine, store.clone(), sink);
        (runner, store)
    }

    fn tap(data: &str) -> Event {
        Event::Select(Selection::parse(data).expect("known token"))
    }

    fn typed(text: &str) -> Event {
        Event::Text(text.to_string())
    }

    fn set_order_walk() -> Vec<Event> {
        vec![
            Event::Start,
            tap("category_sets"),
            tap("item_s4"),
            tap("setfill_spicy-lacritsaS"),
            tap("ribbons_ferrari"),
            typed("700"),
            tap("confirm_final"),
        ]
    }

    async fn run_all(
        runner: &DialogueRunner,
        profile: &UserProfile,
        events: Vec<Event>,
    ) -> Option<RenderDirective> {
        let mut last = None;
        for event in events {
            last = runner.handle(profile, event).await.expect("handle");
        }
        last
    }

    #[tokio::test]
    async fn confirmed_order_reaches_the_sink_and_ends_the_session() {
        let sink = Arc::new(RecordingSink::new());
        let (runner, store) = runner_with(sink.clone());
        let profile = profile();

        let last = run_all(&runner, &profile, set_order_walk()).await;
        assert_eq!(
            last.expect("accepted notice").text,
            "✅ Ваш заказ принят!\nМенеджер свяжется с вами в ближайшее время."
        );
        assert_eq!(store.active_count().await, 0);

        let delivered = sink.delivered.lock().unwrap();
        assert_eq!(delivered.len(), 1);
        assert_eq!(
            delivered[0].product,
            "Набор 'Самый смелый' с добавлением острого мармелада🔥"
        );
        assert_eq!(delivered[0].user.username.as_deref(), Some("anna"));
    }

    #[tokio::test]
    async fn sink_failure_does_not_take_back_the_confirmation() {
        let (runner, store) = runner_with(Arc::new(FailingSink));
        let profile = profile();

        let last = run_all(&runner, &profile, set_order_walk()).await;
        assert!(last.expect("accepted notice").text.starts_with("✅ Ваш заказ принят!"));
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn event_without_a_session_points_back_to_start() {
        let (runner, store) = runner_with(Arc::new(RecordingSink::new()));
        let profile = profile();

        let reply = runner
            .handle(&profile, tap("category_bouquets"))
            .await
            .unwrap();
        assert_eq!(
            reply.expect("hint").text,
            "Чтобы начать заново, отправьте команду /start."
        );
        assert_eq!(store.active_count().await, 0);

        let reply = runner.handle(&profile, typed("1500")).await.unwrap();
        assert!(reply.is_some());
    }

    #[tokio::test]
    async fn cancel_without_a_session_still_answers() {
        let (runner, _store) = runner_with(Arc::new(RecordingSink::new()));
        let reply = runner.handle(&profile(), Event::Cancel).await.unwrap();
        assert_eq!(
            reply.expect("notice").text,
            "Заказ отменён. Отправьте /start, чтобы начать заново."
        );
    }

    #[tokio::test]
    async fn cancel_removes_the_active_session() {
        let (runner, store) = runner_with(Arc::new(RecordingSink::new()));
        let profile = profile();

        run_all(
            &runner,
            &profile,
            vec![Event::Start, tap("category_bouquets")],
        )
        .await;
        assert_eq!(store.active_count().await, 1);

        runner.handle(&profile, Event::Cancel).await.unwrap();
        assert_eq!(store.active_count().await, 0);

        // Taps after cancellation meet a missing session.
        let reply = runner.handle(&profile, tap("item_b1")).await.unwrap();
        assert_eq!(
            reply.expect("hint").text,
            "Чтобы начать заново, отправьте команду /start."
        );
    }

    #[tokio::test]
    async fn restart_at_confirmation_leaves_no_residue() {
        let sink = Arc::new(RecordingSink::new());
        let (runner, store) = runner_with(sink.clone());
        let profile = profile();

        let mut walk = set_order_walk();
        walk.pop();
        run_all(&runner, &profile, walk).await;

        runner.handle(&profile, tap("restart")).await.unwrap();
        assert_eq!(store.active_count().await, 0);
        assert!(sink.delivered.lock().unwrap().is_empty());

        runner.handle(&profile, Event::Start).await.unwrap();
        let handle = store.get("42").await.unwrap().expect("fresh session");
        let draft = handle.lock().await;
        assert_eq!(draft.state, FlowState::ChoosingFamily);
        assert!(draft.family.is_none());
        assert!(draft.price.is_none());
    }

    #[tokio::test]
    async fn start_replaces_an_existing_session() {
        let (runner, store) = runner_with(Arc::new(RecordingSink::new()));
        let profile = profile();

        run_all(
            &runner,
            &profile,
            vec![Event::Start, tap("category_bouquets"), Event::Start],
        )
        .await;

        let handle = store.get("42").await.unwrap().expect("session");
        assert_eq!(handle.lock().await.state, FlowState::ChoosingFamily);
        assert_eq!(store.active_count().await, 1);
    }

    #[tokio::test]
    async fn broken_session_is_discarded_with_an_apology() {
        let (runner, store) = runner_with(Arc::new(RecordingSink::new()));
        let profile = profile();

        let handle = store.create(&profile).await.unwrap();
        handle.lock().await.state = FlowState::Confirming;

        let reply = runner.handle(&profile, tap("confirm_final")).await.unwrap();
        assert_eq!(reply.expect("apology").text, "Ошибка. Начните с /start.");
        assert_eq!(store.active_count().await, 0);
    }

    #[tokio::test]
    async fn ignored_events_produce_no_reply_and_keep_the_session() {
        let (runner, store) = runner_with(Arc::new(RecordingSink::new()));
        let profile = profile();

        run_all(&runner, &profile, vec![Event::Start]).await;
        let reply = runner.handle(&profile, typed("привет")).await.unwrap();
        assert!(reply.is_none());
        assert_eq!(store.active_count().await, 1);
    }
}
