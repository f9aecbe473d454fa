use std::time::Duration;

use parley_test_model::{PresetGeneration, ScriptedProvider};

use crate::Error;
use crate::conversation::{
    ConversationConfig, ConversationId, ConversationSnapshot, SpeakerRole,
};
use crate::events::{ConversationEvent, Viewer, ViewerId};
use crate::hub::{DialogueHub, DialogueHubBuilder, HealthStatus};

fn make_hub(provider: ScriptedProvider) -> DialogueHub {
    DialogueHubBuilder::with_generation_provider(provider)
        .with_turn_pause(Duration::from_millis(1))
        .build()
}

fn test_config() -> ConversationConfig {
    ConversationConfig {
        philosopher1: "socrates".into(),
        author1: "hemingway".into(),
        model1: "llama3.2:3b".into(),
        philosopher2: "nietzsche".into(),
        author2: "woolf".into(),
        model2: "mistral:7b".into(),
        topic: "the examined life".into(),
    }
}

async fn expect_snapshot(viewer: &mut Viewer) -> ConversationSnapshot {
    match viewer.recv().await.unwrap() {
        ConversationEvent::Snapshot { snapshot } => snapshot,
        other => panic!("expected snapshot, got {other:?}"),
    }
}

/// Drains one full turn from the viewer: a `generation_start`, any
/// number of fragments, then a `generation_complete` whose full text
/// must equal the concatenated fragments. Returns the full text.
async fn expect_turn(viewer: &mut Viewer, speaker: SpeakerRole) -> String {
    assert_eq!(
        viewer.recv().await.unwrap(),
        ConversationEvent::GenerationStart { speaker }
    );
    let mut text = String::new();
    loop {
        match viewer.recv().await.unwrap() {
            ConversationEvent::ContentFragment {
                speaker: from,
                text: fragment,
            } => {
                assert_eq!(from, speaker);
                text.push_str(&fragment);
            }
            ConversationEvent::GenerationComplete {
                speaker: from,
                full_text,
            } => {
                assert_eq!(from, speaker);
                assert_eq!(full_text, text);
                return full_text;
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }
}

async fn wait_for_turns(hub: &DialogueHub, id: ConversationId, count: usize) {
    loop {
        if hub.history(id).await.unwrap().history.len() >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
}

#[tokio::test]
async fn test_opening_round() {
    let provider = ScriptedProvider::default();
    provider.add_generation(PresetGeneration::with_fragments([
        "Courage ", "is rare.",
    ]));
    provider.add_generation(PresetGeneration::with_fragments(["Is ", "it?"]));

    let hub = make_hub(provider.clone());
    let id = hub.create(test_config()).unwrap();

    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    let snapshot = expect_snapshot(&mut viewer).await;
    assert!(snapshot.history.is_empty());
    assert_eq!(snapshot.exchange_count, 0);

    hub.start(id).await.unwrap();

    assert_eq!(
        expect_turn(&mut viewer, SpeakerRole::First).await,
        "Courage is rare."
    );
    assert_eq!(expect_turn(&mut viewer, SpeakerRole::Second).await, "Is it?");

    let history = hub.history(id).await.unwrap();
    assert_eq!(history.history.len(), 2);
    assert_eq!(history.history[0].role, SpeakerRole::First);
    assert_eq!(history.history[1].role, SpeakerRole::Second);
    assert_eq!(history.exchange_count, 1);

    // The first speaker introduces the topic, the second responds to
    // the first turn's text; each generates with its own model.
    let requests = provider.recorded_requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].model, "llama3.2:3b");
    assert!(requests[0].prompt.contains("\"the examined life\""));
    assert!(requests[0].prompt.contains("Pose a thoughtful question"));
    assert_eq!(requests[1].model, "mistral:7b");
    assert!(requests[1]
        .prompt
        .contains("Previous message: \"Courage is rare.\""));
}

#[tokio::test]
async fn test_start_is_accepted_only_once() {
    let provider = ScriptedProvider::default();
    provider.add_generation(PresetGeneration::with_fragments(["a"]));
    provider.add_generation(PresetGeneration::with_fragments(["b"]));

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();

    hub.start(id).await.unwrap();
    assert!(matches!(
        hub.start(id).await,
        Err(Error::AlreadyStarted(rejected)) if rejected == id
    ));
}

#[tokio::test]
async fn test_start_claims_conversation_even_when_opening_fails() {
    let provider = ScriptedProvider::default();
    provider.add_generation(PresetGeneration::failing_before_stream());

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();
    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    expect_snapshot(&mut viewer).await;

    hub.start(id).await.unwrap();
    assert_eq!(
        viewer.recv().await.unwrap(),
        ConversationEvent::GenerationStart {
            speaker: SpeakerRole::First
        }
    );
    assert!(matches!(
        viewer.recv().await.unwrap(),
        ConversationEvent::GenerationError { .. }
    ));

    // The opening round produced no turns, yet the first accepted
    // start claimed the conversation; a retry goes through continue.
    assert!(hub.history(id).await.unwrap().history.is_empty());
    assert!(matches!(
        hub.start(id).await,
        Err(Error::AlreadyStarted(rejected)) if rejected == id
    ));
}

#[tokio::test]
async fn test_continue_extends_dialogue() {
    let provider = ScriptedProvider::default();
    for text in ["one", "two", "three", "four"] {
        provider.add_generation(PresetGeneration::with_fragments([text]));
    }

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();
    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    expect_snapshot(&mut viewer).await;

    hub.start(id).await.unwrap();
    expect_turn(&mut viewer, SpeakerRole::First).await;
    expect_turn(&mut viewer, SpeakerRole::Second).await;

    hub.continue_conversation(id).unwrap();
    expect_turn(&mut viewer, SpeakerRole::First).await;
    expect_turn(&mut viewer, SpeakerRole::Second).await;

    let history = hub.history(id).await.unwrap();
    assert_eq!(history.history.len(), 4);
    assert_eq!(history.exchange_count, 2);
}

#[tokio::test]
async fn test_round_requested_while_busy_is_queued() {
    let provider = ScriptedProvider::default();
    for text in ["one", "two", "three", "four"] {
        provider.add_generation(PresetGeneration::with_fragments([text]));
    }

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();
    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    expect_snapshot(&mut viewer).await;

    hub.start(id).await.unwrap();
    // The opening round is still streaming; this request must not be
    // lost, nor interleave with the round in flight.
    hub.continue_conversation(id).unwrap();

    for expected in ["one", "two", "three", "four"] {
        let speaker = if expected == "one" || expected == "three" {
            SpeakerRole::First
        } else {
            SpeakerRole::Second
        };
        assert_eq!(expect_turn(&mut viewer, speaker).await, expected);
    }

    let history = hub.history(id).await.unwrap();
    assert_eq!(history.exchange_count, 2);
}

#[tokio::test]
async fn test_unknown_conversation_is_rejected() {
    let hub = make_hub(ScriptedProvider::default());
    let id = ConversationId::new();

    assert!(matches!(hub.start(id).await, Err(Error::NotFound(_))));
    assert!(matches!(
        hub.continue_conversation(id),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(hub.history(id).await, Err(Error::NotFound(_))));
    assert!(matches!(
        hub.join(ViewerId::new(), id, "observer"),
        Err(Error::NotFound(_))
    ));
    assert!(matches!(hub.close(id), Err(Error::NotFound(_))));
}

#[tokio::test]
async fn test_invalid_config_creates_nothing() {
    let hub = make_hub(ScriptedProvider::default());

    let mut config = test_config();
    config.topic = String::new();
    config.model2 = "   ".into();

    match hub.create(config) {
        Err(Error::Validation { missing }) => {
            assert_eq!(missing, "model2, topic");
        }
        other => panic!("unexpected result: {other:?}"),
    }
}

#[tokio::test]
async fn test_failed_generation_discards_turn() {
    let provider = ScriptedProvider::default();
    provider.add_generation(
        PresetGeneration::with_fragments(["doomed "]).failing_after(1),
    );
    provider.add_generation(PresetGeneration::with_fragments(["fresh"]));
    provider.add_generation(PresetGeneration::with_fragments(["start"]));

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();
    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    expect_snapshot(&mut viewer).await;

    hub.start(id).await.unwrap();
    // A round queued behind the failing one must still run.
    hub.continue_conversation(id).unwrap();

    assert_eq!(
        viewer.recv().await.unwrap(),
        ConversationEvent::GenerationStart {
            speaker: SpeakerRole::First
        }
    );
    assert_eq!(
        viewer.recv().await.unwrap(),
        ConversationEvent::ContentFragment {
            speaker: SpeakerRole::First,
            text: "doomed ".into(),
        }
    );
    assert!(matches!(
        viewer.recv().await.unwrap(),
        ConversationEvent::GenerationError { .. }
    ));

    // The queued round restarts from an empty history: the failed
    // text is gone and the speaker order resets to the first slot.
    assert_eq!(expect_turn(&mut viewer, SpeakerRole::First).await, "fresh");
    assert_eq!(expect_turn(&mut viewer, SpeakerRole::Second).await, "start");

    let history = hub.history(id).await.unwrap();
    assert_eq!(history.history.len(), 2);
    assert!(!history.history[0].content.contains("doomed"));
    assert_eq!(history.exchange_count, 1);
}

#[tokio::test]
async fn test_failure_before_stream() {
    let provider = ScriptedProvider::default();
    provider.add_generation(PresetGeneration::failing_before_stream());

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();
    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    expect_snapshot(&mut viewer).await;

    hub.start(id).await.unwrap();

    assert_eq!(
        viewer.recv().await.unwrap(),
        ConversationEvent::GenerationStart {
            speaker: SpeakerRole::First
        }
    );
    assert!(matches!(
        viewer.recv().await.unwrap(),
        ConversationEvent::GenerationError { .. }
    ));

    let history = hub.history(id).await.unwrap();
    assert!(history.history.is_empty());
    assert_eq!(history.exchange_count, 0);
}

#[tokio::test]
async fn test_empty_stream_yields_empty_turn() {
    let provider = ScriptedProvider::default();
    provider
        .add_generation(PresetGeneration::with_fragments(Vec::<String>::new()));
    provider
        .add_generation(PresetGeneration::with_fragments(Vec::<String>::new()));

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();
    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    expect_snapshot(&mut viewer).await;

    hub.start(id).await.unwrap();
    assert_eq!(expect_turn(&mut viewer, SpeakerRole::First).await, "");
    assert_eq!(expect_turn(&mut viewer, SpeakerRole::Second).await, "");

    let history = hub.history(id).await.unwrap();
    assert_eq!(history.history.len(), 2);
    assert_eq!(history.exchange_count, 1);
}

#[tokio::test]
async fn test_late_joiner_sees_snapshot_then_live_stream() {
    let provider = ScriptedProvider::default();
    provider.add_generation(PresetGeneration::with_fragments(["first turn"]));
    provider.add_generation(PresetGeneration::with_fragments(["second turn"]));

    let hub = make_hub(provider.clone());
    let id = hub.create(test_config()).unwrap();
    hub.start(id).await.unwrap();
    wait_for_turns(&hub, id, 2).await;

    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    let snapshot = expect_snapshot(&mut viewer).await;
    assert_eq!(snapshot.history.len(), 2);
    assert_eq!(snapshot.history[0].content, "first turn");
    assert_eq!(snapshot.exchange_count, 1);
    assert_eq!(snapshot.config, test_config());

    // Everything after the snapshot is incremental, with no overlap.
    provider.add_generation(PresetGeneration::with_fragments(["third"]));
    provider.add_generation(PresetGeneration::with_fragments(["fourth"]));
    hub.continue_conversation(id).unwrap();
    assert_eq!(expect_turn(&mut viewer, SpeakerRole::First).await, "third");
    assert_eq!(expect_turn(&mut viewer, SpeakerRole::Second).await, "fourth");
}

#[tokio::test(start_paused = true)]
async fn test_join_during_generation_never_sees_torn_text() {
    let provider = ScriptedProvider::default();
    provider.add_generation(PresetGeneration::with_fragments([
        "alpha ", "beta",
    ]));
    provider.add_generation(PresetGeneration::with_fragments(["gamma"]));

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();
    hub.start(id).await.unwrap();

    // The first turn is still streaming at this point. The snapshot
    // cannot contain the partial turn, so the viewer must not receive
    // its fragments either; the turn arrives whole on completion.
    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    let snapshot = expect_snapshot(&mut viewer).await;
    assert!(snapshot.history.is_empty());

    assert_eq!(
        viewer.recv().await.unwrap(),
        ConversationEvent::GenerationComplete {
            speaker: SpeakerRole::First,
            full_text: "alpha beta".into(),
        }
    );

    // The next turn streams normally.
    assert_eq!(expect_turn(&mut viewer, SpeakerRole::Second).await, "gamma");
}

#[tokio::test]
async fn test_close_notifies_viewers() {
    let provider = ScriptedProvider::default();
    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();

    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    expect_snapshot(&mut viewer).await;

    hub.close(id).unwrap();
    assert_eq!(
        viewer.recv().await.unwrap(),
        ConversationEvent::ConversationClosed
    );
    assert!(viewer.recv().await.is_none());

    assert!(matches!(hub.history(id).await, Err(Error::NotFound(_))));
    assert!(matches!(hub.close(id), Err(Error::NotFound(_))));
}

#[tokio::test(start_paused = true)]
async fn test_close_interrupts_inflight_generation() {
    let provider = ScriptedProvider::default();
    provider.add_generation(PresetGeneration::with_fragments([
        "never ", "finished",
    ]));

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();
    let mut viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    expect_snapshot(&mut viewer).await;

    hub.start(id).await.unwrap();
    assert_eq!(
        viewer.recv().await.unwrap(),
        ConversationEvent::GenerationStart {
            speaker: SpeakerRole::First
        }
    );

    hub.close(id).unwrap();
    loop {
        match viewer.recv().await {
            Some(ConversationEvent::ContentFragment { .. }) => continue,
            Some(ConversationEvent::ConversationClosed) => break,
            other => panic!("unexpected event: {other:?}"),
        }
    }
    assert!(viewer.recv().await.is_none());
}

#[tokio::test]
async fn test_rejoin_moves_viewer() {
    let provider = ScriptedProvider::default();
    let hub = make_hub(provider);
    let first = hub.create(test_config()).unwrap();
    let second = hub.create(test_config()).unwrap();

    let viewer_id = ViewerId::new();
    let mut at_first = hub.join(viewer_id, first, "observer").unwrap();
    expect_snapshot(&mut at_first).await;

    // Joining another conversation implicitly leaves the previous one.
    let mut at_second = hub.join(viewer_id, second, "observer").unwrap();
    expect_snapshot(&mut at_second).await;
    assert!(at_first.recv().await.is_none());

    hub.leave(viewer_id);
    assert!(at_second.recv().await.is_none());

    // Leaving twice is fine.
    hub.leave(viewer_id);
}

#[tokio::test]
async fn test_dropped_viewer_is_forgotten() {
    let provider = ScriptedProvider::default();
    provider.add_generation(PresetGeneration::with_fragments(["a"]));
    provider.add_generation(PresetGeneration::with_fragments(["b"]));

    let hub = make_hub(provider);
    let id = hub.create(test_config()).unwrap();

    let viewer = hub.join(ViewerId::new(), id, "observer").unwrap();
    assert_eq!(hub.health().await.viewers, 1);

    // The channel goes away without an explicit leave. The next
    // broadcast drops the link, and the hub-level record with it.
    drop(viewer);
    hub.start(id).await.unwrap();
    wait_for_turns(&hub, id, 2).await;

    assert_eq!(hub.health().await.viewers, 0);
}

#[tokio::test]
async fn test_rejoin_replaces_subscription() {
    let hub = make_hub(ScriptedProvider::default());
    let id = hub.create(test_config()).unwrap();

    let viewer_id = ViewerId::new();
    let mut stale = hub.join(viewer_id, id, "observer").unwrap();
    expect_snapshot(&mut stale).await;

    // Joining the same conversation again swaps the channel; the
    // viewer is still counted once.
    let mut fresh = hub.join(viewer_id, id, "observer").unwrap();
    expect_snapshot(&mut fresh).await;
    assert!(stale.recv().await.is_none());
    assert_eq!(hub.health().await.viewers, 1);

    hub.leave(viewer_id);
    assert!(fresh.recv().await.is_none());
    assert_eq!(hub.health().await.viewers, 0);
}

#[tokio::test]
async fn test_health_reflects_backend() {
    let provider = ScriptedProvider::default();
    provider.set_models(["llama3.2:3b", "mistral:7b"]);

    let hub = make_hub(provider.clone());
    let report = hub.health().await;
    assert_eq!(report.status, HealthStatus::Healthy);
    assert!(report.backend_reachable);
    assert_eq!(report.conversations, 0);
    assert_eq!(report.viewers, 0);
    assert_eq!(report.models, ["llama3.2:3b", "mistral:7b"]);
    assert!(report.detail.is_none());

    let id = hub.create(test_config()).unwrap();
    let _viewer = hub.join(ViewerId::new(), id, "observer").unwrap();

    provider.fail_model_listing();
    let report = hub.health().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(!report.backend_reachable);
    assert_eq!(report.conversations, 1);
    assert_eq!(report.viewers, 1);
    assert!(report.models.is_empty());
    assert!(report.detail.is_some());
}
