//! End-to-end pipeline scenarios against an in-memory database.

use std::collections::HashMap;
use std::sync::Arc;

use secrecy::SecretString;
use serde_json::json;

use triage_bot::config::Settings;
use triage_bot::llm::LlmBackend;
use triage_bot::pipeline::{InboundMessage, PipelineOutcome, TriagePipeline};
use triage_bot::store::{LibSqlStore, ModerationAction, Store};
use triage_bot::testing::{mentor_profile, ScriptedProvider};

const ADMIN_ID: i64 = 1000;
const MENTOR_ID: i64 = 2000;
const STUDENT_ID: i64 = 1;

fn settings() -> Settings {
    Settings {
        bot_token: SecretString::from("t"),
        llm_backend: LlmBackend::OpenAi,
        llm_api_key: SecretString::from("k"),
        llm_model: None,
        admin_ids: vec![ADMIN_ID],
        mentor_domains: HashMap::from([
            ("nlp".to_string(), vec![MENTOR_ID, MENTOR_ID + 1]),
            ("computer_vision".to_string(), vec![MENTOR_ID]),
        ]),
        moderation_threshold: 0.7,
        faq_threshold: 0.85,
        db_path: ":memory:".to_string(),
    }
}

fn inbound(platform_user_id: i64, text: &str) -> InboundMessage {
    InboundMessage {
        platform_user_id,
        username: Some(format!("user{platform_user_id}")),
        first_name: None,
        last_name: None,
        platform_message_id: 500,
        chat_id: -100,
        text: text.to_string(),
    }
}

fn clean_verdict() -> serde_json::Value {
    json!({
        "is_appropriate": true,
        "category": "clean",
        "confidence": 0.95,
        "reason": "normal discussion",
    })
}

async fn pipeline_with(
    provider: ScriptedProvider,
) -> (TriagePipeline, Arc<LibSqlStore>, Arc<ScriptedProvider>) {
    let store = Arc::new(LibSqlStore::new_memory().await.unwrap());
    let provider = Arc::new(provider);
    let pipeline = TriagePipeline::new(provider.clone(), store.clone(), settings());
    (pipeline, store, provider)
}

#[tokio::test]
async fn spam_is_deleted_and_audited() {
    let provider = ScriptedProvider::default().with_json(json!({
        "is_appropriate": false,
        "category": "spam",
        "confidence": 0.9,
        "reason": "unsolicited promotion",
    }));
    let (pipeline, store, _) = pipeline_with(provider).await;

    let outcome = pipeline
        .process(&inbound(STUDENT_ID, "🔥 buy my trading course"))
        .await
        .unwrap();

    match outcome {
        PipelineOutcome::Deleted {
            category,
            confidence,
            ..
        } => {
            assert_eq!(category, "spam");
            assert!((confidence - 0.9).abs() < 1e-6);
        }
        other => panic!("expected Deleted, got {other:?}"),
    }

    let member = store.get_member(STUDENT_ID).await.unwrap().unwrap();
    let records = store
        .moderation_records_for_member(member.id)
        .await
        .unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].action, ModerationAction::Deleted);
    assert_eq!(records[0].category, "spam");

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.deleted_messages, 1);
}

#[tokio::test]
async fn low_confidence_flag_is_not_deleted() {
    let provider = ScriptedProvider::default().with_json(json!({
        "is_appropriate": false,
        "category": "spam",
        "confidence": 0.5,
        "reason": "maybe spam",
    }));
    let (pipeline, store, _) = pipeline_with(provider).await;

    // No FAQs and no second scripted response: FAQ and routing both degrade.
    let outcome = pipeline
        .process(&inbound(STUDENT_ID, "check this out"))
        .await
        .unwrap();
    assert_eq!(outcome, PipelineOutcome::NoAction);

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.deleted_messages, 0);
}

#[tokio::test]
async fn faq_match_replies_and_skips_routing() {
    let provider = ScriptedProvider::default()
        .with_json(clean_verdict())
        .with_default_embedding(vec![1.0, 0.0]);
    let (pipeline, store, provider) = pipeline_with(provider).await;

    let faq = store
        .insert_faq(
            "How do I start with ML?",
            "Begin with Andrew Ng's course.",
            Some("getting_started"),
            &[1.0, 0.0],
            None,
        )
        .await
        .unwrap();

    let outcome = pipeline
        .process(&inbound(STUDENT_ID, "How do I start with ML?"))
        .await
        .unwrap();

    match outcome {
        PipelineOutcome::FaqReply { text, similarity } => {
            assert!(text.contains("💡 FAQ Match"));
            assert!(text.contains("How do I start with ML?"));
            assert!(text.contains("Begin with Andrew Ng's course."));
            assert!(similarity > 0.99);
        }
        other => panic!("expected FaqReply, got {other:?}"),
    }

    let fetched = store.get_faq(faq.id).await.unwrap().unwrap();
    assert_eq!(fetched.times_matched, 1);

    // One structured call for moderation, none for routing.
    assert_eq!(provider.json_call_count(), 1);
}

#[tokio::test]
async fn unmatched_question_pages_mentors() {
    let provider = ScriptedProvider::default()
        .with_json(clean_verdict())
        .with_json(json!({
            "complexity": "complex",
            "domains": ["nlp"],
            "should_tag_mentors": true,
            "reason": "transformer internals question",
            "suggested_mentors": ["nlp"],
        }))
        .with_default_embedding(vec![1.0, 0.0]);
    let (pipeline, store, _) = pipeline_with(provider).await;

    // Both configured nlp mentors have joined.
    store.upsert_member(&mentor_profile(MENTOR_ID)).await.unwrap();
    store
        .upsert_member(&mentor_profile(MENTOR_ID + 1))
        .await
        .unwrap();

    let outcome = pipeline
        .process(&inbound(STUDENT_ID, "Why do attention heads specialize?"))
        .await
        .unwrap();

    match outcome {
        PipelineOutcome::MentorsPaged {
            mention_text,
            mentor_count,
        } => {
            assert_eq!(mentor_count, 2);
            assert!(mention_text.contains("nlp"));
            assert!(mention_text.contains(&format!("@mentor{MENTOR_ID}")));
        }
        other => panic!("expected MentorsPaged, got {other:?}"),
    }

    let stats = store.stats().await.unwrap();
    assert_eq!(stats.mentor_tags, 2);
}

#[tokio::test]
async fn no_tags_when_mentors_never_joined() {
    let provider = ScriptedProvider::default()
        .with_json(clean_verdict())
        .with_json(json!({
            "complexity": "complex",
            "domains": ["nlp"],
            "should_tag_mentors": true,
            "reason": "hard question",
        }))
        .with_default_embedding(vec![1.0, 0.0]);
    let (pipeline, store, _) = pipeline_with(provider).await;

    let outcome = pipeline
        .process(&inbound(STUDENT_ID, "hard question"))
        .await
        .unwrap();
    assert_eq!(outcome, PipelineOutcome::NoAction);
    assert_eq!(store.stats().await.unwrap().mentor_tags, 0);
}

#[tokio::test]
async fn elevated_sender_message_is_stored_but_never_triaged() {
    let (pipeline, store, provider) = pipeline_with(ScriptedProvider::default()).await;

    let outcome = pipeline
        .process(&inbound(ADMIN_ID, "🔥 buy my trading course"))
        .await
        .unwrap();
    assert_eq!(outcome, PipelineOutcome::Skipped);

    // The message is persisted like any other, but no stage ran: no LLM
    // calls, no deletion, no audit rows.
    let member = store.get_member(ADMIN_ID).await.unwrap().unwrap();
    assert!(member.is_admin);
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.deleted_messages, 0);
    assert_eq!(provider.json_call_count(), 0);
    assert_eq!(provider.embed_call_count(), 0);
    let records = store
        .moderation_records_for_member(member.id)
        .await
        .unwrap();
    assert!(records.is_empty());
}

#[tokio::test]
async fn mentor_sender_bypasses_everything() {
    let (pipeline, store, _) = pipeline_with(ScriptedProvider::default()).await;

    let outcome = pipeline
        .process(&inbound(MENTOR_ID, "here is how attention works..."))
        .await
        .unwrap();
    assert_eq!(outcome, PipelineOutcome::Skipped);

    let member = store.get_member(MENTOR_ID).await.unwrap().unwrap();
    assert!(member.is_mentor);
}

#[tokio::test]
async fn moderation_outage_fails_open() {
    let (pipeline, store, _) = pipeline_with(ScriptedProvider::failing()).await;

    let outcome = pipeline
        .process(&inbound(STUDENT_ID, "is this message ok?"))
        .await
        .unwrap();
    assert_eq!(outcome, PipelineOutcome::NoAction);

    // The message is stored and stands; nothing was deleted.
    let stats = store.stats().await.unwrap();
    assert_eq!(stats.messages, 1);
    assert_eq!(stats.deleted_messages, 0);
}

#[tokio::test]
async fn routing_outage_degrades_to_no_action() {
    // Moderation answers, then the provider has nothing left: the FAQ stage
    // finds no candidates and the routing call errors out.
    let provider = ScriptedProvider::default()
        .with_json(clean_verdict())
        .with_default_embedding(vec![1.0, 0.0]);
    let (pipeline, store, _) = pipeline_with(provider).await;

    let outcome = pipeline
        .process(&inbound(STUDENT_ID, "some question"))
        .await
        .unwrap();
    assert_eq!(outcome, PipelineOutcome::NoAction);
    assert_eq!(store.stats().await.unwrap().mentor_tags, 0);
}

#[tokio::test]
async fn joining_creates_member_with_configured_roles() {
    let (pipeline, store, provider) = pipeline_with(ScriptedProvider::default()).await;

    pipeline
        .register_member(MENTOR_ID, Some("newmentor".to_string()), None, None)
        .await
        .unwrap();

    let member = store.get_member(MENTOR_ID).await.unwrap().unwrap();
    assert!(member.is_mentor);
    assert_eq!(member.username.as_deref(), Some("newmentor"));
    // Joining alone triggers no triage.
    assert_eq!(provider.json_call_count(), 0);
    assert_eq!(store.stats().await.unwrap().messages, 0);
}

#[tokio::test]
async fn roles_recomputed_on_every_message() {
    // A sender stored as a plain member is elevated once configuration says
    // so, without any manual migration of the stored row.
    let provider = ScriptedProvider::default()
        .with_json(clean_verdict())
        .with_default_embedding(vec![1.0, 0.0]);
    let (pipeline, store, _) = pipeline_with(provider).await;

    let mut profile = mentor_profile(ADMIN_ID);
    profile.is_mentor = false;
    store.upsert_member(&profile).await.unwrap();
    let before = store.get_member(ADMIN_ID).await.unwrap().unwrap();
    assert!(!before.is_admin);

    let outcome = pipeline
        .process(&inbound(ADMIN_ID, "hello"))
        .await
        .unwrap();
    assert_eq!(outcome, PipelineOutcome::Skipped);

    let after = store.get_member(ADMIN_ID).await.unwrap().unwrap();
    assert!(after.is_admin);
}
