//! End-to-end loop scenarios driven by a scripted model.

use anyhow::Result;
use itinera_agent::{
    AUTH_FAILURE_REPLY, ConversationLoop, FALLBACK_REPLY, FinishReason, LoopConfig,
    TRANSPORT_FAILURE_REPLY,
};
use itinera_core::{ChatMessage, ChatRequest, LlmResponse, Suitability};
use itinera_llm::{LlmClient, LlmError};
use itinera_store::DocumentStore;
use itinera_testkit::{
    MemoryStore, ScriptedLlm, sample_document, text_reply, tool_batch, tool_reply,
};
use itinera_tools::ToolRegistry;
use proptest::prelude::*;
use serde_json::{Value, json};

struct FailingLlm {
    auth: bool,
}

impl LlmClient for FailingLlm {
    fn complete_chat(&self, _req: &ChatRequest) -> Result<LlmResponse> {
        if self.auth {
            Err(LlmError::Auth("HTTP 401: invalid x-api-key".to_string()).into())
        } else {
            Err(LlmError::Api {
                status: 500,
                detail: "internal".to_string(),
            }
            .into())
        }
    }
}

fn tool_results(req: &ChatRequest) -> Vec<(String, Value)> {
    req.messages
        .iter()
        .filter_map(|m| match m {
            ChatMessage::Tool {
                tool_call_id,
                content,
                ..
            } => Some((
                tool_call_id.clone(),
                serde_json::from_str(content).expect("tool result json"),
            )),
            _ => None,
        })
        .collect()
}

#[test]
fn endless_tool_use_stops_at_round_ceiling() {
    let replies = (0..20).map(|i| {
        tool_reply(
            &format!("t{i}"),
            "get_trip_summary",
            json!({}),
        )
    });
    let llm = ScriptedLlm::new(replies);
    let config = LoopConfig {
        max_rounds: 4,
        ..LoopConfig::default()
    };
    let agent = ConversationLoop::new(&llm, ToolRegistry::standard(), config);
    let outcome = agent.run(&sample_document(), "요약해줘", &[]);

    assert_eq!(outcome.finish_reason, FinishReason::MaxRounds);
    assert_eq!(outcome.rounds, 4);
    assert_eq!(llm.call_count(), 4);
    assert_eq!(outcome.text, FALLBACK_REPLY);
    assert!(!outcome.mutated);
    assert_eq!(outcome.tool_calls.len(), 4);
}

#[test]
fn round_ceiling_keeps_last_partial_text() {
    let mut reply = tool_reply("t1", "get_trip_summary", json!({}));
    reply.text = "확인 중이에요".to_string();
    let llm = ScriptedLlm::new([reply.clone(), reply]);
    let config = LoopConfig {
        max_rounds: 2,
        ..LoopConfig::default()
    };
    let agent = ConversationLoop::new(&llm, ToolRegistry::standard(), config);
    let outcome = agent.run(&sample_document(), "요약", &[]);
    assert_eq!(outcome.text, "확인 중이에요");
    assert_eq!(outcome.finish_reason, FinishReason::MaxRounds);
}

#[test]
fn later_call_in_batch_sees_earlier_mutation() {
    let llm = ScriptedLlm::new([
        tool_batch(vec![
            (
                "t1",
                "add_option",
                json!({"itemId": "d2_lunch", "name": "교리김밥"}),
            ),
            (
                "t2",
                "update_option",
                json!({"itemId": "d2_lunch", "optionName": "교리", "fields": {"dietaryFlagHiro": "caution"}}),
            ),
        ]),
        text_reply("추가하고 표시했어요."),
    ]);
    let agent = ConversationLoop::new(&llm, ToolRegistry::standard(), LoopConfig::default());
    let outcome = agent.run(&sample_document(), "교리김밥 추가해줘", &[]);

    assert!(outcome.mutated);
    assert!(outcome.tool_calls.iter().all(|r| r.success));
    let doc = outcome.document.expect("mutated document");
    let lunch = doc
        .items()
        .find(|(_, item)| item.id == "d2_lunch")
        .map(|(_, item)| item.clone())
        .expect("d2_lunch");
    assert_eq!(lunch.option_names(), vec!["복길", "경주어보", "교리김밥"]);
    assert_eq!(lunch.options[2].dietary_flag_hiro, Some(Suitability::Caution));

    let second = &llm.requests()[1];
    let results = tool_results(second);
    assert_eq!(results.len(), 2);
    assert_eq!(results[0].0, "t1");
    assert_eq!(results[1].0, "t2");
    assert_eq!(results[1].1["option"], json!("교리김밥"));
}

#[test]
fn update_option_scenario_is_visible_to_a_later_read() {
    let llm = ScriptedLlm::new([
        tool_reply(
            "t1",
            "update_option",
            json!({"itemId": "d2_lunch", "optionName": "복길", "fields": {"dietaryFlagDad": "caution"}}),
        ),
        tool_reply("t2", "get_item_detail", json!({"itemId": "d2_lunch"})),
        text_reply("복길은 아버지께 주의로 표시했어요."),
    ]);
    let agent = ConversationLoop::new(&llm, ToolRegistry::standard(), LoopConfig::default());
    let outcome = agent.run(&sample_document(), "복길 당뇨 주의로", &[]);

    assert_eq!(outcome.rounds, 3);
    assert!(outcome.mutated);
    let requests = llm.requests();
    let first = tool_results(&requests[1]);
    assert_eq!(
        first[0].1,
        json!({"ok": true, "itemId": "d2_lunch", "option": "복길", "updatedFields": ["dietaryFlagDad"]})
    );
    let detail = tool_results(&requests[2]);
    assert_eq!(detail[1].1["options"][0]["dietaryFlagDad"], json!("caution"));

    // The prompt snapshot stays as it was at loop entry.
    assert_eq!(requests[0].system, requests[2].system);
}

#[test]
fn failed_calls_are_fed_back_and_do_not_abort_the_round() {
    let llm = ScriptedLlm::new([
        tool_batch(vec![
            ("t1", "set_chosen", json!({"itemId": "d2_lunch", "chosen": "없는집"})),
            ("t2", "no_such_tool", json!({})),
            ("t3", "update_status", json!({"itemId": "d2_lunch", "status": "done"})),
        ]),
        text_reply("점심은 완료로 바꿨어요."),
    ]);
    let agent = ConversationLoop::new(&llm, ToolRegistry::standard(), LoopConfig::default());
    let outcome = agent.run(&sample_document(), "점심 끝", &[]);

    let successes: Vec<bool> = outcome.tool_calls.iter().map(|r| r.success).collect();
    assert_eq!(successes, vec![false, false, true]);
    assert!(outcome.mutated);

    let results = tool_results(&llm.requests()[1]);
    assert_eq!(results[0].1["candidates"], json!(["복길", "경주어보"]));
    assert_eq!(results[1].1["kind"], json!("unknown_tool"));
    let has_error_flag = llm.requests()[1].messages.iter().any(|m| {
        matches!(m, ChatMessage::Tool { tool_call_id, is_error: true, .. } if tool_call_id == "t1")
    });
    assert!(has_error_flag);
}

#[test]
fn auth_fault_maps_to_auth_message_and_discards_changes() {
    let llm = FailingLlm { auth: true };
    let agent = ConversationLoop::new(&llm, ToolRegistry::standard(), LoopConfig::default());
    let outcome = agent.run(&sample_document(), "안녕", &[]);
    assert_eq!(outcome.text, AUTH_FAILURE_REPLY);
    assert_eq!(outcome.finish_reason, FinishReason::TransportError);
    assert!(outcome.error.as_deref().is_some_and(|e| e.contains("401")));
    assert!(outcome.document.is_none());
}

#[test]
fn generic_fault_after_a_write_returns_no_document() {
    let llm = ScriptedLlm::new([tool_reply(
        "t1",
        "remove_item",
        json!({"itemId": "d2_lunch"}),
    )])
    .then_fail("connection reset");
    let agent = ConversationLoop::new(&llm, ToolRegistry::standard(), LoopConfig::default());
    let outcome = agent.run(&sample_document(), "점심 빼줘", &[]);
    assert_eq!(outcome.text, TRANSPORT_FAILURE_REPLY);
    assert!(!outcome.mutated);
    assert!(outcome.document.is_none());
    assert_eq!(outcome.rounds, 2);
    assert_eq!(outcome.error.as_deref(), Some("connection reset"));

    let api = FailingLlm { auth: false };
    let agent = ConversationLoop::new(&api, ToolRegistry::standard(), LoopConfig::default());
    assert_eq!(agent.run(&sample_document(), "x", &[]).text, TRANSPORT_FAILURE_REPLY);
}

#[test]
fn caller_persists_only_mutated_outcomes() {
    let store = MemoryStore::new(sample_document());
    let registry = ToolRegistry::standard();

    let reader = ScriptedLlm::new([
        tool_reply("t1", "find_item", json!({"query": "점심"})),
        text_reply("점심은 세 번 있어요."),
    ]);
    let agent = ConversationLoop::new(&reader, registry, LoopConfig::default());
    let outcome = agent.run(&store.get().expect("get"), "점심 일정", &[]);
    if let Some(doc) = &outcome.document {
        store.put(doc).expect("put");
    }
    assert_eq!(store.write_count(), 0);

    let writer = ScriptedLlm::new([
        tool_reply("t1", "update_review", json!({"itemId": "d1_lunch", "review": "국물이 좋았다"})),
        text_reply("리뷰 남겼어요."),
    ]);
    let agent = ConversationLoop::new(&writer, registry, LoopConfig::default());
    let outcome = agent.run(&store.get().expect("get"), "리뷰", &[]);
    if let Some(doc) = &outcome.document {
        store.put(doc).expect("put");
    }
    assert_eq!(store.write_count(), 1);
    let saved = store.get().expect("get");
    assert_eq!(saved.days[0].items[0].review, "국물이 좋았다");
    assert!(saved.meta.update_note.is_some());
}

const READ_TOOLS: [&str; 5] = [
    "get_schedule",
    "find_item",
    "search_items",
    "get_item_detail",
    "get_trip_summary",
];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn read_only_conversations_never_mutate(
        picks in proptest::collection::vec((0usize..5, "[a-z0-9가-힣]{0,6}", 0u32..6), 1..6)
    ) {
        let calls: Vec<(String, &str, Value)> = picks
            .iter()
            .enumerate()
            .map(|(i, (tool, text, day))| {
                let input = json!({"query": text, "itemId": text, "dayNum": day});
                (format!("t{i}"), READ_TOOLS[*tool], input)
            })
            .collect();
        let batch = tool_batch(
            calls
                .iter()
                .map(|(id, name, input)| (id.as_str(), *name, input.clone()))
                .collect(),
        );
        let llm = ScriptedLlm::new([batch, text_reply("끝")]);
        let agent = ConversationLoop::new(&llm, ToolRegistry::standard(), LoopConfig::default());
        let outcome = agent.run(&sample_document(), "조회만", &[]);
        prop_assert!(!outcome.mutated);
        prop_assert!(outcome.document.is_none());
        prop_assert_eq!(outcome.finish_reason, FinishReason::Completed);
    }
}
