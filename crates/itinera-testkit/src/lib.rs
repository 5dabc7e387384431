use anyhow::{Result, anyhow};
use itinera_core::{
    ChatRequest, Day, Document, Item, ItemOption, ItemStatus, LlmResponse, LlmToolCall,
    Suitability,
};
use itinera_llm::LlmClient;
use itinera_store::DocumentStore;
use serde_json::{Value, json};
use std::collections::VecDeque;
use std::sync::Mutex;

/// Replays canned responses in order and records every request it receives.
/// Running out of responses is an error, which doubles as a transport fault.
#[derive(Default)]
pub struct ScriptedLlm {
    responses: Mutex<VecDeque<Result<LlmResponse, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedLlm {
    pub fn new(responses: impl IntoIterator<Item = LlmResponse>) -> Self {
        Self {
            responses: Mutex::new(responses.into_iter().map(Ok).collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a failure; the message becomes the error's display text.
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        if let Ok(mut queue) = self.responses.lock() {
            queue.push_back(Err(message.into()));
        }
        self
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|guard| guard.len()).unwrap_or(0)
    }
}

impl LlmClient for ScriptedLlm {
    fn complete_chat(&self, req: &ChatRequest) -> Result<LlmResponse> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("request log poisoned"))?
            .push(req.clone());
        let next = self
            .responses
            .lock()
            .map_err(|_| anyhow!("response queue poisoned"))?
            .pop_front();
        match next {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Err(anyhow!("scripted responses exhausted")),
        }
    }
}

/// A model reply carrying a single tool call.
pub fn tool_reply(id: &str, name: &str, input: Value) -> LlmResponse {
    tool_batch(vec![(id, name, input)])
}

/// A model reply carrying several tool calls in one round.
pub fn tool_batch(calls: Vec<(&str, &str, Value)>) -> LlmResponse {
    LlmResponse::tool_use(
        "",
        calls
            .into_iter()
            .map(|(id, name, input)| LlmToolCall {
                id: id.to_string(),
                name: name.to_string(),
                input,
            })
            .collect(),
    )
}

pub fn text_reply(text: &str) -> LlmResponse {
    LlmResponse::text(text)
}

/// Document store kept in memory; counts writes.
#[derive(Default)]
pub struct MemoryStore {
    document: Mutex<Document>,
    writes: Mutex<usize>,
}

impl MemoryStore {
    pub fn new(document: Document) -> Self {
        Self {
            document: Mutex::new(document),
            writes: Mutex::new(0),
        }
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().map(|guard| *guard).unwrap_or(0)
    }
}

impl DocumentStore for MemoryStore {
    fn get(&self) -> Result<Document> {
        self.document
            .lock()
            .map(|guard| guard.clone())
            .map_err(|_| anyhow!("memory store poisoned"))
    }

    fn put(&self, document: &Document) -> Result<()> {
        *self
            .document
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))? = document.clone();
        *self
            .writes
            .lock()
            .map_err(|_| anyhow!("memory store poisoned"))? += 1;
        Ok(())
    }
}

fn option(name: &str, menu: &str, dad: Suitability, hiro: Suitability) -> ItemOption {
    ItemOption {
        menu: Some(menu.to_string()),
        dietary_flag_dad: Some(dad),
        dietary_flag_hiro: Some(hiro),
        ..ItemOption::named(name)
    }
}

fn item(id: &str, time: &str, title: &str, cat: &str) -> Item {
    Item {
        time: time.to_string(),
        ..Item::new(id, title, cat)
    }
}

/// A four-day family trip used across the test suites.
///
/// Day 2 lunch (`d2_lunch`) is an undecided meal with options 복길 and
/// 경주어보; no other item mentions either name.
pub fn sample_document() -> Document {
    let mut day1 = Day::new(1, "2026-02-19", "경주 도착");
    day1.dow = "목".to_string();
    let mut arrival = item("d1_lunch", "12:00~13:00", "도착 점심", "meal");
    arrival.status = ItemStatus::Done;
    arrival.options = vec![option(
        "교동 국수",
        "잔치국수",
        Suitability::Good,
        Suitability::Caution,
    )];
    arrival.chosen = "교동 국수".to_string();
    day1.items = vec![
        arrival,
        item("d1_foo", "14:00~16:00", "대릉원 산책", "activity"),
        item("d1_dinner", "18:30~", "숙소 저녁", "meal"),
    ];

    let mut day2 = Day::new(2, "2026-02-20", "불국사와 석굴암");
    day2.dow = "금".to_string();
    let mut temple = item("d2_temple", "09:30~12:00", "불국사", "activity");
    temple.guide = Some(json!({"tips": ["주차장은 입구 오른쪽"], "durationMin": 120}));
    let mut lunch = item("d2_lunch", "12:30~13:30", "점심", "meal");
    lunch.options = vec![
        option("복길", "한정식", Suitability::Good, Suitability::Good),
        ItemOption {
            dietary_note: Some("튀김옷에 밀가루".to_string()),
            ..option("경주어보", "회덮밥", Suitability::Good, Suitability::Caution)
        },
    ];
    let mut cafe = item("d2_cafe", "15:00~", "카페", "cafe");
    cafe.options = vec![ItemOption {
        lat: Some(35.79),
        lng: Some(129.33),
        tags: vec!["뷰".to_string()],
        ..ItemOption::named("스타벅스 보문호수")
    }];
    day2.items = vec![
        temple,
        lunch,
        cafe,
        item("d2_grotto", "16:30~17:30", "석굴암", "activity"),
    ];

    let mut day3 = Day::new(3, "2026-02-21", "보문단지");
    day3.dow = "토".to_string();
    let mut skipped = item("d3_bike", "10:00~11:00", "자전거 대여", "activity");
    skipped.status = ItemStatus::Skipped;
    skipped.note = "비 예보".to_string();
    day3.items = vec![
        skipped,
        item("d3_lunch", "12:00~", "보문 점심", "meal"),
    ];

    let mut day4 = Day::new(4, "2026-02-22", "귀가");
    day4.dow = "일".to_string();
    day4.items = vec![item("d4_train", "11:00", "KTX 신경주역", "activity")];

    Document {
        days: vec![day1, day2, day3, day4],
        reference: Some(json!({
            "contacts": [{"name": "숙소", "phone": "054-000-0000"}]
        })),
        ..Document::default()
    }
}
