//! End-to-end answer pipeline against mocked forum and model servers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::Arc;

use serde_json::{Value, json};
use threadlens::{
    AnswerEngine, AppConfig, AppError, ChatCompletionsModel, LlmConfig, PromptBuilder,
    SegmentSource,
};
use threadlens_search::{SearchConfig, SearchMode, SearchOrchestrator};
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn post(id: &str, title: &str, body: &str) -> Value {
    json!({"kind": "t3", "data": {
        "id": id,
        "title": title,
        "subreddit": "rust",
        "author": "ferris",
        "selftext": body,
        "permalink": format!("/r/rust/comments/{id}/slug/"),
        "created_utc": 1_700_000_000.0,
        "score": 250,
        "num_comments": 40
    }})
}

fn listing(children: Vec<Value>) -> Value {
    json!({"kind": "Listing", "data": {"children": children}})
}

fn chat_reply(content: &str) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "choices": [{"index": 0, "finish_reason": "stop",
                     "message": {"role": "assistant", "content": content}}]
    })
}

fn engine(forum: &MockServer, model: &MockServer, llm: LlmConfig) -> AnswerEngine {
    let search = SearchConfig {
        public_base_url: forum.uri(),
        ..SearchConfig::default()
    };
    let llm = LlmConfig {
        base_url: model.uri(),
        ..llm
    };
    let prompt = PromptBuilder::new(llm.max_results_in_prompt, llm.max_excerpt_chars);
    AnswerEngine::new(
        Arc::new(SearchOrchestrator::new(search).unwrap()),
        Arc::new(ChatCompletionsModel::new(llm).unwrap()),
        prompt,
    )
}

#[tokio::test]
async fn question_is_answered_with_steps_and_citations() {
    let forum = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("type", "link"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![
            post(
                "a1",
                "Best async runtime for a web server?",
                "Tokio is the default for web servers. Axum and hyper build on it.",
            ),
            post(
                "b2",
                "Smol vs tokio",
                "Smol is small and simple. Tokio has the larger ecosystem.",
            ),
        ])))
        .mount(&forum)
        .await;

    let model = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(header("authorization", "Bearer sk-test"))
        .and(body_string_contains("Best async runtime for a web server?"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "<reasoning>\nStep 1: Survey threads\nBoth threads discuss tokio.\n\nStep 2: Weigh ecosystem\nTokio's ecosystem is larger.\n</reasoning>\n<answer>\nPick tokio for a web server [1]. Smol is fine for small tools [2]. See also [4].\n</answer>",
        )))
        .expect(1)
        .mount(&model)
        .await;

    let llm = LlmConfig {
        api_key: Some("sk-test".into()),
        ..LlmConfig::default()
    };
    let answer = engine(&forum, &model, llm)
        .answer(
            "async runtime web server",
            SearchMode::Posts,
            10,
            &CancellationToken::new(),
        )
        .await
        .unwrap();

    let extracted = &answer.extracted;
    assert_eq!(extracted.segment_source, SegmentSource::Delimited);
    let titles: Vec<&str> = extracted.steps.iter().map(|s| s.title.as_str()).collect();
    assert_eq!(titles, ["Survey threads", "Weigh ecosystem"]);
    assert!(extracted.answer.starts_with("Pick tokio for a web server [1]."));

    let cited: Vec<usize> = extracted.citations.iter().map(|c| c.index).collect();
    assert_eq!(cited, [1, 2]);
    for citation in &extracted.citations {
        assert_eq!(citation.url, answer.results[citation.index - 1].url);
    }
    assert_eq!(
        extracted.citations[1].excerpt,
        "Smol is fine for small tools [2]."
    );
    assert!(extracted.render_sources().starts_with("Sources:\n[1] "));
}

#[tokio::test]
async fn undelimited_reply_still_yields_an_answer() {
    let forum = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![post(
            "a1",
            "Learning rust",
            "Read the book first.",
        )])))
        .mount(&forum)
        .await;

    let model = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(200).set_body_json(chat_reply(
            "The thread recommends starting with the book.\n\nStart with the official book [1].",
        )))
        .mount(&model)
        .await;

    let answer = engine(&forum, &model, LlmConfig::default())
        .answer("learning rust", SearchMode::Posts, 5, &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        answer.extracted.segment_source,
        SegmentSource::ParagraphFallback
    );
    assert_eq!(answer.extracted.answer, "Start with the official book [1].");
    assert_eq!(answer.extracted.citations.len(), 1);
}

#[tokio::test]
async fn model_failure_surfaces_as_model_error() {
    let forum = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing(vec![post(
            "a1",
            "Any thread",
            "Some body text here.",
        )])))
        .mount(&forum)
        .await;

    let model = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({
            "error": {"message": "overloaded"}
        })))
        .mount(&model)
        .await;

    let err = engine(&forum, &model, LlmConfig::default())
        .answer("any thread", SearchMode::Posts, 5, &CancellationToken::new())
        .await
        .unwrap_err();
    match err {
        AppError::Model(message) => assert!(message.contains("overloaded")),
        other => panic!("expected model error, got {other:?}"),
    }
}

#[tokio::test]
async fn config_file_drives_the_engine() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        "log_filter = \"threadlens=debug\"\n\n[llm]\nmodel = \"local\"\nmax_results_in_prompt = 3\n\n[search]\nper_strategy_limit = 10\n",
    )
    .unwrap();

    let config = AppConfig::load(Some(&path)).unwrap();
    assert_eq!(config.log_filter, "threadlens=debug");
    assert_eq!(config.llm.model, "local");
    assert_eq!(config.llm.max_results_in_prompt, 3);
    assert_eq!(config.search.per_strategy_limit, 10);
}
