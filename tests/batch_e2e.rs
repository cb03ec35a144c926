use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use opinion_forge::{
    ApiClient, BatchRunner, Config, ForgeError, OutputRecord, Sleeper, TableConfig,
};
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer) -> Config {
    let mut config = Config::default();
    config.endpoint.url = format!("{}/v1/messages", server.uri());
    config.endpoint.api_key = Some("sk-test".to_string());
    config
}

fn instant_sleeper() -> Sleeper {
    Arc::new(|_: Duration| -> BoxFuture<'static, ()> { Box::pin(async {}) })
}

fn runner_for(server: &MockServer) -> BatchRunner<ApiClient> {
    let config = config_for(server);
    let client = ApiClient::new(Arc::new(config.clone()))
        .unwrap()
        .with_sleeper(instant_sleeper());
    BatchRunner::new(client, config.table)
}

fn message(text: &str) -> Value {
    json!({
        "content": [{ "type": "text", "text": text }],
        "stop_reason": "end_turn"
    })
}

fn read_output(path: &Path, delimiter: u8) -> Vec<OutputRecord> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .unwrap();
    let headers = reader.headers().unwrap().clone();
    assert_eq!(
        headers.iter().collect::<Vec<_>>(),
        ["id", "original_text", "classification", "transformed_text"]
    );
    reader.deserialize().map(Result::unwrap).collect()
}

async fn mount_reply(server: &MockServer, needle: &str, reply: &str) {
    Mock::given(method("POST"))
        .and(body_string_contains(needle))
        .respond_with(ResponseTemplate::new(200).set_body_json(message(reply)))
        .mount(server)
        .await;
}

#[tokio::test]
async fn every_row_is_written_in_order_with_errors_contained() {
    let server = MockServer::start().await;

    mount_reply(
        &server,
        "The sky is blue.",
        r#"{"classification":"fact","transformed_text":"The sky is unmistakably blue."}"#,
    )
    .await;
    mount_reply(
        &server,
        "We should build more bike lanes.",
        "```json\n{\"classification\":\"proposal\",\"transformed_text\":\"Cities without bike lanes are failing their people.\"}\n```",
    )
    .await;
    mount_reply(&server, "Pineapple belongs on pizza.", "Definitely an opinion!").await;
    mount_reply(
        &server,
        "Jazz is the best genre.",
        "```\n{\"classification\":\"opinion\",\"transformed_text\":\"Jazz is, beyond any doubt, the greatest genre.\"}\n```",
    )
    .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    let output = dir.path().join("output.csv");
    std::fs::write(
        &input,
        "id,text\n\
         1,The sky is blue.\n\
         2,We should build more bike lanes.\n\
         3,Pineapple belongs on pizza.\n\
         4,Jazz is the best genre.\n",
    )
    .unwrap();

    let report = runner_for(&server).run(&input, &output).await.unwrap();
    let rows = read_output(&output, b',');

    assert_eq!(rows.len(), 4);
    assert_eq!(
        rows[0].fields(),
        ["1", "The sky is blue.", "fact", "The sky is unmistakably blue."]
    );
    assert_eq!(rows[1].classification, "proposal");
    assert_eq!(
        rows[1].transformed_text,
        "Cities without bike lanes are failing their people."
    );
    assert_eq!(rows[2].id, "3");
    assert_eq!(rows[2].original_text, "Pineapple belongs on pizza.");
    assert_eq!(rows[2].classification, "ERROR");
    assert!(rows[2].transformed_text.starts_with("failed to parse model reply"));
    assert_eq!(rows[3].classification, "opinion");

    assert_eq!(report.stats.processed, 4);
    assert_eq!(report.stats.success_count, 3);
    assert_eq!(report.stats.failure_count, 1);
    assert_eq!(report.stats.per_class["fact"], 1);
    assert!(!report.all_failed());
}

#[tokio::test]
async fn rate_limited_rows_look_like_immediate_successes() {
    let server = MockServer::start().await;
    let reply = r#"{"classification":"fact","transformed_text":"Water is undeniably wet."}"#;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(429))
        .up_to_n_times(2)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message(reply)))
        .with_priority(2)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    let output = dir.path().join("output.csv");
    std::fs::write(&input, "id,text\n1,Water is wet.\n2,Water is wet.\n").unwrap();

    let runner = runner_for(&server);
    runner.run(&input, &output).await.unwrap();
    let rows = read_output(&output, b',');

    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].fields()[1..], rows[1].fields()[1..]);
    assert_eq!(rows[0].transformed_text, "Water is undeniably wet.");
    assert_eq!(runner.classifier().rate_limit_hits(), 2);
}

#[tokio::test]
async fn tab_delimited_tables_round_trip_extra_columns_ignored() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(message(
            r#"{"classification":"opinion","transformed_text":"Mondays are objectively the worst."}"#,
        )))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.tsv");
    let output = dir.path().join("output.tsv");
    std::fs::write(
        &input,
        "\u{feff}source\tid\ttext\nslack\t42\tMondays, honestly, are bad.\n",
    )
    .unwrap();

    let config = config_for(&server);
    let client = ApiClient::new(Arc::new(config)).unwrap();
    let runner = BatchRunner::new(client, TableConfig { delimiter: '\t' });
    runner.run(&input, &output).await.unwrap();

    let rows = read_output(&output, b'\t');
    assert_eq!(
        rows[0].fields(),
        [
            "42",
            "Mondays, honestly, are bad.",
            "opinion",
            "Mondays are objectively the worst."
        ]
    );
}

#[tokio::test]
async fn empty_input_writes_header_only() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    let output = dir.path().join("output.csv");
    std::fs::write(&input, "id,text\n").unwrap();

    let report = runner_for(&server).run(&input, &output).await.unwrap();

    assert_eq!(report.stats.processed, 0);
    assert!(!report.all_failed());
    assert_eq!(
        std::fs::read_to_string(&output).unwrap(),
        "id,original_text,classification,transformed_text\n"
    );
}

#[tokio::test]
async fn missing_input_file_is_fatal() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let err = runner_for(&server)
        .run(&dir.path().join("nope.csv"), &dir.path().join("out.csv"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::InputFileRead { .. }));
    assert!(!err.is_service_error());
}

#[tokio::test]
async fn missing_text_column_is_fatal() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    std::fs::write(&input, "id,body\n1,hello\n").unwrap();

    let err = runner_for(&server)
        .run(&input, &dir.path().join("out.csv"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::MissingColumn { column: "text", .. }));
}

#[tokio::test]
async fn unwritable_output_fails_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("input.csv");
    std::fs::write(&input, "id,text\n1,The sky is blue.\n").unwrap();

    let err = runner_for(&server)
        .run(&input, &dir.path().join("missing-dir").join("out.csv"))
        .await
        .unwrap_err();

    assert!(matches!(err, ForgeError::OutputFileWrite { .. }));
}
