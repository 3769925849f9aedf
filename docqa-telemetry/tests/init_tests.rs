use docqa_telemetry::{LogFormat, init_telemetry, init_with_format};

#[tokio::test]
async fn repeated_initialisation_is_a_noop() {
    init_telemetry("docqa-test").expect("first init");
    init_telemetry("docqa-test").expect("second init");
    init_with_format("docqa-test", LogFormat::Json).expect("format switch after init is ignored");

    tracing::info!(test = "init", "event after init");
}

#[test]
fn default_format_is_pretty() {
    assert_eq!(LogFormat::default(), LogFormat::Pretty);
}
