//! Tests for the sqs-msg-cli library module.

use super::*;

const QUEUE_URL: &str = "http://localhost:9324/queue/default";

#[test]
fn test_send_parsing() {
    let cli = Cli::try_parse_from([
        "sqs-msg",
        "send",
        QUEUE_URL,
        "--body",
        "hello",
        "-a",
        "k=a",
        "-a",
        "k=b",
        "--delay",
        "1000",
    ])
    .unwrap();

    match cli.command {
        Commands::Send {
            queue_url,
            body,
            attributes,
            delay,
        } => {
            assert_eq!(queue_url.as_str(), QUEUE_URL);
            assert_eq!(body.as_deref(), Some("hello"));
            assert_eq!(
                attributes,
                vec![
                    ("k".to_string(), "a".to_string()),
                    ("k".to_string(), "b".to_string())
                ]
            );
            assert_eq!(delay, 1000);
        }
        _ => panic!("Expected Send command"),
    }
}

#[test]
fn test_send_accepts_negative_delay() {
    let cli = Cli::try_parse_from(["sqs-msg", "send", QUEUE_URL, "--delay", "-5"]).unwrap();

    match cli.command {
        Commands::Send { delay, body, .. } => {
            assert_eq!(delay, -5);
            assert!(body.is_none());
        }
        _ => panic!("Expected Send command"),
    }
}

#[test]
fn test_consume_defaults() {
    let cli = Cli::try_parse_from(["sqs-msg", "consume", QUEUE_URL]).unwrap();

    assert_eq!(cli.log_level, "info");
    assert!(!cli.json_logs);
    assert!(cli.region.is_none());

    match cli.command {
        Commands::Consume {
            concurrency,
            retry_timeout,
            wait_time,
            shutdown_timeout,
            credential_retry_delay,
            max_retries,
            ..
        } => {
            assert_eq!(concurrency, 1);
            assert_eq!(retry_timeout, 30);
            assert_eq!(wait_time, 20);
            assert_eq!(shutdown_timeout, 30);
            assert_eq!(credential_retry_delay, 2);
            assert_eq!(max_retries, 7);
        }
        _ => panic!("Expected Consume command"),
    }
}

#[test]
fn test_global_options() {
    let cli = Cli::try_parse_from([
        "sqs-msg",
        "--region",
        "eu-west-1",
        "--endpoint",
        "http://localhost:9324",
        "--json-logs",
        "-l",
        "debug",
        "consume",
        QUEUE_URL,
        "-n",
        "8",
    ])
    .unwrap();

    assert_eq!(cli.region.as_deref(), Some("eu-west-1"));
    assert_eq!(cli.endpoint.as_deref(), Some("http://localhost:9324"));
    assert!(cli.json_logs);
    assert_eq!(cli.log_level, "debug");
    assert!(matches!(
        cli.command,
        Commands::Consume { concurrency: 8, .. }
    ));
}

#[test]
fn test_invalid_arguments_are_rejected() {
    assert!(Cli::try_parse_from(["sqs-msg", "consume", "not a url"]).is_err());
    assert!(Cli::try_parse_from(["sqs-msg", "send", QUEUE_URL, "-a", "novalue"]).is_err());
    assert!(Cli::try_parse_from(["sqs-msg", "consume"]).is_err());
}

#[test]
fn test_parse_attribute() {
    assert_eq!(
        parse_attribute("env=prod").unwrap(),
        ("env".to_string(), "prod".to_string())
    );
    assert_eq!(
        parse_attribute("expr=a=b").unwrap(),
        ("expr".to_string(), "a=b".to_string())
    );
    assert_eq!(
        parse_attribute("empty=").unwrap(),
        ("empty".to_string(), String::new())
    );
    assert!(parse_attribute("=value").is_err());
    assert!(parse_attribute("missing").is_err());
}

#[test]
fn test_load_sqs_config_from_missing_file() {
    let result = load_sqs_config(Some(Path::new("/nonexistent/sqs-msg.toml")), None, None);

    assert!(matches!(
        result,
        Err(CliError::Configuration(ConfigurationError::Missing { .. }))
    ));
}

#[test]
fn test_render_message() {
    let message = Message::new("{\"order\":42}".into())
        .with_attribute("k", "a")
        .with_attribute("k", "b");

    let rendered = render_message(&message);

    assert_eq!(rendered["body"], "{\"order\":42}");
    assert_eq!(rendered["attributes"]["k"], serde_json::json!(["a", "b"]));
}

#[test]
fn test_render_message_with_binary_body() {
    let message = Message::new(vec![0x68, 0x69, 0xff].into());

    let rendered = render_message(&message);

    assert_eq!(rendered["body"], "hi\u{fffd}");
    assert_eq!(rendered["attributes"], serde_json::json!({}));
}
