use std::fs;
use std::io::{Read, Write};
use std::net::TcpListener;
use std::thread;

use clap::Parser;
use tempfile::TempDir;

use webrag_cli::cli::{fill_api_keys, fill_user_agent, Cli, Command};
use webrag_cli::commands::{self, chunk_stats};
use webrag_cli::describe;
use webrag_core::config::{
    EmbeddingProvider, GenerationProvider, IngestionConfig, RagSettings, TokenizerKind,
};
use webrag_core::types::Chunk;

/// Answer one `/api/generate` call with a fixed completion.
fn fake_ollama(reply: &'static str) -> (String, thread::JoinHandle<()>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let addr = listener.local_addr().expect("addr");
    let handle = thread::spawn(move || {
        let (mut stream, _) = listener.accept().expect("accept");
        let mut request = Vec::new();
        let mut buf = [0u8; 8192];
        loop {
            let n = stream.read(&mut buf).expect("read");
            if n == 0 {
                break;
            }
            request.extend_from_slice(&buf[..n]);
            let text = String::from_utf8_lossy(&request).to_string();
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|l| {
                        let lower = l.to_ascii_lowercase();
                        lower.strip_prefix("content-length:").map(|v| v.trim().to_string())
                    })
                    .and_then(|v| v.parse::<usize>().ok())
                    .unwrap_or(0);
                if request.len() >= end + 4 + length {
                    break;
                }
            }
        }
        let body = format!(r#"{{"response":"{reply}","done":true}}"#);
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\
             Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        stream.write_all(response.as_bytes()).expect("write");
    });
    (format!("http://{addr}"), handle)
}

fn offline_settings(dir: &TempDir) -> RagSettings {
    let mut settings = RagSettings::default();
    settings.ingestion.urls = Vec::new();
    settings.ingestion.dirs = vec![dir.path().to_string_lossy().into_owned()];
    settings.embedding.provider = EmbeddingProvider::Fake;
    settings.embedding.dimensions = 128;
    settings.chunking.tokenizer = TokenizerKind::Whitespace;
    settings.chunking.max_tokens = 30;
    settings
}

fn corpus() -> TempDir {
    let dir = TempDir::new().expect("tempdir");
    fs::write(
        dir.path().join("prompting.md"),
        "Prompt engineering steers a language model with instructions.\n\n\
         Few-shot prompts add demonstrations.",
    )
    .expect("write");
    fs::write(dir.path().join("agents.txt"), "Agents plan, remember and call tools.")
        .expect("write");
    dir
}

#[test]
fn parses_global_flags_after_subcommand() {
    let cli = Cli::try_parse_from([
        "webrag",
        "ask",
        "What is prompt engineering?",
        "--url",
        "https://a.example/",
        "--url",
        "https://b.example/",
        "-k",
        "6",
        "--max-tokens",
        "120",
        "--overlap",
        "10",
    ])
    .expect("parse");
    assert_eq!(cli.urls, vec!["https://a.example/", "https://b.example/"]);
    assert_eq!(cli.k, Some(6));
    match &cli.command {
        Command::Ask { questions } => {
            assert_eq!(questions, &vec!["What is prompt engineering?".to_string()]);
        }
        other => panic!("unexpected command {other:?}"),
    }

    let mut settings = RagSettings::default();
    cli.apply(&mut settings).expect("apply");
    assert_eq!(settings.retrieval.k, 6);
    assert_eq!(settings.chunking.max_tokens, 120);
    assert_eq!(settings.chunking.overlap_tokens, 10);
    assert_eq!(settings.ingestion.urls.len(), 2);
    assert!(settings.ingestion.dirs.is_empty());
}

#[test]
fn ask_without_questions_parses() {
    let cli = Cli::try_parse_from(["webrag", "ask"]).expect("parse");
    assert!(matches!(cli.command, Command::Ask { ref questions } if questions.is_empty()));
    assert!(Cli::try_parse_from(["webrag", "search"]).is_err());
}

#[test]
fn invalid_override_is_configuration_error() {
    let cli = Cli::try_parse_from(["webrag", "chunks", "--max-tokens", "10", "--overlap", "10"])
        .expect("parse");
    let mut settings = RagSettings::default();
    let err = cli.apply(&mut settings).expect_err("must fail");
    assert_eq!(err.kind(), "ConfigurationError");
}

#[test]
fn api_key_fills_only_api_providers_without_one() {
    let mut settings = RagSettings::default();
    fill_api_keys(&mut settings, Some("sk-env".to_string()));
    assert_eq!(settings.generation.api_key, None);

    settings.generation.provider = GenerationProvider::Openai;
    settings.embedding.provider = EmbeddingProvider::Api;
    settings.embedding.api_key = Some("sk-config".to_string());
    fill_api_keys(&mut settings, Some("sk-env".to_string()));
    assert_eq!(settings.generation.api_key.as_deref(), Some("sk-env"));
    assert_eq!(settings.embedding.api_key.as_deref(), Some("sk-config"));
}

#[test]
fn user_agent_env_replaces_only_the_default() {
    let mut settings = RagSettings::default();
    fill_user_agent(&mut settings, Some(String::new()));
    assert_eq!(settings.ingestion.user_agent, IngestionConfig::default().user_agent);

    fill_user_agent(&mut settings, Some("homestead-bot/2.0".to_string()));
    assert_eq!(settings.ingestion.user_agent, "homestead-bot/2.0");

    settings.ingestion.user_agent = "configured/1.0".to_string();
    fill_user_agent(&mut settings, Some("homestead-bot/2.0".to_string()));
    assert_eq!(settings.ingestion.user_agent, "configured/1.0");
}

#[test]
fn errors_are_described_by_kind() {
    let err = anyhow::Error::from(webrag_core::Error::EmptyCorpus);
    assert_eq!(describe(&err), "EmptyCorpusError: cannot build an index from an empty corpus");
    assert!(describe(&anyhow::anyhow!("boom")).starts_with("Error: boom"));
}

#[test]
fn chunk_stats_per_source() {
    let chunk = |text: &str, source: &str, i| Chunk {
        text: text.to_string(),
        source_uri: source.to_string(),
        sequence_index: i,
    };
    let chunks = [chunk("a b c", "x", 0), chunk("a", "x", 1), chunk("a b", "y", 0)];
    let stats = chunk_stats(&chunks, |t| t.split_whitespace().count());
    assert_eq!(stats["x"].count, 2);
    assert_eq!((stats["x"].min, stats["x"].max), (1, 3));
    assert!((stats["x"].mean - 2.0).abs() < 1e-9);
    assert_eq!(stats["y"].count, 1);
}

#[test]
fn ask_prints_question_and_answer() {
    let dir = corpus();
    let (base_url, server) = fake_ollama("Prompt engineering steers a model with instructions.");
    let mut settings = offline_settings(&dir);
    settings.generation.base_url = base_url;

    let mut out = Vec::new();
    commands::ask(&settings, &["What is prompt engineering?".to_string()], &mut out).expect("ask");
    server.join().expect("server");

    let printed = String::from_utf8(out).expect("utf8");
    assert_eq!(
        printed,
        "Question: What is prompt engineering?\n\
         Answer: Prompt engineering steers a model with instructions.\n\n"
    );
}

#[test]
fn search_prints_ranked_hits() {
    let dir = corpus();
    let mut settings = offline_settings(&dir);
    settings.retrieval.k = 2;

    let mut out = Vec::new();
    commands::search(&settings, "agents call tools", &mut out).expect("search");
    let printed = String::from_utf8(out).expect("utf8");
    let first = printed.lines().next().expect("a hit");
    assert!(first.starts_with("1. ["), "{printed}");
    assert!(first.ends_with("agents.txt #0"), "{printed}");
    assert_eq!(printed.lines().filter(|l| !l.starts_with("   ")).count(), 2);
}

#[test]
fn chunks_reports_counts() {
    let dir = corpus();
    let mut out = Vec::new();
    commands::chunks(&offline_settings(&dir), &mut out).expect("chunks");
    let printed = String::from_utf8(out).expect("utf8");
    let header = "2 documents, 2 chunks (max 30 tokens, overlap 0, counted by whitespace)";
    assert!(printed.starts_with(header), "{printed}");
}
