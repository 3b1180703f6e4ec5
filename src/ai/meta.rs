//! Meta AI web client.
//!
//! Talks to the unofficial meta.ai graphql surface: bootstrap a guest
//! access token from the landing page, then stream prompt responses.
//! Every call here blocks; the session manager runs them on tokio's
//! blocking pool.
//!
//! The streamed payload carries cumulative snapshots of the response
//! (`snippet` grows with each line), which maps directly onto
//! `StreamChunk`'s cumulative contract.

use std::io::{BufRead, BufReader};

use anyhow::{anyhow, Context};
use rand::Rng;
use regex::Regex;
use reqwest::blocking::{Client, Response};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::ai::backend::{AiBackend, AiSession, ChunkStream};
use crate::ai::types::{Source, StreamChunk};

const META_AI_URL: &str = "https://www.meta.ai/";
const GRAPHQL_URL: &str = "https://graph.meta.ai/graphql?locale=user";
const USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64; rv:122.0) Gecko/20100101 Firefox/122.0";

/// Factory for Meta AI sessions.
pub struct MetaAiBackend {
    /// Containerized deployments disable the provider-side sandbox.
    docker_env: bool,
}

impl MetaAiBackend {
    pub fn new(docker_env: bool) -> Self {
        Self { docker_env }
    }
}

impl AiBackend for MetaAiBackend {
    fn name(&self) -> &str {
        "meta-ai"
    }

    fn create_session(&self) -> anyhow::Result<Box<dyn AiSession>> {
        if self.docker_env {
            tracing::info!("Docker env detected, using no-sandbox session creation");
        }

        let client = Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("building HTTP client")?;

        let landing = client
            .get(META_AI_URL)
            .send()
            .context("fetching meta.ai landing page")?;

        let cookie_header = collect_cookies(&landing);
        let page = landing.text().context("reading landing page")?;

        let lsd = extract_value(&page, "LSD", "token")
            .ok_or_else(|| anyhow!("lsd token not found in landing page"))?;

        let access_token = request_access_token(&client, &cookie_header, &lsd)?;

        Ok(Box::new(MetaAiSession {
            client,
            access_token,
            cookie_header,
            conversation_id: Uuid::new_v4().to_string(),
        }))
    }
}

/// One authenticated conversation with meta.ai.
pub struct MetaAiSession {
    client: Client,
    access_token: String,
    cookie_header: String,
    conversation_id: String,
}

impl MetaAiSession {
    fn send_prompt(&self, message: &str) -> anyhow::Result<Response> {
        let variables = json!({
            "message": { "sensitive_string_value": message },
            "externalConversationId": self.conversation_id,
            "offlineThreadingId": offline_threading_id(),
            "suggestedPromptIndex": null,
            "entrypoint": "ABRA__CHAT__TEXT",
            "icebreaker_type": "TEXT",
        });

        let variables = variables.to_string();
        let form = [
            ("access_token", self.access_token.as_str()),
            ("fb_api_caller_class", "RelayModern"),
            ("fb_api_req_friendly_name", "useAbraSendMessageMutation"),
            ("variables", variables.as_str()),
            ("server_timestamps", "true"),
            ("doc_id", "7783822248314888"),
        ];

        let resp = self
            .client
            .post(GRAPHQL_URL)
            .header("Cookie", self.cookie_header.as_str())
            .form(&form)
            .send()
            .context("submitting prompt")?;

        if !resp.status().is_success() {
            return Err(anyhow!("meta.ai returned {}", resp.status()));
        }
        Ok(resp)
    }
}

impl AiSession for MetaAiSession {
    fn prompt(&mut self, message: &str) -> anyhow::Result<String> {
        let mut stream = self.prompt_stream(message)?;
        let mut last = String::new();
        while let Some(chunk) = stream.next_chunk()? {
            last = chunk.message;
        }
        Ok(last)
    }

    fn prompt_stream(&mut self, message: &str) -> anyhow::Result<Box<dyn ChunkStream>> {
        let resp = self.send_prompt(message)?;
        Ok(Box::new(MetaAiChunkStream {
            lines: BufReader::new(resp).lines(),
            done: false,
        }))
    }
}

/// Streamed graphql response, one JSON document per line.
struct MetaAiChunkStream {
    lines: std::io::Lines<BufReader<Response>>,
    done: bool,
}

impl ChunkStream for MetaAiChunkStream {
    fn next_chunk(&mut self) -> anyhow::Result<Option<StreamChunk>> {
        if self.done {
            return Ok(None);
        }
        loop {
            let Some(line) = self.lines.next() else {
                self.done = true;
                return Ok(None);
            };
            let line = line.context("reading response stream")?;
            if line.trim().is_empty() {
                continue;
            }
            let payload: Value = match serde_json::from_str(&line) {
                Ok(v) => v,
                // Interleaved non-JSON keepalive lines are skipped.
                Err(_) => continue,
            };
            if let Some(chunk) = parse_stream_line(&payload) {
                if chunk_is_final(&payload) {
                    self.done = true;
                }
                return Ok(Some(chunk));
            }
        }
    }
}

/// Collect Set-Cookie values into a single Cookie header.
fn collect_cookies(resp: &Response) -> String {
    resp.headers()
        .get_all("set-cookie")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(|v| v.split(';').next())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Extract `"key":{"field":"<value>"}` style tokens from the landing page.
fn extract_value(page: &str, key: &str, field: &str) -> Option<String> {
    let pattern = format!(r#""{}",\[\],\{{"{}":"([^"]+)""#, key, field);
    Regex::new(&pattern)
        .ok()?
        .captures(page)
        .map(|c| c[1].to_string())
}

/// Exchange the page tokens for a temporary guest access token.
fn request_access_token(client: &Client, cookies: &str, lsd: &str) -> anyhow::Result<String> {
    let variables = json!({ "dob": "1999-01-01", "icebreaker_type": "TEXT" }).to_string();
    let form = [
        ("lsd", lsd),
        ("fb_api_caller_class", "RelayModern"),
        (
            "fb_api_req_friendly_name",
            "useAbraAcceptTOSForTempUserMutation",
        ),
        ("variables", variables.as_str()),
        ("doc_id", "7604648749596940"),
    ];

    let resp = client
        .post(format!("{}api/graphql/", META_AI_URL))
        .header("Cookie", cookies)
        .header("x-fb-lsd", lsd)
        .form(&form)
        .send()
        .context("requesting access token")?;

    let body: Value = resp.json().context("parsing access token response")?;
    body.pointer("/data/xab_abra_accept_terms_of_service/new_temp_user_auth/access_token")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| anyhow!("access token missing from response"))
}

/// Pull a cumulative snapshot out of one streamed graphql line.
fn parse_stream_line(payload: &Value) -> Option<StreamChunk> {
    let message = payload.pointer("/data/node/bot_response_message")?;
    let snippet = message.get("snippet").and_then(Value::as_str)?;

    let sources = message
        .pointer("/search_results/references")
        .and_then(Value::as_array)
        .map(|refs| {
            refs.iter()
                .filter_map(|r| {
                    Some(Source {
                        label: r.get("title").and_then(Value::as_str)?.to_string(),
                        link: r.get("link").and_then(Value::as_str)?.to_string(),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    Some(StreamChunk {
        message: snippet.to_string(),
        sources,
        error: None,
    })
}

fn chunk_is_final(payload: &Value) -> bool {
    payload
        .pointer("/data/node/bot_response_message/streaming_state")
        .and_then(Value::as_str)
        .is_some_and(|s| s == "OVERALL_DONE")
}

/// Decimal threading id in the shape the graphql surface expects.
fn offline_threading_id() -> String {
    let now = chrono::Utc::now().timestamp_millis() as u64;
    let random: u64 = rand::thread_rng().gen_range(0..(1 << 22));
    ((now << 22) | random).to_string()
}
