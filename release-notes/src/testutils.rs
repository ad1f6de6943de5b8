//! In-process upstream servers and JSON fixtures shared by the tests.

use crate::config::{Config, ConfluenceConfig, GocdConfig, JiraConfig, Listener};
use http_body_util::{BodyExt, Full};
use hyper::body::{Bytes, Incoming};
use hyper::header::CONTENT_TYPE;
use hyper::service::service_fn;
use hyper::{HeaderMap, Method, Request, Response, StatusCode};
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto::Builder;
use secrecy::SecretString;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use url::Url;

/// Canned response served for one method and path.
#[derive(Clone, Debug)]
pub struct MockRoute {
    method: Method,
    path: String,
    status: StatusCode,
    body: String,
}

impl MockRoute {
    pub fn get(path: &str, status: StatusCode, body: impl ToString) -> Self {
        Self::new(Method::GET, path, status, body)
    }

    pub fn post(path: &str, status: StatusCode, body: impl ToString) -> Self {
        Self::new(Method::POST, path, status, body)
    }

    fn new(method: Method, path: &str, status: StatusCode, body: impl ToString) -> Self {
        MockRoute {
            method,
            path: path.to_string(),
            status,
            body: body.to_string(),
        }
    }
}

#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Upstream stand-in that answers from a fixed route table and records every
/// request it receives. Unknown routes get a 404.
pub struct MockUpstream {
    port: u16,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

impl MockUpstream {
    pub async fn start(routes: Vec<MockRoute>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("Failed to bind to address");
        let port = listener.local_addr().unwrap().port();

        let routes = Arc::new(routes);
        let requests = Arc::new(Mutex::new(Vec::new()));
        let recorded = requests.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = TokioIo::new(stream);
                let routes = routes.clone();
                let recorded = recorded.clone();

                let service = service_fn(move |req: Request<Incoming>| {
                    let routes = routes.clone();
                    let recorded = recorded.clone();
                    async move { respond(&routes, &recorded, req).await }
                });

                tokio::spawn(async move {
                    if let Err(err) = Builder::new(TokioExecutor::new())
                        .serve_connection(io, service)
                        .await
                    {
                        eprintln!("Error serving connection: {:?}", err);
                    }
                });
            }
        });

        MockUpstream { port, requests }
    }

    /// URL of this server with `path` as the API base.
    pub fn url(&self, path: &str) -> Url {
        Url::parse(&format!("http://127.0.0.1:{}{}", self.port, path)).unwrap()
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn hits(&self, path: &str) -> usize {
        self.requests().iter().filter(|r| r.path == path).count()
    }
}

async fn respond(
    routes: &[MockRoute],
    recorded: &Mutex<Vec<RecordedRequest>>,
    req: Request<Incoming>,
) -> Result<Response<Full<Bytes>>, hyper::Error> {
    let (parts, body) = req.into_parts();
    let body = body.collect().await?.to_bytes();
    let path = parts.uri.path().to_string();

    recorded.lock().unwrap().push(RecordedRequest {
        method: parts.method.clone(),
        path: path.clone(),
        headers: parts.headers,
        body,
    });

    let response = match routes
        .iter()
        .find(|route| route.method == parts.method && route.path == path)
    {
        Some(route) => Response::builder()
            .status(route.status)
            .header(CONTENT_TYPE, "application/json")
            .body(Full::new(Bytes::from(route.body.clone()))),
        None => Response::builder()
            .status(StatusCode::NOT_FOUND)
            .body(Full::new(Bytes::new())),
    };
    Ok(response.unwrap())
}

pub const GOCD_BASE: &str = "/go/api";
pub const JIRA_BASE: &str = "/rest/agile/latest";
pub const CONFLUENCE_BASE: &str = "/wiki/rest/api";

/// Config pointing every upstream at `upstream`, with inline credentials.
pub fn test_config(upstream: &MockUpstream) -> Config {
    Config {
        listener: Listener::default(),
        admin_listener: Listener {
            host: "127.0.0.1".into(),
            port: 8081,
        },
        upstream_timeout_secs: Some(5),
        accept_invalid_certs: false,
        secrets_dirs: Vec::new(),
        gocd: GocdConfig {
            url: upstream.url(GOCD_BASE),
            api_key: Some(SecretString::from("gocd-token")),
        },
        jira: JiraConfig {
            url: upstream.url(JIRA_BASE),
            user: "bot@example.com".into(),
            api_key: Some(SecretString::from("jira-token")),
            release_notes_field: "customfield_10110".into(),
        },
        confluence: ConfluenceConfig {
            url: upstream.url(CONFLUENCE_BASE),
            space_key: "RN".into(),
            convert_format: "editor2".into(),
            user: None,
            api_key: None,
        },
    }
}

/// Pipeline history record as returned by GoCD.
pub fn gocd_run_json(name: &str, counter: u64, label: &str, scheduled_date: i64) -> Value {
    json!({
        "name": name,
        "counter": counter,
        "label": label,
        "natural_order": 390.0,
        "can_run": true,
        "preparing_to_schedule": false,
        "comment": null,
        "scheduled_date": scheduled_date,
        "build_cause": {
            "trigger_message": "modified by dev <dev@example.com>",
            "trigger_forced": false,
            "approver": "",
            "material_revisions": [{
                "changed": true,
                "material": {
                    "name": "web",
                    "fingerprint": "abc123",
                    "type": "Git",
                    "description": "URL: https://github.com/example/web.git, Branch: main"
                },
                "modifications": [{
                    "revision": "0a1b2c",
                    "modified_time": scheduled_date,
                    "user_name": "dev <dev@example.com>",
                    "comment": "JI-1 fix login",
                    "email_address": null
                }]
            }]
        },
        "stages": [{
            "result": "Passed",
            "status": "Passed",
            "rerun_of_counter": null,
            "name": "build",
            "counter": "1",
            "scheduled": true,
            "approval_type": "success",
            "approved_by": "changes",
            "operate_permission": true,
            "can_run": true,
            "jobs": []
        }]
    })
}

/// Comparison record with one git material carrying `commit_messages`, plus
/// an upstream dependency material without commits.
pub fn gocd_comparison_json(name: &str, counter: u64, commit_messages: &[&str]) -> Value {
    let revisions: Vec<Value> = commit_messages
        .iter()
        .enumerate()
        .map(|(i, message)| {
            json!({
                "revision_sha": format!("sha{i}"),
                "modified_by": "dev <dev@example.com>",
                "modified_at": "2021-03-10T15:47:17Z",
                "commit_message": message
            })
        })
        .collect();

    json!({
        "_links": {
            "self": {"href": "https://gocd.example.com/go/api/pipelines/web/compare/1/2"},
            "doc": {"href": "https://api.gocd.org/current/#compare-pipeline-instances"}
        },
        "pipeline_name": name,
        "from_counter": counter - 1,
        "to_counter": counter,
        "is_bisect": false,
        "changes": [
            {
                "material": {
                    "type": "git",
                    "attributes": {
                        "destination": "web",
                        "filter": null,
                        "invert_filter": false,
                        "name": "web",
                        "auto_update": true,
                        "url": "https://github.com/example/web.git",
                        "branch": "main",
                        "submodule_folder": null,
                        "shallow_clone": false
                    }
                },
                "revision": revisions
            },
            {
                "material": {
                    "type": "dependency",
                    "attributes": {
                        "pipeline": "build-base",
                        "stage": "publish",
                        "name": "build-base",
                        "auto_update": true
                    }
                },
                "revision": [{
                    "revision": "build-base/12/publish/1",
                    "pipeline_counter": "12",
                    "completed_at": "2021-03-10T15:40:00Z"
                }]
            }
        ]
    })
}

/// Jira issue record; `notes` of `None` leaves the custom field null.
pub fn jira_issue_json(key: &str, issue_type: &str, notes: Option<&str>) -> Value {
    json!({
        "expand": "renderedFields,names,schema",
        "id": "10001",
        "self": format!("https://example.atlassian.net/rest/agile/latest/issue/{key}"),
        "key": key,
        "fields": {
            "customfield_10110": notes,
            "issuetype": {
                "self": "https://example.atlassian.net/rest/api/2/issuetype/10001",
                "id": "10001",
                "description": "",
                "name": issue_type,
                "subtask": false
            },
            "labels": [],
            "status": {"name": "Done"},
            "flagged": false
        }
    })
}
