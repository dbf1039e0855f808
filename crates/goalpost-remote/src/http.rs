//! HTTP-over-JSON implementation of [`RemoteGateway`].

use async_trait::async_trait;
use reqwest::header::COOKIE;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::config::RemoteConfig;
use crate::gateway::{GatewayError, RemoteGateway};
use crate::models::{
    BatchReorder, Goal, GoalPatch, NewGoal, NewTask, PlanScope, Task, TaskPatch,
};

/// Gateway that talks to the goal/task service over HTTP.
///
/// Credentials from the config (session cookie and/or bearer token) are
/// attached to every request.
pub struct HttpGateway {
    config: RemoteConfig,
    http: reqwest::Client,
}

impl HttpGateway {
    pub fn new(config: RemoteConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| GatewayError::Transport(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { config, http })
    }

    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = self.config.url(path);
        tracing::debug!(%method, %url, "remote request");
        let mut req = self.http.request(method, url);
        if let Some(cookie) = &self.config.session_cookie {
            req = req.header(COOKIE, cookie.as_str());
        }
        if let Some(token) = &self.config.auth_token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Send a request and turn non-2xx statuses into errors.
    async fn send(&self, req: RequestBuilder) -> Result<Response, GatewayError> {
        let resp = req.send().await.map_err(transport_error)?;
        let status = resp.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(GatewayError::Unauthorized);
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(GatewayError::Rejected {
                status: status.as_u16(),
                message: error_message(&body, status),
            });
        }
        Ok(resp)
    }

    async fn send_json<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T, GatewayError> {
        let resp = self.send(req).await?;
        let bytes = resp.bytes().await.map_err(transport_error)?;
        serde_json::from_slice(&bytes).map_err(|e| GatewayError::Decode(e.to_string()))
    }

    async fn send_unit(&self, req: RequestBuilder) -> Result<(), GatewayError> {
        self.send(req).await.map(|_| ())
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.send_json(self.request(Method::POST, path).json(body))
            .await
    }

    async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, GatewayError> {
        self.send_json(self.request(Method::PUT, path).json(body))
            .await
    }
}

fn transport_error(err: reqwest::Error) -> GatewayError {
    if err.is_decode() {
        GatewayError::Decode(err.to_string())
    } else {
        GatewayError::Transport(err.to_string())
    }
}

/// Pull the `{"error": "..."}` message the service sends, falling back to
/// the raw body or the status reason.
fn error_message(body: &str, status: StatusCode) -> String {
    let from_json = serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(str::to_owned));
    match from_json {
        Some(msg) => msg,
        None if !body.trim().is_empty() => body.trim().to_owned(),
        None => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_owned(),
    }
}

#[async_trait]
impl RemoteGateway for HttpGateway {
    async fn list_goals(&self) -> Result<Vec<Goal>, GatewayError> {
        self.send_json(self.request(Method::GET, "/goals")).await
    }

    async fn create_goal(&self, goal: &NewGoal) -> Result<Goal, GatewayError> {
        self.post("/goals", goal).await
    }

    async fn update_goal(&self, id: i64, patch: &GoalPatch) -> Result<Goal, GatewayError> {
        self.put(&format!("/goals/{id}"), patch).await
    }

    async fn delete_goal(&self, id: i64) -> Result<(), GatewayError> {
        self.send_unit(self.request(Method::DELETE, &format!("/goals/{id}")))
            .await
    }

    async fn list_tasks(&self, goal_id: i64) -> Result<Vec<Task>, GatewayError> {
        self.send_json(self.request(Method::GET, &format!("/goals/{goal_id}/tasks")))
            .await
    }

    async fn create_task(&self, goal_id: i64, task: &NewTask) -> Result<Task, GatewayError> {
        self.post(&format!("/goals/{goal_id}/tasks"), task).await
    }

    async fn update_task(&self, id: i64, patch: &TaskPatch) -> Result<Task, GatewayError> {
        self.put(&format!("/tasks/{id}"), patch).await
    }

    async fn delete_task(&self, id: i64) -> Result<(), GatewayError> {
        self.send_unit(self.request(Method::DELETE, &format!("/tasks/{id}")))
            .await
    }

    async fn batch_reorder(&self, batch: &BatchReorder) -> Result<(), GatewayError> {
        self.send_unit(self.request(Method::POST, "/tasks/batch-update").json(batch))
            .await
    }

    async fn generate_plan(&self, scope: PlanScope) -> Result<Vec<Task>, GatewayError> {
        let path = match scope {
            PlanScope::Goal(id) => format!("/goals/{id}/generate-plan"),
            PlanScope::Task(id) => format!("/tasks/{id}/generate-plan"),
        };
        self.send_json(self.request(Method::POST, &path)).await
    }
}
