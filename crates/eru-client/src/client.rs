//! HTTP client for the ERU API
//!
//! Every endpoint issues exactly one request; failures surface as
//! [`EruError`] and are never retried. List endpoints paginate with
//! `start`/`limit` query parameters, defaulting to `start=0, limit=20`.
//! Endpoints whose payload shape is owned by the server hand back raw
//! [`serde_json::Value`]s; the container inventory and the deploy and
//! removal envelopes are typed.

use std::collections::BTreeMap;
use std::path::Path;

use reqwest::{Client, Method, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::debug;
use url::Url;

use crate::config::{ClientConfig, EruClientBuilder};
use crate::error::{EruError, EruResult};
use crate::models::{Container, DeployResult, RemovalResult};

/// Optional parameters shared by the private and public deploy calls.
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    /// Ports to expose on the new containers.
    pub ports: Vec<u16>,
    /// Extra arguments passed to the entrypoint.
    pub args: Vec<String>,
    /// URL the server calls back once the deploy task settles.
    pub callback_url: String,
    /// Pin the deploy to a single host.
    pub host_name: Option<String>,
    /// Request specific addresses instead of letting the server pick.
    pub spec_ips: Vec<String>,
    /// Deploy a raw image instead of a built app version. Requires
    /// `image`.
    pub raw: bool,
    pub image: String,
}

/// Client for the ERU control plane.
///
/// Owns a single `reqwest::Client`; construct one per target cluster,
/// passing base URL, timeout and credentials up front. There is no
/// process-global session. All methods take `&self`, so the client can
/// be shared across tasks, but overlapping scaling calls on one
/// application race on the container snapshot (see
/// [`EruClient::scale_out`](crate::scaling)).
pub struct EruClient {
    http: Client,
    base_url: Url,
    config: ClientConfig,
}

impl EruClient {
    /// Create a client for `base_url` with default settings.
    pub fn new(base_url: &str) -> EruResult<Self> {
        Self::with_config(ClientConfig {
            base_url: base_url.to_string(),
            ..ClientConfig::default()
        })
    }

    pub fn builder() -> EruClientBuilder {
        EruClientBuilder::new()
    }

    pub fn with_config(config: ClientConfig) -> EruResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EruError::Transport(format!("failed to build HTTP client: {}", e)))?;
        let base_url = Url::parse(&config.base_url)?;

        Ok(Self {
            http,
            base_url,
            config,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a request with pagination defaults and credentials applied.
    fn prepare(
        &self,
        method: Method,
        path: &str,
        params: &[(&str, String)],
    ) -> EruResult<RequestBuilder> {
        let url = self.base_url.join(path)?;

        let mut query: Vec<(&str, String)> = params.to_vec();
        if !query.iter().any(|(k, _)| *k == "start") {
            query.push(("start", "0".to_string()));
        }
        if !query.iter().any(|(k, _)| *k == "limit") {
            query.push(("limit", "20".to_string()));
        }

        debug!(method = %method, url = %url, "sending request");

        let mut req = self.http.request(method, url).query(&query);
        if !self.config.username.is_empty() {
            req = req.basic_auth(&self.config.username, Some(&self.config.password));
        }
        Ok(req)
    }

    /// Send a prepared request and decode the JSON response, checking
    /// the status against `expected`. A mismatch is reported with the
    /// body's `error` field when the server provides one.
    async fn execute<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        expected: StatusCode,
    ) -> EruResult<T> {
        let resp = req.send().await?;
        let status = resp.status();
        let payload: Value = resp.json().await?;

        if status != expected {
            let message = payload
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("Unknown error")
                .to_string();
            return Err(EruError::UnexpectedStatus {
                code: status.as_u16(),
                message,
            });
        }

        serde_json::from_value(payload).map_err(EruError::from)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, params: &[(&str, String)]) -> EruResult<T> {
        let req = self.prepare(Method::GET, path, params)?;
        self.execute(req, StatusCode::OK).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: Value,
        expected: StatusCode,
    ) -> EruResult<T> {
        let req = self.prepare(Method::POST, path, &[])?.json(&body);
        self.execute(req, expected).await
    }

    async fn put<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> EruResult<T> {
        let mut req = self.prepare(Method::PUT, path, &[])?;
        if let Some(body) = body {
            req = req.json(&body);
        }
        self.execute(req, StatusCode::OK).await
    }

    async fn delete<T: DeserializeOwned>(&self, path: &str, body: Value) -> EruResult<T> {
        let req = self.prepare(Method::DELETE, path, &[])?.json(&body);
        self.execute(req, StatusCode::OK).await
    }

    // ---- apps ----------------------------------------------------------

    /// Register an app version with the control plane.
    ///
    /// `appyaml` is the parsed content of the app's `app.yaml`.
    pub async fn register_app_version(
        &self,
        version: &str,
        git: &str,
        token: &str,
        appyaml: Value,
        raw: bool,
    ) -> EruResult<Value> {
        let mut payload = json!({
            "version": version,
            "git": git,
            "token": token,
            "appyaml": appyaml,
        });
        if raw {
            payload["raw"] = json!(true);
        }
        self.post("/api/app/register/", payload, StatusCode::CREATED)
            .await
    }

    /// Set key-value pairs for an app under a named environment.
    pub async fn set_app_env(
        &self,
        name: &str,
        env: &str,
        vars: &BTreeMap<String, String>,
    ) -> EruResult<Value> {
        let mut payload = json!({ "env": env });
        for (key, value) in vars {
            payload[key.as_str()] = json!(value);
        }
        self.put(&format!("/api/app/{}/env/", name), Some(payload))
            .await
    }

    pub async fn delete_app_env(&self, name: &str, env: &str) -> EruResult<Value> {
        self.delete(&format!("/api/app/{}/env/", name), json!({ "env": env }))
            .await
    }

    /// All key-value pairs of one environment.
    pub async fn list_app_env_content(&self, name: &str, env: &str) -> EruResult<Value> {
        self.get(
            &format!("/api/app/{}/env/", name),
            &[("env", env.to_string())],
        )
        .await
    }

    /// Names of the environments defined for an app.
    pub async fn list_app_env_names(&self, name: &str) -> EruResult<Value> {
        self.get(&format!("/api/app/{}/listenv/", name), &[]).await
    }

    pub async fn get_app(&self, name: &str) -> EruResult<Value> {
        self.get(&format!("/api/app/{}/", name), &[]).await
    }

    pub async fn list_apps(&self, start: u64, limit: u64) -> EruResult<Value> {
        self.get("/api/app/", &pagination(start, limit)).await
    }

    pub async fn get_version(&self, name: &str, version: &str) -> EruResult<Value> {
        self.get(&format!("/api/app/{}/{}/", name, version), &[])
            .await
    }

    pub async fn list_app_versions(&self, name: &str, start: u64, limit: u64) -> EruResult<Value> {
        self.get(
            &format!("/api/app/{}/versions/", name),
            &pagination(start, limit),
        )
        .await
    }

    /// Containers of an app; the scale planners' only data source.
    pub async fn list_app_containers(
        &self,
        name: &str,
        start: u64,
        limit: u64,
    ) -> EruResult<Vec<Container>> {
        self.get(
            &format!("/api/app/{}/containers/", name),
            &pagination(start, limit),
        )
        .await
    }

    pub async fn list_app_tasks(&self, name: &str, start: u64, limit: u64) -> EruResult<Value> {
        self.get(
            &format!("/api/app/{}/tasks/", name),
            &pagination(start, limit),
        )
        .await
    }

    pub async fn list_version_containers(
        &self,
        name: &str,
        version: &str,
        start: u64,
        limit: u64,
    ) -> EruResult<Vec<Container>> {
        self.get(
            &format!("/api/app/{}/{}/containers/", name, version),
            &pagination(start, limit),
        )
        .await
    }

    pub async fn list_version_tasks(
        &self,
        name: &str,
        version: &str,
        start: u64,
        limit: u64,
    ) -> EruResult<Value> {
        self.get(
            &format!("/api/app/{}/{}/tasks/", name, version),
            &pagination(start, limit),
        )
        .await
    }

    // ---- deploys -------------------------------------------------------

    /// Deploy containers with privately bound cores.
    ///
    /// The field names of the payload are fixed by the server; do not
    /// rename them.
    #[allow(clippy::too_many_arguments)]
    pub async fn deploy_private(
        &self,
        pod_name: &str,
        app_name: &str,
        ncore: f64,
        ncontainer: u64,
        version: &str,
        entrypoint: &str,
        env: &str,
        networks: &[String],
        opts: &DeployOptions,
    ) -> EruResult<DeployResult> {
        let mut payload = json!({
            "podname": pod_name,
            "appname": app_name,
            "ncore": ncore_value(ncore),
            "ncontainer": ncontainer,
            "version": version,
            "entrypoint": entrypoint,
            "env": env,
            "networks": networks,
        });
        apply_deploy_options(&mut payload, opts)?;
        self.post("/api/deploy/private/", payload, StatusCode::OK)
            .await
    }

    /// Deploy containers without core binding.
    #[allow(clippy::too_many_arguments)]
    pub async fn deploy_public(
        &self,
        pod_name: &str,
        app_name: &str,
        ncontainer: u64,
        version: &str,
        entrypoint: &str,
        env: &str,
        networks: &[String],
        opts: &DeployOptions,
    ) -> EruResult<DeployResult> {
        let mut payload = json!({
            "podname": pod_name,
            "appname": app_name,
            "ncontainer": ncontainer,
            "version": version,
            "entrypoint": entrypoint,
            "env": env,
            "networks": networks,
        });
        apply_deploy_options(&mut payload, opts)?;
        self.post("/api/deploy/public/", payload, StatusCode::OK)
            .await
    }

    /// Kick off an image build for an app version.
    pub async fn build_image(
        &self,
        pod_name: &str,
        app_name: &str,
        base: &str,
        version: &str,
    ) -> EruResult<Value> {
        let payload = json!({
            "podname": pod_name,
            "appname": app_name,
            "base": base,
            "version": version,
        });
        self.post("/api/deploy/build/", payload, StatusCode::OK)
            .await
    }

    /// Take a whole app version offline.
    pub async fn offline_version(
        &self,
        pod_name: &str,
        app_name: &str,
        version: &str,
    ) -> EruResult<Value> {
        let payload = json!({
            "podname": pod_name,
            "appname": app_name,
            "version": version,
        });
        self.post("/api/deploy/rmversion/", payload, StatusCode::OK)
            .await
    }

    /// Remove the given containers. An empty id list is a server-side
    /// no-op but the request is still issued.
    pub async fn remove_containers(&self, container_ids: &[String]) -> EruResult<RemovalResult> {
        self.post(
            "/api/deploy/rmcontainers/",
            json!({ "cids": container_ids }),
            StatusCode::OK,
        )
        .await
    }

    // ---- containers ----------------------------------------------------

    pub async fn get_container(&self, id_or_sha256: &str) -> EruResult<Value> {
        self.get(&format!("/api/container/{}/", id_or_sha256), &[])
            .await
    }

    /// Mark a container dead.
    pub async fn kill_container(&self, container_id: &str) -> EruResult<Value> {
        self.put(&format!("/api/container/{}/kill/", container_id), None)
            .await
    }

    /// Mark a container alive again.
    pub async fn cure_container(&self, container_id: &str) -> EruResult<Value> {
        self.put(&format!("/api/container/{}/cure/", container_id), None)
            .await
    }

    pub async fn start_container(&self, container_id: &str) -> EruResult<Value> {
        self.put(&format!("/api/container/{}/start/", container_id), None)
            .await
    }

    pub async fn stop_container(&self, container_id: &str) -> EruResult<Value> {
        self.put(&format!("/api/container/{}/stop/", container_id), None)
            .await
    }

    /// Container liveness as the server sees it; `status` 1 means alive.
    pub async fn poll_container(&self, container_id: &str) -> EruResult<Value> {
        self.get(&format!("/api/container/{}/poll/", container_id), &[])
            .await
    }

    pub async fn bind_container_network(
        &self,
        app_name: &str,
        container_id: &str,
        network_names: &[String],
    ) -> EruResult<Value> {
        let payload = json!({
            "appname": app_name,
            "networks": network_names,
        });
        self.put(
            &format!("/api/container/{}/bind_network", container_id),
            Some(payload),
        )
        .await
    }

    // ---- pods ----------------------------------------------------------

    pub async fn create_pod(&self, name: &str, description: &str) -> EruResult<Value> {
        let payload = json!({
            "name": name,
            "description": description,
        });
        self.post("/api/pod/create/", payload, StatusCode::CREATED)
            .await
    }

    pub async fn get_pod(&self, id_or_name: &str) -> EruResult<Value> {
        self.get(&format!("/api/pod/{}/", id_or_name), &[]).await
    }

    pub async fn list_pods(&self, start: u64, limit: u64) -> EruResult<Value> {
        self.get("/api/pod/list/", &pagination(start, limit)).await
    }

    pub async fn list_pod_hosts(
        &self,
        pod_name_or_id: &str,
        start: u64,
        limit: u64,
        show_all: bool,
    ) -> EruResult<Value> {
        let mut params = pagination(start, limit);
        if show_all {
            params.push(("all", "1".to_string()));
        }
        self.get(&format!("/api/pod/{}/hosts/", pod_name_or_id), &params)
            .await
    }

    // ---- hosts ---------------------------------------------------------

    /// Register a docker host under a pod.
    ///
    /// Host name and basic information are taken from `docker info` by
    /// the server. When `docker_cert_path` is given, `ca.pem`,
    /// `cert.pem` and `key.pem` are uploaded from that directory.
    pub async fn create_host(
        &self,
        addr: &str,
        pod_name: &str,
        is_public: bool,
        docker_cert_path: Option<&Path>,
    ) -> EruResult<Value> {
        // werkzeug only parses a non-empty form value as true
        let is_public_value = if is_public { "1" } else { "" };
        let mut form = reqwest::multipart::Form::new()
            .text("addr", addr.to_string())
            .text("podname", pod_name.to_string())
            .text("is_public", is_public_value.to_string());

        if let Some(dir) = docker_cert_path {
            for (field, file_name) in [("ca", "ca.pem"), ("cert", "cert.pem"), ("key", "key.pem")] {
                let bytes = tokio::fs::read(dir.join(file_name)).await.map_err(|e| {
                    EruError::InvalidRequest(format!("cannot read {}: {}", file_name, e))
                })?;
                form = form.part(
                    field,
                    reqwest::multipart::Part::bytes(bytes).file_name(file_name),
                );
            }
        }

        let req = self
            .prepare(Method::POST, "/api/host/create/", &[])?
            .multipart(form);
        self.execute(req, StatusCode::CREATED).await
    }

    pub async fn get_host(&self, host_name: &str) -> EruResult<Value> {
        self.get(&format!("/api/host/{}/", host_name), &[]).await
    }

    /// Mark a host down; its containers show up as dead.
    pub async fn kill_host(&self, host_name: &str) -> EruResult<Value> {
        self.put(&format!("/api/host/{}/down/", host_name), None)
            .await
    }

    /// Mark a host up again.
    pub async fn cure_host(&self, host_name: &str) -> EruResult<Value> {
        self.put(&format!("/api/host/{}/cure/", host_name), None)
            .await
    }

    pub async fn list_host_containers(
        &self,
        host_name: &str,
        start: u64,
        limit: u64,
    ) -> EruResult<Vec<Container>> {
        self.get(
            &format!("/api/host/{}/containers/", host_name),
            &pagination(start, limit),
        )
        .await
    }

    // ---- networks ------------------------------------------------------

    /// Create a macvlan network; `netspace` is CIDR like `10.200.0.0/16`.
    pub async fn create_network(&self, name: &str, netspace: &str) -> EruResult<Value> {
        let payload = json!({
            "name": name,
            "netspace": netspace,
        });
        self.post("/api/network/create/", payload, StatusCode::CREATED)
            .await
    }

    pub async fn get_network(&self, id_or_name: &str) -> EruResult<Value> {
        self.get(&format!("/api/network/{}/", id_or_name), &[])
            .await
    }

    pub async fn list_networks(&self, start: u64, limit: u64) -> EruResult<Value> {
        self.get("/api/network/list/", &pagination(start, limit))
            .await
    }

    // ---- tasks ---------------------------------------------------------

    pub async fn get_task(&self, task_id: u64) -> EruResult<Value> {
        self.get(&format!("/api/task/{}/", task_id), &[]).await
    }

    pub async fn get_task_log(&self, task_id: u64) -> EruResult<Value> {
        self.get(&format!("/api/task/{}/log/", task_id), &[]).await
    }

    // ---- misc ----------------------------------------------------------

    /// Server banner from `/`, as plain text.
    pub async fn version(&self) -> EruResult<String> {
        let url = self.base_url.join("/")?;
        let resp = self.http.get(url).send().await?;
        Ok(resp.text().await?)
    }
}

fn pagination(start: u64, limit: u64) -> Vec<(&'static str, String)> {
    vec![("start", start.to_string()), ("limit", limit.to_string())]
}

/// Keep whole core counts as JSON integers, matching what the server
/// has always been sent.
fn ncore_value(ncore: f64) -> Value {
    if ncore.fract() == 0.0 {
        json!(ncore as u64)
    } else {
        json!(ncore)
    }
}

fn apply_deploy_options(payload: &mut Value, opts: &DeployOptions) -> EruResult<()> {
    if opts.raw && opts.image.is_empty() {
        return Err(EruError::InvalidRequest(
            "raw and image must be set together".to_string(),
        ));
    }

    payload["ports"] = json!(opts.ports);
    payload["args"] = json!(opts.args);
    payload["callback_url"] = json!(opts.callback_url);

    if opts.raw {
        payload["raw"] = json!(true);
        payload["image"] = json!(opts.image);
    }
    if let Some(host_name) = &opts.host_name {
        payload["hostname"] = json!(host_name);
    }
    if !opts.spec_ips.is_empty() {
        payload["spec_ips"] = json!(opts.spec_ips);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ncore_serialization() {
        assert_eq!(ncore_value(2.0), json!(2));
        assert_eq!(ncore_value(1.4), json!(1.4));
    }

    #[test]
    fn test_deploy_options_require_image_for_raw() {
        let mut payload = json!({});
        let opts = DeployOptions {
            raw: true,
            ..DeployOptions::default()
        };
        assert!(apply_deploy_options(&mut payload, &opts).is_err());
    }

    #[test]
    fn test_deploy_options_optional_fields() {
        let mut payload = json!({});
        let opts = DeployOptions {
            host_name: Some("host-7".to_string()),
            spec_ips: vec!["10.1.0.9".to_string()],
            ..DeployOptions::default()
        };
        apply_deploy_options(&mut payload, &opts).unwrap();

        assert_eq!(payload["hostname"], json!("host-7"));
        assert_eq!(payload["spec_ips"], json!(["10.1.0.9"]));
        assert!(payload.get("raw").is_none());
        assert_eq!(payload["ports"], json!([]));
    }
}
