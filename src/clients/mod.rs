pub mod operation;
pub mod relay;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::time::Duration;

use crate::error::ApiError;
use crate::models::clp::{
    ApiResult, ClientOptions, ClusterInfo, ClusterStatus, ClusterToratio, ExecuteOperationParams,
    GroupInfo, MonitorInfo, ResourceInfo, ServerInfo,
};

use operation::Operation;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the HTTP client shared by every upstream.
pub fn build_http(skip_certificate_check: bool) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(REQUEST_TIMEOUT)
        .danger_accept_invalid_certs(skip_certificate_check)
        .build()
}

/// Client for one cluster's RESTful API.
pub struct ClpClient {
    pub clpserver: String,
    auth: String,
    http: Client,
}

/// A decoded response: request path, transport status, `result` envelope and payload fields.
struct Envelope {
    path: String,
    status: StatusCode,
    result: Option<ApiResult>,
    payload: Map<String, Value>,
}

fn entity<'a>(collection: &'a str, name: Option<&'a str>) -> Vec<&'a str> {
    std::iter::once(collection).chain(name).collect()
}

impl ClpClient {
    pub fn new(opts: &ClientOptions, http: Client) -> Self {
        let credential = STANDARD.encode(format!("{}:{}", opts.user, opts.passwd));
        Self {
            clpserver: opts.clpserver.clone(),
            auth: format!("Basic {}", credential),
            http,
        }
    }

    pub async fn get_cluster(&self) -> Result<ClusterInfo, ApiError> {
        self.get_field(&["cluster"], None, "cluster").await
    }

    pub async fn get_toratio(&self) -> Result<ClusterToratio, ApiError> {
        self.get_field(&["cluster", "toratio"], None, "cluster").await
    }

    pub async fn get_servers(&self, name: Option<&str>) -> Result<Vec<ServerInfo>, ApiError> {
        self.get_field(&entity("servers", name), None, "servers").await
    }

    pub async fn get_server_names(&self) -> Result<Vec<ServerInfo>, ApiError> {
        self.get_field(&["servers"], Some("name"), "servers").await
    }

    pub async fn get_groups(&self, name: Option<&str>) -> Result<Vec<GroupInfo>, ApiError> {
        self.get_field(&entity("groups", name), None, "groups").await
    }

    pub async fn get_group_names(&self, name: Option<&str>) -> Result<Vec<GroupInfo>, ApiError> {
        self.get_field(&entity("groups", name), Some("name"), "groups").await
    }

    pub async fn get_group_resources(
        &self,
        name: Option<&str>,
    ) -> Result<Vec<GroupInfo>, ApiError> {
        self.get_field(&entity("groups", name), Some("resources"), "groups").await
    }

    pub async fn get_resources(&self, name: Option<&str>) -> Result<Vec<ResourceInfo>, ApiError> {
        self.get_field(&entity("resources", name), None, "resources").await
    }

    pub async fn get_resource_names(&self) -> Result<Vec<ResourceInfo>, ApiError> {
        self.get_field(&["resources"], Some("name"), "resources").await
    }

    pub async fn get_monitors(&self, name: Option<&str>) -> Result<Vec<MonitorInfo>, ApiError> {
        self.get_field(&entity("monitors", name), None, "monitors").await
    }

    pub async fn get_monitor_names(&self) -> Result<Vec<MonitorInfo>, ApiError> {
        self.get_field(&["monitors"], Some("name"), "monitors").await
    }

    /// Fetches cluster, servers, groups, resources and monitors in turn.
    /// The first failing fetch fails the whole status.
    pub async fn get_cluster_status(&self) -> Result<ClusterStatus, ApiError> {
        let cluster = self.get_cluster().await?;
        let servers = self.get_servers(None).await?;
        let groups = self.get_groups(None).await?;
        let resources = self.get_resources(None).await?;
        let monitors = self.get_monitors(None).await?;

        Ok(ClusterStatus {
            id: self.clpserver.clone(),
            cluster: Some(cluster),
            servers: Some(servers),
            groups: Some(groups),
            resources: Some(resources),
            monitors: Some(monitors),
        })
    }

    pub async fn start_cluster(&self) -> Result<(), ApiError> {
        self.execute(&Operation::StartCluster).await
    }

    pub async fn stop_cluster(&self) -> Result<(), ApiError> {
        self.execute(&Operation::StopCluster).await
    }

    pub async fn reboot_cluster(&self) -> Result<(), ApiError> {
        self.execute(&Operation::RebootCluster).await
    }

    pub async fn shutdown_cluster(&self) -> Result<(), ApiError> {
        self.execute(&Operation::ShutdownCluster).await
    }

    pub async fn suspend_cluster(&self) -> Result<(), ApiError> {
        self.execute(&Operation::SuspendCluster).await
    }

    pub async fn resume_cluster(&self) -> Result<(), ApiError> {
        self.execute(&Operation::ResumeCluster).await
    }

    pub async fn set_toratio(&self, ratio: i64, time: &str) -> Result<(), ApiError> {
        self.execute(&Operation::SetToratio {
            ratio,
            time: time.to_string(),
        })
        .await
    }

    pub async fn reset_toratio(&self) -> Result<(), ApiError> {
        self.execute(&Operation::ResetToratio).await
    }

    pub async fn start_server(&self, name: &str) -> Result<(), ApiError> {
        self.execute(&Operation::StartServer { name: name.into() }).await
    }

    pub async fn stop_server(&self, name: &str) -> Result<(), ApiError> {
        self.execute(&Operation::StopServer { name: name.into() }).await
    }

    pub async fn reboot_server(&self, name: &str) -> Result<(), ApiError> {
        self.execute(&Operation::RebootServer { name: name.into() }).await
    }

    pub async fn shutdown_server(&self, name: &str) -> Result<(), ApiError> {
        self.execute(&Operation::ShutdownServer { name: name.into() }).await
    }

    pub async fn start_group(&self, name: Option<&str>, target: Option<&str>) -> Result<(), ApiError> {
        self.execute(&Operation::StartGroup {
            name: name.map(String::from),
            target: target.map(String::from),
        })
        .await
    }

    pub async fn stop_group(&self, name: Option<&str>, target: Option<&str>) -> Result<(), ApiError> {
        self.execute(&Operation::StopGroup {
            name: name.map(String::from),
            target: target.map(String::from),
        })
        .await
    }

    pub async fn move_group(&self, name: &str, target: Option<&str>) -> Result<(), ApiError> {
        self.execute(&Operation::MoveGroup {
            name: name.into(),
            target: target.map(String::from),
        })
        .await
    }

    pub async fn start_resource(&self, name: &str, target: &str) -> Result<(), ApiError> {
        self.execute(&Operation::StartResource {
            name: name.into(),
            target: target.into(),
        })
        .await
    }

    pub async fn stop_resource(&self, name: &str) -> Result<(), ApiError> {
        self.execute(&Operation::StopResource { name: name.into() }).await
    }

    pub async fn suspend_monitor(&self, name: &str, target: &str) -> Result<(), ApiError> {
        self.execute(&Operation::SuspendMonitor {
            name: name.into(),
            target: target.into(),
        })
        .await
    }

    pub async fn resume_monitor(&self, name: &str, target: &str) -> Result<(), ApiError> {
        self.execute(&Operation::ResumeMonitor {
            name: name.into(),
            target: target.into(),
        })
        .await
    }

    pub async fn run_script(
        &self,
        script: &str,
        target: &str,
        timeout: u64,
        logdir: &str,
    ) -> Result<(), ApiError> {
        self.execute(&Operation::RunScript {
            script: script.into(),
            target: target.into(),
            timeout,
            logdir: logdir.into(),
        })
        .await
    }

    /// Runs the command a viewer named. Unknown names fail with
    /// `InvalidOperation` before any request is made.
    pub async fn exec_operation(&self, params: &ExecuteOperationParams) -> Result<(), ApiError> {
        let op = Operation::from_params(params)?;
        self.execute(&op).await
    }

    pub async fn execute(&self, op: &Operation) -> Result<(), ApiError> {
        let req = op.request();
        let env = self
            .send(Method::POST, &req.segments, None, req.body.as_ref())
            .await?;

        if !env.status.is_success() {
            let message = env.result.map(|r| r.message).unwrap_or_default();
            return Err(ApiError::Rejected {
                status: env.status.as_u16(),
                message: rejection_message(env.status, &message),
            });
        }
        let result = env
            .result
            .ok_or_else(|| ApiError::protocol(&req.path(), "missing result envelope"))?;

        // A successful POST can still report a failed operation in the message.
        if !result.message.is_empty() {
            return Err(ApiError::Rejected {
                status: env.status.as_u16(),
                message: result.message,
            });
        }
        Ok(())
    }

    async fn get_field<T: DeserializeOwned>(
        &self,
        segments: &[&str],
        select: Option<&str>,
        field: &str,
    ) -> Result<T, ApiError> {
        let mut env = self.send(Method::GET, segments, select, None).await?;
        let path = std::mem::take(&mut env.path);

        if !env.status.is_success() {
            let message = env.result.map(|r| r.message).unwrap_or_default();
            return Err(ApiError::Rejected {
                status: env.status.as_u16(),
                message: rejection_message(env.status, &message),
            });
        }
        if env.result.is_none() {
            return Err(ApiError::protocol(&path, "missing result envelope"));
        }

        let value = env
            .payload
            .remove(field)
            .ok_or_else(|| ApiError::protocol(&path, format!("missing field {:?}", field)))?;
        serde_json::from_value(value).map_err(|e| ApiError::protocol(&path, e))
    }

    /// Builds `<clpserver>/api/v1/<segments>[?select=..]`, percent-encoding
    /// each segment so names containing `/`, `?` or `#` stay one segment.
    fn url(&self, segments: &[impl AsRef<str>], select: Option<&str>) -> Result<Url, ApiError> {
        let mut url = Url::parse(&self.clpserver)
            .map_err(|e| ApiError::protocol(&self.clpserver, e))?;
        url.path_segments_mut()
            .map_err(|_| ApiError::protocol(&self.clpserver, "base URL cannot carry a path"))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments);
        if let Some(s) = select {
            url.query_pairs_mut().append_pair("select", s);
        }
        Ok(url)
    }

    async fn send(
        &self,
        method: Method,
        segments: &[impl AsRef<str>],
        select: Option<&str>,
        body: Option<&Value>,
    ) -> Result<Envelope, ApiError> {
        let url = self.url(segments, select)?;
        let path = url.path().to_string();
        let mut req = self
            .http
            .request(method, url.clone())
            .header("Authorization", &self.auth)
            .header("Accept", "application/json");
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req.send().await.map_err(|source| ApiError::Transport {
            url: url.to_string(),
            source,
        })?;
        let status = resp.status();
        let bytes = resp
            .bytes()
            .await
            .map_err(|source| ApiError::Transport {
                url: url.to_string(),
                source,
            })?;

        let mut payload: Map<String, Value> = match serde_json::from_slice(&bytes) {
            Ok(p) => p,
            Err(_) if !status.is_success() => Map::new(),
            Err(e) => return Err(ApiError::protocol(&path, e)),
        };
        let result = match payload.remove("result") {
            Some(r) => Some(serde_json::from_value(r).map_err(|e| ApiError::protocol(&path, e))?),
            None => None,
        };

        Ok(Envelope {
            path,
            status,
            result,
            payload,
        })
    }
}

fn rejection_message(status: StatusCode, message: &str) -> String {
    if message.is_empty() {
        status.to_string()
    } else {
        message.to_string()
    }
}
