use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};
use tokio::task::JoinHandle;
use tokio::time::{self, Duration};
use tracing::{debug, error, info, warn};

use crate::error::ApiError;
use crate::models::clp::{ClientOptions, ClusterStatus, ExecuteOperationParams};
use crate::routes::ui::render_panel;

use super::ClpClient;

pub const POLL_INTERVAL: Duration = Duration::from_secs(5);

const STATUS_CHANNEL_CAPACITY: usize = 64;

/// One snapshot as broadcast to every viewer. The panel is rendered once
/// per snapshot; `html` is `None` when rendering failed.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusUpdate {
    pub status: ClusterStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
}

impl StatusUpdate {
    pub fn render(status: ClusterStatus) -> Self {
        let html = match render_panel(&status) {
            Ok(h) => Some(h),
            Err(e) => {
                error!("rendering panel for {}: {}", status.id, e);
                None
            }
        };
        Self { status, html }
    }
}

/// Owns one `ClpClient` per upstream, polls them and fans results out to viewers.
pub struct Relay {
    clients: RwLock<HashMap<String, Arc<ClpClient>>>,
    http: reqwest::Client,
    status_tx: broadcast::Sender<Arc<StatusUpdate>>,
    poll_interval: Duration,
}

impl Relay {
    pub fn new(http: reqwest::Client) -> Self {
        let (status_tx, _) = broadcast::channel(STATUS_CHANNEL_CAPACITY);
        Self {
            clients: RwLock::new(HashMap::new()),
            http,
            status_tx,
            poll_interval: POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Registers upstreams keyed by `clpserver`; a repeated key replaces the earlier client.
    pub async fn add_cluster_servers<'a>(&self, opts: impl IntoIterator<Item = &'a ClientOptions>) {
        let mut clients = self.clients.write().await;
        for o in opts {
            if clients
                .insert(o.clpserver.clone(), Arc::new(ClpClient::new(o, self.http.clone())))
                .is_some()
            {
                info!("replaced cluster server {}", o.clpserver);
            } else {
                info!("registered cluster server {}", o.clpserver);
            }
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StatusUpdate>> {
        self.status_tx.subscribe()
    }

    pub async fn upstream_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.clients.read().await.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub async fn client(&self, id: &str) -> Result<Arc<ClpClient>, ApiError> {
        self.clients
            .read()
            .await
            .get(id)
            .cloned()
            .ok_or_else(|| ApiError::UnknownUpstream(id.to_string()))
    }

    /// Fetches status from every upstream concurrently and broadcasts each success.
    /// Returns the number of statuses broadcast.
    pub async fn poll_cycle(&self) -> usize {
        let clients = self.snapshot().await;
        if clients.is_empty() {
            info!("no cluster servers registered");
            return 0;
        }

        let mut handles = Vec::new();
        for client in clients {
            let c = client.clone();
            handles.push(tokio::spawn(async move {
                match c.get_cluster_status().await {
                    Ok(status) => Some(status),
                    Err(e) => {
                        warn!("error getting cluster status from {}: {}", c.clpserver, e);
                        None
                    }
                }
            }));
        }

        let statuses = settle(handles).await;
        let sent = statuses.len();
        for status in statuses {
            let update = Arc::new(StatusUpdate::render(status));
            if self.status_tx.send(update).is_err() {
                debug!("no viewers connected");
            }
        }
        sent
    }

    /// Polls until shutdown, sleeping the poll interval after each cycle settles.
    pub async fn run_poller(self: Arc<Self>, mut shutdown: tokio::sync::watch::Receiver<()>) {
        loop {
            self.poll_cycle().await;

            tokio::select! {
                _ = time::sleep(self.poll_interval) => {}
                _ = shutdown.changed() => {
                    info!("poller shutting down");
                    return;
                }
            }
        }
    }

    /// Relays a viewer command to the upstream it names.
    pub async fn execute(&self, id: &str, params: &ExecuteOperationParams) -> Result<(), ApiError> {
        let client = self.client(id).await?;
        info!("operation [{}] {} name={:?} target={:?}", id, params.cmd, params.name, params.target);
        client.exec_operation(params).await.inspect_err(|e| {
            warn!("operation {} on {} failed: {}", params.cmd, id, e);
        })
    }

    async fn snapshot(&self) -> Vec<Arc<ClpClient>> {
        self.clients.read().await.values().cloned().collect()
    }
}

/// Waits for every fetch task and keeps the successful statuses in spawn order.
async fn settle(handles: Vec<JoinHandle<Option<ClusterStatus>>>) -> Vec<ClusterStatus> {
    let mut statuses = Vec::with_capacity(handles.len());
    for handle in handles {
        match handle.await {
            Ok(Some(status)) => statuses.push(status),
            Ok(None) => {}
            Err(e) => warn!("status fetch task failed: {}", e),
        }
    }
    statuses
}
