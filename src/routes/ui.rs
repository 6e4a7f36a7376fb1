use askama::Template;
use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use std::collections::{HashMap, HashSet};

use crate::models::clp::{
    ClusterStatus, ExecuteOperationParams, MonitorInfo, ResourceInfo, ServerInfo, Status,
};
use crate::models::views::*;
use crate::AppState;

/// CSS class for an upstream status label. Labels outside the vocabulary get `unknown`.
pub fn status_class(label: &str) -> &'static str {
    match Status::parse(label) {
        Some(Status::Normal) => "gui-normal",
        Some(Status::Error) => "gui-error",
        Some(Status::Caution) => "gui-warning",
        Some(Status::Online) => "gui-online",
        Some(Status::Offline) => "gui-offline",
        Some(Status::OnlinePending) => "gui-online-pending",
        Some(Status::OfflinePending) => "gui-offline-pending",
        Some(Status::OnlineFailure) => "gui-online-failure",
        Some(Status::OfflineFailure) => "gui-offline-failure",
        Some(Status::Suspend) => "gui-suspend",
        Some(Status::Unused) => "gui-unused",
        Some(Status::Unknown) | None => "unknown",
    }
}

// --- View Builders ---

fn button(icon: &str, title: &str, params: ExecuteOperationParams) -> ActionButton {
    ActionButton {
        icon: icon.to_string(),
        title: title.to_string(),
        params_json: serde_json::to_string(&params).unwrap_or_default(),
        params,
    }
}

fn build_server_view(sv: &ServerInfo) -> ServerView {
    ServerView {
        name: sv.name.clone(),
        status: sv.status.clone(),
        status_class: status_class(&sv.status).to_string(),
    }
}

fn build_resource_view(res: &ResourceInfo) -> ResourceView {
    ResourceView {
        name: res.name.clone(),
        kind: res.kind.clone(),
        status: res.status.clone(),
        status_class: status_class(&res.status).to_string(),
    }
}

fn build_monitor_view(mon: &MonitorInfo) -> MonitorView {
    MonitorView {
        name: mon.name.clone(),
        kind: mon.kind.clone(),
        status: mon.status.clone(),
        status_class: status_class(&mon.status).to_string(),
    }
}

/// Lays out one status snapshot. Resources are attached to groups through
/// their own `group` field; the list nested in each group is ignored.
pub fn build_panel_view(status: &ClusterStatus) -> PanelView {
    let servers = status.servers.as_deref().unwrap_or_default();
    let groups = status.groups.as_deref().unwrap_or_default();
    let resources = status.resources.as_deref().unwrap_or_default();
    let monitors = status.monitors.as_deref().unwrap_or_default();
    let (cluster_name, cluster_status) = status
        .cluster
        .as_ref()
        .map(|c| (c.name.clone(), c.status.clone()))
        .unwrap_or_default();

    let group_names: HashSet<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    let mut by_group: HashMap<&str, Vec<ResourceView>> = HashMap::new();
    let mut ungrouped = Vec::new();
    for res in resources {
        if group_names.contains(res.group.as_str()) {
            by_group
                .entry(res.group.as_str())
                .or_default()
                .push(build_resource_view(res));
        } else {
            ungrouped.push(build_resource_view(res));
        }
    }

    let default_target = servers.first().map(|s| s.name.as_str());

    let group_views = groups
        .iter()
        .map(|grp| {
            let mut start = ExecuteOperationParams::new("startGroup").with_name(&grp.name);
            if let Some(t) = default_target {
                start = start.with_target(t);
            }
            GroupView {
                name: grp.name.clone(),
                status: grp.status.clone(),
                status_class: status_class(&grp.status).to_string(),
                current: grp.current.clone(),
                actions: vec![
                    button("start", "Start Group", start),
                    button(
                        "stop",
                        "Stop Group",
                        ExecuteOperationParams::new("stopGroup").with_name(&grp.name),
                    ),
                    button(
                        "failover",
                        "Move Group",
                        ExecuteOperationParams::new("moveGroup").with_name(&grp.name),
                    ),
                ],
                resources: by_group.remove(grp.name.as_str()).unwrap_or_default(),
            }
        })
        .collect();

    PanelView {
        id: status.id.clone(),
        cluster_status_class: status_class(&cluster_status).to_string(),
        cluster_name,
        cluster_status,
        cluster_actions: vec![
            button("power", "Shutdown", ExecuteOperationParams::new("shutdownCluster")),
            button("reboot", "Reboot", ExecuteOperationParams::new("rebootCluster")),
            button("start", "Start Cluster", ExecuteOperationParams::new("startCluster")),
            button("stop", "Stop Cluster", ExecuteOperationParams::new("stopCluster")),
        ],
        servers: servers.iter().map(build_server_view).collect(),
        groups: group_views,
        ungrouped,
        monitors: monitors.iter().map(build_monitor_view).collect(),
        updated: chrono::Local::now().format("%H:%M:%S").to_string(),
    }
}

// --- Templates ---

#[derive(Template)]
#[template(path = "panel.html")]
struct PanelTemplate {
    panel: PanelView,
}

/// Renders the status card sent to viewers with every snapshot.
pub fn render_panel(status: &ClusterStatus) -> Result<String, askama::Error> {
    PanelTemplate {
        panel: build_panel_view(status),
    }
    .render()
}

fn render_template(tmpl: &impl Template) -> Response {
    match tmpl.render() {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            tracing::error!("template error: {}", e);
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
        }
    }
}

// --- Dashboard ---

#[derive(Template)]
#[template(path = "dashboard.html")]
struct DashboardTemplate {
    title: String,
    upstreams: Vec<String>,
}

pub async fn handle_dashboard(State(state): State<AppState>) -> Response {
    let tmpl = DashboardTemplate {
        title: "Cluster Status".to_string(),
        upstreams: state.relay.upstream_ids().await,
    };

    render_template(&tmpl)
}
