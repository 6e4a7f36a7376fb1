use super::clp::ExecuteOperationParams;

/// A button on the panel and the command it sends when clicked.
#[derive(Debug, Clone)]
pub struct ActionButton {
    /// Symbol id inside `cluster.svg`.
    pub icon: String,
    pub title: String,
    pub params: ExecuteOperationParams,
    /// `params` as JSON, written into the button's `data-params` attribute.
    pub params_json: String,
}

#[derive(Debug, Clone, Default)]
pub struct ServerView {
    pub name: String,
    pub status: String,
    pub status_class: String,
}

#[derive(Debug, Clone, Default)]
pub struct ResourceView {
    pub name: String,
    pub kind: String,
    pub status: String,
    pub status_class: String,
}

#[derive(Debug, Clone, Default)]
pub struct GroupView {
    pub name: String,
    pub status: String,
    pub status_class: String,
    pub current: String,
    pub actions: Vec<ActionButton>,
    pub resources: Vec<ResourceView>,
}

#[derive(Debug, Clone, Default)]
pub struct MonitorView {
    pub name: String,
    pub kind: String,
    pub status: String,
    pub status_class: String,
}

/// Everything needed to draw one upstream's status card.
#[derive(Debug, Clone, Default)]
pub struct PanelView {
    pub id: String,
    pub cluster_name: String,
    pub cluster_status: String,
    pub cluster_status_class: String,
    pub cluster_actions: Vec<ActionButton>,
    pub servers: Vec<ServerView>,
    pub groups: Vec<GroupView>,
    /// Resources whose `group` names no listed group.
    pub ungrouped: Vec<ResourceView>,
    pub monitors: Vec<MonitorView>,
    pub updated: String,
}
