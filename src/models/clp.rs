use serde::{Deserialize, Deserializer, Serialize};

// Types mirroring the JSON returned by the cluster manager's RESTful API.
// Every field defaults so narrowed `?select=` projections still decode,
// and an explicit `null` decodes the same as a missing key.

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Fixed status vocabulary reported by the cluster manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    Unknown,
    Normal,
    Caution,
    Error,
    Unused,
    Suspend,
    Online,
    Offline,
    OnlinePending,
    OfflinePending,
    OnlineFailure,
    OfflineFailure,
}

impl Status {
    pub const ALL: [Status; 12] = [
        Status::Unknown,
        Status::Normal,
        Status::Caution,
        Status::Error,
        Status::Unused,
        Status::Suspend,
        Status::Online,
        Status::Offline,
        Status::OnlinePending,
        Status::OfflinePending,
        Status::OnlineFailure,
        Status::OfflineFailure,
    ];

    /// Parses an upstream status label. Labels outside the vocabulary yield `None`.
    pub fn parse(label: &str) -> Option<Status> {
        Status::ALL.into_iter().find(|s| s.as_str() == label)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Unknown => "Unknown",
            Status::Normal => "Normal",
            Status::Caution => "Caution",
            Status::Error => "Error",
            Status::Unused => "Unused",
            Status::Suspend => "Suspend",
            Status::Online => "Online",
            Status::Offline => "Offline",
            Status::OnlinePending => "Online Pending",
            Status::OfflinePending => "Offline Pending",
            Status::OnlineFailure => "Online Failure",
            Status::OfflineFailure => "Offline Failure",
        }
    }
}

/// The `result` object every response carries.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ApiResult {
    #[serde(default, deserialize_with = "null_as_default")]
    pub code: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClusterInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClusterToratio {
    #[serde(default, deserialize_with = "null_as_default")]
    pub toratio: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ServerInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ResourceInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current: String,
    /// Name of the owning group. This is the association the panel trusts.
    #[serde(default, deserialize_with = "null_as_default")]
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct GroupInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub current: String,
    /// Advisory copy of the group's resources as the upstream nests them.
    /// The panel groups resources by `ResourceInfo::group` instead.
    #[serde(default, deserialize_with = "null_as_default")]
    pub resources: Vec<ResourceInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct MonitorInfo {
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, rename = "type", deserialize_with = "null_as_default")]
    pub kind: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub status: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub servers: Vec<ServerInfo>,
}

/// One poll result for one upstream, tagged with the upstream's base URL.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ClusterStatus {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cluster: Option<ClusterInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub servers: Option<Vec<ServerInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups: Option<Vec<GroupInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<Vec<ResourceInfo>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monitors: Option<Vec<MonitorInfo>>,
}

/// Identity and credentials of one upstream.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientOptions {
    /// Base URL such as `http://server1:29009`.
    pub clpserver: String,
    pub user: String,
    pub passwd: String,
}

/// Command request as sent by a viewer.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct ExecuteOperationParams {
    pub cmd: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ratio: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logdir: Option<String>,
}

impl ExecuteOperationParams {
    pub fn new(cmd: &str) -> Self {
        Self {
            cmd: cmd.to_string(),
            ..Default::default()
        }
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    pub fn with_target(mut self, target: &str) -> Self {
        self.target = Some(target.to_string());
        self
    }
}
