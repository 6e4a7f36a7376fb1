use serde_json::{Value, json};

use crate::error::ApiError;
use crate::models::clp::ExecuteOperationParams;

/// Every command the cluster manager accepts, with its required arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Operation {
    StartCluster,
    StopCluster,
    RebootCluster,
    ShutdownCluster,
    SuspendCluster,
    ResumeCluster,
    SetToratio { ratio: i64, time: String },
    ResetToratio,
    StartServer { name: String },
    StopServer { name: String },
    RebootServer { name: String },
    ShutdownServer { name: String },
    StartGroup { name: Option<String>, target: Option<String> },
    StopGroup { name: Option<String>, target: Option<String> },
    MoveGroup { name: String, target: Option<String> },
    StartResource { name: String, target: String },
    StopResource { name: String },
    SuspendMonitor { name: String, target: String },
    ResumeMonitor { name: String, target: String },
    RunScript { script: String, target: String, timeout: u64, logdir: String },
}

/// Path segments (below `/api/v1`) and optional JSON body of one command POST.
/// Segments are kept raw and percent-encoded when the URL is built.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandRequest {
    pub segments: Vec<String>,
    pub body: Option<Value>,
}

impl CommandRequest {
    /// Unencoded path, for logs and error messages.
    pub fn path(&self) -> String {
        format!("/api/v1/{}", self.segments.join("/"))
    }
}

fn required<T>(cmd: &str, param: &'static str, value: Option<T>) -> Result<T, ApiError> {
    value.ok_or_else(|| ApiError::MissingParameter {
        cmd: cmd.to_string(),
        param,
    })
}

fn target_body(target: &Option<String>) -> Option<Value> {
    target.as_ref().map(|t| json!({ "target": t }))
}

fn segs(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

fn groups_path(name: &Option<String>, action: &str) -> Vec<String> {
    match name {
        Some(n) => segs(&["groups", n.as_str(), action]),
        None => segs(&["groups", action]),
    }
}

impl Operation {
    /// Resolves a viewer command into an operation. Unknown command names are
    /// rejected with `InvalidOperation`; missing required arguments with
    /// `MissingParameter`. Neither case reaches the network.
    pub fn from_params(params: &ExecuteOperationParams) -> Result<Self, ApiError> {
        let cmd = params.cmd.as_str();
        let name = || required(cmd, "name", params.name.clone());
        let target = || required(cmd, "target", params.target.clone());

        let op = match cmd {
            "startCluster" => Operation::StartCluster,
            "stopCluster" => Operation::StopCluster,
            "rebootCluster" => Operation::RebootCluster,
            "shutdownCluster" => Operation::ShutdownCluster,
            "suspendCluster" => Operation::SuspendCluster,
            "resumeCluster" => Operation::ResumeCluster,
            "setToratio" => Operation::SetToratio {
                ratio: required(cmd, "ratio", params.ratio)?,
                time: required(cmd, "time", params.time.clone())?,
            },
            "resetToratio" => Operation::ResetToratio,
            "startServer" => Operation::StartServer { name: name()? },
            "stopServer" => Operation::StopServer { name: name()? },
            "rebootServer" => Operation::RebootServer { name: name()? },
            "shutdownServer" => Operation::ShutdownServer { name: name()? },
            "startGroup" => Operation::StartGroup {
                name: params.name.clone(),
                target: params.target.clone(),
            },
            "stopGroup" => Operation::StopGroup {
                name: params.name.clone(),
                target: params.target.clone(),
            },
            "moveGroup" => Operation::MoveGroup {
                name: name()?,
                target: params.target.clone(),
            },
            "startResource" => Operation::StartResource {
                name: name()?,
                target: target()?,
            },
            "stopResource" => Operation::StopResource { name: name()? },
            "suspendMonitor" => Operation::SuspendMonitor {
                name: name()?,
                target: target()?,
            },
            "resumeMonitor" => Operation::ResumeMonitor {
                name: name()?,
                target: target()?,
            },
            "runScript" => Operation::RunScript {
                script: required(cmd, "script", params.script.clone())?,
                target: target()?,
                timeout: required(cmd, "timeout", params.timeout)?,
                logdir: required(cmd, "logdir", params.logdir.clone())?,
            },
            _ => return Err(ApiError::InvalidOperation(params.cmd.clone())),
        };
        Ok(op)
    }

    pub fn request(&self) -> CommandRequest {
        let (segments, body) = match self {
            Operation::StartCluster => (segs(&["cluster", "start"]), None),
            Operation::StopCluster => (segs(&["cluster", "stop"]), None),
            Operation::RebootCluster => (segs(&["cluster", "reboot"]), None),
            Operation::ShutdownCluster => (segs(&["cluster", "shutdown"]), None),
            Operation::SuspendCluster => (segs(&["cluster", "suspend"]), None),
            Operation::ResumeCluster => (segs(&["cluster", "resume"]), None),
            Operation::SetToratio { ratio, time } => (
                segs(&["cluster", "toratio", "set"]),
                Some(json!({ "ratio": ratio, "time": time })),
            ),
            Operation::ResetToratio => (segs(&["cluster", "toratio", "reset"]), None),
            Operation::StartServer { name } => (segs(&["servers", name.as_str(), "start"]), None),
            Operation::StopServer { name } => (segs(&["servers", name.as_str(), "stop"]), None),
            Operation::RebootServer { name } => {
                (segs(&["servers", name.as_str(), "reboot"]), None)
            }
            Operation::ShutdownServer { name } => {
                (segs(&["servers", name.as_str(), "shutdown"]), None)
            }
            Operation::StartGroup { name, target } => {
                (groups_path(name, "start"), target_body(target))
            }
            Operation::StopGroup { name, target } => (groups_path(name, "stop"), target_body(target)),
            Operation::MoveGroup { name, target } => {
                (segs(&["groups", name.as_str(), "move"]), target_body(target))
            }
            Operation::StartResource { name, target } => (
                segs(&["resources", name.as_str(), "start"]),
                Some(json!({ "target": target })),
            ),
            Operation::StopResource { name } => {
                (segs(&["resources", name.as_str(), "stop"]), None)
            }
            Operation::SuspendMonitor { name, target } => (
                segs(&["monitors", name.as_str(), "suspend"]),
                Some(json!({ "target": target })),
            ),
            Operation::ResumeMonitor { name, target } => (
                segs(&["monitors", name.as_str(), "resume"]),
                Some(json!({ "target": target })),
            ),
            Operation::RunScript {
                script,
                target,
                timeout,
                logdir,
            } => (
                segs(&["scripts", "run"]),
                Some(json!({
                    "script": script,
                    "target": target,
                    "timeout": timeout,
                    "logdir": logdir,
                })),
            ),
        };
        CommandRequest { segments, body }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(params: ExecuteOperationParams) -> CommandRequest {
        Operation::from_params(&params).unwrap().request()
    }

    #[test]
    fn cluster_commands_post_without_body() {
        for (cmd, action) in [
            ("startCluster", "start"),
            ("stopCluster", "stop"),
            ("rebootCluster", "reboot"),
            ("shutdownCluster", "shutdown"),
            ("suspendCluster", "suspend"),
            ("resumeCluster", "resume"),
        ] {
            let r = req(ExecuteOperationParams::new(cmd));
            assert_eq!(r.path(), format!("/api/v1/cluster/{}", action));
            assert_eq!(r.body, None);
        }
    }

    #[test]
    fn toratio_commands() {
        let mut p = ExecuteOperationParams::new("setToratio");
        p.ratio = Some(200);
        p.time = Some("1h".to_string());
        let r = req(p);
        assert_eq!(r.path(), "/api/v1/cluster/toratio/set");
        assert_eq!(r.body, Some(json!({ "ratio": 200, "time": "1h" })));

        let r = req(ExecuteOperationParams::new("resetToratio"));
        assert_eq!(r.path(), "/api/v1/cluster/toratio/reset");
        assert_eq!(r.body, None);
    }

    #[test]
    fn server_commands_need_a_name() {
        for (cmd, action) in [
            ("startServer", "start"),
            ("stopServer", "stop"),
            ("rebootServer", "reboot"),
            ("shutdownServer", "shutdown"),
        ] {
            let r = req(ExecuteOperationParams::new(cmd).with_name("server1"));
            assert_eq!(r.path(), format!("/api/v1/servers/server1/{}", action));
            assert_eq!(r.body, None);

            let err = Operation::from_params(&ExecuteOperationParams::new(cmd)).unwrap_err();
            assert!(matches!(err, ApiError::MissingParameter { param: "name", .. }));
        }
    }

    #[test]
    fn group_commands() {
        let r = req(ExecuteOperationParams::new("startGroup"));
        assert_eq!(r.path(), "/api/v1/groups/start");
        assert_eq!(r.body, None);

        let r = req(
            ExecuteOperationParams::new("startGroup")
                .with_name("failover1")
                .with_target("server1"),
        );
        assert_eq!(r.path(), "/api/v1/groups/failover1/start");
        assert_eq!(r.body, Some(json!({ "target": "server1" })));

        let r = req(ExecuteOperationParams::new("stopGroup").with_name("failover1"));
        assert_eq!(r.path(), "/api/v1/groups/failover1/stop");
        assert_eq!(r.body, None);

        let r = req(ExecuteOperationParams::new("moveGroup").with_name("grpA"));
        assert_eq!(r.path(), "/api/v1/groups/grpA/move");
        assert_eq!(r.body, None);

        let r = req(
            ExecuteOperationParams::new("moveGroup")
                .with_name("grpA")
                .with_target("server2"),
        );
        assert_eq!(r.body, Some(json!({ "target": "server2" })));
    }

    #[test]
    fn names_stay_single_segments() {
        let r = req(ExecuteOperationParams::new("stopServer").with_name("rack/1?x#y"));
        assert_eq!(r.segments, vec!["servers", "rack/1?x#y", "stop"]);
    }

    #[test]
    fn resource_and_monitor_commands() {
        let r = req(
            ExecuteOperationParams::new("startResource")
                .with_name("fip1")
                .with_target("server1"),
        );
        assert_eq!(r.path(), "/api/v1/resources/fip1/start");
        assert_eq!(r.body, Some(json!({ "target": "server1" })));

        let err = Operation::from_params(&ExecuteOperationParams::new("startResource").with_name("fip1"))
            .unwrap_err();
        assert!(matches!(err, ApiError::MissingParameter { param: "target", .. }));

        let r = req(ExecuteOperationParams::new("stopResource").with_name("fip1"));
        assert_eq!(r.path(), "/api/v1/resources/fip1/stop");
        assert_eq!(r.body, None);

        for action in ["suspend", "resume"] {
            let r = req(
                ExecuteOperationParams::new(&format!("{}Monitor", action))
                    .with_name("userw")
                    .with_target("server2"),
            );
            assert_eq!(r.path(), format!("/api/v1/monitors/userw/{}", action));
            assert_eq!(r.body, Some(json!({ "target": "server2" })));
        }
    }

    #[test]
    fn run_script_carries_all_arguments() {
        let mut p = ExecuteOperationParams::new("runScript").with_target("server1");
        p.script = Some("backup.sh".to_string());
        p.timeout = Some(30);
        p.logdir = Some("/var/log/clp".to_string());
        let r = req(p);
        assert_eq!(r.path(), "/api/v1/scripts/run");
        assert_eq!(
            r.body,
            Some(json!({
                "script": "backup.sh",
                "target": "server1",
                "timeout": 30,
                "logdir": "/var/log/clp",
            }))
        );
    }

    #[test]
    fn unknown_command_is_invalid() {
        let err = Operation::from_params(&ExecuteOperationParams::new("formatDisk")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidOperation(ref c) if c == "formatDisk"));
        assert_eq!(err.to_string(), "Invalid operation (formatDisk)");
    }
}
