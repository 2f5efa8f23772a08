//! 交互命令
//!
//! 输入线程把 stdin 的每一行解析为 [`Command`]，主线程对管理器执行。

use robot_controllers_interface::{ControllerManager, Handle, JointHandle};
use std::fmt::Write;

/// 台架命令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start(String),
    Stop(String),
    /// 列出控制器及状态
    List,
    /// 列出关节状态
    Joints,
    /// 输出指标
    Stats,
    Help,
    Quit,
}

impl Command {
    /// 解析一行输入（空行返回 `Ok(None)`）
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let mut parts = line.split_whitespace();
        let Some(verb) = parts.next() else {
            return Ok(None);
        };
        let arg = parts.next();
        if parts.next().is_some() {
            return Err(format!("Too many arguments for '{}'", verb));
        }

        let command = match (verb, arg) {
            ("start", Some(name)) => Command::Start(name.to_string()),
            ("stop", Some(name)) => Command::Stop(name.to_string()),
            ("start" | "stop", None) => return Err(format!("Usage: {} <controller>", verb)),
            ("list", None) => Command::List,
            ("joints", None) => Command::Joints,
            ("stats", None) => Command::Stats,
            ("help", None) => Command::Help,
            ("quit" | "exit", None) => Command::Quit,
            _ => return Err(format!("Unknown command: {}", line.trim())),
        };
        Ok(Some(command))
    }

    /// 对管理器执行，返回要打印的文本
    pub fn execute(&self, manager: &ControllerManager) -> String {
        match self {
            Command::Start(name) => match manager.request_start(name) {
                Ok(()) => format!("started {}", name),
                Err(e) => format!("start {} failed (code {}): {}", name, e.code(), e),
            },
            Command::Stop(name) => match manager.request_stop(name) {
                Ok(()) => format!("stopped {}", name),
                Err(e) => format!("stop {} failed (code {}): {}", name, e.code(), e),
            },
            Command::List => list_controllers(manager),
            Command::Joints => list_joints(manager),
            Command::Stats => {
                let m = manager.metrics();
                format!(
                    "cycles={} updates={} failures={} halted={} skipped={} conflicts={} clock_regressions={} failure_rate={:.4}",
                    m.cycles_total,
                    m.controller_updates,
                    m.update_failures,
                    m.controllers_halted,
                    m.updates_skipped,
                    m.start_conflicts,
                    m.clock_regressions,
                    m.failure_rate()
                )
            },
            Command::Help => HELP.trim_end().to_string(),
            Command::Quit => "bye".to_string(),
        }
    }
}

const HELP: &str = "
commands:
  start <controller>   request start (fails on resource conflict)
  stop <controller>    request stop
  list                 controllers, state and claimed joints
  joints               joint positions
  stats                manager metrics
  quit                 exit
";

fn list_controllers(manager: &ControllerManager) -> String {
    let mut out = String::new();
    for loader in manager.controllers() {
        let _ = writeln!(
            out,
            "{:<16} {:<12} {:<34} [{}]",
            loader.name(),
            loader.state(),
            loader.type_name(),
            loader.claimed_names().join(", ")
        );
    }
    out.trim_end().to_string()
}

fn list_joints(manager: &ControllerManager) -> String {
    let mut out = String::new();
    for joint in manager.joints().iter() {
        let _ = writeln!(
            out,
            "{:<16} pos={:>9.4} vel={:>9.4} eff={:>9.4}",
            joint.name(),
            joint.position(),
            joint.velocity(),
            joint.effort()
        );
    }
    out.trim_end().to_string()
}
