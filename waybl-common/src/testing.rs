//! Fakes shared by the unit tests.

use std::collections::HashSet;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use crate::error::{ProcessError, WayblError};
use crate::executor::{CommandOutput, CommandRunner, ExternalCommand};
use crate::scene::{NodeType, SceneNode};
use crate::Result;

/// Stands in for both ImageMagick and swaymsg.
#[derive(Default)]
pub struct FakeCompositor {
    pub log: Mutex<Vec<ExternalCommand>>,
    pub broken_outputs: Mutex<HashSet<String>>,
    render_time: Duration,
}

impl FakeCompositor {
    pub fn slow(render_time: Duration) -> Self {
        Self {
            render_time,
            ..Self::default()
        }
    }

    pub fn renders(&self) -> usize {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program_name() == "convert")
            .count()
    }

    /// `(output, image)` for every swaymsg invocation, in order.
    pub fn applies(&self) -> Vec<(String, String)> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.program_name() == "swaymsg")
            .map(|c| (c.args[1].clone(), c.args[3].trim_matches('"').to_string()))
            .collect()
    }

    pub fn applies_for(&self, output: &str) -> Vec<String> {
        self.applies()
            .into_iter()
            .filter(|(name, _)| name == output)
            .map(|(_, image)| image)
            .collect()
    }
}

impl CommandRunner for FakeCompositor {
    fn run(&self, command: ExternalCommand) -> impl Future<Output = Result<CommandOutput>> + Send {
        self.log.lock().unwrap().push(command.clone());
        let is_render = command.program_name() == "convert";
        let broken = !is_render && self.broken_outputs.lock().unwrap().contains(&command.args[1]);
        let delay = if is_render { self.render_time } else { Duration::ZERO };

        async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if is_render {
                std::fs::write(command.args.last().unwrap(), b"blurred").unwrap();
            }
            if broken {
                return Err(WayblError::Process(ProcessError::NonZeroExit {
                    code: 1,
                    stderr: "Error: output not found".to_string(),
                }));
            }
            Ok(CommandOutput::default())
        }
    }
}

/// Lets every worker run to completion; the paused clock skips retry delays.
pub async fn settle() {
    tokio::time::sleep(Duration::from_secs(60)).await;
}

/// A root with one output per entry, each holding a workspace that has a
/// visible window or nothing.
pub fn tree(outputs: &[(&str, bool)]) -> SceneNode {
    let mut root = SceneNode::new(NodeType::Other, "root");
    for (name, has_window) in outputs {
        let mut workspace = SceneNode::new(NodeType::Workspace, "1");
        if *has_window {
            workspace = workspace.with_child(SceneNode::new(NodeType::Container, "term").visible(true));
        }
        root = root.with_child(SceneNode::new(NodeType::Output, *name).with_child(workspace));
    }
    root
}
