//! Collaborator-call controller.
//!
//! Receives commands from the UI layer, runs the corresponding collaborator
//! call on the runtime and emits the completion as a `WorkflowEvent`. One
//! call is in flight at a time; the machine's gating keeps further commands
//! from being issued while this one is pending, and anything that slips
//! through is dropped.

use crate::model::{Profile, SessionToken, ShareSet, WorkflowEvent};
use crate::service::MatchService;
use crate::workflow::{matches, shares};
use anyhow::Result;
use std::sync::Arc;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

/// Commands emitted by UI layers to drive the workflow's network steps.
#[derive(Debug, Clone)]
pub enum WorkflowCommand {
    GenerateShares { profile: Profile },
    UploadShares { shares: ShareSet, handle: String },
    FetchMatches { token: SessionToken },
    Quit,
}

enum PendingKind {
    Generate,
    Upload,
    Fetch,
}

impl PendingKind {
    fn failure_event(&self, message: String) -> WorkflowEvent {
        match self {
            PendingKind::Generate => WorkflowEvent::GenerateFailed { message },
            PendingKind::Upload => WorkflowEvent::UploadFailed { message },
            PendingKind::Fetch => WorkflowEvent::MatchFetchFailed { message },
        }
    }
}

pub async fn run_controller(
    service: Arc<dyn MatchService>,
    mut cmd_rx: UnboundedReceiver<WorkflowCommand>,
    event_tx: UnboundedSender<WorkflowEvent>,
) -> Result<()> {
    let mut active: Option<(PendingKind, JoinHandle<WorkflowEvent>)> = None;

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => {
                let Some(cmd) = cmd else { break };
                if matches!(cmd, WorkflowCommand::Quit) {
                    // No cancellation: an in-flight call is simply abandoned
                    // with the process.
                    break;
                }
                if active.is_some() {
                    continue;
                }
                active = Some(spawn_call(service.clone(), cmd));
            }
            // Do not take the JoinHandle before this branch wins; otherwise it
            // can be dropped when another branch is chosen and completion is
            // never observed.
            done = async {
                match active.as_mut() {
                    Some((_, handle)) => handle.await,
                    None => futures::future::pending().await,
                }
            } => {
                if let Some((kind, _)) = active.take() {
                    match done {
                        Ok(ev) => {
                            let _ = event_tx.send(ev);
                        }
                        Err(e) => {
                            let _ = event_tx.send(kind.failure_event(format!("task failed: {e}")));
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

fn spawn_call(
    service: Arc<dyn MatchService>,
    cmd: WorkflowCommand,
) -> (PendingKind, JoinHandle<WorkflowEvent>) {
    match cmd {
        WorkflowCommand::GenerateShares { profile } => (
            PendingKind::Generate,
            tokio::spawn(async move { shares::generate(service.as_ref(), &profile).await }),
        ),
        WorkflowCommand::UploadShares { shares: set, handle } => (
            PendingKind::Upload,
            tokio::spawn(async move { shares::upload(service.as_ref(), &set, &handle).await }),
        ),
        WorkflowCommand::FetchMatches { token } => (
            PendingKind::Fetch,
            tokio::spawn(async move { matches::retrieve(service.as_ref(), &token).await }),
        ),
        WorkflowCommand::Quit => unreachable!("quit is handled before dispatch"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::support::{sample_profile, sample_shares, MockService};
    use tokio::sync::mpsc::unbounded_channel;

    #[tokio::test]
    async fn commands_complete_as_events() {
        let service = Arc::new(
            MockService::default()
                .with_shares(sample_shares(3))
                .with_token("abc"),
        );
        let (cmd_tx, cmd_rx) = unbounded_channel();
        let (event_tx, mut event_rx) = unbounded_channel();
        let controller = tokio::spawn(run_controller(service.clone(), cmd_rx, event_tx));

        cmd_tx
            .send(WorkflowCommand::GenerateShares {
                profile: sample_profile(),
            })
            .unwrap();
        let ev = event_rx.recv().await.unwrap();
        assert!(matches!(ev, WorkflowEvent::SharesGenerated { .. }));

        cmd_tx
            .send(WorkflowCommand::UploadShares {
                shares: sample_shares(3),
                handle: "alice".into(),
            })
            .unwrap();
        let ev = event_rx.recv().await.unwrap();
        match ev {
            WorkflowEvent::UploadAccepted { token } => assert_eq!(token.as_str(), "abc"),
            other => panic!("unexpected event: {other:?}"),
        }

        cmd_tx.send(WorkflowCommand::Quit).unwrap();
        controller.await.unwrap().unwrap();
        assert_eq!(service.calls().split, 1);
        assert_eq!(service.calls().upload, 1);
    }

    #[tokio::test]
    async fn closing_the_command_channel_stops_the_controller() {
        let service = Arc::new(MockService::default());
        let (cmd_tx, cmd_rx) = unbounded_channel::<WorkflowCommand>();
        let (event_tx, _event_rx) = unbounded_channel();
        let controller = tokio::spawn(run_controller(service, cmd_rx, event_tx));

        drop(cmd_tx);
        controller.await.unwrap().unwrap();
    }
}
