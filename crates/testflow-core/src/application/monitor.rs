//! Live execution monitor channels.
//!
//! A [`MonitorChannel`] owns a background task that consumes the inbound
//! message stream of one execution and publishes snapshots through a
//! `watch` channel. Channels are fully independent of each other.

use dashmap::DashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::execution::{
    ExecutionId, ExecutionMonitor, ExecutionStatus, MonitorCommand, MonitorEvent, MonitorSnapshot,
};
use crate::domain::repository::ExecutionCommandSink;
use crate::CoreError;

/// One item of the inbound stream
#[derive(Debug, Clone, PartialEq)]
pub enum ChannelMessage {
    /// Raw JSON text frame
    Text(String),
    /// Already decoded event
    Event(MonitorEvent),
    /// The connection closed
    Disconnected,
    /// The connection failed
    Failed(String),
}

/// Live feed for a single execution
pub struct MonitorChannel {
    execution_id: ExecutionId,
    state: watch::Receiver<MonitorSnapshot>,
    sink: Arc<dyn ExecutionCommandSink>,
    shutdown: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl MonitorChannel {
    /// Start consuming `inbound` for `execution_id`.
    ///
    /// Must be called from within a tokio runtime.
    pub fn open(
        execution_id: ExecutionId,
        initial: ExecutionStatus,
        inbound: mpsc::Receiver<ChannelMessage>,
        sink: Arc<dyn ExecutionCommandSink>,
    ) -> Self {
        let monitor = ExecutionMonitor::new(execution_id, initial);
        let (state_tx, state_rx) = watch::channel(monitor.snapshot().clone());
        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        let task = tokio::spawn(run_channel(monitor, inbound, state_tx, shutdown_rx));
        info!(execution_id = %execution_id, status = %initial, "Opened monitor channel");

        Self {
            execution_id,
            state: state_rx,
            sink,
            shutdown: Some(shutdown_tx),
            task: Some(task),
        }
    }

    /// Execution this channel follows
    pub fn execution_id(&self) -> ExecutionId {
        self.execution_id
    }

    /// Latest snapshot
    pub fn snapshot(&self) -> MonitorSnapshot {
        self.state.borrow().clone()
    }

    /// Receiver notified on every snapshot change
    pub fn subscribe(&self) -> watch::Receiver<MonitorSnapshot> {
        self.state.clone()
    }

    /// Request a pause; returns false when not sent
    pub async fn pause(&self) -> Result<bool, CoreError> {
        self.command(MonitorCommand::Pause).await
    }

    /// Request a resume; returns false when not sent
    pub async fn resume(&self) -> Result<bool, CoreError> {
        self.command(MonitorCommand::Resume).await
    }

    /// Request cancellation; returns false when not sent
    pub async fn cancel(&self) -> Result<bool, CoreError> {
        self.command(MonitorCommand::Cancel).await
    }

    /// Send `command` if the current state allows it.
    ///
    /// The local state is left alone; it changes only when the backend
    /// reports the new status.
    pub async fn command(&self, command: MonitorCommand) -> Result<bool, CoreError> {
        let status = self.state.borrow().status;
        dispatch(self.sink.as_ref(), self.execution_id, status, command).await
    }

    /// True once `close` has run
    pub fn is_closed(&self) -> bool {
        self.shutdown.is_none()
    }

    /// Stop the background task; safe to call any number of times
    pub fn close(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
            debug!(execution_id = %self.execution_id, "Closed monitor channel");
        }
    }

    /// Wait until the inbound stream ends or the channel is closed
    pub async fn finished(&mut self) {
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!(execution_id = %self.execution_id, error = %e, "Monitor task ended abnormally");
            }
        }
    }
}

impl Drop for MonitorChannel {
    fn drop(&mut self) {
        self.close();
    }
}

async fn dispatch(
    sink: &dyn ExecutionCommandSink,
    execution_id: ExecutionId,
    status: ExecutionStatus,
    command: MonitorCommand,
) -> Result<bool, CoreError> {
    if !command.allowed_from(status) {
        debug!(execution_id = %execution_id, command = %command, status = %status, "Command not allowed, not sent");
        return Ok(false);
    }

    sink.send(execution_id, command).await?;
    info!(execution_id = %execution_id, command = %command, "Sent execution command");
    Ok(true)
}

async fn run_channel(
    mut monitor: ExecutionMonitor,
    mut inbound: mpsc::Receiver<ChannelMessage>,
    state: watch::Sender<MonitorSnapshot>,
    mut shutdown: oneshot::Receiver<()>,
) {
    let id = monitor.snapshot().execution_id;

    loop {
        let message = tokio::select! {
            biased;
            _ = &mut shutdown => break,
            message = inbound.recv() => message,
        };

        let changed = match message {
            Some(ChannelMessage::Text(text)) => match serde_json::from_str::<MonitorEvent>(&text) {
                Ok(event) => monitor.apply(&event),
                Err(e) => {
                    warn!(execution_id = %id, error = %e, "Skipping malformed monitor message");
                    false
                }
            },
            Some(ChannelMessage::Event(event)) => monitor.apply(&event),
            Some(ChannelMessage::Failed(reason)) => monitor.fail(&reason),
            Some(ChannelMessage::Disconnected) => {
                let changed = monitor.fail("disconnected");
                publish(&state, &monitor, changed);
                break;
            }
            None => {
                let changed = monitor.fail("inbound stream closed");
                publish(&state, &monitor, changed);
                break;
            }
        };

        publish(&state, &monitor, changed);
    }

    debug!(execution_id = %id, status = %monitor.status(), "Monitor task stopped");
}

fn publish(state: &watch::Sender<MonitorSnapshot>, monitor: &ExecutionMonitor, changed: bool) {
    if changed {
        state.send_replace(monitor.snapshot().clone());
    }
}

/// Independent monitor channels keyed by execution id
pub struct MonitorBoard {
    channels: DashMap<ExecutionId, MonitorChannel>,
    sink: Arc<dyn ExecutionCommandSink>,
}

impl MonitorBoard {
    /// Create a board whose channels send commands through `sink`
    pub fn new(sink: Arc<dyn ExecutionCommandSink>) -> Self {
        Self {
            channels: DashMap::new(),
            sink,
        }
    }

    /// Open a channel; an existing channel for the same id is closed and replaced.
    ///
    /// Spawns the channel task, so it must be called from within a tokio runtime.
    pub fn open(
        &self,
        execution_id: ExecutionId,
        initial: ExecutionStatus,
        inbound: mpsc::Receiver<ChannelMessage>,
    ) -> watch::Receiver<MonitorSnapshot> {
        let channel = MonitorChannel::open(execution_id, initial, inbound, self.sink.clone());
        let receiver = channel.subscribe();
        if let Some(mut previous) = self.channels.insert(execution_id, channel) {
            previous.close();
        }
        receiver
    }

    /// Close and forget a channel; false when none was open
    pub fn close(&self, execution_id: ExecutionId) -> bool {
        match self.channels.remove(&execution_id) {
            Some((_, mut channel)) => {
                channel.close();
                true
            }
            None => false,
        }
    }

    /// Latest snapshot of a channel
    pub fn snapshot(&self, execution_id: ExecutionId) -> Option<MonitorSnapshot> {
        self.channels.get(&execution_id).map(|channel| channel.snapshot())
    }

    /// Ids of open channels, ascending
    pub fn active_ids(&self) -> Vec<ExecutionId> {
        let mut ids: Vec<_> = self.channels.iter().map(|entry| *entry.key()).collect();
        ids.sort();
        ids
    }

    /// Send a command to one execution; false when not sent
    pub async fn command(&self, execution_id: ExecutionId, command: MonitorCommand) -> Result<bool, CoreError> {
        let status = self
            .channels
            .get(&execution_id)
            .map(|channel| channel.snapshot().status)
            .ok_or_else(|| CoreError::MonitorNotFound(execution_id.to_string()))?;
        dispatch(self.sink.as_ref(), execution_id, status, command).await
    }

    /// Close every channel
    pub fn close_all(&self) {
        let ids = self.active_ids();
        for id in ids {
            self.close(id);
        }
    }
}

impl Drop for MonitorBoard {
    fn drop(&mut self) {
        self.close_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::repository::memory::MemoryCommandSink;
    use std::time::Duration;

    async fn wait_for<F>(rx: &mut watch::Receiver<MonitorSnapshot>, mut done: F) -> MonitorSnapshot
    where
        F: FnMut(&MonitorSnapshot) -> bool,
    {
        tokio::time::timeout(Duration::from_secs(2), async {
            loop {
                if done(&*rx.borrow_and_update()) {
                    return rx.borrow().clone();
                }
                if rx.changed().await.is_err() {
                    return rx.borrow().clone();
                }
            }
        })
        .await
        .expect("timed out waiting for snapshot")
    }

    #[tokio::test]
    async fn test_channel_applies_text_messages() {
        let sink = Arc::new(MemoryCommandSink::new());
        let (tx, rx) = mpsc::channel(8);
        let channel = MonitorChannel::open(ExecutionId(7), ExecutionStatus::Running, rx, sink);
        let mut state = channel.subscribe();

        tx.send(ChannelMessage::Text(r#"{"progress": 20, "log": "opened page"}"#.to_string()))
            .await
            .unwrap();
        tx.send(ChannelMessage::Text("not json".to_string())).await.unwrap();
        tx.send(ChannelMessage::Text(r#"{"status": "Pausado"}"#.to_string()))
            .await
            .unwrap();

        let snapshot = wait_for(&mut state, |s| s.status == ExecutionStatus::Paused).await;
        assert_eq!(snapshot.progress, 20);
        assert_eq!(snapshot.logs, vec!["opened page"]);
    }

    #[tokio::test]
    async fn test_commands_do_not_change_state() {
        let sink = Arc::new(MemoryCommandSink::new());
        let (_tx, rx) = mpsc::channel(8);
        let channel = MonitorChannel::open(ExecutionId(1), ExecutionStatus::Running, rx, sink.clone());

        assert!(channel.pause().await.unwrap());
        assert_eq!(channel.snapshot().status, ExecutionStatus::Running);
        assert!(!channel.resume().await.unwrap());
        assert_eq!(sink.sent(), vec![(ExecutionId(1), MonitorCommand::Pause)]);
    }

    #[tokio::test]
    async fn test_disconnect_moves_to_error() {
        let sink = Arc::new(MemoryCommandSink::new());
        let (tx, rx) = mpsc::channel(8);
        let mut channel = MonitorChannel::open(ExecutionId(2), ExecutionStatus::Running, rx, sink);

        tx.send(ChannelMessage::Disconnected).await.unwrap();
        channel.finished().await;
        assert_eq!(channel.snapshot().status, ExecutionStatus::Error);
        assert!(!channel.cancel().await.unwrap());
    }

    #[tokio::test]
    async fn test_close_is_idempotent() {
        let sink = Arc::new(MemoryCommandSink::new());
        let (_tx, rx) = mpsc::channel(8);
        let mut channel = MonitorChannel::open(ExecutionId(3), ExecutionStatus::Paused, rx, sink);

        channel.close();
        channel.close();
        assert!(channel.is_closed());
        channel.finished().await;
        assert_eq!(channel.snapshot().status, ExecutionStatus::Paused);
    }

    #[test]
    #[should_panic]
    fn test_board_open_requires_runtime() {
        let board = MonitorBoard::new(Arc::new(MemoryCommandSink::new()));
        let (_tx, rx) = mpsc::channel(1);
        board.open(ExecutionId(3), ExecutionStatus::Running, rx);
    }

    #[tokio::test]
    async fn test_board_keeps_channels_independent() {
        let sink = Arc::new(MemoryCommandSink::new());
        let board = MonitorBoard::new(sink.clone());
        let (tx1, rx1) = mpsc::channel(8);
        let (_tx2, rx2) = mpsc::channel(8);

        let mut first = board.open(ExecutionId(1), ExecutionStatus::Running, rx1);
        board.open(ExecutionId(2), ExecutionStatus::Running, rx2);
        assert_eq!(board.active_ids(), vec![ExecutionId(1), ExecutionId(2)]);

        tx1.send(ChannelMessage::Event(MonitorEvent {
            status: Some("Finalizado".to_string()),
            ..Default::default()
        }))
        .await
        .unwrap();
        wait_for(&mut first, |s| s.status == ExecutionStatus::Finished).await;

        assert_eq!(board.snapshot(ExecutionId(2)).unwrap().status, ExecutionStatus::Running);
        assert!(!board.command(ExecutionId(1), MonitorCommand::Cancel).await.unwrap());
        assert!(board.command(ExecutionId(2), MonitorCommand::Cancel).await.unwrap());
        assert_eq!(
            board.command(ExecutionId(9), MonitorCommand::Cancel).await,
            Err(CoreError::MonitorNotFound("9".to_string()))
        );

        assert!(board.close(ExecutionId(1)));
        assert!(!board.close(ExecutionId(1)));
        board.close_all();
        assert!(board.active_ids().is_empty());
    }
}
