use crate::configuration::config::Config;
use crate::data_capture::events::InboundEvent;
use crate::data_capture::types::FilterSet;
use crate::error_handling::types::*;
use crate::inspector::{Inspector, ReplayInspector};
use crate::session_management::{SessionManager, StopReport};
use crate::storage::{ArchiveSink, FileStorage};
use log::{debug, error, info, warn};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

const COMMAND_BUFFER: usize = 16;

/// Control requests forwarded to the event loop, each with its reply slot.
#[derive(Debug)]
pub enum ControlCommand {
    Start {
        filters: FilterSet,
        reply: oneshot::Sender<Result<Uuid, SessionError>>,
    },
    Stop {
        reply: oneshot::Sender<Result<StopReport, SessionError>>,
    },
    Status {
        reply: oneshot::Sender<bool>,
    },
}

/// Cloneable client side of the controller.
#[derive(Debug, Clone)]
pub struct ControlHandle {
    commands: mpsc::Sender<ControlCommand>,
}

impl ControlHandle {
    pub async fn start(&self, filters: FilterSet) -> Result<Uuid, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::Start { filters, reply }).await?;
        rx.await
            .map_err(|_| ControllerError::ChannelClosed)?
            .map_err(ControllerError::Session)
    }

    pub async fn stop(&self) -> Result<StopReport, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::Stop { reply }).await?;
        rx.await
            .map_err(|_| ControllerError::ChannelClosed)?
            .map_err(ControllerError::Session)
    }

    pub async fn status(&self) -> Result<bool, ControllerError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::Status { reply }).await?;
        rx.await.map_err(|_| ControllerError::ChannelClosed)
    }

    async fn send(&self, command: ControlCommand) -> Result<(), ControllerError> {
        self.commands
            .send(command)
            .await
            .map_err(|_| ControllerError::ChannelClosed)
    }
}

/// Owns the session manager and serializes every mutation through one loop:
/// control commands and inbound capture events are handled one at a time.
pub struct Controller {
    pub config: Config,
    manager: SessionManager,
    commands: mpsc::Receiver<ControlCommand>,
    events: mpsc::Receiver<InboundEvent>,
}

impl Controller {
    pub fn new(
        config: Config,
        inspector: Box<dyn Inspector>,
        sink: Arc<dyn ArchiveSink>,
    ) -> (Self, ControlHandle) {
        let (events_tx, events) = mpsc::channel(config.event_buffer.max(1));
        let (commands_tx, commands) = mpsc::channel(COMMAND_BUFFER);
        let manager = SessionManager::new(
            inspector,
            sink,
            config.archive_prefix.clone(),
            events_tx,
        );
        let controller = Self {
            config,
            manager,
            commands,
            events,
        };
        (
            controller,
            ControlHandle {
                commands: commands_tx,
            },
        )
    }

    /// Wires the replay inspector and the file sink named by `config`.
    pub fn from_config(config: Config) -> Result<(Self, ControlHandle), ControllerError> {
        let replay_log = config.replay_log.clone().ok_or_else(|| {
            error!("No replay log configured");
            ControllerError::ConfigurationError(ConfigError::MissingReplayLog)
        })?;
        let inspector =
            ReplayInspector::from_path(&replay_log).map_err(ControllerError::InspectorError)?;
        let sink = FileStorage::new(&config.output_dir).map_err(ControllerError::StorageError)?;
        Ok(Self::new(config, Box::new(inspector), Arc::new(sink)))
    }

    /// Runs until every [`ControlHandle`] is dropped. A capture still
    /// active at that point is stopped and archived.
    pub async fn run(mut self) {
        info!("Controller event loop started");
        loop {
            tokio::select! {
                command = self.commands.recv() => match command {
                    Some(command) => self.handle_command(command),
                    None => break,
                },
                Some(event) = self.events.recv() => self.manager.handle_event(event),
            }
        }

        if self.manager.status() {
            warn!("Control channel closed during an active capture, stopping it");
            if let Err(e) = self.manager.stop() {
                error!("Final stop failed: {}", e);
            }
        }
        info!("Controller event loop finished");
    }

    fn handle_command(&mut self, command: ControlCommand) {
        match command {
            ControlCommand::Start { filters, reply } => {
                debug!("Start requested");
                let _ = reply.send(self.manager.start(filters));
            }
            ControlCommand::Stop { reply } => {
                debug!("Stop requested");
                let _ = reply.send(self.manager.stop());
            }
            ControlCommand::Status { reply } => {
                let _ = reply.send(self.manager.status());
            }
        }
    }
}
