use crate::application::config::SessionConfig;
use crate::application::controller::{SessionController, SessionSnapshot};
use crate::error::{Result, SessionError};
use crate::infrastructure::transport::{Transport, TransportEvent};
use lanlobby_core::{HostSettings, JoinRequest, SessionEvent};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;

/// Requests a `SessionHandle` sends to the runtime task
#[derive(Debug)]
pub enum SessionCommand {
    Create {
        settings: HostSettings,
        reply: oneshot::Sender<Result<()>>,
    },
    Join {
        request: JoinRequest,
        reply: oneshot::Sender<Result<()>>,
    },
    Leave {
        reply: oneshot::Sender<()>,
    },
    Chat {
        text: String,
        reply: oneshot::Sender<Result<()>>,
    },
    Shutdown,
}

/// Cheap, cloneable access to a running session
#[derive(Debug, Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<SessionCommand>,
    state_rx: watch::Receiver<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
}

impl SessionHandle {
    pub async fn create_session(&self, settings: HostSettings) -> Result<()> {
        self.request(|reply| SessionCommand::Create { settings, reply })
            .await?
    }

    /// Resolves once the connect request is issued, not when connected
    pub async fn join_session(&self, request: JoinRequest) -> Result<()> {
        self.request(|reply| SessionCommand::Join { request, reply })
            .await?
    }

    pub async fn leave_session(&self) -> Result<()> {
        self.request(|reply| SessionCommand::Leave { reply }).await
    }

    pub async fn send_chat(&self, text: impl Into<String>) -> Result<()> {
        let text = text.into();
        self.request(|reply| SessionCommand::Chat { text, reply })
            .await?
    }

    /// Latest published state (never blocks)
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state_rx.borrow().clone()
    }

    pub fn subscribe_snapshots(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_rx.clone()
    }

    /// Events published after this call
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events_tx.subscribe()
    }

    /// Ask the runtime to leave the session and stop
    pub async fn shutdown(&self) -> Result<()> {
        self.cmd_tx
            .send(SessionCommand::Shutdown)
            .await
            .map_err(|_| SessionError::RuntimeClosed)
    }

    async fn request<R>(
        &self,
        command: impl FnOnce(oneshot::Sender<R>) -> SessionCommand,
    ) -> Result<R> {
        let (reply, response) = oneshot::channel();
        self.cmd_tx
            .send(command(reply))
            .await
            .map_err(|_| SessionError::RuntimeClosed)?;
        response.await.map_err(|_| SessionError::RuntimeClosed)
    }
}

/// Background task owning a `SessionController`
///
/// User commands, transport events and broadcast ticks are all consumed by
/// one loop, so the controller (and the roster it owns) has a single writer.
pub struct SessionRuntime {
    handle: SessionHandle,
    task_handle: JoinHandle<()>,
}

impl SessionRuntime {
    /// Spawn the loop; `transport_events` must be the receiving end of the
    /// sink the controller's transport was built with
    pub fn spawn<T: Transport>(
        controller: SessionController<T>,
        transport_events: mpsc::UnboundedReceiver<TransportEvent>,
        config: SessionConfig,
    ) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::channel(config.command_buffer);
        let (state_tx, state_rx) = watch::channel(controller.snapshot());
        let (events_tx, _) = broadcast::channel(config.event_buffer);

        let task_handle = tokio::spawn(run(
            controller,
            cmd_rx,
            transport_events,
            state_tx,
            events_tx.clone(),
        ));

        Self {
            handle: SessionHandle {
                cmd_tx,
                state_rx,
                events_tx,
            },
            task_handle,
        }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Leave the session and wait for the loop to finish
    pub async fn shutdown(self) {
        if self.handle.shutdown().await.is_err() {
            tracing::debug!("Session runtime already stopped");
        }
        if let Err(e) = self.task_handle.await {
            tracing::error!(error = %e, "Session runtime task failed");
        }
    }
}

async fn run<T: Transport>(
    mut controller: SessionController<T>,
    mut cmd_rx: mpsc::Receiver<SessionCommand>,
    mut transport_rx: mpsc::UnboundedReceiver<TransportEvent>,
    state_tx: watch::Sender<SessionSnapshot>,
    events_tx: broadcast::Sender<SessionEvent>,
) {
    tracing::info!("Session runtime started");

    loop {
        tokio::select! {
            cmd = cmd_rx.recv() => match cmd {
                Some(SessionCommand::Shutdown) | None => {
                    controller.leave_session();
                    publish(&mut controller, &state_tx, &events_tx);
                    break;
                }
                Some(cmd) => execute(&mut controller, cmd).await,
            },
            Some(event) = transport_rx.recv() => controller.handle_transport_event(event),
            _ = controller.next_tick() => {
                controller.broadcast_tick();
            }
        }

        publish(&mut controller, &state_tx, &events_tx);
    }

    tracing::info!("Session runtime stopped");
}

async fn execute<T: Transport>(controller: &mut SessionController<T>, cmd: SessionCommand) {
    // A dropped reply receiver only means the caller stopped waiting
    match cmd {
        SessionCommand::Create { settings, reply } => {
            let _ = reply.send(controller.create_session(settings).await);
        }
        SessionCommand::Join { request, reply } => {
            let _ = reply.send(controller.join_session(request));
        }
        SessionCommand::Leave { reply } => {
            controller.leave_session();
            let _ = reply.send(());
        }
        SessionCommand::Chat { text, reply } => {
            let _ = reply.send(controller.send_chat(&text));
        }
        SessionCommand::Shutdown => {}
    }
}

fn publish<T: Transport>(
    controller: &mut SessionController<T>,
    state_tx: &watch::Sender<SessionSnapshot>,
    events_tx: &broadcast::Sender<SessionEvent>,
) {
    for event in controller.drain_events() {
        // No subscribers is fine
        let _ = events_tx.send(event);
    }

    let snapshot = controller.snapshot();
    state_tx.send_if_modified(|current| {
        if *current == snapshot {
            return false;
        }
        *current = snapshot;
        true
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::memory::MemoryNetwork;
    use crate::infrastructure::transport::event_channel;
    use lanlobby_core::SessionRole;
    use std::net::Ipv4Addr;
    use std::sync::Arc;
    use std::time::Duration;

    fn spawn_node(network: &MemoryNetwork, last_octet: u8) -> SessionRuntime {
        spawn_configured(network, last_octet, SessionConfig::default())
    }

    fn spawn_configured(
        network: &MemoryNetwork,
        last_octet: u8,
        config: SessionConfig,
    ) -> SessionRuntime {
        let (sink, rx) = event_channel();
        let transport = network.transport(Ipv4Addr::new(10, 0, 0, last_octet), sink);
        let controller = SessionController::new(transport, Arc::new(network.clone()), config.clone());
        SessionRuntime::spawn(controller, rx, config)
    }

    async fn wait_for(
        handle: &SessionHandle,
        condition: impl Fn(&SessionSnapshot) -> bool,
    ) -> SessionSnapshot {
        let mut rx = handle.subscribe_snapshots();
        tokio::time::timeout(Duration::from_secs(10), async {
            loop {
                let snapshot = rx.borrow_and_update().clone();
                if condition(&snapshot) {
                    return snapshot;
                }
                if rx.changed().await.is_err() {
                    panic!("runtime stopped");
                }
            }
        })
        .await
        .expect("condition not reached")
    }

    #[tokio::test(start_paused = true)]
    async fn test_guest_mirror_converges_through_runtime() {
        let network = MemoryNetwork::new();
        let host = spawn_node(&network, 1);
        let guest = spawn_node(&network, 2);

        host.handle()
            .create_session(HostSettings::new("Hoster", "Den"))
            .await
            .unwrap();
        guest
            .handle()
            .join_session(JoinRequest::new("Alice", "10.0.0.1", "25000"))
            .await
            .unwrap();

        let host_view = wait_for(&host.handle(), |s| {
            s.roster.iter().any(|m| m.display_name() == "Alice")
                && s.mirror.as_ref().is_some_and(|l| l.text().contains("Alice"))
        })
        .await;
        let guest_view = wait_for(&guest.handle(), |s| {
            s.mirror.as_ref().is_some_and(|l| l.text().contains("Alice"))
        })
        .await;

        assert_eq!(guest_view.role, SessionRole::Connected);
        assert_eq!(guest_view.member_count(), 2);
        assert_eq!(host_view.member_count(), 2);

        host.shutdown().await;
        guest.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_custom_config_drives_runtime() {
        let network = MemoryNetwork::new();
        let config = SessionConfig::new()
            .with_broadcast_interval(Duration::from_millis(250))
            .with_command_buffer(1)
            .with_event_buffer(16);
        let host = spawn_configured(&network, 1, config.clone());
        let guest = spawn_configured(&network, 2, config);
        let mut guest_events = guest.handle().subscribe_events();
        let started = tokio::time::Instant::now();

        host.handle()
            .create_session(HostSettings::new("Hoster", "Den"))
            .await
            .unwrap();
        guest
            .handle()
            .join_session(JoinRequest::new("Alice", "10.0.0.1", "25000"))
            .await
            .unwrap();

        wait_for(&guest.handle(), |s| {
            s.mirror.as_ref().is_some_and(|l| l.text().contains("Alice"))
        })
        .await;
        assert!(started.elapsed() < Duration::from_secs(1));
        assert!(matches!(
            guest_events.recv().await.unwrap(),
            SessionEvent::JoinStarted { .. }
        ));

        host.shutdown().await;
        guest.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_published() {
        let network = MemoryNetwork::new();
        let host = spawn_node(&network, 1);
        let mut events = host.handle().subscribe_events();

        host.handle()
            .create_session(HostSettings::new("Hoster", "Den"))
            .await
            .unwrap();

        let first = events.recv().await.unwrap();
        assert!(matches!(first, SessionEvent::SessionCreated { .. }));

        host.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_handle_reports_closed_runtime() {
        let network = MemoryNetwork::new();
        let runtime = spawn_node(&network, 1);
        let handle = runtime.handle();

        runtime.shutdown().await;

        let result = handle.send_chat("anyone?").await;
        assert!(matches!(result, Err(SessionError::RuntimeClosed)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_errors_come_back_through_handle() {
        let network = MemoryNetwork::new();
        let runtime = spawn_node(&network, 2);

        let result = runtime
            .handle()
            .join_session(JoinRequest::new("Alice", "10.0.0", "25000"))
            .await;

        assert!(matches!(result, Err(SessionError::Validation(_))));
        assert_eq!(runtime.handle().snapshot().role, SessionRole::Idle);

        runtime.shutdown().await;
    }
}
