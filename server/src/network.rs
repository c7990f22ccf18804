//! Server network layer handling UDP communications
//!
//! The network layer never touches the world. Each client command is turned
//! into an operation through the factory and handed to the scheduler; what
//! players get to see comes back from the dispatch loop through
//! [`ChannelOutbound`] and is written to the socket by the sender task.

use crate::client_manager::ClientManager;
use crate::dispatcher::Outbound;
use crate::factory::{OperationArgs, OperationFactory};
use crate::queue::Handle;
use crate::scheduler::Scheduler;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{CreatureId, OperationKind, Packet, CLIENT_VERSION};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};

/// Messages sent from network tasks to main server loop
#[derive(Debug)]
pub enum ServerMessage {
    PacketReceived { packet: Packet, addr: SocketAddr },
    ClientTimeout { client_id: CreatureId },
    Shutdown,
}

/// Messages sent to the socket sender task
#[derive(Debug)]
pub enum GameMessage {
    SendPacket { packet: Packet, addr: SocketAddr },
    SendToCreature {
        creature_id: CreatureId,
        packets: Vec<Packet>,
    },
}

/// Outbound used by the dispatch loop: queues prepared payloads for the
/// sender task, which resolves the creature's address.
#[derive(Debug, Clone)]
pub struct ChannelOutbound {
    game_tx: mpsc::UnboundedSender<GameMessage>,
}

impl ChannelOutbound {
    pub fn new(game_tx: mpsc::UnboundedSender<GameMessage>) -> Self {
        Self { game_tx }
    }
}

impl Outbound for ChannelOutbound {
    fn send(&self, recipient: CreatureId, packets: Vec<Packet>) {
        if let Err(e) = self.game_tx.send(GameMessage::SendToCreature {
            creature_id: recipient,
            packets,
        }) {
            debug!("Dropping packets for creature {}: {}", recipient, e);
        }
    }
}

/// UDP front-end translating client commands into scheduled operations
pub struct Server {
    socket: Arc<UdpSocket>,
    clients: Arc<RwLock<ClientManager>>,
    scheduler: Scheduler,
    factory: Arc<dyn OperationFactory>,

    // Communication channels
    server_tx: mpsc::UnboundedSender<ServerMessage>,
    server_rx: mpsc::UnboundedReceiver<ServerMessage>,
    game_tx: mpsc::UnboundedSender<GameMessage>,
    game_rx: mpsc::UnboundedReceiver<GameMessage>,
}

impl Server {
    pub async fn new(
        addr: &str,
        max_clients: usize,
        client_timeout: Duration,
        scheduler: Scheduler,
        factory: Arc<dyn OperationFactory>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        let (server_tx, server_rx) = mpsc::unbounded_channel();
        let (game_tx, game_rx) = mpsc::unbounded_channel();

        Ok(Server {
            socket,
            clients: Arc::new(RwLock::new(ClientManager::new(max_clients, client_timeout))),
            scheduler,
            factory,
            server_tx,
            server_rx,
            game_tx,
            game_rx,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Outbound to hand to the dispatch loop.
    pub fn outbound(&self) -> Arc<dyn Outbound> {
        Arc::new(ChannelOutbound::new(self.game_tx.clone()))
    }

    /// Sender that can stop [`run`](Self::run) from another task.
    pub fn control(&self) -> mpsc::UnboundedSender<ServerMessage> {
        self.server_tx.clone()
    }

    /// Spawns task that continuously listens for incoming packets
    async fn spawn_network_receiver(&self) {
        let socket = Arc::clone(&self.socket);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut buffer = [0u8; 2048];

            loop {
                match socket.recv_from(&mut buffer).await {
                    Ok((len, addr)) => {
                        if let Ok(packet) = deserialize::<Packet>(&buffer[0..len]) {
                            if let Err(e) =
                                server_tx.send(ServerMessage::PacketReceived { packet, addr })
                            {
                                error!("Failed to send packet to main loop: {}", e);
                                break;
                            }
                        } else {
                            warn!("Failed to deserialize packet from {}", addr);
                        }
                    }
                    Err(e) => {
                        error!("Error receiving packet: {}", e);
                        tokio::time::sleep(Duration::from_millis(10)).await;
                    }
                }
            }
        });
    }

    /// Spawns task that processes outgoing packet queue
    async fn spawn_network_sender(&mut self) {
        let socket = Arc::clone(&self.socket);
        let clients = Arc::clone(&self.clients);
        let mut game_rx = std::mem::replace(&mut self.game_rx, mpsc::unbounded_channel().1);

        tokio::spawn(async move {
            while let Some(message) = game_rx.recv().await {
                match message {
                    GameMessage::SendPacket { packet, addr } => {
                        if let Err(e) = Self::send_packet_impl(&socket, &packet, addr).await {
                            error!("Failed to send packet to {}: {}", addr, e);
                        }
                    }
                    GameMessage::SendToCreature {
                        creature_id,
                        packets,
                    } => {
                        let addr = {
                            let clients_guard = clients.read().await;
                            clients_guard.client_addr(creature_id)
                        };
                        let Some(addr) = addr else {
                            debug!("Creature {} has no connection, dropping payload", creature_id);
                            continue;
                        };

                        for packet in &packets {
                            if let Err(e) = Self::send_packet_impl(&socket, packet, addr).await {
                                error!("Failed to send to creature {}: {}", creature_id, e);
                            }
                        }
                    }
                }
            }
        });
    }

    /// Spawns task that monitors client timeouts
    async fn spawn_timeout_checker(&self) {
        let clients = Arc::clone(&self.clients);
        let server_tx = self.server_tx.clone();

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));

            loop {
                interval.tick().await;

                let timed_out = {
                    let mut clients_guard = clients.write().await;
                    clients_guard.check_timeouts()
                };

                for client_id in timed_out {
                    if let Err(e) = server_tx.send(ServerMessage::ClientTimeout { client_id }) {
                        error!("Failed to send timeout message: {}", e);
                        return;
                    }
                }
            }
        });
    }

    async fn send_packet_impl(
        socket: &UdpSocket,
        packet: &Packet,
        addr: SocketAddr,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let data = serialize(packet)?;
        socket.send_to(&data, addr).await?;
        Ok(())
    }

    fn send_packet(&self, packet: Packet, addr: SocketAddr) {
        if let Err(e) = self.game_tx.send(GameMessage::SendPacket { packet, addr }) {
            error!("Failed to queue packet for sending: {}", e);
        }
    }

    /// Builds an operation and schedules it to run now. Invalid requests are
    /// logged and dropped.
    fn submit(&self, args: OperationArgs, throttled: bool) -> Option<Handle> {
        let description = format!("{:?}", args);
        match self.factory.create(args) {
            Ok(operation) if throttled => {
                Some(self.scheduler.schedule_throttled(operation, Duration::ZERO))
            }
            Ok(operation) => Some(self.scheduler.schedule(operation, Duration::ZERO)),
            Err(e) => {
                warn!("Rejected request {}: {}", description, e);
                None
            }
        }
    }

    fn logout(&self, client_id: CreatureId) {
        self.submit(OperationArgs::Logout { creature_id: client_id }, false);
    }

    /// Processes incoming packets and schedules the resulting operations
    async fn handle_packet(&mut self, packet: Packet, addr: SocketAddr) {
        if let Packet::Connect {
            client_version,
            name,
        } = packet
        {
            self.handle_connect(client_version, name, addr).await;
            return;
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            let client_id = clients.find_client_by_addr(addr);
            if let Some(client_id) = client_id {
                clients.touch(client_id);
            }
            client_id
        };
        let Some(client_id) = client_id else {
            warn!("Packet from unknown client at {}", addr);
            return;
        };

        match packet {
            Packet::Move { direction } => {
                self.scheduler.cancel_kind_for(client_id, OperationKind::WalkTo);
                self.submit(
                    OperationArgs::Move {
                        creature_id: client_id,
                        direction,
                    },
                    true,
                );
            }
            Packet::WalkTo { location } => {
                self.scheduler.cancel_kind_for(client_id, OperationKind::WalkTo);
                self.submit(
                    OperationArgs::WalkTo {
                        creature_id: client_id,
                        destination: location,
                    },
                    true,
                );
            }
            Packet::Attack { target } => {
                self.scheduler.cancel_kind_for(client_id, OperationKind::AutoAttack);
                self.submit(
                    OperationArgs::AutoAttack {
                        attacker: client_id,
                        target,
                    },
                    false,
                );
            }
            Packet::StopAttack => {
                self.scheduler.cancel_kind_for(client_id, OperationKind::AutoAttack);
                self.scheduler.cancel_kind_for(client_id, OperationKind::Attack);
            }
            Packet::Say { text } => {
                self.submit(
                    OperationArgs::Speech {
                        creature_id: client_id,
                        text,
                    },
                    true,
                );
            }
            Packet::Disconnect => {
                let mut clients = self.clients.write().await;
                clients.remove_client(&client_id);
                drop(clients);
                self.logout(client_id);
            }
            _ => {
                warn!("Unexpected packet type from client at {}", addr);
            }
        }
    }

    async fn handle_connect(&mut self, client_version: u32, name: String, addr: SocketAddr) {
        info!(
            "Client connecting from {} (version: {}, name: {})",
            addr, client_version, name
        );

        if client_version != CLIENT_VERSION {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Protocol version mismatch".to_string(),
                },
                addr,
            );
            return;
        }

        // Remove existing connection if present
        let existing_client_id = {
            let clients = self.clients.read().await;
            clients.find_client_by_addr(addr)
        };
        if let Some(existing_id) = existing_client_id {
            info!("Removing existing client {} from {}", existing_id, addr);
            let mut clients = self.clients.write().await;
            clients.remove_client(&existing_id);
            drop(clients);
            self.logout(existing_id);
        }

        let client_id = {
            let mut clients = self.clients.write().await;
            clients.add_client(addr)
        };
        let Some(client_id) = client_id else {
            self.send_packet(
                Packet::Disconnected {
                    reason: "Server full".to_string(),
                },
                addr,
            );
            return;
        };

        // Connected goes into the same queue as the login's notifications, so
        // the client always learns its id first.
        self.send_packet(
            Packet::Connected {
                creature_id: client_id,
            },
            addr,
        );
        let login = OperationArgs::Login {
            creature_id: client_id,
            name: name.clone(),
        };
        if self.submit(login, false).is_some() {
            self.clients.write().await.set_name(client_id, &name);
        } else {
            self.clients.write().await.remove_client(&client_id);
            self.send_packet(
                Packet::Disconnected {
                    reason: "Invalid name".to_string(),
                },
                addr,
            );
        }
    }

    /// Main server loop: receives packets until a shutdown message arrives
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        // Initialize concurrent tasks
        self.spawn_network_receiver().await;
        self.spawn_network_sender().await;
        self.spawn_timeout_checker().await;

        info!("Server started successfully");

        while let Some(message) = self.server_rx.recv().await {
            match message {
                ServerMessage::PacketReceived { packet, addr } => {
                    self.handle_packet(packet, addr).await;
                }
                ServerMessage::ClientTimeout { client_id } => {
                    info!("Client {} timed out", client_id);
                    self.logout(client_id);
                }
                ServerMessage::Shutdown => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        Ok(())
    }
}
