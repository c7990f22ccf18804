//! Client connection management for the world server
//!
//! This module handles the server-side bookkeeping of connected clients:
//! - Client connection lifecycle (connect, disconnect, timeout)
//! - Mapping between network addresses and the creature each client controls
//! - Connection health monitoring and automatic cleanup
//! - Client capacity management
//!
//! A client's id doubles as the id of its player creature in the world, so
//! the network layer can hand requests straight to the operation factory.

use log::info;
use shared::CreatureId;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::time::Instant;

/// Represents a connected client
///
/// Each client maintains:
/// - Connection metadata (ID, address, last activity)
/// - The name it logged in with, once the login handshake completed
#[derive(Debug)]
pub struct Client {
    /// Unique client identifier assigned by the server, also its creature id
    pub id: CreatureId,
    /// Network address for sending responses
    pub addr: SocketAddr,
    /// Last time we received any packet from this client
    pub last_seen: Instant,
    /// Player name, set once the client logged in
    pub name: Option<String>,
}

impl Client {
    /// Creates a new client with the given ID and network address
    ///
    /// The client starts without a name and is marked as recently active.
    pub fn new(id: CreatureId, addr: SocketAddr) -> Self {
        Self {
            id,
            addr,
            last_seen: Instant::now(),
            name: None,
        }
    }

    /// Records activity from this client
    pub fn touch(&mut self) {
        self.last_seen = Instant::now();
    }

    /// Checks if the client has exceeded the connection timeout
    ///
    /// Returns true if no packets have been received from this client
    /// within the specified timeout duration, indicating a likely disconnect.
    pub fn is_timed_out(&self, timeout: Duration) -> bool {
        self.last_seen.elapsed() > timeout
    }
}

/// Manages all connected clients
///
/// The ClientManager provides centralized control over client connections
/// and enforces server capacity limits. Ids are never reused while the server
/// runs, so a late packet from a departed client can never be attributed to
/// a newcomer's creature.
pub struct ClientManager {
    /// Connected clients indexed by their unique ID
    clients: HashMap<CreatureId, Client>,
    /// Next available client ID for new connections
    next_client_id: CreatureId,
    /// Maximum number of concurrent clients allowed
    max_clients: usize,
    /// Silence after which a client is considered gone
    timeout: Duration,
}

impl ClientManager {
    /// Creates a new client manager with the specified capacity limit
    ///
    /// Client IDs start from 1 and increment for each new connection; 0 is
    /// reserved for the server itself.
    pub fn new(max_clients: usize, timeout: Duration) -> Self {
        Self {
            clients: HashMap::new(),
            next_client_id: 1,
            max_clients,
            timeout,
        }
    }

    /// Attempts to add a new client connection
    ///
    /// Returns Some(client_id) if successful, None if server is at capacity.
    pub fn add_client(&mut self, addr: SocketAddr) -> Option<CreatureId> {
        // Enforce server capacity limits
        if self.clients.len() >= self.max_clients {
            return None;
        }

        let client_id = self.next_client_id;
        self.next_client_id += 1;

        let client = Client::new(client_id, addr);
        info!("Client {} connected from {}", client_id, addr);
        self.clients.insert(client_id, client);

        Some(client_id)
    }

    /// Removes a client from the server
    ///
    /// Returns true if the client was found and removed, false if they were
    /// already gone. This handles both explicit disconnections and timeouts.
    pub fn remove_client(&mut self, client_id: &CreatureId) -> bool {
        if let Some(client) = self.clients.remove(client_id) {
            info!("Client {} disconnected", client.id);
            true
        } else {
            false
        }
    }

    /// Finds a client ID by their network address
    ///
    /// Used to associate incoming packets with existing client connections.
    pub fn find_client_by_addr(&self, addr: SocketAddr) -> Option<CreatureId> {
        self.clients
            .iter()
            .find(|(_, client)| client.addr == addr)
            .map(|(id, _)| *id)
    }

    /// Marks a client as active. Returns false if the client ID is invalid.
    pub fn touch(&mut self, client_id: CreatureId) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.touch();
            true
        } else {
            false
        }
    }

    /// Remembers the name a client logged in with.
    pub fn set_name(&mut self, client_id: CreatureId, name: &str) -> bool {
        if let Some(client) = self.clients.get_mut(&client_id) {
            client.name = Some(name.to_string());
            true
        } else {
            false
        }
    }

    pub fn name_of(&self, client_id: CreatureId) -> Option<&str> {
        self.clients
            .get(&client_id)
            .and_then(|client| client.name.as_deref())
    }

    /// Address a client's packets are sent to
    pub fn client_addr(&self, client_id: CreatureId) -> Option<SocketAddr> {
        self.clients.get(&client_id).map(|client| client.addr)
    }

    /// Checks for and removes timed-out clients
    ///
    /// Returns the removed client IDs so their creatures can be logged out.
    pub fn check_timeouts(&mut self) -> Vec<CreatureId> {
        let timeout = self.timeout;
        let timed_out: Vec<CreatureId> = self
            .clients
            .iter()
            .filter(|(_, client)| client.is_timed_out(timeout))
            .map(|(id, _)| *id)
            .collect();

        for client_id in &timed_out {
            self.remove_client(client_id);
        }

        timed_out
    }

    /// Returns the number of currently connected clients
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns true if no clients are currently connected
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}
