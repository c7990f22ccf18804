use bincode::{deserialize, serialize};
use clap::Parser;
use shared::{Direction, Packet, CLIENT_VERSION};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::UdpSocket;
use tokio::time::{sleep, timeout};

/// Scripted client: logs in, walks a square, talks, then leaves.
#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server address
    #[clap(short, long, default_value = "127.0.0.1:8080")]
    server: SocketAddr,
    /// Player name to log in with
    #[clap(short, long, default_value = "Tester")]
    name: String,
}

async fn send(socket: &UdpSocket, packet: &Packet, server: SocketAddr) -> Result<(), Box<dyn std::error::Error>> {
    let data = serialize(packet)?;
    println!("Sending: {:?}", packet);
    socket.send_to(&data, server).await?;
    Ok(())
}

/// Prints everything the server sends until it stays quiet for `window`.
async fn drain(socket: &UdpSocket, window: Duration) -> Vec<Packet> {
    let mut buf = [0u8; 2048];
    let mut received = Vec::new();

    while let Ok(Ok((len, _))) = timeout(window, socket.recv_from(&mut buf)).await {
        match deserialize::<Packet>(&buf[0..len]) {
            Ok(packet) => {
                println!("Received: {:?}", packet);
                received.push(packet);
            }
            Err(e) => println!("Failed to deserialize packet: {}", e),
        }
    }
    received
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    // Create local socket
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    println!("Client socket bound to {}", socket.local_addr()?);

    let connect = Packet::Connect {
        client_version: CLIENT_VERSION,
        name: args.name.clone(),
    };
    send(&socket, &connect, args.server).await?;

    let welcome = drain(&socket, Duration::from_millis(500)).await;
    let creature_id = welcome.iter().find_map(|packet| match packet {
        Packet::Connected { creature_id } => Some(*creature_id),
        _ => None,
    });
    let Some(creature_id) = creature_id else {
        println!("Server did not accept the connection");
        return Ok(());
    };
    println!("Logged in as creature {}", creature_id);

    for direction in [Direction::North, Direction::East, Direction::South, Direction::West] {
        send(&socket, &Packet::Move { direction }, args.server).await?;
        drain(&socket, Duration::from_millis(400)).await;
    }

    let greeting = Packet::Say {
        text: format!("Hello from {}", args.name),
    };
    send(&socket, &greeting, args.server).await?;
    drain(&socket, Duration::from_millis(400)).await;

    send(&socket, &Packet::Disconnect, args.server).await?;
    sleep(Duration::from_millis(100)).await;

    println!("Test client finished");
    Ok(())
}
