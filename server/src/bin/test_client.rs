use futures_util::{SinkExt, StreamExt};
use shared::{Action, ClientMessage, Role, ServerMessage};
use std::time::Duration;
use tokio::time::{sleep, timeout};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

// Hosts a local room, walks the thief around a little and prints what comes back.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let url = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "ws://127.0.0.1:8080".to_string());
    let (socket, _) = connect_async(url.as_str()).await?;
    println!("Connected to {}", url);
    let (mut sink, mut frames) = socket.split();

    let send = |message: ClientMessage| serde_json::to_string(&message).map(Message::Text);
    sink.send(send(ClientMessage::HostLocal)?).await?;

    let moves = [(1, 0), (1, 0), (0, 1), (0, 1), (-1, 0)];
    let mut snapshots = 0;
    let mut next_move = 0;

    while snapshots < 20 {
        let frame = match timeout(Duration::from_secs(5), frames.next()).await {
            Ok(Some(frame)) => frame?,
            Ok(None) => break,
            Err(_) => {
                println!("Timed out waiting for the server");
                break;
            }
        };
        let Message::Text(text) = frame else {
            continue;
        };
        let message: ServerMessage = serde_json::from_str(&text)?;
        match message {
            ServerMessage::Hosted { code, role, local } => {
                println!("Hosted room {} as {:?} (local: {})", code, role, local);
            }
            ServerMessage::State(snapshot) => {
                snapshots += 1;
                println!(
                    "tick {} level {} thief {:?} hp {} guards {} outcome {:?} sounds {:?}",
                    snapshot.tick,
                    snapshot.level,
                    snapshot.thief.position,
                    snapshot.thief.hp,
                    snapshot.guards.len(),
                    snapshot.outcome,
                    snapshot.sounds
                );
                if snapshots % 4 == 0 && next_move < moves.len() {
                    let (dx, dy) = moves[next_move];
                    next_move += 1;
                    let input = ClientMessage::Input {
                        action: Action::Move,
                        role: Some(Role::Thief),
                        dx,
                        dy,
                    };
                    sink.send(send(input)?).await?;
                }
            }
            other => println!("{:?}", other),
        }
    }

    sink.send(send(ClientMessage::Chat {
        text: "bye".to_string(),
    })?)
    .await?;
    sleep(Duration::from_millis(100)).await;
    sink.send(Message::Close(None)).await?;
    Ok(())
}
