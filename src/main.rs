use std::collections::HashSet;
use std::sync::Arc;

use log::{debug, error, info};
use tokio::io::{AsyncBufReadExt, BufReader};

use room_timeline::{
    ClientConfig, ClientEvent, Identity, MessageId, NoticeLevel, RestGateway, RoomClient, RoomId,
    SyncError, SyncResult,
};

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = run().await {
        error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> SyncResult<()> {
    let room: RoomId = std::env::args()
        .nth(1)
        .and_then(|arg| arg.parse().ok())
        .ok_or(SyncError::MissingConfig("room id as first argument"))?;

    let config = ClientConfig::from_env()?;
    let identity = Identity::from_token(&config.token)?;
    let gateway = Arc::new(RestGateway::new(&config)?);
    info!("Signed in as {}", identity.username);

    let (handle, mut events) = RoomClient::spawn(config, identity, gateway);
    handle.open_room(room)?;

    println!("Type a message and press enter. /older loads history, /quit leaves.");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut shown: HashSet<MessageId> = HashSet::new();

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Some(event) => render(&mut shown, event),
                None => break,
            },
            line = lines.next_line() => match line {
                Ok(Some(line)) => match line.trim() {
                    "/quit" => break,
                    "/older" => handle.load_older(None)?,
                    _ => {
                        handle.input_changed()?;
                        handle.send_message(line)?;
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    error!("Failed to read stdin: {}", e);
                    break;
                }
            },
        }
    }

    handle.shutdown()
}

fn render(shown: &mut HashSet<MessageId>, event: ClientEvent) {
    match event {
        ClientEvent::TimelineChanged(messages) => {
            if messages.is_empty() {
                shown.clear();
            }
            for message in messages.iter().filter(|m| !shown.contains(&m.id)) {
                println!(
                    "[{}] {}: {}",
                    message.timestamp.format("%Y-%m-%d %H:%M"),
                    message.sender.username,
                    message.content
                );
            }
            shown.extend(messages.iter().map(|m| m.id));
        }
        ClientEvent::TypingChanged(names) if !names.is_empty() => {
            println!("... {} typing", names.join(", "));
        }
        ClientEvent::TypingChanged(_) => {}
        ClientEvent::Viewport(request) => debug!("Viewport request {:?}", request),
        ClientEvent::ChannelState(state) => info!("Live channel {:?}", state),
        ClientEvent::Notice { level: NoticeLevel::Error, text } => eprintln!("error: {text}"),
        ClientEvent::Notice { level: NoticeLevel::Info, text } => println!("{text}"),
    }
}
