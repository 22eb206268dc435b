use std::sync::Arc;

use anyhow::anyhow;
use clap::Parser;
use futures::StreamExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tracing_subscriber::EnvFilter;

use deckhand::prefs::FilePreferences;
use deckhand::{
    AgentCatalog, AgentSelection, Config, HttpCredentialSource, Session, SessionParts,
    SessionState, SlideData, WatchNavigator, WebSocketConnector,
};

const HELP: &str = "\
commands:
  /connect /disconnect   open or close the realtime session
  /ptt /vad              switch turn taking
  /down /up              push-to-talk press and release
  /cancel                interrupt the assistant
  /audio on|off          toggle assistant audio playback
  /logs on|off           show or hide the event log
  /agent <name>          switch agent
  /slides                print the deck
  /quit
anything else is sent as a user message";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow!("Failed to install default crypto provider"))?;

    let config = Config::parse();

    let preferences = FilePreferences::open(config.preferences_path())?;
    let catalog = AgentCatalog::builtin();
    let mut agents = AgentSelection::from_catalog(&catalog, config.agent_config.as_deref());
    if let Some(name) = config.agent.as_deref() {
        if !agents.select(name) {
            anyhow::bail!("Unknown agent '{}'", name);
        }
    }

    let navigator = Arc::new(WatchNavigator::new());
    let mut positions = WatchStream::from_changes(navigator.subscribe());

    let (mut session, mut inbox) = Session::new(SessionParts {
        credentials: Arc::new(HttpCredentialSource::new(&config.session_url)),
        connector: Arc::new(WebSocketConnector::new(&config.realtime_url, &config.model)),
        navigator: navigator.clone(),
        agents,
        preferences: Box::new(preferences),
    });

    let mut slides = WatchStream::from_changes(session.deck().subscribe());
    let mut events = BroadcastStream::new(session.subscribe_events());
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", HELP);
    session.connect();

    loop {
        tokio::select! {
            Some(input) = inbox.recv() => {
                let before = session.state();
                session.handle(input);
                if session.state() != before {
                    println!("[{}]", session.state());
                }
            }
            Some(deck) = slides.next() => print_deck(&deck),
            Some(index) = positions.next() => {
                if let Some(index) = index {
                    println!("-> slide {}", index + 1);
                }
            }
            Some(Ok(event)) = events.next() => {
                if session.preferences().logs_expanded {
                    println!("  {:?} {}", event.direction, event.name);
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else {
                    break;
                };
                if !run_command(&mut session, line.trim()) {
                    break;
                }
            }
        }
    }

    session.disconnect();
    Ok(())
}

/// Returns false when the user asked to quit.
fn run_command(session: &mut Session, line: &str) -> bool {
    let (command, argument) = match line.split_once(' ') {
        Some((command, argument)) => (command, argument.trim()),
        None => (line, ""),
    };

    match command {
        "" => {}
        "/quit" => return false,
        "/help" => println!("{}", HELP),
        "/connect" => session.connect(),
        "/disconnect" => {
            session.disconnect();
            println!("[{}]", SessionState::Disconnected);
        }
        "/ptt" => session.set_push_to_talk(true),
        "/vad" => session.set_push_to_talk(false),
        "/down" => session.talk_down(),
        "/up" => session.talk_up(),
        "/cancel" => {
            session.cancel_assistant_speech();
        }
        "/audio" => session.set_audio_playback(argument != "off"),
        "/logs" => session.set_logs_expanded(argument != "off"),
        "/agent" => {
            if !session.select_agent(argument) {
                println!("unknown agent: {}", argument);
            }
        }
        "/slides" => print_deck(&session.deck().slides()),
        _ => {
            session.set_draft(line);
            if !session.send_draft() {
                println!("nothing sent");
            }
        }
    }
    true
}

fn print_deck(deck: &[SlideData]) {
    println!("deck: {} slide(s)", deck.len());
    for (index, slide) in deck.iter().enumerate() {
        println!("  {}. [{}] {}", index + 1, slide.slug, slide.title);
        for item in slide.items.iter().flatten() {
            println!("     - {}", item);
        }
        if let Some(paragraph) = &slide.paragraph {
            println!("     {}", paragraph);
        }
    }
}
