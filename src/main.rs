use std::path::Path;
use std::time::Instant;

use boardchat::config::ClientConfig;
use boardchat::error::ClientError;
use boardchat::net::types::{Card, Message};
use boardchat::state::AppState;
use boardchat::state::chat::{ChatSession, ChatState};
use boardchat::state::drag::{DragController, DropZones};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "boardchat", about = "Kanban board and chat client")]
struct Cli {
    #[arg(long, env = "BOARDCHAT_BASE_URL")]
    base_url: Option<String>,

    #[arg(long, env = "BOARDCHAT_TOKEN")]
    token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and print the session token to export as `BOARDCHAT_TOKEN`.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Register {
        #[arg(long)]
        username: String,
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
    },
    Logout,
    Whoami,
    Profile {
        #[arg(long)]
        username: String,
        #[arg(long, default_value = "")]
        profile_url: String,
        #[arg(long, default_value = "")]
        bio: String,
    },
    Boards(BoardsCommand),
    Column(ColumnCommand),
    Card(CardCommand),
    Files(FilesCommand),
    Friends(FriendsCommand),
    /// Chat with a user: stdin lines are sent, incoming messages printed.
    /// `/search <text>`, `/next`, `/prev`, `/clear` and `/quit` are commands.
    Chat { receiver_id: String },
}

#[derive(Args, Debug)]
struct BoardsCommand {
    #[command(subcommand)]
    command: BoardsSubcommand,
}

#[derive(Subcommand, Debug)]
enum BoardsSubcommand {
    List,
    Create {
        #[arg(long)]
        name: String,
    },
    Show {
        board_id: String,
    },
}

#[derive(Args, Debug)]
struct ColumnCommand {
    #[command(subcommand)]
    command: ColumnSubcommand,
}

#[derive(Subcommand, Debug)]
enum ColumnSubcommand {
    Add {
        board_id: String,
        #[arg(long)]
        name: String,
        #[arg(long, help = "Defaults to after the last column")]
        position: Option<i32>,
    },
    Update {
        board_id: String,
        column_id: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        position: i32,
    },
    Delete {
        board_id: String,
        column_id: String,
    },
}

#[derive(Args, Debug)]
struct CardCommand {
    #[command(subcommand)]
    command: CardSubcommand,
}

#[derive(Subcommand, Debug)]
enum CardSubcommand {
    Add {
        board_id: String,
        column_id: String,
        #[arg(long)]
        name: String,
        #[arg(long, help = "Defaults to the end of the column")]
        position: Option<i32>,
    },
    Show {
        board_id: String,
        card_id: String,
    },
    Update {
        board_id: String,
        card_id: String,
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        #[arg(long, default_value = "")]
        cover: String,
    },
    Delete {
        board_id: String,
        card_id: String,
    },
    Swap {
        board_id: String,
        first: String,
        second: String,
    },
    /// Move a card to an exact position.
    Move {
        board_id: String,
        card_id: String,
        to_column: String,
        position: i32,
    },
    /// Drop a card on a slot marker, as a drag release would.
    Drop {
        board_id: String,
        card_id: String,
        to_column: String,
        slot: usize,
    },
    Attach {
        board_id: String,
        card_id: String,
        file: String,
    },
    Detach {
        board_id: String,
        card_id: String,
        attachment_id: String,
    },
}

#[derive(Args, Debug)]
struct FilesCommand {
    #[command(subcommand)]
    command: FilesSubcommand,
}

#[derive(Subcommand, Debug)]
enum FilesSubcommand {
    List,
    Upload {
        file: String,
        #[arg(long, default_value_t = false)]
        private: bool,
    },
    Delete {
        name: String,
    },
}

#[derive(Args, Debug)]
struct FriendsCommand {
    #[command(subcommand)]
    command: FriendsSubcommand,
}

#[derive(Subcommand, Debug)]
enum FriendsSubcommand {
    Code,
    Redeem { code: String },
    List,
}

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut config = ClientConfig::from_env()?;
    if let Some(base_url) = &cli.base_url {
        config = config.with_base_url(base_url)?;
    }
    if cli.token.is_some() {
        config = config.with_token(cli.token.clone());
    }
    let app = AppState::new(config)?;

    match cli.command {
        Command::Login { email, password } => {
            let user = app.sign_in(&email, &password).await?;
            print_json(&user)?;
            if let Some(token) = app.api.token() {
                println!("BOARDCHAT_TOKEN={token}");
            }
            Ok(())
        }
        Command::Register { username, email, password } => {
            let user = app.session.lock().await.register(&username, &email, &password).await?.clone();
            print_json(&user)?;
            if let Some(token) = app.api.token() {
                println!("BOARDCHAT_TOKEN={token}");
            }
            Ok(())
        }
        Command::Logout => app.sign_out().await,
        Command::Whoami => {
            let mut session = app.session.lock().await;
            print_json(session.refresh().await?)
        }
        Command::Profile { username, profile_url, bio } => {
            let mut session = app.session.lock().await;
            print_json(session.update_profile(&username, &profile_url, &bio).await?)
        }
        Command::Boards(boards) => run_boards(&app, boards).await,
        Command::Column(column) => run_column(&app, column).await,
        Command::Card(card) => run_card(&app, card).await,
        Command::Files(files) => run_files(&app, files).await,
        Command::Friends(friends) => run_friends(&app, friends).await,
        Command::Chat { receiver_id } => run_chat(&app, &receiver_id).await,
    }
}

async fn run_boards(app: &AppState, boards: BoardsCommand) -> Result<(), ClientError> {
    match boards.command {
        BoardsSubcommand::List => {
            let mut list = app.boards.lock().await;
            print_json(list.request_user_boards().await?)
        }
        BoardsSubcommand::Create { name } => {
            let mut list = app.boards.lock().await;
            print_json(&list.add_user_board(&name).await?)
        }
        BoardsSubcommand::Show { board_id } => {
            let mut kanban = app.kanban.lock().await;
            kanban.request_board(&board_id).await?;
            let state = kanban.state();
            for column in state.columns() {
                println!("[{}] {} ({})", column.position, column.name.as_deref().unwrap_or("untitled"), column.id);
                for card in state.column_cards(&column.id) {
                    println!("    {}. {} ({})", card.position, card.name, card.id);
                }
            }
            Ok(())
        }
    }
}

async fn run_column(app: &AppState, column: ColumnCommand) -> Result<(), ClientError> {
    match column.command {
        ColumnSubcommand::Add { board_id, name, position } => {
            let mut kanban = app.kanban.lock().await;
            kanban.request_board(&board_id).await?;
            let position = position.unwrap_or_else(|| kanban.state().next_column_position());
            print_json(&kanban.add_column(&name, position).await?)
        }
        ColumnSubcommand::Update { board_id, column_id, name, position } => {
            let mut kanban = app.kanban.lock().await;
            kanban.request_board(&board_id).await?;
            print_json(&kanban.update_column(&column_id, &name, position).await?)
        }
        ColumnSubcommand::Delete { board_id, column_id } => {
            let mut kanban = app.kanban.lock().await;
            kanban.request_board(&board_id).await?;
            kanban.delete_column(&column_id).await
        }
    }
}

async fn run_card(app: &AppState, card: CardCommand) -> Result<(), ClientError> {
    let mut kanban = app.kanban.lock().await;
    match card.command {
        CardSubcommand::Add { board_id, column_id, name, position } => {
            kanban.request_board(&board_id).await?;
            let position = position.unwrap_or_else(|| kanban.state().next_card_position(&column_id));
            print_json(&kanban.add_card(&name, &column_id, position).await?)
        }
        CardSubcommand::Show { board_id, card_id } => {
            kanban.request_card_modal(&board_id, &card_id).await?;
            if let Some(detail) = &kanban.state().card_modal {
                print_json(detail)?;
            }
            Ok(())
        }
        CardSubcommand::Update { board_id, card_id, name, description, cover } => {
            kanban.request_board(&board_id).await?;
            let column_id = find_card(kanban.state().cards(), &card_id)?.column_id;
            print_json(&kanban.update_card(&card_id, &name, &description, &cover, &column_id).await?)
        }
        CardSubcommand::Delete { board_id, card_id } => {
            kanban.request_board(&board_id).await?;
            let column_id = find_card(kanban.state().cards(), &card_id)?.column_id;
            kanban.delete_card(&card_id, &column_id).await
        }
        CardSubcommand::Swap { board_id, first, second } => {
            kanban.request_board(&board_id).await?;
            let column_id = find_card(kanban.state().cards(), &first)?.column_id;
            kanban.swap_cards(&first, &second, &column_id).await
        }
        CardSubcommand::Move { board_id, card_id, to_column, position } => {
            kanban.request_board(&board_id).await?;
            let from_column = find_card(kanban.state().cards(), &card_id)?.column_id;
            kanban.reorder_list(&from_column, &to_column, position, &card_id).await
        }
        CardSubcommand::Drop { board_id, card_id, to_column, slot } => {
            kanban.request_board(&board_id).await?;
            let dragged = find_card(kanban.state().cards(), &card_id)?;
            let zones = DropZones::for_column(kanban.state(), &to_column, 0.0, 1.0);
            let mut drag = DragController::new(app.config.frame_budget);
            drag.begin(&dragged);
            let y = f64::from(u32::try_from(slot).unwrap_or(u32::MAX));
            drag.pointer_moved(0.0, y, &zones, Instant::now());
            match drag.release(y, Some(&zones)) {
                Some(intent) => {
                    print_json(&intent.to_position)?;
                    intent.commit(&mut *kanban).await
                }
                None => Err(ClientError::CardNotFound(card_id)),
            }
        }
        CardSubcommand::Attach { board_id, card_id, file } => {
            let bytes = tokio::fs::read(&file).await?;
            kanban.request_board(&board_id).await?;
            kanban.request_card_modal(&board_id, &card_id).await?;
            kanban.upload_attachment(&card_id, &file_name(&file), bytes).await?;
            if let Some(detail) = &kanban.state().card_modal {
                print_json(&detail.attachments)?;
            }
            Ok(())
        }
        CardSubcommand::Detach { board_id, card_id, attachment_id } => {
            kanban.request_board(&board_id).await?;
            kanban.delete_attachment(&card_id, &attachment_id).await?;
            print_json(&app.api.list_attachments(&board_id, &card_id).await?)
        }
    }
}

async fn run_files(app: &AppState, files: FilesCommand) -> Result<(), ClientError> {
    match files.command {
        FilesSubcommand::List => print_json(&app.api.list_files().await?),
        FilesSubcommand::Upload { file, private } => {
            let bytes = tokio::fs::read(&file).await?;
            print_json(&app.api.upload_file(&file_name(&file), bytes, private).await?)
        }
        FilesSubcommand::Delete { name } => app.api.delete_file(&name).await,
    }
}

async fn run_friends(app: &AppState, friends: FriendsCommand) -> Result<(), ClientError> {
    match friends.command {
        FriendsSubcommand::Code => print_json(&app.api.create_friend_code().await?),
        FriendsSubcommand::Redeem { code } => print_json(&app.api.redeem_friend_code(&code).await?),
        FriendsSubcommand::List => print_json(&app.api.list_friends().await?),
    }
}

async fn run_chat(app: &AppState, receiver_id: &str) -> Result<(), ClientError> {
    app.session.lock().await.refresh().await?;
    let session = app.open_chat(receiver_id).await?;

    let initial = session.snapshot();
    for message in &initial.messages {
        print_message(&initial, message);
    }
    let mut updates = session.subscribe();
    let mut shown = initial.messages.len();
    let printer = tokio::spawn(async move {
        while updates.changed().await.is_ok() {
            let state = updates.borrow_and_update().clone();
            for message in state.messages.iter().skip(shown) {
                print_message(&state, message);
            }
            shown = state.messages.len();
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if !chat_command(&session, line.trim())? {
            break;
        }
    }

    printer.abort();
    session.close().await;
    Ok(())
}

/// Handle one input line; false means quit.
fn chat_command(session: &ChatSession, line: &str) -> Result<bool, ClientError> {
    match line.split_once(' ').unwrap_or((line, "")) {
        ("/quit", _) => return Ok(false),
        ("/search", query) => println!("{} matches", session.search(query)),
        ("/next", _) => report_match(session, session.next_match()),
        ("/prev", _) => report_match(session, session.prev_match()),
        ("/clear", _) => session.clear_search(),
        ("", _) => {}
        _ => session.send(line)?,
    }
    Ok(true)
}

fn report_match(session: &ChatSession, index: Option<usize>) {
    let state = session.snapshot();
    match index.and_then(|index| state.messages.get(index)) {
        Some(message) => print_message(&state, message),
        None => println!("no matches"),
    }
}

fn print_message(state: &ChatState, message: &Message) {
    let sender = state
        .member(&message.sender_id)
        .map_or(message.sender_id.as_str(), |member| member.username.as_str());
    println!("[{}] {sender}: {}", message.created_at, message.content);
}

fn find_card(cards: &[Card], card_id: &str) -> Result<Card, ClientError> {
    cards
        .iter()
        .find(|card| card.id == card_id)
        .cloned()
        .ok_or_else(|| ClientError::CardNotFound(card_id.to_owned()))
}

fn file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map_or_else(|| path.to_owned(), |name| name.to_string_lossy().into_owned())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), ClientError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
