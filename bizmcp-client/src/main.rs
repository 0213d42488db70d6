//! bizmcp - chat client for the bizmcp bridge

use std::io::Write;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

use bizmcp_client::{
    is_exit_command, BridgeClient, ChatModel, ChatSession, ClientError, OpenRouterClient,
    ToolInvoker,
};
use bizmcp_utils::{init_logging_with_config, LogConfig};

mod cli;

use cli::Args;

#[tokio::main]
async fn main() -> Result<(), ClientError> {
    let args = Args::parse();

    // The terminal belongs to the conversation, so logs go to a file
    init_logging_with_config(LogConfig::client())?;
    info!("bizmcp client v{} starting", env!("CARGO_PKG_VERSION"));

    println!("Initializing chatbot...");
    let model = OpenRouterClient::new(args.llm_config())?;

    let mut bridge = BridgeClient::new(&args.host, args.port, args.timeout())?;
    bridge.connect().await?;

    let mut session = ChatSession::new(model, bridge);
    session.register().await;

    println!("Chatbot ready! You can now chat with me.");
    println!("Try asking: 'tell me a joke' or 'add 1 to 42' or 'what tasks do I have?'");
    println!("Type 'quit' to exit.\n");

    let result = run_repl(&mut session).await;

    session.into_tools().disconnect().await;
    result
}

async fn run_repl<M: ChatModel, T: ToolInvoker>(
    session: &mut ChatSession<M, T>,
) -> Result<(), ClientError> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("You: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                println!();
                None
            }
        };

        // EOF or interrupt
        let Some(line) = line else {
            println!("Goodbye!");
            return Ok(());
        };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if is_exit_command(input) {
            println!("Goodbye!");
            return Ok(());
        }

        println!("Thinking...");
        let reply = session.turn(input).await;
        println!("Bot: {}\n", reply);
    }
}
