//! Interactive chat over stdin, one engine turn per line.

use canho_core::config::AppConfig;
use tokio::io::{self, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::error;
use uuid::Uuid;

use super::{build_engine, CommandResult};

pub async fn run(config: &AppConfig, session_id: Option<String>) -> CommandResult {
    let engine = match build_engine(config) {
        Ok(engine) => engine,
        Err(error) => return CommandResult::failure(format!("chat setup failed: {error:#}")),
    };

    let session_id = session_id.unwrap_or_else(|| Uuid::new_v4().simple().to_string());
    println!("Phiên tư vấn: {session_id} (gõ /exit để kết thúc)");

    let mut lines = BufReader::new(io::stdin()).lines();
    let mut stdout = io::stdout();

    loop {
        if stdout.write_all(b"> ").await.is_err() || stdout.flush().await.is_err() {
            break;
        }
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(read_error) => {
                error!(error = %read_error, "stdin read failed");
                return CommandResult::failure("could not read from stdin");
            }
        };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == "/exit" {
            break;
        }

        match engine.run_turn(&session_id, message).await {
            Ok(turn) => println!("{}", turn.reply),
            Err(engine_error) => {
                error!(error = %engine_error, "turn failed");
                println!("{}", engine_error.user_message());
            }
        }
    }

    CommandResult::success("Cảm ơn anh/chị đã ghé thăm. Hẹn gặp lại ạ!")
}
