mod cascade;
mod db;
mod entities;
mod ipc;
mod store;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn init_logging() {
    // stdout carries the IPC stream; logs go to stderr only.
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_env("SCHOOLD_LOG")
                .unwrap_or_else(|_| "schoold=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();
}

fn main() {
    init_logging();

    let registry = match entities::EntityRegistry::school() {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(error = %e, "invalid relation rules");
            std::process::exit(1);
        }
    };

    let mut state = ipc::AppState {
        workspace: None,
        db: None,
        registry,
    };

    if let Some(path) = std::env::var_os("SCHOOLD_WORKSPACE").map(PathBuf::from) {
        match db::open_db(&path) {
            Ok(conn) => {
                tracing::info!(workspace = %path.display(), "workspace preselected");
                state.workspace = Some(path);
                state.db = Some(conn);
            }
            Err(e) => tracing::warn!(
                workspace = %path.display(),
                error = %e,
                "cannot preselect workspace"
            ),
        }
    }

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(v) => v,
            Err(_) => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let req: ipc::Request = match serde_json::from_str(&line) {
            Ok(v) => v,
            Err(e) => {
                // Can't reply without id; emit an anonymous error line.
                tracing::warn!(error = %e, "bad request line");
                let reply = serde_json::json!({
                    "ok": false,
                    "error": { "code": "bad_json", "message": e.to_string() }
                });
                let _ = writeln!(stdout, "{}", reply);
                let _ = stdout.flush();
                continue;
            }
        };

        let resp = ipc::handle_request(&mut state, req);
        let _ = writeln!(
            stdout,
            "{}",
            serde_json::to_string(&resp).unwrap_or_else(|_| "{\"ok\":false}".to_string())
        );
        let _ = stdout.flush();
    }

    tracing::info!("stdin closed, exiting");
}
