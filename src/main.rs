//! qsh - An interactive query shell with local and remote execution.

use std::path::PathBuf;

use qsh::cli::Cli;
use qsh::config::{Config, ConnectionConfig};
use qsh::engine::{Backend, PostgresSession, SqliteEngine};
use qsh::error::{Result, ShellError};
use qsh::interpreter::{Interpreter, Outcome, HOME_ENV};
use qsh::logging::{self, LogTarget};
use qsh::repl::{history_path, run_interactive, Prompt};
use qsh::session::{ExecutionMode, Session};
use tracing::{error, info};

/// Exit status when the session cannot be set up.
const STARTUP_FAILURE_CODE: i32 = 2;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    if let Err(e) = logging::init(&LogTarget::select(cli.log_stderr), cli.verbose) {
        eprintln!("Warning: {e}");
    }

    let code = run(cli).await;
    std::process::exit(code);
}

async fn run(cli: Cli) -> i32 {
    let Started {
        mut interp,
        local,
        prompt,
    } = match start(&cli).await {
        Ok(started) => started,
        Err(e) => {
            error!("{}: {}", e.category(), e);
            eprintln!("{e}");
            return STARTUP_FAILURE_CODE;
        }
    };

    let install_root = std::env::var_os(HOME_ENV).map(PathBuf::from);
    let home = dirs::home_dir();
    let outcome = match interp
        .process_init_files(install_root.as_deref(), home.as_deref())
        .await
    {
        Outcome::Code(_) => run_entry_point(&mut interp, &prompt).await,
        exit => exit,
    };

    interp.session_mut().flush();
    drop(interp);
    if let Some(engine) = local {
        engine.close().await;
    }

    info!("Exiting with {}", outcome.code());
    outcome.code()
}

/// A session ready to take input.
struct Started {
    interp: Interpreter,
    /// Kept so the local engine can be closed on exit.
    local: Option<SqliteEngine>,
    prompt: String,
}

/// Loads configuration, opens the backend and builds the session.
async fn start(cli: &Cli) -> Result<Started> {
    cli.validate()?;

    let config_path = cli.config_path();
    info!("Loading config from: {}", config_path.display());
    let config = Config::load_from_file(&config_path)?;

    let (mode, backend, local) = match resolve_connection(cli, &config)? {
        Some(conn) => {
            info!("Connection: {}", conn.display_string());
            let remote = PostgresSession::connect(&conn).await?;
            let mode = ExecutionMode::Remote {
                host: remote.host().to_string(),
                port: remote.port(),
            };
            (mode, Backend::Remote(Box::new(remote)), None)
        }
        None => {
            let database = cli.local_db.as_deref().unwrap_or(&config.local.database);
            let engine = SqliteEngine::open(database).await?;
            let backend = Backend::Local(Box::new(engine.clone()));
            (ExecutionMode::Local, backend, Some(engine))
        }
    };

    let mut variables = config.session_variables();
    variables.extend(cli.set.iter().cloned());
    let mut session = Session::stdio(mode).with_variables(variables);
    session.verbose = cli.verbose;
    session.silent = cli.silent;
    session.init_files = cli.init.clone();
    session.exec_string = cli.execute.clone();
    session.file_name = cli.file.clone();
    session.key_summary_file = config.sampling.key_summary_file.clone();

    Ok(Started {
        interp: Interpreter::new(session, backend),
        local,
        prompt: config.cli.prompt,
    })
}

/// Runs `-e`, `-f` or the interactive loop.
async fn run_entry_point(interp: &mut Interpreter, prompt: &str) -> Outcome {
    if let Some(outcome) = interp.run_batch().await {
        return outcome;
    }

    let prompt = Prompt::new(prompt, interp.session().mode());
    match run_interactive(interp, &prompt, history_path()).await {
        Ok(outcome) => outcome,
        Err(e) => {
            interp.session_mut().report(&e);
            Outcome::Exit(e.response_code())
        }
    }
}

/// Resolves the remote connection from CLI args, config file, and environment.
///
/// Precedence: the CLI connection string, then individual CLI flags over the
/// named (`-c`) or default connection. `None` selects the local engine.
fn resolve_connection(cli: &Cli, config: &Config) -> Result<Option<ConnectionConfig>> {
    let from_cli = cli.to_connection_config()?;
    if cli.connection_string.is_some() {
        return Ok(from_cli.map(with_env_defaults));
    }

    let mut connection = match cli.connection_name() {
        Some(name) => Some(config.get_connection(Some(name)).cloned().ok_or_else(|| {
            ShellError::config(format!("Connection '{name}' not found in config file"))
        })?),
        None => config.get_connection(None).cloned(),
    };

    if let Some(flags) = from_cli {
        match connection.as_mut() {
            Some(base) => base.merge(&flags),
            None => connection = Some(flags),
        }
    }

    Ok(connection.map(with_env_defaults))
}

fn with_env_defaults(mut conn: ConnectionConfig) -> ConnectionConfig {
    conn.apply_env_defaults();
    conn
}
