//! Shell-channel binary entry point.

use std::process::ExitCode;

use shell_channel::cli::{self, Args};
use shell_channel::config::Config;
use shell_channel::{
    exit_hook, logging, Command, CommandChannel, CommandKind, LookFor, ShellChannelError,
};
use tracing::{debug, error};

#[tokio::main]
async fn main() -> ExitCode {
    let args = match cli::parse_args() {
        Ok(args) => args,
        Err(e) => {
            eprintln!("error: {}", e);
            eprintln!("Run 'shell-channel --help' for usage.");
            return ExitCode::from(2);
        }
    };

    if args.help {
        cli::print_help();
        return ExitCode::SUCCESS;
    }
    if args.version {
        cli::print_version();
        return ExitCode::SUCCESS;
    }

    let config = match Config::load(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let _ = logging::try_init_with_level(Some(config.log_filter()));

    if args.tokens.is_empty() {
        eprintln!("error: no command given");
        eprintln!("Run 'shell-channel --help' for usage.");
        return ExitCode::from(2);
    }

    exit_hook::install_signal_handler();

    let channel_config = config.to_channel_config();
    debug!(?channel_config, "Opening channel");
    let channel = CommandChannel::new(channel_config);

    let outcome = run(&channel, &args).await;
    let closed = channel.close();

    match outcome.and(closed) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Command failed");
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run(channel: &CommandChannel, args: &Args) -> shell_channel::Result<()> {
    let kind = match (args.run, args.follow) {
        (true, true) => CommandKind::RunFollow,
        (true, false) => CommandKind::Run,
        (false, true) => CommandKind::LogsFollow,
        (false, false) => CommandKind::Generic,
    };
    let command = Command::new(kind, args.tokens.iter());

    if !args.follow && args.look_for.is_none() {
        let result = channel.execute_async(command).await?;
        for line in result {
            println!("{}", line);
        }
        return Ok(());
    }

    let mut request = channel.logs(command);
    if args.follow {
        request = request.follow();
    }
    if let Some(ref text) = args.look_for {
        let mut look_for = LookFor::word(text);
        if let Some(timeout) = args.timeout {
            look_for = look_for.with_timeout(timeout);
        }
        request = request.look_for(look_for);
    }

    tokio::task::spawn_blocking(move || {
        for line in request.stream() {
            println!("{}", line?);
        }
        Ok::<(), ShellChannelError>(())
    })
    .await
    .map_err(|e| ShellChannelError::TaskFailed(e.to_string()))?
}
