use std::fs;
use std::io;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{error, info};

use frame_sniffer::cli::Cli;
use frame_sniffer::error::{SessionError, codes, exit_code};
use frame_sniffer::signal::ShutdownFlag;
use frame_sniffer::source::open_source;
use frame_sniffer::command::run_menu;
use frame_sniffer::{Command, Session};

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(e) = cli.validate() {
        eprintln!("error: {e}");
        return ExitCode::from(codes::CONFIG_ERROR);
    }

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(cli.log_filter()))
        .init();

    let shutdown = ShutdownFlag::with_ctrlc();

    let mut source = match open_source(&cli.session_config().source) {
        Ok(source) => source,
        Err(e) => return fail(&SessionError::from(e)),
    };
    let mut session = match Session::new(cli.session_config()) {
        Ok(session) => session,
        Err(e) => return fail(&SessionError::from(e)),
    };

    let outcome = session.run(source.as_mut(), &shutdown);
    println!("{}", session.summary());
    if let Err(e) = outcome {
        return fail(&e);
    }

    if let Err(e) = present(&cli, &session) {
        error!("{e:#}");
        return ExitCode::from(codes::REPORT_ERROR);
    }
    ExitCode::from(codes::SUCCESS)
}

fn fail(err: &SessionError) -> ExitCode {
    error!("{err}");
    ExitCode::from(exit_code(err))
}

fn present(cli: &Cli, session: &Session) -> anyhow::Result<()> {
    if let Some(path) = &cli.report {
        let json = session.full_report().to_json()?;
        fs::write(path, json)
            .with_context(|| format!("writing report to {}", path.display()))?;
        info!("report written to {}", path.display());
    }

    if cli.no_menu {
        for command in Command::ALL {
            if let Some(panel) = session.execute(command) {
                println!("\n{panel}");
            }
        }
        return Ok(());
    }

    run_menu(session, io::stdin().lock(), io::stdout().lock()).context("running the menu")
}
