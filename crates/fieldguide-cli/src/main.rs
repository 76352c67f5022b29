// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

mod config;
mod runtime;

use anyhow::{Context, Result, bail};
use config::Config;
use fieldguide_api::Client;
use fieldguide_app::{AppCommand, AppState};
use runtime::ServiceRuntime;
use std::env;
use std::io::{BufRead, Write};
use std::path::PathBuf;

fn main() {
    if let Err(error) = run() {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let options = parse_cli_args(env::args().skip(1), Config::default_path()?)?;
    if options.show_help {
        print_help();
        return Ok(());
    }

    if options.print_config_path {
        println!("{}", options.config_path.display());
        return Ok(());
    }

    if options.print_example {
        print!("{}", Config::example_config(&options.config_path));
        return Ok(());
    }

    let config = Config::load(&options.config_path).with_context(|| {
        format!(
            "load config {}; run `fieldguide --print-example-config` to generate a template",
            options.config_path.display()
        )
    })?;

    let mut client = Client::new(config.base_url()?, config.anon_key()?, config.timeout()?)
        .with_context(|| {
            format!(
                "invalid [service] config in {}; fix base_url/anon_key/timeout values",
                options.config_path.display()
            )
        })?;
    if let Some(token) = config.access_token() {
        client.set_access_token(&token);
    }

    if let Some(email) = &options.login_email {
        return login(&client, email);
    }

    if options.check_only {
        return Ok(());
    }

    // No valid session means no list view; the terminal equivalent of a
    // redirect to the login page.
    let Some(session) = client.current_session()? else {
        bail!(
            "no active session -- run `fieldguide --login <email>` and store the printed token in [service].access_token"
        );
    };

    let mut state = AppState::default();
    if let Some(query) = options.initial_query {
        state.dispatch(AppCommand::SetQuery(query));
    }
    let mut runtime = ServiceRuntime::new(&client, session.user_id);
    fieldguide_tui::run_app(&mut state, &mut runtime)
}

fn login(client: &Client, email: &str) -> Result<()> {
    eprint!("password for {email} (input is echoed): ");
    std::io::stderr().flush().context("flush prompt")?;

    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .context("read password from stdin")?;
    let password = password.trim_end_matches(['\r', '\n']);

    let signed_in = client.sign_in(email, password)?;
    println!("{}", signed_in.access_token);
    eprintln!(
        "signed in as {}; store the token above in [service].access_token or FIELDGUIDE_ACCESS_TOKEN",
        signed_in.user_id
    );
    if let Some(expires_at) = signed_in.expires_at {
        eprintln!("token expires at {expires_at}");
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CliOptions {
    config_path: PathBuf,
    print_config_path: bool,
    print_example: bool,
    check_only: bool,
    login_email: Option<String>,
    initial_query: Option<String>,
    show_help: bool,
}

fn parse_cli_args<I, S>(args: I, default_config_path: PathBuf) -> Result<CliOptions>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut options = CliOptions {
        config_path: default_config_path,
        print_config_path: false,
        print_example: false,
        check_only: false,
        login_email: None,
        initial_query: None,
        show_help: false,
    };

    let mut iter = args.into_iter();
    while let Some(arg) = iter.next() {
        match arg.as_ref() {
            "--config" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--config requires a file path"))?;
                options.config_path = PathBuf::from(value.as_ref());
            }
            "--print-config-path" => {
                options.print_config_path = true;
            }
            "--print-example-config" => {
                options.print_example = true;
            }
            "--check" => {
                options.check_only = true;
            }
            "--login" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--login requires an email address"))?;
                options.login_email = Some(value.as_ref().to_owned());
            }
            "--query" => {
                let value = iter
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--query requires a search string"))?;
                options.initial_query = Some(value.as_ref().to_owned());
            }
            "--help" | "-h" => {
                options.show_help = true;
            }
            unknown => {
                return Err(anyhow::anyhow!(
                    "unknown argument {unknown:?}; run with --help to see supported options"
                ));
            }
        }
    }

    Ok(options)
}

fn print_help() {
    println!("fieldguide");
    println!("  --config <path>          Use a specific config path");
    println!("  --print-config-path      Print resolved config path");
    println!("  --print-example-config   Print a config template");
    println!("  --check                  Validate config and service settings");
    println!("  --login <email>          Sign in and print an access token");
    println!("  --query <text>           Start with the search filter applied");
    println!("  --help                   Show this help");
}
