use anyhow::Result;
use clap::Parser;

use shieldpost_cli::cli::{Cli, Commands, ConfigCommands};
use shieldpost_cli::client::Gateways;
use shieldpost_cli::output::{error_hint, print_config, print_error, print_success};
use shieldpost_cli::{commands, config, observability};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let verbose = cli.verbose;
    observability::init_tracing(verbose);

    if let Err(e) = run(cli).await {
        print_error(&format!("{e:#}"));
        if let Some(hint) = error_hint(&e, verbose) {
            eprintln!("  {hint}");
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let profile_name = cli.profile.as_str();
    let profile = config::load_profile(profile_name)?;

    if let Commands::Config(args) = &cli.command {
        match &args.command {
            ConfigCommands::Show => print_config(profile_name, &profile),
            ConfigCommands::Set(set_args) => {
                let mut cfg = profile.clone();
                cfg.set(&set_args.key, &set_args.value)?;
                config::save_profile(profile_name, &cfg)?;
                print_success(&format!("Set {} = {}", set_args.key, set_args.value));
            }
        }
        return Ok(());
    }

    let format = match cli.format {
        Some(format) => format,
        None => profile.output_format()?.unwrap_or_default(),
    };
    let gateways = Gateways::new(config::resolve(&cli, &profile)?);

    match &cli.command {
        Commands::Subscribe(args) => commands::subscribe::subscribe(&gateways, args, format).await?,
        Commands::Unsubscribe(args) => {
            commands::subscribe::unsubscribe(&gateways, args, format).await?
        }
        Commands::SendTest(args) => commands::send::send_test(&gateways, args, format).await?,
        Commands::Contacts(args) => commands::send::contacts(&gateways, args, format).await?,
        Commands::Balance => commands::account::balance(&gateways, format).await?,
        Commands::Deposit(args) => {
            commands::account::deposit(&gateways, args.amount, format).await?
        }
        Commands::Withdraw(args) => {
            commands::account::withdraw(&gateways, args.amount, format).await?
        }
        Commands::Config(_) => {}
    }

    Ok(())
}
