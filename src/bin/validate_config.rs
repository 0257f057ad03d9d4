use clap::Parser;
use std::process::ExitCode;
use tracing::info;

use tokenops::config::{Ctx, Env, setup_tracing};

fn main() -> ExitCode {
    let env = Env::parse();

    let ctx = match Ctx::load_files(&env.config, &env.secrets) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("Config validation failed: {}", e.kind());
            return ExitCode::FAILURE;
        }
    };

    setup_tracing(&ctx.log_level);

    match ctx.signing_strategy(None) {
        Ok(strategy) => {
            info!(
                signer = strategy.name(),
                operator = %ctx.operator_account,
                network = %ctx.explorer.network(),
                "Config validation passed"
            );
            eprintln!("Config validation passed");
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Config validation failed: {}", e.kind());
            ExitCode::FAILURE
        }
    }
}
