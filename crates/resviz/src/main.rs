//! resviz CLI application
//!
//! `resviz fetch` is the batch job: it prints one JSON line and exits 0 on
//! success or 1 on failure. Every other command prints text (or a JSON
//! envelope with `--json`) and maps errors to exit codes 2 and 3.

// CLI binary needs to output to stdout/stderr - this is intentional
#![allow(clippy::print_stdout, clippy::print_stderr)]

use resviz::cli::{self, CacheCommands, Cli, CliError, Commands, EXIT_OK, exit_code_for, render_error};
use resviz::commands::{self, CommandContext};
use resviz::dashboard::{self, DashboardOptions};
use resviz::tracing::{Level, TracingConfig, TracingFormat, init_tracing};

/// Exit code for SIGINT (128 + signal number 2)
const EXIT_SIGINT: i32 = 130;

/// Main entry point - determines sync vs async execution path
fn main() {
    // NOTE: Using eprintln! in panic hook is intentional - tracing infrastructure
    // may be corrupted during a panic, so we use the most reliable output method.
    // A detached batch job has no stderr, so the panic is also logged.
    #[allow(clippy::print_stderr)]
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("Application panicked: {panic_info}");
        eprintln!("Internal error occurred. Run with RUST_LOG=debug for more information.");
        tracing::error!(panic = %panic_info, "Application panicked");
    }));

    let cli = cli::parse();
    let exit_code = if requires_async_runtime(&cli) {
        run_with_tokio(cli)
    } else {
        run_sync(cli)
    };
    std::process::exit(exit_code);
}

/// Cache inspection is plain file I/O; everything else needs tokio
const fn requires_async_runtime(cli: &Cli) -> bool {
    !matches!(cli.command, Some(Commands::Cache { .. }) | None)
}

/// Create tokio runtime and run async path
fn run_with_tokio(cli: Cli) -> i32 {
    let rt = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            // NOTE: Using eprintln! here is intentional - tracing is not yet
            // initialized at this point in startup.
            eprintln!("Fatal error: Failed to create tokio runtime: {e}");
            return 1;
        }
    };

    rt.block_on(run(cli))
}

async fn run(cli: Cli) -> i32 {
    let json = cli.json;
    let is_batch = matches!(cli.command, Some(Commands::Fetch { .. }));

    // The batch job must always get to record its outcome, so only the
    // frontends race against Ctrl-C
    if is_batch {
        return finish(real_main(cli).await, json);
    }

    tokio::select! {
        biased;

        _ = tokio::signal::ctrl_c() => EXIT_SIGINT,
        result = real_main(cli) => finish(result, json),
    }
}

fn run_sync(cli: Cli) -> i32 {
    let json = cli.json;
    finish(sync_main(cli), json)
}

fn sync_main(cli: Cli) -> Result<i32, CliError> {
    let ctx = prepare(&cli)?;
    let Some(Commands::Cache { subcommand }) = cli.command else {
        return Err(no_subcommand());
    };
    run_cache(&ctx, &subcommand, cli.json).map(|output| emit(&output))
}

fn finish(result: Result<i32, CliError>, json: bool) -> i32 {
    match result {
        Ok(code) => code,
        Err(err) => {
            render_error(&err, json);
            exit_code_for(&err)
        }
    }
}

fn no_subcommand() -> CliError {
    CliError::config_with_help(
        "No subcommand provided",
        "Run 'resviz --help' for usage information",
    )
}

/// Load settings and initialize tracing
///
/// The batch job also writes its logs to the daily rotated
/// `batch_execution.YYYY-MM-DD.log` in the log directory, at info level or
/// more verbose.
fn prepare(cli: &Cli) -> Result<CommandContext, CliError> {
    let ctx = CommandContext::load(cli.config.as_deref())?;

    let level = Level::from(cli.level);
    let mut config = TracingConfig {
        format: if cli.json {
            TracingFormat::Json
        } else {
            TracingFormat::Compact
        },
        level,
        ..Default::default()
    };
    if matches!(cli.command, Some(Commands::Fetch { .. })) {
        config.level = level.max(Level::INFO);
        config.log_dir = Some(ctx.settings().log_dir()?);
    }
    // Ignore error if tracing already initialized (e.g., in tests)
    let _ = init_tracing(config);

    tracing::debug!(
        correlation_id = %resviz::tracing::correlation_id(),
        run_mode = %ctx.settings().run_mode,
        "Settings loaded"
    );
    Ok(ctx)
}

async fn real_main(cli: Cli) -> Result<i32, CliError> {
    let ctx = prepare(&cli)?;
    let json = cli.json;
    let Some(command) = cli.command else {
        return Err(no_subcommand());
    };

    match command {
        Commands::Fetch {
            scope,
            clear_cache,
            force,
        } => {
            let request = commands::fetch::request_from_args(&scope, clear_cache, force);
            let report = commands::fetch::execute(&ctx, &request).await;
            let output = report.to_json();
            tracing::info!(report = %output, "Batch report");
            println!("{output}");
            Ok(report.exit_code())
        }
        Commands::Refresh {
            scope,
            clear_cache,
            force,
        } => {
            let request = ctx.refresh_request(&scope, clear_cache, force);
            commands::refresh::execute(&ctx, &request, json)
                .await
                .map(|output| emit(&output))
        }
        Commands::Dashboard {
            scope,
            refresh,
            clear_cache,
            tags,
            page,
            page_size,
            no_wait,
        } => {
            let options = DashboardOptions {
                request: ctx.refresh_request(&scope, clear_cache, false),
                refresh,
                tags: tags.into_iter().collect(),
                page,
                page_size,
                wait: !no_wait,
            };
            dashboard::execute(&ctx, options, json)
                .await
                .map(|output| emit(&output))
        }
        Commands::Status {
            region,
            profile,
            clear,
        } => {
            let output = if clear {
                commands::status::clear(&ctx, json).await?
            } else {
                let scope = ctx.scope(region.as_deref(), profile);
                commands::status::show(&ctx, &scope, json).await?
            };
            Ok(emit(&output))
        }
        Commands::Cache { subcommand } => run_cache(&ctx, &subcommand, json).map(|output| emit(&output)),
    }
}

fn run_cache(ctx: &CommandContext, subcommand: &CacheCommands, json: bool) -> Result<String, CliError> {
    match subcommand {
        CacheCommands::Info { scope } => commands::cache::info(ctx, scope, json),
        CacheCommands::Size => commands::cache::size(ctx, json),
        CacheCommands::Clear {
            service,
            region,
            profile,
        } => commands::cache::clear(
            ctx,
            service.as_deref(),
            region.as_deref(),
            profile.as_deref(),
            json,
        ),
    }
}

fn emit(output: &str) -> i32 {
    println!("{output}");
    EXIT_OK
}
