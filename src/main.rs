//! Ellire CLI
//!
//! Entry point for the `ellire` command-line tool.

use clap::{ArgAction, Parser, Subcommand};
use ellire::config::{install_default_configs, InstallOutcome, InstallStatus};
use ellire::generate::TemplateMacros;
use ellire::macros::{EnvUsage, MacroMap};
use ellire::pipeline::{ReprocessOutcome, ResolvedRun};
use ellire::{
    ConfigLocations, MacroOverrides, MacroReport, MacroResolver, Pipeline, PipelineError,
    ProcessEnvironment,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;

#[derive(Parser)]
#[command(name = "ellire")]
#[command(about = "Reprocess templates from layered macro configuration", version)]
struct Cli {
    /// Override a macro value (name=value); may be repeated
    #[arg(short = 'm', long = "macro", value_name = "NAME=VALUE", global = true)]
    macros: Vec<String>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// System config file (default: /etc/ellire.json)
    #[arg(long, value_name = "FILE", global = true)]
    system_config: Option<PathBuf>,

    /// Directory holding the user config (default: ~/.ellire)
    #[arg(long, value_name = "DIR", global = true)]
    user_config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Reprocess all template files (default)
    ReprocessTemplates,

    /// List raw and fully processed macros
    ListMacros {
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },

    /// Print the active profile
    GetProfile,

    /// List all templates and the macros they need
    TemplateMacros,

    /// Install empty system and user config files
    InstallDefaultConfig,
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let locations = locations(&cli);
    let command = cli.command.unwrap_or(Commands::ReprocessTemplates);

    if let Commands::InstallDefaultConfig = command {
        run_install_default_config(&locations);
        return;
    }

    let overrides = match MacroOverrides::parse(&cli.macros) {
        Ok(o) => o,
        Err(e) => fail(PipelineError::from(e)),
    };
    let env = ProcessEnvironment;
    let pipeline = Pipeline::new(
        MacroResolver::new(&env)
            .with_locations(locations)
            .with_overrides(overrides),
    );

    match command {
        Commands::ReprocessTemplates => run_reprocess(&pipeline, cli.verbose),
        Commands::ListMacros { json } => run_list_macros(&pipeline, json),
        Commands::GetProfile => run_get_profile(&pipeline),
        Commands::TemplateMacros => run_template_macros(&pipeline),
        Commands::InstallDefaultConfig => {}
    }
}

fn init_logging(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_level.into()),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn locations(cli: &Cli) -> ConfigLocations {
    let mut locations = ConfigLocations::default();
    if let Some(ref path) = cli.system_config {
        locations = locations.with_system_file(path.clone());
    }
    if let Some(ref dir) = cli.user_config_dir {
        locations = locations.with_user_dir(dir.clone());
    }
    locations
}

fn fail(error: PipelineError) -> ! {
    eprintln!("Error: {}", error);
    process::exit(error.exit_code());
}

fn print_header(title: &str) {
    println!();
    println!("{}", title);
    println!("{}", "=".repeat(title.len()));
}

fn print_two_columns<'a, I>(rows: I, headings: (&str, &str))
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let rows: Vec<_> = rows.into_iter().collect();
    let width = rows
        .iter()
        .map(|(name, _)| name.len())
        .chain(std::iter::once(headings.0.len()))
        .max()
        .unwrap_or(0);

    println!(" {:<width$}  {}", headings.0, headings.1, width = width);
    for (name, value) in rows {
        println!(" {:<width$}  {}", name, value, width = width);
    }
}

fn print_macros(macros: &MacroMap) {
    print_two_columns(macros, ("Macro name", "Macro value"));
}

fn print_env_usage(usage: &EnvUsage) {
    print_header("Environment variables used");
    if usage.is_empty() {
        println!(" No macros defined via environment");
        return;
    }
    print_two_columns(usage, ("Macro name", "Environment variable name"));
}

fn print_template_macros(usage: &BTreeMap<PathBuf, TemplateMacros>) {
    for (template, macros) in usage {
        println!(" {}", template.display());
        if macros.known.is_empty() {
            println!("     (no macros)");
        }
        for name in &macros.known {
            if macros.missing.contains(name) {
                println!("     {} (missing)", name);
            } else {
                println!("     {}", name);
            }
        }
    }
}

fn run_reprocess(pipeline: &Pipeline<'_>, verbose: u8) {
    let ReprocessOutcome { run, report } = match pipeline.reprocess() {
        Ok(outcome) => outcome,
        Err(e) => fail(e),
    };

    if verbose >= 2 {
        print_run_details(&run);
    }

    if run.templates.is_empty() {
        print_header("Generating files from templates");
        println!(" No template files found");
        return;
    }

    let extension = run
        .raw
        .macros
        .get("dist_file_extension")
        .unwrap_or("template");
    if verbose >= 1 {
        print_header(&format!("Find all .{} files", extension));
        for template in &run.templates {
            println!(" {}", template.display());
        }

        print_header(&format!(
            "Find all macros needed (and missing) in .{} files",
            extension
        ));
        print_template_macros(&report.macros);
    }

    print_header("Generating files from templates");
    for (template, outcome) in &report.outcomes {
        println!(" [{}] {}", outcome.label(), template.display());
    }
}

fn print_run_details(run: &ResolvedRun) {
    print_header("Config files used");
    if run.raw.config_files.is_empty() {
        println!(" No config files found");
    }
    for source in &run.raw.config_files {
        println!(" {} (sha256 {})", source.path.display(), source.digest);
    }

    print_env_usage(&run.processed.env_vars_used);

    print_header("Load raw macro values from config and environment");
    print_macros(run.raw.macros.values());

    print_header("Resolve all macro values");
    print_macros(&run.processed.macros);
}

fn run_list_macros(pipeline: &Pipeline<'_>, json: bool) {
    let run = match pipeline.resolve() {
        Ok(run) => run,
        Err(e) => fail(e),
    };

    if json {
        match MacroReport::build(&run.raw, &run.processed).to_json() {
            Ok(json) => println!("{}", json),
            Err(e) => {
                eprintln!("Error serializing output: {}", e);
                process::exit(1);
            }
        }
        return;
    }

    print_header("Load raw macro values from config and environment");
    let width = run.raw.macros.values().keys().map(String::len).max().unwrap_or(0);
    for (name, value) in run.raw.macros.values() {
        let origin = run
            .raw
            .macros
            .origin(name)
            .map(|layer| layer.as_str())
            .unwrap_or("core");
        println!(" {:<width$}  {}  [{}]", name, value, origin, width = width);
    }

    print_header("Resolve all macro values");
    print_macros(&run.processed.macros);

    if !run.processed.unresolved.is_empty() {
        print_header("Macros without a value");
        for name in &run.processed.unresolved {
            println!(" {}", name);
        }
    }
}

fn run_get_profile(pipeline: &Pipeline<'_>) {
    match pipeline.resolver().resolve_profile() {
        Ok(profile) => println!("{}", profile),
        Err(e) => fail(PipelineError::from(e)),
    }
}

fn run_template_macros(pipeline: &Pipeline<'_>) {
    let (run, usage) = match pipeline.template_macros() {
        Ok(result) => result,
        Err(e) => fail(e),
    };

    if run.templates.is_empty() {
        println!(" No template files found");
        return;
    }
    print_template_macros(&usage);
}

fn print_install_outcome(outcome: &InstallOutcome, scope: &str) {
    let path = outcome.path.display();
    match &outcome.status {
        InstallStatus::AlreadyPresent => println!(" {} is already installed", path),
        InstallStatus::Installed => {
            println!(" {} successfully installed, adjust it as needed for {}", path, scope)
        }
        InstallStatus::Failed(e) => {
            println!(" Cannot write to {}: {}", path, e);
            println!(" To install it manually, create it with the contents:");
            print!("{}", ellire::config::DEFAULT_CONFIG);
        }
    }
}

fn run_install_default_config(locations: &ConfigLocations) {
    let report = install_default_configs(locations);

    print_header("Installing default config for all users of the system");
    print_install_outcome(&report.system, "this machine");

    print_header("Installing default config for the current user");
    match &report.user {
        Some(outcome) => print_install_outcome(outcome, "this user account"),
        None => println!(" No home directory found"),
    }

    let system = report.system.status.is_present();
    let user = report
        .user
        .as_ref()
        .map(|o| o.status.is_present())
        .unwrap_or(false);

    print_header("Summary");
    match (system, user) {
        (true, true) => println!(" Both configuration files exist. Now simply adjust them as needed."),
        (true, false) => println!(
            " System-wide config installed. Consider adding user-level configuration for the current user."
        ),
        (false, true) => println!(
            " Only user-level configuration installed. The system-wide config is recommended on machines with several user accounts."
        ),
        (false, false) => {
            eprintln!("Both system and user config is missing. Install at least one and set the 'profile' macro.");
            process::exit(1);
        }
    }
}
