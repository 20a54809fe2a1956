use anyhow::Context;
use std::path::PathBuf;

#[derive(Debug, Default)]
struct CliArgs {
    root: Option<PathBuf>,
    no_presence: bool,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;
    let root = playshelf::config::data_root(args.root.as_deref())?;
    let layout = playshelf::config::Layout::under(root);
    layout.ensure_dirs()?;
    playshelf::logging::init(&layout.log_file).context("failed to initialise logging")?;
    log::info!("starting with data root {}", layout.root.display());

    playshelf::app::run(playshelf::app::StartupOptions {
        layout,
        presence: !args.no_presence,
    })
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--no-presence" => out.no_presence = true,
            "--root" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--root requires a directory");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--root cannot be empty");
                }
                out.root = Some(PathBuf::from(value.trim()));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("playshelf");
    println!("  --root <dir>      Data directory (PLAYSHELF_HOME takes precedence)");
    println!("  --no-presence     Do not connect to Discord");
}
