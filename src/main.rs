use std::{path::PathBuf, process::ExitCode};

use clap::Parser;
use log::{error, info};
use tiocsti_filter::{
    FilterAction, TIOCLINUX, TIOCSTI, TargetProfile, output, tty_injection_filter,
};

#[derive(Debug, Parser)]
#[command(
    version = format!("v{}", env!("CARGO_PKG_VERSION")),
    about = "Generates a seccomp BPF filter that blocks the TIOCSTI and TIOCLINUX ioctls.",
    after_help = "The output file can be used with bubblewrap's --seccomp option:\n  \
                  tiocsti-filter /tmp/filter.bpf\n  \
                  bwrap --seccomp 3 3</tmp/filter.bpf --ro-bind / / /bin/sh"
)]
struct Cli {
    #[arg(help = "File path the raw BPF program is written to.")]
    output: PathBuf,
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let profile = TargetProfile::native();
    let program = tty_injection_filter(&profile)?;
    let bytes = program.to_bytes();

    info!("Generating seccomp BPF filter for TIOCSTI/TIOCLINUX blocking");
    info!("  Architecture:    {}", profile.arch);
    info!("  Audit arch:      {:#010x}", profile.audit_arch());
    info!("  ioctl syscall:   {}", profile.ioctl_nr);
    info!("  TIOCSTI:         {TIOCSTI:#06x}");
    info!("  TIOCLINUX:       {TIOCLINUX:#06x}");
    if profile.has_x32_abi {
        info!("  x32 ABI:         denied with {:?}", FilterAction::DENY);
    }
    info!("  Instructions:    {}", program.len());
    info!("  Filter size:     {} bytes", bytes.len());

    output::write_artifact(&cli.output, &bytes)?;
    info!("Successfully wrote filter to: {}", cli.output.display());
    Ok(())
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::{CommandFactory, error::ErrorKind};
    use tiocsti_filter::Program;
    use vmm_sys_util::tempdir::TempDir;

    use super::*;

    #[test]
    fn cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn exactly_one_output() {
        let cli = Cli::try_parse_from(["tiocsti-filter", "/tmp/filter.bpf"]).unwrap();
        assert_eq!(cli.output, PathBuf::from("/tmp/filter.bpf"));

        let missing = Cli::try_parse_from(["tiocsti-filter"]).unwrap_err();
        assert_eq!(missing.kind(), ErrorKind::MissingRequiredArgument);

        let extra = Cli::try_parse_from(["tiocsti-filter", "a.bpf", "b.bpf"]).unwrap_err();
        assert_eq!(extra.kind(), ErrorKind::UnknownArgument);
    }

    #[test]
    fn writes_native_filter() {
        let dir = TempDir::new_with_prefix("/tmp/tiocsti-filter").unwrap();
        let cli = Cli {
            output: dir.as_path().join("filter.bpf"),
        };

        run(&cli).unwrap();

        let bytes = std::fs::read(&cli.output).unwrap();
        let expected = tty_injection_filter(&TargetProfile::native()).unwrap();
        assert_eq!(Program::from_bytes(&bytes).unwrap(), expected);
    }

    #[test]
    fn reports_unwritable_destination() {
        let dir = TempDir::new_with_prefix("/tmp/tiocsti-filter").unwrap();
        let cli = Cli {
            output: dir.as_path().join("missing").join("filter.bpf"),
        };

        let err = run(&cli).unwrap_err();
        assert!(err.to_string().starts_with("Cannot open"));
        assert!(err.to_string().contains(&cli.output.display().to_string()));
    }
}
