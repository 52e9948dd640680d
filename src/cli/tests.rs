use super::*;

#[test]
fn test_parse_precompile() {
    let cli = Cli::parse_from(["tplcache", "precompile", "release.yml"]);
    match cli.command {
        Commands::Precompile(ref cmd) => assert_eq!(cmd.release, PathBuf::from("release.yml")),
        other => panic!("unexpected command: {other:?}"),
    }
    assert_eq!(cli.log_level(), "info");
}

#[test]
fn test_parse_compile_with_global_flags_after_subcommand() {
    let cli = Cli::parse_from([
        "tplcache",
        "compile",
        "job.yml",
        "instance.yml",
        "--format",
        "json",
        "--verbose",
        "--config",
        "custom.toml",
    ]);
    assert_eq!(cli.log_level(), "debug");
    assert_eq!(cli.config, Some(PathBuf::from("custom.toml")));
    match cli.command {
        Commands::Compile(cmd) => {
            assert_eq!(cmd.job, PathBuf::from("job.yml"));
            assert_eq!(cmd.instance, PathBuf::from("instance.yml"));
            assert_eq!(cmd.format, OutputFormat::Json);
        }
        other => panic!("unexpected command: {other:?}"),
    }
}

#[test]
fn test_parse_find_commands() {
    let cli = Cli::parse_from(["tplcache", "-q", "find-packages", "router_conf"]);
    assert_eq!(cli.log_level(), "error");
    assert!(matches!(cli.command, Commands::FindPackages(ref cmd) if cmd.template == "router_conf"));

    let cli = Cli::parse_from(["tplcache", "find-rendered", "job.yml", "instance.yml"]);
    assert!(matches!(cli.command, Commands::FindRendered(ref cmd) if cmd.format == OutputFormat::Text));
}

#[test]
fn test_verbose_and_quiet_conflict() {
    assert!(Cli::try_parse_from(["tplcache", "-v", "-q", "find-packages", "x"]).is_err());
}

#[test]
fn test_compile_requires_instance() {
    assert!(Cli::try_parse_from(["tplcache", "compile", "job.yml"]).is_err());
}

#[test]
fn test_cli_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
