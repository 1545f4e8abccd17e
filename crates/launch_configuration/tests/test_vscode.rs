use std::path::PathBuf;

use launch_configuration::{ChosenLaunchConfiguration, ConsoleOutput, LaunchConfiguration};

#[ctor::ctor]
fn init() {
    let _ = color_eyre::install();
}

fn load_named(name: &str, path: &str) -> eyre::Result<ChosenLaunchConfiguration> {
    launch_configuration::load_from_path(Some(&name.to_string()), path)
}

#[test]
fn test_read_launch_json() {
    let path = "./testdata/vscode/launch.json";
    let ChosenLaunchConfiguration::Specific(LaunchConfiguration::Brightscript(config)) =
        load_named("BrightScript Debug: Launch", path).unwrap()
    else {
        panic!("specified launch configuration not found");
    };

    assert_eq!(config.request.as_deref(), Some("launch"));
    assert_eq!(config.password.as_deref(), Some("rokudev"));

    let resolved = config.resolve("/home/user/channel").unwrap();
    assert_eq!(resolved.host, "192.168.1.20");
    assert_eq!(resolved.root_dir, PathBuf::from("/home/user/channel/dist"));
    assert_eq!(resolved.source_dirs, vec![PathBuf::from("/home/user/channel/src")]);
    assert!(resolved.stop_on_entry);
    assert!(resolved.enable_debugger_auto_recovery);
    assert!(resolved.enable_source_maps);
    assert_eq!(resolved.console_output, ConsoleOutput::Full);
    assert_eq!(resolved.bs_const.get("debug"), Some(&true));
}

#[test]
fn test_read_legacy_configuration() {
    let path = "./testdata/vscode/launch.json";
    let ChosenLaunchConfiguration::Specific(LaunchConfiguration::Brightscript(config)) =
        load_named("Legacy", path).unwrap()
    else {
        panic!("specified launch configuration not found");
    };

    let resolved = config.resolve("/w").unwrap();
    assert_eq!(resolved.root_dir, PathBuf::from("/w"));
    assert_eq!(resolved.source_dirs, vec![PathBuf::from("/w/src")]);
    assert_eq!(
        resolved.staging_folder_path,
        PathBuf::from("/w/build/.roku-deploy-staging")
    );
    assert!(!resolved.enable_source_maps);
}

#[test]
fn test_read_code_workspace() {
    let path = "./testdata/vscode/channel.code-workspace";
    let ChosenLaunchConfiguration::Specific(config) = load_named("Workspace Launch", path).unwrap()
    else {
        panic!("specified launch configuration not found");
    };
    assert_eq!(config.name(), "Workspace Launch");
}

#[test]
fn test_malformed_json() {
    let input = b"not valid json {{{" as &[u8];
    let result = launch_configuration::load(None, input);
    assert!(result.is_err());
}

#[test]
fn test_empty_input() {
    let input = b"" as &[u8];
    let result = launch_configuration::load(None, input);
    assert!(result.is_err());
}

#[test]
fn test_missing_configurations_field() {
    let input = br#"{"version": "0.2.0"}"# as &[u8];
    let result = launch_configuration::load(None, input);
    assert!(result.is_err());
}

#[test]
fn test_unknown_type_is_rejected() {
    let input = br#"{
        "version": "0.2.0",
        "configurations": [
            {"name": "Python", "type": "debugpy", "request": "launch"}
        ]
    }"# as &[u8];
    assert!(launch_configuration::load(None, input).is_err());
}

#[test]
fn test_empty_configurations_array() {
    let input = br#"{"version": "0.2.0", "configurations": []}"# as &[u8];
    let result = launch_configuration::load(None, input);
    let config = result.unwrap();
    assert!(matches!(
        config,
        ChosenLaunchConfiguration::ToBeChosen(names) if names.is_empty()
    ));
}

#[test]
fn test_config_not_found() {
    let path = "./testdata/vscode/launch.json";
    let result = load_named("Nonexistent Config", path).unwrap();
    assert!(matches!(result, ChosenLaunchConfiguration::NotFound));
}

#[test]
fn test_to_be_chosen_lists_names() {
    let path = "./testdata/vscode/launch.json";
    let result = launch_configuration::load_from_path(None, path).unwrap();
    match result {
        ChosenLaunchConfiguration::ToBeChosen(names) => {
            assert_eq!(names, vec!["BrightScript Debug: Launch", "Legacy"]);
        }
        _ => panic!("expected ToBeChosen"),
    }
}

#[test]
fn test_jsonc_with_comments_and_trailing_commas() {
    let input = br#"{
        // This is a comment
        "version": "0.2.0",
        "configurations": [
            {
                "name": "With Comments",
                "type": "brightscript",
                "host": "roku.local", // trailing comment
            },
        ],
    }"# as &[u8];
    let result = launch_configuration::load(Some(&"With Comments".to_string()), input);
    let config = result.unwrap();
    assert!(matches!(
        config,
        ChosenLaunchConfiguration::Specific(LaunchConfiguration::Brightscript(_))
    ));
}
