//! CLI help and argument handling

use crate::prelude::*;

#[test]
fn help_lists_commands() {
    let run = CliBuilder::new("/nonexistent/cbd.sock".into())
        .args(&["--help"])
        .passes();
    for command in ["create", "bind", "unbind", "remove", "status", "ping", "shutdown"] {
        assert!(run.stdout().contains(command), "help missing {command}");
    }
}

#[test]
fn bind_requires_consumer() {
    CliBuilder::new("/nonexistent/cbd.sock".into())
        .args(&["bind", "app1"])
        .fails()
        .stderr_has("<CONSUMER>");
}
