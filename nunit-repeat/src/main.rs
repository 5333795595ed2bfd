// Copyright (c) The nunit-repeat Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use clap::Parser;
use color_eyre::Result;
use nunit_repeat::NunitRepeatApp;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = enable_ansi_support::enable_ansi_support();

    let app = NunitRepeatApp::parse();
    let output = app.init_output();

    match app.exec(output) {
        Ok(()) => Ok(()),
        Err(error) => {
            error.display_to_stderr(&output.stderr_styles());
            std::process::exit(error.process_exit_code());
        }
    }
}
