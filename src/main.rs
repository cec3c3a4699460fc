use anyhow::Result;
use minishell::Interpreter;
use minishell::config::{Args, ShellConfig};
use minishell::editor::{BufReadSource, InteractiveEditor};
use std::io;

fn run(config: &ShellConfig) -> Result<i32> {
    let mut sh = Interpreter::default().with_quote_mode(config.quote_mode);

    if let Some(line) = &config.command {
        let status = sh.execute_line(line)?;
        return Ok(sh.exit_request().unwrap_or(status));
    }

    let code = if config.use_editor() {
        let search_path = sh.env().get_var("PATH");
        let mut editor = InteractiveEditor::new(config.history_file.clone(), search_path)?;
        sh.repl(&mut editor, &config.prompt)?
    } else {
        let mut source = BufReadSource::new(io::stdin().lock(), io::stdout());
        sh.repl(&mut source, &config.prompt)?
    };
    Ok(code)
}

fn main() {
    env_logger::init();
    let config = ShellConfig::from(argh::from_env::<Args>());
    log::debug!("starting with {:?}", config);

    match run(&config) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            log::error!("fatal: {:?}", e);
            eprintln!("minishell: {:#}", e);
            std::process::exit(1);
        }
    }
}
