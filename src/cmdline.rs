use crate::interpreter::{self, Interpreter};
use ansi_term::Colour::Red;
use derive_more::Display;
use linefeed::{DefaultTerminal, Interface, ReadResult, Terminal};
use std::path::PathBuf;

const USAGE: &str = "usage: scheme [--no-tail-calls] [-i] [FILE]";

#[derive(Debug, Display)]
pub enum Error {
    #[display(fmt = "{}\n{}", _0, USAGE)]
    Usage(String),
    #[display(fmt = "IO error: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "{}", _0)]
    Interpreter(interpreter::Error),
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<interpreter::Error> for Error {
    fn from(e: interpreter::Error) -> Self {
        Error::Interpreter(e)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub tail_calls: bool,
    pub script: Option<PathBuf>,
    /// Enter the REPL after running `script`.
    pub interactive: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            tail_calls: true,
            script: None,
            interactive: false,
        }
    }
}

impl Config {
    /// Parse everything after the program name.
    pub fn from_args(args: &[String]) -> Result<Self, Error> {
        let mut config = Config::default();
        for arg in args {
            match arg.as_str() {
                "--no-tail-calls" => config.tail_calls = false,
                "-i" | "--interactive" => config.interactive = true,
                flag if flag.starts_with('-') => {
                    return Err(Error::Usage(format!("unknown option {}", flag)))
                }
                path => match config.script {
                    Some(_) => return Err(Error::Usage(format!("unexpected argument {}", path))),
                    None => config.script = Some(PathBuf::from(path)),
                },
            }
        }
        Ok(config)
    }

    pub fn wants_repl(&self) -> bool {
        self.script.is_none() || self.interactive
    }
}

pub fn setup() -> std::io::Result<Interface<DefaultTerminal>> {
    let interface = Interface::new("scheme")?;
    interface.set_prompt("scm> ")?;
    if let Some(path) = history_path() {
        interface.load_history(path).ok();
    };
    Ok(interface)
}

fn history_path() -> Option<PathBuf> {
    dirs::data_dir().map(|mut path| {
        path.push(".scheme_history");
        path
    })
}

pub fn save_history<T: Terminal>(interface: &Interface<T>) -> std::io::Result<()> {
    match history_path() {
        Some(path) => interface.save_history(path),
        None => Ok(()),
    }
}

pub fn repl<T: Terminal>(interface: &Interface<T>, processor: impl Fn(&str) -> String) {
    loop {
        match interface.read_line() {
            Ok(ReadResult::Eof) => break,
            Ok(ReadResult::Signal(sig)) => {
                writeln!(interface, "Received signal {:?}", sig).ok();
            }
            Ok(ReadResult::Input(line)) => {
                if line.trim().is_empty() {
                    continue;
                }
                interface.add_history_unique(line.clone());
                let output = processor(&line);
                if !output.is_empty() {
                    writeln!(interface, "{}", output).ok();
                }
            }
            Err(e) => {
                writeln!(interface, "Error: {}", e).ok();
                break;
            }
        }
    }
}

pub fn render_error(e: &impl std::fmt::Display) -> String {
    let message = format!("Error: {}", e);
    match atty::is(atty::Stream::Stdout) {
        true => Red.paint(message).to_string(),
        false => message,
    }
}

fn rep_or_report(interpreter: &Interpreter, line: &str) -> String {
    match interpreter.rep(line) {
        Ok(output) => output,
        Err(e) => render_error(&e),
    }
}

/// Entry point for the binary; `args` includes the program name.
pub fn launch(args: Vec<String>) -> Result<(), Error> {
    let config = Config::from_args(args.get(1..).unwrap_or_default())?;
    log::debug!("starting with {:?}", config);
    let interpreter = Interpreter::new(config.tail_calls)?;

    if let Some(script) = &config.script {
        interpreter.load_file(script)?;
    }
    if config.wants_repl() {
        let interface = setup()?;
        repl(&interface, |line| rep_or_report(&interpreter, line));
        save_history(&interface)?;
    }
    Ok(())
}
