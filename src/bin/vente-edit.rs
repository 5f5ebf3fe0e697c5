use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing_subscriber::EnvFilter;
use vente_editor::config::{EditorConfig, config_file_path};
use vente_editor::richtext::html_converter::{document_to_html, html_to_document, parse_document};
use vente_editor::richtext::insert_menu::InsertKind;
use vente_editor::richtext::keyboard::{Key, KeyEvent, KeyOutcome};
use vente_editor::richtext::selection::{EditorEvent, HostCaret};
use vente_editor::richtext::session::{EditorHost, EditorSession};
use vente_editor::richtext::toolbar::FormatCommand;

#[derive(Parser, Debug)]
#[command(name = "vente-edit")]
#[command(about = "Inspect and script the rich content editor", long_about = None)]
struct Args {
    /// Config file (defaults to the user config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Parse content and print it in canonical form
    Render {
        /// Content file, or `-` for stdin
        file: PathBuf,
        /// Fail on malformed content instead of starting from an empty paragraph
        #[arg(long)]
        strict: bool,
        /// Print the block structure instead of HTML
        #[arg(long)]
        outline: bool,
    },
    /// Apply a script of editor actions to content and print the result
    Replay {
        /// Content file, or `-` for stdin
        file: PathBuf,
        /// TOML script with `[[step]]` entries
        script: PathBuf,
        /// Print every content change
        #[arg(short, long)]
        verbose: bool,
    },
    /// Print the effective configuration
    Config {
        /// Print the config file path instead
        #[arg(long)]
        path: bool,
    },
}

/// One scripted editor action
#[derive(Deserialize, Debug)]
#[serde(tag = "action", rename_all = "snake_case")]
enum Step {
    /// Type text, one key press per character
    Type { text: String },
    Key {
        key: String,
        #[serde(default)]
        shift: bool,
        #[serde(default)]
        ctrl: bool,
    },
    Caret { block: usize, offset: usize },
    Select {
        anchor: (usize, usize),
        focus: (usize, usize),
    },
    Format { command: String },
    Insert { kind: String },
    /// Answer a pending image request; no source cancels it
    Image { source: Option<String> },
}

#[derive(Deserialize, Debug)]
struct Script {
    #[serde(default)]
    step: Vec<Step>,
}

struct ReplayHost {
    verbose: bool,
    changes: usize,
}

impl EditorHost for ReplayHost {
    fn on_change(&mut self, content: &str) {
        self.changes += 1;
        if self.verbose {
            eprintln!("--- change {} ---\n{}", self.changes, content.trim_end());
        }
    }

    fn request_image(&mut self) {
        tracing::info!("image requested");
    }
}

fn read_input(file: &Path) -> io::Result<String> {
    if file == Path::new("-") {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Ok(buf)
    } else {
        fs::read_to_string(file)
    }
}

fn load_config(path: Option<&Path>) -> (EditorConfig, Option<PathBuf>) {
    let path = path.map(Path::to_path_buf).or_else(config_file_path);
    let config = path
        .as_deref()
        .map(EditorConfig::load_or_default)
        .unwrap_or_default();
    (config, path)
}

fn parse_key(name: &str) -> Result<Key, String> {
    let key = match name.to_ascii_lowercase().as_str() {
        "enter" | "return" => Key::Enter,
        "backspace" => Key::Backspace,
        "delete" | "del" => Key::Delete,
        "left" => Key::ArrowLeft,
        "right" => Key::ArrowRight,
        "up" => Key::ArrowUp,
        "down" => Key::ArrowDown,
        "home" => Key::Home,
        "end" => Key::End,
        "space" => Key::Char(' '),
        _ => {
            let mut chars = name.chars();
            match (chars.next(), chars.next()) {
                (Some(ch), None) => Key::Char(ch),
                _ => return Err(format!("unknown key '{}'", name)),
            }
        }
    };
    Ok(key)
}

fn run_step(session: &mut EditorSession<ReplayHost>, step: Step) -> Result<(), String> {
    let now = Instant::now();
    match step {
        Step::Type { text } => {
            for ch in text.chars() {
                session.handle_key(KeyEvent::new(Key::Char(ch)), now);
            }
        }
        Step::Key { key, shift, ctrl } => {
            let mut event = KeyEvent::new(parse_key(&key)?);
            if shift {
                event = event.with_shift();
            }
            if ctrl {
                event = event.with_ctrl();
            }
            if session.handle_key(event, now) == KeyOutcome::Ignored {
                tracing::info!(%key, "key had no effect");
            }
        }
        Step::Caret { block, offset } => {
            session.set_caret(HostCaret::in_block(block, offset));
            session.notify(EditorEvent::Click, now);
        }
        Step::Select { anchor, focus } => {
            session.set_selection(
                HostCaret::in_block(anchor.0, anchor.1),
                HostCaret::in_block(focus.0, focus.1),
            );
            session.notify(EditorEvent::SelectionChange, now);
        }
        Step::Format { command } => {
            let command = FormatCommand::from_label(&command)
                .ok_or_else(|| format!("unknown format command '{}'", command))?;
            session.apply_format(command).map_err(|e| e.to_string())?;
        }
        Step::Insert { kind } => {
            let kind = InsertKind::from_label(&kind)
                .ok_or_else(|| format!("unknown block kind '{}'", kind))?;
            session.insert_block(kind).map_err(|e| e.to_string())?;
        }
        Step::Image { source } => {
            session
                .complete_image_pick(source)
                .map_err(|e| e.to_string())?;
        }
    }
    // Scripts run faster than any debounce delay
    session.recompute_selection();
    Ok(())
}

fn replay(file: &Path, script: &Path, verbose: bool, config: EditorConfig) -> Result<(), String> {
    let content = read_input(file).map_err(|e| format!("{}: {}", file.display(), e))?;
    let script_source =
        fs::read_to_string(script).map_err(|e| format!("{}: {}", script.display(), e))?;
    let script: Script = toml::from_str(&script_source)
        .map_err(|e| format!("invalid script {}: {}", script.display(), e))?;

    let host = ReplayHost {
        verbose,
        changes: 0,
    };
    let mut session = EditorSession::new(&content, host, config);
    for (i, step) in script.step.into_iter().enumerate() {
        run_step(&mut session, step).map_err(|e| format!("step {}: {}", i + 1, e))?;
    }

    tracing::info!(changes = session.host().changes, "replay finished");
    print!("{}", session.content());
    Ok(())
}

fn render(file: &Path, strict: bool, outline: bool) -> Result<(), String> {
    let content = read_input(file).map_err(|e| format!("{}: {}", file.display(), e))?;
    let doc = if strict {
        parse_document(&content).map_err(|e| format!("{}: {}", file.display(), e))?
    } else {
        html_to_document(&content)
    };
    if outline {
        print!("{}", doc);
    } else {
        print!("{}", document_to_html(&doc));
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(io::stderr)
        .init();

    let args = Args::parse();
    let (config, config_path) = load_config(args.config.as_deref());

    let result = match args.command {
        Commands::Render {
            file,
            strict,
            outline,
        } => render(&file, strict, outline),
        Commands::Replay {
            file,
            script,
            verbose,
        } => replay(&file, &script, verbose, config),
        Commands::Config { path } => {
            if path {
                match config_path {
                    Some(path) => println!("{}", path.display()),
                    None => println!("(no config directory)"),
                }
                Ok(())
            } else {
                config
                    .to_toml_string()
                    .map(|toml| print!("{}", toml))
                    .map_err(|e| e.to_string())
            }
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
