use std::env;
use std::fs;
use std::io;
use std::io::BufRead;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use scribe_core::actions::format_action_args;
use scribe_core::clock::SystemClock;
use scribe_core::config::Config;
use scribe_core::conversation::MessageId;
use scribe_core::observation::render_action_line;
use scribe_core::observation::render_observation;
use scribe_core::parser::parse_message;
use scribe_core::state::ActionId;
use scribe_core::state::ActionStatus;
use scribe_core::state::ExecutionMode;
use scribe_exec::document::DocumentBuffer;
use scribe_exec::engine::Session;
use scribe_exec::error::TransportError;
use scribe_exec::stream::StreamChunk;
use scribe_exec::stream::StreamOutcome;
use tracing::debug;
use tracing_subscriber::EnvFilter;

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

fn main() {
    init_tracing();
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn init_tracing() {
    let default_level = "warn";
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(default_level))
                .unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(io::stderr)
        .try_init();
}

fn run() -> CliResult<()> {
    let mut args = env::args().skip(1);
    let Some(command) = args.next() else {
        print_help();
        return Ok(());
    };

    match command.as_str() {
        "--help" | "-h" | "help" => {
            print_help();
            Ok(())
        }
        "--version" | "-V" | "version" => {
            println!("scribe {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
        "parse" => {
            let Some(path) = args.next() else {
                return Err("parse requires a reply file".into());
            };
            let json = parse_reply_file(Path::new(&path))?;
            println!("{json}");
            Ok(())
        }
        "apply" => {
            let apply = parse_apply_args(args.collect())?;
            let stdin = io::stdin();
            let stdout = io::stdout();
            run_apply(&apply, &mut stdin.lock(), &mut stdout.lock())
        }
        _ => {
            print_help();
            Err(format!("unknown command: {command}").into())
        }
    }
}

fn parse_reply_file(path: &Path) -> CliResult<String> {
    let text = fs::read_to_string(path)?;
    let parsed = parse_message(&MessageId::from("msg-cli"), &text, &SystemClock);
    Ok(serde_json::to_string_pretty(&parsed)?)
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct ApplyArgs {
    document: PathBuf,
    reply: PathBuf,
    prompt: Option<String>,
    mode: Option<ExecutionMode>,
    selection: Option<(usize, usize)>,
    config: Option<PathBuf>,
    dry_run: bool,
}

fn parse_apply_args(args: Vec<String>) -> CliResult<ApplyArgs> {
    let mut document = None;
    let mut reply = None;
    let mut prompt = None;
    let mut mode = None;
    let mut selection = None;
    let mut config = None;
    let mut dry_run = false;

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        if flag == "--dry-run" {
            dry_run = true;
            i += 1;
            continue;
        }
        let Some(value) = args.get(i + 1) else {
            return Err(format!("{flag} requires a value").into());
        };
        match flag {
            "--document" => document = Some(PathBuf::from(value)),
            "--reply" => reply = Some(PathBuf::from(value)),
            "--prompt" => prompt = Some(value.clone()),
            "--mode" => mode = Some(parse_mode(value)?),
            "--selection" => selection = Some(parse_selection(value)?),
            "--config" => config = Some(PathBuf::from(value)),
            other => return Err(format!("unsupported argument: {other}").into()),
        }
        i += 2;
    }

    let Some(document) = document else {
        return Err("apply requires --document".into());
    };
    let Some(reply) = reply else {
        return Err("apply requires --reply".into());
    };
    Ok(ApplyArgs {
        document,
        reply,
        prompt,
        mode,
        selection,
        config,
        dry_run,
    })
}

fn parse_mode(value: &str) -> CliResult<ExecutionMode> {
    match value.trim().to_ascii_lowercase().as_str() {
        "auto" | "a" => Ok(ExecutionMode::Auto),
        "manual" | "m" => Ok(ExecutionMode::Manual),
        other => Err(format!("unknown mode: {other} (expected auto or manual)").into()),
    }
}

fn parse_selection(value: &str) -> CliResult<(usize, usize)> {
    let Some((start, end)) = value.split_once(':') else {
        return Err(format!("selection must look like START:END, got {value}").into());
    };
    Ok((start.trim().parse()?, end.trim().parse()?))
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("scribe").join("config.toml"))
}

fn load_config(explicit: Option<&Path>) -> CliResult<Config> {
    let path = match explicit {
        Some(path) => path.to_path_buf(),
        None => match default_config_path() {
            Some(path) if path.exists() => path,
            _ => return Ok(Config::default()),
        },
    };
    debug!(path = %path.display(), "loading config");
    let contents = fs::read_to_string(&path)?;
    Ok(toml::from_str(&contents)?)
}

fn run_apply<R: BufRead, W: Write>(
    args: &ApplyArgs,
    input: &mut R,
    out: &mut W,
) -> CliResult<()> {
    let config = load_config(args.config.as_deref())?;
    let original = fs::read_to_string(&args.document)?;
    let reply = fs::read_to_string(&args.reply)?;

    let mut session = Session::new(DocumentBuffer::new(original.clone()), config);
    if let Some((start, end)) = args.selection {
        session.document_mut().select(start, end);
    }
    if let Some(mode) = args.mode {
        session.choose_mode(mode);
    }

    session.send_user_message(args.prompt.clone().unwrap_or_default(), None);
    let stream = session.begin_assistant_stream();
    let chunks = reply
        .split_inclusive('\n')
        .map(|line| Ok::<_, TransportError>(StreamChunk::Content(line.to_string())))
        .chain([Ok(StreamChunk::Done)]);
    let Some(outcome) = session.consume_stream(&stream, chunks) else {
        return Err("assistant reply was lost".into());
    };
    let parsed = match outcome {
        StreamOutcome::Completed { parsed, .. } => parsed,
        StreamOutcome::Failed { reason, .. } => return Err(reason.into()),
    };

    if let Some(thought) = &parsed.thought {
        writeln!(out, "thought: {}", thought.content)?;
    }
    if !parsed.response.is_empty() {
        writeln!(out, "{}", parsed.response)?;
    }
    if parsed.actions.is_empty() {
        writeln!(out, "no actions proposed")?;
        return Ok(());
    }

    if session.auto_execute().dialog_visible {
        let mode = match args.mode {
            Some(mode) => mode,
            None => prompt_mode(input, out)?,
        };
        session.choose_mode(mode);
        session.confirm_mode_dialog();
    }

    if !session.auto_execute().is_auto() {
        let pending: Vec<ActionId> = session.queue().pending_ids();
        for id in pending {
            let Some(action) = session.queue().get(&id) else {
                continue;
            };
            writeln!(out, "{}", render_action_line(action))?;
            writeln!(out, "  {}", format_action_args(&action.arguments))?;
            if prompt_yes_no(input, out, "apply this action? [y/N]: ")? {
                session.execute_action(&id)?;
            }
        }
    }

    for action in session.queue().iter() {
        match render_observation(action) {
            Some(line) => writeln!(out, "{line}")?,
            None => writeln!(out, "{}", render_action_line(action))?,
        }
    }

    let applied = session
        .queue()
        .iter()
        .filter(|action| action.status == ActionStatus::Success)
        .count();
    let updated = session.into_document().into_string();
    if args.dry_run {
        writeln!(out, "dry run: {} not written", args.document.display())?;
    } else if updated != original {
        fs::write(&args.document, &updated)?;
        writeln!(
            out,
            "wrote {} ({applied} action(s) applied)",
            args.document.display()
        )?;
    }
    Ok(())
}

fn prompt_mode<R: BufRead, W: Write>(input: &mut R, out: &mut W) -> CliResult<ExecutionMode> {
    loop {
        write!(out, "run proposed actions automatically or one by one? [auto/manual]: ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(ExecutionMode::Manual);
        }
        match parse_mode(&line) {
            Ok(mode) => return Ok(mode),
            Err(err) => writeln!(out, "{err}")?,
        }
    }
}

fn prompt_yes_no<R: BufRead, W: Write>(
    input: &mut R,
    out: &mut W,
    question: &str,
) -> io::Result<bool> {
    write!(out, "{question}")?;
    out.flush()?;
    let mut line = String::new();
    input.read_line(&mut line)?;
    Ok(matches!(line.trim(), "y" | "Y" | "yes" | "YES"))
}

fn print_help() {
    println!("scribe {}", env!("CARGO_PKG_VERSION"));
    println!("Usage:");
    println!("  scribe parse REPLY_FILE");
    println!("  scribe apply --document FILE --reply FILE [--prompt TEXT]");
    println!("               [--mode auto|manual] [--selection START:END]");
    println!("               [--config FILE] [--dry-run]");
    println!("  scribe --help");
    println!("  scribe --version");
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    use super::*;

    const APPEND_REPLY: &str = "Here you go.\n<function_call>\n<name>append_content</name>\n<content>Hello</content>\n</function_call>\n";

    struct Fixture {
        _dir: TempDir,
        document: PathBuf,
        reply: PathBuf,
    }

    fn fixture(document: &str, reply: &str) -> Fixture {
        let dir = tempfile::tempdir().expect("tempdir");
        let doc_path = dir.path().join("doc.md");
        let reply_path = dir.path().join("reply.txt");
        fs::write(&doc_path, document).expect("write doc");
        fs::write(&reply_path, reply).expect("write reply");
        Fixture {
            _dir: dir,
            document: doc_path,
            reply: reply_path,
        }
    }

    fn args(fixture: &Fixture, extra: &[&str]) -> ApplyArgs {
        let mut raw = vec![
            "--document".to_string(),
            fixture.document.display().to_string(),
            "--reply".to_string(),
            fixture.reply.display().to_string(),
        ];
        raw.extend(extra.iter().map(|arg| arg.to_string()));
        parse_apply_args(raw).expect("args")
    }

    fn apply(args: &ApplyArgs, stdin: &str) -> String {
        let mut input = stdin.as_bytes();
        let mut out = Vec::new();
        run_apply(args, &mut input, &mut out).expect("apply");
        String::from_utf8(out).expect("utf8")
    }

    #[test]
    fn auto_mode_applies_and_writes_the_document() {
        let fixture = fixture("World", APPEND_REPLY);
        let output = apply(&args(&fixture, &["--mode", "auto"]), "");

        assert_eq!(fs::read_to_string(&fixture.document).expect("read"), "World\n\nHello");
        assert!(output.starts_with("Hello\n"));
        assert!(output.contains("✅ Completed: Applied: added 7 characters"));
    }

    #[test]
    fn manual_mode_asks_per_action() {
        let fixture = fixture("World", APPEND_REPLY);
        let output = apply(&args(&fixture, &[]), "manual\nn\n");

        assert_eq!(fs::read_to_string(&fixture.document).expect("read"), "World");
        assert!(output.contains("📎 Append content [Pending]"));
        assert!(output.contains("content: \"Hello\""));
    }

    #[test]
    fn manual_yes_applies_at_selection() {
        let reply = "<function_call>{\"name\":\"replace_selection\",\"arguments\":{\"content\":\"XY\"}}</function_call>";
        let fixture = fixture("abcdef", reply);
        apply(&args(&fixture, &["--selection", "1:3", "--mode", "manual"]), "y\n");

        assert_eq!(fs::read_to_string(&fixture.document).expect("read"), "aXYdef");
    }

    #[test]
    fn dry_run_leaves_the_file_alone() {
        let fixture = fixture("World", APPEND_REPLY);
        let output = apply(&args(&fixture, &["--mode", "auto", "--dry-run"]), "");

        assert_eq!(fs::read_to_string(&fixture.document).expect("read"), "World");
        assert!(output.contains("dry run"));
    }

    #[test]
    fn reply_without_actions_changes_nothing() {
        let fixture = fixture("World", "<think>hmm</think>Looks fine already.");
        let output = apply(&args(&fixture, &[]), "");

        assert_eq!(output, "thought: hmm\nLooks fine already.\nno actions proposed\n");
    }

    #[test]
    fn config_file_overrides_separator() {
        let fixture = fixture("World", APPEND_REPLY);
        let config_path = fixture.document.with_file_name("config.toml");
        fs::write(&config_path, "[engine]\nappend_separator = \"\\n\"\n").expect("write config");
        let config_arg = config_path.display().to_string();

        apply(&args(&fixture, &["--mode", "auto", "--config", &config_arg]), "");

        assert_eq!(fs::read_to_string(&fixture.document).expect("read"), "World\nHello");
    }

    #[test]
    fn partial_config_keeps_defaults() {
        let config: Config = toml::from_str("[request]\nmodel = \"local\"\n").expect("toml");
        assert_eq!(config.engine, Config::default().engine);
        assert_eq!(config.request.model.as_deref(), Some("local"));
        assert_eq!(config.request.temperature, 0.7);
    }

    #[test]
    fn argument_errors_are_reported() {
        assert!(parse_apply_args(vec!["--reply".to_string(), "r".to_string()]).is_err());
        assert!(parse_apply_args(vec!["--document".to_string()]).is_err());
        assert!(parse_selection("3").is_err());
        assert_eq!(parse_selection(" 2 : 5 ").expect("selection"), (2, 5));
        assert!(parse_mode("sometimes").is_err());
    }

    #[test]
    fn parse_command_prints_json() {
        let fixture = fixture("", APPEND_REPLY);
        let json = parse_reply_file(&fixture.reply).expect("parse");
        let value: serde_json::Value = serde_json::from_str(&json).expect("json");

        assert_eq!(value["response"], "Hello");
        assert_eq!(value["actions"][0]["name"], "append_content");
        assert_eq!(value["actions"][0]["status"], "pending");
    }
}
