use std::{
    fmt::Write as _,
    fs,
    io::{self, BufWriter, Write},
    path::{Path, PathBuf},
    process::ExitCode,
};

use clap::Parser;
use snafu::{ResultExt, Snafu};
use tracing::{info, Level};

use elan::{
    bytecode::{LoadError, Module},
    compiler::{self, CompileError, CompileOptions},
    diagnostic::SourceFile,
    token::Token,
    vm::{RuntimeError, Vm, VmConfig},
};

use crate::cli::{Cli, Command, Emit, VmArgs};

mod cli;

#[derive(Debug, Snafu)]
enum Error {
    #[snafu(display("failed to read {}: {}", path.display(), source))]
    Read { path: PathBuf, source: io::Error },

    #[snafu(display("failed to write {}: {}", path.display(), source))]
    WriteFile { path: PathBuf, source: io::Error },

    #[snafu(display("failed to load {}: {}", path.display(), source))]
    Load { path: PathBuf, source: LoadError },

    #[snafu(display("could not compile {}: {}", path.display(), source))]
    Compile {
        path: PathBuf,
        /// Diagnostics rendered against the source text.
        rendered: String,
        source: CompileError,
    },

    #[snafu(display("runtime error: {}", source))]
    Runtime { source: RuntimeError },

    #[snafu(display("failed to write to stdout: {}", source))]
    Stdout { source: io::Error },
}

impl Error {
    fn exit_code(&self) -> u8 {
        match self {
            Error::Compile { .. } => 1,
            Error::Runtime { .. } => 3,
            Error::Read { .. }
            | Error::WriteFile { .. }
            | Error::Load { .. }
            | Error::Stdout { .. } => 4,
        }
    }
}

type Result<T, E = Error> = std::result::Result<T, E>;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if let Error::Compile { rendered, .. } = &err {
                eprint!("{}", rendered);
            }
            eprintln!("error: {}", err);
            ExitCode::from(err.exit_code())
        }
    }
}

fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Compile {
            input,
            emit,
            output,
            run,
            max_errors,
            vm,
        } => {
            let options = CompileOptions {
                max_diagnostics: max_errors,
            };
            let source = read_source(&input)?;

            let module = match emit {
                Some(Emit::Tokens) => {
                    let tokens = compiler::tokenize(&source, &options)
                        .map_err(|err| compile_error(&input, &source, err))?;
                    emit_text(output.as_deref(), &format_tokens(&tokens))?;
                    None
                }
                Some(Emit::Ast) => {
                    let program = compiler::parse(&source, &options)
                        .map_err(|err| compile_error(&input, &source, err))?;
                    emit_text(output.as_deref(), &format!("{:#?}\n", program))?;
                    None
                }
                Some(Emit::Bytecode) => {
                    let module = compile_source(&input, &source, &options)?;
                    emit_text(output.as_deref(), &module.disassemble())?;
                    Some(module)
                }
                None => {
                    let module = compile_source(&input, &source, &options)?;
                    if output.is_some() || !run {
                        let path = output.unwrap_or_else(|| input.with_extension("elnb"));
                        fs::write(&path, module.to_bytes())
                            .context(WriteFileSnafu { path: &path })?;
                        info!(path = %path.display(), "wrote module");
                    }
                    Some(module)
                }
            };

            if run {
                let module = match module {
                    Some(module) => module,
                    None => compile_source(&input, &source, &options)?,
                };
                execute(&module, &vm)?;
            }
            Ok(())
        }
        Command::Run {
            input,
            max_errors,
            vm,
        } => {
            let bytes = fs::read(&input).context(ReadSnafu { path: &input })?;
            let module = if Module::is_module(&bytes) {
                Module::from_bytes(&bytes).context(LoadSnafu { path: &input })?
            } else {
                let source = String::from_utf8(bytes)
                    .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))
                    .context(ReadSnafu { path: &input })?;
                let options = CompileOptions {
                    max_diagnostics: max_errors,
                };
                compile_source(&input, &source, &options)?
            };

            execute(&module, &vm)
        }
        Command::Tokenize { file } => {
            let source = read_source(&file)?;
            let tokens = compiler::tokenize(&source, &CompileOptions::default())
                .map_err(|err| compile_error(&file, &source, err))?;
            emit_text(None, &format_tokens(&tokens))
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    fs::read_to_string(path).context(ReadSnafu { path })
}

fn compile_error(path: &Path, source: &str, err: CompileError) -> Error {
    let name = path.display().to_string();
    let file = SourceFile::new(&name, source);

    let mut rendered = String::new();
    for diagnostic in err.diagnostics() {
        rendered.push_str(&file.render(diagnostic));
    }
    if let CompileError::Rejected { suppressed, .. } = &err {
        if *suppressed > 0 {
            let _ = writeln!(rendered, "... and {} more error(s)", suppressed);
        }
    }

    Error::Compile {
        path: path.to_path_buf(),
        rendered,
        source: err,
    }
}

fn compile_source(path: &Path, source: &str, options: &CompileOptions) -> Result<Module> {
    compiler::compile(source, options).map_err(|err| compile_error(path, source, err))
}

fn format_tokens(tokens: &[Token]) -> String {
    let mut out = String::new();
    for token in tokens {
        let _ = writeln!(
            out,
            "{}..{} {:?} {:?}",
            token.span.start, token.span.end, token.kind, token.text
        );
    }
    out
}

fn emit_text(output: Option<&Path>, text: &str) -> Result<()> {
    match output {
        Some(path) => fs::write(path, text).context(WriteFileSnafu { path }),
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(text.as_bytes()).context(StdoutSnafu)?;
            stdout.flush().context(StdoutSnafu)
        }
    }
}

fn execute(module: &Module, args: &VmArgs) -> Result<()> {
    let config = VmConfig {
        stack_size: args.stack_size,
        max_frames: args.max_call_depth,
    };

    let mut out = BufWriter::new(io::stdout().lock());
    let result = Vm::with_config(module, &mut out, config).run();
    // flush whatever was printed before a runtime error, too
    out.flush().context(StdoutSnafu)?;

    result.context(RuntimeSnafu)?;
    Ok(())
}
