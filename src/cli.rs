use std::path::PathBuf;

use clap::ArgAction;

#[derive(Debug, clap::Parser)]
#[command(name = "elanc", about = "ELAN Compiler", version)]
pub struct Cli {
    /// Raise log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, clap::Subcommand)]
pub enum Command {
    /// Compile a source file to a bytecode module
    Compile {
        input: PathBuf,

        /// Print an intermediate form instead of writing a module
        #[arg(long, value_enum)]
        emit: Option<Emit>,

        /// Output file; defaults to the input with an `.elnb` extension
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Execute the program after compiling it
        #[arg(long)]
        run: bool,

        #[arg(long, default_value_t = 64)]
        max_errors: usize,

        #[command(flatten)]
        vm: VmArgs,
    },

    /// Run a source file or a compiled module
    Run {
        input: PathBuf,

        #[arg(long, default_value_t = 64)]
        max_errors: usize,

        #[command(flatten)]
        vm: VmArgs,
    },

    /// Print the tokens of a source file
    Tokenize { file: PathBuf },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Emit {
    Tokens,
    Ast,
    Bytecode,
}

#[derive(Debug, clap::Args)]
pub struct VmArgs {
    #[arg(long, default_value_t = 1024)]
    pub max_call_depth: usize,

    /// Operand stack size in slots
    #[arg(long, default_value_t = 16 * 1024)]
    pub stack_size: usize,
}
