//! Front end and code generation.
//!
//! Each stage consumes the complete output of the previous one and the
//! pipeline stops at the first stage that reported a diagnostic.

#[allow(clippy::module_inception)]
mod compiler;
mod checker;
mod resolver;
mod symbol_table;

pub use checker::{Checker, Signature, TypeInfo};
pub use compiler::{int_constant, Compiler};
pub use resolver::{Bindings, ProcInfo, Resolver};
pub use symbol_table::{
    Builtin, Scope, ScopeId, ScopeKind, Symbol, SymbolId, SymbolKind, SymbolTable,
};

use snafu::Snafu;
use tracing::debug;

use crate::{
    ast::Program,
    bytecode::Module,
    diagnostic::{Diagnostic, Diagnostics, Stage},
    lexer::Lexer,
    parser::Parser,
    token::Token,
    types::TypeTable,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompileOptions {
    /// Diagnostics kept before further errors are only counted.
    pub max_diagnostics: usize,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            max_diagnostics: 64,
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum CompileError {
    #[snafu(display("{} failed with {} error(s)", stage, diagnostics.len() + suppressed))]
    Rejected {
        stage: Stage,
        diagnostics: Vec<Diagnostic>,
        /// Errors past the diagnostic cap.
        suppressed: usize,
    },

    #[snafu(display("program exceeds the limit of {} {}", limit, what))]
    Capacity { what: &'static str, limit: usize },
}

impl CompileError {
    pub fn diagnostics(&self) -> &[Diagnostic] {
        match self {
            CompileError::Rejected { diagnostics, .. } => diagnostics,
            CompileError::Capacity { .. } => &[],
        }
    }
}

/// A resolved and type-checked program, ready for code generation or
/// direct interpretation.
#[derive(Debug)]
pub struct Analysis {
    pub program: Program,
    pub symbols: SymbolTable,
    pub bindings: Bindings,
    pub types: TypeTable,
    pub info: TypeInfo,
}

fn finish(stage: Stage, diagnostics: Diagnostics) -> Result<(), CompileError> {
    if diagnostics.is_empty() {
        return Ok(());
    }

    let suppressed = diagnostics.suppressed();
    RejectedSnafu {
        stage,
        diagnostics: diagnostics.into_vec(),
        suppressed,
    }
    .fail()
}

pub fn tokenize<'src>(
    source: &'src str,
    options: &CompileOptions,
) -> Result<Vec<Token<'src>>, CompileError> {
    let mut diagnostics = Diagnostics::new(options.max_diagnostics);
    let tokens = Lexer::new(source).tokenize(&mut diagnostics);
    finish(Stage::Lex, diagnostics)?;

    debug!(tokens = tokens.len(), "lexed source");
    Ok(tokens)
}

pub fn parse(source: &str, options: &CompileOptions) -> Result<Program, CompileError> {
    let tokens = tokenize(source, options)?;

    let mut diagnostics = Diagnostics::new(options.max_diagnostics);
    let program = Parser::new(tokens).parse(&mut diagnostics);
    finish(Stage::Parse, diagnostics)?;

    debug!(procs = program.procs.len(), "parsed program");
    Ok(program)
}

pub fn analyze(source: &str, options: &CompileOptions) -> Result<Analysis, CompileError> {
    let program = parse(source, options)?;

    let mut diagnostics = Diagnostics::new(options.max_diagnostics);
    let (mut symbols, bindings) = Resolver::new(&mut diagnostics).resolve(&program);
    finish(Stage::Resolve, diagnostics)?;

    let types = TypeTable::new();
    let mut diagnostics = Diagnostics::new(options.max_diagnostics);
    let info = Checker::new(&types, &mut symbols, &bindings, &mut diagnostics).check(&program);
    finish(Stage::Check, diagnostics)?;

    debug!(
        symbols = symbols.len(),
        expressions = info.expr_types.len(),
        "checked program"
    );

    Ok(Analysis {
        program,
        symbols,
        bindings,
        types,
        info,
    })
}

pub fn generate(analysis: &Analysis) -> Result<Module, CompileError> {
    let module = Compiler::new(analysis).compile()?;
    debug!(
        constants = module.constants.len(),
        functions = module.functions.len(),
        "generated module"
    );
    Ok(module)
}

/// Compiles source text all the way to a bytecode module.
pub fn compile(source: &str, options: &CompileOptions) -> Result<Module, CompileError> {
    let analysis = analyze(source, options)?;
    generate(&analysis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diagnostic::DiagnosticKind;

    fn rejected(source: &str) -> (Stage, Vec<Diagnostic>) {
        match compile(source, &CompileOptions::default()) {
            Err(CompileError::Rejected {
                stage, diagnostics, ..
            }) => (stage, diagnostics),
            other => panic!("expected rejection for {:?}, got {:?}", source, other),
        }
    }

    #[test]
    fn stops_at_first_failing_stage() {
        let cases = vec![
            ("proc main() { \"open }", Stage::Lex),
            ("proc main() { let = 1; }", Stage::Parse),
            ("proc main() { x = 1; }", Stage::Resolve),
            ("proc main() { let x: u64 = 1; x + true; }", Stage::Check),
        ];

        for (source, expected) in cases {
            let (stage, diagnostics) = rejected(source);
            assert_eq!(stage, expected, "source: {}", source);
            assert!(!diagnostics.is_empty());
        }
    }

    #[test]
    fn rejects_runaway_nesting_while_parsing() {
        let source = format!("proc main() {{ let x = {}1; }}", "-".repeat(100_000));
        let (stage, diagnostics) = rejected(&source);

        assert_eq!(stage, Stage::Parse);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(
            diagnostics[0].kind,
            DiagnosticKind::NestingTooDeep {
                limit: crate::parser::MAX_NESTING
            }
        );
    }

    #[test]
    fn nesting_under_the_limit_compiles() {
        let source = format!(
            "proc main() {{ let x = {}(1{}){}; println(\"{{}}\", x); }}",
            "-".repeat(60),
            " + 1".repeat(40),
            " * 2".repeat(20)
        );
        assert!(compile(&source, &CompileOptions::default()).is_ok());
    }

    #[test]
    fn type_mismatch_yields_no_module() {
        let (_, diagnostics) = rejected("proc main() { let a: u64 = 1; let b = a + true; }");
        assert!(matches!(
            diagnostics[0].kind,
            DiagnosticKind::TypeMismatch { .. }
        ));
    }

    #[test]
    fn caps_diagnostics() {
        let source = format!("proc main() {{ {} }}", "x = 1; ".repeat(10));
        let options = CompileOptions { max_diagnostics: 3 };

        match compile(&source, &options) {
            Err(CompileError::Rejected {
                diagnostics,
                suppressed,
                ..
            }) => {
                assert_eq!(diagnostics.len(), 3);
                assert_eq!(suppressed, 7);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn analysis_exposes_symbols() {
        let analysis = analyze(
            "proc main() { let x = 1; println(\"{}\", x); }",
            &CompileOptions::default(),
        )
        .unwrap();

        let names: Vec<_> = analysis
            .symbols
            .iter()
            .map(|(_, symbol)| symbol.name.as_str())
            .collect();
        assert_eq!(names, vec!["print", "println", "main", "x"]);
        assert_eq!(analysis.info.signatures.len(), 1);
    }
}
