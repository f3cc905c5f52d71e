//! The laurel driver.
//!
//! With no arguments, an interactive REPL: each input line is appended to
//! the session source, lexed, parsed, elaborated, and evaluated, and every
//! present result prints as `value : type`. With one argument, the same
//! pipeline over a source file. The exit code is 1 when any diagnostic
//! was reported.

use std::io;
use std::process;

use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;

use laurel::builtins::create_root_env;
use laurel::env::{Env, EnvRef};
use laurel::errors;
use laurel::lexer;
use laurel::parser::{self, TokenStream};
use laurel::source::Source;
use laurel::term::Term;

fn main() {
    let mut args = std::env::args().skip(1);
    let code = match args.next() {
        None => repl(),
        Some(path) => run_file(&path),
    };
    process::exit(code);
}

fn print_errors(source: &Source) {
    let _ = errors::print_all(&mut io::stdout(), Some(source));
}

/// Lex and parse one region of the session source.
fn read_terms(source: &Source, from_line: u32) -> Option<Vec<Term>> {
    let tokens = {
        let mut view = source.view_from_line(from_line);
        lexer::lex_all(&mut view)
    };
    if errors::count() > 0 {
        print_errors(source);
        return None;
    }

    let mut stream = TokenStream::new(&tokens);
    let terms = parser::parse_all(&mut stream);
    if errors::count() > 0 {
        print_errors(source);
        return None;
    }
    Some(terms)
}

fn repl() -> i32 {
    let Ok(mut editor) = DefaultEditor::new() else {
        eprintln!("Could not initialize interactive input.");
        return 1;
    };

    let mut source = Source::new();
    let root = create_root_env();
    let global = Env::with_parent(&root).into_shared();

    loop {
        match editor.readline("? ") {
            Ok(line) => {
                let _ = editor.add_history_entry(line.as_str());
                let start = source.next_line_number();
                source.push_str(&line);
                source.push_str("\n");

                let Some(terms) = read_terms(&source, start) else {
                    return 1;
                };

                let mut nodes = Vec::new();
                for term in &terms {
                    if let Some(node) = term.eval(&global) {
                        nodes.push(node);
                    }
                    if errors::count() > 0 {
                        print_errors(&source);
                        return 1;
                    }
                }

                println!();
                for node in &nodes {
                    let value = node.eval(&global);
                    if errors::count() > 0 {
                        print_errors(&source);
                    } else if let Some(ty) = value.ty() {
                        println!("{value} : {ty}");
                    }
                }
                println!();
                if errors::count() > 0 {
                    return 1;
                }
            }
            Err(ReadlineError::Eof) | Err(ReadlineError::Interrupted) => return 0,
            Err(err) => {
                eprintln!("{err}");
                return 1;
            }
        }
    }
}

fn run_file(path: &str) -> i32 {
    let source = match Source::load(path) {
        Ok(source) => source,
        Err(err) => {
            eprintln!("Could not read '{path}': {err}");
            return 1;
        }
    };

    let root = create_root_env();
    let global: EnvRef = Env::with_parent(&root).into_shared();

    let Some(terms) = read_terms(&source, 1) else {
        return 1;
    };

    // elaborate and evaluate in order, so later terms see earlier bindings
    for term in &terms {
        let node = term.eval(&global);
        if errors::count() > 0 {
            print_errors(&source);
            return 1;
        }
        let Some(node) = node else { continue };

        let value = node.eval(&global);
        if errors::count() > 0 {
            print_errors(&source);
            return 1;
        }
        if let Some(ty) = value.ty() {
            println!("{value} : {ty}");
        }
    }
    0
}
