//-
// Copyright (c) 2026, The mailutils-rs authors
//
// This file is part of mailutils-rs.
//
// mailutils-rs is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// mailutils-rs is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or
// FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// mailutils-rs. If not, see <http://www.gnu.org/licenses/>.

//! An action-only sieve subset: `require`, `keep`, `discard` and `stop`.

use std::path::Path;

use log::debug;

use crate::native::{Outcome, SieveLogger};
use crate::support::status::Code;

/// Capabilities every implementation has to accept in `require`.
const CAPABILITIES: &[&str] =
    &["comparator-i;octet", "comparator-i;ascii-casemap"];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(super) enum Instr {
    Keep,
    Discard,
    Stop,
}

impl Instr {
    fn name(self) -> &'static str {
        match self {
            Instr::Keep => "KEEP",
            Instr::Discard => "DISCARD",
            Instr::Stop => "STOP",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum Token {
    Ident(String),
    Str(String),
    Semicolon,
    LBracket,
    RBracket,
    Comma,
    Other(char),
}

struct Lexer<'a> {
    chars: std::iter::Peekable<std::str::Chars<'a>>,
    line: usize,
}

impl<'a> Lexer<'a> {
    fn new(text: &'a str) -> Self {
        Lexer {
            chars: text.chars().peekable(),
            line: 1,
        }
    }

    fn bump(&mut self) -> Option<char> {
        let ch = self.chars.next();
        if Some('\n') == ch {
            self.line += 1;
        }
        ch
    }

    /// Returns the next token and the line it started on.
    fn next_token(
        &mut self,
    ) -> Result<Option<(usize, Token)>, (usize, String)> {
        loop {
            match self.chars.peek().copied() {
                None => return Ok(None),
                Some(c) if c.is_whitespace() => {
                    self.bump();
                },
                Some('#') => {
                    while let Some(c) = self.bump() {
                        if '\n' == c {
                            break;
                        }
                    }
                },
                Some('/') => {
                    let line = self.line;
                    self.bump();
                    if Some('*') != self.bump() {
                        return Err((line, "unexpected '/'".to_owned()));
                    }
                    let mut star = false;
                    loop {
                        match self.bump() {
                            None => {
                                return Err((
                                    line,
                                    "unterminated comment".to_owned(),
                                ))
                            },
                            Some('/') if star => break,
                            Some(c) => star = '*' == c,
                        }
                    }
                },
                Some(_) => break,
            }
        }

        let line = self.line;
        let token = match self.bump() {
            None => return Ok(None),
            Some(';') => Token::Semicolon,
            Some('[') => Token::LBracket,
            Some(']') => Token::RBracket,
            Some(',') => Token::Comma,
            Some('"') => {
                let mut s = String::new();
                loop {
                    match self.bump() {
                        None => {
                            return Err((line, "unterminated string".to_owned()))
                        },
                        Some('"') => break,
                        Some('\\') => match self.bump() {
                            Some(c) => s.push(c),
                            None => {
                                return Err((
                                    line,
                                    "unterminated string".to_owned(),
                                ))
                            },
                        },
                        Some(c) => s.push(c),
                    }
                }
                Token::Str(s)
            },
            Some(c) if c.is_ascii_alphabetic() || '_' == c => {
                let mut s = c.to_string();
                while let Some(&c) = self.chars.peek() {
                    if c.is_ascii_alphanumeric() || '_' == c {
                        s.push(c);
                        self.bump();
                    } else {
                        break;
                    }
                }
                Token::Ident(s)
            },
            Some(c) => Token::Other(c),
        };
        Ok(Some((line, token)))
    }
}

fn describe(token: &Token) -> String {
    match *token {
        Token::Ident(ref s) => format!("'{}'", s),
        Token::Str(ref s) => format!("\"{}\"", s),
        Token::Semicolon => "';'".to_owned(),
        Token::LBracket => "'['".to_owned(),
        Token::RBracket => "']'".to_owned(),
        Token::Comma => "','".to_owned(),
        Token::Other(c) => format!("'{}'", c),
    }
}

/// Compiles `text`, returning the program or one diagnostic per line of
/// error text.
pub(super) fn compile(text: &str) -> Result<Vec<Instr>, Vec<(usize, String)>> {
    let mut lexer = Lexer::new(text);
    let mut tokens = Vec::new();
    loop {
        match lexer.next_token() {
            Ok(Some(t)) => tokens.push(t),
            Ok(None) => break,
            Err(e) => return Err(vec![e]),
        }
    }
    let eof_line = lexer.line;

    let mut program = Vec::new();
    let mut errors = Vec::new();
    let mut tokens = tokens.into_iter().peekable();

    while let Some((line, token)) = tokens.next() {
        // Collect the arguments up to the terminating semicolon
        let mut args = Vec::new();
        let mut terminated = false;
        while let Some((_, t)) = tokens.peek() {
            if Token::Semicolon == *t {
                tokens.next();
                terminated = true;
                break;
            }
            if let Token::Ident(_) = *t {
                if args.is_empty() || Token::Comma != args[args.len() - 1] {
                    break;
                }
            }
            if let Some((_, t)) = tokens.next() {
                args.push(t);
            }
        }

        let name = match token {
            Token::Ident(name) => name,
            other => {
                let msg = format!("syntax error near {}", describe(&other));
                errors.push((line, msg));
                continue;
            },
        };

        let result = match name.as_str() {
            "require" => check_require(&args),
            "keep" | "discard" | "stop" if !args.is_empty() => {
                Err(format!("'{}' takes no arguments", name))
            },
            "keep" => Ok(Some(Instr::Keep)),
            "discard" => Ok(Some(Instr::Discard)),
            "stop" => Ok(Some(Instr::Stop)),
            _ => Err(format!("unknown command '{}'", name)),
        };

        match result {
            Err(e) => errors.push((line, e)),
            Ok(_) if !terminated => {
                let at = tokens.peek().map_or(eof_line, |&(l, _)| l);
                errors.push((at, "expected ';'".to_owned()));
            },
            Ok(Some(instr)) => program.push(instr),
            Ok(None) => (),
        }
    }

    if errors.is_empty() {
        Ok(program)
    } else {
        Err(errors)
    }
}

fn check_require(args: &[Token]) -> Result<Option<Instr>, String> {
    let names: Vec<&str> = match args {
        [Token::Str(s)] => vec![s.as_str()],
        [Token::LBracket, rest @ .., Token::RBracket] => {
            let mut names = Vec::new();
            for (ix, t) in rest.iter().enumerate() {
                match (ix % 2, t) {
                    (0, &Token::Str(ref s)) => names.push(s.as_str()),
                    (1, &Token::Comma) => (),
                    _ => return Err("malformed string list".to_owned()),
                }
            }
            if names.is_empty() || rest.len() % 2 == 0 {
                return Err("malformed string list".to_owned());
            }
            names
        },
        _ => return Err("'require' expects a string or string list".to_owned()),
    };

    for name in names {
        if !CAPABILITIES.contains(&name) {
            return Err(format!("unsupported capability '{}'", name));
        }
    }
    Ok(None)
}

/// The state of one machine.
#[derive(Default)]
pub(super) struct SieveObj {
    program: Option<Vec<Instr>>,
    errors: String,
    pub(super) logger: Option<SieveLogger>,
}

impl SieveObj {
    pub(super) fn compile(&mut self, path: &Path) -> Outcome<()> {
        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                self.warn(&format!("{}: {}", path.display(), e));
                return Err(Code::Parse.into());
            },
        };

        match compile(&text) {
            Ok(program) => {
                debug!(
                    "Compiled {} into {} instructions",
                    path.display(),
                    program.len()
                );
                self.program = Some(program);
                Ok(())
            },
            Err(errors) => {
                for (line, msg) in errors {
                    self.warn(&format!("{}:{}: {}", path.display(), line, msg));
                }
                self.program = None;
                Err(Code::Parse.into())
            },
        }
    }

    pub(super) fn program(&self) -> Outcome<Vec<Instr>> {
        self.program.clone().ok_or_else(|| Code::Seq.into())
    }

    pub(super) fn disassemble(&self) -> Outcome<String> {
        let mut out = String::new();
        for (ix, instr) in self.program()?.into_iter().enumerate() {
            out.push_str(&format!("{}: {}\n", ix, instr.name()));
        }
        Ok(out)
    }

    pub(super) fn warn(&mut self, text: &str) {
        self.errors.push_str(text);
        self.errors.push('\n');
    }

    pub(super) fn take_errors(&mut self) -> String {
        std::mem::take(&mut self.errors)
    }
}

/// What a program does to one message.
pub(super) struct Verdict {
    /// Whether the message ends up marked for deletion.
    pub(super) deleted: bool,
    /// The actions taken, by name.
    pub(super) actions: Vec<&'static str>,
}

/// Runs `program` over a message whose deletion mark is currently
/// `deleted`. Actions apply in order: `keep` clears the mark and `discard`
/// sets it.
pub(super) fn run(program: &[Instr], deleted: bool) -> Verdict {
    let mut verdict = Verdict {
        deleted,
        actions: Vec::new(),
    };
    let mut decided = false;

    for &instr in program {
        match instr {
            Instr::Stop => break,
            Instr::Keep => verdict.deleted = false,
            Instr::Discard => verdict.deleted = true,
        }
        decided = true;
        verdict.actions.push(instr.name());
    }

    // Implicit keep; reported, but it leaves the mark alone
    if !decided {
        verdict.actions.push(Instr::Keep.name());
    }
    verdict
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn compiles_subset() {
        assert_eq!(
            Ok(vec![Instr::Discard, Instr::Stop]),
            compile(
                "require [\"comparator-i;octet\",\n\
                 \"comparator-i;ascii-casemap\"];\n\
                 # comment\ndiscard; /* multi\nline */ stop;\n"
            )
        );
        assert_eq!(Ok(vec![]), compile(""));
    }

    #[test]
    fn reports_line_numbers() {
        let errors = compile("keep;\n\nfrobnicate;\nkeep 1;\n").unwrap_err();
        assert_eq!(2, errors.len());
        assert_eq!((3, "unknown command 'frobnicate'".to_owned()), errors[0]);
        assert_eq!(4, errors[1].0);

        let errors = compile("keep\n").unwrap_err();
        assert_eq!(vec![(2, "expected ';'".to_owned())], errors);

        let errors = compile("require \"fileinto\";").unwrap_err();
        assert!(errors[0].1.contains("fileinto"));

        assert!(compile("keep; /* open").is_err());
    }

    #[test]
    fn verdicts() {
        let v = run(&[], false);
        assert!(!v.deleted);
        assert_eq!(vec!["KEEP"], v.actions);

        let v = run(&[Instr::Discard, Instr::Stop, Instr::Keep], false);
        assert!(v.deleted);
        assert_eq!(vec!["DISCARD"], v.actions);
    }

    #[test]
    fn later_actions_override_earlier_ones() {
        let v = run(&[Instr::Discard, Instr::Keep], false);
        assert!(!v.deleted);
        assert_eq!(vec!["DISCARD", "KEEP"], v.actions);

        let v = run(&[Instr::Keep, Instr::Discard], false);
        assert!(v.deleted);
    }

    #[test]
    fn keep_undeletes() {
        assert!(!run(&[Instr::Keep], true).deleted);
        // The implicit keep does not
        let v = run(&[], true);
        assert!(v.deleted);
        assert_eq!(vec!["KEEP"], v.actions);
        // Nor does a program that stops before deciding
        assert!(run(&[Instr::Stop, Instr::Keep], true).deleted);
    }
}
