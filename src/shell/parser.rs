//! C3 — Command-line parser (spec §4.3).
//!
//! Turns one command-line string into an ordered list of chained stages,
//! each stage a pipeline of one or more [`ParsedCommand`]s. Hand-rolled,
//! in the same spirit as the teacher's own regex/char-scan parsers for
//! structured text (`src/orchestrator/policy.rs`) rather than pulling in a
//! full shell-grammar crate — no such crate appears anywhere in the
//! example pack, and the grammar here is a deliberately small subset.

use crate::error::ParseError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RedirectKind {
    Overwrite,
    Append,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Redirect {
    pub kind: RedirectKind,
    pub target: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Heredoc {
    pub delimiter: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedCommand {
    pub name: String,
    pub args: Vec<String>,
    pub redirect: Option<Redirect>,
    pub heredoc: Option<Heredoc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainOp {
    And,
    Or,
}

/// One `|`-pipeline, plus the operator (if any) joining it to the next
/// stage in the overall chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Stage {
    pub pipeline: Vec<ParsedCommand>,
    pub next_op: Option<ChainOp>,
}

/// Internal placeholder marker substituted for an extracted heredoc span
/// before chain/pipe tokenising, so heredoc bodies can contain `&&`, `|`,
/// quotes, anything, without perturbing the outer grammar.
const PLACEHOLDER_SENTINEL: char = '\u{1}';

pub fn parse(line: &str) -> Result<Vec<Stage>, ParseError> {
    let (rewritten, heredocs) = extract_heredocs(line)?;
    let tokens = tokenize(&rewritten)?;
    parse_tokens(tokens, &heredocs)
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Word(String),
    Pipe,
    And,
    Or,
    RedirectOverwrite,
    RedirectAppend,
}

fn extract_heredocs(line: &str) -> Result<(String, Vec<Heredoc>), ParseError> {
    let mut heredocs = Vec::new();
    let mut result = String::new();
    let chars: Vec<char> = line.chars().collect();
    let mut i = 0usize;
    let mut in_single = false;
    let mut in_double = false;

    while i < chars.len() {
        let c = chars[i];
        if in_single {
            result.push(c);
            if c == '\'' {
                in_single = false;
            }
            i += 1;
            continue;
        }
        if in_double {
            result.push(c);
            if c == '\\' && i + 1 < chars.len() {
                result.push(chars[i + 1]);
                i += 2;
                continue;
            }
            if c == '"' {
                in_double = false;
            }
            i += 1;
            continue;
        }
        match c {
            '\'' => {
                in_single = true;
                result.push(c);
                i += 1;
            }
            '"' => {
                in_double = true;
                result.push(c);
                i += 1;
            }
            '<' if i + 1 < chars.len() && chars[i + 1] == '<' => {
                i += 2;
                if i < chars.len() && chars[i] == '-' {
                    i += 1;
                }
                while i < chars.len() && chars[i].is_whitespace() && chars[i] != '\n' {
                    i += 1;
                }
                let (delimiter, consumed) = read_delimiter(&chars[i..]);
                i += consumed;
                // advance to end of the header line
                while i < chars.len() && chars[i] != '\n' {
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ParseError::UnterminatedHeredoc(delimiter));
                }
                i += 1; // skip the newline starting the body
                let body_start = i;
                let mut terminator_end = None;
                let mut cursor = i;
                loop {
                    let line_start = cursor;
                    while cursor < chars.len() && chars[cursor] != '\n' {
                        cursor += 1;
                    }
                    let line_text: String = chars[line_start..cursor].iter().collect();
                    if line_text.trim_end() == delimiter {
                        terminator_end = Some((line_start, cursor));
                        break;
                    }
                    if cursor >= chars.len() {
                        break;
                    }
                    cursor += 1; // skip newline, continue scanning
                }
                let Some((term_start, term_end)) = terminator_end else {
                    return Err(ParseError::UnterminatedHeredoc(delimiter));
                };
                let body_end = term_start.saturating_sub(1).max(body_start);
                let body: String = if term_start > body_start {
                    chars[body_start..body_end].iter().collect()
                } else {
                    String::new()
                };
                let idx = heredocs.len();
                heredocs.push(Heredoc { delimiter, body });
                result.push(' ');
                result.push(PLACEHOLDER_SENTINEL);
                result.push('H');
                result.push_str(&idx.to_string());
                result.push(PLACEHOLDER_SENTINEL);
                result.push(' ');
                i = term_end;
                if i < chars.len() {
                    i += 1; // past the terminator line's own newline, if any
                }
            }
            _ => {
                result.push(c);
                i += 1;
            }
        }
    }

    if in_single || in_double {
        return Err(ParseError::UnterminatedQuote(result.len()));
    }

    Ok((result, heredocs))
}

fn read_delimiter(rest: &[char]) -> (String, usize) {
    if rest.first() == Some(&'"') || rest.first() == Some(&'\'') {
        let quote = rest[0];
        let mut j = 1;
        while j < rest.len() && rest[j] != quote {
            j += 1;
        }
        let word: String = rest[1..j].iter().collect();
        (word, (j + 1).min(rest.len()))
    } else {
        let mut j = 0;
        while j < rest.len() && !rest[j].is_whitespace() {
            j += 1;
        }
        (rest[..j].iter().collect(), j)
    }
}

fn tokenize(s: &str) -> Result<Vec<Token>, ParseError> {
    let chars: Vec<char> = s.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0usize;
    let mut current = String::new();
    let mut has_current = false;

    macro_rules! flush {
        () => {
            if has_current {
                tokens.push(Token::Word(std::mem::take(&mut current)));
                has_current = false;
            }
        };
    }

    while i < chars.len() {
        let c = chars[i];
        match c {
            c if c.is_whitespace() => {
                flush!();
                i += 1;
            }
            '\'' => {
                has_current = true;
                i += 1;
                while i < chars.len() && chars[i] != '\'' {
                    current.push(chars[i]);
                    i += 1;
                }
                if i >= chars.len() {
                    return Err(ParseError::UnterminatedQuote(i));
                }
                i += 1;
            }
            '"' => {
                has_current = true;
                i += 1;
                while i < chars.len() && chars[i] != '"' {
                    if chars[i] == '\\' && i + 1 < chars.len() {
                        current.push(chars[i + 1]);
                        i += 2;
                    } else {
                        current.push(chars[i]);
                        i += 1;
                    }
                }
                if i >= chars.len() {
                    return Err(ParseError::UnterminatedQuote(i));
                }
                i += 1;
            }
            '\\' if i + 1 < chars.len() => {
                has_current = true;
                current.push(chars[i + 1]);
                i += 2;
            }
            '&' if chars.get(i + 1) == Some(&'&') => {
                flush!();
                tokens.push(Token::And);
                i += 2;
            }
            '|' if chars.get(i + 1) == Some(&'|') => {
                flush!();
                tokens.push(Token::Or);
                i += 2;
            }
            '|' => {
                flush!();
                tokens.push(Token::Pipe);
                i += 1;
            }
            '>' if chars.get(i + 1) == Some(&'>') => {
                flush!();
                tokens.push(Token::RedirectAppend);
                i += 2;
            }
            '>' => {
                flush!();
                tokens.push(Token::RedirectOverwrite);
                i += 1;
            }
            c => {
                has_current = true;
                current.push(c);
                i += 1;
            }
        }
    }
    flush!();
    Ok(tokens)
}

fn parse_tokens(tokens: Vec<Token>, heredocs: &[Heredoc]) -> Result<Vec<Stage>, ParseError> {
    let mut stages = Vec::new();
    let mut stage_tokens: Vec<Token> = Vec::new();

    let mut flush_stage = |stage_tokens: &mut Vec<Token>,
                            op: Option<ChainOp>,
                            stages: &mut Vec<Stage>|
     -> Result<(), ParseError> {
        if stage_tokens.is_empty() {
            return Err(ParseError::DanglingOperator);
        }
        let pipeline = parse_pipeline(std::mem::take(stage_tokens), heredocs)?;
        stages.push(Stage {
            pipeline,
            next_op: op,
        });
        Ok(())
    };

    for tok in tokens {
        match tok {
            Token::And => {
                flush_stage(&mut stage_tokens, Some(ChainOp::And), &mut stages)?;
            }
            Token::Or => {
                flush_stage(&mut stage_tokens, Some(ChainOp::Or), &mut stages)?;
            }
            other => stage_tokens.push(other),
        }
    }
    if !stage_tokens.is_empty() {
        flush_stage(&mut stage_tokens, None, &mut stages)?;
    } else if stages.is_empty() {
        return Err(ParseError::EmptyCommand);
    } else if stages.last().map(|s| s.next_op.is_some()).unwrap_or(false) {
        return Err(ParseError::DanglingOperator);
    }

    Ok(stages)
}

fn parse_pipeline(tokens: Vec<Token>, heredocs: &[Heredoc]) -> Result<Vec<ParsedCommand>, ParseError> {
    let mut commands: Vec<Vec<Token>> = vec![Vec::new()];
    for tok in tokens {
        if tok == Token::Pipe {
            commands.push(Vec::new());
        } else {
            commands.last_mut().unwrap().push(tok);
        }
    }
    if commands.iter().any(|c| c.is_empty()) {
        return Err(ParseError::DanglingOperator);
    }

    let last_idx = commands.len() - 1;
    let mut parsed = Vec::with_capacity(commands.len());
    for (idx, cmd_tokens) in commands.into_iter().enumerate() {
        parsed.push(parse_one_command(cmd_tokens, heredocs, idx == last_idx)?);
    }
    Ok(parsed)
}

fn parse_one_command(
    tokens: Vec<Token>,
    heredocs: &[Heredoc],
    allow_redirect: bool,
) -> Result<ParsedCommand, ParseError> {
    let mut words = Vec::new();
    let mut redirect = None;
    let mut heredoc = None;

    let mut iter = tokens.into_iter().peekable();
    while let Some(tok) = iter.next() {
        match tok {
            Token::Word(w) => {
                if let Some(idx) = parse_placeholder(&w) {
                    heredoc = heredocs.get(idx).cloned();
                } else {
                    words.push(w);
                }
            }
            Token::RedirectOverwrite | Token::RedirectAppend if !allow_redirect => {
                return Err(ParseError::DanglingOperator);
            }
            Token::RedirectOverwrite => {
                let target = expect_word(iter.next())?;
                redirect = Some(Redirect {
                    kind: RedirectKind::Overwrite,
                    target,
                });
            }
            Token::RedirectAppend => {
                let target = expect_word(iter.next())?;
                redirect = Some(Redirect {
                    kind: RedirectKind::Append,
                    target,
                });
            }
            Token::Pipe | Token::And | Token::Or => unreachable!("split before reaching here"),
        }
    }

    if words.is_empty() {
        return Err(ParseError::EmptyCommand);
    }
    let name = words.remove(0);
    Ok(ParsedCommand {
        name,
        args: words,
        redirect,
        heredoc,
    })
}

fn expect_word(tok: Option<Token>) -> Result<String, ParseError> {
    match tok {
        Some(Token::Word(w)) => Ok(w),
        _ => Err(ParseError::DanglingOperator),
    }
}

fn parse_placeholder(w: &str) -> Option<usize> {
    let w = w.strip_prefix(PLACEHOLDER_SENTINEL)?;
    let w = w.strip_prefix('H')?;
    let w = w.strip_suffix(PLACEHOLDER_SENTINEL)?;
    w.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn single(line: &str) -> ParsedCommand {
        let stages = parse(line).unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].pipeline.len(), 1);
        stages[0].pipeline[0].clone()
    }

    #[test]
    fn parses_simple_command() {
        let cmd = single("cat src/App.tsx");
        assert_eq!(cmd.name, "cat");
        assert_eq!(cmd.args, vec!["src/App.tsx".to_string()]);
    }

    #[test]
    fn parses_quoted_args_with_spaces() {
        let cmd = single(r#"echo "hello world""#);
        assert_eq!(cmd.args, vec!["hello world".to_string()]);
    }

    #[test]
    fn parses_pipe() {
        let stages = parse(r#"echo "hi" | cat"#).unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].pipeline.len(), 2);
        assert_eq!(stages[0].pipeline[0].name, "echo");
        assert_eq!(stages[0].pipeline[1].name, "cat");
    }

    #[test]
    fn parses_redirect_on_final_command() {
        let stages = parse(r#"echo "hi" | cat > src/out.json"#).unwrap();
        let last = stages[0].pipeline.last().unwrap();
        let redirect = last.redirect.as_ref().unwrap();
        assert_eq!(redirect.kind, RedirectKind::Overwrite);
        assert_eq!(redirect.target, "src/out.json");
    }

    #[test]
    fn parses_and_chain() {
        let stages = parse("mkdir src/foo && cat src/foo/bar.tsx").unwrap();
        assert_eq!(stages.len(), 2);
        assert_eq!(stages[0].next_op, Some(ChainOp::And));
        assert_eq!(stages[1].next_op, None);
    }

    #[test]
    fn parses_or_chain() {
        let stages = parse("cat missing.tsx || echo fallback").unwrap();
        assert_eq!(stages[0].next_op, Some(ChainOp::Or));
    }

    #[test]
    fn parses_heredoc_body() {
        let stages = parse("cat <<EOF\nline one\nline two\nEOF").unwrap();
        let cmd = &stages[0].pipeline[0];
        assert_eq!(cmd.name, "cat");
        let heredoc = cmd.heredoc.as_ref().unwrap();
        assert_eq!(heredoc.delimiter, "EOF");
        assert_eq!(heredoc.body, "line one\nline two");
    }

    #[test]
    fn empty_heredoc_body_is_empty_string() {
        let stages = parse("cat <<EOF\nEOF").unwrap();
        let cmd = &stages[0].pipeline[0];
        assert_eq!(cmd.heredoc.as_ref().unwrap().body, "");
    }

    #[test]
    fn unterminated_heredoc_errors() {
        let err = parse("cat <<EOF\nunterminated").unwrap_err();
        assert!(matches!(err, ParseError::UnterminatedHeredoc(_)));
    }

    #[test]
    fn backslash_escapes_space_into_word() {
        let cmd = single(r"echo foo\ bar");
        assert_eq!(cmd.args, vec!["foo bar".to_string()]);
    }

    #[test]
    fn nested_quotes_preserved_literally() {
        let cmd = single(r#"echo "it's fine""#);
        assert_eq!(cmd.args, vec!["it's fine".to_string()]);
    }

    #[test]
    fn empty_line_is_error() {
        assert!(matches!(parse(""), Err(ParseError::EmptyCommand)));
        assert!(matches!(parse("   "), Err(ParseError::EmptyCommand)));
    }

    #[test]
    fn dangling_pipe_errors() {
        assert!(parse("cat src/App.tsx |").is_err());
    }
}
