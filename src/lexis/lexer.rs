use crate::source::{BufferId, SourceLocation, SourceRange};

use super::token::{Token, TokenKind};

/// Compiler directive names recognized by the lexer. Any other `` `word ``
/// spelling is a [`TokenKind::MacroUsage`] invocation instead.
const DIRECTIVE_NAMES: &[&str] = &[
    "include",
    "define",
    "undef",
    "undefineall",
    "ifdef",
    "ifndef",
    "else",
    "elsif",
    "endif",
    "timescale",
    "default_nettype",
    "resetall",
    "line",
    "pragma",
    "celldefine",
    "endcelldefine",
    "unconnected_drive",
    "nounconnected_drive",
];

const KEYWORDS: &[&str] = &[
    "module", "endmodule", "interface", "endinterface", "package", "endpackage", "class", "endclass", "function",
    "endfunction", "task", "endtask", "generate", "endgenerate", "if", "else", "for", "begin", "end", "input",
    "output", "inout", "ref", "logic", "wire", "tri", "reg", "bit", "byte", "shortint", "int", "longint", "integer",
    "time", "real", "shortreal", "string", "void", "parameter", "localparam", "import", "export", "typedef",
    "struct", "union", "enum", "automatic", "static", "virtual", "extends", "implements", "new", "return", "this",
    "super", "posedge", "negedge", "always", "always_comb", "always_ff", "always_latch", "assign", "initial",
    "genvar", "modport", "packed", "unpacked", "signed", "unsigned", "const", "var", "extern", "pure", "local",
    "protected", "public", "rand", "randc", "property", "sequence", "covergroup", "endgroup", "clocking",
    "endclocking", "program", "endprogram", "primitive", "endprimitive", "default",
];

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

/// Scans `text` (the sentinel-free content of `buffer`) into a flat token
/// stream. Every byte of `text` is covered by exactly one token: unrecognized
/// bytes become single-byte [`TokenKind::Operator`] tokens rather than being
/// dropped, preserving the "`parent` chains terminate at the root for every
/// token" invariant (§3) all the way down through the lexer.
pub fn scan(buffer: BufferId, text: &str) -> Vec<Token> {
    let bytes = text.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::new();
    let mut i = 0usize;

    let loc = |offset: usize| SourceLocation::new(buffer, offset);
    let range = |start: usize, end: usize| SourceRange::new(loc(start), loc(end));

    while i < len {
        let rest = &text[i..];
        let c = rest.chars().next().expect("non-empty slice");

        // Whitespace
        if c.is_whitespace() {
            let start = i;
            while i < len && text[i..].chars().next().map(char::is_whitespace).unwrap_or(false) {
                i += text[i..].chars().next().unwrap().len_utf8();
            }
            tokens.push(Token::new(TokenKind::Whitespace, range(start, i), &text[start..i], ""));
            continue;
        }

        // Line comment
        if rest.starts_with("//") {
            let start = i;
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
            tokens.push(Token::new(TokenKind::Comment, range(start, i), &text[start..i], ""));
            continue;
        }

        // Block comment
        if rest.starts_with("/*") {
            let start = i;
            i += 2;
            while i < len && !text[i..].starts_with("*/") {
                i += 1;
            }
            i = (i + 2).min(len);
            tokens.push(Token::new(TokenKind::Comment, range(start, i), &text[start..i], ""));
            continue;
        }

        // Directive or macro usage: ` followed by an identifier.
        if c == '`' {
            let start = i;
            i += 1;
            let name_start = i;
            while i < len && is_ident_continue(text[i..].chars().next().unwrap_or(' ')) {
                i += text[i..].chars().next().unwrap().len_utf8();
            }
            let name = &text[name_start..i];
            let kind = if DIRECTIVE_NAMES.contains(&name) {
                TokenKind::Directive
            } else {
                TokenKind::MacroUsage
            };
            tokens.push(Token::new(kind, range(start, i), &text[start..i], name));
            continue;
        }

        // System identifier: $ followed by an identifier.
        if c == '$' && rest[1..].chars().next().map(is_ident_start).unwrap_or(false) {
            let start = i;
            i += 1;
            while i < len && is_ident_continue(text[i..].chars().next().unwrap_or(' ')) {
                i += text[i..].chars().next().unwrap().len_utf8();
            }
            tokens.push(Token::new(
                TokenKind::SystemIdentifier,
                range(start, i),
                &text[start..i],
                &text[start..i],
            ));
            continue;
        }

        // Identifier or keyword.
        if is_ident_start(c) {
            let start = i;
            while i < len && is_ident_continue(text[i..].chars().next().unwrap_or(' ')) {
                i += text[i..].chars().next().unwrap().len_utf8();
            }
            let word = &text[start..i];
            let kind = if KEYWORDS.contains(&word) {
                TokenKind::Keyword
            } else {
                TokenKind::Identifier
            };
            tokens.push(Token::new(kind, range(start, i), word, word));
            continue;
        }

        // String literal.
        if c == '"' {
            let start = i;
            i += 1;
            while i < len && bytes[i] != b'"' {
                if bytes[i] == b'\\' && i + 1 < len {
                    i += 1;
                }
                i += 1;
            }
            i = (i + 1).min(len);
            let raw = &text[start..i];
            let value = raw.trim_matches('"');
            tokens.push(Token::new(TokenKind::StringLiteral, range(start, i), raw, value));
            continue;
        }

        // Numeric literal: digits, optional `'<base><digits>` sized suffix, optional decimal point.
        if c.is_ascii_digit() {
            let start = i;
            let mut is_real = false;

            while i < len && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
                i += 1;
            }

            if i < len && bytes[i] == b'\'' {
                i += 1;
                if i < len && (bytes[i] == b's' || bytes[i] == b'S') {
                    i += 1;
                }
                if i < len && bytes[i].is_ascii_alphabetic() {
                    i += 1;
                }
                while i < len && (bytes[i].is_ascii_alphanumeric() || bytes[i] == b'_' || bytes[i] == b'x' || bytes[i] == b'X' || bytes[i] == b'z' || bytes[i] == b'Z') {
                    i += 1;
                }
            } else if i < len && bytes[i] == b'.' && i + 1 < len && bytes[i + 1].is_ascii_digit() {
                is_real = true;
                i += 1;
                while i < len && (bytes[i].is_ascii_digit() || bytes[i] == b'_') {
                    i += 1;
                }
            }

            let kind = if is_real { TokenKind::RealLiteral } else { TokenKind::IntLiteral };
            tokens.push(Token::new(kind, range(start, i), &text[start..i], &text[start..i]));
            continue;
        }

        // Operators/punctuation: longest-match against a fixed table.
        const MULTI: &[&str] = &[
            "<<<=", ">>>=", "<<=", ">>=", "===", "!==", "==?", "!=?", "->>", "::", "->", "==", "!=", "<=", ">=",
            "&&", "||", "**", "<<", ">>", "+:", "-:", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "~&", "~|",
            "~^", "^~",
        ];

        let start = i;
        let matched = MULTI.iter().find(|op| rest.starts_with(*op));

        if let Some(op) = matched {
            i += op.len();
        } else {
            i += c.len_utf8();
        }

        tokens.push(Token::new(TokenKind::Operator, range(start, i), &text[start..i], &text[start..i]));
    }

    tokens.push(Token::new(TokenKind::Eof, range(len, len), "", ""));

    tokens
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::BufferId;

    fn kinds(text: &str) -> Vec<TokenKind> {
        scan(BufferId::nil(), text).into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn classifies_directive_vs_macro_usage() {
        let tokens = scan(BufferId::nil(), "`include `FOO");
        assert_eq!(tokens[0].kind, TokenKind::Directive);
        assert_eq!(tokens[2].kind, TokenKind::MacroUsage);
        assert_eq!(&*tokens[2].value, "FOO");
    }

    #[test]
    fn scans_sized_literal_and_string() {
        let tokens = scan(BufferId::nil(), "8'hFF \"hi\\\"there\"");
        assert_eq!(tokens[0].kind, TokenKind::IntLiteral);
        assert_eq!(tokens[2].kind, TokenKind::StringLiteral);
    }

    #[test]
    fn every_byte_is_covered() {
        let text = "module m #(parameter W = 8) (input logic [W-1:0] a); endmodule";
        let tokens = scan(BufferId::nil(), text);
        let mut cursor = 0;
        for tok in &tokens {
            if tok.kind == TokenKind::Eof {
                continue;
            }
            assert_eq!(tok.range.start.offset, cursor);
            cursor = tok.range.end.offset;
        }
        assert_eq!(cursor, text.len());
    }

    #[test]
    fn system_identifier_recognized() {
        assert_eq!(kinds("$display")[0], TokenKind::SystemIdentifier);
    }
}
