use tracing::warn;

use crate::arena::Repo;
use crate::lexis::{self, Token, TokenKind, TokenRef};
use crate::source::{compute_line_offsets, BufferId, SourceLocation, SourceManager, SourceRange};

use super::node::{Child, NodeRef, SyntaxKind, SyntaxNode};
use super::tree::{IncludeDirectiveRecord, SyntaxTree};

/// Recursive-descent parser building the closed [`SyntaxKind`] tree from one
/// buffer's significant (non-trivia) token stream.
///
/// Whitespace and comments are dropped before parsing rather than threaded
/// through as attached trivia: every token this parser keeps ends up as a
/// child of exactly one node, which is all the indexers downstream need.
pub(crate) struct Parser<'a> {
    buffer: BufferId,
    text: &'a str,
    line_offsets: Vec<usize>,
    tokens: Vec<Token>,
    refs: Vec<TokenRef>,
    pos: usize,
    nodes: Repo<SyntaxNode>,
    token_repo: Option<Repo<Token>>,
    includes: Vec<IncludeDirectiveRecord>,
    defines: Vec<NodeRef>,
    source_manager: Option<&'a SourceManager>,
    base_dir: std::path::PathBuf,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(
        buffer: BufferId,
        text: &'a str,
        source_manager: Option<&'a SourceManager>,
        base_dir: std::path::PathBuf,
    ) -> Self {
        let mut token_repo = Repo::new();
        let all_tokens = lexis::scan(buffer, text);

        let mut tokens = Vec::with_capacity(all_tokens.len());
        let mut refs = Vec::with_capacity(all_tokens.len());

        for token in all_tokens {
            if token.kind.is_trivia() {
                continue;
            }

            let entry = token_repo.insert(token.clone());
            tokens.push(token);
            refs.push(TokenRef(entry));
        }

        let mut line_offsets = Vec::new();
        compute_line_offsets(text, &mut line_offsets);

        Self {
            buffer,
            text,
            line_offsets,
            tokens,
            refs,
            pos: 0,
            nodes: Repo::new(),
            token_repo: Some(token_repo),
            includes: Vec::new(),
            defines: Vec::new(),
            source_manager,
            base_dir,
        }
    }

    fn line_of(&self, offset: usize) -> usize {
        match self.line_offsets.binary_search(&offset) {
            Ok(idx) => idx,
            Err(idx) => idx.saturating_sub(1),
        }
    }

    fn push(&mut self, node: SyntaxNode) -> NodeRef {
        let child_nodes: Vec<NodeRef> = node.child_nodes().collect();
        let entry = self.nodes.insert(node);
        let node_ref = NodeRef(entry);

        for child in child_nodes {
            if let Some(child_node) = self.nodes.get(&child.0) {
                child_node.set_parent(node_ref);
            }
        }

        node_ref
    }

    fn current(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn current_ref(&self) -> TokenRef {
        self.refs[self.pos.min(self.refs.len() - 1)]
    }

    fn at_eof(&self) -> bool {
        self.current().kind == TokenKind::Eof
    }

    fn bump(&mut self) -> TokenRef {
        let r = self.current_ref();

        if self.pos < self.tokens.len() - 1 {
            self.pos += 1;
        }

        r
    }

    fn is_kw(&self, word: &str) -> bool {
        self.current().kind == TokenKind::Keyword && &*self.current().value == word
    }

    fn is_directive(&self, name: &str) -> bool {
        self.current().kind == TokenKind::Directive && &*self.current().value == name
    }

    fn is_op(&self, op: &str) -> bool {
        self.current().kind == TokenKind::Operator && &*self.current().raw == op
    }

    fn is_ident(&self) -> bool {
        matches!(self.current().kind, TokenKind::Identifier | TokenKind::SystemIdentifier)
    }

    fn is_macro_usage(&self) -> bool {
        self.current().kind == TokenKind::MacroUsage
    }

    /// True when token `a` ends exactly where the byte offset `b_offset`
    /// begins, i.e. there is no whitespace between them. Used to tell a
    /// function-like macro invocation (`` `FOO(x) ``) apart from a bare macro
    /// name followed by an unrelated parenthesized expression.
    fn touches_next(&self, a: TokenRef, b_offset: usize) -> bool {
        self.token_range(a).end.offset == b_offset
    }

    fn token_range(&self, r: TokenRef) -> SourceRange {
        self.token_repo.as_ref().unwrap().get(&r.0).unwrap().range
    }

    fn token_value(&self, r: TokenRef) -> String {
        self.token_repo.as_ref().unwrap().get(&r.0).unwrap().value.to_string()
    }

    pub(crate) fn parse(mut self) -> SyntaxTree {
        let start = SourceLocation::new(self.buffer, 0);
        let mut children = Vec::new();

        while !self.at_eof() {
            let before = self.pos;
            let child = self.parse_top_level_item();
            children.push(Child::Node(child));

            if self.pos == before {
                // Safety net: never loop forever on unrecognized input.
                self.bump();
            }
        }

        let end = SourceLocation::new(self.buffer, self.text.len());
        let root = self.push(SyntaxNode::new(SyntaxKind::SourceFile, SourceRange::new(start, end), children));

        let mut source_buffers = vec![self.buffer];
        for include in &self.includes {
            if !include.included_buffer.is_nil() {
                source_buffers.push(include.included_buffer);
            }
        }

        SyntaxTree::new(
            self.buffer,
            self.token_repo.take().unwrap(),
            self.nodes,
            root,
            source_buffers,
            self.includes,
            self.defines,
        )
    }

    fn span_of(&self, children: &[Child], fallback: TokenRef) -> SourceRange {
        let first = children.first().copied();
        let last = children.last().copied();

        let start = match first {
            Some(Child::Token(t)) => self.token_range(t).start,
            Some(Child::Node(n)) => self.nodes.get(&n.0).map(|nd| nd.range.start).unwrap_or(self.token_range(fallback).start),
            None => self.token_range(fallback).start,
        };

        let end = match last {
            Some(Child::Token(t)) => self.token_range(t).end,
            Some(Child::Node(n)) => self.nodes.get(&n.0).map(|nd| nd.range.end).unwrap_or(self.token_range(fallback).end),
            None => self.token_range(fallback).end,
        };

        SourceRange::new(start, end)
    }

    fn child_end_offset(&self, child: &Child) -> usize {
        match child {
            Child::Token(t) => self.token_range(*t).end.offset,
            Child::Node(n) => self.nodes.get(&n.0).map(|nd| nd.range.end.offset).unwrap_or(0),
        }
    }

    // ---- top level -----------------------------------------------------

    fn parse_top_level_item(&mut self) -> NodeRef {
        if self.is_op(";") {
            let t = self.bump();
            return self.push(SyntaxNode::new(SyntaxKind::Unknown, self.token_range(t), vec![Child::Token(t)]));
        }

        if self.is_directive("include") {
            return self.parse_include();
        }

        if self.is_directive("define") {
            return self.parse_define();
        }

        if self.is_directive("undef") {
            return self.parse_undef();
        }

        if self.current().kind == TokenKind::Directive {
            // Conditional-compilation and other directives we don't model
            // structurally; consumed whole as an opaque item.
            let t = self.bump();
            return self.push(SyntaxNode::new(SyntaxKind::Unknown, self.token_range(t), vec![Child::Token(t)]));
        }

        if self.is_kw("module") || self.is_kw("interface") {
            return self.parse_module_like();
        }

        if self.is_kw("extern") {
            let extern_tok = self.bump();
            if self.is_kw("module") {
                return self.parse_extern_module(extern_tok);
            }
            return self.push(SyntaxNode::new(
                SyntaxKind::Unknown,
                self.token_range(extern_tok),
                vec![Child::Token(extern_tok)],
            ));
        }

        if self.is_kw("package") {
            return self.parse_package();
        }

        if self.is_kw("class") {
            return self.parse_class();
        }

        self.parse_unknown_item()
    }

    fn parse_include(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];
        let mut filename_token = None;
        let mut included_buffer = BufferId::nil();

        if self.current().kind == TokenKind::StringLiteral {
            let tok = self.bump();
            filename_token = Some(tok);
            children.push(Child::Token(tok));

            if let Some(sm) = self.source_manager {
                let filename = self.token_value(tok);
                let candidate = self.base_dir.join(&filename);

                match sm.read_source(&candidate) {
                    Ok(id) => included_buffer = id,
                    Err(_) => warn!(path = %candidate.display(), "include target could not be read; registering as unresolved dependency"),
                }
            }
        }

        let range = self.span_of(&children, kw);
        let node = self.push(SyntaxNode::new(SyntaxKind::IncludeDirective, range, children));

        if let Some(filename_token) = filename_token {
            self.includes.push(IncludeDirectiveRecord {
                node,
                filename_token,
                included_buffer,
            });
        }

        node
    }

    fn parse_define(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        let Some(name_tok) = self.try_bump_ident() else {
            let range = self.span_of(&children, kw);
            return self.push(SyntaxNode::new(SyntaxKind::DefineDirective, range, children));
        };

        children.push(Child::Token(name_tok));
        let name_range = self.token_range(name_tok);

        let mut is_function_like = false;

        if self.is_op("(") && self.touches_next(name_tok, self.token_range(self.current_ref()).start.offset) {
            is_function_like = true;
            children.push(Child::Token(self.bump()));

            while !self.is_op(")") && !self.at_eof() {
                if let Some(p) = self.try_bump_ident() {
                    children.push(Child::Token(p));
                } else {
                    children.push(Child::Token(self.bump()));
                }
            }

            if self.is_op(")") {
                children.push(Child::Token(self.bump()));
            }
        }

        let header_end_line = self.line_of(
            children
                .last()
                .map(|c| self.child_end_offset(c))
                .unwrap_or(name_range.end.offset),
        );

        while !self.at_eof() && self.line_of(self.token_range(self.current_ref()).start.offset) == header_end_line {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, kw);
        let node = self.push(SyntaxNode::new(SyntaxKind::DefineDirective, range, children).with_name_token(name_tok));
        self.defines.push(node);

        if !is_function_like {
            if let Some(sm) = self.source_manager {
                sm.record_macro_expansion(name_range.start, name_range.end, name_range);
            }
        }

        node
    }

    fn parse_undef(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        if let Some(name_tok) = self.try_bump_ident() {
            children.push(Child::Token(name_tok));
            let range = self.span_of(&children, kw);
            return self.push(SyntaxNode::new(SyntaxKind::UndefDirective, range, children).with_name_token(name_tok));
        }

        let range = self.span_of(&children, kw);
        self.push(SyntaxNode::new(SyntaxKind::UndefDirective, range, children))
    }

    fn try_bump_ident(&mut self) -> Option<TokenRef> {
        if self.is_ident() {
            Some(self.bump())
        } else {
            None
        }
    }

    // ---- module / interface ---------------------------------------------

    fn parse_module_like(&mut self) -> NodeRef {
        let kw = self.bump();
        let is_interface = self.token_value(kw) == "interface";
        self.parse_module_body(kw, is_interface, None)
    }

    fn parse_extern_module(&mut self, extern_tok: TokenRef) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(extern_tok), Child::Token(kw)];

        let name_tok = self.try_bump_ident();
        if let Some(name_tok) = name_tok {
            children.push(Child::Token(name_tok));
        }

        if self.is_op("#") {
            children.push(Child::Token(self.bump()));
            if self.is_op("(") {
                children.push(Child::Token(self.bump()));
                children.extend(self.parse_parameter_port_list());
                if self.is_op(")") {
                    children.push(Child::Token(self.bump()));
                }
            }
        }

        if self.is_op("(") {
            children.push(Child::Token(self.bump()));
            children.extend(self.parse_ansi_port_list());
            if self.is_op(")") {
                children.push(Child::Token(self.bump()));
            }
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, extern_tok);
        let node = SyntaxNode::new(SyntaxKind::ExternModuleDecl, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    fn parse_module_body(&mut self, kw: TokenRef, is_interface: bool, lead: Option<TokenRef>) -> NodeRef {
        let mut children = Vec::new();

        if let Some(lead) = lead {
            children.push(Child::Token(lead));
        }

        children.push(Child::Token(kw));

        let name_tok = self.try_bump_ident();
        if let Some(name_tok) = name_tok {
            children.push(Child::Token(name_tok));
        }

        if self.is_op("#") {
            children.push(Child::Token(self.bump()));
            if self.is_op("(") {
                children.push(Child::Token(self.bump()));
                children.extend(self.parse_parameter_port_list());
                if self.is_op(")") {
                    children.push(Child::Token(self.bump()));
                }
            }
        }

        if self.is_op("(") {
            children.push(Child::Token(self.bump()));
            children.extend(self.parse_ansi_port_list());
            if self.is_op(")") {
                children.push(Child::Token(self.bump()));
            }
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        let end_kw = if is_interface { "endinterface" } else { "endmodule" };

        loop {
            if self.at_eof() || self.is_kw(end_kw) {
                break;
            }

            children.push(Child::Node(self.parse_module_item()));
        }

        if self.is_kw(end_kw) {
            children.push(Child::Token(self.bump()));
        }

        let kind = if is_interface { SyntaxKind::InterfaceDeclaration } else { SyntaxKind::ModuleDeclaration };
        let range = self.span_of(&children, kw);
        let node = SyntaxNode::new(kind, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    fn parse_parameter_port_list(&mut self) -> Vec<Child> {
        let mut out = Vec::new();

        while !self.is_op(")") && !self.at_eof() {
            out.push(Child::Node(self.parse_parameter_declaration_item()));

            if self.is_op(",") {
                out.push(Child::Token(self.bump()));
            } else {
                break;
            }
        }

        out
    }

    fn parse_parameter_declaration_item(&mut self) -> NodeRef {
        let mut children = Vec::new();
        let start = self.current_ref();

        if self.is_kw("parameter") || self.is_kw("localparam") {
            children.push(Child::Token(self.bump()));
        }

        // Skip type tokens (keywords / packed dims) that precede the name.
        while !self.at_eof() && !self.is_op(",") && !self.is_op(")") && !self.is_op(";") && !self.is_op("=") {
            if self.is_ident() {
                break;
            }
            children.push(Child::Token(self.bump()));
        }

        let decl = self.parse_one_declarator(&[",", ")", ";"]);
        children.push(Child::Node(decl));

        let range = self.span_of(&children, start);
        self.push(SyntaxNode::new(SyntaxKind::ParameterDeclaration, range, children))
    }

    fn parse_one_declarator(&mut self, stop_ops: &[&str]) -> NodeRef {
        let start = self.current_ref();
        let mut children = Vec::new();

        let name_tok = self.try_bump_ident();
        if let Some(name_tok) = name_tok {
            children.push(Child::Token(name_tok));
        }

        // Skip unpacked dimensions.
        while self.is_op("[") {
            children.push(Child::Token(self.bump()));
            while !self.is_op("]") && !self.at_eof() {
                children.push(Child::Token(self.bump()));
            }
            if self.is_op("]") {
                children.push(Child::Token(self.bump()));
            }
        }

        if self.is_op("=") {
            children.push(Child::Token(self.bump()));

            while !self.at_eof() && !stop_ops.iter().any(|op| self.is_op(op)) {
                children.push(Child::Token(self.bump()));
            }
        }

        let range = self.span_of(&children, start);
        let node = SyntaxNode::new(SyntaxKind::ParameterDeclarator, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    fn parse_ansi_port_list(&mut self) -> Vec<Child> {
        let mut out = Vec::new();

        while !self.is_op(")") && !self.at_eof() {
            out.push(Child::Node(self.parse_ansi_port_item()));

            if self.is_op(",") {
                out.push(Child::Token(self.bump()));
            } else {
                break;
            }
        }

        out
    }

    fn parse_ansi_port_item(&mut self) -> NodeRef {
        let start = self.current_ref();
        let mut children = Vec::new();

        if self.is_kw("input") || self.is_kw("output") || self.is_kw("inout") || self.is_kw("ref") {
            children.push(Child::Token(self.bump()));
        }

        // interface.modport style port header.
        if self.is_ident() {
            let save = self.pos;
            let maybe_intf = self.bump();

            if self.is_op(".") {
                let dot = self.bump();

                if let Some(modport) = self.try_bump_ident() {
                    let header_children = vec![Child::Token(maybe_intf), Child::Token(dot), Child::Token(modport)];
                    let range = self.span_of(&header_children, maybe_intf);
                    let header = self.push(
                        SyntaxNode::new(SyntaxKind::DotMemberClause, range, header_children).with_name_token(maybe_intf),
                    );
                    children.push(Child::Node(header));
                } else {
                    self.pos = save;
                }
            } else {
                self.pos = save;
            }
        }

        // Remaining type tokens up to the port name (last identifier before `,`/`)`/`=`).
        while self.is_ident() {
            let save = self.pos;
            let tok = self.bump();

            let is_last_ident_before_stop =
                self.is_op(",") || self.is_op(")") || self.is_op("=") || self.is_op("[") || self.at_eof();

            if is_last_ident_before_stop {
                self.pos = save;
                break;
            }

            children.push(Child::Token(tok));
        }

        let decl = self.parse_one_declarator(&[",", ")"]);
        let name_tok = self.nodes.get(&decl.0).and_then(|n| n.name_token);
        children.push(Child::Node(decl));

        let range = self.span_of(&children, start);
        let node = SyntaxNode::new(SyntaxKind::ImplicitAnsiPort, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    // ---- package / class -------------------------------------------------

    fn parse_package(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        let name_tok = self.try_bump_ident();
        if let Some(name_tok) = name_tok {
            children.push(Child::Token(name_tok));
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        loop {
            if self.at_eof() || self.is_kw("endpackage") {
                break;
            }
            children.push(Child::Node(self.parse_module_item()));
        }

        if self.is_kw("endpackage") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, kw);
        let node = SyntaxNode::new(SyntaxKind::PackageDeclaration, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    fn parse_class(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        let name_tok = self.try_bump_ident();
        if let Some(name_tok) = name_tok {
            children.push(Child::Token(name_tok));
        }

        if self.is_op("#") {
            children.push(Child::Token(self.bump()));
            if self.is_op("(") {
                children.push(Child::Token(self.bump()));
                children.extend(self.parse_parameter_port_list());
                if self.is_op(")") {
                    children.push(Child::Token(self.bump()));
                }
            }
        }

        if self.is_kw("extends") {
            children.push(Child::Token(self.bump()));
            if self.is_ident() {
                children.push(Child::Token(self.bump()));
            }
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        loop {
            if self.at_eof() || self.is_kw("endclass") {
                break;
            }
            children.push(Child::Node(self.parse_module_item()));
        }

        if self.is_kw("endclass") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, kw);
        let node = SyntaxNode::new(SyntaxKind::ClassDeclaration, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    // ---- module / generate body items ------------------------------------

    fn parse_module_item(&mut self) -> NodeRef {
        if self.is_op(";") {
            let t = self.bump();
            return self.push(SyntaxNode::new(SyntaxKind::Unknown, self.token_range(t), vec![Child::Token(t)]));
        }

        if self.is_op("(") && self.peek_star_attr() {
            return self.parse_attribute_spec();
        }

        if self.current().kind == TokenKind::Directive {
            if self.is_directive("define") {
                return self.parse_define();
            }
            if self.is_directive("undef") {
                return self.parse_undef();
            }
            if self.is_directive("include") {
                return self.parse_include();
            }
            let t = self.bump();
            return self.push(SyntaxNode::new(SyntaxKind::Unknown, self.token_range(t), vec![Child::Token(t)]));
        }

        if self.is_macro_usage() {
            return self.parse_macro_usage();
        }

        if self.is_kw("parameter") || self.is_kw("localparam") {
            return self.parse_parameter_decl_statement();
        }

        if self.is_kw("input") || self.is_kw("output") || self.is_kw("inout") || self.is_kw("ref") {
            return self.parse_port_declaration();
        }

        if self.is_kw("import") {
            return self.parse_import();
        }

        if self.is_kw("export") {
            return self.parse_export();
        }

        if self.is_kw("function") {
            return self.parse_function();
        }

        if self.is_kw("task") {
            return self.parse_task();
        }

        if self.is_kw("generate") {
            return self.parse_generate_region();
        }

        if self.is_kw("if") {
            return self.parse_generate_if();
        }

        if self.is_kw("for") {
            return self.parse_generate_for();
        }

        if self.is_kw("begin") {
            return self.parse_generate_block();
        }

        if self.is_net_or_data_type_keyword() {
            return self.parse_net_or_data_declaration();
        }

        if self.is_ident() {
            if let Some(inst) = self.try_parse_instantiation() {
                return inst;
            }

            return self.parse_data_declaration_with_user_type();
        }

        self.parse_unknown_item()
    }

    fn peek_star_attr(&self) -> bool {
        let next = self.tokens.get(self.pos + 1);
        matches!(next, Some(t) if t.kind == TokenKind::Operator && &*t.raw == "*")
    }

    fn parse_attribute_spec(&mut self) -> NodeRef {
        let lparen = self.bump();
        let mut children = vec![Child::Token(lparen)];

        while !self.at_eof() {
            if self.is_op("*") && self.tokens.get(self.pos + 1).map(|t| &*t.raw == ")").unwrap_or(false) {
                children.push(Child::Token(self.bump()));
                children.push(Child::Token(self.bump()));
                break;
            }
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, lparen);
        self.push(SyntaxNode::new(SyntaxKind::AttributeSpec, range, children))
    }

    fn is_net_or_data_type_keyword(&self) -> bool {
        const TYPES: &[&str] = &[
            "logic", "wire", "tri", "reg", "bit", "byte", "shortint", "int", "longint", "integer", "time", "real",
            "shortreal", "string", "genvar", "var",
        ];
        self.current().kind == TokenKind::Keyword && TYPES.contains(&&*self.current().value)
    }

    fn parse_parameter_decl_statement(&mut self) -> NodeRef {
        let start = self.current_ref();
        let mut children = vec![Child::Token(self.bump())];

        loop {
            while !self.at_eof() && !self.is_op(",") && !self.is_op(";") && !self.is_op("=") {
                if self.is_ident() {
                    break;
                }
                children.push(Child::Token(self.bump()));
            }

            let decl = self.parse_one_declarator(&[",", ";"]);
            children.push(Child::Node(decl));

            if self.is_op(",") {
                children.push(Child::Token(self.bump()));
                continue;
            }
            break;
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, start);
        self.push(SyntaxNode::new(SyntaxKind::ParameterDeclaration, range, children))
    }

    fn parse_port_declaration(&mut self) -> NodeRef {
        let start = self.current_ref();
        let mut children = vec![Child::Token(self.bump())];
        let mut first_name = None;

        if self.is_net_or_data_type_keyword() {
            children.push(Child::Token(self.bump()));
        }

        if self.is_op("[") {
            children.push(Child::Token(self.bump()));
            while !self.is_op("]") && !self.at_eof() {
                children.push(Child::Token(self.bump()));
            }
            if self.is_op("]") {
                children.push(Child::Token(self.bump()));
            }
        }

        loop {
            let decl = self.parse_one_declarator(&[",", ";"]);

            if first_name.is_none() {
                first_name = self.nodes.get(&decl.0).and_then(|n| n.name_token);
            }

            children.push(Child::Node(decl));

            if self.is_op(",") {
                children.push(Child::Token(self.bump()));
                continue;
            }
            break;
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, start);
        let node = SyntaxNode::new(SyntaxKind::PortDeclaration, range, children);
        let node = if let Some(n) = first_name { node.with_name_token(n) } else { node };
        self.push(node)
    }

    fn parse_net_or_data_declaration(&mut self) -> NodeRef {
        let start = self.current_ref();
        let is_net = self.is_kw("wire") || self.is_kw("tri");
        let mut children = vec![Child::Token(self.bump())];

        if self.is_op("[") {
            children.push(Child::Token(self.bump()));
            while !self.is_op("]") && !self.at_eof() {
                children.push(Child::Token(self.bump()));
            }
            if self.is_op("]") {
                children.push(Child::Token(self.bump()));
            }
        }

        loop {
            let decl = self.parse_one_declarator(&[",", ";"]);
            children.push(Child::Node(decl));

            if self.is_op(",") {
                children.push(Child::Token(self.bump()));
                continue;
            }
            break;
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        let kind = if is_net { SyntaxKind::NetDeclaration } else { SyntaxKind::DataDeclaration };
        let range = self.span_of(&children, start);
        self.push(SyntaxNode::new(kind, range, children))
    }

    fn parse_data_declaration_with_user_type(&mut self) -> NodeRef {
        let start = self.current_ref();
        let mut children = Vec::new();

        let type_tok = self.bump();
        children.push(Child::Token(type_tok));

        if self.is_op("#") {
            let hash = self.bump();
            let mut class_children = vec![Child::Token(type_tok), Child::Token(hash)];

            if self.is_op("(") {
                class_children.push(Child::Token(self.bump()));
                class_children.extend(self.parse_param_assignment_list());
                if self.is_op(")") {
                    class_children.push(Child::Token(self.bump()));
                }
            }

            children.clear();
            let range = self.span_of(&class_children, type_tok);
            let class_name = self.push(
                SyntaxNode::new(SyntaxKind::ClassName, range, class_children).with_name_token(type_tok),
            );
            children.push(Child::Node(class_name));
        }

        loop {
            let decl = self.parse_one_declarator(&[",", ";"]);
            children.push(Child::Node(decl));

            if self.is_op(",") {
                children.push(Child::Token(self.bump()));
                continue;
            }
            break;
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, start);
        self.push(SyntaxNode::new(SyntaxKind::DataDeclaration, range, children))
    }

    /// Looks ahead for `ident [ '#' '(' ... ')' ] ident '('`, the shape of a
    /// module/interface instantiation, without committing to it.
    fn try_parse_instantiation(&mut self) -> Option<NodeRef> {
        let save = self.pos;
        let start = self.current_ref();

        let type_tok = self.bump();
        let mut header = vec![Child::Token(type_tok)];

        if self.is_op("#") {
            header.push(Child::Token(self.bump()));
            if self.is_op("(") {
                header.push(Child::Token(self.bump()));
                header.extend(self.parse_param_assignment_list());
                if self.is_op(")") {
                    header.push(Child::Token(self.bump()));
                } else {
                    self.pos = save;
                    return None;
                }
            } else {
                self.pos = save;
                return None;
            }
        }

        if !self.is_ident() {
            self.pos = save;
            return None;
        }

        let name_pos = self.pos;
        self.bump();

        while self.is_op("[") {
            self.bump();
            while !self.is_op("]") && !self.at_eof() {
                self.bump();
            }
            if self.is_op("]") {
                self.bump();
            }
        }

        if !self.is_op("(") {
            self.pos = save;
            return None;
        }

        self.pos = name_pos;

        let mut instances = vec![Child::Node(self.parse_hierarchical_instance())];

        while self.is_op(",") {
            instances.push(Child::Token(self.bump()));
            instances.push(Child::Node(self.parse_hierarchical_instance()));
        }

        if self.is_op(";") {
            instances.push(Child::Token(self.bump()));
        }

        let mut children = header;
        children.extend(instances);

        let range = self.span_of(&children, start);
        Some(self.push(SyntaxNode::new(SyntaxKind::HierarchyInstantiation, range, children).with_name_token(type_tok)))
    }

    fn parse_hierarchical_instance(&mut self) -> NodeRef {
        let start = self.current_ref();
        let name_tok = self.bump();
        let mut children = vec![Child::Token(name_tok)];

        while self.is_op("[") {
            children.push(Child::Token(self.bump()));
            while !self.is_op("]") && !self.at_eof() {
                children.push(Child::Token(self.bump()));
            }
            if self.is_op("]") {
                children.push(Child::Token(self.bump()));
            }
        }

        if self.is_op("(") {
            children.push(Child::Token(self.bump()));
            children.extend(self.parse_port_connection_list());
            if self.is_op(")") {
                children.push(Child::Token(self.bump()));
            }
        }

        let range = self.span_of(&children, start);
        self.push(SyntaxNode::new(SyntaxKind::HierarchicalInstance, range, children).with_name_token(name_tok))
    }

    fn parse_port_connection_list(&mut self) -> Vec<Child> {
        let mut out = Vec::new();

        while !self.is_op(")") && !self.at_eof() {
            if self.is_op(".") {
                let dot = self.bump();

                if self.is_op("*") {
                    let star = self.bump();
                    let children = vec![Child::Token(dot), Child::Token(star)];
                    let range = self.span_of(&children, dot);
                    out.push(Child::Node(self.push(SyntaxNode::new(SyntaxKind::WildcardPortConnection, range, children))));
                } else if let Some(name) = self.try_bump_ident() {
                    let mut children = vec![Child::Token(dot), Child::Token(name)];

                    if self.is_op("(") {
                        children.push(Child::Token(self.bump()));
                        children.extend(self.parse_balanced_until(")"));
                        if self.is_op(")") {
                            children.push(Child::Token(self.bump()));
                        }
                    }

                    let range = self.span_of(&children, dot);
                    out.push(Child::Node(
                        self.push(SyntaxNode::new(SyntaxKind::NamedPortConnection, range, children).with_name_token(name)),
                    ));
                }
            } else {
                let start = self.current_ref();
                let mut children = Vec::new();

                while !self.at_eof() && !self.is_op(",") && !self.is_op(")") {
                    children.push(self.next_balanced_child());
                }

                let range = self.span_of(&children, start);
                out.push(Child::Node(self.push(SyntaxNode::new(SyntaxKind::OrderedPortConnection, range, children))));
            }

            if self.is_op(",") {
                out.push(Child::Token(self.bump()));
            } else {
                break;
            }
        }

        out
    }

    fn parse_param_assignment_list(&mut self) -> Vec<Child> {
        let mut out = Vec::new();

        while !self.is_op(")") && !self.at_eof() {
            if self.is_op(".") {
                let dot = self.bump();

                if let Some(name) = self.try_bump_ident() {
                    let mut children = vec![Child::Token(dot), Child::Token(name)];

                    if self.is_op("(") {
                        children.push(Child::Token(self.bump()));
                        children.extend(self.parse_balanced_until(")"));
                        if self.is_op(")") {
                            children.push(Child::Token(self.bump()));
                        }
                    }

                    let range = self.span_of(&children, dot);
                    out.push(Child::Node(
                        self.push(SyntaxNode::new(SyntaxKind::NamedParamAssignment, range, children).with_name_token(name)),
                    ));
                }
            } else {
                let start = self.current_ref();
                let mut children = Vec::new();

                while !self.at_eof() && !self.is_op(",") && !self.is_op(")") {
                    children.push(self.next_balanced_child());
                }

                let range = self.span_of(&children, start);
                out.push(Child::Node(self.push(SyntaxNode::new(SyntaxKind::OrderedParamAssignment, range, children))));
            }

            if self.is_op(",") {
                out.push(Child::Token(self.bump()));
            } else {
                break;
            }
        }

        out
    }

    /// Consumes one token, respecting `(...)`/`[...]` nesting so that commas
    /// inside a nested call or index don't end the enclosing list early. A
    /// leading identifier is handed to [`Self::parse_name_chain`] instead of
    /// being consumed bare, so that a reference occurring anywhere a balanced
    /// child is expected (port connections, parameter assignments, call
    /// arguments, macro arguments) comes out as name/selector syntax rather
    /// than a flat token.
    fn next_balanced_child(&mut self) -> Child {
        if self.is_op("(") || self.is_op("[") {
            let open = self.bump();
            let open_is_paren = self.token_repo.as_ref().unwrap().get(&open.0).unwrap().raw.as_ref() == "(";
            let close = if open_is_paren { ")" } else { "]" };

            let mut children = vec![Child::Token(open)];
            children.extend(self.parse_balanced_until(close));

            if self.is_op(close) {
                children.push(Child::Token(self.bump()));
            }

            let range = self.span_of(&children, open);
            return Child::Node(self.push(SyntaxNode::new(SyntaxKind::TokenList, range, children)));
        }

        if self.is_ident() {
            return self.parse_name_chain();
        }

        Child::Token(self.bump())
    }

    /// Parses an identifier, optionally `pkg::item` scoped, followed by zero
    /// or more `.member` / `[index]` selectors: `IdentifierName`/`ScopedName`
    /// wrapped in `MemberSelector`/`IndexSelector` nodes, the concrete syntax
    /// a scope-resolution-by-name lookup walks (§4.4.2 step 6). Only called
    /// with the current token already known to be an identifier.
    fn parse_name_chain(&mut self) -> Child {
        let first = self.bump();

        let mut node_ref = if self.is_op("::") {
            let scope_tok = self.bump();

            if let Some(item_tok) = self.try_bump_ident() {
                let children = vec![Child::Token(first), Child::Token(scope_tok), Child::Token(item_tok)];
                let range = self.span_of(&children, first);
                self.push(SyntaxNode::new(SyntaxKind::ScopedName, range, children).with_name_token(item_tok))
            } else {
                let children = vec![Child::Token(first), Child::Token(scope_tok)];
                let range = self.span_of(&children, first);
                self.push(SyntaxNode::new(SyntaxKind::ScopedName, range, children).with_name_token(first))
            }
        } else {
            let children = vec![Child::Token(first)];
            let range = self.span_of(&children, first);
            self.push(SyntaxNode::new(SyntaxKind::IdentifierName, range, children).with_name_token(first))
        };

        loop {
            if self.is_op(".") {
                let dot = self.bump();

                let Some(member_tok) = self.try_bump_ident() else {
                    let children = vec![Child::Node(node_ref), Child::Token(dot)];
                    let range = self.span_of(&children, first);
                    node_ref = self.push(SyntaxNode::new(SyntaxKind::MemberSelector, range, children));
                    break;
                };

                let children = vec![Child::Node(node_ref), Child::Token(dot), Child::Token(member_tok)];
                let range = self.span_of(&children, first);
                node_ref = self.push(SyntaxNode::new(SyntaxKind::MemberSelector, range, children).with_name_token(member_tok));
                continue;
            }

            if self.is_op("[") {
                let lbrack = self.bump();
                let mut children = vec![Child::Node(node_ref), Child::Token(lbrack)];
                children.extend(self.parse_balanced_until("]"));

                if self.is_op("]") {
                    children.push(Child::Token(self.bump()));
                }

                let range = self.span_of(&children, first);
                node_ref = self.push(SyntaxNode::new(SyntaxKind::IndexSelector, range, children));
                continue;
            }

            break;
        }

        Child::Node(node_ref)
    }

    fn parse_balanced_until(&mut self, stop: &str) -> Vec<Child> {
        let mut out = Vec::new();

        while !self.at_eof() && !self.is_op(stop) {
            out.push(self.next_balanced_child());
        }

        out
    }

    fn parse_import(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        loop {
            children.push(Child::Node(self.parse_package_import_item()));

            if self.is_op(",") {
                children.push(Child::Token(self.bump()));
                continue;
            }
            break;
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, kw);
        self.push(SyntaxNode::new(SyntaxKind::PackageImportDeclaration, range, children))
    }

    fn parse_export(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        if self.is_op("*") {
            children.push(Child::Token(self.bump()));
            if self.is_op("::") {
                children.push(Child::Token(self.bump()));
            }
            if self.is_op("*") {
                children.push(Child::Token(self.bump()));
            }
        } else {
            loop {
                children.push(Child::Node(self.parse_package_import_item()));

                if self.is_op(",") {
                    children.push(Child::Token(self.bump()));
                    continue;
                }
                break;
            }
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, kw);
        self.push(SyntaxNode::new(SyntaxKind::PackageExportDeclaration, range, children))
    }

    fn parse_package_import_item(&mut self) -> NodeRef {
        let start = self.current_ref();
        let mut children = Vec::new();
        let mut name_tok = None;

        if let Some(pkg) = self.try_bump_ident() {
            name_tok = Some(pkg);
            children.push(Child::Token(pkg));
        }

        if self.is_op("::") {
            children.push(Child::Token(self.bump()));

            if self.is_op("*") {
                children.push(Child::Token(self.bump()));
            } else if let Some(item) = self.try_bump_ident() {
                children.push(Child::Token(item));
            }
        }

        let range = self.span_of(&children, start);
        let node = SyntaxNode::new(SyntaxKind::PackageImportItem, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    fn skip_leading_type_keywords(&mut self, children: &mut Vec<Child>) {
        while self.current().kind == TokenKind::Keyword && !self.is_kw("automatic") && !self.is_kw("static") && !self.is_kw("virtual") {
            children.push(Child::Token(self.bump()));
        }
    }

    /// Consumes leading identifier tokens that form a (possibly
    /// user-defined-typed) return type, stopping right before the function or
    /// task's own name so the caller can parse it (and an optional
    /// `Class::method` qualifier) uniformly.
    fn skip_leading_type_identifiers(&mut self, children: &mut Vec<Child>) {
        while self.is_ident() {
            let save = self.pos;
            let tok = self.bump();

            let is_name_boundary = self.is_op("(") || self.is_op("::") || !self.is_ident();

            if is_name_boundary {
                self.pos = save;
                break;
            }

            children.push(Child::Token(tok));
        }
    }

    fn parse_function(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        while self.is_kw("automatic") || self.is_kw("static") || self.is_kw("virtual") {
            children.push(Child::Token(self.bump()));
        }

        self.skip_leading_type_keywords(&mut children);

        if self.is_op("[") {
            children.push(Child::Token(self.bump()));
            while !self.is_op("]") && !self.at_eof() {
                children.push(Child::Token(self.bump()));
            }
            if self.is_op("]") {
                children.push(Child::Token(self.bump()));
            }
        }

        self.skip_leading_type_identifiers(&mut children);

        let mut name_tok = None;

        if let Some(first) = self.try_bump_ident() {
            name_tok = Some(first);
            children.push(Child::Token(first));

            if self.is_op("::") {
                children.push(Child::Token(self.bump()));
                if let Some(method) = self.try_bump_ident() {
                    name_tok = Some(method);
                    children.push(Child::Token(method));
                }
            }
        }

        if self.is_op("(") {
            let lparen = self.bump();
            let mut arg_children = vec![Child::Token(lparen)];

            while !self.is_op(")") && !self.at_eof() {
                arg_children.push(Child::Node(self.parse_formal_argument()));

                if self.is_op(",") {
                    arg_children.push(Child::Token(self.bump()));
                } else {
                    break;
                }
            }

            if self.is_op(")") {
                arg_children.push(Child::Token(self.bump()));
            }

            let range = self.span_of(&arg_children, lparen);
            children.push(Child::Node(self.push(SyntaxNode::new(SyntaxKind::FormalArgumentList, range, arg_children))));
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        loop {
            if self.at_eof() || self.is_kw("endfunction") {
                break;
            }
            children.push(self.next_statement_child());
        }

        if self.is_kw("endfunction") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, kw);
        let node = SyntaxNode::new(SyntaxKind::FunctionDeclaration, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    fn parse_task(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        while self.is_kw("automatic") || self.is_kw("static") || self.is_kw("virtual") {
            children.push(Child::Token(self.bump()));
        }

        let mut name_tok = self.try_bump_ident();

        if let Some(first) = name_tok {
            children.push(Child::Token(first));

            if self.is_op("::") {
                children.push(Child::Token(self.bump()));
                if let Some(method) = self.try_bump_ident() {
                    name_tok = Some(method);
                    children.push(Child::Token(method));
                }
            }
        }

        if self.is_op("(") {
            let lparen = self.bump();
            let mut arg_children = vec![Child::Token(lparen)];

            while !self.is_op(")") && !self.at_eof() {
                arg_children.push(Child::Node(self.parse_formal_argument()));

                if self.is_op(",") {
                    arg_children.push(Child::Token(self.bump()));
                } else {
                    break;
                }
            }

            if self.is_op(")") {
                arg_children.push(Child::Token(self.bump()));
            }

            let range = self.span_of(&arg_children, lparen);
            children.push(Child::Node(self.push(SyntaxNode::new(SyntaxKind::FormalArgumentList, range, arg_children))));
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        loop {
            if self.at_eof() || self.is_kw("endtask") {
                break;
            }
            children.push(self.next_statement_child());
        }

        if self.is_kw("endtask") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, kw);
        let node = SyntaxNode::new(SyntaxKind::TaskDeclaration, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    fn parse_formal_argument(&mut self) -> NodeRef {
        let start = self.current_ref();
        let mut children = Vec::new();

        if self.is_kw("input") || self.is_kw("output") || self.is_kw("inout") || self.is_kw("ref") {
            children.push(Child::Token(self.bump()));
        }

        while self.is_ident() {
            let save = self.pos;
            let tok = self.bump();

            if self.is_op(",") || self.is_op(")") || self.is_op("=") {
                self.pos = save;
                break;
            }

            children.push(Child::Token(tok));
        }

        let decl = self.parse_one_declarator(&[",", ")"]);
        let name_tok = self.nodes.get(&decl.0).and_then(|n| n.name_token);
        children.push(Child::Node(decl));

        let range = self.span_of(&children, start);
        let node = SyntaxNode::new(SyntaxKind::Declarator, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    // ---- generate regions --------------------------------------------------

    fn parse_generate_region(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        loop {
            if self.at_eof() || self.is_kw("endgenerate") {
                break;
            }
            children.push(Child::Node(self.parse_module_item()));
        }

        if self.is_kw("endgenerate") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, kw);
        self.push(SyntaxNode::new(SyntaxKind::Unknown, range, children))
    }

    fn parse_generate_if(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        if self.is_op("(") {
            children.push(Child::Token(self.bump()));
            children.extend(self.parse_balanced_until(")"));
            if self.is_op(")") {
                children.push(Child::Token(self.bump()));
            }
        }

        children.push(Child::Node(self.parse_generate_item_or_block()));

        if self.is_kw("else") {
            children.push(Child::Token(self.bump()));
            children.push(Child::Node(self.parse_generate_item_or_block()));
        }

        let range = self.span_of(&children, kw);
        self.push(SyntaxNode::new(SyntaxKind::Unknown, range, children))
    }

    fn parse_generate_for(&mut self) -> NodeRef {
        let kw = self.bump();
        let mut children = vec![Child::Token(kw)];

        if self.is_op("(") {
            children.push(Child::Token(self.bump()));
            children.extend(self.parse_balanced_until(")"));
            if self.is_op(")") {
                children.push(Child::Token(self.bump()));
            }
        }

        children.push(Child::Node(self.parse_generate_item_or_block()));

        let range = self.span_of(&children, kw);
        self.push(SyntaxNode::new(SyntaxKind::Unknown, range, children))
    }

    fn parse_generate_item_or_block(&mut self) -> NodeRef {
        if self.is_kw("begin") {
            return self.parse_generate_block();
        }

        // A label before `begin`: `label : begin ... end`.
        if self.is_ident() {
            let save = self.pos;
            let label = self.bump();

            if self.is_op(":") {
                self.bump();

                if self.is_kw("begin") {
                    return self.parse_generate_block_with_label(Some(label));
                }
            }

            self.pos = save;
        }

        self.parse_module_item()
    }

    fn parse_generate_block(&mut self) -> NodeRef {
        self.parse_generate_block_with_label(None)
    }

    fn parse_generate_block_with_label(&mut self, before_label: Option<TokenRef>) -> NodeRef {
        let begin = self.bump();
        let mut children = Vec::new();

        if let Some(before_label) = before_label {
            children.push(Child::Token(before_label));
        }
        children.push(Child::Token(begin));

        let mut name_tok = before_label;

        if before_label.is_none() && self.is_op(":") {
            children.push(Child::Token(self.bump()));
            if let Some(after_label) = self.try_bump_ident() {
                name_tok = Some(after_label);
                children.push(Child::Token(after_label));
            }
        }

        loop {
            if self.at_eof() || self.is_kw("end") {
                break;
            }
            children.push(Child::Node(self.parse_module_item()));
        }

        if self.is_kw("end") {
            children.push(Child::Token(self.bump()));

            if self.is_op(":") {
                children.push(Child::Token(self.bump()));
                if self.is_ident() {
                    children.push(Child::Token(self.bump()));
                }
            }
        }

        let range = self.span_of(&children, begin);
        let node = SyntaxNode::new(SyntaxKind::GenerateBlock, range, children);
        let node = if let Some(n) = name_tok { node.with_name_token(n) } else { node };
        self.push(node)
    }

    // ---- statements / macro usage / invocation -----------------------------

    fn next_statement_child(&mut self) -> Child {
        if self.is_macro_usage() {
            return Child::Node(self.parse_macro_usage());
        }

        if self.is_ident() {
            let save = self.pos;
            let name = self.bump();

            if self.is_op("(") {
                return Child::Node(self.parse_invocation(name));
            }

            self.pos = save;
            return self.parse_name_chain();
        }

        if self.is_op("(") || self.is_op("[") {
            return self.next_balanced_child();
        }

        Child::Token(self.bump())
    }

    fn parse_invocation(&mut self, name: TokenRef) -> NodeRef {
        let mut children = vec![Child::Token(name)];
        let lparen = self.bump();
        children.push(Child::Token(lparen));

        while !self.is_op(")") && !self.at_eof() {
            let start = self.current_ref();
            let mut arg_children = Vec::new();

            while !self.at_eof() && !self.is_op(",") && !self.is_op(")") {
                arg_children.push(self.next_balanced_child());
            }

            let range = self.span_of(&arg_children, start);
            children.push(Child::Node(self.push(SyntaxNode::new(SyntaxKind::TokenList, range, arg_children))));

            if self.is_op(",") {
                children.push(Child::Token(self.bump()));
            } else {
                break;
            }
        }

        if self.is_op(")") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, name);
        self.push(SyntaxNode::new(SyntaxKind::InvocationExpression, range, children).with_name_token(name))
    }

    fn parse_macro_usage(&mut self) -> NodeRef {
        let name = self.bump();
        let mut children = vec![Child::Token(name)];

        if self.is_op("(") && self.touches_next(name, self.token_range(self.current_ref()).start.offset) {
            children.push(Child::Token(self.bump()));

            while !self.is_op(")") && !self.at_eof() {
                let start = self.current_ref();
                let mut arg_children = Vec::new();

                while !self.at_eof() && !self.is_op(",") && !self.is_op(")") {
                    arg_children.push(self.next_balanced_child());
                }

                let range = self.span_of(&arg_children, start);
                let list = self.push(SyntaxNode::new(SyntaxKind::TokenList, range, arg_children));
                let arg_range = self.nodes.get(&list.0).unwrap().range;
                children.push(Child::Node(
                    self.push(SyntaxNode::new(SyntaxKind::MacroActualArgument, arg_range, vec![Child::Node(list)])),
                ));

                if self.is_op(",") {
                    children.push(Child::Token(self.bump()));
                } else {
                    break;
                }
            }

            if self.is_op(")") {
                children.push(Child::Token(self.bump()));
            }
        }

        if self.is_op(";") {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, name);
        self.push(SyntaxNode::new(SyntaxKind::MacroUsage, range, children).with_name_token(name))
    }

    fn parse_unknown_item(&mut self) -> NodeRef {
        let start = self.current_ref();
        let mut children = Vec::new();

        if self.is_kw("begin") {
            return self.parse_generate_block();
        }

        loop {
            if self.at_eof() {
                break;
            }

            let is_terminator_ahead = self.is_op(";");
            let child = self.next_statement_child();
            children.push(child);

            if is_terminator_ahead {
                break;
            }
        }

        if children.is_empty() {
            children.push(Child::Token(self.bump()));
        }

        let range = self.span_of(&children, start);
        self.push(SyntaxNode::new(SyntaxKind::Unknown, range, children))
    }
}

/// Parses `text` (already loaded into `buffer` by the caller) into a
/// [`SyntaxTree`]. `base_dir` anchors relative `` `include `` paths;
/// `source_manager`, when present, is used to resolve those includes into
/// registered buffers (see `DESIGN.md` for why included content is not
/// textually spliced into the returned tree).
pub fn parse(
    buffer: BufferId,
    text: &str,
    source_manager: Option<&SourceManager>,
    base_dir: std::path::PathBuf,
) -> SyntaxTree {
    Parser::new(buffer, text, source_manager, base_dir).parse()
}

/// Reparses an already-flattened token sequence — typically a macro actual
/// argument's original tokens, rejoined with single spaces since the argument
/// has no buffer range of its own to re-lex from — in isolation from the
/// surrounding file (§4.4.2 step 3). Returns a fresh, independent
/// [`SyntaxTree`] rooted at one `TokenList` wrapping whatever name/selector
/// syntax (or plain tokens, if `text` isn't name-shaped) the reparse
/// produces, plus that root's own [`NodeRef`].
pub(crate) fn parse_name_expression(buffer: BufferId, text: &str) -> (SyntaxTree, NodeRef) {
    let mut parser = Parser::new(buffer, text, None, std::path::PathBuf::from("."));

    let mut children = Vec::new();
    while !parser.at_eof() {
        let before = parser.pos;
        children.push(parser.next_balanced_child());

        if parser.pos == before {
            parser.bump();
        }
    }

    let start = SourceLocation::new(buffer, 0);
    let end = SourceLocation::new(buffer, text.len());
    let range = SourceRange::new(start, end);

    let root = parser.push(SyntaxNode::new(SyntaxKind::TokenList, range, children));
    let file_root = parser.push(SyntaxNode::new(SyntaxKind::SourceFile, range, vec![Child::Node(root)]));

    let tree = SyntaxTree::new(
        buffer,
        parser.token_repo.take().unwrap(),
        parser.nodes,
        file_root,
        vec![buffer],
        Vec::new(),
        Vec::new(),
    );

    (tree, root)
}
