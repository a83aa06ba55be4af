//! Helpers for C++ type spellings as they appear in the declaration index.
//!
//! Doxygen reproduces types more or less as written in the headers, so the
//! same type can show up as `const osg::Vec3&`, `const osg::Vec3 &` or
//! `osg::Vec3 const &`. Everything in the registry goes through
//! [`normalize`] first; the canonical spelling puts one space between
//! identifiers, before `*`/`&`, and inside template brackets:
//! `std::vector< osg::ref_ptr< osg::Node > >`.

use crate::types::ContainerShape;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Ident(String),
    Punct(char),
}

impl Token {
    fn is_ident(&self, s: &str) -> bool {
        matches!(self, Token::Ident(i) if i == s)
    }
}

fn tokenize(ty: &str) -> Vec<Token> {
    let chars: Vec<char> = ty.chars().collect();
    let mut tokens = Vec::new();
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        if c.is_whitespace() {
            i += 1;
            continue;
        }

        let starts_ident = c.is_alphanumeric() || c == '_';
        let starts_global = c == ':' && chars.get(i + 1) == Some(&':');
        if starts_ident || starts_global {
            let mut ident = String::new();
            loop {
                while i < chars.len() && (chars[i].is_alphanumeric() || chars[i] == '_') {
                    ident.push(chars[i]);
                    i += 1;
                }
                if i + 1 < chars.len() && chars[i] == ':' && chars[i + 1] == ':' {
                    ident.push_str("::");
                    i += 2;
                    continue;
                }
                break;
            }
            tokens.push(Token::Ident(ident));
            continue;
        }

        tokens.push(Token::Punct(c));
        i += 1;
    }

    tokens
}

fn render(tokens: &[Token]) -> String {
    let mut out = String::new();
    let mut prev: Option<&Token> = None;

    for token in tokens {
        match token {
            Token::Ident(ident) => {
                let needs_space = match prev {
                    Some(Token::Punct('>')) => !ident.starts_with("::"),
                    Some(Token::Ident(_)) | Some(Token::Punct('*' | '&')) => true,
                    _ => false,
                };
                if needs_space && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push_str(ident);
            }
            Token::Punct('<') => out.push_str("< "),
            Token::Punct('>') => {
                if !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push('>');
            }
            Token::Punct(',') => out.push_str(", "),
            Token::Punct(c @ ('*' | '&')) => {
                let glued = matches!(prev, Some(Token::Punct('*' | '&')));
                if !glued && !out.is_empty() && !out.ends_with(' ') {
                    out.push(' ');
                }
                out.push(*c);
            }
            Token::Punct(c) => out.push(*c),
        }
        prev = Some(token);
    }

    out.trim().to_string()
}

/// Canonical spelling of a type.
pub fn normalize(ty: &str) -> String {
    render(&tokenize(ty))
}

/// Type with top-level cv-qualifiers, references and elaborated-type
/// keywords removed. Pointers are kept.
///
/// This is the spelling used to decide whether a getter and a setter talk
/// about the same value: `const osg::Vec3 &` and `osg::Vec3` agree,
/// `osg::Node *` and `const osg::Node *` agree, `float` and `double` don't.
pub fn value_type(ty: &str) -> String {
    let mut depth = 0usize;
    let kept: Vec<Token> = tokenize(ty)
        .into_iter()
        .filter(|token| {
            match token {
                Token::Punct('<') => depth += 1,
                Token::Punct('>') => depth = depth.saturating_sub(1),
                _ => {}
            }
            if depth > 0 {
                return true;
            }
            !(token.is_ident("const")
                || token.is_ident("volatile")
                || token.is_ident("struct")
                || token.is_ident("class")
                || token.is_ident("enum")
                || token.is_ident("typename")
                || *token == Token::Punct('&'))
        })
        .collect();
    render(&kept)
}

/// Whether `ty` is `void` (the return type of setters and constructors).
pub fn is_void(ty: &str) -> bool {
    normalize(ty) == "void"
}

/// Whether the parameter is a non-const reference or pointer (an in/out argument).
pub fn is_inout(ty: &str) -> bool {
    let tokens = tokenize(ty);
    let has_const = tokens.iter().any(|t| t.is_ident("const"));
    let by_ref = tokens
        .last()
        .is_some_and(|t| matches!(t, Token::Punct('&' | '*')));
    by_ref && !has_const
}

/// Split `head< a, b >` into `("head", ["a", "b"])`.
///
/// Returns `None` when the type is not a single template-id.
pub fn split_template(ty: &str) -> Option<(String, Vec<String>)> {
    let tokens = tokenize(ty);
    let (Token::Ident(head), Token::Punct('<')) = (tokens.first()?, tokens.get(1)?) else {
        return None;
    };
    if *tokens.last()? != Token::Punct('>') {
        return None;
    }

    let mut args = Vec::new();
    let mut current = Vec::new();
    let mut depth = 0usize;
    for token in &tokens[2..tokens.len() - 1] {
        match token {
            Token::Punct('<') => depth += 1,
            Token::Punct('>') => {
                if depth == 0 {
                    // closing bracket before the end: `a< b >::c< d >`
                    return None;
                }
                depth -= 1;
            }
            Token::Punct(',') if depth == 0 => {
                args.push(render(&current));
                current.clear();
                continue;
            }
            _ => {}
        }
        current.push(token.clone());
    }
    if !current.is_empty() {
        args.push(render(&current));
    }

    Some((head.clone(), args))
}

/// Remove every template argument list: `a::B< int >::C` becomes `a::B::C`.
pub fn strip_template_args(name: &str) -> String {
    let mut depth = 0usize;
    let kept: Vec<Token> = tokenize(name)
        .into_iter()
        .filter(|token| match token {
            Token::Punct('<') => {
                depth += 1;
                false
            }
            Token::Punct('>') => {
                depth = depth.saturating_sub(1);
                false
            }
            _ => depth == 0,
        })
        .collect();

    // `B` and `::C` were separate tokens around the stripped brackets
    kept.iter()
        .map(|t| match t {
            Token::Ident(i) => i.clone(),
            Token::Punct(c) => c.to_string(),
        })
        .collect::<String>()
}

/// Byte offset of the last `::` that is not inside template brackets.
fn last_scope_separator(name: &str) -> Option<usize> {
    let bytes = name.as_bytes();
    let mut depth = 0usize;
    let mut found = None;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => depth += 1,
            b'>' => depth = depth.saturating_sub(1),
            b':' if depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                found = Some(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }
    found
}

/// Enclosing scope of a qualified name, if any: `osg::Node::Mode` -> `osg::Node`.
pub fn scope_of(name: &str) -> Option<&str> {
    last_scope_separator(name)
        .map(|at| &name[..at])
        .filter(|scope| !scope.is_empty())
}

/// Unqualified last component: `osg::Node::Mode` -> `Mode`.
pub fn last_segment(name: &str) -> &str {
    match last_scope_separator(name) {
        Some(at) => &name[at + 2..],
        None => name,
    }
}

/// Names to try, innermost scope first, when `name` is referenced from inside `scope`.
pub fn scoped_candidates(scope: Option<&str>, name: &str) -> Vec<String> {
    let name = name.trim_start_matches("::");
    let mut candidates = Vec::new();
    let mut current = scope;
    while let Some(s) = current {
        candidates.push(format!("{s}::{name}"));
        current = scope_of(s);
    }
    candidates.push(name.to_string());
    candidates
}

/// Recognise a standard container instantiation, returning its shape and the
/// element type arguments (allocators and comparators dropped).
pub fn std_container(ty: &str) -> Option<(ContainerShape, Vec<String>)> {
    let (head, args) = split_template(&value_type(ty))?;
    let shape = match head.trim_start_matches("::") {
        "std::vector" => ContainerShape::Vector,
        "std::list" => ContainerShape::List,
        "std::deque" => ContainerShape::Deque,
        "std::set" => ContainerShape::Set,
        "std::multiset" => ContainerShape::MultiSet,
        "std::map" => ContainerShape::Map,
        "std::multimap" => ContainerShape::MultiMap,
        "std::pair" => ContainerShape::Pair,
        _ => return None,
    };
    let arity = shape.arity();
    if args.len() < arity {
        return None;
    }
    Some((shape, args.into_iter().take(arity).collect()))
}

/// Every standard container instantiation mentioned anywhere in `ty`,
/// outermost first, as canonical `std::container< args >` spellings.
pub fn collect_std_containers(ty: &str, out: &mut Vec<String>) {
    let vt = value_type(ty);
    let Some((_, args)) = split_template(&vt) else {
        return;
    };
    if let Some((shape, element_args)) = std_container(&vt) {
        let spelled = container_name(shape, &element_args);
        if !out.contains(&spelled) {
            out.push(spelled);
        }
    }
    for arg in &args {
        collect_std_containers(arg, out);
    }
}

/// Every template-id mentioned in `ty`, outermost first, with pointers and
/// qualifiers removed: `const a< b< c > * > &` yields `a< b< c > * >` and `b< c >`.
pub fn collect_template_ids(ty: &str, out: &mut Vec<String>) {
    let vt = value_type(ty);
    let pointee = vt.trim_end_matches(|c: char| c == '*' || c.is_whitespace());
    let Some((_, args)) = split_template(pointee) else {
        return;
    };
    let spelled = normalize(pointee);
    if !out.contains(&spelled) {
        out.push(spelled);
    }
    for arg in &args {
        collect_template_ids(arg, out);
    }
}

/// Canonical name of a container instantiation.
pub fn container_name(shape: ContainerShape, args: &[String]) -> String {
    let args: Vec<String> = args.iter().map(|a| normalize(a)).collect();
    format!("{}< {} >", shape.std_name(), args.join(", "))
}

/// Identifier-safe encoding of a type used inside generated method ids.
pub fn mangle(ty: &str) -> String {
    let parts: Vec<String> = tokenize(ty)
        .into_iter()
        .filter_map(|token| match token {
            Token::Ident(i) if i == "const" => Some("C5".to_string()),
            Token::Ident(i) if i == "volatile" => Some("V8".to_string()),
            Token::Ident(i) => Some(i.trim_start_matches("::").replace("::", "_")),
            Token::Punct('*') => Some("P1".to_string()),
            Token::Punct('&') => Some("R1".to_string()),
            Token::Punct('<') => Some("T1".to_string()),
            Token::Punct('[') => Some("A1".to_string()),
            Token::Punct('(') => Some("F1".to_string()),
            Token::Punct(_) => None,
        })
        .collect();
    parts.join("_")
}

/// File stem for a qualified name: `osg::Node` -> `osg_Node`.
pub fn file_stem(qualified_name: &str) -> String {
    let mut stem = String::with_capacity(qualified_name.len());
    for c in qualified_name.chars() {
        let c = if c.is_ascii_alphanumeric() { c } else { '_' };
        if c == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(c);
    }
    let stem = stem.trim_matches('_');
    if stem.is_empty() {
        "_".to_string()
    } else {
        stem.to_string()
    }
}

/// Property name from an accessor base name: `Width` -> `width`, `URL` stays `URL`.
pub fn lower_first(base: &str) -> String {
    let mut chars = base.chars();
    let Some(first) = chars.next() else {
        return String::new();
    };
    let second_upper = base.chars().nth(1).is_some_and(|c| c.is_uppercase());
    if second_upper {
        return base.to_string();
    }
    first.to_lowercase().chain(chars).collect()
}
