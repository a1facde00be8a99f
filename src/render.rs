//! Command template rendering
//!
//! Builds a shell command line from a base command, an ordered list of
//! flags and ordered positionals. Tokens are joined by exactly one space.

/// One command-line flag
#[derive(Debug, Clone, Copy)]
pub enum Flag<'a> {
    /// `-name` when on, omitted otherwise
    Switch { name: &'a str, on: bool },
    /// `-name="value"`, omitted when unset or empty
    Text { name: &'a str, value: Option<&'a str> },
    /// `-name="a,b"`, omitted when the list is empty
    List { name: &'a str, values: &'a [String] },
    /// `-name=true|false`, always emitted
    Bool { name: &'a str, value: bool },
}

impl<'a> Flag<'a> {
    pub fn switch(name: &'a str, on: bool) -> Self {
        Self::Switch { name, on }
    }

    pub fn text(name: &'a str, value: Option<&'a str>) -> Self {
        Self::Text { name, value }
    }

    pub fn list(name: &'a str, values: &'a [String]) -> Self {
        Self::List { name, values }
    }

    pub fn boolean(name: &'a str, value: bool) -> Self {
        Self::Bool { name, value }
    }

    /// Render the flag token, or `None` when it is omitted
    pub fn render(&self) -> Option<String> {
        match *self {
            Self::Switch { name, on } => on.then(|| format!("-{name}")),
            Self::Text { name, value } => value
                .filter(|v| !v.is_empty())
                .map(|v| format!("-{name}={}", double_quote(v))),
            Self::List { name, values } => (!values.is_empty())
                .then(|| format!("-{name}={}", double_quote(&values.join(",")))),
            Self::Bool { name, value } => Some(format!("-{name}={value}")),
        }
    }
}

/// Render `base`, then every emitted flag, then the non-empty positionals
pub fn render(base: &str, flags: &[Flag<'_>], positionals: &[&str]) -> String {
    let mut tokens = vec![base.to_string()];
    tokens.extend(flags.iter().filter_map(Flag::render));
    tokens.extend(
        positionals
            .iter()
            .filter(|p| !p.is_empty())
            .map(|p| (*p).to_string()),
    );
    tokens.join(" ")
}

/// Wrap in double quotes, escaping what the shell would expand inside them
pub fn double_quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        if matches!(c, '\\' | '"' | '$' | '`') {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

/// Wrap in single quotes; an embedded `'` becomes `'\''`
pub fn single_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', r"'\''"))
}

/// Single-quote every value and join with spaces: `'A' 'B'`
pub fn quote_each<S: AsRef<str>>(values: &[S]) -> String {
    values
        .iter()
        .map(|v| single_quote(v.as_ref()))
        .collect::<Vec<_>>()
        .join(" ")
}
