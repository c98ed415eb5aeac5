//! CSS selector subset used by the in-memory document.
//!
//! Supported: type and universal selectors, `#id`, `.class`, attribute selectors
//! (`[a]`, `=`, `^=`, `$=`, `*=`, `~=`, `|=`), descendant and child combinators, and
//! comma-separated selector lists. Pseudo-classes and sibling combinators are rejected
//! with [`DomError::UnsupportedSelector`].

use waypoint_core_types::NodeId;

use crate::errors::DomError;

/// Element lookups the matcher needs from a tree.
pub trait SelectorContext {
    /// Lower-case tag name, `None` for non-elements.
    fn element_tag(&self, node: NodeId) -> Option<&str>;

    fn element_attr(&self, node: NodeId, name: &str) -> Option<&str>;

    fn parent_element(&self, node: NodeId) -> Option<NodeId>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum AttrCondition {
    Exists { name: String },
    Equals { name: String, value: String },
    Prefix { name: String, value: String },
    Suffix { name: String, value: String },
    Substring { name: String, value: String },
    Includes { name: String, value: String },
    DashMatch { name: String, value: String },
}

impl AttrCondition {
    fn matches(&self, ctx: &impl SelectorContext, node: NodeId) -> bool {
        match self {
            AttrCondition::Exists { name } => ctx.element_attr(node, name).is_some(),
            AttrCondition::Equals { name, value } => {
                ctx.element_attr(node, name) == Some(value.as_str())
            }
            AttrCondition::Prefix { name, value } => ctx
                .element_attr(node, name)
                .is_some_and(|v| !value.is_empty() && v.starts_with(value.as_str())),
            AttrCondition::Suffix { name, value } => ctx
                .element_attr(node, name)
                .is_some_and(|v| !value.is_empty() && v.ends_with(value.as_str())),
            AttrCondition::Substring { name, value } => ctx
                .element_attr(node, name)
                .is_some_and(|v| !value.is_empty() && v.contains(value.as_str())),
            AttrCondition::Includes { name, value } => ctx
                .element_attr(node, name)
                .is_some_and(|v| v.split_whitespace().any(|token| token == value)),
            AttrCondition::DashMatch { name, value } => {
                ctx.element_attr(node, name).is_some_and(|v| {
                    v == value
                        || (v.len() > value.len()
                            && v.starts_with(value.as_str())
                            && v.as_bytes()[value.len()] == b'-')
                })
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Compound {
    tag: Option<String>,
    ids: Vec<String>,
    classes: Vec<String>,
    attrs: Vec<AttrCondition>,
}

impl Compound {
    fn matches(&self, ctx: &impl SelectorContext, node: NodeId) -> bool {
        let Some(tag) = ctx.element_tag(node) else {
            return false;
        };
        if self.tag.as_deref().is_some_and(|expected| expected != tag) {
            return false;
        }
        if !self
            .ids
            .iter()
            .all(|id| ctx.element_attr(node, "id") == Some(id.as_str()))
        {
            return false;
        }
        if !self.classes.is_empty() {
            let class_attr = ctx.element_attr(node, "class").unwrap_or_default();
            if !self
                .classes
                .iter()
                .all(|class| class_attr.split_whitespace().any(|c| c == class))
            {
                return false;
            }
        }
        self.attrs.iter().all(|cond| cond.matches(ctx, node))
    }
}

/// One comma-free selector: compounds joined by combinators, left to right.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Complex {
    compounds: Vec<Compound>,
    // combinators[i] joins compounds[i] and compounds[i + 1]
    combinators: Vec<Combinator>,
}

impl Complex {
    fn matches(&self, ctx: &impl SelectorContext, node: NodeId) -> bool {
        self.matches_at(ctx, node, self.compounds.len() - 1)
    }

    fn matches_at(&self, ctx: &impl SelectorContext, node: NodeId, index: usize) -> bool {
        if !self.compounds[index].matches(ctx, node) {
            return false;
        }
        if index == 0 {
            return true;
        }
        match self.combinators[index - 1] {
            Combinator::Child => ctx
                .parent_element(node)
                .is_some_and(|parent| self.matches_at(ctx, parent, index - 1)),
            Combinator::Descendant => {
                let mut current = ctx.parent_element(node);
                while let Some(ancestor) = current {
                    if self.matches_at(ctx, ancestor, index - 1) {
                        return true;
                    }
                    current = ctx.parent_element(ancestor);
                }
                false
            }
        }
    }
}

/// A parsed selector list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selector {
    source: String,
    groups: Vec<Complex>,
}

impl Selector {
    /// Parse a selector list.
    pub fn parse(source: &str) -> Result<Self, DomError> {
        let groups = split_groups(source)?
            .iter()
            .map(|group| parse_complex(source, group))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            source: source.to_string(),
            groups,
        })
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Whether `node` matches any selector in the list.
    pub fn matches(&self, ctx: &impl SelectorContext, node: NodeId) -> bool {
        self.groups.iter().any(|group| group.matches(ctx, node))
    }
}

fn split_groups(source: &str) -> Result<Vec<String>, DomError> {
    let mut groups = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;
    let mut quote: Option<char> = None;

    for ch in source.chars() {
        if let Some(open) = quote {
            if ch == open {
                quote = None;
            }
            current.push(ch);
            continue;
        }
        match ch {
            '"' | '\'' if bracket_depth > 0 => {
                quote = Some(ch);
                current.push(ch);
            }
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(DomError::invalid(source, "unbalanced ']'"));
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            ',' if bracket_depth == 0 => {
                let trimmed = current.trim();
                if trimmed.is_empty() {
                    return Err(DomError::invalid(source, "empty selector in list"));
                }
                groups.push(trimmed.to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if quote.is_some() {
        return Err(DomError::invalid(source, "unterminated string"));
    }
    if bracket_depth != 0 {
        return Err(DomError::invalid(source, "unbalanced '['"));
    }
    let trimmed = current.trim();
    if trimmed.is_empty() {
        return Err(DomError::invalid(source, "empty selector"));
    }
    groups.push(trimmed.to_string());
    Ok(groups)
}

fn parse_complex(source: &str, group: &str) -> Result<Complex, DomError> {
    let chars: Vec<char> = group.chars().collect();
    let mut pos = 0;
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending: Option<Combinator> = None;

    loop {
        skip_whitespace(&chars, &mut pos);
        let Some(&ch) = chars.get(pos) else {
            break;
        };
        match ch {
            '>' => {
                if compounds.is_empty() || pending.is_some() {
                    return Err(DomError::invalid(source, "dangling '>' combinator"));
                }
                pending = Some(Combinator::Child);
                pos += 1;
            }
            '+' | '~' => {
                return Err(DomError::unsupported(
                    source,
                    format!("'{ch}' sibling combinator"),
                ));
            }
            _ => {
                if !compounds.is_empty() {
                    combinators.push(pending.take().unwrap_or(Combinator::Descendant));
                }
                compounds.push(parse_compound(source, &chars, &mut pos)?);
            }
        }
    }

    if compounds.is_empty() || pending.is_some() {
        return Err(DomError::invalid(source, "selector ends with a combinator"));
    }
    Ok(Complex {
        compounds,
        combinators,
    })
}

fn parse_compound(source: &str, chars: &[char], pos: &mut usize) -> Result<Compound, DomError> {
    let start = *pos;
    let mut compound = Compound::default();

    match chars.get(*pos) {
        Some('*') => *pos += 1,
        Some(&c) if is_ident_start(c) => {
            compound.tag = Some(read_ident(chars, pos).to_ascii_lowercase());
        }
        _ => {}
    }

    while let Some(&ch) = chars.get(*pos) {
        match ch {
            '#' => {
                *pos += 1;
                compound.ids.push(read_name(source, chars, pos, "id")?);
            }
            '.' => {
                *pos += 1;
                compound.classes.push(read_name(source, chars, pos, "class")?);
            }
            '[' => {
                *pos += 1;
                compound.attrs.push(parse_attr(source, chars, pos)?);
            }
            ':' => return Err(DomError::unsupported(source, "pseudo-classes")),
            c if c.is_whitespace() || c == '>' || c == '+' || c == '~' => break,
            c => return Err(DomError::invalid(source, format!("unexpected '{c}'"))),
        }
    }

    if *pos == start {
        return Err(DomError::invalid(source, "expected a compound selector"));
    }
    Ok(compound)
}

fn parse_attr(source: &str, chars: &[char], pos: &mut usize) -> Result<AttrCondition, DomError> {
    skip_whitespace(chars, pos);
    let name = read_ident(chars, pos).to_ascii_lowercase();
    if name.is_empty() {
        return Err(DomError::invalid(source, "attribute selector without a name"));
    }
    skip_whitespace(chars, pos);

    let operator = match chars.get(*pos) {
        Some(']') => {
            *pos += 1;
            return Ok(AttrCondition::Exists { name });
        }
        Some('=') => {
            *pos += 1;
            '='
        }
        Some(&op @ ('^' | '$' | '*' | '~' | '|')) if chars.get(*pos + 1) == Some(&'=') => {
            *pos += 2;
            op
        }
        _ => return Err(DomError::invalid(source, "malformed attribute selector")),
    };

    skip_whitespace(chars, pos);
    let value = match chars.get(*pos) {
        Some(&q @ ('"' | '\'')) => {
            *pos += 1;
            let mut value = String::new();
            loop {
                match chars.get(*pos) {
                    Some(&c) if c == q => {
                        *pos += 1;
                        break;
                    }
                    Some(&c) => {
                        value.push(c);
                        *pos += 1;
                    }
                    None => return Err(DomError::invalid(source, "unterminated string")),
                }
            }
            value
        }
        _ => {
            let value = read_ident(chars, pos);
            if value.is_empty() {
                return Err(DomError::invalid(source, "attribute selector without a value"));
            }
            value
        }
    };
    skip_whitespace(chars, pos);
    if chars.get(*pos) != Some(&']') {
        return Err(DomError::invalid(source, "expected ']'"));
    }
    *pos += 1;

    Ok(match operator {
        '^' => AttrCondition::Prefix { name, value },
        '$' => AttrCondition::Suffix { name, value },
        '*' => AttrCondition::Substring { name, value },
        '~' => AttrCondition::Includes { name, value },
        '|' => AttrCondition::DashMatch { name, value },
        _ => AttrCondition::Equals { name, value },
    })
}

fn read_name(source: &str, chars: &[char], pos: &mut usize, what: &str) -> Result<String, DomError> {
    match chars.get(*pos) {
        Some(&c) if is_ident_start(c) => Ok(read_ident(chars, pos)),
        _ => Err(DomError::invalid(source, format!("expected {what} name"))),
    }
}

fn read_ident(chars: &[char], pos: &mut usize) -> String {
    let mut ident = String::new();
    while let Some(&c) = chars.get(*pos) {
        if c.is_alphanumeric() || c == '-' || c == '_' || !c.is_ascii() {
            ident.push(c);
            *pos += 1;
        } else {
            break;
        }
    }
    ident
}

fn is_ident_start(c: char) -> bool {
    c.is_alphabetic() || c == '_' || c == '-' || !c.is_ascii()
}

fn skip_whitespace(chars: &[char], pos: &mut usize) {
    while chars.get(*pos).is_some_and(|c| c.is_whitespace()) {
        *pos += 1;
    }
}
