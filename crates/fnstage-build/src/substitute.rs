//! Cloud Build style variable substitution.
//!
//! `$NAME` and `${NAME}` are replaced by bound values; `$$` yields a literal
//! `$`. User variables start with `_` and must be bound. Unbound built-ins
//! such as `$PROJECT_ID` are left in place for the build service to expand.

use std::collections::{BTreeMap, BTreeSet};

/// Variable name → value.
pub type Substitutions = BTreeMap<String, String>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SubstitutionError {
    #[error("unbound substitution '{name}' — pass it with --substitutions {name}=<value>")]
    Unbound { name: String },

    #[error("unclosed '${{' in {input:?}")]
    Unclosed { input: String },

    #[error("invalid substitution name {name:?} in {input:?}")]
    InvalidName { name: String, input: String },
}

enum Token<'a> {
    Literal(&'a str),
    Dollar,
    Var { name: &'a str, raw: &'a str },
}

/// Replace every variable reference in `input`.
pub fn substitute(input: &str, vars: &Substitutions) -> Result<String, SubstitutionError> {
    let mut out = String::with_capacity(input.len());
    for token in tokenize(input)? {
        match token {
            Token::Literal(s) => out.push_str(s),
            Token::Dollar => out.push('$'),
            Token::Var { name, raw } => match vars.get(name) {
                Some(value) => out.push_str(value),
                None if is_user_variable(name) => {
                    return Err(SubstitutionError::Unbound {
                        name: name.to_owned(),
                    });
                }
                None => out.push_str(raw),
            },
        }
    }
    Ok(out)
}

/// User variables (`_NAME`) referenced in `input`.
pub fn user_variables(input: &str) -> Result<BTreeSet<String>, SubstitutionError> {
    Ok(tokenize(input)?
        .into_iter()
        .filter_map(|t| match t {
            Token::Var { name, .. } if is_user_variable(name) => Some(name.to_owned()),
            _ => None,
        })
        .collect())
}

pub fn is_user_variable(name: &str) -> bool {
    name.starts_with('_')
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_'
}

fn tokenize(input: &str) -> Result<Vec<Token<'_>>, SubstitutionError> {
    let mut tokens = Vec::new();
    let mut rest = input;

    while let Some(pos) = rest.find('$') {
        if pos > 0 {
            tokens.push(Token::Literal(&rest[..pos]));
        }
        let after = &rest[pos + 1..];

        if let Some(tail) = after.strip_prefix('$') {
            tokens.push(Token::Dollar);
            rest = tail;
        } else if let Some(braced) = after.strip_prefix('{') {
            let end = braced.find('}').ok_or_else(|| SubstitutionError::Unclosed {
                input: input.to_owned(),
            })?;
            let name = &braced[..end];
            if name.is_empty() || !name.chars().all(is_name_char) {
                return Err(SubstitutionError::InvalidName {
                    name: name.to_owned(),
                    input: input.to_owned(),
                });
            }
            // "${" + name + "}"
            let raw_len = 1 + 1 + end + 1;
            tokens.push(Token::Var {
                name,
                raw: &rest[pos..pos + raw_len],
            });
            rest = &braced[end + 1..];
        } else {
            let len = after.len() - after.trim_start_matches(is_name_char).len();
            if len == 0 {
                tokens.push(Token::Literal("$"));
                rest = after;
            } else {
                tokens.push(Token::Var {
                    name: &after[..len],
                    raw: &rest[pos..pos + 1 + len],
                });
                rest = &after[len..];
            }
        }
    }

    if !rest.is_empty() {
        tokens.push(Token::Literal(rest));
    }
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> Substitutions {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    #[test]
    fn braced_and_bare_forms() {
        let v = vars(&[("_PREFIX", "dev")]);
        assert_eq!(substitute("${_PREFIX}-func1", &v).unwrap(), "dev-func1");
        assert_eq!(substitute("$_PREFIX", &v).unwrap(), "dev");
    }

    #[test]
    fn bare_name_stops_at_non_name_char() {
        let v = vars(&[("_PREFIX", "dev")]);
        assert_eq!(substitute("$_PREFIX-func1", &v).unwrap(), "dev-func1");
    }

    #[test]
    fn double_dollar_is_literal() {
        assert_eq!(
            substitute("cost $$5", &Substitutions::new()).unwrap(),
            "cost $5"
        );
    }

    #[test]
    fn lone_dollar_is_kept() {
        assert_eq!(
            substitute("a $ b $", &Substitutions::new()).unwrap(),
            "a $ b $"
        );
    }

    #[test]
    fn unbound_builtin_passes_through() {
        assert_eq!(
            substitute("--project=${PROJECT_ID} $BUILD_ID", &Substitutions::new()).unwrap(),
            "--project=${PROJECT_ID} $BUILD_ID"
        );
    }

    #[test]
    fn unbound_user_variable_is_an_error() {
        assert_eq!(
            substitute("${_PREFIX}-f", &Substitutions::new()),
            Err(SubstitutionError::Unbound {
                name: "_PREFIX".to_owned()
            })
        );
    }

    #[test]
    fn unclosed_brace_is_an_error() {
        assert!(matches!(
            substitute("${_PREFIX-f", &Substitutions::new()),
            Err(SubstitutionError::Unclosed { .. })
        ));
    }

    #[test]
    fn lowercase_braced_name_is_rejected() {
        assert!(matches!(
            substitute("${prefix}", &Substitutions::new()),
            Err(SubstitutionError::InvalidName { .. })
        ));
    }

    #[test]
    fn user_variables_are_collected_once() {
        let names = user_variables("${_PREFIX}-a $_PREFIX $_TEAM $PROJECT_ID").unwrap();
        assert_eq!(
            names.into_iter().collect::<Vec<_>>(),
            vec!["_PREFIX".to_owned(), "_TEAM".to_owned()]
        );
    }
}
